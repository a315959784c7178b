//! One run of the agent tree for a single user message.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::agents::{AgentError, AgentRef, AgentTree, LlmAgent};
use crate::llm::{Content, FunctionCall, LlmClient, Part, Role};
use crate::session::{Event, EventActions, SessionError, SessionKey, SessionService, USER_AUTHOR};

use super::flow::{self, TRANSFER_TO_AGENT};

/// Outcome of one model call.
pub(crate) enum Step {
    /// The model called functions; the loop continues.
    Continue(Vec<Event>),
    /// The model produced a final response.
    Done(Event),
}

/// Mutable state of an invocation: which agent is active and how many
/// model calls have been made.
///
/// # Invariants
/// - `steps <= max_steps`
/// - `active` is always an agent of `tree`
pub(crate) struct Invocation {
    id: String,
    key: SessionKey,
    tree: Arc<AgentTree>,
    sessions: Arc<dyn SessionService>,
    llm: Arc<dyn LlmClient>,
    active: AgentRef,
    steps: usize,
    max_steps: usize,
}

impl Invocation {
    pub(crate) fn new(
        id: String,
        key: SessionKey,
        tree: Arc<AgentTree>,
        sessions: Arc<dyn SessionService>,
        llm: Arc<dyn LlmClient>,
        max_steps: usize,
    ) -> Self {
        let active = tree.root();
        Self {
            id,
            key,
            tree,
            sessions,
            llm,
            active,
            steps: 0,
            max_steps,
        }
    }

    /// Record the user's message in the session.
    ///
    /// # Errors
    /// Returns `AgentError::Session` if the session does not exist.
    pub(crate) async fn start(&self, message: Content) -> Result<(), AgentError> {
        if self.sessions.get_session(&self.key).await?.is_none() {
            return Err(SessionError::NotFound(self.key.clone()).into());
        }
        let message = Content::new(Role::User, message.parts);
        self.sessions
            .append_event(&self.key, Event::new(&self.id, USER_AUTHOR, Some(message)))
            .await?;
        Ok(())
    }

    /// Call the model once for the active agent and act on its reply.
    pub(crate) async fn step(&mut self) -> Result<Step, AgentError> {
        if self.steps >= self.max_steps {
            return Err(AgentError::MaxIterations(self.max_steps));
        }
        self.steps += 1;

        let session = self
            .sessions
            .get_session(&self.key)
            .await?
            .ok_or_else(|| SessionError::NotFound(self.key.clone()))?;

        let agent = Arc::clone(&self.active);
        let request = flow::build_request(&self.tree, &agent, &session.events);
        tracing::debug!(
            agent = agent.name(),
            step = self.steps,
            contents = request.contents.len(),
            tools = request.tools.len(),
            "Calling model"
        );

        let response = self
            .llm
            .generate(&request)
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        let mut content = response
            .content
            .unwrap_or_else(|| Content::new(Role::Model, Vec::new()));
        content.role = Role::Model;
        if let Some(planner) = agent.planner() {
            content.parts = planner.process_response(std::mem::take(&mut content.parts));
        }

        let calls: Vec<FunctionCall> = content.function_calls().into_iter().cloned().collect();
        let mut event = Event::new(&self.id, agent.name(), Some(content));

        if calls.is_empty() {
            if let (Some(key), Some(text)) = (agent.output_key(), event.final_text()) {
                event
                    .actions
                    .state_delta
                    .insert(key.to_string(), Value::String(text));
            }
            let event = self.sessions.append_event(&self.key, event).await?;
            return Ok(Step::Done(event));
        }

        let model_event = self.sessions.append_event(&self.key, event).await?;
        let (response_event, transfer) = self.call_functions(&agent, &calls).await;
        let response_event = self.sessions.append_event(&self.key, response_event).await?;

        if let Some(target) = transfer {
            tracing::info!("Transferring from {} to {}", agent.name(), target.name());
            self.active = target;
        }

        Ok(Step::Continue(vec![model_event, response_event]))
    }

    /// Run the requested functions and collect their responses in one event.
    ///
    /// Failures never abort the invocation: unknown tools, tool errors, and
    /// invalid transfer targets are reported back to the model as `error`
    /// responses.
    async fn call_functions(
        &self,
        agent: &LlmAgent,
        calls: &[FunctionCall],
    ) -> (Event, Option<AgentRef>) {
        let mut parts = Vec::with_capacity(calls.len());
        let mut actions = EventActions::default();
        let mut transfer = None;

        for call in calls {
            let response = if call.name == TRANSFER_TO_AGENT {
                let target_name = call
                    .args
                    .get("agent_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                match self.tree.transfer_target(agent.name(), target_name) {
                    Some(target) => {
                        actions.transfer_to_agent = Some(target.name().to_string());
                        transfer = Some(target);
                        json!({ "result": format!("Transferred to {}", target_name) })
                    }
                    None => {
                        tracing::warn!(
                            "{} asked to transfer to unknown agent '{}'",
                            agent.name(),
                            target_name
                        );
                        json!({
                            "error": format!(
                                "Agent '{}' is not a valid transfer target for {}",
                                target_name,
                                agent.name()
                            )
                        })
                    }
                }
            } else {
                match agent.find_tool(&call.name) {
                    Some(tool) => match tool.execute(call.args.clone()).await {
                        Ok(output) => {
                            tracing::debug!(tool = %call.name, output = %output, "Tool finished");
                            json!({ "result": output })
                        }
                        Err(e) => {
                            tracing::warn!("Tool {} failed: {}", call.name, e);
                            json!({ "error": e.to_string() })
                        }
                    },
                    None => json!({ "error": format!("Unknown tool: {}", call.name) }),
                }
            };
            parts.push(Part::function_response(call.id.clone(), &call.name, response));
        }

        let event = Event::new(&self.id, agent.name(), Some(Content::new(Role::User, parts)))
            .with_actions(actions);
        (event, transfer)
    }
}
