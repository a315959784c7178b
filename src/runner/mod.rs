//! Runner - drives an agent tree against a session.
//!
//! # Flow
//! 1. The user message is appended to the session
//! 2. The active agent (initially the root) is called with the session history
//! 3. Function calls are executed and their responses appended
//! 4. A `transfer_to_agent` call switches the active agent
//! 5. The loop ends when the model answers without calling any function
//!
//! Every event is yielded on the returned stream as soon as it is recorded.

mod flow;
mod invocation;

pub use flow::TRANSFER_TO_AGENT;

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;

use crate::agents::{AgentError, AgentTree};
use crate::llm::{Content, LlmClient};
use crate::session::{new_invocation_id, Event, SessionKey, SessionService};

use invocation::{Invocation, Step};

/// Default cap on model calls per invocation.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Stream of events produced by one invocation.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, AgentError>> + Send>>;

/// Executes an agent tree for an application.
#[derive(Clone)]
pub struct Runner {
    app_name: String,
    tree: Arc<AgentTree>,
    sessions: Arc<dyn SessionService>,
    llm: Arc<dyn LlmClient>,
    max_iterations: usize,
}

impl Runner {
    pub fn new(
        app_name: impl Into<String>,
        tree: Arc<AgentTree>,
        sessions: Arc<dyn SessionService>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            tree,
            sessions,
            llm,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Run the tree on `new_message` within an existing session.
    ///
    /// The stream ends after the final response, or after the first error.
    pub fn run(&self, user_id: &str, session_id: &str, new_message: Content) -> EventStream {
        let key = SessionKey::new(&self.app_name, user_id, session_id);
        let invocation_id = new_invocation_id();
        tracing::info!(session = %key, invocation = %invocation_id, "Starting invocation");

        let mut invocation = Invocation::new(
            invocation_id,
            key,
            Arc::clone(&self.tree),
            Arc::clone(&self.sessions),
            Arc::clone(&self.llm),
            self.max_iterations,
        );

        Box::pin(async_stream::stream! {
            match invocation.start(new_message).await {
                Err(e) => {
                    yield Err(e);
                }
                Ok(()) => loop {
                    match invocation.step().await {
                        Ok(Step::Continue(events)) => {
                            for event in events {
                                yield Ok(event);
                            }
                        }
                        Ok(Step::Done(event)) => {
                            yield Ok(event);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Invocation failed: {}", e);
                            yield Err(e);
                            break;
                        }
                    }
                },
            }
        })
    }
}
