//! LLM agent descriptors.

use std::sync::Arc;

use crate::config::DEFAULT_MODEL;
use crate::llm::{FunctionDeclaration, GenerationOptions};
use crate::session::USER_AUTHOR;
use crate::tools::{self, Tool};

use super::planner::Planner;
use super::AgentError;

/// A configured agent: a model, its instructions, and what it may call.
///
/// # Invariants
/// - `name` is an identifier and is never `"user"`
/// - Immutable once built; shared as `Arc<LlmAgent>`
pub struct LlmAgent {
    name: String,
    model: String,
    description: String,
    instruction: String,
    planner: Option<Arc<dyn Planner>>,
    tools: Vec<Arc<dyn Tool>>,
    sub_agents: Vec<Arc<LlmAgent>>,
    output_key: Option<String>,
    generation: GenerationOptions,
}

impl LlmAgent {
    /// Start building an agent with the given name.
    pub fn builder(name: impl Into<String>) -> LlmAgentBuilder {
        LlmAgentBuilder {
            name: name.into(),
            model: DEFAULT_MODEL.to_string(),
            description: String::new(),
            instruction: String::new(),
            planner: None,
            tools: Vec::new(),
            sub_agents: Vec::new(),
            output_key: None,
            generation: GenerationOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn planner(&self) -> Option<&Arc<dyn Planner>> {
        self.planner.as_ref()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn sub_agents(&self) -> &[Arc<LlmAgent>] {
        &self.sub_agents
    }

    /// State key receiving this agent's final answer, if any.
    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    /// Sampling parameters sent with this agent's model calls.
    pub fn generation_options(&self) -> &GenerationOptions {
        &self.generation
    }

    /// Find one of this agent's tools by name.
    pub fn find_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Function declarations for this agent's own tools.
    pub fn tool_declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.iter().map(|t| tools::declaration(t.as_ref())).collect()
    }
}

impl std::fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("planner", &self.planner.as_ref().map(|p| p.name().to_string()))
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
            )
            .field(
                "sub_agents",
                &self.sub_agents.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
            )
            .field("output_key", &self.output_key)
            .finish()
    }
}

/// Builder for [`LlmAgent`].
pub struct LlmAgentBuilder {
    name: String,
    model: String,
    description: String,
    instruction: String,
    planner: Option<Arc<dyn Planner>>,
    tools: Vec<Arc<dyn Tool>>,
    sub_agents: Vec<Arc<LlmAgent>>,
    output_key: Option<String>,
    generation: GenerationOptions,
}

impl LlmAgentBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn sub_agent(mut self, agent: Arc<LlmAgent>) -> Self {
        self.sub_agents.push(agent);
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn generation_options(mut self, options: GenerationOptions) -> Self {
        self.generation = options;
        self
    }

    /// Validate and freeze the agent.
    ///
    /// # Errors
    /// Returns `AgentError::InvalidName` if the name is not an identifier or is `"user"`.
    pub fn build(self) -> Result<Arc<LlmAgent>, AgentError> {
        if !is_identifier(&self.name) || self.name == USER_AUTHOR {
            return Err(AgentError::InvalidName(self.name));
        }
        Ok(Arc::new(LlmAgent {
            name: self.name,
            model: self.model,
            description: self.description,
            instruction: self.instruction,
            planner: self.planner,
            tools: self.tools,
            sub_agents: self.sub_agents,
            output_key: self.output_key,
            generation: self.generation,
        }))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::CurrentTime;

    #[test]
    fn builder_keeps_declared_fields() {
        let agent = LlmAgent::builder("time_agent")
            .model("gemini-2.0-flash")
            .description("Tells the time")
            .instruction("Answer with the time.")
            .tool(Arc::new(CurrentTime))
            .output_key("last_time")
            .build()
            .unwrap();

        assert_eq!(agent.name(), "time_agent");
        assert_eq!(agent.output_key(), Some("last_time"));
        assert!(agent.find_tool("get_current_time_tool").is_some());
        assert!(agent.find_tool("get_current_location_tool").is_none());
        assert_eq!(agent.tool_declarations().len(), 1);
        assert!(agent.planner().is_none());
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["", "user", "9lives", "time agent", "time-agent"] {
            let err = LlmAgent::builder(name).build().unwrap_err();
            assert!(matches!(err, AgentError::InvalidName(_)), "{name}");
        }
        assert!(LlmAgent::builder("_private").build().is_ok());
    }
}
