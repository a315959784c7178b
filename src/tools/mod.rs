//! Tool system for the agents.
//!
//! Tools are plain callables exposed to the model as function declarations.
//! The built-in tools are deliberately tiny: one reads the wall clock, the
//! other reports a fixed location.

mod clock;
mod location;

pub use clock::CurrentTime;
pub use location::CurrentLocation;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::FunctionDeclaration;

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool, as seen by the model.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters. `None` for tools without inputs.
    fn parameters_schema(&self) -> Option<Value> {
        None
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Build the function declaration the model sees for a tool.
pub fn declaration(tool: &dyn Tool) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}
