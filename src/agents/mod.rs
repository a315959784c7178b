//! Agents module - declarative agent descriptors and their hierarchy.
//!
//! # Pieces
//! - **LlmAgent**: immutable descriptor (model, instruction, tools, sub-agents)
//! - **AgentTree**: name index over a hierarchy, resolves transfers
//! - **Planner**: pluggable strategy that shapes how an agent plans and answers
//! - **catalog**: the concrete agents served by the gateway
//!
//! Delegation between agents is decided by the model itself: an agent with
//! transfer targets is offered a `transfer_to_agent` function, and the runner
//! switches the active agent when the model calls it.

mod agent;
pub mod catalog;
mod planner;
mod tree;
mod types;

pub use agent::{LlmAgent, LlmAgentBuilder};
pub use planner::{
    PlanReActPlanner, Planner, ACTION_TAG, FINAL_ANSWER_TAG, PLANNING_TAG, REASONING_TAG,
    REPLANNING_TAG,
};
pub use tree::{AgentRef, AgentTree, TreeError};
pub use types::AgentError;
