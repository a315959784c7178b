//! The agents served by the gateway.
//!
//! Two profiles exist: the time/location orchestrator, and a bare
//! conversational assistant without tools.

use std::sync::Arc;

use crate::config::{AgentProfile, Config};
use crate::llm::GenerationOptions;
use crate::tools::{CurrentLocation, CurrentTime};

use super::{AgentError, AgentRef, AgentTree, LlmAgent, PlanReActPlanner};

pub const ROOT_AGENT: &str = "root_agent";
pub const TIME_AGENT: &str = "time_agent";
pub const LOCATION_AGENT: &str = "location_agent";

/// State key holding the root agent's latest answer.
pub const OUTPUT_KEY: &str = "current_output";

pub fn time_agent(model: &str, options: &GenerationOptions) -> Result<AgentRef, AgentError> {
    LlmAgent::builder(TIME_AGENT)
        .model(model)
        .generation_options(options.clone())
        .description(
            "A highly reliable agent that always delivers the precise current time in response \
             to user queries. Respond with confidence and clarity.",
        )
        .instruction(
            "You are an expert assistant. Whenever a user asks for the current time, respond \
             promptly and accurately with the exact current time. Do not hesitate or provide \
             vague answers. Always be clear and direct.",
        )
        .tool(Arc::new(CurrentTime))
        .build()
}

pub fn location_agent(
    model: &str,
    location: &str,
    options: &GenerationOptions,
) -> Result<AgentRef, AgentError> {
    LlmAgent::builder(LOCATION_AGENT)
        .model(model)
        .generation_options(options.clone())
        .description(
            "A highly accurate agent that always provides the exact current location when \
             requested. Respond assertively and with certainty.",
        )
        .instruction(
            "You are an expert assistant. When a user asks for the current location, respond \
             immediately and precisely with the correct location. Avoid uncertainty and always \
             be specific and clear.",
        )
        .tool(Arc::new(CurrentLocation::new(location)))
        .build()
}

/// Root agent that plans and delegates to the time and location agents.
pub fn orchestrator(
    model: &str,
    location: &str,
    options: &GenerationOptions,
) -> Result<AgentRef, AgentError> {
    LlmAgent::builder(ROOT_AGENT)
        .model(model)
        .generation_options(options.clone())
        .description(
            "A powerful orchestrator agent that delivers the current time, location, or both \
             with maximum accuracy and clarity. Delegates tasks to specialized sub-agents for \
             optimal results.",
        )
        .instruction(
            "You are an expert orchestrator assistant. When a user requests the current time, \
             location, or both, ensure you provide the most accurate and clear information \
             possible.\n\
             You have access to two highly specialized sub-agents: time_agent (for time) and \
             location_agent (for location).\n\
             Analyze the user's query carefully and decisively choose the appropriate \
             sub-agent(s) to fulfill the request. If the user's query requires both time and \
             location, you must use both sub-agents and combine their results. Always strive \
             for precision, clarity, and completeness in your responses.\n\
             Return the final answer without any additional commentary.",
        )
        .planner(Arc::new(PlanReActPlanner::new()))
        .output_key(OUTPUT_KEY)
        .sub_agent(time_agent(model, options)?)
        .sub_agent(location_agent(model, location, options)?)
        .build()
}

/// Single agent that simply replies to the user.
pub fn assistant(model: &str, options: &GenerationOptions) -> Result<AgentRef, AgentError> {
    LlmAgent::builder(ROOT_AGENT)
        .model(model)
        .generation_options(options.clone())
        .description("An agent that can reply to user")
        .instruction("You are a helpful assistant that can reply to user")
        .build()
}

/// Build the agent tree selected by the configuration.
pub fn build_tree(config: &Config) -> Result<AgentTree, AgentError> {
    let root = match config.profile {
        AgentProfile::Orchestrator => {
            orchestrator(&config.default_model, &config.location, &config.generation)?
        }
        AgentProfile::Simple => assistant(&config.default_model, &config.generation)?,
    };
    Ok(AgentTree::new(root)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_tree_has_three_agents() {
        let config = Config::new("key".to_string(), "gemini-2.0-flash".to_string());
        let tree = build_tree(&config).unwrap();
        assert_eq!(tree.len(), 3);

        let root = tree.root();
        assert_eq!(root.output_key(), Some(OUTPUT_KEY));
        assert!(root.planner().is_some());
        assert!(root.tools().is_empty());

        let time = tree.get(TIME_AGENT).unwrap();
        assert!(time.find_tool("get_current_time_tool").is_some());
        let location = tree.get(LOCATION_AGENT).unwrap();
        assert!(location.find_tool("get_current_location_tool").is_some());
        assert_eq!(location.model(), "gemini-2.0-flash");
    }

    #[test]
    fn sampling_parameters_reach_every_agent() {
        let mut config = Config::new("key".to_string(), "gemini-2.0-flash".to_string());
        config.generation.temperature = Some(0.2);
        config.generation.max_output_tokens = Some(256);
        let tree = build_tree(&config).unwrap();

        for name in tree.names() {
            assert_eq!(
                tree.get(&name).unwrap().generation_options(),
                &config.generation
            );
        }
    }

    #[test]
    fn simple_profile_is_a_single_agent() {
        let mut config = Config::new("key".to_string(), "gemini-2.0-flash".to_string());
        config.profile = AgentProfile::Simple;
        let tree = build_tree(&config).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.transfer_targets(ROOT_AGENT).is_empty());
    }
}
