//! Building model requests from an agent and the session history.

use serde_json::json;

use crate::agents::{AgentRef, AgentTree, LlmAgent};
use crate::llm::{Content, FunctionDeclaration, LlmRequest, Part, Role};
use crate::session::Event;

/// Built-in function the model calls to hand the conversation to another agent.
pub const TRANSFER_TO_AGENT: &str = "transfer_to_agent";

pub fn transfer_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: TRANSFER_TO_AGENT.to_string(),
        description: "Transfer the question to another agent.".to_string(),
        parameters: Some(json!({
            "type": "OBJECT",
            "properties": {
                "agent_name": {
                    "type": "STRING",
                    "description": "Name of the agent to transfer to."
                }
            },
            "required": ["agent_name"]
        })),
    }
}

/// Assemble the next request for `agent`.
pub fn build_request(tree: &AgentTree, agent: &LlmAgent, events: &[Event]) -> LlmRequest {
    let targets = tree.transfer_targets(agent.name());

    let mut tools = agent.tool_declarations();
    if !targets.is_empty() {
        tools.push(transfer_declaration());
    }

    LlmRequest {
        model: agent.model().to_string(),
        system_instruction: Some(system_instruction(tree, agent, &targets)),
        contents: contents_for(agent.name(), events),
        tools,
        options: agent.generation_options().clone(),
    }
}

fn system_instruction(tree: &AgentTree, agent: &LlmAgent, targets: &[AgentRef]) -> String {
    let mut identity = format!(
        "You are an agent. Your internal name is \"{}\".",
        agent.name()
    );
    if !agent.description().is_empty() {
        identity.push_str(&format!(
            " The description about you is \"{}\".",
            agent.description()
        ));
    }

    let mut sections = vec![identity];
    if !agent.instruction().trim().is_empty() {
        sections.push(agent.instruction().trim().to_string());
    }
    if let Some(planning) = agent.planner().and_then(|p| p.planning_instruction()) {
        sections.push(planning);
    }
    if !targets.is_empty() {
        sections.push(transfer_instruction(tree, agent, targets));
    }
    sections.join("\n\n")
}

fn transfer_instruction(tree: &AgentTree, agent: &LlmAgent, targets: &[AgentRef]) -> String {
    let listing = targets
        .iter()
        .map(|t| format!("Agent name: {}\nAgent description: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut text = format!(
        "You have a list of other agents to transfer to:\n\n{listing}\n\n\
         If you are the best to answer the question according to your description, you can \
         answer it.\n\n\
         If another agent is better for answering the question according to its description, \
         call the `{TRANSFER_TO_AGENT}` function to transfer the question to that agent. When \
         transferring, do not generate any text other than the function call."
    );

    if let Some(parent) = tree.parent(agent.name()) {
        text.push_str(&format!(
            "\n\nYour parent agent is {}. If neither the other agents nor you are best for \
             answering the question according to the descriptions, transfer to your parent \
             agent.",
            parent.name()
        ));
    }
    text
}

/// Convert the session history into the contents `agent_name` sees.
///
/// User turns and the agent's own turns are replayed as-is (thought flags
/// cleared). Turns of other agents become user-side context narrating what
/// they said and which tools they used.
pub fn contents_for(agent_name: &str, events: &[Event]) -> Vec<Content> {
    events
        .iter()
        .filter_map(|event| {
            let content = event.content.as_ref().filter(|c| !c.parts.is_empty())?;
            if event.is_from_user() || event.author == agent_name {
                Some(without_thought_flags(content))
            } else {
                foreign_context(&event.author, content)
            }
        })
        .collect()
}

fn without_thought_flags(content: &Content) -> Content {
    let parts = content
        .parts
        .iter()
        .cloned()
        .map(|mut p| {
            p.thought = None;
            p
        })
        .collect();
    Content::new(content.role, parts)
}

fn foreign_context(author: &str, content: &Content) -> Option<Content> {
    let mut parts = vec![Part::text("For context:")];
    for part in content.parts.iter().filter(|p| !p.is_thought()) {
        if let Some(text) = part.text.as_deref().filter(|t| !t.trim().is_empty()) {
            parts.push(Part::text(format!("[{}] said: {}", author, text)));
        } else if let Some(call) = &part.function_call {
            parts.push(Part::text(format!(
                "[{}] called tool `{}` with parameters: {}",
                author, call.name, call.args
            )));
        } else if let Some(response) = &part.function_response {
            parts.push(Part::text(format!(
                "[{}] `{}` tool returned result: {}",
                author, response.name, response.response
            )));
        }
    }

    if parts.len() == 1 {
        None
    } else {
        Some(Content::new(Role::User, parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::catalog;
    use crate::config::Config;

    fn tree() -> AgentTree {
        catalog::build_tree(&Config::new("key".to_string(), "gemini-2.0-flash".to_string()))
            .unwrap()
    }

    #[test]
    fn root_request_offers_transfer_and_planning() {
        let tree = tree();
        let root = tree.root();
        let request = build_request(&tree, &root, &[]);

        assert_eq!(request.model, "gemini-2.0-flash");
        assert!(request.declares(TRANSFER_TO_AGENT));
        assert_eq!(request.tools.len(), 1);

        let system = request.system_instruction.unwrap();
        assert!(system.contains("\"root_agent\""));
        assert!(system.contains("/*FINAL_ANSWER*/"));
        assert!(system.contains("Agent name: time_agent"));
        assert!(system.contains("Agent name: location_agent"));
        assert!(!system.contains("Your parent agent"));
    }

    #[test]
    fn sub_agent_request_mentions_parent() {
        let tree = tree();
        let time = tree.get(catalog::TIME_AGENT).unwrap();
        let request = build_request(&tree, &time, &[]);

        assert!(request.declares("get_current_time_tool"));
        assert!(request.declares(TRANSFER_TO_AGENT));
        let system = request.system_instruction.unwrap();
        assert!(system.contains("Your parent agent is root_agent"));
        assert!(system.contains("Agent name: location_agent"));
        assert!(!system.contains("Agent name: time_agent"));
        assert!(!system.contains("/*PLANNING*/"));
    }

    #[test]
    fn foreign_turns_become_context() {
        let user = Event::new("inv", "user", Some(Content::user_text("What time is it?")));
        let root_call = Event::new(
            "inv",
            "root_agent",
            Some(Content::new(
                Role::Model,
                vec![
                    Part::thought("/*PLANNING*/ ask time_agent"),
                    Part::function_call(TRANSFER_TO_AGENT, json!({"agent_name": "time_agent"})),
                ],
            )),
        );
        let root_result = Event::new(
            "inv",
            "root_agent",
            Some(Content::new(
                Role::User,
                vec![Part::function_response(None, TRANSFER_TO_AGENT, json!({"result": "ok"}))],
            )),
        );

        let events = [user, root_call, root_result];
        let contents = contents_for("time_agent", &events);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0], Content::user_text("What time is it?"));
        assert_eq!(contents[1].role, Role::User);
        assert_eq!(contents[1].parts.len(), 2);
        assert_eq!(contents[1].parts[0].text.as_deref(), Some("For context:"));
        assert!(contents[1].parts[1]
            .text
            .as_deref()
            .unwrap()
            .starts_with("[root_agent] called tool `transfer_to_agent`"));
        assert!(contents[2].parts[1]
            .text
            .as_deref()
            .unwrap()
            .contains("tool returned result"));

        let own = contents_for("root_agent", &events);
        assert_eq!(own[1].role, Role::Model);
        assert_eq!(own[1].parts[0].thought, None);
        assert!(own[1].parts[1].function_call.is_some());
    }

    #[test]
    fn empty_and_thought_only_foreign_turns_are_skipped() {
        let events = [
            Event::new("inv", "root_agent", None),
            Event::new(
                "inv",
                "root_agent",
                Some(Content::new(Role::Model, vec![Part::thought("/*PLANNING*/")])),
            ),
        ];
        assert!(contents_for("time_agent", &events).is_empty());
    }
}
