//! Planners: prompt-level delegation strategies.
//!
//! A planner shapes how an agent reasons before acting. It contributes extra
//! system instruction and post-processes the model's reply, separating
//! planning text (kept as thought parts) from the answer.

use crate::llm::Part;

pub const PLANNING_TAG: &str = "/*PLANNING*/";
pub const REPLANNING_TAG: &str = "/*REPLANNING*/";
pub const REASONING_TAG: &str = "/*REASONING*/";
pub const ACTION_TAG: &str = "/*ACTION*/";
pub const FINAL_ANSWER_TAG: &str = "/*FINAL_ANSWER*/";

/// Strategy hook for agents that plan before answering.
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    /// Extra system instruction, appended after the agent's own instruction.
    fn planning_instruction(&self) -> Option<String>;

    /// Rewrite the parts of a model reply.
    fn process_response(&self, parts: Vec<Part>) -> Vec<Part>;
}

/// Plan, act, reason, and answer in tagged sections.
///
/// The model is asked to write a plan, execute it with tool calls, and put
/// its answer after [`FINAL_ANSWER_TAG`]. Everything before the answer is
/// turned into thought parts, and only the first run of consecutive function
/// calls in a reply is kept, so every step performs one action.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanReActPlanner;

impl PlanReActPlanner {
    pub fn new() -> Self {
        Self
    }

    fn starts_with_planning_tag(text: &str) -> bool {
        let text = text.trim_start();
        [PLANNING_TAG, REPLANNING_TAG, REASONING_TAG, ACTION_TAG]
            .iter()
            .any(|tag| text.starts_with(tag))
    }

    fn split_text_part(part: Part, out: &mut Vec<Part>) {
        if part.is_thought() || part.text.is_none() {
            out.push(part);
            return;
        }
        let text = part.text.as_deref().unwrap_or_default();

        if let Some(idx) = text.find(FINAL_ANSWER_TAG) {
            let (reasoning, answer) = text.split_at(idx + FINAL_ANSWER_TAG.len());
            if !reasoning.trim().is_empty() {
                out.push(Part::thought(reasoning));
            }
            if !answer.trim().is_empty() {
                out.push(Part::text(answer));
            }
        } else if Self::starts_with_planning_tag(text) {
            out.push(Part::thought(text));
        } else {
            out.push(part);
        }
    }
}

impl Planner for PlanReActPlanner {
    fn name(&self) -> &str {
        "plan_react"
    }

    fn planning_instruction(&self) -> Option<String> {
        Some(format!(
            r#"When answering, first write a plan and then carry it out step by step.

Format your reply with these sections:
- {planning} followed by a numbered plan that uses the available tools and agents to answer the query.
- {action} right before each tool or agent call. Make one call per step.
- {reasoning} after each call result, summarizing what you learned and what remains.
- {replanning} followed by a revised plan if a step fails or the plan no longer fits.
- {answer} followed by the answer to the user's query.

Rules:
1. Only use the tools and agents you were given. Never invent results.
2. Keep the plan short and concrete.
3. The text after {answer} is shown to the user verbatim; it must be self-contained."#,
            planning = PLANNING_TAG,
            action = ACTION_TAG,
            reasoning = REASONING_TAG,
            replanning = REPLANNING_TAG,
            answer = FINAL_ANSWER_TAG,
        ))
    }

    fn process_response(&self, parts: Vec<Part>) -> Vec<Part> {
        let mut out = Vec::with_capacity(parts.len());
        let mut iter = parts.into_iter().peekable();

        while let Some(part) = iter.next() {
            let unnamed_call = part.function_call.as_ref().map(|c| c.name.is_empty());
            match unnamed_call {
                Some(true) => continue,
                Some(false) => {
                    out.push(part);
                    while let Some(next) = iter.next_if(|p| p.function_call.is_some()) {
                        out.push(next);
                    }
                    break;
                }
                None => Self::split_text_part(part, &mut out),
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn final_answer_is_split_from_reasoning() {
        let parts = vec![Part::text(
            "/*PLANNING*/ 1. ask time_agent\n/*REASONING*/ got it\n/*FINAL_ANSWER*/\nIt is 10:15.",
        )];
        let out = PlanReActPlanner.process_response(parts);

        assert_eq!(out.len(), 2);
        assert!(out[0].is_thought());
        assert!(out[0].text.as_deref().unwrap().ends_with(FINAL_ANSWER_TAG));
        assert!(!out[1].is_thought());
        assert_eq!(out[1].text.as_deref().unwrap().trim(), "It is 10:15.");
    }

    #[test]
    fn planning_only_text_becomes_thought() {
        let out = PlanReActPlanner.process_response(vec![
            Part::text("  /*PLANNING*/ call location_agent"),
            Part::text("plain answer"),
        ]);
        assert!(out[0].is_thought());
        assert!(!out[1].is_thought());
    }

    #[test]
    fn keeps_only_first_run_of_function_calls() {
        let out = PlanReActPlanner.process_response(vec![
            Part::text("/*ACTION*/"),
            Part::function_call("transfer_to_agent", json!({"agent_name": "time_agent"})),
            Part::function_call("get_current_location_tool", json!({})),
            Part::text("trailing text"),
            Part::function_call("get_current_time_tool", json!({})),
        ]);

        assert_eq!(out.len(), 3);
        assert!(out[0].is_thought());
        assert_eq!(out[1].function_call.as_ref().unwrap().name, "transfer_to_agent");
        assert_eq!(
            out[2].function_call.as_ref().unwrap().name,
            "get_current_location_tool"
        );
    }

    #[test]
    fn unnamed_function_calls_are_dropped() {
        let out = PlanReActPlanner.process_response(vec![
            Part::function_call("", json!({})),
            Part::text("answer"),
        ]);
        assert_eq!(out, vec![Part::text("answer")]);
    }

    #[test]
    fn instruction_mentions_every_tag() {
        let instruction = PlanReActPlanner.planning_instruction().unwrap();
        for tag in [PLANNING_TAG, ACTION_TAG, REASONING_TAG, REPLANNING_TAG, FINAL_ANSWER_TAG] {
            assert!(instruction.contains(tag), "{tag}");
        }
    }
}
