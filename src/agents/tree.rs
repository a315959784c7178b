//! Agent tree structure and transfer resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::LlmAgent;

/// Reference to an agent in the tree.
pub type AgentRef = Arc<LlmAgent>;

/// Index over an agent hierarchy.
///
/// # Structure
/// - The root agent at the top
/// - Every other agent reachable through `sub_agents`
///
/// # Invariants
/// - Agent names are unique across the tree
/// - Every non-root agent has exactly one parent
pub struct AgentTree {
    /// All agents indexed by name
    agents: HashMap<String, AgentRef>,

    /// Child name -> parent name
    parents: HashMap<String, String>,

    root: AgentRef,
}

impl AgentTree {
    /// Index the hierarchy below `root`.
    ///
    /// # Errors
    /// Returns `TreeError::DuplicateAgent` if a name appears twice, which also
    /// covers the same agent being attached under two parents.
    pub fn new(root: AgentRef) -> Result<Self, TreeError> {
        let mut agents = HashMap::new();
        let mut parents = HashMap::new();
        let mut pending = vec![(Arc::clone(&root), None::<String>)];

        while let Some((agent, parent)) = pending.pop() {
            let name = agent.name().to_string();
            if agents.contains_key(&name) {
                return Err(TreeError::DuplicateAgent(name));
            }
            for child in agent.sub_agents().iter().rev() {
                pending.push((Arc::clone(child), Some(name.clone())));
            }
            if let Some(parent) = parent {
                parents.insert(name.clone(), parent);
            }
            agents.insert(name, agent);
        }

        Ok(Self {
            agents,
            parents,
            root,
        })
    }

    pub fn root(&self) -> AgentRef {
        Arc::clone(&self.root)
    }

    /// Get an agent by name.
    pub fn get(&self, name: &str) -> Option<AgentRef> {
        self.agents.get(name).cloned()
    }

    /// Get the parent of an agent (`None` for the root or unknown names).
    pub fn parent(&self, name: &str) -> Option<AgentRef> {
        self.parents.get(name).and_then(|p| self.get(p))
    }

    /// Agents that `name` may hand the conversation to: its sub-agents in
    /// declaration order, then its parent, then its peers (the parent's other
    /// sub-agents) in declaration order.
    pub fn transfer_targets(&self, name: &str) -> Vec<AgentRef> {
        let Some(agent) = self.get(name) else {
            return Vec::new();
        };
        let mut targets: Vec<AgentRef> = agent.sub_agents().to_vec();
        if let Some(parent) = self.parent(name) {
            let peers: Vec<AgentRef> = parent
                .sub_agents()
                .iter()
                .filter(|peer| peer.name() != name)
                .cloned()
                .collect();
            targets.push(parent);
            targets.extend(peers);
        }
        targets
    }

    /// Resolve a transfer from `from` to `to`, if allowed.
    pub fn transfer_target(&self, from: &str, to: &str) -> Option<AgentRef> {
        self.transfer_targets(from)
            .into_iter()
            .find(|a| a.name() == to)
    }

    /// Names of all agents, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Errors in tree construction.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Agent name appears more than once in the tree: {0}")]
    DuplicateAgent(String),
}
