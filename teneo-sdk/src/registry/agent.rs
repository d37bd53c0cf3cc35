//! [`AgentRegistry`]: in-memory agent catalog with secondary indices.

use std::collections::{HashMap, HashSet};

use teneo_types::{Agent, AgentStatus};

/// Tokenizes a name fragment into lowercase alphanumeric runs, matching the lookup
/// semantics in `spec.md` §4.4.
fn tokenize(input: &str) -> Vec<String> {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Catalog of known agents, keyed by id, with O(1)-average lookups by capability and
/// status, and token-based lookup by name.
///
/// Every lookup returns defensive copies (`spec.md` §3, §4.4); mutating a returned
/// [`Agent`] never affects registry state since the registry never hands out a live
/// reference.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
    by_capability: HashMap<String, HashSet<String>>,
    by_status: HashMap<AgentStatus, HashSet<String>>,
    by_name_token: HashMap<String, HashSet<String>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire catalog, rebuilding all indices from scratch in one pass.
    pub fn replace(&mut self, agents: Vec<Agent>) {
        self.agents.clear();
        self.by_capability.clear();
        self.by_status.clear();
        self.by_name_token.clear();
        for agent in agents {
            self.index(&agent);
            self.agents.insert(agent.id.clone(), agent);
        }
    }

    /// Inserts or updates a single agent, removing its prior index entries first so
    /// indices never point at stale rows.
    pub fn upsert(&mut self, agent: Agent) {
        self.deindex(&agent.id);
        self.index(&agent);
        self.agents.insert(agent.id.clone(), agent);
    }

    /// Looks up a single agent by id.
    pub fn get(&self, id: &str) -> Option<Agent> {
        self.agents.get(id).cloned()
    }

    /// Returns every known agent.
    pub fn all(&self) -> Vec<Agent> {
        self.agents.values().cloned().collect()
    }

    /// Returns agents advertising `capability` (case-insensitive).
    pub fn find_by_capability(&self, capability: &str) -> Vec<Agent> {
        let key = capability.to_lowercase();
        self.by_capability
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.agents.get(id).cloned())
            .collect()
    }

    /// Returns agents whose name contains every token of `fragment`, unioned across
    /// the posting lists of the individual tokens.
    pub fn find_by_name(&self, fragment: &str) -> Vec<Agent> {
        let tokens = tokenize(fragment);
        if tokens.is_empty() {
            return Vec::new();
        }
        let mut ids: HashSet<String> = HashSet::new();
        for token in &tokens {
            if let Some(posting) = self.by_name_token.get(token) {
                ids.extend(posting.iter().cloned());
            }
        }
        ids.into_iter().filter_map(|id| self.agents.get(&id).cloned()).collect()
    }

    /// Returns agents with the given status.
    pub fn find_by_status(&self, status: AgentStatus) -> Vec<Agent> {
        self.by_status
            .get(&status)
            .into_iter()
            .flatten()
            .filter_map(|id| self.agents.get(id).cloned())
            .collect()
    }

    /// Empties the registry and all indices.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.by_capability.clear();
        self.by_status.clear();
        self.by_name_token.clear();
    }

    fn index(&mut self, agent: &Agent) {
        for capability in &agent.capabilities {
            self.by_capability
                .entry(capability.name.to_lowercase())
                .or_default()
                .insert(agent.id.clone());
        }
        self.by_status
            .entry(agent.status)
            .or_default()
            .insert(agent.id.clone());
        for token in tokenize(&agent.name) {
            self.by_name_token.entry(token).or_default().insert(agent.id.clone());
        }
    }

    fn deindex(&mut self, id: &str) {
        let Some(prior) = self.agents.get(id).cloned() else {
            return;
        };
        for capability in &prior.capabilities {
            if let Some(set) = self.by_capability.get_mut(&capability.name.to_lowercase()) {
                set.remove(id);
            }
        }
        if let Some(set) = self.by_status.get_mut(&prior.status) {
            set.remove(id);
        }
        for token in tokenize(&prior.name) {
            if let Some(set) = self.by_name_token.get_mut(&token) {
                set.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teneo_types::Capability;

    fn agent(id: &str, name: &str, status: AgentStatus, caps: &[&str]) -> Agent {
        Agent {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            status,
            capabilities: caps
                .iter()
                .map(|c| Capability {
                    name: c.to_string(),
                    description: None,
                })
                .collect(),
            commands: vec![],
            room: None,
            agent_type: None,
        }
    }

    #[test]
    fn indices_stay_consistent_after_replace() {
        let mut registry = AgentRegistry::new();
        registry.replace(vec![
            agent("a-1", "Summarizer Bot", AgentStatus::Online, &["summarize", "translate"]),
            agent("a-2", "Image Gen", AgentStatus::Offline, &["image"]),
        ]);

        assert_eq!(registry.find_by_capability("summarize").len(), 1);
        assert_eq!(registry.find_by_status(AgentStatus::Online).len(), 1);
        assert_eq!(registry.find_by_name("summarizer").len(), 1);
        assert_eq!(registry.find_by_name("bot").len(), 1);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn upsert_removes_prior_index_entries() {
        let mut registry = AgentRegistry::new();
        registry.upsert(agent("a-1", "Old Name", AgentStatus::Online, &["cap-a"]));
        registry.upsert(agent("a-1", "New Name", AgentStatus::Offline, &["cap-b"]));

        assert!(registry.find_by_capability("cap-a").is_empty());
        assert_eq!(registry.find_by_capability("cap-b").len(), 1);
        assert!(registry.find_by_status(AgentStatus::Online).is_empty());
        assert_eq!(registry.find_by_status(AgentStatus::Offline).len(), 1);
        assert!(registry.find_by_name("old").is_empty());
        assert_eq!(registry.find_by_name("new").len(), 1);
    }

    #[test]
    fn lookups_return_defensive_copies() {
        let mut registry = AgentRegistry::new();
        registry.upsert(agent("a-1", "Bot", AgentStatus::Online, &["x"]));
        let mut copy = registry.get("a-1").unwrap();
        copy.name = "Mutated".to_string();
        assert_eq!(registry.get("a-1").unwrap().name, "Bot");
    }
}
