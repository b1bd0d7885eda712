//! Response lookup: maps (agent, utterance) to the agent's reply text
//!
//! Lookups sit on the timer path, so they never fail: unknown agents get a
//! fallback line instead of an error.

use std::collections::HashMap;
use tracing::debug;

/// Placeholder replaced with the user's utterance in table entries
pub const UTTERANCE_PLACEHOLDER: &str = "{utterance}";

/// Reply text source. Implementations must be pure: the same inputs always
/// produce the same output.
pub trait ResponseLookup: Send + Sync {
    fn respond(&self, agent_id: &str, utterance: &str) -> String;
}

impl<F> ResponseLookup for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn respond(&self, agent_id: &str, utterance: &str) -> String {
        self(agent_id, utterance)
    }
}

/// Static per-agent reply table with a fallback line
#[derive(Debug, Clone)]
pub struct StaticTable {
    responses: HashMap<String, String>,
    fallback: String,
}

impl StaticTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            responses: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with(mut self, agent_id: impl Into<String>, response: impl Into<String>) -> Self {
        self.insert(agent_id, response);
        self
    }

    pub fn insert(&mut self, agent_id: impl Into<String>, response: impl Into<String>) {
        self.responses.insert(agent_id.into(), response.into());
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.responses.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl ResponseLookup for StaticTable {
    fn respond(&self, agent_id: &str, utterance: &str) -> String {
        let template = match self.responses.get(agent_id) {
            Some(text) => text,
            None => {
                debug!("No scripted reply for agent '{}', using fallback", agent_id);
                &self.fallback
            }
        };
        template.replace(UTTERANCE_PLACEHOLDER, utterance.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StaticTable {
        StaticTable::new("I'm here to help.")
            .with("writer", "Here is a draft.")
            .with("editor", "Notes on \"{utterance}\": tighten it.")
    }

    #[test]
    fn test_known_agent() {
        assert_eq!(table().respond("writer", "launch campaign"), "Here is a draft.");
    }

    #[test]
    fn test_unknown_agent_falls_back() {
        assert_eq!(table().respond("ghost", "anything"), "I'm here to help.");
    }

    #[test]
    fn test_placeholder_substitution() {
        assert_eq!(
            table().respond("editor", "  spring sale "),
            "Notes on \"spring sale\": tighten it."
        );
    }

    #[test]
    fn test_respond_is_pure() {
        let t = table();
        let first = t.respond("writer", "launch campaign");
        for _ in 0..5 {
            assert_eq!(t.respond("writer", "launch campaign"), first);
        }
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |agent: &str, input: &str| format!("{agent}:{input}");
        assert_eq!(lookup.respond("writer", "hi"), "writer:hi");
    }
}
