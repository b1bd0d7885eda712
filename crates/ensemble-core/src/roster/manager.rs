//! Roster: the ordered team of agents and their activation state

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::record::AgentRecord;
use crate::error::RosterError;
use crate::types::{SYSTEM_ID, Team, USER_ID};

/// Ordered set of agents. Membership is fixed at construction; only the
/// `active` flag changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<AgentRecord>,
}

impl Roster {
    /// Build a roster, keeping the given order. Ids must be unique and may
    /// not collide with the `user` / `system` sender ids.
    pub fn new(agents: Vec<AgentRecord>) -> Result<Self, RosterError> {
        let mut seen = HashSet::new();
        for agent in &agents {
            if agent.id == USER_ID || agent.id == SYSTEM_ID {
                return Err(RosterError::ReservedId(agent.id.clone()));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(RosterError::DuplicateAgent(agent.id.clone()));
            }
        }
        info!("Roster: initialized with {} agents", agents.len());
        Ok(Self { agents })
    }

    /// Roster for a built-in pack. Its ids are checked by each pack's tests.
    pub(crate) fn builtin(agents: Vec<AgentRecord>) -> Self {
        debug!("Roster: built-in roster with {} agents", agents.len());
        Self { agents }
    }

    /// Flip `active` for one agent and return the new value.
    ///
    /// Deactivating a non-removable agent is rejected and leaves it active.
    pub fn toggle(&mut self, agent_id: &str) -> Result<bool, RosterError> {
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| RosterError::NotFound(agent_id.to_string()))?;

        if !agent.can_toggle() {
            warn!("Roster: cannot deactivate locked agent '{}'", agent_id);
            return Err(RosterError::ToggleRejected(agent_id.to_string()));
        }

        agent.active = !agent.active;
        debug!("Roster: agent '{}' active={}", agent_id, agent.active);
        Ok(agent.active)
    }

    /// Set the starting activation state, bypassing the removable check.
    /// Used when applying configuration before a session starts.
    pub fn set_initial_active(&mut self, agent_id: &str, active: bool) -> Result<(), RosterError> {
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| RosterError::NotFound(agent_id.to_string()))?;
        agent.active = active;
        Ok(())
    }

    /// Active agents in roster order
    pub fn active_agents(&self) -> Vec<AgentRecord> {
        self.agents.iter().filter(|a| a.active).cloned().collect()
    }

    /// Agents of one team in roster order, active or not
    pub fn list_by_team(&self, team: Team) -> Vec<&AgentRecord> {
        self.agents.iter().filter(|a| a.team == team).collect()
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.id == agent_id)
    }

    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.agents.iter().filter(|a| a.active).count()
    }
}
