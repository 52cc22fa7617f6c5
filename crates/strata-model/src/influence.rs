//! Influences: declarative change requests addressed to a level.
//!
//! Every influence carries its target level and the window in which it was
//! produced. Regular influences carry an opaque payload interpreted by the
//! target level's reaction model. System influences add or remove agents
//! and are processed in the system-reaction passes.

use std::fmt;
use std::sync::Arc;

use strata_core::{AgentId, LevelId, LocalState, Owner, Payload, SimError, TimeWindow, Visibility};

use crate::agent::Agent;

/// A structural change to the agent population.
#[derive(Clone, Debug)]
pub enum SystemInfluence {
    /// Introduce a new agent into the simulation, in every level it was
    /// given local states for.
    AddAgent(Box<Agent>),
    /// Attach an already registered agent to the target level.
    AddAgentToLevel {
        /// Public local state installed in the level's consistent state.
        public: LocalState,
        /// Private local state handed to the agent.
        private: LocalState,
    },
    /// Remove an agent from the simulation (all levels).
    RemoveAgent {
        /// The agent to remove.
        agent: AgentId,
    },
    /// Detach an agent from the target level only.
    RemoveAgentFromLevel {
        /// The agent to detach.
        agent: AgentId,
    },
}

impl SystemInfluence {
    /// Category name reported by [`Influence::category`].
    pub fn category(&self) -> &'static str {
        match self {
            Self::AddAgent(_) => "system:add_agent",
            Self::AddAgentToLevel { .. } => "system:add_agent_to_level",
            Self::RemoveAgent { .. } => "system:remove_agent",
            Self::RemoveAgentFromLevel { .. } => "system:remove_agent_from_level",
        }
    }
}

/// What an influence asks for.
#[derive(Clone, Debug)]
pub enum InfluenceKind {
    /// A domain-specific request.
    Regular {
        /// User-chosen category, used by reaction models to dispatch.
        category: Arc<str>,
        /// Opaque request data.
        payload: Payload,
    },
    /// A population change.
    System(SystemInfluence),
}

/// A change request emitted during one transitory window.
#[derive(Clone, Debug)]
pub struct Influence {
    target_level: LevelId,
    window: TimeWindow,
    kind: InfluenceKind,
}

impl Influence {
    /// Create a regular influence.
    pub fn regular(
        category: impl AsRef<str>,
        target_level: LevelId,
        window: TimeWindow,
        payload: Payload,
    ) -> Self {
        Self {
            target_level,
            window,
            kind: InfluenceKind::Regular {
                category: Arc::from(category.as_ref()),
                payload,
            },
        }
    }

    /// Create an influence introducing `agent` into the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if the agent has no local
    /// states for `target_level`.
    pub fn add_agent(target_level: LevelId, window: TimeWindow, agent: Agent) -> Result<Self, SimError> {
        if !agent.is_declared_in(&target_level) {
            return Err(SimError::invalid(format!(
                "{} has no local states for level {target_level}",
                agent.id()
            )));
        }
        Ok(Self::system(
            target_level,
            window,
            SystemInfluence::AddAgent(Box::new(agent)),
        ))
    }

    /// Create an influence attaching an agent to `target_level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] unless both states belong to
    /// the same agent, describe `target_level`, and have the right
    /// visibility.
    pub fn add_agent_to_level(
        target_level: LevelId,
        window: TimeWindow,
        public: LocalState,
        private: LocalState,
    ) -> Result<Self, SimError> {
        let owner = match public.owner() {
            Owner::Agent(id) => id,
            Owner::Environment => {
                return Err(SimError::invalid(
                    "environment local states cannot be added to a level",
                ))
            }
        };
        if !private.is_owned_by(owner) {
            return Err(SimError::invalid(format!(
                "public and private local states have different owners ({} vs {})",
                public.owner(),
                private.owner()
            )));
        }
        if public.level() != &target_level || private.level() != &target_level {
            return Err(SimError::invalid(format!(
                "local states do not describe level {target_level}"
            )));
        }
        if public.visibility() != Visibility::Public || private.visibility() != Visibility::Private
        {
            return Err(SimError::invalid("local state visibilities are swapped"));
        }
        Ok(Self::system(
            target_level,
            window,
            SystemInfluence::AddAgentToLevel { public, private },
        ))
    }

    /// Create an influence removing `agent` from the simulation.
    pub fn remove_agent(target_level: LevelId, window: TimeWindow, agent: AgentId) -> Self {
        Self::system(target_level, window, SystemInfluence::RemoveAgent { agent })
    }

    /// Create an influence detaching `agent` from `target_level`.
    pub fn remove_agent_from_level(target_level: LevelId, window: TimeWindow, agent: AgentId) -> Self {
        Self::system(
            target_level,
            window,
            SystemInfluence::RemoveAgentFromLevel { agent },
        )
    }

    fn system(target_level: LevelId, window: TimeWindow, influence: SystemInfluence) -> Self {
        Self {
            target_level,
            window,
            kind: InfluenceKind::System(influence),
        }
    }

    /// The level whose reaction model applies this influence.
    pub fn target_level(&self) -> &LevelId {
        &self.target_level
    }

    /// The transitory window the influence was produced in.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Category name. System influences report a fixed `system:*` name.
    pub fn category(&self) -> &str {
        match &self.kind {
            InfluenceKind::Regular { category, .. } => category,
            InfluenceKind::System(s) => s.category(),
        }
    }

    /// Whether this is a system influence.
    pub fn is_system(&self) -> bool {
        matches!(self.kind, InfluenceKind::System(_))
    }

    /// The variant.
    pub fn kind(&self) -> &InfluenceKind {
        &self.kind
    }

    /// The system variant, if any.
    pub fn as_system(&self) -> Option<&SystemInfluence> {
        match &self.kind {
            InfluenceKind::System(s) => Some(s),
            InfluenceKind::Regular { .. } => None,
        }
    }

    /// The regular payload, if any.
    pub fn payload(&self) -> Option<&Payload> {
        match &self.kind {
            InfluenceKind::Regular { payload, .. } => Some(payload),
            InfluenceKind::System(_) => None,
        }
    }
}

impl fmt::Display for Influence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} {}", self.category(), self.target_level, self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::TimeStamp;

    fn window() -> TimeWindow {
        TimeWindow::new(TimeStamp::new(0), TimeStamp::new(1)).unwrap()
    }

    #[test]
    fn regular_influence_reports_category() {
        let level = LevelId::new("L").unwrap();
        let inf = Influence::regular("INC", level.clone(), window(), Payload::new(1i32));
        assert!(!inf.is_system());
        assert_eq!(inf.category(), "INC");
        assert_eq!(inf.target_level(), &level);
        assert_eq!(inf.payload().unwrap().downcast_ref::<i32>(), Some(&1));
    }

    #[test]
    fn system_influences_are_flagged() {
        let level = LevelId::new("L").unwrap();
        let inf = Influence::remove_agent_from_level(level, window(), AgentId::next());
        assert!(inf.is_system());
        assert_eq!(inf.category(), "system:remove_agent_from_level");
        assert!(inf.payload().is_none());
    }

    #[test]
    fn add_agent_to_level_checks_owner_and_level() {
        let l = LevelId::new("L").unwrap();
        let m = LevelId::new("M").unwrap();
        let a = AgentId::next();
        let b = AgentId::next();
        let public = LocalState::public_of_agent(a, l.clone(), Payload::empty());
        let private_a = LocalState::private_of_agent(a, l.clone(), Payload::empty());
        let private_b = LocalState::private_of_agent(b, l.clone(), Payload::empty());

        assert!(Influence::add_agent_to_level(l.clone(), window(), public.clone(), private_a.clone()).is_ok());
        assert!(Influence::add_agent_to_level(l.clone(), window(), public.clone(), private_b).is_err());
        assert!(Influence::add_agent_to_level(m, window(), public.clone(), private_a.clone()).is_err());
        assert!(Influence::add_agent_to_level(l, window(), private_a, public).is_err());
    }
}
