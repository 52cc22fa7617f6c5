//! The simulation-model factory and the read-only view of a running
//! simulation.

use indexmap::IndexMap;
use strata_core::{AgentId, LevelId, ModelError, TimeStamp};

use crate::agent::Agent;
use crate::dynamic::DynamicStateMap;
use crate::environment::Environment;
use crate::influence_map::InfluenceMap;
use crate::level::Level;

/// Read-only access to a simulation, as given to end criteria.
///
/// Implemented by the engine.
pub trait SimulationView {
    /// The time of the last completed tick.
    fn current_time(&self) -> TimeStamp;

    /// Level identifiers, in generation order.
    fn level_ids(&self) -> Vec<LevelId>;

    /// A level by identifier.
    fn level(&self, id: &LevelId) -> Option<&Level>;

    /// The environment, once generated.
    fn environment(&self) -> Option<&Environment>;

    /// An agent by id.
    fn agent(&self, id: AgentId) -> Option<&Agent>;

    /// Ids of every agent, in registration order.
    fn agent_ids(&self) -> Vec<AgentId>;

    /// Ids of the agents living in `level`.
    fn agent_ids_in(&self, level: &LevelId) -> Vec<AgentId>;

    /// Dynamic state of every level at the current time.
    fn dynamic_states(&self) -> DynamicStateMap<'_>;
}

/// The environment generated for a run, plus the influences it starts with.
#[derive(Debug)]
pub struct EnvironmentInitialization {
    /// The environment.
    pub environment: Environment,
    /// Initial state dynamics.
    pub influences: InfluenceMap,
}

impl EnvironmentInitialization {
    /// An environment with no initial influence.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            influences: InfluenceMap::new(),
        }
    }
}

/// The agents generated for a run, plus the influences they start with.
#[derive(Debug, Default)]
pub struct AgentInitialization {
    /// The agents, in registration order.
    pub agents: Vec<Agent>,
    /// Initial state dynamics.
    pub influences: InfluenceMap,
}

impl AgentInitialization {
    /// Agents with no initial influence.
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents,
            influences: InfluenceMap::new(),
        }
    }
}

/// Everything the engine needs to set up and stop a run.
pub trait SimulationModel: Send + Sync {
    /// The time every level starts at.
    fn initial_time(&self) -> TimeStamp;

    /// Whether the run is over at `current`.
    fn is_final_time_or_after(&self, current: TimeStamp, simulation: &dyn SimulationView) -> bool;

    /// Build the levels. Identifiers must be unique.
    fn generate_levels(&self, initial_time: TimeStamp) -> Result<Vec<Level>, ModelError>;

    /// Build the environment, with local states and a natural-action model
    /// for every level in `levels`.
    fn generate_environment(
        &self,
        initial_time: TimeStamp,
        levels: &IndexMap<LevelId, Level>,
    ) -> Result<EnvironmentInitialization, ModelError>;

    /// Build the initial agents.
    fn generate_agents(
        &self,
        initial_time: TimeStamp,
        levels: &IndexMap<LevelId, Level>,
    ) -> Result<AgentInitialization, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::end::{EndCriterion, TimeBasedEndCriterion};

    struct FrozenView(TimeStamp);

    impl SimulationView for FrozenView {
        fn current_time(&self) -> TimeStamp {
            self.0
        }
        fn level_ids(&self) -> Vec<LevelId> {
            Vec::new()
        }
        fn level(&self, _id: &LevelId) -> Option<&Level> {
            None
        }
        fn environment(&self) -> Option<&Environment> {
            None
        }
        fn agent(&self, _id: AgentId) -> Option<&Agent> {
            None
        }
        fn agent_ids(&self) -> Vec<AgentId> {
            Vec::new()
        }
        fn agent_ids_in(&self, _level: &LevelId) -> Vec<AgentId> {
            Vec::new()
        }
        fn dynamic_states(&self) -> DynamicStateMap<'_> {
            DynamicStateMap::new()
        }
    }

    #[test]
    fn time_based_end_is_inclusive() {
        let end = TimeBasedEndCriterion::new(TimeStamp::new(17));
        let view = FrozenView(TimeStamp::new(0));
        assert!(!end.is_final_time_or_after(TimeStamp::new(12), &view));
        assert!(end.is_final_time_or_after(TimeStamp::new(17), &view));
        assert!(end.is_final_time_or_after(TimeStamp::new(20), &view));
    }
}
