//! Passive behaviours: models that do nothing.
//!
//! Useful for agents that only exist to be observed, for levels whose
//! environment has no natural dynamics, and as placeholders in tests.

use std::sync::Arc;

use indexmap::IndexMap;
use strata_core::{GlobalState, LevelId, LocalState, ModelError, PerceivedData, TimeWindow};

use crate::agent::{DecisionModel, PerceptionModel, RevisionModel};
use crate::context::{DecisionContext, NaturalContext};
use crate::dynamic::{AgentPublicStates, ConsistentState, DynamicStateMap};
use crate::environment::NaturalModel;
use crate::influence::Influence;
use crate::influence_map::InfluenceMap;
use crate::reaction::ReactionModel;

/// Perceives nothing.
#[derive(Clone, Debug)]
pub struct EmptyPerceptionModel {
    level: LevelId,
}

impl EmptyPerceptionModel {
    /// A perception model for `level` returning empty perceived data.
    pub fn new(level: LevelId) -> Self {
        Self { level }
    }
}

impl PerceptionModel for EmptyPerceptionModel {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn perceive(
        &self,
        window: TimeWindow,
        _public: &AgentPublicStates<'_, '_>,
        _private: &LocalState,
        _states: &DynamicStateMap<'_>,
    ) -> Result<PerceivedData, ModelError> {
        Ok(PerceivedData::empty(self.level.clone(), window))
    }
}

/// Decides nothing.
#[derive(Clone, Debug)]
pub struct EmptyDecisionModel {
    level: LevelId,
}

impl EmptyDecisionModel {
    /// A decision model for `level` that emits no influence.
    pub fn new(level: LevelId) -> Self {
        Self { level }
    }
}

impl DecisionModel for EmptyDecisionModel {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, _ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Leaves the global state unchanged. The default revision model.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityRevisionModel;

impl RevisionModel for IdentityRevisionModel {
    fn revise(
        &self,
        _window: TimeWindow,
        _perceived: &IndexMap<LevelId, PerceivedData>,
        _global: &mut GlobalState,
    ) -> Result<(), ModelError> {
        Ok(())
    }
}

/// An environment with no natural dynamics at one level.
#[derive(Clone, Debug)]
pub struct EmptyNaturalModel {
    level: LevelId,
}

impl EmptyNaturalModel {
    /// A natural-action model for `level` that emits no influence.
    pub fn new(level: LevelId) -> Self {
        Self { level }
    }

    /// Shared handle, as stored by [`Environment`](crate::Environment).
    pub fn shared(level: LevelId) -> Arc<dyn NaturalModel> {
        Arc::new(Self::new(level))
    }
}

impl NaturalModel for EmptyNaturalModel {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn natural(&self, _ctx: &mut NaturalContext<'_>) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Consumes every influence without changing the state.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassiveReactionModel;

impl ReactionModel for PassiveReactionModel {
    fn make_regular_reaction(
        &self,
        _window: TimeWindow,
        _state: &mut ConsistentState,
        _influences: &[Arc<Influence>],
        _out: &mut InfluenceMap,
    ) -> Result<(), ModelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{AgentId, Payload, TimeStamp};

    #[test]
    fn empty_perception_returns_empty_data_for_window() {
        let level = LevelId::new("L").unwrap();
        let model = EmptyPerceptionModel::new(level.clone());
        let window = TimeWindow::new(TimeStamp::new(3), TimeStamp::new(8)).unwrap();
        let states = DynamicStateMap::new();
        let agent = AgentId::next();
        let private = LocalState::private_of_agent(agent, level.clone(), Payload::empty());
        let data = model
            .perceive(window, &AgentPublicStates::new(agent, &states), &private, &states)
            .unwrap();
        assert!(data.is_empty());
        assert_eq!(data.level(), &level);
        assert_eq!(data.window(), window);
    }

    #[test]
    fn identity_revision_keeps_global_state() {
        let mut global = GlobalState::new(Payload::new(4i32));
        let window = TimeWindow::new(TimeStamp::new(0), TimeStamp::new(1)).unwrap();
        IdentityRevisionModel
            .revise(window, &IndexMap::new(), &mut global)
            .unwrap();
        assert_eq!(global.get::<i32>(), Some(&4));
    }
}
