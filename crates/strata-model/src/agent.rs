//! Agents and their per-level behaviour models.
//!
//! An [`Agent`] is a category-tagged bundle of state (one global state,
//! one private local state per level it inhabits) and behaviour (a
//! perception and a decision model per level, one cross-level revision
//! model). Public local states are handed over to the levels' consistent
//! states when the agent is installed; until then the agent stages them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rand_chacha::ChaCha8Rng;
use strata_core::{
    AgentCategory, AgentId, GlobalState, LevelId, LocalState, ModelError, PerceivedData, SimError,
    TimeWindow, Visibility,
};

use crate::behavior::{EmptyDecisionModel, EmptyPerceptionModel, IdentityRevisionModel};
use crate::context::DecisionContext;
use crate::dynamic::{AgentPublicStates, DynamicStateMap};
use crate::influence_map::InfluenceMap;

// ── Behaviour models ────────────────────────────────────────────

/// Builds what an agent perceives of the world at one level.
///
/// Implementations may read any public local state and the dynamic-state
/// map but must not mutate them. They run concurrently across agents in
/// the parallel engine.
pub trait PerceptionModel: Send + Sync {
    /// The level this model perceives.
    fn level(&self) -> &LevelId;

    /// Perceive the level during `window`.
    ///
    /// `public` resolves the agent's own public local states; `private` is
    /// the agent's private local state at [`level`](Self::level).
    fn perceive(
        &self,
        window: TimeWindow,
        public: &AgentPublicStates<'_, '_>,
        private: &LocalState,
        states: &DynamicStateMap<'_>,
    ) -> Result<PerceivedData, ModelError>;
}

/// Turns perceived data into influences at one level.
pub trait DecisionModel: Send + Sync {
    /// The level this model decides for.
    fn level(&self) -> &LevelId;

    /// Emit influences through `ctx`.
    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError>;
}

/// Updates an agent's global state from everything it perceived this tick.
pub trait RevisionModel: Send + Sync {
    /// Revise `global` given the latest perceived data of every level.
    fn revise(
        &self,
        window: TimeWindow,
        perceived: &IndexMap<LevelId, PerceivedData>,
        global: &mut GlobalState,
    ) -> Result<(), ModelError>;
}

// ── Agent ───────────────────────────────────────────────────────

/// A participant of the simulation.
///
/// `Clone` keeps the [`AgentId`]: a clone stands for the same agent in a
/// cloned engine. Build a fresh agent with [`Agent::new`] to get a new id.
#[derive(Clone)]
pub struct Agent {
    id: AgentId,
    category: AgentCategory,
    global_state: GlobalState,
    staged_public: IndexMap<LevelId, LocalState>,
    private: IndexMap<LevelId, LocalState>,
    perceived: IndexMap<LevelId, PerceivedData>,
    perception: IndexMap<LevelId, Arc<dyn PerceptionModel>>,
    decision: IndexMap<LevelId, Arc<dyn DecisionModel>>,
    revision: Arc<dyn RevisionModel>,
}

impl Agent {
    /// Create an agent of `category` with a fresh id, an empty global
    /// state, no level, and the identity revision model.
    pub fn new(category: AgentCategory) -> Self {
        Self {
            id: AgentId::next(),
            category,
            global_state: GlobalState::default(),
            staged_public: IndexMap::new(),
            private: IndexMap::new(),
            perceived: IndexMap::new(),
            perception: IndexMap::new(),
            decision: IndexMap::new(),
            revision: Arc::new(IdentityRevisionModel),
        }
    }

    /// The agent's id.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The agent's category.
    pub fn category(&self) -> &AgentCategory {
        &self.category
    }

    /// Replace the global state.
    pub fn initialize_global_state(&mut self, global: GlobalState) {
        self.global_state = global;
    }

    /// The global state.
    pub fn global_state(&self) -> &GlobalState {
        &self.global_state
    }

    /// Mutable access to the global state.
    pub fn global_state_mut(&mut self) -> &mut GlobalState {
        &mut self.global_state
    }

    /// Declare that the agent lives in `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if either state is not owned by
    /// this agent, does not describe `level`, or has the wrong visibility.
    pub fn include_new_level(
        &mut self,
        level: LevelId,
        public: LocalState,
        private: LocalState,
    ) -> Result<(), SimError> {
        self.check_local_state(&level, &public, Visibility::Public)?;
        self.check_local_state(&level, &private, Visibility::Private)?;
        self.staged_public.insert(level.clone(), public);
        self.private.insert(level, private);
        Ok(())
    }

    /// Install the perception and decision models of `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if a model reports another
    /// level.
    pub fn specify_behavior_for_level(
        &mut self,
        level: LevelId,
        perception: Arc<dyn PerceptionModel>,
        decision: Arc<dyn DecisionModel>,
    ) -> Result<(), SimError> {
        if perception.level() != &level {
            return Err(SimError::invalid(format!(
                "perception model of level {} installed for level {level}",
                perception.level()
            )));
        }
        if decision.level() != &level {
            return Err(SimError::invalid(format!(
                "decision model of level {} installed for level {level}",
                decision.level()
            )));
        }
        self.perception.insert(level.clone(), perception);
        self.decision.insert(level, decision);
        Ok(())
    }

    /// Install the global-state revision model.
    pub fn specify_global_state_revision_model(&mut self, revision: Arc<dyn RevisionModel>) {
        self.revision = revision;
    }

    /// Declare `level` with empty perception and decision models.
    ///
    /// # Errors
    ///
    /// See [`include_new_level`](Self::include_new_level).
    pub fn add_passive_level(
        &mut self,
        level: LevelId,
        public: LocalState,
        private: LocalState,
    ) -> Result<(), SimError> {
        self.include_new_level(level.clone(), public, private)?;
        self.specify_behavior_for_level(
            level.clone(),
            Arc::new(EmptyPerceptionModel::new(level.clone())),
            Arc::new(EmptyDecisionModel::new(level)),
        )
    }

    fn check_local_state(
        &self,
        level: &LevelId,
        state: &LocalState,
        visibility: Visibility,
    ) -> Result<(), SimError> {
        if !state.is_owned_by(self.id) {
            return Err(SimError::invalid(format!(
                "local state owned by {} given to {}",
                state.owner(),
                self.id
            )));
        }
        if state.level() != level {
            return Err(SimError::invalid(format!(
                "local state of level {} given for level {level}",
                state.level()
            )));
        }
        if state.visibility() != visibility {
            return Err(SimError::invalid(format!(
                "expected a {visibility:?} local state"
            )));
        }
        Ok(())
    }

    // ── Levels and local states ─────────────────────────────────

    /// Levels the agent lives in, in declaration order.
    pub fn levels(&self) -> impl Iterator<Item = &LevelId> {
        self.private.keys()
    }

    /// Whether the agent lives in `level`.
    pub fn is_declared_in(&self, level: &LevelId) -> bool {
        self.private.contains_key(level)
    }

    /// The private local state of `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::OutOfRange`] if the agent is not in `level`.
    pub fn private_local_state(&self, level: &LevelId) -> Result<&LocalState, SimError> {
        self.private
            .get(level)
            .ok_or_else(|| SimError::out_of_range(format!("{} is not in level {level}", self.id)))
    }

    /// Mutable access to the private local state of `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::OutOfRange`] if the agent is not in `level`.
    pub fn private_local_state_mut(&mut self, level: &LevelId) -> Result<&mut LocalState, SimError> {
        let id = self.id;
        self.private
            .get_mut(level)
            .ok_or_else(|| SimError::out_of_range(format!("{id} is not in level {level}")))
    }

    /// A public local state not yet handed to its level.
    pub fn staged_public_local_state(&self, level: &LevelId) -> Option<&LocalState> {
        self.staged_public.get(level)
    }

    /// Hand every staged public local state over, in declaration order.
    pub fn take_staged_public_local_states(&mut self) -> Vec<LocalState> {
        self.staged_public.drain(..).map(|(_, state)| state).collect()
    }

    /// Attach the agent to a new level after installation.
    ///
    /// Only the private state is kept; the public one belongs to the
    /// level's consistent state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if `private` is not this
    /// agent's private state.
    pub fn attach_level(&mut self, private: LocalState) -> Result<(), SimError> {
        let level = private.level().clone();
        self.check_local_state(&level, &private, Visibility::Private)?;
        self.private.insert(level, private);
        Ok(())
    }

    /// Detach the agent from `level`, returning its private local state.
    pub fn detach_level(&mut self, level: &LevelId) -> Option<LocalState> {
        self.perceived.shift_remove(level);
        self.staged_public.shift_remove(level);
        self.private.shift_remove(level)
    }

    /// Last perceived data of `level`.
    pub fn perceived_data(&self, level: &LevelId) -> Option<&PerceivedData> {
        self.perceived.get(level)
    }

    /// Last perceived data of every level.
    pub fn perceived_data_map(&self) -> &IndexMap<LevelId, PerceivedData> {
        &self.perceived
    }

    // ── Behaviour ───────────────────────────────────────────────

    /// Perceive `level` and store the result.
    ///
    /// # Errors
    ///
    /// [`SimError::OutOfRange`] if no perception model is installed for
    /// `level` or the agent is not there, or whatever the model returns.
    pub fn perceive(
        &mut self,
        level: &LevelId,
        window: TimeWindow,
        states: &DynamicStateMap<'_>,
    ) -> Result<(), ModelError> {
        let model = self.perception.get(level).ok_or_else(|| {
            SimError::out_of_range(format!("{} has no perception model for level {level}", self.id))
        })?;
        let private = self.private_local_state(level)?;
        let public = AgentPublicStates::new(self.id, states);
        let data = model.perceive(window, &public, private, states)?;
        self.perceived.insert(level.clone(), data);
        Ok(())
    }

    /// Revise the global state from the perceived data of every level.
    pub fn revise_global_state(&mut self, window: TimeWindow) -> Result<(), ModelError> {
        self.revision
            .revise(window, &self.perceived, &mut self.global_state)
    }

    /// Decide at `level`, appending influences to `out`.
    ///
    /// `public` is the agent's public local state at `level`, read from the
    /// level's consistent state.
    ///
    /// # Errors
    ///
    /// [`SimError::OutOfRange`] if no decision model is installed for
    /// `level` or the agent is not there, or whatever the model returns.
    pub fn decide(
        &mut self,
        level: &LevelId,
        window: TimeWindow,
        public: &LocalState,
        out: &mut InfluenceMap,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), ModelError> {
        let id = self.id;
        let model = self.decision.get(level).ok_or_else(|| {
            SimError::out_of_range(format!("{id} has no decision model for level {level}"))
        })?;
        let private = self
            .private
            .get_mut(level)
            .ok_or_else(|| SimError::out_of_range(format!("{id} is not in level {level}")))?;
        let fallback;
        let perceived = match self.perceived.get(level) {
            Some(data) => data,
            None => {
                fallback = PerceivedData::empty(level.clone(), window);
                &fallback
            }
        };
        let mut ctx = DecisionContext::new(
            level,
            window,
            id,
            &self.global_state,
            public,
            private,
            perceived,
            out,
            rng,
        );
        model.decide(&mut ctx)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("levels", &self.private.keys().collect::<Vec<_>>())
            .field("global_state", &self.global_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{ConsistentState, DynamicStateView, PublicLocalDynamicState};
    use crate::influence::Influence;
    use rand::SeedableRng;
    use strata_core::{Payload, TimeStamp};

    fn level(name: &str) -> LevelId {
        LevelId::new(name).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(TimeStamp::new(0), TimeStamp::new(1)).unwrap()
    }

    fn agent_in(name: &str) -> Agent {
        let mut agent = Agent::new(AgentCategory::new("test").unwrap());
        let id = agent.id();
        agent
            .add_passive_level(
                level(name),
                LocalState::public_of_agent(id, level(name), Payload::new(1u8)),
                LocalState::private_of_agent(id, level(name), Payload::new(2u8)),
            )
            .unwrap();
        agent
    }

    struct CountingPerception(LevelId);

    impl PerceptionModel for CountingPerception {
        fn level(&self) -> &LevelId {
            &self.0
        }

        fn perceive(
            &self,
            window: TimeWindow,
            public: &AgentPublicStates<'_, '_>,
            _private: &LocalState,
            states: &DynamicStateMap<'_>,
        ) -> Result<PerceivedData, ModelError> {
            let own = public.get(&self.0)?;
            let count = states
                .get(&self.0)
                .map_or(0, |s| s.public_local_states_of_agents().count());
            Ok(PerceivedData::new(
                self.0.clone(),
                window,
                Payload::new((count, *own.get::<u8>().unwrap())),
            ))
        }
    }

    struct EchoDecision(LevelId);

    impl DecisionModel for EchoDecision {
        fn level(&self) -> &LevelId {
            &self.0
        }

        fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
            let (count, _) = *ctx.perceived_data().get::<(usize, u8)>().unwrap();
            let target = ctx.level().clone();
            let window = ctx.window();
            ctx.emit(Influence::regular("ECHO", target, window, Payload::new(count)));
            Ok(())
        }
    }

    #[test]
    fn include_new_level_checks_ownership_and_level() {
        let mut agent = Agent::new(AgentCategory::new("a").unwrap());
        let other = AgentId::next();
        let id = agent.id();
        let err = agent.include_new_level(
            level("L"),
            LocalState::public_of_agent(other, level("L"), Payload::empty()),
            LocalState::private_of_agent(id, level("L"), Payload::empty()),
        );
        assert!(matches!(err, Err(SimError::InvalidArgument { .. })));
        let err = agent.include_new_level(
            level("L"),
            LocalState::public_of_agent(id, level("M"), Payload::empty()),
            LocalState::private_of_agent(id, level("L"), Payload::empty()),
        );
        assert!(matches!(err, Err(SimError::InvalidArgument { .. })));
        assert!(!agent.is_declared_in(&level("L")));
    }

    #[test]
    fn behavior_level_must_match() {
        let mut agent = Agent::new(AgentCategory::new("a").unwrap());
        let err = agent.specify_behavior_for_level(
            level("L"),
            Arc::new(EmptyPerceptionModel::new(level("M"))),
            Arc::new(EmptyDecisionModel::new(level("L"))),
        );
        assert!(matches!(err, Err(SimError::InvalidArgument { .. })));
    }

    #[test]
    fn missing_perception_model_is_out_of_range() {
        let mut agent = Agent::new(AgentCategory::new("a").unwrap());
        let map = DynamicStateMap::new();
        let err = agent.perceive(&level("L"), window(), &map).unwrap_err();
        assert!(matches!(err, ModelError::Sim(SimError::OutOfRange { .. })));
    }

    #[test]
    fn perceive_then_decide_uses_installed_public_state() {
        let mut agent = agent_in("L");
        agent
            .specify_behavior_for_level(
                level("L"),
                Arc::new(CountingPerception(level("L"))),
                Arc::new(EchoDecision(level("L"))),
            )
            .unwrap();

        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        for public in agent.take_staged_public_local_states() {
            cs.add_public_local_state_of_agent(public).unwrap();
        }
        assert!(agent.staged_public_local_state(&level("L")).is_none());

        let mut map = DynamicStateMap::new();
        map.insert(DynamicStateView::Consistent(&cs));
        agent.perceive(&level("L"), window(), &map).unwrap();
        assert_eq!(
            agent.perceived_data(&level("L")).unwrap().get::<(usize, u8)>(),
            Some(&(1, 1))
        );

        let mut out = InfluenceMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let public = cs.public_local_state_of_agent(agent.id()).unwrap();
        agent
            .decide(&level("L"), window(), public, &mut out, &mut rng)
            .unwrap();
        let emitted = out.get_for_level(&level("L"));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].payload().unwrap().downcast_ref::<usize>(), Some(&1));
    }

    #[test]
    fn detach_level_drops_private_state() {
        let mut agent = agent_in("L");
        let private = agent.detach_level(&level("L")).unwrap();
        assert_eq!(private.get::<u8>(), Some(&2));
        assert!(!agent.is_declared_in(&level("L")));
        assert!(matches!(
            agent.private_local_state(&level("L")),
            Err(SimError::OutOfRange { .. })
        ));
    }

    #[test]
    fn clone_keeps_identity() {
        let agent = agent_in("L");
        let copy = agent.clone();
        assert_eq!(agent.id(), copy.id());
        assert_ne!(agent.id(), agent_in("L").id());
    }
}
