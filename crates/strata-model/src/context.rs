//! Execution contexts handed to decision and natural-action models.
//!
//! Both contexts split their borrows the same way: read access to
//! everything the model may consult, mutable access to state the model
//! owns (the private local state), and an output [`InfluenceMap`] the
//! engine merges once the phase completes. Each context also carries the
//! generator derived for this model call; models must draw randomness from
//! it and nowhere else for runs to stay reproducible.

use rand_chacha::ChaCha8Rng;
use strata_core::{AgentId, GlobalState, LevelId, LocalState, PerceivedData, TimeWindow};

use crate::dynamic::DynamicStateMap;
use crate::influence::Influence;
use crate::influence_map::InfluenceMap;

/// Context of one agent's decision at one level.
pub struct DecisionContext<'a> {
    level: &'a LevelId,
    window: TimeWindow,
    agent: AgentId,
    global: &'a GlobalState,
    public: &'a LocalState,
    private: &'a mut LocalState,
    perceived: &'a PerceivedData,
    influences: &'a mut InfluenceMap,
    rng: &'a mut ChaCha8Rng,
}

impl<'a> DecisionContext<'a> {
    /// Construct a decision context.
    ///
    /// Typically called by the engine through [`Agent::decide`](crate::Agent::decide).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        level: &'a LevelId,
        window: TimeWindow,
        agent: AgentId,
        global: &'a GlobalState,
        public: &'a LocalState,
        private: &'a mut LocalState,
        perceived: &'a PerceivedData,
        influences: &'a mut InfluenceMap,
        rng: &'a mut ChaCha8Rng,
    ) -> Self {
        Self {
            level,
            window,
            agent,
            global,
            public,
            private,
            perceived,
            influences,
            rng,
        }
    }

    /// The level the decision is made for.
    pub fn level(&self) -> &LevelId {
        self.level
    }

    /// The transitory window `[t, t')`.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// The deciding agent.
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// The agent's global state, as revised this tick.
    pub fn global_state(&self) -> &GlobalState {
        self.global
    }

    /// The agent's public local state at this level.
    pub fn public_local_state(&self) -> &LocalState {
        self.public
    }

    /// The agent's private local state at this level.
    pub fn private_local_state(&self) -> &LocalState {
        self.private
    }

    /// Mutable access to the agent's private local state.
    pub fn private_local_state_mut(&mut self) -> &mut LocalState {
        self.private
    }

    /// What the agent perceived at this level this tick.
    pub fn perceived_data(&self) -> &PerceivedData {
        self.perceived
    }

    /// Emit an influence.
    pub fn emit(&mut self, influence: Influence) {
        self.influences.add(influence);
    }

    /// The influences emitted so far by this decision.
    pub fn influences(&self) -> &InfluenceMap {
        self.influences
    }

    /// Generator derived for this agent, level and tick.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.rng
    }
}

/// Context of the environment's natural action at one level.
pub struct NaturalContext<'a> {
    level: &'a LevelId,
    window: TimeWindow,
    states: &'a DynamicStateMap<'a>,
    public: &'a LocalState,
    private: &'a mut LocalState,
    influences: &'a mut InfluenceMap,
    rng: &'a mut ChaCha8Rng,
}

impl<'a> NaturalContext<'a> {
    /// Construct a natural-action context.
    pub fn new(
        level: &'a LevelId,
        window: TimeWindow,
        states: &'a DynamicStateMap<'a>,
        public: &'a LocalState,
        private: &'a mut LocalState,
        influences: &'a mut InfluenceMap,
        rng: &'a mut ChaCha8Rng,
    ) -> Self {
        Self {
            level,
            window,
            states,
            public,
            private,
            influences,
            rng,
        }
    }

    /// The level acted on.
    pub fn level(&self) -> &LevelId {
        self.level
    }

    /// The transitory window `[t, t')`.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Dynamic states of every level.
    pub fn dynamic_states(&self) -> &DynamicStateMap<'a> {
        self.states
    }

    /// The environment's public local state at this level.
    pub fn public_local_state(&self) -> &LocalState {
        self.public
    }

    /// The environment's private local state at this level.
    pub fn private_local_state(&self) -> &LocalState {
        self.private
    }

    /// Mutable access to the environment's private local state.
    pub fn private_local_state_mut(&mut self) -> &mut LocalState {
        self.private
    }

    /// Emit an influence.
    pub fn emit(&mut self, influence: Influence) {
        self.influences.add(influence);
    }

    /// Generator derived for this level and tick.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use strata_core::{Payload, TimeStamp};

    #[test]
    fn decision_context_collects_influences() {
        let level = LevelId::new("L").unwrap();
        let window = TimeWindow::new(TimeStamp::new(0), TimeStamp::new(1)).unwrap();
        let agent = AgentId::next();
        let global = GlobalState::new(Payload::new(7u32));
        let public = LocalState::public_of_agent(agent, level.clone(), Payload::empty());
        let mut private = LocalState::private_of_agent(agent, level.clone(), Payload::new(0u32));
        let perceived = PerceivedData::empty(level.clone(), window);
        let mut out = InfluenceMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut ctx = DecisionContext::new(
            &level,
            window,
            agent,
            &global,
            &public,
            &mut private,
            &perceived,
            &mut out,
            &mut rng,
        );
        assert_eq!(ctx.global_state().get::<u32>(), Some(&7));
        *ctx.private_local_state_mut().get_mut::<u32>().unwrap() += 1;
        let _: u64 = ctx.rng().gen();
        ctx.emit(Influence::regular("X", level.clone(), window, Payload::empty()));
        assert_eq!(ctx.influences().len(), 1);

        assert_eq!(private.get::<u32>(), Some(&1));
        assert_eq!(out.get_for_level(&level).len(), 1);
    }
}
