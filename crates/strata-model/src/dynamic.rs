//! Consistent and transitory dynamic states of a level.
//!
//! A [`ConsistentState`] is the snapshot of a level at the end of its last
//! reaction: the public local states of the environment and of the agents
//! present there, plus the influences that persisted. A
//! [`TransitoryState`] wraps the last consistent state while the level sits
//! between two reactions, and collects the influences produced meanwhile.
//!
//! Public local states are owned here. Agents and the environment keep
//! their private local states; the consistent state is the only holder of
//! public ones once a run is initialized.

use std::sync::Arc;

use indexmap::IndexMap;
use strata_core::{AgentId, LevelId, LocalState, Owner, SimError, TimeStamp, TimeWindow};

use crate::influence::Influence;

// ── Mutator contract ────────────────────────────────────────────

/// Mutators shared by consistent and transitory dynamic states.
///
/// A [`TransitoryState`] only accepts influences. Every other mutator
/// returns [`SimError::ForbiddenOperation`] there: public local states
/// change only through a reaction, which works on the consistent state.
pub trait PublicLocalDynamicState {
    /// The level this state describes.
    fn level(&self) -> &LevelId;

    /// The time of the consistent state, or the lower bound of the
    /// transitory window.
    fn time(&self) -> TimeStamp;

    /// Install or replace the environment's public local state.
    fn set_public_local_state_of_environment(&mut self, state: LocalState)
        -> Result<(), SimError>;

    /// Add (or replace) an agent's public local state.
    fn add_public_local_state_of_agent(&mut self, state: LocalState) -> Result<(), SimError>;

    /// Remove an agent's public local state, returning it.
    fn remove_public_local_state_of_agent(&mut self, agent: AgentId)
        -> Result<LocalState, SimError>;

    /// Append an influence to the system or regular bucket.
    fn add_influence(&mut self, influence: Arc<Influence>) -> Result<(), SimError>;

    /// Replace the state dynamics with shared copies of `influences`.
    fn set_state_dynamics_as_copy_of(&mut self, influences: &[Arc<Influence>])
        -> Result<(), SimError>;

    /// Drop every system influence.
    fn clear_system_influences(&mut self) -> Result<(), SimError>;

    /// Drop every regular influence.
    fn clear_regular_influences(&mut self) -> Result<(), SimError>;
}

fn check_level(expected: &LevelId, actual: &LevelId, what: &str) -> Result<(), SimError> {
    if expected != actual {
        return Err(SimError::invalid(format!(
            "{what} targets level {actual}, expected {expected}"
        )));
    }
    Ok(())
}

// ── ConsistentState ─────────────────────────────────────────────

/// Snapshot of a level at the end of a reaction.
///
/// `Clone` deep-copies the local states and shares the influences.
#[derive(Clone, Debug)]
pub struct ConsistentState {
    level: LevelId,
    time: TimeStamp,
    environment: Option<LocalState>,
    agents: IndexMap<AgentId, LocalState>,
    system: Vec<Arc<Influence>>,
    regular: Vec<Arc<Influence>>,
}

impl ConsistentState {
    /// An empty state of `level` at `time`.
    pub fn new(level: LevelId, time: TimeStamp) -> Self {
        Self {
            level,
            time,
            environment: None,
            agents: IndexMap::new(),
            system: Vec::new(),
            regular: Vec::new(),
        }
    }

    /// Move the state to `time`. Called when a reaction completes.
    pub fn set_time(&mut self, time: TimeStamp) {
        self.time = time;
    }

    /// The environment's public local state, once installed.
    pub fn public_local_state_of_environment(&self) -> Option<&LocalState> {
        self.environment.as_ref()
    }

    /// Mutable access to the environment's public local state.
    pub fn public_local_state_of_environment_mut(&mut self) -> Option<&mut LocalState> {
        self.environment.as_mut()
    }

    /// Public local state of `agent`, if it is present in the level.
    pub fn public_local_state_of_agent(&self, agent: AgentId) -> Option<&LocalState> {
        self.agents.get(&agent)
    }

    /// Mutable access to the public local state of `agent`.
    pub fn public_local_state_of_agent_mut(&mut self, agent: AgentId) -> Option<&mut LocalState> {
        self.agents.get_mut(&agent)
    }

    /// Public local states of the agents present, in arrival order.
    pub fn public_local_states_of_agents(&self) -> impl Iterator<Item = &LocalState> {
        self.agents.values()
    }

    /// Mutable iteration over the agents' public local states.
    pub fn public_local_states_of_agents_mut(&mut self) -> impl Iterator<Item = &mut LocalState> {
        self.agents.values_mut()
    }

    /// Whether `agent` has a public local state here.
    pub fn contains_agent(&self, agent: AgentId) -> bool {
        self.agents.contains_key(&agent)
    }

    /// Number of agents present.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Persisted system influences.
    pub fn system_influences(&self) -> &[Arc<Influence>] {
        &self.system
    }

    /// Persisted regular influences.
    pub fn regular_influences(&self) -> &[Arc<Influence>] {
        &self.regular
    }

    /// System influences followed by regular influences.
    pub fn state_dynamics(&self) -> impl Iterator<Item = &Arc<Influence>> {
        self.system.iter().chain(self.regular.iter())
    }

    /// Drain the persisted system influences.
    pub fn take_system_influences(&mut self) -> Vec<Arc<Influence>> {
        std::mem::take(&mut self.system)
    }

    /// Drain the persisted regular influences.
    pub fn take_regular_influences(&mut self) -> Vec<Arc<Influence>> {
        std::mem::take(&mut self.regular)
    }
}

impl PublicLocalDynamicState for ConsistentState {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn time(&self) -> TimeStamp {
        self.time
    }

    fn set_public_local_state_of_environment(
        &mut self,
        state: LocalState,
    ) -> Result<(), SimError> {
        check_level(&self.level, state.level(), "environment local state")?;
        if state.owner() != Owner::Environment || !state.is_public() {
            return Err(SimError::invalid(
                "expected a public local state of the environment",
            ));
        }
        self.environment = Some(state);
        Ok(())
    }

    fn add_public_local_state_of_agent(&mut self, state: LocalState) -> Result<(), SimError> {
        check_level(&self.level, state.level(), "agent local state")?;
        let agent = match (state.agent(), state.is_public()) {
            (Some(agent), true) => agent,
            _ => {
                return Err(SimError::invalid(
                    "expected a public local state of an agent",
                ))
            }
        };
        self.agents.insert(agent, state);
        Ok(())
    }

    fn remove_public_local_state_of_agent(
        &mut self,
        agent: AgentId,
    ) -> Result<LocalState, SimError> {
        self.agents.shift_remove(&agent).ok_or_else(|| {
            SimError::out_of_range(format!("{agent} is not in level {}", self.level))
        })
    }

    fn add_influence(&mut self, influence: Arc<Influence>) -> Result<(), SimError> {
        check_level(&self.level, influence.target_level(), "influence")?;
        if influence.is_system() {
            self.system.push(influence);
        } else {
            self.regular.push(influence);
        }
        Ok(())
    }

    fn set_state_dynamics_as_copy_of(
        &mut self,
        influences: &[Arc<Influence>],
    ) -> Result<(), SimError> {
        for influence in influences {
            check_level(&self.level, influence.target_level(), "influence")?;
        }
        self.system.clear();
        self.regular.clear();
        for influence in influences {
            if influence.is_system() {
                self.system.push(Arc::clone(influence));
            } else {
                self.regular.push(Arc::clone(influence));
            }
        }
        Ok(())
    }

    fn clear_system_influences(&mut self) -> Result<(), SimError> {
        self.system.clear();
        Ok(())
    }

    fn clear_regular_influences(&mut self) -> Result<(), SimError> {
        self.regular.clear();
        Ok(())
    }
}

// ── TransitoryState ─────────────────────────────────────────────

/// A level between two reactions.
///
/// Holds the last consistent state, the end of the current window
/// (`None` until the engine fixes it, standing for +∞), and the influences
/// produced since the last reaction.
#[derive(Clone, Debug)]
pub struct TransitoryState {
    consistent: ConsistentState,
    time_upper_bound: Option<TimeStamp>,
    system: Vec<Arc<Influence>>,
    regular: Vec<Arc<Influence>>,
}

impl TransitoryState {
    /// Open a transitory phase after `consistent`.
    pub fn new(consistent: ConsistentState) -> Self {
        Self {
            consistent,
            time_upper_bound: None,
            system: Vec::new(),
            regular: Vec::new(),
        }
    }

    /// The last consistent state.
    pub fn last_consistent_state(&self) -> &ConsistentState {
        &self.consistent
    }

    /// Mutable access to the last consistent state, used by reactions.
    pub fn last_consistent_state_mut(&mut self) -> &mut ConsistentState {
        &mut self.consistent
    }

    /// Start of the window: the time of the last consistent state.
    pub fn time_lower_bound(&self) -> TimeStamp {
        self.consistent.time
    }

    /// End of the window; `None` stands for +∞.
    pub fn time_upper_bound(&self) -> Option<TimeStamp> {
        self.time_upper_bound
    }

    /// Fix the end of the window.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] unless `upper` is strictly
    /// after the last consistent time.
    pub fn set_time_upper_bound(&mut self, upper: TimeStamp) -> Result<(), SimError> {
        if upper <= self.consistent.time {
            return Err(SimError::invalid(format!(
                "upper bound {upper} is not after consistent time {}",
                self.consistent.time
            )));
        }
        self.time_upper_bound = Some(upper);
        Ok(())
    }

    /// The window `[lower, upper)`, once the upper bound is fixed.
    pub fn window(&self) -> Option<TimeWindow> {
        self.time_upper_bound
            .and_then(|upper| TimeWindow::new(self.consistent.time, upper).ok())
    }

    /// System influences produced during this phase.
    pub fn system_influences(&self) -> &[Arc<Influence>] {
        &self.system
    }

    /// Regular influences produced during this phase.
    pub fn regular_influences(&self) -> &[Arc<Influence>] {
        &self.regular
    }

    /// The consistent state's dynamics followed by this phase's.
    pub fn state_dynamics(&self) -> impl Iterator<Item = &Arc<Influence>> {
        self.consistent
            .state_dynamics()
            .chain(self.system.iter())
            .chain(self.regular.iter())
    }

    /// Drain this phase's system influences.
    pub fn take_system_influences(&mut self) -> Vec<Arc<Influence>> {
        std::mem::take(&mut self.system)
    }

    /// Drain this phase's regular influences.
    pub fn take_regular_influences(&mut self) -> Vec<Arc<Influence>> {
        std::mem::take(&mut self.regular)
    }

    /// Move every influence of this phase into the consistent state.
    pub fn move_influences_to_consistent_state(&mut self) {
        self.consistent.system.append(&mut self.system);
        self.consistent.regular.append(&mut self.regular);
    }
}

impl PublicLocalDynamicState for TransitoryState {
    fn level(&self) -> &LevelId {
        &self.consistent.level
    }

    fn time(&self) -> TimeStamp {
        self.consistent.time
    }

    fn set_public_local_state_of_environment(
        &mut self,
        _state: LocalState,
    ) -> Result<(), SimError> {
        Err(SimError::ForbiddenOperation {
            operation: "set_public_local_state_of_environment",
        })
    }

    fn add_public_local_state_of_agent(&mut self, _state: LocalState) -> Result<(), SimError> {
        Err(SimError::ForbiddenOperation {
            operation: "add_public_local_state_of_agent",
        })
    }

    fn remove_public_local_state_of_agent(
        &mut self,
        _agent: AgentId,
    ) -> Result<LocalState, SimError> {
        Err(SimError::ForbiddenOperation {
            operation: "remove_public_local_state_of_agent",
        })
    }

    fn add_influence(&mut self, influence: Arc<Influence>) -> Result<(), SimError> {
        check_level(&self.consistent.level, influence.target_level(), "influence")?;
        if influence.is_system() {
            self.system.push(influence);
        } else {
            self.regular.push(influence);
        }
        Ok(())
    }

    fn set_state_dynamics_as_copy_of(
        &mut self,
        _influences: &[Arc<Influence>],
    ) -> Result<(), SimError> {
        Err(SimError::ForbiddenOperation {
            operation: "set_state_dynamics_as_copy_of",
        })
    }

    fn clear_system_influences(&mut self) -> Result<(), SimError> {
        Err(SimError::ForbiddenOperation {
            operation: "clear_system_influences",
        })
    }

    fn clear_regular_influences(&mut self) -> Result<(), SimError> {
        Err(SimError::ForbiddenOperation {
            operation: "clear_regular_influences",
        })
    }
}

// ── Views ───────────────────────────────────────────────────────

/// Read-only view of a level's dynamic state at the current time.
///
/// `Consistent` when the level reacted at the current time, `Transitory`
/// when it sits between two reactions.
#[derive(Clone, Copy, Debug)]
pub enum DynamicStateView<'a> {
    /// The level is in a consistent state.
    Consistent(&'a ConsistentState),
    /// The level is in a transitory phase.
    Transitory(&'a TransitoryState),
}

impl<'a> DynamicStateView<'a> {
    /// The level described.
    pub fn level(&self) -> &'a LevelId {
        &self.consistent_state().level
    }

    /// Whether the level is in a consistent state.
    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent(_))
    }

    /// The time of the last consistent state.
    pub fn time(&self) -> TimeStamp {
        self.consistent_state().time
    }

    /// End of the transitory window, when transitory.
    pub fn time_upper_bound(&self) -> Option<TimeStamp> {
        match self {
            Self::Consistent(_) => None,
            Self::Transitory(t) => t.time_upper_bound(),
        }
    }

    /// The consistent state (the last one, if transitory).
    pub fn consistent_state(&self) -> &'a ConsistentState {
        match *self {
            Self::Consistent(c) => c,
            Self::Transitory(t) => &t.consistent,
        }
    }

    /// The environment's public local state.
    pub fn public_local_state_of_environment(&self) -> Option<&'a LocalState> {
        self.consistent_state().public_local_state_of_environment()
    }

    /// The public local state of `agent`.
    pub fn public_local_state_of_agent(&self, agent: AgentId) -> Option<&'a LocalState> {
        self.consistent_state().public_local_state_of_agent(agent)
    }

    /// Public local states of every agent present.
    pub fn public_local_states_of_agents(&self) -> impl Iterator<Item = &'a LocalState> {
        self.consistent_state().public_local_states_of_agents()
    }

    /// Every influence known to the state.
    pub fn state_dynamics(&self) -> Vec<&'a Arc<Influence>> {
        match *self {
            Self::Consistent(c) => c.state_dynamics().collect(),
            Self::Transitory(t) => t.state_dynamics().collect(),
        }
    }
}

/// Per-level dynamic state views, in level order.
#[derive(Clone, Debug, Default)]
pub struct DynamicStateMap<'a> {
    states: IndexMap<LevelId, DynamicStateView<'a>>,
}

impl<'a> DynamicStateMap<'a> {
    /// An empty map.
    pub fn new() -> Self {
        Self {
            states: IndexMap::new(),
        }
    }

    /// Insert the view of its level.
    pub fn insert(&mut self, view: DynamicStateView<'a>) {
        self.states.insert(view.level().clone(), view);
    }

    /// The view of `level`.
    pub fn get(&self, level: &LevelId) -> Option<&DynamicStateView<'a>> {
        self.states.get(level)
    }

    /// Whether `level` is present.
    pub fn contains(&self, level: &LevelId) -> bool {
        self.states.contains_key(level)
    }

    /// Iterate over the views.
    pub fn iter(&self) -> impl Iterator<Item = (&LevelId, &DynamicStateView<'a>)> {
        self.states.iter()
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// The public local states of one agent, across the levels it is in.
#[derive(Clone, Copy, Debug)]
pub struct AgentPublicStates<'m, 'a> {
    agent: AgentId,
    states: &'m DynamicStateMap<'a>,
}

impl<'m, 'a> AgentPublicStates<'m, 'a> {
    /// Public states of `agent` as found in `states`.
    pub fn new(agent: AgentId, states: &'m DynamicStateMap<'a>) -> Self {
        Self { agent, states }
    }

    /// The agent.
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// The agent's public local state in `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::OutOfRange`] if the agent is not in `level`.
    pub fn get(&self, level: &LevelId) -> Result<&'a LocalState, SimError> {
        self.states
            .get(level)
            .and_then(|view| view.public_local_state_of_agent(self.agent))
            .ok_or_else(|| SimError::out_of_range(format!("{} is not in level {level}", self.agent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Payload;

    fn level(name: &str) -> LevelId {
        LevelId::new(name).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(TimeStamp::new(0), TimeStamp::new(1)).unwrap()
    }

    fn regular(level_name: &str, v: u32) -> Arc<Influence> {
        Arc::new(Influence::regular(
            "R",
            level(level_name),
            window(),
            Payload::new(v),
        ))
    }

    // ── ConsistentState tests ───────────────────────────────────

    #[test]
    fn consistent_rejects_foreign_level() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        let agent = AgentId::next();
        let foreign = LocalState::public_of_agent(agent, level("M"), Payload::empty());
        assert!(matches!(
            cs.add_public_local_state_of_agent(foreign),
            Err(SimError::InvalidArgument { .. })
        ));
        assert!(matches!(
            cs.add_influence(regular("M", 1)),
            Err(SimError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn consistent_routes_influences_by_kind() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        cs.add_influence(regular("L", 1)).unwrap();
        cs.add_influence(Arc::new(Influence::remove_agent(
            level("L"),
            window(),
            AgentId::next(),
        )))
        .unwrap();
        assert_eq!(cs.system_influences().len(), 1);
        assert_eq!(cs.regular_influences().len(), 1);
        // System first.
        assert!(cs.state_dynamics().next().unwrap().is_system());
    }

    #[test]
    fn consistent_agent_states_add_and_remove() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        let agent = AgentId::next();
        cs.add_public_local_state_of_agent(LocalState::public_of_agent(
            agent,
            level("L"),
            Payload::new(5u8),
        ))
        .unwrap();
        assert!(cs.contains_agent(agent));
        let removed = cs.remove_public_local_state_of_agent(agent).unwrap();
        assert_eq!(removed.get::<u8>(), Some(&5));
        assert!(matches!(
            cs.remove_public_local_state_of_agent(agent),
            Err(SimError::OutOfRange { .. })
        ));
    }

    #[test]
    fn private_states_are_not_accepted_as_public() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        let private = LocalState::private_of_agent(AgentId::next(), level("L"), Payload::empty());
        assert!(cs.add_public_local_state_of_agent(private).is_err());
        let env_private = LocalState::private_of_environment(level("L"), Payload::empty());
        assert!(cs.set_public_local_state_of_environment(env_private).is_err());
    }

    #[test]
    fn set_state_dynamics_replaces_content() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        cs.add_influence(regular("L", 1)).unwrap();
        let replacement = vec![regular("L", 2), regular("L", 3)];
        cs.set_state_dynamics_as_copy_of(&replacement).unwrap();
        assert_eq!(cs.regular_influences().len(), 2);
        assert!(Arc::ptr_eq(&cs.regular_influences()[0], &replacement[0]));
        assert!(cs.set_state_dynamics_as_copy_of(&[regular("M", 4)]).is_err());
        // A rejected copy leaves the state untouched.
        assert_eq!(cs.regular_influences().len(), 2);
    }

    #[test]
    fn clone_is_deep_for_local_states() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        cs.set_public_local_state_of_environment(LocalState::public_of_environment(
            level("L"),
            Payload::new(1i64),
        ))
        .unwrap();
        cs.add_influence(regular("L", 1)).unwrap();
        let copy = cs.clone();
        *cs.public_local_state_of_environment_mut()
            .unwrap()
            .get_mut::<i64>()
            .unwrap() = 9;
        assert_eq!(
            copy.public_local_state_of_environment().unwrap().get::<i64>(),
            Some(&1)
        );
        assert!(Arc::ptr_eq(
            &copy.regular_influences()[0],
            &cs.regular_influences()[0]
        ));
    }

    // ── TransitoryState tests ───────────────────────────────────

    #[test]
    fn upper_bound_must_follow_consistent_time() {
        let mut ts = TransitoryState::new(ConsistentState::new(level("L"), TimeStamp::new(4)));
        assert_eq!(ts.time_upper_bound(), None);
        assert!(ts.window().is_none());
        assert!(ts.set_time_upper_bound(TimeStamp::new(4)).is_err());
        ts.set_time_upper_bound(TimeStamp::new(6)).unwrap();
        assert_eq!(
            ts.window(),
            Some(TimeWindow::new(TimeStamp::new(4), TimeStamp::new(6)).unwrap())
        );
    }

    #[test]
    fn transitory_forbids_local_state_mutation() {
        let mut ts = TransitoryState::new(ConsistentState::new(level("L"), TimeStamp::new(0)));
        let ls = LocalState::public_of_agent(AgentId::next(), level("L"), Payload::empty());
        assert!(matches!(
            ts.add_public_local_state_of_agent(ls),
            Err(SimError::ForbiddenOperation { .. })
        ));
        assert!(matches!(
            ts.clear_regular_influences(),
            Err(SimError::ForbiddenOperation { .. })
        ));
        assert!(matches!(
            ts.set_state_dynamics_as_copy_of(&[]),
            Err(SimError::ForbiddenOperation { .. })
        ));
    }

    #[test]
    fn transitory_dynamics_is_union_and_move_drains() {
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        cs.add_influence(regular("L", 1)).unwrap();
        let mut ts = TransitoryState::new(cs);
        ts.add_influence(regular("L", 2)).unwrap();
        assert_eq!(ts.state_dynamics().count(), 2);
        assert_eq!(ts.regular_influences().len(), 1);

        ts.move_influences_to_consistent_state();
        assert!(ts.regular_influences().is_empty());
        assert_eq!(ts.last_consistent_state().regular_influences().len(), 2);
        assert_eq!(ts.state_dynamics().count(), 2);
    }

    // ── View tests ──────────────────────────────────────────────

    #[test]
    fn agent_public_states_lookup() {
        let agent = AgentId::next();
        let mut cs = ConsistentState::new(level("L"), TimeStamp::new(0));
        cs.add_public_local_state_of_agent(LocalState::public_of_agent(
            agent,
            level("L"),
            Payload::new(3u8),
        ))
        .unwrap();
        let ts = TransitoryState::new(ConsistentState::new(level("M"), TimeStamp::new(0)));
        let mut map = DynamicStateMap::new();
        map.insert(DynamicStateView::Consistent(&cs));
        map.insert(DynamicStateView::Transitory(&ts));

        let publics = AgentPublicStates::new(agent, &map);
        assert_eq!(publics.get(&level("L")).unwrap().get::<u8>(), Some(&3));
        assert!(matches!(
            publics.get(&level("M")),
            Err(SimError::OutOfRange { .. })
        ));
        assert!(map.get(&level("L")).unwrap().is_consistent());
        assert!(!map.get(&level("M")).unwrap().is_consistent());
    }
}
