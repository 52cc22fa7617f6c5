//! Test utilities and mock types for Strata development.
//!
//! Provides a configurable [`TestModel`] (periodic counter levels, an
//! environment with one `i64` counter per level, agents with a chosen
//! [`Behaviour`] that perceive which levels they can see), a [`RecordingProbe`] that keeps every callback it
//! receives, and a [`fingerprint`] of an engine's consistent states for
//! determinism checks.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use strata_core::{
    AgentCategory, LevelId, LocalState, ModelError, Payload, TimeStamp, TimeWindow,
};
use strata_engine::{Engine, EngineError, Probe, ProbeError};
use strata_model::{
    Agent, AgentInitialization, DecisionModel, EmptyDecisionModel, EmptyNaturalModel,
    EndCriterion, Environment, EnvironmentInitialization, Level,
    PeriodicTimeModel, PublicLocalDynamicState, SimulationModel, SimulationView,
    TimeBasedEndCriterion,
};

use crate::fixtures::{
    CounterReaction, FailingDecision, IncrementDecision, JoiningDecision, LeavingDecision,
    RandomWalkDecision, RejoiningDecision, RemoteIncrementDecision, SightPerception,
    SpawningDecision, VanishingDecision,
};

/// A level identifier from a literal name.
pub fn level_id(name: &str) -> LevelId {
    LevelId::new(name).expect("level names used in tests are not empty")
}

/// The counter of `level` in `engine`'s consistent state.
pub fn counter(engine: &Engine, level: &LevelId) -> Option<i64> {
    engine
        .level(level)?
        .consistent_state()
        .public_local_state_of_environment()?
        .get::<i64>()
        .copied()
}

/// Render the consistent state of every level: time, environment counter,
/// agents' public and private data (by arrival order, not id) and the
/// number of influences kept for the next tick.
///
/// Two engines running the same model from the same seed produce equal
/// fingerprints even though their agents carry different ids.
pub fn fingerprint(engine: &Engine) -> String {
    let mut out = String::new();
    for level in engine.levels() {
        let state = level.consistent_state();
        let _ = write!(out, "{}@{}", level.id(), state.time());
        if let Some(environment) = state.public_local_state_of_environment() {
            let _ = write!(out, " env={:?}", environment.data());
        }
        for (ordinal, agent) in engine.agents_in(level.id()).enumerate() {
            let public = state
                .public_local_state_of_agent(agent.id())
                .map(|s| format!("{:?}", s.data()))
                .unwrap_or_default();
            let private = agent
                .private_local_state(level.id())
                .map(|s| format!("{:?}", s.data()))
                .unwrap_or_default();
            let _ = write!(out, " a{ordinal}={public}/{private}");
        }
        let _ = writeln!(out, " kept={}", state.state_dynamics().count());
    }
    out
}

// ── TestModel ──────────────────────────────────────────────────────

/// What an agent does at its home level (the first level it lives in).
/// Every other level it lives in is passive.
#[derive(Clone, Debug)]
pub enum Behaviour {
    /// Perceives and decides nothing.
    Passive,
    /// `INC(1)` every tick.
    Increment,
    /// Random walk of a private position, reported as `INC(step)`.
    RandomWalk,
    /// `INC(1)` plus `RemoveAgentFromLevel(self)` in the tick ending at
    /// the given time.
    Leave(TimeStamp),
    /// Leaves the given level in the tick ending at the first time and
    /// rejoins it in the tick ending at the second.
    Rejoin(LevelId, TimeStamp, TimeStamp),
    /// `RemoveAgent(self)` in the tick ending at the given time.
    Vanish(TimeStamp),
    /// Spawns a passive agent in the tick ending at the given time.
    Spawn(TimeStamp),
    /// Joins the given level in the tick ending at the given time.
    Join(LevelId, TimeStamp),
    /// `INC(1)` at the given level every tick.
    RemoteIncrement(LevelId),
    /// Fails in every tick ending at or after the given time.
    FailFrom(TimeStamp),
}

impl Behaviour {
    fn decision(&self, level: &LevelId) -> Arc<dyn DecisionModel> {
        let level = level.clone();
        match self {
            Self::Passive => Arc::new(EmptyDecisionModel::new(level)),
            Self::Increment => Arc::new(IncrementDecision::new(level)),
            Self::RandomWalk => Arc::new(RandomWalkDecision::new(level)),
            Self::Leave(at) => Arc::new(LeavingDecision::new(level, *at)),
            Self::Rejoin(target, leave, back) => Arc::new(RejoiningDecision::new(
                level,
                target.clone(),
                *leave,
                *back,
            )),
            Self::Vanish(at) => Arc::new(VanishingDecision::new(level, *at)),
            Self::Spawn(at) => Arc::new(SpawningDecision::new(level, *at)),
            Self::Join(target, at) => Arc::new(JoiningDecision::new(level, target.clone(), *at)),
            Self::RemoteIncrement(target) => {
                Arc::new(RemoteIncrementDecision::new(level, target.clone()))
            }
            Self::FailFrom(from) => Arc::new(FailingDecision::new(level, *from)),
        }
    }
}

#[derive(Clone, Debug)]
struct LevelSpec {
    id: LevelId,
    period: i64,
    phase: i64,
    perceptible: Vec<LevelId>,
    influenceable: Vec<LevelId>,
}

#[derive(Clone, Debug)]
struct AgentSpec {
    count: usize,
    levels: Vec<LevelId>,
    behaviour: Behaviour,
}

/// A [`SimulationModel`] assembled from periodic counter levels and
/// agents with fixed behaviours. Stops at a fixed final time.
#[derive(Clone, Debug)]
pub struct TestModel {
    initial: TimeStamp,
    end: TimeBasedEndCriterion,
    levels: Vec<LevelSpec>,
    agents: Vec<AgentSpec>,
    initial_increments: Vec<(LevelId, i64)>,
}

impl TestModel {
    /// A model starting at 0 and stopping at `final_time`.
    pub fn new(final_time: i64) -> Self {
        Self {
            initial: TimeStamp::new(0),
            end: TimeBasedEndCriterion::new(TimeStamp::new(final_time)),
            levels: Vec::new(),
            agents: Vec::new(),
            initial_increments: Vec::new(),
        }
    }

    /// Start at `initial` instead of 0.
    pub fn starting_at(mut self, initial: i64) -> Self {
        self.initial = TimeStamp::new(initial);
        self
    }

    /// Add a counter level ticking with `period` after a first step of
    /// `phase`.
    pub fn with_level(mut self, name: &str, period: i64, phase: i64) -> Self {
        self.levels.push(LevelSpec {
            id: level_id(name),
            period,
            phase,
            perceptible: Vec::new(),
            influenceable: Vec::new(),
        });
        self
    }

    /// Let `from` perceive and influence `to`. `from` must already be
    /// added.
    pub fn with_influence(mut self, from: &str, to: &str) -> Self {
        let from = level_id(from);
        if let Some(spec) = self.levels.iter_mut().find(|spec| spec.id == from) {
            spec.perceptible.push(level_id(to));
            spec.influenceable.push(level_id(to));
        }
        self
    }

    /// Let `from` perceive `to` without influencing it. `from` must
    /// already be added.
    pub fn with_perception(mut self, from: &str, to: &str) -> Self {
        let from = level_id(from);
        if let Some(spec) = self.levels.iter_mut().find(|spec| spec.id == from) {
            spec.perceptible.push(level_id(to));
        }
        self
    }

    /// Start `level` with an `INC(delta)` already in its state dynamics.
    pub fn with_initial_increment(mut self, level: &str, delta: i64) -> Self {
        self.initial_increments.push((level_id(level), delta));
        self
    }

    /// Add `count` agents living in `levels`.
    pub fn with_agents(mut self, count: usize, levels: &[&str], behaviour: Behaviour) -> Self {
        self.agents.push(AgentSpec {
            count,
            levels: levels.iter().map(|name| level_id(name)).collect(),
            behaviour,
        });
        self
    }

    /// Shared, ready to hand to an engine.
    pub fn shared(self) -> Arc<dyn SimulationModel> {
        Arc::new(self)
    }

    fn build_agent(spec: &AgentSpec) -> Result<Agent, ModelError> {
        let mut agent = Agent::new(AgentCategory::new("test")?);
        let id = agent.id();
        for (position, level) in spec.levels.iter().enumerate() {
            agent.include_new_level(
                level.clone(),
                LocalState::public_of_agent(id, level.clone(), Payload::new(0i64)),
                LocalState::private_of_agent(id, level.clone(), Payload::new(0i64)),
            )?;
            let decision = if position == 0 {
                spec.behaviour.decision(level)
            } else {
                Arc::new(EmptyDecisionModel::new(level.clone()))
            };
            agent.specify_behavior_for_level(
                level.clone(),
                Arc::new(SightPerception::new(level.clone())),
                decision,
            )?;
        }
        // A joined level needs behaviour before the agent arrives there.
        if let Behaviour::Join(target, _) = &spec.behaviour {
            agent.specify_behavior_for_level(
                target.clone(),
                Arc::new(SightPerception::new(target.clone())),
                Arc::new(EmptyDecisionModel::new(target.clone())),
            )?;
        }
        Ok(agent)
    }
}

impl SimulationModel for TestModel {
    fn initial_time(&self) -> TimeStamp {
        self.initial
    }

    fn is_final_time_or_after(&self, current: TimeStamp, simulation: &dyn SimulationView) -> bool {
        self.end.is_final_time_or_after(current, simulation)
    }

    fn generate_levels(&self, initial_time: TimeStamp) -> Result<Vec<Level>, ModelError> {
        let mut levels = Vec::with_capacity(self.levels.len());
        for spec in &self.levels {
            let time_model = PeriodicTimeModel::new(spec.period, spec.phase, initial_time)?;
            let mut level = Level::new(
                spec.id.clone(),
                initial_time,
                Arc::new(time_model),
                Arc::new(CounterReaction),
            );
            for target in &spec.perceptible {
                level.add_perceptible_level(target.clone());
            }
            for target in &spec.influenceable {
                level.add_influenceable_level(target.clone());
            }
            levels.push(level);
        }
        Ok(levels)
    }

    fn generate_environment(
        &self,
        initial_time: TimeStamp,
        levels: &IndexMap<LevelId, Level>,
    ) -> Result<EnvironmentInitialization, ModelError> {
        let mut environment = Environment::new();
        for id in levels.keys() {
            environment.include_new_level(
                id.clone(),
                LocalState::public_of_environment(id.clone(), Payload::new(0i64)),
                LocalState::private_of_environment(id.clone(), Payload::empty()),
            )?;
            environment.specify_behavior_for_level(id.clone(), EmptyNaturalModel::shared(id.clone()))?;
        }
        let mut initialization = EnvironmentInitialization::new(environment);
        let window = TimeWindow::new(initial_time, initial_time.shift(1)?)?;
        for (level, delta) in &self.initial_increments {
            initialization
                .influences
                .add(fixtures::inc(level.clone(), window, *delta));
        }
        Ok(initialization)
    }

    fn generate_agents(
        &self,
        _initial_time: TimeStamp,
        _levels: &IndexMap<LevelId, Level>,
    ) -> Result<AgentInitialization, ModelError> {
        let mut agents = Vec::new();
        for spec in &self.agents {
            for _ in 0..spec.count {
                agents.push(Self::build_agent(spec)?);
            }
        }
        Ok(AgentInitialization::new(agents))
    }
}

// ── Probes ─────────────────────────────────────────────────────────

/// One probe callback as seen by a [`RecordingProbe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeCall {
    pub callback: &'static str,
    pub time: Option<TimeStamp>,
}

/// Records every callback, plus a [`fingerprint`] at the initial time and
/// after each tick.
#[derive(Debug, Default)]
pub struct RecordingProbe {
    calls: Mutex<Vec<ProbeCall>>,
    fingerprints: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, callback: &'static str, time: Option<TimeStamp>) {
        self.calls
            .lock()
            .expect("recording probe mutex poisoned")
            .push(ProbeCall { callback, time });
    }

    fn snapshot(&self, engine: &Engine) {
        self.fingerprints
            .lock()
            .expect("recording probe mutex poisoned")
            .push(fingerprint(engine));
    }

    /// Every call, in order.
    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls
            .lock()
            .expect("recording probe mutex poisoned")
            .clone()
    }

    /// Callback names, in order.
    pub fn callbacks(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|call| call.callback).collect()
    }

    /// Times of the initial observation and of every tick.
    pub fn observed_times(&self) -> Vec<TimeStamp> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call.callback,
                    "observe_at_initial_times" | "observe_at_partial_consistent_time"
                )
            })
            .filter_map(|call| call.time)
            .collect()
    }

    /// Fingerprints taken at the initial time and after every tick.
    pub fn fingerprints(&self) -> Vec<String> {
        self.fingerprints
            .lock()
            .expect("recording probe mutex poisoned")
            .clone()
    }

    /// Messages received through `react_to_error`.
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .expect("recording probe mutex poisoned")
            .clone()
    }
}

impl Probe for RecordingProbe {
    fn prepare_observation(&self) -> Result<(), ProbeError> {
        self.record("prepare_observation", None);
        Ok(())
    }

    fn observe_at_initial_times(&self, time: TimeStamp, engine: &Engine) -> Result<(), ProbeError> {
        self.record("observe_at_initial_times", Some(time));
        self.snapshot(engine);
        Ok(())
    }

    fn observe_at_partial_consistent_time(
        &self,
        time: TimeStamp,
        engine: &Engine,
    ) -> Result<(), ProbeError> {
        self.record("observe_at_partial_consistent_time", Some(time));
        self.snapshot(engine);
        Ok(())
    }

    fn observe_at_final_time(&self, time: TimeStamp, _engine: &Engine) -> Result<(), ProbeError> {
        self.record("observe_at_final_time", Some(time));
        Ok(())
    }

    fn react_to_error(&self, message: &str, cause: &EngineError) -> Result<(), ProbeError> {
        self.record("react_to_error", None);
        self.errors
            .lock()
            .expect("recording probe mutex poisoned")
            .push(format!("{message}: {cause}"));
        Ok(())
    }

    fn react_to_abortion(&self, time: TimeStamp, _engine: &Engine) -> Result<(), ProbeError> {
        self.record("react_to_abortion", Some(time));
        Ok(())
    }

    fn end_observation(&self) -> Result<(), ProbeError> {
        self.record("end_observation", None);
        Ok(())
    }
}

/// Fails every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingProbe;

impl Probe for FailingProbe {
    fn prepare_observation(&self) -> Result<(), ProbeError> {
        Err(ProbeError::new("deliberate failure"))
    }

    fn observe_at_initial_times(&self, _time: TimeStamp, _engine: &Engine) -> Result<(), ProbeError> {
        Err(ProbeError::new("deliberate failure"))
    }

    fn observe_at_partial_consistent_time(
        &self,
        _time: TimeStamp,
        _engine: &Engine,
    ) -> Result<(), ProbeError> {
        Err(ProbeError::new("deliberate failure"))
    }

    fn end_observation(&self) -> Result<(), ProbeError> {
        Err(ProbeError::new("deliberate failure"))
    }
}
