//! Reusable behaviour-model fixtures.
//!
//! - [`CounterReaction`]: adds the delta of every `INC` influence to the
//!   `i64` counter held in the environment's public state.
//! - [`SightPerception`]: perceives the list of levels it was shown.
//! - Decision models covering the engine's paths: counting, random walks,
//!   agents leaving, rejoining, vanishing, spawning or joining levels, and
//!   deliberate failures.

use std::sync::Arc;

use rand::Rng;
use strata_core::{
    AgentCategory, LevelId, LocalState, ModelError, Payload, PerceivedData, TimeStamp, TimeWindow,
};
use strata_model::{
    Agent, AgentPublicStates, ConsistentState, DecisionContext, DecisionModel, DynamicStateMap,
    Influence, InfluenceMap, PerceptionModel, ReactionModel,
};

/// Category of the regular influence raising a level's counter.
pub const INC: &str = "INC";

/// Build an `INC` influence carrying `delta`.
pub fn inc(level: LevelId, window: TimeWindow, delta: i64) -> Influence {
    Influence::regular(INC, level, window, Payload::new(delta))
}

/// A passive agent living in `level`, with `0i64` in both local states.
pub fn passive_agent(level: &LevelId) -> Result<Agent, ModelError> {
    let mut agent = Agent::new(AgentCategory::new("passive")?);
    let id = agent.id();
    agent.add_passive_level(
        level.clone(),
        LocalState::public_of_agent(id, level.clone(), Payload::new(0i64)),
        LocalState::private_of_agent(id, level.clone(), Payload::new(0i64)),
    )?;
    Ok(agent)
}

// ── Reaction ───────────────────────────────────────────────────────

/// Sums the `INC` deltas of a tick into the environment's counter.
///
/// An `INC` without an `i64` payload counts as 1. Other regular
/// influences are consumed without effect.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterReaction;

impl ReactionModel for CounterReaction {
    fn make_regular_reaction(
        &self,
        _window: TimeWindow,
        state: &mut ConsistentState,
        influences: &[Arc<Influence>],
        _out: &mut InfluenceMap,
    ) -> Result<(), ModelError> {
        let delta: i64 = influences
            .iter()
            .filter(|influence| influence.category() == INC)
            .map(|influence| {
                influence
                    .payload()
                    .and_then(|payload| payload.downcast_ref::<i64>())
                    .copied()
                    .unwrap_or(1)
            })
            .sum();
        let counter = state
            .public_local_state_of_environment_mut()
            .and_then(|public| public.get_mut::<i64>())
            .ok_or_else(|| ModelError::failed("level has no counter"))?;
        *counter += delta;
        Ok(())
    }
}

// ── Perception ─────────────────────────────────────────────────────

/// Perceives the identifiers of every level in its dynamic-state map, as
/// a `Vec<LevelId>`.
#[derive(Clone, Debug)]
pub struct SightPerception {
    level: LevelId,
}

impl SightPerception {
    pub fn new(level: LevelId) -> Self {
        Self { level }
    }
}

impl PerceptionModel for SightPerception {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn perceive(
        &self,
        window: TimeWindow,
        _public: &AgentPublicStates<'_, '_>,
        _private: &LocalState,
        states: &DynamicStateMap<'_>,
    ) -> Result<PerceivedData, ModelError> {
        let seen: Vec<LevelId> = states.iter().map(|(id, _)| id.clone()).collect();
        Ok(PerceivedData::new(self.level.clone(), window, Payload::new(seen)))
    }
}

// ── Decisions ──────────────────────────────────────────────────────

/// Emits `INC(1)` at its level every tick.
#[derive(Clone, Debug)]
pub struct IncrementDecision {
    level: LevelId,
}

impl IncrementDecision {
    pub fn new(level: LevelId) -> Self {
        Self { level }
    }
}

impl DecisionModel for IncrementDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let influence = inc(ctx.level().clone(), ctx.window(), 1);
        ctx.emit(influence);
        Ok(())
    }
}

/// Moves a private `i64` position by a random step in `[-3, 3]` and
/// reports the step as an `INC`.
///
/// Reads nothing but its own private state and generator.
#[derive(Clone, Debug)]
pub struct RandomWalkDecision {
    level: LevelId,
}

impl RandomWalkDecision {
    pub fn new(level: LevelId) -> Self {
        Self { level }
    }
}

impl DecisionModel for RandomWalkDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let step: i64 = ctx.rng().gen_range(-3..=3);
        let position = ctx
            .private_local_state_mut()
            .get_mut::<i64>()
            .ok_or_else(|| ModelError::failed("walker has no position"))?;
        *position += step;
        let influence = inc(ctx.level().clone(), ctx.window(), step);
        ctx.emit(influence);
        Ok(())
    }
}

/// Emits `INC(1)` and leaves its level in the tick ending at `at`.
#[derive(Clone, Debug)]
pub struct LeavingDecision {
    level: LevelId,
    at: TimeStamp,
}

impl LeavingDecision {
    pub fn new(level: LevelId, at: TimeStamp) -> Self {
        Self { level, at }
    }
}

impl DecisionModel for LeavingDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let level = ctx.level().clone();
        let window = ctx.window();
        if window.upper() != self.at {
            return Ok(());
        }
        let agent = ctx.agent();
        ctx.emit(inc(level.clone(), window, 1));
        ctx.emit(Influence::remove_agent_from_level(level, window, agent));
        Ok(())
    }
}

/// Detaches itself from `target` in the tick ending at `leave` and
/// rejoins it, with fresh `0i64` local states, in the tick ending at
/// `back`.
#[derive(Clone, Debug)]
pub struct RejoiningDecision {
    level: LevelId,
    target: LevelId,
    leave: TimeStamp,
    back: TimeStamp,
}

impl RejoiningDecision {
    pub fn new(level: LevelId, target: LevelId, leave: TimeStamp, back: TimeStamp) -> Self {
        Self {
            level,
            target,
            leave,
            back,
        }
    }
}

impl DecisionModel for RejoiningDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let window = ctx.window();
        let agent = ctx.agent();
        let target = self.target.clone();
        if window.upper() == self.leave {
            ctx.emit(Influence::remove_agent_from_level(target, window, agent));
        } else if window.upper() == self.back {
            ctx.emit(Influence::add_agent_to_level(
                target.clone(),
                window,
                LocalState::public_of_agent(agent, target.clone(), Payload::new(0i64)),
                LocalState::private_of_agent(agent, target, Payload::new(0i64)),
            )?);
        }
        Ok(())
    }
}

/// Removes itself from the simulation in the tick ending at `at`.
#[derive(Clone, Debug)]
pub struct VanishingDecision {
    level: LevelId,
    at: TimeStamp,
}

impl VanishingDecision {
    pub fn new(level: LevelId, at: TimeStamp) -> Self {
        Self { level, at }
    }
}

impl DecisionModel for VanishingDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let window = ctx.window();
        if window.upper() == self.at {
            let influence = Influence::remove_agent(ctx.level().clone(), window, ctx.agent());
            ctx.emit(influence);
        }
        Ok(())
    }
}

/// Spawns one passive agent in its level in the tick ending at `at`.
#[derive(Clone, Debug)]
pub struct SpawningDecision {
    level: LevelId,
    at: TimeStamp,
}

impl SpawningDecision {
    pub fn new(level: LevelId, at: TimeStamp) -> Self {
        Self { level, at }
    }
}

impl DecisionModel for SpawningDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let window = ctx.window();
        if window.upper() != self.at {
            return Ok(());
        }
        let level = ctx.level().clone();
        let child = passive_agent(&level)?;
        ctx.emit(Influence::add_agent(level, window, child)?);
        Ok(())
    }
}

/// Joins `target` in the tick ending at `at`, with `0i64` local states.
#[derive(Clone, Debug)]
pub struct JoiningDecision {
    level: LevelId,
    target: LevelId,
    at: TimeStamp,
}

impl JoiningDecision {
    pub fn new(level: LevelId, target: LevelId, at: TimeStamp) -> Self {
        Self { level, target, at }
    }
}

impl DecisionModel for JoiningDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let window = ctx.window();
        if window.upper() != self.at {
            return Ok(());
        }
        let agent = ctx.agent();
        let target = self.target.clone();
        ctx.emit(Influence::add_agent_to_level(
            target.clone(),
            window,
            LocalState::public_of_agent(agent, target.clone(), Payload::new(0i64)),
            LocalState::private_of_agent(agent, target, Payload::new(0i64)),
        )?);
        Ok(())
    }
}

/// Emits `INC(1)` at `target` instead of its own level.
#[derive(Clone, Debug)]
pub struct RemoteIncrementDecision {
    level: LevelId,
    target: LevelId,
}

impl RemoteIncrementDecision {
    pub fn new(level: LevelId, target: LevelId) -> Self {
        Self { level, target }
    }
}

impl DecisionModel for RemoteIncrementDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        let influence = inc(self.target.clone(), ctx.window(), 1);
        ctx.emit(influence);
        Ok(())
    }
}

/// Fails in every tick ending at or after `from`.
#[derive(Clone, Debug)]
pub struct FailingDecision {
    level: LevelId,
    from: TimeStamp,
}

impl FailingDecision {
    pub fn new(level: LevelId, from: TimeStamp) -> Self {
        Self { level, from }
    }
}

impl DecisionModel for FailingDecision {
    fn level(&self) -> &LevelId {
        &self.level
    }

    fn decide(&self, ctx: &mut DecisionContext<'_>) -> Result<(), ModelError> {
        if ctx.window().upper() >= self.from {
            return Err(ModelError::failed(format!(
                "deliberate failure at {}",
                ctx.window().upper()
            )));
        }
        Ok(())
    }
}
