//! The simulation engine: initialization, the tick loop and the reaction
//! protocol.
//!
//! One [`Engine`] type covers both scheduling modes. With one worker every
//! phase runs on the driver thread; with more, the per-agent work of a
//! tick (perception, revision, decision) is fanned out over scoped worker
//! threads and merged in agent order before the serial reaction phase.
//!
//! # Tick protocol
//!
//! 1. `next` is the smallest time-upper-bound over all levels. The levels
//!    whose bound equals `next` tick, in level order.
//! 2. Every agent living in a ticking level perceives each of them,
//!    revises its global state once, then decides at each of them. All
//!    perception reads the same snapshot: nothing produced this tick is
//!    visible until routing. Perception at a level only sees the levels
//!    perceptible from it.
//! 3. The environment acts naturally at each ticking level, with the same
//!    restricted view.
//! 4. Influences are routed to their target levels' transitory states.
//! 5. Each ticking level reacts (system before, regular, system after),
//!    keeps what its reaction re-emitted for itself, and becomes consistent
//!    at `next`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use strata_core::{AgentId, LevelId, SimError, TimeStamp, TimeWindow};
use strata_model::{
    Agent, AgentInitialization, ConsistentState, DynamicStateMap, Environment,
    EnvironmentInitialization, Influence, InfluenceMap, Level, PublicLocalDynamicState,
    SimulationModel, SimulationView, SystemInfluence,
};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ProbeError, Stage};
use crate::hooks::RunHooks;
use crate::probe::{Probe, ProbeRegistry};
use crate::rng;
use crate::schedule;

// ── AbortHandle ────────────────────────────────────────────────────

/// Cloneable, thread-safe handle raising an engine's abort flag.
///
/// The engine checks the flag between ticks. Raising it while no run is in
/// progress has no effect: every run clears it on start.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Ask the running simulation to stop at the next safe point.
    /// Idempotent.
    pub fn request_abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether an abort was requested since the current run started.
    pub fn is_abort_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ── Engine ─────────────────────────────────────────────────────────

enum RunEnd {
    Completed,
    Aborted,
}

struct TickingLevel {
    index: usize,
    id: LevelId,
    window: TimeWindow,
}

/// Runs a [`SimulationModel`].
///
/// Accessors (`levels`, `agents`, `simulation_dynamic_states`, ...) are
/// meant for probe callbacks and for inspection once a run returns.
pub struct Engine {
    config: EngineConfig,
    workers: usize,
    probes: ProbeRegistry,
    hooks: Option<Arc<dyn RunHooks>>,
    abort: Arc<AtomicBool>,
    running: bool,
    model: Option<Arc<dyn SimulationModel>>,
    levels: IndexMap<LevelId, Level>,
    environment: Option<Environment>,
    agents: IndexMap<AgentId, Agent>,
    agents_by_level: IndexMap<LevelId, IndexSet<AgentId>>,
    current_time: TimeStamp,
}

impl Engine {
    /// Create an engine from `config`.
    pub fn new(config: EngineConfig) -> Self {
        let workers = config.resolved_worker_count();
        Self {
            config,
            workers,
            probes: ProbeRegistry::default(),
            hooks: None,
            abort: Arc::new(AtomicBool::new(false)),
            running: false,
            model: None,
            levels: IndexMap::new(),
            environment: None,
            agents: IndexMap::new(),
            agents_by_level: IndexMap::new(),
            current_time: TimeStamp::new(0),
        }
    }

    /// A single-threaded engine.
    pub fn sequential(seed: u64) -> Self {
        Self::new(EngineConfig {
            workers: Some(1),
            seed,
        })
    }

    /// An engine fanning agents out over `config.workers` workers.
    pub fn parallel(config: EngineConfig) -> Self {
        Self::new(config)
    }

    /// Number of workers per-agent phases are spread over.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// The seed generators are derived from.
    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    // ── Probes and hooks ────────────────────────────────────────────

    /// Register `probe` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if `name` is empty or taken.
    pub fn add_probe(&self, name: &str, probe: Arc<dyn Probe>) -> Result<(), SimError> {
        self.probes.add(name, probe)
    }

    /// Unregister the probe named `name`, returning it.
    pub fn remove_probe(&self, name: &str) -> Option<Arc<dyn Probe>> {
        self.probes.remove(name)
    }

    /// Names of the registered probes, in registration order.
    pub fn probe_ids(&self) -> Vec<String> {
        self.probes.ids()
    }

    /// Install (or clear) the run hooks.
    pub fn set_run_hooks(&mut self, hooks: Option<Arc<dyn RunHooks>>) {
        self.hooks = hooks;
    }

    // ── Abort ───────────────────────────────────────────────────────

    /// Ask the running simulation to stop at the next safe point.
    pub fn request_simulation_abortion(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// A handle raising this engine's abort flag from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            flag: Arc::clone(&self.abort),
        }
    }

    // ── Run ─────────────────────────────────────────────────────────

    /// Run `model` from its initial time until its end criterion holds or
    /// an abort is requested. Blocks the calling thread.
    ///
    /// # Errors
    ///
    /// [`EngineError::Aborted`] when the run was aborted; any other variant
    /// reports a model or precondition failure, after every probe received
    /// `react_to_error`.
    pub fn run_new_simulation(&mut self, model: Arc<dyn SimulationModel>) -> Result<(), EngineError> {
        self.abort.store(false, Ordering::Release);
        self.running = true;
        self.model = Some(Arc::clone(&model));
        let hooks = self.hooks.clone();
        if let Some(hooks) = &hooks {
            hooks.preparing();
        }
        info!(seed = self.config.seed, workers = self.workers, "starting simulation");

        let outcome = self.execute(model.as_ref(), hooks.as_deref());

        let this: &Engine = self;
        let time = this.current_time;
        let result = match outcome {
            Ok(RunEnd::Completed) => {
                info!(%time, "simulation completed");
                this.notify("observe_at_final_time", |p| p.observe_at_final_time(time, this));
                this.notify("end_observation", |p| p.end_observation());
                if let Some(hooks) = &hooks {
                    hooks.ended();
                }
                Ok(())
            }
            Ok(RunEnd::Aborted) => {
                info!(%time, "simulation aborted");
                if let Some(hooks) = &hooks {
                    hooks.aborted(time);
                }
                this.notify("react_to_abortion", |p| p.react_to_abortion(time, this));
                this.notify("end_observation", |p| p.end_observation());
                if let Some(hooks) = &hooks {
                    hooks.ended();
                }
                Err(EngineError::Aborted)
            }
            Err(e) => {
                error!(%time, error = %e, "simulation failed");
                let message = format!("simulation failed at time {time}");
                this.notify("react_to_error", |p| p.react_to_error(&message, &e));
                if let Some(hooks) = &hooks {
                    hooks.failed(&e);
                }
                Err(e)
            }
        };
        self.running = false;
        result
    }

    fn execute(
        &mut self,
        model: &dyn SimulationModel,
        hooks: Option<&dyn RunHooks>,
    ) -> Result<RunEnd, EngineError> {
        self.initialize(model)?;

        let initial = self.current_time;
        let this: &Engine = self;
        this.notify("prepare_observation", |p| p.prepare_observation());
        this.notify("observe_at_initial_times", |p| {
            p.observe_at_initial_times(initial, this)
        });
        if let Some(hooks) = hooks {
            hooks.started(initial);
        }

        loop {
            if self.abort.load(Ordering::Acquire) {
                return Ok(RunEnd::Aborted);
            }
            if model.is_final_time_or_after(self.current_time, &*self) {
                return Ok(RunEnd::Completed);
            }
            self.tick()?;

            let time = self.current_time;
            let this: &Engine = self;
            this.notify("observe_at_partial_consistent_time", |p| {
                p.observe_at_partial_consistent_time(time, this)
            });
            if let Some(hooks) = hooks {
                hooks.tick_completed(time);
            }
        }
    }

    fn notify<F>(&self, callback: &'static str, f: F)
    where
        F: Fn(&dyn Probe) -> Result<(), ProbeError>,
    {
        for (name, probe) in self.probes.snapshot() {
            if let Err(e) = f(probe.as_ref()) {
                warn!(probe = %name, callback, error = %e, "probe failed; continuing");
            }
        }
    }

    // ── Initialization ──────────────────────────────────────────────

    fn initialize(&mut self, model: &dyn SimulationModel) -> Result<(), EngineError> {
        self.levels.clear();
        self.environment = None;
        self.agents.clear();
        self.agents_by_level.clear();

        let initial = model.initial_time();
        self.current_time = initial;

        let levels = model
            .generate_levels(initial)
            .map_err(|source| EngineError::Initialization { source })?;
        if levels.is_empty() {
            return Err(SimError::invalid("the simulation model generated no level").into());
        }
        for level in levels {
            let id = level.id().clone();
            if level.consistent_state().time() != initial {
                return Err(SimError::invalid(format!(
                    "level {id} starts at {}, not at the initial time {initial}",
                    level.consistent_state().time()
                ))
                .into());
            }
            if self.levels.contains_key(&id) {
                return Err(SimError::invalid(format!("level {id} is generated twice")).into());
            }
            self.agents_by_level.insert(id.clone(), IndexSet::new());
            self.levels.insert(id, level);
        }

        let EnvironmentInitialization {
            mut environment,
            influences: environment_influences,
        } = model
            .generate_environment(initial, &self.levels)
            .map_err(|source| EngineError::Initialization { source })?;
        for (id, level) in self.levels.iter_mut() {
            if !environment.is_complete_for(id) {
                return Err(SimError::invalid(format!(
                    "environment lacks local states or a natural-action model for level {id}"
                ))
                .into());
            }
            let public = environment.take_staged_public_local_state(id).ok_or_else(|| {
                SimError::invalid(format!("environment has no public local state for level {id}"))
            })?;
            level
                .consistent_state_mut()
                .set_public_local_state_of_environment(public)?;
        }
        self.environment = Some(environment);

        let AgentInitialization {
            agents,
            influences: agent_influences,
        } = model
            .generate_agents(initial, &self.levels)
            .map_err(|source| EngineError::Initialization { source })?;
        for agent in agents {
            self.install_agent(agent)?;
        }

        for (target, influences) in environment_influences.into_iter().chain(agent_influences) {
            let state = self.level_mut(&target)?.consistent_state_mut();
            for influence in influences {
                state.add_influence(influence)?;
            }
        }

        for level in self.levels.values_mut() {
            let next = level.next_time(initial)?;
            level.transitory_state_mut().set_time_upper_bound(next)?;
        }
        debug!(
            %initial,
            levels = self.levels.len(),
            agents = self.agents.len(),
            "simulation initialized"
        );
        Ok(())
    }

    /// Register `agent` and hand its staged public states to its levels.
    fn install_agent(&mut self, mut agent: Agent) -> Result<(), EngineError> {
        let id = agent.id();
        if self.agents.contains_key(&id) {
            return Err(SimError::invalid(format!("{id} is already registered")).into());
        }
        for level in agent.levels() {
            if !self.levels.contains_key(level) {
                return Err(unknown_level(level).into());
            }
            if agent.staged_public_local_state(level).is_none() {
                return Err(SimError::invalid(format!(
                    "{id} has no public local state to install in level {level}"
                ))
                .into());
            }
        }
        for public in agent.take_staged_public_local_states() {
            let level = public.level().clone();
            self.level_mut(&level)?
                .consistent_state_mut()
                .add_public_local_state_of_agent(public)?;
            self.agents_by_level.entry(level).or_default().insert(id);
        }
        debug!(agent = %id, category = %agent.category(), "agent installed");
        self.agents.insert(id, agent);
        Ok(())
    }

    // ── Tick ────────────────────────────────────────────────────────

    fn tick(&mut self) -> Result<(), EngineError> {
        let next = self
            .levels
            .values()
            .filter_map(|level| level.transitory_state().time_upper_bound())
            .min()
            .ok_or_else(|| SimError::invalid("no level has a next time"))?;

        let mut ticking = Vec::new();
        for (index, level) in self.levels.values().enumerate() {
            if level.transitory_state().time_upper_bound() == Some(next) {
                ticking.push(TickingLevel {
                    index,
                    id: level.id().clone(),
                    window: TimeWindow::new(level.consistent_state().time(), next)?,
                });
            }
        }
        let tick_window = TimeWindow::new(self.current_time, next)?;
        debug!(from = %self.current_time, to = %next, levels = ticking.len(), "tick");

        let mut produced = self.run_agents(&ticking, tick_window, next)?;
        produced.merge(self.run_natural(&ticking, next)?);
        for (target, influences) in produced {
            let state = self.level_mut(&target)?.transitory_state_mut();
            for influence in influences {
                state.add_influence(influence)?;
            }
        }

        for level in &ticking {
            self.react(level, next)?;
        }
        self.current_time = next;
        Ok(())
    }

    /// Perception, revision and decision of every agent living in a
    /// ticking level. Returns the decided influences in agent order.
    fn run_agents(
        &mut self,
        ticking: &[TickingLevel],
        tick_window: TimeWindow,
        next: TimeStamp,
    ) -> Result<InfluenceMap, EngineError> {
        let Self {
            config,
            workers,
            levels,
            agents,
            agents_by_level,
            current_time,
            ..
        } = self;
        let levels: &IndexMap<LevelId, Level> = levels;
        let perceptible: Vec<DynamicStateMap<'_>> = ticking
            .iter()
            .map(|level| perceptible_state_map(levels, &levels[level.index], *current_time))
            .collect();
        let members: Vec<Option<&IndexSet<AgentId>>> = ticking
            .iter()
            .map(|level| agents_by_level.get(&level.id))
            .collect();
        let is_member =
            |slot: usize, id: AgentId| members[slot].is_some_and(|set| set.contains(&id));

        let mut participants: Vec<&mut Agent> = agents
            .values_mut()
            .filter(|agent| (0..ticking.len()).any(|slot| is_member(slot, agent.id())))
            .collect();
        let seed = config.seed;

        let chunks = schedule::fan_out(
            *workers,
            &mut participants,
            InfluenceMap::new,
            |ordinal, agent, out| {
                let id = agent.id();
                let mut first = None;
                for (slot, level) in ticking.iter().enumerate() {
                    if !is_member(slot, id) {
                        continue;
                    }
                    first.get_or_insert(slot);
                    agent
                        .perceive(&level.id, level.window, &perceptible[slot])
                        .map_err(|e| EngineError::model(&level.id, Stage::Perception, e))?;
                }
                if let Some(slot) = first {
                    agent
                        .revise_global_state(tick_window)
                        .map_err(|e| EngineError::model(&ticking[slot].id, Stage::Revision, e))?;
                }
                for (slot, level) in ticking.iter().enumerate() {
                    if !is_member(slot, id) {
                        continue;
                    }
                    let decide_error = |e| EngineError::model(&level.id, Stage::Decision, e);
                    let source = &levels[level.index];
                    let public = source
                        .consistent_state()
                        .public_local_state_of_agent(id)
                        .ok_or_else(|| {
                            decide_error(
                                SimError::out_of_range(format!(
                                    "{id} has no public local state in level {}",
                                    level.id
                                ))
                                .into(),
                            )
                        })?;
                    let mut rng = rng::agent_rng(seed, next, level.index, ordinal);
                    let mut emitted = InfluenceMap::new();
                    agent
                        .decide(&level.id, level.window, public, &mut emitted, &mut rng)
                        .map_err(decide_error)?;
                    check_targets(levels, source, &emitted).map_err(|e| decide_error(e.into()))?;
                    out.merge(emitted);
                }
                Ok(())
            },
        )?;

        let mut produced = InfluenceMap::new();
        for chunk in chunks {
            produced.merge(chunk);
        }
        Ok(produced)
    }

    /// Natural action of the environment at every ticking level.
    fn run_natural(
        &mut self,
        ticking: &[TickingLevel],
        next: TimeStamp,
    ) -> Result<InfluenceMap, EngineError> {
        let Self {
            config,
            levels,
            environment,
            current_time,
            ..
        } = self;
        let levels: &IndexMap<LevelId, Level> = levels;
        let environment = environment
            .as_mut()
            .ok_or_else(|| SimError::invalid("the simulation has no environment"))?;
        let mut produced = InfluenceMap::new();
        for level in ticking {
            let natural_error = |e| EngineError::model(&level.id, Stage::Natural, e);
            let source = &levels[level.index];
            let states = perceptible_state_map(levels, source, *current_time);
            let public = source
                .consistent_state()
                .public_local_state_of_environment()
                .ok_or_else(|| {
                    SimError::invalid(format!(
                        "environment has no public local state in level {}",
                        level.id
                    ))
                })?;
            let mut rng = rng::natural_rng(config.seed, next, level.index);
            let mut emitted = InfluenceMap::new();
            environment
                .natural(&level.id, level.window, &states, public, &mut emitted, &mut rng)
                .map_err(natural_error)?;
            check_targets(levels, source, &emitted).map_err(|e| natural_error(e.into()))?;
            produced.merge(emitted);
        }
        Ok(produced)
    }

    // ── Reaction ────────────────────────────────────────────────────

    fn react(&mut self, ticking: &TickingLevel, next: TimeStamp) -> Result<(), EngineError> {
        let id = &ticking.id;
        let window = ticking.window;

        let level = self.level_at_mut(ticking.index)?;
        let reaction = Arc::clone(level.reaction_model());
        let state = level.transitory_state_mut();
        let mut system = state.last_consistent_state_mut().take_system_influences();
        system.extend(state.take_system_influences());
        let mut regular = state.last_consistent_state_mut().take_regular_influences();
        regular.extend(state.take_regular_influences());
        debug!(
            level = %id,
            system = system.len(),
            regular = regular.len(),
            "reacting"
        );

        // System influences, before the regular reaction.
        for influence in &system {
            self.apply_system_influence(influence)?;
        }
        let mut out = InfluenceMap::new();
        reaction
            .make_system_reaction(
                window,
                self.consistent_state_at_mut(ticking.index)?,
                &system,
                true,
                &mut out,
            )
            .map_err(|e| EngineError::model(id, Stage::SystemReactionBefore, e))?;
        let mut after = Vec::new();
        for influence in self.keep_own(id, out)? {
            if influence.is_system() {
                after.push(influence);
            } else {
                regular.push(influence);
            }
        }

        // Regular influences.
        let mut out = InfluenceMap::new();
        reaction
            .make_regular_reaction(
                window,
                self.consistent_state_at_mut(ticking.index)?,
                &regular,
                &mut out,
            )
            .map_err(|e| EngineError::model(id, Stage::RegularReaction, e))?;
        let mut persisted = Vec::new();
        for influence in self.keep_own(id, out)? {
            if influence.is_system() {
                after.push(influence);
            } else {
                persisted.push(influence);
            }
        }

        // System influences produced by the first two passes.
        for influence in &after {
            self.apply_system_influence(influence)?;
        }
        let mut out = InfluenceMap::new();
        reaction
            .make_system_reaction(
                window,
                self.consistent_state_at_mut(ticking.index)?,
                &after,
                false,
                &mut out,
            )
            .map_err(|e| EngineError::model(id, Stage::SystemReactionAfter, e))?;
        persisted.extend(self.keep_own(id, out)?);

        let level = self.level_at_mut(ticking.index)?;
        let state = level.transitory_state_mut();
        for influence in persisted {
            state.add_influence(influence)?;
        }
        state.move_influences_to_consistent_state();
        state.last_consistent_state_mut().set_time(next);
        let upper = level.next_time(next)?;
        level.transitory_state_mut().set_time_upper_bound(upper)?;
        Ok(())
    }

    /// Split a reaction's output: influences for `own` are returned, the
    /// rest are queued in their target levels' transitory states.
    fn keep_own(
        &mut self,
        own: &LevelId,
        out: InfluenceMap,
    ) -> Result<Vec<Arc<Influence>>, EngineError> {
        let mut kept = Vec::new();
        for (target, influences) in out {
            if &target == own {
                kept.extend(influences);
                continue;
            }
            let state = self.level_mut(&target)?.transitory_state_mut();
            for influence in influences {
                state.add_influence(influence)?;
            }
        }
        Ok(kept)
    }

    // ── Structural effect of system influences ─────────────────────

    fn apply_system_influence(&mut self, influence: &Influence) -> Result<(), EngineError> {
        let Some(system) = influence.as_system() else {
            return Ok(());
        };
        let level = influence.target_level();
        match system {
            SystemInfluence::AddAgent(agent) => self.install_agent(Agent::clone(agent)),
            SystemInfluence::AddAgentToLevel { public, private } => {
                let id = public.agent().ok_or_else(|| {
                    SimError::invalid("only agents can be added to a level")
                })?;
                let agent = self
                    .agents
                    .get_mut(&id)
                    .ok_or_else(|| SimError::out_of_range(format!("{id} is not registered")))?;
                if agent.is_declared_in(level) {
                    return Err(SimError::invalid(format!("{id} is already in level {level}")).into());
                }
                agent.attach_level(private.clone())?;
                self.level_mut(level)?
                    .consistent_state_mut()
                    .add_public_local_state_of_agent(public.clone())?;
                self.agents_by_level
                    .entry(level.clone())
                    .or_default()
                    .insert(id);
                debug!(agent = %id, %level, "agent added to level");
                Ok(())
            }
            SystemInfluence::RemoveAgent { agent } => self.remove_agent(*agent),
            SystemInfluence::RemoveAgentFromLevel { agent } => {
                self.remove_agent_from_level(*agent, level)
            }
        }
    }

    fn remove_agent(&mut self, id: AgentId) -> Result<(), EngineError> {
        let agent = self
            .agents
            .shift_remove(&id)
            .ok_or_else(|| SimError::out_of_range(format!("{id} is not registered")))?;
        for level in agent.levels() {
            if let Some(members) = self.agents_by_level.get_mut(level) {
                members.shift_remove(&id);
            }
            self.level_mut(level)?
                .consistent_state_mut()
                .remove_public_local_state_of_agent(id)?;
        }
        debug!(agent = %id, "agent removed");
        Ok(())
    }

    fn remove_agent_from_level(&mut self, id: AgentId, level: &LevelId) -> Result<(), EngineError> {
        let members = self
            .agents_by_level
            .get_mut(level)
            .ok_or_else(|| unknown_level(level))?;
        if !members.shift_remove(&id) {
            return Err(SimError::out_of_range(format!("{id} is not in level {level}")).into());
        }
        self.level_mut(level)?
            .consistent_state_mut()
            .remove_public_local_state_of_agent(id)?;
        // An agent left with no level stays registered and may rejoin.
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.detach_level(level);
        }
        debug!(agent = %id, %level, "agent removed from level");
        Ok(())
    }

    // ── Lookups ─────────────────────────────────────────────────────

    fn level_mut(&mut self, id: &LevelId) -> Result<&mut Level, SimError> {
        self.levels.get_mut(id).ok_or_else(|| unknown_level(id))
    }

    fn level_at_mut(&mut self, index: usize) -> Result<&mut Level, SimError> {
        self.levels
            .get_index_mut(index)
            .map(|(_, level)| level)
            .ok_or_else(|| SimError::out_of_range(format!("no level at index {index}")))
    }

    fn consistent_state_at_mut(&mut self, index: usize) -> Result<&mut ConsistentState, SimError> {
        Ok(self.level_at_mut(index)?.consistent_state_mut())
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The time of the last completed tick (the initial time before the
    /// first one).
    pub fn current_time(&self) -> TimeStamp {
        self.current_time
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The model of the current or last run.
    pub fn model(&self) -> Option<&Arc<dyn SimulationModel>> {
        self.model.as_ref()
    }

    /// Levels, in generation order.
    pub fn levels(&self) -> impl Iterator<Item = &Level> {
        self.levels.values()
    }

    /// Level identifiers, in generation order.
    pub fn level_ids(&self) -> Vec<LevelId> {
        self.levels.keys().cloned().collect()
    }

    /// A level by identifier.
    pub fn level(&self, id: &LevelId) -> Option<&Level> {
        self.levels.get(id)
    }

    /// The environment.
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    /// Every agent, in registration order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Agents living in `level`, in arrival order.
    pub fn agents_in<'a>(&'a self, level: &LevelId) -> impl Iterator<Item = &'a Agent> + 'a {
        self.agents_by_level
            .get(level)
            .into_iter()
            .flatten()
            .filter_map(|id| self.agents.get(id))
    }

    /// An agent by id.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Dynamic state of every level at the current time.
    pub fn simulation_dynamic_states(&self) -> DynamicStateMap<'_> {
        dynamic_state_map(&self.levels, self.current_time)
    }
}

fn unknown_level(id: &LevelId) -> SimError {
    SimError::out_of_range(format!("unknown level {id}"))
}

fn dynamic_state_map(levels: &IndexMap<LevelId, Level>, current: TimeStamp) -> DynamicStateMap<'_> {
    let mut map = DynamicStateMap::new();
    for level in levels.values() {
        map.insert(level.view_at(current));
    }
    map
}

/// The views of the levels perceptible from `source`, in its
/// neighbourhood order.
fn perceptible_state_map<'a>(
    levels: &'a IndexMap<LevelId, Level>,
    source: &Level,
    current: TimeStamp,
) -> DynamicStateMap<'a> {
    let mut map = DynamicStateMap::new();
    for id in source.perceptible_levels() {
        if let Some(level) = levels.get(id) {
            map.insert(level.view_at(current));
        }
    }
    map
}

/// Every non-empty bucket of `emitted` must name a known level that
/// `source` may influence.
fn check_targets(
    levels: &IndexMap<LevelId, Level>,
    source: &Level,
    emitted: &InfluenceMap,
) -> Result<(), SimError> {
    for target in emitted.levels() {
        if emitted.is_empty_for(target) {
            continue;
        }
        if !levels.contains_key(target) {
            return Err(unknown_level(target));
        }
        if !source.can_influence(target) {
            return Err(SimError::invalid(format!(
                "level {} cannot influence level {target}",
                source.id()
            )));
        }
    }
    Ok(())
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Clone for Engine {
    /// Deep copy of levels, environment and agents. Probes are shared, the
    /// abort flag is copied by value, hooks are not copied, and the copy is
    /// not running.
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            workers: self.workers,
            probes: self.probes.duplicate(),
            hooks: None,
            abort: Arc::new(AtomicBool::new(self.abort.load(Ordering::Acquire))),
            running: false,
            model: self.model.clone(),
            levels: self.levels.clone(),
            environment: self.environment.clone(),
            agents: self.agents.clone(),
            agents_by_level: self.agents_by_level.clone(),
            current_time: self.current_time,
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("workers", &self.workers)
            .field("seed", &self.config.seed)
            .field("running", &self.running)
            .field("current_time", &self.current_time)
            .field("levels", &self.levels.keys().collect::<Vec<_>>())
            .field("agents", &self.agents.len())
            .field("probes", &self.probes.ids())
            .finish_non_exhaustive()
    }
}

impl SimulationView for Engine {
    fn current_time(&self) -> TimeStamp {
        self.current_time
    }

    fn level_ids(&self) -> Vec<LevelId> {
        Engine::level_ids(self)
    }

    fn level(&self, id: &LevelId) -> Option<&Level> {
        self.levels.get(id)
    }

    fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    fn agent_ids_in(&self, level: &LevelId) -> Vec<AgentId> {
        self.agents_by_level
            .get(level)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn dynamic_states(&self) -> DynamicStateMap<'_> {
        self.simulation_dynamic_states()
    }
}
