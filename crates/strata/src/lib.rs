//! Strata: a multi-level, multi-agent influence/reaction simulation engine.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Strata sub-crates. For most users, adding `strata` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use indexmap::IndexMap;
//! use strata::prelude::*;
//!
//! /// One level ticking every 5 time units, an empty environment, no agent.
//! struct Quiet;
//!
//! impl SimulationModel for Quiet {
//!     fn initial_time(&self) -> TimeStamp {
//!         TimeStamp::new(0)
//!     }
//!
//!     fn is_final_time_or_after(&self, current: TimeStamp, sim: &dyn SimulationView) -> bool {
//!         TimeBasedEndCriterion::new(TimeStamp::new(20)).is_final_time_or_after(current, sim)
//!     }
//!
//!     fn generate_levels(&self, initial: TimeStamp) -> Result<Vec<Level>, ModelError> {
//!         let id = LevelId::new("world")?;
//!         let clock = PeriodicTimeModel::new(5, 0, initial)?;
//!         Ok(vec![Level::new(id, initial, Arc::new(clock), Arc::new(PassiveReactionModel))])
//!     }
//!
//!     fn generate_environment(
//!         &self,
//!         _initial: TimeStamp,
//!         levels: &IndexMap<LevelId, Level>,
//!     ) -> Result<EnvironmentInitialization, ModelError> {
//!         let mut environment = Environment::new();
//!         for id in levels.keys() {
//!             environment.include_new_level(
//!                 id.clone(),
//!                 LocalState::public_of_environment(id.clone(), Payload::empty()),
//!                 LocalState::private_of_environment(id.clone(), Payload::empty()),
//!             )?;
//!             environment.specify_behavior_for_level(id.clone(), EmptyNaturalModel::shared(id.clone()))?;
//!         }
//!         Ok(EnvironmentInitialization::new(environment))
//!     }
//!
//!     fn generate_agents(
//!         &self,
//!         _initial: TimeStamp,
//!         _levels: &IndexMap<LevelId, Level>,
//!     ) -> Result<AgentInitialization, ModelError> {
//!         Ok(AgentInitialization::default())
//!     }
//! }
//!
//! let mut engine = Engine::sequential(42);
//! engine.run_new_simulation(Arc::new(Quiet)).unwrap();
//! assert_eq!(engine.current_time(), TimeStamp::new(20));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Ids, time stamps, payloads, local states, errors |
//! | [`model`] | `strata-model` | Influences, dynamic states, agents, environment, levels |
//! | [`engine`] | `strata-engine` | Engine, probes, supervisor |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core value types (`strata-core`).
///
/// Level and agent identifiers, [`types::TimeStamp`] and
/// [`types::TimeWindow`], opaque [`types::Payload`]s, the local, global and
/// perceived state carriers, and the [`types::SimError`] taxonomy.
pub use strata_core as types;

/// The simulation data model (`strata-model`).
///
/// Influences and the [`model::InfluenceMap`], consistent and transitory
/// dynamic states, [`model::Agent`], [`model::Environment`],
/// [`model::Level`], and the behaviour-model traits users implement.
pub use strata_model as model;

/// The engine (`strata-engine`).
///
/// [`engine::Engine`] runs a model; [`engine::Probe`] observes it;
/// [`engine::Supervisor`] drives it from another thread.
pub use strata_engine as engine;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
///
/// This imports the most frequently used types: ids and time, states and
/// payloads, the model building blocks and behaviour traits, and the engine.
pub mod prelude {
    // Core types
    pub use strata_core::{
        AgentCategory, AgentId, GlobalState, LevelId, LocalState, PerceivedData, Payload,
        TimeStamp, TimeWindow,
    };

    // Errors
    pub use strata_core::{ModelError, SimError};

    // Model
    pub use strata_model::{
        Agent, AgentInitialization, ConsistentState, DecisionContext, DynamicStateMap,
        Environment, EnvironmentInitialization, Influence, InfluenceMap, Level,
        NaturalContext, PublicLocalDynamicState, SimulationModel, SimulationView,
    };

    // Behaviour traits and stock behaviours
    pub use strata_model::{
        DecisionModel, EmptyDecisionModel, EmptyNaturalModel, EmptyPerceptionModel,
        EndCriterion, IdentityRevisionModel, NaturalModel, PassiveReactionModel,
        PerceptionModel, PeriodicTimeModel, ReactionModel, RevisionModel,
        TimeBasedEndCriterion, TimeModel,
    };

    // Engine
    pub use strata_engine::{
        Engine, EngineConfig, EngineError, Probe, ProbeError, Supervisor, SupervisorConfig,
        SupervisorState,
    };
}
