//! Data model of a Strata simulation.
//!
//! Influences and the level-keyed [`InfluenceMap`]; the consistent and
//! transitory dynamic states of a level; agents, the environment and
//! levels with their behaviour models; time models, reaction models, end
//! criteria and the [`SimulationModel`] factory the engine runs.
//!
//! Behaviour models are small object-safe traits held as
//! `Arc<dyn Trait>`, so agents, environments and levels can be cloned
//! together with an engine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod behavior;
pub mod context;
pub mod dynamic;
pub mod end;
pub mod environment;
pub mod influence;
pub mod influence_map;
pub mod level;
pub mod reaction;
pub mod simulation;
pub mod time_model;

pub use agent::{Agent, DecisionModel, PerceptionModel, RevisionModel};
pub use behavior::{
    EmptyDecisionModel, EmptyNaturalModel, EmptyPerceptionModel, IdentityRevisionModel,
    PassiveReactionModel,
};
pub use context::{DecisionContext, NaturalContext};
pub use dynamic::{
    AgentPublicStates, ConsistentState, DynamicStateMap, DynamicStateView,
    PublicLocalDynamicState, TransitoryState,
};
pub use end::{EndCriterion, TimeBasedEndCriterion};
pub use environment::{Environment, NaturalModel};
pub use influence::{Influence, InfluenceKind, SystemInfluence};
pub use influence_map::InfluenceMap;
pub use level::Level;
pub use reaction::ReactionModel;
pub use simulation::{AgentInitialization, EnvironmentInitialization, SimulationModel, SimulationView};
pub use time_model::{PeriodicTimeModel, TimeModel};
