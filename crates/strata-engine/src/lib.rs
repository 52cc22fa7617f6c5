//! Simulation engine for Strata models.
//!
//! Provides the [`Engine`] that initializes a [`SimulationModel`] and runs
//! its influence/reaction loop, sequentially or with per-agent work fanned
//! out over worker threads; the [`Probe`] observers notified along the way;
//! and the [`Supervisor`] that lets a view start, pause, abort and shut down
//! a run living on its own thread.
//!
//! [`SimulationModel`]: strata_model::SimulationModel

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod probe;
pub mod rng;
pub(crate) mod schedule;
pub mod supervisor;

pub use config::{ConfigError, EngineConfig, SupervisorConfig};
pub use engine::{AbortHandle, Engine};
pub use error::{EngineError, ProbeError, Stage};
pub use hooks::RunHooks;
pub use probe::{Probe, TracingProbe};
pub use rng::{agent_rng, natural_rng};
pub use supervisor::{Supervisor, SupervisorEvent, SupervisorState, EVENT_CAPACITY};
