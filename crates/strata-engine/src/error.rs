//! Errors returned by the engine and by probes.

use std::fmt;

use strata_core::{LevelId, ModelError, SimError};
use thiserror::Error;

use crate::config::ConfigError;

/// The phase of a tick in which a model failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Agent perception.
    Perception,
    /// Global-state revision.
    Revision,
    /// Agent decision.
    Decision,
    /// Environment natural action.
    Natural,
    /// System reaction before the regular reaction.
    SystemReactionBefore,
    /// Regular reaction.
    RegularReaction,
    /// System reaction after the regular reaction.
    SystemReactionAfter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Perception => "perception",
            Self::Revision => "revision",
            Self::Decision => "decision",
            Self::Natural => "natural action",
            Self::SystemReactionBefore => "system reaction (before regular)",
            Self::RegularReaction => "regular reaction",
            Self::SystemReactionAfter => "system reaction (after regular)",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`Engine::run_new_simulation`](crate::Engine::run_new_simulation).
///
/// [`EngineError::Aborted`] is the expected exit of an aborted run. Every
/// other variant reports a programmer error in the simulation model.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The run was aborted on request.
    #[error("simulation aborted")]
    Aborted,
    /// The simulation model failed to generate levels, environment or
    /// agents.
    #[error("simulation model initialization failed: {source}")]
    Initialization {
        /// The model's error.
        #[source]
        source: ModelError,
    },
    /// A user model failed during a tick.
    #[error("{stage} failed at level {level}: {source}")]
    Model {
        /// The level being processed.
        level: LevelId,
        /// The phase that failed.
        stage: Stage,
        /// The model's error.
        #[source]
        source: ModelError,
    },
    /// A data-model precondition failed inside the engine.
    #[error(transparent)]
    Sim(#[from] SimError),
    /// The engine or supervisor configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether this is the expected exit of an aborted run.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub(crate) fn model(level: &LevelId, stage: Stage, source: ModelError) -> Self {
        Self::Model {
            level: level.clone(),
            stage,
            source,
        }
    }
}

/// Error reported by a probe callback. Logged and swallowed by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("probe failed: {reason}")]
pub struct ProbeError {
    /// What went wrong.
    pub reason: String,
}

impl ProbeError {
    /// Create a probe error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn model_error_keeps_source_chain() {
        let level = LevelId::new("L").unwrap();
        let err = EngineError::model(&level, Stage::Decision, ModelError::failed("boom"));
        assert_eq!(err.to_string(), "decision failed at level L: model failed: boom");
        assert!(err.source().is_some());
        assert!(!err.is_abort());
        assert!(EngineError::Aborted.is_abort());
    }

    #[test]
    fn sim_error_converts() {
        let err: EngineError = SimError::invalid("x").into();
        assert!(matches!(err, EngineError::Sim(_)));
    }
}
