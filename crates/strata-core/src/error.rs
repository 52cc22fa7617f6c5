//! Error types for the Strata simulation framework.
//!
//! [`SimError`] covers precondition failures raised by the data model
//! itself. [`ModelError`] is what user-supplied sub-models (perception,
//! decision, reaction, ...) return; the engine wraps it with the level and
//! stage at which it happened.

use thiserror::Error;

/// Precondition and lookup failures raised by data-model operations.
///
/// Every variant is a programmer error: callers treat them as fatal.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    /// A supplied value violates a precondition (mismatched level,
    /// duplicate name, non-positive period, empty identifier).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Which precondition was violated.
        reason: String,
    },
    /// A lookup failed (no model for a level, agent not in a level).
    #[error("out of range: {reason}")]
    OutOfRange {
        /// What was looked up and not found.
        reason: String,
    },
    /// Time-stamp arithmetic left the signed 64-bit range.
    #[error("time stamp overflow: {base} + {shift}")]
    Overflow {
        /// The time stamp identifier being shifted.
        base: i64,
        /// The requested shift.
        shift: i64,
    },
    /// A consistent-state mutator was called on a transitory state.
    #[error("forbidden operation on transitory state: {operation}")]
    ForbiddenOperation {
        /// Name of the rejected operation.
        operation: &'static str,
    },
}

impl SimError {
    /// Shorthand for [`SimError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SimError::OutOfRange`].
    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            reason: reason.into(),
        }
    }
}

/// Errors returned by user sub-models.
///
/// Returned by perception, revision, decision, natural-action and reaction
/// models. The engine reports it through `EngineError::Model` together
/// with the failing level and stage.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The model violated a data-model precondition.
    #[error(transparent)]
    Sim(#[from] SimError),
    /// The model failed for a domain-specific reason.
    #[error("model failed: {reason}")]
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl ModelError {
    /// Shorthand for [`ModelError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = SimError::invalid("period must be positive");
        assert_eq!(err.to_string(), "invalid argument: period must be positive");
        let err = SimError::Overflow {
            base: i64::MAX,
            shift: 1,
        };
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn model_error_wraps_sim_error_transparently() {
        let err: ModelError = SimError::out_of_range("no agent 7").into();
        assert_eq!(err.to_string(), "out of range: no agent 7");
        assert!(matches!(err, ModelError::Sim(SimError::OutOfRange { .. })));
    }
}
