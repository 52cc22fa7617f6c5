//! Run hooks: the control-side counterpart of probes.
//!
//! Where probes observe, hooks let a controller follow the run's phases and
//! hold the driver thread between ticks (pause). The
//! [`Supervisor`](crate::Supervisor) is the built-in implementation.

use strata_core::TimeStamp;

use crate::error::EngineError;

/// Callbacks the engine invokes on its driver thread. All default to
/// no-ops.
pub trait RunHooks: Send + Sync {
    /// A run is about to initialize.
    fn preparing(&self) {}

    /// Initialization finished; the first tick follows.
    fn started(&self, time: TimeStamp) {
        let _ = time;
    }

    /// A tick completed and probes were notified. May block; the engine
    /// checks its abort flag as soon as this returns.
    fn tick_completed(&self, time: TimeStamp) {
        let _ = time;
    }

    /// The run honours an abort request.
    fn aborted(&self, time: TimeStamp) {
        let _ = time;
    }

    /// The run failed.
    fn failed(&self, error: &EngineError) {
        let _ = error;
    }

    /// A completed or aborted run ended.
    fn ended(&self) {}
}
