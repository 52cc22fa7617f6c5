//! End criteria: when a run stops.

use strata_core::TimeStamp;

use crate::simulation::SimulationView;

/// Decides whether the simulation reached its end.
pub trait EndCriterion: Send + Sync {
    /// Whether `current` is the final time or after it.
    fn is_final_time_or_after(&self, current: TimeStamp, simulation: &dyn SimulationView) -> bool;
}

/// Stops once a fixed time is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBasedEndCriterion {
    final_time: TimeStamp,
}

impl TimeBasedEndCriterion {
    /// Stop at `final_time`.
    pub fn new(final_time: TimeStamp) -> Self {
        Self { final_time }
    }

    /// The final time.
    pub fn final_time(&self) -> TimeStamp {
        self.final_time
    }
}

impl EndCriterion for TimeBasedEndCriterion {
    fn is_final_time_or_after(&self, current: TimeStamp, _simulation: &dyn SimulationView) -> bool {
        self.final_time <= current
    }
}
