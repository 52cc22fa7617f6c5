//! Time models: how a level's clock advances.

use std::fmt;

use strata_core::{SimError, TimeStamp};

/// Computes a level's next reaction time.
pub trait TimeModel: Send + Sync + fmt::Debug {
    /// The time stamp following `current`. Must be strictly greater.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Overflow`] when the next time does not fit.
    fn next_time(&self, current: TimeStamp) -> Result<TimeStamp, SimError>;
}

/// Fixed-period clock, optionally offset on its first step.
///
/// From `initial_time` the first step lands on
/// `initial_time + phase_shift` (when the shift is non-zero); every other
/// step adds `period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodicTimeModel {
    period: i64,
    phase_shift: i64,
    initial_time: TimeStamp,
}

impl PeriodicTimeModel {
    /// Create a periodic time model.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if `period <= 0` or
    /// `phase_shift < 0`.
    pub fn new(period: i64, phase_shift: i64, initial_time: TimeStamp) -> Result<Self, SimError> {
        if period <= 0 {
            return Err(SimError::invalid(format!(
                "period must be positive, got {period}"
            )));
        }
        if phase_shift < 0 {
            return Err(SimError::invalid(format!(
                "phase shift must not be negative, got {phase_shift}"
            )));
        }
        Ok(Self {
            period,
            phase_shift,
            initial_time,
        })
    }

    /// The period.
    pub fn period(&self) -> i64 {
        self.period
    }

    /// The offset of the first step.
    pub fn phase_shift(&self) -> i64 {
        self.phase_shift
    }

    /// The time the phase shift applies from.
    pub fn initial_time(&self) -> TimeStamp {
        self.initial_time
    }
}

impl TimeModel for PeriodicTimeModel {
    fn next_time(&self, current: TimeStamp) -> Result<TimeStamp, SimError> {
        if current == self.initial_time && self.phase_shift != 0 {
            current.shift(self.phase_shift)
        } else {
            current.shift(self.period)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sequence(model: &PeriodicTimeModel, steps: usize) -> Vec<i64> {
        let mut t = model.initial_time();
        let mut out = vec![t.identifier()];
        for _ in 0..steps {
            t = model.next_time(t).unwrap();
            out.push(t.identifier());
        }
        out
    }

    #[test]
    fn phase_shift_applies_once() {
        let model = PeriodicTimeModel::new(5, 2, TimeStamp::new(0)).unwrap();
        assert_eq!(sequence(&model, 4), vec![0, 2, 7, 12, 17]);
    }

    #[test]
    fn zero_phase_shift_is_plain_period() {
        let model = PeriodicTimeModel::new(5, 0, TimeStamp::new(0)).unwrap();
        assert_eq!(sequence(&model, 4), vec![0, 5, 10, 15, 20]);
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(matches!(
            PeriodicTimeModel::new(0, 0, TimeStamp::new(0)),
            Err(SimError::InvalidArgument { .. })
        ));
        assert!(PeriodicTimeModel::new(-3, 0, TimeStamp::new(0)).is_err());
        assert!(PeriodicTimeModel::new(1, -1, TimeStamp::new(0)).is_err());
    }

    #[test]
    fn overflow_propagates() {
        let model = PeriodicTimeModel::new(10, 0, TimeStamp::new(0)).unwrap();
        assert!(matches!(
            model.next_time(TimeStamp::new(i64::MAX - 5)),
            Err(SimError::Overflow { .. })
        ));
    }

    proptest! {
        #[test]
        fn next_time_is_strictly_increasing(
            period in 1i64..1000,
            shift in 0i64..1000,
            initial in -10_000i64..10_000,
            steps in 1usize..50,
        ) {
            let model = PeriodicTimeModel::new(period, shift, TimeStamp::new(initial)).unwrap();
            let mut t = TimeStamp::new(initial);
            for _ in 0..steps {
                let next = model.next_time(t).unwrap();
                prop_assert!(next > t);
                t = next;
            }
        }
    }
}
