//! Time stamps and half-open time windows.

use std::fmt;

use crate::error::SimError;

/// A point on a level's time line.
///
/// Wraps a signed 64-bit identifier. Shifting is checked: leaving the
/// `i64` range is an [`SimError::Overflow`], never a wrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeStamp(i64);

impl TimeStamp {
    /// Create a time stamp from its identifier.
    pub const fn new(identifier: i64) -> Self {
        Self(identifier)
    }

    /// Create the time stamp `base + shift`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Overflow`] if the sum exceeds the `i64` range.
    pub fn shifted(base: TimeStamp, shift: i64) -> Result<Self, SimError> {
        base.0
            .checked_add(shift)
            .map(Self)
            .ok_or(SimError::Overflow {
                base: base.0,
                shift,
            })
    }

    /// This time stamp shifted by `shift`. See [`TimeStamp::shifted`].
    pub fn shift(self, shift: i64) -> Result<Self, SimError> {
        Self::shifted(self, shift)
    }

    /// The raw identifier.
    pub const fn identifier(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TimeStamp {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// The half-open window `[lower, upper)` of one transitory phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    lower: TimeStamp,
    upper: TimeStamp,
}

impl TimeWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] unless `lower < upper`.
    pub fn new(lower: TimeStamp, upper: TimeStamp) -> Result<Self, SimError> {
        if lower >= upper {
            return Err(SimError::invalid(format!(
                "time window [{lower}, {upper}) is empty"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Inclusive lower bound.
    pub fn lower(&self) -> TimeStamp {
        self.lower
    }

    /// Exclusive upper bound.
    pub fn upper(&self) -> TimeStamp {
        self.upper
    }

    /// Whether `time` lies in `[lower, upper)`.
    pub fn contains(&self, time: TimeStamp) -> bool {
        self.lower <= time && time < self.upper
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shift_overflow_is_reported() {
        let t = TimeStamp::new(i64::MAX - 1);
        assert_eq!(t.shift(1).unwrap(), TimeStamp::new(i64::MAX));
        assert!(matches!(t.shift(2), Err(SimError::Overflow { .. })));
        assert!(matches!(
            TimeStamp::new(i64::MIN).shift(-1),
            Err(SimError::Overflow { .. })
        ));
    }

    #[test]
    fn window_must_be_non_empty() {
        let t = TimeStamp::new(3);
        assert!(TimeWindow::new(t, t).is_err());
        assert!(TimeWindow::new(TimeStamp::new(4), t).is_err());
        let w = TimeWindow::new(t, TimeStamp::new(5)).unwrap();
        assert!(w.contains(t));
        assert!(!w.contains(TimeStamp::new(5)));
    }

    proptest! {
        #[test]
        fn shift_matches_checked_add(base in any::<i64>(), shift in any::<i64>()) {
            let result = TimeStamp::shifted(TimeStamp::new(base), shift);
            match base.checked_add(shift) {
                Some(sum) => prop_assert_eq!(result.unwrap().identifier(), sum),
                None => prop_assert!(result.is_err()),
            }
        }
    }
}
