use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// The single configured daily blocking window.
///
/// Serialized as two `HH:MM:SS` time-of-day fields with no date or time zone
/// component. A rule whose `start` equals its `end` is the sentinel meaning
/// "no restriction" and is never evaluated or enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    /// Start of the blocking window (inclusive)
    pub start: NaiveTime,

    /// End of the blocking window (inclusive)
    pub end: NaiveTime,
}

impl Rule {
    /// Create a rule for the given window
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// The "no restriction" rule: both fields at midnight
    pub fn sentinel() -> Self {
        let midnight = NaiveTime::MIN;
        Self {
            start: midnight,
            end: midnight,
        }
    }

    /// Whether this rule is the "no restriction" sentinel.
    ///
    /// Any rule with equal start and end counts, not only midnight.
    pub fn is_sentinel(&self) -> bool {
        self.start == self.end
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::sentinel()
    }
}
