//! Timestamps and the clock abstraction.
//!
//! Timestamps are whole Unix epoch seconds (UTC). Anything that ages entries
//! out reads the time from a [`Clock`], so tests can move it by hand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time. A clock set before 1970 reads as [`Self::EPOCH`].
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Self(d.as_secs()))
            .unwrap_or(Self::EPOCH)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds from `self` to `now`; zero if `now` is earlier.
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// True once `max_age_secs` have passed since `self`.
    pub fn has_expired(&self, max_age_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(max_age_secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let registered = Timestamp::new(1_000);
        assert!(!registered.has_expired(600, Timestamp::new(1_599)));
        assert!(registered.has_expired(600, Timestamp::new(1_600)));
    }

    #[test]
    fn far_future_age_never_overflows() {
        assert!(!Timestamp::new(u64::MAX - 1).has_expired(10, Timestamp::new(u64::MAX - 1)));
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now() > Timestamp::new(1_577_836_800));
    }
}
