//! Millisecond-precision Unix timestamps.
//!
//! A dedicated newtype instead of a bare `i64`/`u64` so that "milliseconds
//! since epoch" can't be silently confused with seconds, a sequence index, or
//! a duration at a call site.

use std::convert::TryFrom;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{de, Deserialize, Deserializer, Serialize};

/// The number of milliseconds since [`UNIX_EPOCH`].
///
/// Internally represented by a non-negative [`i64`] to ease interop with
/// platforms that don't have unsigned ints in their wire format (e.g. JSON
/// numbers).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct TimestampMillis(i64);

impl TimestampMillis {
    pub const ZERO: Self = Self(0);

    /// The current wall-clock time.
    ///
    /// Panics if the system clock is before the epoch or impossibly far in
    /// the future; neither can happen on real hardware.
    pub fn now() -> Self {
        Self::try_from(SystemTime::now()).expect("system clock is insane")
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    pub fn as_u64(self) -> u64 {
        u64::try_from(self.0).expect("non-negative invariant was violated")
    }

    /// Whole seconds between `self` and `earlier`, saturating at zero if
    /// `earlier` is actually later.
    pub fn saturating_secs_since(self, earlier: Self) -> u64 {
        let delta_ms = self.0.saturating_sub(earlier.0);
        u64::try_from(delta_ms).unwrap_or(0) / 1000
    }

    pub fn is_past(self, now: Self) -> bool {
        self.0 <= now.0
    }
}

impl fmt::Display for TimestampMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TimestampMillis> for SystemTime {
    fn from(timestamp: TimestampMillis) -> Self {
        let millis = timestamp.as_u64();
        UNIX_EPOCH + Duration::from_millis(millis)
    }
}

impl TryFrom<SystemTime> for TimestampMillis {
    type Error = anyhow_like::TimeError;

    fn try_from(system_time: SystemTime) -> Result<Self, Self::Error> {
        let duration = system_time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| anyhow_like::TimeError::BeforeEpoch)?;
        let millis =
            i64::try_from(duration.as_millis()).map_err(|_| {
                anyhow_like::TimeError::TooFarInFuture
            })?;
        Ok(Self(millis))
    }
}

/// Enforces that the deserialized value is non-negative.
impl<'de> Deserialize<'de> for TimestampMillis {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        if value >= 0 {
            Ok(TimestampMillis(value))
        } else {
            Err(de::Error::invalid_value(
                de::Unexpected::Signed(value),
                &"a non-negative millisecond timestamp",
            ))
        }
    }
}

/// A tiny local error type so this module doesn't need to pull in `anyhow`
/// just for two variants that can't realistically occur outside of tests.
mod anyhow_like {
    use std::fmt;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub enum TimeError {
        BeforeEpoch,
        TooFarInFuture,
    }

    impl fmt::Display for TimeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::BeforeEpoch =>
                    f.write_str("system time is before the Unix epoch"),
                Self::TooFarInFuture =>
                    f.write_str("system time overflows a millisecond i64"),
            }
        }
    }

    impl std::error::Error for TimeError {}
}
