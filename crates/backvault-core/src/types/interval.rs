//! Human schedule intervals (`30s`, `5m`, `2h`, `1d`, or bare seconds).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Raw `every` value as written in a job descriptor.
///
/// TOML allows both `every = 300` and `every = "5m"`, so the value is kept
/// untyped until the scheduler asks for a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalSpec {
    /// Integer number of seconds.
    Seconds(i64),
    /// Fractional seconds, truncated toward zero.
    Fractional(f64),
    /// Suffixed or bare textual form.
    Text(String),
}

impl IntervalSpec {
    /// Interval in whole seconds, or `None` when the value is not understood.
    ///
    /// Numeric values are passed through (negative included) so that the
    /// caller decides what a non-positive interval means.
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Self::Seconds(s) => Some(*s),
            Self::Fractional(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Fractional(_) => None,
            Self::Text(text) => parse_interval(text).and_then(|s| i64::try_from(s).ok()),
        }
    }

    /// Positive schedule interval, or `None` when the job must not be scheduled.
    pub fn schedule_interval(&self) -> Option<Duration> {
        match self.seconds() {
            Some(s) if s > 0 => Some(Duration::from_secs(s as u64)),
            _ => None,
        }
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{s}"),
            Self::Fractional(v) => write!(f, "{v}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Parse a textual interval into seconds.
///
/// Accepts a bare non-negative integer or an integer followed by one of
/// `s`, `m`, `h`, `d` (case-insensitive, surrounding whitespace ignored).
/// Anything else yields `None`.
pub fn parse_interval(value: &str) -> Option<u64> {
    let s = value.trim().to_lowercase();
    if is_digits(&s) {
        return s.parse().ok();
    }

    let (unit_start, _) = s.char_indices().last()?;
    let (number, unit) = s.split_at(unit_start);
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return None,
    };
    if !is_digits(number) {
        return None;
    }
    number.parse::<u64>().ok()?.checked_mul(multiplier)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
