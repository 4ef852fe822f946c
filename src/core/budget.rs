/*!
 * Time Budgets
 *
 * Strictly positive durations with the resolution unit they were declared in.
 *
 * ## Textual Form
 *
 * Budgets parse from `<positive integer>[ ]<unit>` where unit is one of
 * `ns`, `μs` (or `us`), `ms`, `s`, `m`, `h`, `d`. A bare number is seconds:
 *
 * ```
 * use assert_timeout::{TimeBudget, TimeUnit};
 *
 * let budget: TimeBudget = "100 ms".parse().unwrap();
 * assert_eq!(budget, TimeBudget::new(100, TimeUnit::Milliseconds).unwrap());
 * assert_eq!("5".parse::<TimeBudget>().unwrap().as_millis(), 5_000);
 * ```
 */

use crate::errors::{TimeoutError, TimeoutResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Resolution unit of a [`TimeBudget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds
    pub const fn nanos(self) -> u128 {
        match self {
            Self::Nanoseconds => 1,
            Self::Microseconds => 1_000,
            Self::Milliseconds => 1_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Minutes => 60 * 1_000_000_000,
            Self::Hours => 60 * 60 * 1_000_000_000,
            Self::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }

    /// Short suffix used in the textual form
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "μs",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }

    fn from_abbreviation(text: &str) -> Option<Self> {
        // `μ` has no ASCII lowercase form, so match it before folding case
        if text == "μs" || text == "μS" {
            return Some(Self::Microseconds);
        }
        match text.to_ascii_lowercase().as_str() {
            "ns" => Some(Self::Nanoseconds),
            "us" => Some(Self::Microseconds),
            "ms" => Some(Self::Milliseconds),
            "s" => Some(Self::Seconds),
            "m" => Some(Self::Minutes),
            "h" => Some(Self::Hours),
            "d" => Some(Self::Days),
            _ => None,
        }
    }

    /// Units from coarsest to finest
    const DESCENDING: [TimeUnit; 7] = [
        Self::Days,
        Self::Hours,
        Self::Minutes,
        Self::Seconds,
        Self::Milliseconds,
        Self::Microseconds,
        Self::Nanoseconds,
    ];
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Allowed duration for one unit of work
///
/// Invariant: the budget is strictly positive. Every constructor rejects
/// zero and negative values with [`TimeoutError::InvalidBudget`] before any
/// work is scheduled. Budgets longer than [`Duration::MAX`] are accepted and
/// saturate there, which leaves the work effectively unbounded.
///
/// Equality and hashing compare the length of the budget, not its declared
/// unit: `1000 ms == 1 s`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeBudget {
    value: u128,
    unit: TimeUnit,
}

impl TimeBudget {
    /// Create a budget of `value` units
    pub fn new(value: i64, unit: TimeUnit) -> TimeoutResult<Self> {
        Self::positive(value.into(), unit)
    }

    /// Budget in whole milliseconds
    pub fn from_millis(millis: u64) -> TimeoutResult<Self> {
        Self::positive(millis.into(), TimeUnit::Milliseconds)
    }

    /// Budget in whole seconds
    pub fn from_secs(secs: u64) -> TimeoutResult<Self> {
        Self::positive(secs.into(), TimeUnit::Seconds)
    }

    fn positive(value: i128, unit: TimeUnit) -> TimeoutResult<Self> {
        if value <= 0 {
            return Err(TimeoutError::InvalidBudget(format!(
                "timeout must be positive, got {value} {unit}"
            )));
        }
        Ok(Self {
            value: value.unsigned_abs(),
            unit,
        })
    }

    /// Declared value
    pub fn value(&self) -> u128 {
        self.value
    }

    /// Declared unit
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    fn total_nanos(&self) -> u128 {
        self.value.saturating_mul(self.unit.nanos())
    }

    /// Budget as a [`Duration`], saturating at [`Duration::MAX`]
    pub fn duration(&self) -> Duration {
        let nanos = self.total_nanos();
        match u64::try_from(nanos / NANOS_PER_SEC) {
            Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
            Err(_) => Duration::MAX,
        }
    }

    /// Budget in whole milliseconds, as rendered in failure messages
    pub fn as_millis(&self) -> u128 {
        self.duration().as_millis()
    }

    /// Check if the budget has run out since `start`
    pub fn is_expired(&self, start: Instant) -> bool {
        start.elapsed() >= self.duration()
    }

    /// Remaining time since `start`, zero once expired
    pub fn remaining(&self, start: Instant) -> Duration {
        self.duration().saturating_sub(start.elapsed())
    }

    /// Deadline for work started at `start`
    ///
    /// Saturates at `None` only if the deadline is not representable.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        start.checked_add(self.duration())
    }
}

impl TryFrom<Duration> for TimeBudget {
    type Error = TimeoutError;

    /// Expresses the duration in the coarsest unit that represents it exactly
    fn try_from(duration: Duration) -> TimeoutResult<Self> {
        let nanos = duration.as_nanos();
        if nanos == 0 {
            return Err(TimeoutError::InvalidBudget(
                "timeout must be positive, got 0 ns".to_string(),
            ));
        }
        let unit = TimeUnit::DESCENDING
            .into_iter()
            .find(|unit| nanos % unit.nanos() == 0)
            .unwrap_or(TimeUnit::Nanoseconds);
        Ok(Self {
            value: nanos / unit.nanos(),
            unit,
        })
    }
}

impl PartialEq for TimeBudget {
    fn eq(&self, other: &Self) -> bool {
        self.total_nanos() == other.total_nanos()
    }
}

impl Eq for TimeBudget {}

impl Hash for TimeBudget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.total_nanos().hash(state);
    }
}

impl From<TimeBudget> for Duration {
    fn from(budget: TimeBudget) -> Self {
        budget.duration()
    }
}

impl fmt::Display for TimeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for TimeBudget {
    type Err = TimeoutError;

    fn from_str(text: &str) -> TimeoutResult<Self> {
        let text = text.trim();
        let digits_end = text
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit() && *c != '-' && *c != '+')
            .map(|(index, _)| index)
            .unwrap_or(text.len());
        let (number, rest) = text.split_at(digits_end);

        let value: i128 = number.parse().map_err(|_| {
            TimeoutError::InvalidBudget(format!("cannot parse timeout duration '{text}'"))
        })?;

        // At most one space between number and unit
        let suffix = rest.strip_prefix(' ').unwrap_or(rest);
        let unit = if suffix.is_empty() {
            TimeUnit::Seconds
        } else {
            TimeUnit::from_abbreviation(suffix).ok_or_else(|| {
                TimeoutError::InvalidBudget(format!("unknown time unit in '{text}'"))
            })?
        };

        Self::positive(value, unit)
    }
}

impl TryFrom<String> for TimeBudget {
    type Error = TimeoutError;

    fn try_from(text: String) -> TimeoutResult<Self> {
        text.parse()
    }
}

impl From<TimeBudget> for String {
    fn from(budget: TimeBudget) -> Self {
        budget.to_string()
    }
}
