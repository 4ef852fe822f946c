/*!
 * Timeout Configuration
 *
 * Defaults applied to call sites that declare no timeout of their own, and a
 * global switch to disable enforcement (for example under a debugger).
 *
 * Sources, in order of precedence at a call site:
 * 1. An explicit [`TimeoutDeclaration`]
 * 2. The configured default timeout
 * 3. Nothing: the work runs unbounded
 */

use super::{ThreadMode, Timeout};
use crate::core::{TimeBudget, TimeUnit};
use crate::errors::{TimeoutError, TimeoutResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Budget applied when a call site declares none, e.g. `500 ms`
pub const ENV_DEFAULT_TIMEOUT: &str = "ASSERT_TIMEOUT_DEFAULT";
/// Thread mode applied when a declaration names none
pub const ENV_THREAD_MODE: &str = "ASSERT_TIMEOUT_THREAD_MODE";
/// `enabled` or `disabled`
pub const ENV_MODE: &str = "ASSERT_TIMEOUT_MODE";

/// Global enforcement switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutMode {
    #[default]
    Enabled,
    Disabled,
}

impl TimeoutMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for TimeoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeoutMode {
    type Err = TimeoutError;

    fn from_str(text: &str) -> TimeoutResult<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(TimeoutError::InvalidConfig(format!(
                "unknown timeout mode '{other}', expected 'enabled' or 'disabled'"
            ))),
        }
    }
}

/// Timeout declared at a call site
///
/// The unit defaults to seconds and the thread mode to whatever the active
/// [`TimeoutConfig`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutDeclaration {
    pub value: i64,
    #[serde(default = "default_unit")]
    pub unit: TimeUnit,
    #[serde(default)]
    pub thread_mode: Option<ThreadMode>,
}

fn default_unit() -> TimeUnit {
    TimeUnit::Seconds
}

impl TimeoutDeclaration {
    pub const fn new(value: i64, unit: TimeUnit) -> Self {
        Self {
            value,
            unit,
            thread_mode: None,
        }
    }

    pub const fn seconds(value: i64) -> Self {
        Self::new(value, TimeUnit::Seconds)
    }

    pub const fn with_thread_mode(mut self, thread_mode: ThreadMode) -> Self {
        self.thread_mode = Some(thread_mode);
        self
    }

    /// Validated budget of this declaration
    pub fn budget(&self) -> TimeoutResult<TimeBudget> {
        TimeBudget::new(self.value, self.unit)
    }
}

/// Defaults and global switch for timeout resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Applied when a call site declares no timeout
    pub default_timeout: Option<TimeBudget>,
    /// Applied when a declaration names no thread mode
    pub default_thread_mode: ThreadMode,
    pub mode: TimeoutMode,
}

impl TimeoutConfig {
    /// Enforcement enabled, no default timeout, same-thread execution
    pub const fn new() -> Self {
        Self {
            default_timeout: None,
            default_thread_mode: ThreadMode::SameThread,
            mode: TimeoutMode::Enabled,
        }
    }

    /// Configuration with all timeouts disabled
    pub const fn disabled() -> Self {
        Self {
            default_timeout: None,
            default_thread_mode: ThreadMode::SameThread,
            mode: TimeoutMode::Disabled,
        }
    }

    pub const fn with_default_timeout(mut self, budget: TimeBudget) -> Self {
        self.default_timeout = Some(budget);
        self
    }

    pub const fn with_thread_mode(mut self, thread_mode: ThreadMode) -> Self {
        self.default_thread_mode = thread_mode;
        self
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.mode == TimeoutMode::Enabled
    }

    /// Load from the `ASSERT_TIMEOUT_*` environment variables
    ///
    /// Unset variables keep their defaults; malformed ones are rejected.
    pub fn from_env() -> TimeoutResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup using the environment variable names
    pub fn from_lookup<L>(lookup: L) -> TimeoutResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(text) = lookup(ENV_DEFAULT_TIMEOUT) {
            let budget = text.parse::<TimeBudget>().map_err(|err| {
                TimeoutError::InvalidConfig(format!("{ENV_DEFAULT_TIMEOUT}: {err}"))
            })?;
            config.default_timeout = Some(budget);
        }
        if let Some(text) = lookup(ENV_THREAD_MODE) {
            config.default_thread_mode = text.parse()?;
        }
        if let Some(text) = lookup(ENV_MODE) {
            config.mode = text.parse()?;
        }

        debug!(
            default_timeout = ?config.default_timeout.map(|b| b.to_string()),
            thread_mode = %config.default_thread_mode,
            mode = %config.mode,
            "loaded timeout configuration"
        );
        Ok(config)
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> TimeoutResult<Self> {
        serde_json::from_str(json).map_err(|err| TimeoutError::InvalidConfig(err.to_string()))
    }

    /// Timeout that applies to a call site
    ///
    /// Returns `Ok(None)` when enforcement is disabled or neither the call
    /// site nor the configuration names a timeout.
    pub fn resolve(&self, declared: Option<&TimeoutDeclaration>) -> TimeoutResult<Option<Timeout>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let timeout = match declared {
            Some(declaration) => Some(Timeout::new(
                declaration.budget()?,
                declaration.thread_mode.unwrap_or(self.default_thread_mode),
            )),
            None => self
                .default_timeout
                .map(|budget| Timeout::new(budget, self.default_thread_mode)),
        };
        Ok(timeout)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new()
    }
}
