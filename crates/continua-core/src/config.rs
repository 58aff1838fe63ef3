// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtime configuration for continuations.
//!
//! [`ContinuationConfigRuntime`] is the policy contract the manager and runner
//! consume. [`Config`] is the stock implementation, loadable from environment
//! variables.

use std::time::Duration;

use crate::continuable::Continuable;

/// Default lifetime of an idle continuation (20 minutes).
pub const DEFAULT_CONTINUATION_DURATION: Duration = Duration::from_millis(1000 * 60 * 20);
/// Default purge frequency, out of [`DEFAULT_PURGE_SCALE`].
pub const DEFAULT_PURGE_FREQUENCY: u32 = 20;
/// Default purge scale.
pub const DEFAULT_PURGE_SCALE: u32 = 1000;
/// Default timer period for the background purge worker.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Policy consumed by the continuation manager and runner.
pub trait ContinuationConfigRuntime: Send + Sync {
    /// How long a continuation may stay idle before it expires.
    fn continuation_duration(&self) -> Duration {
        DEFAULT_CONTINUATION_DURATION
    }

    /// Numerator of the chance that a resumption triggers a purge.
    fn purge_frequency(&self) -> u32 {
        DEFAULT_PURGE_FREQUENCY
    }

    /// Denominator of the chance that a resumption triggers a purge.
    fn purge_scale(&self) -> u32 {
        DEFAULT_PURGE_SCALE
    }

    /// Whether resuming a continuation forks the continuable into a new context.
    fn clone_continuations(&self, continuable: &dyn Continuable) -> bool;
}

/// Continuation runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Idle lifetime of a paused continuation
    pub continuation_duration: Duration,
    /// Purge chance numerator
    pub purge_frequency: u32,
    /// Purge chance denominator
    pub purge_scale: u32,
    /// Fork continuables on resumption
    pub clone_continuations: bool,
    /// Timer period for the background purge worker
    pub purge_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            continuation_duration: DEFAULT_CONTINUATION_DURATION,
            purge_frequency: DEFAULT_PURGE_FREQUENCY,
            purge_scale: DEFAULT_PURGE_SCALE,
            clone_continuations: true,
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `CONTINUA_CONTINUATION_DURATION_MS`: Idle lifetime in ms (default: 1200000)
    /// - `CONTINUA_PURGE_FREQUENCY`: Purge chance numerator (default: 20)
    /// - `CONTINUA_PURGE_SCALE`: Purge chance denominator (default: 1000)
    /// - `CONTINUA_CLONE_CONTINUATIONS`: Fork on resume (default: true)
    /// - `CONTINUA_PURGE_INTERVAL_MS`: Purge worker period in ms (default: 60000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let duration_ms: u64 = std::env::var("CONTINUA_CONTINUATION_DURATION_MS")
            .unwrap_or_else(|_| "1200000".to_string())
            .parse()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(ConfigError::Invalid(
                "CONTINUA_CONTINUATION_DURATION_MS",
                "must be a positive number of milliseconds",
            ))?;

        let purge_frequency: u32 = std::env::var("CONTINUA_PURGE_FREQUENCY")
            .unwrap_or_else(|_| DEFAULT_PURGE_FREQUENCY.to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CONTINUA_PURGE_FREQUENCY", "must be a non-negative integer")
            })?;

        let purge_scale: u32 = std::env::var("CONTINUA_PURGE_SCALE")
            .unwrap_or_else(|_| DEFAULT_PURGE_SCALE.to_string())
            .parse()
            .ok()
            .filter(|scale| *scale > 0)
            .ok_or(ConfigError::Invalid(
                "CONTINUA_PURGE_SCALE",
                "must be a positive integer",
            ))?;

        let clone_continuations = match std::env::var("CONTINUA_CLONE_CONTINUATIONS") {
            Err(_) => true,
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid(
                        "CONTINUA_CLONE_CONTINUATIONS",
                        "must be a boolean",
                    ));
                }
            },
        };

        let purge_interval_ms: u64 = std::env::var("CONTINUA_PURGE_INTERVAL_MS")
            .unwrap_or_else(|_| "60000".to_string())
            .parse()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(ConfigError::Invalid(
                "CONTINUA_PURGE_INTERVAL_MS",
                "must be a positive number of milliseconds",
            ))?;

        Ok(Self {
            continuation_duration: Duration::from_millis(duration_ms),
            purge_frequency,
            purge_scale,
            clone_continuations,
            purge_interval: Duration::from_millis(purge_interval_ms),
        })
    }

    /// Set the idle lifetime of paused continuations.
    pub fn with_continuation_duration(mut self, duration: Duration) -> Self {
        self.continuation_duration = duration;
        self
    }

    /// Set the purge chance as `frequency` out of `scale`.
    pub fn with_purge_chance(mut self, frequency: u32, scale: u32) -> Self {
        self.purge_frequency = frequency;
        self.purge_scale = scale.max(1);
        self
    }

    /// Enable or disable forking on resumption.
    pub fn with_clone_continuations(mut self, clone: bool) -> Self {
        self.clone_continuations = clone;
        self
    }

    /// Set the purge worker period.
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }
}

impl ContinuationConfigRuntime for Config {
    fn continuation_duration(&self) -> Duration {
        self.continuation_duration
    }

    fn purge_frequency(&self) -> u32 {
        self.purge_frequency
    }

    fn purge_scale(&self) -> u32 {
        self.purge_scale
    }

    fn clone_continuations(&self, _continuable: &dyn Continuable) -> bool {
        self.clone_continuations
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
