// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow configuration.

use continua_core::{Config, ConfigError};

/// Default number of runner operations executing at once.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 32;

/// Workflow configuration
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Continuation runtime settings. Cloning is always disabled for workflows.
    pub core: Config,
    /// Maximum runner operations executing at once
    pub max_concurrent_tasks: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            core: Config::default().with_clone_continuations(false),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads everything [`Config::from_env`] reads, plus:
    /// - `CONTINUA_MAX_CONCURRENT_TASKS`: Concurrent runner operations (default: 32)
    pub fn from_env() -> Result<Self, ConfigError> {
        let core = Config::from_env()?.with_clone_continuations(false);

        let max_concurrent_tasks: usize = std::env::var("CONTINUA_MAX_CONCURRENT_TASKS")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT_TASKS.to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "CONTINUA_MAX_CONCURRENT_TASKS",
                "must be a positive integer",
            ))?;

        Ok(Self {
            core,
            max_concurrent_tasks,
        })
    }
}
