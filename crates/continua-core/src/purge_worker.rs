// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker that purges expired continuations.
//!
//! Lookups already drop expired contexts lazily and resumptions purge with a
//! configurable probability. Abandoned continuations that are never looked up
//! again are only reclaimed by this worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::DEFAULT_PURGE_INTERVAL;
use crate::manager::ContinuationManager;

/// Configuration for the purge worker.
#[derive(Debug, Clone)]
pub struct PurgeWorkerConfig {
    /// How often to sweep for expired continuations.
    pub poll_interval: Duration,
}

impl Default for PurgeWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

/// Background worker that periodically purges a [`ContinuationManager`].
pub struct PurgeWorker {
    manager: ContinuationManager,
    config: PurgeWorkerConfig,
    shutdown: Arc<Notify>,
}

impl PurgeWorker {
    /// Create a new purge worker.
    pub fn new(manager: ContinuationManager, config: PurgeWorkerConfig) -> Self {
        Self {
            manager,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the purge loop until the shutdown signal is received.
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Purge worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Purge worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    let removed = self.manager.purge();
                    debug!(removed, remaining = self.manager.len(), "Purge pass finished");
                }
            }
        }

        info!("Purge worker stopped");
    }
}
