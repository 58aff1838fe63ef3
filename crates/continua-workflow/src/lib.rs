// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Continua Workflow - event-driven work on top of continua-core.
//!
//! Work is a [`Continuable`](continua_core::Continuable) that suspends until
//! an event of a given type is triggered:
//!
//! ```text
//!   work ── wait_for_event("payment") ──► parked under "payment"
//!                                             │
//!   trigger(Event "payment") ─────────────────┘ answer(id, event) on the
//!                                               blocking pool
//! ```
//!
//! Events triggered before any work waits for them are queued per type and
//! consumed by the next waiter. Runner operations run on tokio's blocking pool,
//! bounded by `max_concurrent_tasks`.

pub mod config;
pub mod error;
pub mod event;
pub mod workflow;

pub use config::WorkflowConfig;
pub use error::{Result, WorkflowError};
pub use event::{Event, EventContinuation, EventListener};
pub use workflow::{EventTypeCallTargetRetriever, TaskHandle, Workflow, WorkflowBuilder};
