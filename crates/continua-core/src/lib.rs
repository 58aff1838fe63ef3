// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Continua Core - Continuations Engine
//!
//! This crate lets a unit of logic (a *continuable*) suspend itself mid-execution
//! and be resumed later, possibly on another thread, through an opaque
//! continuation id. Continuables are explicit state machines: each execution
//! step starts at a saved label and ends with a [`Signal`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Embedding layer                               │
//! │             (request handlers, continua-workflow, CLI demos)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                │ start / run / resume / answer           ▲ Option<id>
//!                ▼                                         │
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ContinuableRunner                               │
//! │   dispatch loop: execute ─► Signal ─► settle context ─► next dispatch    │
//! └─────────────────────────────────────────────────────────────────────────┘
//!          │                         │                           │
//!          ▼                         ▼                           ▼
//! ┌──────────────────┐   ┌───────────────────────┐   ┌─────────────────────┐
//! │ ContinuationMgr  │◄──│  ContinuationContext  │   │ CallTargetRetriever │
//! │ id → context     │   │ label, parent, paused │   │ target → continuable│
//! │ expiry, purge    │ weak  related ids         │   │ or "park and wait"  │
//! └──────────────────┘   └───────────────────────┘   └─────────────────────┘
//! ```
//!
//! # Signals
//!
//! | Signal | Runner reaction |
//! |--------|-----------------|
//! | `Complete` | Remove the context, return `None` |
//! | `Pause` | Store the context, return its id |
//! | `Call` | Park the context, start the resolved target with `parent = id` |
//! | `Answer` | Remove the answering context, re-enter the waiting caller with the value |
//! | `StepBack` | Adopt the grandparent's label and parent, or restart from entry |
//!
//! # Resumption
//!
//! - [`ContinuableRunner::run`] executes a stored context in place.
//! - [`ContinuableRunner::resume`] and [`ContinuableRunner::answer`] require a
//!   paused context and, depending on the clone policy, fork it into a new
//!   context (the paused one stays resumable) or re-key it under a fresh id.
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CONTINUA_CONTINUATION_DURATION_MS` | `1200000` | Idle lifetime of a continuation |
//! | `CONTINUA_PURGE_FREQUENCY` | `20` | Purge chance numerator |
//! | `CONTINUA_PURGE_SCALE` | `1000` | Purge chance denominator |
//! | `CONTINUA_CLONE_CONTINUATIONS` | `true` | Fork continuables on resume |
//! | `CONTINUA_PURGE_INTERVAL_MS` | `60000` | Background purge period |
//!
//! # Modules
//!
//! - [`config`]: Runtime policy contract and environment configuration
//! - [`context`]: Continuation contexts and call state
//! - [`continuable`]: The continuable trait and name registry
//! - [`error`]: Error types with stable error codes
//! - [`manager`]: Context registry with expiry
//! - [`purge_worker`]: Background expiry sweep
//! - [`retriever`]: Call target resolution
//! - [`runner`]: The continuable runner
//! - [`signal`]: Control-flow signals and the continuation handle

#![deny(missing_docs)]

/// Runtime policy contract and configuration loaded from environment variables.
pub mod config;

/// Continuation contexts and call/answer bookkeeping.
pub mod context;

/// The continuable trait and registry of named factories.
pub mod continuable;

/// Error types with stable error codes.
pub mod error;

/// Registry of live continuation contexts.
pub mod manager;

/// Background worker purging expired continuations.
pub mod purge_worker;

/// Resolution of call targets into continuables.
pub mod retriever;

/// Runner driving continuables through their signals.
pub mod runner;

/// Control-flow signals and the per-step continuation handle.
pub mod signal;

pub use config::{Config, ConfigError, ContinuationConfigRuntime};
pub use context::{CallState, ContextRef, ContinuationContext};
pub use continuable::{Continuable, ContinuableFactory, ContinuableRegistry};
pub use error::{CoreError, Result};
pub use manager::ContinuationManager;
pub use purge_worker::{PurgeWorker, PurgeWorkerConfig};
pub use retriever::{CallTargetRetriever, RegistryCallTargetRetriever};
pub use runner::{ContinuableRunner, ContinuableRunnerBuilder};
pub use signal::{CallTarget, Continuation, Label, Signal};
