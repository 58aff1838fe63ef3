// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for continua-workflow.

use continua_core::CoreError;
use thiserror::Error;

/// Errors that can occur when running workflow tasks.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The continuation runner reported an error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No tokio runtime was available to dispatch tasks onto.
    #[error("no tokio runtime available for workflow tasks")]
    NoRuntime,

    /// A dispatched task panicked or was cancelled.
    #[error("workflow task failed: {0}")]
    TaskFailed(String),

    /// The workflow was shut down before the task could run.
    #[error("workflow has been shut down")]
    ShutDown,
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;
