// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for continua-core.
//!
//! Control-flow signals are not errors and never appear here. Everything in
//! [`CoreError`] is a genuine fault surfaced to the caller of the runner.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the continuation runner and manager.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// No runtime configuration was supplied to the runner.
    #[error("no continuation runtime configuration is bound to the runner")]
    MissingConfig,

    /// Runtime configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The continuation id is unknown, expired, or not resumable.
    #[error("continuation '{id}' not found or expired")]
    ContinuationNotFound {
        /// The continuation id that was requested.
        id: String,
    },

    /// Another thread is currently executing the continuation.
    #[error("continuation '{id}' is already being executed")]
    ContinuationBusy {
        /// The continuation id that is locked.
        id: String,
    },

    /// No continuable is registered under the requested name.
    #[error("no continuable registered under '{name}'")]
    UnknownContinuable {
        /// The requested name.
        name: String,
    },

    /// A call target could not be turned into a continuable.
    #[error("call target {target} could not be resolved: {reason}")]
    CallTargetUnresolved {
        /// Rendered call target.
        target: String,
        /// The reason for failure.
        reason: String,
    },

    /// A continuable could not be forked.
    #[error("continuable '{continuable}' can't be cloned: {reason}")]
    CloneFailed {
        /// Type name of the continuable.
        continuable: String,
        /// The reason for failure, typically the offending field.
        reason: String,
    },
}

impl CoreError {
    /// Stable error code for embedding layers.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::MissingConfig => "MISSING_CONFIG",
            CoreError::Config(_) => "INVALID_CONFIG",
            CoreError::ContinuationNotFound { .. } => "CONTINUATION_NOT_FOUND",
            CoreError::ContinuationBusy { .. } => "CONTINUATION_BUSY",
            CoreError::UnknownContinuable { .. } => "UNKNOWN_CONTINUABLE",
            CoreError::CallTargetUnresolved { .. } => "CALL_TARGET_UNRESOLVED",
            CoreError::CloneFailed { .. } => "CLONE_FAILED",
        }
    }

    /// Whether the embedding layer can recover (e.g. show a "session expired" page)
    /// instead of treating this as a wiring bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::ContinuationNotFound { .. } | CoreError::ContinuationBusy { .. }
        )
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        CoreError::ContinuationNotFound { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases = vec![
            (CoreError::MissingConfig, "MISSING_CONFIG"),
            (
                CoreError::Config(ConfigError::Invalid("CONTINUA_PURGE_SCALE", "must be > 0")),
                "INVALID_CONFIG",
            ),
            (CoreError::not_found("c-1"), "CONTINUATION_NOT_FOUND"),
            (
                CoreError::ContinuationBusy {
                    id: "c-1".to_string(),
                },
                "CONTINUATION_BUSY",
            ),
            (
                CoreError::UnknownContinuable {
                    name: "order".to_string(),
                },
                "UNKNOWN_CONTINUABLE",
            ),
            (
                CoreError::CallTargetUnresolved {
                    target: "\"payment\"".to_string(),
                    reason: "unknown".to_string(),
                },
                "CALL_TARGET_UNRESOLVED",
            ),
            (
                CoreError::CloneFailed {
                    continuable: "Order".to_string(),
                    reason: "socket".to_string(),
                },
                "CLONE_FAILED",
            ),
        ];

        for (err, code) in cases {
            assert_eq!(err.error_code(), code, "wrong code for {err}");
        }
    }

    #[test]
    fn test_display_includes_context() {
        let err = CoreError::CloneFailed {
            continuable: "checkout::Wizard".to_string(),
            reason: "field `conn` holds a live connection".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("checkout::Wizard"));
        assert!(msg.contains("conn"));

        let err = CoreError::not_found("abc");
        assert_eq!(err.to_string(), "continuation 'abc' not found or expired");
    }

    #[test]
    fn test_recoverable() {
        assert!(CoreError::not_found("x").is_recoverable());
        assert!(
            CoreError::ContinuationBusy {
                id: "x".to_string()
            }
            .is_recoverable()
        );
        assert!(!CoreError::MissingConfig.is_recoverable());
        assert!(
            !CoreError::UnknownContinuable {
                name: "x".to_string()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: CoreError = ConfigError::Invalid("CONTINUA_PURGE_FREQUENCY", "bad").into();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().contains("CONTINUA_PURGE_FREQUENCY"));
    }
}
