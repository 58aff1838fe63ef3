// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Call target resolution.

use std::sync::Arc;

use crate::context::CallState;
use crate::continuable::{Continuable, ContinuableRegistry};
use crate::error::{CoreError, Result};
use crate::signal::CallTarget;

/// Resolves the target of a call into a continuable to run.
///
/// Returning `Ok(None)` leaves the caller parked; something else is then
/// expected to answer on its behalf using `state.continuation_id()`.
pub trait CallTargetRetriever: Send + Sync {
    /// Resolve `target` for the call described by `state`.
    fn call_target(
        &self,
        target: &CallTarget,
        state: &CallState,
    ) -> Result<Option<Box<dyn Continuable>>>;
}

/// Resolves string targets against a [`ContinuableRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryCallTargetRetriever {
    registry: Arc<ContinuableRegistry>,
}

impl RegistryCallTargetRetriever {
    /// Create a retriever backed by `registry`.
    pub fn new(registry: Arc<ContinuableRegistry>) -> Self {
        Self { registry }
    }
}

impl CallTargetRetriever for RegistryCallTargetRetriever {
    fn call_target(
        &self,
        target: &CallTarget,
        _state: &CallState,
    ) -> Result<Option<Box<dyn Continuable>>> {
        let name = target
            .as_str()
            .ok_or_else(|| CoreError::CallTargetUnresolved {
                target: target.to_string(),
                reason: "expected the name of a registered continuable".to_string(),
            })?;

        match self.registry.instantiate(name) {
            Ok(continuable) => Ok(Some(continuable)),
            Err(CoreError::UnknownContinuable { name }) => Err(CoreError::CallTargetUnresolved {
                target: target.to_string(),
                reason: format!("no continuable registered under '{name}'"),
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Continuation, Signal};
    use serde_json::json;

    struct Echo;

    impl Continuable for Echo {
        fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
            cx.answer("echo")
        }
    }

    fn retriever() -> RegistryCallTargetRetriever {
        let mut registry = ContinuableRegistry::new();
        registry.register("echo", || Box::new(Echo));
        RegistryCallTargetRetriever::new(Arc::new(registry))
    }

    #[test]
    fn test_resolves_registered_name() {
        let state = CallState::new("waiting");
        let resolved = retriever().call_target(&json!("echo"), &state).unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn test_unknown_name_is_unresolved() {
        let state = CallState::new("waiting");
        let err = retriever()
            .call_target(&json!("missing"), &state)
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "CALL_TARGET_UNRESOLVED");
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_non_string_target_is_unresolved() {
        let state = CallState::new("waiting");
        let err = retriever()
            .call_target(&json!({"type": "echo"}), &state)
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::CallTargetUnresolved { .. }));
    }
}
