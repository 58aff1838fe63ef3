// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The continuable contract and the name registry used to construct them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::signal::{Continuation, Signal};

/// A unit of suspendable logic, written as an explicit state machine.
///
/// `execute` is entered at `cx.label()` (`None` for the entry point) and runs
/// until it returns a [`Signal`]. Locals that must survive a suspension live in
/// the implementing struct.
///
/// ```ignore
/// struct Greeter { name: Option<String> }
///
/// impl Continuable for Greeter {
///     fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
///         match cx.label() {
///             None => cx.call(1, "ask-name"),
///             Some(_) => {
///                 self.name = cx.take_call_answer().and_then(|v| v.as_str().map(String::from));
///                 cx.complete()
///             }
///         }
///     }
/// }
/// ```
pub trait Continuable: Send + 'static {
    /// Run one step from the current label.
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal;

    /// Duplicate this continuable's state for an independent branch.
    ///
    /// Required when the runtime clones continuations on resume. The default
    /// refuses, which surfaces as [`CoreError::CloneFailed`].
    fn fork(&self) -> Result<Box<dyn Continuable>> {
        Err(CoreError::CloneFailed {
            continuable: self.type_name().to_string(),
            reason: "continuable does not implement fork".to_string(),
        })
    }

    /// Type name used in logs and errors.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Constructs a fresh continuable.
pub type ContinuableFactory = Arc<dyn Fn() -> Box<dyn Continuable> + Send + Sync>;

/// Named continuable factories.
#[derive(Clone, Default)]
pub struct ContinuableRegistry {
    factories: HashMap<String, ContinuableFactory>,
}

impl ContinuableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Continuable> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct a new continuable registered under `name`.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Continuable>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CoreError::UnknownContinuable {
                name: name.to_string(),
            })?;
        Ok(factory())
    }
}

impl fmt::Debug for ContinuableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ContinuableRegistry")
            .field("names", &names)
            .finish()
    }
}
