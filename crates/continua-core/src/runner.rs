// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The continuable runner.
//!
//! Every public entry point drives one continuation chain synchronously on the
//! calling thread until it pauses, parks on a call, or completes.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ContinuationConfigRuntime;
use crate::context::{CallState, ContextRef};
use crate::continuable::{Continuable, ContinuableRegistry};
use crate::error::{CoreError, Result};
use crate::manager::ContinuationManager;
use crate::retriever::{CallTargetRetriever, RegistryCallTargetRetriever};
use crate::signal::{CallTarget, Signal};

/// Builder for a [`ContinuableRunner`].
#[derive(Default)]
pub struct ContinuableRunnerBuilder {
    config: Option<Arc<dyn ContinuationConfigRuntime>>,
    registry: ContinuableRegistry,
    retriever: Option<Arc<dyn CallTargetRetriever>>,
}

impl fmt::Debug for ContinuableRunnerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuableRunnerBuilder")
            .field("config", &self.config.as_ref().map(|_| "..."))
            .field("registry", &self.registry)
            .field("retriever", &self.retriever.as_ref().map(|_| "..."))
            .finish()
    }
}

impl ContinuableRunnerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the runtime configuration (required).
    pub fn config(mut self, config: Arc<dyn ContinuationConfigRuntime>) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a continuable factory under `name`.
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Continuable> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
        self
    }

    /// Replace the registry wholesale.
    pub fn registry(mut self, registry: ContinuableRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the call target retriever.
    ///
    /// Default: a [`RegistryCallTargetRetriever`] over the runner's registry.
    pub fn call_target_retriever(mut self, retriever: Arc<dyn CallTargetRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Build the runner.
    ///
    /// Fails with [`CoreError::MissingConfig`] when no configuration was set.
    pub fn build(self) -> Result<ContinuableRunner> {
        let config = self.config.ok_or(CoreError::MissingConfig)?;
        let registry = Arc::new(self.registry);
        let retriever = self
            .retriever
            .unwrap_or_else(|| Arc::new(RegistryCallTargetRetriever::new(registry.clone())));

        Ok(ContinuableRunner {
            manager: ContinuationManager::new(config),
            registry,
            retriever: RwLock::new(retriever),
        })
    }
}

/// Where the next execution step starts.
enum Dispatch {
    /// A new continuable that has never run.
    Fresh {
        continuable: Box<dyn Continuable>,
        parent_id: Option<String>,
        call_state: Option<CallState>,
    },
    /// A stored context, executed in place.
    Run { id: String, answer: Option<Value> },
    /// A paused context, forked or re-keyed first.
    Resume { id: String, answer: Option<Value> },
    /// The context that just stepped back.
    Again { id: String, handle: ContextRef },
    /// A caller receiving the answer of `answered_by`, which stays stored
    /// until the caller is locked.
    Deliver {
        id: String,
        handle: ContextRef,
        answer: Value,
        answered_by: String,
    },
}

/// A dispatch resolved to the context it executes.
struct Entered {
    id: String,
    handle: ContextRef,
    answer: Option<Value>,
    answered_by: Option<String>,
}

/// What a step left behind once the context lock is released.
enum Settled {
    Completed,
    Paused(String),
    SteppedBack(String),
    CalledOut {
        target: CallTarget,
        state: CallState,
    },
    Answered {
        id: String,
        value: Value,
        state: Option<CallState>,
    },
}

/// Runs continuables and reacts to the signals they yield.
pub struct ContinuableRunner {
    manager: ContinuationManager,
    registry: Arc<ContinuableRegistry>,
    retriever: RwLock<Arc<dyn CallTargetRetriever>>,
}

impl fmt::Debug for ContinuableRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuableRunner")
            .field("manager", &self.manager)
            .field("registry", &self.registry)
            .finish()
    }
}

impl ContinuableRunner {
    /// Create a runner builder.
    pub fn builder() -> ContinuableRunnerBuilder {
        ContinuableRunnerBuilder::new()
    }

    /// The context registry.
    pub fn manager(&self) -> &ContinuationManager {
        &self.manager
    }

    /// Registered continuable factories.
    pub fn registry(&self) -> &ContinuableRegistry {
        &self.registry
    }

    /// The current call target retriever.
    pub fn call_target_retriever(&self) -> Arc<dyn CallTargetRetriever> {
        self.retriever.read().clone()
    }

    /// Swap the call target retriever used by subsequent calls.
    pub fn set_call_target_retriever(&self, retriever: Arc<dyn CallTargetRetriever>) {
        *self.retriever.write() = retriever;
    }

    /// Start the continuable registered under `name`.
    ///
    /// Returns the continuation id when execution paused, `None` when it completed.
    #[instrument(skip(self))]
    pub fn start(&self, name: &str) -> Result<Option<String>> {
        let continuable = self.registry.instantiate(name)?;
        self.start_with(continuable)
    }

    /// Start an already constructed continuable.
    pub fn start_with(&self, continuable: Box<dyn Continuable>) -> Result<Option<String>> {
        debug!(continuable = continuable.type_name(), "Starting continuable");
        self.drive(Dispatch::Fresh {
            continuable,
            parent_id: None,
            call_state: None,
        })
    }

    /// Continue a stored context in place at its saved label.
    #[instrument(skip(self), fields(continuation_id = %id))]
    pub fn run(&self, id: &str) -> Result<Option<String>> {
        self.drive(Dispatch::Run {
            id: id.to_string(),
            answer: None,
        })
    }

    /// Resume a paused continuation, forking or re-keying it per the clone policy.
    #[instrument(skip(self), fields(continuation_id = %id))]
    pub fn resume(&self, id: &str) -> Result<Option<String>> {
        self.drive(Dispatch::Resume {
            id: id.to_string(),
            answer: None,
        })
    }

    /// Resume the paused continuation `id` with `value` as the answer to its call.
    #[instrument(skip(self, value), fields(continuation_id = %id))]
    pub fn answer(&self, id: &str, value: impl Into<Value>) -> Result<Option<String>> {
        self.drive(Dispatch::Resume {
            id: id.to_string(),
            answer: Some(value.into()),
        })
    }

    fn drive(&self, first: Dispatch) -> Result<Option<String>> {
        let mut dispatch = first;

        loop {
            let Entered {
                id,
                handle,
                answer,
                answered_by,
            } = self.enter(dispatch)?;

            let settled = {
                let mut context = handle
                    .try_lock()
                    .ok_or_else(|| CoreError::ContinuationBusy { id: id.clone() })?;

                if let Some(callee) = answered_by {
                    self.manager.remove(&callee);
                }

                if answer.is_some() {
                    context.set_call_answer(answer);
                }
                context.set_paused(false);
                context.touch();

                let signal = context.execute();
                let current = context.id().to_string();
                debug!(
                    continuation_id = %current,
                    label = ?context.label(),
                    signal = signal.kind(),
                    "Continuable yielded"
                );

                match signal {
                    Signal::Complete => {
                        self.manager.remove(&current);
                        Settled::Completed
                    }
                    Signal::Pause => {
                        context.pause();
                        self.manager.insert(current.clone(), handle.clone());
                        Settled::Paused(current)
                    }
                    Signal::StepBack => {
                        context.pause();
                        self.manager.insert(current.clone(), handle.clone());
                        if context.lookup_step_back_id().is_none() {
                            debug!(continuation_id = %current, "No step-back target, restarting");
                            context.restart();
                        }
                        Settled::SteppedBack(current)
                    }
                    Signal::Call { target } => {
                        context.pause();
                        let state = CallState::new(current.clone());
                        context.set_created_call_state(Some(state.clone()));
                        self.manager.insert(current, handle.clone());
                        Settled::CalledOut { target, state }
                    }
                    Signal::Answer { value } => {
                        let state = context.active_call_state().cloned();
                        if state.is_some() {
                            // Stays stored until the caller is locked for delivery.
                            context.pause();
                            self.manager.insert(current.clone(), handle.clone());
                        } else {
                            self.manager.remove(&current);
                        }
                        Settled::Answered {
                            id: current,
                            value,
                            state,
                        }
                    }
                }
            };

            dispatch = match settled {
                Settled::Completed => return Ok(None),
                Settled::Paused(id) => return Ok(Some(id)),
                Settled::SteppedBack(id) => Dispatch::Again { id, handle },
                Settled::CalledOut { target, state } => {
                    let retriever = self.call_target_retriever();
                    match retriever.call_target(&target, &state)? {
                        Some(continuable) => Dispatch::Fresh {
                            continuable,
                            parent_id: Some(state.continuation_id().to_string()),
                            call_state: Some(state),
                        },
                        None => {
                            debug!(
                                continuation_id = %state.continuation_id(),
                                %target,
                                "No immediate call target, continuation parked"
                            );
                            return Ok(Some(state.continuation_id().to_string()));
                        }
                    }
                }
                Settled::Answered {
                    id: callee,
                    value,
                    state: Some(state),
                } => {
                    let caller = state.continuation_id().to_string();
                    let handle = self
                        .manager
                        .get(&caller)
                        .ok_or_else(|| CoreError::not_found(caller.clone()))?;
                    Dispatch::Deliver {
                        id: caller,
                        handle,
                        answer: value,
                        answered_by: callee,
                    }
                }
                Settled::Answered {
                    id, state: None, ..
                } => {
                    debug!(continuation_id = %id, "Answer without pending call discarded");
                    return Ok(None);
                }
            };
        }
    }

    /// Resolve a dispatch into the context to execute.
    fn enter(&self, dispatch: Dispatch) -> Result<Entered> {
        let (id, handle, answer, answered_by) = match dispatch {
            Dispatch::Fresh {
                continuable,
                parent_id,
                call_state,
            } => {
                let mut context = self.manager.create_context(continuable);
                context.set_parent_id(parent_id);
                context.set_active_call_state(call_state);
                (context.id().to_string(), context.into_ref(), None, None)
            }
            Dispatch::Run { id, answer } => {
                let handle = self
                    .manager
                    .get(&id)
                    .ok_or_else(|| CoreError::not_found(id.clone()))?;
                (id, handle, answer, None)
            }
            Dispatch::Resume { id, answer } => {
                let handle = self
                    .manager
                    .resume_context(&id)?
                    .ok_or_else(|| CoreError::not_found(id.clone()))?;
                (id, handle, answer, None)
            }
            Dispatch::Again { id, handle } => (id, handle, None, None),
            Dispatch::Deliver {
                id,
                handle,
                answer,
                answered_by,
            } => (id, handle, Some(answer), Some(answered_by)),
        };
        Ok(Entered {
            id,
            handle,
            answer,
            answered_by,
        })
    }
}
