// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event-driven task runner.
//!
//! Work waits for events by calling the event type as its call target. The
//! workflow's retriever never returns a continuable: it records the waiting
//! continuation under that event type and, if a matching event arrived
//! earlier, triggers it right away. [`Workflow::trigger`] answers every
//! continuation waiting for the event's type, or queues the event for the next
//! waiter.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use continua_core::{
    CallState, CallTarget, CallTargetRetriever, Continuable, ContinuableRegistry,
    ContinuableRunner, PurgeWorker, PurgeWorkerConfig,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::event::{Event, EventListener};

/// Handle to a dispatched runner operation, resolving to the continuation id
/// the operation paused at, or `None` when the work completed.
pub type TaskHandle = JoinHandle<Result<Option<String>>>;

struct WorkflowShared {
    runner: ContinuableRunner,
    /// Event type → continuations waiting for it. Locked before `pending`.
    waiting: Mutex<HashMap<String, HashSet<String>>>,
    pending: Mutex<HashMap<String, VecDeque<Event>>>,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    permits: Arc<Semaphore>,
    runtime: Handle,
}

impl WorkflowShared {
    fn dispatch<F>(self: &Arc<Self>, task: F) -> TaskHandle
    where
        F: FnOnce(&ContinuableRunner) -> continua_core::Result<Option<String>> + Send + 'static,
    {
        let shared = self.clone();
        let permits = self.permits.clone();
        self.runtime.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| WorkflowError::ShutDown)?;
            let result = tokio::task::spawn_blocking(move || task(&shared.runner))
                .await
                .map_err(|e| WorkflowError::TaskFailed(e.to_string()))?;
            if let Err(e) = &result {
                warn!(error = %e, code = e.error_code(), "Workflow task failed");
            }
            result.map_err(WorkflowError::from)
        })
    }

    fn answer(self: &Arc<Self>, id: String, value: Value) -> TaskHandle {
        self.dispatch(move |runner| runner.answer(&id, value))
    }

    fn trigger(self: &Arc<Self>, event: Event) -> Vec<TaskHandle> {
        let ids = {
            let mut waiting = self.waiting.lock();
            let ids: Vec<String> = waiting
                .remove(event.event_type())
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_default();
            if ids.is_empty() {
                self.pending
                    .lock()
                    .entry(event.event_type().to_string())
                    .or_default()
                    .push_back(event.clone());
            }
            ids
        };

        let handles = if ids.is_empty() {
            debug!(event_type = %event.event_type(), "No work waiting, event queued");
            Vec::new()
        } else {
            debug!(
                event_type = %event.event_type(),
                waiting = ids.len(),
                "Resuming work waiting for event"
            );
            let value = event.to_value();
            ids.into_iter()
                .map(|id| self.answer(id, value.clone()))
                .collect()
        };

        for listener in self.listeners.read().iter() {
            listener.event_triggered(&event);
        }

        handles
    }

    /// Record `continuation_id` as waiting for `event_type`, returning the
    /// oldest pending event of that type if one arrived earlier.
    fn wait_for(&self, event_type: &str, continuation_id: &str) -> Option<Event> {
        let mut waiting = self.waiting.lock();
        waiting
            .entry(event_type.to_string())
            .or_default()
            .insert(continuation_id.to_string());
        self.pending
            .lock()
            .get_mut(event_type)
            .and_then(VecDeque::pop_front)
    }
}

/// Call target retriever that parks work until an event of the target type
/// is triggered.
pub struct EventTypeCallTargetRetriever {
    workflow: Weak<WorkflowShared>,
}

impl CallTargetRetriever for EventTypeCallTargetRetriever {
    fn call_target(
        &self,
        target: &CallTarget,
        state: &CallState,
    ) -> continua_core::Result<Option<Box<dyn Continuable>>> {
        let Some(workflow) = self.workflow.upgrade() else {
            return Ok(None);
        };

        let event_type = match target {
            Value::String(event_type) => event_type.clone(),
            other => other.to_string(),
        };
        debug!(
            event_type = %event_type,
            continuation_id = %state.continuation_id(),
            "Work waiting for event"
        );

        if let Some(event) = workflow.wait_for(&event_type, state.continuation_id()) {
            // The answer tasks run on their own; nobody awaits them here.
            drop(workflow.trigger(event));
        }

        Ok(None)
    }
}

impl fmt::Debug for EventTypeCallTargetRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTypeCallTargetRetriever")
            .field("attached", &(self.workflow.strong_count() > 0))
            .finish()
    }
}

/// Builder for a [`Workflow`].
#[derive(Default)]
pub struct WorkflowBuilder {
    config: WorkflowConfig,
    registry: ContinuableRegistry,
    runtime: Option<Handle>,
}

impl WorkflowBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Register work under `name`.
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Continuable> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
        self
    }

    /// Set the runtime tasks are dispatched onto.
    ///
    /// Default: the runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the workflow and spawn its purge worker.
    pub fn build(self) -> Result<Workflow> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| WorkflowError::NoRuntime)?,
        };

        let core = self.config.core.clone().with_clone_continuations(false);
        let purge_interval = core.purge_interval;
        let runner = ContinuableRunner::builder()
            .config(Arc::new(core))
            .registry(self.registry)
            .build()?;

        let shared = Arc::new(WorkflowShared {
            runner,
            waiting: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            permits: Arc::new(Semaphore::new(self.config.max_concurrent_tasks.max(1))),
            runtime: runtime.clone(),
        });
        shared
            .runner
            .set_call_target_retriever(Arc::new(EventTypeCallTargetRetriever {
                workflow: Arc::downgrade(&shared),
            }));

        let worker = PurgeWorker::new(
            shared.runner.manager().clone(),
            PurgeWorkerConfig {
                poll_interval: purge_interval,
            },
        );
        let purge_shutdown = worker.shutdown_handle();
        runtime.spawn(async move { worker.run().await });

        info!(
            max_concurrent_tasks = self.config.max_concurrent_tasks,
            "Workflow started"
        );

        Ok(Workflow {
            shared,
            purge_shutdown,
        })
    }
}

/// Runs work that waits for events.
pub struct Workflow {
    shared: Arc<WorkflowShared>,
    purge_shutdown: Arc<Notify>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("runner", &self.shared.runner)
            .field("listeners", &self.shared.listeners.read().len())
            .finish()
    }
}

impl Workflow {
    /// Create a workflow builder.
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// The underlying runner.
    pub fn runner(&self) -> &ContinuableRunner {
        &self.shared.runner
    }

    /// Start the work registered under `name`.
    ///
    /// The handle resolves to the id the work parked under. If a queued event
    /// was consumed right away, the answer task it spawned may already have
    /// resumed the work under a new id, so the returned id can be stale.
    pub fn start(&self, name: &str) -> TaskHandle {
        let name = name.to_string();
        self.shared.dispatch(move |runner| runner.start(&name))
    }

    /// Start an already constructed piece of work.
    pub fn start_with(&self, work: Box<dyn Continuable>) -> TaskHandle {
        self.shared.dispatch(move |runner| runner.start_with(work))
    }

    /// Answer the waiting continuation `id` with `value`.
    pub fn answer(&self, id: &str, value: impl Into<Value>) -> TaskHandle {
        self.shared.answer(id.to_string(), value.into())
    }

    /// Trigger an event.
    ///
    /// Returns one handle per resumed continuation; empty when the event was
    /// queued because no work was waiting for its type.
    pub fn trigger(&self, event: Event) -> Vec<TaskHandle> {
        self.shared.trigger(event)
    }

    /// Add a listener notified after every trigger.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Remove a previously added listener. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut listeners = self.shared.listeners.write();
        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() != before
    }

    /// Number of continuations waiting for `event_type`.
    pub fn waiting_count(&self, event_type: &str) -> usize {
        self.shared
            .waiting
            .lock()
            .get(event_type)
            .map_or(0, HashSet::len)
    }

    /// Number of queued events of `event_type`.
    pub fn pending_count(&self, event_type: &str) -> usize {
        self.shared
            .pending
            .lock()
            .get(event_type)
            .map_or(0, VecDeque::len)
    }

    /// Stop the purge worker and refuse further dispatches.
    pub fn shutdown(&self) {
        self.purge_shutdown.notify_one();
        self.shared.permits.close();
        info!("Workflow shut down");
    }
}

impl Drop for Workflow {
    fn drop(&mut self) {
        self.purge_shutdown.notify_one();
    }
}
