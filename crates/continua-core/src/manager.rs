// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registry of live continuation contexts.
//!
//! The manager owns every stored context. Contexts only hold a weak reference
//! back, so dropping the last manager handle releases all suspended state.
//!
//! Lock order: a context lock may be held while taking the map lock, never the
//! reverse. Lookups only `try_lock` contexts, and a context that is locked is
//! being executed and therefore never considered expired.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, info};

use crate::config::ContinuationConfigRuntime;
use crate::context::{ContextRef, ContinuationContext};
use crate::continuable::Continuable;
use crate::error::{CoreError, Result};

pub(crate) struct ManagerShared {
    contexts: RwLock<HashMap<String, ContextRef>>,
    config: Arc<dyn ContinuationConfigRuntime>,
}

/// Shared, cloneable handle to a context registry.
#[derive(Clone)]
pub struct ContinuationManager {
    shared: Arc<ManagerShared>,
}

impl ContinuationManager {
    /// Create an empty manager governed by `config`.
    pub fn new(config: Arc<dyn ContinuationConfigRuntime>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                contexts: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<ManagerShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerShared> {
        Arc::downgrade(&self.shared)
    }

    /// The runtime configuration.
    pub fn config(&self) -> &Arc<dyn ContinuationConfigRuntime> {
        &self.shared.config
    }

    /// Create a context owned by this manager without storing it.
    pub fn create_context(&self, continuable: Box<dyn Continuable>) -> ContinuationContext {
        ContinuationContext::new(self, continuable)
    }

    /// Store `context` under its id.
    pub fn add(&self, context: ContinuationContext) -> ContextRef {
        let id = context.id().to_string();
        let handle = context.into_ref();
        self.insert(id, handle.clone());
        handle
    }

    pub(crate) fn insert(&self, id: String, handle: ContextRef) {
        self.shared.contexts.write().insert(id, handle);
    }

    /// Look up a context. Expired contexts are removed and reported as absent.
    pub fn get(&self, id: &str) -> Option<ContextRef> {
        let handle = self.shared.contexts.read().get(id).cloned()?;

        let duration = self.shared.config.continuation_duration();
        let expired = match handle.try_lock() {
            Some(context) => context.is_expired(duration),
            None => false,
        };

        if expired {
            let mut contexts = self.shared.contexts.write();
            if contexts.get(id).is_some_and(|current| Arc::ptr_eq(current, &handle)) {
                contexts.remove(id);
            }
            debug!(continuation_id = %id, "Continuation expired on lookup");
            return None;
        }

        Some(handle)
    }

    /// Whether `id` is stored, without checking expiry.
    pub fn contains(&self, id: &str) -> bool {
        self.shared.contexts.read().contains_key(id)
    }

    /// Number of stored contexts, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.shared.contexts.read().len()
    }

    /// Whether no contexts are stored.
    pub fn is_empty(&self) -> bool {
        self.shared.contexts.read().is_empty()
    }

    /// Ids of all stored contexts, unordered.
    pub fn ids(&self) -> Vec<String> {
        self.shared.contexts.read().keys().cloned().collect()
    }

    /// Remove a context.
    pub fn remove(&self, id: &str) -> Option<ContextRef> {
        self.shared.contexts.write().remove(id)
    }

    /// Remove a context together with everything it is related to and all of
    /// its ancestors, returning how many contexts were removed.
    ///
    /// Must not be called while holding the lock of a context in the tree.
    pub fn remove_tree(&self, id: &str) -> usize {
        let mut pending = vec![id.to_string()];
        let mut visited = HashSet::new();
        let mut removed = 0;

        while let Some(id) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(handle) = self.remove(&id) else {
                continue;
            };
            removed += 1;

            let context = handle.lock();
            pending.extend(context.related_ids().iter().cloned());
            if let Some(parent_id) = context.parent_id() {
                pending.push(parent_id.to_string());
            }
        }

        debug!(continuation_id = %id, removed, "Removed continuation tree");
        removed
    }

    /// Prepare a paused context for resumption.
    ///
    /// Depending on the clone policy, the continuable is either forked into a
    /// new context whose parent is `id`, or the existing context is re-keyed
    /// under a fresh id. Returns `None` for unknown or expired contexts and for
    /// contexts that are not paused. A running context is reported as busy.
    pub fn resume_context(&self, id: &str) -> Result<Option<ContextRef>> {
        self.maybe_purge();

        let Some(handle) = self.get(id) else {
            return Ok(None);
        };
        let Some(mut context) = handle.try_lock() else {
            return Err(CoreError::ContinuationBusy { id: id.to_string() });
        };
        if !context.is_paused() {
            return Ok(None);
        }

        if self.shared.config.clone_continuations(context.continuable()) {
            let forked = context.fork()?;
            drop(context);
            debug!(continuation_id = %id, forked_id = %forked.id(), "Forked continuation");
            Ok(Some(self.add(forked)))
        } else {
            let previous = context.rekey();
            let new_id = context.id().to_string();
            {
                let mut contexts = self.shared.contexts.write();
                contexts.remove(&previous);
                contexts.insert(new_id.clone(), handle.clone());
            }
            drop(context);
            debug!(continuation_id = %previous, new_id = %new_id, "Reused continuation");
            Ok(Some(handle))
        }
    }

    /// Remove every expired context, returning how many were removed.
    ///
    /// Contexts that are currently executing are skipped.
    pub fn purge(&self) -> usize {
        let duration = self.shared.config.continuation_duration();
        let snapshot: Vec<(String, ContextRef)> = self
            .shared
            .contexts
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let stale: Vec<(String, ContextRef)> = snapshot
            .into_iter()
            .filter(|(_, handle)| {
                handle
                    .try_lock()
                    .is_some_and(|context| context.is_expired(duration))
            })
            .collect();

        if stale.is_empty() {
            return 0;
        }

        let mut removed = 0;
        {
            let mut contexts = self.shared.contexts.write();
            for (id, handle) in &stale {
                if contexts.get(id).is_some_and(|current| Arc::ptr_eq(current, handle)) {
                    contexts.remove(id);
                    removed += 1;
                }
            }
        }

        info!(removed, "Purged expired continuations");
        removed
    }

    /// Run a purge with probability `purge_frequency / purge_scale`.
    fn maybe_purge(&self) {
        let config = &self.shared.config;
        let scale = config.purge_scale().max(1);
        let frequency = config.purge_frequency();
        if frequency == 0 {
            return;
        }
        if rand::thread_rng().gen_range(0..scale) < frequency {
            self.purge();
        }
    }
}

impl fmt::Debug for ContinuationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationManager")
            .field("contexts", &self.len())
            .field(
                "continuation_duration",
                &self.shared.config.continuation_duration(),
            )
            .finish()
    }
}
