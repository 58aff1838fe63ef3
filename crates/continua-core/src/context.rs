// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Continuation contexts.
//!
//! A context is the stored record of one continuation: the continuable that
//! owns the suspended state, where to resume it, and how it relates to the
//! contexts that came before it.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::continuable::Continuable;
use crate::error::Result;
use crate::manager::{ContinuationManager, ManagerShared};
use crate::signal::{Continuation, Label, Signal};

/// Shared handle to a context. The mutex serializes execution per continuation id.
pub type ContextRef = Arc<Mutex<ContinuationContext>>;

/// Bookkeeping for one call/answer rendezvous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallState {
    continuation_id: String,
}

impl CallState {
    /// Call state for a call issued by `continuation_id`.
    pub fn new(continuation_id: impl Into<String>) -> Self {
        Self {
            continuation_id: continuation_id.into(),
        }
    }

    /// Id of the context waiting for the answer.
    pub fn continuation_id(&self) -> &str {
        &self.continuation_id
    }
}

/// One point-in-time execution state of a continuable.
pub struct ContinuationContext {
    manager: Weak<ManagerShared>,
    continuable: Box<dyn Continuable>,
    id: String,
    parent_id: Option<String>,
    related_ids: Vec<String>,
    label: Option<Label>,
    paused: bool,
    call_answer: Option<Value>,
    created_call_state: Option<CallState>,
    active_call_state: Option<CallState>,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
}

pub(crate) fn new_continuation_id() -> String {
    Uuid::new_v4().to_string()
}

impl ContinuationContext {
    /// Create a context for `continuable`, owned by `manager` but not yet stored in it.
    pub fn new(manager: &ContinuationManager, continuable: Box<dyn Continuable>) -> Self {
        let now = Utc::now();
        Self {
            manager: manager.downgrade(),
            continuable,
            id: new_continuation_id(),
            parent_id: None,
            related_ids: Vec::new(),
            label: None,
            paused: false,
            call_answer: None,
            created_call_state: None,
            active_call_state: None,
            created_at: now,
            last_access: now,
        }
    }

    /// Unique id of this continuation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The continuable holding the suspended state.
    pub fn continuable(&self) -> &dyn Continuable {
        self.continuable.as_ref()
    }

    /// Owning manager, if it is still alive.
    pub fn manager(&self) -> Option<ContinuationManager> {
        self.manager.upgrade().map(ContinuationManager::from_shared)
    }

    /// Id of the context that was active before this one.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Set the parent id.
    pub fn set_parent_id(&mut self, parent_id: Option<String>) {
        self.parent_id = parent_id;
    }

    /// Ids of contexts this one branched into or bypassed, in insertion order.
    pub fn related_ids(&self) -> &[String] {
        &self.related_ids
    }

    /// Record a related id. Duplicates are ignored.
    pub fn add_related_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.related_ids.contains(&id) {
            self.related_ids.push(id);
        }
    }

    /// Resume label, `None` for the entry point.
    pub fn label(&self) -> Option<Label> {
        self.label
    }

    /// Set the resume label.
    pub fn set_label(&mut self, label: Option<Label>) {
        self.label = label;
    }

    /// Whether the context is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Mark the context as suspended.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Answer delivered for the next execution step.
    pub fn call_answer(&self) -> Option<&Value> {
        self.call_answer.as_ref()
    }

    /// Set the answer delivered for the next execution step.
    pub fn set_call_answer(&mut self, answer: Option<Value>) {
        self.call_answer = answer;
    }

    /// Call state created when this context issued a call.
    pub fn created_call_state(&self) -> Option<&CallState> {
        self.created_call_state.as_ref()
    }

    /// Set the call state created by this context.
    pub fn set_created_call_state(&mut self, state: Option<CallState>) {
        self.created_call_state = state;
    }

    /// Call state this context answers, set on called contexts.
    pub fn active_call_state(&self) -> Option<&CallState> {
        self.active_call_state.as_ref()
    }

    /// Set the call state this context answers.
    pub fn set_active_call_state(&mut self, state: Option<CallState>) {
        self.active_call_state = state;
    }

    /// When the context was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the context was last executed or stored.
    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    /// Override the last access moment.
    pub fn set_last_access(&mut self, moment: DateTime<Utc>) {
        self.last_access = moment;
    }

    /// Refresh the last access moment.
    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    /// Whether the context has been idle for at least `duration`.
    pub fn is_expired(&self, duration: std::time::Duration) -> bool {
        Utc::now()
            .signed_duration_since(self.last_access)
            .to_std()
            .map(|idle| idle >= duration)
            .unwrap_or(false)
    }

    /// Rewrite this context to resume at its grandparent's position.
    ///
    /// Adopts the grandparent's label and parent, records the bypassed parent
    /// in the related ids and returns this context's id. Returns `None` when
    /// the parent or grandparent no longer exists; the caller restarts from
    /// the entry point.
    pub fn lookup_step_back_id(&mut self) -> Option<String> {
        let manager = self.manager()?;
        let parent_id = self.parent_id.clone()?;
        if parent_id == self.id {
            return None;
        }

        let grandparent_id = manager.get(&parent_id)?.lock().parent_id.clone()?;
        if grandparent_id == self.id {
            return None;
        }

        let (label, grandparent_parent) = {
            let grandparent = manager.get(&grandparent_id)?;
            let grandparent = grandparent.lock();
            (grandparent.label, grandparent.parent_id.clone())
        };

        self.label = label;
        self.parent_id = grandparent_parent;
        self.add_related_id(parent_id);

        Some(self.id.clone())
    }

    /// Run one step of the continuable and apply the label it asked to resume at.
    pub(crate) fn execute(&mut self) -> Signal {
        let answer = self.call_answer.take();
        let mut cx = Continuation::new(&self.id, self.label, answer);
        let signal = self.continuable.execute(&mut cx);
        if let Some(label) = cx.resume_at() {
            self.label = Some(label);
        }
        signal
    }

    /// Reset to the entry point with no ancestry.
    pub(crate) fn restart(&mut self) {
        self.label = None;
        self.parent_id = None;
    }

    /// Issue a fresh id for this context, returning the previous one.
    pub(crate) fn rekey(&mut self) -> String {
        std::mem::replace(&mut self.id, new_continuation_id())
    }

    /// Fork into a new context that continues from the same label.
    pub(crate) fn fork(&mut self) -> Result<ContinuationContext> {
        let continuable = self.continuable.fork()?;
        let now = Utc::now();
        let forked = ContinuationContext {
            manager: self.manager.clone(),
            continuable,
            id: new_continuation_id(),
            parent_id: Some(self.id.clone()),
            related_ids: Vec::new(),
            label: self.label,
            paused: false,
            call_answer: None,
            created_call_state: self.created_call_state.clone(),
            active_call_state: self.active_call_state.clone(),
            created_at: now,
            last_access: now,
        };
        self.add_related_id(forked.id.clone());
        Ok(forked)
    }

    pub(crate) fn into_ref(self) -> ContextRef {
        Arc::new(Mutex::new(self))
    }
}

impl fmt::Debug for ContinuationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationContext")
            .field("id", &self.id)
            .field("continuable", &self.continuable.type_name())
            .field("label", &self.label)
            .field("parent_id", &self.parent_id)
            .field("related_ids", &self.related_ids)
            .field("paused", &self.paused)
            .field("created_call_state", &self.created_call_state)
            .field("active_call_state", &self.active_call_state)
            .field("last_access", &self.last_access)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    #[derive(Clone)]
    struct Steps {
        visited: Vec<Option<Label>>,
    }

    impl Continuable for Steps {
        fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
            self.visited.push(cx.label());
            match cx.label() {
                None => cx.pause(1),
                Some(1) => cx.pause(2),
                Some(_) => cx.complete(),
            }
        }

        fn fork(&self) -> Result<Box<dyn Continuable>> {
            Ok(Box::new(self.clone()))
        }
    }

    fn manager() -> ContinuationManager {
        ContinuationManager::new(Arc::new(Config::default()))
    }

    fn steps() -> Box<dyn Continuable> {
        Box::new(Steps {
            visited: Vec::new(),
        })
    }

    /// Store a paused context with the given label and parent, returning its id.
    fn store(
        manager: &ContinuationManager,
        label: Option<Label>,
        parent: Option<&str>,
    ) -> String {
        let mut context = ContinuationContext::new(manager, steps());
        context.set_label(label);
        context.set_parent_id(parent.map(str::to_string));
        context.pause();
        let id = context.id().to_string();
        manager.add(context);
        id
    }

    #[test]
    fn test_execute_applies_resume_label() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        assert_eq!(context.label(), None);

        assert_eq!(context.execute(), Signal::Pause);
        assert_eq!(context.label(), Some(1));
        assert_eq!(context.execute(), Signal::Pause);
        assert_eq!(context.label(), Some(2));
        assert_eq!(context.execute(), Signal::Complete);
        assert_eq!(context.label(), Some(2));
    }

    #[test]
    fn test_execute_consumes_call_answer() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        context.set_call_answer(Some(json!("yes")));
        context.execute();
        assert!(context.call_answer().is_none());
    }

    #[test]
    fn test_related_ids_are_an_ordered_set() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        context.add_related_id("b");
        context.add_related_id("a");
        context.add_related_id("b");
        assert_eq!(context.related_ids(), ["b", "a"]);
    }

    #[test]
    fn test_step_back_adopts_grandparent() {
        let manager = manager();
        let root = store(&manager, Some(7), None);
        let grandparent = store(&manager, Some(3), Some(&root));
        let parent = store(&manager, Some(5), Some(&grandparent));

        let mut context = ContinuationContext::new(&manager, steps());
        context.set_parent_id(Some(parent.clone()));
        context.set_label(Some(9));

        let target = context.lookup_step_back_id();

        assert_eq!(target.as_deref(), Some(context.id()));
        assert_eq!(context.label(), Some(3));
        assert_eq!(context.parent_id(), Some(root.as_str()));
        assert_eq!(context.related_ids(), [parent]);
    }

    #[test]
    fn test_step_back_without_grandparent() {
        let manager = manager();
        let parent = store(&manager, Some(5), None);

        let mut context = ContinuationContext::new(&manager, steps());
        context.set_parent_id(Some(parent));
        context.set_label(Some(9));

        assert_eq!(context.lookup_step_back_id(), None);
        assert_eq!(context.label(), Some(9));
        assert!(context.related_ids().is_empty());
    }

    #[test]
    fn test_step_back_with_purged_parent() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        context.set_parent_id(Some("gone".to_string()));
        assert_eq!(context.lookup_step_back_id(), None);
    }

    #[test]
    fn test_step_back_without_manager() {
        let mut context = {
            let manager = manager();
            ContinuationContext::new(&manager, steps())
        };
        context.set_parent_id(Some("p".to_string()));
        assert!(context.manager().is_none());
        assert_eq!(context.lookup_step_back_id(), None);
    }

    #[test]
    fn test_fork_links_branch() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        context.set_label(Some(1));
        context.pause();
        context.set_call_answer(Some(json!(1)));

        let forked = context.fork().unwrap();

        assert_ne!(forked.id(), context.id());
        assert_eq!(forked.parent_id(), Some(context.id()));
        assert_eq!(forked.label(), Some(1));
        assert!(!forked.is_paused());
        assert!(forked.call_answer().is_none());
        assert_eq!(context.related_ids(), [forked.id().to_string()]);
    }

    #[test]
    fn test_is_expired() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        let duration = std::time::Duration::from_secs(60);
        assert!(!context.is_expired(duration));

        context.set_last_access(Utc::now() - chrono::Duration::seconds(61));
        assert!(context.is_expired(duration));

        context.touch();
        assert!(!context.is_expired(duration));
    }

    #[test]
    fn test_rekey_issues_new_id() {
        let manager = manager();
        let mut context = ContinuationContext::new(&manager, steps());
        let before = context.id().to_string();
        let previous = context.rekey();
        assert_eq!(previous, before);
        assert_ne!(context.id(), before);
    }
}
