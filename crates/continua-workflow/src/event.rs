// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow events and listeners.

use continua_core::{Continuation, Label, Signal};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// An event that waiting work can consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Event {
    /// Create an event of `event_type` without data.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: None,
        }
    }

    /// Attach data to the event.
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// The event type waiting work is matched on.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Data carried by the event.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The value delivered to waiting work as its call answer.
    pub fn to_value(&self) -> Value {
        json!({ "type": self.event_type, "data": self.data })
    }

    /// Decode an event delivered as a call answer.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

/// Notified after every triggered event.
pub trait EventListener: Send + Sync {
    /// Called once the event was dispatched or queued.
    fn event_triggered(&self, event: &Event);
}

impl<F> EventListener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn event_triggered(&self, event: &Event) {
        self(event)
    }
}

/// Event helpers for continuables running inside a workflow.
pub trait EventContinuation {
    /// Suspend until an event of `event_type` arrives, resuming at `resume_at`.
    fn wait_for_event(&mut self, resume_at: Label, event_type: &str) -> Signal;

    /// Take the event that resumed this step.
    fn take_event(&mut self) -> Option<Event>;
}

impl EventContinuation for Continuation<'_> {
    fn wait_for_event(&mut self, resume_at: Label, event_type: &str) -> Signal {
        self.call(resume_at, event_type)
    }

    fn take_event(&mut self) -> Option<Event> {
        self.take_call_answer().and_then(Event::from_value)
    }
}
