// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Control-flow signals and the per-step continuation handle.
//!
//! A continuable yields exactly one [`Signal`] per execution step. Signals are
//! ordinary values: the runner matches on them, they are never errors.
//!
//! ```text
//!   execute(cx) ──► Complete ──► context removed, runner returns None
//!               ├─► Pause    ──► context stored, runner returns its id
//!               ├─► Call     ──► context parked, target started with parent = id
//!               ├─► Answer   ──► waiting caller re-entered with the value
//!               └─► StepBack ──► context adopts grandparent label, re-executed
//! ```

use serde_json::Value;

/// Resume marker inside a continuable. `None` in a context means the entry point.
pub type Label = u32;

/// Raw call target handed to the call target retriever.
pub type CallTarget = Value;

/// Outcome of one execution step.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// The continuable returned normally.
    Complete,
    /// Suspend until an external trigger resumes the continuation.
    Pause,
    /// Suspend and run the continuable resolved from `target`.
    Call {
        /// Target passed to the call target retriever.
        target: CallTarget,
    },
    /// Hand `value` back to whichever continuable called this one.
    Answer {
        /// The answered value.
        value: Value,
    },
    /// Rewind to the point before the most recent call was entered.
    StepBack,
}

impl Signal {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Complete => "complete",
            Signal::Pause => "pause",
            Signal::Call { .. } => "call",
            Signal::Answer { .. } => "answer",
            Signal::StepBack => "step_back",
        }
    }
}

/// Handle given to [`Continuable::execute`](crate::Continuable::execute).
///
/// Exposes where execution resumes and the value of a pending call, and builds
/// the signals that suspend execution. The suspending methods record the label
/// to resume at; the runner applies it to the context after the step.
#[derive(Debug)]
pub struct Continuation<'a> {
    id: &'a str,
    label: Option<Label>,
    call_answer: Option<Value>,
    resume_at: Option<Label>,
}

impl<'a> Continuation<'a> {
    pub(crate) fn new(id: &'a str, label: Option<Label>, call_answer: Option<Value>) -> Self {
        Self {
            id,
            label,
            call_answer,
            resume_at: None,
        }
    }

    /// Id of the context being executed.
    pub fn id(&self) -> &str {
        self.id
    }

    /// Label to resume at, `None` when entering from the start.
    pub fn label(&self) -> Option<Label> {
        self.label
    }

    /// Value delivered by the answer to this continuable's last call.
    pub fn call_answer(&self) -> Option<&Value> {
        self.call_answer.as_ref()
    }

    /// Take the delivered answer out of the handle.
    pub fn take_call_answer(&mut self) -> Option<Value> {
        self.call_answer.take()
    }

    /// Suspend, resuming at `resume_at` on the next run.
    pub fn pause(&mut self, resume_at: Label) -> Signal {
        self.resume_at = Some(resume_at);
        Signal::Pause
    }

    /// Call `target`, resuming at `resume_at` once it answers.
    pub fn call(&mut self, resume_at: Label, target: impl Into<CallTarget>) -> Signal {
        self.resume_at = Some(resume_at);
        Signal::Call {
            target: target.into(),
        }
    }

    /// Answer the pending call with `value`.
    pub fn answer(&mut self, value: impl Into<Value>) -> Signal {
        Signal::Answer {
            value: value.into(),
        }
    }

    /// Step back to the grandparent's resume point.
    pub fn step_back(&mut self) -> Signal {
        Signal::StepBack
    }

    /// Finish normally.
    pub fn complete(&mut self) -> Signal {
        Signal::Complete
    }

    pub(crate) fn resume_at(&self) -> Option<Label> {
        self.resume_at
    }
}
