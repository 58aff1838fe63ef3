// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for continua-core integration tests.
//!
//! Provides a shared output journal and the continuables the tests drive.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use continua_core::{
    Config, Continuable, ContinuableRunner, ContinuableRunnerBuilder, Continuation, Result, Signal,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Output shared between a test and the continuables it runs, including forks.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.0.lock().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn text(&self) -> String {
        self.0.lock().join("\n")
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Configuration with random purges disabled so tests stay deterministic.
pub fn config() -> Config {
    Config::default().with_purge_chance(0, 1000)
}

pub fn builder(config: Config) -> ContinuableRunnerBuilder {
    ContinuableRunner::builder().config(Arc::new(config))
}

/// Prints around a single pause.
#[derive(Clone)]
pub struct PauseOnce {
    pub journal: Journal,
}

impl Continuable for PauseOnce {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        match cx.label() {
            None => {
                self.journal.push("before pause");
                cx.pause(1)
            }
            Some(_) => {
                self.journal.push("after pause");
                cx.complete()
            }
        }
    }

    fn fork(&self) -> Result<Box<dyn Continuable>> {
        Ok(Box::new(self.clone()))
    }
}

/// Returns without suspending.
pub struct Straight {
    pub journal: Journal,
}

impl Continuable for Straight {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        self.journal.push("straight through");
        cx.complete()
    }
}

/// Calls `target` and prints the answer between two markers.
#[derive(Clone)]
pub struct Caller {
    pub journal: Journal,
    pub target: &'static str,
}

impl Continuable for Caller {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        match cx.label() {
            None => {
                self.journal.push("before call");
                cx.call(1, self.target)
            }
            Some(_) => {
                let answer = match cx.take_call_answer() {
                    Some(Value::String(text)) => text,
                    Some(other) => other.to_string(),
                    None => "no answer".to_string(),
                };
                self.journal.push(answer);
                self.journal.push("after call");
                cx.complete()
            }
        }
    }

    fn fork(&self) -> Result<Box<dyn Continuable>> {
        Ok(Box::new(self.clone()))
    }
}

/// Answers a fixed string immediately.
pub struct FixedAnswer(pub &'static str);

impl Continuable for FixedAnswer {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        cx.answer(self.0)
    }
}

/// Answers `true` once the flag is raised, pausing until then.
#[derive(Clone)]
pub struct FlagAnswer {
    pub flag: Arc<AtomicBool>,
}

impl Continuable for FlagAnswer {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        if self.flag.load(Ordering::SeqCst) {
            cx.answer(true)
        } else {
            cx.pause(1)
        }
    }

    fn fork(&self) -> Result<Box<dyn Continuable>> {
        Ok(Box::new(self.clone()))
    }
}

/// Counts down from five, pausing on every iteration, then once more with -1.
#[derive(Clone)]
pub struct Countdown {
    pub journal: Journal,
    pub count: i32,
}

impl Countdown {
    pub const LOOP: u32 = 1;
    pub const DONE: u32 = 2;
}

impl Continuable for Countdown {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        match cx.label() {
            None => {
                self.count = 5;
            }
            Some(Self::LOOP) => {
                self.count -= 1;
            }
            Some(_) => {
                self.journal.push("done");
                return cx.complete();
            }
        }

        if self.count > 0 {
            self.journal.push(format!("count {}", self.count));
            cx.pause(Self::LOOP)
        } else {
            self.count = -1;
            self.journal.push(format!("count {}", self.count));
            cx.pause(Self::DONE)
        }
    }

    fn fork(&self) -> Result<Box<dyn Continuable>> {
        Ok(Box::new(self.clone()))
    }
}

/// A three page wizard that steps back when asked to go past the last page.
#[derive(Clone)]
pub struct Wizard {
    pub journal: Journal,
}

impl Continuable for Wizard {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        match cx.label() {
            None => {
                self.journal.push("page 1");
                cx.pause(1)
            }
            Some(1) => {
                self.journal.push("page 2");
                cx.pause(2)
            }
            Some(2) => {
                self.journal.push("page 3");
                cx.pause(3)
            }
            Some(_) => {
                self.journal.push("back");
                cx.step_back()
            }
        }
    }

    fn fork(&self) -> Result<Box<dyn Continuable>> {
        Ok(Box::new(self.clone()))
    }
}

/// Calls itself until `max_depth` levels are nested, then steps back from the
/// innermost level.
pub struct Nest {
    pub journal: Journal,
    pub depth_counter: Arc<AtomicUsize>,
    pub max_depth: usize,
    pub depth: usize,
}

impl Nest {
    pub fn factory(
        journal: Journal,
        max_depth: usize,
    ) -> impl Fn() -> Box<dyn Continuable> + Send + Sync + 'static {
        let depth_counter = Arc::new(AtomicUsize::new(0));
        move || -> Box<dyn Continuable> {
            Box::new(Nest {
                journal: journal.clone(),
                depth_counter: depth_counter.clone(),
                max_depth,
                depth: 0,
            })
        }
    }
}

impl Continuable for Nest {
    fn execute(&mut self, cx: &mut Continuation<'_>) -> Signal {
        match cx.label() {
            None => {
                self.depth = self.depth_counter.fetch_add(1, Ordering::SeqCst);
                self.journal.push(format!("enter {} {}", self.depth, cx.id()));
                if self.depth < self.max_depth {
                    cx.call(1, "nest")
                } else {
                    cx.step_back()
                }
            }
            Some(1) => {
                self.journal.push(format!("resume {} {}", self.depth, cx.id()));
                cx.pause(2)
            }
            Some(_) => cx.answer(json!(self.depth)),
        }
    }
}
