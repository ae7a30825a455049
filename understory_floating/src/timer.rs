// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cancelable deadlines and abort signals.
//!
//! All suspension points are modeled as deadlines in host milliseconds. A
//! frame deferral is a deadline equal to the current time, so it fires on the
//! next [`advance`](crate::Floating::advance) call.

use alloc::rc::Rc;
use core::cell::Cell;

/// A single cancelable timeout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeout {
    deadline: Option<u64>,
}

impl Timeout {
    /// An unarmed timeout.
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timeout to fire `delay` ms after `now`, replacing any pending deadline.
    pub fn set(&mut self, now: u64, delay: u64) {
        self.deadline = Some(now.saturating_add(delay));
    }

    /// Arm the timeout for the next frame.
    pub fn defer(&mut self, now: u64) {
        self.deadline = Some(now);
    }

    /// Cancel the timeout.
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Returns true while a deadline is pending.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed at `now`.
    pub fn take_due(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of a set of optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<u64>>) -> Option<u64> {
    deadlines.into_iter().flatten().min()
}

/// Owner side of an abort signal.
#[derive(Clone, Debug, Default)]
pub struct AbortController {
    flag: Rc<Cell<bool>>,
}

impl AbortController {
    /// A fresh, not yet aborted controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal observed by the waiting side.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            flag: self.flag.clone(),
        }
    }

    /// Abort every wait observing this controller's signal.
    pub fn abort(&self) {
        self.flag.set(true);
    }
}

/// Observer side of an [`AbortController`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    flag: Rc<Cell<bool>>,
}

impl AbortSignal {
    /// Returns true once the controller aborted.
    pub fn is_aborted(&self) -> bool {
        self.flag.get()
    }
}
