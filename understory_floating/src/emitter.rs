// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal named-event pub/sub.

use alloc::boxed::Box;
use alloc::vec::Vec;

/// Name of the event emitted on every open/close transition of an instance.
pub const OPEN_CHANGE: &str = "openchange";

/// Name of the tree-wide event emitted when virtual focus moves to an element.
pub const VIRTUAL_FOCUS: &str = "virtualfocus";

/// Handle returned by [`Emitter::on`], used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&T)>;

/// Named-event emitter carrying payloads of type `T`.
pub struct Emitter<T> {
    listeners: Vec<(ListenerId, &'static str, Listener<T>)>,
    next: u64,
}

impl<T> core::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next: 0,
        }
    }
}

impl<T> Emitter<T> {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `name`.
    pub fn on(&mut self, name: &'static str, listener: impl FnMut(&T) + 'static) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.listeners.push((id, name, Box::new(listener)));
        id
    }

    /// Unsubscribe. Returns false if `id` was unknown.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _, _)| *l != id);
        before != self.listeners.len()
    }

    /// Call every listener of `name` in subscription order.
    pub fn emit(&mut self, name: &str, payload: &T) {
        for (_, n, listener) in &mut self.listeners {
            if *n == name {
                listener(payload);
            }
        }
    }

    /// Number of listeners subscribed to `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.iter().filter(|(_, n, _)| *n == name).count()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
