// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scoped context providers for widget parts.
//!
//! Widget parts built on the engine look up shared state provided by an
//! enclosing part (for example a menu item looking up its menu). Two accessor
//! kinds exist: [`Providers::require`] fails loudly with a
//! [`MissingContextError`] naming the expected provider, and
//! [`Providers::get`] returns `None` for optional context.
//!
//! ```rust
//! use understory_floating::provider::Providers;
//!
//! #[derive(Debug)]
//! struct MenuContext { depth: u8 }
//!
//! let mut scope = Providers::new();
//! assert!(scope.get::<MenuContext>().is_none());
//! let err = scope.require::<MenuContext>("Menu.Root").unwrap_err();
//! assert_eq!(err.provider, "Menu.Root");
//!
//! scope.provide(MenuContext { depth: 1 });
//! assert_eq!(scope.require::<MenuContext>("Menu.Root").unwrap().depth, 1);
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};

/// A required context was accessed outside its provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("missing context: this part must be placed within <{provider}>")]
pub struct MissingContextError {
    /// Name of the expected provider.
    pub provider: &'static str,
}

/// A stack of typed context values; inner values shadow outer ones.
#[derive(Default)]
pub struct Providers {
    values: Vec<(TypeId, Box<dyn Any>)>,
}

impl core::fmt::Debug for Providers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Providers")
            .field("values", &self.values.len())
            .finish_non_exhaustive()
    }
}

impl Providers {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide `value` to everything looked up after this point.
    pub fn provide<T: 'static>(&mut self, value: T) {
        self.values.push((TypeId::of::<T>(), Box::new(value)));
    }

    /// Remove the innermost value of type `T`.
    pub fn withdraw<T: 'static>(&mut self) -> Option<T> {
        let pos = self
            .values
            .iter()
            .rposition(|(t, _)| *t == TypeId::of::<T>())?;
        let (_, value) = self.values.remove(pos);
        value.downcast::<T>().ok().map(|b| *b)
    }

    /// Optional lookup of the innermost `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.values
            .iter()
            .rev()
            .find_map(|(_, v)| v.downcast_ref::<T>())
    }

    /// Required lookup of the innermost `T`.
    pub fn require<T: 'static>(&self, provider: &'static str) -> Result<&T, MissingContextError> {
        self.get::<T>().ok_or(MissingContextError { provider })
    }
}
