// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Floating: headless interaction and focus management for anchored overlays.
//!
//! Tooltips, popovers, menus, selects and dialogs share the same problems:
//! when to open, when to close, where focus goes, and which attributes tie
//! the trigger to the panel. This crate solves them without a renderer. It
//! is organized as:
//!
//! - A host-mirrored **document** ([`dom::Document`]) holding the elements the
//!   engine needs to reason about, their flags, rects and focus state.
//! - A **root context** ([`context::FloatingContext`]) per overlay, with its
//!   open state, element references and a shared data bag.
//! - Independent **interaction sources** ([`sources`]) such as hover with a
//!   safe polygon, click, focus, dismiss, role, client point, list navigation
//!   and typeahead. Each contributes props and open/close requests.
//! - A **focus manager** ([`focus_manager::FocusManager`]) for initial focus,
//!   trapping, outside marking and focus return.
//! - A **floating tree** ([`tree::FloatingTree`]) linking nested overlays so
//!   that dismissal and navigation cooperate across levels.
//! - The [`Floating`] facade, which merges source props, runs handler chains
//!   and routes document events, timers and open changes.
//!
//! Time is explicit: every entry point receives `now` in milliseconds, and
//! hosts wake the engine at [`Floating::next_deadline`].
//!
//! ## Minimal example
//!
//! A click-toggled popover dismissed with Escape:
//!
//! ```rust
//! use kurbo::{Point, Rect};
//! use understory_floating::dom::{Document, ElementData, ElementFlags};
//! use understory_floating::event::{Event, EventKind, Key};
//! use understory_floating::props::{AttrValue, PropTarget};
//! use understory_floating::services::Services;
//! use understory_floating::sources::{
//!     AriaRole, Click, ClickOptions, Dismiss, DismissOptions, Role,
//! };
//! use understory_floating::tree::FloatingTree;
//! use understory_floating::{Env, Floating, dispatch_document_event};
//!
//! let mut document = Document::new();
//! let mut tree = FloatingTree::new();
//! let mut services = Services::new();
//! let body = document.body();
//! let button = document
//!     .insert(
//!         body,
//!         ElementData::new(
//!             Rect::new(0., 0., 80., 20.),
//!             ElementFlags::TABBABLE | ElementFlags::BUTTON,
//!         ),
//!     )
//!     .unwrap();
//! let panel = document
//!     .insert(body, ElementData::new(Rect::new(0., 24., 200., 124.), ElementFlags::empty()))
//!     .unwrap();
//!
//! let mut popover = Floating::new(&mut services)
//!     .with_source(Click::new(ClickOptions::default()))
//!     .with_source(Dismiss::new(DismissOptions::default()))
//!     .with_source(Role::new(AriaRole::Dialog));
//! popover.context_mut().set_reference(Some(button));
//! popover.context_mut().set_floating(Some(panel));
//! popover.register(&mut tree, None);
//!
//! let mut env = Env { document: &mut document, tree: &mut tree, services: &mut services, now: 0 };
//! let mut click = Event::mouse(EventKind::Click, Point::new(10., 10.), 0).with_target(button);
//! popover.dispatch(PropTarget::Reference, &mut click, &mut env);
//! assert!(popover.open());
//! assert_eq!(popover.reference_props().attr("aria-expanded"), Some(&AttrValue::from("true")));
//!
//! env.now = 100;
//! let mut escape = Event::key_down(Key::Escape, 100);
//! dispatch_document_event(&mut [&mut popover], &mut escape, &mut env);
//! assert!(!popover.open());
//! ```
//!
//! ## Features
//!
//! - `std` (default): enables `std` support for dependencies such as `kurbo`.
//! - `libm`: enables `no_std` + `alloc` builds that rely on `libm` for floating-point math.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod context;
pub mod dom;
pub mod emitter;
pub mod event;
pub mod floating;
pub mod focus_manager;
pub mod position;
pub mod props;
pub mod provider;
pub mod safe_polygon;
pub mod services;
pub mod sources;
pub mod timer;
pub mod transition;
pub mod tree;

#[cfg(test)]
mod testing;

pub use floating::{Env, Floating, dispatch_document_event};
