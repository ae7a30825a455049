// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interaction sources.
//!
//! A source is an independent producer of element props and open/close
//! requests. Each one reads its own options plus the shared
//! [`FloatingContext`], and reacts to:
//!
//! - element events on the targets it declared handlers for;
//! - document-level events it registered listeners for;
//! - timer deadlines through [`Interaction::advance`];
//! - open-state changes made by any source, through [`Interaction::open_changed`].
//!
//! Sources never call each other. Everything they share lives in the context
//! and its data bag, or in the floating tree.

use alloc::vec::Vec;
use core::any::Any;

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::dom::{Document, ElementId};
use crate::event::{DocumentListeners, Event, Phase};
use crate::props::{PropTarget, PropsPatch};
use crate::services::{InstanceId, Services};
use crate::tree::{FloatingTree, NodeCommand, NodeId};

pub mod click;
pub mod client_point;
pub mod dismiss;
pub mod focus;
pub mod hover;
pub mod list_navigation;
pub mod role;
pub mod typeahead;

pub use click::{Click, ClickEvent, ClickOptions};
pub use client_point::{Axis, ClientPoint, ClientPointOptions};
pub use dismiss::{Dismiss, DismissBubbles, DismissOptions, OutsidePress, PressEvent};
pub use focus::{Focus, FocusOpenOptions};
pub use hover::{Delay, Hover, HoverOptions};
pub use list_navigation::{FocusItemOnOpen, ListNavigation, ListNavigationOptions, Orientation};
pub use role::{AriaRole, Role};
pub use typeahead::{Typeahead, TypeaheadOptions};

/// Everything a source may read or mutate while handling an input.
#[derive(Debug)]
pub struct InteractionCx<'a> {
    /// This instance's context.
    pub ctx: &'a mut FloatingContext,
    /// Host-mirrored document.
    pub document: &'a mut Document,
    /// Floating tree shared by nested instances.
    pub tree: &'a mut FloatingTree,
    /// Page-wide services.
    pub services: &'a mut Services,
    /// Identifier of this instance.
    pub instance: InstanceId,
    /// Current time in milliseconds.
    pub now: u64,
}

impl InteractionCx<'_> {
    /// Current open state.
    pub fn open(&self) -> bool {
        self.ctx.open()
    }

    /// Request an open-state change; see [`FloatingContext::on_open_change`].
    pub fn request(&mut self, open: bool, event: &Event, reason: OpenChangeReason) -> bool {
        self.ctx.on_open_change(open, event, reason)
    }

    /// Tree node of this instance.
    pub fn node(&self) -> Option<NodeId> {
        self.ctx.node_id()
    }

    /// Open child nodes of this instance.
    pub fn open_children(&self) -> Vec<NodeId> {
        self.node()
            .map(|n| self.tree.children(n, true))
            .unwrap_or_default()
    }

    /// Open descendant nodes of this instance.
    pub fn open_descendants(&self) -> Vec<NodeId> {
        self.node()
            .map(|n| self.tree.descendants(n, true))
            .unwrap_or_default()
    }

    /// Returns true if `element` is inside the floating element of an open descendant.
    pub fn in_descendant_floating(&self, element: ElementId) -> bool {
        self.open_descendants().into_iter().any(|n| {
            self.tree
                .context(n)
                .and_then(|c| c.floating)
                .is_some_and(|f| self.document.contains(f, element))
        })
    }

    /// Returns true if `element` is inside this instance's floating element.
    pub fn in_floating(&self, element: Option<ElementId>) -> bool {
        match (self.ctx.elements().floating, element) {
            (Some(f), Some(e)) => self.document.contains(f, e),
            _ => false,
        }
    }

    /// Returns true if `element` is inside this instance's reference element.
    pub fn in_reference(&self, element: Option<ElementId>) -> bool {
        match (self.ctx.elements().dom_reference, element) {
            (Some(r), Some(e)) => self.document.contains(r, e),
            _ => false,
        }
    }
}

/// A producer of element props and open/close requests.
///
/// Every method except [`props`](Interaction::props) has a no-op default.
pub trait Interaction: Any {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Props this source contributes to `target`.
    fn props(&self, target: &PropTarget, ctx: &FloatingContext) -> PropsPatch;

    /// Handle an element event on `target`.
    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        let _ = (target, event, cx);
    }

    /// Document-level listeners currently wanted.
    fn document_listeners(&self, ctx: &FloatingContext) -> DocumentListeners {
        let _ = ctx;
        DocumentListeners::default()
    }

    /// Handle a document-level event delivered in `phase`.
    fn handle_document_event(
        &mut self,
        event: &mut Event,
        phase: Phase,
        cx: &mut InteractionCx<'_>,
    ) {
        let _ = (event, phase, cx);
    }

    /// Fire due timers.
    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        let _ = cx;
    }

    /// Earliest pending deadline.
    fn next_deadline(&self) -> Option<u64> {
        None
    }

    /// React to an open-state change, whichever source caused it.
    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        let _ = (details, cx);
    }

    /// Handle a command posted to this instance's tree node.
    fn handle_command(&mut self, command: &NodeCommand, cx: &mut InteractionCx<'_>) {
        let _ = (command, cx);
    }

    /// Release timers and any document state on unmount.
    fn teardown(&mut self, cx: &mut InteractionCx<'_>) {
        let _ = cx;
    }
}
