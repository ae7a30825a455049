// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus manager: initial focus, focus trapping, outside marking and focus return.
//!
//! While open, the manager:
//!
//! - moves focus to the initial target one frame after opening, unless focus
//!   is already inside the floating element;
//! - inserts two focus guard sentinels as the first and last children of the
//!   floating element. In modal mode a focused guard wraps focus around the
//!   content; in non-modal portaled mode it hands focus to the neighbor of the
//!   portal in author tab order;
//! - marks everything outside the floating tree. Modal mode uses `inert`, or
//!   `aria-hidden` plus mandatory guards where `inert` is unsupported. Marks
//!   are reference counted, so nested modals compose and unwind in any order.
//!
//! On close it returns focus to the reference (or the most recent connected
//! entry of the focus history) unless focus has moved somewhere unrelated.

use alloc::vec::Vec;

use kurbo::Rect;
use smallvec::SmallVec;

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::dom::{Document, ElementData, ElementFlags, ElementId, FocusOptions, GuardKind};
use crate::event::{Event, EventKind, EventTypes, Key, Modifiers};
use crate::props::{PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};
use crate::timer::{Timeout, earliest};

/// One stop of the focus cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FocusOrder {
    /// The reference element.
    Reference,
    /// The floating element itself.
    Floating,
    /// Tabbable content of the floating element.
    Content,
}

/// Where focus goes when the floating element opens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InitialFocus {
    /// The n-th tabbable element of the content, falling back to the floating element.
    Tabbable(usize),
    /// A specific element.
    Element(ElementId),
    /// Leave focus alone.
    None,
}

impl Default for InitialFocus {
    fn default() -> Self {
        Self::Tabbable(0)
    }
}

/// Where focus goes when the floating element closes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ReturnFocus {
    /// The reference, or the most recent entry of the focus history.
    #[default]
    Previous,
    /// A specific element.
    Element(ElementId),
    /// Leave focus alone.
    None,
}

/// Focus manager configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusManagerOptions {
    /// Disable every behavior.
    pub disabled: bool,
    /// Focus cycle composition.
    pub order: SmallVec<[FocusOrder; 3]>,
    /// Initial focus target.
    pub initial_focus: InitialFocus,
    /// Focus return target.
    pub return_focus: ReturnFocus,
    /// Move focus back into the floating element when the focused node disappears.
    pub restore_focus: bool,
    /// Render focus guards.
    pub guards: bool,
    /// Trap focus and mark outside content inert.
    pub modal: bool,
    /// Close when focus moves outside the floating tree (non-modal only).
    pub close_on_focus_out: bool,
    /// Mark outside content `inert` in non-modal mode too.
    pub outside_elements_inert: bool,
}

impl Default for FocusManagerOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            order: SmallVec::from_slice(&[FocusOrder::Content]),
            initial_focus: InitialFocus::default(),
            return_focus: ReturnFocus::default(),
            restore_focus: false,
            guards: true,
            modal: true,
            close_on_focus_out: true,
            outside_elements_inert: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Mark {
    element: ElementId,
    inert: bool,
    aria: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Guards {
    before: ElementId,
    after: ElementId,
}

#[derive(Copy, Clone, Debug)]
struct Closing {
    active: Option<ElementId>,
    inside_tree: bool,
}

/// Focus manager of one instance.
#[derive(Clone, Debug, Default)]
pub struct FocusManager {
    options: FocusManagerOptions,
    guards: Option<Guards>,
    marks: Vec<Mark>,
    initial: Timeout,
    return_check: Timeout,
    restore_check: Timeout,
    pointer_reset: Timeout,
    pointer_down: bool,
    prevent_return: bool,
    closing: Option<Closing>,
    last_index: Option<usize>,
}

impl FocusManager {
    /// A focus manager with `options`.
    pub fn new(options: FocusManagerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options.
    pub fn options(&self) -> &FocusManagerOptions {
        &self.options
    }

    /// The installed `(before, after)` guard elements.
    pub fn guards(&self) -> Option<(ElementId, ElementId)> {
        self.guards.map(|g| (g.before, g.after))
    }

    /// Number of elements currently marked by this instance.
    pub fn marked_count(&self) -> usize {
        self.marks.len()
    }

    fn is_guard(doc: &Document, id: ElementId) -> bool {
        doc.data(id).is_some_and(|d| d.guard.is_some())
    }

    fn content(doc: &Document, floating: ElementId) -> Vec<ElementId> {
        doc.tabbables_within(floating)
            .into_iter()
            .filter(|e| !Self::is_guard(doc, *e))
            .collect()
    }

    /// Tabbable stops in cycle order.
    fn cycle(&self, cx: &InteractionCx<'_>) -> Vec<ElementId> {
        let doc = &*cx.document;
        let elements = cx.ctx.elements();
        let mut out = Vec::new();
        for stop in &self.options.order {
            match stop {
                FocusOrder::Reference => {
                    out.extend(elements.dom_reference.filter(|r| doc.is_focusable(*r)));
                }
                FocusOrder::Floating => {
                    out.extend(elements.floating.filter(|f| doc.is_focusable(*f)));
                }
                FocusOrder::Content => {
                    if let Some(f) = elements.floating {
                        out.extend(Self::content(doc, f));
                    }
                }
            }
        }
        out
    }

    fn portal_root(cx: &InteractionCx<'_>, floating: ElementId) -> Option<ElementId> {
        core::iter::once(floating)
            .chain(cx.document.ancestors(floating))
            .find(|e| cx.services.portals.is_portaled(*e))
    }

    fn renders_guards(&self, cx: &InteractionCx<'_>, floating: ElementId) -> bool {
        let guards = self.options.guards || !cx.document.supports_inert;
        guards && (self.options.modal || Self::portal_root(cx, floating).is_some())
    }

    fn focus(cx: &mut InteractionCx<'_>, target: Option<ElementId>, prevent_scroll: bool) {
        if let Some(target) = target {
            tracing::trace!(?target, "focus manager moves focus");
            let prevent_scroll = prevent_scroll && cx.document.supports_prevent_scroll;
            cx.document.focus(target, FocusOptions { prevent_scroll });
        }
    }

    fn install_guards(&mut self, cx: &mut InteractionCx<'_>, floating: ElementId) {
        if self.guards.is_some() || !self.renders_guards(cx, floating) {
            return;
        }
        let guard = || ElementData {
            guard: Some(GuardKind::Inside),
            ..ElementData::new(Rect::ZERO, ElementFlags::TABBABLE)
        };
        let doc = &mut *cx.document;
        let before = match doc.children_of(floating).first().copied() {
            Some(first) => doc.insert_before(first, guard()),
            None => doc.insert(floating, guard()),
        };
        let after = doc.insert(floating, guard());
        if let (Some(before), Some(after)) = (before, after) {
            self.guards = Some(Guards { before, after });
        }
    }

    fn remove_guards(&mut self, doc: &mut Document) {
        if let Some(g) = self.guards.take() {
            doc.remove(g.before);
            doc.remove(g.after);
        }
    }

    /// Elements that stay interactive while others are marked.
    fn inside_elements(&self, cx: &InteractionCx<'_>, floating: ElementId) -> Vec<ElementId> {
        let mut inside = alloc::vec![floating];
        let elements = cx.ctx.elements();
        if self.options.order.contains(&FocusOrder::Reference) || !self.options.modal {
            inside.extend(elements.dom_reference);
        }
        if let Some(node) = cx.node() {
            for child in cx.tree.descendants(node, false) {
                if let Some(c) = cx.tree.context(child) {
                    inside.extend(c.floating);
                }
            }
            if !self.options.modal {
                for ancestor in cx.tree.ancestors(node) {
                    if let Some(c) = cx.tree.context(ancestor) {
                        inside.extend(c.floating);
                    }
                }
            }
        }
        inside
    }

    fn mark_others(&mut self, cx: &mut InteractionCx<'_>, floating: ElementId) {
        let avoid = self.inside_elements(cx, floating);
        let doc = &*cx.document;
        let (inert, aria) = if self.options.modal {
            (doc.supports_inert, !doc.supports_inert)
        } else {
            (self.options.outside_elements_inert && doc.supports_inert, false)
        };
        let mut targets = Vec::new();
        let mut stack = alloc::vec![doc.body()];
        while let Some(node) = stack.pop() {
            for child in doc.children_of(node) {
                let child = *child;
                if avoid.iter().any(|a| doc.contains(*a, child)) || Self::is_guard(doc, child) {
                    continue;
                }
                if avoid.iter().any(|a| doc.contains(child, *a)) {
                    stack.push(child);
                } else {
                    targets.push(child);
                }
            }
        }
        tracing::trace!(count = targets.len(), inert, aria, "marking outside elements");
        for element in targets {
            cx.document.adjust_marks(element, inert, aria, 1);
            self.marks.push(Mark {
                element,
                inert,
                aria,
            });
        }
    }

    fn unmark(&mut self, doc: &mut Document) {
        for m in self.marks.drain(..) {
            doc.adjust_marks(m.element, m.inert, m.aria, -1);
        }
    }

    fn return_target(&self, cx: &InteractionCx<'_>) -> Option<ElementId> {
        match self.options.return_focus {
            ReturnFocus::None => None,
            ReturnFocus::Element(e) => Some(e),
            ReturnFocus::Previous => cx
                .ctx
                .elements()
                .dom_reference
                .filter(|r| cx.document.is_focusable(*r))
                .or_else(|| cx.services.focus_history.previous(cx.document)),
        }
    }

    fn in_floating_tree(cx: &InteractionCx<'_>, element: ElementId) -> bool {
        cx.in_floating(Some(element)) || cx.in_descendant_floating(element)
    }

    fn moved_to_unrelated(&self, cx: &InteractionCx<'_>, related: ElementId) -> bool {
        let doc = &*cx.document;
        let elements = cx.ctx.elements();
        if cx.in_reference(Some(related))
            || cx.in_floating(Some(related))
            || elements.floating.is_some_and(|f| doc.contains(related, f))
            || Self::is_guard(doc, related)
        {
            return false;
        }
        if let Some(f) = elements.floating
            && Self::portal_root(cx, f).is_some_and(|p| doc.contains(p, related))
        {
            return false;
        }
        let Some(node) = cx.node() else {
            return true;
        };
        let in_child = cx.tree.descendants(node, true).into_iter().any(|n| {
            cx.tree.context(n).is_some_and(|c| {
                doc.contains_any([c.floating, c.dom_reference], related)
            })
        });
        let is_ancestor = cx.tree.ancestors(node).into_iter().any(|n| {
            cx.tree
                .context(n)
                .is_some_and(|c| c.floating == Some(related) || c.dom_reference == Some(related))
        });
        !in_child && !is_ancestor
    }

    fn on_focus_out(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if self.options.restore_focus && event.related_target.is_none() {
            self.restore_check.defer(cx.now);
        }
        let Some(related) = event.related_target else {
            return;
        };
        if self.options.modal || !self.options.close_on_focus_out || self.pointer_down {
            return;
        }
        if !self.moved_to_unrelated(cx, related) {
            return;
        }
        if cx.services.focus_history.previous(cx.document) == Some(related) {
            return;
        }
        self.prevent_return = true;
        cx.request(false, event, OpenChangeReason::FocusOut);
    }

    fn on_guard_focus(&mut self, guard: ElementId, event: &Event, cx: &mut InteractionCx<'_>) {
        let Some(guards) = self.guards else {
            return;
        };
        let Some(floating) = cx.ctx.elements().floating else {
            return;
        };
        let before = guard == guards.before;
        if self.options.modal {
            let cycle = self.cycle(cx);
            let target = if before {
                if self.options.order.first() == Some(&FocusOrder::Reference) {
                    cycle.first()
                } else {
                    cycle.last()
                }
            } else {
                cycle.first()
            };
            Self::focus(cx, target.copied().or(Some(floating)), false);
            return;
        }
        let Some(portal) = Self::portal_root(cx, floating) else {
            return;
        };
        let leaving = event
            .related_target
            .is_some_and(|r| cx.document.contains(floating, r));
        let target = if before {
            self.prevent_return = false;
            if leaving {
                cx.services.portals.prev_tabbable(cx.document, guard, Some(portal))
            } else {
                Self::content(cx.document, floating).first().copied()
            }
        } else {
            if self.options.close_on_focus_out {
                self.prevent_return = true;
            }
            if leaving {
                cx.services.portals.next_tabbable(cx.document, guard, Some(portal))
            } else {
                Self::content(cx.document, floating).last().copied()
            }
        };
        Self::focus(cx, target, false);
    }

    fn on_key_down(&mut self, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if event.key != Some(Key::Tab) || !self.options.modal {
            return;
        }
        let Some(floating) = cx.ctx.elements().floating else {
            return;
        };
        let cycle = self.cycle(cx);
        let focus_inside = cx
            .document
            .active_element()
            .is_some_and(|a| cx.document.contains(floating, a));
        if cycle.is_empty() {
            if focus_inside {
                event.stop();
            }
            return;
        }
        if self.guards.is_some() {
            return;
        }
        let backward = event.modifiers.contains(Modifiers::SHIFT);
        let current = cx
            .document
            .active_element()
            .and_then(|a| cycle.iter().position(|c| *c == a));
        let len = cycle.len();
        let next = match (current, backward) {
            (Some(i), false) => (i + 1) % len,
            (Some(i), true) => (i + len - 1) % len,
            (None, false) => 0,
            (None, true) => len - 1,
        };
        event.stop();
        Self::focus(cx, Some(cycle[next]), false);
    }

    fn on_open(&mut self, cx: &mut InteractionCx<'_>) {
        let Some(floating) = cx.ctx.elements().floating else {
            return;
        };
        let previous = cx.document.active_element();
        cx.services.focus_history.push(cx.document, previous);
        if let Some(d) = cx.document.data_mut(floating) {
            d.flags |= ElementFlags::FOCUSABLE;
        }
        self.closing = None;
        self.return_check.clear();
        self.prevent_return = false;
        self.install_guards(cx, floating);
        self.mark_others(cx, floating);
        if self.options.initial_focus != InitialFocus::None {
            self.initial.defer(cx.now);
        }
    }

    fn on_close(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        match details.reason {
            OpenChangeReason::Hover | OpenChangeReason::SafePolygon
                if matches!(
                    details.event.kind,
                    EventKind::MouseLeave | EventKind::MouseMove | EventKind::PointerLeave
                ) =>
            {
                self.prevent_return = true;
            }
            OpenChangeReason::OutsidePress => {
                self.prevent_return = true;
            }
            OpenChangeReason::EscapeKey => {
                let reference = cx.ctx.elements().dom_reference;
                cx.services.focus_history.push(cx.document, reference);
            }
            _ => {}
        }
        let active = cx.document.active_element();
        self.closing = Some(Closing {
            active,
            inside_tree: active.is_some_and(|a| Self::in_floating_tree(cx, a)),
        });
        self.initial.clear();
        self.unmark(cx.document);
        self.remove_guards(cx.document);
        self.return_check.defer(cx.now);
    }

    fn run_initial_focus(&mut self, cx: &mut InteractionCx<'_>) {
        let Some(floating) = cx.ctx.elements().floating else {
            return;
        };
        if cx
            .document
            .active_element()
            .is_some_and(|a| cx.document.contains(floating, a) && !Self::is_guard(cx.document, a))
        {
            return;
        }
        let target = match self.options.initial_focus {
            InitialFocus::None => return,
            InitialFocus::Element(e) => e,
            InitialFocus::Tabbable(i) => Self::content(cx.document, floating)
                .get(i)
                .copied()
                .unwrap_or(floating),
        };
        Self::focus(cx, Some(target), target == floating);
    }

    fn run_return_focus(&mut self, cx: &mut InteractionCx<'_>) {
        let closing = self.closing.take();
        let prevent = core::mem::take(&mut self.prevent_return);
        let Some(closing) = closing else {
            return;
        };
        let Some(target) = self.return_target(cx) else {
            return;
        };
        if prevent || !cx.document.is_focusable(target) {
            return;
        }
        let settled_elsewhere = closing.active.is_some_and(|a| a != target);
        if settled_elsewhere && !closing.inside_tree {
            return;
        }
        // Focus that moved out of the tree after the close stays put.
        let body = cx.document.body();
        if let Some(now_active) = cx.document.active_element()
            && now_active != body
            && now_active != target
            && cx.document.is_alive(now_active)
            && !Self::in_floating_tree(cx, now_active)
        {
            return;
        }
        Self::focus(cx, Some(target), true);
    }

    fn run_restore(&mut self, cx: &mut InteractionCx<'_>) {
        if !cx.open() || cx.document.active_element().is_some() {
            return;
        }
        let Some(floating) = cx.ctx.elements().floating else {
            return;
        };
        let content = Self::content(cx.document, floating);
        let target = self
            .last_index
            .and_then(|i| content.get(i.min(content.len().saturating_sub(1))))
            .copied()
            .unwrap_or(floating);
        Self::focus(cx, Some(target), true);
    }
}

impl Interaction for FocusManager {
    fn name(&self) -> &'static str {
        "focus-manager"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if self.options.disabled {
            return PropsPatch::new();
        }
        match target {
            PropTarget::Floating => {
                let tabindex: i64 = if self.options.order.contains(&FocusOrder::Floating) {
                    0
                } else {
                    -1
                };
                PropsPatch::new().attr("tabindex", tabindex).handles(
                    EventTypes::FOCUS_IN
                        | EventTypes::FOCUS_OUT
                        | EventTypes::POINTER_DOWN
                        | EventTypes::KEY_DOWN,
                )
            }
            PropTarget::Reference if !self.options.modal && self.options.close_on_focus_out => {
                PropsPatch::new().handles(EventTypes::FOCUS_OUT)
            }
            _ => PropsPatch::new(),
        }
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if self.options.disabled || !cx.open() {
            return;
        }
        match (target, event.kind) {
            (PropTarget::Floating, EventKind::FocusIn) => {
                let Some(t) = event.target else {
                    return;
                };
                if self.guards.is_some_and(|g| g.before == t || g.after == t) {
                    self.on_guard_focus(t, event, cx);
                } else if let Some(f) = cx.ctx.elements().floating {
                    self.last_index = Self::content(cx.document, f).iter().position(|e| *e == t);
                }
            }
            (PropTarget::Floating | PropTarget::Reference, EventKind::FocusOut) => {
                self.on_focus_out(event, cx);
            }
            (PropTarget::Floating, EventKind::PointerDown) => {
                self.pointer_down = true;
                self.pointer_reset.defer(cx.now);
            }
            (PropTarget::Floating, EventKind::KeyDown) => self.on_key_down(event, cx),
            _ => {}
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.pointer_reset.take_due(cx.now) {
            self.pointer_down = false;
        }
        if self.initial.take_due(cx.now) && cx.open() {
            self.run_initial_focus(cx);
        }
        if self.restore_check.take_due(cx.now) {
            self.run_restore(cx);
        }
        if self.return_check.take_due(cx.now) && !cx.open() {
            self.run_return_focus(cx);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        earliest([
            self.initial.deadline(),
            self.return_check.deadline(),
            self.restore_check.deadline(),
            self.pointer_reset.deadline(),
        ])
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        if self.options.disabled {
            return;
        }
        if details.open {
            self.on_open(cx);
        } else {
            self.on_close(details, cx);
        }
    }

    fn teardown(&mut self, cx: &mut InteractionCx<'_>) {
        self.unmark(cx.document);
        self.remove_guards(cx.document);
        self.initial.clear();
        self.return_check.clear();
        self.restore_check.clear();
        self.pointer_reset.clear();
        self.closing = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn open(f: &mut Fixture, fm: &mut FocusManager) {
        let ev = Event::new(EventKind::Click, f.now).with_target(f.reference);
        f.ctx.on_open_change(true, &ev, OpenChangeReason::Click);
        f.settle(fm);
    }

    fn close(f: &mut Fixture, fm: &mut FocusManager, reason: OpenChangeReason) {
        let ev = Event::new(EventKind::KeyDown, f.now);
        f.ctx.on_open_change(false, &ev, reason);
        f.settle(fm);
    }

    #[test]
    fn modal_open_focuses_first_tabbable_and_marks_outside() {
        let mut f = Fixture::new();
        let first = f.child(f.floating, ElementFlags::TABBABLE);
        let _second = f.child(f.floating, ElementFlags::TABBABLE);
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        assert!(fm.guards().is_some());
        assert!(f.doc.is_inert(f.outside) && f.doc.is_inert(f.reference));
        assert!(!f.doc.is_inert(first));
        assert_eq!(fm.next_deadline(), Some(0));
        f.advance_to(1, &mut fm);
        assert_eq!(f.doc.active_element(), Some(first));
    }

    #[test]
    fn close_returns_focus_and_unmarks() {
        let mut f = Fixture::new();
        let _first = f.child(f.floating, ElementFlags::TABBABLE);
        f.doc.focus(f.reference, FocusOptions::default());
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        close(&mut f, &mut fm, OpenChangeReason::EscapeKey);
        assert!(fm.guards().is_none());
        assert_eq!(fm.marked_count(), 0);
        assert!(!f.doc.is_inert(f.outside));
        f.advance_to(2, &mut fm);
        assert_eq!(f.doc.active_element(), Some(f.reference));
        assert!(f.doc.last_focus().is_some_and(|c| c.options.prevent_scroll));
    }

    #[test]
    fn return_focus_scrolls_without_prevent_scroll_support() {
        let mut f = Fixture::new();
        let _first = f.child(f.floating, ElementFlags::TABBABLE);
        f.doc.supports_prevent_scroll = false;
        f.doc.focus(f.reference, FocusOptions::default());
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        close(&mut f, &mut fm, OpenChangeReason::EscapeKey);
        f.advance_to(2, &mut fm);
        assert_eq!(f.doc.active_element(), Some(f.reference));
        assert!(f.doc.last_focus().is_some_and(|c| !c.options.prevent_scroll));
    }

    #[test]
    fn no_return_when_user_focused_elsewhere() {
        let mut f = Fixture::new();
        let inner = f.child(f.floating, ElementFlags::TABBABLE);
        let mut fm = FocusManager::new(FocusManagerOptions {
            modal: false,
            ..FocusManagerOptions::default()
        });
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        assert_eq!(f.doc.active_element(), Some(inner));

        f.doc.focus(f.outside, FocusOptions::default());
        let mut out = Event::new(EventKind::FocusOut, 2)
            .with_target(inner)
            .with_related(f.outside);
        fm.handle(&PropTarget::Floating, &mut out, &mut f.cx());
        assert!(!f.ctx.open());
        f.settle(&mut fm);
        f.advance_to(3, &mut fm);
        assert_eq!(f.doc.active_element(), Some(f.outside));
    }

    #[test]
    fn modal_guards_wrap_focus() {
        let mut f = Fixture::new();
        let first = f.child(f.floating, ElementFlags::TABBABLE);
        let last = f.child(f.floating, ElementFlags::TABBABLE);
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        let (before, after) = fm.guards().unwrap();
        assert_eq!(f.doc.children_of(f.floating).first(), Some(&before));
        assert_eq!(f.doc.children_of(f.floating).last(), Some(&after));

        f.doc.focus(after, FocusOptions::default());
        let mut ev = Event::new(EventKind::FocusIn, 1).with_target(after).with_related(last);
        fm.handle(&PropTarget::Floating, &mut ev, &mut f.cx());
        assert_eq!(f.doc.active_element(), Some(first));

        f.doc.focus(before, FocusOptions::default());
        let mut ev = Event::new(EventKind::FocusIn, 2).with_target(before).with_related(first);
        fm.handle(&PropTarget::Floating, &mut ev, &mut f.cx());
        assert_eq!(f.doc.active_element(), Some(last));
    }

    #[test]
    fn explicit_or_disabled_initial_focus() {
        let mut f = Fixture::new();
        let _first = f.child(f.floating, ElementFlags::TABBABLE);
        let second = f.child(f.floating, ElementFlags::TABBABLE);
        let mut fm = FocusManager::new(FocusManagerOptions {
            initial_focus: InitialFocus::Element(second),
            ..FocusManagerOptions::default()
        });
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        assert_eq!(f.doc.active_element(), Some(second));

        let mut f = Fixture::new();
        let _first = f.child(f.floating, ElementFlags::TABBABLE);
        let mut fm = FocusManager::new(FocusManagerOptions {
            initial_focus: InitialFocus::None,
            ..FocusManagerOptions::default()
        });
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        assert_eq!(f.doc.active_element(), None);
    }

    #[test]
    fn empty_content_focuses_floating_element() {
        let mut f = Fixture::new();
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        assert_eq!(f.doc.active_element(), Some(f.floating));
        assert!(f.doc.last_focus().is_some_and(|c| c.options.prevent_scroll));
    }

    #[test]
    fn outside_press_does_not_return_focus() {
        let mut f = Fixture::new();
        let _first = f.child(f.floating, ElementFlags::TABBABLE);
        f.doc.focus(f.reference, FocusOptions::default());
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        let inside = f.doc.active_element();
        assert_ne!(inside, Some(f.reference));
        close(&mut f, &mut fm, OpenChangeReason::OutsidePress);
        f.advance_to(3, &mut fm);
        assert_ne!(f.doc.active_element(), Some(f.reference));
        assert_eq!(f.doc.active_element(), inside);
    }

    #[test]
    fn focus_moved_after_close_is_left_alone() {
        let mut f = Fixture::new();
        let _first = f.child(f.floating, ElementFlags::TABBABLE);
        f.doc.focus(f.reference, FocusOptions::default());
        let mut fm = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut fm);
        f.advance_to(1, &mut fm);
        close(&mut f, &mut fm, OpenChangeReason::Click);
        f.doc.focus(f.outside, FocusOptions::default());
        f.advance_to(3, &mut fm);
        assert_eq!(f.doc.active_element(), Some(f.outside));
    }

    #[test]
    fn aria_hidden_fallback_forces_guards() {
        let mut f = Fixture::new();
        f.doc.supports_inert = false;
        let mut fm = FocusManager::new(FocusManagerOptions {
            guards: false,
            ..FocusManagerOptions::default()
        });
        open(&mut f, &mut fm);
        assert!(fm.guards().is_some());
        assert!(f.doc.is_aria_hidden(f.outside));
        assert!(!f.doc.is_inert(f.outside));
    }

    #[test]
    fn tab_trap_without_guards() {
        let mut f = Fixture::new();
        let first = f.child(f.floating, ElementFlags::TABBABLE);
        let last = f.child(f.floating, ElementFlags::TABBABLE);
        let mut fm = FocusManager::new(FocusManagerOptions {
            guards: false,
            initial_focus: InitialFocus::Tabbable(1),
            ..FocusManagerOptions::default()
        });
        open(&mut f, &mut fm);
        assert!(fm.guards().is_none());
        f.advance_to(1, &mut fm);
        assert_eq!(f.doc.active_element(), Some(last));
        let mut tab = Event::key_down(Key::Tab, 2).with_target(last);
        fm.handle(&PropTarget::Floating, &mut tab, &mut f.cx());
        assert!(tab.default_prevented);
        assert_eq!(f.doc.active_element(), Some(first));
        let mut back = Event::key_down(Key::Tab, 3).with_target(first);
        back.modifiers = Modifiers::SHIFT;
        fm.handle(&PropTarget::Floating, &mut back, &mut f.cx());
        assert_eq!(f.doc.active_element(), Some(last));
    }

    #[test]
    fn nested_modal_marks_compose() {
        let mut f = Fixture::new();
        let mut outer = FocusManager::new(FocusManagerOptions::default());
        open(&mut f, &mut outer);
        assert!(f.doc.is_inert(f.outside));
        // A second modal over the same document marks the first floating element too.
        let second = f.child(f.doc.body(), ElementFlags::empty());
        let first_floating = f.floating;
        f.ctx.set_floating(Some(second));
        let mut inner = FocusManager::new(FocusManagerOptions::default());
        inner.open_changed(
            &OpenChangeDetails {
                open: true,
                reason: OpenChangeReason::Click,
                event: Event::new(EventKind::Click, 0).summary(),
                epoch: 9,
            },
            &mut f.cx(),
        );
        assert!(f.doc.is_inert(first_floating));
        inner.teardown(&mut f.cx());
        assert!(!f.doc.is_inert(first_floating));
        assert!(f.doc.is_inert(f.outside));
        outer.teardown(&mut f.cx());
        assert!(!f.doc.is_inert(f.outside));
    }
}
