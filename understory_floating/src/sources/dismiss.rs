// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dismiss: close on Escape, outside press, reference press or ancestor scroll.
//!
//! Escape and outside-press dismissals cooperate across nested instances
//! through the floating tree. A node whose open descendant has bubbling
//! disabled for the trigger leaves the event to that descendant and stays
//! open. Open state is committed to the tree once per document event, so
//! every instance sees the same snapshot no matter which listener runs first.

use alloc::rc::Rc;

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::dom::{Document, ElementFlags, ElementId};
use crate::event::{DocumentListeners, Event, EventKind, EventTypes, Key, Phase};
use crate::props::{PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};
use crate::timer::Timeout;

/// Delay (ms) before re-enabling Escape after an IME composition ends.
pub const COMPOSITION_END_DELAY_MS: u64 = 5;

/// Press event used for outside and reference presses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PressEvent {
    /// `pointerdown`
    #[default]
    PointerDown,
    /// `mousedown`
    MouseDown,
    /// `click`, ignoring presses that started or ended inside.
    Click,
}

impl PressEvent {
    const fn kind(self) -> EventKind {
        match self {
            Self::PointerDown => EventKind::PointerDown,
            Self::MouseDown => EventKind::MouseDown,
            Self::Click => EventKind::Click,
        }
    }
}

/// Outside-press behavior.
#[derive(Clone)]
pub enum OutsidePress {
    /// Always or never dismiss on outside press.
    Enabled(bool),
    /// Dismiss when the predicate accepts the event.
    When(Rc<dyn Fn(&Event) -> bool>),
}

impl Default for OutsidePress {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl core::fmt::Debug for OutsidePress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Enabled(b) => f.debug_tuple("Enabled").field(b).finish(),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

impl OutsidePress {
    fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    fn accepts(&self, event: &Event) -> bool {
        match self {
            Self::Enabled(b) => *b,
            Self::When(f) => f(event),
        }
    }
}

/// Per-trigger flags for bubbling or capture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DismissBubbles {
    /// Applies to the Escape key.
    pub escape_key: bool,
    /// Applies to outside presses.
    pub outside_press: bool,
}

impl Default for DismissBubbles {
    fn default() -> Self {
        Self::from_flag(None)
    }
}

impl DismissBubbles {
    /// Normalize an optional single flag. `None` gives `{ escape_key: false, outside_press: true }`.
    pub const fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(b) => Self {
                escape_key: b,
                outside_press: b,
            },
            None => Self {
                escape_key: false,
                outside_press: true,
            },
        }
    }

    /// Normalize per-trigger optional flags, defaulting each independently.
    pub fn from_parts(escape_key: Option<bool>, outside_press: Option<bool>) -> Self {
        Self {
            escape_key: escape_key.unwrap_or(false),
            outside_press: outside_press.unwrap_or(true),
        }
    }

    fn phase(&self, escape: bool) -> Phase {
        let capture = if escape {
            self.escape_key
        } else {
            self.outside_press
        };
        if capture { Phase::Capture } else { Phase::Bubble }
    }
}

/// Dismiss configuration.
#[derive(Clone, Debug)]
pub struct DismissOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Close on Escape.
    pub escape_key: bool,
    /// Close on presses outside the reference and floating elements.
    pub outside_press: OutsidePress,
    /// Event that counts as an outside press.
    pub outside_press_event: PressEvent,
    /// Close on presses of the reference element.
    pub reference_press: bool,
    /// Event that counts as a reference press.
    pub reference_press_event: PressEvent,
    /// Close when an overflow ancestor scrolls.
    pub ancestor_scroll: bool,
    /// Bubbling flags for nested instances.
    pub bubbles: DismissBubbles,
    /// Listen in the capture phase, per trigger.
    pub capture: DismissBubbles,
}

impl Default for DismissOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            escape_key: true,
            outside_press: OutsidePress::default(),
            outside_press_event: PressEvent::PointerDown,
            reference_press: false,
            reference_press_event: PressEvent::PointerDown,
            ancestor_scroll: false,
            bubbles: DismissBubbles::default(),
            capture: DismissBubbles::default(),
        }
    }
}

/// Dismiss interaction source.
#[derive(Clone, Debug, Default)]
pub struct Dismiss {
    options: DismissOptions,
    composing: bool,
    composition_end: Timeout,
    ended_or_started_inside: bool,
}

impl Dismiss {
    /// A dismiss source with `options`.
    pub fn new(options: DismissOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options.
    pub fn options(&self) -> &DismissOptions {
        &self.options
    }

    fn publish_bubbles(&self, cx: &mut InteractionCx<'_>) {
        cx.ctx.data.escape_key_bubbles = self.options.bubbles.escape_key;
        cx.ctx.data.outside_press_bubbles = self.options.bubbles.outside_press;
    }

    /// Returns false if an open descendant keeps the event for itself.
    fn descendants_allow(&self, cx: &InteractionCx<'_>, escape: bool) -> bool {
        cx.open_descendants().into_iter().all(|n| {
            cx.tree.context(n).is_none_or(|c| {
                !c.open
                    || if escape {
                        c.escape_key_bubbles
                    } else {
                        c.outside_press_bubbles
                    }
            })
        })
    }

    fn on_escape(&mut self, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !cx.open() || !self.options.escape_key || event.key != Some(Key::Escape) {
            return;
        }
        if self.composing || event.is_composing {
            return;
        }
        if !self.options.bubbles.escape_key {
            event.propagation_stopped = true;
            if !self.descendants_allow(cx, true) {
                tracing::trace!("escape left to an open child");
                return;
            }
        }
        cx.request(false, event, OpenChangeReason::EscapeKey);
    }

    fn on_outside_press(&mut self, event: &mut Event, cx: &mut InteractionCx<'_>) {
        let ended_or_started_inside = core::mem::take(&mut self.ended_or_started_inside);
        if !cx.open() || !self.options.outside_press.is_enabled() {
            return;
        }
        if self.options.outside_press_event == PressEvent::Click && ended_or_started_inside {
            return;
        }
        if !self.options.outside_press.accepts(event) {
            return;
        }
        let Some(target) = event.target else {
            return;
        };
        let doc = &*cx.document;
        let floating = cx.ctx.elements().floating;

        if is_injected_after_render(doc, target, floating) {
            return;
        }
        if floating.is_some() && pressed_scrollbar(doc, target, event) {
            return;
        }
        if cx.in_floating(Some(target))
            || cx.in_reference(Some(target))
            || cx.in_descendant_floating(target)
        {
            return;
        }
        if !self.descendants_allow(cx, false) {
            tracing::trace!("outside press left to an open child");
            return;
        }
        cx.request(false, event, OpenChangeReason::OutsidePress);
    }

    fn on_scroll(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if !cx.open() || !self.options.ancestor_scroll {
            return;
        }
        let Some(target) = event.target else {
            return;
        };
        let elements = *cx.ctx.elements();
        let is_ancestor = [elements.dom_reference, elements.floating]
            .into_iter()
            .flatten()
            .any(|e| cx.document.overflow_ancestors(e).contains(&target));
        if is_ancestor {
            cx.request(false, event, OpenChangeReason::AncestorScroll);
        }
    }
}

/// A press on content injected after the floating element rendered (for
/// example a third-party widget) lives outside every marked region.
fn is_injected_after_render(
    doc: &Document,
    target: ElementId,
    floating: Option<ElementId>,
) -> bool {
    let markers = doc.markers();
    if markers.is_empty() || target == doc.body() {
        return false;
    }
    if floating.is_some_and(|f| doc.contains(target, f)) {
        return false;
    }
    let root = doc.root_ancestor(target);
    markers.iter().all(|m| !doc.contains(root, *m))
}

fn pressed_scrollbar(doc: &Document, target: ElementId, event: &Event) -> bool {
    let Some(data) = doc.data(target) else {
        return false;
    };
    let last = target == doc.body();
    let s = data.scroll;
    let can_x = (last || data.flags.contains(ElementFlags::SCROLL_X))
        && s.client_width > 0.0
        && s.scroll_width > s.client_width;
    let can_y = (last || data.flags.contains(ElementFlags::SCROLL_Y))
        && s.client_height > 0.0
        && s.scroll_height > s.client_height;
    let vertical = can_y
        && if doc.is_rtl(target) {
            event.offset.x <= s.offset_width - s.client_width
        } else {
            event.offset.x > s.client_width
        };
    let horizontal = can_x && event.offset.y > s.client_height;
    vertical || horizontal
}

impl Interaction for Dismiss {
    fn name(&self) -> &'static str {
        "dismiss"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled {
            return PropsPatch::new();
        }
        match target {
            PropTarget::Reference if self.options.reference_press => {
                PropsPatch::new().handles(self.options.reference_press_event.kind().flag())
            }
            PropTarget::Floating if self.options.outside_press_event == PressEvent::Click => {
                PropsPatch::new().handles(EventTypes::MOUSE_DOWN | EventTypes::MOUSE_UP)
            }
            _ => PropsPatch::new(),
        }
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled {
            return;
        }
        match target {
            PropTarget::Reference
                if self.options.reference_press
                    && event.kind == self.options.reference_press_event.kind() =>
            {
                cx.request(false, event, OpenChangeReason::ReferencePress);
            }
            PropTarget::Floating
                if matches!(event.kind, EventKind::MouseDown | EventKind::MouseUp) =>
            {
                self.ended_or_started_inside = true;
            }
            _ => {}
        }
    }

    fn document_listeners(&self, ctx: &FloatingContext) -> DocumentListeners {
        let mut listeners = DocumentListeners::default();
        if !self.options.enabled || !ctx.open() {
            return listeners;
        }
        if self.options.escape_key {
            listeners.add(
                EventTypes::KEY_DOWN
                    | EventTypes::COMPOSITION_START
                    | EventTypes::COMPOSITION_END,
                self.options.capture.phase(true),
            );
        }
        if self.options.outside_press.is_enabled() {
            listeners.add(
                self.options.outside_press_event.kind().flag(),
                self.options.capture.phase(false),
            );
        }
        if self.options.ancestor_scroll {
            listeners.add(EventTypes::SCROLL, Phase::Capture);
        }
        listeners
    }

    fn handle_document_event(
        &mut self,
        event: &mut Event,
        phase: Phase,
        cx: &mut InteractionCx<'_>,
    ) {
        if !self.options.enabled {
            return;
        }
        self.publish_bubbles(cx);
        match event.kind {
            EventKind::CompositionStart => {
                self.composing = true;
                self.composition_end.clear();
            }
            EventKind::CompositionEnd => {
                self.composition_end.set(cx.now, COMPOSITION_END_DELAY_MS);
            }
            EventKind::KeyDown if phase == self.options.capture.phase(true) => {
                self.on_escape(event, cx);
            }
            EventKind::Scroll => self.on_scroll(event, cx),
            kind if kind == self.options.outside_press_event.kind()
                && phase == self.options.capture.phase(false) =>
            {
                self.on_outside_press(event, cx);
            }
            _ => {}
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.composition_end.take_due(cx.now) {
            self.composing = false;
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.composition_end.deadline()
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        self.publish_bubbles(cx);
        if !details.open {
            self.ended_or_started_inside = false;
        }
    }

    fn teardown(&mut self, _cx: &mut InteractionCx<'_>) {
        self.composition_end.clear();
        self.composing = false;
    }
}
