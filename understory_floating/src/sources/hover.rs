// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hover: open on pointer enter, close on leave, with delays, rest detection
//! and an optional safe-polygon close handler.

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::event::{
    DocumentListeners, Event, EventKind, EventTypes, Phase, PointerType, is_mouse_like,
};
use crate::props::{PropTarget, PropsPatch};
use crate::safe_polygon::{PolygonInput, SafePolygon, SafePolygonOptions, Verdict};
use crate::sources::click::PATIENT_CLICK_MS;
use crate::sources::{Interaction, InteractionCx};
use crate::timer::{Timeout, earliest};

/// Open/close delay in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delay {
    /// Same delay for both transitions.
    Uniform(u64),
    /// Separate delays; `None` means no delay.
    Split {
        /// Open delay.
        open: Option<u64>,
        /// Close delay.
        close: Option<u64>,
    },
}

impl Default for Delay {
    fn default() -> Self {
        Self::Uniform(0)
    }
}

impl Delay {
    /// Open delay for a pointer of `pointer_type`. Non-mouse pointers never wait.
    pub fn open(self, pointer_type: Option<PointerType>) -> u64 {
        self.resolve(pointer_type, true)
    }

    /// Close delay for a pointer of `pointer_type`. Non-mouse pointers never wait.
    pub fn close(self, pointer_type: Option<PointerType>) -> u64 {
        self.resolve(pointer_type, false)
    }

    fn resolve(self, pointer_type: Option<PointerType>, open: bool) -> u64 {
        if pointer_type.is_some() && !is_mouse_like(pointer_type, true) {
            return 0;
        }
        match self {
            Self::Uniform(ms) => ms,
            Self::Split { open: o, close: c } => (if open { o } else { c }).unwrap_or(0),
        }
    }
}

/// Hover configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoverOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Open/close delays.
    pub delay: Delay,
    /// Open only after the pointer rests this long on the reference. `0` disables.
    pub rest_ms: u64,
    /// Ignore non-mouse pointers entirely.
    pub mouse_only: bool,
    /// The first `mousemove` over the reference also opens.
    pub move_opens: bool,
    /// Close through a safe-polygon handler instead of on leave.
    pub safe_polygon: Option<SafePolygonOptions>,
}

impl Default for HoverOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: Delay::default(),
            rest_ms: 0,
            mouse_only: false,
            move_opens: true,
            safe_polygon: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Armed {
    timer: Timeout,
    event: Option<Event>,
    reason: Option<OpenChangeReason>,
    epoch: u64,
}

impl Armed {
    fn arm(&mut self, event: &Event, reason: OpenChangeReason, cx: &InteractionCx<'_>, delay: u64) {
        self.timer.set(cx.now, delay);
        self.event = Some(event.clone());
        self.reason = Some(reason);
        self.epoch = cx.ctx.epoch();
    }

    fn clear(&mut self) {
        self.timer.clear();
        self.event = None;
    }

    /// The armed event if the timer is due and nothing changed since arming.
    fn take_due(&mut self, cx: &InteractionCx<'_>) -> Option<(Event, OpenChangeReason)> {
        if !self.timer.take_due(cx.now) {
            return None;
        }
        let event = self.event.take()?;
        if self.epoch != cx.ctx.epoch() {
            return None;
        }
        Some((event, self.reason.unwrap_or(OpenChangeReason::Hover)))
    }
}

/// Hover interaction source.
#[derive(Clone, Debug, Default)]
pub struct Hover {
    options: HoverOptions,
    pointer_type: Option<PointerType>,
    open_timer: Armed,
    close_timer: Armed,
    rest_timer: Armed,
    rest_pending: bool,
    block_mouse_move: bool,
    move_armed: bool,
    handler: Option<SafePolygon>,
}

impl Hover {
    /// A hover source with `options`.
    pub fn new(options: HoverOptions) -> Self {
        Self {
            options,
            move_armed: true,
            block_mouse_move: true,
            ..Self::default()
        }
    }

    /// Current options.
    pub fn options(&self) -> &HoverOptions {
        &self.options
    }

    /// Replace the options.
    pub fn set_options(&mut self, options: HoverOptions) {
        self.options = options;
    }

    /// Whether the host should disable pointer events outside the floating tree.
    pub fn is_blocking_pointer_events(&self) -> bool {
        self.handler
            .as_ref()
            .is_some_and(|h| h.options().block_pointer_events)
    }

    /// Whether a safe-polygon handler is tracking the pointer.
    pub fn is_tracking(&self) -> bool {
        self.handler.is_some()
    }

    /// A click-like open inside the patient window shields against hover close.
    fn click_guard(&self, cx: &InteractionCx<'_>) -> bool {
        cx.ctx.data.open_event.is_some_and(|e| {
            matches!(e.kind, EventKind::Click | EventKind::MouseDown)
                && cx.now < e.time.saturating_add(PATIENT_CLICK_MS)
        })
    }

    fn on_reference_enter(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        self.close_timer.clear();
        self.block_mouse_move = false;
        let delay = self.options.delay;
        if (self.options.mouse_only && !is_mouse_like(self.pointer_type, false))
            || (self.options.rest_ms > 0 && delay.open(None) == 0)
        {
            return;
        }
        let open_delay = delay.open(self.pointer_type);
        if open_delay > 0 {
            tracing::trace!(delay = open_delay, "hover open timer armed");
            self.open_timer
                .arm(event, OpenChangeReason::Hover, cx, open_delay);
        } else if !cx.open() {
            cx.request(true, event, OpenChangeReason::Hover);
        }
    }

    fn on_reference_move(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if self.options.move_opens && self.move_armed {
            self.move_armed = false;
            self.on_reference_enter(event, cx);
        }
        if self.options.mouse_only && !is_mouse_like(self.pointer_type, false) {
            return;
        }
        if cx.open() || self.options.rest_ms == 0 {
            return;
        }
        if self.rest_pending && event.movement.hypot2() < 2.0 {
            return;
        }
        self.rest_timer.clear();
        if self.pointer_type == Some(PointerType::Touch) {
            if !self.block_mouse_move {
                cx.request(true, event, OpenChangeReason::Hover);
            }
        } else {
            self.rest_pending = true;
            self.rest_timer
                .arm(event, OpenChangeReason::Hover, cx, self.options.rest_ms);
        }
    }

    fn close_with_delay(
        &mut self,
        event: &Event,
        run_else: bool,
        reason: OpenChangeReason,
        cx: &mut InteractionCx<'_>,
    ) {
        let close_delay = self.options.delay.close(self.pointer_type);
        if close_delay > 0 && self.handler.is_none() {
            self.open_timer.clear();
            self.close_timer.arm(event, reason, cx, close_delay);
        } else if run_else {
            self.open_timer.clear();
            cx.request(false, event, reason);
        }
    }

    fn on_reference_leave(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if self.click_guard(cx) {
            return;
        }
        self.handler = None;
        self.rest_timer.clear();
        self.rest_pending = false;
        if let Some(options) = self.options.safe_polygon {
            if !cx.open() {
                self.open_timer.clear();
            }
            tracing::trace!("safe polygon installed");
            self.handler = Some(SafePolygon::new(options, event.point));
            return;
        }
        let should_close = if self.pointer_type == Some(PointerType::Touch) {
            !cx.in_floating(event.related_target)
        } else {
            true
        };
        if should_close {
            self.close_with_delay(event, true, OpenChangeReason::Hover, cx);
        }
    }

    fn polygon_input(&self, event: &Event, cx: &InteractionCx<'_>) -> Option<PolygonInput> {
        let elements = cx.ctx.elements();
        let reference = elements.reference_rect(cx.document)?;
        let floating = cx.document.rect(elements.floating?)?;
        Some(PolygonInput {
            reference,
            floating,
            side: cx.ctx.placement.side,
            over_floating: cx.in_floating(event.target),
            over_reference: cx.in_reference(event.target),
            related_in_floating: cx.in_floating(event.related_target),
            has_open_children: !cx.open_children().is_empty(),
        })
    }

    fn on_safe_polygon_close(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if self.click_guard(cx) {
            return;
        }
        cx.request(false, event, OpenChangeReason::SafePolygon);
        self.handler = None;
    }

    fn on_floating_leave(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if self.click_guard(cx) {
            return;
        }
        if let Some(options) = self.options.safe_polygon
            && let Some(input) = self.polygon_input(event, cx)
        {
            let mut probe = SafePolygon::new(options, event.point);
            if probe.on_pointer(&input, event) == Verdict::Close {
                self.on_safe_polygon_close(event, cx);
                return;
            }
        }
        self.close_with_delay(event, false, OpenChangeReason::Hover, cx);
    }

    fn reset(&mut self) {
        self.open_timer.clear();
        self.close_timer.clear();
        self.rest_timer.clear();
        self.rest_pending = false;
        self.handler = None;
    }
}

impl Interaction for Hover {
    fn name(&self) -> &'static str {
        "hover"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled {
            return PropsPatch::new();
        }
        match target {
            PropTarget::Reference => PropsPatch::new().handles(
                EventTypes::POINTER_DOWN
                    | EventTypes::POINTER_ENTER
                    | EventTypes::MOUSE_ENTER
                    | EventTypes::MOUSE_MOVE
                    | EventTypes::MOUSE_LEAVE,
            ),
            PropTarget::Floating => {
                PropsPatch::new().handles(EventTypes::MOUSE_ENTER | EventTypes::MOUSE_LEAVE)
            }
            PropTarget::Item(_) => PropsPatch::new(),
        }
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled {
            return;
        }
        match (target, event.kind) {
            (PropTarget::Reference, EventKind::PointerDown | EventKind::PointerEnter) => {
                self.pointer_type = event.pointer_type;
            }
            (PropTarget::Reference, EventKind::MouseEnter) => self.on_reference_enter(event, cx),
            (PropTarget::Reference, EventKind::MouseMove) => self.on_reference_move(event, cx),
            (PropTarget::Reference, EventKind::MouseLeave) => self.on_reference_leave(event, cx),
            (PropTarget::Floating, EventKind::MouseEnter) => self.close_timer.clear(),
            (PropTarget::Floating, EventKind::MouseLeave) => self.on_floating_leave(event, cx),
            _ => {}
        }
    }

    fn document_listeners(&self, ctx: &FloatingContext) -> DocumentListeners {
        let mut listeners = DocumentListeners::default();
        if self.options.enabled && ctx.open() && self.handler.is_some() {
            listeners.add(EventTypes::MOUSE_MOVE, Phase::Bubble);
        }
        listeners
    }

    fn handle_document_event(
        &mut self,
        event: &mut Event,
        _phase: Phase,
        cx: &mut InteractionCx<'_>,
    ) {
        if event.kind != EventKind::MouseMove || self.handler.is_none() {
            return;
        }
        let Some(input) = self.polygon_input(event, cx) else {
            return;
        };
        let verdict = match &mut self.handler {
            Some(h) => h.on_pointer(&input, event),
            None => Verdict::Stay,
        };
        if verdict == Verdict::Close {
            self.on_safe_polygon_close(event, cx);
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if let Some((event, reason)) = self.open_timer.take_due(cx) {
            tracing::trace!("hover open timer fired");
            if !cx.open() {
                cx.request(true, &event, reason);
            }
        }
        if let Some((event, reason)) = self.close_timer.take_due(cx) {
            tracing::trace!("hover close timer fired");
            cx.request(false, &event, reason);
        }
        if let Some((event, reason)) = self.rest_timer.take_due(cx) {
            self.rest_pending = false;
            if !self.block_mouse_move && !cx.open() {
                cx.request(true, &event, reason);
            }
        }
        let grace = self.handler.as_mut().map(|h| h.advance(cx.now));
        if grace == Some(Verdict::Close) {
            let mut event = Event::new(EventKind::MouseMove, cx.now);
            event.pointer_type = self.pointer_type;
            self.on_safe_polygon_close(&event, cx);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        earliest([
            self.open_timer.timer.deadline(),
            self.close_timer.timer.deadline(),
            self.rest_timer.timer.deadline(),
            self.handler.as_ref().and_then(|h| h.next_deadline()),
        ])
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, _cx: &mut InteractionCx<'_>) {
        self.move_armed = true;
        if details.open {
            self.close_timer.clear();
        } else {
            self.reset();
            self.block_mouse_move = true;
        }
    }

    fn teardown(&mut self, _cx: &mut InteractionCx<'_>) {
        self.reset();
    }
}
