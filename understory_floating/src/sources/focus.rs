// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus: open when the reference receives keyboard focus, close when focus
//! leaves the reference and the floating tree.

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::dom::{ElementFlags, ElementId, GuardKind};
use crate::event::{DocumentListeners, Event, EventKind, EventTypes, Phase};
use crate::props::{PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};
use crate::timer::Timeout;

/// Focus source configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusOpenOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Only open for focus that matches `:focus-visible`.
    pub visible_only: bool,
}

impl Default for FocusOpenOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            visible_only: true,
        }
    }
}

#[derive(Clone, Debug)]
struct PendingBlur {
    event: Event,
    related: Option<ElementId>,
    to_outside_guard: bool,
}

/// Focus interaction source.
#[derive(Clone, Debug)]
pub struct Focus {
    options: FocusOpenOptions,
    block_focus: bool,
    keyboard_modality: bool,
    blur_check: Timeout,
    pending_blur: Option<PendingBlur>,
}

impl Default for Focus {
    fn default() -> Self {
        Self::new(FocusOpenOptions::default())
    }
}

impl Focus {
    /// A focus source with `options`.
    pub fn new(options: FocusOpenOptions) -> Self {
        Self {
            options,
            block_focus: false,
            keyboard_modality: true,
            blur_check: Timeout::new(),
            pending_blur: None,
        }
    }

    /// Whether focus-open is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.block_focus
    }

    fn on_focus(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        if self.block_focus {
            return;
        }
        if self.options.visible_only
            && let Some(target) = event.target
        {
            let visible = event.focus_visible.unwrap_or_else(|| {
                self.keyboard_modality
                    || cx.document.flags(target).contains(ElementFlags::TYPEABLE)
            });
            if !visible {
                return;
            }
        }
        cx.request(true, event, OpenChangeReason::Focus);
    }

    fn on_blur(&mut self, event: &Event, cx: &mut InteractionCx<'_>) {
        self.block_focus = false;
        let to_outside_guard = event
            .related_target
            .and_then(|r| cx.document.data(r))
            .is_some_and(|d| d.guard == Some(GuardKind::Outside));
        self.pending_blur = Some(PendingBlur {
            event: event.clone(),
            related: event.related_target,
            to_outside_guard,
        });
        self.blur_check.defer(cx.now);
    }

    fn check_blur(&mut self, cx: &mut InteractionCx<'_>) {
        let Some(blur) = self.pending_blur.take() else {
            return;
        };
        let active = cx.document.active_element();
        let reference = cx.ctx.elements().dom_reference;
        if blur.related.is_none() && active.is_some() && active == reference {
            return;
        }
        if let Some(active) = active
            && (cx.in_floating(Some(active))
                || cx.in_descendant_floating(active)
                || cx.in_reference(Some(active)))
        {
            return;
        }
        if blur.to_outside_guard {
            return;
        }
        cx.request(false, &blur.event, OpenChangeReason::Focus);
    }
}

impl Interaction for Focus {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled || *target != PropTarget::Reference {
            return PropsPatch::new();
        }
        PropsPatch::new().handles(EventTypes::FOCUS | EventTypes::BLUR | EventTypes::MOUSE_LEAVE)
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled || *target != PropTarget::Reference {
            return;
        }
        match event.kind {
            EventKind::MouseLeave => self.block_focus = false,
            EventKind::Focus => self.on_focus(event, cx),
            EventKind::Blur => self.on_blur(event, cx),
            _ => {}
        }
    }

    fn document_listeners(&self, _ctx: &FloatingContext) -> DocumentListeners {
        let mut listeners = DocumentListeners::default();
        if self.options.enabled {
            listeners.add(EventTypes::WINDOW_BLUR, Phase::Bubble);
            listeners.add(EventTypes::KEY_DOWN | EventTypes::POINTER_DOWN, Phase::Capture);
        }
        listeners
    }

    fn handle_document_event(
        &mut self,
        event: &mut Event,
        phase: Phase,
        cx: &mut InteractionCx<'_>,
    ) {
        match (event.kind, phase) {
            (EventKind::KeyDown, Phase::Capture) => self.keyboard_modality = true,
            (EventKind::PointerDown, Phase::Capture) => self.keyboard_modality = false,
            (EventKind::WindowBlur, _) => {
                let reference = cx.ctx.elements().dom_reference;
                if !cx.open() && reference.is_some() && cx.document.active_element() == reference
                {
                    self.block_focus = true;
                }
            }
            _ => {}
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.blur_check.take_due(cx.now) {
            self.check_blur(cx);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.blur_check.deadline()
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, _cx: &mut InteractionCx<'_>) {
        if matches!(
            details.reason,
            OpenChangeReason::ReferencePress | OpenChangeReason::EscapeKey
        ) {
            self.block_focus = true;
        }
    }

    fn teardown(&mut self, _cx: &mut InteractionCx<'_>) {
        self.blur_check.clear();
        self.pending_blur = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::FocusOptions;
    use crate::testing::Fixture;

    fn focus_event(f: &Fixture, visible: Option<bool>) -> Event {
        let mut e = Event::new(EventKind::Focus, 0).with_target(f.reference);
        e.focus_visible = visible;
        e
    }

    #[test]
    fn opens_only_for_visible_focus() {
        let mut f = Fixture::new();
        let mut s = Focus::default();
        s.handle(&PropTarget::Reference, &mut focus_event(&f, Some(false)), &mut f.cx());
        assert!(!f.ctx.open());
        s.handle(&PropTarget::Reference, &mut focus_event(&f, Some(true)), &mut f.cx());
        assert!(f.ctx.open());
    }

    #[test]
    fn pointer_modality_blocks_unknown_visibility() {
        let mut f = Fixture::new();
        let mut s = Focus::default();
        let mut pd = Event::new(EventKind::PointerDown, 0);
        s.handle_document_event(&mut pd, Phase::Capture, &mut f.cx());
        s.handle(&PropTarget::Reference, &mut focus_event(&f, None), &mut f.cx());
        assert!(!f.ctx.open());
        let mut kd = Event::new(EventKind::KeyDown, 1);
        s.handle_document_event(&mut kd, Phase::Capture, &mut f.cx());
        s.handle(&PropTarget::Reference, &mut focus_event(&f, None), &mut f.cx());
        assert!(f.ctx.open());
    }

    #[test]
    fn blur_into_floating_keeps_open() {
        let mut f = Fixture::new();
        let inner = f.child(f.floating, ElementFlags::TABBABLE);
        let mut s = Focus::new(FocusOpenOptions {
            visible_only: false,
            ..FocusOpenOptions::default()
        });
        f.doc.focus(f.reference, FocusOptions::default());
        s.handle(&PropTarget::Reference, &mut focus_event(&f, None), &mut f.cx());
        assert!(f.ctx.open());

        f.doc.focus(inner, FocusOptions::default());
        let mut blur = Event::new(EventKind::Blur, 5)
            .with_target(f.reference)
            .with_related(inner);
        s.handle(&PropTarget::Reference, &mut blur, &mut f.cx());
        assert_eq!(s.next_deadline(), Some(0));
        f.advance_to(16, &mut s);
        assert!(f.ctx.open());

        f.doc.focus(f.outside, FocusOptions::default());
        let mut blur = Event::new(EventKind::Blur, 20)
            .with_target(f.reference)
            .with_related(f.outside);
        s.handle(&PropTarget::Reference, &mut blur, &mut f.cx());
        f.advance_to(32, &mut s);
        assert!(!f.ctx.open());
    }

    #[test]
    fn escape_dismissal_blocks_refocus_until_leave() {
        let mut f = Fixture::new();
        let mut s = Focus::default();
        s.handle(&PropTarget::Reference, &mut focus_event(&f, Some(true)), &mut f.cx());
        let esc = Event::key_down(crate::event::Key::Escape, 1);
        f.ctx.on_open_change(false, &esc, OpenChangeReason::EscapeKey);
        f.settle(&mut s);
        assert!(s.is_blocked());
        s.handle(&PropTarget::Reference, &mut focus_event(&f, Some(true)), &mut f.cx());
        assert!(!f.ctx.open());
        let mut leave = Event::new(EventKind::MouseLeave, 2);
        s.handle(&PropTarget::Reference, &mut leave, &mut f.cx());
        s.handle(&PropTarget::Reference, &mut focus_event(&f, Some(true)), &mut f.cx());
        assert!(f.ctx.open());
    }
}
