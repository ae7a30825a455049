// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Click: toggle on press of the reference element, with keyboard activation.

use crate::context::{FloatingContext, OpenChangeReason};
use crate::dom::ElementFlags;
use crate::event::{Event, EventKind, EventTypes, Key, PointerType, is_mouse_like};
use crate::props::{PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};

/// Window (ms) after a non-click open during which a click keeps the overlay open.
pub const PATIENT_CLICK_MS: u64 = 500;

/// Which press event toggles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClickEvent {
    /// `click`
    #[default]
    Click,
    /// `mousedown`
    MouseDown,
}

/// Click configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Event that toggles.
    pub event: ClickEvent,
    /// Close when pressed while open.
    pub toggle: bool,
    /// Ignore mouse-like pointers (touch only, or keyboard).
    pub ignore_mouse: bool,
    /// Open with Enter and Space on non-button references.
    pub keyboard_handlers: bool,
    /// A press shortly after a non-click open keeps the overlay open.
    pub stick_if_open: bool,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            event: ClickEvent::Click,
            toggle: true,
            ignore_mouse: false,
            keyboard_handlers: true,
            stick_if_open: true,
        }
    }
}

/// Click interaction source.
#[derive(Clone, Debug, Default)]
pub struct Click {
    options: ClickOptions,
    pointer_type: Option<PointerType>,
    did_key_down: bool,
}

impl Click {
    /// A click source with `options`.
    pub fn new(options: ClickOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options.
    pub fn options(&self) -> &ClickOptions {
        &self.options
    }

    fn press(&mut self, event: &mut Event, same_kind: EventKind, cx: &mut InteractionCx<'_>) {
        let sticky = self.options.stick_if_open
            && cx.ctx.data.open_event.is_some_and(|e| {
                e.kind != same_kind && event.time < e.time.saturating_add(PATIENT_CLICK_MS)
            });
        if cx.open() && self.options.toggle && !sticky {
            cx.request(false, event, OpenChangeReason::Click);
        } else {
            if same_kind == EventKind::MouseDown {
                event.default_prevented = true;
            }
            cx.request(true, event, OpenChangeReason::Click);
        }
    }

    fn keyboard_toggle(&self, event: &Event, cx: &mut InteractionCx<'_>) {
        let open = !(cx.open() && self.options.toggle);
        cx.request(open, event, OpenChangeReason::Click);
    }

    fn skip_keyboard(&self, event: &Event, cx: &InteractionCx<'_>) -> bool {
        event.default_prevented
            || !self.options.keyboard_handlers
            || cx.ctx.data.typing
            || event
                .target
                .is_some_and(|t| cx.document.flags(t).contains(ElementFlags::BUTTON))
    }

    fn space_ignored(cx: &InteractionCx<'_>) -> bool {
        cx.ctx
            .elements()
            .dom_reference
            .is_some_and(|r| cx.document.flags(r).contains(ElementFlags::TYPEABLE))
    }
}

impl Interaction for Click {
    fn name(&self) -> &'static str {
        "click"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled || *target != PropTarget::Reference {
            return PropsPatch::new();
        }
        PropsPatch::new().handles(
            EventTypes::POINTER_DOWN
                | EventTypes::MOUSE_DOWN
                | EventTypes::CLICK
                | EventTypes::KEY_DOWN
                | EventTypes::KEY_UP,
        )
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled || *target != PropTarget::Reference {
            return;
        }
        match event.kind {
            EventKind::PointerDown => self.pointer_type = event.pointer_type,
            EventKind::MouseDown => {
                if event.button != 0 || self.options.event == ClickEvent::Click {
                    return;
                }
                if self.options.ignore_mouse && is_mouse_like(self.pointer_type, true) {
                    return;
                }
                self.press(event, EventKind::MouseDown, cx);
            }
            EventKind::Click => {
                if self.options.event == ClickEvent::MouseDown && self.pointer_type.is_some() {
                    self.pointer_type = None;
                    return;
                }
                if event.button != 0 {
                    return;
                }
                if self.options.ignore_mouse && is_mouse_like(self.pointer_type, true) {
                    return;
                }
                self.press(event, EventKind::Click, cx);
            }
            EventKind::KeyDown => {
                self.pointer_type = None;
                if self.skip_keyboard(event, cx) {
                    return;
                }
                if event.key == Some(Key::SPACE) && !Self::space_ignored(cx) {
                    event.default_prevented = true;
                    self.did_key_down = true;
                }
                if event.key == Some(Key::Enter) {
                    self.keyboard_toggle(event, cx);
                }
            }
            EventKind::KeyUp => {
                if self.skip_keyboard(event, cx) || Self::space_ignored(cx) {
                    return;
                }
                if event.key == Some(Key::SPACE) && self.did_key_down {
                    self.did_key_down = false;
                    self.keyboard_toggle(event, cx);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use kurbo::Point;

    fn click(f: &Fixture, t: u64) -> Event {
        Event::mouse(EventKind::Click, Point::new(5.0, 5.0), t).with_target(f.reference)
    }

    #[test]
    fn toggles_and_ignores_secondary_button() {
        let mut f = Fixture::new();
        let mut c = Click::new(ClickOptions::default());
        c.handle(&PropTarget::Reference, &mut click(&f, 0), &mut f.cx());
        assert!(f.ctx.open());
        let mut right = click(&f, 10);
        right.button = 2;
        c.handle(&PropTarget::Reference, &mut right, &mut f.cx());
        assert!(f.ctx.open());
        c.handle(&PropTarget::Reference, &mut click(&f, 20), &mut f.cx());
        assert!(!f.ctx.open());
    }

    #[test]
    fn click_shortly_after_hover_open_sticks() {
        let mut f = Fixture::new();
        let mut c = Click::new(ClickOptions::default());
        let enter = Event::mouse(EventKind::MouseEnter, Point::ZERO, 0);
        f.ctx.on_open_change(true, &enter, OpenChangeReason::Hover);

        c.handle(&PropTarget::Reference, &mut click(&f, 300), &mut f.cx());
        assert!(f.ctx.open());
        assert_eq!(f.ctx.data.open_event.map(|e| e.kind), Some(EventKind::Click));
        // Now click-opened, so the next click closes.
        c.handle(&PropTarget::Reference, &mut click(&f, 400), &mut f.cx());
        assert!(!f.ctx.open());
    }

    #[test]
    fn late_click_after_hover_open_closes() {
        let mut f = Fixture::new();
        let mut c = Click::new(ClickOptions::default());
        let enter = Event::mouse(EventKind::MouseEnter, Point::ZERO, 0);
        f.ctx.on_open_change(true, &enter, OpenChangeReason::Hover);
        c.handle(&PropTarget::Reference, &mut click(&f, 900), &mut f.cx());
        assert!(!f.ctx.open());
    }

    #[test]
    fn mousedown_mode_skips_following_click() {
        let mut f = Fixture::new();
        let mut c = Click::new(ClickOptions {
            event: ClickEvent::MouseDown,
            ..ClickOptions::default()
        });
        let mut pd = Event::new(EventKind::PointerDown, 0).with_pointer(PointerType::Mouse);
        c.handle(&PropTarget::Reference, &mut pd, &mut f.cx());
        let mut md = Event::mouse(EventKind::MouseDown, Point::ZERO, 0).with_target(f.reference);
        c.handle(&PropTarget::Reference, &mut md, &mut f.cx());
        assert!(f.ctx.open());
        assert!(md.default_prevented);
        c.handle(&PropTarget::Reference, &mut click(&f, 5), &mut f.cx());
        assert!(f.ctx.open());
    }

    #[test]
    fn keyboard_activation_on_non_button_reference() {
        let mut f = Fixture::new();
        let div = f.child(f.doc.body(), ElementFlags::TABBABLE);
        f.ctx.set_reference(Some(div));
        let mut c = Click::new(ClickOptions::default());

        let mut enter = Event::key_down(Key::Enter, 0).with_target(div);
        c.handle(&PropTarget::Reference, &mut enter, &mut f.cx());
        assert!(f.ctx.open());

        let mut down = Event::key_down(Key::SPACE, 10).with_target(div);
        c.handle(&PropTarget::Reference, &mut down, &mut f.cx());
        assert!(down.default_prevented && f.ctx.open());
        let mut up = Event::new(EventKind::KeyUp, 20).with_target(div);
        up.key = Some(Key::SPACE);
        c.handle(&PropTarget::Reference, &mut up, &mut f.cx());
        assert!(!f.ctx.open());
    }

    #[test]
    fn keyboard_ignored_on_native_button_and_while_typing() {
        let mut f = Fixture::new();
        let mut c = Click::new(ClickOptions::default());
        let mut enter = Event::key_down(Key::Enter, 0).with_target(f.reference);
        c.handle(&PropTarget::Reference, &mut enter, &mut f.cx());
        assert!(!f.ctx.open());

        let div = f.child(f.doc.body(), ElementFlags::TABBABLE);
        f.ctx.data.typing = true;
        let mut enter = Event::key_down(Key::Enter, 0).with_target(div);
        c.handle(&PropTarget::Reference, &mut enter, &mut f.cx());
        assert!(!f.ctx.open());
    }
}
