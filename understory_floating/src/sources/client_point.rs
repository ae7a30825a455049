// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client point: position the floating element at the pointer instead of the
//! reference box.
//!
//! The source installs a zero-size virtual reference at the cursor. Along an
//! axis that is not tracked, the virtual rect keeps the reference element's
//! extent, so `Axis::X` follows the cursor horizontally while staying aligned
//! with the reference vertically.

use kurbo::{Point, Rect};

use crate::context::{FloatingContext, OpenChangeDetails, PositionReference};
use crate::event::{
    DocumentListeners, Event, EventKind, EventTypes, Phase, PointerType, is_mouse_like,
};
use crate::props::{PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};

/// Axes that follow the cursor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Axis {
    /// Both axes.
    #[default]
    Both,
    /// Horizontal only.
    X,
    /// Vertical only.
    Y,
}

impl Axis {
    fn tracks_x(self) -> bool {
        matches!(self, Self::Both | Self::X)
    }

    fn tracks_y(self) -> bool {
        matches!(self, Self::Both | Self::Y)
    }
}

/// Client point configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClientPointOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Axes that follow the cursor.
    pub axis: Axis,
    /// Fixed x coordinate, overriding the cursor.
    pub x: Option<f64>,
    /// Fixed y coordinate, overriding the cursor.
    pub y: Option<f64>,
}

impl Default for ClientPointOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            axis: Axis::Both,
            x: None,
            y: None,
        }
    }
}

impl ClientPointOptions {
    fn has_override(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }
}

fn is_mouse_event(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::MouseDown
            | EventKind::MouseUp
            | EventKind::MouseMove
            | EventKind::MouseEnter
            | EventKind::MouseLeave
    )
}

/// The virtual reference rect for a cursor at `(x, y)` over `reference`.
pub fn virtual_rect(reference: Rect, axis: Axis, x: Option<f64>, y: Option<f64>) -> Rect {
    let x = x.filter(|_| axis.tracks_x());
    let y = y.filter(|_| axis.tracks_y());
    let (x0, x1) = match x {
        Some(x) => (x, x),
        None => (reference.x0, reference.x1),
    };
    let (y0, y1) = match y {
        Some(y) => (y, y),
        None => (reference.y0, reference.y1),
    };
    Rect::new(x0, y0, x1, y1)
}

/// Client point interaction source.
#[derive(Clone, Debug, Default)]
pub struct ClientPoint {
    options: ClientPointOptions,
    pointer_type: Option<PointerType>,
    tracking: bool,
    override_pending: bool,
}

impl ClientPoint {
    /// A client point source with `options`.
    pub fn new(options: ClientPointOptions) -> Self {
        Self {
            options,
            pointer_type: None,
            tracking: false,
            override_pending: options.has_override(),
        }
    }

    /// Current options.
    pub fn options(&self) -> &ClientPointOptions {
        &self.options
    }

    /// Replace the options. Fixed coordinates apply on the next advance.
    pub fn set_options(&mut self, options: ClientPointOptions) {
        self.override_pending = options.enabled && options.has_override();
        self.options = options;
    }

    /// Whether the cursor is being followed through a document listener.
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn opened_by_mouse(cx: &InteractionCx<'_>) -> bool {
        cx.ctx.data.open_event.is_none_or(|e| is_mouse_event(e.kind))
    }

    fn set_reference(&self, point: Option<Point>, cx: &mut InteractionCx<'_>) {
        if !Self::opened_by_mouse(cx) {
            return;
        }
        let Some(reference) = cx
            .ctx
            .elements()
            .dom_reference
            .and_then(|r| cx.document.rect(r))
        else {
            return;
        };
        let x = point.map(|p| p.x).or(self.options.x);
        let y = point.map(|p| p.y).or(self.options.y);
        let rect = virtual_rect(reference, self.options.axis, x, y);
        cx.ctx
            .set_position_reference(Some(PositionReference::Virtual(rect)));
    }

    fn wants_listener(&self, ctx: &FloatingContext) -> bool {
        let open_check = if is_mouse_like(self.pointer_type, true) {
            ctx.elements().floating.is_some()
        } else {
            ctx.open()
        };
        open_check
            && self.options.enabled
            && !self.options.has_override()
            && ctx.data.open_event.is_none_or(|e| is_mouse_event(e.kind))
    }
}

impl Interaction for ClientPoint {
    fn name(&self) -> &'static str {
        "client-point"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled || *target != PropTarget::Reference {
            return PropsPatch::new();
        }
        PropsPatch::new().handles(
            EventTypes::POINTER_DOWN
                | EventTypes::POINTER_ENTER
                | EventTypes::MOUSE_MOVE
                | EventTypes::MOUSE_ENTER,
        )
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled || *target != PropTarget::Reference {
            return;
        }
        match event.kind {
            EventKind::PointerDown | EventKind::PointerEnter => {
                self.pointer_type = event.pointer_type;
            }
            EventKind::MouseMove | EventKind::MouseEnter => {
                if self.options.has_override() {
                    return;
                }
                if !cx.open() {
                    self.set_reference(Some(event.point), cx);
                } else if !self.tracking {
                    self.tracking = true;
                }
            }
            _ => {}
        }
    }

    fn document_listeners(&self, ctx: &FloatingContext) -> DocumentListeners {
        let mut listeners = DocumentListeners::default();
        if self.tracking && self.wants_listener(ctx) {
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
        if event.kind != EventKind::MouseMove || !self.tracking {
            return;
        }
        if cx.in_floating(event.target) {
            self.tracking = false;
        } else {
            self.set_reference(Some(event.point), cx);
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.override_pending {
            self.override_pending = false;
            self.set_reference(None, cx);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.override_pending.then_some(0)
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled {
            return;
        }
        if !details.open {
            self.tracking = false;
            return;
        }
        if self.options.has_override() {
            return;
        }
        if Self::opened_by_mouse(cx) {
            self.tracking = true;
        } else {
            let reference = cx.ctx.elements().dom_reference;
            cx.ctx
                .set_position_reference(reference.map(PositionReference::Element));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpenChangeReason;
    use crate::testing::{Fixture, REFERENCE_RECT};

    fn virtual_reference(f: &Fixture) -> Option<Rect> {
        match f.ctx.elements().reference {
            Some(PositionReference::Virtual(r)) => Some(r),
            _ => None,
        }
    }

    #[test]
    fn move_over_closed_reference_places_virtual_point() {
        let mut f = Fixture::new();
        let mut s = ClientPoint::new(ClientPointOptions::default());
        let mut mv =
            Event::mouse(EventKind::MouseMove, Point::new(30.0, 12.0), 0).with_target(f.reference);
        s.handle(&PropTarget::Reference, &mut mv, &mut f.cx());
        assert_eq!(virtual_reference(&f), Some(Rect::new(30.0, 12.0, 30.0, 12.0)));
    }

    #[test]
    fn untracked_axis_takes_reference_extent() {
        let r = virtual_rect(REFERENCE_RECT, Axis::X, Some(30.0), Some(12.0));
        assert_eq!(r, Rect::new(30.0, REFERENCE_RECT.y0, 30.0, REFERENCE_RECT.y1));
        let r = virtual_rect(REFERENCE_RECT, Axis::Y, Some(30.0), Some(12.0));
        assert_eq!(r, Rect::new(REFERENCE_RECT.x0, 12.0, REFERENCE_RECT.x1, 12.0));
    }

    #[test]
    fn follows_cursor_while_open_until_it_enters_floating() {
        let mut f = Fixture::new();
        let mut s = ClientPoint::new(ClientPointOptions::default());
        let enter = Event::mouse(EventKind::MouseEnter, Point::new(1.0, 1.0), 0);
        f.ctx.on_open_change(true, &enter, OpenChangeReason::Hover);
        f.settle(&mut s);
        assert!(s.is_tracking());
        assert!(
            s.document_listeners(&f.ctx)
                .bubble
                .contains(EventTypes::MOUSE_MOVE)
        );

        let mut mv = Event::mouse(EventKind::MouseMove, Point::new(50.0, 15.0), 5)
            .with_target(f.outside);
        s.handle_document_event(&mut mv, Phase::Bubble, &mut f.cx());
        assert_eq!(virtual_reference(&f), Some(Rect::new(50.0, 15.0, 50.0, 15.0)));

        let mut inside =
            Event::mouse(EventKind::MouseMove, Point::new(50.0, 60.0), 6).with_target(f.floating);
        s.handle_document_event(&mut inside, Phase::Bubble, &mut f.cx());
        assert!(!s.is_tracking());
        assert!(s.document_listeners(&f.ctx).is_empty());
    }

    #[test]
    fn keyboard_open_positions_at_reference() {
        let mut f = Fixture::new();
        let mut s = ClientPoint::new(ClientPointOptions::default());
        let focus = Event::new(EventKind::Focus, 0).with_target(f.reference);
        f.ctx.on_open_change(true, &focus, OpenChangeReason::Focus);
        f.settle(&mut s);
        assert!(!s.is_tracking());
        assert_eq!(
            f.ctx.elements().reference,
            Some(PositionReference::Element(f.reference))
        );
    }

    #[test]
    fn fixed_coordinates_apply_on_advance() {
        let mut f = Fixture::new();
        let mut s = ClientPoint::new(ClientPointOptions {
            x: Some(70.0),
            ..ClientPointOptions::default()
        });
        assert_eq!(s.next_deadline(), Some(0));
        f.advance_to(1, &mut s);
        assert_eq!(
            virtual_reference(&f),
            Some(Rect::new(70.0, REFERENCE_RECT.y0, 70.0, REFERENCE_RECT.y1))
        );
        assert_eq!(s.next_deadline(), None);
        // Cursor moves are ignored while coordinates are fixed.
        let mut mv = Event::mouse(EventKind::MouseMove, Point::new(5.0, 5.0), 2);
        s.handle(&PropTarget::Reference, &mut mv, &mut f.cx());
        assert_eq!(virtual_reference(&f).map(|r| r.x0), Some(70.0));
    }
}
