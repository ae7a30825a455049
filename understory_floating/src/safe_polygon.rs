// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Safe-polygon hover intent.
//!
//! When the pointer leaves the reference element on its way to the floating
//! element, two regions are tolerated:
//!
//! - the rectangular trough bridging the gap between the two rects;
//! - a polygon fanning out from the exit point to the near edge of the
//!   floating rect.
//!
//! Leaving both closes the overlay. With intent detection enabled, a cursor
//! that slows below `0.1` px/ms closes it too, and a cursor inside the polygon
//! that has not yet reached the floating element gets a short grace period.
//!
//! State is private to one close-handler invocation: create a
//! [`SafePolygon`] when the pointer leaves the reference and drop it on close.

use kurbo::{Point, Rect};

use crate::event::{Event, EventKind};
use crate::position::Side;
use crate::timer::Timeout;

/// Cursor speed (px/ms) under which the pointer is considered to have stopped.
pub const MIN_INTENT_SPEED: f64 = 0.1;

/// Grace delay (ms) before closing while en route inside the polygon.
pub const INTENT_GRACE_MS: u64 = 40;

/// Even-odd ray-casting containment test.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let Point { x, y } = point;
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        let crosses = (pi.y >= y) != (pj.y >= y)
            && x <= (pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Safe-polygon configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafePolygonOptions {
    /// Extra tolerance (px) around the polygon edges.
    pub buffer: f64,
    /// Detect intent from cursor speed.
    pub require_intent: bool,
    /// Ask the host to disable pointer events outside the floating tree while active.
    pub block_pointer_events: bool,
}

impl Default for SafePolygonOptions {
    fn default() -> Self {
        Self {
            buffer: 0.5,
            require_intent: true,
            block_pointer_events: false,
        }
    }
}

/// Per-move facts resolved by the caller from the document and tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolygonInput {
    /// Reference bounding rect.
    pub reference: Rect,
    /// Floating bounding rect.
    pub floating: Rect,
    /// Resolved placement side.
    pub side: Side,
    /// The event target is inside the floating element.
    pub over_floating: bool,
    /// The event target is inside the reference element.
    pub over_reference: bool,
    /// A leave event whose related target is inside the floating element.
    pub related_in_floating: bool,
    /// A child node of this instance is open.
    pub has_open_children: bool,
}

/// Outcome of one pointer sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the overlay open.
    Stay,
    /// Close the overlay.
    Close,
}

/// State of one safe-polygon close handler.
#[derive(Clone, Debug)]
pub struct SafePolygon {
    options: SafePolygonOptions,
    exit: Point,
    has_landed: bool,
    last_sample: Option<(Point, u64)>,
    grace: Timeout,
}

impl SafePolygon {
    /// Start tracking after the pointer left the reference at `exit`.
    pub fn new(options: SafePolygonOptions, exit: Point) -> Self {
        Self {
            options,
            exit,
            has_landed: false,
            last_sample: None,
            grace: Timeout::new(),
        }
    }

    /// Options this handler runs with.
    pub fn options(&self) -> &SafePolygonOptions {
        &self.options
    }

    /// Whether the pointer has reached the floating element during this cycle.
    pub fn has_landed(&self) -> bool {
        self.has_landed
    }

    /// Pending grace deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.grace.deadline()
    }

    /// Fire the grace timer; returns [`Verdict::Close`] when it elapsed.
    pub fn advance(&mut self, now: u64) -> Verdict {
        if self.grace.take_due(now) {
            tracing::trace!("safe polygon grace elapsed");
            Verdict::Close
        } else {
            Verdict::Stay
        }
    }

    fn cursor_speed(&mut self, point: Point, time: u64) -> Option<f64> {
        let prev = self.last_sample.replace((point, time));
        let (last, last_time) = prev?;
        let elapsed = time.checked_sub(last_time).filter(|e| *e > 0)?;
        #[allow(
            clippy::cast_precision_loss,
            reason = "Millisecond deltas between pointer samples are small."
        )]
        let elapsed = elapsed as f64;
        Some((point - last).hypot() / elapsed)
    }

    /// Evaluate one `mousemove` (or `mouseleave`) sample.
    pub fn on_pointer(&mut self, input: &PolygonInput, event: &Event) -> Verdict {
        self.grace.clear();
        let is_leave = event.kind == EventKind::MouseLeave;

        if input.over_floating {
            self.has_landed = true;
            if !is_leave {
                return Verdict::Stay;
            }
        }
        if input.over_reference {
            self.has_landed = false;
            if !is_leave {
                return Verdict::Stay;
            }
        }
        if is_leave && input.related_in_floating {
            return Verdict::Stay;
        }
        if input.has_open_children {
            return Verdict::Stay;
        }

        let point = event.point;
        let r = input.reference;
        let opposite = match input.side {
            Side::Top => point.y >= r.y1 - 1.0,
            Side::Bottom => point.y <= r.y0 + 1.0,
            Side::Left => point.x >= r.x1 - 1.0,
            Side::Right => point.x <= r.x0 + 1.0,
        };
        if opposite {
            return Verdict::Close;
        }

        if point_in_polygon(point, &trough(input.side, r, input.floating)) {
            return Verdict::Stay;
        }

        let over_reference_rect =
            point.x >= r.x0 && point.x <= r.x1 && point.y >= r.y0 && point.y <= r.y1;
        if self.has_landed && !over_reference_rect {
            return Verdict::Close;
        }

        if !is_leave
            && self.options.require_intent
            && let Some(speed) = self.cursor_speed(point, event.time)
            && speed < MIN_INTENT_SPEED
        {
            return Verdict::Close;
        }

        let polygon = corridor(
            input.side,
            r,
            input.floating,
            self.exit,
            self.options.buffer,
        );
        if !point_in_polygon(point, &polygon) {
            Verdict::Close
        } else {
            if !self.has_landed && self.options.require_intent {
                self.grace.set(event.time, INTENT_GRACE_MS);
            }
            Verdict::Stay
        }
    }
}

/// Narrower rect's extent along the cross axis, used to size the trough.
fn cross_extent(reference: Rect, floating: Rect) -> (f64, f64, f64, f64) {
    let wider = floating.width() > reference.width();
    let taller = floating.height() > reference.height();
    let horiz = if wider { reference } else { floating };
    let vert = if taller { reference } else { floating };
    (horiz.x0, horiz.x1, vert.y0, vert.y1)
}

/// The rectangle bridging the gap between reference and floating rects.
pub(crate) fn trough(side: Side, reference: Rect, floating: Rect) -> [Point; 4] {
    let (left, right, top, bottom) = cross_extent(reference, floating);
    let (r, f) = (reference, floating);
    match side {
        Side::Top => [
            Point::new(left, r.y0 + 1.0),
            Point::new(left, f.y1 - 1.0),
            Point::new(right, f.y1 - 1.0),
            Point::new(right, r.y0 + 1.0),
        ],
        Side::Bottom => [
            Point::new(left, f.y0 + 1.0),
            Point::new(left, r.y1 - 1.0),
            Point::new(right, r.y1 - 1.0),
            Point::new(right, f.y0 + 1.0),
        ],
        Side::Left => [
            Point::new(f.x1 - 1.0, bottom),
            Point::new(f.x1 - 1.0, top),
            Point::new(r.x0 + 1.0, top),
            Point::new(r.x0 + 1.0, bottom),
        ],
        Side::Right => [
            Point::new(r.x1 - 1.0, bottom),
            Point::new(r.x1 - 1.0, top),
            Point::new(f.x0 + 1.0, top),
            Point::new(f.x0 + 1.0, bottom),
        ],
    }
}

/// The polygon fanning out from the exit point to the floating rect.
pub(crate) fn corridor(
    side: Side,
    reference: Rect,
    floating: Rect,
    exit: Point,
    buffer: f64,
) -> [Point; 4] {
    let f = floating;
    let Point { x, y } = exit;
    let b = buffer;
    let wider = f.width() > reference.width();
    let taller = f.height() > reference.height();
    let from_right = x > f.x1 - f.width() / 2.0;
    let from_bottom = y > f.y1 - f.height() / 2.0;

    let spread_x = |sign: f64| {
        if wider {
            x + sign * b / 2.0
        } else if from_right {
            x + b * 4.0
        } else {
            x - b * 4.0
        }
    };
    let spread_y = |sign: f64| {
        if taller {
            y + sign * b / 2.0
        } else if from_bottom {
            y + b * 4.0
        } else {
            y - b * 4.0
        }
    };

    match side {
        Side::Top => {
            let near = f.y1 - b;
            [
                Point::new(spread_x(1.0), y + b + 1.0),
                Point::new(spread_x(-1.0), y + b + 1.0),
                Point::new(
                    f.x0,
                    if from_right || wider { near } else { f.y0 },
                ),
                Point::new(
                    f.x1,
                    if from_right {
                        if wider { near } else { f.y0 }
                    } else {
                        near
                    },
                ),
            ]
        }
        Side::Bottom => {
            let near = f.y0 + b;
            [
                Point::new(spread_x(1.0), y - b),
                Point::new(spread_x(-1.0), y - b),
                Point::new(
                    f.x0,
                    if from_right || wider { near } else { f.y1 },
                ),
                Point::new(
                    f.x1,
                    if from_right {
                        if wider { near } else { f.y1 }
                    } else {
                        near
                    },
                ),
            ]
        }
        Side::Left => {
            let near = f.x1 - b;
            [
                Point::new(
                    if from_bottom || taller { near } else { f.x0 },
                    f.y0,
                ),
                Point::new(
                    if from_bottom {
                        if taller { near } else { f.x0 }
                    } else {
                        near
                    },
                    f.y1,
                ),
                Point::new(x + b + 1.0, spread_y(1.0)),
                Point::new(x + b + 1.0, spread_y(-1.0)),
            ]
        }
        Side::Right => {
            let near = f.x0 + b;
            [
                Point::new(x - b, spread_y(1.0)),
                Point::new(x - b, spread_y(-1.0)),
                Point::new(
                    if from_bottom || taller { near } else { f.x1 },
                    f.y0,
                ),
                Point::new(
                    if from_bottom {
                        if taller { near } else { f.x1 }
                    } else {
                        near
                    },
                    f.y1,
                ),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference sits top-left; a wider floating panel sits below and to the right.
    const REFERENCE: Rect = Rect::new(0.0, 0.0, 40.0, 20.0);
    const FLOATING: Rect = Rect::new(60.0, 40.0, 160.0, 140.0);

    fn input() -> PolygonInput {
        PolygonInput {
            reference: REFERENCE,
            floating: FLOATING,
            side: Side::Bottom,
            over_floating: false,
            over_reference: false,
            related_in_floating: false,
            has_open_children: false,
        }
    }

    fn mv(x: f64, y: f64, t: u64) -> Event {
        Event::mouse(EventKind::MouseMove, Point::new(x, y), t)
    }

    #[test]
    fn even_odd_containment() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(5.0, -1.0), &square));
    }

    #[test]
    fn trough_covers_the_gap() {
        let t = trough(Side::Bottom, REFERENCE, FLOATING);
        assert!(point_in_polygon(Point::new(20.0, 30.0), &t));
        assert!(!point_in_polygon(Point::new(50.0, 30.0), &t));
    }

    #[test]
    fn travel_through_corridor_never_closes() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(35.0, 20.0));
        assert_eq!(sp.on_pointer(&input(), &mv(45.0, 25.0, 16)), Verdict::Stay);
        assert!(sp.next_deadline().is_some());
        assert_eq!(sp.on_pointer(&input(), &mv(50.0, 30.0, 32)), Verdict::Stay);
        // Arrive on the floating element before the grace period ends.
        let landed = PolygonInput {
            over_floating: true,
            ..input()
        };
        assert_eq!(sp.on_pointer(&landed, &mv(70.0, 45.0, 48)), Verdict::Stay);
        assert!(sp.has_landed());
        assert_eq!(sp.next_deadline(), None);
        assert_eq!(sp.advance(1_000), Verdict::Stay);
    }

    #[test]
    fn stopping_inside_corridor_closes_after_grace() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(35.0, 20.0));
        assert_eq!(sp.on_pointer(&input(), &mv(45.0, 25.0, 16)), Verdict::Stay);
        assert_eq!(sp.on_pointer(&input(), &mv(50.0, 30.0, 32)), Verdict::Stay);
        assert_eq!(sp.advance(71), Verdict::Stay);
        assert_eq!(sp.advance(72), Verdict::Close);
    }

    #[test]
    fn slow_cursor_closes() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(35.0, 20.0));
        assert_eq!(sp.on_pointer(&input(), &mv(45.0, 25.0, 16)), Verdict::Stay);
        assert_eq!(sp.on_pointer(&input(), &mv(46.0, 25.0, 1_016)), Verdict::Close);
    }

    #[test]
    fn leaving_the_corridor_closes() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(35.0, 20.0));
        assert_eq!(sp.on_pointer(&input(), &mv(150.0, 22.0, 16)), Verdict::Close);
    }

    #[test]
    fn opposite_side_exit_closes() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(20.0, 0.0));
        assert_eq!(sp.on_pointer(&input(), &mv(20.0, -5.0, 16)), Verdict::Close);
    }

    #[test]
    fn open_child_suppresses_close() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(35.0, 20.0));
        let nested = PolygonInput {
            has_open_children: true,
            ..input()
        };
        assert_eq!(sp.on_pointer(&nested, &mv(150.0, 22.0, 16)), Verdict::Stay);
    }

    #[test]
    fn leaving_floating_after_landing_closes() {
        let mut sp = SafePolygon::new(SafePolygonOptions::default(), Point::new(35.0, 20.0));
        let over = PolygonInput {
            over_floating: true,
            ..input()
        };
        assert_eq!(sp.on_pointer(&over, &mv(70.0, 45.0, 16)), Verdict::Stay);
        assert_eq!(sp.on_pointer(&input(), &mv(50.0, 30.0, 32)), Verdict::Close);
    }
}
