// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contract with the anchored-position engine.
//!
//! Placement math lives elsewhere. This module only names its inputs and
//! outputs so hover intent and client-point tracking can reason about the
//! resolved side.

use kurbo::Rect;

/// Side of the reference the floating element is placed on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Above the reference.
    Top,
    /// To the right of the reference.
    Right,
    /// Below the reference.
    #[default]
    Bottom,
    /// To the left of the reference.
    Left,
}

/// Alignment along the placement side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Alignment {
    /// Aligned to the start edge.
    Start,
    /// Aligned to the end edge.
    End,
}

/// A placement such as `bottom` or `top-start`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Placement {
    /// Side of the reference.
    pub side: Side,
    /// Optional alignment; `None` means centered.
    pub alignment: Option<Alignment>,
}

impl Placement {
    /// A centered placement on `side`.
    pub const fn new(side: Side) -> Self {
        Self {
            side,
            alignment: None,
        }
    }
}

/// Input of a position computation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionRequest {
    /// Reference bounding rect (possibly virtual).
    pub reference: Rect,
    /// Floating element bounding rect.
    pub floating: Rect,
    /// Requested placement.
    pub placement: Placement,
}

/// Output of a position computation.
#[derive(Clone, Debug, PartialEq)]
pub struct Positioned<M> {
    /// Floating element x coordinate.
    pub x: f64,
    /// Floating element y coordinate.
    pub y: f64,
    /// Final placement after middleware such as flipping.
    pub placement: Placement,
    /// Engine-specific middleware results.
    pub middleware_data: M,
}

/// An anchored-position engine.
pub trait PositionEngine {
    /// Middleware output carried alongside coordinates.
    type MiddlewareData;

    /// Compute floating coordinates for `request`.
    fn compute(&self, request: &PositionRequest) -> Positioned<Self::MiddlewareData>;
}
