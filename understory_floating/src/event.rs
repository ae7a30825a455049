// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input events fed to interaction sources.
//!
//! Events are plain records built by the host from its native events. Handlers
//! receive them mutably so they can record `preventDefault`/`stopPropagation`
//! style outcomes through [`Event::stop`] and friends.

use kurbo::{Point, Vec2};

use crate::dom::ElementId;

/// Kind of input event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `pointerdown`
    PointerDown,
    /// `pointerup`
    PointerUp,
    /// `pointermove`
    PointerMove,
    /// `pointerenter`
    PointerEnter,
    /// `pointerleave`
    PointerLeave,
    /// `mousedown`
    MouseDown,
    /// `mouseup`
    MouseUp,
    /// `mousemove`
    MouseMove,
    /// `mouseenter`
    MouseEnter,
    /// `mouseleave`
    MouseLeave,
    /// `click`
    Click,
    /// `keydown`
    KeyDown,
    /// `keyup`
    KeyUp,
    /// `focus`
    Focus,
    /// `blur`
    Blur,
    /// `focusin`
    FocusIn,
    /// `focusout`
    FocusOut,
    /// `scroll`
    Scroll,
    /// `resize`
    Resize,
    /// `beforematch`
    BeforeMatch,
    /// `compositionstart`
    CompositionStart,
    /// `compositionend`
    CompositionEnd,
    /// Window lost focus.
    WindowBlur,
}

bitflags::bitflags! {
    /// A set of event kinds, used for listener registration.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct EventTypes: u32 {
        /// `pointerdown`
        const POINTER_DOWN      = 1 << 0;
        /// `pointerup`
        const POINTER_UP        = 1 << 1;
        /// `pointermove`
        const POINTER_MOVE      = 1 << 2;
        /// `pointerenter`
        const POINTER_ENTER     = 1 << 3;
        /// `pointerleave`
        const POINTER_LEAVE     = 1 << 4;
        /// `mousedown`
        const MOUSE_DOWN        = 1 << 5;
        /// `mouseup`
        const MOUSE_UP          = 1 << 6;
        /// `mousemove`
        const MOUSE_MOVE        = 1 << 7;
        /// `mouseenter`
        const MOUSE_ENTER       = 1 << 8;
        /// `mouseleave`
        const MOUSE_LEAVE       = 1 << 9;
        /// `click`
        const CLICK             = 1 << 10;
        /// `keydown`
        const KEY_DOWN          = 1 << 11;
        /// `keyup`
        const KEY_UP            = 1 << 12;
        /// `focus`
        const FOCUS             = 1 << 13;
        /// `blur`
        const BLUR              = 1 << 14;
        /// `focusin`
        const FOCUS_IN          = 1 << 15;
        /// `focusout`
        const FOCUS_OUT         = 1 << 16;
        /// `scroll`
        const SCROLL            = 1 << 17;
        /// `resize`
        const RESIZE            = 1 << 18;
        /// `beforematch`
        const BEFORE_MATCH      = 1 << 19;
        /// `compositionstart`
        const COMPOSITION_START = 1 << 20;
        /// `compositionend`
        const COMPOSITION_END   = 1 << 21;
        /// window `blur`
        const WINDOW_BLUR       = 1 << 22;
    }
}

impl EventKind {
    /// The single-bit set for this kind.
    pub const fn flag(self) -> EventTypes {
        match self {
            Self::PointerDown => EventTypes::POINTER_DOWN,
            Self::PointerUp => EventTypes::POINTER_UP,
            Self::PointerMove => EventTypes::POINTER_MOVE,
            Self::PointerEnter => EventTypes::POINTER_ENTER,
            Self::PointerLeave => EventTypes::POINTER_LEAVE,
            Self::MouseDown => EventTypes::MOUSE_DOWN,
            Self::MouseUp => EventTypes::MOUSE_UP,
            Self::MouseMove => EventTypes::MOUSE_MOVE,
            Self::MouseEnter => EventTypes::MOUSE_ENTER,
            Self::MouseLeave => EventTypes::MOUSE_LEAVE,
            Self::Click => EventTypes::CLICK,
            Self::KeyDown => EventTypes::KEY_DOWN,
            Self::KeyUp => EventTypes::KEY_UP,
            Self::Focus => EventTypes::FOCUS,
            Self::Blur => EventTypes::BLUR,
            Self::FocusIn => EventTypes::FOCUS_IN,
            Self::FocusOut => EventTypes::FOCUS_OUT,
            Self::Scroll => EventTypes::SCROLL,
            Self::Resize => EventTypes::RESIZE,
            Self::BeforeMatch => EventTypes::BEFORE_MATCH,
            Self::CompositionStart => EventTypes::COMPOSITION_START,
            Self::CompositionEnd => EventTypes::COMPOSITION_END,
            Self::WindowBlur => EventTypes::WINDOW_BLUR,
        }
    }

    /// Returns true for mouse and pointer events that carry a client point.
    pub const fn is_pointer_like(self) -> bool {
        matches!(
            self,
            Self::PointerDown
                | Self::PointerUp
                | Self::PointerMove
                | Self::PointerEnter
                | Self::PointerLeave
                | Self::MouseDown
                | Self::MouseUp
                | Self::MouseMove
                | Self::MouseEnter
                | Self::MouseLeave
                | Self::Click
        )
    }

    /// Returns true for events that open overlays "like a click" (press-driven).
    pub const fn is_click_like(self) -> bool {
        matches!(
            self,
            Self::Click | Self::MouseDown | Self::PointerDown | Self::KeyDown | Self::KeyUp
        )
    }

    /// Returns true for mouse events that track pointer position over time.
    pub const fn is_mouse_based(self) -> bool {
        matches!(
            self,
            Self::MouseEnter | Self::MouseMove | Self::MouseLeave | Self::PointerEnter
        )
    }
}

/// Pointer device type, mirroring `PointerEvent.pointerType`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PointerType {
    /// Mouse or trackpad.
    Mouse,
    /// Stylus.
    Pen,
    /// Touch screen.
    Touch,
}

/// Returns true for mouse-like pointers.
///
/// With `strict`, an unknown pointer type does not count as mouse-like.
pub fn is_mouse_like(pointer_type: Option<PointerType>, strict: bool) -> bool {
    match pointer_type {
        Some(PointerType::Mouse | PointerType::Pen) => true,
        Some(PointerType::Touch) => false,
        None => !strict,
    }
}

/// Logical key value, mirroring `KeyboardEvent.key`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character, including `' '`.
    Character(char),
    /// `Escape`
    Escape,
    /// `Enter`
    Enter,
    /// `Tab`
    Tab,
    /// `ArrowUp`
    ArrowUp,
    /// `ArrowDown`
    ArrowDown,
    /// `ArrowLeft`
    ArrowLeft,
    /// `ArrowRight`
    ArrowRight,
    /// `Home`
    Home,
    /// `End`
    End,
    /// `Backspace`
    Backspace,
    /// Any other named key.
    Other,
}

impl Key {
    /// The space bar.
    pub const SPACE: Self = Self::Character(' ');

    /// Returns true for one of the four arrow keys.
    pub const fn is_arrow(self) -> bool {
        matches!(
            self,
            Self::ArrowUp | Self::ArrowDown | Self::ArrowLeft | Self::ArrowRight
        )
    }
}

bitflags::bitflags! {
    /// Keyboard modifier state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Shift
        const SHIFT = 0b0001;
        /// Control
        const CTRL  = 0b0010;
        /// Alt / Option
        const ALT   = 0b0100;
        /// Meta / Command
        const META  = 0b1000;
    }
}

/// An input event.
#[derive(Clone, Debug)]
pub struct Event {
    /// Event kind.
    pub kind: EventKind,
    /// Event target.
    pub target: Option<ElementId>,
    /// `relatedTarget` for focus and enter/leave events.
    pub related_target: Option<ElementId>,
    /// Timestamp in milliseconds.
    pub time: u64,
    /// Pointer position in client coordinates.
    pub point: Point,
    /// Pointer position relative to the target's padding edge (`offsetX/Y`).
    pub offset: Point,
    /// Pointer movement since the previous pointer event (`movementX/Y`).
    pub movement: Vec2,
    /// Pointer device, when known.
    pub pointer_type: Option<PointerType>,
    /// Pressed button; `0` is the primary button.
    pub button: i16,
    /// Key for keyboard events.
    pub key: Option<Key>,
    /// Keyboard modifiers.
    pub modifiers: Modifiers,
    /// `KeyboardEvent.isComposing`.
    pub is_composing: bool,
    /// Host-computed `:focus-visible` match for focus events, when available.
    pub focus_visible: Option<bool>,
    /// Set by handlers that call `preventDefault`.
    pub default_prevented: bool,
    /// Set by handlers that call `stopPropagation`.
    pub propagation_stopped: bool,
}

impl Event {
    /// A blank event of `kind` at `time`.
    pub fn new(kind: EventKind, time: u64) -> Self {
        Self {
            kind,
            target: None,
            related_target: None,
            time,
            point: Point::ZERO,
            offset: Point::ZERO,
            movement: Vec2::ZERO,
            pointer_type: None,
            button: 0,
            key: None,
            modifiers: Modifiers::empty(),
            is_composing: false,
            focus_visible: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// A mouse-typed pointer event at `point`.
    pub fn mouse(kind: EventKind, point: Point, time: u64) -> Self {
        Self {
            point,
            pointer_type: Some(PointerType::Mouse),
            ..Self::new(kind, time)
        }
    }

    /// A `keydown` for `key`.
    pub fn key_down(key: Key, time: u64) -> Self {
        Self {
            key: Some(key),
            ..Self::new(EventKind::KeyDown, time)
        }
    }

    /// Builder: set the target.
    pub fn with_target(mut self, target: ElementId) -> Self {
        self.target = Some(target);
        self
    }

    /// Builder: set the related target.
    pub fn with_related(mut self, related: ElementId) -> Self {
        self.related_target = Some(related);
        self
    }

    /// Builder: set the pointer type.
    pub fn with_pointer(mut self, pointer_type: PointerType) -> Self {
        self.pointer_type = Some(pointer_type);
        self
    }

    /// `preventDefault` + `stopPropagation`.
    pub fn stop(&mut self) {
        self.default_prevented = true;
        self.propagation_stopped = true;
    }

    /// Compact description kept after the event is gone.
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            kind: self.kind,
            time: self.time,
            target: self.target,
            pointer_type: self.pointer_type,
        }
    }
}

/// A retained description of a past event (for example the open-causing event).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventSummary {
    /// Event kind.
    pub kind: EventKind,
    /// Timestamp in milliseconds.
    pub time: u64,
    /// Event target.
    pub target: Option<ElementId>,
    /// Pointer device, when known.
    pub pointer_type: Option<PointerType>,
}

/// Dispatch phase of a document-level listener.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Capture phase (outermost first).
    Capture,
    /// Bubble phase.
    Bubble,
}

/// Document-level listeners wanted by a source, by phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentListeners {
    /// Kinds listened to in the capture phase.
    pub capture: EventTypes,
    /// Kinds listened to in the bubble phase.
    pub bubble: EventTypes,
}

impl DocumentListeners {
    /// Add `types` in `phase`.
    pub fn add(&mut self, types: EventTypes, phase: Phase) {
        match phase {
            Phase::Capture => self.capture |= types,
            Phase::Bubble => self.bubble |= types,
        }
    }

    /// Kinds listened to in `phase`.
    pub fn in_phase(&self, phase: Phase) -> EventTypes {
        match phase {
            Phase::Capture => self.capture,
            Phase::Bubble => self.bubble,
        }
    }

    /// Union of two listener sets.
    pub fn union(self, other: Self) -> Self {
        Self {
            capture: self.capture | other.capture,
            bubble: self.bubble | other.bubble,
        }
    }

    /// Returns true if nothing is listened to.
    pub fn is_empty(&self) -> bool {
        self.capture.is_empty() && self.bubble.is_empty()
    }
}
