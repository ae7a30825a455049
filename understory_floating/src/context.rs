// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-instance shared state: the open flag, its causal reason, element
//! references and the mutable data bag read by every interaction source.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use kurbo::Rect;

use crate::dom::{Document, ElementId};
use crate::emitter::{Emitter, OPEN_CHANGE};
use crate::event::{Event, EventSummary};
use crate::position::Placement;
use crate::tree::NodeId;

/// Why an open/close transition was requested.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpenChangeReason {
    /// A press outside the floating and reference elements.
    OutsidePress,
    /// The Escape key.
    EscapeKey,
    /// An overflow ancestor scrolled.
    AncestorScroll,
    /// A press on the reference element while open.
    ReferencePress,
    /// A click on the reference element.
    Click,
    /// Pointer hover.
    Hover,
    /// Keyboard focus on the reference element.
    Focus,
    /// Focus left the floating tree.
    FocusOut,
    /// Arrow-key list navigation.
    ListNavigation,
    /// The pointer left the safe polygon.
    SafePolygon,
    /// Widget-specific reason such as `trigger-hover` or `trigger-press`.
    Custom(&'static str),
}

impl OpenChangeReason {
    /// The kebab-case tag for this reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutsidePress => "outside-press",
            Self::EscapeKey => "escape-key",
            Self::AncestorScroll => "ancestor-scroll",
            Self::ReferencePress => "reference-press",
            Self::Click => "click",
            Self::Hover => "hover",
            Self::Focus => "focus",
            Self::FocusOut => "focus-out",
            Self::ListNavigation => "list-navigation",
            Self::SafePolygon => "safe-polygon",
            Self::Custom(tag) => tag,
        }
    }
}

/// One open/close transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpenChangeDetails {
    /// New open state.
    pub open: bool,
    /// Why the transition happened.
    pub reason: OpenChangeReason,
    /// The event that caused it.
    pub event: EventSummary,
    /// Counter incremented on every transition of the instance.
    pub epoch: u64,
}

/// Mutable data bag shared by the sources of one instance.
#[derive(Clone, Debug)]
pub struct DataRef {
    /// The event that opened the instance, cleared on close.
    pub open_event: Option<EventSummary>,
    /// Set while typeahead is accumulating a query.
    pub typing: bool,
    /// Whether Escape dismissal bubbles to ancestors.
    pub escape_key_bubbles: bool,
    /// Whether outside-press dismissal bubbles to ancestors.
    pub outside_press_bubbles: bool,
    /// Set when the floating element is rendered through a portal.
    pub inside_portal: bool,
}

impl Default for DataRef {
    fn default() -> Self {
        Self {
            open_event: None,
            typing: false,
            escape_key_bubbles: false,
            outside_press_bubbles: true,
            inside_portal: false,
        }
    }
}

/// What the floating element is positioned against.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PositionReference {
    /// A real element.
    Element(ElementId),
    /// A point-like virtual element with the given bounding rect.
    Virtual(Rect),
}

/// Element references of an instance.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Elements {
    /// The interactive reference element that receives events.
    pub dom_reference: Option<ElementId>,
    /// Positioning override (for example a client-point virtual element).
    pub reference: Option<PositionReference>,
    /// The floating element.
    pub floating: Option<ElementId>,
}

impl Elements {
    /// Bounding rect used for positioning.
    pub fn reference_rect(&self, doc: &Document) -> Option<Rect> {
        match self.reference {
            Some(PositionReference::Virtual(rect)) => Some(rect),
            Some(PositionReference::Element(id)) => doc.rect(id),
            None => self.dom_reference.and_then(|id| doc.rect(id)),
        }
    }
}

type OwnerCallback = Box<dyn FnMut(&OpenChangeDetails)>;

/// Root context of one overlay instance.
pub struct FloatingContext {
    open: bool,
    floating_id: String,
    node_id: Option<NodeId>,
    elements: Elements,
    /// Shared data bag.
    pub data: DataRef,
    /// Resolved placement, written back by the positioning step.
    pub placement: Placement,
    /// Instance emitter (`openchange`).
    pub events: Emitter<OpenChangeDetails>,
    owner: Option<OwnerCallback>,
    pending: Vec<OpenChangeDetails>,
    epoch: u64,
}

impl core::fmt::Debug for FloatingContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FloatingContext")
            .field("open", &self.open)
            .field("floating_id", &self.floating_id)
            .field("node_id", &self.node_id)
            .field("elements", &self.elements)
            .field("data", &self.data)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl FloatingContext {
    /// Create a context in its initial mount state.
    ///
    /// The initial state is the only one that carries no event or reason.
    pub fn new(floating_id: impl Into<String>, open: bool) -> Self {
        Self {
            open,
            floating_id: floating_id.into(),
            node_id: None,
            elements: Elements::default(),
            data: DataRef::default(),
            placement: Placement::default(),
            events: Emitter::new(),
            owner: None,
            pending: Vec::new(),
            epoch: 0,
        }
    }

    /// Current open state.
    pub fn open(&self) -> bool {
        self.open
    }

    /// Transition counter, used to drop stale timer callbacks.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The id assigned to the floating element.
    pub fn floating_id(&self) -> &str {
        &self.floating_id
    }

    /// Tree node of this instance, if registered.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    pub(crate) fn set_node_id(&mut self, node: Option<NodeId>) {
        self.node_id = node;
    }

    /// Element references.
    pub fn elements(&self) -> &Elements {
        &self.elements
    }

    /// Set the interactive reference element.
    pub fn set_reference(&mut self, reference: Option<ElementId>) {
        self.elements.dom_reference = reference;
    }

    /// Set a positioning override.
    pub fn set_position_reference(&mut self, reference: Option<PositionReference>) {
        self.elements.reference = reference;
    }

    /// Set the floating element.
    pub fn set_floating(&mut self, floating: Option<ElementId>) {
        self.elements.floating = floating;
    }

    /// Install the external state holder notified on every transition.
    pub fn set_owner(&mut self, owner: impl FnMut(&OpenChangeDetails) + 'static) {
        self.owner = Some(Box::new(owner));
    }

    /// Request an open state change.
    ///
    /// Returns true if the state actually changed. Requesting the current
    /// state again re-tags the open event without notifying anyone.
    pub fn on_open_change(&mut self, open: bool, event: &Event, reason: OpenChangeReason) -> bool {
        if open == self.open {
            if open {
                self.data.open_event = Some(event.summary());
            }
            return false;
        }
        self.open = open;
        self.epoch += 1;
        self.data.open_event = open.then(|| event.summary());
        let details = OpenChangeDetails {
            open,
            reason,
            event: event.summary(),
            epoch: self.epoch,
        };
        tracing::debug!(
            floating_id = %self.floating_id,
            open,
            reason = reason.as_str(),
            "open change"
        );
        if let Some(owner) = &mut self.owner {
            owner(&details);
        }
        self.events.emit(OPEN_CHANGE, &details);
        self.pending.push(details);
        true
    }

    /// Take transitions not yet broadcast to sibling sources.
    pub(crate) fn take_pending(&mut self) -> Vec<OpenChangeDetails> {
        core::mem::take(&mut self.pending)
    }
}
