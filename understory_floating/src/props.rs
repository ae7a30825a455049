// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element-prop bundles and the interaction merger.
//!
//! Every source contributes a [`PropsPatch`] per target: attributes plus the
//! set of element events it wants to handle. [`merge`] folds an ordered list of
//! patches into one [`ElementProps`]:
//!
//! - Plain attributes from later patches override earlier ones.
//! - Handlers never override. Each event kind gets a chain of
//!   [`HandlerSlot`]s in source order, with caller-supplied handlers last.
//!
//! ```rust
//! use understory_floating::event::{EventKind, EventTypes};
//! use understory_floating::props::{merge, AttrValue, HandlerSlot, PropsPatch, UserTargetProps};
//!
//! let a = PropsPatch::new()
//!     .attr("aria-expanded", false)
//!     .handles(EventTypes::CLICK);
//! let b = PropsPatch::new()
//!     .attr("aria-expanded", true)
//!     .handles(EventTypes::CLICK | EventTypes::KEY_DOWN);
//! let mut user = UserTargetProps::default();
//! user.on(EventKind::Click, |_| {});
//!
//! let merged = merge([a, b], Some(&user));
//! assert_eq!(merged.attr("aria-expanded"), Some(&AttrValue::Bool(true)));
//! assert_eq!(
//!     merged.chain(EventKind::Click),
//!     &[HandlerSlot::Source(0), HandlerSlot::Source(1), HandlerSlot::User(0)]
//! );
//! assert_eq!(merged.chain(EventKind::KeyDown), &[HandlerSlot::Source(1)]);
//! ```

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use smallvec::SmallVec;

use crate::event::{Event, EventKind, EventTypes};

/// An attribute value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    /// A string value.
    Str(Cow<'static, str>),
    /// A boolean value (`"true"`/`"false"` for ARIA, presence for others).
    Bool(bool),
    /// An integer value such as `tabindex`.
    Int(i64),
    /// Explicitly absent; overrides and removes an earlier value.
    Absent,
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&'static str> for AttrValue {
    fn from(v: &'static str) -> Self {
        Self::Str(Cow::Borrowed(v))
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(Cow::Owned(v))
    }
}

impl<T: Into<Self>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Absent, Into::into)
    }
}

/// Attribute map of one target.
pub type Attrs = BTreeMap<Cow<'static, str>, AttrValue>;

/// Per-item state passed to item-prop producers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemState {
    /// Position of the item in the list.
    pub index: usize,
    /// The item is the active (highlighted) one.
    pub active: bool,
    /// The item is the selected one.
    pub selected: bool,
}

impl ItemState {
    /// An inactive, unselected item at `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            active: false,
            selected: false,
        }
    }
}

/// Which element a props bundle is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropTarget {
    /// The reference element.
    Reference,
    /// The floating element.
    Floating,
    /// A list item.
    Item(ItemState),
}

impl PropTarget {
    /// Item index for item targets.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            Self::Item(s) => Some(s.index),
            _ => None,
        }
    }
}

/// One source's contribution to a target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropsPatch {
    /// Attributes.
    pub attrs: Attrs,
    /// Element events the source handles on this target.
    pub handles: EventTypes,
}

impl PropsPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set an attribute.
    pub fn attr(mut self, name: &'static str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(Cow::Borrowed(name), value.into());
        self
    }

    /// Builder: handle `types`.
    pub fn handles(mut self, types: EventTypes) -> Self {
        self.handles |= types;
        self
    }

    /// Returns true if nothing is contributed.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.handles.is_empty()
    }
}

/// Reference to a handler in a merged chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandlerSlot {
    /// Handler of the source at this position.
    Source(usize),
    /// Caller-supplied handler at this position.
    User(usize),
}

/// Handler chain of one event kind.
pub type HandlerChain = SmallVec<[HandlerSlot; 4]>;

/// The merged bundle for one target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementProps {
    /// Attributes after later-wins merging.
    pub attrs: Attrs,
    handlers: SmallVec<[(EventKind, HandlerChain); 8]>,
}

impl ElementProps {
    /// Attribute value by name. `Absent` values are reported as such.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Attribute as a string slice, if it is a string.
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Handler chain for `kind`, in call order.
    pub fn chain(&self, kind: EventKind) -> &[HandlerSlot] {
        self.handlers
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(&[], |(_, c)| c.as_slice())
    }

    /// Every event kind with at least one handler.
    pub fn events(&self) -> EventTypes {
        self.handlers
            .iter()
            .fold(EventTypes::empty(), |acc, (k, _)| acc | k.flag())
    }

    fn push(&mut self, kind: EventKind, slot: HandlerSlot) {
        if let Some((_, chain)) = self.handlers.iter_mut().find(|(k, _)| *k == kind) {
            chain.push(slot);
        } else {
            let mut chain = HandlerChain::new();
            chain.push(slot);
            self.handlers.push((kind, chain));
        }
    }
}

/// A caller-supplied element handler.
pub type UserHandler = Box<dyn FnMut(&mut Event)>;

/// Caller-supplied props for one target, merged outermost.
#[derive(Default)]
pub struct UserTargetProps {
    /// Attributes.
    pub attrs: Attrs,
    handlers: Vec<(EventKind, UserHandler)>,
}

impl core::fmt::Debug for UserTargetProps {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserTargetProps")
            .field("attrs", &self.attrs)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl UserTargetProps {
    /// Add a handler for `kind`.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&mut Event) + 'static) {
        self.handlers.push((kind, Box::new(handler)));
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, name: &'static str, value: impl Into<AttrValue>) {
        self.attrs.insert(Cow::Borrowed(name), value.into());
    }

    pub(crate) fn call(&mut self, index: usize, event: &mut Event) {
        if let Some((_, h)) = self.handlers.get_mut(index) {
            h(event);
        }
    }
}

/// Caller-supplied props for every target.
#[derive(Debug, Default)]
pub struct UserProps {
    /// Reference element props.
    pub reference: UserTargetProps,
    /// Floating element props.
    pub floating: UserTargetProps,
    /// Props applied to every item.
    pub item: UserTargetProps,
}

impl UserProps {
    /// The props for `target`.
    pub fn for_target(&self, target: &PropTarget) -> &UserTargetProps {
        match target {
            PropTarget::Reference => &self.reference,
            PropTarget::Floating => &self.floating,
            PropTarget::Item(_) => &self.item,
        }
    }

    /// Mutable props for `target`.
    pub fn for_target_mut(&mut self, target: &PropTarget) -> &mut UserTargetProps {
        match target {
            PropTarget::Reference => &mut self.reference,
            PropTarget::Floating => &mut self.floating,
            PropTarget::Item(_) => &mut self.item,
        }
    }
}

const ALL_KINDS: [EventKind; 23] = [
    EventKind::PointerDown,
    EventKind::PointerUp,
    EventKind::PointerMove,
    EventKind::PointerEnter,
    EventKind::PointerLeave,
    EventKind::MouseDown,
    EventKind::MouseUp,
    EventKind::MouseMove,
    EventKind::MouseEnter,
    EventKind::MouseLeave,
    EventKind::Click,
    EventKind::KeyDown,
    EventKind::KeyUp,
    EventKind::Focus,
    EventKind::Blur,
    EventKind::FocusIn,
    EventKind::FocusOut,
    EventKind::Scroll,
    EventKind::Resize,
    EventKind::BeforeMatch,
    EventKind::CompositionStart,
    EventKind::CompositionEnd,
    EventKind::WindowBlur,
];

/// Merge source patches (in order) and optional caller props into one bundle.
pub fn merge(
    patches: impl IntoIterator<Item = PropsPatch>,
    user: Option<&UserTargetProps>,
) -> ElementProps {
    let mut out = ElementProps::default();
    for (i, patch) in patches.into_iter().enumerate() {
        out.attrs.extend(patch.attrs);
        for kind in ALL_KINDS {
            if patch.handles.contains(kind.flag()) {
                out.push(kind, HandlerSlot::Source(i));
            }
        }
    }
    if let Some(user) = user {
        out.attrs
            .extend(user.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (i, (kind, _)) in user.handlers.iter().enumerate() {
            out.push(*kind, HandlerSlot::User(i));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_attrs_win_and_absent_overrides() {
        let a = PropsPatch::new().attr("id", "a").attr("tabindex", 0_i64);
        let b = PropsPatch::new().attr("tabindex", AttrValue::Absent);
        let m = merge([a, b], None);
        assert_eq!(m.str_attr("id"), Some("a"));
        assert_eq!(m.attr("tabindex"), Some(&AttrValue::Absent));
    }

    #[test]
    fn user_attrs_are_outermost() {
        let mut user = UserTargetProps::default();
        user.set_attr("role", "menuitem");
        let m = merge([PropsPatch::new().attr("role", "option")], Some(&user));
        assert_eq!(m.str_attr("role"), Some("menuitem"));
    }

    #[test]
    fn chains_keep_source_order_and_skip_gaps() {
        let m = merge(
            [
                PropsPatch::new().handles(EventTypes::KEY_DOWN),
                PropsPatch::new(),
                PropsPatch::new().handles(EventTypes::KEY_DOWN | EventTypes::FOCUS),
            ],
            None,
        );
        assert_eq!(
            m.chain(EventKind::KeyDown),
            &[HandlerSlot::Source(0), HandlerSlot::Source(2)]
        );
        assert_eq!(m.chain(EventKind::Focus), &[HandlerSlot::Source(2)]);
        assert!(m.chain(EventKind::Blur).is_empty());
        assert_eq!(m.events(), EventTypes::KEY_DOWN | EventTypes::FOCUS);
    }

    #[test]
    fn user_handlers_run_last() {
        let mut user = UserTargetProps::default();
        user.on(EventKind::Blur, |e| e.default_prevented = true);
        user.on(EventKind::Blur, |e| e.propagation_stopped = true);
        let m = merge([PropsPatch::new().handles(EventTypes::BLUR)], Some(&user));
        assert_eq!(
            m.chain(EventKind::Blur),
            &[
                HandlerSlot::Source(0),
                HandlerSlot::User(0),
                HandlerSlot::User(1)
            ]
        );
        let mut ev = Event::new(EventKind::Blur, 0);
        user.call(0, &mut ev);
        user.call(1, &mut ev);
        assert!(ev.default_prevented && ev.propagation_stopped);
    }
}
