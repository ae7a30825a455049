// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-mirrored element arena.
//!
//! The engine never touches a real DOM. Hosts mirror the parts of their element
//! tree that overlays care about into a [`Document`]: hierarchy, bounding boxes,
//! focusability, scroll metrics and running animations. The engine reads it to
//! answer containment and tab-order questions and writes to it only for focus
//! moves, `inert`/`aria-hidden` marking and focus guard sentinels.

use alloc::vec::Vec;
use kurbo::Rect;

/// Identifier for an element in a [`Document`] (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32, pub(crate) u32);

impl ElementId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Element capabilities relevant to interaction and focus handling.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ElementFlags: u16 {
        /// Element can receive focus programmatically.
        const FOCUSABLE      = 0b0000_0000_0001;
        /// Element participates in sequential (Tab) navigation. Implies focusable.
        const TABBABLE       = 0b0000_0000_0010;
        /// Element is disabled (`disabled` or `aria-disabled="true"`).
        const DISABLED       = 0b0000_0000_0100;
        /// Element accepts text input (input, textarea, contenteditable).
        const TYPEABLE       = 0b0000_0000_1000;
        /// Computed `overflow-x` is `auto` or `scroll`.
        const SCROLL_X       = 0b0000_0001_0000;
        /// Computed `overflow-y` is `auto` or `scroll`.
        const SCROLL_Y       = 0b0000_0010_0000;
        /// Computed `direction` is `rtl`.
        const RTL            = 0b0000_0100_0000;
        /// Element is a native button.
        const BUTTON         = 0b0000_1000_0000;
        /// Element declares a CSS animation.
        const HAS_ANIMATION  = 0b0001_0000_0000;
        /// Element declares a CSS transition.
        const HAS_TRANSITION = 0b0010_0000_0000;
    }
}

/// Which side of a portal boundary a focus guard sentinel belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GuardKind {
    /// Guard rendered inside the floating content (`data-type="inside"`).
    Inside,
    /// Guard rendered outside a portal to preserve tab order (`data-type="outside"`).
    Outside,
}

/// Scroll geometry of an element, mirroring `clientWidth` and friends.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollMetrics {
    /// Inner width excluding scrollbars.
    pub client_width: f64,
    /// Inner height excluding scrollbars.
    pub client_height: f64,
    /// Full scrollable content width.
    pub scroll_width: f64,
    /// Full scrollable content height.
    pub scroll_height: f64,
    /// Border-box width including scrollbars.
    pub offset_width: f64,
}

/// Host-provided data for a single element.
#[derive(Clone, Debug, Default)]
pub struct ElementData {
    /// Bounding client rect.
    pub rect: Rect,
    /// Capability flags.
    pub flags: ElementFlags,
    /// Scroll geometry, used for scrollbar press detection.
    pub scroll: ScrollMetrics,
    /// Set when the element is a focus guard sentinel.
    pub guard: Option<GuardKind>,
}

impl ElementData {
    /// Data for an element with the given rect and flags.
    pub fn new(rect: Rect, flags: ElementFlags) -> Self {
        Self {
            rect,
            flags,
            ..Self::default()
        }
    }
}

/// Options for a programmatic focus move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FocusOptions {
    /// Ask the host not to scroll the newly focused element into view.
    pub prevent_scroll: bool,
}

/// A focus move performed by [`Document::focus`].
///
/// The host is expected to deliver matching `blur`/`focus` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusChange {
    /// Element that lost focus.
    pub previous: Option<ElementId>,
    /// Element that gained focus.
    pub next: ElementId,
    /// Options the move was requested with.
    pub options: FocusOptions,
}

#[derive(Clone, Debug)]
struct Element {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    data: ElementData,
    inert: u32,
    aria_hidden: u32,
    markers: u32,
    running_animations: u32,
}

/// Element arena with a single root standing in for the document body.
#[derive(Clone, Debug)]
pub struct Document {
    /// slots
    nodes: Vec<Option<Element>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    body: ElementId,
    active: Option<ElementId>,
    last_focus: Option<FocusChange>,
    /// Whether the platform implements the `inert` attribute.
    pub supports_inert: bool,
    /// Whether `focus({ preventScroll })` is honored by the platform.
    pub supports_prevent_scroll: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only the body element.
    pub fn new() -> Self {
        let body = Element {
            parent: None,
            children: Vec::new(),
            data: ElementData::default(),
            inert: 0,
            aria_hidden: 0,
            markers: 0,
            running_animations: 0,
        };
        Self {
            nodes: alloc::vec![Some(body)],
            generations: alloc::vec![1],
            free_list: Vec::new(),
            body: ElementId::new(0, 1),
            active: None,
            last_focus: None,
            supports_inert: true,
            supports_prevent_scroll: true,
        }
    }

    /// The root element. Stands in for both `body` and the window.
    pub fn body(&self) -> ElementId {
        self.body
    }

    fn alloc(&mut self, parent: ElementId, data: ElementData) -> ElementId {
        let element = Element {
            parent: Some(parent),
            children: Vec::new(),
            data,
            inert: 0,
            aria_hidden: 0,
            markers: 0,
            running_animations: 0,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(element);
            (idx, generation)
        } else {
            self.nodes.push(Some(element));
            self.generations.push(1);
            (self.nodes.len() - 1, 1)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "ElementId indices are 32-bit."
        )]
        ElementId::new(idx as u32, generation)
    }

    /// Append a new element as the last child of `parent`.
    ///
    /// Returns `None` if `parent` is stale.
    pub fn insert(&mut self, parent: ElementId, data: ElementData) -> Option<ElementId> {
        if !self.is_alive(parent) {
            return None;
        }
        let id = self.alloc(parent, data);
        self.element_mut(parent).children.push(id);
        Some(id)
    }

    /// Insert a new element as the sibling immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: ElementId, data: ElementData) -> Option<ElementId> {
        self.insert_sibling(sibling, data, 0)
    }

    /// Insert a new element as the sibling immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: ElementId, data: ElementData) -> Option<ElementId> {
        self.insert_sibling(sibling, data, 1)
    }

    fn insert_sibling(
        &mut self,
        sibling: ElementId,
        data: ElementData,
        offset: usize,
    ) -> Option<ElementId> {
        let parent = self.parent_of(sibling)?;
        let pos = self
            .element(parent)
            .children
            .iter()
            .position(|c| *c == sibling)?;
        let id = self.alloc(parent, data);
        self.element_mut(parent).children.insert(pos + offset, id);
        Some(id)
    }

    /// Remove an element and its subtree.
    ///
    /// If the active element lives in the removed subtree, focus falls back to
    /// nothing (the body). The body itself cannot be removed.
    pub fn remove(&mut self, id: ElementId) {
        if !self.is_alive(id) || id == self.body {
            return;
        }
        if let Some(active) = self.active
            && self.contains(id, active)
        {
            self.active = None;
        }
        if let Some(parent) = self.element(id).parent {
            self.element_mut(parent).children.retain(|c| *c != id);
        }
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: ElementId) {
        let children = core::mem::take(&mut self.element_mut(id).children);
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Returns true if `id` refers to a live element.
    pub fn is_alive(&self, id: ElementId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some()
            && self.generations.get(id.idx()) == Some(&id.1)
    }

    fn element(&self, id: ElementId) -> &Element {
        self.nodes[id.idx()].as_ref().expect("live element")
    }

    fn element_mut(&mut self, id: ElementId) -> &mut Element {
        self.nodes[id.idx()].as_mut().expect("live element")
    }

    fn element_opt(&self, id: ElementId) -> Option<&Element> {
        if self.is_alive(id) {
            self.nodes[id.idx()].as_ref()
        } else {
            None
        }
    }

    fn element_opt_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        if self.is_alive(id) {
            self.nodes[id.idx()].as_mut()
        } else {
            None
        }
    }

    /// Host data of a live element.
    pub fn data(&self, id: ElementId) -> Option<&ElementData> {
        self.element_opt(id).map(|e| &e.data)
    }

    /// Mutable host data of a live element.
    pub fn data_mut(&mut self, id: ElementId) -> Option<&mut ElementData> {
        self.element_opt_mut(id).map(|e| &mut e.data)
    }

    /// Flags of a live element, or empty flags for stale ids.
    pub fn flags(&self, id: ElementId) -> ElementFlags {
        self.data(id).map(|d| d.flags).unwrap_or_default()
    }

    /// Bounding rect of a live element.
    pub fn rect(&self, id: ElementId) -> Option<Rect> {
        self.data(id).map(|d| d.rect)
    }

    /// Update the bounding rect of a live element.
    pub fn set_rect(&mut self, id: ElementId, rect: Rect) {
        if let Some(d) = self.data_mut(id) {
            d.rect = rect;
        }
    }

    /// Parent of a live element.
    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.element_opt(id).and_then(|e| e.parent)
    }

    /// Children of a live element in document order.
    pub fn children_of(&self, id: ElementId) -> &[ElementId] {
        self.element_opt(id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns true if `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        if !self.is_alive(ancestor) || !self.is_alive(node) {
            return false;
        }
        let mut cur = Some(node);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent_of(c);
        }
        false
    }

    /// Returns true if `node` is inside any of the given optional roots.
    pub fn contains_any(
        &self,
        roots: impl IntoIterator<Item = Option<ElementId>>,
        node: ElementId,
    ) -> bool {
        roots.into_iter().flatten().any(|r| self.contains(r, node))
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        core::iter::successors(self.parent_of(id), move |p| self.parent_of(*p))
    }

    /// Highest ancestor of `id` below the body (or `id` itself).
    pub fn root_ancestor(&self, id: ElementId) -> ElementId {
        let mut cur = id;
        while let Some(p) = self.parent_of(cur) {
            if p == self.body {
                break;
            }
            cur = p;
        }
        cur
    }

    /// Pre-order traversal of the subtree rooted at `root`, including `root`.
    pub fn descendants(&self, root: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        if !self.is_alive(root) {
            return out;
        }
        let mut stack = alloc::vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children_of(id).iter().rev().copied());
        }
        out
    }

    /// Returns true if `id` or an ancestor is currently inert.
    pub fn is_inert(&self, id: ElementId) -> bool {
        let Some(e) = self.element_opt(id) else {
            return false;
        };
        e.inert > 0 || self.ancestors(id).any(|a| self.element(a).inert > 0)
    }

    /// Returns true if `id` or an ancestor is currently `aria-hidden`.
    pub fn is_aria_hidden(&self, id: ElementId) -> bool {
        let Some(e) = self.element_opt(id) else {
            return false;
        };
        e.aria_hidden > 0 || self.ancestors(id).any(|a| self.element(a).aria_hidden > 0)
    }

    /// Returns true if `id` carries the engine's inert marker attribute.
    pub fn has_marker(&self, id: ElementId) -> bool {
        self.element_opt(id).is_some_and(|e| e.markers > 0)
    }

    /// All elements currently carrying the inert marker attribute.
    pub fn markers(&self) -> Vec<ElementId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|id| self.has_marker(*id))
            .collect()
    }

    pub(crate) fn adjust_marks(&mut self, id: ElementId, inert: bool, aria: bool, delta: i32) {
        let Some(e) = self.element_opt_mut(id) else {
            return;
        };
        let apply = |count: &mut u32| {
            *count = count.saturating_add_signed(delta);
        };
        if inert {
            apply(&mut e.inert);
        }
        if aria {
            apply(&mut e.aria_hidden);
        }
        apply(&mut e.markers);
    }

    /// Returns true if `id` is focusable and not blocked by `inert` or `disabled`.
    pub fn is_focusable(&self, id: ElementId) -> bool {
        let flags = self.flags(id);
        self.is_alive(id)
            && flags.intersects(ElementFlags::FOCUSABLE | ElementFlags::TABBABLE)
            && !flags.contains(ElementFlags::DISABLED)
            && !self.is_inert(id)
    }

    /// Returns true if `id` takes part in sequential focus navigation.
    pub fn is_tabbable(&self, id: ElementId) -> bool {
        self.is_focusable(id) && self.flags(id).contains(ElementFlags::TABBABLE)
    }

    /// Tabbable descendants of `root` in document order, excluding `root`.
    pub fn tabbables_within(&self, root: ElementId) -> Vec<ElementId> {
        self.descendants(root)
            .into_iter()
            .skip(1)
            .filter(|id| self.is_tabbable(*id))
            .collect()
    }

    /// Returns true if `id` or an ancestor has right-to-left direction.
    pub fn is_rtl(&self, id: ElementId) -> bool {
        self.flags(id).contains(ElementFlags::RTL)
            || self
                .ancestors(id)
                .any(|a| self.flags(a).contains(ElementFlags::RTL))
    }

    /// Scrollable ancestors of `id`, nearest first, ending with the body (window).
    pub fn overflow_ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = self
            .ancestors(id)
            .filter(|a| {
                *a != self.body
                    && self
                        .flags(*a)
                        .intersects(ElementFlags::SCROLL_X | ElementFlags::SCROLL_Y)
            })
            .collect();
        if self.is_alive(id) {
            out.push(self.body);
        }
        out
    }

    /// Currently focused element, if any besides the body.
    pub fn active_element(&self) -> Option<ElementId> {
        self.active.filter(|a| self.is_alive(*a))
    }

    /// The most recent focus move performed through [`Document::focus`].
    pub fn last_focus(&self) -> Option<FocusChange> {
        self.last_focus
    }

    /// Move focus to `id`.
    ///
    /// Returns `None` if the element cannot take focus or already has it.
    pub fn focus(&mut self, id: ElementId, options: FocusOptions) -> Option<FocusChange> {
        if !self.is_focusable(id) || self.active_element() == Some(id) {
            return None;
        }
        let change = FocusChange {
            previous: self.active_element(),
            next: id,
            options,
        };
        self.active = Some(id);
        self.last_focus = Some(change);
        Some(change)
    }

    /// Drop focus back to the body.
    pub fn blur(&mut self) -> Option<ElementId> {
        self.active.take()
    }

    /// Number of running animations reported by the host for `id`.
    pub fn running_animations(&self, id: ElementId) -> u32 {
        self.element_opt(id).map_or(0, |e| e.running_animations)
    }

    /// Report how many animations are running on `id`.
    pub fn set_running_animations(&mut self, id: ElementId, count: u32) {
        if let Some(e) = self.element_opt_mut(id) {
            e.running_animations = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button() -> ElementData {
        ElementData::new(Rect::new(0.0, 0.0, 10.0, 10.0), ElementFlags::TABBABLE)
    }

    #[test]
    fn insert_and_contains() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.insert(body, ElementData::default()).unwrap();
        let b = doc.insert(a, button()).unwrap();
        let c = doc.insert(body, button()).unwrap();

        assert!(doc.contains(a, b));
        assert!(doc.contains(b, b));
        assert!(!doc.contains(a, c));
        assert_eq!(doc.root_ancestor(b), a);
        assert_eq!(doc.descendants(body), alloc::vec![body, a, b, c]);
    }

    #[test]
    fn sibling_insertion_keeps_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let mid = doc.insert(body, button()).unwrap();
        let before = doc.insert_before(mid, button()).unwrap();
        let after = doc.insert_after(mid, button()).unwrap();
        assert_eq!(doc.children_of(body), &[before, mid, after]);
    }

    #[test]
    fn removing_active_subtree_drops_focus() {
        let mut doc = Document::new();
        let body = doc.body();
        let panel = doc.insert(body, ElementData::default()).unwrap();
        let inner = doc.insert(panel, button()).unwrap();
        assert!(doc.focus(inner, FocusOptions::default()).is_some());
        doc.remove(panel);
        assert_eq!(doc.active_element(), None);
        assert!(!doc.is_alive(inner));

        // Slot reuse bumps the generation, so the stale id stays stale.
        let reused = doc.insert(body, button()).unwrap();
        assert!(!doc.is_alive(inner));
        assert!(doc.is_alive(reused));
    }

    #[test]
    fn inert_blocks_focus_and_is_ref_counted() {
        let mut doc = Document::new();
        let body = doc.body();
        let wrap = doc.insert(body, ElementData::default()).unwrap();
        let btn = doc.insert(wrap, button()).unwrap();

        doc.adjust_marks(wrap, true, false, 1);
        doc.adjust_marks(wrap, true, false, 1);
        assert!(doc.is_inert(btn));
        assert!(doc.focus(btn, FocusOptions::default()).is_none());

        doc.adjust_marks(wrap, true, false, -1);
        assert!(doc.is_inert(btn));
        doc.adjust_marks(wrap, true, false, -1);
        assert!(!doc.is_inert(btn));
        assert!(doc.focus(btn, FocusOptions::default()).is_some());
    }

    #[test]
    fn tabbables_skip_disabled_and_root() {
        let mut doc = Document::new();
        let body = doc.body();
        let panel = doc.insert(body, button()).unwrap();
        let a = doc.insert(panel, button()).unwrap();
        let _disabled = doc
            .insert(
                panel,
                ElementData::new(
                    Rect::ZERO,
                    ElementFlags::TABBABLE | ElementFlags::DISABLED,
                ),
            )
            .unwrap();
        let b = doc.insert(panel, button()).unwrap();
        assert_eq!(doc.tabbables_within(panel), alloc::vec![a, b]);
    }

    #[test]
    fn overflow_ancestors_end_with_body() {
        let mut doc = Document::new();
        let body = doc.body();
        let scroller = doc
            .insert(body, ElementData::new(Rect::ZERO, ElementFlags::SCROLL_Y))
            .unwrap();
        let plain = doc.insert(scroller, ElementData::default()).unwrap();
        let leaf = doc.insert(plain, button()).unwrap();
        assert_eq!(doc.overflow_ancestors(leaf), alloc::vec![scroller, body]);
    }
}
