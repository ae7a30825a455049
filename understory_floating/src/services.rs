// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Page-wide services shared by every instance.
//!
//! These are process-wide in a browser (the previously-focused element list,
//! the document listener set, portal bookkeeping). Here they are explicit,
//! resettable values owned by the host and passed in through the environment,
//! so tests stay deterministic.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::dom::{Document, ElementId};
use crate::event::{DocumentListeners, EventKind, Phase};

/// Identifier of a [`Floating`](crate::Floating) instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

/// Bounded history of previously focused elements.
#[derive(Clone, Debug)]
pub struct FocusHistory {
    entries: Vec<ElementId>,
    limit: usize,
}

impl Default for FocusHistory {
    fn default() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }
}

impl FocusHistory {
    /// Default number of retained entries.
    pub const DEFAULT_LIMIT: usize = 20;

    /// A history retaining at most `limit` entries.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record `element`, pruning disconnected entries. The body is never recorded.
    pub fn push(&mut self, doc: &Document, element: Option<ElementId>) {
        self.entries.retain(|e| doc.is_alive(*e));
        let Some(element) = element.filter(|e| *e != doc.body() && doc.is_alive(*e)) else {
            return;
        };
        self.entries.push(element);
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
    }

    /// The most recent entry still connected to the document.
    pub fn previous(&self, doc: &Document) -> Option<ElementId> {
        self.entries.iter().rev().copied().find(|e| doc.is_alive(*e))
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Registration {
    instance: InstanceId,
    phase: Phase,
    listeners: DocumentListeners,
}

/// Document/window-level listener registrations, in registration order.
#[derive(Clone, Debug, Default)]
pub struct ListenerRegistry {
    entries: Vec<Registration>,
}

impl ListenerRegistry {
    /// Reconcile the registrations of `instance` with what it currently wants.
    ///
    /// Unchanged registrations keep their position; new ones are appended.
    pub fn sync(&mut self, instance: InstanceId, wanted: DocumentListeners) {
        for phase in [Phase::Capture, Phase::Bubble] {
            let types = wanted.in_phase(phase);
            let pos = self
                .entries
                .iter()
                .position(|r| r.instance == instance && r.phase == phase);
            match (pos, types.is_empty()) {
                (Some(i), true) => {
                    tracing::trace!(?instance, ?phase, "document listeners removed");
                    self.entries.remove(i);
                }
                (Some(i), false) => {
                    let mut listeners = DocumentListeners::default();
                    listeners.add(types, phase);
                    self.entries[i].listeners = listeners;
                }
                (None, false) => {
                    tracing::trace!(?instance, ?phase, ?types, "document listeners added");
                    let mut listeners = DocumentListeners::default();
                    listeners.add(types, phase);
                    self.entries.push(Registration {
                        instance,
                        phase,
                        listeners,
                    });
                }
                (None, true) => {}
            }
        }
    }

    /// Drop every registration of `instance`.
    pub fn remove_instance(&mut self, instance: InstanceId) {
        self.entries.retain(|r| r.instance != instance);
    }

    /// Listeners for `kind` in delivery order: capture phase first, then bubble.
    pub fn delivery_order(&self, kind: EventKind) -> Vec<(InstanceId, Phase)> {
        let flag = kind.flag();
        let mut out = Vec::new();
        for phase in [Phase::Capture, Phase::Bubble] {
            out.extend(
                self.entries
                    .iter()
                    .filter(|r| r.phase == phase && r.listeners.in_phase(phase).contains(flag))
                    .map(|r| (r.instance, phase)),
            );
        }
        out
    }

    /// Returns true if `instance` currently listens for `kind` in any phase.
    pub fn is_listening(&self, instance: InstanceId, kind: EventKind) -> bool {
        self.entries.iter().any(|r| {
            r.instance == instance && r.listeners.in_phase(r.phase).contains(kind.flag())
        })
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Portal {
    root: ElementId,
    anchor: ElementId,
}

/// Bookkeeping for floating content rendered away from its reference.
///
/// Tab order across portaled content follows author intent: a portal's
/// subtree is treated as if it directly followed its anchor element.
#[derive(Clone, Debug, Default)]
pub struct PortalManager {
    portals: Vec<Portal>,
}

impl PortalManager {
    /// Record that `root` is portaled content anchored after `anchor`.
    pub fn register(&mut self, root: ElementId, anchor: ElementId) {
        self.portals.retain(|p| p.root != root);
        self.portals.push(Portal { root, anchor });
    }

    /// Forget the portal rooted at `root`.
    pub fn unregister(&mut self, root: ElementId) {
        self.portals.retain(|p| p.root != root);
    }

    /// Returns true if `root` is registered as portaled content.
    pub fn is_portaled(&self, root: ElementId) -> bool {
        self.portals.iter().any(|p| p.root == root)
    }

    /// Tabbable elements of the document in author-intended order.
    pub fn tab_order(&self, doc: &Document) -> Vec<ElementId> {
        let mut out = Vec::new();
        self.visit(doc, doc.body(), &mut out, 0);
        out.retain(|e| doc.is_tabbable(*e));
        out
    }

    fn visit(&self, doc: &Document, node: ElementId, out: &mut Vec<ElementId>, depth: usize) {
        if depth > self.portals.len() + 1 && self.is_portaled(node) {
            return;
        }
        out.push(node);
        for child in doc.children_of(node) {
            if self.is_portaled(*child) {
                continue;
            }
            self.visit(doc, *child, out, depth);
        }
        for p in self.portals.iter().filter(|p| p.anchor == node) {
            if doc.is_alive(p.root) && !out.contains(&p.root) {
                self.visit_root(doc, p.root, out, depth + 1);
            }
        }
    }

    fn visit_root(&self, doc: &Document, root: ElementId, out: &mut Vec<ElementId>, depth: usize) {
        out.push(root);
        for child in doc.children_of(root) {
            if !self.is_portaled(*child) {
                self.visit(doc, *child, out, depth);
            }
        }
        for p in self.portals.iter().filter(|p| p.anchor == root) {
            if doc.is_alive(p.root) && !out.contains(&p.root) {
                self.visit_root(doc, p.root, out, depth + 1);
            }
        }
    }

    /// The next tabbable after `from` in author order, skipping `skip_within`.
    pub fn next_tabbable(
        &self,
        doc: &Document,
        from: ElementId,
        skip_within: Option<ElementId>,
    ) -> Option<ElementId> {
        self.neighbor(doc, from, skip_within, false)
    }

    /// The previous tabbable before `from` in author order, skipping `skip_within`.
    pub fn prev_tabbable(
        &self,
        doc: &Document,
        from: ElementId,
        skip_within: Option<ElementId>,
    ) -> Option<ElementId> {
        self.neighbor(doc, from, skip_within, true)
    }

    fn neighbor(
        &self,
        doc: &Document,
        from: ElementId,
        skip_within: Option<ElementId>,
        backward: bool,
    ) -> Option<ElementId> {
        let mut order = Vec::new();
        self.visit(doc, doc.body(), &mut order, 0);
        let pos = order.iter().position(|e| *e == from)?;
        let accept = |e: &ElementId| {
            doc.is_tabbable(*e)
                && *e != from
                && !doc.data(*e).is_some_and(|d| d.guard.is_some())
                && !skip_within.is_some_and(|s| doc.contains(s, *e))
        };
        if backward {
            order[..pos].iter().rev().copied().find(|e| accept(e))
        } else {
            order[pos + 1..].iter().copied().find(|e| accept(e))
        }
    }

    /// Drop every portal.
    pub fn clear(&mut self) {
        self.portals.clear();
    }
}

/// Every page-wide service, owned by the host.
#[derive(Clone, Debug, Default)]
pub struct Services {
    /// Previously focused elements.
    pub focus_history: FocusHistory,
    /// Document-level listener registrations.
    pub listeners: ListenerRegistry,
    /// Portaled content bookkeeping.
    pub portals: PortalManager,
    next_id: u64,
}

impl Services {
    /// Fresh services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every service to its initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Allocate an instance identifier.
    pub fn next_instance(&mut self) -> InstanceId {
        self.next_id += 1;
        InstanceId(self.next_id)
    }

    /// Allocate a unique element id string with `prefix`.
    pub fn next_dom_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementData, ElementFlags};
    use crate::event::{EventTypes, Phase};
    use alloc::vec;
    use kurbo::Rect;

    fn tabbable() -> ElementData {
        ElementData::new(Rect::ZERO, ElementFlags::TABBABLE)
    }

    #[test]
    fn history_is_bounded_and_skips_removed() {
        let mut doc = Document::new();
        let body = doc.body();
        let mut h = FocusHistory::with_limit(2);
        let a = doc.insert(body, tabbable()).unwrap();
        let b = doc.insert(body, tabbable()).unwrap();
        let c = doc.insert(body, tabbable()).unwrap();
        h.push(&doc, Some(body));
        assert!(h.is_empty());
        h.push(&doc, Some(a));
        h.push(&doc, Some(b));
        h.push(&doc, Some(c));
        assert_eq!(h.len(), 2);
        assert_eq!(h.previous(&doc), Some(c));
        doc.remove(c);
        assert_eq!(h.previous(&doc), Some(b));
    }

    #[test]
    fn registry_orders_capture_before_bubble() {
        let mut reg = ListenerRegistry::default();
        let a = InstanceId(1);
        let b = InstanceId(2);
        let mut la = DocumentListeners::default();
        la.add(EventTypes::KEY_DOWN, Phase::Bubble);
        let mut lb = DocumentListeners::default();
        lb.add(EventTypes::KEY_DOWN, Phase::Capture);
        reg.sync(a, la);
        reg.sync(b, lb);
        assert_eq!(
            reg.delivery_order(EventKind::KeyDown),
            vec![(b, Phase::Capture), (a, Phase::Bubble)]
        );
        reg.sync(a, DocumentListeners::default());
        assert_eq!(reg.delivery_order(EventKind::KeyDown), vec![(b, Phase::Capture)]);
        assert!(!reg.is_listening(a, EventKind::KeyDown));
    }

    #[test]
    fn resync_keeps_registration_position() {
        let mut reg = ListenerRegistry::default();
        let mut l = DocumentListeners::default();
        l.add(EventTypes::KEY_DOWN, Phase::Bubble);
        reg.sync(InstanceId(1), l);
        reg.sync(InstanceId(2), l);
        reg.sync(InstanceId(1), l);
        assert_eq!(
            reg.delivery_order(EventKind::KeyDown),
            vec![(InstanceId(1), Phase::Bubble), (InstanceId(2), Phase::Bubble)]
        );
    }

    #[test]
    fn portal_content_follows_its_anchor() {
        let mut doc = Document::new();
        let body = doc.body();
        let before = doc.insert(body, tabbable()).unwrap();
        let anchor = doc.insert(body, tabbable()).unwrap();
        let after = doc.insert(body, tabbable()).unwrap();
        let portal = doc.insert(body, ElementData::default()).unwrap();
        let inside = doc.insert(portal, tabbable()).unwrap();

        let mut pm = PortalManager::default();
        assert_eq!(pm.tab_order(&doc), vec![before, anchor, after, inside]);
        pm.register(portal, anchor);
        assert_eq!(pm.tab_order(&doc), vec![before, anchor, inside, after]);
        assert_eq!(pm.next_tabbable(&doc, anchor, Some(portal)), Some(after));
        assert_eq!(pm.next_tabbable(&doc, anchor, None), Some(inside));
        assert_eq!(pm.prev_tabbable(&doc, after, Some(portal)), Some(anchor));
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = Services::new();
        let doc = Document::new();
        let id = s.next_instance();
        let mut l = DocumentListeners::default();
        l.add(EventTypes::CLICK, Phase::Bubble);
        s.listeners.sync(id, l);
        s.focus_history.push(&doc, None);
        s.reset();
        assert!(s.listeners.is_empty());
        assert_eq!(s.next_instance(), InstanceId(1));
    }
}
