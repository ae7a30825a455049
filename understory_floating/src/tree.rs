// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Floating node registry: the hierarchy linking nested overlay instances.
//!
//! Nodes live in an arena and refer to each other by generational [`NodeId`],
//! so an instance unmounting while a sibling still holds its id never leaves a
//! dangling pointer behind; stale ids simply stop resolving.
//!
//! Each node carries a [`NodeContext`], a small mirror of the owning instance's
//! state. Open-state updates are staged and only become visible to queries on
//! [`FloatingTree::commit`], so every instance reacting to the same document
//! event sees the same tree snapshot regardless of the order it is called in.
//!
//! ```rust
//! use understory_floating::tree::{FloatingTree, NodeContext};
//!
//! let mut tree = FloatingTree::new();
//! let parent = tree.insert(None);
//! let child = tree.insert(Some(parent));
//! tree.attach(parent, NodeContext::default());
//! tree.attach(child, NodeContext::default());
//!
//! tree.set_open(child, true);
//! assert!(tree.descendants(parent, true).is_empty());
//! tree.commit();
//! assert_eq!(tree.descendants(parent, true), vec![child]);
//! assert_eq!(tree.deepest_open(parent), Some(child));
//! ```

use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::dom::ElementId;
use crate::emitter::Emitter;
use crate::event::{Key, Modifiers};

/// Identifier for a node in a [`FloatingTree`] (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Mirror of an instance's state, readable by other nodes of the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeContext {
    /// Committed open state.
    pub open: bool,
    /// Interactive reference element.
    pub dom_reference: Option<ElementId>,
    /// Floating element.
    pub floating: Option<ElementId>,
    /// Whether Escape dismissal bubbles past this node.
    pub escape_key_bubbles: bool,
    /// Whether outside-press dismissal bubbles past this node.
    pub outside_press_bubbles: bool,
}

impl Default for NodeContext {
    fn default() -> Self {
        Self {
            open: false,
            dom_reference: None,
            floating: None,
            escape_key_bubbles: false,
            outside_press_bubbles: true,
        }
    }
}

/// Tree-wide events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TreeEvent {
    /// Virtual focus moved to an element (emitted as `virtualfocus`).
    VirtualFocus(ElementId),
}

/// A command posted to another node's inbox.
///
/// Used instead of re-dispatching synthetic DOM events between nested lists.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeCommand {
    /// Handle a key press forwarded from an ancestor.
    ForwardedKey {
        /// The forwarded key.
        key: Key,
        /// Modifiers at the time of the original press.
        modifiers: Modifiers,
        /// Original event time.
        time: u64,
    },
}

#[derive(Clone, Debug)]
struct Node {
    parent: Option<NodeId>,
    context: Option<NodeContext>,
    staged_open: Option<bool>,
}

/// Registry of floating nodes for one disjoint root.
#[derive(Debug, Default)]
pub struct FloatingTree {
    nodes: Vec<Option<Node>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    inbox: HashMap<NodeId, Vec<NodeCommand>>,
    /// Tree-wide emitter (`virtualfocus`).
    pub events: Emitter<TreeEvent>,
}

impl FloatingTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under `parent` (or as a root).
    ///
    /// The node has no context until [`FloatingTree::attach`] is called, and
    /// is ignored by open-state queries until then.
    pub fn insert(&mut self, parent: Option<NodeId>) -> NodeId {
        let parent = parent.filter(|p| self.is_alive(*p));
        let node = Node {
            parent,
            context: None,
            staged_open: None,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(node);
            (idx, generation)
        } else {
            self.nodes.push(Some(node));
            self.generations.push(1);
            (self.nodes.len() - 1, 1)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId indices are 32-bit."
        )]
        NodeId(idx as u32, generation)
    }

    /// Unregister a node. Children keep their ids and become roots.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
        self.inbox.remove(&id);
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.get(id.idx()).is_some_and(|n| n.is_some())
            && self.generations.get(id.idx()) == Some(&id.1)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        if self.is_alive(id) {
            self.nodes[id.idx()].as_ref()
        } else {
            None
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.is_alive(id) {
            self.nodes[id.idx()].as_mut()
        } else {
            None
        }
    }

    fn live(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId indices are 32-bit."
            )]
            n.as_ref().map(|n| (NodeId(i as u32, self.generations[i]), n))
        })
    }

    /// Attach (or replace) the context mirror of a node.
    pub fn attach(&mut self, id: NodeId, context: NodeContext) {
        if let Some(n) = self.node_mut(id) {
            n.context = Some(context);
        }
    }

    /// Context mirror of a node, if attached.
    pub fn context(&self, id: NodeId) -> Option<&NodeContext> {
        self.node(id).and_then(|n| n.context.as_ref())
    }

    /// Update non-open fields of an attached context immediately.
    pub fn update(&mut self, id: NodeId, f: impl FnOnce(&mut NodeContext)) {
        if let Some(ctx) = self.node_mut(id).and_then(|n| n.context.as_mut()) {
            let open = ctx.open;
            f(ctx);
            ctx.open = open;
        }
    }

    /// Stage an open-state change, applied on the next [`FloatingTree::commit`].
    pub fn set_open(&mut self, id: NodeId, open: bool) {
        if let Some(n) = self.node_mut(id) {
            n.staged_open = Some(open);
        }
    }

    /// Apply staged open-state changes.
    pub fn commit(&mut self) {
        for n in self.nodes.iter_mut().flatten() {
            if let Some(open) = n.staged_open.take()
                && let Some(ctx) = &mut n.context
            {
                ctx.open = open;
            }
        }
    }

    /// Parent of a live node, if it is still alive.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .and_then(|n| n.parent)
            .filter(|p| self.is_alive(*p))
    }

    fn is_open(&self, n: &Node) -> bool {
        n.context.is_some_and(|c| c.open)
    }

    /// Direct children of a node, optionally only open ones.
    pub fn children(&self, id: NodeId, only_open: bool) -> Vec<NodeId> {
        self.live()
            .filter(|(cid, n)| {
                n.parent == Some(id)
                    && self.is_alive(id)
                    && *cid != id
                    && (!only_open || self.is_open(n))
            })
            .map(|(cid, _)| cid)
            .collect()
    }

    /// All descendants of a node, breadth first.
    ///
    /// With `only_open`, traversal descends only through open nodes.
    pub fn descendants(&self, id: NodeId, only_open: bool) -> Vec<NodeId> {
        let mut all = self.children(id, only_open);
        let mut frontier = all.clone();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for f in &frontier {
                next.extend(self.children(*f, only_open));
            }
            all.extend(next.iter().copied());
            frontier = next;
        }
        all
    }

    /// Ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent_of(id);
        while let Some(p) = cur {
            if out.contains(&p) {
                break;
            }
            out.push(p);
            cur = self.parent_of(p);
        }
        out
    }

    /// The deepest open descendant of a node, or the node itself.
    pub fn deepest_open(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        let mut best = (id, 0_usize);
        let mut stack = alloc::vec![(id, 0_usize)];
        while let Some((n, depth)) = stack.pop() {
            if depth > best.1 {
                best = (n, depth);
            }
            for c in self.children(n, true).into_iter().rev() {
                stack.push((c, depth + 1));
            }
        }
        Some(best.0)
    }

    /// Post a command to a node's inbox.
    pub fn post(&mut self, id: NodeId, command: NodeCommand) {
        if self.is_alive(id) {
            self.inbox.entry(id).or_default().push(command);
        }
    }

    /// Returns true if commands are waiting in a node's inbox.
    pub fn has_mail(&self, id: NodeId) -> bool {
        self.inbox.get(&id).is_some_and(|c| !c.is_empty())
    }

    /// Drain a node's inbox.
    pub fn take_inbox(&mut self, id: NodeId) -> Vec<NodeCommand> {
        self.inbox.remove(&id).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn open_ctx() -> NodeContext {
        NodeContext {
            open: true,
            ..NodeContext::default()
        }
    }

    #[test]
    fn descendants_only_through_open_nodes() {
        let mut tree = FloatingTree::new();
        let root = tree.insert(None);
        let a = tree.insert(Some(root));
        let b = tree.insert(Some(a));
        let c = tree.insert(Some(root));
        tree.attach(root, open_ctx());
        tree.attach(a, NodeContext::default());
        tree.attach(b, open_ctx());
        tree.attach(c, open_ctx());

        assert_eq!(tree.descendants(root, false), vec![a, c, b]);
        // `a` is closed, so its open child is not reachable.
        assert_eq!(tree.descendants(root, true), vec![c]);
    }

    #[test]
    fn unattached_nodes_are_not_open() {
        let mut tree = FloatingTree::new();
        let root = tree.insert(None);
        let child = tree.insert(Some(root));
        tree.set_open(child, true);
        tree.commit();
        assert!(tree.children(root, true).is_empty());
        assert_eq!(tree.children(root, false), vec![child]);
    }

    #[test]
    fn staged_open_waits_for_commit() {
        let mut tree = FloatingTree::new();
        let root = tree.insert(None);
        let child = tree.insert(Some(root));
        tree.attach(root, open_ctx());
        tree.attach(child, open_ctx());
        tree.set_open(child, false);
        assert_eq!(tree.children(root, true), vec![child]);
        tree.commit();
        assert!(tree.children(root, true).is_empty());
    }

    #[test]
    fn update_preserves_committed_open_state() {
        let mut tree = FloatingTree::new();
        let n = tree.insert(None);
        tree.attach(n, open_ctx());
        tree.update(n, |c| {
            c.open = false;
            c.escape_key_bubbles = true;
        });
        let ctx = tree.context(n).unwrap();
        assert!(ctx.open);
        assert!(ctx.escape_key_bubbles);
    }

    #[test]
    fn ancestors_and_deepest() {
        let mut tree = FloatingTree::new();
        let root = tree.insert(None);
        let mid = tree.insert(Some(root));
        let leaf = tree.insert(Some(mid));
        for n in [root, mid, leaf] {
            tree.attach(n, open_ctx());
        }
        assert_eq!(tree.ancestors(leaf), vec![mid, root]);
        assert_eq!(tree.deepest_open(root), Some(leaf));
        assert_eq!(tree.deepest_open(leaf), Some(leaf));
    }

    #[test]
    fn removed_parent_does_not_dangle() {
        let mut tree = FloatingTree::new();
        let root = tree.insert(None);
        let child = tree.insert(Some(root));
        tree.remove(root);
        assert_eq!(tree.parent_of(child), None);
        assert!(tree.ancestors(child).is_empty());
        // Reusing the slot must not resurrect the relationship.
        let other = tree.insert(None);
        assert_ne!(other, root);
        assert_eq!(tree.parent_of(child), None);
    }

    #[test]
    fn inbox_round_trip() {
        let mut tree = FloatingTree::new();
        let n = tree.insert(None);
        let cmd = NodeCommand::ForwardedKey {
            key: Key::ArrowDown,
            modifiers: Modifiers::empty(),
            time: 3,
        };
        tree.post(n, cmd);
        assert_eq!(tree.take_inbox(n), vec![cmd]);
        assert!(tree.take_inbox(n).is_empty());
    }
}
