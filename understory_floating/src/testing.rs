// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixture for unit tests.

use kurbo::Rect;

use crate::context::FloatingContext;
use crate::dom::{Document, ElementData, ElementFlags, ElementId};
use crate::services::{InstanceId, Services};
use crate::sources::{Interaction, InteractionCx};
use crate::tree::FloatingTree;

pub(crate) const REFERENCE_RECT: Rect = Rect::new(0.0, 0.0, 100.0, 20.0);
pub(crate) const FLOATING_RECT: Rect = Rect::new(0.0, 30.0, 100.0, 130.0);

/// A document with one reference button and one floating panel.
#[derive(Debug)]
pub(crate) struct Fixture {
    pub(crate) doc: Document,
    pub(crate) tree: FloatingTree,
    pub(crate) services: Services,
    pub(crate) ctx: FloatingContext,
    pub(crate) reference: ElementId,
    pub(crate) floating: ElementId,
    pub(crate) outside: ElementId,
    pub(crate) now: u64,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let mut doc = Document::new();
        let body = doc.body();
        let reference = doc
            .insert(
                body,
                ElementData::new(
                    REFERENCE_RECT,
                    ElementFlags::TABBABLE | ElementFlags::BUTTON,
                ),
            )
            .unwrap();
        let floating = doc
            .insert(body, ElementData::new(FLOATING_RECT, ElementFlags::empty()))
            .unwrap();
        let outside = doc
            .insert(
                body,
                ElementData::new(Rect::new(300.0, 300.0, 400.0, 400.0), ElementFlags::TABBABLE),
            )
            .unwrap();
        let mut ctx = FloatingContext::new("floating-1", false);
        ctx.set_reference(Some(reference));
        ctx.set_floating(Some(floating));
        Self {
            doc,
            tree: FloatingTree::new(),
            services: Services::new(),
            ctx,
            reference,
            floating,
            outside,
            now: 0,
        }
    }

    pub(crate) fn child(&mut self, parent: ElementId, flags: ElementFlags) -> ElementId {
        self.doc
            .insert(parent, ElementData::new(Rect::ZERO, flags))
            .unwrap()
    }

    pub(crate) fn cx(&mut self) -> InteractionCx<'_> {
        InteractionCx {
            ctx: &mut self.ctx,
            document: &mut self.doc,
            tree: &mut self.tree,
            services: &mut self.services,
            instance: InstanceId(1),
            now: self.now,
        }
    }

    /// Broadcast queued open changes back to `source`.
    pub(crate) fn settle(&mut self, source: &mut dyn Interaction) {
        loop {
            let pending = self.ctx.take_pending();
            if pending.is_empty() {
                break;
            }
            for details in pending {
                if let Some(node) = self.ctx.node_id() {
                    self.tree.set_open(node, details.open);
                }
                source.open_changed(&details, &mut self.cx());
            }
        }
        self.tree.commit();
    }

    pub(crate) fn advance_to(&mut self, now: u64, source: &mut dyn Interaction) {
        self.now = now;
        source.advance(&mut self.cx());
        self.settle(source);
    }
}
