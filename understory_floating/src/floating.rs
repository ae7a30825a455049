// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The instance facade.
//!
//! A [`Floating`] owns the [`FloatingContext`] of one overlay, its interaction
//! sources, an optional [`FocusManager`] and caller props. Every entry point
//! takes an [`Env`] carrying the host-mirrored document, the floating tree,
//! page services and the current time.
//!
//! After every source callback the facade broadcasts queued open changes to
//! all sources and the focus manager, stages the node's open state in the
//! tree and mirrors element references into the node context. Element events
//! and document events commit the tree once all handlers ran.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use crate::context::{FloatingContext, OpenChangeReason};
use crate::dom::Document;
use crate::event::{DocumentListeners, Event, Phase};
use crate::focus_manager::FocusManager;
use crate::position::{Placement, PositionEngine, PositionRequest, Positioned};
use crate::props::{ElementProps, HandlerSlot, ItemState, PropTarget, UserProps, merge};
use crate::services::{InstanceId, Services};
use crate::sources::{Interaction, InteractionCx};
use crate::timer::earliest;
use crate::tree::{FloatingTree, NodeContext, NodeId};

/// Host state handed to every entry point.
#[derive(Debug)]
pub struct Env<'a> {
    /// Host-mirrored document.
    pub document: &'a mut Document,
    /// Floating tree of the disjoint root this instance belongs to.
    pub tree: &'a mut FloatingTree,
    /// Page-wide services.
    pub services: &'a mut Services,
    /// Current time in milliseconds.
    pub now: u64,
}

/// One overlay instance.
pub struct Floating {
    ctx: FloatingContext,
    instance: InstanceId,
    sources: Vec<Box<dyn Interaction>>,
    focus_manager: Option<FocusManager>,
    user: UserProps,
    placement: Placement,
}

impl core::fmt::Debug for Floating {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("Floating")
            .field("ctx", &self.ctx)
            .field("instance", &self.instance)
            .field("sources", &names)
            .field("focus_manager", &self.focus_manager)
            .field("user", &self.user)
            .field("placement", &self.placement)
            .finish()
    }
}

impl Floating {
    /// A closed instance with a freshly allocated floating id.
    pub fn new(services: &mut Services) -> Self {
        let instance = services.next_instance();
        let id = services.next_dom_id("floating");
        Self::with_id(instance, id, false)
    }

    /// An instance with an explicit floating id and initial open state.
    ///
    /// The initial state is not an open change and notifies nobody.
    pub fn with_id(instance: InstanceId, floating_id: impl Into<String>, open: bool) -> Self {
        Self {
            ctx: FloatingContext::new(floating_id, open),
            instance,
            sources: Vec::new(),
            focus_manager: None,
            user: UserProps::default(),
            placement: Placement::default(),
        }
    }

    /// Builder: append an interaction source.
    ///
    /// Sources contribute props and run handlers in the order they were added.
    pub fn with_source(mut self, source: impl Interaction) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Builder: install a focus manager.
    pub fn with_focus_manager(mut self, focus_manager: FocusManager) -> Self {
        self.focus_manager = Some(focus_manager);
        self
    }

    /// Builder: requested placement for [`Floating::position`].
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Register this instance as a node of `tree` under `parent`.
    pub fn register(&mut self, tree: &mut FloatingTree, parent: Option<NodeId>) -> NodeId {
        if let Some(old) = self.ctx.node_id() {
            tree.remove(old);
        }
        let node = tree.insert(parent);
        self.ctx.set_node_id(Some(node));
        tree.attach(node, self.node_context());
        tree.commit();
        node
    }

    /// Identifier used for document listener registrations.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The root context.
    pub fn context(&self) -> &FloatingContext {
        &self.ctx
    }

    /// Mutable root context, for element references and the owner callback.
    pub fn context_mut(&mut self) -> &mut FloatingContext {
        &mut self.ctx
    }

    /// Current open state.
    pub fn open(&self) -> bool {
        self.ctx.open()
    }

    /// Caller props, merged outermost.
    pub fn user_props_mut(&mut self) -> &mut UserProps {
        &mut self.user
    }

    /// The focus manager, if installed.
    pub fn focus_manager(&self) -> Option<&FocusManager> {
        self.focus_manager.as_ref()
    }

    /// The first source of type `T`.
    pub fn source<T: Interaction>(&self) -> Option<&T> {
        self.sources.iter().find_map(|s| {
            let any: &dyn Any = s.as_ref();
            any.downcast_ref::<T>()
        })
    }

    /// The first source of type `T`, mutably.
    pub fn source_mut<T: Interaction>(&mut self) -> Option<&mut T> {
        self.sources.iter_mut().find_map(|s| {
            let any: &mut dyn Any = s.as_mut();
            any.downcast_mut::<T>()
        })
    }

    fn participant_count(&self) -> usize {
        self.sources.len() + usize::from(self.focus_manager.is_some())
    }

    fn participant(&self, i: usize) -> Option<&dyn Interaction> {
        match self.sources.get(i) {
            Some(s) => Some(s.as_ref()),
            None if i == self.sources.len() => {
                self.focus_manager.as_ref().map(|f| f as &dyn Interaction)
            }
            None => None,
        }
    }

    /// Run `f` on participant `i` with a context.
    fn with_participant(
        &mut self,
        i: usize,
        env: &mut Env<'_>,
        f: impl FnOnce(&mut dyn Interaction, &mut InteractionCx<'_>),
    ) {
        let Self {
            ctx,
            instance,
            sources,
            focus_manager,
            ..
        } = self;
        let len = sources.len();
        let participant: &mut dyn Interaction = match sources.get_mut(i) {
            Some(s) => s.as_mut(),
            None if i == len => match focus_manager {
                Some(fm) => fm,
                None => return,
            },
            None => return,
        };
        let mut cx = InteractionCx {
            ctx,
            document: &mut *env.document,
            tree: &mut *env.tree,
            services: &mut *env.services,
            instance: *instance,
            now: env.now,
        };
        f(participant, &mut cx);
    }

    fn node_context(&self) -> NodeContext {
        let elements = self.ctx.elements();
        NodeContext {
            open: self.ctx.open(),
            dom_reference: elements.dom_reference,
            floating: elements.floating,
            escape_key_bubbles: self.ctx.data.escape_key_bubbles,
            outside_press_bubbles: self.ctx.data.outside_press_bubbles,
        }
    }

    fn wanted_listeners(&self) -> DocumentListeners {
        (0..self.participant_count())
            .filter_map(|i| self.participant(i))
            .fold(DocumentListeners::default(), |acc, p| {
                acc.union(p.document_listeners(&self.ctx))
            })
    }

    /// Broadcast queued open changes until none remain, then mirror state.
    fn flush(&mut self, env: &mut Env<'_>) {
        loop {
            let pending = self.ctx.take_pending();
            if pending.is_empty() {
                break;
            }
            for details in pending {
                if let Some(node) = self.ctx.node_id() {
                    env.tree.set_open(node, details.open);
                }
                for i in 0..self.participant_count() {
                    self.with_participant(i, env, |p, cx| p.open_changed(&details, cx));
                }
            }
        }
        if let Some(node) = self.ctx.node_id() {
            let mirror = self.node_context();
            env.tree.update(node, |c| {
                c.dom_reference = mirror.dom_reference;
                c.floating = mirror.floating;
                c.escape_key_bubbles = mirror.escape_key_bubbles;
                c.outside_press_bubbles = mirror.outside_press_bubbles;
            });
        }
        let wanted = self.wanted_listeners();
        env.services.listeners.sync(self.instance, wanted);
    }

    fn props_for(&self, target: &PropTarget) -> ElementProps {
        let patches = (0..self.participant_count())
            .filter_map(|i| self.participant(i))
            .map(|p| p.props(target, &self.ctx));
        merge(patches, Some(self.user.for_target(target)))
    }

    /// Merged reference element props.
    pub fn reference_props(&self) -> ElementProps {
        self.props_for(&PropTarget::Reference)
    }

    /// Merged floating element props.
    pub fn floating_props(&self) -> ElementProps {
        self.props_for(&PropTarget::Floating)
    }

    /// Merged props of one list item.
    pub fn item_props(&self, state: ItemState) -> ElementProps {
        self.props_for(&PropTarget::Item(state))
    }

    /// Deliver an element event on `target` through its merged handler chain.
    ///
    /// Source handlers run in order, caller handlers last.
    pub fn dispatch(&mut self, target: PropTarget, event: &mut Event, env: &mut Env<'_>) {
        let chain: Vec<HandlerSlot> = self.props_for(&target).chain(event.kind).to_vec();
        for slot in chain {
            match slot {
                HandlerSlot::Source(i) => {
                    self.with_participant(i, env, |p, cx| p.handle(&target, event, cx));
                    self.flush(env);
                }
                HandlerSlot::User(i) => self.user.for_target_mut(&target).call(i, event),
            }
        }
        self.flush(env);
        env.tree.commit();
    }

    /// Deliver a document-level event in `phase` to the listening participants.
    ///
    /// Does not commit the tree; see [`dispatch_document_event`].
    pub fn handle_document_event(&mut self, event: &mut Event, phase: Phase, env: &mut Env<'_>) {
        let flag = event.kind.flag();
        for i in 0..self.participant_count() {
            let listening = self
                .participant(i)
                .is_some_and(|p| p.document_listeners(&self.ctx).in_phase(phase).contains(flag));
            if listening {
                self.with_participant(i, env, |p, cx| p.handle_document_event(event, phase, cx));
                self.flush(env);
            }
        }
    }

    /// Fire due timers, drain the node inbox and poll animation waits.
    pub fn advance(&mut self, env: &mut Env<'_>) {
        for i in 0..self.participant_count() {
            self.with_participant(i, env, |p, cx| p.advance(cx));
            self.flush(env);
        }
        if let Some(node) = self.ctx.node_id() {
            for command in env.tree.take_inbox(node) {
                tracing::trace!(?node, ?command, "node command");
                for i in 0..self.participant_count() {
                    self.with_participant(i, env, |p, cx| p.handle_command(&command, cx));
                    self.flush(env);
                }
            }
        }
        env.tree.commit();
    }

    /// Earliest time at which [`Floating::advance`] has work to do.
    pub fn next_deadline(&self, tree: &FloatingTree) -> Option<u64> {
        let mail = self
            .ctx
            .node_id()
            .is_some_and(|n| tree.has_mail(n))
            .then_some(0);
        earliest(
            (0..self.participant_count())
                .filter_map(|i| self.participant(i))
                .map(|p| p.next_deadline())
                .chain(core::iter::once(mail)),
        )
    }

    /// Change the open state from outside the sources.
    pub fn set_open(
        &mut self,
        open: bool,
        event: &Event,
        reason: OpenChangeReason,
        env: &mut Env<'_>,
    ) {
        self.ctx.on_open_change(open, event, reason);
        self.flush(env);
        env.tree.commit();
    }

    /// Position the floating element with `engine` and record the final placement.
    ///
    /// Returns `None` while either element is missing.
    pub fn position<E: PositionEngine>(
        &mut self,
        engine: &E,
        document: &Document,
    ) -> Option<Positioned<E::MiddlewareData>> {
        let reference = self.ctx.elements().reference_rect(document)?;
        let floating = self.ctx.elements().floating.and_then(|f| document.rect(f))?;
        let out = engine.compute(&PositionRequest {
            reference,
            floating,
            placement: self.placement,
        });
        self.ctx.placement = out.placement;
        Some(out)
    }

    /// Release every timer, listener, mark, guard and tree node of this instance.
    pub fn teardown(&mut self, env: &mut Env<'_>) {
        for i in 0..self.participant_count() {
            self.with_participant(i, env, |p, cx| p.teardown(cx));
        }
        env.services.listeners.remove_instance(self.instance);
        if let Some(node) = self.ctx.node_id() {
            env.tree.remove(node);
            self.ctx.set_node_id(None);
        }
        tracing::debug!(floating_id = self.ctx.floating_id(), "instance torn down");
    }
}

/// Route a document-level event to every registered instance.
///
/// Capture-phase registrations run first, then bubble-phase ones, each in
/// registration order. The tree is committed once at the end, so every
/// instance decides against the same open-state snapshot.
pub fn dispatch_document_event(
    instances: &mut [&mut Floating],
    event: &mut Event,
    env: &mut Env<'_>,
) {
    for (id, phase) in env.services.listeners.delivery_order(event.kind) {
        if let Some(f) = instances.iter_mut().find(|f| f.instance == id) {
            f.handle_document_event(event, phase, env);
        }
    }
    env.tree.commit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementData, ElementFlags, ElementId};
    use crate::event::{EventKind, Key};
    use crate::sources::{
        Click, ClickOptions, Delay, Dismiss, DismissBubbles, DismissOptions, Hover, HoverOptions,
        ListNavigation, ListNavigationOptions,
    };
    use crate::testing::{FLOATING_RECT, REFERENCE_RECT};
    use alloc::rc::Rc;
    use core::cell::Cell;
    use kurbo::{Point, Rect};

    struct World {
        doc: Document,
        tree: FloatingTree,
        services: Services,
    }

    impl World {
        fn new() -> Self {
            Self {
                doc: Document::new(),
                tree: FloatingTree::new(),
                services: Services::new(),
            }
        }

        fn env(&mut self, now: u64) -> Env<'_> {
            Env {
                document: &mut self.doc,
                tree: &mut self.tree,
                services: &mut self.services,
                now,
            }
        }

        fn element(&mut self, parent: ElementId, rect: Rect, flags: ElementFlags) -> ElementId {
            self.doc.insert(parent, ElementData::new(rect, flags)).unwrap()
        }

        fn instance(&mut self, parent: Option<NodeId>, under: ElementId) -> Floating {
            self.instance_with(parent, under, DismissOptions::default())
        }

        fn instance_with(
            &mut self,
            parent: Option<NodeId>,
            under: ElementId,
            dismiss: DismissOptions,
        ) -> Floating {
            let reference = self.element(under, REFERENCE_RECT, ElementFlags::TABBABLE);
            let body = self.doc.body();
            let floating = self.element(body, FLOATING_RECT, ElementFlags::empty());
            let mut f = Floating::new(&mut self.services)
                .with_source(Click::new(ClickOptions::default()))
                .with_source(Dismiss::new(dismiss));
            f.context_mut().set_reference(Some(reference));
            f.context_mut().set_floating(Some(floating));
            f.register(&mut self.tree, parent);
            f
        }
    }

    fn click(f: &Floating, t: u64) -> Event {
        let mut ev = Event::mouse(EventKind::Click, Point::new(5.0, 5.0), t);
        ev.target = f.context().elements().dom_reference;
        ev
    }

    #[test]
    fn hover_delay_opens_exactly_at_deadline() {
        let mut w = World::new();
        let body = w.doc.body();
        let reference = w.element(body, REFERENCE_RECT, ElementFlags::empty());
        let panel = w.element(body, FLOATING_RECT, ElementFlags::empty());
        let mut f = Floating::new(&mut w.services).with_source(Hover::new(HoverOptions {
            delay: Delay::Uniform(500),
            ..HoverOptions::default()
        }));
        f.context_mut().set_reference(Some(reference));
        f.context_mut().set_floating(Some(panel));
        assert!(f.reference_props().events().contains(EventKind::MouseEnter.flag()));

        let mut enter =
            Event::mouse(EventKind::MouseEnter, Point::new(5.0, 5.0), 0).with_target(reference);
        f.dispatch(PropTarget::Reference, &mut enter, &mut w.env(0));
        assert_eq!(f.next_deadline(&w.tree), Some(500));
        f.advance(&mut w.env(499));
        assert!(!f.open());
        f.advance(&mut w.env(500));
        assert!(f.open());
    }

    #[test]
    fn user_handlers_run_after_sources() {
        let mut w = World::new();
        let body = w.doc.body();
        let mut f = w.instance(None, body);
        let saw_open = Rc::new(Cell::new(false));
        let seen = saw_open.clone();
        let node = f.context().node_id();
        f.user_props_mut().reference.on(EventKind::Click, move |_| seen.set(true));
        f.user_props_mut().reference.set_attr("data-testid", "trigger");
        let props = f.reference_props();
        assert_eq!(props.str_attr("data-testid"), Some("trigger"));
        assert_eq!(props.chain(EventKind::Click).last(), Some(&HandlerSlot::User(0)));

        let mut ev = click(&f, 1);
        f.dispatch(PropTarget::Reference, &mut ev, &mut w.env(1));
        assert!(saw_open.get());
        assert!(f.open());
        assert!(w.tree.context(node.unwrap()).is_some_and(|c| c.open));
        assert!(w.services.listeners.is_listening(f.instance(), EventKind::KeyDown));
    }

    #[test]
    fn nested_escape_closes_only_the_innermost() {
        let mut w = World::new();
        let body = w.doc.body();
        let mut parent = w.instance(None, body);
        let parent_floating = parent.context().elements().floating.unwrap();
        let mut ev = click(&parent, 0);
        parent.dispatch(PropTarget::Reference, &mut ev, &mut w.env(0));

        let mut child = w.instance(parent.context().node_id(), parent_floating);
        let mut ev = click(&child, 1);
        child.dispatch(PropTarget::Reference, &mut ev, &mut w.env(1));
        assert!(parent.open() && child.open());

        let mut esc = Event::key_down(Key::Escape, 2);
        dispatch_document_event(&mut [&mut parent, &mut child], &mut esc, &mut w.env(2));
        assert!(parent.open());
        assert!(!child.open());

        let mut esc = Event::key_down(Key::Escape, 3);
        dispatch_document_event(&mut [&mut parent, &mut child], &mut esc, &mut w.env(3));
        assert!(!parent.open());
    }

    #[test]
    fn outside_press_inside_parent_closes_only_child() {
        let mut w = World::new();
        let body = w.doc.body();
        let mut parent = w.instance(None, body);
        let parent_floating = parent.context().elements().floating.unwrap();
        let mut ev = click(&parent, 0);
        parent.dispatch(PropTarget::Reference, &mut ev, &mut w.env(0));
        let mut child = w.instance(parent.context().node_id(), parent_floating);
        let mut ev = click(&child, 1);
        child.dispatch(PropTarget::Reference, &mut ev, &mut w.env(1));

        let inside_parent = w.element(
            parent_floating,
            Rect::new(0.0, 30.0, 10.0, 40.0),
            ElementFlags::empty(),
        );
        let mut press = Event::mouse(EventKind::PointerDown, Point::new(5.0, 35.0), 2)
            .with_target(inside_parent);
        dispatch_document_event(&mut [&mut parent, &mut child], &mut press, &mut w.env(2));
        assert!(parent.open());
        assert!(!child.open());
    }

    #[test]
    fn non_bubbling_outside_press_closes_one_level_at_a_time() {
        let mut w = World::new();
        let body = w.doc.body();
        let captured = || DismissOptions {
            bubbles: DismissBubbles::from_flag(Some(false)),
            ..DismissOptions::default()
        };
        let mut parent = w.instance_with(None, body, captured());
        let parent_floating = parent.context().elements().floating.unwrap();
        let mut ev = click(&parent, 0);
        parent.dispatch(PropTarget::Reference, &mut ev, &mut w.env(0));
        let mut child = w.instance_with(parent.context().node_id(), parent_floating, captured());
        let mut ev = click(&child, 1);
        child.dispatch(PropTarget::Reference, &mut ev, &mut w.env(1));
        assert!(parent.open() && child.open());

        let elsewhere = w.element(
            body,
            Rect::new(500.0, 500.0, 600.0, 600.0),
            ElementFlags::empty(),
        );
        let mut press = Event::mouse(EventKind::PointerDown, Point::new(550.0, 550.0), 2)
            .with_target(elsewhere);
        dispatch_document_event(&mut [&mut parent, &mut child], &mut press, &mut w.env(2));
        assert!(parent.open());
        assert!(!child.open());

        let mut press = Event::mouse(EventKind::PointerDown, Point::new(550.0, 550.0), 3)
            .with_target(elsewhere);
        dispatch_document_event(&mut [&mut parent, &mut child], &mut press, &mut w.env(3));
        assert!(!parent.open());
    }

    fn virtual_list(nested: bool) -> ListNavigation {
        ListNavigation::new(ListNavigationOptions {
            virtual_focus: true,
            nested,
            ..ListNavigationOptions::default()
        })
    }

    #[test]
    fn virtual_keys_reach_the_deepest_open_list() {
        let mut w = World::new();
        let body = w.doc.body();
        let parent_reference = w.element(body, REFERENCE_RECT, ElementFlags::TABBABLE);
        let parent_floating = w.element(body, FLOATING_RECT, ElementFlags::empty());
        let parent_items: Vec<Option<ElementId>> = (0..3)
            .map(|_| Some(w.element(parent_floating, Rect::ZERO, ElementFlags::FOCUSABLE)))
            .collect();
        let mut parent = Floating::new(&mut w.services)
            .with_source(Click::new(ClickOptions::default()))
            .with_source(virtual_list(false));
        parent.context_mut().set_reference(Some(parent_reference));
        parent.context_mut().set_floating(Some(parent_floating));
        parent.register(&mut w.tree, None);
        let parent_nav = parent.source_mut::<ListNavigation>().unwrap();
        parent_nav.set_items(parent_items.clone());

        // The submenu trigger is the parent's first item.
        let child_reference = parent_items[0].unwrap();
        let child_floating = w.element(body, FLOATING_RECT, ElementFlags::empty());
        let child_items: Vec<Option<ElementId>> = (0..2)
            .map(|_| Some(w.element(child_floating, Rect::ZERO, ElementFlags::FOCUSABLE)))
            .collect();
        let mut child = Floating::new(&mut w.services)
            .with_source(Click::new(ClickOptions::default()))
            .with_source(virtual_list(true));
        child.context_mut().set_reference(Some(child_reference));
        child.context_mut().set_floating(Some(child_floating));
        child.register(&mut w.tree, parent.context().node_id());
        child.source_mut::<ListNavigation>().unwrap().set_items(child_items);
        let child_node = child.context().node_id().unwrap();
        let parent_node = parent.context().node_id().unwrap();

        let mut ev = click(&parent, 0);
        parent.dispatch(PropTarget::Reference, &mut ev, &mut w.env(0));
        let mut ev = click(&child, 1);
        child.dispatch(PropTarget::Reference, &mut ev, &mut w.env(1));
        assert!(parent.open() && child.open());
        let parent_active = parent.source::<ListNavigation>().unwrap().active_index();

        let mut down = Event::key_down(Key::ArrowDown, 2).with_target(parent_reference);
        parent.dispatch(PropTarget::Reference, &mut down, &mut w.env(2));
        assert!(w.tree.has_mail(child_node));
        assert_eq!(child.next_deadline(&w.tree), Some(0));
        child.advance(&mut w.env(2));
        assert_eq!(child.source::<ListNavigation>().unwrap().active_index(), Some(0));
        let parent_nav = parent.source::<ListNavigation>().unwrap();
        assert_eq!(parent_nav.active_index(), parent_active);

        let mut left = Event::key_down(Key::ArrowLeft, 3).with_target(parent_reference);
        parent.dispatch(PropTarget::Reference, &mut left, &mut w.env(3));
        assert!(w.tree.has_mail(child_node));
        child.advance(&mut w.env(3));
        assert!(!child.open());
        assert!(parent.open());
        assert!(!w.tree.has_mail(child_node));
        assert!(!w.tree.has_mail(parent_node));
    }

    #[test]
    fn teardown_releases_listeners_and_node() {
        let mut w = World::new();
        let body = w.doc.body();
        let mut f = w.instance(None, body);
        let mut ev = click(&f, 0);
        f.dispatch(PropTarget::Reference, &mut ev, &mut w.env(0));
        assert!(!w.services.listeners.is_empty());
        let node = f.context().node_id().unwrap();
        f.teardown(&mut w.env(1));
        assert!(w.services.listeners.is_empty());
        assert!(!w.tree.is_alive(node));
    }

    struct Below;

    impl PositionEngine for Below {
        type MiddlewareData = ();

        fn compute(&self, request: &PositionRequest) -> Positioned<()> {
            Positioned {
                x: request.reference.x0,
                y: request.reference.y1,
                placement: request.placement,
                middleware_data: (),
            }
        }
    }

    #[test]
    fn position_uses_reference_rect() {
        let mut w = World::new();
        let body = w.doc.body();
        let mut f = w.instance(None, body);
        let out = f.position(&Below, &w.doc).unwrap();
        assert_eq!((out.x, out.y), (REFERENCE_RECT.x0, REFERENCE_RECT.y1));
        f.context_mut().set_floating(None);
        assert!(f.position(&Below, &w.doc).is_none());
    }
}
