// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Open/close transition status and mount tracking.
//!
//! Opening mounts the floating element immediately and reports
//! [`TransitionStatus::Starting`] for one frame so hosts can apply starting
//! styles. Closing reports [`TransitionStatus::Ending`] and keeps the element
//! mounted until every running animation on it has finished, as observed
//! through [`run_once_animations_finish`].
//!
//! Closed floating elements carry the `hidden` attribute, or
//! `hidden="until-found"` when find-in-page should be able to reveal them. A
//! `beforematch` event on such an element reopens it.

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::dom::{Document, ElementFlags, ElementId};
use crate::event::{Event, EventKind, EventTypes};
use crate::props::{AttrValue, PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};
use crate::timer::{AbortController, AbortSignal, Timeout};

/// Reason tag of an open caused by find-in-page.
pub const BEFORE_MATCH: OpenChangeReason = OpenChangeReason::Custom("before-match");

/// Phase of the current transition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransitionStatus {
    /// No transition in progress.
    #[default]
    Idle,
    /// First frame after opening.
    Starting,
    /// Closing; waiting for exit animations.
    Ending,
}

/// State of an animation-completion wait.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitState {
    /// Animations are still running.
    Pending,
    /// Every animation finished.
    Finished,
    /// The wait was aborted.
    Aborted,
}

/// A one-shot wait for the animations of one element.
#[derive(Clone, Debug)]
pub struct AnimationWait {
    element: ElementId,
    signal: AbortSignal,
}

impl AnimationWait {
    /// The element being waited on.
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Poll the wait.
    ///
    /// Elements that declare neither animations nor transitions, and
    /// elements that no longer exist, finish immediately.
    pub fn poll(&self, doc: &Document) -> WaitState {
        if self.signal.is_aborted() {
            return WaitState::Aborted;
        }
        let animated = doc
            .flags(self.element)
            .intersects(ElementFlags::HAS_ANIMATION | ElementFlags::HAS_TRANSITION);
        if !doc.is_alive(self.element) || !animated || doc.running_animations(self.element) == 0 {
            WaitState::Finished
        } else {
            WaitState::Pending
        }
    }
}

/// Start waiting for every animation running on `element` to finish.
pub fn run_once_animations_finish(element: ElementId, signal: AbortSignal) -> AnimationWait {
    AnimationWait { element, signal }
}

/// Transition configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionOptions {
    /// `Some(true)` keeps the closed element mounted; `Some(false)` forces unmounting.
    pub keep_mounted: Option<bool>,
    /// Hide with `hidden="until-found"` instead of `hidden`.
    pub hidden_until_found: bool,
}

#[derive(Debug)]
struct PendingExit {
    wait: AnimationWait,
    epoch: u64,
}

/// Transition tracker of one instance.
#[derive(Debug, Default)]
pub struct Transition {
    options: TransitionOptions,
    status: TransitionStatus,
    mounted: bool,
    starting: Timeout,
    exit: Option<PendingExit>,
    controller: Option<AbortController>,
    warned_mixed: bool,
}

impl Transition {
    /// A tracker with `options`.
    pub fn new(options: TransitionOptions) -> Self {
        if options.hidden_until_found && options.keep_mounted == Some(false) {
            tracing::warn!(
                "hidden_until_found requires the element to stay mounted; keep_mounted = Some(false) is ignored"
            );
        }
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current transition phase.
    pub fn status(&self) -> TransitionStatus {
        self.status
    }

    /// Whether the floating element should be in the host tree.
    pub fn is_mounted(&self) -> bool {
        self.mounted || self.options.hidden_until_found || self.options.keep_mounted == Some(true)
    }

    fn abort(&mut self) {
        if let Some(c) = self.controller.take() {
            c.abort();
        }
        self.exit = None;
    }

    fn check_styles(&mut self, cx: &InteractionCx<'_>) {
        let Some(floating) = cx.ctx.elements().floating else {
            return;
        };
        let both = ElementFlags::HAS_ANIMATION | ElementFlags::HAS_TRANSITION;
        if !self.warned_mixed && cx.document.flags(floating).contains(both) {
            self.warned_mixed = true;
            tracing::warn!(
                floating_id = cx.ctx.floating_id(),
                "floating element uses both a CSS animation and a CSS transition; exit timing follows whichever finishes last"
            );
        }
    }

    fn finish_exit(&mut self) {
        self.exit = None;
        self.controller = None;
        self.mounted = false;
        self.status = TransitionStatus::Idle;
        tracing::trace!("exit animations finished; unmounting");
    }
}

impl Interaction for Transition {
    fn name(&self) -> &'static str {
        "transition"
    }

    fn props(&self, target: &PropTarget, ctx: &FloatingContext) -> PropsPatch {
        if *target != PropTarget::Floating {
            return PropsPatch::new();
        }
        let hidden = if ctx.open() || self.status == TransitionStatus::Ending {
            AttrValue::Absent
        } else if self.options.hidden_until_found {
            AttrValue::from("until-found")
        } else {
            AttrValue::Bool(true)
        };
        let mut patch = PropsPatch::new()
            .attr("hidden", hidden)
            .attr("data-open", ctx.open())
            .attr("data-closed", !ctx.open())
            .attr(
                "data-starting-style",
                self.status == TransitionStatus::Starting,
            )
            .attr("data-ending-style", self.status == TransitionStatus::Ending);
        if self.options.hidden_until_found {
            patch = patch.handles(EventTypes::BEFORE_MATCH);
        }
        patch
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if *target == PropTarget::Floating
            && event.kind == EventKind::BeforeMatch
            && self.options.hidden_until_found
        {
            cx.request(true, event, BEFORE_MATCH);
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.starting.take_due(cx.now) && self.status == TransitionStatus::Starting {
            self.status = TransitionStatus::Idle;
        }
        let Some(exit) = &self.exit else {
            return;
        };
        match exit.wait.poll(cx.document) {
            WaitState::Pending => {}
            WaitState::Aborted => self.exit = None,
            WaitState::Finished => {
                // A reopen between the close and now owns the element.
                if exit.epoch == cx.ctx.epoch() && !cx.open() {
                    self.finish_exit();
                } else {
                    self.exit = None;
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.starting.deadline()
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        self.abort();
        self.check_styles(cx);
        if details.open {
            self.mounted = true;
            self.status = TransitionStatus::Starting;
            self.starting.defer(cx.now);
            return;
        }
        self.starting.clear();
        let Some(floating) = cx.ctx.elements().floating.filter(|_| self.mounted) else {
            self.mounted = false;
            self.status = TransitionStatus::Idle;
            return;
        };
        self.status = TransitionStatus::Ending;
        let controller = AbortController::new();
        let wait = run_once_animations_finish(floating, controller.signal());
        self.controller = Some(controller);
        if wait.poll(cx.document) == WaitState::Finished {
            self.finish_exit();
        } else {
            self.exit = Some(PendingExit {
                wait,
                epoch: details.epoch,
            });
        }
    }

    fn teardown(&mut self, _cx: &mut InteractionCx<'_>) {
        self.abort();
        self.starting.clear();
        self.mounted = false;
        self.status = TransitionStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn toggle(f: &mut Fixture, t: &mut Transition, open: bool) {
        let ev = Event::new(EventKind::Click, f.now);
        f.ctx.on_open_change(open, &ev, OpenChangeReason::Click);
        f.settle(t);
    }

    #[test]
    fn starting_lasts_one_frame() {
        let mut f = Fixture::new();
        let mut t = Transition::default();
        assert!(!t.is_mounted());
        toggle(&mut f, &mut t, true);
        assert!(t.is_mounted());
        assert_eq!(t.status(), TransitionStatus::Starting);
        let p = t.props(&PropTarget::Floating, &f.ctx);
        assert_eq!(p.attrs.get("data-starting-style"), Some(&AttrValue::Bool(true)));
        f.advance_to(1, &mut t);
        assert_eq!(t.status(), TransitionStatus::Idle);
    }

    #[test]
    fn close_waits_for_running_animations() {
        let mut f = Fixture::new();
        f.doc.data_mut(f.floating).unwrap().flags |= ElementFlags::HAS_ANIMATION;
        let mut t = Transition::default();
        toggle(&mut f, &mut t, true);
        f.doc.set_running_animations(f.floating, 1);
        toggle(&mut f, &mut t, false);
        assert_eq!(t.status(), TransitionStatus::Ending);
        f.advance_to(10, &mut t);
        assert!(t.is_mounted());
        f.doc.set_running_animations(f.floating, 0);
        f.advance_to(20, &mut t);
        assert!(!t.is_mounted());
        assert_eq!(t.status(), TransitionStatus::Idle);
    }

    #[test]
    fn unanimated_close_unmounts_immediately() {
        let mut f = Fixture::new();
        let mut t = Transition::default();
        toggle(&mut f, &mut t, true);
        toggle(&mut f, &mut t, false);
        assert!(!t.is_mounted());
        let p = t.props(&PropTarget::Floating, &f.ctx);
        assert_eq!(p.attrs.get("hidden"), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn reopen_abandons_stale_exit() {
        let mut f = Fixture::new();
        f.doc.data_mut(f.floating).unwrap().flags |= ElementFlags::HAS_TRANSITION;
        let mut t = Transition::default();
        toggle(&mut f, &mut t, true);
        f.doc.set_running_animations(f.floating, 2);
        toggle(&mut f, &mut t, false);
        toggle(&mut f, &mut t, true);
        f.doc.set_running_animations(f.floating, 0);
        f.advance_to(5, &mut t);
        assert!(t.is_mounted());
        assert!(f.ctx.open());
    }

    #[test]
    fn until_found_reopens_on_before_match() {
        let mut f = Fixture::new();
        let mut t = Transition::new(TransitionOptions {
            hidden_until_found: true,
            ..TransitionOptions::default()
        });
        assert!(t.is_mounted());
        let p = t.props(&PropTarget::Floating, &f.ctx);
        assert_eq!(p.attrs.get("hidden"), Some(&AttrValue::from("until-found")));
        assert!(p.handles.contains(EventTypes::BEFORE_MATCH));
        let mut ev = Event::new(EventKind::BeforeMatch, 3).with_target(f.floating);
        t.handle(&PropTarget::Floating, &mut ev, &mut f.cx());
        assert!(f.ctx.open());
        let details = f.ctx.take_pending();
        assert_eq!(details[0].reason, BEFORE_MATCH);
    }
}
