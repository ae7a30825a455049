// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typeahead: jump to the list item whose label starts with the typed text.
//!
//! Characters accumulate into a query that resets after `reset_ms` of
//! inactivity. Matching is case-insensitive and starts just after the
//! previously matched item, so repeating a letter cycles through the items
//! that start with it. Lists where some label begins with a doubled letter
//! ("aaron") disable that cycling, since a repeated letter is ambiguous there.
//!
//! ```rust
//! use understory_floating::sources::{Typeahead, TypeaheadOptions};
//!
//! let mut t = Typeahead::new(TypeaheadOptions::default());
//! t.set_labels(["one", "two", "three"].map(|s| Some(s.to_owned())).to_vec());
//! assert_eq!(t.find('t'), Some(1));
//! assert_eq!(t.find('t'), Some(2));
//! assert_eq!(t.find('t'), Some(1));
//! ```

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::context::{FloatingContext, OpenChangeDetails};
use crate::event::{Event, EventKind, EventTypes, Key, Modifiers};
use crate::props::{PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};
use crate::timer::Timeout;

/// Default inactivity window after which the query resets.
pub const DEFAULT_RESET_MS: u64 = 750;

/// Custom matcher: given labels in search order and the query, return the
/// position (in that order) of the matching label.
pub type FindMatch = Rc<dyn Fn(&[Option<&str>], &str) -> Option<usize>>;

/// Typeahead configuration.
#[derive(Clone)]
pub struct TypeaheadOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Inactivity window in milliseconds.
    pub reset_ms: u64,
    /// Keys that never start or extend a query.
    pub ignore_keys: Vec<Key>,
    /// The selected index; searching starts after it on open.
    pub selected_index: Option<usize>,
    /// Replaces the default prefix matcher.
    pub find_match: Option<FindMatch>,
}

impl core::fmt::Debug for TypeaheadOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeaheadOptions")
            .field("enabled", &self.enabled)
            .field("reset_ms", &self.reset_ms)
            .field("ignore_keys", &self.ignore_keys)
            .field("selected_index", &self.selected_index)
            .field("find_match", &self.find_match.is_some())
            .finish()
    }
}

impl Default for TypeaheadOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            reset_ms: DEFAULT_RESET_MS,
            ignore_keys: Vec::new(),
            selected_index: None,
            find_match: None,
        }
    }
}

fn starts_with_ignore_case(label: &str, query: &str) -> bool {
    let mut chars = label.chars().flat_map(char::to_lowercase);
    query
        .chars()
        .flat_map(char::to_lowercase)
        .all(|q| chars.next() == Some(q))
}

fn same_first_two(label: &str) -> bool {
    let mut chars = label.chars().map(|c| c.to_lowercase().next().unwrap_or(c));
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Typeahead interaction source.
pub struct Typeahead {
    options: TypeaheadOptions,
    labels: Vec<Option<String>>,
    active: Option<usize>,
    query: String,
    prev: Option<usize>,
    matched: Option<usize>,
    typing: bool,
    reset: Timeout,
    on_match: Option<Box<dyn FnMut(usize)>>,
    on_typing_change: Option<Box<dyn FnMut(bool)>>,
}

impl core::fmt::Debug for Typeahead {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Typeahead")
            .field("options", &self.options)
            .field("labels", &self.labels)
            .field("query", &self.query)
            .field("matched", &self.matched)
            .field("typing", &self.typing)
            .finish_non_exhaustive()
    }
}

impl Typeahead {
    /// A typeahead source with `options`.
    pub fn new(options: TypeaheadOptions) -> Self {
        Self {
            options,
            labels: Vec::new(),
            active: None,
            query: String::new(),
            prev: None,
            matched: None,
            typing: false,
            reset: Timeout::new(),
            on_match: None,
            on_typing_change: None,
        }
    }

    /// Builder: call `f` with the index of each match.
    pub fn with_on_match(mut self, f: impl FnMut(usize) + 'static) -> Self {
        self.on_match = Some(Box::new(f));
        self
    }

    /// Builder: call `f` when typing starts or stops.
    pub fn with_on_typing_change(mut self, f: impl FnMut(bool) + 'static) -> Self {
        self.on_typing_change = Some(Box::new(f));
        self
    }

    /// Item labels in list order. `None` marks items without text.
    pub fn set_labels(&mut self, labels: Vec<Option<String>>) {
        self.labels = labels;
    }

    /// Tell the source which item is active, so searches start after it.
    pub fn set_active_index(&mut self, index: Option<usize>) {
        self.active = index;
        if self.query.is_empty() {
            self.prev = self.options.selected_index.or(index);
        }
    }

    /// The current query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Index of the latest match.
    pub fn matched_index(&self) -> Option<usize> {
        self.matched
    }

    /// Whether a query is being typed.
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    fn match_index(&self, start: usize, query: &str) -> Option<usize> {
        let len = self.labels.len();
        let start = start.min(len);
        let order: Vec<usize> = (start..len).chain(0..start).collect();
        let ordered: Vec<Option<&str>> = order
            .iter()
            .map(|&i| self.labels[i].as_deref())
            .collect();
        let found = match &self.options.find_match {
            Some(f) => f(&ordered, query),
            None => ordered
                .iter()
                .position(|l| l.is_some_and(|l| starts_with_ignore_case(l, query))),
        };
        found.and_then(|pos| order.get(pos).copied())
    }

    /// Feed one character through the query/match logic.
    ///
    /// Returns the matched index. This is the core of keyboard handling,
    /// without the event and timer bookkeeping.
    pub fn find(&mut self, key: char) -> Option<usize> {
        let cycling = !self.labels.iter().flatten().any(|l| same_first_two(l));
        let mut buf = [0_u8; 4];
        let key_str: &str = key.encode_utf8(&mut buf);
        if self.query == key_str {
            if cycling {
                self.query.clear();
                self.prev = self.matched;
            } else {
                // Keep the single-letter query instead of growing it to "aa".
                self.query.clear();
            }
        }
        self.query.push(key);
        let start = self.prev.map_or(0, |p| p + 1);
        let query = self.query.clone();
        let index = self.match_index(start, &query);
        match index {
            Some(i) => {
                self.matched = Some(i);
                if let Some(f) = &mut self.on_match {
                    f(i);
                }
            }
            None if key != ' ' => self.query.clear(),
            None => {}
        }
        index
    }

    fn set_typing(&mut self, typing: bool, cx: &mut InteractionCx<'_>) {
        cx.ctx.data.typing = typing;
        if self.typing != typing {
            self.typing = typing;
            tracing::trace!(typing, "typeahead typing change");
            if let Some(f) = &mut self.on_typing_change {
                f(typing);
            }
        }
    }

    fn on_key_down(&mut self, event: &mut Event, cx: &mut InteractionCx<'_>) {
        let Some(key) = event.key else {
            return;
        };
        if !self.query.is_empty() && !self.query.starts_with(' ') {
            let query = self.query.clone();
            let start = self.prev.map_or(0, |p| p + 1);
            if self.match_index(start, &query).is_none() {
                self.set_typing(false, cx);
            } else if key == Key::SPACE {
                event.stop();
            }
        }
        let Key::Character(c) = key else {
            return;
        };
        if self.options.ignore_keys.contains(&key)
            || event
                .modifiers
                .intersects(Modifiers::CTRL | Modifiers::META | Modifiers::ALT)
        {
            return;
        }
        if cx.open() && key != Key::SPACE {
            event.stop();
            self.set_typing(true, cx);
        }
        self.reset.set(cx.now, self.options.reset_ms);
        if self.find(c).is_none() && key != Key::SPACE {
            self.set_typing(false, cx);
        }
    }

    fn clear(&mut self) {
        self.reset.clear();
        self.query.clear();
        self.matched = None;
        self.prev = self.options.selected_index.or(self.active);
    }
}

impl Interaction for Typeahead {
    fn name(&self) -> &'static str {
        "typeahead"
    }

    fn props(&self, target: &PropTarget, _ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled {
            return PropsPatch::new();
        }
        match target {
            PropTarget::Reference => PropsPatch::new().handles(EventTypes::KEY_DOWN),
            PropTarget::Floating => {
                PropsPatch::new().handles(EventTypes::KEY_DOWN | EventTypes::KEY_UP)
            }
            PropTarget::Item(_) => PropsPatch::new(),
        }
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled {
            return;
        }
        match (target, event.kind) {
            (PropTarget::Reference | PropTarget::Floating, EventKind::KeyDown) => {
                self.on_key_down(event, cx);
            }
            (PropTarget::Floating, EventKind::KeyUp) if event.key == Some(Key::SPACE) => {
                self.set_typing(false, cx);
            }
            _ => {}
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.reset.take_due(cx.now) {
            self.query.clear();
            self.prev = self.matched;
            self.set_typing(false, cx);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.reset.deadline()
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        self.clear();
        if !details.open {
            self.set_typing(false, cx);
        }
    }

    fn teardown(&mut self, cx: &mut InteractionCx<'_>) {
        self.clear();
        self.set_typing(false, cx);
    }
}
