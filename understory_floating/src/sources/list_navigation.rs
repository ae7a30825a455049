// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! List navigation: arrow-key movement of an active index across list items.
//!
//! The active index drives either real focus (each item is focused as it
//! becomes active) or virtual focus, where the reference keeps DOM focus and
//! points at the active item through `aria-activedescendant`.
//!
//! Single-axis lists move along the main orientation. Grids (`cols > 1`) map
//! items onto cells, honoring per-item spans and optional dense packing, then
//! move cell by cell.
//!
//! Nested lists hand cross-axis keys between levels. A cross-close key closes
//! a submenu and puts focus back on its trigger. In virtual mode the root keeps
//! DOM focus, so keys are posted to the deepest open node as
//! [`NodeCommand::ForwardedKey`]; forwarded keys are never forwarded again.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::context::{FloatingContext, OpenChangeDetails, OpenChangeReason};
use crate::dom::{Document, ElementFlags, ElementId, FocusOptions};
use crate::emitter::VIRTUAL_FOCUS;
use crate::event::{Event, EventKind, EventTypes, Key, PointerType};
use crate::props::{AttrValue, PropTarget, PropsPatch};
use crate::sources::role::item_dom_id;
use crate::sources::{Interaction, InteractionCx};
use crate::timer::Timeout;
use crate::tree::{NodeCommand, NodeId, TreeEvent};

/// Layout axis of a list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Up/Down move.
    #[default]
    Vertical,
    /// Left/Right move.
    Horizontal,
    /// Both axes move (grids).
    Both,
}

impl Orientation {
    fn pick(self, vertical: bool, horizontal: bool) -> bool {
        match self {
            Self::Vertical => vertical,
            Self::Horizontal => horizontal,
            Self::Both => vertical || horizontal,
        }
    }

    fn is_main_key(self, key: Key) -> bool {
        self.pick(
            matches!(key, Key::ArrowUp | Key::ArrowDown),
            matches!(key, Key::ArrowLeft | Key::ArrowRight),
        )
    }

    fn is_to_end_key(self, key: Key, rtl: bool) -> bool {
        let forward = if rtl { Key::ArrowLeft } else { Key::ArrowRight };
        self.pick(key == Key::ArrowDown, key == forward)
            || key == Key::Enter
            || key == Key::SPACE
    }

    fn is_cross_open_key(self, key: Key, rtl: bool) -> bool {
        let forward = if rtl { Key::ArrowLeft } else { Key::ArrowRight };
        self.pick(key == forward, key == Key::ArrowDown)
    }

    fn is_cross_close_key(self, key: Key, rtl: bool, cols: usize) -> bool {
        if self == Self::Both || (self == Self::Horizontal && cols > 1) {
            return key == Key::Escape;
        }
        let back = if rtl { Key::ArrowRight } else { Key::ArrowLeft };
        self.pick(key == back, key == Key::ArrowUp)
    }
}

/// Whether opening focuses an item.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FocusItemOnOpen {
    /// Only when opened from the keyboard.
    #[default]
    Auto,
    /// Always.
    On,
    /// Never.
    Off,
}

/// List navigation configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListNavigationOptions {
    /// Whether the source is active.
    pub enabled: bool,
    /// Wrap from the last item to the first and back.
    pub loop_focus: bool,
    /// This list is a submenu of another list.
    pub nested: bool,
    /// Orientation of the parent list, for nested lists.
    pub parent_orientation: Orientation,
    /// Right-to-left layout.
    pub rtl: bool,
    /// Keep DOM focus on the reference and use `aria-activedescendant`.
    pub virtual_focus: bool,
    /// Whether opening focuses an item.
    pub focus_item_on_open: FocusItemOnOpen,
    /// Moving the pointer over an item makes it active.
    pub focus_item_on_hover: bool,
    /// Arrow keys on the closed reference open the list.
    pub open_on_arrow_key_down: bool,
    /// Explicitly disabled items. When `None`, disabled elements are detected.
    pub disabled_indices: Option<Vec<usize>>,
    /// With `loop_focus`, allow moving past either end to "no active item".
    pub allow_escape: bool,
    /// Number of grid columns; `1` for plain lists.
    pub cols: usize,
    /// Layout axis.
    pub orientation: Orientation,
    /// Per-item `(width, height)` spans in grid cells.
    pub item_sizes: Option<Vec<(usize, usize)>>,
    /// Fill holes left by earlier larger items.
    pub dense: bool,
    /// The selected item, which becomes active on open.
    pub selected_index: Option<usize>,
}

impl Default for ListNavigationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            loop_focus: false,
            nested: false,
            parent_orientation: Orientation::Vertical,
            rtl: false,
            virtual_focus: false,
            focus_item_on_open: FocusItemOnOpen::Auto,
            focus_item_on_hover: true,
            open_on_arrow_key_down: true,
            disabled_indices: None,
            allow_escape: false,
            cols: 1,
            orientation: Orientation::Vertical,
            item_sizes: None,
            dense: false,
            selected_index: None,
        }
    }
}

fn to_i(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_index(i: i64) -> Option<usize> {
    usize::try_from(i).ok()
}

/// Index arithmetic over a list where some slots are skipped.
///
/// Positions are signed: `-1` and `len` are the "before first" and "after
/// last" sentinels used while stepping.
struct Cursor<'a> {
    len: i64,
    disabled: &'a dyn Fn(usize) -> bool,
}

impl Cursor<'_> {
    fn skipped(&self, i: i64) -> bool {
        to_index(i).is_none_or(|i| (self.disabled)(i))
    }

    fn find(&self, start: i64, decrement: bool, amount: i64) -> i64 {
        let mut index = start;
        loop {
            index += if decrement { -amount } else { amount };
            if !(index >= 0 && index < self.len && self.skipped(index)) {
                return index;
            }
        }
    }

    fn min(&self) -> i64 {
        self.find(-1, false, 1)
    }

    fn max(&self) -> i64 {
        self.find(self.len, true, 1)
    }

    fn out_of_bounds(&self, i: i64) -> bool {
        i < 0 || i >= self.len
    }
}

/// Map items with `(width, height)` spans onto a `cols`-wide grid.
///
/// Returns the item index occupying each cell; `None` marks holes.
pub fn build_cell_map(sizes: &[(usize, usize)], cols: usize, dense: bool) -> Vec<Option<usize>> {
    let cols = cols.max(1);
    let mut map: Vec<Option<usize>> = Vec::new();
    let mut start = 0_usize;
    for (index, &(w, h)) in sizes.iter().enumerate() {
        let width = if w > cols {
            tracing::warn!(index, width = w, cols, "grid item is wider than the grid");
            cols
        } else {
            w.max(1)
        };
        let height = h.max(1);
        if dense {
            start = 0;
        }
        loop {
            let cells = || {
                (0..width).flat_map(move |i| (0..height).map(move |j| start + i + j * cols))
            };
            let fits = start % cols + width <= cols
                && cells().all(|c| map.get(c).copied().flatten().is_none());
            if fits {
                for c in cells() {
                    if c >= map.len() {
                        map.resize(c + 1, None);
                    }
                    map[c] = Some(index);
                }
                break;
            }
            start += 1;
        }
    }
    map
}

/// Corner of a spanning grid item.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Corner {
    /// Top-left.
    TopLeft,
    /// Top-right.
    TopRight,
    /// Bottom-left.
    BottomLeft,
    /// Bottom-right.
    BottomRight,
}

/// Cell index of `corner` of item `index`, or `-1`.
pub fn cell_index_of_corner(
    index: i64,
    sizes: &[(usize, usize)],
    cell_map: &[Option<usize>],
    cols: usize,
    corner: Corner,
) -> i64 {
    let Some(item) = to_index(index) else {
        return -1;
    };
    let first = cell_map
        .iter()
        .position(|c| *c == Some(item))
        .map_or(-1, to_i);
    let size = sizes.get(item);
    match (corner, size) {
        (Corner::TopLeft, _) | (Corner::TopRight | Corner::BottomLeft, None) => first,
        (Corner::TopRight, Some(&(w, _))) => first + to_i(w.max(1)) - 1,
        (Corner::BottomLeft, Some(&(_, h))) => first + (to_i(h.max(1)) - 1) * to_i(cols),
        (Corner::BottomRight, _) => cell_map
            .iter()
            .rposition(|c| *c == Some(item))
            .map_or(-1, to_i),
    }
}

fn grid_navigated_index(
    cells: &Cursor<'_>,
    key: Key,
    orientation: Orientation,
    looping: bool,
    rtl: bool,
    cols: i64,
    min: i64,
    max: i64,
    prev: i64,
) -> i64 {
    let mut next = prev;
    if key == Key::ArrowUp {
        if prev == -1 {
            next = max;
        } else {
            next = cells.find(prev, true, cols);
            if looping && (prev - cols < min || next < 0) {
                let col = prev % cols;
                let max_col = max % cols;
                let offset = max - (max_col - col);
                next = if max_col == col {
                    max
                } else if max_col > col {
                    offset
                } else {
                    offset - cols
                };
            }
        }
        if cells.out_of_bounds(next) {
            next = prev;
        }
    }
    if key == Key::ArrowDown {
        if prev == -1 {
            next = min;
        } else {
            next = cells.find(prev, false, cols);
            if looping && prev + cols > max {
                next = cells.find(prev % cols - cols, false, cols);
            }
        }
        if cells.out_of_bounds(next) {
            next = prev;
        }
    }
    if orientation == Orientation::Both {
        let row = |i: i64| i.div_euclid(cols);
        let prev_row = row(prev);
        let (forward, back) = if rtl {
            (Key::ArrowLeft, Key::ArrowRight)
        } else {
            (Key::ArrowRight, Key::ArrowLeft)
        };
        let row_start = prev - prev % cols;
        if key == forward {
            if prev % cols != cols - 1 {
                next = cells.find(prev, false, 1);
                if looping && row(next) != prev_row {
                    next = cells.find(row_start - 1, false, 1);
                }
            } else if looping {
                next = cells.find(row_start - 1, false, 1);
            }
            if row(next) != prev_row {
                next = prev;
            }
        }
        if key == back {
            if prev % cols != 0 {
                next = cells.find(prev, true, 1);
                if looping && row(next) != prev_row {
                    next = cells.find(row_start + cols, true, 1);
                }
            } else if looping {
                next = cells.find(row_start + cols, true, 1);
            }
            if row(next) != prev_row {
                next = prev;
            }
        }
        let last_row = row(max) == prev_row;
        if cells.out_of_bounds(next) {
            next = if looping && last_row {
                if key == back {
                    max
                } else {
                    cells.find(row_start - 1, false, 1)
                }
            } else {
                prev
            };
        }
    }
    next
}

type NavigateCallback = Box<dyn FnMut(Option<usize>)>;

/// List navigation interaction source.
pub struct ListNavigation {
    options: ListNavigationOptions,
    items: Vec<Option<ElementId>>,
    active: Option<usize>,
    key: Option<Key>,
    pointer_modality: bool,
    open_sync: Timeout,
    open_sync_runs: u8,
    on_navigate: Option<NavigateCallback>,
}

impl core::fmt::Debug for ListNavigation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListNavigation")
            .field("options", &self.options)
            .field("items", &self.items)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl ListNavigation {
    /// A list navigation source with `options`.
    pub fn new(options: ListNavigationOptions) -> Self {
        Self {
            options,
            items: Vec::new(),
            active: None,
            key: None,
            pointer_modality: false,
            open_sync: Timeout::new(),
            open_sync_runs: 0,
            on_navigate: None,
        }
    }

    /// Builder: call `f` whenever the active index changes.
    pub fn with_on_navigate(mut self, f: impl FnMut(Option<usize>) + 'static) -> Self {
        self.on_navigate = Some(Box::new(f));
        self
    }

    /// Current options.
    pub fn options(&self) -> &ListNavigationOptions {
        &self.options
    }

    /// Replace the options.
    pub fn set_options(&mut self, options: ListNavigationOptions) {
        self.options = options;
    }

    /// Register the item elements in list order. `None` marks unmounted slots.
    pub fn set_items(&mut self, items: Vec<Option<ElementId>>) {
        self.items = items;
    }

    /// Registered items.
    pub fn items(&self) -> &[Option<ElementId>] {
        &self.items
    }

    /// The active index.
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Set the active index from outside.
    pub fn set_active_index(&mut self, index: Option<usize>) {
        self.active = index;
    }

    fn is_disabled(&self, doc: &Document, i: usize) -> bool {
        match &self.options.disabled_indices {
            Some(d) => d.contains(&i),
            None => self
                .items
                .get(i)
                .copied()
                .flatten()
                .is_none_or(|e| !doc.is_alive(e) || doc.flags(e).contains(ElementFlags::DISABLED)),
        }
    }

    fn current(&self) -> i64 {
        self.active.map_or(-1, to_i)
    }

    fn navigate(&mut self, index: i64, cx: &mut InteractionCx<'_>) {
        let len = to_i(self.items.len());
        self.active = to_index(index).filter(|_| index < len);
        tracing::trace!(active = ?self.active, "list active index");
        if let Some(f) = &mut self.on_navigate {
            f(self.active);
        }
        let Some(element) = self.active.and_then(|i| self.items.get(i).copied().flatten()) else {
            return;
        };
        if !cx.open() {
            return;
        }
        if self.options.virtual_focus {
            cx.tree
                .events
                .emit(VIRTUAL_FOCUS, &TreeEvent::VirtualFocus(element));
        } else {
            cx.document.focus(
                element,
                FocusOptions {
                    prevent_scroll: true,
                },
            );
        }
    }

    fn grid_step(&self, key: Key, cx: &InteractionCx<'_>) -> Option<usize> {
        let doc = &*cx.document;
        let o = &self.options;
        let cols = o.cols.max(1);
        let sizes = o
            .item_sizes
            .clone()
            .unwrap_or_else(|| vec![(1, 1); self.items.len()]);
        let cell_map = build_cell_map(&sizes, cols, o.dense);
        let item_disabled = |i: usize| self.is_disabled(doc, i);
        let cell_skipped = |c: usize| cell_map.get(c).copied().flatten().is_none_or(item_disabled);
        let cells = Cursor {
            len: to_i(cell_map.len()),
            disabled: &cell_skipped,
        };
        let min_cell = cell_map
            .iter()
            .position(|c| c.is_some_and(|i| !item_disabled(i)))
            .map_or(-1, to_i);
        let max_cell = cell_map
            .iter()
            .rposition(|c| c.is_some_and(|i| !item_disabled(i)))
            .map_or(-1, to_i);

        let list = Cursor {
            len: to_i(self.items.len()),
            disabled: &item_disabled,
        };
        let current = self.current();
        let prev_item = if current > list.max() {
            list.min()
        } else {
            current
        };
        let forward = if o.rtl { Key::ArrowLeft } else { Key::ArrowRight };
        let corner = if key == Key::ArrowDown {
            Corner::BottomLeft
        } else if key == forward {
            Corner::TopRight
        } else {
            Corner::TopLeft
        };
        let prev = cell_index_of_corner(prev_item, &sizes, &cell_map, cols, corner);
        let next = grid_navigated_index(
            &cells,
            key,
            o.orientation,
            o.loop_focus,
            o.rtl,
            to_i(cols),
            min_cell,
            max_cell,
            prev,
        );
        to_index(next).and_then(|c| cell_map.get(c).copied().flatten())
    }

    fn common_key_down(
        &mut self,
        target: &PropTarget,
        event: &mut Event,
        cx: &mut InteractionCx<'_>,
    ) {
        self.pointer_modality = false;
        let Some(key) = event.key else {
            return;
        };
        if event.is_composing {
            return;
        }
        if !cx.open() && *target == PropTarget::Floating {
            return;
        }
        let o = self.options.clone();
        if o.nested && o.orientation.is_cross_close_key(key, o.rtl, o.cols) {
            event.stop();
            cx.request(false, event, OpenChangeReason::ListNavigation);
            if let Some(reference) = cx.ctx.elements().dom_reference {
                if o.virtual_focus {
                    cx.tree
                        .events
                        .emit(VIRTUAL_FOCUS, &TreeEvent::VirtualFocus(reference));
                } else {
                    cx.document.focus(reference, FocusOptions::default());
                }
            }
            return;
        }

        let doc = &*cx.document;
        let item_disabled = |i: usize| self.is_disabled(doc, i);
        let list = Cursor {
            len: to_i(self.items.len()),
            disabled: &item_disabled,
        };
        let current = self.current();
        let (min, max) = (list.min(), list.max());
        let typeable_reference = cx
            .ctx
            .elements()
            .dom_reference
            .is_some_and(|r| doc.flags(r).contains(ElementFlags::TYPEABLE));

        let mut next: Option<i64> = None;
        if !typeable_reference {
            if key == Key::Home {
                event.stop();
                next = Some(min);
            }
            if key == Key::End {
                event.stop();
                next = Some(max);
            }
        }
        if let Some(n) = next.take() {
            self.navigate(n, cx);
            return;
        }

        if o.cols > 1 {
            let vertical = matches!(key, Key::ArrowUp | Key::ArrowDown);
            let horizontal = matches!(key, Key::ArrowLeft | Key::ArrowRight);
            if vertical || (o.orientation == Orientation::Both && horizontal) {
                event.stop();
            }
            if let Some(index) = self.grid_step(key, cx) {
                self.navigate(to_i(index), cx);
            }
            if o.orientation == Orientation::Both || vertical {
                return;
            }
        }

        if !o.orientation.is_main_key(key) {
            return;
        }
        event.stop();
        let floating_focused = *target == PropTarget::Floating
            && cx.ctx.elements().floating.is_some()
            && cx.document.active_element() == cx.ctx.elements().floating;
        if cx.open() && !o.virtual_focus && floating_focused {
            let reset = if o.orientation.is_to_end_key(key, o.rtl) {
                min
            } else {
                max
            };
            self.navigate(reset, cx);
            return;
        }
        let doc = &*cx.document;
        let item_disabled = |i: usize| self.is_disabled(doc, i);
        let list = Cursor {
            len: to_i(self.items.len()),
            disabled: &item_disabled,
        };
        let len = list.len;
        let index = if o.orientation.is_to_end_key(key, o.rtl) {
            if o.loop_focus {
                if current >= max {
                    if o.allow_escape && current != len { -1 } else { min }
                } else {
                    list.find(current, false, 1)
                }
            } else {
                max.min(list.find(current, false, 1))
            }
        } else if o.loop_focus {
            if current <= min {
                if o.allow_escape && current != -1 { len } else { max }
            } else {
                list.find(current, true, 1)
            }
        } else {
            min.max(list.find(current, true, 1))
        };
        self.navigate(index, cx);
    }

    /// Post `key` to `node`, if it is alive.
    fn forward(&self, node: NodeId, event: &Event, cx: &mut InteractionCx<'_>) {
        if let Some(key) = event.key {
            tracing::trace!(?node, ?key, "forwarding key to nested list");
            cx.tree.post(
                node,
                NodeCommand::ForwardedKey {
                    key,
                    modifiers: event.modifiers,
                    time: event.time,
                },
            );
        }
    }

    fn reference_key_down(
        &mut self,
        event: &mut Event,
        cx: &mut InteractionCx<'_>,
        forwarded: bool,
    ) {
        self.pointer_modality = false;
        let Some(key) = event.key else {
            return;
        };
        let o = self.options.clone();
        if key == Key::SPACE && cx.ctx.data.typing {
            return;
        }
        let is_arrow = key.is_arrow();
        let is_move = is_arrow || matches!(key, Key::Home | Key::End);
        let cross_open = o.orientation.is_cross_open_key(key, o.rtl);
        let cross_close = o.orientation.is_cross_close_key(key, o.rtl, o.cols);
        let parent_cross_open = o.parent_orientation.is_cross_open_key(key, o.rtl);
        let main = o.orientation.is_main_key(key);
        let navigation_key = (if o.nested { parent_cross_open } else { main })
            || key == Key::Enter
            || key == Key::SPACE;

        if o.virtual_focus && cx.open() {
            if !forwarded && is_move && let Some(node) = cx.node() {
                let root = cx.tree.ancestors(node).last().copied().unwrap_or(node);
                if let Some(deepest) = cx.tree.deepest_open(root).filter(|d| *d != node) {
                    let deepest_ctx = cx.tree.context(deepest).copied();
                    let deepest_reference = deepest_ctx.and_then(|c| c.dom_reference);
                    let is_current =
                        deepest_reference.is_some() && deepest_reference == event.target;
                    if cross_close && !is_current {
                        event.stop();
                        self.forward(deepest, event, cx);
                        return;
                    }
                    if (main || matches!(key, Key::Home | Key::End))
                        && deepest_ctx.is_some_and(|c| c.open)
                        && cx.tree.parent_of(deepest).is_some()
                        && !is_current
                    {
                        event.stop();
                        self.forward(deepest, event, cx);
                        return;
                    }
                }
                if cross_open
                    && let Some(active_item) = self
                        .active
                        .and_then(|i| self.items.get(i).copied().flatten())
                {
                    let child = cx.tree.children(node, false).into_iter().find(|c| {
                        cx.tree.context(*c).and_then(|ctx| ctx.dom_reference) == Some(active_item)
                    });
                    if let Some(child) = child {
                        event.stop();
                        self.forward(child, event, cx);
                        return;
                    }
                }
            }
            self.common_key_down(&PropTarget::Reference, event, cx);
            return;
        }

        if !cx.open() && !o.open_on_arrow_key_down && is_arrow {
            return;
        }
        if navigation_key {
            let parent_main = o.parent_orientation.is_main_key(key);
            self.key = if o.nested && parent_main { None } else { Some(key) };
        }
        if o.nested {
            if parent_cross_open {
                event.stop();
                if cx.open() {
                    let doc = &*cx.document;
                    let item_disabled = |i: usize| self.is_disabled(doc, i);
                    let min = Cursor {
                        len: to_i(self.items.len()),
                        disabled: &item_disabled,
                    }
                    .min();
                    self.navigate(min, cx);
                } else {
                    cx.request(true, event, OpenChangeReason::ListNavigation);
                }
            } else if cx.open() {
                self.common_key_down(&PropTarget::Reference, event, cx);
            }
            return;
        }
        if main {
            if let Some(selected) = o.selected_index {
                self.active = Some(selected);
            }
            event.stop();
            if !cx.open() && o.open_on_arrow_key_down {
                cx.request(true, event, OpenChangeReason::ListNavigation);
            } else {
                self.common_key_down(&PropTarget::Reference, event, cx);
            }
        }
    }

    fn sync_on_open(&mut self, cx: &mut InteractionCx<'_>) {
        let o = &self.options;
        if let Some(selected) = o.selected_index
            && o.focus_item_on_open != FocusItemOnOpen::Off
        {
            self.key = None;
            self.navigate(to_i(selected), cx);
            return;
        }
        if self.active.is_some() {
            return;
        }
        let wanted = match o.focus_item_on_open {
            FocusItemOnOpen::On => true,
            FocusItemOnOpen::Auto => self.key.is_some(),
            FocusItemOnOpen::Off => false,
        };
        if !wanted {
            return;
        }
        if self.items.first().copied().flatten().is_none() {
            if self.open_sync_runs < 2 {
                self.open_sync_runs += 1;
                self.open_sync.defer(cx.now);
            }
            return;
        }
        let doc = &*cx.document;
        let item_disabled = |i: usize| self.is_disabled(doc, i);
        let list = Cursor {
            len: to_i(self.items.len()),
            disabled: &item_disabled,
        };
        let to_start = self
            .key
            .is_none_or(|k| o.orientation.is_to_end_key(k, o.rtl))
            || o.nested;
        let index = if to_start { list.min() } else { list.max() };
        self.key = None;
        self.navigate(index, cx);
    }

    fn item_index(&self, element: Option<ElementId>) -> Option<usize> {
        let element = element?;
        self.items.iter().position(|i| *i == Some(element))
    }
}

impl Interaction for ListNavigation {
    fn name(&self) -> &'static str {
        "list-navigation"
    }

    fn props(&self, target: &PropTarget, ctx: &FloatingContext) -> PropsPatch {
        if !self.options.enabled {
            return PropsPatch::new();
        }
        match target {
            PropTarget::Reference => {
                let mut patch = PropsPatch::new().handles(EventTypes::KEY_DOWN);
                if self.options.virtual_focus {
                    let active = self
                        .active
                        .filter(|_| ctx.open())
                        .map(|i| item_dom_id(ctx.floating_id(), i));
                    patch = patch.attr("aria-activedescendant", AttrValue::from(active));
                }
                patch
            }
            PropTarget::Floating => {
                let orientation = match self.options.orientation {
                    Orientation::Vertical => AttrValue::from("vertical"),
                    Orientation::Horizontal => AttrValue::from("horizontal"),
                    Orientation::Both => AttrValue::Absent,
                };
                PropsPatch::new()
                    .attr("aria-orientation", orientation)
                    .handles(EventTypes::KEY_DOWN | EventTypes::POINTER_MOVE)
            }
            PropTarget::Item(state) => {
                let active = self.active == Some(state.index);
                let mut patch = PropsPatch::new()
                    .handles(EventTypes::FOCUS | EventTypes::CLICK)
                    .attr("tabindex", if active { 0_i64 } else { -1_i64 });
                if self.options.focus_item_on_hover {
                    patch = patch.handles(EventTypes::MOUSE_MOVE | EventTypes::POINTER_LEAVE);
                }
                patch
            }
        }
    }

    fn handle(&mut self, target: &PropTarget, event: &mut Event, cx: &mut InteractionCx<'_>) {
        if !self.options.enabled {
            return;
        }
        match (target, event.kind) {
            (PropTarget::Reference, EventKind::KeyDown) => {
                self.reference_key_down(event, cx, false);
            }
            (PropTarget::Floating, EventKind::KeyDown) => self.common_key_down(target, event, cx),
            (PropTarget::Floating, EventKind::PointerMove) => self.pointer_modality = true,
            (PropTarget::Item(state), EventKind::Focus) => {
                if !cx.open() {
                    return;
                }
                let index = self.item_index(event.target).unwrap_or(state.index);
                if self.active != Some(index) {
                    self.navigate(to_i(index), cx);
                }
            }
            (PropTarget::Item(state), EventKind::Click) => {
                if let Some(e) = self.items.get(state.index).copied().flatten() {
                    cx.document.focus(
                        e,
                        FocusOptions {
                            prevent_scroll: true,
                        },
                    );
                }
            }
            (PropTarget::Item(state), EventKind::MouseMove) if self.options.focus_item_on_hover => {
                self.pointer_modality = true;
                if cx.open() && self.active != Some(state.index) {
                    self.navigate(to_i(state.index), cx);
                }
            }
            (PropTarget::Item(_), EventKind::PointerLeave) if self.options.focus_item_on_hover => {
                if !self.pointer_modality || event.pointer_type == Some(PointerType::Touch) {
                    return;
                }
                self.navigate(-1, cx);
                if !self.options.virtual_focus
                    && let Some(floating) = cx.ctx.elements().floating
                {
                    cx.document.focus(
                        floating,
                        FocusOptions {
                            prevent_scroll: true,
                        },
                    );
                }
            }
            _ => {}
        }
    }

    fn advance(&mut self, cx: &mut InteractionCx<'_>) {
        if self.open_sync.take_due(cx.now) && cx.open() {
            self.sync_on_open(cx);
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        self.open_sync.deadline()
    }

    fn open_changed(&mut self, details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        self.open_sync.clear();
        self.open_sync_runs = 0;
        if details.open {
            self.sync_on_open(cx);
        } else {
            self.key = None;
            if self.active.is_some() {
                self.navigate(-1, cx);
            }
        }
    }

    fn handle_command(&mut self, command: &NodeCommand, cx: &mut InteractionCx<'_>) {
        let NodeCommand::ForwardedKey {
            key,
            modifiers,
            time,
        } = *command;
        let mut event = Event::key_down(key, time);
        event.modifiers = modifiers;
        event.target = cx.ctx.elements().dom_reference;
        self.reference_key_down(&mut event, cx, true);
    }

    fn teardown(&mut self, _cx: &mut InteractionCx<'_>) {
        self.open_sync.clear();
    }
}
