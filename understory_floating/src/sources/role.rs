// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Role: ARIA attributes tying the reference, floating element and items together.

use alloc::format;
use alloc::string::String;

use crate::context::{FloatingContext, OpenChangeDetails};
use crate::props::{AttrValue, PropTarget, PropsPatch};
use crate::sources::{Interaction, InteractionCx};

/// Component role of the floating element.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AriaRole {
    /// `tooltip`
    Tooltip,
    /// A visual label; the floating element labels the reference.
    Label,
    /// `dialog`
    #[default]
    Dialog,
    /// `alertdialog`
    AlertDialog,
    /// `menu`
    Menu,
    /// `listbox`
    Listbox,
    /// A select-only listbox.
    Select,
    /// An editable combobox with a listbox popup.
    Combobox,
    /// `grid`
    Grid,
    /// `tree`
    Tree,
}

impl AriaRole {
    /// The ARIA role of the floating element, if any.
    pub const fn aria_role(self) -> Option<&'static str> {
        match self {
            Self::Tooltip => Some("tooltip"),
            Self::Label => None,
            Self::Dialog => Some("dialog"),
            Self::AlertDialog => Some("alertdialog"),
            Self::Menu => Some("menu"),
            Self::Listbox | Self::Select | Self::Combobox => Some("listbox"),
            Self::Grid => Some("grid"),
            Self::Tree => Some("tree"),
        }
    }

    const fn describes_reference(self) -> bool {
        matches!(self, Self::Tooltip | Self::Label)
    }
}

/// DOM id given to list item `index` of the floating element `floating_id`.
pub fn item_dom_id(floating_id: &str, index: usize) -> String {
    format!("{floating_id}-option-{index}")
}

/// DOM id given to the reference element of `floating_id`.
pub fn reference_dom_id(floating_id: &str) -> String {
    format!("{floating_id}-reference")
}

/// Role interaction source.
#[derive(Clone, Debug)]
pub struct Role {
    enabled: bool,
    role: AriaRole,
    nested: bool,
}

impl Default for Role {
    fn default() -> Self {
        Self::new(AriaRole::default())
    }
}

impl Role {
    /// A role source for `role`.
    pub fn new(role: AriaRole) -> Self {
        Self {
            enabled: true,
            role,
            nested: false,
        }
    }

    /// Builder: mark the instance as a submenu of another instance.
    ///
    /// Kept in sync with the tree on every open change.
    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Enable or disable the source.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The configured role.
    pub fn role(&self) -> AriaRole {
        self.role
    }
}

impl Interaction for Role {
    fn name(&self) -> &'static str {
        "role"
    }

    fn props(&self, target: &PropTarget, ctx: &FloatingContext) -> PropsPatch {
        if !self.enabled {
            return PropsPatch::new();
        }
        let role = self.role;
        let floating_id = ctx.floating_id();
        let open_id = ctx.open().then(|| String::from(floating_id));
        match target {
            PropTarget::Reference if role.describes_reference() => {
                let name = if role == AriaRole::Label {
                    "aria-labelledby"
                } else {
                    "aria-describedby"
                };
                PropsPatch::new().attr(name, open_id)
            }
            PropTarget::Reference => {
                let aria = role.aria_role().unwrap_or("dialog");
                let haspopup = if role == AriaRole::AlertDialog {
                    "dialog"
                } else {
                    aria
                };
                let mut patch = PropsPatch::new()
                    .attr("aria-expanded", if ctx.open() { "true" } else { "false" })
                    .attr("aria-haspopup", haspopup)
                    .attr("aria-controls", open_id);
                if aria == "listbox" {
                    patch = patch.attr("role", "combobox");
                }
                if role == AriaRole::Menu {
                    patch = patch.attr("id", reference_dom_id(floating_id));
                    if self.nested {
                        patch = patch.attr("role", "menuitem");
                    }
                }
                match role {
                    AriaRole::Select => patch.attr("aria-autocomplete", "none"),
                    AriaRole::Combobox => patch.attr("aria-autocomplete", "list"),
                    _ => patch,
                }
            }
            PropTarget::Floating => {
                let mut patch = PropsPatch::new()
                    .attr("id", String::from(floating_id))
                    .attr("role", AttrValue::from(role.aria_role()));
                if role == AriaRole::Menu {
                    patch = patch.attr("aria-labelledby", reference_dom_id(floating_id));
                }
                patch
            }
            PropTarget::Item(state) => {
                let option = PropsPatch::new()
                    .attr("role", "option")
                    .attr("id", item_dom_id(floating_id, state.index));
                match role {
                    AriaRole::Select => {
                        option.attr("aria-selected", state.active && state.selected)
                    }
                    AriaRole::Combobox if state.active => option.attr("aria-selected", true),
                    AriaRole::Combobox => option,
                    _ => PropsPatch::new(),
                }
            }
        }
    }

    fn open_changed(&mut self, _details: &OpenChangeDetails, cx: &mut InteractionCx<'_>) {
        if let Some(node) = cx.node() {
            self.nested = cx.tree.parent_of(node).is_some();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpenChangeReason;
    use crate::event::{Event, EventKind};
    use crate::props::ItemState;
    use crate::testing::Fixture;

    fn attr<'a>(p: &'a PropsPatch, name: &str) -> Option<&'a AttrValue> {
        p.attrs.get(name)
    }

    fn open(f: &mut Fixture) {
        let ev = Event::new(EventKind::Click, 0);
        f.ctx.on_open_change(true, &ev, OpenChangeReason::Click);
    }

    #[test]
    fn dialog_reference_tracks_open_state() {
        let mut f = Fixture::new();
        let role = Role::new(AriaRole::Dialog);
        let closed = role.props(&PropTarget::Reference, &f.ctx);
        assert_eq!(attr(&closed, "aria-expanded"), Some(&AttrValue::from("false")));
        assert_eq!(attr(&closed, "aria-controls"), Some(&AttrValue::Absent));
        assert_eq!(attr(&closed, "aria-haspopup"), Some(&AttrValue::from("dialog")));
        open(&mut f);
        let opened = role.props(&PropTarget::Reference, &f.ctx);
        assert_eq!(attr(&opened, "aria-expanded"), Some(&AttrValue::from("true")));
        assert_eq!(
            attr(&opened, "aria-controls"),
            Some(&AttrValue::from("floating-1"))
        );
        let floating = role.props(&PropTarget::Floating, &f.ctx);
        assert_eq!(attr(&floating, "role"), Some(&AttrValue::from("dialog")));
        assert_eq!(attr(&floating, "id"), Some(&AttrValue::from("floating-1")));
    }

    #[test]
    fn tooltip_and_label_describe_reference() {
        let mut f = Fixture::new();
        open(&mut f);
        let tooltip = Role::new(AriaRole::Tooltip).props(&PropTarget::Reference, &f.ctx);
        assert_eq!(
            attr(&tooltip, "aria-describedby"),
            Some(&AttrValue::from("floating-1"))
        );
        assert!(attr(&tooltip, "aria-expanded").is_none());
        let label = Role::new(AriaRole::Label);
        let reference = label.props(&PropTarget::Reference, &f.ctx);
        assert!(attr(&reference, "aria-labelledby").is_some());
        let floating = label.props(&PropTarget::Floating, &f.ctx);
        assert_eq!(attr(&floating, "role"), Some(&AttrValue::Absent));
    }

    #[test]
    fn select_items_and_combobox_reference() {
        let f = Fixture::new();
        let select = Role::new(AriaRole::Select);
        let reference = select.props(&PropTarget::Reference, &f.ctx);
        assert_eq!(attr(&reference, "role"), Some(&AttrValue::from("combobox")));
        assert_eq!(attr(&reference, "aria-haspopup"), Some(&AttrValue::from("listbox")));
        assert_eq!(attr(&reference, "aria-autocomplete"), Some(&AttrValue::from("none")));

        let mut state = ItemState::new(3);
        state.active = true;
        state.selected = true;
        let item = select.props(&PropTarget::Item(state), &f.ctx);
        assert_eq!(attr(&item, "role"), Some(&AttrValue::from("option")));
        assert_eq!(attr(&item, "aria-selected"), Some(&AttrValue::Bool(true)));
        assert_eq!(
            attr(&item, "id"),
            Some(&AttrValue::from(item_dom_id("floating-1", 3)))
        );
        let dialog_item =
            Role::new(AriaRole::Dialog).props(&PropTarget::Item(ItemState::new(0)), &f.ctx);
        assert!(dialog_item.is_empty());
    }

    #[test]
    fn nested_menu_reference_is_menuitem() {
        let f = Fixture::new();
        let menu = Role::new(AriaRole::Menu).with_nested(true);
        let reference = menu.props(&PropTarget::Reference, &f.ctx);
        assert_eq!(attr(&reference, "role"), Some(&AttrValue::from("menuitem")));
        assert_eq!(
            attr(&reference, "id"),
            Some(&AttrValue::from(reference_dom_id("floating-1")))
        );
        let floating = menu.props(&PropTarget::Floating, &f.ctx);
        assert_eq!(
            attr(&floating, "aria-labelledby"),
            Some(&AttrValue::from(reference_dom_id("floating-1")))
        );
    }
}
