//! Context-menu enhancement
//!
//! Any element with `role="menu"` that appears in the document gets two
//! extra rows. The menu is stamped once enhanced, so seeing the same menu
//! again (its own insertions are mutations too) never adds rows twice.

use tracing::debug;

use crate::config::EngineConfig;
use crate::dom::{
    descendants, find_descendant, DomAdapter, Matcher, MenuAction, MenuItem, NodeKind,
};
use crate::error::ContextError;
use crate::identity::{Identified, IdentityDeriver};

/// Attributes that tie an element to a message when resolving menu context
const CONTEXT_MARKERS: [Matcher; 3] = [
    Matcher::HasAttribute("data-message-id"),
    Matcher::HasAttribute("data-author-id"),
    Matcher::HasAttribute("data-list-item-id"),
];

/// Blocking user interaction (`window.prompt` / `window.alert` in a browser)
pub trait Prompter {
    /// Ask for text; `None` when the user cancels
    fn prompt(&self, message: &str, initial: &str) -> Option<String>;

    /// Show a notice the user must acknowledge
    fn notify(&self, message: &str);
}

pub struct MenuInjector<'a, D: DomAdapter> {
    dom: &'a D,
    config: &'a EngineConfig,
}

impl<'a, D: DomAdapter> MenuInjector<'a, D> {
    pub fn new(dom: &'a D, config: &'a EngineConfig) -> Self {
        Self { dom, config }
    }

    /// Enhance `node` and every menu inside it; returns how many menus gained rows
    pub fn enhance(&self, node: &D::Node) -> usize {
        if self.dom.kind(node) != NodeKind::Element {
            return 0;
        }
        let mut menus: Vec<D::Node> = Vec::new();
        if self.is_menu(node) {
            menus.push(node.clone());
        }
        menus.extend(descendants(self.dom, node).filter(|n| self.is_menu(n)));

        menus
            .into_iter()
            .filter(|menu| self.enhance_menu(menu))
            .count()
    }

    fn is_menu(&self, node: &D::Node) -> bool {
        self.dom.kind(node) == NodeKind::Element
            && self.dom.attribute(node, "role").as_deref() == Some("menu")
    }

    fn enhance_menu(&self, menu: &D::Node) -> bool {
        if self
            .dom
            .attribute(menu, &self.config.enhanced_attribute)
            .is_some()
        {
            return false;
        }
        self.dom
            .set_attribute(menu, &self.config.enhanced_attribute, "1");
        for item in self.items() {
            self.dom.append_menu_item(menu, &item);
        }
        debug!("Added local edit actions to context menu");
        true
    }

    pub fn items(&self) -> [MenuItem; 2] {
        [
            MenuItem {
                action: MenuAction::Modify,
                label: self.config.modify_label.clone(),
            },
            MenuItem {
                action: MenuAction::Clear,
                label: self.config.clear_label.clone(),
            },
        ]
    }

    /// Find the message a menu was opened for
    ///
    /// Climbs from the menu, searching each ancestor's subtree for an element
    /// tied to a message, then falls back to the current text selection.
    pub fn resolve_context(&self, menu: &D::Node) -> Result<Identified<D::Node>, ContextError> {
        let deriver = IdentityDeriver::new(self.dom, self.config);

        let mut current = Some(menu.clone());
        for _ in 0..self.config.context_search_depth {
            let Some(el) = current else { break };
            if let Some(found) = find_descendant(self.dom, &el, &CONTEXT_MARKERS) {
                if let Some(identified) = deriver.identify(&found) {
                    return Ok(identified);
                }
            }
            current = self.dom.parent_element(&el);
        }

        self.dom
            .selection_anchor()
            .and_then(|anchor| deriver.identify(&anchor))
            .ok_or(ContextError::NoMessageContext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MutationBatch;
    use crate::identity::MessageId;
    use crate::testing::FakeDom;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_menu_gets_two_rows_once() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let layer = dom.element(&root, "div", &[("class", "layer")]);
        let menu = dom.element(&layer, "div", &[("role", "menu")]);
        dom.element(&menu, "div", &[("role", "menuitem")]);

        let cfg = EngineConfig::default();
        let injector = MenuInjector::new(&dom, &cfg);
        assert_eq!(injector.enhance(&layer), 1);
        assert_eq!(injector.enhance(&layer), 0);
        assert_eq!(injector.enhance(&menu), 0);

        let items = dom.menu_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, menu);
        assert_eq!(items[0].1.action, MenuAction::Modify);
        assert_eq!(items[0].1.label, "Modify message (local)");
        assert_eq!(items[1].1.action, MenuAction::Clear);
        assert_eq!(items[1].1.label, "Clear local modification");
    }

    #[test]
    fn test_own_row_insertions_do_not_reenhance() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let menu = dom.element(&root, "div", &[("role", "menu")]);

        let cfg = EngineConfig::default();
        let injector = MenuInjector::new(&dom, &cfg);
        injector.enhance(&menu);

        let MutationBatch { records } = dom.take_mutations();
        assert_eq!(records.len(), 2);
        for record in records {
            if let crate::dom::Mutation::ChildAdded(row) = record {
                assert_eq!(injector.enhance(&row), 0);
            }
        }
        assert_eq!(dom.menu_items().len(), 2);
    }

    #[test]
    fn test_non_menu_is_ignored() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let list = dom.element(&root, "div", &[("role", "listbox")]);
        let text = dom.text(&list, "x");

        let cfg = EngineConfig::default();
        let injector = MenuInjector::new(&dom, &cfg);
        assert_eq!(injector.enhance(&list), 0);
        assert_eq!(injector.enhance(&text), 0);
        assert!(dom.menu_items().is_empty());
    }

    #[test]
    fn test_resolve_context_by_climbing() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let message = dom.element(&root, "div", &[("data-message-id", "77")]);
        let body = dom.element(&message, "span", &[]);
        dom.text(&body, "hello");
        let menu = dom.element(&message, "div", &[("role", "menu")]);

        let cfg = EngineConfig::default();
        let injector = MenuInjector::new(&dom, &cfg);
        let context = injector.resolve_context(&menu).unwrap();
        assert_eq!(context.container, message);
        assert_eq!(context.id, MessageId::new("77"));
    }

    #[test]
    fn test_resolve_context_falls_back_to_selection() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let menu = dom.element(&root, "div", &[("role", "menu")]);
        let other = dom.element(&root, "section", &[]);
        let message = dom.element(&other, "li", &[("role", "article"), ("class", "message")]);
        let selected = dom.text(&message, "selected words");

        let cfg = EngineConfig {
            context_search_depth: 1,
            ..EngineConfig::default()
        };
        let injector = MenuInjector::new(&dom, &cfg);
        assert_eq!(
            injector.resolve_context(&menu),
            Err(ContextError::NoMessageContext)
        );

        dom.set_selection(Some(selected));
        assert_eq!(injector.resolve_context(&menu).unwrap().container, message);
    }
}
