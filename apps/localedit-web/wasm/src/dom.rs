//! `DomAdapter` over the live browser document
//!
//! Every web-sys call that can throw is mapped to absence, so a host markup
//! change can only make the engine find nothing, never panic.

use std::cell::RefCell;
use std::rc::Rc;

use localedit_core::{DomAdapter, MenuAction, MenuItem, NodeKind};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement, MouseEvent, Node};

/// Class applied to injected menu rows so host styles can target them
pub const MENU_ITEM_CLASS: &str = "localedit-menu-item";

/// Receives activations of injected menu rows
pub type MenuDispatch = Rc<dyn Fn(MenuAction, Node)>;

type RowListener = (Element, Closure<dyn FnMut(MouseEvent)>);

#[derive(Clone)]
pub struct WebDom {
    document: Document,
    dispatch: Rc<RefCell<Option<MenuDispatch>>>,
    /// Click handlers of injected rows, dropped once their row leaves the document
    listeners: Rc<RefCell<Vec<RowListener>>>,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            dispatch: Rc::new(RefCell::new(None)),
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Number of row click handlers currently held
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn prune_listeners(&self) {
        self.listeners
            .borrow_mut()
            .retain(|(row, _)| row.is_connected());
    }

    /// Route menu-row clicks to `dispatch`
    pub fn set_menu_dispatch(&self, dispatch: MenuDispatch) {
        *self.dispatch.borrow_mut() = Some(dispatch);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn create_row(&self, label: &str) -> Option<Element> {
        let row = self.document.create_element("div").ok()?;
        row.set_attribute("role", "menuitem").ok()?;
        row.set_attribute("tabindex", "-1").ok()?;
        row.set_class_name(MENU_ITEM_CLASS);
        row.set_text_content(Some(label));
        Some(row)
    }
}

impl DomAdapter for WebDom {
    type Node = Node;

    fn root(&self) -> Option<Node> {
        self.document
            .body()
            .map(Node::from)
            .or_else(|| self.document.document_element().map(Node::from))
    }

    fn parent_element(&self, node: &Node) -> Option<Node> {
        node.parent_element().map(Node::from)
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.get(i)).collect()
    }

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>()
            .map(|el| el.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn set_attribute(&self, node: &Node, name: &str, value: &str) {
        if let Some(el) = node.dyn_ref::<Element>() {
            let _ = el.set_attribute(name, value);
        }
    }

    fn remove_attribute(&self, node: &Node, name: &str) {
        if let Some(el) = node.dyn_ref::<Element>() {
            let _ = el.remove_attribute(name);
        }
    }

    fn text_data(&self, node: &Node) -> Option<String> {
        if node.node_type() != Node::TEXT_NODE {
            return None;
        }
        node.node_value()
    }

    fn set_text_data(&self, node: &Node, text: &str) {
        node.set_node_value(Some(text));
    }

    fn rendered_text(&self, node: &Node) -> String {
        match node.dyn_ref::<HtmlElement>() {
            Some(el) => el.inner_text(),
            None => node.text_content().unwrap_or_default(),
        }
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn append_menu_item(&self, menu: &Node, item: &MenuItem) {
        let Some(row) = self.create_row(&item.label) else {
            return;
        };

        let dispatch = self.dispatch.clone();
        let action = item.action;
        let target = menu.clone();
        let on_click = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            event.prevent_default();
            event.stop_propagation();
            let handler = dispatch.borrow().clone();
            if let Some(handler) = handler {
                handler(action, target.clone());
            }
        });
        let _ = row.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());

        self.prune_listeners();
        if menu.append_child(&row).is_ok() {
            self.listeners.borrow_mut().push((row, on_click));
        }
    }

    fn selection_anchor(&self) -> Option<Node> {
        web_sys::window()?.get_selection().ok()??.anchor_node()
    }

    fn request_rerender(&self) {
        if let Ok(event) = Event::new("visibilitychange") {
            let _ = self.document.dispatch_event(&event);
        }
    }
}
