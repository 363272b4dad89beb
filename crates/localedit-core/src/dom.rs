//! DOM adapter abstraction
//!
//! The engine never touches a rendering engine directly. Everything it needs
//! from the host document goes through [`DomAdapter`], which the browser
//! binding implements on `web_sys::Node` and the tests implement on an
//! in-memory arena ([`crate::testing::FakeDom`]).
//!
//! Only primitive reads and writes live on the trait. Descendant search,
//! selector matching and text-node walks are implemented here on top of
//! [`DomAdapter::children`], so the heuristics behave identically against
//! every adapter.

use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

/// Actions the injected context-menu rows trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    Modify,
    Clear,
}

/// A row to append to a host context menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub action: MenuAction,
    pub label: String,
}

/// Capability interface over the host document
///
/// Reads are infallible: adapters map platform errors to `None`/empty so a
/// markup change in the host degrades to "no identity" instead of a crash.
pub trait DomAdapter {
    type Node: Clone + PartialEq + Debug;

    /// Root of the observed application tree
    fn root(&self) -> Option<Self::Node>;

    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Child nodes in document order
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Lowercase tag name for elements
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&self, node: &Self::Node, name: &str);

    /// Character data of a text node
    fn text_data(&self, node: &Self::Node) -> Option<String>;

    fn set_text_data(&self, node: &Self::Node, text: &str);

    /// Text as the user sees it (`innerText` in a browser)
    fn rendered_text(&self, node: &Self::Node) -> String;

    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Append an interactive row to a menu; activation must be routed back
    /// to the engine as `(item.action, menu)`
    fn append_menu_item(&self, menu: &Self::Node, item: &MenuItem);

    /// Node holding the start of the current text selection, if any
    fn selection_anchor(&self) -> Option<Self::Node>;

    /// Nudge the host into redrawing its content (a `visibilitychange` in a browser)
    fn request_rerender(&self);
}

impl<D: DomAdapter + ?Sized> DomAdapter for &D {
    type Node = D::Node;

    fn root(&self) -> Option<Self::Node> {
        (**self).root()
    }

    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node> {
        (**self).parent_element(node)
    }

    fn children(&self, node: &Self::Node) -> Vec<Self::Node> {
        (**self).children(node)
    }

    fn kind(&self, node: &Self::Node) -> NodeKind {
        (**self).kind(node)
    }

    fn tag_name(&self, node: &Self::Node) -> Option<String> {
        (**self).tag_name(node)
    }

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String> {
        (**self).attribute(node, name)
    }

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) {
        (**self).set_attribute(node, name, value)
    }

    fn remove_attribute(&self, node: &Self::Node, name: &str) {
        (**self).remove_attribute(node, name)
    }

    fn text_data(&self, node: &Self::Node) -> Option<String> {
        (**self).text_data(node)
    }

    fn set_text_data(&self, node: &Self::Node, text: &str) {
        (**self).set_text_data(node, text)
    }

    fn rendered_text(&self, node: &Self::Node) -> String {
        (**self).rendered_text(node)
    }

    fn is_connected(&self, node: &Self::Node) -> bool {
        (**self).is_connected(node)
    }

    fn append_menu_item(&self, menu: &Self::Node, item: &MenuItem) {
        (**self).append_menu_item(menu, item)
    }

    fn selection_anchor(&self) -> Option<Self::Node> {
        (**self).selection_anchor()
    }

    fn request_rerender(&self) {
        (**self).request_rerender()
    }
}

/// A live observation that can be torn down
pub trait Subscription {
    fn disconnect(&mut self);
}

/// Which observation stream a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Child insertions and character-data changes; drives override re-application
    Content,
    /// Child insertions; drives context-menu enhancement
    Menu,
}

/// One observed change
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<N> {
    /// A node was inserted into the tree
    ChildAdded(N),
    /// The character data of a text node changed
    CharacterData(N),
}

/// Mutations delivered together, in document order
#[derive(Debug, Clone, PartialEq)]
pub struct MutationBatch<N> {
    pub records: Vec<Mutation<N>>,
}

impl<N> MutationBatch<N> {
    pub fn new(records: Vec<Mutation<N>>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl<N> Default for MutationBatch<N> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

/// A single-selector predicate, the subset of CSS the heuristics need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// `[name]`
    HasAttribute(&'static str),
    /// `[name*="needle"]`
    AttributeContains(&'static str, &'static str),
    /// `[class*="needle"]`
    ClassContains(&'static str),
    /// `tag`
    Tag(&'static str),
}

impl Matcher {
    pub fn matches<D: DomAdapter>(&self, dom: &D, node: &D::Node) -> bool {
        if dom.kind(node) != NodeKind::Element {
            return false;
        }
        match self {
            Matcher::HasAttribute(name) => dom.attribute(node, name).is_some(),
            Matcher::AttributeContains(name, needle) => dom
                .attribute(node, name)
                .is_some_and(|value| value.contains(needle)),
            Matcher::ClassContains(needle) => dom
                .attribute(node, "class")
                .is_some_and(|value| value.contains(needle)),
            Matcher::Tag(tag) => dom
                .tag_name(node)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag)),
        }
    }
}

/// Pre-order iterator over the descendants of a node, excluding the node itself
pub struct Descendants<'a, D: DomAdapter> {
    dom: &'a D,
    stack: Vec<D::Node>,
}

impl<'a, D: DomAdapter> Iterator for Descendants<'a, D> {
    type Item = D::Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let mut children = self.dom.children(&node);
        children.reverse();
        self.stack.extend(children);
        Some(node)
    }
}

pub fn descendants<'a, D: DomAdapter>(dom: &'a D, root: &D::Node) -> Descendants<'a, D> {
    let mut stack = dom.children(root);
    stack.reverse();
    Descendants { dom, stack }
}

/// First descendant matching any of `matchers`, in document order
/// (`querySelector` with a selector list)
pub fn find_descendant<D: DomAdapter>(
    dom: &D,
    root: &D::Node,
    matchers: &[Matcher],
) -> Option<D::Node> {
    descendants(dom, root).find(|node| matchers.iter().any(|m| m.matches(dom, node)))
}

/// First descendant matching the earliest matcher that matches anything
pub fn find_descendant_by_priority<D: DomAdapter>(
    dom: &D,
    root: &D::Node,
    matchers: &[Matcher],
) -> Option<D::Node> {
    matchers
        .iter()
        .find_map(|m| descendants(dom, root).find(|node| m.matches(dom, node)))
}

/// Text nodes under `root` with non-whitespace content, in document order
pub fn visible_text_nodes<D: DomAdapter>(dom: &D, root: &D::Node) -> Vec<D::Node> {
    descendants(dom, root)
        .filter(|node| dom.kind(node) == NodeKind::Text)
        .filter(|node| {
            dom.text_data(node)
                .is_some_and(|text| !text.trim().is_empty())
        })
        .collect()
}

/// The node itself when it is an element, else its parent element
pub fn nearest_element<D: DomAdapter>(dom: &D, node: &D::Node) -> Option<D::Node> {
    match dom.kind(node) {
        NodeKind::Element => Some(node.clone()),
        _ => dom.parent_element(node),
    }
}

/// Whether the node sits inside something the user types into
pub fn is_inside_editable<D: DomAdapter>(dom: &D, node: &D::Node) -> bool {
    let mut current = nearest_element(dom, node);
    while let Some(el) = current {
        let tag = dom.tag_name(&el).unwrap_or_default();
        if tag == "input" || tag == "textarea" {
            return true;
        }
        if dom.attribute(&el, "contenteditable").as_deref() == Some("true") {
            return true;
        }
        current = dom.parent_element(&el);
    }
    false
}
