//! In-memory DOM for exercising the engine without a browser
//!
//! `FakeDom` is an arena of nodes behind a `RefCell`. Text writes and menu
//! insertions are recorded as mutations exactly like a `MutationObserver`
//! would report them (including writes that do not change the value), so
//! tests can feed the engine its own side effects and check that it settles.

use std::cell::{Cell, RefCell};

use crate::dom::{DomAdapter, MenuItem, Mutation, MutationBatch, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FakeNode(pub usize);

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    tag: Option<String>,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug)]
pub struct FakeDom {
    nodes: RefCell<Vec<NodeData>>,
    mutations: RefCell<Vec<Mutation<FakeNode>>>,
    menu_items: RefCell<Vec<(FakeNode, MenuItem)>>,
    selection: RefCell<Option<FakeNode>>,
    rerender_requests: Cell<usize>,
    text_writes: Cell<usize>,
}

impl Default for FakeDom {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDom {
    /// A document holding a single `body` element
    pub fn new() -> Self {
        let body = NodeData {
            kind: NodeKind::Element,
            tag: Some("body".to_string()),
            attributes: Vec::new(),
            text: None,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: RefCell::new(vec![body]),
            mutations: RefCell::new(Vec::new()),
            menu_items: RefCell::new(Vec::new()),
            selection: RefCell::new(None),
            rerender_requests: Cell::new(0),
            text_writes: Cell::new(0),
        }
    }

    pub fn root_node(&self) -> FakeNode {
        FakeNode(0)
    }

    fn push(&self, parent: &FakeNode, data: NodeData) -> FakeNode {
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len();
        nodes.push(NodeData {
            parent: Some(parent.0),
            ..data
        });
        nodes[parent.0].children.push(id);
        FakeNode(id)
    }

    /// Append an element; attribute names are stored as given, tag lowercased
    pub fn element(&self, parent: &FakeNode, tag: &str, attributes: &[(&str, &str)]) -> FakeNode {
        self.push(
            parent,
            NodeData {
                kind: NodeKind::Element,
                tag: Some(tag.to_ascii_lowercase()),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text: None,
                parent: None,
                children: Vec::new(),
            },
        )
    }

    pub fn text(&self, parent: &FakeNode, data: &str) -> FakeNode {
        self.push(
            parent,
            NodeData {
                kind: NodeKind::Text,
                tag: None,
                attributes: Vec::new(),
                text: Some(data.to_string()),
                parent: None,
                children: Vec::new(),
            },
        )
    }

    /// Remove a node from its parent, leaving it detached
    pub fn detach(&self, node: &FakeNode) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent].children.retain(|&c| c != node.0);
        }
    }

    /// Host-side text change (does not count as an engine write)
    pub fn host_set_text(&self, node: &FakeNode, data: &str) {
        self.nodes.borrow_mut()[node.0].text = Some(data.to_string());
    }

    pub fn set_selection(&self, node: Option<FakeNode>) {
        *self.selection.borrow_mut() = node;
    }

    /// Mutations caused by writes since the last call, as one batch
    pub fn take_mutations(&self) -> MutationBatch<FakeNode> {
        MutationBatch::new(std::mem::take(&mut *self.mutations.borrow_mut()))
    }

    pub fn menu_items(&self) -> Vec<(FakeNode, MenuItem)> {
        self.menu_items.borrow().clone()
    }

    pub fn rerender_requests(&self) -> usize {
        self.rerender_requests.get()
    }

    pub fn text_writes(&self) -> usize {
        self.text_writes.get()
    }

    /// Concatenated character data of every text node under `node`
    pub fn text_content(&self, node: &FakeNode) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        let mut stack = vec![node.0];
        while let Some(id) = stack.pop() {
            let data = &nodes[id];
            if let Some(text) = &data.text {
                out.push_str(text);
            }
            stack.extend(data.children.iter().rev());
        }
        out
    }
}

impl DomAdapter for FakeDom {
    type Node = FakeNode;

    fn root(&self) -> Option<FakeNode> {
        Some(self.root_node())
    }

    fn parent_element(&self, node: &FakeNode) -> Option<FakeNode> {
        self.nodes.borrow()[node.0].parent.map(FakeNode)
    }

    fn children(&self, node: &FakeNode) -> Vec<FakeNode> {
        self.nodes.borrow()[node.0]
            .children
            .iter()
            .copied()
            .map(FakeNode)
            .collect()
    }

    fn kind(&self, node: &FakeNode) -> NodeKind {
        self.nodes.borrow()[node.0].kind
    }

    fn tag_name(&self, node: &FakeNode) -> Option<String> {
        self.nodes.borrow()[node.0].tag.clone()
    }

    fn attribute(&self, node: &FakeNode, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0]
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&self, node: &FakeNode, name: &str, value: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let attributes = &mut nodes[node.0].attributes;
        match attributes.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&self, node: &FakeNode, name: &str) {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .retain(|(k, _)| k != name);
    }

    fn text_data(&self, node: &FakeNode) -> Option<String> {
        self.nodes.borrow()[node.0].text.clone()
    }

    fn set_text_data(&self, node: &FakeNode, text: &str) {
        self.nodes.borrow_mut()[node.0].text = Some(text.to_string());
        self.text_writes.set(self.text_writes.get() + 1);
        self.mutations
            .borrow_mut()
            .push(Mutation::CharacterData(*node));
    }

    fn rendered_text(&self, node: &FakeNode) -> String {
        self.text_content(node)
    }

    fn is_connected(&self, node: &FakeNode) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = node.0;
        loop {
            if current == 0 {
                return true;
            }
            match nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn append_menu_item(&self, menu: &FakeNode, item: &MenuItem) {
        let row = self.element(menu, "div", &[("role", "menuitem")]);
        self.text(&row, &item.label);
        self.menu_items.borrow_mut().push((*menu, item.clone()));
        self.mutations.borrow_mut().push(Mutation::ChildAdded(row));
    }

    fn selection_anchor(&self) -> Option<FakeNode> {
        *self.selection.borrow()
    }

    fn request_rerender(&self) {
        self.rerender_requests.set(self.rerender_requests.get() + 1);
    }
}
