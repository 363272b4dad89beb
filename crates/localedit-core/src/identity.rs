//! Message identity derivation
//!
//! Maps an arbitrary node inside the host's chat markup to the message it
//! belongs to. The host gives no schema guarantees, so everything here is
//! heuristic: climb to something that looks like a message container, then
//! prefer an identifier attribute the host put there, and only synthesize
//! `author:hash(text)` when there is none.
//!
//! Synthesized identifiers are not unique. Two messages from the same author
//! with the same leading text share one identifier (and therefore one
//! override), and editing a message's text changes its identifier, which
//! orphans any override stored for the old one. Both are accepted
//! limitations of identifying messages without host cooperation.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dom::{
    find_descendant, find_descendant_by_priority, nearest_element, DomAdapter, Matcher,
};

lazy_static! {
    static ref USER_LINK: Regex = Regex::new(r"users/(\d+)").unwrap();
}

/// Attributes whose presence alone marks a message container
const CONTAINER_ATTRIBUTES: [&str; 3] = ["data-message-id", "data-author-id", "data-list-id"];

/// Token the host puts in the list-item id of chat rows
const CHAT_LIST_MARKER: &str = "chat-messages";

/// Direct identifier attributes, highest priority first
const IDENTIFIER_ATTRIBUTES: [&str; 4] = [
    "data-message-id",
    "data-list-item-id",
    "data-author-id",
    "data-user-id",
];

const AUTHOR_ATTRIBUTES: [&str; 3] = ["data-author-id", "data-user-id", "data-sender-id"];

const AUTHOR_LINKS: [Matcher; 2] = [
    Matcher::AttributeContains("href", "/users/"),
    Matcher::AttributeContains("href", "users/"),
];

const AUTHOR_DESCENDANTS: [Matcher; 2] = [
    Matcher::HasAttribute("data-user-id"),
    Matcher::HasAttribute("data-author-id"),
];

/// Sub-elements that may hold the message body; the first match in document order wins
const CONTENT_ELEMENTS: [Matcher; 6] = [
    Matcher::HasAttribute("data-slate-editor"),
    Matcher::HasAttribute("data-message-content"),
    Matcher::ClassContains("markup"),
    Matcher::ClassContains("messageContent"),
    Matcher::Tag("p"),
    Matcher::Tag("span"),
];

/// Opaque identifier for a logical chat message
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A message container together with its derived identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Identified<N> {
    pub container: N,
    pub id: MessageId,
}

/// 32-bit multiplicative (djb2) hash of the first `limit` UTF-16 units, as lowercase hex
pub fn hash_snippet(text: &str, limit: usize) -> String {
    let hash = text
        .encode_utf16()
        .take(limit)
        .fold(5381u32, |h, unit| h.wrapping_mul(33).wrapping_add(u32::from(unit)));
    format!("{:x}", hash)
}

pub struct IdentityDeriver<'a, D: DomAdapter> {
    dom: &'a D,
    config: &'a EngineConfig,
}

impl<'a, D: DomAdapter> IdentityDeriver<'a, D> {
    pub fn new(dom: &'a D, config: &'a EngineConfig) -> Self {
        Self { dom, config }
    }

    /// Container and identifier for whatever message `node` is part of
    pub fn identify(&self, node: &D::Node) -> Option<Identified<D::Node>> {
        let container = self.find_container(node)?;
        let id = self.derive(&container);
        Some(Identified { container, id })
    }

    /// Walk up from `node` (inclusive) to the nearest message container
    pub fn find_container(&self, node: &D::Node) -> Option<D::Node> {
        let mut current = nearest_element(self.dom, node);
        for _ in 0..self.config.container_search_depth {
            let el = current?;
            if self.is_container(&el) {
                return Some(el);
            }
            current = self.dom.parent_element(&el);
        }
        None
    }

    pub fn is_container(&self, el: &D::Node) -> bool {
        let dom = self.dom;

        if let Some(list_id) = dom.attribute(el, "data-list-item-id") {
            if list_id.to_lowercase().contains(CHAT_LIST_MARKER) {
                return true;
            }
        }

        if matches!(dom.attribute(el, "role").as_deref(), Some("article" | "listitem")) {
            let class = dom.attribute(el, "class").unwrap_or_default();
            if class.to_lowercase().contains("message") {
                return true;
            }
        }

        CONTAINER_ATTRIBUTES
            .iter()
            .any(|name| dom.attribute(el, name).is_some())
    }

    /// Identifier for a message container
    pub fn derive(&self, container: &D::Node) -> MessageId {
        if let Some(id) = first_present(self.dom, container, &IDENTIFIER_ATTRIBUTES) {
            return MessageId(id);
        }

        let author = self
            .detect_author(container)
            .unwrap_or_else(|| self.config.unknown_author.clone());
        let text = self.extract_text(container);
        MessageId(format!(
            "{}:{}",
            author,
            hash_snippet(&text, self.config.snippet_length)
        ))
    }

    pub fn detect_author(&self, container: &D::Node) -> Option<String> {
        let dom = self.dom;

        if let Some(author) = first_present(dom, container, &AUTHOR_ATTRIBUTES) {
            return Some(author);
        }

        let from_link = find_descendant_by_priority(dom, container, &AUTHOR_LINKS)
            .and_then(|anchor| dom.attribute(&anchor, "href"))
            .and_then(|href| {
                USER_LINK
                    .captures(&href)
                    .map(|caps| caps[1].to_string())
            });
        if from_link.is_some() {
            return from_link;
        }

        find_descendant_by_priority(dom, container, &AUTHOR_DESCENDANTS).and_then(|child| {
            first_present(dom, &child, &["data-user-id", "data-author-id"])
        })
    }

    /// The message body as rendered by the host
    ///
    /// The first body-like element in document order decides, exactly as
    /// rendered; the whole container is used only when none exists.
    pub fn extract_text(&self, container: &D::Node) -> String {
        match find_descendant(self.dom, container, &CONTENT_ELEMENTS) {
            Some(body) => self.dom.rendered_text(&body),
            None => self.dom.rendered_text(container),
        }
    }
}

fn first_present<D: DomAdapter>(dom: &D, el: &D::Node, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| dom.attribute(el, name))
        .find(|value| !value.is_empty())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::testing::FakeDom;
    use proptest::prelude::*;

    proptest! {
        /// Property: a message-id attribute is returned verbatim whatever the text
        #[test]
        fn message_id_attribute_verbatim(id in "[A-Za-z0-9_-]{1,24}", text in ".*") {
            let dom = FakeDom::new();
            let root = dom.root_node();
            let div = dom.element(&root, "div", &[("data-message-id", id.as_str())]);
            let span = dom.element(&div, "span", &[]);
            let leaf = dom.text(&span, &text);

            let cfg = EngineConfig::default();
            let deriver = IdentityDeriver::new(&dom, &cfg);
            let found = deriver.identify(&leaf).unwrap();
            prop_assert_eq!(found.id.as_str(), id.as_str());
        }

        /// Property: identical anonymous subtrees derive identical identifiers
        #[test]
        fn synthesized_identifier_is_deterministic(author in "[0-9]{1,6}", text in ".{0,300}") {
            let dom = FakeDom::new();
            let root = dom.root_node();
            let mut ids = Vec::new();
            for _ in 0..2 {
                let li = dom.element(&root, "li", &[("role", "article"), ("class", "message")]);
                let href = format!("/users/{}", author);
                dom.element(&li, "a", &[("href", href.as_str())]);
                let p = dom.element(&li, "p", &[]);
                dom.text(&p, &text);
                let cfg = EngineConfig::default();
                ids.push(IdentityDeriver::new(&dom, &cfg).derive(&li));
            }
            prop_assert_eq!(&ids[0], &ids[1]);
            let prefix = format!("{}:", author);
            prop_assert!(ids[0].as_str().starts_with(&prefix));
        }
    }
}
