//! Visible-text rewriting
//!
//! Host rich text splits a message over many text nodes (mentions, emoji,
//! formatting spans). Rewriting therefore puts the whole replacement into
//! the first visible text node and blanks the rest, so the override always
//! reads as one string regardless of how the original was fragmented.
//!
//! Only nodes whose value actually changes are written. Our own writes show
//! up as character-data mutations, and skipping no-op writes is what lets the
//! watcher settle after one round.

use tracing::trace;

use crate::config::EngineConfig;
use crate::dom::{visible_text_nodes, DomAdapter};
use crate::error::RewriteError;
use crate::identity::{IdentityDeriver, MessageId};

/// The host's text for a container, captured before an override replaced it
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<N> {
    pub container: N,
    fragments: Vec<(N, String)>,
}

pub struct TextRewriter<'a, D: DomAdapter> {
    dom: &'a D,
    config: &'a EngineConfig,
}

impl<'a, D: DomAdapter> TextRewriter<'a, D> {
    pub fn new(dom: &'a D, config: &'a EngineConfig) -> Self {
        Self { dom, config }
    }

    /// Show `override_text` in place of the message body, or restore the
    /// host's rendered text when `None`
    ///
    /// Returns the number of text nodes written. The container is stamped
    /// with the processed marker on success.
    pub fn apply(
        &self,
        container: &D::Node,
        override_text: Option<&str>,
    ) -> Result<usize, RewriteError> {
        if !self.dom.is_connected(container) {
            return Err(RewriteError::Detached);
        }

        let nodes = visible_text_nodes(self.dom, container);
        let Some((first, rest)) = nodes.split_first() else {
            return Err(RewriteError::NoTextNodes);
        };

        let text = match override_text {
            Some(text) => text.to_string(),
            None => self.host_text(container),
        };

        let mut writes = 0;
        if self.dom.text_data(first).as_deref() != Some(text.as_str()) {
            self.dom.set_text_data(first, &text);
            writes += 1;
        }
        for node in rest {
            self.dom.set_text_data(node, "");
            writes += 1;
        }

        self.mark_processed(container);
        trace!(writes, restored = override_text.is_none(), "Rewrote message text");
        Ok(writes)
    }

    /// Show a stored override and record which message it belongs to
    ///
    /// The recorded id outlives the text change: once the override is on
    /// screen, a synthesized identifier derived from the container would
    /// hash the override instead of the host's text.
    pub fn apply_override(
        &self,
        container: &D::Node,
        id: &MessageId,
        text: &str,
    ) -> Result<usize, RewriteError> {
        let writes = self.apply(container, Some(text))?;
        self.dom
            .set_attribute(container, &self.config.applied_id_attribute, id.as_str());
        Ok(writes)
    }

    /// Identifier recorded by the last [`TextRewriter::apply_override`]
    pub fn applied_id(&self, container: &D::Node) -> Option<MessageId> {
        self.dom
            .attribute(container, &self.config.applied_id_attribute)
            .filter(|id| !id.is_empty())
            .map(MessageId::new)
    }

    pub fn forget_applied_id(&self, container: &D::Node) {
        self.dom
            .remove_attribute(container, &self.config.applied_id_attribute);
    }

    /// Host text to restore when no snapshot exists
    ///
    /// Same body heuristic as identity derivation, trimmed, and taken from
    /// the whole container when the body element is blank. Only one visible
    /// node is left after a restore, so a second restore reads the same text.
    fn host_text(&self, container: &D::Node) -> String {
        let body = IdentityDeriver::new(self.dom, self.config).extract_text(container);
        let body = body.trim();
        if body.is_empty() {
            self.dom.rendered_text(container).trim().to_string()
        } else {
            body.to_string()
        }
    }

    /// Whether the container already shows exactly `text`
    pub fn shows(&self, container: &D::Node, text: &str) -> bool {
        match visible_text_nodes(self.dom, container).as_slice() {
            [only] => self.dom.text_data(only).as_deref() == Some(text),
            _ => false,
        }
    }

    pub fn snapshot(&self, container: &D::Node) -> Snapshot<D::Node> {
        let fragments = visible_text_nodes(self.dom, container)
            .into_iter()
            .filter_map(|node| self.dom.text_data(&node).map(|text| (node, text)))
            .collect();
        Snapshot {
            container: container.clone(),
            fragments,
        }
    }

    /// Whether every node the snapshot refers to is still in the document
    pub fn is_live(&self, snapshot: &Snapshot<D::Node>) -> bool {
        self.dom.is_connected(&snapshot.container)
            && snapshot
                .fragments
                .iter()
                .all(|(node, _)| self.dom.is_connected(node))
    }

    /// Write captured host text back into the nodes it came from
    pub fn restore(&self, snapshot: &Snapshot<D::Node>) -> Result<usize, RewriteError> {
        if !self.dom.is_connected(&snapshot.container) {
            return Err(RewriteError::Detached);
        }
        let mut writes = 0;
        for (node, text) in &snapshot.fragments {
            if self.dom.is_connected(node) && self.dom.text_data(node).as_deref() != Some(text) {
                self.dom.set_text_data(node, text);
                writes += 1;
            }
        }
        Ok(writes)
    }

    pub fn is_processed(&self, container: &D::Node) -> bool {
        self.dom
            .attribute(container, &self.config.processed_attribute)
            .is_some()
    }

    fn mark_processed(&self, container: &D::Node) {
        let stamp = chrono::Utc::now().timestamp_millis().to_string();
        self.dom
            .set_attribute(container, &self.config.processed_attribute, &stamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDom;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_override_goes_into_first_node() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "42")]);
        let span = dom.element(&div, "span", &[]);
        let hello = dom.text(&span, "hello");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        assert_eq!(rewriter.apply(&div, Some("bye")), Ok(1));
        assert_eq!(dom.text_data(&hello).as_deref(), Some("bye"));
        assert!(rewriter.is_processed(&div));
        assert!(rewriter.shows(&div, "bye"));
    }

    #[test]
    fn test_fragmented_text_is_collapsed() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "1")]);
        let a = dom.text(&div, "hey ");
        let mention = dom.element(&div, "span", &[("class", "mention")]);
        let b = dom.text(&mention, "@bob");
        let c = dom.text(&div, " look");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        assert_eq!(rewriter.apply(&div, Some("replaced")), Ok(3));
        assert_eq!(dom.text_data(&a).as_deref(), Some("replaced"));
        assert_eq!(dom.text_data(&b).as_deref(), Some(""));
        assert_eq!(dom.text_data(&c).as_deref(), Some(""));
        assert_eq!(dom.text_content(&div), "replaced");
    }

    #[test]
    fn test_reapplying_same_override_writes_nothing() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "1")]);
        dom.text(&div, "one");
        dom.text(&div, "two");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        rewriter.apply(&div, Some("x")).unwrap();
        assert_eq!(rewriter.apply(&div, Some("x")), Ok(0));
    }

    #[test]
    fn test_restore_uses_rendered_body_and_stabilizes() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let li = dom.element(&root, "li", &[("role", "article"), ("class", "message")]);
        let header = dom.element(&li, "h3", &[]);
        dom.text(&header, "Alice");
        let body = dom.element(&li, "div", &[("class", "markup")]);
        dom.text(&body, "the body");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        rewriter.apply(&li, None).unwrap();
        let after_first = dom.text_content(&li);
        assert_eq!(after_first, "the body");

        assert_eq!(rewriter.apply(&li, None), Ok(0));
        assert_eq!(dom.text_content(&li), after_first);
    }

    #[test]
    fn test_restore_with_blank_first_body_uses_container_text() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let li = dom.element(&root, "li", &[("role", "article"), ("class", "message")]);
        dom.text(&li, "cd");
        let span = dom.element(&li, "span", &[]);
        dom.text(&span, "ab");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        rewriter.apply(&li, None).unwrap();
        assert_eq!(dom.text_content(&li), "ab");

        // The span is now empty, so the container text decides
        assert_eq!(rewriter.apply(&li, None), Ok(0));
        assert_eq!(dom.text_content(&li), "ab");
    }

    #[test]
    fn test_apply_override_records_message_id() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let li = dom.element(&root, "li", &[("role", "article"), ("class", "message")]);
        let p = dom.element(&li, "p", &[]);
        dom.text(&p, "hi");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        assert_eq!(rewriter.applied_id(&li), None);
        let id = MessageId::new("7:597816");
        assert_eq!(rewriter.apply_override(&li, &id, "changed"), Ok(1));
        assert_eq!(rewriter.applied_id(&li), Some(id));

        rewriter.forget_applied_id(&li);
        assert_eq!(rewriter.applied_id(&li), None);
    }

    #[test]
    fn test_snapshot_restores_fragments() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "1")]);
        dom.text(&div, "hey ");
        let mention = dom.element(&div, "span", &[]);
        dom.text(&mention, "@bob");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        let snapshot = rewriter.snapshot(&div);
        rewriter.apply(&div, Some("bye")).unwrap();
        assert_eq!(dom.text_content(&div), "bye");

        assert!(rewriter.is_live(&snapshot));
        assert_eq!(rewriter.restore(&snapshot), Ok(2));
        assert_eq!(dom.text_content(&div), "hey @bob");

        dom.detach(&mention);
        assert!(!rewriter.is_live(&snapshot));
    }

    #[test]
    fn test_no_text_nodes() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "1")]);
        dom.text(&div, "   ");

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        assert_eq!(rewriter.apply(&div, Some("x")), Err(RewriteError::NoTextNodes));
        assert!(!rewriter.is_processed(&div));
    }

    #[test]
    fn test_detached_container() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "1")]);
        let t = dom.text(&div, "text");
        dom.detach(&div);

        let cfg = EngineConfig::default();
        let rewriter = TextRewriter::new(&dom, &cfg);
        assert_eq!(rewriter.apply(&div, Some("x")), Err(RewriteError::Detached));
        assert_eq!(dom.text_data(&t).as_deref(), Some("text"));
    }
}
