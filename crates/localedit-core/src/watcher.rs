//! Mutation watcher
//!
//! Batches from both observation streams go through one FIFO queue and are
//! processed strictly one after another, records in document order. Each
//! record of the content stream triggers a scan: find the message the node
//! belongs to, look up its override and re-apply it if the host has
//! re-rendered over it. A scan without an override never touches the DOM.

use std::collections::VecDeque;

use crate::config::EngineConfig;
use crate::dom::{
    descendants, is_inside_editable, nearest_element, DomAdapter, MutationBatch, Stream,
};
use crate::error::RewriteError;
use crate::identity::{IdentityDeriver, MessageId};
use crate::rewriter::TextRewriter;
use crate::store::{KeyValueStorage, OverrideStore};

/// FIFO of mutation batches awaiting processing
#[derive(Debug)]
pub struct MutationWatcher<N> {
    queue: VecDeque<(Stream, MutationBatch<N>)>,
}

impl<N> Default for MutationWatcher<N> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<N> MutationWatcher<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, stream: Stream, batch: MutationBatch<N>) {
        if !batch.is_empty() {
            self.queue.push_back((stream, batch));
        }
    }

    pub fn next_batch(&mut self) -> Option<(Stream, MutationBatch<N>)> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// What a single scan did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Inside an editable region or one of our own menus
    Ignored,
    /// No message container above the node
    NoIdentity,
    /// The message has no override
    NoOverride(MessageId),
    /// The override is already on screen
    AlreadyApplied(MessageId),
    Applied { id: MessageId, writes: usize },
    Failed { id: MessageId, error: RewriteError },
}

impl ScanOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ScanOutcome::Applied { .. })
    }
}

/// Re-applies stored overrides to the messages a node belongs to
pub struct Scanner<'a, D: DomAdapter, S> {
    dom: &'a D,
    config: &'a EngineConfig,
    store: &'a OverrideStore<S>,
}

impl<'a, D: DomAdapter, S: KeyValueStorage> Scanner<'a, D, S> {
    pub fn new(dom: &'a D, config: &'a EngineConfig, store: &'a OverrideStore<S>) -> Self {
        Self { dom, config, store }
    }

    /// Scan the message enclosing `node`
    pub fn scan(&self, node: &D::Node) -> ScanOutcome {
        if self.is_ignored(node) {
            return ScanOutcome::Ignored;
        }
        match IdentityDeriver::new(self.dom, self.config).find_container(node) {
            Some(container) => self.scan_container(&container),
            None => ScanOutcome::NoIdentity,
        }
    }

    /// Scan the message enclosing `node`, or every message inside it when
    /// `node` is not part of one (a freshly inserted list chunk)
    pub fn scan_subtree(&self, node: &D::Node) -> Vec<ScanOutcome> {
        match self.scan(node) {
            ScanOutcome::NoIdentity => {
                let Some(el) = nearest_element(self.dom, node) else {
                    return vec![ScanOutcome::NoIdentity];
                };
                let found = self.scan_containers_under(&el);
                if found.is_empty() {
                    vec![ScanOutcome::NoIdentity]
                } else {
                    found
                }
            }
            outcome => vec![outcome],
        }
    }

    /// Scan every message container below `root`
    pub fn scan_containers_under(&self, root: &D::Node) -> Vec<ScanOutcome> {
        let deriver = IdentityDeriver::new(self.dom, self.config);
        descendants(self.dom, root)
            .filter(|node| deriver.is_container(node))
            .filter(|node| !self.is_ignored(node))
            .map(|container| self.scan_container(&container))
            .collect()
    }

    pub fn scan_container(&self, container: &D::Node) -> ScanOutcome {
        let id = IdentityDeriver::new(self.dom, self.config).derive(container);
        let Some(text) = self.store.get(&id) else {
            return ScanOutcome::NoOverride(id);
        };

        let rewriter = TextRewriter::new(self.dom, self.config);
        if rewriter.is_processed(container) && rewriter.shows(container, text) {
            return ScanOutcome::AlreadyApplied(id);
        }
        match rewriter.apply_override(container, &id, text) {
            Ok(writes) => ScanOutcome::Applied { id, writes },
            Err(error) => ScanOutcome::Failed { id, error },
        }
    }

    fn is_ignored(&self, node: &D::Node) -> bool {
        is_inside_editable(self.dom, node) || self.is_inside_enhanced_menu(node)
    }

    fn is_inside_enhanced_menu(&self, node: &D::Node) -> bool {
        let mut current = nearest_element(self.dom, node);
        while let Some(el) = current {
            if self
                .dom
                .attribute(&el, &self.config.enhanced_attribute)
                .is_some()
            {
                return true;
            }
            current = self.dom.parent_element(&el);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Mutation;
    use crate::store::MemoryStorage;
    use crate::testing::FakeDom;
    use pretty_assertions::assert_eq;

    fn store_with(entries: &[(&str, &str)]) -> OverrideStore<MemoryStorage> {
        let mut store = OverrideStore::new(MemoryStorage::new(), "k");
        for (id, text) in entries {
            store.set(MessageId::new(*id), *text).unwrap();
        }
        store
    }

    #[test]
    fn test_queue_is_fifo_and_skips_empty_batches() {
        let mut watcher = MutationWatcher::new();
        watcher.enqueue(Stream::Content, MutationBatch::new(vec![Mutation::ChildAdded(1)]));
        watcher.enqueue(Stream::Menu, MutationBatch::default());
        watcher.enqueue(Stream::Menu, MutationBatch::new(vec![Mutation::ChildAdded(2)]));
        assert_eq!(watcher.pending(), 2);

        let (stream, batch) = watcher.next_batch().unwrap();
        assert_eq!(stream, Stream::Content);
        assert_eq!(batch.records, vec![Mutation::ChildAdded(1)]);
        let (stream, _) = watcher.next_batch().unwrap();
        assert_eq!(stream, Stream::Menu);
        assert!(watcher.next_batch().is_none());
    }

    #[test]
    fn test_scan_applies_existing_override() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "42")]);
        let text = dom.text(&div, "hello");

        let cfg = EngineConfig::default();
        let store = store_with(&[("42", "bye")]);
        let scanner = Scanner::new(&dom, &cfg, &store);
        assert_eq!(
            scanner.scan(&text),
            ScanOutcome::Applied {
                id: MessageId::new("42"),
                writes: 1
            }
        );
        assert_eq!(scanner.scan(&text), ScanOutcome::AlreadyApplied(MessageId::new("42")));
    }

    #[test]
    fn test_scan_without_override_is_noop() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "1")]);
        let text = dom.text(&div, "original");

        let cfg = EngineConfig::default();
        let store = store_with(&[("2", "other")]);
        let scanner = Scanner::new(&dom, &cfg, &store);
        assert_eq!(scanner.scan(&text), ScanOutcome::NoOverride(MessageId::new("1")));
        assert_eq!(dom.text_writes(), 0);
    }

    #[test]
    fn test_host_rerender_in_same_element_is_reapplied() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "42")]);
        let text = dom.text(&div, "hello");

        let cfg = EngineConfig::default();
        let store = store_with(&[("42", "bye")]);
        let scanner = Scanner::new(&dom, &cfg, &store);
        scanner.scan(&text);

        dom.host_set_text(&text, "hello");
        assert!(scanner.scan(&text).is_applied());
        assert_eq!(dom.text_content(&div), "bye");
    }

    #[test]
    fn test_editable_regions_are_ignored() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let div = dom.element(&root, "div", &[("data-message-id", "42")]);
        let editor = dom.element(&div, "div", &[("contenteditable", "true")]);
        let draft = dom.text(&editor, "typing");

        let cfg = EngineConfig::default();
        let store = store_with(&[("42", "bye")]);
        let scanner = Scanner::new(&dom, &cfg, &store);
        assert_eq!(scanner.scan(&draft), ScanOutcome::Ignored);
        assert_eq!(dom.text_data(&draft).as_deref(), Some("typing"));
    }

    #[test]
    fn test_scan_subtree_finds_messages_in_inserted_chunk() {
        let dom = FakeDom::new();
        let root = dom.root_node();
        let chunk = dom.element(&root, "ol", &[]);
        let first = dom.element(&chunk, "li", &[("data-message-id", "1")]);
        dom.text(&first, "one");
        let second = dom.element(&chunk, "li", &[("data-message-id", "2")]);
        dom.text(&second, "two");

        let cfg = EngineConfig::default();
        let store = store_with(&[("2", "TWO")]);
        let scanner = Scanner::new(&dom, &cfg, &store);
        let outcomes = scanner.scan_subtree(&chunk);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], ScanOutcome::NoOverride(MessageId::new("1")));
        assert!(outcomes[1].is_applied());
        assert_eq!(dom.text_content(&second), "TWO");
        assert_eq!(dom.text_content(&first), "one");
    }
}
