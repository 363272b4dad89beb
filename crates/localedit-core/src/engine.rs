//! The local-edit engine
//!
//! One `LocalEdit` per session owns the DOM adapter, the override store and
//! the prompter, and ties the components together behind an explicit
//! start/stop lifecycle. Every failure inside is logged and absorbed here,
//! so nothing the engine does can break the host page.

use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::dom::{
    descendants, DomAdapter, MenuAction, Mutation, MutationBatch, Stream, Subscription,
};
use crate::error::StorageError;
use crate::identity::{Identified, IdentityDeriver, MessageId};
use crate::menu::{MenuInjector, Prompter};
use crate::rewriter::{Snapshot, TextRewriter};
use crate::store::{KeyValueStorage, OverrideStore};
use crate::watcher::{MutationWatcher, ScanOutcome, Scanner};

const PROMPT_MESSAGE: &str =
    "Replacement text (only visible on this device). Leave blank to clear.";

/// Totals for one or more processed batches
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub records: usize,
    pub applied: usize,
    pub failed: usize,
    pub menus_enhanced: usize,
}

/// Result of activating one of the injected menu rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Modified(MessageId),
    Cleared(MessageId),
    Cancelled,
    /// The menu could not be tied to a message; the user was notified
    NoContext,
}

pub struct LocalEdit<D: DomAdapter, S, P> {
    dom: D,
    store: OverrideStore<S>,
    prompter: P,
    config: EngineConfig,
    watcher: MutationWatcher<D::Node>,
    subscriptions: Vec<Box<dyn Subscription>>,
    originals: Vec<Snapshot<D::Node>>,
    running: bool,
}

impl<D, S, P> LocalEdit<D, S, P>
where
    D: DomAdapter,
    S: KeyValueStorage,
    P: Prompter,
{
    pub fn new(dom: D, storage: S, prompter: P, config: EngineConfig) -> Self {
        let store = OverrideStore::new(storage, config.storage_key.clone());
        Self {
            dom,
            store,
            prompter,
            config,
            watcher: MutationWatcher::new(),
            subscriptions: Vec::new(),
            originals: Vec::new(),
            running: false,
        }
    }

    /// Load overrides, take ownership of the observation streams and apply
    /// every stored override already on screen
    pub fn start(&mut self, subscriptions: Vec<Box<dyn Subscription>>) {
        if self.running {
            self.disconnect();
        }
        if let Err(e) = self.store.load_all() {
            warn!(error = %e, "Could not load local overrides; starting empty");
        }
        self.subscriptions = subscriptions;
        self.running = true;
        let applied = self.apply_all();
        info!(overrides = self.store.len(), applied, "Local edit started");
    }

    /// Disconnect both streams, put back host text and ask the host to redraw
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.disconnect();
        self.watcher.clear();

        let rewriter = TextRewriter::new(&self.dom, &self.config);
        for snapshot in std::mem::take(&mut self.originals) {
            if let Err(e) = rewriter.restore(&snapshot) {
                trace!(error = %e, "Skipped restoring a message that is gone");
            }
        }
        let cleared = self.clear_processed_markers();
        self.dom.request_rerender();
        info!(cleared, "Local edit stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn disconnect(&mut self) {
        for mut subscription in self.subscriptions.drain(..) {
            subscription.disconnect();
        }
    }

    /// Remove the processed marker and the recorded message id everywhere
    fn clear_processed_markers(&self) -> usize {
        let Some(root) = self.dom.root() else {
            return 0;
        };
        let marked: Vec<D::Node> = std::iter::once(root.clone())
            .chain(descendants(&self.dom, &root))
            .filter(|node| {
                self.dom
                    .attribute(node, &self.config.processed_attribute)
                    .is_some()
            })
            .collect();
        let rewriter = TextRewriter::new(&self.dom, &self.config);
        for node in &marked {
            self.dom
                .remove_attribute(node, &self.config.processed_attribute);
            rewriter.forget_applied_id(node);
        }
        marked.len()
    }

    /// Queue a batch from one of the streams and process everything queued
    ///
    /// Batches arriving while stopped are dropped.
    pub fn submit(&mut self, stream: Stream, batch: MutationBatch<D::Node>) -> BatchReport {
        if !self.running {
            return BatchReport::default();
        }
        self.watcher.enqueue(stream, batch);

        let mut report = BatchReport::default();
        while let Some((stream, batch)) = self.watcher.next_batch() {
            for record in batch.records {
                report.records += 1;
                match stream {
                    Stream::Content => {
                        for outcome in self.scan_record(&record) {
                            match outcome {
                                ScanOutcome::Applied { .. } => report.applied += 1,
                                ScanOutcome::Failed { id, error } => {
                                    report.failed += 1;
                                    debug!(
                                        message_id = %id,
                                        error = %error,
                                        "Could not re-apply override"
                                    );
                                }
                                _ => {}
                            }
                        }
                    }
                    Stream::Menu => {
                        if let Mutation::ChildAdded(node) = &record {
                            report.menus_enhanced +=
                                MenuInjector::new(&self.dom, &self.config).enhance(node);
                        }
                    }
                }
            }
        }
        report
    }

    fn scan_record(&mut self, record: &Mutation<D::Node>) -> Vec<ScanOutcome> {
        match record {
            Mutation::ChildAdded(node) => {
                self.remember_originals(node);
                Scanner::new(&self.dom, &self.config, &self.store).scan_subtree(node)
            }
            Mutation::CharacterData(node) => match self.dom.parent_element(node) {
                Some(parent) => {
                    self.remember_originals(&parent);
                    vec![Scanner::new(&self.dom, &self.config, &self.store).scan(&parent)]
                }
                None => vec![ScanOutcome::NoIdentity],
            },
        }
    }

    /// Capture host text for overridden messages at or under `node` before
    /// the scan rewrites them
    fn remember_originals(&mut self, node: &D::Node) {
        let deriver = IdentityDeriver::new(&self.dom, &self.config);
        let containers: Vec<D::Node> = match deriver.find_container(node) {
            Some(container) => vec![container],
            None => descendants(&self.dom, node)
                .filter(|n| deriver.is_container(n))
                .collect(),
        };
        for container in containers {
            self.remember_original(&container);
        }
    }

    fn remember_original(&mut self, container: &D::Node) {
        let deriver = IdentityDeriver::new(&self.dom, &self.config);
        let id = deriver.derive(container);
        let Some(text) = self.store.get(&id) else {
            return;
        };
        let rewriter = TextRewriter::new(&self.dom, &self.config);
        if rewriter.shows(container, text) {
            return;
        }

        self.originals.retain(|s| rewriter.is_live(s) && s.container != *container);
        self.originals.push(rewriter.snapshot(container));
    }

    /// Apply stored overrides to every message container in the document
    pub fn apply_all(&mut self) -> usize {
        let Some(root) = self.dom.root() else {
            return 0;
        };
        self.remember_originals(&root);
        Scanner::new(&self.dom, &self.config, &self.store)
            .scan_containers_under(&root)
            .iter()
            .filter(|outcome| outcome.is_applied())
            .count()
    }

    /// Run one of the injected menu actions for the menu it was attached to
    pub fn handle_menu_action(&mut self, action: MenuAction, menu: &D::Node) -> MenuOutcome {
        let context = match MenuInjector::new(&self.dom, &self.config).resolve_context(menu) {
            Ok(context) => self.applied_identity(context),
            Err(e) => {
                self.prompter.notify(&e.to_string());
                return MenuOutcome::NoContext;
            }
        };
        match action {
            MenuAction::Modify => self.modify(context),
            MenuAction::Clear => self.clear(context),
        }
    }

    /// Prefer the id an on-screen override was applied under
    ///
    /// A synthesized id derived now would hash the override text, not the
    /// host's, and miss the stored entry.
    fn applied_identity(&self, mut context: Identified<D::Node>) -> Identified<D::Node> {
        let rewriter = TextRewriter::new(&self.dom, &self.config);
        let Some(applied) = rewriter.applied_id(&context.container) else {
            return context;
        };
        let on_screen = self
            .store
            .get(&applied)
            .is_some_and(|text| rewriter.shows(&context.container, text));
        if on_screen && applied != context.id {
            trace!(derived = %context.id, applied = %applied, "Using recorded message id");
            context.id = applied;
        }
        context
    }

    fn modify(&mut self, context: Identified<D::Node>) -> MenuOutcome {
        let initial = match self.store.get(&context.id) {
            Some(text) => text.to_string(),
            None => IdentityDeriver::new(&self.dom, &self.config).extract_text(&context.container),
        };
        let Some(input) = self.prompter.prompt(PROMPT_MESSAGE, &initial) else {
            return MenuOutcome::Cancelled;
        };
        if input.trim().is_empty() {
            return self.clear(context);
        }

        if let Err(e) = self.set_override(context.id.clone(), &input) {
            debug!(message_id = %context.id, error = %e, "Override kept for this session only");
        }
        self.remember_original(&context.container);
        let rewriter = TextRewriter::new(&self.dom, &self.config);
        if let Err(e) = rewriter.apply_override(&context.container, &context.id, &input) {
            debug!(message_id = %context.id, error = %e, "Override stored but not shown");
        }
        MenuOutcome::Modified(context.id)
    }

    fn clear(&mut self, context: Identified<D::Node>) -> MenuOutcome {
        if let Err(e) = self.remove_override(&context.id) {
            debug!(message_id = %context.id, error = %e, "Removal kept for this session only");
        }

        let rewriter = TextRewriter::new(&self.dom, &self.config);
        rewriter.forget_applied_id(&context.container);
        let position = self
            .originals
            .iter()
            .position(|s| s.container == context.container);
        let restored = match position {
            Some(index) => rewriter.restore(&self.originals.remove(index)),
            None => rewriter.apply(&context.container, None),
        };
        if let Err(e) = restored {
            debug!(message_id = %context.id, error = %e, "Could not restore message text");
        }
        MenuOutcome::Cleared(context.id)
    }

    pub fn override_for(&self, id: &MessageId) -> Option<&str> {
        self.store.get(id)
    }

    /// Store an override; the in-memory value holds even if persisting fails
    pub fn set_override(&mut self, id: MessageId, text: &str) -> Result<(), StorageError> {
        debug!(message_id = %id, "Setting local override");
        self.store.set(id, text)
    }

    pub fn remove_override(&mut self, id: &MessageId) -> Result<Option<String>, StorageError> {
        debug!(message_id = %id, "Removing local override");
        self.store.remove(id)
    }

    /// Forget every override
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.store.clear()
    }

    pub fn store(&self) -> &OverrideStore<S> {
        &self.store
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
