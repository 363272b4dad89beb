//! Local message overrides for chat web clients
//!
//! This crate provides the platform-independent engine that lets a user
//! replace the displayed text of chat messages on their own device, without
//! touching anything server-side.
//!
//! ## Architecture
//!
//! - `identity`: maps a DOM node to the logical message it belongs to
//! - `rewriter`: swaps a message's visible text for an override and back
//! - `watcher`: re-applies overrides as the host re-renders
//! - `menu`: adds "modify" / "clear" rows to host context menus
//! - `store`: the override map, persisted as JSON in key-value storage
//! - `engine`: `LocalEdit`, which owns all of the above behind start/stop
//! - `host`: alternative edit path for hosts that expose their message store
//!
//! The DOM, storage and prompts are traits (`DomAdapter`, `KeyValueStorage`,
//! `Prompter`); the `localedit-wasm` crate implements them on `web-sys`.

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod host;
pub mod identity;
pub mod menu;
pub mod rewriter;
pub mod store;
pub mod watcher;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::EngineConfig;
pub use dom::{
    DomAdapter, MenuAction, MenuItem, Mutation, MutationBatch, NodeKind, Stream, Subscription,
};
pub use engine::{BatchReport, LocalEdit, MenuOutcome};
pub use error::{ConfigError, ContextError, LocalEditError, RewriteError, StorageError};
pub use host::{HostAuthor, HostEditOutcome, HostEditSession, HostMessage, HostMessenger};
pub use identity::{hash_snippet, Identified, IdentityDeriver, MessageId};
pub use menu::{MenuInjector, Prompter};
pub use rewriter::TextRewriter;
pub use store::{KeyValueStorage, MemoryStorage, OverrideStore};
pub use watcher::{MutationWatcher, ScanOutcome, Scanner};
