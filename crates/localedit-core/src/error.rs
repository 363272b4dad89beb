use thiserror::Error;

/// Failures reading or writing the persisted override mapping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Local storage is unavailable")]
    Unavailable,

    #[error("Failed to read from local storage: {0}")]
    Read(String),

    #[error("Failed to write to local storage: {0}")]
    Write(String),

    #[error("Stored overrides are corrupt: {0}")]
    Corrupt(String),
}

/// Failures rewriting the visible text of a message container
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteError {
    #[error("Message container has no visible text nodes")]
    NoTextNodes,

    #[error("Message container is no longer attached to the document")]
    Detached,
}

/// Failures resolving which message a menu action refers to
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("Could not determine which message this menu belongs to")]
    NoMessageContext,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LocalEditError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
