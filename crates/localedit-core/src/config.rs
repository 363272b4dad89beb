//! Engine configuration
//!
//! Every field has a default, so hosts only need to supply what they want
//! to change. Configuration arrives as JSON (from the plugin host or a JS
//! object converted by the wasm binding).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for identity derivation, marker attributes, storage and menu labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Local storage slot holding the serialized override mapping
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Attribute set on containers once their override has been applied
    #[serde(default = "default_processed_attribute")]
    pub processed_attribute: String,
    /// Attribute recording which message id an applied override belongs to
    #[serde(default = "default_applied_id_attribute")]
    pub applied_id_attribute: String,
    /// Attribute set on menus that already carry our actions
    #[serde(default = "default_enhanced_attribute")]
    pub enhanced_attribute: String,
    /// How many ancestor levels to climb looking for a message container (default: 10)
    #[serde(default = "default_container_search_depth")]
    pub container_search_depth: usize,
    /// How many ancestor levels a menu action climbs to find its message (default: 12)
    #[serde(default = "default_context_search_depth")]
    pub context_search_depth: usize,
    /// Text prefix length hashed into synthesized identifiers, in UTF-16 units (default: 200)
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,
    #[serde(default = "default_modify_label")]
    pub modify_label: String,
    #[serde(default = "default_clear_label")]
    pub clear_label: String,
    /// Author token used when no author can be detected
    #[serde(default = "default_unknown_author")]
    pub unknown_author: String,
}

fn default_storage_key() -> String {
    "localedit.overrides".to_string()
}

fn default_processed_attribute() -> String {
    "data-localedit-processed".to_string()
}

fn default_applied_id_attribute() -> String {
    "data-localedit-id".to_string()
}

fn default_enhanced_attribute() -> String {
    "data-localedit-enhanced".to_string()
}

fn default_container_search_depth() -> usize {
    10
}

fn default_context_search_depth() -> usize {
    12
}

fn default_snippet_length() -> usize {
    200
}

fn default_modify_label() -> String {
    "Modify message (local)".to_string()
}

fn default_clear_label() -> String {
    "Clear local modification".to_string()
}

fn default_unknown_author() -> String {
    "unknown".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            processed_attribute: default_processed_attribute(),
            applied_id_attribute: default_applied_id_attribute(),
            enhanced_attribute: default_enhanced_attribute(),
            container_search_depth: default_container_search_depth(),
            context_search_depth: default_context_search_depth(),
            snippet_length: default_snippet_length(),
            modify_label: default_modify_label(),
            clear_label: default_clear_label(),
            unknown_author: default_unknown_author(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a (possibly partial) JSON object
    ///
    /// # Example
    ///
    /// ```
    /// use localedit_core::EngineConfig;
    ///
    /// let config = EngineConfig::from_json(r#"{"storage_key": "my-overrides"}"#).unwrap();
    /// assert_eq!(config.storage_key, "my-overrides");
    /// assert_eq!(config.container_search_depth, 10);
    /// ```
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }
}
