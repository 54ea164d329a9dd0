//! Centralized configuration for listsync.
//!
//! Fixed parameters live in constant holder structs; the per-processor
//! settings that differ between imports are loaded into
//! [`ListProcessorConfig`].

use crate::error::{ListSyncError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// List ordering parameters.
pub struct ListConfig;

impl ListConfig {
    /// First position of every {parent, domain, type} group.
    pub const POSITION_BASE: u32 = 1;
    /// Type code used when an import row does not declare one.
    pub const DEFAULT_TYPE: &'static str = "default";
    /// List types touched by imports unless configured otherwise.
    ///
    /// Other relations (e.g. "bought together") are usually generated by
    /// separate jobs and must survive an import.
    pub const DEFAULT_LIST_TYPES: [&'static str; 2] = ["default", "suggestion"];
    /// Status assigned to imported list items without an explicit status.
    pub const DEFAULT_STATUS: i32 = 1;
    /// Date format of the validity window and audit timestamps.
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";
}

/// SQLite store parameters.
pub struct StoreConfig;

impl StoreConfig {
    pub const BUSY_TIMEOUT_MS: u32 = 30_000;
    pub const DEFAULT_EDITOR: &'static str = "listsync";
}

/// Set of list type codes a reconcile pass may delete or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListTypeFilter {
    /// Every list type is eligible.
    All,
    /// Only the named list types are eligible.
    Only(BTreeSet<String>),
}

impl ListTypeFilter {
    pub fn only<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ListTypeFilter::Only(codes.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, code: &str) -> bool {
        match self {
            ListTypeFilter::All => true,
            ListTypeFilter::Only(codes) => codes.contains(code),
        }
    }

    /// Codes to restrict a search to, `None` for no restriction.
    pub fn codes(&self) -> Option<Vec<String>> {
        match self {
            ListTypeFilter::All => None,
            ListTypeFilter::Only(codes) => Some(codes.iter().cloned().collect()),
        }
    }
}

impl Default for ListTypeFilter {
    fn default() -> Self {
        ListTypeFilter::only(ListConfig::DEFAULT_LIST_TYPES)
    }
}

// `null` in configuration files means "all types".
impl Serialize for ListTypeFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.codes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ListTypeFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let codes: Option<Vec<String>> = Option::deserialize(deserializer)?;
        Ok(match codes {
            None => ListTypeFilter::All,
            Some(codes) => ListTypeFilter::only(codes),
        })
    }
}

/// Settings of one list processor in an import chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListProcessorConfig {
    /// Resource owning the lists, prefixes the list field keys.
    pub resource: String,
    /// Domain of the referenced entities, prefixes the reference code key.
    pub domain: String,
    /// List types the processor may delete or update.
    #[serde(default)]
    pub list_types: ListTypeFilter,
}

impl ListProcessorConfig {
    pub fn new(resource: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            domain: domain.into(),
            list_types: ListTypeFilter::default(),
        }
    }

    pub fn with_list_types(mut self, list_types: ListTypeFilter) -> Self {
        self.list_types = list_types;
        self
    }

    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ListSyncError::io_with_path(e, path))?;
        Self::from_json_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(ListSyncError::Config {
                message: "resource must not be empty".to_string(),
            });
        }
        if self.domain.trim().is_empty() {
            return Err(ListSyncError::Config {
                message: "domain must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Key of the list type field, e.g. `product.list.type`.
    pub fn list_key(&self, field: &str) -> String {
        format!("{}.list.{}", self.resource, field)
    }

    /// Key of the reference code field, e.g. `product.code`.
    pub fn code_key(&self) -> String {
        format!("{}.code", self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_filter_contains_default_types() {
        let filter = ListTypeFilter::default();
        assert!(filter.allows("default"));
        assert!(filter.allows("suggestion"));
        assert!(!filter.allows("bought-together"));
    }

    #[test]
    fn test_null_list_types_means_all() {
        let config = ListProcessorConfig::from_json_str(
            r#"{"resource": "product", "domain": "product", "list_types": null}"#,
        )
        .unwrap();
        assert_eq!(config.list_types, ListTypeFilter::All);
        assert!(config.list_types.allows("anything"));
    }

    #[test]
    fn test_missing_list_types_uses_default() {
        let config =
            ListProcessorConfig::from_json_str(r#"{"resource": "product", "domain": "media"}"#)
                .unwrap();
        assert_eq!(config.list_types, ListTypeFilter::default());
        assert_eq!(config.code_key(), "media.code");
        assert_eq!(config.list_key("type"), "product.list.type");
    }

    #[test]
    fn test_empty_domain_rejected() {
        let result =
            ListProcessorConfig::from_json_str(r#"{"resource": "product", "domain": " "}"#);
        assert!(matches!(result, Err(ListSyncError::Config { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("processor.json");
        std::fs::write(
            &path,
            r#"{"resource": "product", "domain": "product", "list_types": ["default"]}"#,
        )
        .unwrap();

        let config = ListProcessorConfig::load(&path).unwrap();
        assert_eq!(config.list_types, ListTypeFilter::only(["default"]));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let result = ListProcessorConfig::load(Path::new("/nonexistent/processor.json"));
        assert!(matches!(result, Err(ListSyncError::Io { path: Some(_), .. })));
    }
}
