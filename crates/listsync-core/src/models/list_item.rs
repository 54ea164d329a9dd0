//! List item record with dirty tracking.
//!
//! A list item links a parent entity to a referenced entity of some domain.
//! Setters only flag the item as modified when the value actually changes, so
//! saving an item rewritten with identical values is free.

use crate::config::ListConfig;
use crate::error::{ListSyncError, Result};
use crate::mapping::FieldMap;
use crate::models::{ItemId, TypeId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordering scope of list items: positions are dense per group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListGroup {
    pub parent_id: ItemId,
    pub domain: String,
    pub type_id: TypeId,
}

/// Plain field set of a list item as held by a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord {
    pub id: Option<ItemId>,
    pub parent_id: Option<ItemId>,
    pub ref_id: Option<ItemId>,
    pub domain: String,
    pub type_id: Option<TypeId>,
    pub type_code: Option<String>,
    pub ref_code: Option<String>,
    pub position: u32,
    pub date_start: Option<NaiveDateTime>,
    pub date_end: Option<NaiveDateTime>,
    pub config: Map<String, Value>,
    pub status: i32,
    pub time_created: Option<String>,
    pub time_modified: Option<String>,
    pub editor: Option<String>,
}

/// Association between a parent and a referenced entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    values: ListRecord,
    modified: bool,
}

impl Default for ListItem {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ListRecord> for ListItem {
    /// Wrap a record loaded from a store; the item starts unmodified.
    fn from(values: ListRecord) -> Self {
        Self {
            values,
            modified: false,
        }
    }
}

impl ListItem {
    /// Create an unsaved list item with default values.
    pub fn new() -> Self {
        Self {
            values: ListRecord {
                status: ListConfig::DEFAULT_STATUS,
                ..ListRecord::default()
            },
            modified: true,
        }
    }

    pub fn record(&self) -> &ListRecord {
        &self.values
    }

    pub fn id(&self) -> Option<ItemId> {
        self.values.id
    }

    pub fn parent_id(&self) -> Option<ItemId> {
        self.values.parent_id
    }

    pub fn set_parent_id(&mut self, id: ItemId) {
        if self.values.parent_id != Some(id) {
            self.values.parent_id = Some(id);
            self.modified = true;
        }
    }

    pub fn ref_id(&self) -> Option<ItemId> {
        self.values.ref_id
    }

    pub fn set_ref_id(&mut self, id: ItemId) {
        if self.values.ref_id != Some(id) {
            self.values.ref_id = Some(id);
            // The cached code belongs to the previous reference.
            self.values.ref_code = None;
            self.modified = true;
        }
    }

    /// Code of the referenced entity as loaded by the store.
    pub fn ref_code(&self) -> Option<&str> {
        self.values.ref_code.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.values.domain
    }

    pub fn set_domain(&mut self, domain: &str) {
        if self.values.domain != domain {
            self.values.domain = domain.to_string();
            self.modified = true;
        }
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.values.type_id
    }

    pub fn set_type_id(&mut self, id: TypeId) {
        if self.values.type_id != Some(id) {
            self.values.type_id = Some(id);
            self.values.type_code = None;
            self.modified = true;
        }
    }

    /// Code of the list type as loaded by the store.
    pub fn type_code(&self) -> Option<&str> {
        self.values.type_code.as_deref()
    }

    pub fn position(&self) -> u32 {
        self.values.position
    }

    pub fn set_position(&mut self, position: u32) {
        if self.values.position != position {
            self.values.position = position;
            self.modified = true;
        }
    }

    pub fn date_start(&self) -> Option<NaiveDateTime> {
        self.values.date_start
    }

    pub fn set_date_start(&mut self, date: Option<NaiveDateTime>) {
        if self.values.date_start != date {
            self.values.date_start = date;
            self.modified = true;
        }
    }

    pub fn date_end(&self) -> Option<NaiveDateTime> {
        self.values.date_end
    }

    pub fn set_date_end(&mut self, date: Option<NaiveDateTime>) {
        if self.values.date_end != date {
            self.values.date_end = date;
            self.modified = true;
        }
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.values.config
    }

    pub fn set_config(&mut self, config: Map<String, Value>) {
        if self.values.config != config {
            self.values.config = config;
            self.modified = true;
        }
    }

    pub fn status(&self) -> i32 {
        self.values.status
    }

    pub fn set_status(&mut self, status: i32) {
        if self.values.status != status {
            self.values.status = status;
            self.modified = true;
        }
    }

    pub fn time_created(&self) -> Option<&str> {
        self.values.time_created.as_deref()
    }

    pub fn time_modified(&self) -> Option<&str> {
        self.values.time_modified.as_deref()
    }

    pub fn editor(&self) -> Option<&str> {
        self.values.editor.as_deref()
    }

    /// Whether the item differs from its stored state.
    pub fn is_modified(&self) -> bool {
        self.modified || self.values.id.is_none()
    }

    /// Ordering group, available once parent and type are set.
    pub fn group(&self) -> Option<ListGroup> {
        Some(ListGroup {
            parent_id: self.values.parent_id?,
            domain: self.values.domain.clone(),
            type_id: self.values.type_id?,
        })
    }

    /// Record the store-owned fields after a successful save.
    pub fn mark_saved(
        &mut self,
        id: ItemId,
        time_created: String,
        time_modified: String,
        editor: String,
    ) {
        self.values.id = Some(id);
        self.values.time_created = Some(time_created);
        self.values.time_modified = Some(time_modified);
        self.values.editor = Some(editor);
        self.modified = false;
    }

    /// Check the field combination a store is about to persist.
    pub fn validate(&self) -> Result<()> {
        if self.values.parent_id.is_none() {
            return Err(ListSyncError::validation("parent_id", "parent is not set"));
        }
        if self.values.ref_id.is_none() {
            return Err(ListSyncError::validation("ref_id", "reference is not set"));
        }
        if self.values.type_id.is_none() {
            return Err(ListSyncError::validation("type_id", "list type is not set"));
        }
        if self.values.domain.is_empty() {
            return Err(ListSyncError::validation("domain", "domain is empty"));
        }
        if let (Some(start), Some(end)) = (self.values.date_start, self.values.date_end) {
            if start > end {
                return Err(ListSyncError::validation(
                    "date_end",
                    format!("validity ends ({}) before it starts ({})", end, start),
                ));
            }
        }
        Ok(())
    }

    /// Set the values found in `fields` whose keys start with `prefix`.
    ///
    /// Handles `position`, `status`, `datestart`, `dateend` and `config`.
    /// Returns every entry it did not consume.
    pub fn apply_fields(&mut self, prefix: &str, fields: &FieldMap) -> Result<FieldMap> {
        let mut unknown = FieldMap::new();

        for (key, value) in fields {
            let Some(field) = key.strip_prefix(prefix) else {
                unknown.insert(key.clone(), value.clone());
                continue;
            };

            match field {
                "position" => self.set_position(parse_number(key, value)?),
                "status" => self.set_status(parse_number(key, value)?),
                "datestart" => self.set_date_start(parse_date(key, value)?),
                "dateend" => self.set_date_end(parse_date(key, value)?),
                "config" => self.set_config(parse_config(key, value)?),
                _ => {
                    unknown.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(unknown)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ListSyncError::validation(key, format!("\"{}\" is not a valid number", value)))
}

/// Parse an optional date; empty means "no bound".
pub fn parse_date(key: &str, value: &str) -> Result<Option<NaiveDateTime>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, ListConfig::DATE_FORMAT)
        .map(Some)
        .map_err(|_| {
            ListSyncError::validation(
                key,
                format!("\"{}\" does not match YYYY-MM-DD HH:MM:SS", value),
            )
        })
}

fn parse_config(key: &str, value: &str) -> Result<Map<String, Value>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(ListSyncError::validation(key, "config must be a JSON object")),
    }
}
