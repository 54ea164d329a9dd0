//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a list item or a referenced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered list type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub i64);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Already persisted entity owning a set of list items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentItem {
    pub id: ItemId,
    /// Business code, used in error messages and for self references.
    pub code: String,
}

impl ParentItem {
    pub fn new(id: ItemId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}
