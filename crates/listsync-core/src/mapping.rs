//! Column mapping for import rows.
//!
//! An import row arrives as a map of column position to value. A processor's
//! [`FieldMapping`] names the columns it owns; repeating the same field name
//! starts the next association, so `[code, type, code, type]` describes two
//! related items per row.

use std::collections::{BTreeMap, HashSet};

/// Logical field name to value, one per prospective association.
pub type FieldMap = BTreeMap<String, String>;

/// Column position to raw value of one import row.
pub type RawRow = BTreeMap<usize, String>;

/// Column position to logical field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    columns: BTreeMap<usize, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the given field names onto consecutive columns starting at `first`.
    pub fn consecutive<I, S>(first: usize, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = keys
            .into_iter()
            .enumerate()
            .map(|(offset, key)| (first + offset, key.into()))
            .collect();
        Self { columns }
    }

    pub fn with_column(mut self, position: usize, key: impl Into<String>) -> Self {
        self.columns.insert(position, key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Move the mapped columns out of `data` and group them per association.
    ///
    /// Every group of the mapping yields one field map, even when all of its
    /// columns are missing from `data`, so ordinals always line up with the
    /// mapping. Unmapped columns stay in `data` for the next processor.
    pub fn mapped_chunks(&self, data: &mut RawRow) -> Vec<FieldMap> {
        let mut chunks: Vec<FieldMap> = Vec::new();
        let mut current = FieldMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for (position, key) in &self.columns {
            if !seen.insert(key.as_str()) {
                chunks.push(std::mem::take(&mut current));
                seen.clear();
                seen.insert(key.as_str());
            }
            if let Some(value) = data.remove(position) {
                current.insert(key.clone(), value);
            }
        }

        if !seen.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[(usize, &str)]) -> RawRow {
        values
            .iter()
            .map(|(pos, value)| (*pos, value.to_string()))
            .collect()
    }

    #[test]
    fn test_repeated_key_starts_new_chunk() {
        let mapping = FieldMapping::consecutive(
            2,
            ["product.code", "product.list.type", "product.code", "product.list.type"],
        );
        let mut data = raw(&[
            (0, "U:TEST"),
            (1, "Test product"),
            (2, "CNC"),
            (3, "default"),
            (4, "CNE"),
            (5, "suggestion"),
        ]);

        let chunks = mapping.mapped_chunks(&mut data);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0]["product.code"], "CNC");
        assert_eq!(chunks[1]["product.list.type"], "suggestion");
        assert_eq!(data, raw(&[(0, "U:TEST"), (1, "Test product")]));
    }

    #[test]
    fn test_missing_columns_leave_field_unset() {
        let mapping =
            FieldMapping::consecutive(0, ["product.code", "product.list.type", "product.code"]);
        let mut data = raw(&[(0, "CNC"), (2, "CNE")]);

        let chunks = mapping.mapped_chunks(&mut data);

        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].contains_key("product.list.type"));
        assert_eq!(chunks[1]["product.code"], "CNE");
        assert!(data.is_empty());
    }

    #[test]
    fn test_fully_missing_group_keeps_its_ordinal() {
        let mapping = FieldMapping::consecutive(
            0,
            ["product.code", "product.list.type", "product.code", "product.list.type"],
        );
        let mut data = raw(&[(1, "default"), (2, "CNE")]);

        let chunks = mapping.mapped_chunks(&mut data);

        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].contains_key("product.code"));
        assert_eq!(chunks[1]["product.code"], "CNE");

        let mut empty = RawRow::new();
        let chunks = mapping.mapped_chunks(&mut empty);
        assert_eq!(chunks, vec![FieldMap::new(), FieldMap::new()]);
    }

    #[test]
    fn test_empty_values_are_kept() {
        let mapping = FieldMapping::new().with_column(0, "product.code");
        let mut data = raw(&[(0, "")]);

        let chunks = mapping.mapped_chunks(&mut data);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0]["product.code"], "");
    }

    #[test]
    fn test_empty_mapping_consumes_nothing() {
        let mapping = FieldMapping::new();
        let mut data = raw(&[(0, "a"), (1, "b")]);

        assert!(mapping.mapped_chunks(&mut data).is_empty());
        assert_eq!(data.len(), 2);
    }
}
