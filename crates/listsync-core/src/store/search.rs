//! Typed search criteria for list items.

use crate::models::{ItemId, ListGroup, TypeId};

/// Criteria for [`ListStore::search`](super::ListStore::search).
///
/// Unset fields do not restrict the result. Results are always ordered by
/// position, ties by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSearch {
    pub parent_id: Option<ItemId>,
    pub domains: Option<Vec<String>>,
    pub type_codes: Option<Vec<String>>,
    pub type_id: Option<TypeId>,
    pub ref_id: Option<ItemId>,
    pub status: Option<i32>,
    pub editor: Option<String>,
    /// Offset and maximum number of items.
    pub slice: Option<(usize, usize)>,
}

impl ListSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria selecting exactly one ordering group.
    pub fn for_group(group: &ListGroup) -> Self {
        Self::new()
            .parent(group.parent_id)
            .domain(&group.domain)
            .type_id(group.type_id)
    }

    pub fn parent(mut self, id: ItemId) -> Self {
        self.parent_id = Some(id);
        self
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domains = Some(vec![domain.to_string()]);
        self
    }

    pub fn domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to the given list type codes; `None` keeps all types.
    pub fn type_codes(mut self, codes: Option<Vec<String>>) -> Self {
        self.type_codes = codes;
        self
    }

    pub fn type_id(mut self, id: TypeId) -> Self {
        self.type_id = Some(id);
        self
    }

    pub fn ref_id(mut self, id: ItemId) -> Self {
        self.ref_id = Some(id);
        self
    }

    pub fn status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn editor(mut self, editor: &str) -> Self {
        self.editor = Some(editor.to_string());
        self
    }

    pub fn slice(mut self, start: usize, size: usize) -> Self {
        self.slice = Some((start, size));
        self
    }
}
