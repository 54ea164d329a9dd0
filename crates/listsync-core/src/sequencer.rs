//! Position sequencing of list items.
//!
//! Positions are dense per {parent, domain, type} group and start at
//! [`ListConfig::POSITION_BASE`]. Planning is done on an ordered slice of a
//! group and yields only the positions that change; applying the plan writes
//! those items through the store.

use crate::config::ListConfig;
use crate::error::{ListSyncError, Result};
use crate::models::{ItemId, ListGroup, ListItem};
use crate::store::{ListSearch, ListStore, TransactionGuard};
use std::collections::HashMap;
use tracing::{debug, info};

/// New position for one list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub id: ItemId,
    pub position: u32,
}

/// Plan moving `id` before `before_id`, or to the end for `None`.
///
/// `group` must hold every item of one group ordered by position then id.
/// Fails with `NotFound` if `id` is not part of the group and with
/// `GroupMismatch` if `before_id` is not.
pub fn plan_move(
    group: &[ListItem],
    id: ItemId,
    before_id: Option<ItemId>,
) -> Result<Vec<PositionUpdate>> {
    let mut order: Vec<ItemId> = group.iter().filter_map(ListItem::id).collect();

    let from = order
        .iter()
        .position(|candidate| *candidate == id)
        .ok_or(ListSyncError::NotFound { id })?;
    order.remove(from);

    match before_id {
        Some(before_id) if before_id == id => order.insert(from, id),
        Some(before_id) => {
            let to = order
                .iter()
                .position(|candidate| *candidate == before_id)
                .ok_or(ListSyncError::GroupMismatch { id, before_id })?;
            order.insert(to, id);
        }
        None => order.push(id),
    }

    Ok(renumber(group, &order))
}

/// Plan dense positions for a group in its current order.
pub fn compact(group: &[ListItem]) -> Vec<PositionUpdate> {
    let order: Vec<ItemId> = group.iter().filter_map(ListItem::id).collect();
    renumber(group, &order)
}

fn renumber(group: &[ListItem], order: &[ItemId]) -> Vec<PositionUpdate> {
    let current: HashMap<ItemId, u32> = group
        .iter()
        .filter_map(|item| item.id().map(|id| (id, item.position())))
        .collect();

    order
        .iter()
        .zip(ListConfig::POSITION_BASE..)
        .filter(|(id, position)| current.get(id) != Some(position))
        .map(|(id, position)| PositionUpdate { id: *id, position })
        .collect()
}

/// Write planned positions through the store.
///
/// `group` is updated in place; returns the number of items saved.
pub fn apply_updates<S: ListStore + ?Sized>(
    store: &S,
    group: &mut [ListItem],
    updates: &[PositionUpdate],
) -> Result<usize> {
    let mut saved = 0;
    for update in updates {
        let Some(item) = group.iter_mut().find(|item| item.id() == Some(update.id)) else {
            return Err(ListSyncError::NotFound { id: update.id });
        };
        item.set_position(update.position);
        store.save(item)?;
        saved += 1;
    }
    Ok(saved)
}

/// Reorders list items within their group.
pub struct PositionSequencer<'a, S: ListStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ListStore + ?Sized> PositionSequencer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Move a list item before another one of the same group, or to the end
    /// of its group if `before_id` is `None`.
    ///
    /// Returns the number of items whose position changed.
    pub fn move_item(&self, id: ItemId, before_id: Option<ItemId>) -> Result<usize> {
        if before_id == Some(id) {
            return Ok(0);
        }

        let tx = TransactionGuard::begin(self.store)?;

        let item = self.store.get(id)?;
        let group = Self::group_of(&item)?;

        if let Some(before_id) = before_id {
            let before = self.store.get(before_id)?;
            if before.group().as_ref() != Some(&group) {
                return Err(ListSyncError::GroupMismatch { id, before_id });
            }
        }

        let mut members = self.store.search(&ListSearch::for_group(&group))?;
        let updates = plan_move(&members, id, before_id)?;
        let saved = apply_updates(self.store, &mut members, &updates)?;

        tx.commit()?;

        info!(
            "Moved list item {} {} ({} positions changed)",
            id,
            before_id.map_or_else(|| "to the end".to_string(), |b| format!("before {}", b)),
            saved
        );
        Ok(saved)
    }

    /// Renumber a group densely in its current order.
    ///
    /// Runs inside the caller's transaction.
    pub fn compact_group(&self, group: &ListGroup) -> Result<usize> {
        let mut members = self.store.search(&ListSearch::for_group(group))?;
        let updates = compact(&members);
        if updates.is_empty() {
            return Ok(0);
        }

        debug!(
            "Compacting {} positions of parent {} in domain {}",
            updates.len(),
            group.parent_id,
            group.domain
        );
        apply_updates(self.store, &mut members, &updates)
    }

    fn group_of(item: &ListItem) -> Result<ListGroup> {
        item.group().ok_or_else(|| {
            ListSyncError::validation("list item", "stored item has no parent or type")
        })
    }
}
