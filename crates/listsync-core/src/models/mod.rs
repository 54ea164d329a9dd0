//! Data models for listsync.
//!
//! Identifiers, parent references and the list item record shared by the
//! store, the reconciler and the sequencer.

mod ids;
mod list_item;

pub use ids::*;
pub use list_item::*;
