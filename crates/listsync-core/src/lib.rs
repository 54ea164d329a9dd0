//! listsync - association reconciliation and position sequencing for imports.
//!
//! A parent entity (e.g. a product) owns ordered, typed lists of links to
//! other entities. Imports describe the desired links per parent as rows of
//! codes; [`ListProcessor`] turns the stored links into that state with the
//! fewest writes, and [`PositionSequencer`] keeps positions dense when items
//! are moved by hand.
//!
//! # Example
//!
//! ```rust,ignore
//! use listsync_core::{
//!     FieldMapping, ImportRun, ListProcessor, ListProcessorConfig, ParentItem, Processor,
//!     SqliteStore,
//! };
//!
//! fn main() -> listsync_core::Result<()> {
//!     let store = SqliteStore::open_at("lists.db".as_ref(), "product")?;
//!     let processor = ListProcessor::from_store(
//!         ListProcessorConfig::new("product", "product"),
//!         FieldMapping::consecutive(2, ["product.code", "product.list.type"]),
//!         &store,
//!     );
//!
//!     let mut run = ImportRun::new();
//!     let parent = ParentItem::new(store.entity_id("product", "U:TEST")?.unwrap(), "U:TEST");
//!     let remaining = processor.process(&mut run, &parent, row)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mapping;
pub mod models;
pub mod processor;
pub mod reconcile;
pub mod resolve;
pub mod sequencer;
pub mod store;

// Re-export commonly used types
pub use config::{ListConfig, ListProcessorConfig, ListTypeFilter, StoreConfig};
pub use error::{ListSyncError, Result};
pub use mapping::{FieldMap, FieldMapping, RawRow};
pub use models::{ItemId, ListGroup, ListItem, ListRecord, ParentItem, TypeId};
pub use processor::{DoneProcessor, Processor};
pub use reconcile::{ListProcessor, ReconcileOutcome};
pub use resolve::{ImportRun, ReferenceCache, ReferenceResolver, TypeCache, TypeResolver};
pub use sequencer::{PositionSequencer, PositionUpdate};
pub use store::{ListSearch, ListStore, SqliteStore, TransactionGuard};
