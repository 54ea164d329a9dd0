//! Import processor chain.
//!
//! Each processor takes the columns it understands out of a raw import row,
//! stores them for the parent, and hands the rest to the next processor. The
//! columns nobody consumed come back to the caller.

use crate::error::Result;
use crate::mapping::RawRow;
use crate::models::ParentItem;
use crate::resolve::ImportRun;

/// One link of an import processor chain.
pub trait Processor {
    /// Store the data of `data` belonging to this processor for `parent`.
    ///
    /// Returns the columns that were not consumed by this processor or any
    /// processor after it.
    fn process(&self, run: &mut ImportRun, parent: &ParentItem, data: RawRow) -> Result<RawRow>;
}

impl<P: Processor + ?Sized> Processor for Box<P> {
    fn process(&self, run: &mut ImportRun, parent: &ParentItem, data: RawRow) -> Result<RawRow> {
        (**self).process(run, parent, data)
    }
}

/// End of a processor chain, returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DoneProcessor;

impl Processor for DoneProcessor {
    fn process(&self, _run: &mut ImportRun, _parent: &ParentItem, data: RawRow) -> Result<RawRow> {
        Ok(data)
    }
}
