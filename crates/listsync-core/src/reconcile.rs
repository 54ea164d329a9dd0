//! Association reconciliation for imports.
//!
//! A [`ListProcessor`] brings the list items of one parent in line with the
//! associations named by an import row. Existing items and import rows are
//! compared by ordinal: an item survives when its row names the same
//! referenced entity (or names none at all) and is reused for the next
//! surviving row; everything else is deleted up front. Positions are
//! compacted afterwards so every touched group stays dense.
//!
//! A whole pass runs in one store transaction. Any error rolls back the
//! deletions, saves and repositionings of that pass.

use crate::config::{ListConfig, ListProcessorConfig};
use crate::error::Result;
use crate::mapping::{FieldMap, FieldMapping, RawRow};
use crate::models::{ItemId, ListGroup, ListItem, ParentItem};
use crate::processor::{DoneProcessor, Processor};
use crate::resolve::{ImportRun, ReferenceResolver, TypeResolver};
use crate::sequencer::PositionSequencer;
use crate::store::{ListSearch, ListStore, TransactionGuard};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// What one reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Existing items removed because their row names another entity.
    pub deleted: usize,
    /// New items inserted.
    pub created: usize,
    /// Reused items whose fields changed.
    pub updated: usize,
    /// Reused items saved without any change.
    pub unchanged: usize,
    /// Rows ignored for a missing reference or an excluded type.
    pub skipped: usize,
    /// Items moved by the final position compaction.
    pub repositioned: usize,
    /// Columns nobody in the chain consumed.
    pub remaining: RawRow,
}

impl ReconcileOutcome {
    /// Number of list items written by the pass.
    pub fn writes(&self) -> usize {
        self.deleted + self.created + self.updated + self.repositioned
    }
}

/// Import processor for the list items of one referenced domain.
pub struct ListProcessor<'a> {
    config: ListProcessorConfig,
    mapping: FieldMapping,
    store: &'a dyn ListStore,
    types: &'a dyn TypeResolver,
    references: &'a dyn ReferenceResolver,
    next: Box<dyn Processor + 'a>,
}

impl<'a> ListProcessor<'a> {
    pub fn new(
        config: ListProcessorConfig,
        mapping: FieldMapping,
        store: &'a dyn ListStore,
        types: &'a dyn TypeResolver,
        references: &'a dyn ReferenceResolver,
    ) -> Self {
        Self {
            config,
            mapping,
            store,
            types,
            references,
            next: Box::new(DoneProcessor),
        }
    }

    /// Use one backend for storage and both code registries.
    pub fn from_store<S>(config: ListProcessorConfig, mapping: FieldMapping, store: &'a S) -> Self
    where
        S: ListStore + TypeResolver + ReferenceResolver,
    {
        Self::new(config, mapping, store, store, store)
    }

    /// Hand unconsumed columns to `next` instead of returning them.
    pub fn with_next(mut self, next: impl Processor + 'a) -> Self {
        self.next = Box::new(next);
        self
    }

    pub fn config(&self) -> &ListProcessorConfig {
        &self.config
    }

    /// Reconcile the list items of `parent` with `rows`.
    ///
    /// `rest` holds the columns that are passed on to the next processor;
    /// whatever comes back is returned in [`ReconcileOutcome::remaining`].
    pub fn reconcile(
        &self,
        run: &mut ImportRun,
        parent: &ParentItem,
        rows: &[FieldMap],
        rest: RawRow,
    ) -> Result<ReconcileOutcome> {
        let tx = TransactionGuard::begin(self.store)?;

        let outcome = self.run_pass(run, parent, rows, rest).map_err(|e| {
            warn!(
                "Rolling back {} lists of \"{}\": {}",
                self.config.domain, parent.code, e
            );
            e
        })?;

        tx.commit()?;

        info!(
            "Reconciled {} lists of \"{}\": {} deleted, {} created, {} updated, {} unchanged, {} skipped",
            self.config.domain,
            parent.code,
            outcome.deleted,
            outcome.created,
            outcome.updated,
            outcome.unchanged,
            outcome.skipped
        );
        Ok(outcome)
    }

    fn run_pass(
        &self,
        run: &mut ImportRun,
        parent: &ParentItem,
        rows: &[FieldMap],
        rest: RawRow,
    ) -> Result<ReconcileOutcome> {
        let resource = self.config.resource.as_str();
        let domain = self.config.domain.as_str();
        let code_key = self.config.code_key();
        let type_key = self.config.list_key("type");
        let prefix = self.config.list_key("");

        if resource == domain {
            run.references.set(domain, &parent.code, parent.id);
        }

        let mut outcome = ReconcileOutcome::default();

        let existing = self.store.search(
            &ListSearch::new()
                .parent(parent.id)
                .domain(domain)
                .type_codes(self.config.list_types.codes()),
        )?;
        debug!(
            "Found {} existing {} list items for \"{}\"",
            existing.len(),
            domain,
            parent.code
        );

        let mut groups: BTreeSet<ListGroup> =
            existing.iter().filter_map(ListItem::group).collect();

        let (mut kept, delete) = split_existing(existing, rows, &code_key);
        if !delete.is_empty() {
            outcome.deleted = self.store.delete_batch(&delete)?;
            debug!("Deleted {} stale {} list items", outcome.deleted, domain);
        }

        let mut slots: HashMap<&str, u32> = HashMap::new();

        for row in rows {
            let Some(code) = non_empty(row.get(&code_key)) else {
                outcome.skipped += 1;
                continue;
            };

            let type_code = match non_empty(row.get(&type_key)) {
                Some(type_code) if !self.config.list_types.allows(type_code) => {
                    debug!("Skipping \"{}\" with excluded list type \"{}\"", code, type_code);
                    outcome.skipped += 1;
                    continue;
                }
                Some(type_code) => type_code,
                None => ListConfig::DEFAULT_TYPE,
            };

            let ref_id = run.require_reference(self.references, domain, code, &parent.code)?;
            let type_id = run.types.resolve(self.types, resource, domain, type_code)?;

            let slot = slots.entry(type_code).or_insert(0);
            let position = ListConfig::POSITION_BASE + *slot;
            *slot += 1;

            let mut item = kept.pop_front().unwrap_or_else(|| self.store.create());
            let is_new = item.id().is_none();

            item.set_type_id(type_id);
            item.set_parent_id(parent.id);
            item.set_ref_id(ref_id);
            item.set_domain(domain);

            let fields = self.with_defaults(row, position);
            item.apply_fields(&prefix, &fields)?;

            if is_new {
                outcome.created += 1;
            } else if item.is_modified() {
                outcome.updated += 1;
            } else {
                outcome.unchanged += 1;
            }

            self.store.save(&mut item)?;
            groups.extend(item.group());
        }

        let sequencer = PositionSequencer::new(self.store);
        for group in &groups {
            outcome.repositioned += sequencer.compact_group(group)?;
        }

        outcome.remaining = self.next.process(run, parent, rest)?;
        Ok(outcome)
    }

    /// Row fields completed with the values of a freshly imported item.
    fn with_defaults(&self, row: &FieldMap, position: u32) -> FieldMap {
        let mut fields = row.clone();
        let defaults = [
            ("position", position.to_string()),
            ("status", ListConfig::DEFAULT_STATUS.to_string()),
            ("datestart", String::new()),
            ("dateend", String::new()),
            ("config", String::new()),
        ];
        for (field, value) in defaults {
            fields.entry(self.config.list_key(field)).or_insert(value);
        }
        fields
    }
}

impl Processor for ListProcessor<'_> {
    fn process(&self, run: &mut ImportRun, parent: &ParentItem, mut data: RawRow) -> Result<RawRow> {
        let rows = self.mapping.mapped_chunks(&mut data);
        Ok(self.reconcile(run, parent, &rows, data)?.remaining)
    }
}

/// Walk existing items and rows by ordinal.
///
/// Returns the items that may be reused, in order, and the ids to delete.
fn split_existing(
    existing: Vec<ListItem>,
    rows: &[FieldMap],
    code_key: &str,
) -> (VecDeque<ListItem>, Vec<ItemId>) {
    let mut kept = VecDeque::with_capacity(existing.len());
    let mut delete = Vec::new();

    for (idx, item) in existing.into_iter().enumerate() {
        let keep = match rows.get(idx).and_then(|row| non_empty(row.get(code_key))) {
            None => true,
            Some(code) => item.ref_code() == Some(code),
        };

        if keep {
            kept.push_back(item);
        } else if let Some(id) = item.id() {
            delete.push(id);
        }
    }

    (kept, delete)
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}
