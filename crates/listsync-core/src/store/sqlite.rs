//! SQLite-backed list item store.

use super::{ListSearch, ListStore};
use crate::config::{ListConfig, StoreConfig};
use crate::error::{ListSyncError, Result};
use crate::models::{ItemId, ListItem, ListRecord, TypeId};
use crate::resolve::{ReferenceResolver, TypeResolver};
use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

const SELECT_ITEMS: &str = "SELECT l.id, l.parent_id, l.ref_id, l.domain, l.type_id, t.code, e.code,
        l.position, l.date_start, l.date_end, l.config_json, l.status,
        l.ctime, l.mtime, l.editor
     FROM list_items l
     LEFT JOIN list_types t ON t.id = l.type_id
     LEFT JOIN entities e ON e.id = l.ref_id AND e.domain = l.domain";

/// SQLite store for the list items of one parent resource.
///
/// Besides the list items it keeps the list type registry and the registry
/// of referenced entities, and implements [`TypeResolver`] and
/// [`ReferenceResolver`] on top of them.
///
/// Uses WAL mode for concurrent readers and `Arc<Mutex<Connection>>` for
/// thread safety within a process. Transactions are per connection, so one
/// store handle should drive one import at a time. Nested `begin` calls map
/// to savepoints inside the outer transaction.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    resource: String,
    editor: String,
    tx_depth: AtomicUsize,
}

impl SqliteStore {
    /// Open the store at a specific path for the lists of `resource`.
    ///
    /// Creates the database and parent directories if they don't exist.
    pub fn open_at(db_path: &Path, resource: &str) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ListSyncError::Io {
                    message: format!("Failed to create store directory: {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn, resource)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory(resource: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, resource)
    }

    fn from_connection(conn: Connection, resource: &str) -> Result<Self> {
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            resource: resource.to_string(),
            editor: StoreConfig::DEFAULT_EDITOR.to_string(),
            tx_depth: AtomicUsize::new(0),
        })
    }

    /// Name stamped into the editor field of saved items.
    pub fn with_editor(mut self, editor: &str) -> Self {
        self.editor = editor.to_string();
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn editor(&self) -> &str {
        &self.editor
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;\n\
             PRAGMA foreign_keys=ON;",
            StoreConfig::BUSY_TIMEOUT_MS,
        ))?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL,
                code TEXT NOT NULL,
                label TEXT NOT NULL DEFAULT '',
                UNIQUE (domain, code)
            );

            CREATE TABLE IF NOT EXISTS list_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource TEXT NOT NULL,
                domain TEXT NOT NULL,
                code TEXT NOT NULL,
                label TEXT NOT NULL DEFAULT '',
                UNIQUE (resource, domain, code)
            );

            CREATE TABLE IF NOT EXISTS list_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource TEXT NOT NULL,
                parent_id INTEGER NOT NULL,
                domain TEXT NOT NULL,
                type_id INTEGER NOT NULL REFERENCES list_types(id),
                ref_id INTEGER NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                date_start TEXT,
                date_end TEXT,
                config_json TEXT NOT NULL DEFAULT '{}',
                status INTEGER NOT NULL DEFAULT 1,
                ctime TEXT NOT NULL,
                mtime TEXT NOT NULL,
                editor TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_list_items_group
                ON list_items(resource, parent_id, domain, type_id, position);",
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ListSyncError::Database {
            message: "Failed to acquire store connection lock".to_string(),
            source: None,
        })
    }

    // ========================================
    // Registries
    // ========================================

    /// Register a list type for this resource. Idempotent: updates the label
    /// if the code already exists.
    pub fn register_type(&self, domain: &str, code: &str, label: &str) -> Result<TypeId> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO list_types (resource, domain, code, label)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(resource, domain, code) DO UPDATE SET label = excluded.label",
            params![self.resource, domain, code, label],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM list_types WHERE resource = ?1 AND domain = ?2 AND code = ?3",
            params![self.resource, domain, code],
            |row| row.get(0),
        )?;

        debug!("Registered list type {}/{}/{} as {}", self.resource, domain, code, id);
        Ok(TypeId(id))
    }

    /// Register a referenceable entity. Idempotent per (domain, code).
    pub fn insert_entity(&self, domain: &str, code: &str, label: &str) -> Result<ItemId> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO entities (domain, code, label)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(domain, code) DO UPDATE SET label = excluded.label",
            params![domain, code, label],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM entities WHERE domain = ?1 AND code = ?2",
            params![domain, code],
            |row| row.get(0),
        )?;
        Ok(ItemId(id))
    }

    /// Look up an entity id by domain and code.
    pub fn entity_id(&self, domain: &str, code: &str) -> Result<Option<ItemId>> {
        let conn = self.lock_conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM entities WHERE domain = ?1 AND code = ?2",
                params![domain, code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(ItemId))
    }

    // ========================================
    // Helpers
    // ========================================

    fn now() -> String {
        Utc::now().format(ListConfig::DATE_FORMAT).to_string()
    }

    fn format_date(date: Option<NaiveDateTime>) -> Option<String> {
        date.map(|d| d.format(ListConfig::DATE_FORMAT).to_string())
    }

    fn parse_date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
        let value: Option<String> = row.get(idx)?;
        value
            .map(|v| NaiveDateTime::parse_from_str(&v, ListConfig::DATE_FORMAT))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    /// Convert a row selected with `SELECT_ITEMS` to a list item.
    fn row_to_item(row: &Row) -> rusqlite::Result<ListItem> {
        let position: i64 = row.get(7)?;
        let position = u32::try_from(position).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Integer, Box::new(e))
        })?;
        let config_json: String = row.get(10)?;
        let config = serde_json::from_str(&config_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e))
        })?;

        Ok(ListItem::from(ListRecord {
            id: Some(ItemId(row.get(0)?)),
            parent_id: Some(ItemId(row.get(1)?)),
            ref_id: Some(ItemId(row.get(2)?)),
            domain: row.get(3)?,
            type_id: Some(TypeId(row.get(4)?)),
            type_code: row.get(5)?,
            ref_code: row.get(6)?,
            position,
            date_start: Self::parse_date_column(row, 8)?,
            date_end: Self::parse_date_column(row, 9)?,
            config,
            status: row.get(11)?,
            time_created: Some(row.get(12)?),
            time_modified: Some(row.get(13)?),
            editor: Some(row.get(14)?),
        }))
    }

    /// Build the WHERE clause and its parameters for search criteria.
    fn build_where(&self, criteria: &ListSearch) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut where_clause = String::from("WHERE l.resource = ?");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.resource.clone())];

        if let Some(parent_id) = criteria.parent_id {
            where_clause.push_str(" AND l.parent_id = ?");
            params_vec.push(Box::new(parent_id.0));
        }

        if let Some(domains) = &criteria.domains {
            push_in_clause(&mut where_clause, &mut params_vec, "l.domain", domains);
        }

        if let Some(codes) = &criteria.type_codes {
            push_in_clause(&mut where_clause, &mut params_vec, "t.code", codes);
        }

        if let Some(type_id) = criteria.type_id {
            where_clause.push_str(" AND l.type_id = ?");
            params_vec.push(Box::new(type_id.0));
        }

        if let Some(ref_id) = criteria.ref_id {
            where_clause.push_str(" AND l.ref_id = ?");
            params_vec.push(Box::new(ref_id.0));
        }

        if let Some(status) = criteria.status {
            where_clause.push_str(" AND l.status = ?");
            params_vec.push(Box::new(status));
        }

        if let Some(editor) = &criteria.editor {
            where_clause.push_str(" AND l.editor = ?");
            params_vec.push(Box::new(editor.clone()));
        }

        (where_clause, params_vec)
    }

    /// Check that a list item points at things that exist.
    fn check_references(conn: &Connection, resource: &str, record: &ListRecord) -> Result<()> {
        let (Some(ref_id), Some(type_id)) = (record.ref_id, record.type_id) else {
            return Err(ListSyncError::validation("ref_id", "reference or type is not set"));
        };

        let ref_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1 AND domain = ?2)",
            params![ref_id.0, record.domain],
            |row| row.get(0),
        )?;
        if !ref_exists {
            return Err(ListSyncError::validation(
                "ref_id",
                format!("no {} entity with id {}", record.domain, ref_id),
            ));
        }

        let type_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM list_types WHERE id = ?1 AND resource = ?2 AND domain = ?3)",
            params![type_id.0, resource, record.domain],
            |row| row.get(0),
        )?;
        if !type_exists {
            return Err(ListSyncError::validation(
                "type_id",
                format!("list type {} is not registered for {}/{}", type_id, resource, record.domain),
            ));
        }

        Ok(())
    }
}

fn push_in_clause(
    where_clause: &mut String,
    params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>,
    column: &str,
    values: &[String],
) {
    if values.is_empty() {
        where_clause.push_str(" AND 0");
        return;
    }
    let placeholders: Vec<_> = values.iter().map(|_| "?").collect();
    where_clause.push_str(&format!(" AND {} IN ({})", column, placeholders.join(",")));
    for value in values {
        params_vec.push(Box::new(value.clone()));
    }
}

impl ListStore for SqliteStore {
    fn get(&self, id: ItemId) -> Result<ListItem> {
        let conn = self.lock_conn()?;
        let sql = format!("{} WHERE l.resource = ?1 AND l.id = ?2", SELECT_ITEMS);
        conn.query_row(&sql, params![self.resource, id.0], Self::row_to_item)
            .optional()?
            .ok_or(ListSyncError::NotFound { id })
    }

    fn save(&self, item: &mut ListItem) -> Result<()> {
        if !item.is_modified() {
            return Ok(());
        }
        item.validate()?;

        let conn = self.lock_conn()?;
        let now = Self::now();

        let (id, time_created) = {
            let record = item.record();
            Self::check_references(&conn, &self.resource, record)?;

            let (Some(parent_id), Some(ref_id), Some(type_id)) =
                (record.parent_id, record.ref_id, record.type_id)
            else {
                return Err(ListSyncError::validation("list item", "required ids are not set"));
            };
            let config_json = serde_json::to_string(&record.config)?;
            let date_start = Self::format_date(record.date_start);
            let date_end = Self::format_date(record.date_end);

            match record.id {
                None => {
                    conn.execute(
                        "INSERT INTO list_items (resource, parent_id, domain, type_id, ref_id,
                             position, date_start, date_end, config_json, status,
                             ctime, mtime, editor)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?12)",
                        params![
                            self.resource,
                            parent_id.0,
                            record.domain,
                            type_id.0,
                            ref_id.0,
                            record.position,
                            date_start,
                            date_end,
                            config_json,
                            record.status,
                            now,
                            self.editor,
                        ],
                    )?;
                    let id = ItemId(conn.last_insert_rowid());
                    debug!("Inserted list item {} for parent {}", id, parent_id);
                    (id, now.clone())
                }
                Some(id) => {
                    let rows = conn.execute(
                        "UPDATE list_items SET parent_id = ?1, domain = ?2, type_id = ?3,
                             ref_id = ?4, position = ?5, date_start = ?6, date_end = ?7,
                             config_json = ?8, status = ?9, mtime = ?10, editor = ?11
                         WHERE id = ?12 AND resource = ?13",
                        params![
                            parent_id.0,
                            record.domain,
                            type_id.0,
                            ref_id.0,
                            record.position,
                            date_start,
                            date_end,
                            config_json,
                            record.status,
                            now,
                            self.editor,
                            id.0,
                            self.resource,
                        ],
                    )?;
                    if rows == 0 {
                        return Err(ListSyncError::NotFound { id });
                    }
                    debug!("Updated list item {}", id);
                    let created = record.time_created.clone().unwrap_or_else(|| now.clone());
                    (id, created)
                }
            }
        };

        item.mark_saved(id, time_created, now, self.editor.clone());
        Ok(())
    }

    fn delete_batch(&self, ids: &[ItemId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.lock_conn()?;
        let placeholders: Vec<_> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            "DELETE FROM list_items WHERE resource = ? AND id IN ({})",
            placeholders.join(",")
        );

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.resource.clone())];
        for id in ids {
            params_vec.push(Box::new(id.0));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = conn.execute(&sql, params_refs.as_slice())?;
        debug!("Deleted {} list items", rows);
        Ok(rows)
    }

    fn search(&self, criteria: &ListSearch) -> Result<Vec<ListItem>> {
        let conn = self.lock_conn()?;
        let (where_clause, mut params_vec) = self.build_where(criteria);

        let mut sql = format!("{} {} ORDER BY l.position, l.id", SELECT_ITEMS, where_clause);
        if let Some((start, size)) = criteria.slice {
            sql.push_str(" LIMIT ? OFFSET ?");
            params_vec.push(Box::new(size as i64));
            params_vec.push(Box::new(start as i64));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), Self::row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn count(&self, criteria: &ListSearch) -> Result<usize> {
        let conn = self.lock_conn()?;
        let (where_clause, params_vec) = self.build_where(criteria);
        let sql = format!(
            "SELECT COUNT(*) FROM list_items l
             LEFT JOIN list_types t ON t.id = l.type_id {}",
            where_clause
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn aggregate_by_domain(&self, criteria: &ListSearch) -> Result<BTreeMap<String, usize>> {
        let conn = self.lock_conn()?;
        let (where_clause, params_vec) = self.build_where(criteria);
        let sql = format!(
            "SELECT l.domain, COUNT(*) FROM list_items l
             LEFT JOIN list_types t ON t.id = l.type_id {} GROUP BY l.domain",
            where_clause
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (domain, count) = row?;
            counts.insert(domain, count as usize);
        }
        Ok(counts)
    }

    fn begin(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let depth = self.tx_depth.load(Ordering::SeqCst);
        if depth == 0 {
            conn.execute_batch("BEGIN IMMEDIATE")?;
        } else {
            conn.execute_batch(&format!("SAVEPOINT list_tx_{}", depth))?;
        }
        self.tx_depth.store(depth + 1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let depth = self.tx_depth.load(Ordering::SeqCst);
        match depth {
            0 => {
                return Err(ListSyncError::Database {
                    message: "Commit without running transaction".to_string(),
                    source: None,
                })
            }
            1 => conn.execute_batch("COMMIT")?,
            n => conn.execute_batch(&format!("RELEASE list_tx_{}", n - 1))?,
        }
        self.tx_depth.store(depth - 1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let depth = self.tx_depth.load(Ordering::SeqCst);
        if depth == 0 {
            return Err(ListSyncError::Database {
                message: "Rollback without running transaction".to_string(),
                source: None,
            });
        }
        self.tx_depth.store(depth - 1, Ordering::SeqCst);
        if depth == 1 {
            conn.execute_batch("ROLLBACK")?;
        } else {
            let name = format!("list_tx_{}", depth - 1);
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
        }
        Ok(())
    }
}

impl TypeResolver for SqliteStore {
    fn resolve_type_id(&self, resource: &str, domain: &str, code: &str) -> Result<TypeId> {
        let conn = self.lock_conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM list_types WHERE resource = ?1 AND domain = ?2 AND code = ?3",
                params![resource, domain, code],
                |row| row.get(0),
            )
            .optional()?;

        id.map(TypeId).ok_or_else(|| ListSyncError::TypeResolution {
            resource: resource.to_string(),
            domain: domain.to_string(),
            code: code.to_string(),
        })
    }
}

impl ReferenceResolver for SqliteStore {
    fn resolve_entity_id(&self, domain: &str, code: &str) -> Result<Option<ItemId>> {
        self.entity_id(domain, code)
    }
}
