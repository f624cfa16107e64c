//! SQLite-backed catalog store
//!
//! Each document is one JSON `body` row; filters compile to SQLite JSON1
//! expressions so counting and paging happen in the database.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use super::catalog::{set_path, upsert_document, CatalogStore, Document, Filter, FindOptions, UpdateOutcome};
use crate::utils::error::StoreError;

/// SQLite document collection
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteCatalog {
    /// Open (or create) the database at `path` and its collection table
    pub fn open(path: impl AsRef<Path>, collection: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, collection)
    }

    /// In-memory database (for testing)
    pub fn in_memory(collection: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, collection)
    }

    fn with_connection(conn: Connection, collection: &str) -> Result<Self, StoreError> {
        if !is_identifier(collection) {
            return Err(StoreError::Unavailable(format!(
                "invalid collection name '{collection}'"
            )));
        }

        let store = Self {
            conn: Mutex::new(conn),
            table: collection.to_string(),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{t}_offer_id
                ON {t}(json_extract(body, '$.offer_id'));",
            t = self.table
        ))?;
        Ok(())
    }

    fn first_match(
        conn: &Connection,
        table: &str,
        filter: &Filter,
    ) -> Result<Option<(i64, Document)>, StoreError> {
        let (clause, args) = compile(filter);
        let sql = format!("SELECT id, body FROM {table} WHERE {clause} ORDER BY id ASC LIMIT 1");
        let row = conn
            .query_row(&sql, params_from_iter(args), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;

        match row {
            Some((id, body)) => Ok(Some((id, serde_json::from_str(&body)?))),
            None => Ok(None),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// JSON1 path for a dotted field name: `details.url` -> `$."details"."url"`
fn json_path(path: &str) -> String {
    let mut out = String::from("$");
    for segment in path.split('.') {
        out.push_str(".\"");
        out.push_str(&segment.replace('"', "\\\""));
        out.push('"');
    }
    out
}

/// Unquoted JSON1 path, only when every segment is a plain identifier
fn literal_path(path: &str) -> Option<String> {
    path.split('.')
        .all(is_identifier)
        .then(|| format!("$.{path}"))
}

/// Compile a filter into a WHERE clause and its positional arguments
fn compile(filter: &Filter) -> (String, Vec<SqlValue>) {
    let mut args = Vec::new();
    let clause = compile_into(filter, &mut args);
    (clause, args)
}

fn compile_into(filter: &Filter, args: &mut Vec<SqlValue>) -> String {
    match filter {
        Filter::All => "1 = 1".to_string(),
        Filter::Eq(path, value) => {
            // Inlined paths let the planner match the offer_id expression index
            let target = match literal_path(path) {
                Some(literal) => format!("'{literal}'"),
                None => {
                    args.push(SqlValue::Text(json_path(path)));
                    "?".to_string()
                }
            };
            args.push(SqlValue::Text(value.to_string()));
            format!("json_extract(body, {target}) = json_extract(?, '$')")
        }
        Filter::ContainsIgnoreCase(path, needle) => {
            let path = json_path(path);
            args.push(SqlValue::Text(path.clone()));
            args.push(SqlValue::Text(path));
            args.push(SqlValue::Text(needle.to_lowercase()));
            "(json_type(body, ?) = 'text' AND instr(lower(json_extract(body, ?)), ?) > 0)"
                .to_string()
        }
        Filter::Missing(path) => {
            let path = json_path(path);
            args.push(SqlValue::Text(path.clone()));
            args.push(SqlValue::Text(path));
            "(json_type(body, ?) IS NULL OR json_type(body, ?) = 'null')".to_string()
        }
        Filter::And(filters) => join(filters, " AND ", "1 = 1", args),
        Filter::Or(filters) => join(filters, " OR ", "0 = 1", args),
    }
}

fn join(filters: &[Filter], sep: &str, empty: &str, args: &mut Vec<SqlValue>) -> String {
    if filters.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = filters.iter().map(|f| compile_into(f, args)).collect();
    format!("({})", parts.join(sep))
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Self::first_match(&conn, &self.table, filter)?.map(|(_, doc)| doc))
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let (clause, mut args) = compile(filter);
        let order = if options.newest_first { "DESC" } else { "ASC" };
        let limit = options
            .limit
            .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        args.push(SqlValue::Integer(limit));
        args.push(SqlValue::Integer(i64::try_from(options.skip).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT body FROM {} WHERE {clause} ORDER BY id {order} LIMIT ? OFFSET ?",
            self.table
        );

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(&sql)?;
        let bodies = stmt
            .query_map(params_from_iter(args), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let (clause, args) = compile(filter);
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {clause}", self.table);

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count: i64 = conn.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        let body = serde_json::to_string(&Value::Object(doc))?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            &format!("INSERT INTO {} (body) VALUES (?1)", self.table),
            params![body],
        )?;
        Ok(())
    }

    async fn update_one(
        &self,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        if let Some((id, mut doc)) = Self::first_match(&conn, &self.table, filter)? {
            for (path, value) in set {
                set_path(&mut doc, &path, value);
            }
            let body = serde_json::to_string(&Value::Object(doc))?;
            conn.execute(
                &format!("UPDATE {} SET body = ?1 WHERE id = ?2", self.table),
                params![body, id],
            )?;
            debug!(id, "Catalog document updated");
            return Ok(UpdateOutcome::Matched);
        }

        if !upsert {
            return Ok(UpdateOutcome::NoMatch);
        }

        let body = serde_json::to_string(&Value::Object(upsert_document(filter, &set)))?;
        conn.execute(
            &format!("INSERT INTO {} (body) VALUES (?1)", self.table),
            params![body],
        )?;
        Ok(UpdateOutcome::Upserted)
    }
}
