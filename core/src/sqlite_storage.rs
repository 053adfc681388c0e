//! SQLite-backed storage for WordGuard
//!
//! Persists user lists, recipients, the block state and the heartbeat in one
//! database, and doubles as an `EventStorage` for structured event queries.

use crate::error::{CoreError, StorageError};
use crate::event::{Event, EventType, Severity};
use crate::state::{BlockState, SetKey, StateStore};
use crate::storage::EventStorage;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

const LAST_RUN_KEY: &str = "last_run_time";

/// SQLite-backed state store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    event_count: usize,
}

/// Filters for querying events
#[derive(Debug, Default)]
pub struct EventQuery {
    pub package: Option<String>,
    pub severity: Option<Severity>,
    pub event_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl SqliteStore {
    /// Open or create the database at `db_path`.
    pub fn new(db_path: &PathBuf) -> Result<Self, CoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDir {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let conn = Connection::open(db_path).map_err(StorageError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.clone(),
            event_count: 0,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(StorageError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
            event_count: 0,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Storage(StorageError::Poisoned))
    }

    /// Initialize the database schema (tables and indexes).
    fn init_schema(&self) -> Result<(), CoreError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS string_sets (
                    name TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (name, value)
                );

                CREATE TABLE IF NOT EXISTS block_state (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    block_end_time INTEGER NOT NULL,
                    package TEXT
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS events (
                    id TEXT PRIMARY KEY,
                    timestamp TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    event_data TEXT NOT NULL,
                    package TEXT NOT NULL,
                    severity TEXT NOT NULL,
                    alert INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_events_package ON events(package);
                CREATE INDEX IF NOT EXISTS idx_events_severity ON events(severity);
                CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);",
            )
            .map_err(StorageError::Sqlite)?;
        Ok(())
    }

    /// Query events with optional filters.
    pub fn query_events(&self, query: &EventQuery) -> Result<Vec<Event>, CoreError> {
        let mut sql = String::from("SELECT event_data FROM events WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref package) = query.package {
            sql.push_str(" AND package = ?");
            param_values.push(Box::new(package.clone()));
        }
        if let Some(ref severity) = query.severity {
            sql.push_str(" AND severity = ?");
            param_values.push(Box::new(severity.to_string()));
        }
        if let Some(ref event_type) = query.event_type {
            sql.push_str(" AND event_type = ?");
            param_values.push(Box::new(event_type.clone()));
        }
        if let Some(ref start_time) = query.start_time {
            sql.push_str(" AND timestamp >= ?");
            param_values.push(Box::new(start_time.to_rfc3339()));
        }

        sql.push_str(" ORDER BY timestamp ASC");

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(StorageError::Sqlite)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(StorageError::Sqlite)?;

        let mut events = Vec::new();
        for row in rows {
            let json_str = row.map_err(StorageError::Sqlite)?;
            let event: Event = serde_json::from_str(&json_str).map_err(StorageError::Serialize)?;
            events.push(event);
        }
        Ok(events)
    }

    /// Number of events written through this handle.
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Extract the event type tag from an Event for indexing.
    fn event_type_tag(event: &Event) -> &'static str {
        match &event.event_type {
            EventType::Classification { .. } => "classification",
            EventType::WordMatch { .. } => "word_match",
            EventType::SiteMatch { .. } => "site_match",
            EventType::FrequencyBlock { .. } => "frequency_block",
            EventType::ActiveBlock { .. } => "active_block",
            EventType::Enforcement { .. } => "enforcement",
            EventType::Notification { .. } => "notification",
            EventType::Service { .. } => "service",
        }
    }
}

impl StateStore for SqliteStore {
    fn load_set(&self, key: SetKey) -> Result<BTreeSet<String>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT value FROM string_sets WHERE name = ?1")
            .map_err(StorageError::Sqlite)?;
        let rows = stmt
            .query_map(params![key.as_str()], |row| row.get::<_, String>(0))
            .map_err(StorageError::Sqlite)?;

        let mut values = BTreeSet::new();
        for row in rows {
            values.insert(row.map_err(StorageError::Sqlite)?);
        }
        Ok(values)
    }

    fn save_set(&self, key: SetKey, values: &BTreeSet<String>) -> Result<(), CoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(StorageError::Sqlite)?;
        tx.execute(
            "DELETE FROM string_sets WHERE name = ?1",
            params![key.as_str()],
        )
        .map_err(StorageError::Sqlite)?;
        for value in values {
            tx.execute(
                "INSERT OR IGNORE INTO string_sets (name, value) VALUES (?1, ?2)",
                params![key.as_str(), value],
            )
            .map_err(StorageError::Sqlite)?;
        }
        tx.commit().map_err(StorageError::Sqlite)?;
        Ok(())
    }

    fn load_block_state(&self) -> Result<BlockState, CoreError> {
        let conn = self.conn()?;
        let state = conn
            .query_row(
                "SELECT block_end_time, package FROM block_state WHERE id = 1",
                [],
                |row| {
                    Ok(BlockState {
                        block_end_time: row.get(0)?,
                        package: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(StorageError::Sqlite)?;
        Ok(state.unwrap_or_default())
    }

    fn save_block_state(&self, state: &BlockState) -> Result<(), CoreError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO block_state (id, block_end_time, package) VALUES (1, ?1, ?2)",
                params![state.block_end_time, state.package],
            )
            .map_err(StorageError::Sqlite)?;
        Ok(())
    }

    fn load_last_run(&self) -> Result<i64, CoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![LAST_RUN_KEY],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(StorageError::Sqlite)?;
        Ok(value.unwrap_or(0))
    }

    fn save_last_run(&self, epoch_ms: i64) -> Result<(), CoreError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![LAST_RUN_KEY, epoch_ms],
            )
            .map_err(StorageError::Sqlite)?;
        Ok(())
    }
}

impl EventStorage for SqliteStore {
    fn write_event(&mut self, event: &Event) -> Result<(), CoreError> {
        let event_data = serde_json::to_string(event).map_err(StorageError::Serialize)?;
        let event_type_tag = Self::event_type_tag(event);

        self.conn()?
            .execute(
                "INSERT INTO events (id, timestamp, event_type, event_data, package, severity, alert)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id.to_string(),
                    event.timestamp.to_rfc3339(),
                    event_type_tag,
                    event_data,
                    event.package,
                    event.severity.to_string(),
                    event.alert as i32,
                ],
            )
            .map_err(StorageError::Sqlite)?;
        self.event_count += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CoreError> {
        // SQLite auto-commits; no buffering to flush.
        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.db_path
    }
}
