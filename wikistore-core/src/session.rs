//! Transactional session over the SQLite backend
//!
//! One session owns one connection and at most one open transaction.
//! All multi-row store operations run strictly between `begin()` and
//! `end()`; a rollback leaves previously committed state untouched.

use crate::error::{Result, StoreError};
use rusqlite::Connection;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Open,
}

/// Connection plus transaction state machine: Idle -> Open -> Idle.
pub struct Session {
    conn: Connection,
    state: SessionState,
}

impl Session {
    /// Open (or create) the database file and bootstrap the table layout.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", "-64000")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Self::init(conn)
    }

    /// In-memory database, used by tests and fixtures.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        bootstrap(&conn)?;
        Ok(Self {
            conn,
            state: SessionState::Idle,
        })
    }

    /// Start a unit of work. Nesting is caller misuse.
    pub fn begin(&mut self) -> Result<()> {
        if self.state == SessionState::Open {
            return Err(StoreError::TransactionState(
                "begin() while a transaction is already open",
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.state = SessionState::Open;
        Ok(())
    }

    /// Finish the unit of work: commit when `commit` is true, roll back
    /// otherwise. Calling without an open transaction is caller misuse.
    pub fn end(&mut self, commit: bool) -> Result<()> {
        if self.state == SessionState::Idle {
            return Err(StoreError::TransactionState(
                "end() without an open transaction",
            ));
        }
        self.state = SessionState::Idle;
        if commit {
            if let Err(e) = self.conn.execute_batch("COMMIT") {
                tracing::warn!("commit failed, rolling back: {}", e);
                let _ = self.conn.execute_batch("ROLLBACK");
                return Err(e.into());
            }
        } else {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.state == SessionState::Open
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Fixed relational layout. One row per scalar property, one row per list
/// element; every tenant-scoped table carries a `wiki` column.
fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            wiki TEXT NOT NULL,
            name TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            comment TEXT NOT NULL DEFAULT '',
            minor_edit INTEGER NOT NULL DEFAULT 0,
            saved_at INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (wiki, name)
        );
        CREATE TABLE IF NOT EXISTS objects (
            id INTEGER PRIMARY KEY,
            wiki TEXT NOT NULL,
            class_name TEXT NOT NULL,
            doc_name TEXT NOT NULL,
            obj_index INTEGER NOT NULL,
            UNIQUE (wiki, class_name, doc_name, obj_index)
        );
        CREATE TABLE IF NOT EXISTS properties (
            object_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            pretty_name TEXT NOT NULL DEFAULT '',
            kind INTEGER NOT NULL,
            PRIMARY KEY (object_id, name)
        );
        CREATE TABLE IF NOT EXISTS property_texts (
            object_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (object_id, name)
        );
        CREATE TABLE IF NOT EXISTS property_numbers (
            object_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            value INTEGER NOT NULL,
            PRIMARY KEY (object_id, name)
        );
        CREATE TABLE IF NOT EXISTS property_list_items (
            object_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            item_index INTEGER NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (object_id, name, item_index)
        );
        CREATE TABLE IF NOT EXISTS classes (
            wiki TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (wiki, name)
        );
        CREATE TABLE IF NOT EXISTS class_properties (
            wiki TEXT NOT NULL,
            class_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            pretty_name TEXT NOT NULL DEFAULT '',
            kind INTEGER NOT NULL,
            allowed_values TEXT NOT NULL DEFAULT '',
            area_cols INTEGER NOT NULL DEFAULT 0,
            area_rows INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (wiki, class_name, name)
        );",
    )?;
    Ok(())
}
