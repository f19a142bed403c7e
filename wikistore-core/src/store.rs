//! WikiStore: the SQLite-backed typed-object store
//!
//! Holds the transactional session and exposes the object, class,
//! document and query APIs (implemented across the sibling modules).
//! Every multi-row operation runs as one unit of work: the outermost
//! caller's transaction wins, nested store calls join it.

use crate::error::Result;
use crate::session::Session;
use rusqlite::Connection;
use std::path::Path;

pub struct WikiStore {
    session: Session,
}

impl WikiStore {
    /// Open (or create) the store at the given database path.
    pub fn open(path: &Path) -> Result<Self> {
        let session = Session::open(path)?;
        tracing::info!("opened wiki store at {:?}", path);
        Ok(Self { session })
    }

    /// In-memory store for tests and fixtures.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            session: Session::open_in_memory()?,
        })
    }

    /// Explicitly start a unit of work spanning several store calls.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.session.begin()
    }

    /// Finish an explicitly started unit of work.
    pub fn end_transaction(&mut self, commit: bool) -> Result<()> {
        self.session.end(commit)
    }

    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.session.conn()
    }

    /// Run `f` inside a transaction. Joins an already-open unit of work;
    /// otherwise begins one, commits on success and rolls back on error.
    pub(crate) fn with_txn<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let started_here = !self.session.in_transaction();
        if started_here {
            self.session.begin()?;
        }
        match f(self) {
            Ok(value) => {
                if started_here {
                    self.session.end(true)?;
                }
                Ok(value)
            }
            Err(e) => {
                if started_here {
                    if let Err(rb) = self.session.end(false) {
                        tracing::warn!("rollback failed: {}", rb);
                    }
                }
                Err(e)
            }
        }
    }

    /// Execute a raw SQL statement. Maintenance/test escape hatch; the
    /// regular APIs never go through this.
    pub fn run_sql(&mut self, sql: &str) -> Result<usize> {
        Ok(self.conn().execute(sql, [])?)
    }
}
