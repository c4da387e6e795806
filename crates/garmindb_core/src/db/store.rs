//! Process-wide store handle and per-call sessions.
//!
//! # Responsibility
//! - Own the single SQLite connection of a store file.
//! - Serialize units of work through scoped `Session` guards.
//!
//! # Invariants
//! - At most one session is live per store at any time.
//! - A session that is not committed is rolled back when dropped.

use super::schema::{ensure_schema, register_entity};
use super::{open_connection, open_connection_in_memory, DbResult, Schema, StoreConfig};
use crate::model::entity::EntityDescriptor;
use log::warn;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Handle to one embedded store file with its schema ensured.
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens `<config.db_dir>/<schema.db_file_name>`, creating the directory
    /// and the file when absent.
    pub fn open(config: &StoreConfig, schema: &Schema) -> DbResult<Self> {
        std::fs::create_dir_all(&config.db_dir)?;
        Self::open_file(config.db_path(schema), schema, config.debug)
    }

    /// Opens a store at an explicit file path.
    pub fn open_path(path: impl AsRef<Path>, schema: &Schema) -> DbResult<Self> {
        Self::open_file(path.as_ref().to_path_buf(), schema, false)
    }

    /// Opens a private in-memory store, mostly for tests and dry runs.
    pub fn open_in_memory(schema: &Schema) -> DbResult<Self> {
        let conn = open_connection_in_memory()?;
        ensure_schema(&conn, schema)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn open_file(path: PathBuf, schema: &Schema, trace_sql: bool) -> DbResult<Self> {
        let conn = open_connection(&path, trace_sql)?;
        ensure_schema(&conn, schema)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Backing file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Registers an entity that is not part of the schema the store was
    /// opened with. Its table must already exist.
    pub fn register(&self, entity: &EntityDescriptor) -> DbResult<()> {
        let session = self.session()?;
        register_entity(session.conn(), entity)?;
        session.commit()
    }

    /// Starts a unit of work.
    ///
    /// Blocks while another session of this store is live.
    pub fn session(&self) -> DbResult<Session<'_>> {
        // A panic while a session was live already rolled it back on unwind.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Session::begin(conn)
    }
}

/// One transaction on the store connection.
pub struct Session<'db> {
    conn: MutexGuard<'db, Connection>,
    open: bool,
}

impl<'db> Session<'db> {
    fn begin(conn: MutexGuard<'db, Connection>) -> DbResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(Self { conn, open: true })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        self.open = false;
        Ok(())
    }

    pub fn rollback(mut self) -> DbResult<()> {
        self.open = false;
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!("event=session_rollback module=db status=error error={err}");
        }
    }
}
