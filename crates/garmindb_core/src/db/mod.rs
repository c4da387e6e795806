//! SQLite storage bootstrap and session entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the entity layer.
//! - Ensure the declared schema exists and register its entities.
//! - Hand out short-lived transactional sessions.
//!
//! # Invariants
//! - Core code must not read/write entity rows before the schema is ensured.
//! - Every session either commits or is rolled back when dropped.

use crate::model::entity::EntityValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod config;
mod open;
mod schema;
mod store;

pub use config::StoreConfig;
pub use open::{open_connection, open_connection_in_memory};
pub use schema::Schema;
pub use store::{Session, Store};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// An entity descriptor failed registration against the store.
    Schema(EntityValidationError),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "schema registration failed: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Schema(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EntityValidationError> for DbError {
    fn from(value: EntityValidationError) -> Self {
        Self::Schema(value)
    }
}
