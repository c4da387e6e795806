//! Generic persistence layer for timestamp-oriented Garmin records.
//! Entities are described declaratively; the repository does the rest.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;

pub use db::{DbError, DbResult, Schema, Session, Store, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{
    ColumnTranslation, EntityDescriptor, EntityValidationError, RelationalMapping, Resolver,
    Translation, ID_COLUMN,
};
pub use model::field_map::{timestamp_value, FieldMap, Record, RecordId, TIMESTAMP_FORMAT};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult};
pub use repo::time_index::{month_abbreviation, AggregateOp};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
