//! Store configuration supplied by the host application.

use super::Schema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the store file lives and whether SQL tracing is enabled.
///
/// Serializable so hosts can embed it in their own config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the database file. Created on open if missing.
    pub db_dir: PathBuf,
    /// Logs every executed SQL statement at debug level.
    #[serde(default)]
    pub debug: bool,
}

impl StoreConfig {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
            debug: false,
        }
    }

    /// Full path of the database file for `schema`.
    pub fn db_path(&self, schema: &Schema) -> PathBuf {
        self.db_dir.join(schema.db_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;
    use crate::schema::GARMIN_SCHEMA;
    use std::path::PathBuf;

    #[test]
    fn db_path_joins_dir_and_schema_file_name() {
        let config = StoreConfig::new("/var/lib/garmin");
        assert_eq!(
            config.db_path(&GARMIN_SCHEMA),
            PathBuf::from("/var/lib/garmin/garmin.db")
        );
    }

    #[test]
    fn new_config_has_tracing_disabled() {
        assert!(!StoreConfig::new("/tmp").debug);
    }
}
