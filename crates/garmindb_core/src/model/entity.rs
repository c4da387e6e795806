//! Per-entity static metadata.
//!
//! # Responsibility
//! - Describe which columns an entity has and how raw field maps are
//!   translated, resolved and matched against stored rows.
//! - Validate descriptors before they are registered with a store.
//!
//! # Invariants
//! - `columns` always contains [`ID_COLUMN`].
//! - Translations apply to declared columns only; relational mappings apply
//!   to fields that are *not* declared columns.
//! - Every table and column name is a plain SQL identifier, so it can be
//!   interpolated into statements.

use crate::db::Store;
use crate::repo::entity_repo::RepoResult;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Column holding the store-generated row identifier.
pub const ID_COLUMN: &str = "id";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Pure value rewrite applied to a column before storing or querying.
pub type Translation = fn(Value) -> Value;

/// Looks up or creates a related row and returns its identifier.
pub type Resolver = fn(&Store, Value) -> RepoResult<Value>;

#[derive(Debug, Clone, Copy)]
pub struct ColumnTranslation {
    pub column: &'static str,
    pub translate: Translation,
}

/// Turns a logical field (e.g. `type`) into a foreign-key column value
/// (e.g. `type_id`).
#[derive(Debug, Clone, Copy)]
pub struct RelationalMapping {
    pub field: &'static str,
    pub column: &'static str,
    pub resolver: Resolver,
}

/// Static description of one entity type and its backing table.
#[derive(Debug)]
pub struct EntityDescriptor {
    /// Entity name used in diagnostics.
    pub name: &'static str,
    pub table: &'static str,
    /// Declared columns, including [`ID_COLUMN`].
    pub columns: &'static [&'static str],
    /// Minimum number of non-null recognized values accepted by create.
    pub min_row_values: usize,
    pub translations: &'static [ColumnTranslation],
    pub relational_mappings: &'static [RelationalMapping],
    /// Columns whose equality identifies at most one row.
    pub find_key: &'static [&'static str],
    /// Designated timestamp column for time-bucketed queries.
    pub timestamp: Option<&'static str>,
}

impl EntityDescriptor {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| *column == name)
    }

    pub fn translation(&self, column: &str) -> Option<Translation> {
        self.translations
            .iter()
            .find(|translation| translation.column == column)
            .map(|translation| translation.translate)
    }

    pub fn relational_mapping(&self, field: &str) -> Option<&RelationalMapping> {
        self.relational_mappings
            .iter()
            .find(|mapping| mapping.field == field)
    }

    /// Whether `field` is a declared column or a relational field.
    pub fn recognizes(&self, field: &str) -> bool {
        self.has_column(field) || self.relational_mapping(field).is_some()
    }

    /// Checks internal consistency of the descriptor.
    ///
    /// Does not look at any store; table layout checks happen on
    /// registration.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        self.check_identifier(self.table)?;

        let mut seen = BTreeSet::new();
        for &column in self.columns {
            self.check_identifier(column)?;
            if !seen.insert(column) {
                return Err(EntityValidationError::DuplicateColumn {
                    entity: self.name,
                    column,
                });
            }
        }
        if !self.has_column(ID_COLUMN) {
            return Err(EntityValidationError::MissingIdColumn { entity: self.name });
        }

        if self.find_key.is_empty() {
            return Err(EntityValidationError::EmptyFindKey { entity: self.name });
        }
        for &column in self.find_key {
            self.check_declared("find key", column)?;
        }
        for translation in self.translations {
            self.check_declared("translation", translation.column)?;
        }
        for mapping in self.relational_mappings {
            if self.has_column(mapping.field) {
                return Err(EntityValidationError::FieldShadowsColumn {
                    entity: self.name,
                    field: mapping.field,
                });
            }
            self.check_declared("relational mapping", mapping.column)?;
        }
        if let Some(timestamp) = self.timestamp {
            self.check_declared("timestamp", timestamp)?;
        }

        Ok(())
    }

    fn check_identifier(&self, name: &'static str) -> Result<(), EntityValidationError> {
        if IDENTIFIER_RE.is_match(name) {
            Ok(())
        } else {
            Err(EntityValidationError::InvalidIdentifier {
                entity: self.name,
                name,
            })
        }
    }

    fn check_declared(
        &self,
        role: &'static str,
        column: &'static str,
    ) -> Result<(), EntityValidationError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(EntityValidationError::UndeclaredColumn {
                entity: self.name,
                role,
                column,
            })
        }
    }
}

/// Descriptor inconsistency found while registering an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    InvalidIdentifier {
        entity: &'static str,
        name: &'static str,
    },
    DuplicateColumn {
        entity: &'static str,
        column: &'static str,
    },
    MissingIdColumn {
        entity: &'static str,
    },
    EmptyFindKey {
        entity: &'static str,
    },
    /// A find key, translation, mapping target or timestamp names an
    /// undeclared column.
    UndeclaredColumn {
        entity: &'static str,
        role: &'static str,
        column: &'static str,
    },
    /// A relational field reuses a declared column name.
    FieldShadowsColumn {
        entity: &'static str,
        field: &'static str,
    },
    MissingTable {
        entity: &'static str,
        table: &'static str,
    },
    ColumnNotInTable {
        entity: &'static str,
        table: &'static str,
        column: &'static str,
    },
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { entity, name } => {
                write!(f, "{entity}: `{name}` is not a valid SQL identifier")
            }
            Self::DuplicateColumn { entity, column } => {
                write!(f, "{entity}: column `{column}` declared twice")
            }
            Self::MissingIdColumn { entity } => {
                write!(f, "{entity}: columns must include `{ID_COLUMN}`")
            }
            Self::EmptyFindKey { entity } => write!(f, "{entity}: find key is empty"),
            Self::UndeclaredColumn {
                entity,
                role,
                column,
            } => write!(f, "{entity}: {role} column `{column}` is not declared"),
            Self::FieldShadowsColumn { entity, field } => write!(
                f,
                "{entity}: relational field `{field}` collides with a declared column"
            ),
            Self::MissingTable { entity, table } => {
                write!(f, "{entity}: table `{table}` does not exist")
            }
            Self::ColumnNotInTable {
                entity,
                table,
                column,
            } => write!(f, "{entity}: table `{table}` has no column `{column}`"),
        }
    }
}

impl Error for EntityValidationError {}
