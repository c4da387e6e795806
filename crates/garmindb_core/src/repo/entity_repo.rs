//! Generic entity repository over SQLite.
//!
//! # Responsibility
//! - Filter, translate and resolve caller field maps per entity descriptor.
//! - Provide find / create / update / find-or-create / create-or-update.
//!
//! # Invariants
//! - Translation runs before relational resolution, and resolution before
//!   column filtering; neither is applied twice to the same field.
//! - Inserts ignore find-key conflicts, so concurrent find-or-create calls
//!   converge on a single row.
//! - Resolvers run before the caller's write session is opened.

use crate::db::{DbError, Store};
use crate::model::entity::{EntityDescriptor, ID_COLUMN};
use crate::model::field_map::{FieldMap, Record, RecordId};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Every key of a field map was unrecognized for the entity.
    AllColumnsFiltered {
        entity: &'static str,
        table: &'static str,
        fields: Vec<String>,
    },
    /// Fewer non-null recognized values than the entity requires.
    InsufficientValues {
        entity: &'static str,
        found: usize,
        required: usize,
    },
    /// A find-key lookup matched more than one row.
    AmbiguousResult {
        entity: &'static str,
        matches: usize,
    },
    /// A find-key column is absent from the field map.
    MissingKeyField {
        entity: &'static str,
        field: &'static str,
    },
    /// A create went through but the row cannot be found by its key.
    MissingAfterCreate {
        entity: &'static str,
    },
    /// A time-index query on an entity without a timestamp column.
    MissingTimestamp {
        entity: &'static str,
    },
    /// A column name that the entity does not declare.
    UnknownColumn {
        entity: &'static str,
        column: String,
    },
    /// Underlying store failure, including constraint violations.
    Db(DbError),
    /// A stored row that cannot be read back as a record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllColumnsFiltered {
                entity,
                table,
                fields,
            } => write!(
                f,
                "{entity}: filtered all columns for `{table}` from {fields:?}"
            ),
            Self::InsufficientValues {
                entity,
                found,
                required,
            } => write!(
                f,
                "{entity}: {found} non-null values supplied, at least {required} required"
            ),
            Self::AmbiguousResult { entity, matches } => {
                write!(f, "{entity}: find key matched {matches} rows")
            }
            Self::MissingKeyField { entity, field } => {
                write!(f, "{entity}: find key field `{field}` missing")
            }
            Self::MissingAfterCreate { entity } => {
                write!(f, "{entity}: created row cannot be found by its key")
            }
            Self::MissingTimestamp { entity } => {
                write!(f, "{entity}: entity has no timestamp column")
            }
            Self::UnknownColumn { entity, column } => {
                write!(f, "{entity}: unknown column `{column}`")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Generic operations for one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntityRepository<'e> {
    entity: &'e EntityDescriptor,
}

impl<'e> EntityRepository<'e> {
    pub fn new(entity: &'e EntityDescriptor) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &'e EntityDescriptor {
        self.entity
    }

    /// Whether `fields` carries enough recognized keys to describe a row of
    /// this entity.
    pub fn matches(&self, fields: &FieldMap) -> bool {
        let recognized = fields
            .keys()
            .filter(|key| self.entity.recognizes(key))
            .count();
        recognized >= self.entity.min_row_values
    }

    /// Keeps only declared columns.
    ///
    /// Dropped keys are logged; an empty result is an error.
    pub fn filter_columns(&self, fields: &FieldMap) -> RepoResult<FieldMap> {
        let filtered: FieldMap = fields
            .iter()
            .filter(|(key, _)| self.entity.has_column(key))
            .map(|(key, value)| (key, value.clone()))
            .collect();

        if filtered.len() != fields.len() {
            debug!(
                "event=columns_filtered module=repo entity={} table={} fields={:?}",
                self.entity.name, self.entity.table, fields
            );
        }
        if filtered.is_empty() {
            return Err(RepoError::AllColumnsFiltered {
                entity: self.entity.name,
                table: self.entity.table,
                fields: fields.keys().map(str::to_owned).collect(),
            });
        }
        Ok(filtered)
    }

    /// Applies column translations; other keys pass through unchanged.
    pub fn translate_columns(&self, fields: &FieldMap) -> FieldMap {
        if self.entity.translations.is_empty() {
            return fields.clone();
        }
        fields
            .iter()
            .map(|(key, value)| {
                let value = match self.entity.translation(key) {
                    Some(translate) => translate(value.clone()),
                    None => value.clone(),
                };
                (key, value)
            })
            .collect()
    }

    /// Replaces each relational field with its foreign-key column, resolving
    /// the related row through the mapping's resolver.
    ///
    /// A null value maps to a null foreign key without calling the resolver.
    pub fn resolve_relations(&self, db: &Store, fields: FieldMap) -> RepoResult<FieldMap> {
        if self.entity.relational_mappings.is_empty() {
            return Ok(fields);
        }
        let mut resolved = FieldMap::new();
        for (key, value) in fields {
            match self.entity.relational_mapping(&key) {
                Some(mapping) => {
                    let id = match value {
                        Value::Null => Value::Null,
                        value => (mapping.resolver)(db, value)?,
                    };
                    resolved.insert(mapping.column, id);
                }
                None => {
                    resolved.insert(key, value);
                }
            }
        }
        Ok(resolved)
    }

    /// All rows matching the find key of `fields`, in store order.
    pub fn find(&self, db: &Store, fields: &FieldMap) -> RepoResult<Vec<Record>> {
        debug!(
            "event=entity_find module=repo entity={} fields={:?}",
            self.entity.name, fields
        );
        let translated = self.translate_columns(fields);
        let session = db.session()?;
        let records = self.select_by_key(session.conn(), &translated)?;
        session.commit()?;
        Ok(records)
    }

    /// The single row matching the find key, if any.
    pub fn find_one(&self, db: &Store, fields: &FieldMap) -> RepoResult<Option<Record>> {
        let records = self.find(db, fields)?;
        self.at_most_one(records)
    }

    pub fn find_id(&self, db: &Store, fields: &FieldMap) -> RepoResult<Option<RecordId>> {
        Ok(self.find_one(db, fields)?.map(|record| record.id))
    }

    /// Inserts a new row built from `fields`.
    ///
    /// Returns `false` when a row with the same find key already exists; the
    /// existing row is left untouched.
    pub fn create(&self, db: &Store, fields: &FieldMap) -> RepoResult<bool> {
        debug!(
            "event=entity_create module=repo entity={} fields={:?}",
            self.entity.name, fields
        );
        let translated = self.translate_columns(fields);
        let found = translated
            .iter()
            .filter(|(key, _)| self.entity.recognizes(key))
            .map(|(key, value)| (key, value.clone()))
            .collect::<FieldMap>()
            .non_null_count();
        if found < self.entity.min_row_values {
            return Err(RepoError::InsufficientValues {
                entity: self.entity.name,
                found,
                required: self.entity.min_row_values,
            });
        }

        let resolved = self.resolve_relations(db, translated)?;
        let row = self.filter_columns(&resolved)?;

        let columns = row.keys().map(quote).collect::<Vec<_>>().join(", ");
        let placeholders = (1..=row.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let conflict_target = self
            .entity
            .find_key
            .iter()
            .map(|column| quote(column))
            .collect::<Vec<_>>()
            .join(", ");
        // Only a find-key collision is an existing row; any other
        // constraint violation surfaces as an error.
        let sql = format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders}) \
             ON CONFLICT ({conflict_target}) DO NOTHING;",
            quote(self.entity.table)
        );

        let session = db.session()?;
        let inserted = session.conn().execute(&sql, params_from_iter(row.values()))?;
        session.commit()?;

        if inserted == 0 {
            debug!(
                "event=entity_create module=repo status=exists entity={}",
                self.entity.name
            );
        }
        Ok(inserted > 0)
    }

    /// Overwrites the declared columns present in `fields` on the row
    /// matching its find key. Other columns are left untouched.
    ///
    /// Returns the updated row, or `None` when no row matched.
    pub fn update(&self, db: &Store, fields: &FieldMap) -> RepoResult<Option<Record>> {
        debug!(
            "event=entity_update module=repo entity={} fields={:?}",
            self.entity.name, fields
        );
        let translated = self.translate_columns(fields);
        let session = db.session()?;
        let found = self.select_by_key(session.conn(), &translated)?;
        let Some(found) = self.at_most_one(found)? else {
            session.commit()?;
            return Ok(None);
        };

        let assignments: Vec<(&str, &Value)> = translated
            .iter()
            .filter(|(key, _)| *key != ID_COLUMN && self.entity.has_column(key))
            .collect();
        if !assignments.is_empty() {
            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(index, (column, _))| format!("{} = ?{}", quote(column), index + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {set_clause} WHERE {} = ?{};",
                quote(self.entity.table),
                quote(ID_COLUMN),
                assignments.len() + 1
            );
            let id = Value::Integer(found.id);
            let params = assignments
                .iter()
                .map(|(_, value)| *value)
                .chain(std::iter::once(&id));
            session.conn().execute(&sql, params_from_iter(params))?;
        }

        let updated = self.select_by_id(session.conn(), found.id)?;
        session.commit()?;
        Ok(Some(updated))
    }

    /// Returns the row matching the find key, creating it first if needed.
    pub fn find_or_create(&self, db: &Store, fields: &FieldMap) -> RepoResult<Record> {
        if let Some(record) = self.find_one(db, fields)? {
            return Ok(record);
        }
        self.create(db, fields)?;
        self.find_one(db, fields)?
            .ok_or(RepoError::MissingAfterCreate {
                entity: self.entity.name,
            })
    }

    pub fn find_or_create_id(&self, db: &Store, fields: &FieldMap) -> RepoResult<RecordId> {
        Ok(self.find_or_create(db, fields)?.id)
    }

    /// Updates the row matching the find key, or creates it.
    pub fn create_or_update(&self, db: &Store, fields: &FieldMap) -> RepoResult<Record> {
        if let Some(record) = self.update(db, fields)? {
            return Ok(record);
        }
        if !self.create(db, fields)? {
            // Lost a race against a concurrent create of the same key.
            if let Some(record) = self.update(db, fields)? {
                return Ok(record);
            }
        }
        self.find_one(db, fields)?
            .ok_or(RepoError::MissingAfterCreate {
                entity: self.entity.name,
            })
    }

    fn at_most_one(&self, mut records: Vec<Record>) -> RepoResult<Option<Record>> {
        match records.len() {
            0 | 1 => Ok(records.pop()),
            matches => Err(RepoError::AmbiguousResult {
                entity: self.entity.name,
                matches,
            }),
        }
    }

    fn select_sql(&self) -> String {
        let columns = self
            .entity
            .columns
            .iter()
            .map(|column| quote(column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {columns} FROM {}", quote(self.entity.table))
    }

    fn select_by_key(&self, conn: &Connection, fields: &FieldMap) -> RepoResult<Vec<Record>> {
        let mut conditions = Vec::with_capacity(self.entity.find_key.len());
        let mut bind_values = Vec::with_capacity(self.entity.find_key.len());
        for &column in self.entity.find_key {
            let value = fields.get(column).ok_or(RepoError::MissingKeyField {
                entity: self.entity.name,
                field: column,
            })?;
            // `IS` keeps NULL keys comparable.
            conditions.push(format!("{} IS ?{}", quote(column), conditions.len() + 1));
            bind_values.push(value);
        }

        let sql = format!("{} WHERE {};", self.select_sql(), conditions.join(" AND "));
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.parse_record(row)?);
        }
        Ok(records)
    }

    fn select_by_id(&self, conn: &Connection, id: RecordId) -> RepoResult<Record> {
        let sql = format!("{} WHERE {} = ?1;", self.select_sql(), quote(ID_COLUMN));
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return self.parse_record(row);
        }
        Err(RepoError::InvalidData(format!(
            "{} row {id} vanished during update",
            self.entity.table
        )))
    }

    fn parse_record(&self, row: &Row<'_>) -> RepoResult<Record> {
        let mut fields = FieldMap::new();
        for (index, column) in self.entity.columns.iter().enumerate() {
            fields.insert(*column, row.get::<_, Value>(index)?);
        }
        let id = match fields.get(ID_COLUMN) {
            Some(Value::Integer(id)) => *id,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid id value `{other:?}` in {}.{ID_COLUMN}",
                    self.entity.table
                )));
            }
        };
        Ok(Record { id, fields })
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}
