use super::translations::{file_name_from_path, normalize_timestamp};
use crate::db::{Schema, Store};
use crate::model::entity::{ColumnTranslation, EntityDescriptor, RelationalMapping};
use crate::model::field_map::{FieldMap, RecordId};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use rusqlite::types::Value;

pub static FILE_TYPE: EntityDescriptor = EntityDescriptor {
    name: "FileType",
    table: "file_types",
    columns: &["id", "name"],
    min_row_values: 1,
    translations: &[],
    relational_mappings: &[],
    find_key: &["name"],
    timestamp: None,
};

pub static FILE: EntityDescriptor = EntityDescriptor {
    name: "File",
    table: "files",
    columns: &["id", "name", "type_id"],
    min_row_values: 1,
    translations: &[ColumnTranslation {
        column: "name",
        translate: file_name_from_path,
    }],
    relational_mappings: &[RelationalMapping {
        field: "type",
        column: "type_id",
        resolver: resolve_file_type,
    }],
    find_key: &["name"],
    timestamp: None,
};

pub static WEIGHT: EntityDescriptor = EntityDescriptor {
    name: "Weight",
    table: "weight",
    columns: &["id", "timestamp", "weight"],
    min_row_values: 2,
    translations: &[ColumnTranslation {
        column: "timestamp",
        translate: normalize_timestamp,
    }],
    relational_mappings: &[],
    find_key: &["timestamp"],
    timestamp: Some("timestamp"),
};

pub static GARMIN_SCHEMA: Schema = Schema {
    db_file_name: "garmin.db",
    ddl: include_str!("garmin.sql"),
    entities: &[&FILE_TYPE, &FILE, &WEIGHT],
};

/// Identifier of the file type called `name`, created on first use.
pub fn file_type_id(db: &Store, name: &str) -> RepoResult<RecordId> {
    EntityRepository::new(&FILE_TYPE)
        .find_or_create_id(db, &FieldMap::new().with("name", name.to_string()))
}

fn resolve_file_type(db: &Store, value: Value) -> RepoResult<Value> {
    let id = EntityRepository::new(&FILE_TYPE)
        .find_or_create_id(db, &FieldMap::new().with("name", value))?;
    Ok(Value::Integer(id))
}
