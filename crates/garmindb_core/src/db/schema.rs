//! Declarative schema bootstrap and entity registration.
//!
//! # Responsibility
//! - Create declared tables when the store file is new or incomplete.
//! - Check each entity descriptor against the live table layout.
//! - Back every find key with a unique index.
//!
//! # Invariants
//! - Schema DDL must be idempotent (`CREATE TABLE IF NOT EXISTS`).
//! - An entity is usable only after `register_entity` succeeded for it.

use super::DbResult;
use crate::model::entity::{EntityDescriptor, EntityValidationError};
use log::debug;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// A set of tables plus the entities that map onto them.
#[derive(Debug)]
pub struct Schema {
    /// File name of the database inside the configured directory.
    pub db_file_name: &'static str,
    /// Idempotent DDL creating every table of the schema.
    pub ddl: &'static str,
    pub entities: &'static [&'static EntityDescriptor],
}

pub(crate) fn ensure_schema(conn: &Connection, schema: &Schema) -> DbResult<()> {
    conn.execute_batch(schema.ddl)?;
    for entity in schema.entities {
        register_entity(conn, entity)?;
    }
    Ok(())
}

pub(crate) fn register_entity(conn: &Connection, entity: &EntityDescriptor) -> DbResult<()> {
    entity.validate()?;

    let table_columns = table_columns(conn, entity.table)?;
    if table_columns.is_empty() {
        return Err(EntityValidationError::MissingTable {
            entity: entity.name,
            table: entity.table,
        }
        .into());
    }
    if let Some(column) = entity
        .columns
        .iter()
        .copied()
        .find(|column| !table_columns.contains(*column))
    {
        return Err(EntityValidationError::ColumnNotInTable {
            entity: entity.name,
            table: entity.table,
            column,
        }
        .into());
    }

    let key_columns = entity
        .find_key
        .iter()
        .map(|column| format!("\"{column}\""))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"uq_{table}_find_key\" ON \"{table}\" ({key_columns});",
        table = entity.table
    ))?;

    debug!(
        "event=entity_register module=db status=ok entity={} table={}",
        entity.name, entity.table
    );
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> DbResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(columns)
}
