//! Declarative schema configuring the generic entity layer.
//!
//! Tables, columns and foreign-key wiring only; all decision logic lives in
//! `repo`.

mod garmin;
pub mod translations;

pub use garmin::{file_type_id, FILE, FILE_TYPE, GARMIN_SCHEMA, WEIGHT};
