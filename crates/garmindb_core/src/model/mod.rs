//! Loosely typed record model shared by every entity.
//!
//! # Responsibility
//! - Define the caller-facing `FieldMap` unit of work and persisted `Record`s.
//! - Define per-entity static metadata (`EntityDescriptor`).
//!
//! # Invariants
//! - Descriptors are immutable and validated before first use.
//! - Every persisted record is identified by an integer `RecordId`.

pub mod entity;
pub mod field_map;
