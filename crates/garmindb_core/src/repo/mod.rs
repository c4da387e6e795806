//! Generic entity persistence driven by `EntityDescriptor`s.
//!
//! # Responsibility
//! - Turn loosely typed field maps into validated rows.
//! - Provide find / create / update / upsert and time-bucketed queries for
//!   any registered entity.
//!
//! # Invariants
//! - Every operation runs in fresh sessions; nothing is cached across calls.
//! - Failures surface as typed `RepoError`s; nothing is retried.

pub mod entity_repo;
pub mod time_index;
