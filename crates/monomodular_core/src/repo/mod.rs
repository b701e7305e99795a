//! Repository layer abstractions.
//!
//! # Responsibility
//! - Define a uniform, entity-agnostic data access contract.
//! - Isolate storage-context details from service orchestration.
//!
//! # Invariants
//! - Repositories forward to the storage context and return its errors
//!   unchanged.
//! - Absent entities are `Ok(None)`, never an error.

pub mod entity_repo;
