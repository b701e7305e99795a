//! Domain model for the system module.
//!
//! # Invariants
//! - Every aggregate root is identified by a stable key.
//! - Models map themselves to storage rows through `AggregateRoot`.

pub mod environment;
