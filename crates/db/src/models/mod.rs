//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct
//! matching the database row, plus the summary types returned by batch
//! operations.

pub mod characteristic;
pub mod discovery;
