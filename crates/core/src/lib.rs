//! Pure conversion logic for the external game-data import pipeline.
//!
//! Everything in this crate is synchronous and free of I/O: the formula
//! engine, the formatter registry, the field mapper, the resistance
//! converter, the validation engine, and the declarative config types they
//! consume. Database access, HTTP, and file loading live in the `tome-db`,
//! `tome-collector`, and `tome-pipeline` crates.

pub mod config;
pub mod formatter;
pub mod formula;
pub mod mapper;
pub mod resistance;
pub mod types;
pub mod validation;
