//! Converted-record validation.
//!
//! Characteristic definitions (the constraint source of truth) live in
//! `characteristic`; the pure accumulating validator lives in `engine`.
//! Definitions are owned by a characteristic-configuration collaborator
//! and injected read-only; nothing here caches or mutates them.

pub mod characteristic;
pub mod engine;

pub use characteristic::{
    CharacteristicCatalog, CharacteristicDefinition, CharacteristicType, EntityLimits,
    ValidationError, ValidationResult,
};
pub use engine::{resolve_entity_alias, validate};
