//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod characteristic_repo;
pub mod discovery_repo;

pub use characteristic_repo::CharacteristicRepo;
pub use discovery_repo::{registry_by_name, DiscoveryRepo, RegistryTable};
