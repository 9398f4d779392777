//! Pipeline composition: the config registry and the orchestrator that
//! drives `collect -> convert -> validate -> integrate`.

pub mod config;
pub mod orchestrator;

pub use config::{ConfigError, ConfigRegistry, PipelineSettings};
pub use orchestrator::{
    BatchOutcome, Discovery, IntegrationError, Orchestrator, PgDiscovery, PipelineError,
    RecordStore, RunOptions, RunOutcome, Stage,
};
