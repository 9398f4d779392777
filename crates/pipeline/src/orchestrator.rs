//! Import orchestrator.
//!
//! Composes the config registry, collector, field mapper, validation
//! engine, discovery registries, and the external persistence
//! collaborator into `collect -> convert -> validate -> integrate`, for
//! single records and filtered batches. Failures short-circuit but carry
//! the furthest-reached stage's partial output so callers can inspect
//! what was produced.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use tome_collector::{CollectError, CollectOptions, Collector, FilterSet, SourceApi};
use tome_core::config::{CollectStrategy, EntityConfig, SourceConfig};
use tome_core::formatter::{FormatterContext, FormulaBook};
use tome_core::mapper::{map_record, resolve_path};
use tome_core::types::ConvertedRecord;
use tome_core::validation::{validate, CharacteristicCatalog, ValidationResult};
use tome_db::repositories::{registry_by_name, DiscoveryRepo};

use crate::config::{ConfigError, ConfigRegistry};

// ── Stages ───────────────────────────────────────────────────────────

/// Pipeline stages of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Collecting,
    Converting,
    Validating,
    Integrating,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Converting => "converting",
            Self::Validating => "validating",
            Self::Integrating => "integrating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Failures while handing validated data to its destination.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("persistence failed: {0}")]
    Store(String),

    #[error("discovery registry failed: {0}")]
    Db(#[from] sqlx::Error),

    #[error("unknown discovery registry '{0}'")]
    UnknownRegistry(String),
}

/// Caller-facing failures that occur before the staged pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Collect(#[from] CollectError),
}

// ── Collaborator traits ──────────────────────────────────────────────

/// Persistence collaborator receiving validated converted records. Owned
/// by the host application; the pipeline only hands records over.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn store(&self, entity: &str, record: &ConvertedRecord)
        -> Result<(), IntegrationError>;
}

/// Discovery-registry collaborator for classification-code sightings.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn touch(&self, registry: &str, codes: &[i64]) -> Result<(), IntegrationError>;
}

/// sqlx-backed [`Discovery`] over the registry tables.
pub struct PgDiscovery {
    pool: PgPool,
}

impl PgDiscovery {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Discovery for PgDiscovery {
    async fn touch(&self, registry: &str, codes: &[i64]) -> Result<(), IntegrationError> {
        let table = registry_by_name(registry)
            .ok_or_else(|| IntegrationError::UnknownRegistry(registry.to_string()))?;
        DiscoveryRepo::touch_many(&self.pool, table, codes).await?;
        Ok(())
    }
}

// ── Options and outcomes ─────────────────────────────────────────────

/// Behavior switches for one invocation, passed through from the trigger
/// surface.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Convert the collected record (off = collect only).
    pub convert: bool,
    /// Validate the converted record.
    pub validate: bool,
    /// Hand validated records to persistence and touch discovery
    /// registries. Forced off for catalog-only entities.
    pub integrate: bool,
    /// Bypass the collector's response cache.
    pub skip_cache: bool,
    /// Batch limit passthrough (`0` = all).
    pub limit: u64,
    /// Batch offset passthrough.
    pub offset: u64,
    pub page_size: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            convert: true,
            validate: true,
            integrate: true,
            skip_cache: false,
            limit: 0,
            offset: 0,
            page_size: tome_collector::collect::DEFAULT_PAGE_SIZE,
        }
    }
}

impl RunOptions {
    /// Preview mode: convert and validate, never persist.
    pub fn dry_run() -> Self {
        Self {
            integrate: false,
            ..Self::default()
        }
    }
}

/// Terminal result of one single-record invocation. On failure, the
/// partial output of the furthest-reached stage is preserved.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// `Succeeded`, or the stage that failed.
    pub stage: Stage,
    pub success: bool,
    pub message: Option<String>,
    pub raw: Option<Value>,
    pub converted: Option<ConvertedRecord>,
    pub validation: Option<ValidationResult>,
}

impl RunOutcome {
    fn succeeded(
        run_id: Uuid,
        raw: Option<Value>,
        converted: Option<ConvertedRecord>,
        validation: Option<ValidationResult>,
    ) -> Self {
        Self {
            run_id,
            stage: Stage::Succeeded,
            success: true,
            message: None,
            raw,
            converted,
            validation,
        }
    }

    fn failed(
        run_id: Uuid,
        stage: Stage,
        message: String,
        raw: Option<Value>,
        converted: Option<ConvertedRecord>,
        validation: Option<ValidationResult>,
    ) -> Self {
        Self {
            run_id,
            stage,
            success: false,
            message: Some(message),
            raw,
            converted,
            validation,
        }
    }
}

/// One failed item of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    /// The record's source id, when one could be read from the raw data.
    pub id: Option<i64>,
    pub error: String,
}

/// Summary of a batch run; one item's failure never aborts the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub requested: usize,
    pub succeeded: usize,
    pub errors: Vec<ItemError>,
}

// ── Orchestrator ─────────────────────────────────────────────────────

/// Drives the import pipeline for one configured source.
pub struct Orchestrator {
    source: SourceConfig,
    registry: ConfigRegistry,
    collector: Collector,
    store: Arc<dyn RecordStore>,
    discovery: Arc<dyn Discovery>,
    catalog: CharacteristicCatalog,
    formulas: FormulaBook,
}

impl Orchestrator {
    /// Build an orchestrator for a source, loading its config and
    /// constructing the collector from it.
    pub fn new(
        registry: ConfigRegistry,
        source_id: &str,
        store: Arc<dyn RecordStore>,
        discovery: Arc<dyn Discovery>,
        catalog: CharacteristicCatalog,
        formulas: FormulaBook,
    ) -> Result<Self, ConfigError> {
        let source = registry.load_source(source_id)?;
        let collector = Collector::new(&source);
        Ok(Self {
            source,
            registry,
            collector,
            store,
            discovery,
            catalog,
            formulas,
        })
    }

    /// Rebuild the collector with a custom HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.collector = Collector::with_api(
            SourceApi::new(self.source.base_url.clone(), timeout),
            self.source.default_language.clone(),
        );
        self
    }

    /// Import a single record by id.
    pub async fn run_one(
        &self,
        entity_id: &str,
        id: i64,
        options: &RunOptions,
    ) -> Result<RunOutcome, ConfigError> {
        let entity = self.registry.load_entity(&self.source.source, entity_id)?;
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, entity = entity_id, id, "Import run starting");

        let raw = match self
            .collector
            .fetch_one(&entity, id, &collect_options(options))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                return Ok(RunOutcome::failed(
                    run_id,
                    Stage::Collecting,
                    e.to_string(),
                    None,
                    None,
                    None,
                ))
            }
        };

        Ok(self.process(run_id, &entity, raw, options).await)
    }

    /// Convert a caller-supplied raw record, bypassing collection. Used
    /// for dry-run previews.
    pub async fn run_one_with_raw(
        &self,
        entity_id: &str,
        raw: Value,
        options: &RunOptions,
    ) -> Result<RunOutcome, ConfigError> {
        let entity = self.registry.load_entity(&self.source.source, entity_id)?;
        Ok(self.process(Uuid::new_v4(), &entity, raw, options).await)
    }

    /// Import a filtered batch.
    pub async fn run_many(
        &self,
        entity_id: &str,
        filters: &FilterSet,
        options: &RunOptions,
    ) -> Result<BatchOutcome, PipelineError> {
        let entity = self.registry.load_entity(&self.source.source, entity_id)?;
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, entity = entity_id, "Batch import starting");

        let collected = self
            .collector
            .fetch_many(&entity, filters, &collect_options(options))
            .await?;

        let mut outcome = BatchOutcome {
            run_id,
            requested: collected.items.len(),
            succeeded: 0,
            errors: Vec::new(),
        };

        for raw in collected.items {
            let id = resolve_path(&raw, "id").as_i64();
            let result = self.process(run_id, &entity, raw, options).await;
            if result.success {
                outcome.succeeded += 1;
            } else {
                outcome.errors.push(ItemError {
                    id,
                    error: result
                        .message
                        .unwrap_or_else(|| format!("failed at {}", result.stage.as_str())),
                });
            }
        }

        tracing::info!(
            run_id = %run_id,
            requested = outcome.requested,
            succeeded = outcome.succeeded,
            failed = outcome.errors.len(),
            "Batch import finished",
        );
        Ok(outcome)
    }

    /// Run the convert / validate / integrate stages on one raw record.
    async fn process(
        &self,
        run_id: Uuid,
        entity: &EntityConfig,
        raw: Value,
        options: &RunOptions,
    ) -> RunOutcome {
        if !options.convert {
            return RunOutcome::succeeded(run_id, Some(raw), None, None);
        }

        // Converting
        let ctx = FormatterContext {
            entity: &entity.entity,
            raw: &raw,
            language: &self.source.default_language,
            formulas: &self.formulas,
        };
        let converted = match map_record(&raw, entity, &ctx) {
            Ok(converted) => converted,
            Err(e) => {
                return RunOutcome::failed(
                    run_id,
                    Stage::Converting,
                    e.to_string(),
                    Some(raw),
                    None,
                    None,
                )
            }
        };

        // Validating
        let validation = if options.validate {
            let result = validate(&converted, &entity.entity, &self.catalog);
            if !result.valid {
                return RunOutcome::failed(
                    run_id,
                    Stage::Validating,
                    format!("validation failed with {} error(s)", result.errors.len()),
                    Some(raw),
                    Some(converted),
                    Some(result),
                );
            }
            Some(result)
        } else {
            None
        };

        // Integrating. Catalog-only entities are reference taxonomies and
        // never persisted through this path.
        let catalog_only = entity.meta.collect_strategy == CollectStrategy::Catalog;
        if options.integrate && !catalog_only {
            if let Some(classification) = &entity.meta.classification {
                if let Some(code) = resolve_path(&raw, &classification.path).as_i64() {
                    if let Err(e) = self.discovery.touch(&classification.registry, &[code]).await
                    {
                        return RunOutcome::failed(
                            run_id,
                            Stage::Integrating,
                            e.to_string(),
                            Some(raw),
                            Some(converted),
                            validation,
                        );
                    }
                }
            }
            if let Err(e) = self.store.store(&entity.entity, &converted).await {
                return RunOutcome::failed(
                    run_id,
                    Stage::Integrating,
                    e.to_string(),
                    Some(raw),
                    Some(converted),
                    validation,
                );
            }
        }

        RunOutcome::succeeded(run_id, Some(raw), Some(converted), validation)
    }
}

fn collect_options(options: &RunOptions) -> CollectOptions {
    CollectOptions {
        limit: options.limit,
        offset: options.offset,
        page_size: options.page_size,
        skip_cache: options.skip_cache,
    }
}
