//! Import worker: wires the pipeline together for operator-triggered
//! batch runs.
//!
//! Reads process settings from the environment (see
//! [`PipelineSettings::from_env`]), loads the characteristic catalog and
//! conversion formulas from Postgres, and, when `RUN_ENTITY` is set,
//! runs one filtered batch import for that entity.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tome_collector::FilterSet;
use tome_core::types::ConvertedRecord;
use tome_db::repositories::CharacteristicRepo;
use tome_pipeline::{
    ConfigRegistry, IntegrationError, Orchestrator, PgDiscovery, PipelineSettings, RecordStore,
    RunOptions,
};

/// Stand-in persistence collaborator: logs validated records instead of
/// writing them. The host application wires its own [`RecordStore`].
struct LoggingStore;

#[async_trait::async_trait]
impl RecordStore for LoggingStore {
    async fn store(
        &self,
        entity: &str,
        record: &ConvertedRecord,
    ) -> Result<(), IntegrationError> {
        tracing::info!(
            entity,
            groups = record.len(),
            "Validated record ready for persistence",
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tome_worker=info,tome_pipeline=info,tome_collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = PipelineSettings::from_env();
    let pool = tome_db::create_pool(&settings.database_url).await?;
    tome_db::health_check(&pool).await?;

    let catalog = CharacteristicRepo::load_catalog(&pool).await?;
    let formulas = CharacteristicRepo::load_formulas(&pool).await?;

    let source_id = std::env::var("SOURCE_ID").unwrap_or_else(|_| "gamedata".into());
    let orchestrator = Orchestrator::new(
        ConfigRegistry::new(&settings.config_dir),
        &source_id,
        Arc::new(LoggingStore),
        Arc::new(PgDiscovery::new(pool.clone())),
        catalog,
        formulas,
    )?
    .with_request_timeout(std::time::Duration::from_secs(settings.request_timeout_secs));

    tracing::info!(source = %source_id, "Import worker ready");

    if let Ok(entity) = std::env::var("RUN_ENTITY") {
        let outcome = orchestrator
            .run_many(&entity, &FilterSet::new(), &RunOptions::default())
            .await?;
        tracing::info!(
            requested = outcome.requested,
            succeeded = outcome.succeeded,
            failed = outcome.errors.len(),
            "Batch import finished",
        );
        for item in &outcome.errors {
            tracing::warn!(id = ?item.id, error = %item.error, "Record import failed");
        }
    }

    Ok(())
}
