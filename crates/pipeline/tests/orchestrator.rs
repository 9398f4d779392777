//! Integration tests for the orchestrator's staged pipeline.
//!
//! Exercises the convert / validate / integrate flow with caller-supplied
//! raw records (the dry-run path), a temp-dir config registry, and stub
//! persistence / discovery collaborators. Collection against a live
//! source is covered by the collector's own pagination tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use serde_json::{json, Value};

use tome_core::formatter::FormulaBook;
use tome_core::formula::ConversionFormula;
use tome_core::types::ConvertedRecord;
use tome_core::validation::{
    CharacteristicCatalog, CharacteristicDefinition, CharacteristicType, EntityLimits,
};
use tome_pipeline::{
    ConfigError, ConfigRegistry, Discovery, IntegrationError, Orchestrator, RecordStore,
    RunOptions, Stage,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StubStore {
    records: Mutex<Vec<(String, ConvertedRecord)>>,
    fail: bool,
}

#[async_trait::async_trait]
impl RecordStore for StubStore {
    async fn store(
        &self,
        entity: &str,
        record: &ConvertedRecord,
    ) -> Result<(), IntegrationError> {
        if self.fail {
            return Err(IntegrationError::Store("disk full".to_string()));
        }
        self.records
            .lock()
            .unwrap()
            .push((entity.to_string(), record.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct StubDiscovery {
    touches: Mutex<Vec<(String, Vec<i64>)>>,
}

#[async_trait::async_trait]
impl Discovery for StubDiscovery {
    async fn touch(&self, registry: &str, codes: &[i64]) -> Result<(), IntegrationError> {
        self.touches
            .lock()
            .unwrap()
            .push((registry.to_string(), codes.to_vec()));
        Ok(())
    }
}

fn write(dir: &Path, relative: &str, value: &Value) {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn config_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "gamedata/source.json",
        &json!({
            "source": "gamedata",
            "baseUrl": "http://127.0.0.1:9",
            "defaultLanguage": "fr"
        }),
    );
    write(
        dir.path(),
        "gamedata/monster.json",
        &json!({
            "source": "gamedata",
            "entity": "monster",
            "endpoints": {
                "fetchOne": { "pathTemplate": "/monsters/{id}" },
                "fetchMany": { "path": "/monsters" }
            },
            "filters": { "supported": ["level", "raceId"] },
            "mapping": [
                {
                    "from": { "path": "name" },
                    "to": [ { "groups": ["creatures"], "field": "name", "formatter": "lang" } ]
                },
                {
                    "from": { "path": "grades.0.level" },
                    "to": [ { "groups": ["creatures"], "field": "level", "formatter": "level" } ]
                },
                {
                    "from": { "path": "grades.0.lifePoints" },
                    "to": [ { "groups": ["creatures"], "field": "life", "formatter": "life",
                              "args": { "levelFrom": "grades.0.level" } } ]
                },
                {
                    "from": { "path": "raceId" },
                    "to": [ { "groups": ["monsters"], "field": "race_id", "formatter": "int" } ]
                }
            ],
            "meta": {
                "classification": { "registry": "monster_races", "path": "raceId" }
            }
        }),
    );
    write(
        dir.path(),
        "gamedata/race.json",
        &json!({
            "source": "gamedata",
            "entity": "race",
            "endpoints": { "fetchMany": { "path": "/monsters" } },
            "mapping": [
                {
                    "from": { "path": "name" },
                    "to": [ { "groups": ["races"], "field": "name" } ]
                }
            ],
            "meta": {
                "collectStrategy": "catalog",
                "catalog": { "groupBy": "raceId", "value": "race.name" }
            }
        }),
    );
    dir
}

fn definition(
    id: &str,
    kind: CharacteristicType,
    required: bool,
) -> CharacteristicDefinition {
    CharacteristicDefinition {
        id: id.to_string(),
        db_column: format!("{id}_value"),
        kind,
        applies_to: BTreeSet::from(["monster".to_string()]),
        per_entity: BTreeMap::from([(
            "monster".to_string(),
            EntityLimits {
                required,
                ..Default::default()
            },
        )]),
    }
}

fn catalog() -> CharacteristicCatalog {
    let mut level = definition("level", CharacteristicType::Int, true);
    let limits = level.per_entity.get_mut("monster").unwrap();
    limits.min = Some(1);
    limits.max = Some(200);
    [level, definition("life", CharacteristicType::Int, true)]
        .into_iter()
        .map(|d| (d.id.clone(), d))
        .collect()
}

fn formulas() -> FormulaBook {
    let mut book = FormulaBook::new();
    book.insert(
        "monster",
        "level",
        ConversionFormula::from_value(&json!("floor([d] / 10)")),
    );
    book.insert(
        "monster",
        "life",
        ConversionFormula::from_value(&json!("floor([d] / 200) + [level] * 5")),
    );
    book
}

fn bouftou() -> Value {
    json!({
        "id": 31,
        "name": { "fr": "Bouftou" },
        "raceId": 1,
        "grades": [ { "level": 50, "lifePoints": 800 } ]
    })
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<StubStore>,
    discovery: Arc<StubDiscovery>,
    orchestrator: Orchestrator,
}

fn harness_with(store: StubStore) -> Harness {
    let dir = config_dir();
    let store = Arc::new(store);
    let discovery = Arc::new(StubDiscovery::default());
    let orchestrator = Orchestrator::new(
        ConfigRegistry::new(dir.path()),
        "gamedata",
        store.clone(),
        discovery.clone(),
        catalog(),
        formulas(),
    )
    .unwrap();
    Harness {
        _dir: dir,
        store,
        discovery,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(StubStore::default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dry_run_converts_and_validates_without_persisting() {
    let h = harness();
    let outcome = h
        .orchestrator
        .run_one_with_raw("monster", bouftou(), &RunOptions::dry_run())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.stage, Stage::Succeeded);
    let converted = outcome.converted.unwrap();
    assert_eq!(converted["creatures"]["level"], json!(5));
    assert_eq!(converted["creatures"]["life"], json!(29));
    assert!(outcome.validation.unwrap().valid);

    assert!(h.store.records.lock().unwrap().is_empty());
    assert!(h.discovery.touches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn full_run_persists_and_touches_discovery() {
    let h = harness();
    let outcome = h
        .orchestrator
        .run_one_with_raw("monster", bouftou(), &RunOptions::default())
        .await
        .unwrap();

    assert!(outcome.success);

    let records = h.store.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, "monster");
    assert_eq!(records[0].1["monsters"]["race_id"], json!(1));

    let touches = h.discovery.touches.lock().unwrap();
    assert_eq!(touches.len(), 1);
    assert_eq!(touches[0].0, "monster_races");
    assert_eq!(touches[0].1, vec![1]);
}

#[tokio::test]
async fn convert_off_returns_raw_only() {
    let h = harness();
    let options = RunOptions {
        convert: false,
        ..RunOptions::default()
    };
    let outcome = h
        .orchestrator
        .run_one_with_raw("monster", bouftou(), &options)
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.raw.is_some());
    assert!(outcome.converted.is_none());
    assert!(h.store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn validation_failure_carries_errors_and_partial_output() {
    let h = harness();
    // No grades: the derived level is 0, below the configured minimum.
    let raw = json!({ "id": 31, "name": { "fr": "Bouftou" } });
    let outcome = h
        .orchestrator
        .run_one_with_raw("monster", raw, &RunOptions::default())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stage, Stage::Validating);
    let validation = outcome.validation.unwrap();
    assert!(!validation.valid);
    assert!(outcome.converted.is_some());
    assert!(outcome.raw.is_some());
    assert!(h.store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_surfaces_at_integrating_with_data_intact() {
    let h = harness_with(StubStore {
        fail: true,
        ..Default::default()
    });
    let outcome = h
        .orchestrator
        .run_one_with_raw("monster", bouftou(), &RunOptions::default())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stage, Stage::Integrating);
    assert!(outcome.message.unwrap().contains("disk full"));
    // Already-validated data is not lost to the caller.
    assert!(outcome.converted.is_some());
    assert!(outcome.validation.is_some());
}

#[tokio::test]
async fn catalog_only_entity_is_never_integrated() {
    let h = harness();
    let raw = json!({ "raceId": 1, "race": { "name": "Bouftou" }, "name": { "fr": "Bouftou" } });
    let outcome = h
        .orchestrator
        .run_one_with_raw("race", raw, &RunOptions::default())
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(h.store.records.lock().unwrap().is_empty());
    assert!(h.discovery.touches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_entity_is_a_config_error() {
    let h = harness();
    let result = h
        .orchestrator
        .run_one_with_raw("spell", json!({}), &RunOptions::default())
        .await;
    assert_matches!(result, Err(ConfigError::NotFound { .. }));
}
