//! Config registry: loads and validates the declarative per-source and
//! per-entity JSON files, plus process-level settings from the
//! environment.
//!
//! Layout on disk: `<dir>/<source>/source.json` for the source config and
//! `<dir>/<source>/<entity>.json` per entity. The registry is a pure
//! reader; callers may cache results externally.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tome_core::config::{
    validate_entity_value, validate_source_value, EntityConfig, SourceConfig,
};

// ── Errors ───────────────────────────────────────────────────────────

/// Declarative-config failures. All of these are fatal and abort before
/// any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {detail}")]
    Io { path: String, detail: String },

    #[error("{path} is not valid JSON: {detail}")]
    Parse { path: String, detail: String },

    #[error("invalid config in {path}: {detail}")]
    Invalid { path: String, detail: String },

    #[error("identity mismatch in {path}: expected '{expected}', found '{found}'")]
    IdentityMismatch {
        path: String,
        expected: String,
        found: String,
    },
}

// ── Registry ─────────────────────────────────────────────────────────

/// Loads source and entity configs from a base directory.
pub struct ConfigRegistry {
    base_dir: PathBuf,
}

impl ConfigRegistry {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Load a source config; its declared `source` must match.
    pub fn load_source(&self, source_id: &str) -> Result<SourceConfig, ConfigError> {
        let path = self.base_dir.join(source_id).join("source.json");
        let value = read_json(&path)?;
        validate_source_value(&value).map_err(|detail| ConfigError::Invalid {
            path: display(&path),
            detail,
        })?;
        let config: SourceConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                path: display(&path),
                detail: e.to_string(),
            })?;
        if config.source != source_id {
            return Err(ConfigError::IdentityMismatch {
                path: display(&path),
                expected: source_id.to_string(),
                found: config.source,
            });
        }
        Ok(config)
    }

    /// Load an entity config; its declared `source` and `entity` must
    /// match the requested identity.
    pub fn load_entity(
        &self,
        source_id: &str,
        entity_id: &str,
    ) -> Result<EntityConfig, ConfigError> {
        let path = self
            .base_dir
            .join(source_id)
            .join(format!("{entity_id}.json"));
        let value = read_json(&path)?;
        validate_entity_value(&value).map_err(|detail| ConfigError::Invalid {
            path: display(&path),
            detail,
        })?;
        let config: EntityConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                path: display(&path),
                detail: e.to_string(),
            })?;
        if config.source != source_id || config.entity != entity_id {
            return Err(ConfigError::IdentityMismatch {
                path: display(&path),
                expected: format!("{source_id}/{entity_id}"),
                found: format!("{}/{}", config.source, config.entity),
            });
        }
        Ok(config)
    }

    /// List the entity ids configured for a source.
    pub fn list_entities(&self, source_id: &str) -> Result<Vec<String>, ConfigError> {
        let dir = self.base_dir.join(source_id);
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound { path: display(&dir) }
            } else {
                ConfigError::Io {
                    path: display(&dir),
                    detail: e.to_string(),
                }
            }
        })?;

        let mut entities: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let stem = name.strip_suffix(".json")?;
                if stem == "source" {
                    None
                } else {
                    Some(stem.to_string())
                }
            })
            .collect();
        entities.sort();
        Ok(entities)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: display(path) }
        } else {
            ConfigError::Io {
                path: display(path),
                detail: e.to_string(),
            }
        }
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: display(path),
        detail: e.to_string(),
    })
}

// ── Process settings ─────────────────────────────────────────────────

/// Pipeline process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Postgres connection string.
    pub database_url: String,
    /// Base directory of the declarative configs.
    pub config_dir: PathBuf,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl PipelineSettings {
    /// Load settings from environment variables.
    ///
    /// | Env Var                | Default      |
    /// |------------------------|--------------|
    /// | `DATABASE_URL`         | (required)   |
    /// | `CONFIG_DIR`           | `config`     |
    /// | `REQUEST_TIMEOUT_SECS` | `30`         |
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let config_dir: PathBuf = std::env::var("CONFIG_DIR")
            .unwrap_or_else(|_| "config".into())
            .into();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            database_url,
            config_dir,
            request_timeout_secs,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
