//! Repository for the discovery registry tables.
//!
//! One routine serves every registry: the tables share the
//! classification-code / decision / counter core and differ only in
//! their placeholder defaults, so operations are parameterized by a
//! [`RegistryTable`] descriptor.

use sqlx::PgPool;

use crate::models::discovery::{
    BulkDecisionOutcome, Decision, DecisionError, DiscoveryRow, TouchSummary,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, classification_code, decision, seen_count, last_seen_at, \
    name, created_by, created_at, updated_at";

// ── Registry descriptors ─────────────────────────────────────────────

/// Describes one registry table: its name plus the SQL fragments for
/// registry-specific placeholder columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryTable {
    /// Lookup key used in entity config (`meta.classification.registry`).
    pub name: &'static str,
    /// Postgres table name.
    pub table: &'static str,
    /// Extra column-list fragment for placeholder inserts. Either empty
    /// or a comma-prefixed list (e.g. `", category"`).
    pub placeholder_columns: &'static str,
    /// Matching SELECT fragment supplying the extra values.
    pub placeholder_values: &'static str,
}

pub const MONSTER_RACES: RegistryTable = RegistryTable {
    name: "monster_races",
    table: "discovered_monster_races",
    placeholder_columns: "",
    placeholder_values: "",
};

pub const ITEM_TYPES: RegistryTable = RegistryTable {
    name: "item_types",
    table: "discovered_item_types",
    placeholder_columns: ", category",
    placeholder_values: ", 'uncategorized'",
};

pub const CONSUMABLE_TYPES: RegistryTable = RegistryTable {
    name: "consumable_types",
    table: "discovered_consumable_types",
    placeholder_columns: ", effect_kind",
    placeholder_values: ", 'unknown'",
};

/// All known registries.
pub const REGISTRIES: &[&RegistryTable] = &[&MONSTER_RACES, &ITEM_TYPES, &CONSUMABLE_TYPES];

/// Resolve a registry by its config name.
pub fn registry_by_name(name: &str) -> Option<&'static RegistryTable> {
    REGISTRIES.iter().copied().find(|r| r.name == name)
}

// ── Repository ───────────────────────────────────────────────────────

/// Batch-upsert and moderation access for discovery registries.
pub struct DiscoveryRepo;

impl DiscoveryRepo {
    /// Record sightings of classification codes.
    ///
    /// Non-positive codes are discarded and the rest deduplicated. Absent
    /// rows are inserted as `pending` placeholders with `ON CONFLICT DO
    /// NOTHING` (concurrent callers never fail on a duplicate-key race);
    /// then one bulk update increments `seen_count` and refreshes
    /// `last_seen_at` for every requested code. Must stay two ordered
    /// statements, never a read-then-write sequence.
    pub async fn touch_many(
        pool: &PgPool,
        registry: &RegistryTable,
        codes: &[i64],
    ) -> Result<TouchSummary, sqlx::Error> {
        let mut codes: Vec<i64> = codes.iter().copied().filter(|code| *code > 0).collect();
        codes.sort_unstable();
        codes.dedup();
        if codes.is_empty() {
            return Ok(TouchSummary {
                requested: 0,
                inserted: 0,
                updated: 0,
            });
        }

        let insert = format!(
            "INSERT INTO {table} (classification_code{extra_columns}) \
             SELECT code{extra_values} FROM unnest($1::bigint[]) AS t(code) \
             ON CONFLICT (classification_code) DO NOTHING",
            table = registry.table,
            extra_columns = registry.placeholder_columns,
            extra_values = registry.placeholder_values,
        );
        let inserted = sqlx::query(&insert)
            .bind(&codes)
            .execute(pool)
            .await?
            .rows_affected();

        let update = format!(
            "UPDATE {table} \
             SET seen_count = seen_count + 1, last_seen_at = NOW(), updated_at = NOW() \
             WHERE classification_code = ANY($1)",
            table = registry.table,
        );
        let updated = sqlx::query(&update)
            .bind(&codes)
            .execute(pool)
            .await?
            .rows_affected();

        tracing::debug!(
            registry = registry.name,
            requested = codes.len(),
            inserted,
            updated,
            "Touched discovery registry",
        );

        Ok(TouchSummary {
            requested: codes.len() as u64,
            inserted,
            updated,
        })
    }

    /// Find a single registry row by classification code.
    pub async fn find_by_code(
        pool: &PgPool,
        registry: &RegistryTable,
        code: i64,
    ) -> Result<Option<DiscoveryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {table} WHERE classification_code = $1",
            table = registry.table,
        );
        sqlx::query_as::<_, DiscoveryRow>(&query)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// List rows in a moderation state, oldest sighting first.
    pub async fn list_by_decision(
        pool: &PgPool,
        registry: &RegistryTable,
        decision: Decision,
    ) -> Result<Vec<DiscoveryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {table} WHERE decision = $1 ORDER BY created_at, id",
            table = registry.table,
        );
        sqlx::query_as::<_, DiscoveryRow>(&query)
            .bind(decision.as_str())
            .fetch_all(pool)
            .await
    }

    /// Set the moderation decision for one code. Moderation-surface only;
    /// the pipeline itself never writes decisions.
    ///
    /// Returns `None` if no row with the given code exists.
    pub async fn set_decision(
        pool: &PgPool,
        registry: &RegistryTable,
        code: i64,
        decision: Decision,
        decided_by: Option<&str>,
    ) -> Result<Option<DiscoveryRow>, sqlx::Error> {
        let query = format!(
            "UPDATE {table} \
             SET decision = $2, created_by = COALESCE($3, created_by), updated_at = NOW() \
             WHERE classification_code = $1 \
             RETURNING {COLUMNS}",
            table = registry.table,
        );
        sqlx::query_as::<_, DiscoveryRow>(&query)
            .bind(code)
            .bind(decision.as_str())
            .bind(decided_by)
            .fetch_optional(pool)
            .await
    }

    /// Apply moderation decisions in bulk. One item's failure never
    /// aborts the batch; failures are accumulated per code.
    pub async fn set_decisions(
        pool: &PgPool,
        registry: &RegistryTable,
        updates: &[(i64, Decision)],
        decided_by: Option<&str>,
    ) -> BulkDecisionOutcome {
        let mut outcome = BulkDecisionOutcome {
            requested: updates.len(),
            updated: 0,
            errors: Vec::new(),
        };

        for (code, decision) in updates {
            match Self::set_decision(pool, registry, *code, *decision, decided_by).await {
                Ok(Some(_)) => outcome.updated += 1,
                Ok(None) => outcome.errors.push(DecisionError {
                    classification_code: *code,
                    error: "unknown classification code".to_string(),
                }),
                Err(e) => outcome.errors.push(DecisionError {
                    classification_code: *code,
                    error: e.to_string(),
                }),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup_by_name() {
        assert_eq!(registry_by_name("monster_races"), Some(&MONSTER_RACES));
        assert_eq!(registry_by_name("item_types"), Some(&ITEM_TYPES));
        assert!(registry_by_name("spells").is_none());
    }

    #[test]
    fn placeholder_fragments_are_paired() {
        for registry in REGISTRIES {
            assert_eq!(
                registry.placeholder_columns.is_empty(),
                registry.placeholder_values.is_empty(),
                "{}",
                registry.name
            );
        }
    }
}
