//! Loads the characteristic catalog and conversion formulas into the
//! in-memory handles consumed by the validation engine and the formatter
//! registry.

use std::collections::BTreeMap;

use sqlx::PgPool;
use tome_core::formatter::FormulaBook;
use tome_core::formula::ConversionFormula;
use tome_core::validation::{
    CharacteristicCatalog, CharacteristicDefinition, CharacteristicType, EntityLimits,
};

use crate::models::characteristic::{CatalogRow, ConversionFormulaRow};

pub struct CharacteristicRepo;

impl CharacteristicRepo {
    /// Materialize the full characteristic catalog.
    pub async fn load_catalog(pool: &PgPool) -> Result<CharacteristicCatalog, sqlx::Error> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            "SELECT c.slug, c.db_column, c.kind, l.entity_type, l.min_value, l.max_value, \
                    l.required, l.validation_message, l.value_available \
             FROM characteristics c \
             LEFT JOIN characteristic_limits l ON l.characteristic_id = c.id \
             ORDER BY c.slug, l.entity_type",
        )
        .fetch_all(pool)
        .await?;

        let mut catalog = CharacteristicCatalog::new();
        for row in rows {
            let Some(kind) = CharacteristicType::from_str(&row.kind) else {
                tracing::warn!(slug = %row.slug, kind = %row.kind, "Skipping characteristic with unknown kind");
                continue;
            };
            let definition =
                catalog
                    .entry(row.slug.clone())
                    .or_insert_with(|| CharacteristicDefinition {
                        id: row.slug.clone(),
                        db_column: row.db_column.clone(),
                        kind,
                        applies_to: Default::default(),
                        per_entity: BTreeMap::new(),
                    });
            if let Some(entity) = row.entity_type {
                definition.applies_to.insert(entity.clone());
                definition.per_entity.insert(
                    entity,
                    EntityLimits {
                        min: row.min_value,
                        max: row.max_value,
                        required: row.required.unwrap_or(false),
                        validation_message: row.validation_message,
                        value_available: row
                            .value_available
                            .and_then(|v| v.as_array().cloned()),
                    },
                );
            }
        }

        tracing::debug!(characteristics = catalog.len(), "Loaded characteristic catalog");
        Ok(catalog)
    }

    /// Materialize the conversion formula book.
    pub async fn load_formulas(pool: &PgPool) -> Result<FormulaBook, sqlx::Error> {
        let rows = sqlx::query_as::<_, ConversionFormulaRow>(
            "SELECT entity_type, characteristic, formula FROM conversion_formulas",
        )
        .fetch_all(pool)
        .await?;

        let mut book = FormulaBook::new();
        for row in rows {
            book.insert(
                &row.entity_type,
                &row.characteristic,
                ConversionFormula::from_value(&row.formula),
            );
        }

        tracing::debug!(formulas = book.len(), "Loaded conversion formulas");
        Ok(book)
    }
}
