//! Integration tests for the characteristic catalog loader.

use sqlx::PgPool;
use tome_core::validation::CharacteristicType;
use tome_db::repositories::CharacteristicRepo;

async fn seed(pool: &PgPool) {
    let level: (i64,) = sqlx::query_as(
        "INSERT INTO characteristics (slug, db_column, kind) \
         VALUES ('level', 'level_value', 'int') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let element: (i64,) = sqlx::query_as(
        "INSERT INTO characteristics (slug, db_column, kind) \
         VALUES ('element', 'element_kinds', 'array') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO characteristic_limits \
            (characteristic_id, entity_type, min_value, max_value, required, validation_message) \
         VALUES ($1, 'monster', 1, 200, TRUE, 'level out of [:min, :max]')",
    )
    .bind(level.0)
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO characteristic_limits \
            (characteristic_id, entity_type, value_available) \
         VALUES ($1, 'monster', '[\"earth\", \"fire\", \"water\", \"air\", \"neutral\"]'::jsonb)",
    )
    .bind(element.0)
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO conversion_formulas (entity_type, characteristic, formula) VALUES \
            ('monster', 'level', '\"floor([d] / 10)\"'::jsonb), \
            ('monster', 'tier', '{\"characteristic\": \"level\", \"1\": 0, \"7\": 2}'::jsonb)",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn loads_definitions_with_per_entity_limits(pool: PgPool) {
    seed(&pool).await;

    let catalog = CharacteristicRepo::load_catalog(&pool).await.unwrap();
    assert_eq!(catalog.len(), 2);

    let level = &catalog["level"];
    assert_eq!(level.db_column, "level_value");
    assert_eq!(level.kind, CharacteristicType::Int);
    assert!(level.applies_to.contains("monster"));

    let limits = level.limits_for("monster").unwrap();
    assert_eq!(limits.min, Some(1));
    assert_eq!(limits.max, Some(200));
    assert!(limits.required);
    assert_eq!(
        limits.validation_message.as_deref(),
        Some("level out of [:min, :max]")
    );

    let element = &catalog["element"];
    assert_eq!(element.kind, CharacteristicType::Array);
    let allowed = element
        .limits_for("monster")
        .unwrap()
        .value_available
        .as_ref()
        .unwrap();
    assert_eq!(allowed.len(), 5);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn loads_expression_and_table_formulas(pool: PgPool) {
    seed(&pool).await;

    let book = CharacteristicRepo::load_formulas(&pool).await.unwrap();
    assert_eq!(book.len(), 2);

    let vars: std::collections::HashMap<String, f64> =
        [("d".to_string(), 50.0), ("level".to_string(), 10.0)]
            .into_iter()
            .collect();
    let level = book.get("monster", "level").unwrap();
    assert_eq!(level.evaluate(&vars).unwrap(), Some(5.0));

    let tier = book.get("monster", "tier").unwrap();
    assert_eq!(tier.evaluate(&vars).unwrap(), Some(2.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_catalog_loads_cleanly(pool: PgPool) {
    let catalog = CharacteristicRepo::load_catalog(&pool).await.unwrap();
    assert!(catalog.is_empty());
    let book = CharacteristicRepo::load_formulas(&pool).await.unwrap();
    assert!(book.is_empty());
}
