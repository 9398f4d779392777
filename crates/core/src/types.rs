/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A converted record: model group -> field -> value.
///
/// Model groups ("creatures", "monsters", ...) correspond to the internal
/// storage tables that together compose one logical entity. The map is
/// ordered so that merging groups is deterministic.
pub type ConvertedRecord =
    std::collections::BTreeMap<String, serde_json::Map<String, serde_json::Value>>;
