//! Translation of declared filters into the source's query protocol.
//!
//! The source speaks a skip/limit pagination convention with
//! bracket-suffixed filter operators: `field[$gte]` / `field[$lte]` for
//! ranges, `field[$in][]` for set membership, and `field[$search]` for
//! substring search.

use std::collections::BTreeMap;

use serde_json::Value;

/// One declared filter on a source field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact equality: `field=value`.
    Eq(Value),
    /// Inclusive range: `field[$gte]` / `field[$lte]`.
    Range { gte: Option<f64>, lte: Option<f64> },
    /// Set membership: `field[$in][]=a&field[$in][]=b`.
    In(Vec<Value>),
    /// Substring search: `field[$search]=needle`.
    Search(String),
}

/// Filters keyed by source field name, ordered for deterministic URLs.
pub type FilterSet = BTreeMap<String, Filter>;

/// Render a filter set as query pairs.
pub fn filter_pairs(filters: &FilterSet) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (field, filter) in filters {
        match filter {
            Filter::Eq(value) => pairs.push((field.clone(), param(value))),
            Filter::Range { gte, lte } => {
                if let Some(gte) = gte {
                    pairs.push((format!("{field}[$gte]"), format_number(*gte)));
                }
                if let Some(lte) = lte {
                    pairs.push((format!("{field}[$lte]"), format_number(*lte)));
                }
            }
            Filter::In(values) => {
                for value in values {
                    pairs.push((format!("{field}[$in][]"), param(value)));
                }
            }
            Filter::Search(needle) => {
                pairs.push((format!("{field}[$search]"), needle.clone()));
            }
        }
    }
    pairs
}

/// Render the skip/limit pagination pair.
pub fn page_pairs(skip: u64, limit: u64) -> Vec<(String, String)> {
    vec![
        ("$skip".to_string(), skip.to_string()),
        ("$limit".to_string(), limit.to_string()),
    ]
}

/// Render a JSON value as a query-parameter literal.
fn param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Whole numbers print without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_filter() {
        let mut filters = FilterSet::new();
        filters.insert("raceId".to_string(), Filter::Eq(json!(31)));
        assert_eq!(
            filter_pairs(&filters),
            vec![("raceId".to_string(), "31".to_string())]
        );
    }

    #[test]
    fn range_filter_renders_both_bounds() {
        let mut filters = FilterSet::new();
        filters.insert(
            "level".to_string(),
            Filter::Range {
                gte: Some(10.0),
                lte: Some(50.0),
            },
        );
        assert_eq!(
            filter_pairs(&filters),
            vec![
                ("level[$gte]".to_string(), "10".to_string()),
                ("level[$lte]".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn half_open_range_renders_one_bound() {
        let mut filters = FilterSet::new();
        filters.insert(
            "level".to_string(),
            Filter::Range {
                gte: Some(1.5),
                lte: None,
            },
        );
        assert_eq!(
            filter_pairs(&filters),
            vec![("level[$gte]".to_string(), "1.5".to_string())]
        );
    }

    #[test]
    fn in_filter_repeats_the_key() {
        let mut filters = FilterSet::new();
        filters.insert("typeId".to_string(), Filter::In(vec![json!(1), json!(2)]));
        assert_eq!(
            filter_pairs(&filters),
            vec![
                ("typeId[$in][]".to_string(), "1".to_string()),
                ("typeId[$in][]".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn search_filter() {
        let mut filters = FilterSet::new();
        filters.insert("name".to_string(), Filter::Search("bouf".to_string()));
        assert_eq!(
            filter_pairs(&filters),
            vec![("name[$search]".to_string(), "bouf".to_string())]
        );
    }

    #[test]
    fn filters_render_in_field_order() {
        let mut filters = FilterSet::new();
        filters.insert("b".to_string(), Filter::Eq(json!(2)));
        filters.insert("a".to_string(), Filter::Eq(json!(1)));
        let pairs = filter_pairs(&filters);
        assert_eq!(pairs[0].0, "a");
        assert_eq!(pairs[1].0, "b");
    }

    #[test]
    fn pagination_pair() {
        assert_eq!(
            page_pairs(40, 20),
            vec![
                ("$skip".to_string(), "40".to_string()),
                ("$limit".to_string(), "20".to_string()),
            ]
        );
    }
}
