//! Percentage-to-tier resistance conversion.
//!
//! The source model stores one resistance percentage per element; the
//! target ruleset knows four discrete tiers plus neutral. Each percentage
//! maps to a tier through ordered threshold ranges, then per-tier caps
//! limit how many elements of one record may occupy each tier.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::mapper::resolve_path;

/// The five elements, in evaluation order. Order matters: when two
/// elements qualify for a capped tier with equal magnitude, the one
/// earlier in this list keeps its tier.
pub const ELEMENTS: &[&str] = &["neutral", "earth", "fire", "water", "air"];

// ── Parameters ───────────────────────────────────────────────────────

/// One percentage range mapping to a tier. Bounds are inclusive; ranges
/// are tried in declaration order and the first match wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierRange {
    pub tier: i32,
    pub min: f64,
    pub max: f64,
}

/// Default threshold ranges: `[90, 101] -> 100`, `[40, 90] -> 50`,
/// `[-90, -40] -> -50`, `[-101, -90] -> -100`, everything else neutral.
pub const DEFAULT_THRESHOLDS: &[TierRange] = &[
    TierRange { tier: 100, min: 90.0, max: 101.0 },
    TierRange { tier: 50, min: 40.0, max: 90.0 },
    TierRange { tier: -50, min: -90.0, max: -40.0 },
    TierRange { tier: -100, min: -101.0, max: -90.0 },
];

/// How many elements of one record may occupy each non-neutral tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCaps {
    /// Tier `100`.
    pub invulnerable: usize,
    /// Tier `50`.
    pub resistant: usize,
    /// Tier `-50`.
    pub weak: usize,
    /// Tier `-100`.
    pub vulnerable: usize,
}

impl Default for TierCaps {
    fn default() -> Self {
        Self {
            invulnerable: 1,
            resistant: 3,
            weak: 3,
            vulnerable: 2,
        }
    }
}

impl TierCaps {
    fn cap_for(&self, tier: i32) -> Option<usize> {
        match tier {
            100 => Some(self.invulnerable),
            50 => Some(self.resistant),
            -50 => Some(self.weak),
            -100 => Some(self.vulnerable),
            _ => None,
        }
    }
}

/// Conversion parameters, overridable per entity via formatter args.
#[derive(Debug, Clone)]
pub struct ResistanceParams {
    pub thresholds: Vec<TierRange>,
    pub caps: TierCaps,
}

impl Default for ResistanceParams {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            caps: TierCaps::default(),
        }
    }
}

impl ResistanceParams {
    /// Read overrides from formatter args. Missing keys keep defaults.
    ///
    /// Shape: `{"thresholds": [{"tier": 100, "min": 90, "max": 101}, ...],
    /// "caps": {"invulnerable": 1, "resistant": 3, "weak": 3,
    /// "vulnerable": 2}}`.
    pub fn from_args(args: &Value) -> Self {
        let mut params = Self::default();

        if let Some(ranges) = args.get("thresholds").and_then(|t| t.as_array()) {
            let parsed: Vec<TierRange> = ranges
                .iter()
                .filter_map(|entry| {
                    Some(TierRange {
                        tier: entry.get("tier")?.as_i64()? as i32,
                        min: entry.get("min")?.as_f64()?,
                        max: entry.get("max")?.as_f64()?,
                    })
                })
                .collect();
            if !parsed.is_empty() {
                params.thresholds = parsed;
            }
        }

        if let Some(caps) = args.get("caps") {
            let read = |key: &str, fallback: usize| {
                caps.get(key)
                    .and_then(|v| v.as_u64())
                    .map(|v| v as usize)
                    .unwrap_or(fallback)
            };
            params.caps = TierCaps {
                invulnerable: read("invulnerable", params.caps.invulnerable),
                resistant: read("resistant", params.caps.resistant),
                weak: read("weak", params.caps.weak),
                vulnerable: read("vulnerable", params.caps.vulnerable),
            };
        }

        params
    }
}

// ── Conversion ───────────────────────────────────────────────────────

/// Convert a raw record's five element percentages into tier fields.
///
/// Percentages are read from `<element>Resistance` keys, either at the top
/// level or nested under the first `grades[]` entry when one is present.
/// Missing fields read as `0`. The output carries, per element, the tier
/// as a stringified integer plus a fixed-remainder companion field that is
/// always `"0"` (a reserved extension point).
pub fn convert(raw: &Value, params: &ResistanceParams) -> BTreeMap<String, String> {
    let source = match resolve_path(raw, "grades.0") {
        Value::Null => raw,
        grade => grade,
    };

    let mut assigned: Vec<(usize, f64, i32)> = ELEMENTS
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let percent = source
                .get(format!("{element}Resistance"))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            (index, percent, tier_for(percent, &params.thresholds))
        })
        .collect();

    apply_caps(&mut assigned, &params.caps);

    let mut output = BTreeMap::new();
    for (index, _, tier) in &assigned {
        let element = ELEMENTS[*index];
        output.insert(format!("resistance_{element}"), tier.to_string());
        output.insert(format!("resistance_fix_{element}"), "0".to_string());
    }
    output
}

fn tier_for(percent: f64, thresholds: &[TierRange]) -> i32 {
    thresholds
        .iter()
        .find(|range| percent >= range.min && percent <= range.max)
        .map(|range| range.tier)
        .unwrap_or(0)
}

/// Demote tier assignments that exceed their cap.
///
/// Candidates are visited in descending absolute magnitude; the sort is
/// stable, so equal magnitudes keep element-declaration order and the
/// outcome is deterministic.
fn apply_caps(assigned: &mut [(usize, f64, i32)], caps: &TierCaps) {
    let mut order: Vec<usize> = (0..assigned.len())
        .filter(|&i| assigned[i].2 != 0)
        .collect();
    order.sort_by(|&a, &b| {
        assigned[b]
            .1
            .abs()
            .partial_cmp(&assigned[a].1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut used: BTreeMap<i32, usize> = BTreeMap::new();
    for i in order {
        let tier = assigned[i].2;
        let Some(cap) = caps.cap_for(tier) else {
            continue;
        };
        let count = used.entry(tier).or_insert(0);
        if *count < cap {
            *count += 1;
        } else {
            assigned[i].2 = 0;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, f64)]) -> Value {
        let mut map = serde_json::Map::new();
        for (element, percent) in pairs {
            map.insert(format!("{element}Resistance"), json!(percent));
        }
        Value::Object(map)
    }

    #[test]
    fn default_thresholds_map_to_tiers() {
        let raw = record(&[
            ("neutral", 95.0),
            ("earth", 50.0),
            ("fire", -60.0),
            ("water", -95.0),
            ("air", 10.0),
        ]);
        let out = convert(&raw, &ResistanceParams::default());
        assert_eq!(out["resistance_neutral"], "100");
        assert_eq!(out["resistance_earth"], "50");
        assert_eq!(out["resistance_fire"], "-50");
        assert_eq!(out["resistance_water"], "-100");
        assert_eq!(out["resistance_air"], "0");
    }

    #[test]
    fn boundary_values_follow_declaration_order() {
        let raw = record(&[("earth", 90.0), ("fire", 40.0), ("water", -40.0), ("air", -90.0)]);
        let out = convert(&raw, &ResistanceParams::default());
        assert_eq!(out["resistance_earth"], "100");
        assert_eq!(out["resistance_fire"], "50");
        assert_eq!(out["resistance_water"], "-50");
        assert_eq!(out["resistance_air"], "-50");
    }

    #[test]
    fn invulnerable_cap_keeps_first_of_equal_magnitudes() {
        // Three elements qualify for tier 100; the default cap is 1. All
        // have equal magnitude, so the first in element order wins.
        let raw = record(&[("neutral", 95.0), ("earth", 95.0), ("fire", 95.0)]);
        let out = convert(&raw, &ResistanceParams::default());
        assert_eq!(out["resistance_neutral"], "100");
        assert_eq!(out["resistance_earth"], "0");
        assert_eq!(out["resistance_fire"], "0");
    }

    #[test]
    fn cap_prefers_higher_magnitude() {
        let raw = record(&[("neutral", 92.0), ("earth", 99.0)]);
        let out = convert(&raw, &ResistanceParams::default());
        assert_eq!(out["resistance_earth"], "100");
        assert_eq!(out["resistance_neutral"], "0");
    }

    #[test]
    fn vulnerable_cap_is_two() {
        let raw = record(&[("earth", -100.0), ("fire", -100.0), ("water", -100.0)]);
        let out = convert(&raw, &ResistanceParams::default());
        let demoted = ELEMENTS
            .iter()
            .filter(|e| out[&format!("resistance_{e}")] == "0")
            .count();
        assert_eq!(demoted, 3); // neutral + air were already 0, water demoted
        assert_eq!(out["resistance_earth"], "-100");
        assert_eq!(out["resistance_fire"], "-100");
        assert_eq!(out["resistance_water"], "0");
    }

    #[test]
    fn reads_first_grade_entry_when_nested() {
        let raw = json!({
            "grades": [
                { "earthResistance": 95 },
                { "earthResistance": 10 }
            ]
        });
        let out = convert(&raw, &ResistanceParams::default());
        assert_eq!(out["resistance_earth"], "100");
    }

    #[test]
    fn missing_input_reads_zero() {
        let out = convert(&json!({}), &ResistanceParams::default());
        for element in ELEMENTS {
            assert_eq!(out[&format!("resistance_{element}")], "0");
        }
    }

    #[test]
    fn fixed_remainder_is_always_zero() {
        let raw = record(&[("neutral", 95.0), ("earth", -95.0)]);
        let out = convert(&raw, &ResistanceParams::default());
        for element in ELEMENTS {
            assert_eq!(out[&format!("resistance_fix_{element}")], "0");
        }
    }

    #[test]
    fn thresholds_are_overridable() {
        let args = json!({
            "thresholds": [ { "tier": 100, "min": 10, "max": 101 } ]
        });
        let raw = record(&[("earth", 15.0)]);
        let out = convert(&raw, &ResistanceParams::from_args(&args));
        assert_eq!(out["resistance_earth"], "100");
    }

    #[test]
    fn caps_are_overridable() {
        let args = json!({ "caps": { "invulnerable": 3 } });
        let raw = record(&[("neutral", 95.0), ("earth", 95.0), ("fire", 95.0)]);
        let out = convert(&raw, &ResistanceParams::from_args(&args));
        for element in ["neutral", "earth", "fire"] {
            assert_eq!(out[&format!("resistance_{element}")], "100");
        }
    }
}
