//! Travel matrix normalization.
//!
//! Raw matrices are nested `origin -> destination -> value` mappings whose keys
//! are coordinate strings written longitude first, at whatever precision the
//! producing tool used. Normalization rewrites every key to its canonical form
//! so appointment and office coordinates hit the matrix exactly, and coerces
//! values to non-negative integers.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::coordinate::{Coordinate, canonical_or_opaque};
use crate::traits::DistanceMatrixProvider;

/// Default lower bound for off-diagonal travel durations, in seconds.
pub const DURATION_FLOOR_SECONDS: i64 = 300;

/// Raw matrix in file order. Order decides which entry wins when two raw keys
/// share a canonical key.
pub type RawMatrix = IndexMap<String, IndexMap<String, Value>>;
pub type KeyedMatrix = BTreeMap<String, BTreeMap<String, i64>>;

/// The `matrix` section of the scheduling document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelMatrix {
    /// Meters.
    #[serde(default)]
    pub distance: KeyedMatrix,
    /// Seconds.
    #[serde(default)]
    pub duration: KeyedMatrix,
}

/// What normalization had to repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixReport {
    pub cells: usize,
    /// Values that were not a finite non-negative number and became 0.
    pub coerced: usize,
    /// Off-diagonal durations raised to the floor.
    pub floored: usize,
    /// Cells overwritten because two raw keys share a canonical key.
    pub collisions: usize,
}

impl MatrixReport {
    fn absorb(&mut self, other: MatrixReport) {
        self.cells += other.cells;
        self.coerced += other.coerced;
        self.floored += other.floored;
        self.collisions += other.collisions;
    }
}

/// Extract the named nested mapping from a loaded matrix file.
///
/// A missing section, or a row that is not an object, is treated as empty.
pub fn raw_section(document: &Value, name: &str) -> RawMatrix {
    let Some(outer) = document.get(name).and_then(Value::as_object) else {
        debug!(section = name, "matrix section missing, using empty mapping");
        return RawMatrix::new();
    };

    outer
        .iter()
        .map(|(origin, row)| {
            let inner = row
                .as_object()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|(dest, value)| (dest.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();
            (origin.clone(), inner)
        })
        .collect()
}

/// Canonicalize keys and coerce values to integer meters.
pub fn normalize_distance(raw: &RawMatrix) -> (KeyedMatrix, MatrixReport) {
    normalize_with(raw, |_, value| value)
}

/// Canonicalize keys, coerce values to integer seconds and raise every
/// off-diagonal entry to at least `floor_seconds`.
pub fn normalize_duration(raw: &RawMatrix, floor_seconds: i64) -> (KeyedMatrix, MatrixReport) {
    let mut floored = 0;
    let (matrix, mut report) = normalize_with(raw, |diagonal, value| {
        if !diagonal && value < floor_seconds {
            floored += 1;
            floor_seconds
        } else {
            value
        }
    });
    report.floored = floored;
    (matrix, report)
}

/// Normalize both raw matrices into the document's `matrix` section.
pub fn normalize(
    distance: &RawMatrix,
    duration: &RawMatrix,
    floor_seconds: i64,
) -> (TravelMatrix, MatrixReport) {
    let (distance, mut report) = normalize_distance(distance);
    let (duration, duration_report) = normalize_duration(duration, floor_seconds);
    report.absorb(duration_report);
    (TravelMatrix { distance, duration }, report)
}

fn normalize_with(
    raw: &RawMatrix,
    mut adjust: impl FnMut(bool, i64) -> i64,
) -> (KeyedMatrix, MatrixReport) {
    let mut out = KeyedMatrix::new();
    let mut report = MatrixReport::default();

    for (origin, row) in raw {
        let origin_key = canonical_or_opaque(origin);
        let target = out.entry(origin_key.clone()).or_default();

        for (dest, value) in row {
            let dest_key = canonical_or_opaque(dest);
            let coerced = coerce(value);
            if coerced.is_none() {
                report.coerced += 1;
                debug!(origin = %origin, dest = %dest, value = %value, "matrix value coerced to 0");
            }
            let value = adjust(origin_key == dest_key, coerced.unwrap_or(0));

            report.cells += 1;
            if target.insert(dest_key.clone(), value).is_some() {
                report.collisions += 1;
                debug!(origin = %origin_key, dest = %dest_key, "matrix key collision, last value kept");
            }
        }
    }

    (out, report)
}

/// Numeric value truncated toward zero; `None` for anything else.
fn coerce(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 || number >= i64::MAX as f64 {
        return None;
    }
    Some(number.trunc() as i64)
}

impl TravelMatrix {
    pub fn distance_between(&self, origin: &str, destination: &str) -> Option<i64> {
        lookup(&self.distance, origin, destination)
    }

    pub fn duration_between(&self, origin: &str, destination: &str) -> Option<i64> {
        lookup(&self.duration, origin, destination)
    }
}

/// Exact key first, then canonicalized keys to absorb precision differences
/// between the matrix producer and the document.
fn lookup(matrix: &KeyedMatrix, origin: &str, destination: &str) -> Option<i64> {
    let (origin, destination) = (origin.trim(), destination.trim());
    let canonical_origin = canonical_or_opaque(origin);
    let canonical_dest = canonical_or_opaque(destination);

    [
        (origin, destination),
        (canonical_origin.as_str(), canonical_dest.as_str()),
        (origin, canonical_dest.as_str()),
        (canonical_origin.as_str(), destination),
    ]
    .into_iter()
    .find_map(|(o, d)| matrix.get(o).and_then(|row| row.get(d)).copied())
}

/// Query a provider for the given points and key the result by canonical
/// coordinate, ready for [`normalize`].
///
/// Returns empty matrices if the provider's tables do not cover every point.
pub fn raw_from_provider<P: DistanceMatrixProvider>(
    provider: &P,
    locations: &[Coordinate],
) -> (RawMatrix, RawMatrix) {
    let table = provider.matrix_for(locations);
    if !table.is_square(locations.len()) {
        warn!(
            points = locations.len(),
            rows = table.distance.len(),
            "travel table does not cover the requested points"
        );
        return (RawMatrix::new(), RawMatrix::new());
    }

    let keys: Vec<String> = locations.iter().map(Coordinate::key).collect();
    let keyed = |rows: &[Vec<i64>]| -> RawMatrix {
        keys.iter()
            .zip(rows)
            .map(|(origin, row)| {
                let inner = keys
                    .iter()
                    .zip(row)
                    .map(|(dest, value)| (dest.clone(), Value::from(*value)))
                    .collect();
                (origin.clone(), inner)
            })
            .collect()
    };

    (keyed(&table.distance), keyed(&table.duration))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::haversine::HaversineMatrix;

    fn raw(value: Value) -> RawMatrix {
        serde_json::from_value(value).expect("raw matrix")
    }

    #[test]
    fn test_keys_are_canonicalized() {
        let (matrix, report) = normalize_distance(&raw(json!({
            "27.4365870,38.6265120": {"27.5000,38.7": 1200, "27.436587;38.626512": 0},
        })));

        let row = &matrix["27.436587,38.626512"];
        assert_eq!(row["27.5,38.7"], 1200);
        assert_eq!(row["27.436587,38.626512"], 0);
        assert_eq!(report.cells, 2);
        assert_eq!(report.collisions, 0);
    }

    #[test]
    fn test_values_are_coerced() {
        let (matrix, report) = normalize_distance(&raw(json!({
            "1,1": {"2,2": "1500.9", "3,3": "n/a", "4,4": null, "5,5": 7.2, "6,6": -4},
        })));

        let row = &matrix["1,1"];
        assert_eq!(row["2,2"], 1500);
        assert_eq!(row["3,3"], 0);
        assert_eq!(row["4,4"], 0);
        assert_eq!(row["5,5"], 7);
        assert_eq!(row["6,6"], 0);
        assert_eq!(report.coerced, 3);
    }

    #[test]
    fn test_duration_floor_applies_off_diagonal_only() {
        let (matrix, report) = normalize_duration(
            &raw(json!({
                "1.0,1.0": {"1,1": 0, "2,2": 45, "3,3": 900},
                "2,2": {"2.000000,2": 10, "1,1": "bad"},
            })),
            DURATION_FLOOR_SECONDS,
        );

        assert_eq!(matrix["1,1"]["1,1"], 0, "diagonal is untouched");
        assert_eq!(matrix["1,1"]["2,2"], 300);
        assert_eq!(matrix["1,1"]["3,3"], 900);
        assert_eq!(matrix["2,2"]["2,2"], 10, "diagonal is untouched");
        assert_eq!(matrix["2,2"]["1,1"], 300, "coerced values are floored too");
        assert_eq!(report.floored, 2);

        for (origin, row) in &matrix {
            for (dest, value) in row {
                if origin != dest {
                    assert!(*value >= DURATION_FLOOR_SECONDS, "{origin} -> {dest} = {value}");
                }
            }
        }
    }

    #[test]
    fn test_collisions_keep_last_value() {
        let (matrix, report) = normalize_distance(&raw(json!({
            "1.0,2.0": {"3,4": 10},
            "1,2": {"3.000,4": 20, "3,4.0": 30},
        })));

        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix["1,2"]["3,4"], 30);
        assert_eq!(report.collisions, 2);
    }

    #[test]
    fn test_collision_follows_file_order_not_key_order() {
        // The padded key sorts first but is written first, so the later row wins.
        let text = r#"{"distance": {
            "27.4365870,38.6265120": {"27.5,38.7": 111},
            "27.436587,38.626512": {"27.5,38.7": 222}
        }}"#;
        let doc: Value = serde_json::from_str(text).expect("matrix file");
        let (matrix, report) = normalize_distance(&raw_section(&doc, "distance"));
        assert_eq!(matrix["27.436587,38.626512"]["27.5,38.7"], 222);
        assert_eq!(report.collisions, 1);

        let reversed = r#"{"27.436587,38.626512": {"27.5,38.7": 222},
                           "27.4365870,38.6265120": {"27.5,38.7": 111}}"#;
        let raw: RawMatrix = serde_json::from_str(reversed).expect("raw matrix");
        let (matrix, _) = normalize_distance(&raw);
        assert_eq!(matrix["27.436587,38.626512"]["27.5,38.7"], 111);
    }

    #[test]
    fn test_opaque_keys_pass_through() {
        let (matrix, _) = normalize_distance(&raw(json!({"office": {"T1": 5}})));
        assert_eq!(matrix["office"]["T1"], 5);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let doc = json!({"duration": {"1,1": {"2,2": 5}}, "distance": "oops"});
        assert!(raw_section(&doc, "distance").is_empty());
        assert!(raw_section(&doc, "nothing").is_empty());
        assert_eq!(raw_section(&doc, "duration").len(), 1);
    }

    #[test]
    fn test_lookup_reconciles_precision() {
        let (distance, _) = normalize_distance(&raw(json!({"27.436587,38.626512": {"27.5,38.7": 1200}})));
        let matrix = TravelMatrix {
            distance,
            duration: KeyedMatrix::new(),
        };

        assert_eq!(matrix.distance_between("27.436587,38.626512", "27.5,38.7"), Some(1200));
        assert_eq!(
            matrix.distance_between("27.4365870;38.6265120", "27.500000,38.700000"),
            Some(1200)
        );
        assert_eq!(matrix.distance_between("27.5,38.7", "27.436587,38.626512"), None);
        assert_eq!(matrix.duration_between("27.436587,38.626512", "27.5,38.7"), None);
    }

    #[test]
    fn test_raw_from_provider_keys_by_canonical_coordinate() {
        let points = [
            Coordinate::new(27.4365870, 38.626512).unwrap(),
            Coordinate::new(27.14, 38.42).unwrap(),
        ];
        let (distance, duration) = raw_from_provider(&HaversineMatrix::default(), &points);
        let (normalized, _) = normalize_duration(&duration, DURATION_FLOOR_SECONDS);

        assert_eq!(distance["27.436587,38.626512"]["27.436587,38.626512"], json!(0));
        assert!(distance["27.436587,38.626512"]["27.14,38.42"].as_i64().unwrap() > 30_000);
        assert!(normalized["27.14,38.42"]["27.436587,38.626512"] >= DURATION_FLOOR_SECONDS);
    }
}
