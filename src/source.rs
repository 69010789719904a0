//! Source row schema for the appointment, competency and duration sheets.
//!
//! Spreadsheet exports are loosely typed: the same column can hold text,
//! numbers, booleans or nothing. Each field is resolved once, at load time,
//! into `Option<String>` (or `bool`) so the rest of the pipeline never has to
//! inspect a cell's type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PrepError;

/// One row of the appointment report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppointmentRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub confirmation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_id: Option<String>,
    /// Latitude first, `"lat;lon"` or `"lat,lon"`.
    #[serde(default, deserialize_with = "lenient_text")]
    pub coordinate: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub zone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub arrival_window: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub call_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub competency_group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub job_start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub technician_ids: Option<String>,
}

/// One row of the technician competency sheet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompetencyRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub technician_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub call_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub competency: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub wildcard: bool,
}

impl CompetencyRow {
    /// Wildcard rows qualify the technician for every competency of the call type.
    pub fn is_wildcard(&self, marker: char) -> bool {
        self.wildcard || normalize_text(self.competency.as_deref()).contains(marker)
    }
}

/// One row of the service duration sheet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DurationRuleRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub call_type: Option<String>,
    /// A product group containing the wildcard marker applies to the whole call type.
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub minutes: Option<String>,
}

impl DurationRuleRow {
    /// Whole minutes, truncated. `None` if the cell is not a finite number.
    pub fn minutes(&self) -> Option<i64> {
        numeric_or_none(self.minutes.as_deref()?).map(|m| m.trunc() as i64)
    }
}

/// Decode a JSON array of rows.
pub fn rows_from_json<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, PrepError> {
    Ok(serde_json::from_str(json)?)
}

/// Trim and collapse internal whitespace. Absent cells become `""`.
pub fn normalize_text(raw: Option<&str>) -> String {
    raw.map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Split a technician cell such as `"T001; T002|T003"` into ids.
pub fn parse_technician_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(|c: char| matches!(c, ',' | ';' | '|' | '/') || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a number that may use a decimal comma.
pub fn numeric_or_none(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(cell_text))
}

/// A number, or numeric text with an optional decimal comma. Anything else is `None`.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => numeric_or_none(&s),
        _ => None,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let flag = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "x" | "*"
        ),
        _ => false,
    };
    Ok(flag)
}

/// Text of a cell. Whole floats lose their `.0` so numeric ids read naturally.
pub(crate) fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}
