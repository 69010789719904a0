//! The optimizer's answer, decoded leniently.
//!
//! A result file carries assignments, optional outlier buckets, technician
//! non-availabilities and lunch breaks, and scheduling suggestions. A record
//! that cannot be read is skipped and counted; it never discards the rest of
//! the file.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PrepError;
use crate::source::{cell_text, lenient_number, lenient_text};
use crate::time_window::{TimeWindow, parse_document_instant};
use crate::travel::TravelReport;

const OUTLIER_STATUS: &str = "outlier";

/// Decoded optimizer result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawResult")]
pub struct AssignmentResult {
    pub assignments: Vec<AssignmentRecord>,
    pub outliers: Vec<AssignmentRecord>,
    pub unassigned: Vec<AssignmentRecord>,
    pub non_availabilities: Vec<TechnicianNonAvailability>,
    pub technicians: Vec<TechnicianSchedule>,
    pub suggestions: Suggestions,
    /// Entries of any section that were not readable records.
    pub skipped_records: usize,
}

/// Sections as they appear in the file, before per-record decoding.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawResult {
    assignments: Option<Value>,
    outliers: Option<Value>,
    unassigned: Option<Value>,
    #[serde(alias = "nonavailabilities")]
    nonavailibilities: Option<Value>,
    technicians: Option<Value>,
    suggestions: Option<Value>,
}

impl From<RawResult> for AssignmentResult {
    fn from(raw: RawResult) -> Self {
        let mut skipped = 0;
        let assignments = lenient_list(raw.assignments, "assignments", &mut skipped);
        let outliers = lenient_list(raw.outliers, "outliers", &mut skipped);
        let unassigned = lenient_list(raw.unassigned, "unassigned", &mut skipped);
        let non_availabilities = lenient_list(raw.nonavailibilities, "nonavailibilities", &mut skipped);
        let technicians = lenient_list(raw.technicians, "technicians", &mut skipped);
        let suggestions = raw
            .suggestions
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        Self {
            assignments,
            outliers,
            unassigned,
            non_availabilities,
            technicians,
            suggestions,
            skipped_records: skipped,
        }
    }
}

/// Items of a list section that decode; a missing or non-list section is empty.
fn lenient_list<T: DeserializeOwned>(section: Option<Value>, name: &str, skipped: &mut usize) -> Vec<T> {
    let Some(Value::Array(items)) = section else {
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(err) => {
                *skipped += 1;
                debug!(section = name, index, error = %err, "unreadable result record skipped");
                None
            }
        })
        .collect()
}

impl AssignmentResult {
    pub fn from_json_str(json: &str) -> Result<Self, PrepError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Assignments followed by both outlier buckets. Bucketed records without
    /// a status are outliers.
    pub fn records(&self) -> Vec<AssignmentRecord> {
        let bucketed = self.outliers.iter().chain(&self.unassigned).map(|record| {
            let mut record = record.clone();
            record.status.get_or_insert_with(|| OUTLIER_STATUS.to_string());
            record
        });
        self.assignments.iter().cloned().chain(bucketed).collect()
    }

    /// One row per non-availability, plus an empty row for each technician
    /// listed without any.
    pub fn non_availability_rows(&self) -> Vec<NonAvailabilityRow> {
        self.non_availabilities
            .iter()
            .flat_map(|tech| {
                if tech.non_availabilities.is_empty() {
                    return vec![NonAvailabilityRow {
                        technician_id: tech.technician_id.clone(),
                        ..NonAvailabilityRow::default()
                    }];
                }
                tech.non_availabilities
                    .iter()
                    .map(|item| NonAvailabilityRow {
                        technician_id: tech.technician_id.clone(),
                        start: item.start.clone(),
                        end: item.end.clone(),
                        reason: item.reason.clone(),
                    })
                    .collect()
            })
            .collect()
    }

    pub fn lunch_break_rows(&self) -> Vec<LunchBreakRow> {
        self.technicians
            .iter()
            .map(|tech| LunchBreakRow {
                technician_id: tech.id.clone(),
                lunch_start: tech.lunch_break.as_ref().and_then(|lunch| lunch.start.clone()),
                lunch_end: tech.lunch_break.as_ref().and_then(|lunch| lunch.end.clone()),
            })
            .collect()
    }

    /// Record counts of the result, next to the travel legs built from it.
    pub fn meta(&self, travel: &TravelReport) -> ResultMeta {
        let technicians: BTreeSet<&str> = self.technicians.iter().filter_map(|tech| tech.id.as_deref()).collect();

        ResultMeta {
            assignments: self.assignments.len() + self.outliers.len() + self.unassigned.len(),
            assignment_rows: travel.legs.len() + travel.unassigned.len(),
            technicians: technicians.len(),
            non_availability_rows: self.non_availability_rows().len(),
            skipped_records: self.skipped_records,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssignmentRecord {
    /// Appointment id; numeric ids are read as text.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub technician_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient_route")]
    pub route: Option<Route>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Route {
    #[serde(default, deserialize_with = "lenient_number")]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub duration: Option<f64>,
}

impl AssignmentRecord {
    pub fn start_instant(&self) -> Option<chrono::NaiveDateTime> {
        parse_document_instant(self.start.as_deref()?)
    }

    pub fn window(&self) -> Option<TimeWindow> {
        Some(TimeWindow {
            start: self.start_instant()?,
            end: parse_document_instant(self.end.as_deref()?)?,
        })
    }

    /// Outliers and records without technicians were not placed on any route.
    pub fn is_unassigned(&self) -> bool {
        self.technician_ids.is_empty()
            || self
                .status
                .as_deref()
                .is_some_and(|status| status.trim().eq_ignore_ascii_case(OUTLIER_STATUS))
    }
}

/// A technician's entry in the `nonavailibilities` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TechnicianNonAvailability {
    #[serde(default, deserialize_with = "lenient_text")]
    pub technician_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_objects")]
    pub non_availabilities: Vec<NonAvailability>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NonAvailability {
    #[serde(default, deserialize_with = "lenient_text")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: Option<String>,
}

/// A technician's entry in the `technicians` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TechnicianSchedule {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_interval")]
    pub lunch_break: Option<Interval>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Interval {
    #[serde(default, deserialize_with = "lenient_text")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Suggestions {
    #[serde(deserialize_with = "lenient_objects")]
    pub overtime: Vec<OvertimeSuggestion>,
    /// Free-form entries; scalars are wrapped as `{"value": ...}`.
    #[serde(deserialize_with = "lenient_buffer_slots")]
    pub buffer_slots: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OvertimeSuggestion {
    #[serde(default, deserialize_with = "lenient_text")]
    pub technician_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub appointment_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NonAvailabilityRow {
    pub technician_id: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LunchBreakRow {
    pub technician_id: Option<String>,
    pub lunch_start: Option<String>,
    pub lunch_end: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultMeta {
    /// Assignment records, outlier buckets included.
    pub assignments: usize,
    /// Travel legs plus unassigned entries.
    pub assignment_rows: usize,
    /// Distinct ids in the `technicians` section.
    pub technicians: usize,
    pub non_availability_rows: usize,
    pub skipped_records: usize,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// A list, a single id, or nothing.
fn lenient_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids: Vec<String> = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(cell_text).collect(),
        Some(other) => cell_text(other).into_iter().collect(),
        None => Vec::new(),
    };
    Ok(ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// A route that is not an object is treated as absent.
fn lenient_route<'de, D>(deserializer: D) -> Result<Option<Route>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_object(Option::<Value>::deserialize(deserializer)?))
}

fn lenient_interval<'de, D>(deserializer: D) -> Result<Option<Interval>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_object(Option::<Value>::deserialize(deserializer)?))
}

fn lenient_object<T: DeserializeOwned>(value: Option<Value>) -> Option<T> {
    match value? {
        object @ Value::Object(_) => serde_json::from_value(object).ok(),
        _ => None,
    }
}

/// The readable objects of a nested list.
fn lenient_objects<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(|item| lenient_object(Some(item))).collect(),
        _ => Vec::new(),
    })
}

fn lenient_buffer_slots<'de, D>(deserializer: D) -> Result<Vec<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(fields) => fields,
            other => Map::from_iter([("value".to_string(), other)]),
        })
        .collect())
}
