//! The canonical scheduling document handed to the optimizer.
//!
//! Field names and timestamp encodings are the optimizer's wire format.
//! Timestamps stay as text here because two encodings coexist (see
//! [`crate::time_window`]); use the accessor methods to read them back.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{OptimizerSettings, PlanningHorizon};
use crate::error::PrepError;
use crate::matrix::TravelMatrix;
use crate::time_window::{TimeWindow, parse_document_instant};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingDocument {
    pub appointments: Vec<Appointment>,
    pub zones: Vec<Zone>,
    pub technicians: Vec<Technician>,
    pub options: Options,
    pub matrix: TravelMatrix,
    pub business_units: Vec<BusinessUnit>,
    pub board_id: String,
}

impl SchedulingDocument {
    pub fn from_json_str(json: &str) -> Result<Self, PrepError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, PrepError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self, PrepError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Write the document next to `path` with the output suffix applied once.
    /// Returns the path actually written.
    pub fn write_json(&self, path: impl AsRef<Path>, suffix: &str) -> Result<PathBuf, PrepError> {
        let target = ensure_suffix_once(path.as_ref(), suffix);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, self.to_json_pretty()?)?;
        Ok(target)
    }

    pub fn appointments_by_id(&self) -> HashMap<&str, &Appointment> {
        self.appointments
            .iter()
            .map(|appt| (appt.id.as_str(), appt))
            .collect()
    }

    pub fn technician(&self, id: &str) -> Option<&Technician> {
        self.technicians.iter().find(|tech| tech.id == id)
    }
}

/// Append `suffix` to the file stem exactly once.
///
/// A stem already ending in the suffix, or in the suffix without its trailing
/// `s`, is rewritten to end in exactly `suffix` (case-insensitive match).
pub fn ensure_suffix_once(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix_lower = suffix.to_lowercase();
    let singular = suffix_lower.strip_suffix('s').unwrap_or(&suffix_lower);

    let base = [suffix_lower.as_str(), singular]
        .into_iter()
        .filter(|tail| !tail.is_empty())
        .find_map(|tail| {
            let cut = stem.len().checked_sub(tail.len())?;
            (stem.is_char_boundary(cut) && stem[cut..].to_lowercase() == tail).then(|| &stem[..cut])
        })
        .unwrap_or(stem.as_str());

    let mut name = format!("{base}{suffix}");
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    /// Canonical `"lon,lat"`, or `null` when the source coordinate was invalid.
    pub coordinate: Option<String>,
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Window {
    pub start: String,
    pub end: String,
}

impl Window {
    pub fn parsed(&self) -> Option<TimeWindow> {
        Some(TimeWindow {
            start: parse_document_instant(&self.start)?,
            end: parse_document_instant(&self.end)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleTechnician {
    pub id: String,
    #[serde(default = "default_score")]
    pub score: i64,
}

fn default_score() -> i64 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appointment {
    pub location: Location,
    /// `.000Z` encoding.
    pub arrival_window: Window,
    pub eligible_technicians: Vec<EligibleTechnician>,
    pub id: String,
    /// Job window start, `Z` encoding.
    pub start: String,
    /// Job window end, `Z` encoding.
    pub end: String,
    /// Technicians pre-assigned in the source report.
    pub technician_ids: Vec<String>,
    pub priority: i64,
    pub name: String,
    pub business_unit_id: String,
    pub optimize_for: String,
    pub score_type: String,
}

impl Appointment {
    pub fn job_window(&self) -> Option<TimeWindow> {
        Some(TimeWindow {
            start: parse_document_instant(&self.start)?,
            end: parse_document_instant(&self.end)?,
        })
    }

    /// Job length in whole minutes, 0 when the window is missing or inverted.
    pub fn duration_minutes(&self) -> i64 {
        self.job_window().map_or(0, |w| w.minutes().max(0))
    }

    pub fn eligible_ids(&self) -> impl Iterator<Item = &str> {
        self.eligible_technicians.iter().map(|t| t.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub id: String,
    pub can_go_with: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Technician {
    pub id: String,
    pub home: Location,
    pub work_time: Window,
    pub non_availabilities: Vec<Window>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunch_break: Option<Window>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessUnit {
    /// `call_type|product_group|competency_group`.
    pub id: String,
    pub buffer_slot_count: i64,
    /// Minutes.
    pub buffer_slot_length: i64,
    /// Sorted.
    pub technician_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub office: Location,
    pub planning_horizon: PlanningHorizon,
    #[serde(flatten)]
    pub settings: OptimizerSettings,
}
