//! Run configuration.
//!
//! A [`PrepConfig`] is built once per planning run and passed by reference to
//! the assembler. The planning horizon is the one required field: build it with
//! [`PrepConfig::for_day`] or [`PrepConfig::new`], or name `planning_horizon` in
//! JSON. Every other field has a default, so a partial JSON config only needs
//! to name what it changes.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PrepError;
use crate::matrix::DURATION_FLOOR_SECONDS;

const DEFAULT_OFFICE_COORDINATE: &str = "27.436587,38.626512";
const DEFAULT_OFFICE_ZONE: &str = "ŞEHZADELER";

/// Work day used by [`PlanningHorizon::for_day`].
const DAY_START: (u32, u32) = (8, 0);
const DAY_END: (u32, u32) = (23, 0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepConfig {
    /// Technicians start and end their day here.
    #[serde(default)]
    pub office: Office,
    /// Technicians' work window, and the arrival window of rows kept by
    /// `policy.keep_if_no_window`.
    pub planning_horizon: PlanningHorizon,
    #[serde(default)]
    pub options: OptimizerSettings,
    #[serde(default)]
    pub policy: DropPolicy,
    #[serde(default = "default_duration_floor")]
    pub duration_floor_seconds: i64,
    #[serde(default = "default_wildcard_marker")]
    pub wildcard_marker: char,
    /// Appended once to the file stem of written documents.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    #[serde(default = "default_priority")]
    pub appointment_priority: i64,
}

fn default_duration_floor() -> i64 {
    DURATION_FLOOR_SECONDS
}

fn default_wildcard_marker() -> char {
    '*'
}

fn default_output_suffix() -> String {
    "_fixed_arrivals".to_string()
}

fn default_priority() -> i64 {
    1
}

impl PrepConfig {
    /// Default settings around an explicit planning horizon.
    pub fn new(planning_horizon: PlanningHorizon) -> Self {
        Self {
            office: Office::default(),
            planning_horizon,
            options: OptimizerSettings::default(),
            policy: DropPolicy::default(),
            duration_floor_seconds: default_duration_floor(),
            wildcard_marker: default_wildcard_marker(),
            output_suffix: default_output_suffix(),
            appointment_priority: default_priority(),
        }
    }

    /// Default settings planning the given day, 08:00 to 23:00.
    pub fn for_day(day: NaiveDate) -> Self {
        Self::new(PlanningHorizon::for_day(day))
    }

    pub fn from_json_str(json: &str) -> Result<Self, PrepError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Office {
    /// Longitude first.
    pub coordinate: String,
    pub zone: String,
}

impl Default for Office {
    fn default() -> Self {
        Self {
            coordinate: DEFAULT_OFFICE_COORDINATE.to_string(),
            zone: DEFAULT_OFFICE_ZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningHorizon {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PlanningHorizon {
    pub fn for_day(day: NaiveDate) -> Self {
        let at = |(h, m): (u32, u32)| day.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN));
        Self {
            start: at(DAY_START),
            end: at(DAY_END),
        }
    }
}

/// Placeholder for documents decoded without an `options` block. Planning runs
/// always take their horizon from [`PrepConfig`], which has no default.
impl Default for PlanningHorizon {
    fn default() -> Self {
        Self::for_day(NaiveDate::default())
    }
}

/// Optimizer switches copied verbatim into the document's `options` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub account_id: Option<String>,
    /// Seconds.
    pub run_time_limit: u32,
    pub enable_buffer_slot: bool,
    /// Meters.
    pub distance_limit_between_jobs: i64,
    pub start_day_at_office: bool,
    pub start_point_after_unavailability: String,
    pub respect_scheduled_times: bool,
    pub call_grouping: bool,
    pub disable_drive_time_inclusion: bool,
    pub use_service_zones: bool,
    pub first_call_zone: bool,
    /// Minutes.
    pub scheduling_headstart: i64,
    pub last_job_close_to_home: bool,
    pub assign_priority_jobs_first: bool,
    pub minimize_weighted_completion_time: bool,
    pub capacity_weight: i64,
    pub lunch_break: Option<Value>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            account_id: None,
            run_time_limit: 120,
            enable_buffer_slot: false,
            distance_limit_between_jobs: 400_000,
            start_day_at_office: true,
            start_point_after_unavailability: "office".to_string(),
            respect_scheduled_times: true,
            call_grouping: false,
            disable_drive_time_inclusion: false,
            use_service_zones: false,
            first_call_zone: false,
            scheduling_headstart: 60,
            last_job_close_to_home: false,
            assign_priority_jobs_first: true,
            minimize_weighted_completion_time: false,
            capacity_weight: 1,
            lunch_break: None,
        }
    }
}

/// What to do with rows that would otherwise be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropPolicy {
    /// Use `default_duration_minutes` when no duration rule matches.
    pub keep_if_no_duration: bool,
    pub default_duration_minutes: i64,
    /// Use the planning horizon when the arrival window does not parse.
    pub keep_if_no_window: bool,
}

impl Default for DropPolicy {
    fn default() -> Self {
        Self {
            keep_if_no_duration: false,
            default_duration_minutes: 60,
            keep_if_no_window: false,
        }
    }
}
