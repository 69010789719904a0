//! Slot load and counterfactual capacity analysis of an optimizer result.
//!
//! The working day is cut into fixed [`Slot`]s. For every technician the
//! minutes assigned inside each slot are measured by exact interval overlap.
//! For every appointment and slot the analyzer then asks how many of its
//! eligible technicians could still fit it there if the appointment itself
//! were taken out of their load. Appointments that were assigned are evaluated
//! exactly like unassigned ones, including against their own technician.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{Appointment, SchedulingDocument};
use crate::result::{AssignmentRecord, AssignmentResult};
use crate::time_window::{TimeWindow, parse_document_instant};

/// Minutes a technician can work inside one slot.
pub const SLOT_CAPACITY_MINUTES: i64 = 120;

const DEFAULT_SLOT_HOURS: &[(u32, u32)] = &[(8, 10), (10, 12), (13, 15), (15, 17), (17, 19), (19, 21), (21, 23)];

// ============================================================================
// Slots
// ============================================================================

/// A named half-open time-of-day interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub label: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Slot {
    /// Whole-hour slot labelled `"HH:00-HH:00"`.
    pub fn hours(start: u32, end: u32) -> Option<Self> {
        Some(Self {
            label: format!("{start:02}:00-{end:02}:00"),
            start: NaiveTime::from_hms_opt(start, 0, 0)?,
            end: NaiveTime::from_hms_opt(end, 0, 0)?,
        })
    }

    pub fn window_on(&self, date: NaiveDate) -> TimeWindow {
        TimeWindow {
            start: date.and_time(self.start),
            end: date.and_time(self.end),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Ordered slot list. Gaps between slots (a lunch break) are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotCatalog(Vec<Slot>);

impl Default for SlotCatalog {
    fn default() -> Self {
        Self(
            DEFAULT_SLOT_HOURS
                .iter()
                .filter_map(|&(start, end)| Slot::hours(start, end))
                .collect(),
        )
    }
}

impl SlotCatalog {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self(slots)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|slot| slot.label.clone()).collect()
    }

    /// Slot containing a time of day.
    pub fn index_at(&self, time: NaiveTime) -> Option<usize> {
        self.0.iter().position(|slot| slot.contains(time))
    }

    /// Slot whose bounds on the window's start date equal the window exactly.
    pub fn index_matching(&self, window: &TimeWindow) -> Option<usize> {
        let date = window.start.date();
        self.0.iter().position(|slot| slot.window_on(date) == *window)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub slot_capacity_minutes: i64,
    pub slots: SlotCatalog,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            slot_capacity_minutes: SLOT_CAPACITY_MINUTES,
            slots: SlotCatalog::default(),
        }
    }
}

// ============================================================================
// Overlap and usage
// ============================================================================

/// Minutes shared by two intervals, rounded half to even, never negative.
pub fn overlap_minutes(a: &TimeWindow, b: &TimeWindow) -> i64 {
    rounded_minutes(&TimeWindow {
        start: a.start.max(b.start),
        end: a.end.min(b.end),
    })
}

/// Length of a window in minutes, rounded half to even, never negative.
pub fn rounded_minutes(window: &TimeWindow) -> i64 {
    let minutes = (window.end - window.start).num_seconds() as f64 / 60.0;
    (minutes.round_ties_even() as i64).max(0)
}

type SlotKey = (NaiveDate, usize);

/// Per-technician slot usage, and each appointment's own share of it.
///
/// An assignment only counts against slots on the date it starts.
#[derive(Debug, Clone, Default)]
pub struct SlotUsage {
    used: HashMap<String, HashMap<SlotKey, i64>>,
    own: HashMap<String, HashMap<String, HashMap<SlotKey, i64>>>,
}

impl SlotUsage {
    pub fn from_records(records: &[AssignmentRecord], catalog: &SlotCatalog) -> Self {
        let mut usage = Self::default();

        for record in records {
            let Some(window) = record.window() else {
                continue;
            };
            let date = window.start.date();

            for technician in &record.technician_ids {
                for (index, slot) in catalog.slots().iter().enumerate() {
                    let minutes = overlap_minutes(&window, &slot.window_on(date));
                    if minutes == 0 {
                        continue;
                    }
                    *usage
                        .used
                        .entry(technician.clone())
                        .or_default()
                        .entry((date, index))
                        .or_insert(0) += minutes;
                    usage
                        .own
                        .entry(record.id.clone())
                        .or_default()
                        .entry(technician.clone())
                        .or_default()
                        .insert((date, index), minutes);
                }
            }
        }

        usage
    }

    /// Minutes assigned to `technician` in a slot.
    pub fn used(&self, technician: &str, date: NaiveDate, slot: usize) -> i64 {
        self.used
            .get(technician)
            .and_then(|slots| slots.get(&(date, slot)))
            .copied()
            .unwrap_or(0)
    }

    /// Minutes of `appointment` alone inside `technician`'s slot.
    pub fn own(&self, appointment: &str, technician: &str, date: NaiveDate, slot: usize) -> i64 {
        self.own
            .get(appointment)
            .and_then(|techs| techs.get(technician))
            .and_then(|slots| slots.get(&(date, slot)))
            .copied()
            .unwrap_or(0)
    }

    /// The technician's usage with `appointment` taken out.
    pub fn used_without(&self, appointment: &str, technician: &str, date: NaiveDate, slot: usize) -> i64 {
        self.used(technician, date, slot) - self.own(appointment, technician, date, slot)
    }
}

/// Whether a job of `duration` minutes fits beside `used` minutes. Zero-length
/// jobs never fit.
pub fn fits(capacity: i64, used: i64, duration: i64) -> bool {
    duration > 0 && capacity - used.max(0) >= duration
}

// ============================================================================
// Reports
// ============================================================================

/// Assignments per technician and slot, bucketed by the hour they start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotLoad {
    pub technician_id: String,
    /// Indexed like the slot catalog.
    pub counts: Vec<usize>,
    /// Summed assignment minutes, indexed like the slot catalog.
    pub minutes: Vec<i64>,
}

pub fn slot_load(records: &[AssignmentRecord], catalog: &SlotCatalog) -> Vec<SlotLoad> {
    let mut load: BTreeMap<&str, (Vec<usize>, Vec<f64>)> = BTreeMap::new();

    for record in records {
        let Some(start) = record.start_instant() else {
            continue;
        };
        let Some(index) = catalog.index_at(start.time()) else {
            continue;
        };
        let minutes = record
            .end
            .as_deref()
            .and_then(parse_document_instant)
            .map_or(0.0, |end| ((end - start).num_seconds() as f64 / 60.0).max(0.0));

        for technician in &record.technician_ids {
            let (counts, totals) = load
                .entry(technician.as_str())
                .or_insert_with(|| (vec![0; catalog.len()], vec![0.0; catalog.len()]));
            counts[index] += 1;
            totals[index] += minutes;
        }
    }

    load.into_iter()
        .map(|(technician, (counts, totals))| SlotLoad {
            technician_id: technician.to_string(),
            counts,
            minutes: totals.into_iter().map(|m| m.round_ties_even() as i64).collect(),
        })
        .collect()
}

/// One appointment evaluated in one slot of its day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotEligibility {
    pub slot: String,
    pub appointment_id: String,
    pub business_unit_id: String,
    pub total_eligible: usize,
    /// Eligible technicians with room for the appointment once it is removed
    /// from their own load.
    pub eligible_with_free_space: usize,
    /// `(total - free) / total`; `None` without eligible technicians.
    pub occupancy_rate: Option<f64>,
    /// The appointment's arrival window is exactly this slot.
    pub is_arrival_window: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapacityReport {
    pub slot_labels: Vec<String>,
    pub slot_load: Vec<SlotLoad>,
    pub eligibility: Vec<SlotEligibility>,
    pub appointments: usize,
    /// Dated appointments whose job window is empty or unreadable. They are
    /// reported with zero free technicians.
    pub zero_duration: usize,
    /// Appointments whose day cannot be determined. They have no rows.
    pub undated: usize,
    /// Result entries that could not be read and were left out.
    pub skipped_records: usize,
}

impl CapacityReport {
    pub fn row(&self, appointment: &str, slot: &str) -> Option<&SlotEligibility> {
        self.eligibility
            .iter()
            .find(|row| row.appointment_id == appointment && row.slot == slot)
    }
}

enum AppointmentSlots {
    Undated,
    Dated {
        rows: Vec<SlotEligibility>,
        zero_duration: bool,
    },
}

/// Analyze an optimizer result against the document it was computed from.
pub fn analyze(result: &AssignmentResult, document: &SchedulingDocument, config: &CapacityConfig) -> CapacityReport {
    let records = result.records();
    let usage = SlotUsage::from_records(&records, &config.slots);

    let evaluated: Vec<AppointmentSlots> = document
        .appointments
        .par_iter()
        .map(|appointment| appointment_slots(appointment, &usage, config))
        .collect();

    let mut report = CapacityReport {
        slot_labels: config.slots.labels(),
        slot_load: slot_load(&records, &config.slots),
        appointments: document.appointments.len(),
        skipped_records: result.skipped_records,
        ..CapacityReport::default()
    };

    for (appointment, outcome) in document.appointments.iter().zip(evaluated) {
        match outcome {
            AppointmentSlots::Undated => {
                report.undated += 1;
                debug!(appointment = %appointment.id, "appointment has no readable date, skipped");
            }
            AppointmentSlots::Dated { rows, zero_duration } => {
                if zero_duration {
                    report.zero_duration += 1;
                }
                report.eligibility.extend(rows);
            }
        }
    }

    info!(
        records = records.len(),
        appointments = report.appointments,
        rows = report.eligibility.len(),
        zero_duration = report.zero_duration,
        undated = report.undated,
        skipped_records = report.skipped_records,
        "capacity analysis complete"
    );

    report
}

fn appointment_slots(appointment: &Appointment, usage: &SlotUsage, config: &CapacityConfig) -> AppointmentSlots {
    let Some(date) = appointment_date(appointment) else {
        return AppointmentSlots::Undated;
    };

    let duration = appointment.job_window().map_or(0, |job| rounded_minutes(&job));
    let eligible: Vec<&str> = appointment.eligible_ids().filter(|id| !id.is_empty()).collect();
    let arrival_slot = appointment
        .arrival_window
        .parsed()
        .and_then(|window| config.slots.index_matching(&window));

    let rows = config
        .slots
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let free = eligible
                .iter()
                .filter(|technician| {
                    let used = usage.used_without(&appointment.id, technician, date, index);
                    fits(config.slot_capacity_minutes, used, duration)
                })
                .count();
            let total = eligible.len();

            SlotEligibility {
                slot: slot.label.clone(),
                appointment_id: appointment.id.clone(),
                business_unit_id: appointment.business_unit_id.clone(),
                total_eligible: total,
                eligible_with_free_space: free,
                occupancy_rate: (total > 0).then(|| (total - free) as f64 / total as f64),
                is_arrival_window: arrival_slot == Some(index),
            }
        })
        .collect();

    AppointmentSlots::Dated {
        rows,
        zero_duration: duration == 0,
    }
}

/// Day of the arrival window, or of the job window when no arrival window is given.
fn appointment_date(appointment: &Appointment) -> Option<NaiveDate> {
    let arrival = &appointment.arrival_window;
    let anchor = if arrival.start.trim().is_empty() && arrival.end.trim().is_empty() {
        &appointment.start
    } else {
        &arrival.start
    };
    parse_document_instant(anchor).map(|instant| instant.date())
}
