//! Payload assembly: source rows, rule sheets and raw matrices in, canonical
//! scheduling document out.
//!
//! Rows are independent, so each appointment is built in parallel; business
//! units, zones and the matrix are merged afterwards in a single sequential
//! pass. A row that cannot be scheduled is dropped with a reason and never
//! stops the run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::business_unit::{BusinessUnitKey, BusinessUnitResolver, eligible_entries};
use crate::config::PrepConfig;
use crate::coordinate::{Coordinate, canonical_from_lat_lon, canonical_or_opaque};
use crate::document::{
    Appointment, EligibleTechnician, Location, Options, SchedulingDocument, Technician, Window, Zone,
};
use crate::error::{DropReason, DroppedRow, PrepError};
use crate::matrix::{self, MatrixReport, RawMatrix};
use crate::source::{AppointmentRow, CompetencyRow, DurationRuleRow, normalize_text, parse_technician_ids};
use crate::time_window::{
    TimeWindow, build_job_window, format_local, format_zulu, format_zulu_millis, parse_arrival_window,
    parse_job_start,
};

/// Dropped rows logged individually before the rest are only counted.
const LOGGED_DROPS: usize = 10;

const OPTIMIZE_FOR: &str = "score";
const SCORE_TYPE: &str = "average_revenue";

/// Everything one run consumes.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub appointments: &'a [AppointmentRow],
    pub competencies: &'a [CompetencyRow],
    pub duration_rules: &'a [DurationRuleRow],
    pub raw_distance: &'a RawMatrix,
    pub raw_duration: &'a RawMatrix,
}

/// Accounting for one run. `kept + dropped.len() == input_rows` always holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub input_rows: usize,
    pub kept: usize,
    pub dropped: Vec<DroppedRow>,
    /// Kept appointments whose coordinate is missing or unparseable.
    pub invalid_coordinates: usize,
    /// Kept appointments naming technicians absent from the competency sheet.
    pub unknown_technicians: usize,
    /// Rule rows whose value could not be read.
    pub skipped_rules: usize,
    pub matrix: MatrixReport,
}

impl AssemblyReport {
    /// Dropped rows per reason category.
    pub fn drop_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for dropped in &self.dropped {
            *counts.entry(dropped.reason.category()).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    pub document: SchedulingDocument,
    pub report: AssemblyReport,
}

impl AssemblyOutcome {
    /// Write the document beside `path` with the run's output suffix applied
    /// once. Returns the path actually written.
    pub fn write_document(&self, path: impl AsRef<Path>, config: &PrepConfig) -> Result<PathBuf, PrepError> {
        let written = self.document.write_json(path, &config.output_suffix)?;
        info!(path = %written.display(), appointments = self.document.appointments.len(), "scheduling document written");
        Ok(written)
    }
}

/// Build the scheduling document for one planning run.
pub fn assemble(input: &AssemblyInput<'_>, config: &PrepConfig) -> AssemblyOutcome {
    let resolver = BusinessUnitResolver::new(input.competencies, input.duration_rules, config.wildcard_marker);

    let built: Vec<Result<BuiltRow, DroppedRow>> = input
        .appointments
        .par_iter()
        .enumerate()
        .map(|(index, row)| build_row(index, row, &resolver, config))
        .collect();

    let mut report = AssemblyReport {
        input_rows: input.appointments.len(),
        skipped_rules: resolver.skipped_rules(),
        ..AssemblyReport::default()
    };
    let mut appointments = Vec::with_capacity(built.len());

    for outcome in built {
        match outcome {
            Ok(row) => {
                if row.appointment.location.coordinate.is_none() {
                    report.invalid_coordinates += 1;
                }
                if !row.unknown_technicians.is_empty() {
                    report.unknown_technicians += 1;
                    warn!(
                        appointment = %row.appointment.id,
                        technicians = ?row.unknown_technicians,
                        "technicians not found in competency sheet"
                    );
                }
                appointments.push(row.appointment);
            }
            Err(dropped) => {
                if report.dropped.len() < LOGGED_DROPS {
                    warn!(row = %dropped.row_id, reason = %dropped.reason, "appointment row dropped");
                }
                report.dropped.push(dropped);
            }
        }
    }
    report.kept = appointments.len();

    let business_units = resolver.business_units(input.appointments);
    let eligibility: HashMap<&str, Vec<EligibleTechnician>> = business_units
        .iter()
        .map(|unit| (unit.id.as_str(), eligible_entries(unit)))
        .collect();
    for appointment in &mut appointments {
        appointment.eligible_technicians = eligibility
            .get(appointment.business_unit_id.as_str())
            .cloned()
            .unwrap_or_default();
    }

    let (matrix, matrix_report) = matrix::normalize(
        input.raw_distance,
        input.raw_duration,
        config.duration_floor_seconds,
    );
    report.matrix = matrix_report;

    let office = office_location(config);
    let technicians = technicians(&resolver, &office, config);
    let zones = zones(input.appointments);

    if report.dropped.len() > LOGGED_DROPS {
        warn!(more = report.dropped.len() - LOGGED_DROPS, "further dropped rows not logged");
    }
    info!(
        appointments = report.kept,
        dropped = report.dropped.len(),
        technicians = technicians.len(),
        zones = zones.len(),
        business_units = business_units.len(),
        "scheduling document assembled"
    );

    let document = SchedulingDocument {
        appointments,
        zones,
        technicians,
        options: Options {
            office,
            planning_horizon: config.planning_horizon,
            settings: config.options.clone(),
        },
        matrix,
        business_units,
        board_id: String::new(),
    };

    AssemblyOutcome { document, report }
}

/// Sorted, deduplicated points a travel matrix must cover: every valid
/// appointment coordinate plus the office.
pub fn unique_coordinates(rows: &[AppointmentRow], office: &str) -> Vec<Coordinate> {
    let mut points: BTreeMap<String, Coordinate> = rows
        .iter()
        .filter_map(|row| Coordinate::parse_lat_lon(row.coordinate.as_deref()?))
        .map(|point| (point.key(), point))
        .collect();

    if let Some(office) = Coordinate::parse_lon_lat(office) {
        points.insert(office.key(), office);
    }

    points.into_values().collect()
}

struct BuiltRow {
    appointment: Appointment,
    unknown_technicians: Vec<String>,
}

fn build_row(
    index: usize,
    row: &AppointmentRow,
    resolver: &BusinessUnitResolver,
    config: &PrepConfig,
) -> Result<BuiltRow, DroppedRow> {
    let confirmation = normalize_text(row.confirmation_id.as_deref());
    let id = if confirmation.is_empty() {
        format!("row{index}")
    } else {
        confirmation
    };
    let reject = |reason: DropReason| DroppedRow {
        row_id: id.clone(),
        reason,
    };

    let arrival = match row.arrival_window.as_deref().and_then(parse_arrival_window) {
        Some(window) => window,
        None if config.policy.keep_if_no_window => TimeWindow {
            start: config.planning_horizon.start,
            end: config.planning_horizon.end,
        },
        None => return Err(reject(DropReason::NoArrivalWindow)),
    };

    let key = BusinessUnitKey::from_row(row);
    let minutes = match resolver.duration_minutes(&key.call_type, &key.product_group) {
        Some(minutes) => minutes,
        None if config.policy.keep_if_no_duration => config.policy.default_duration_minutes,
        None => return Err(reject(DropReason::NoDurationMapping)),
    };

    let job_start = row.job_start.as_deref().and_then(parse_job_start);
    let job = build_job_window(job_start, arrival.start, minutes).map_err(|err| reject(err.into()))?;

    let technician_ids = parse_technician_ids(row.technician_ids.as_deref());
    let unknown_technicians = technician_ids
        .iter()
        .filter(|tid| !resolver.known_technicians().contains(*tid))
        .cloned()
        .collect();

    let zone = normalize_text(row.zone.as_deref());

    let appointment = Appointment {
        location: Location {
            coordinate: row.coordinate.as_deref().and_then(canonical_from_lat_lon),
            zone: (!zone.is_empty()).then_some(zone),
        },
        arrival_window: Window {
            start: format_zulu_millis(arrival.start),
            end: format_zulu_millis(arrival.end),
        },
        eligible_technicians: Vec::new(),
        id,
        start: format_zulu(job.start),
        end: format_zulu(job.end),
        technician_ids,
        priority: config.appointment_priority,
        name: normalize_text(row.customer_id.as_deref()),
        business_unit_id: key.id(),
        optimize_for: OPTIMIZE_FOR.to_string(),
        score_type: SCORE_TYPE.to_string(),
    };

    Ok(BuiltRow {
        appointment,
        unknown_technicians,
    })
}

fn office_location(config: &PrepConfig) -> Location {
    let zone = normalize_text(Some(config.office.zone.as_str()));
    Location {
        coordinate: Some(canonical_or_opaque(&config.office.coordinate)),
        zone: (!zone.is_empty()).then_some(zone),
    }
}

/// One technician per competency-sheet id, based at the office for the whole horizon.
fn technicians(resolver: &BusinessUnitResolver, office: &Location, config: &PrepConfig) -> Vec<Technician> {
    let work_time = Window {
        start: format_local(config.planning_horizon.start),
        end: format_local(config.planning_horizon.end),
    };

    resolver
        .known_technicians()
        .iter()
        .map(|id| Technician {
            id: id.clone(),
            home: office.clone(),
            work_time: work_time.clone(),
            non_availabilities: Vec::new(),
            name: id.clone(),
            lunch_break: None,
        })
        .collect()
}

fn zones(rows: &[AppointmentRow]) -> Vec<Zone> {
    rows.iter()
        .map(|row| normalize_text(row.zone.as_deref()))
        .filter(|zone| !zone.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|id| Zone {
            id,
            can_go_with: Vec::new(),
        })
        .collect()
}
