//! Per-technician travel distance of an optimizer result, measured on the
//! document's distance matrix.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::document::SchedulingDocument;
use crate::result::AssignmentRecord;

/// One assignment as seen by one technician, or an unassigned record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelLeg {
    pub appointment_id: String,
    pub status: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// `None` for unassigned records.
    pub technician_id: Option<String>,
    pub route_distance: Option<f64>,
    pub route_duration: Option<f64>,
    /// Meters from the previous stop; `None` for unassigned records.
    pub dist_from_prev_m: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechnicianDistance {
    pub technician_id: String,
    pub total_distance_m: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TravelReport {
    /// Sorted by technician, then day, then start.
    pub legs: Vec<TravelLeg>,
    pub totals: Vec<TechnicianDistance>,
    pub unassigned: Vec<TravelLeg>,
}

/// Walk every technician's day in start order and measure each hop.
///
/// The first hop of a day leaves the office when the document's options say
/// the day starts there, otherwise the technician's home (or the office if
/// the technician is unknown). Coordinates missing from the matrix add 0.
pub fn technician_travel(records: &[AssignmentRecord], document: &SchedulingDocument) -> TravelReport {
    let appointments = document.appointments_by_id();
    let office = document.options.office.coordinate.as_deref();

    let mut days: BTreeMap<(&str, Option<NaiveDate>), Vec<(Option<NaiveDateTime>, &AssignmentRecord)>> =
        BTreeMap::new();
    let mut report = TravelReport::default();

    for record in records {
        if record.is_unassigned() {
            report.unassigned.push(leg(record, None, None));
            continue;
        }
        let start = record.start_instant();
        for technician in &record.technician_ids {
            days.entry((technician.as_str(), start.map(|s| s.date())))
                .or_default()
                .push((start, record));
        }
    }

    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();

    for ((technician, _), mut stops) in days {
        stops.sort_by_key(|(start, _)| (start.is_none(), *start));

        let mut previous = if document.options.settings.start_day_at_office {
            office
        } else {
            document
                .technician(technician)
                .and_then(|tech| tech.home.coordinate.as_deref())
                .or(office)
        };

        for (_, record) in stops {
            let current = appointments
                .get(record.id.as_str())
                .and_then(|appt| appt.location.coordinate.as_deref());
            let distance = match (previous, current) {
                (Some(from), Some(to)) => document.matrix.distance_between(from, to).unwrap_or(0),
                _ => 0,
            };

            *totals.entry(technician).or_insert(0) += distance;
            report.legs.push(leg(record, Some(technician), Some(distance)));
            previous = current;
        }
    }

    report.totals = totals
        .into_iter()
        .map(|(technician, total)| TechnicianDistance {
            technician_id: technician.to_string(),
            total_distance_m: total,
        })
        .collect();

    report
}

fn leg(record: &AssignmentRecord, technician: Option<&str>, distance: Option<i64>) -> TravelLeg {
    TravelLeg {
        appointment_id: record.id.clone(),
        status: record.status.clone(),
        start: record.start.clone(),
        end: record.end.clone(),
        technician_id: technician.map(str::to_string),
        route_distance: record.route.and_then(|route| route.distance),
        route_duration: record.route.and_then(|route| route.duration),
        dist_from_prev_m: distance,
    }
}
