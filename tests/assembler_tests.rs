//! Scheduling document assembly tests
//!
//! End-to-end runs from source rows to the optimizer document.

mod fixtures;

use std::path::PathBuf;

use serde_json::{Value, json};

use dispatch_prep::assembler::unique_coordinates;
use dispatch_prep::document::{EligibleTechnician, SchedulingDocument};
use dispatch_prep::haversine::HaversineMatrix;
use dispatch_prep::matrix::{RawMatrix, raw_from_provider, raw_section};

use fixtures::{DAY, OFFICE, SITES, TestRow, TestRun};

fn raw(value: Value) -> RawMatrix {
    serde_json::from_value(value).expect("raw matrix")
}

// ============================================================================
// Business units and eligibility
// ============================================================================

#[test]
fn test_wildcard_technician_end_to_end() {
    let outcome = TestRun::new()
        .competency("T1", "AC_REPAIR", "*")
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").window("10.03.2025 08:00-10:00"))
        .assemble();

    let doc = &outcome.document;
    assert_eq!(doc.appointments.len(), 1);
    let appt = &doc.appointments[0];

    assert_eq!(appt.business_unit_id, "AC_REPAIR|SPLIT|GAS");
    assert_eq!(
        appt.eligible_technicians,
        vec![EligibleTechnician {
            id: "T1".to_string(),
            score: 1
        }]
    );
    assert_eq!(appt.duration_minutes(), 60);
    assert_eq!(doc.business_units.len(), 1);
    assert_eq!(doc.business_units[0].technician_ids, vec!["T1"]);
    assert_eq!(doc.business_units[0].buffer_slot_length, 60);
}

#[test]
fn test_exact_competency_only_matches_its_units() {
    let outcome = TestRun::new()
        .competency("T1", "AC_REPAIR", "GAS")
        .competency("T2", "AC_REPAIR", "ELECTRIC")
        .competency("T3", "AC_REPAIR", "*")
        .competency("T4", "BOILER", "*")
        .rule("AC_REPAIR", "*", "45")
        .row(TestRow::new("A1"))
        .row(TestRow::new("A2").competency("ELECTRIC"))
        .row(TestRow::new("A3").competency("PLUMBING"))
        .assemble();

    let eligible = |id: &str| -> Vec<String> {
        outcome
            .document
            .appointments
            .iter()
            .find(|appt| appt.id == id)
            .map(|appt| appt.eligible_ids().map(str::to_string).collect())
            .unwrap_or_default()
    };

    assert_eq!(eligible("A1"), vec!["T1", "T3"]);
    assert_eq!(eligible("A2"), vec!["T2", "T3"]);
    assert_eq!(eligible("A3"), vec!["T3"]);
    assert_eq!(outcome.document.technicians.len(), 4);
}

#[test]
fn test_exact_duration_overrides_wildcard() {
    let outcome = TestRun::new()
        .rule("AC_REPAIR", "*", "45")
        .rule("AC_REPAIR", "SPLIT", "90")
        .row(TestRow::new("A1"))
        .row(TestRow::new("A2").product_group("CASSETTE"))
        .assemble();

    let appts = &outcome.document.appointments;
    assert_eq!(appts[0].duration_minutes(), 90);
    assert_eq!(appts[1].duration_minutes(), 45);
}

// ============================================================================
// Drops and accounting
// ============================================================================

#[test]
fn test_every_row_is_kept_or_dropped() {
    let outcome = TestRun::new()
        .rule("AC_REPAIR", "SPLIT", "60")
        .rule("AC_REPAIR", "ZERO", "0")
        .row(TestRow::new("A1"))
        .row(TestRow::new("A2").no_window())
        .row(TestRow::new("A3").window("not a window"))
        .row(TestRow::new("A4").product_group("UNKNOWN"))
        .row(TestRow::new("A5").product_group("ZERO"))
        .row(TestRow::new("A6").window("10.03.2025 15:00:0017:00:00"))
        .row(TestRow::new("A7").coordinate("garbage"))
        .assemble();

    let report = &outcome.report;
    assert_eq!(report.input_rows, 7);
    assert_eq!(outcome.document.appointments.len() + report.dropped.len(), report.input_rows);
    assert_eq!(report.kept, 3);

    let counts = report.drop_counts();
    assert_eq!(counts.get("no_arrival_window"), Some(&2));
    assert_eq!(counts.get("no_duration_mapping"), Some(&1));
    assert_eq!(counts.get("time_build_error"), Some(&1));

    let time_error = report
        .dropped
        .iter()
        .find(|d| d.row_id == "A5")
        .expect("zero-minute row dropped");
    assert!(time_error.reason.to_string().starts_with("time_build_error:"));

    assert_eq!(report.invalid_coordinates, 1);
    assert_eq!(outcome.document.appointments[2].location.coordinate, None);
}

#[test]
fn test_dropped_rows_still_define_zones_and_units() {
    let outcome = TestRun::new()
        .row(TestRow::new("A1").at(&SITES[3]).no_window())
        .assemble();

    assert!(outcome.document.appointments.is_empty());
    assert_eq!(outcome.document.zones.len(), 1);
    assert_eq!(outcome.document.zones[0].id, "TURGUTLU");
    assert_eq!(outcome.document.business_units.len(), 1);
}

#[test]
fn test_unknown_preassigned_technicians_are_kept_and_counted() {
    let outcome = TestRun::new()
        .competency("T1", "AC_REPAIR", "GAS")
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").technicians("T1; T9"))
        .row(TestRow::new("A2").technicians("T1"))
        .assemble();

    assert_eq!(outcome.document.appointments[0].technician_ids, vec!["T1", "T9"]);
    assert_eq!(outcome.report.unknown_technicians, 1);
}

// ============================================================================
// Time windows
// ============================================================================

#[test]
fn test_jammed_window_matches_separated_window() {
    let outcome = TestRun::new()
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").window("11.03.2025 15:00:0017:00:00"))
        .row(TestRow::new("A2").window("11.03.2025 15:00:00-17:00:00"))
        .row(TestRow::new("A3").window("11.03.2025 15:00 – 17:00"))
        .assemble();

    let appts = &outcome.document.appointments;
    assert_eq!(appts[0].arrival_window, appts[1].arrival_window);
    assert_eq!(appts[1].arrival_window, appts[2].arrival_window);
    assert_eq!(appts[0].arrival_window.start, "2025-03-11T15:00:00.000Z");
    assert_eq!(appts[0].arrival_window.end, "2025-03-11T17:00:00.000Z");
}

#[test]
fn test_job_start_forms() {
    let outcome = TestRun::new()
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").job_start("2025-03-10 09:30"))
        .row(TestRow::new("A2").job_start("10/03/2025 09:30:00"))
        .row(TestRow::new("A3").job_start("45726.3958333333"))
        .row(TestRow::new("A4").job_start("31.02.2025 09:30"))
        .assemble();

    let ends: Vec<&str> = outcome.document.appointments.iter().map(|a| a.end.as_str()).collect();
    assert_eq!(ends[0], "2025-03-10T09:30:00Z");
    assert_eq!(ends[1], "2025-03-10T09:30:00Z");
    assert_eq!(ends[2], "2025-03-10T09:30:00Z");
    assert_eq!(ends[3], "2025-03-10T09:00:00Z", "impossible dates fall back to the arrival window");
}

// ============================================================================
// Matrix
// ============================================================================

#[test]
fn test_matrix_keys_line_up_with_appointments() {
    let site = &SITES[1];
    let raw_key = format!("{:.8},{:.8}", site.lon, site.lat);
    let office_key = "27.4365870,38.6265120";

    let distance = raw(json!({ office_key: { raw_key.clone(): 8123.7 }, raw_key.clone(): { office_key: "8200" } }));
    let duration = raw(json!({ office_key: { raw_key.clone(): 120, office_key: 0 } }));

    let outcome = TestRun::new()
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").at(site))
        .matrices(distance, duration)
        .assemble();

    let doc = &outcome.document;
    let appt_key = doc.appointments[0].location.coordinate.clone().expect("valid coordinate");
    let office = doc.options.office.coordinate.clone().expect("office coordinate");

    assert_eq!(appt_key, site.key());
    assert_eq!(office, OFFICE);
    assert_eq!(doc.matrix.distance[&office][&appt_key], 8123);
    assert_eq!(doc.matrix.distance[&appt_key][&office], 8200);
    assert_eq!(doc.matrix.duration[&office][&appt_key], 300);
    assert_eq!(doc.matrix.duration[&office][&office], 0);
    assert_eq!(outcome.report.matrix.floored, 1);
}

#[test]
fn test_provider_matrix_covers_every_appointment() {
    let run = TestRun::new()
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").at(&SITES[1]))
        .row(TestRow::new("A2").at(&SITES[4]))
        .row(TestRow::new("A3").at(&SITES[4]));

    let points = unique_coordinates(&run.rows, OFFICE);
    assert_eq!(points.len(), 3);

    let (distance, duration) = raw_from_provider(&HaversineMatrix::default(), &points);
    let outcome = run.matrices(distance, duration).assemble();
    let doc = &outcome.document;

    for from in &doc.appointments {
        for to in &doc.appointments {
            let (a, b) = (from.location.coordinate.as_deref().unwrap(), to.location.coordinate.as_deref().unwrap());
            let seconds = doc.matrix.duration_between(a, b).expect("pair present");
            if a != b {
                assert!(seconds >= 300, "{a} -> {b} = {seconds}");
                assert!(doc.matrix.distance_between(a, b).unwrap() > 0);
            }
        }
    }
}

#[test]
fn test_raw_section_from_matrix_file() {
    let file = json!({"distance": {"27.1,38.1": {"27.2,38.2": 10}}});
    assert_eq!(raw_section(&file, "distance").len(), 1);
    assert!(raw_section(&file, "duration").is_empty());
}

// ============================================================================
// Document shape
// ============================================================================

#[test]
fn test_document_wire_shape() {
    let outcome = TestRun::new()
        .competency("T1", "AC_REPAIR", "*")
        .rule("AC_REPAIR", "SPLIT", "60")
        .row(TestRow::new("A1").window(&format!("{DAY} 13:00-15:00")))
        .assemble();

    let json: Value = serde_json::from_str(&outcome.document.to_json_pretty().unwrap()).unwrap();

    for key in ["appointments", "zones", "technicians", "options", "matrix", "business_units", "board_id"] {
        assert!(json.get(key).is_some(), "missing top-level {key}");
    }
    assert_eq!(json["board_id"], "");

    let appt = &json["appointments"][0];
    assert_eq!(appt["arrival_window"]["start"], "2025-03-10T13:00:00.000Z");
    assert_eq!(appt["start"], "2025-03-10T13:00:00Z");
    assert_eq!(appt["end"], "2025-03-10T14:00:00Z");
    assert_eq!(appt["priority"], 1);
    assert_eq!(appt["name"], "C-A1");
    assert_eq!(appt["optimize_for"], "score");
    assert_eq!(appt["score_type"], "average_revenue");
    assert_eq!(appt["technician_ids"], json!([]));

    let tech = &json["technicians"][0];
    assert_eq!(tech["home"]["coordinate"], OFFICE);
    assert_eq!(tech["work_time"]["start"], "2025-03-10T08:00:00");
    assert_eq!(tech["work_time"]["end"], "2025-03-10T23:00:00");
    assert_eq!(tech["non_availabilities"], json!([]));

    let options = &json["options"];
    assert_eq!(options["office"]["zone"], "ŞEHZADELER");
    assert_eq!(options["planning_horizon"]["start"], "2025-03-10T08:00:00");
    assert_eq!(options["run_time_limit"], 120);
    assert_eq!(options["start_point_after_unavailability"], "office");

    assert_eq!(json["zones"][0], json!({"id": "ŞEHZADELER", "can_go_with": []}));
    assert_eq!(json["business_units"][0]["buffer_slot_count"], 0);

    let decoded = SchedulingDocument::from_json_str(&json.to_string()).expect("round trip");
    assert_eq!(decoded, outcome.document);
}

#[test]
fn test_output_suffix_is_applied_once() {
    let run = TestRun::new();
    let outcome = run.assemble();
    let dir = std::env::temp_dir().join(format!("dispatch-prep-{}", std::process::id()));
    let requested: PathBuf = dir.join("dataloader-10_03_2025.json");

    let first = outcome.write_document(&requested, &run.config).expect("write");
    let second = outcome.write_document(&first, &run.config).expect("rewrite");

    assert_eq!(first, dir.join("dataloader-10_03_2025_fixed_arrivals.json"));
    assert_eq!(second, first);
    assert_eq!(SchedulingDocument::read_json(&first).expect("read back"), outcome.document);

    let mut config = run.config.clone();
    config.output_suffix = "_prepared".to_string();
    let custom = outcome.write_document(&requested, &config).expect("write with custom suffix");
    assert_eq!(custom, dir.join("dataloader-10_03_2025_prepared.json"));

    std::fs::remove_dir_all(&dir).ok();
}
