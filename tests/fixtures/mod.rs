//! Test fixtures for dispatch-prep.
//!
//! Provides:
//! - Real Manisa locations
//! - Builders for appointment, competency and duration rows

#![allow(dead_code)]

pub mod manisa_locations;

pub use manisa_locations::*;

use chrono::NaiveDate;

use dispatch_prep::assembler::{AssemblyInput, AssemblyOutcome, assemble};
use dispatch_prep::config::PrepConfig;
use dispatch_prep::matrix::RawMatrix;
use dispatch_prep::source::{AppointmentRow, CompetencyRow, DurationRuleRow};

pub const DAY: &str = "10.03.2025";

/// The planning day `DAY` names.
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("fixture day")
}

/// Builder for appointment rows with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestRow {
    row: AppointmentRow,
}

impl TestRow {
    /// An AC_REPAIR / SPLIT / GAS job at the first site, 08:00-10:00.
    pub fn new(id: &str) -> Self {
        Self {
            row: AppointmentRow {
                confirmation_id: Some(id.to_string()),
                customer_id: Some(format!("C-{id}")),
                coordinate: Some(SITES[0].raw()),
                zone: Some(SITES[0].zone.to_string()),
                arrival_window: Some(format!("{DAY} 08:00-10:00")),
                call_type: Some("AC_REPAIR".to_string()),
                product_group: Some("SPLIT".to_string()),
                competency_group: Some("GAS".to_string()),
                job_start: None,
                technician_ids: None,
            },
        }
    }

    pub fn at(mut self, site: &Site) -> Self {
        self.row.coordinate = Some(site.raw());
        self.row.zone = Some(site.zone.to_string());
        self
    }

    pub fn coordinate(mut self, raw: &str) -> Self {
        self.row.coordinate = Some(raw.to_string());
        self
    }

    pub fn window(mut self, raw: &str) -> Self {
        self.row.arrival_window = Some(raw.to_string());
        self
    }

    pub fn no_window(mut self) -> Self {
        self.row.arrival_window = None;
        self
    }

    pub fn call_type(mut self, call_type: &str) -> Self {
        self.row.call_type = Some(call_type.to_string());
        self
    }

    pub fn product_group(mut self, product_group: &str) -> Self {
        self.row.product_group = Some(product_group.to_string());
        self
    }

    pub fn competency(mut self, competency: &str) -> Self {
        self.row.competency_group = Some(competency.to_string());
        self
    }

    pub fn job_start(mut self, raw: &str) -> Self {
        self.row.job_start = Some(raw.to_string());
        self
    }

    pub fn technicians(mut self, raw: &str) -> Self {
        self.row.technician_ids = Some(raw.to_string());
        self
    }

    pub fn build(self) -> AppointmentRow {
        self.row
    }
}

pub fn competency(technician: &str, call_type: &str, competency: &str) -> CompetencyRow {
    CompetencyRow {
        technician_id: Some(technician.to_string()),
        call_type: Some(call_type.to_string()),
        competency: Some(competency.to_string()),
        wildcard: false,
    }
}

pub fn duration_rule(call_type: &str, product_group: &str, minutes: &str) -> DurationRuleRow {
    DurationRuleRow {
        call_type: Some(call_type.to_string()),
        product_group: Some(product_group.to_string()),
        minutes: Some(minutes.to_string()),
    }
}

/// Everything one assembly run needs, planning `DAY` with empty matrices by default.
#[derive(Clone, Debug)]
pub struct TestRun {
    pub rows: Vec<AppointmentRow>,
    pub competencies: Vec<CompetencyRow>,
    pub rules: Vec<DurationRuleRow>,
    pub distance: RawMatrix,
    pub duration: RawMatrix,
    pub config: PrepConfig,
}

impl TestRun {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            competencies: Vec::new(),
            rules: Vec::new(),
            distance: RawMatrix::new(),
            duration: RawMatrix::new(),
            config: PrepConfig::for_day(day()),
        }
    }

    pub fn row(mut self, row: TestRow) -> Self {
        self.rows.push(row.build());
        self
    }

    pub fn competency(mut self, technician: &str, call_type: &str, comp: &str) -> Self {
        self.competencies.push(competency(technician, call_type, comp));
        self
    }

    pub fn rule(mut self, call_type: &str, product_group: &str, minutes: &str) -> Self {
        self.rules.push(duration_rule(call_type, product_group, minutes));
        self
    }

    pub fn matrices(mut self, distance: RawMatrix, duration: RawMatrix) -> Self {
        self.distance = distance;
        self.duration = duration;
        self
    }

    pub fn config(mut self, config: PrepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn assemble(&self) -> AssemblyOutcome {
        dispatch_prep::logging::init_test();
        assemble(
            &AssemblyInput {
                appointments: &self.rows,
                competencies: &self.competencies,
                duration_rules: &self.rules,
                raw_distance: &self.distance,
                raw_duration: &self.duration,
            },
            &self.config,
        )
    }
}
