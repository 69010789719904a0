//! Business units and technician eligibility.
//!
//! A business unit is the `(call_type, product_group, competency_group)`
//! triple of an appointment. Its buffer length comes from the duration rules,
//! its technicians from the competency sheet, both through [`RuleTable`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::document::{BusinessUnit, EligibleTechnician};
use crate::rules::{RuleKey, RuleTable};
use crate::source::{AppointmentRow, CompetencyRow, DurationRuleRow, normalize_text};

/// Score given to every eligible technician until weighting exists.
pub const ELIGIBILITY_SCORE: i64 = 1;

/// Whitespace-normalized components of a business unit id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BusinessUnitKey {
    pub call_type: String,
    pub product_group: String,
    pub competency_group: String,
}

impl BusinessUnitKey {
    pub fn new(call_type: Option<&str>, product_group: Option<&str>, competency_group: Option<&str>) -> Self {
        Self {
            call_type: normalize_text(call_type),
            product_group: normalize_text(product_group),
            competency_group: normalize_text(competency_group),
        }
    }

    pub fn from_row(row: &AppointmentRow) -> Self {
        Self::new(
            row.call_type.as_deref(),
            row.product_group.as_deref(),
            row.competency_group.as_deref(),
        )
    }

    pub fn id(&self) -> String {
        format!("{}|{}|{}", self.call_type, self.product_group, self.competency_group)
    }
}

/// Rule tables resolved once per run from the competency and duration sheets.
#[derive(Debug, Clone, Default)]
pub struct BusinessUnitResolver {
    durations: RuleTable<i64>,
    eligibility: RuleTable<BTreeSet<String>>,
    known_technicians: BTreeSet<String>,
}

impl BusinessUnitResolver {
    pub fn new(competencies: &[CompetencyRow], duration_rules: &[DurationRuleRow], marker: char) -> Self {
        let durations = RuleTable::from_rows(
            duration_rules,
            |row| {
                RuleKey::classify(
                    normalize_text(row.call_type.as_deref()),
                    normalize_text(row.product_group.as_deref()),
                    marker,
                )
            },
            |row| row.minutes(),
        );

        let eligibility = RuleTable::grouped(
            competencies,
            |row| {
                let call_type = normalize_text(row.call_type.as_deref());
                let key = if row.is_wildcard(marker) {
                    RuleKey::Wildcard { primary: call_type }
                } else {
                    RuleKey::Exact {
                        primary: call_type,
                        secondary: normalize_text(row.competency.as_deref()),
                    }
                };
                Some(key)
            },
            |row| technician_id(row),
        );

        let known_technicians = competencies.iter().filter_map(technician_id).collect();

        debug!(
            duration_rules = durations.len(),
            skipped_duration_rules = durations.skipped(),
            eligibility_rules = eligibility.len(),
            skipped_competency_rows = eligibility.skipped(),
            "rule tables built"
        );

        Self {
            durations,
            eligibility,
            known_technicians,
        }
    }

    /// Service minutes for an appointment: exact product-group rule, else the
    /// call type's wildcard rule.
    pub fn duration_minutes(&self, call_type: &str, product_group: &str) -> Option<i64> {
        self.durations.lookup(call_type, product_group).copied()
    }

    /// Technicians listed in the competency sheet, sorted.
    pub fn known_technicians(&self) -> &BTreeSet<String> {
        &self.known_technicians
    }

    /// Rows whose rule value could not be read.
    pub fn skipped_rules(&self) -> usize {
        self.durations.skipped() + self.eligibility.skipped()
    }

    /// Technicians eligible for a business unit, sorted.
    pub fn eligible_technicians(&self, key: &BusinessUnitKey) -> Vec<String> {
        self.eligibility
            .matching(&key.call_type, &key.competency_group)
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Deduplicated business units of the given rows, sorted by id.
    pub fn business_units<'a>(&self, rows: impl IntoIterator<Item = &'a AppointmentRow>) -> Vec<BusinessUnit> {
        let mut keys: BTreeMap<String, BusinessUnitKey> = BTreeMap::new();
        for row in rows {
            let key = BusinessUnitKey::from_row(row);
            keys.entry(key.id()).or_insert(key);
        }

        keys.into_iter()
            .map(|(id, key)| BusinessUnit {
                id,
                buffer_slot_count: 0,
                buffer_slot_length: self
                    .duration_minutes(&key.call_type, &key.product_group)
                    .unwrap_or(0)
                    .max(0),
                technician_ids: self.eligible_technicians(&key),
            })
            .collect()
    }
}

/// `{id, score}` entries for every technician of a business unit.
pub fn eligible_entries(unit: &BusinessUnit) -> Vec<EligibleTechnician> {
    unit.technician_ids
        .iter()
        .map(|id| EligibleTechnician {
            id: id.clone(),
            score: ELIGIBILITY_SCORE,
        })
        .collect()
}

fn technician_id(row: &CompetencyRow) -> Option<String> {
    Some(normalize_text(row.technician_id.as_deref())).filter(|id| !id.is_empty())
}
