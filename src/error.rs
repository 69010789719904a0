//! Error and drop-reason types.
//!
//! Only boundary failures are errors. A source row that cannot be turned into
//! an appointment is recorded as a [`DroppedRow`] and the run continues.

use std::fmt;

use thiserror::Error;

use crate::time_window::TimeBuildError;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why an appointment row was left out of the scheduling document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NoArrivalWindow,
    NoDurationMapping,
    TimeBuildError(String),
}

impl DropReason {
    /// Stable category name, without the per-row detail.
    pub fn category(&self) -> &'static str {
        match self {
            DropReason::NoArrivalWindow => "no_arrival_window",
            DropReason::NoDurationMapping => "no_duration_mapping",
            DropReason::TimeBuildError(_) => "time_build_error",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::TimeBuildError(detail) => write!(f, "{}:{}", self.category(), detail),
            other => f.write_str(other.category()),
        }
    }
}

impl From<TimeBuildError> for DropReason {
    fn from(err: TimeBuildError) -> Self {
        DropReason::TimeBuildError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRow {
    pub row_id: String,
    pub reason: DropReason,
}
