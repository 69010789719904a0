//! OSRM HTTP adapter for travel matrices.

use serde::Deserialize;
use tracing::warn;

use crate::coordinate::Coordinate;
use crate::error::PrepError;
use crate::traits::{DistanceMatrixProvider, TravelTable};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, PrepError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[Coordinate]) -> String {
        // OSRM takes lon,lat pairs, which is exactly the canonical key form.
        let coords = locations
            .iter()
            .map(Coordinate::key)
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[Coordinate]) -> TravelTable {
        if locations.is_empty() {
            return TravelTable::default();
        }

        let response = self
            .client
            .get(self.table_url(locations))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>());

        match response {
            Ok(body) => TravelTable {
                distance: rounded(body.distances),
                duration: rounded(body.durations),
            },
            Err(err) => {
                warn!(error = %err, points = locations.len(), "OSRM table request failed");
                TravelTable::default()
            }
        }
    }
}

/// Unreachable pairs come back as `null` and are reported as 0.
fn rounded(table: Option<Vec<Vec<Option<f64>>>>) -> Vec<Vec<i64>> {
    table
        .unwrap_or_default()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|value| value.map_or(0, |v| v.round() as i64))
                .collect()
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}
