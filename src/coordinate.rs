//! Coordinate canonicalization.
//!
//! Every matrix key and location lookup in a planning run goes through the
//! canonical `"lon,lat"` text form produced here. Raw appointment sheets carry
//! latitude first, converted matrix files carry longitude first, so callers
//! pick the entry point matching the orientation of their source field.

use serde::{Deserialize, Serialize};

/// Maximum fractional digits kept in a canonical key.
const KEY_PRECISION: usize = 6;

/// A (longitude, latitude) pair with finite components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Returns `None` if either component is NaN or infinite.
    pub fn new(lon: f64, lat: f64) -> Option<Self> {
        if lon.is_finite() && lat.is_finite() {
            Some(Self { lon, lat })
        } else {
            None
        }
    }

    /// Parse a raw source field written latitude first (`"lat;lon"` or `"lat,lon"`).
    pub fn parse_lat_lon(raw: &str) -> Option<Self> {
        let (lat, lon) = split_pair(raw)?;
        Self::new(lon, lat)
    }

    /// Parse an already-converted field written longitude first
    /// (`"lon,lat"` or `"lon;lat"`).
    pub fn parse_lon_lat(raw: &str) -> Option<Self> {
        let (lon, lat) = split_pair(raw)?;
        Self::new(lon, lat)
    }

    /// Canonical `"lon,lat"` key.
    pub fn key(&self) -> String {
        format!("{},{}", format_component(self.lon), format_component(self.lat))
    }
}

/// Canonicalize a latitude-first raw coordinate. `None` means the text has no
/// canonical form.
pub fn canonical_from_lat_lon(raw: &str) -> Option<String> {
    Coordinate::parse_lat_lon(raw).map(|c| c.key())
}

/// Canonicalize a longitude-first coordinate. Idempotent on canonical keys.
pub fn canonical_from_lon_lat(raw: &str) -> Option<String> {
    Coordinate::parse_lon_lat(raw).map(|c| c.key())
}

/// Canonical key if the text parses, otherwise the trimmed text as an opaque key.
pub fn canonical_or_opaque(raw: &str) -> String {
    canonical_from_lon_lat(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Split on `;` (allowing decimal commas inside each half) or else on the first `,`.
fn split_pair(raw: &str) -> Option<(f64, f64)> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let (first, second) = if let Some((a, b)) = s.split_once(';') {
        (a.trim().replace(',', "."), b.trim().replace(',', "."))
    } else if let Some((a, b)) = s.split_once(',') {
        (a.trim().to_string(), b.trim().to_string())
    } else {
        return None;
    };

    let first: f64 = first.parse().ok()?;
    let second: f64 = second.parse().ok()?;
    Some((first, second))
}

fn format_component(value: f64) -> String {
    let fixed = format!("{:.*}", KEY_PRECISION, value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" | "-" => "0".to_string(),
        other => other.to_string(),
    }
}
