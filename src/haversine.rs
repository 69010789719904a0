//! Haversine travel matrix provider (fallback when OSRM unavailable).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than OSRM (ignores roads) but always available.

use crate::coordinate::Coordinate;
use crate::traits::{DistanceMatrixProvider, TravelTable};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based travel matrix provider.
///
/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance between two points in kilometers.
    fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
        let lat1_rad = from.lat.to_radians();
        let lat2_rad = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lon = (to.lon - from.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn km_to_meters(km: f64) -> i64 {
        (km * 1000.0).round() as i64
    }

    /// Convert distance in km to travel time in seconds.
    fn km_to_seconds(&self, km: f64) -> i64 {
        let hours = km / self.speed_kmh;
        (hours * 3600.0).round() as i64
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Coordinate]) -> TravelTable {
        let n = locations.len();
        let mut table = TravelTable {
            distance: vec![vec![0; n]; n],
            duration: vec![vec![0; n]; n],
        };

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    let km = Self::haversine_km(*from, *to);
                    table.distance[i][j] = Self::km_to_meters(km);
                    table.duration[i][j] = self.km_to_seconds(km);
                }
            }
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat).unwrap()
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = HaversineMatrix::haversine_km(point(27.43, 38.62), point(27.43, 38.62));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Manisa (27.43, 38.62) to Izmir (27.14, 38.42), roughly 34 km apart.
        let dist = HaversineMatrix::haversine_km(point(27.43, 38.62), point(27.14, 38.42));
        assert!(dist > 30.0 && dist < 40.0, "Manisa to Izmir should be ~34km, got {}", dist);
    }

    #[test]
    fn test_matrix_diagonal_is_zero() {
        let provider = HaversineMatrix::default();
        let locations = vec![point(27.4, 38.6), point(27.5, 38.7), point(27.6, 38.8)];
        let table = provider.matrix_for(&locations);

        assert!(table.is_square(3));
        for i in 0..locations.len() {
            assert_eq!(table.distance[i][i], 0, "Diagonal should be zero");
            assert_eq!(table.duration[i][i], 0, "Diagonal should be zero");
        }
    }

    #[test]
    fn test_matrix_symmetric() {
        let provider = HaversineMatrix::default();
        let table = provider.matrix_for(&[point(27.4, 38.6), point(27.5, 38.7)]);

        assert_eq!(table.distance[0][1], table.distance[1][0], "Matrix should be symmetric");
        assert_eq!(table.duration[0][1], table.duration[1][0], "Matrix should be symmetric");
    }

    #[test]
    fn test_reasonable_travel_time() {
        let provider = HaversineMatrix::new(40.0); // 40 km/h
        // 10 km at 40 km/h = 0.25 hours = 900 seconds
        assert_eq!(provider.km_to_seconds(10.0), 900);
        assert_eq!(HaversineMatrix::km_to_meters(10.0), 10_000);
    }
}
