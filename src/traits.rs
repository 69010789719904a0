//! Seams between the preparation core and travel-time sources.
//!
//! The core never routes anything itself. A provider turns a list of points
//! into square distance/duration tables that [`crate::matrix`] then keys by
//! canonical coordinate.

use crate::coordinate::Coordinate;

/// Square travel tables indexed by the order of the requested coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TravelTable {
    /// Meters.
    pub distance: Vec<Vec<i64>>,
    /// Seconds.
    pub duration: Vec<Vec<i64>>,
}

impl TravelTable {
    pub fn is_empty(&self) -> bool {
        self.distance.is_empty() && self.duration.is_empty()
    }

    /// True when both tables are `n x n`.
    pub fn is_square(&self, n: usize) -> bool {
        let square = |table: &Vec<Vec<i64>>| table.len() == n && table.iter().all(|row| row.len() == n);
        square(&self.distance) && square(&self.duration)
    }
}

/// Provides a distance/time matrix for a set of locations.
///
/// Implementations return an empty table when the source is unavailable.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[Coordinate]) -> TravelTable;
}
