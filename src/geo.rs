//! Great-circle geometry.
//!
//! Everything in the engine measures distance the same way: Haversine over a
//! spherical Earth, degrees in, meters out.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point on the globe, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other`, in meters.
    pub fn distance_to(self, other: Self) -> f64 {
        haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Haversine distance between two points, in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin() * (d_phi / 2.0).sin()
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin() * (d_lambda / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_distance(40.7, -74.0, 40.7, -74.0), 0.0);
    }

    #[test]
    fn thousandth_of_a_degree_latitude_is_about_111_meters() {
        let d = haversine_distance(0.0, 0.0, 0.001, 0.0);
        assert!((d - 111.19).abs() < 1.0, "got {d}");
    }

    #[test]
    fn hundredth_of_a_degree_longitude_at_equator() {
        let d = haversine_distance(0.0, 0.0, 0.0, 0.01);
        assert!((d - 1111.95).abs() < 1.0, "got {d}");
    }

    #[test]
    fn symmetric() {
        let a = Coordinate::new(40.7059, -74.0565);
        let b = Coordinate::new(40.7536, -73.9832);
        assert!((a.distance_to(b) - b.distance_to(a)).abs() < 1e-9);
    }

    #[test]
    fn park_to_park_distance() {
        // Battery Park to Bryant Park, roughly 6.3 km.
        let d = Coordinate::new(40.7033, -74.0170).distance_to(Coordinate::new(40.7536, -73.9832));
        assert!((5_500.0..6_500.0).contains(&d), "got {d}");
    }
}
