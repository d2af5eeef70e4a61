//! Search-area geometry: bounding boxes around a point and great-circle distance.
//!
//! The bounding box uses a flat-earth approximation (1° of latitude is taken as
//! 111 km, longitude degrees shrink with cos(latitude)). It ignores the
//! ellipsoidal shape of the earth and degenerates close to the poles, where the
//! longitude span grows without bound. That is accepted for a single fixed
//! display location and deliberately left as is.

use ::geo::algorithm::line_measures::metric_spaces::Haversine;
use ::geo::{Distance, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const KM_PER_DEGREE_LAT: f64 = 111.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

// geo points are x = longitude, y = latitude
impl From<GeoPoint> for Point {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.longitude, p.latitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl Bounds {
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }
}

// same order the flight data sources take it in: north,south,west,east
impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.north, self.south, self.west, self.east)
    }
}

pub fn calculate_bounds(center: GeoPoint, radius_km: f64) -> Bounds {
    let lat_offset = radius_km / KM_PER_DEGREE_LAT;
    let lon_offset = radius_km / (KM_PER_DEGREE_LAT * center.latitude.to_radians().cos());

    Bounds {
        north: center.latitude + lat_offset,
        south: center.latitude - lat_offset,
        west: center.longitude - lon_offset,
        east: center.longitude + lon_offset,
    }
}

/// Great-circle distance between two points in kilometers, on a sphere with
/// the mean earth radius.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b)) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_bounds_lat_span() {
        for radius in [1.0, 10.0, 111.0, 250.0, 500.0] {
            for lat in [-60.0, -12.5, 0.0, 47.4197, 71.0] {
                let bounds = calculate_bounds(GeoPoint::new(lat, 8.4), radius);
                assert!((bounds.lat_span() - 2.0 * radius / 111.0).abs() < EPS);
                assert!(bounds.north > bounds.south);
                assert!(bounds.east > bounds.west);
            }
        }
    }

    #[test]
    fn test_bounds_equator_is_square() {
        let bounds = calculate_bounds(GeoPoint::new(0.0, 0.0), 111.0);
        assert!((bounds.lat_span() - 2.0).abs() < EPS);
        assert!((bounds.lon_span() - bounds.lat_span()).abs() < EPS);
    }

    #[test]
    fn test_bounds_widen_with_latitude() {
        let low = calculate_bounds(GeoPoint::new(10.0, 0.0), 50.0);
        let high = calculate_bounds(GeoPoint::new(60.0, 0.0), 50.0);
        assert!(high.lon_span() > low.lon_span());
        // cos(60°) = 0.5
        assert!((high.lon_span() - 2.0 * high.lat_span()).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_display() {
        let bounds = Bounds { north: 1.5, south: -1.5, west: -2.0, east: 2.0 };
        assert_eq!(bounds.to_string(), "1.5,-1.5,-2,2");
    }

    #[test]
    fn test_haversine() {
        let p = GeoPoint::new(51.5, -0.26);
        assert!(haversine_km(p, p).abs() < EPS);

        // one degree of longitude on the equator
        let d = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111.195).abs() < 0.01);

        let lhr = GeoPoint::new(51.4700, -0.4543);
        let cdg = GeoPoint::new(49.0097, 2.5479);
        let d = haversine_km(lhr, cdg);
        assert!((d - 347.0).abs() < 3.0, "LHR-CDG was {d}");
        assert!((haversine_km(cdg, lhr) - d).abs() < EPS);
    }
}
