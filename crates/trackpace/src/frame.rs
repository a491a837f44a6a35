//! Distances and local metric frames.

use geo::{Distance as _, Haversine, geometry::Point};
use serde::{Deserialize, Serialize};

/// Equatorial radius used for the local equirectangular projection.
pub const EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

/// Meters spanned by one degree of latitude.
pub fn meters_per_degree_lat() -> f64 {
    EQUATORIAL_RADIUS_M * std::f64::consts::PI / 180.0
}

/// Meters spanned by one degree of longitude at the given latitude.
pub fn meters_per_degree_lon(lat: f64) -> f64 {
    meters_per_degree_lat() * lat.to_radians().cos()
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &LatLon) -> f64 {
        Haversine.distance(Point::new(self.lon, self.lat), Point::new(other.lon, other.lat))
    }

    /// Moves this position by local east/north offsets in meters.
    pub fn offset_by(&self, east_m: f64, north_m: f64) -> LatLon {
        LatLon {
            lat: self.lat + north_m / meters_per_degree_lat(),
            lon: self.lon + east_m / meters_per_degree_lon(self.lat),
        }
    }

    /// Linear interpolation between two nearby positions.
    pub fn lerp(&self, other: &LatLon, t: f64) -> LatLon {
        LatLon {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

/// Flat east/north frame anchored at an origin.
///
/// Good to a few centimeters over the few hundred meters a running track spans.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    origin: LatLon,
    lat_scale: f64,
    lon_scale: f64,
}

impl LocalFrame {
    pub fn new(origin: LatLon) -> Self {
        Self {
            origin,
            lat_scale: meters_per_degree_lat(),
            lon_scale: meters_per_degree_lon(origin.lat),
        }
    }

    pub fn origin(&self) -> LatLon {
        self.origin
    }

    /// Converts local (x east, y north) meters to a geographic position.
    pub fn to_lat_lon(&self, x: f64, y: f64) -> LatLon {
        LatLon {
            lat: self.origin.lat + y / self.lat_scale,
            lon: self.origin.lon + x / self.lon_scale,
        }
    }

    /// Converts a geographic position to local (x east, y north) meters.
    pub fn to_local(&self, pos: &LatLon) -> (f64, f64) {
        (
            (pos.lon - self.origin.lon) * self.lon_scale,
            (pos.lat - self.origin.lat) * self.lat_scale,
        )
    }
}

/// Rotates a local vector counter-clockwise by `degrees`.
pub fn rotate(x: f64, y: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}
