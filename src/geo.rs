//! Geographic points and degree conversions.

use std::fmt;

use cgmath::Vector2;
use serde::{Deserialize, Serialize};

/// Metres spanned by one degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0; // m

/// Zoom level of the map preview.
const MAP_ZOOM: u32 = 15;

/// A point on the Earth's surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a new point.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns the point displaced by `delta`, given as (latitude, longitude) degrees.
    pub fn offset(&self, delta: Vector2<f64>) -> Self {
        Self::new(self.latitude + delta.x, self.longitude + delta.y)
    }

    /// Gets a hashable identity for the point.
    ///
    /// Two points share a key exactly when their coordinates are equal.
    pub fn key(&self) -> (u64, u64) {
        // Adding zero folds -0.0 into +0.0
        ((self.latitude + 0.0).to_bits(), (self.longitude + 0.0).to_bits())
    }

    /// Builds the URL of a map centred on this point.
    pub fn map_url(&self) -> String {
        format!(
            "https://www.google.com/maps/@{},{},{}z",
            self.latitude, self.longitude, MAP_ZOOM
        )
    }

    /// Checks that the coordinates are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Converts a north-south distance into degrees of latitude.
pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Converts an east-west distance at the given latitude into degrees of longitude.
///
/// Meridians converge towards the poles, so the same distance spans more
/// degrees the further the latitude is from the equator.
pub fn meters_to_lon_degrees(meters: f64, latitude: f64) -> f64 {
    meters / (METERS_PER_DEGREE * latitude.to_radians().cos())
}
