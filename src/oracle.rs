//! Congestion readings for individual roads.

use std::sync::Arc;
use std::time::Duration;

use cgmath::Vector2;
use log::{debug, warn};

use crate::geo::GeoPoint;
use crate::source::TravelTimeSource;

/// Converts travel times into congestion intensities.
///
/// An intensity is the traffic-adjusted travel time in s from a road point
/// to a nearby reference point. Zero means no reading could be obtained.
#[derive(Clone)]
pub struct IntensityOracle {
    /// The travel time service.
    source: Arc<dyn TravelTimeSource>,
    /// Offset of the reference point in degrees, applied to both axes.
    reference_offset: f64,
    /// Attempts made per reading.
    retries: u32,
    /// Pause between attempts.
    backoff: Duration,
}

impl IntensityOracle {
    /// Creates a new oracle.
    pub fn new(
        source: Arc<dyn TravelTimeSource>,
        reference_offset: f64,
        retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            source,
            reference_offset,
            retries,
            backoff,
        }
    }

    /// Measures the intensity at a single point.
    ///
    /// Malformed, missing and zero readings are retried; once the attempts
    /// are exhausted the reading is reported as zero.
    pub async fn measure(&self, point: GeoPoint) -> u32 {
        let reference = point.offset(Vector2::new(self.reference_offset, self.reference_offset));
        for attempt in 1..=self.retries {
            match self.source.duration_in_traffic(point, reference).await {
                Ok(0) => debug!("Zero travel time at {} (attempt {})", point, attempt),
                Ok(intensity) => return intensity,
                Err(err) => debug!("No reading at {} (attempt {}): {}", point, attempt, err),
            }
            tokio::time::sleep(self.backoff).await;
        }
        warn!("Traffic data unavailable at {}, assuming no congestion", point);
        0
    }

    /// Measures the intensity at each point, in order.
    pub async fn measure_all(&self, points: &[GeoPoint]) -> Vec<u32> {
        let mut intensities = Vec::with_capacity(points.len());
        for point in points {
            intensities.push(self.measure(*point).await);
        }
        intensities
    }
}
