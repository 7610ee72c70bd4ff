//! Discovery of the roads approaching an intersection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cgmath::Vector2;
use log::{debug, info, warn};

use crate::geo::{meters_to_lat_degrees, meters_to_lon_degrees, GeoPoint};
use crate::source::{RoadSource, SnappedPoint};

/// The highest step index probed along one direction.
pub const MAX_PROBE_STEPS: usize = 100;

/// A cardinal direction along which roads are probed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions in probing order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Gets the unit step of the direction as (latitude, longitude) signs.
    fn unit(self) -> Vector2<f64> {
        match self {
            Direction::North => Vector2::new(1.0, 0.0),
            Direction::East => Vector2::new(0.0, 1.0),
            Direction::South => Vector2::new(-1.0, 0.0),
            Direction::West => Vector2::new(0.0, -1.0),
        }
    }
}

/// A discovered road point and the probe that found it.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadCandidate {
    /// The coordinates identifying the road.
    pub location: GeoPoint,
    /// The provider's identifier for the road, if any.
    pub place_id: Option<String>,
    /// The direction of the probe that found the road.
    pub direction: Direction,
    /// The step index of the probe that found the road.
    pub step: usize,
}

/// Searches outwards from a point for nearby roads.
pub struct RoadProbe {
    /// The road snapping service.
    source: Arc<dyn RoadSource>,
    /// Minimum spacing between consecutive requests.
    interval: Duration,
}

/// The accumulated, deduplicated discovery result.
struct Discovered {
    candidates: Vec<RoadCandidate>,
    seen: HashSet<(u64, u64)>,
    max_count: usize,
}

impl Discovered {
    fn is_full(&self) -> bool {
        self.candidates.len() >= self.max_count
    }

    /// Accepts every new point until the cap is reached.
    fn accept(&mut self, points: Vec<SnappedPoint>, direction: Direction, step: usize) {
        for point in points {
            if self.is_full() {
                return;
            }
            if self.seen.insert(point.location.key()) {
                debug!("Road at {} found {:?} of centre, step {}", point.location, direction, step);
                self.candidates.push(RoadCandidate {
                    location: point.location,
                    place_id: point.place_id,
                    direction,
                    step,
                });
            }
        }
    }
}

impl RoadProbe {
    /// Creates a new probe.
    pub fn new(source: Arc<dyn RoadSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Discovers up to `max_count` distinct roads around `center`.
    ///
    /// Each cardinal direction is walked in turn, probing at whole multiples
    /// of `radius_m` until a probe finds nothing or the step limit is hit.
    /// Roads are returned in discovery order.
    pub async fn discover(
        &self,
        center: GeoPoint,
        radius_m: f64,
        max_count: usize,
    ) -> Vec<RoadCandidate> {
        let delta = Vector2::new(
            meters_to_lat_degrees(radius_m),
            meters_to_lon_degrees(radius_m, center.latitude),
        );
        let mut found = Discovered {
            candidates: vec![],
            seen: HashSet::new(),
            max_count,
        };
        let mut first_request = true;

        'directions: for direction in Direction::ALL {
            let unit = direction.unit();
            for step in 0..=MAX_PROBE_STEPS {
                if found.is_full() {
                    break 'directions;
                }
                if !first_request {
                    tokio::time::sleep(self.interval).await;
                }
                first_request = false;

                let step_delta = unit * step as f64;
                let point = center.offset(Vector2::new(
                    step_delta.x * delta.x,
                    step_delta.y * delta.y,
                ));
                match self.source.nearest_roads(point).await {
                    Ok(points) if points.is_empty() => break,
                    Ok(points) => found.accept(points, direction, step),
                    Err(err) => warn!("Road lookup at {} failed: {}", point, err),
                }
            }
        }

        info!("Discovered {} road(s) near {}", found.candidates.len(), center);
        found.candidates
    }
}
