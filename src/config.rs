//! Controller configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::GeoPoint;

/// The largest number of approaches one controller drives.
pub const MAX_ROADS: usize = 4;

/// Environment variable consulted for the API key.
pub const API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";

/// The complete controller configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Centre of the intersection.
    pub center: GeoPoint,
    /// Spacing between probe points, in m.
    pub radius_m: f64,
    /// Total length of one cycle's green time, in s.
    pub life_cycle_secs: u32,
    /// The number of approaches to discover.
    pub max_roads: usize,
    /// Free-form identifier of the controller cabinet.
    pub box_id: Option<String>,
    /// Offset of the travel time reference point, in degrees.
    pub reference_offset_deg: f64,
    /// Remote service settings.
    pub api: ApiConfig,
    /// Pacing and retry settings.
    pub timing: Timing,
}

/// Settings for the remote road and travel time services.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key appended to every request.
    pub key: Option<String>,
    /// Endpoint of the nearest roads service.
    pub roads_url: String,
    /// Endpoint of the distance matrix service.
    pub distance_matrix_url: String,
    /// Per-request timeout, in s.
    pub request_timeout_secs: u64,
}

/// Pacing of the signal cycle and of remote requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Length of one countdown tick, in ms.
    pub tick_ms: u64,
    /// Length of every yellow phase, in ticks.
    pub yellow_secs: u32,
    /// Minimum spacing between road discovery requests, in ms.
    pub probe_interval_ms: u64,
    /// Attempts made per intensity reading.
    pub retries: u32,
    /// Pause between intensity attempts, in ms.
    pub retry_backoff_ms: u64,
    /// Pause between the end of one cycle and the start of the next, in ms.
    pub restart_delay_ms: u64,
    /// Longest wait for the background refresh at a cycle boundary, in s.
    ///
    /// Unbounded if unset. A refresh that outlives the limit is discarded,
    /// so the limit must exceed the time needed to measure every road.
    pub refresh_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            center: GeoPoint::default(),
            radius_m: 50.0,
            life_cycle_secs: 60,
            max_roads: MAX_ROADS,
            box_id: None,
            reference_offset_deg: 0.001,
            api: ApiConfig::default(),
            timing: Timing::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            roads_url: "https://roads.googleapis.com/v1/nearestRoads".to_string(),
            distance_matrix_url: "https://maps.googleapis.com/maps/api/distancematrix/json"
                .to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            yellow_secs: 5,
            probe_interval_ms: 100,
            retries: 3,
            retry_backoff_ms: 100,
            restart_delay_ms: 1000,
            refresh_timeout_secs: None,
        }
    }
}

impl Timing {
    /// Gets the length of one countdown tick.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Gets the spacing between road discovery requests.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Gets the pause between intensity attempts.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Gets the pause between cycles.
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Gets the longest wait for the background refresh, if bounded.
    pub fn refresh_timeout(&self) -> Option<Duration> {
        self.refresh_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Reads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| Error::Configuration(format!("{}: {}", path.display(), err)))?;
        serde_json::from_str(&contents)
            .map_err(|err| Error::Configuration(format!("{}: {}", path.display(), err)))
    }

    /// Fills in the API key from the environment if none was given.
    pub fn with_env_key(mut self) -> Self {
        if self.api.key.is_none() {
            self.api.key = std::env::var(API_KEY_VAR).ok();
        }
        self
    }

    /// Checks that the controller can run with this configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.center.is_valid() {
            return Err(Error::Configuration(format!(
                "centre {} is not a valid coordinate",
                self.center
            )));
        }
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(Error::Configuration(format!(
                "search radius must be positive, got {}",
                self.radius_m
            )));
        }
        if self.life_cycle_secs == 0 {
            return Err(Error::Configuration(
                "life cycle must be at least one second".to_string(),
            ));
        }
        if !(1..=MAX_ROADS).contains(&self.max_roads) {
            return Err(Error::Configuration(format!(
                "road count must be between 1 and {}, got {}",
                MAX_ROADS, self.max_roads
            )));
        }
        if self.timing.retries == 0 {
            return Err(Error::Configuration(
                "at least one intensity attempt is required".to_string(),
            ));
        }
        Ok(())
    }
}
