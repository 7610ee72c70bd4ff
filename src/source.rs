//! Remote collaborators: road snapping and travel time lookups.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand_distr::Distribution;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::geo::GeoPoint;

/// A point on a road returned by a road snapping service.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnappedPoint {
    /// The coordinates of the snapped point.
    pub location: GeoPoint,
    /// The provider's identifier for the road, if any.
    #[serde(default)]
    pub place_id: Option<String>,
}

/// Finds the roads nearest to a point.
#[async_trait]
pub trait RoadSource: Send + Sync {
    /// Gets the road points nearest to `point`.
    ///
    /// An empty result means no roads are nearby; it is not an error.
    async fn nearest_roads(&self, point: GeoPoint) -> Result<Vec<SnappedPoint>>;
}

/// Estimates travel times under current traffic.
#[async_trait]
pub trait TravelTimeSource: Send + Sync {
    /// Gets the traffic-adjusted travel time in s between two points,
    /// departing now.
    async fn duration_in_traffic(&self, origin: GeoPoint, destination: GeoPoint) -> Result<u32>;
}

/// Client for the Google Roads and Distance Matrix services.
pub struct GoogleMaps {
    http_client: reqwest::Client,
    key: Option<String>,
    roads_url: String,
    distance_matrix_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearestRoadsResponse {
    #[serde(default)]
    snapped_points: Vec<SnappedPoint>,
}

#[derive(Deserialize)]
struct DistanceMatrixResponse {
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Deserialize)]
struct MatrixElement {
    duration_in_traffic: Option<MatrixValue>,
}

#[derive(Deserialize)]
struct MatrixValue {
    value: u32,
}

impl DistanceMatrixResponse {
    fn duration_in_traffic(&self) -> Option<u32> {
        let element = self.rows.first()?.elements.first()?;
        element.duration_in_traffic.as_ref().map(|d| d.value)
    }
}

impl GoogleMaps {
    /// Creates a new client.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| Error::Configuration(format!("failed to build HTTP client: {}", err)))?;

        Ok(Self {
            http_client,
            key: config.key.clone(),
            roads_url: config.roads_url.clone(),
            distance_matrix_url: config.distance_matrix_url.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<T> {
        if let Some(key) = &self.key {
            query.push(("key", key.clone()));
        }
        let response = self
            .http_client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{} returned HTTP {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| Error::NoData(format!("malformed response: {}", err)))
    }
}

fn lat_lon(point: GeoPoint) -> String {
    format!("{},{}", point.latitude, point.longitude)
}

#[async_trait]
impl RoadSource for GoogleMaps {
    async fn nearest_roads(&self, point: GeoPoint) -> Result<Vec<SnappedPoint>> {
        let response: NearestRoadsResponse = self
            .get_json(&self.roads_url, vec![("points", lat_lon(point))])
            .await?;
        debug!("{} snapped point(s) near {}", response.snapped_points.len(), point);
        Ok(response.snapped_points)
    }
}

#[async_trait]
impl TravelTimeSource for GoogleMaps {
    async fn duration_in_traffic(&self, origin: GeoPoint, destination: GeoPoint) -> Result<u32> {
        let query = vec![
            ("origins", lat_lon(origin)),
            ("destinations", lat_lon(destination)),
            ("departure_time", "now".to_string()),
            ("traffic_model", "best_guess".to_string()),
        ];
        let response: DistanceMatrixResponse =
            self.get_json(&self.distance_matrix_url, query).await?;
        response
            .duration_in_traffic()
            .ok_or_else(|| Error::NoData(format!("no traffic data for {}", origin)))
    }
}

/// An offline stand-in for the remote services.
///
/// Roads lie on a square grid around the centre and travel times are drawn
/// from a normal distribution.
pub struct SimulatedSource {
    /// Centre of the simulated road grid.
    center: GeoPoint,
    /// Spacing of the road grid in degrees.
    grid_deg: f64,
    /// Roads exist up to this many degrees from the centre.
    extent_deg: f64,
    /// Distribution of travel times in s.
    distr: rand_distr::Normal<f64>,
}

impl SimulatedSource {
    /// Creates a new simulated source.
    ///
    /// # Parameters
    /// * `center` - The centre of the road grid.
    /// * `grid_deg` - The spacing between roads in degrees.
    /// * `extent_deg` - How far from the centre roads exist, in degrees.
    /// * `mean` - The mean travel time in s.
    /// * `stddev` - The standard deviation of the travel time in s.
    pub fn new(center: GeoPoint, grid_deg: f64, extent_deg: f64, mean: f64, stddev: f64) -> Self {
        let distr = rand_distr::Normal::new(mean, stddev).expect("Invalid standard deviation");
        Self {
            center,
            grid_deg,
            extent_deg,
            distr,
        }
    }

    fn snap(&self, value: f64, origin: f64) -> f64 {
        origin + ((value - origin) / self.grid_deg).round() * self.grid_deg
    }
}

#[async_trait]
impl RoadSource for SimulatedSource {
    async fn nearest_roads(&self, point: GeoPoint) -> Result<Vec<SnappedPoint>> {
        let d_lat = (point.latitude - self.center.latitude).abs();
        let d_lon = (point.longitude - self.center.longitude).abs();
        if f64::max(d_lat, d_lon) > self.extent_deg {
            return Ok(vec![]);
        }
        let location = GeoPoint::new(
            self.snap(point.latitude, self.center.latitude),
            self.snap(point.longitude, self.center.longitude),
        );
        Ok(vec![SnappedPoint {
            location,
            place_id: None,
        }])
    }
}

#[async_trait]
impl TravelTimeSource for SimulatedSource {
    async fn duration_in_traffic(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<u32> {
        let sample = self.distr.sample(&mut rand::thread_rng());
        Ok(sample.max(0.0).round() as u32)
    }
}
