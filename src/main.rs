use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use signal_cycle::geo::meters_to_lat_degrees;
use signal_cycle::{
    open_map_preview, shutdown_channel, Config, CycleScheduler, GoogleMaps, IntensityOracle,
    LogView, RoadProbe, RoadSource, SimulatedSource, TravelTimeSource,
};
use tracing_subscriber::EnvFilter;

/// Mean travel time of the simulated roads, in s.
const SIMULATED_MEAN: f64 = 30.0;

/// Spread of the simulated travel times, in s.
const SIMULATED_STDDEV: f64 = 12.0;

#[derive(Parser, Debug)]
#[command(about = "Adaptive traffic signal controller for the roads around a point")]
struct Args {
    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Latitude of the intersection in degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the intersection in degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Spacing between road probes in metres
    #[arg(long)]
    radius: Option<f64>,

    /// Total green time of one cycle in seconds
    #[arg(long)]
    life_cycle: Option<u32>,

    /// Number of roads to discover (1-4)
    #[arg(long)]
    max_roads: Option<usize>,

    /// Identifier of the controller cabinet
    #[arg(long)]
    box_id: Option<String>,

    /// Maps API key; defaults to the GOOGLE_MAPS_API_KEY environment variable
    #[arg(long)]
    api_key: Option<String>,

    /// Use simulated roads and traffic instead of the remote services
    #[arg(long)]
    simulate: bool,

    /// Open a map of the intersection
    #[arg(long)]
    preview: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(lat) = self.lat {
            config.center.latitude = lat;
        }
        if let Some(lon) = self.lon {
            config.center.longitude = lon;
        }
        if let Some(radius) = self.radius {
            config.radius_m = radius;
        }
        if let Some(life_cycle) = self.life_cycle {
            config.life_cycle_secs = life_cycle;
        }
        if let Some(max_roads) = self.max_roads {
            config.max_roads = max_roads;
        }
        if self.box_id.is_some() {
            config.box_id = self.box_id;
        }
        if self.api_key.is_some() {
            config.api.key = self.api_key;
        }
        let config = config.with_env_key();
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("signal_cycle=info")),
        )
        .init();

    let args = Args::parse();
    let simulate = args.simulate;
    let preview = args.preview;
    let config = args.into_config()?;

    info!("Location (Latitude, Longitude): {}", config.center);
    if let Some(box_id) = &config.box_id {
        info!("Traffic Box ID: {}", box_id);
    }
    info!("Range of Device (in meters): {}", config.radius_m);
    info!("Total Life Cycle (in seconds): {}", config.life_cycle_secs);

    if preview {
        open_map_preview(config.center);
    }

    let (roads, travel): (Arc<dyn RoadSource>, Arc<dyn TravelTimeSource>) = if simulate {
        let grid = meters_to_lat_degrees(config.radius_m);
        let source = Arc::new(SimulatedSource::new(
            config.center,
            grid,
            grid * config.max_roads as f64,
            SIMULATED_MEAN,
            SIMULATED_STDDEV,
        ));
        (
            source.clone() as Arc<dyn RoadSource>,
            source as Arc<dyn TravelTimeSource>,
        )
    } else {
        if config.api.key.is_none() {
            bail!("an API key is required unless --simulate is given");
        }
        let client = Arc::new(GoogleMaps::new(&config.api)?);
        (
            client.clone() as Arc<dyn RoadSource>,
            client as Arc<dyn TravelTimeSource>,
        )
    };

    let probe = RoadProbe::new(roads, config.timing.probe_interval());
    let found = probe
        .discover(config.center, config.radius_m, config.max_roads)
        .await;
    info!("Found {} roads near the specified location", found.len());

    let oracle = IntensityOracle::new(
        travel,
        config.reference_offset_deg,
        config.timing.retries,
        config.timing.retry_backoff(),
    );
    let mut scheduler = CycleScheduler::new(
        found,
        oracle,
        LogView::new(),
        config.life_cycle_secs,
        config.timing.clone(),
    )
    .context("signal cycle cannot start")?;

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.trigger();
        }
    });

    let cycles = scheduler.run(shutdown).await?;
    info!("Completed {} cycle(s)", cycles);
    Ok(())
}
