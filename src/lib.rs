pub use config::{ApiConfig, Config, Timing, MAX_ROADS};
pub use error::{Error, Result};
pub use geo::GeoPoint;
pub use light::{LightState, TrafficLight};
pub use oracle::IntensityOracle;
pub use probe::{Direction, RoadCandidate, RoadProbe, MAX_PROBE_STEPS};
pub use schedule::{CycleSchedule, Slot};
pub use scheduler::{
    shutdown_channel, CycleScheduler, RoadSlot, SchedulerState, Shutdown, ShutdownTrigger,
};
pub use source::{GoogleMaps, RoadSource, SimulatedSource, SnappedPoint, TravelTimeSource};
pub use view::{open_map_preview, road_label, LogView, SignalView};

pub mod config;
mod error;
pub mod geo;
mod light;
mod oracle;
mod probe;
mod schedule;
mod scheduler;
pub mod source;
mod view;
