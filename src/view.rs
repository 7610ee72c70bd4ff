//! Display of signal states.

use log::{debug, info, warn};

use crate::geo::GeoPoint;
use crate::light::LightState;

/// Receives the signal state of each road as it changes.
pub trait SignalView: Send {
    /// Shows a road's signal, with the whole seconds remaining in the phase
    /// if it is counting down.
    fn set_phase(&mut self, road: usize, phase: LightState, countdown: Option<u32>);
}

impl<V: SignalView + ?Sized> SignalView for Box<V> {
    fn set_phase(&mut self, road: usize, phase: LightState, countdown: Option<u32>) {
        (**self).set_phase(road, phase, countdown)
    }
}

/// Gets the display label of a road.
pub fn road_label(road: usize) -> String {
    if road < 26 {
        char::from(b'A' + road as u8).to_string()
    } else {
        format!("#{}", road + 1)
    }
}

/// Writes signal states to the log.
#[derive(Default)]
pub struct LogView {
    /// The last state shown for each road.
    shown: Vec<Option<LightState>>,
}

impl LogView {
    /// Creates a new log view.
    pub fn new() -> Self {
        Default::default()
    }
}

impl SignalView for LogView {
    fn set_phase(&mut self, road: usize, phase: LightState, countdown: Option<u32>) {
        if self.shown.len() <= road {
            self.shown.resize(road + 1, None);
        }
        let changed = self.shown[road] != Some(phase);
        self.shown[road] = Some(phase);

        match countdown {
            Some(secs) if changed => info!("Road {} {} for {} s", road_label(road), phase, secs),
            Some(secs) => debug!("Road {} {}: {} s", road_label(road), phase, secs),
            None if changed => debug!("Road {} {}", road_label(road), phase),
            None => {}
        }
    }
}

/// Opens a map of the intersection in the system's viewer.
///
/// The viewer is not waited on and failures are only logged.
pub fn open_map_preview(center: GeoPoint) {
    let url = center.map_url();
    info!("Map preview: {}", url);

    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    if let Err(err) = std::process::Command::new(opener).arg(&url).spawn() {
        warn!("Could not open map preview: {}", err);
    }
}
