//! The perpetual signal cycle.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::light::{LightState, TrafficLight};
use crate::oracle::IntensityOracle;
use crate::probe::RoadCandidate;
use crate::schedule::CycleSchedule;
use crate::view::{road_label, SignalView};

/// One approach to the intersection.
#[derive(Clone, Debug)]
pub struct RoadSlot {
    /// The display label.
    pub label: String,
    /// The discovered road point.
    pub candidate: RoadCandidate,
    /// The latest congestion reading; zero if unknown.
    pub intensity: u32,
}

/// What the scheduler is currently doing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No cycle has started.
    Idle,
    /// A road has entered `phase`; red once its yellow has run out.
    Running { phase: LightState, road: usize },
    /// Every road is red and the next cycle is being prepared.
    CycleComplete,
}

/// Requests that a running scheduler stop.
pub struct ShutdownTrigger(watch::Sender<bool>);

/// Observes a shutdown request.
#[derive(Clone)]
pub struct Shutdown(watch::Receiver<bool>);

/// Creates a connected shutdown trigger and observer.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), Shutdown(rx))
}

impl ShutdownTrigger {
    /// Requests shutdown.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

impl Shutdown {
    /// Returns true if shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until shutdown is requested.
    ///
    /// Never completes if the trigger is dropped without firing.
    pub async fn triggered(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Drives the signals of an intersection through ranked cycles.
///
/// Each cycle ranks the roads by intensity, gives each road its green and
/// yellow phase in turn, and refreshes the intensities in the background
/// while the last road shows yellow. Fresh readings take effect from the
/// next cycle.
pub struct CycleScheduler<V> {
    /// The roads, in discovery order.
    slots: Vec<RoadSlot>,
    /// The source of intensity readings.
    oracle: IntensityOracle,
    /// The display.
    view: V,
    /// The live signal states.
    light: TrafficLight,
    /// Total green time per cycle in s.
    life_cycle_secs: u32,
    /// Pacing settings.
    timing: Timing,
    /// The current state.
    state: SchedulerState,
    /// The in-flight intensity refresh.
    refresh: Option<JoinHandle<Vec<u32>>>,
    /// The number of completed cycles.
    cycles: usize,
}

impl<V: SignalView> CycleScheduler<V> {
    /// Creates a scheduler for the discovered roads.
    ///
    /// Fails if no roads were discovered or the cycle length is zero.
    pub fn new(
        roads: Vec<RoadCandidate>,
        oracle: IntensityOracle,
        view: V,
        life_cycle_secs: u32,
        timing: Timing,
    ) -> Result<Self> {
        if roads.is_empty() {
            return Err(Error::Configuration(
                "no roads found near the specified location".to_string(),
            ));
        }
        if life_cycle_secs == 0 {
            return Err(Error::Configuration(
                "life cycle must be at least one second".to_string(),
            ));
        }

        let slots = roads
            .into_iter()
            .enumerate()
            .map(|(idx, candidate)| RoadSlot {
                label: road_label(idx),
                candidate,
                intensity: 0,
            })
            .collect::<Vec<_>>();

        Ok(Self {
            light: TrafficLight::new(slots.len()),
            slots,
            oracle,
            view,
            life_cycle_secs,
            timing,
            state: SchedulerState::Idle,
            refresh: None,
            cycles: 0,
        })
    }

    /// Gets the roads, in discovery order.
    pub fn slots(&self) -> &[RoadSlot] {
        &self.slots
    }

    /// Gets the current state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Gets the number of completed cycles.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Gets the display.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Runs cycles until shutdown is requested.
    ///
    /// Shutdown is honoured at every countdown tick and while waiting for
    /// intensity readings. Returns the number of completed cycles.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<usize> {
        let result = self.drive(&mut shutdown).await;
        if let Some(refresh) = self.refresh.take() {
            refresh.abort();
        }
        match result {
            Err(Error::Terminated) => {
                info!("Signal cycle stopped after {} cycle(s)", self.cycles);
                Ok(self.cycles)
            }
            Err(err) => Err(err),
            Ok(()) => Ok(self.cycles),
        }
    }

    async fn drive(&mut self, shutdown: &mut Shutdown) -> Result<()> {
        if shutdown.is_triggered() {
            return Err(Error::Terminated);
        }

        let points = self.points();
        let oracle = self.oracle.clone();
        let initial = tokio::select! {
            intensities = oracle.measure_all(&points) => intensities,
            _ = shutdown.triggered() => return Err(Error::Terminated),
        };
        self.apply(initial);

        loop {
            let intensities = self.slots.iter().map(|slot| slot.intensity).collect::<Vec<_>>();
            let schedule = CycleSchedule::compute(&intensities, self.life_cycle_secs);
            self.run_cycle(&schedule, shutdown).await?;

            self.state = SchedulerState::CycleComplete;
            self.cycles += 1;
            if let Some(fresh) = self.join_refresh(shutdown).await? {
                self.apply(fresh);
            }

            info!("Starting next cycle with updated traffic data");
            pause(self.timing.restart_delay(), shutdown).await?;
        }
    }

    /// Gives every road in the schedule its green, yellow and red phases.
    async fn run_cycle(&mut self, schedule: &CycleSchedule, shutdown: &mut Shutdown) -> Result<()> {
        let last = schedule.len() - 1;
        for (pos, slot) in schedule.slots().iter().enumerate() {
            let road = slot.road;
            for other in self.light.isolate(road) {
                self.view.set_phase(other, LightState::Red, None);
            }

            info!(
                "Road {} green for {:.2} seconds",
                self.slots[road].label, slot.green
            );
            self.enter(road, LightState::Green);
            self.countdown(road, LightState::Green, slot.green_ticks(), shutdown)
                .await?;

            info!(
                "Road {} yellow for {} seconds",
                self.slots[road].label, self.timing.yellow_secs
            );
            self.enter(road, LightState::Yellow);
            if pos == last {
                self.spawn_refresh();
            }
            self.countdown(road, LightState::Yellow, self.timing.yellow_secs, shutdown)
                .await?;

            self.enter(road, LightState::Red);
            self.view.set_phase(road, LightState::Red, None);
        }
        Ok(())
    }

    fn enter(&mut self, road: usize, phase: LightState) {
        let changed = self.light.set(road, phase);
        debug_assert!(changed, "invalid transition to {} for road {}", phase, road);
        self.state = SchedulerState::Running { phase, road };
    }

    /// Shows a phase counting down one tick at a time.
    async fn countdown(
        &mut self,
        road: usize,
        phase: LightState,
        ticks: u32,
        shutdown: &mut Shutdown,
    ) -> Result<()> {
        if ticks == 0 {
            self.view.set_phase(road, phase, None);
            return Ok(());
        }
        for remaining in (1..=ticks).rev() {
            self.view.set_phase(road, phase, Some(remaining));
            pause(self.timing.tick(), shutdown).await?;
        }
        Ok(())
    }

    /// Starts measuring every road in the background.
    fn spawn_refresh(&mut self) {
        info!("Fetching new traffic data during yellow light of the last road");
        let oracle = self.oracle.clone();
        let points = self.points();
        self.refresh = Some(tokio::spawn(async move {
            oracle.measure_all(&points).await
        }));
    }

    /// Waits for the background refresh.
    ///
    /// Returns `None` if nothing was in flight, or if it failed or outlived
    /// the refresh timeout, in which case the previous readings stay in effect.
    async fn join_refresh(&mut self, shutdown: &mut Shutdown) -> Result<Option<Vec<u32>>> {
        let Some(mut handle) = self.refresh.take() else {
            return Ok(None);
        };

        let limit = self.timing.refresh_timeout();
        let joined = tokio::select! {
            joined = bounded_join(&mut handle, limit) => Some(joined),
            _ = shutdown.triggered() => None,
        };
        let Some(joined) = joined else {
            handle.abort();
            return Err(Error::Terminated);
        };
        match joined {
            Some(Ok(intensities)) => Ok(Some(intensities)),
            Some(Err(err)) => {
                warn!("Traffic data refresh failed: {}", err);
                Ok(None)
            }
            None => {
                warn!("Traffic data refresh timed out, keeping previous readings");
                handle.abort();
                Ok(None)
            }
        }
    }

    /// Stores fresh readings in the road slots.
    fn apply(&mut self, intensities: Vec<u32>) {
        debug_assert_eq!(intensities.len(), self.slots.len());
        for (slot, intensity) in self.slots.iter_mut().zip(intensities) {
            slot.intensity = intensity;
            info!(
                "Road {}: Coordinates: {}, Traffic Intensity: {}",
                slot.label, slot.candidate.location, slot.intensity
            );
        }
        debug!("Readings applied after {} cycle(s)", self.cycles);
    }

    fn points(&self) -> Vec<GeoPoint> {
        self.slots.iter().map(|slot| slot.candidate.location).collect()
    }
}

/// Sleeps for `duration` unless shutdown is requested first.
async fn pause(duration: Duration, shutdown: &mut Shutdown) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = shutdown.triggered() => Err(Error::Terminated),
    }
}

/// Joins a task, giving up after `limit` if one is set.
async fn bounded_join<T>(
    handle: &mut JoinHandle<T>,
    limit: Option<Duration>,
) -> Option<std::result::Result<T, tokio::task::JoinError>> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, handle).await.ok(),
        None => Some(handle.await),
    }
}
