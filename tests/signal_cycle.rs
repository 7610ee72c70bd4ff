//! Tests that run the signal cycle against scripted traffic data.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use signal_cycle::{
    shutdown_channel, CycleScheduler, Direction, Error, GeoPoint, IntensityOracle, LightState,
    Result, RoadCandidate, SchedulerState, ShutdownTrigger, SignalView, Timing, TravelTimeSource,
};

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Phase(usize, LightState, Option<u32>),
    Measure(usize),
}

type Log = Arc<Mutex<Vec<Event>>>;

/// When a `Recorder` requests shutdown.
#[derive(Clone, Copy, Debug)]
enum Stop {
    /// As the n-th green phase starts.
    Green(usize),
    /// As the n-th yellow phase turns red.
    Red(usize),
}

/// Records every phase change and stops the cycle at a given transition.
struct Recorder {
    log: Log,
    states: Vec<LightState>,
    trigger: ShutdownTrigger,
    stop: Stop,
    greens: usize,
    reds: usize,
}

impl SignalView for Recorder {
    fn set_phase(&mut self, road: usize, phase: LightState, countdown: Option<u32>) {
        match (self.states[road], phase) {
            (LightState::Green, LightState::Green) => {}
            (_, LightState::Green) => {
                self.greens += 1;
                if let Stop::Green(n) = self.stop {
                    if self.greens == n {
                        self.trigger.trigger();
                    }
                }
            }
            (LightState::Yellow, LightState::Red) => {
                self.reds += 1;
                if let Stop::Red(n) = self.stop {
                    if self.reds == n {
                        self.trigger.trigger();
                    }
                }
            }
            _ => {}
        }
        self.states[road] = phase;
        let lit = self.states.iter().filter(|s| **s != LightState::Red).count();
        assert!(lit <= 1, "{} roads lit at once", lit);
        self.log.lock().unwrap().push(Event::Phase(road, phase, countdown));
    }
}

/// Answers each road's n-th reading from the n-th batch of scripted values.
struct Traffic {
    roads: Vec<GeoPoint>,
    batches: Vec<Vec<u32>>,
    calls: Mutex<Vec<usize>>,
    log: Log,
    /// Batches from this index on take this long to answer.
    slow_from: Option<(usize, Duration)>,
}

#[async_trait]
impl TravelTimeSource for Traffic {
    async fn duration_in_traffic(&self, origin: GeoPoint, _destination: GeoPoint) -> Result<u32> {
        let road = self
            .roads
            .iter()
            .position(|p| *p == origin)
            .expect("unknown road");
        let batch = {
            let mut calls = self.calls.lock().unwrap();
            calls[road] += 1;
            calls[road] - 1
        };
        if let Some((from, delay)) = self.slow_from {
            if batch >= from {
                tokio::time::sleep(delay).await;
            }
        }
        self.log.lock().unwrap().push(Event::Measure(road));
        let values = self.batches.get(batch).or(self.batches.last()).unwrap();
        Ok(values[road])
    }
}

struct Scenario {
    roads: Vec<RoadCandidate>,
    log: Log,
    traffic: Arc<Traffic>,
}

impl Scenario {
    fn new(batches: Vec<Vec<u32>>) -> Self {
        let count = batches[0].len();
        let roads = (0..count)
            .map(|idx| RoadCandidate {
                location: GeoPoint::new(-33.86 + 0.001 * idx as f64, 151.2),
                place_id: None,
                direction: Direction::North,
                step: idx,
            })
            .collect::<Vec<_>>();
        let log = Log::default();
        let traffic = Arc::new(Traffic {
            roads: roads.iter().map(|r| r.location).collect(),
            batches,
            calls: Mutex::new(vec![0; count]),
            log: log.clone(),
            slow_from: None,
        });
        Self {
            roads,
            log,
            traffic,
        }
    }

    fn slow_from(mut self, batch: usize, delay: Duration) -> Self {
        Arc::get_mut(&mut self.traffic).unwrap().slow_from = Some((batch, delay));
        self
    }

    fn scheduler(
        &self,
        life_cycle_secs: u32,
        timing: Timing,
        stop: Stop,
    ) -> (CycleScheduler<Recorder>, signal_cycle::Shutdown) {
        let (trigger, shutdown) = shutdown_channel();
        let view = Recorder {
            log: self.log.clone(),
            states: vec![LightState::Red; self.roads.len()],
            trigger,
            stop,
            greens: 0,
            reds: 0,
        };
        let oracle = IntensityOracle::new(
            self.traffic.clone(),
            0.001,
            3,
            Duration::from_millis(100),
        );
        let scheduler =
            CycleScheduler::new(self.roads.clone(), oracle, view, life_cycle_secs, timing)
                .unwrap();
        (scheduler, shutdown)
    }

    fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    /// The roads in the order their green phases started.
    fn green_order(&self) -> Vec<usize> {
        let mut lit: Option<usize> = None;
        let mut order = vec![];
        for event in self.events() {
            match event {
                Event::Phase(road, LightState::Green, _) if lit != Some(road) => {
                    lit = Some(road);
                    order.push(road);
                }
                Event::Phase(road, LightState::Red, _) if lit == Some(road) => lit = None,
                _ => {}
            }
        }
        order
    }
}

/// Four roads with intensities 10, 50, 5 and 20 and a 40 s cycle.
#[tokio::test(start_paused = true)]
async fn four_roads_run_in_ranked_order() {
    let scenario = Scenario::new(vec![vec![10, 50, 5, 20]]);
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(5));

    let start = tokio::time::Instant::now();
    let cycles = scheduler.run(shutdown).await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(scenario.green_order(), vec![1, 3, 0, 2, 1]);
    // 20 + 3 * 6 s of green, 4 * 5 s of yellow, then the restart delay
    assert_eq!(start.elapsed(), Duration::from_secs(59));

    let events = scenario.events();
    assert!(events.contains(&Event::Phase(1, LightState::Green, Some(20))));
    assert!(!events.contains(&Event::Phase(1, LightState::Green, Some(21))));
    for road in [3, 0, 2] {
        assert!(events.contains(&Event::Phase(road, LightState::Green, Some(6))));
        assert!(!events.contains(&Event::Phase(road, LightState::Green, Some(7))));
    }
    for road in 0..4 {
        assert!(events.contains(&Event::Phase(road, LightState::Yellow, Some(5))));
        assert!(!events.contains(&Event::Phase(road, LightState::Yellow, Some(6))));
    }
}

#[tokio::test(start_paused = true)]
async fn countdown_ticks_once_per_second() {
    let scenario = Scenario::new(vec![vec![3, 1]]);
    let mut timing = Timing::default();
    timing.yellow_secs = 2;
    let (mut scheduler, shutdown) = scenario.scheduler(6, timing, Stop::Green(3));
    scheduler.run(shutdown).await.unwrap();

    let first_road = scenario
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Phase(0, _, Some(_))))
        .take(5)
        .collect::<Vec<_>>();
    assert_eq!(
        first_road,
        vec![
            Event::Phase(0, LightState::Green, Some(3)),
            Event::Phase(0, LightState::Green, Some(2)),
            Event::Phase(0, LightState::Green, Some(1)),
            Event::Phase(0, LightState::Yellow, Some(2)),
            Event::Phase(0, LightState::Yellow, Some(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn fresh_readings_apply_at_cycle_boundary() {
    let scenario = Scenario::new(vec![vec![10, 50, 5, 20], vec![40, 1, 30, 2]]);
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(6));
    scheduler.run(shutdown).await.unwrap();

    assert_eq!(scenario.green_order(), vec![1, 3, 0, 2, 0, 2]);
    let intensities = scheduler.slots().iter().map(|s| s.intensity).collect::<Vec<_>>();
    assert_eq!(intensities, vec![40, 1, 30, 2]);

    // The refresh starts with the last road's yellow and finishes before
    // the next cycle's first green
    let events = scenario.events();
    let last_yellow = events
        .iter()
        .position(|e| *e == Event::Phase(2, LightState::Yellow, Some(5)))
        .unwrap();
    let next_green = events
        .iter()
        .position(|e| *e == Event::Phase(0, LightState::Green, Some(20)))
        .unwrap();
    let refreshes = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Measure(_)))
        .map(|(idx, _)| idx)
        .skip(4)
        .collect::<Vec<_>>();
    assert_eq!(refreshes.len(), 4);
    assert!(refreshes.iter().all(|&idx| idx > last_yellow && idx < next_green));
}

#[tokio::test(start_paused = true)]
async fn single_road_gets_whole_cycle() {
    let scenario = Scenario::new(vec![vec![12]]);
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(2));

    let start = tokio::time::Instant::now();
    let cycles = scheduler.run(shutdown).await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(scenario.green_order(), vec![0, 0]);
    assert!(scenario
        .events()
        .contains(&Event::Phase(0, LightState::Green, Some(40))));
    assert_eq!(start.elapsed(), Duration::from_secs(46));
}

#[tokio::test(start_paused = true)]
async fn missing_readings_count_as_zero() {
    let scenario = Scenario::new(vec![vec![10, 50, 0, 20]]);
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(5));
    let cycles = scheduler.run(shutdown).await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(scheduler.slots()[2].intensity, 0);
    assert_eq!(scenario.green_order(), vec![1, 3, 0, 2, 1]);
    // Three attempts for the zero reading in each of the two batches
    let attempts = scenario
        .events()
        .iter()
        .filter(|e| **e == Event::Measure(2))
        .count();
    assert_eq!(attempts, 6);
}

#[tokio::test(start_paused = true)]
async fn slow_refresh_keeps_previous_readings() {
    let scenario = Scenario::new(vec![vec![10, 50, 5, 20], vec![40, 1, 30, 2]])
        .slow_from(1, Duration::from_secs(120));
    let timing = Timing {
        refresh_timeout_secs: Some(10),
        ..Default::default()
    };
    let (mut scheduler, shutdown) = scenario.scheduler(40, timing, Stop::Green(6));
    scheduler.run(shutdown).await.unwrap();

    assert_eq!(scenario.green_order(), vec![1, 3, 0, 2, 1, 3]);
    let intensities = scheduler.slots().iter().map(|s| s.intensity).collect::<Vec<_>>();
    assert_eq!(intensities, vec![10, 50, 5, 20]);
}

/// Four sequential 20 s readings outlast any short fixed limit.
#[tokio::test(start_paused = true)]
async fn default_timing_waits_for_slow_refresh() {
    let scenario = Scenario::new(vec![vec![10, 50, 5, 20], vec![40, 1, 30, 2]])
        .slow_from(1, Duration::from_secs(20));
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(6));
    scheduler.run(shutdown).await.unwrap();

    assert_eq!(scenario.green_order(), vec![1, 3, 0, 2, 0, 2]);
    let intensities = scheduler.slots().iter().map(|s| s.intensity).collect::<Vec<_>>();
    assert_eq!(intensities, vec![40, 1, 30, 2]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_refresh() {
    let scenario = Scenario::new(vec![vec![10, 50, 5, 20], vec![40, 1, 30, 2]])
        .slow_from(1, Duration::from_secs(120));
    let timing = Timing {
        refresh_timeout_secs: None,
        ..Default::default()
    };
    let (mut scheduler, shutdown) = scenario.scheduler(40, timing, Stop::Red(4));

    let start = tokio::time::Instant::now();
    assert_eq!(scheduler.run(shutdown).await, Ok(1));
    // Stopped at the boundary rather than after the refresh
    assert_eq!(start.elapsed(), Duration::from_secs(58));
    assert_eq!(scheduler.state(), SchedulerState::CycleComplete);
    assert_eq!(scheduler.slots()[1].intensity, 50);

    let measured = |events: Vec<Event>| {
        events
            .iter()
            .filter(|e| matches!(e, Event::Measure(_)))
            .count()
    };
    assert_eq!(measured(scenario.events()), 4);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(measured(scenario.events()), 4);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_start_runs_nothing() {
    let scenario = Scenario::new(vec![vec![1, 2]]);
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(1));
    // Run against a trigger that has already fired
    let (trigger, early) = shutdown_channel();
    trigger.trigger();
    drop(shutdown);

    assert_eq!(scheduler.run(early).await, Ok(0));
    assert!(scenario.events().is_empty());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stops_mid_phase_on_shutdown() {
    let scenario = Scenario::new(vec![vec![10, 50, 5, 20]]);
    let (mut scheduler, shutdown) = scenario.scheduler(40, Timing::default(), Stop::Green(2));
    let cycles = scheduler.run(shutdown).await.unwrap();

    assert_eq!(cycles, 0);
    assert_eq!(
        scheduler.state(),
        SchedulerState::Running {
            phase: LightState::Green,
            road: 3
        }
    );
    assert_eq!(
        scenario.events().last(),
        Some(&Event::Phase(3, LightState::Green, Some(6)))
    );
}

#[test]
fn no_roads_is_a_configuration_error() {
    let scenario = Scenario::new(vec![vec![1]]);
    let (trigger, _shutdown) = shutdown_channel();
    let view = Recorder {
        log: scenario.log.clone(),
        states: vec![],
        trigger,
        stop: Stop::Green(1),
        greens: 0,
        reds: 0,
    };
    let oracle = IntensityOracle::new(scenario.traffic.clone(), 0.001, 3, Duration::ZERO);
    let result = CycleScheduler::new(vec![], oracle, view, 40, Timing::default());
    assert!(matches!(result, Err(Error::Configuration(_))));
}
