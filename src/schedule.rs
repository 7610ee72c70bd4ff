//! Ranking of roads and allocation of green time.

use std::cmp::Reverse;

use itertools::Itertools;
use smallvec::SmallVec;

/// One position in a cycle's running order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Slot {
    /// Index of the road, in discovery order.
    pub road: usize,
    /// Green time in s.
    pub green: f64,
}

impl Slot {
    /// Gets the number of whole-second countdown ticks of green.
    pub fn green_ticks(&self) -> u32 {
        self.green.floor() as u32
    }
}

/// The running order and green times for one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleSchedule {
    slots: SmallVec<[Slot; 4]>,
}

impl CycleSchedule {
    /// Computes the schedule for a cycle from the roads' intensities.
    ///
    /// The most congested road gets half of `life_cycle_secs`; the other
    /// half is split evenly among the remaining roads. A lone road gets
    /// all of it.
    pub fn compute(intensities: &[u32], life_cycle_secs: u32) -> Self {
        let greens = Self::allocate(life_cycle_secs, intensities.len());
        let slots = Self::rank(intensities)
            .into_iter()
            .zip(greens)
            .map(|(road, green)| Slot { road, green })
            .collect();
        Self { slots }
    }

    /// Orders road indices by descending intensity.
    ///
    /// Equal intensities keep their discovery order.
    pub fn rank(intensities: &[u32]) -> SmallVec<[usize; 4]> {
        (0..intensities.len())
            .sorted_by_key(|&road| Reverse(intensities[road]))
            .collect()
    }

    /// Gets the green time in s of each position in the running order.
    pub fn allocate(life_cycle_secs: u32, num_roads: usize) -> SmallVec<[f64; 4]> {
        let total = life_cycle_secs as f64;
        match num_roads {
            0 => SmallVec::new(),
            1 => smallvec::smallvec![total],
            n => {
                let half = total / 2.0;
                let rest = half / (n - 1) as f64;
                std::iter::once(half)
                    .chain(std::iter::repeat(rest).take(n - 1))
                    .collect()
            }
        }
    }

    /// Gets the positions in running order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Gets the road indices in running order.
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().map(|slot| slot.road)
    }

    /// Gets the total green time in s.
    pub fn total_green(&self) -> f64 {
        self.slots.iter().map(|slot| slot.green).sum()
    }

    /// Gets the number of positions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if there are no positions.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
