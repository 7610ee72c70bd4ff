use std::fmt;

/// A set of coordinated traffic lights, one per road.
///
/// At most one road shows anything other than red at a time.
#[derive(Clone, Debug)]
pub struct TrafficLight {
    /// The signal state of each road.
    states: Vec<LightState>,
}

/// The state of a road's signal.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum LightState {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LightState::Red => "red",
            LightState::Yellow => "yellow",
            LightState::Green => "green",
        })
    }
}

impl TrafficLight {
    /// Creates a set of lights with every road red.
    pub fn new(num_roads: usize) -> Self {
        Self {
            states: vec![LightState::Red; num_roads],
        }
    }

    /// Gets the number of roads.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if there are no roads.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Gets the state of a road's signal.
    pub fn state(&self, road: usize) -> LightState {
        self.states[road]
    }

    /// Gets the road that is not red, if any.
    pub fn active(&self) -> Option<usize> {
        self.states.iter().position(|&state| state != LightState::Red)
    }

    /// Checks that every other road is red.
    pub fn can_turn_green(&self, road: usize) -> bool {
        self.states
            .iter()
            .enumerate()
            .all(|(idx, &state)| idx == road || state == LightState::Red)
    }

    /// Moves a road's signal to the given state.
    ///
    /// Returns false and leaves the lights unchanged if the transition
    /// would break the green, yellow, red sequence or leave two roads
    /// showing something other than red.
    pub fn set(&mut self, road: usize, next: LightState) -> bool {
        use LightState::*;
        let allowed = match (self.states[road], next) {
            (Red, Green) => self.can_turn_green(road),
            (Green, Yellow) | (Yellow, Red) | (Red, Red) => true,
            (current, next) => current == next,
        };
        if allowed {
            self.states[road] = next;
        }
        allowed
    }

    /// Forces every road except `road` to red.
    ///
    /// Returns the roads whose state was set.
    pub fn isolate(&mut self, road: usize) -> Vec<usize> {
        let others = (0..self.len()).filter(|&idx| idx != road).collect::<Vec<_>>();
        for &idx in &others {
            self.states[idx] = LightState::Red;
        }
        others
    }
}
