//! Navigator sides and wheel debouncing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Raw wheel deltas at or above this are treated as wraparound, i.e. backward
pub const WHEEL_JUMP_LIMIT: i32 = 100;

/// Which arm's navigator produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "left" | "l" => Some(Self::Left),
            "right" | "r" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Forward,
    Backward,
}

impl ScrollDirection {
    pub fn step(self) -> isize {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }
}

/// Last wheel reading on one side
#[derive(Debug, Clone, Copy)]
pub struct WheelState {
    pub last_value: i32,
    pub last_accepted: Option<Instant>,
}

impl WheelState {
    pub fn new(initial: i32) -> Self {
        Self {
            last_value: initial,
            last_accepted: None,
        }
    }

    /// Direction implied by moving from the last reading to `value`
    pub fn direction(&self, value: i32) -> ScrollDirection {
        // Readings may span the whole i32 range
        if value > self.last_value && value.abs_diff(self.last_value) < WHEEL_JUMP_LIMIT as u32 {
            ScrollDirection::Forward
        } else {
            ScrollDirection::Backward
        }
    }
}

/// Turns raw wheel values from both navigators into scroll intents
#[derive(Debug, Clone)]
pub struct WheelDebouncer {
    left: WheelState,
    right: WheelState,
    interval: Duration,
}

impl WheelDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self::with_initial(interval, 0, 0)
    }

    pub fn with_initial(interval: Duration, left: i32, right: i32) -> Self {
        Self {
            left: WheelState::new(left),
            right: WheelState::new(right),
            interval,
        }
    }

    pub fn state(&self, side: Side) -> &WheelState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn state_mut(&mut self, side: Side) -> &mut WheelState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Record a raw reading; returns the scroll to forward, if any
    pub fn observe(&mut self, side: Side, value: i32, now: Instant) -> Option<ScrollDirection> {
        let interval = self.interval;
        let state = self.state_mut(side);
        let direction = state.direction(value);
        state.last_value = value;

        let accept = match state.last_accepted {
            None => true,
            Some(last) => now.saturating_duration_since(last) > interval,
        };
        if !accept {
            return None;
        }
        state.last_accepted = Some(now);
        Some(direction)
    }
}
