//! Spring-back decay for a released pull below the refresh threshold.

/// Fraction of the remaining distance kept each frame.
pub const DECAY: f64 = 0.8;

/// Below this the indicator snaps to zero.
pub const REST_DISTANCE: f64 = 1.0;

/// Distance one frame after `distance`.
pub fn next_distance(distance: f64) -> f64 {
  distance * DECAY
}

/// Discrete-time stepper, advanced by whatever drives frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringBack {
  distance: f64,
  settled: bool,
}

impl SpringBack {
  pub fn new(distance: f64) -> Self {
    Self {
      distance: distance.max(0.0),
      settled: false,
    }
  }

  pub fn distance(&self) -> f64 {
    self.distance
  }

  pub fn is_settled(&self) -> bool {
    self.settled
  }

  /// Advance one frame and return the new distance.
  pub fn step(&mut self) -> f64 {
    if self.settled {
      return 0.0;
    }

    let next = next_distance(self.distance);
    if next < REST_DISTANCE {
      self.distance = 0.0;
      self.settled = true;
    } else {
      self.distance = next;
    }
    self.distance
  }

  /// Frames needed to settle from the current distance.
  pub fn frames_to_rest(&self) -> usize {
    let mut sim = *self;
    let mut frames = 0;
    while !sim.is_settled() {
      sim.step();
      frames += 1;
    }
    frames
  }
}
