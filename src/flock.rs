// src/flock.rs - Velocity of the path-driven flock frame
use nalgebra::Vector3;

const MAX_SAMPLES: usize = 10;
/// Only samples this recent (seconds) count toward the average
const WINDOW: f64 = 0.2;

/// Estimates velocity for an object whose position is set directly every frame
/// (the flock following its spline), since no physics engine tracks it.
pub struct FlockVelocity {
    samples: [Vector3<f64>; MAX_SAMPLES],
    times: [f64; MAX_SAMPLES],
    filled: usize,
    marker: usize,
    previous_position: Option<Vector3<f64>>,
    velocity: Vector3<f64>,
}

impl Default for FlockVelocity {
    fn default() -> Self {
        Self::new()
    }
}

impl FlockVelocity {
    pub fn new() -> Self {
        Self {
            samples: [Vector3::zeros(); MAX_SAMPLES],
            times: [0.0; MAX_SAMPLES],
            filled: 0,
            marker: 0,
            previous_position: None,
            velocity: Vector3::zeros(),
        }
    }

    /// Record the flock position at `time` and return the averaged velocity.
    pub fn update(&mut self, position: Vector3<f64>, time: f64, dt: f64) -> Vector3<f64> {
        let previous = self.previous_position.unwrap_or(position);
        self.samples[self.marker] = if dt > 0.0 {
            (position - previous) / dt
        } else {
            Vector3::zeros()
        };
        self.times[self.marker] = time;
        self.marker = (self.marker + 1) % MAX_SAMPLES;
        self.filled = (self.filled + 1).min(MAX_SAMPLES);
        self.previous_position = Some(position);

        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for i in 0..self.filled {
            if time - self.times[i] <= WINDOW {
                sum += self.samples[i];
                count += 1;
            }
        }

        // The sample just written is always inside the window
        self.velocity = sum / count.max(1) as f64;
        self.velocity
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }
}
