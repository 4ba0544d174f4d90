// src/smoothing.rs - Moving average over arm control samples
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

use crate::tracking::ControlSignal;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Moving average window
    pub samples: usize,
    /// Angle jump (degrees) that marks an incoming sample as an outlier; `None` disables
    pub error_threshold: Option<f64>,
    /// How far an outlier is allowed to pull away from the value it replaces
    pub interpolation: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            samples: 4,
            error_threshold: None,
            interpolation: 0.5,
        }
    }
}

/// Fixed-size circular moving average with optional outlier interpolation.
///
/// The buffer starts zero-filled, so the average is biased toward zero until the
/// window has been filled once.
pub struct SignalSmoother {
    samples: Vec<ControlSignal>,
    index: usize,
    average: ControlSignal,
    up_to_date: bool,
    error_threshold: Option<f64>,
    interpolation: f64,
    interpolated: u64,
}

impl SignalSmoother {
    pub fn new(samples: usize, error_threshold: Option<f64>, interpolation: f64) -> Self {
        let samples = if samples == 0 {
            warn!("moving average window of 0 requested, using 1");
            1
        } else {
            samples
        };

        Self {
            samples: vec![ControlSignal::default(); samples],
            index: 0,
            average: ControlSignal::default(),
            up_to_date: true,
            error_threshold,
            interpolation: interpolation.clamp(0.0, 1.0),
            interpolated: 0,
        }
    }

    pub fn from_config(config: &SmootherConfig) -> Self {
        Self::new(config.samples, config.error_threshold, config.interpolation)
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, sample: ControlSignal) {
        let replaced = self.samples[self.index];

        let sample = match self.error_threshold {
            Some(threshold)
                if (sample.left_arm_angle - replaced.left_arm_angle).abs() > threshold
                    || (sample.right_arm_angle - replaced.right_arm_angle).abs() > threshold =>
            {
                self.interpolated += 1;
                trace!(threshold, "outlier sample, interpolating");
                replaced.lerp(&sample, self.interpolation)
            }
            _ => sample,
        };

        self.samples[self.index] = sample;
        self.index = (self.index + 1) % self.samples.len();
        self.up_to_date = false;
    }

    pub fn average(&mut self) -> ControlSignal {
        if !self.up_to_date {
            let first = self.samples[0];
            // Summation rounding would otherwise drift a uniform window off its value
            self.average = if self.samples.iter().all(|s| *s == first) {
                first
            } else {
                let mut average = ControlSignal::default();
                for sample in &self.samples {
                    average.accumulate(sample);
                }
                average.scale(1.0 / self.samples.len() as f64);
                average
            };
            self.up_to_date = true;
        }

        self.average
    }

    pub fn interpolated_count(&self) -> u64 {
        self.interpolated
    }

    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = ControlSignal::default());
        self.index = 0;
        self.average = ControlSignal::default();
        self.up_to_date = true;
    }
}

/// Latest-value slot between the sensor thread and the physics thread.
///
/// Readers always get a whole signal from one publish, never a mix of two.
#[derive(Clone, Default)]
pub struct SignalHandoff {
    slot: Arc<Mutex<ControlSignal>>,
}

impl SignalHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, signal: ControlSignal) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = signal;
    }

    pub fn latest(&self) -> ControlSignal {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
