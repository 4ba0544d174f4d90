// src/tracking.rs - Skeleton filtering and arm signal extraction
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::data::SignalLog;
use crate::math::{project_on_plane, signed_angle, EPSILON};
use crate::skeleton::{FilteredSkeleton, Joint, JointId, SkeletonSnapshot};
use crate::smoothing::{SignalSmoother, SmootherConfig};

pub const PIPELINE_CHANNELS: [&str; 7] = [
    "rAngle", "lAngle", "rElev", "rHorizX", "rHorizZ", "raLogRaw", "raAvLog",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];
}

/// Per-tick control input derived from the user's arms.
///
/// Angles are degrees in [-90, 90] (positive = arm raised above the shoulder line),
/// extensions are the fraction of full reach achieved in the body plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlSignal {
    pub right_arm_angle: f64,
    pub right_arm_extension: f64,
    pub left_arm_angle: f64,
    pub left_arm_extension: f64,
}

impl ControlSignal {
    pub fn new(
        right_arm_angle: f64,
        right_arm_extension: f64,
        left_arm_angle: f64,
        left_arm_extension: f64,
    ) -> Self {
        Self {
            right_arm_angle,
            right_arm_extension,
            left_arm_angle,
            left_arm_extension,
        }
    }

    pub fn angle(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_arm_angle,
            Side::Right => self.right_arm_angle,
        }
    }

    pub fn extension(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_arm_extension,
            Side::Right => self.right_arm_extension,
        }
    }

    fn set_side(&mut self, side: Side, angle: f64, extension: f64) {
        match side {
            Side::Left => {
                self.left_arm_angle = angle;
                self.left_arm_extension = extension;
            }
            Side::Right => {
                self.right_arm_angle = angle;
                self.right_arm_extension = extension;
            }
        }
    }

    pub fn lerp(&self, other: &ControlSignal, t: f64) -> ControlSignal {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        ControlSignal {
            right_arm_angle: mix(self.right_arm_angle, other.right_arm_angle),
            right_arm_extension: mix(self.right_arm_extension, other.right_arm_extension),
            left_arm_angle: mix(self.left_arm_angle, other.left_arm_angle),
            left_arm_extension: mix(self.left_arm_extension, other.left_arm_extension),
        }
    }

    pub(crate) fn accumulate(&mut self, other: &ControlSignal) {
        self.right_arm_angle += other.right_arm_angle;
        self.right_arm_extension += other.right_arm_extension;
        self.left_arm_angle += other.left_arm_angle;
        self.left_arm_extension += other.left_arm_extension;
    }

    pub(crate) fn scale(&mut self, factor: f64) {
        self.right_arm_angle *= factor;
        self.right_arm_extension *= factor;
        self.left_arm_angle *= factor;
        self.left_arm_extension *= factor;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Fastest a joint may move, in meters per second
    pub max_joint_velocity: f64,
    /// Tracking-space units per meter (the sensor reports centimeters)
    pub units_per_meter: f64,
    pub clip_small_angles: bool,
    /// Width of the dead zone around the neutral pose, in degrees
    pub small_angle_threshold: f64,
    pub degenerate_epsilon: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_joint_velocity: 10.0,
            units_per_meter: 100.0,
            clip_small_angles: true,
            small_angle_threshold: 9.0,
            degenerate_epsilon: 1e-6,
        }
    }
}

pub trait TrackingSession {
    fn is_user_present(&self) -> bool;
    fn user_id(&self) -> Option<u32>;
    fn current_skeleton(&self) -> Option<&SkeletonSnapshot>;
}

/// Clamps per-joint speed so sensor teleports never reach the angle math.
pub struct JointFilter {
    skeleton: FilteredSkeleton,
    // Tracking-space units per second
    max_speed: f64,
}

impl JointFilter {
    pub fn new(max_joint_velocity: f64, units_per_meter: f64) -> Self {
        Self {
            skeleton: FilteredSkeleton::default(),
            max_speed: max_joint_velocity * units_per_meter,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.max_joint_velocity, config.units_per_meter)
    }

    pub fn max_step(&self, dt: f64) -> f64 {
        self.max_speed * dt.max(0.0)
    }

    /// Fold a raw frame into the filtered skeleton. The flag is true when any joint
    /// had to be clamped this tick.
    pub fn update(&mut self, raw: &SkeletonSnapshot, dt: f64) -> (&FilteredSkeleton, bool) {
        let limit = self.max_step(dt);
        let mut clamped = false;

        for (id, joint) in raw.iter() {
            if !joint.position.iter().all(|c| c.is_finite()) {
                trace!(?id, "ignoring non-finite joint position");
                continue;
            }

            // First sighting seeds the joint instead of crawling in from the origin
            if !self.skeleton.is_seen(id) {
                self.skeleton.store(id, *joint);
                continue;
            }

            let stored = self.skeleton.position(id);
            let delta = joint.position - stored;
            let distance = delta.norm();

            if distance > limit {
                let step = delta
                    .try_normalize(EPSILON)
                    .map(|dir| dir * limit)
                    .unwrap_or_else(Vector3::zeros);
                self.skeleton
                    .store(id, Joint::new(stored + step, joint.confidence));
                clamped = true;
                trace!(?id, distance, limit, "max joint velocity exceeded, interpolating");
            } else {
                self.skeleton.store(id, *joint);
            }
        }

        (&self.skeleton, clamped)
    }

    pub fn skeleton(&self) -> &FilteredSkeleton {
        &self.skeleton
    }

    pub fn reset(&mut self) {
        self.skeleton = FilteredSkeleton::default();
    }
}

pub struct PoseExtractor {
    clip_small_angles: bool,
    small_angle_threshold: f64,
    epsilon: f64,
    last_valid: ControlSignal,
    degenerate_frames: u64,
}

impl PoseExtractor {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            clip_small_angles: config.clip_small_angles,
            small_angle_threshold: config.small_angle_threshold,
            epsilon: config.degenerate_epsilon,
            last_valid: ControlSignal::default(),
            degenerate_frames: 0,
        }
    }

    pub fn extract(&mut self, skeleton: &FilteredSkeleton) -> ControlSignal {
        let mut signal = self.last_valid;
        let mut degenerate = false;

        for side in Side::BOTH {
            match self.extract_side(skeleton, side) {
                Some((angle, extension)) => signal.set_side(side, angle, extension),
                None => degenerate = true,
            }
        }

        if degenerate {
            self.degenerate_frames += 1;
            debug!("degenerate arm geometry, holding previous value");
        }

        self.last_valid = signal;
        signal
    }

    pub fn degenerate_frames(&self) -> u64 {
        self.degenerate_frames
    }

    pub fn reset(&mut self) {
        self.last_valid = ControlSignal::default();
    }

    fn extract_side(&self, sk: &FilteredSkeleton, side: Side) -> Option<(f64, f64)> {
        let (collar, shoulder, elbow, hand) = match side {
            Side::Left => (
                JointId::LeftCollar,
                JointId::LeftShoulder,
                JointId::LeftElbow,
                JointId::LeftHand,
            ),
            Side::Right => (
                JointId::RightCollar,
                JointId::RightShoulder,
                JointId::RightElbow,
                JointId::RightHand,
            ),
        };

        let collar_pos = sk.position(collar);
        let shoulder_pos = sk.position(shoulder);
        let elbow_pos = sk.position(elbow);

        // Plane of the chest; left side mirrors operand order so both normals agree
        let collar_torso = sk.position(JointId::Torso) - collar_pos;
        let collar_shoulder = shoulder_pos - collar_pos;
        let body_normal = match side {
            Side::Right => collar_torso.cross(&collar_shoulder),
            Side::Left => collar_shoulder.cross(&collar_torso),
        };

        let shoulder_axis =
            sk.position(JointId::RightShoulder) - sk.position(JointId::LeftShoulder);

        let tip = preferred_tip(&sk[hand], &sk[elbow]);
        let arm = tip - shoulder_pos;
        let max_reach = (tip - elbow_pos).norm() + (elbow_pos - shoulder_pos).norm();

        if body_normal.norm() < self.epsilon
            || shoulder_axis.norm() < self.epsilon
            || arm.norm() < self.epsilon
            || max_reach < self.epsilon
        {
            return None;
        }

        let raw_angle = match side {
            Side::Right => -signed_angle(&arm, &shoulder_axis, &body_normal),
            Side::Left => signed_angle(&arm, &-shoulder_axis, &body_normal),
        };
        let angle = self.clip_small_angle(raw_angle).clamp(-90.0, 90.0);

        let extension = project_on_plane(&arm, &body_normal).norm() / max_reach;

        Some((angle, extension))
    }

    /// Shift the angle toward zero by the dead-zone width, snapping small angles to 0.
    pub fn clip_small_angle(&self, angle: f64) -> f64 {
        if !self.clip_small_angles {
            return angle;
        }

        let threshold = self.small_angle_threshold;
        if angle > -threshold && angle < threshold {
            0.0
        } else if angle < 0.0 {
            angle + threshold
        } else {
            angle - threshold
        }
    }
}

/// Hand when it is tracked at least as well as the elbow, otherwise the elbow.
fn preferred_tip(hand: &Joint, elbow: &Joint) -> Vector3<f64> {
    if hand.confidence >= elbow.confidence {
        hand.position
    } else {
        elbow.position
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackingStats {
    pub ticks: u64,
    pub clamp_events: u64,
    pub degenerate_frames: u64,
    pub tracking_confidence: f64,
}

pub struct SensorPipeline {
    filter: JointFilter,
    extractor: PoseExtractor,
    smoother: SignalSmoother,
    log: SignalLog,
    stats: TrackingStats,
}

impl SensorPipeline {
    pub fn new(tracker: &TrackerConfig, smoother: &SmootherConfig, log: SignalLog) -> Self {
        Self {
            filter: JointFilter::from_config(tracker),
            extractor: PoseExtractor::new(tracker),
            smoother: SignalSmoother::from_config(smoother),
            log,
            stats: TrackingStats::default(),
        }
    }

    pub fn process(&mut self, snapshot: &SkeletonSnapshot, dt: f64) -> ControlSignal {
        if let Some(hand) = snapshot.get(JointId::RightHand) {
            self.log.log("rElev", hand.position.y);
            self.log.log("rHorizX", hand.position.x);
            self.log.log("rHorizZ", hand.position.z);
        }

        let (skeleton, clamped) = self.filter.update(snapshot, dt);
        let sample = self.extractor.extract(skeleton);

        self.stats.ticks += 1;
        if clamped {
            self.stats.clamp_events += 1;
        }
        self.stats.degenerate_frames = self.extractor.degenerate_frames();

        let reported: Vec<f64> = snapshot.iter().map(|(_, j)| j.confidence).collect();
        self.stats.tracking_confidence = if reported.is_empty() {
            0.0
        } else {
            reported.iter().sum::<f64>() / reported.len() as f64
        };

        self.log.log("rAngle", sample.right_arm_angle);
        self.log.log("lAngle", sample.left_arm_angle);
        self.log.log("raLogRaw", sample.right_arm_angle);

        self.smoother.push(sample);
        let average = self.smoother.average();
        self.log.log("raAvLog", average.right_arm_angle);

        average
    }

    /// Poll the tracking session. Returns `None` while no user is tracked.
    pub fn update<S: TrackingSession + ?Sized>(
        &mut self,
        session: &S,
        dt: f64,
    ) -> Option<ControlSignal> {
        if !session.is_user_present() {
            return None;
        }
        let snapshot = session.current_skeleton()?;
        Some(self.process(snapshot, dt))
    }

    pub fn stats(&self) -> &TrackingStats {
        &self.stats
    }

    pub fn filtered(&self) -> &FilteredSkeleton {
        self.filter.skeleton()
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.extractor.reset();
        self.smoother.clear();
    }
}
