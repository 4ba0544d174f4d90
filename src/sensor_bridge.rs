// src/sensor_bridge.rs - Scripted stand-in for the depth sensor session
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::skeleton::{JointId, SkeletonSnapshot};
use crate::tracking::TrackingSession;

const SHOULDER_HEIGHT: f64 = 140.0;
const STANDING_DEPTH: f64 = 200.0;
const HALF_SHOULDER_WIDTH: f64 = 20.0;
const UPPER_ARM: f64 = 30.0;
const FOREARM: f64 = 30.0;

/// Skeleton of a user facing the sensor, in centimeters, with each arm held
/// straight at the given elevation (degrees above the shoulder line).
pub fn arm_pose(right_angle: f64, left_angle: f64) -> SkeletonSnapshot {
    let mut snapshot = SkeletonSnapshot::new()
        .with_joint(JointId::Head, Vector3::new(0.0, 165.0, STANDING_DEPTH), 1.0)
        .with_joint(JointId::Neck, Vector3::new(0.0, 150.0, STANDING_DEPTH), 1.0)
        .with_joint(JointId::Torso, Vector3::new(0.0, 100.0, STANDING_DEPTH), 1.0)
        .with_joint(JointId::Waist, Vector3::new(0.0, 90.0, STANDING_DEPTH), 1.0)
        .with_joint(JointId::LeftCollar, Vector3::new(0.0, SHOULDER_HEIGHT, STANDING_DEPTH), 1.0)
        .with_joint(JointId::RightCollar, Vector3::new(0.0, SHOULDER_HEIGHT, STANDING_DEPTH), 1.0);

    for (sign, angle, shoulder, elbow, hand) in [
        (1.0, right_angle, JointId::RightShoulder, JointId::RightElbow, JointId::RightHand),
        (-1.0, left_angle, JointId::LeftShoulder, JointId::LeftElbow, JointId::LeftHand),
    ] {
        let shoulder_pos = Vector3::new(sign * HALF_SHOULDER_WIDTH, SHOULDER_HEIGHT, STANDING_DEPTH);
        let direction = Vector3::new(sign * angle.to_radians().cos(), angle.to_radians().sin(), 0.0);
        let elbow_pos = shoulder_pos + direction * UPPER_ARM;
        let hand_pos = elbow_pos + direction * FOREARM;

        snapshot = snapshot
            .with_joint(shoulder, shoulder_pos, 1.0)
            .with_joint(elbow, elbow_pos, 0.9)
            .with_joint(hand, hand_pos, 0.9);
    }

    snapshot
}

/// Timeline for a scripted user, in seconds from session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionScript {
    pub user_id: u32,
    pub arrive_at: f64,
    /// Arms rest at the shoulder line until flapping starts
    pub flap_start: f64,
    pub flap_period: f64,
    /// Peak arm elevation in degrees
    pub flap_amplitude: f64,
    pub leave_at: Option<f64>,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            user_id: 1,
            arrive_at: 1.5,
            flap_start: 3.0,
            flap_period: 0.6,
            flap_amplitude: 85.0,
            leave_at: None,
        }
    }
}

/// A [`TrackingSession`] that plays back a synthetic user following a script.
pub struct ScriptedSession {
    script: SessionScript,
    time: f64,
    snapshot: SkeletonSnapshot,
}

impl ScriptedSession {
    pub fn new(script: SessionScript) -> Self {
        let mut session = Self {
            script,
            time: 0.0,
            snapshot: SkeletonSnapshot::new(),
        };
        session.refresh();
        session
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn script(&self) -> &SessionScript {
        &self.script
    }

    pub fn advance(&mut self, dt: f64) {
        self.time += dt.max(0.0);
        self.refresh();
    }

    /// Arm elevation the script calls for right now.
    pub fn arm_angle(&self) -> f64 {
        let since_flap = self.time - self.script.flap_start;
        if since_flap < 0.0 || self.script.flap_period <= 0.0 {
            return 0.0;
        }
        self.script.flap_amplitude * (TAU * since_flap / self.script.flap_period).sin()
    }

    fn refresh(&mut self) {
        if self.is_user_present() {
            let angle = self.arm_angle();
            self.snapshot = arm_pose(angle, angle);
        }
    }
}

impl TrackingSession for ScriptedSession {
    fn is_user_present(&self) -> bool {
        self.time >= self.script.arrive_at
            && self.script.leave_at.map_or(true, |leave| self.time < leave)
    }

    fn user_id(&self) -> Option<u32> {
        self.is_user_present().then_some(self.script.user_id)
    }

    fn current_skeleton(&self) -> Option<&SkeletonSnapshot> {
        self.is_user_present().then_some(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_pose_segments() {
        let pose = arm_pose(90.0, 0.0);
        let hand = pose.get(JointId::RightHand).unwrap().position;
        assert!((hand.x - 20.0).abs() < 1e-9);
        assert!((hand.y - 200.0).abs() < 1e-9);

        let left = pose.get(JointId::LeftHand).unwrap().position;
        assert_eq!(left, Vector3::new(-80.0, 140.0, 200.0));
    }

    #[test]
    fn test_presence_window() {
        let mut session = ScriptedSession::new(SessionScript {
            arrive_at: 1.0,
            leave_at: Some(2.0),
            ..SessionScript::default()
        });
        assert!(!session.is_user_present());
        assert!(session.current_skeleton().is_none());

        session.advance(1.0);
        assert_eq!(session.user_id(), Some(1));
        assert!(session.current_skeleton().is_some());

        session.advance(1.0);
        assert!(!session.is_user_present());
    }

    #[test]
    fn test_flap_follows_period() {
        let mut session = ScriptedSession::new(SessionScript {
            arrive_at: 0.0,
            flap_start: 1.0,
            flap_period: 1.0,
            flap_amplitude: 60.0,
            ..SessionScript::default()
        });
        assert_eq!(session.arm_angle(), 0.0);
        session.advance(1.25);
        assert!((session.arm_angle() - 60.0).abs() < 1e-9);
        session.advance(0.5);
        assert!((session.arm_angle() + 60.0).abs() < 1e-9);
    }
}
