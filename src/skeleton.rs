// src/skeleton.rs
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Tracked body landmarks. Discriminants are dense so a skeleton is a plain array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointId {
    Head,
    Neck,
    Torso,
    Waist,
    LeftCollar,
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    LeftHand,
    LeftFingertip,
    RightCollar,
    RightShoulder,
    RightElbow,
    RightWrist,
    RightHand,
    RightFingertip,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    LeftFoot,
    RightHip,
    RightKnee,
    RightAnkle,
    RightFoot,
}

impl JointId {
    pub const COUNT: usize = 24;

    pub const ALL: [JointId; JointId::COUNT] = [
        JointId::Head,
        JointId::Neck,
        JointId::Torso,
        JointId::Waist,
        JointId::LeftCollar,
        JointId::LeftShoulder,
        JointId::LeftElbow,
        JointId::LeftWrist,
        JointId::LeftHand,
        JointId::LeftFingertip,
        JointId::RightCollar,
        JointId::RightShoulder,
        JointId::RightElbow,
        JointId::RightWrist,
        JointId::RightHand,
        JointId::RightFingertip,
        JointId::LeftHip,
        JointId::LeftKnee,
        JointId::LeftAnkle,
        JointId::LeftFoot,
        JointId::RightHip,
        JointId::RightKnee,
        JointId::RightAnkle,
        JointId::RightFoot,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joint {
    pub position: Vector3<f64>,
    /// Tracking confidence in [0, 1]
    pub confidence: f64,
}

impl Joint {
    pub fn new(position: Vector3<f64>, confidence: f64) -> Self {
        Self { position, confidence }
    }
}

/// One raw sensor frame. Joints the tracker did not report are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonSnapshot {
    joints: [Option<Joint>; JointId::COUNT],
}

impl SkeletonSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_joint(mut self, id: JointId, position: Vector3<f64>, confidence: f64) -> Self {
        self.set(id, Joint::new(position, confidence));
        self
    }

    pub fn set(&mut self, id: JointId, joint: Joint) {
        self.joints[id.index()] = Some(joint);
    }

    pub fn get(&self, id: JointId) -> Option<&Joint> {
        self.joints[id.index()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &Joint)> + '_ {
        JointId::ALL
            .iter()
            .filter_map(move |&id| self.get(id).map(|j| (id, j)))
    }
}

/// Error-corrected skeleton owned by the joint filter.
///
/// Every joint always exists; a joint the sensor has never reported sits at the
/// origin with zero confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredSkeleton {
    joints: [Joint; JointId::COUNT],
    seen: [bool; JointId::COUNT],
}

impl Default for FilteredSkeleton {
    fn default() -> Self {
        Self {
            joints: [Joint::default(); JointId::COUNT],
            seen: [false; JointId::COUNT],
        }
    }
}

impl FilteredSkeleton {
    pub fn is_seen(&self, id: JointId) -> bool {
        self.seen[id.index()]
    }

    pub fn position(&self, id: JointId) -> Vector3<f64> {
        self.joints[id.index()].position
    }

    pub(crate) fn store(&mut self, id: JointId, joint: Joint) {
        self.joints[id.index()] = joint;
        self.seen[id.index()] = true;
    }
}

impl Index<JointId> for FilteredSkeleton {
    type Output = Joint;

    fn index(&self, id: JointId) -> &Joint {
        &self.joints[id.index()]
    }
}
