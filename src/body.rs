// src/body.rs - Minimal rigid body for driving the flight model without an engine
use nalgebra::{UnitQuaternion, Vector3};

use crate::flight::{RigidBody, RigidBodyState};
use crate::math::to_euler_zxy_degrees;

pub const GRAVITY: Vector3<f64> = Vector3::new(0.0, -9.81, 0.0);

/// Explicit-Euler body with isotropic inertia. Forces and torques accumulate
/// until the next [`SimpleBody::integrate`].
#[derive(Debug, Clone)]
pub struct SimpleBody {
    pub mass: f64,
    /// Scalar moment of inertia
    pub inertia: f64,
    pub linear_drag: f64,
    pub angular_drag: f64,
    pub use_gravity: bool,
    position: Vector3<f64>,
    rotation: UnitQuaternion<f64>,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    parent_position: Vector3<f64>,
    parent_velocity: Vector3<f64>,
    force: Vector3<f64>,
    torque: Vector3<f64>,
    depth_lock: Option<f64>,
}

impl Default for SimpleBody {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SimpleBody {
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            inertia: mass,
            linear_drag: 0.5,
            angular_drag: 3.0,
            use_gravity: false,
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            parent_position: Vector3::zeros(),
            parent_velocity: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            depth_lock: None,
        }
    }

    /// Move the frame the body's local position is measured in (the flock).
    pub fn set_parent(&mut self, position: Vector3<f64>, velocity: Vector3<f64>) {
        self.parent_position = position;
        self.parent_velocity = velocity;
    }

    pub fn set_pose(&mut self, position: Vector3<f64>, rotation: UnitQuaternion<f64>) {
        self.position = position;
        self.rotation = rotation;
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.linear_velocity
    }

    /// Put the body back at the parent origin, at rest.
    pub fn reset(&mut self) {
        self.position = self.parent_position;
        self.rotation = UnitQuaternion::identity();
        self.linear_velocity = self.parent_velocity;
        self.angular_velocity = Vector3::zeros();
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
        self.depth_lock = None;
    }

    pub fn integrate(&mut self, dt: f64) {
        if dt <= 0.0 || self.mass <= 0.0 {
            return;
        }

        let mut acceleration = self.force / self.mass;
        if self.use_gravity {
            acceleration += GRAVITY;
        }
        self.linear_velocity += acceleration * dt;
        self.linear_velocity /= 1.0 + self.linear_drag * dt;

        let inertia = self.inertia.max(f64::EPSILON);
        self.angular_velocity += self.torque / inertia * dt;
        self.angular_velocity /= 1.0 + self.angular_drag * dt;

        self.position += self.linear_velocity * dt;
        self.rotation = UnitQuaternion::from_scaled_axis(self.angular_velocity * dt) * self.rotation;

        if let Some(depth) = self.depth_lock.take() {
            self.position.z = self.parent_position.z + depth;
            self.linear_velocity.z = self.parent_velocity.z;
        }

        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }
}

impl RigidBody for SimpleBody {
    fn state(&self) -> RigidBodyState {
        RigidBodyState {
            position: self.position,
            local_position: self.position - self.parent_position,
            rotation: self.rotation,
            euler_degrees: to_euler_zxy_degrees(&self.rotation),
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
        }
    }

    fn add_force_at_position(&mut self, force: Vector3<f64>, position: Vector3<f64>) {
        self.force += force;
        self.torque += (position - self.position).cross(&force);
    }

    fn add_relative_torque(&mut self, torque: Vector3<f64>) {
        self.torque += self.rotation * torque;
    }

    fn constrain_local_depth(&mut self, depth: f64) {
        self.depth_lock = Some(depth);
    }
}
