// src/flight.rs - Wing force synthesis for the player bird
//
// Lift is generated at two fixed points where the wings would be when fully
// extended. How much depends on how far that wing is spread and on the airflow
// the flock's motion produces. Pulling a wing down quickly adds a burst of force
// at the same point. The bird is only allowed to move up/down/left/right relative
// to the flock, so its depth from the camera plane is pinned every tick.
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::math::wrap_degrees;
use crate::tracking::{ControlSignal, Side};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Force per degree of downstroke
    pub flap_thrust_scale: f64,
    pub lift_scale: f64,
    pub vertical_drag_scale: f64,
    /// Coupling of the vertical drag term into lift. Tuned to 0 in production.
    pub vertical_drag_coupling: f64,
    pub fall_drag_factor: f64,
    pub rise_drag_factor: f64,
    /// Proportional self-righting gain per axis (pitch, yaw, roll)
    pub torque_damping: Vector3<f64>,
    pub left_lift_point: Vector3<f64>,
    pub right_lift_point: Vector3<f64>,
    pub fixed_depth: f64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            flap_thrust_scale: 0.5,
            lift_scale: 0.4,
            vertical_drag_scale: 1.0,
            vertical_drag_coupling: 0.0,
            fall_drag_factor: -2.0,
            rise_drag_factor: -0.5,
            torque_damping: Vector3::new(0.02, 0.02, 0.02),
            left_lift_point: Vector3::new(-1.5, 0.0, 0.0),
            right_lift_point: Vector3::new(1.5, 0.0, 0.0),
            fixed_depth: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyState {
    pub position: Vector3<f64>,
    /// Position relative to the flock (parent) frame
    pub local_position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    /// Engine Euler angles in degrees, each in [0, 360)
    pub euler_degrees: Vector3<f64>,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            local_position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            euler_degrees: Vector3::zeros(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

pub trait RigidBody {
    fn state(&self) -> RigidBodyState;
    fn add_force_at_position(&mut self, force: Vector3<f64>, position: Vector3<f64>);
    /// Torque expressed in the body's own frame
    fn add_relative_torque(&mut self, torque: Vector3<f64>);
    fn constrain_local_depth(&mut self, depth: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WingState {
    /// 0 = folded against the body, 1 = fully horizontal
    pub extension: f64,
    pub force: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlightTick {
    pub left: WingState,
    pub right: WingState,
    pub torque: Vector3<f64>,
    pub applied: bool,
}

impl FlightTick {
    pub fn wing(&self, side: Side) -> WingState {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

pub struct FlightModel {
    config: FlightConfig,
    forces_enabled: bool,
    z_constraint: bool,
    previous_left_angle: f64,
    previous_right_angle: f64,
    last: FlightTick,
}

impl FlightModel {
    pub fn new(config: FlightConfig) -> Self {
        Self {
            config,
            forces_enabled: false,
            z_constraint: true,
            previous_left_angle: 0.0,
            previous_right_angle: 0.0,
            last: FlightTick::default(),
        }
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn set_forces_enabled(&mut self, enabled: bool) {
        self.forces_enabled = enabled;
    }

    pub fn forces_enabled(&self) -> bool {
        self.forces_enabled
    }

    pub fn set_z_constraint(&mut self, enabled: bool) {
        self.z_constraint = enabled;
    }

    pub fn z_constraint(&self) -> bool {
        self.z_constraint
    }

    pub fn wing(&self, side: Side) -> WingState {
        self.last.wing(side)
    }

    pub fn wing_force(&self, side: Side) -> f64 {
        self.last.wing(side).force
    }

    pub fn last_tick(&self) -> &FlightTick {
        &self.last
    }

    /// Advance one fixed physics tick.
    ///
    /// `reference_velocity` is the flock's world velocity; `None` is treated as
    /// still air. A non-positive `dt` produces no force at all, though the depth
    /// constraint still holds.
    pub fn step<B: RigidBody + ?Sized>(
        &mut self,
        dt: f64,
        signal: &ControlSignal,
        body: &mut B,
        reference_velocity: Option<Vector3<f64>>,
    ) -> FlightTick {
        if self.z_constraint {
            body.constrain_local_depth(self.config.fixed_depth);
        }

        if dt <= 0.0 {
            self.last = FlightTick::default();
            return self.last;
        }

        let state = body.state();

        // Symmetric torque response needs (-180, 180] rather than [0, 360)
        let rotation = state.euler_degrees.map(wrap_degrees);

        // Airflow from the flock's motion, independent of the bird's own physics
        let local_velocity = state.rotation.inverse_transform_vector(
            &reference_velocity.unwrap_or_else(Vector3::zeros),
        );

        let left_extension = wing_extension(signal.left_arm_angle);
        let right_extension = wing_extension(signal.right_arm_angle);

        let left_force = left_extension * self.lift_precursor(&local_velocity)
            + self.flap_thrust(self.previous_left_angle, signal.left_arm_angle);
        let right_force = right_extension * self.lift_precursor(&local_velocity)
            + self.flap_thrust(self.previous_right_angle, signal.right_arm_angle);

        // Nudge back toward level flight
        let damping = &self.config.torque_damping;
        let torque = Vector3::new(
            -rotation.x * damping.x,
            -rotation.y * damping.y,
            -rotation.z * damping.z,
        );

        if self.forces_enabled {
            body.add_relative_torque(torque);
            self.apply_wing_force(body, &state, left_force, &self.config.left_lift_point);
            self.apply_wing_force(body, &state, right_force, &self.config.right_lift_point);
        }

        self.previous_left_angle = signal.left_arm_angle;
        self.previous_right_angle = signal.right_arm_angle;

        self.last = FlightTick {
            left: WingState {
                extension: left_extension,
                force: left_force,
            },
            right: WingState {
                extension: right_extension,
                force: right_force,
            },
            torque,
            applied: self.forces_enabled,
        };
        trace!(left = left_force, right = right_force, "wing forces");
        self.last
    }

    pub fn reset(&mut self) {
        self.previous_left_angle = 0.0;
        self.previous_right_angle = 0.0;
        self.last = FlightTick::default();
    }

    fn lift_precursor(&self, local_velocity: &Vector3<f64>) -> f64 {
        // Falling air is countered harder than rising air
        let vertical = local_velocity.y;
        let drag = if vertical < 0.0 {
            vertical * self.config.fall_drag_factor
        } else {
            vertical * self.config.rise_drag_factor
        };

        // Only forward airflow makes lift
        let forward = local_velocity.z.max(0.0);

        drag * self.config.vertical_drag_scale * self.config.vertical_drag_coupling
            + forward * self.config.lift_scale
    }

    fn flap_thrust(&self, previous_angle: f64, angle: f64) -> f64 {
        let downstroke = previous_angle - angle;
        if downstroke > 0.0 {
            self.config.flap_thrust_scale * downstroke
        } else {
            0.0
        }
    }

    fn apply_wing_force<B: RigidBody + ?Sized>(
        &self,
        body: &mut B,
        state: &RigidBodyState,
        force: f64,
        lift_point: &Vector3<f64>,
    ) {
        let world_force = state.rotation * Vector3::new(0.0, force, 0.0);
        let world_point = state.position + state.rotation * lift_point;
        body.add_force_at_position(world_force, world_point);
    }
}

/// Spread of a wing for an arm angle in degrees: fully out at or below the
/// shoulder line, folding as the arm rises toward vertical.
pub fn wing_extension(arm_angle: f64) -> f64 {
    arm_angle.to_radians().cos().clamp(0.0, 1.0)
}
