// src/game.rs - Session flow around the flight core
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::flight::FlightModel;
use crate::tracking::Side;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Both wings must exceed this force to count as a takeoff flap
    pub force_start_threshold: f64,
    /// Consecutive updates above the threshold before liftoff
    pub flap_debounce_ticks: u32,
    /// Path speed gained per second during liftoff
    pub liftoff_rate: f64,
    pub flight_speed: f64,
    /// Seconds a user may vanish mid-flight before the session ends
    pub user_lost_timeout: f64,
    pub fade_duration: f64,
    pub game_over_delay: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            force_start_threshold: 4.0,
            flap_debounce_ticks: 6,
            liftoff_rate: 10.0,
            flight_speed: 10.0,
            user_lost_timeout: 3.0,
            fade_duration: 1.0,
            game_over_delay: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    FadeIn,
    Idle,
    Wait,
    Liftoff,
    Flying,
    /// User vanished mid-flight; hold on in case they come back
    UserLost,
    GameOver,
    FadeOut,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::FadeIn => "fade in",
            GameState::Idle => "idle",
            GameState::Wait => "wait",
            GameState::Liftoff => "liftoff",
            GameState::Flying => "flying",
            GameState::UserLost => "user lost",
            GameState::GameOver => "game over",
            GameState::FadeOut => "fade out",
        };
        write!(f, "{}", name)
    }
}

/// Drives the flight model's command hooks from user presence and wing forces.
pub struct GameFlow {
    config: GameConfig,
    state: GameState,
    path_speed: f64,
    thrust_ticks: u32,
    /// Seconds spent in the current timed state
    timer: f64,
}

impl GameFlow {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            state: GameState::FadeIn,
            path_speed: 0.0,
            thrust_ticks: 0,
            timer: 0.0,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn path_speed(&self) -> f64 {
        self.path_speed
    }

    /// Whether the bird should currently be under gravity and wing forces.
    pub fn physics_enabled(&self) -> bool {
        matches!(
            self.state,
            GameState::Liftoff | GameState::Flying | GameState::UserLost
        )
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn update(&mut self, dt: f64, user_present: bool, model: &mut FlightModel) -> GameState {
        let dt = dt.max(0.0);

        match self.state {
            GameState::FadeIn => {
                self.timer += dt;
                if self.timer >= self.config.fade_duration {
                    self.transition(GameState::Idle);
                }
            }
            GameState::Idle => {
                if user_present {
                    model.reset();
                    self.transition(GameState::Wait);
                }
            }
            GameState::Wait => {
                if !user_present {
                    self.thrust_ticks = 0;
                    self.transition(GameState::Idle);
                } else if self.flapping(model) {
                    self.thrust_ticks += 1;
                    if self.thrust_ticks >= self.config.flap_debounce_ticks {
                        self.thrust_ticks = 0;
                        model.set_forces_enabled(true);
                        self.transition(GameState::Liftoff);
                    }
                } else {
                    self.thrust_ticks = 0;
                }
            }
            GameState::Liftoff => {
                self.path_speed += self.config.liftoff_rate * dt;
                if self.path_speed >= self.config.flight_speed {
                    self.path_speed = self.config.flight_speed;
                    self.transition(GameState::Flying);
                }
            }
            GameState::Flying => {
                if !user_present {
                    self.transition(GameState::UserLost);
                }
            }
            GameState::UserLost => {
                if user_present {
                    self.transition(GameState::Flying);
                } else {
                    self.timer += dt;
                    if self.timer >= self.config.user_lost_timeout {
                        model.set_forces_enabled(false);
                        self.transition(GameState::FadeOut);
                    }
                }
            }
            GameState::GameOver => {
                self.timer += dt;
                if self.timer >= self.config.game_over_delay {
                    self.transition(GameState::FadeOut);
                }
            }
            GameState::FadeOut => {
                self.timer += dt;
                if self.timer >= self.config.fade_duration {
                    self.restart(model);
                }
            }
        }

        self.state
    }

    /// The bird hit something. Ignored outside of flight.
    pub fn on_collision(&mut self, model: &mut FlightModel) {
        if !self.physics_enabled() {
            debug!("collision in state {} ignored", self.state);
            return;
        }

        model.set_forces_enabled(false);
        model.set_z_constraint(false);
        self.path_speed = 0.0;
        self.transition(GameState::GameOver);
    }

    fn flapping(&self, model: &FlightModel) -> bool {
        let threshold = self.config.force_start_threshold;
        Side::BOTH
            .iter()
            .all(|side| model.wing_force(*side) > threshold)
    }

    fn restart(&mut self, model: &mut FlightModel) {
        self.path_speed = 0.0;
        self.thrust_ticks = 0;
        model.set_forces_enabled(false);
        model.set_z_constraint(true);
        model.reset();
        self.transition(GameState::FadeIn);
    }

    fn transition(&mut self, next: GameState) {
        info!("game state {} -> {}", self.state, next);
        self.state = next;
        self.timer = 0.0;
    }
}

/// Playback position (0..1) of the wing animation for an arm angle in degrees.
/// Arms straight up give 0, arms straight down give 1.
pub fn wing_clip_time(arm_angle: f64) -> f64 {
    (90.0 - arm_angle) / 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::{FlightConfig, RigidBody, RigidBodyState};
    use crate::tracking::ControlSignal;
    use nalgebra::Vector3;

    struct StillBody;

    impl RigidBody for StillBody {
        fn state(&self) -> RigidBodyState {
            RigidBodyState::default()
        }
        fn add_force_at_position(&mut self, _force: Vector3<f64>, _position: Vector3<f64>) {}
        fn add_relative_torque(&mut self, _torque: Vector3<f64>) {}
        fn constrain_local_depth(&mut self, _depth: f64) {}
    }

    fn ready_flow() -> (GameFlow, FlightModel) {
        let mut flow = GameFlow::new(GameConfig::default());
        let mut model = FlightModel::new(FlightConfig::default());
        flow.update(1.0, false, &mut model);
        assert_eq!(flow.state(), GameState::Idle);
        flow.update(0.02, true, &mut model);
        assert_eq!(flow.state(), GameState::Wait);
        (flow, model)
    }

    /// One full downstroke from 60 to -60 degrees: 60 units of thrust per wing.
    fn flap(model: &mut FlightModel) {
        let up = ControlSignal::new(60.0, 1.0, 60.0, 1.0);
        let down = ControlSignal::new(-60.0, 1.0, -60.0, 1.0);
        model.step(0.02, &up, &mut StillBody, None);
        model.step(0.02, &down, &mut StillBody, None);
    }

    fn take_off(flow: &mut GameFlow, model: &mut FlightModel) {
        for _ in 0..6 {
            flap(model);
            flow.update(0.02, true, model);
        }
        assert_eq!(flow.state(), GameState::Liftoff);
    }

    #[test]
    fn test_user_leaving_returns_to_idle() {
        let (mut flow, mut model) = ready_flow();
        flow.update(0.02, false, &mut model);
        assert_eq!(flow.state(), GameState::Idle);
    }

    #[test]
    fn test_flapping_must_be_sustained() {
        let (mut flow, mut model) = ready_flow();
        for _ in 0..5 {
            flap(&mut model);
            flow.update(0.02, true, &mut model);
        }
        assert_eq!(flow.state(), GameState::Wait);
        assert!(!model.forces_enabled());

        // A tick without force restarts the count
        let rest = ControlSignal::new(-60.0, 1.0, -60.0, 1.0);
        model.step(0.02, &rest, &mut StillBody, None);
        flow.update(0.02, true, &mut model);
        for _ in 0..5 {
            flap(&mut model);
            flow.update(0.02, true, &mut model);
        }
        assert_eq!(flow.state(), GameState::Wait);

        flap(&mut model);
        flow.update(0.02, true, &mut model);
        assert_eq!(flow.state(), GameState::Liftoff);
        assert!(model.forces_enabled());
    }

    #[test]
    fn test_liftoff_ramps_to_flight_speed() {
        let (mut flow, mut model) = ready_flow();
        take_off(&mut flow, &mut model);

        flow.update(0.5, true, &mut model);
        assert!((flow.path_speed() - 5.0).abs() < 1e-9);
        assert_eq!(flow.state(), GameState::Liftoff);

        flow.update(0.6, true, &mut model);
        assert_eq!(flow.path_speed(), 10.0);
        assert_eq!(flow.state(), GameState::Flying);
    }

    #[test]
    fn test_user_lost_recovers_or_times_out() {
        let (mut flow, mut model) = ready_flow();
        take_off(&mut flow, &mut model);
        flow.update(2.0, true, &mut model);

        flow.update(0.02, false, &mut model);
        assert_eq!(flow.state(), GameState::UserLost);
        flow.update(1.0, false, &mut model);
        flow.update(0.02, true, &mut model);
        assert_eq!(flow.state(), GameState::Flying);

        flow.update(0.02, false, &mut model);
        flow.update(2.0, false, &mut model);
        assert_eq!(flow.state(), GameState::UserLost);
        flow.update(1.5, false, &mut model);
        assert_eq!(flow.state(), GameState::FadeOut);
        assert!(!model.forces_enabled());
    }

    #[test]
    fn test_collision_ends_flight_and_resets() {
        let (mut flow, mut model) = ready_flow();
        take_off(&mut flow, &mut model);

        flow.on_collision(&mut model);
        assert_eq!(flow.state(), GameState::GameOver);
        assert!(!model.forces_enabled());
        assert!(!model.z_constraint());

        flow.update(3.0, true, &mut model);
        assert_eq!(flow.state(), GameState::FadeOut);
        flow.update(1.0, true, &mut model);
        assert_eq!(flow.state(), GameState::FadeIn);
        assert!(model.z_constraint());
        assert_eq!(flow.path_speed(), 0.0);
    }

    #[test]
    fn test_collision_before_takeoff_ignored() {
        let (mut flow, mut model) = ready_flow();
        flow.on_collision(&mut model);
        assert_eq!(flow.state(), GameState::Wait);
        assert!(model.z_constraint());
    }

    #[test]
    fn test_wing_clip_time() {
        assert_eq!(wing_clip_time(90.0), 0.0);
        assert_eq!(wing_clip_time(0.0), 0.5);
        assert_eq!(wing_clip_time(-90.0), 1.0);
    }
}
