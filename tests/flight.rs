use nalgebra::{UnitQuaternion, Vector3};

use wingflap::body::SimpleBody;
use wingflap::data::SignalLog;
use wingflap::flight::{FlightConfig, FlightModel, RigidBody};
use wingflap::flock::FlockVelocity;
use wingflap::game::{GameConfig, GameFlow, GameState};
use wingflap::math::wrap_degrees;
use wingflap::sensor_bridge::{ScriptedSession, SessionScript};
use wingflap::smoothing::{SignalHandoff, SmootherConfig};
use wingflap::tracking::{ControlSignal, SensorPipeline, TrackerConfig, TrackingSession};

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

fn armed_model() -> FlightModel {
    let mut model = FlightModel::new(FlightConfig::default());
    model.set_forces_enabled(true);
    model
}

#[test]
fn forward_airflow_lifts_spread_wings() {
    let mut model = armed_model();
    let mut body = SimpleBody::default();
    let neutral = ControlSignal::new(0.0, 1.0, 0.0, 1.0);

    let tick = model.step(0.02, &neutral, &mut body, Some(Vector3::new(0.0, 0.0, 5.0)));
    assert!(approx_eq(tick.left.force, 2.0, 1e-12));
    assert!(approx_eq(tick.right.force, 2.0, 1e-12));

    body.integrate(0.02);
    assert!(body.linear_velocity().y > 0.0);
    // Equal lift on both wings does not roll the bird
    assert!(approx_eq(body.state().angular_velocity.z, 0.0, 1e-12));
}

#[test]
fn backward_airflow_gives_no_lift() {
    let mut model = armed_model();
    let mut body = SimpleBody::default();
    let neutral = ControlSignal::new(0.0, 1.0, 0.0, 1.0);

    let tick = model.step(0.02, &neutral, &mut body, Some(Vector3::new(0.0, 0.0, -5.0)));
    assert_eq!(tick.left.force, 0.0);
    assert_eq!(tick.right.force, 0.0);
}

#[test]
fn disabled_forces_leave_body_untouched() {
    let mut model = FlightModel::new(FlightConfig::default());
    let mut body = SimpleBody::default();
    let neutral = ControlSignal::new(0.0, 1.0, 0.0, 1.0);

    let tick = model.step(0.02, &neutral, &mut body, Some(Vector3::new(0.0, 0.0, 5.0)));
    assert!(!tick.applied);
    assert!(approx_eq(tick.left.force, 2.0, 1e-12));

    body.integrate(0.02);
    assert_eq!(body.linear_velocity(), Vector3::zeros());
}

#[test]
fn self_righting_reduces_roll() {
    let mut model = armed_model();
    let mut body = SimpleBody::default();
    let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 20f64.to_radians());
    body.set_pose(Vector3::zeros(), roll);

    let neutral = ControlSignal::new(0.0, 1.0, 0.0, 1.0);
    for _ in 0..500 {
        model.step(0.02, &neutral, &mut body, None);
        body.integrate(0.02);
    }

    let final_roll = wrap_degrees(body.state().euler_degrees.z);
    assert!(final_roll.abs() < 20.0, "roll {}", final_roll);
    assert!(body.state().local_position.z.abs() < 1e-12);
}

#[test]
fn scripted_user_takes_off_and_flies() {
    let dt = 0.02;
    let mut session = ScriptedSession::new(SessionScript::default());
    let mut pipeline = SensorPipeline::new(
        &TrackerConfig::default(),
        &SmootherConfig::default(),
        SignalLog::disabled(),
    );
    let handoff = SignalHandoff::new();
    let mut model = FlightModel::new(FlightConfig::default());
    let mut flow = GameFlow::new(GameConfig::default());
    let mut body = SimpleBody::default();
    let mut flock = FlockVelocity::new();
    let mut flock_position = Vector3::zeros();

    let mut seen = Vec::new();
    for tick in 0..400 {
        session.advance(dt);
        if let Some(signal) = pipeline.update(&session, dt) {
            handoff.publish(signal);
        }

        flock_position.z += flow.path_speed() * dt;
        let flock_velocity = flock.update(flock_position, tick as f64 * dt, dt);
        body.set_parent(flock_position, flock_velocity);
        body.use_gravity = flow.physics_enabled();

        model.step(dt, &handoff.latest(), &mut body, Some(flock_velocity));
        body.integrate(dt);

        let state = flow.update(dt, session.is_user_present(), &mut model);
        if seen.last() != Some(&state) {
            seen.push(state);
        }

        // The bird only ever moves in the plane of the flock
        assert!(body.state().local_position.z.abs() < 1e-9);
    }

    assert_eq!(
        seen,
        vec![
            GameState::FadeIn,
            GameState::Idle,
            GameState::Wait,
            GameState::Liftoff,
            GameState::Flying,
        ]
    );
    assert!(model.forces_enabled());
    assert_eq!(flow.path_speed(), 10.0);
    assert_eq!(pipeline.stats().clamp_events, 0);
}
