// src/main.rs
use anyhow::Result;
use nalgebra::Vector3;
use tracing::{debug, info};

use wingflap::body::SimpleBody;
use wingflap::config::{display_env, Settings};
use wingflap::data::SignalLog;
use wingflap::display::{DisplayConfig, DisplayProjector};
use wingflap::flight::{FlightModel, RigidBody};
use wingflap::flock::FlockVelocity;
use wingflap::game::{wing_clip_time, GameFlow, GameState};
use wingflap::sensor_bridge::{ScriptedSession, SessionScript};
use wingflap::smoothing::SignalHandoff;
use wingflap::tracking::{SensorPipeline, TrackingSession, PIPELINE_CHANNELS};

/// Fixed physics step, seconds
const DT: f64 = 0.02;
const TICKS: usize = 1000;
/// Drop below the flock, in meters, that counts as hitting the ground
const GROUND_DEPTH: f64 = 30.0;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load_or_default(&path),
        None => Settings::default(),
    };

    println!("=== Display Layout ===");
    let displays = DisplayConfig::load(&settings.display_config_dir, &display_env());
    println!("Source: {:?}", displays.source);
    let projector = DisplayProjector::default();
    for (i, projection) in projector.project_all(&displays.config).iter().enumerate() {
        match projection {
            Some(p) => println!(
                "  [{}] fov {:.2} x {:.2} deg, aspect {:.3}",
                i + 1,
                p.horizontal_fov,
                p.vertical_fov,
                p.aspect
            ),
            None => println!("  [{}] disabled", i + 1),
        }
    }
    println!("======================\n");

    let log = SignalLog::from_config(&settings.logging, &PIPELINE_CHANNELS);
    if let Some(dir) = log.directory() {
        info!("logging signals to {}", dir.display());
    }

    let mut pipeline = SensorPipeline::new(&settings.tracker, &settings.smoother, log);
    let handoff = SignalHandoff::new();
    let mut session = ScriptedSession::new(SessionScript::default());
    let mut model = FlightModel::new(settings.flight.clone());
    let mut flow = GameFlow::new(settings.game.clone());
    let mut body = SimpleBody::default();
    let mut flock = FlockVelocity::new();
    let mut flock_position = Vector3::zeros();

    let mut max_altitude = f64::MIN;
    let mut flight_ticks = 0usize;

    for tick in 0..TICKS {
        let time = tick as f64 * DT;

        // Sensor side
        session.advance(DT);
        if let Some(signal) = pipeline.update(&session, DT) {
            handoff.publish(signal);
        }

        // Physics side
        let signal = handoff.latest();
        flock_position.z += flow.path_speed() * DT;
        let flock_velocity = flock.update(flock_position, time, DT);
        body.set_parent(flock_position, flock_velocity);
        body.use_gravity = flow.physics_enabled();

        let wings = model.step(DT, &signal, &mut body, Some(flock_velocity));
        body.integrate(DT);

        let previous = flow.state();
        let state = flow.update(DT, session.is_user_present(), &mut model);
        if previous == GameState::FadeOut && state == GameState::FadeIn {
            pipeline.reset();
            body.reset();
        }

        let altitude = body.state().local_position.y;
        if flow.physics_enabled() {
            flight_ticks += 1;
            max_altitude = max_altitude.max(altitude);
            if altitude < -GROUND_DEPTH {
                flow.on_collision(&mut model);
            }
        }

        debug!(
            tick,
            left_clip = wing_clip_time(signal.left_arm_angle),
            right_clip = wing_clip_time(signal.right_arm_angle),
            left_force = wings.left.force,
            right_force = wings.right.force,
            altitude,
            "physics tick"
        );
    }

    let stats = pipeline.stats();
    println!("=== Session Summary ===");
    println!("Simulated: {:.1} s", TICKS as f64 * DT);
    println!("Final state: {}", flow.state());
    println!("Sensor frames: {}", stats.ticks);
    println!("Clamp events: {}", stats.clamp_events);
    println!("Degenerate frames: {}", stats.degenerate_frames);
    println!("Ticks under physics: {}", flight_ticks);
    if flight_ticks > 0 {
        println!("Highest altitude: {:.2} m", max_altitude);
    }
    println!("Flock distance: {:.1} m", flock_position.z);

    Ok(())
}
