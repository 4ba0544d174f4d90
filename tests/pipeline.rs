use nalgebra::Vector3;

use wingflap::data::SignalLog;
use wingflap::sensor_bridge::{arm_pose, ScriptedSession, SessionScript};
use wingflap::skeleton::JointId;
use wingflap::smoothing::SmootherConfig;
use wingflap::tracking::{
    JointFilter, PoseExtractor, SensorPipeline, TrackerConfig, TrackingSession, PIPELINE_CHANNELS,
};

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

fn pipeline(log: SignalLog) -> SensorPipeline {
    SensorPipeline::new(&TrackerConfig::default(), &SmootherConfig::default(), log)
}

#[test]
fn stationary_user_settles_without_clamping() {
    let mut pipeline = pipeline(SignalLog::disabled());
    let pose = arm_pose(0.0, 0.0);

    let mut signal = Default::default();
    for _ in 0..100 {
        signal = pipeline.process(&pose, 0.016);
    }

    assert_eq!(pipeline.stats().ticks, 100);
    assert_eq!(pipeline.stats().clamp_events, 0);
    assert_eq!(pipeline.stats().degenerate_frames, 0);
    assert!(approx_eq(signal.right_arm_angle, 0.0, 1e-9));
    assert!(approx_eq(signal.left_arm_extension, 1.0, 1e-9));
    assert_eq!(
        pipeline.filtered().position(JointId::RightHand),
        Vector3::new(80.0, 140.0, 200.0)
    );
}

#[test]
fn raised_right_arm_reads_past_dead_zone() {
    let mut pipeline = pipeline(SignalLog::disabled());
    let pose = arm_pose(45.0, 0.0);

    let mut signal = Default::default();
    for _ in 0..30 {
        signal = pipeline.process(&pose, 0.016);
    }

    assert!(approx_eq(signal.right_arm_angle, 36.0, 1e-6));
    assert!(approx_eq(signal.left_arm_angle, 0.0, 1e-9));
    assert!(approx_eq(signal.right_arm_extension, 1.0, 1e-9));
}

#[test]
fn filtered_joints_never_outrun_max_velocity() {
    let config = TrackerConfig::default();
    let mut filter = JointFilter::from_config(&config);
    let dt = 0.02;
    let max_step = config.max_joint_velocity * config.units_per_meter * dt;

    filter.update(&arm_pose(0.0, 0.0), dt);
    let mut previous = filter.skeleton().clone();

    // Arms snapping between extremes far faster than a person can move
    for i in 0..40 {
        let angle = if i % 2 == 0 { 90.0 } else { -90.0 };
        let (skeleton, _) = filter.update(&arm_pose(angle, -angle), dt);
        for id in JointId::ALL {
            let moved = (skeleton.position(id) - previous.position(id)).norm();
            assert!(moved <= max_step + 1e-9, "{:?} moved {}", id, moved);
        }
        previous = skeleton.clone();
    }
}

#[test]
fn arm_angles_stay_in_range_for_any_pose() {
    let mut extractor = PoseExtractor::new(&TrackerConfig::default());

    for step in 0..72 {
        let angle = -180.0 + step as f64 * 5.0;
        let mut filter = JointFilter::from_config(&TrackerConfig::default());
        let (skeleton, _) = filter.update(&arm_pose(angle, -angle), 0.016);
        let signal = extractor.extract(skeleton);

        for value in [signal.right_arm_angle, signal.left_arm_angle] {
            assert!((-90.0..=90.0).contains(&value), "angle {} from pose {}", value, angle);
        }
        for value in [signal.right_arm_extension, signal.left_arm_extension] {
            assert!((0.0..=1.0 + 1e-9).contains(&value));
        }
    }
}

#[test]
fn scripted_flapping_is_bounded() {
    let mut session = ScriptedSession::new(SessionScript {
        arrive_at: 0.0,
        flap_start: 0.0,
        flap_amplitude: 170.0,
        ..SessionScript::default()
    });
    let mut pipeline = pipeline(SignalLog::disabled());

    for _ in 0..300 {
        session.advance(0.02);
        let signal = pipeline
            .update(&session, 0.02)
            .expect("scripted user is present");
        assert!(signal.right_arm_angle.abs() <= 90.0);
        assert!(signal.left_arm_angle.abs() <= 90.0);
    }
    assert_eq!(session.user_id(), Some(1));
}

#[test]
fn pipeline_writes_signal_channels() {
    let dir = std::env::temp_dir().join(format!("wingflap_{}", uuid::Uuid::new_v4()));
    {
        let log = SignalLog::open(&dir, &PIPELINE_CHANNELS, false);
        let mut pipeline = pipeline(log);
        for _ in 0..5 {
            pipeline.process(&arm_pose(45.0, 0.0), 0.016);
        }
    }

    for name in PIPELINE_CHANNELS {
        let path = dir.join(format!("{}.csv", name));
        let mut reader = csv::Reader::from_path(&path).expect("channel file");
        assert_eq!(reader.records().count(), 5, "channel {}", name);
    }

    let mut reader = csv::Reader::from_path(dir.join("raAvLog.csv")).expect("raAvLog");
    let last: f64 = reader
        .records()
        .last()
        .expect("rows")
        .expect("record")[1]
        .parse()
        .expect("value");
    assert!(approx_eq(last, 36.0, 1e-6));

    let _ = std::fs::remove_dir_all(&dir);
}
