// src/lib.rs
pub mod body;
pub mod config;
pub mod data;
pub mod display;
pub mod flight;
pub mod flock;
pub mod game;
pub mod math;
pub mod sensor_bridge;
pub mod skeleton;
pub mod smoothing;
pub mod tracking;

pub use config::Settings;
pub use display::{DisplayConfig, DisplayProjector, Projection};
pub use flight::{FlightConfig, FlightModel, RigidBody};
pub use skeleton::{JointId, SkeletonSnapshot};
pub use smoothing::SignalSmoother;
pub use tracking::{ControlSignal, JointFilter, PoseExtractor, SensorPipeline, TrackingSession};
