// src/display.rs - Physical display layout and per-display projection matrices
use nalgebra::{Matrix4, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{load_tiered, ConfigSource};
use crate::math::{angle_between, euler_zxy_degrees, project_on_plane, EPSILON};

/// The only supported facing: the screen points straight back at the viewer.
pub const FACING_VIEWER: Vector3<f64> = Vector3::new(90.0, 90.0, 90.0);

const CONFIG_STEM: &str = "DisplayConfig";

// Floors that keep the perspective matrix finite for zero-sized panels
const MIN_FOV_DEGREES: f64 = 1e-3;
const MIN_ASPECT: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DisplayIssue {
    #[error("displays not pointing directly towards the user are unsupported (direction {x}, {y}, {z})")]
    UnsupportedFacing { x: f64, y: f64, z: f64 },
    #[error("the height of the display must be greater than zero (got {0})")]
    NonPositiveHeight(f64),
    #[error("the width of the display must be greater than zero (got {0})")]
    NonPositiveWidth(f64),
}

#[derive(Debug, Error)]
pub enum ObliqueError {
    #[error("projection matrix is not invertible")]
    Singular,
    #[error("clip plane does not intersect the view frustum")]
    Degenerate,
}

/// One display as written in the configuration file, where Y and Z are swapped
/// relative to the simulation frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEntry {
    /// Euler angles in degrees
    pub direction: Vector3<f64>,
    pub height: f64,
    pub center_position: Vector3<f64>,
    /// Meters, as is height
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySurface {
    pub center_position: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub width: f64,
    pub height: f64,
    /// Rotation of the panel itself relative to facing the viewer
    pub display_rotation: UnitQuaternion<f64>,
    /// Rotation that looks from the viewer toward the panel's center
    pub look_rotation: UnitQuaternion<f64>,
    pub total_rotation: UnitQuaternion<f64>,
}

fn swap_yz(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, v.z, v.y)
}

fn look_rotation(forward: &Vector3<f64>) -> UnitQuaternion<f64> {
    if forward.norm() < EPSILON {
        return UnitQuaternion::identity();
    }
    // Straight up or down has no defined yaw with Y as up
    let up = if forward.normalize().cross(&Vector3::y()).norm() < 1e-6 {
        Vector3::z()
    } else {
        Vector3::y()
    };
    UnitQuaternion::face_towards(forward, &up)
}

impl DisplaySurface {
    pub fn new(center_position: Vector3<f64>, direction: Vector3<f64>, width: f64, height: f64) -> Self {
        let display_rotation = euler_zxy_degrees(&(direction - FACING_VIEWER));
        let look_rotation = look_rotation(&center_position);

        Self {
            center_position,
            direction,
            width,
            height,
            display_rotation,
            look_rotation,
            total_rotation: look_rotation * display_rotation,
        }
    }

    pub fn from_entry(entry: &DisplayEntry) -> Self {
        Self::new(
            swap_yz(&entry.center_position),
            swap_yz(&entry.direction),
            entry.width,
            entry.height,
        )
    }

    pub fn to_entry(&self) -> DisplayEntry {
        DisplayEntry {
            direction: swap_yz(&self.direction),
            height: self.height,
            center_position: swap_yz(&self.center_position),
            width: self.width,
        }
    }

    pub fn validate(&self) -> Vec<DisplayIssue> {
        let mut issues = Vec::new();

        if self.direction != FACING_VIEWER {
            issues.push(DisplayIssue::UnsupportedFacing {
                x: self.direction.x,
                y: self.direction.y,
                z: self.direction.z,
            });
        }
        if self.height <= 0.0 {
            issues.push(DisplayIssue::NonPositiveHeight(self.height));
        }
        if self.width <= 0.0 {
            issues.push(DisplayIssue::NonPositiveWidth(self.width));
        }

        issues
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn translate(&self, translation: &Vector3<f64>) -> Self {
        Self::new(
            self.center_position + translation,
            self.direction,
            self.width,
            self.height,
        )
    }

    /// Corners as seen straight ahead at the display's distance, clockwise from
    /// upper right: [up-right, low-right, low-left, up-left].
    pub fn corners(&self) -> [Vector3<f64>; 4] {
        let center = Vector3::new(0.0, 0.0, self.center_position.norm());
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;

        [(1.0, 1.0), (1.0, -1.0), (-1.0, -1.0), (-1.0, 1.0)].map(|(sx, sy)| {
            center + self.display_rotation * Vector3::new(sx * half_w, sy * half_h, 0.0)
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct RawDisplayConfig {
    displays: Vec<DisplayEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub displays: Vec<DisplaySurface>,
}

#[derive(Debug, Clone)]
pub struct LoadedDisplayConfig {
    pub config: DisplayConfig,
    pub source: ConfigSource,
}

impl DisplayConfig {
    pub fn new(displays: Vec<DisplaySurface>) -> Self {
        Self { displays }
    }

    /// Single 16:9 panel 1.5 m straight ahead, used when no config file loads.
    pub fn built_in() -> Self {
        Self::new(vec![DisplaySurface::new(
            Vector3::new(0.0, 0.0, 1.5),
            FACING_VIEWER,
            1.6,
            0.9,
        )])
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: RawDisplayConfig = serde_json::from_str(raw)?;
        Ok(Self::new(
            parsed.displays.iter().map(DisplaySurface::from_entry).collect(),
        ))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let raw = RawDisplayConfig {
            displays: self.displays.iter().map(DisplaySurface::to_entry).collect(),
        };
        serde_json::to_string_pretty(&raw)
    }

    pub fn load(dir: impl AsRef<Path>, env: &str) -> LoadedDisplayConfig {
        let loaded = match load_tiered(dir.as_ref(), CONFIG_STEM, env, Self::from_json) {
            Some((config, source)) => LoadedDisplayConfig { config, source },
            None => {
                warn!("no display configuration found, using built-in default");
                LoadedDisplayConfig {
                    config: Self::built_in(),
                    source: ConfigSource::BuiltIn,
                }
            }
        };

        for (index, issues) in loaded.config.validation_report() {
            warn!("validation error for display {}", index + 1);
            for issue in issues {
                warn!("  {}", issue);
            }
        }

        loaded
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub fn validation_report(&self) -> Vec<(usize, Vec<DisplayIssue>)> {
        self.displays
            .iter()
            .enumerate()
            .map(|(i, d)| (i, d.validate()))
            .filter(|(_, issues)| !issues.is_empty())
            .collect()
    }

    pub fn translate(&self, translation: &Vector3<f64>) -> Self {
        Self::new(self.displays.iter().map(|d| d.translate(translation)).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub horizontal_fov: f64,
    pub vertical_fov: f64,
    pub aspect: f64,
    pub matrix: Matrix4<f64>,
    pub camera_rotation: UnitQuaternion<f64>,
}

#[derive(Debug, Clone)]
pub struct DisplayProjector {
    pub near: f64,
    pub far: f64,
    /// Replace the near plane with the display plane. Unvalidated on real hardware.
    pub oblique_clip: bool,
}

impl Default for DisplayProjector {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1000.0,
            oblique_clip: false,
        }
    }
}

impl DisplayProjector {
    pub fn projection_for(&self, display: &DisplaySurface) -> Projection {
        let corners = display.corners();

        // Flatten onto the horizontal and vertical planes through the eye
        let horizontal = corners.map(|c| project_on_plane(&c, &Vector3::y()));
        let vertical = corners.map(|c| project_on_plane(&c, &Vector3::x()));

        // Larger of the two edge angles covers an off-center panel
        let horizontal_fov = angle_between(&horizontal[0], &horizontal[3])
            .max(angle_between(&horizontal[1], &horizontal[2]));
        let mut vertical_fov = angle_between(&vertical[0], &vertical[1])
            .max(angle_between(&vertical[2], &vertical[3]));

        if !(vertical_fov.is_finite() && vertical_fov >= MIN_FOV_DEGREES) {
            warn!(vertical_fov, "degenerate vertical field of view, clamping");
            vertical_fov = MIN_FOV_DEGREES;
        }

        let mut aspect = (horizontal_fov.to_radians() * 0.5).tan()
            / (vertical_fov.to_radians() * 0.5).tan();
        if !aspect.is_finite() || aspect <= 0.0 {
            aspect = display.width / display.height;
        }
        if !(aspect.is_finite() && aspect >= MIN_ASPECT) {
            warn!(aspect, "degenerate display aspect, clamping");
            aspect = MIN_ASPECT;
        }

        debug!(horizontal_fov, vertical_fov, aspect, "display frustum");

        let mut matrix =
            nalgebra_glm::perspective_rh_no(aspect, vertical_fov.to_radians(), self.near, self.far);

        if self.oblique_clip {
            let distance = display.center_position.norm();
            let plane = Vector4::new(0.0, 0.0, -1.0, -distance);
            if let Err(e) = apply_oblique_clip(&mut matrix, &plane) {
                warn!("oblique clipping skipped: {}", e);
            }
        }

        Projection {
            horizontal_fov,
            vertical_fov,
            aspect,
            matrix,
            camera_rotation: display.look_rotation,
        }
    }

    /// One projection per display; displays that fail validation get `None`.
    pub fn project_all(&self, config: &DisplayConfig) -> Vec<Option<Projection>> {
        config
            .displays
            .iter()
            .enumerate()
            .map(|(i, display)| {
                if display.is_valid() {
                    let projection = self.projection_for(display);
                    info!(
                        "display {}: {:.2} x {:.2} deg",
                        i + 1,
                        projection.horizontal_fov,
                        projection.vertical_fov
                    );
                    Some(projection)
                } else {
                    warn!("display {} failed validation, not activating", i + 1);
                    None
                }
            })
            .collect()
    }
}

fn sign(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Replace the near plane of `projection` with `clip_plane` (camera space, visible
/// side positive), keeping the far plane as close to intact as possible.
pub fn apply_oblique_clip(
    projection: &mut Matrix4<f64>,
    clip_plane: &Vector4<f64>,
) -> Result<(), ObliqueError> {
    let inverse = projection.try_inverse().ok_or(ObliqueError::Singular)?;

    let q = inverse * Vector4::new(sign(clip_plane.x), sign(clip_plane.y), 1.0, 1.0);
    let denom = clip_plane.dot(&q);
    if denom.abs() < EPSILON {
        return Err(ObliqueError::Degenerate);
    }

    let c = clip_plane * (2.0 / denom);
    let w_row = projection.row(3).clone_owned();
    for col in 0..4 {
        projection[(2, col)] = c[col] - w_row[col];
    }

    Ok(())
}
