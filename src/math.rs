// src/math.rs - Vector helpers shared by the pose extractor, flight model and projector
use nalgebra::{UnitQuaternion, Vector3};

/// Magnitudes below this are treated as zero-length.
pub const EPSILON: f64 = 1e-9;

/// Unsigned angle between two vectors in degrees. Zero-length input yields 0.
pub fn angle_between(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let mag1 = v1.norm();
    let mag2 = v2.norm();

    if mag1 < EPSILON || mag2 < EPSILON {
        return 0.0;
    }

    let cos_angle = (v1.dot(v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Angle from `from` to `to` in degrees, signed by which side of `axis` the rotation falls on.
/// A rotation exactly in the plane of `axis` counts as positive.
pub fn signed_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let unsigned = angle_between(from, to);
    let side = axis.dot(&from.cross(to));
    if side < 0.0 {
        -unsigned
    } else {
        unsigned
    }
}

/// Remove the component of `v` along `normal`.
pub fn project_on_plane(v: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    let sq = normal.norm_squared();
    if sq < EPSILON * EPSILON {
        return *v;
    }
    v - normal * (v.dot(normal) / sq)
}

/// Map any angle in degrees into (-180, 180].
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Engine-style Euler rotation (degrees): roll about Z, then pitch about X, then yaw about Y.
pub fn euler_zxy_degrees(euler: &Vector3<f64>) -> UnitQuaternion<f64> {
    let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), euler.y.to_radians());
    let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), euler.x.to_radians());
    let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), euler.z.to_radians());
    yaw * pitch * roll
}

/// Inverse of [`euler_zxy_degrees`], each component in [0, 360).
pub fn to_euler_zxy_degrees(rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
    let m = rotation.to_rotation_matrix();
    let m = m.matrix();
    let pitch = (-m[(1, 2)]).clamp(-1.0, 1.0).asin();
    let yaw = m[(0, 2)].atan2(m[(2, 2)]);
    let roll = m[(1, 0)].atan2(m[(1, 1)]);
    Vector3::new(pitch, yaw, roll).map(|a| a.to_degrees().rem_euclid(360.0))
}
