use nalgebra::{Isometry3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

pub fn rotation_to_align(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Rotation3<f64>> {
    Rotation3::rotation_between(from, to)
}

/// Unsigned angle between two vectors in degrees, `None` if either has zero length.
pub fn angle_between_degrees(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<f64> {
    let norms = a.norm() * b.norm();
    if norms < 1e-12 {
        return None;
    }
    let cos = (a.dot(b) / norms).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Angle between a vector and the plane perpendicular to `normal`, in `[0, 90]` degrees.
pub fn angle_to_plane_degrees(vector: &Vector3<f64>, normal: &Vector3<f64>) -> Option<f64> {
    angle_between_degrees(vector, normal).map(|angle| (90.0 - angle).abs())
}

/// Absolute cosine of the angle between two vectors, `0.0` for degenerate input.
pub fn abs_cos_angle(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let norms = a.norm() * b.norm();
    if norms < 1e-12 {
        0.0
    } else {
        (a.dot(b) / norms).abs().min(1.0)
    }
}

/// Builds the transformation that moves `origin` to the coordinate origin and turns
/// `normal` onto the z axis.
pub fn canonical_frame(normal: &Vector3<f64>, origin: &Point3<f64>) -> Option<Isometry3<f64>> {
    let unit = normal.try_normalize(1e-12)?;
    // rotation_between has no unique answer for opposite vectors
    let rotation = if unit.z < -1.0 + 1e-12 {
        Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
    } else {
        rotation_to_align(&unit, &Vector3::z())?
    };
    let rotated_origin = rotation.transform_point(origin);
    Some(Isometry3::from_parts(
        Translation3::from(-rotated_origin.coords),
        UnitQuaternion::from_rotation_matrix(&rotation),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn angle_between_perpendicular_vectors_is_ninety() {
        let angle = angle_between_degrees(&Vector3::x(), &Vector3::y()).unwrap();
        assert!((angle - 90.0).abs() < EPS);
        assert!(angle_between_degrees(&Vector3::zeros(), &Vector3::y()).is_none());
    }

    #[test]
    fn angle_to_plane_of_normal_is_ninety_and_of_in_plane_vector_is_zero() {
        let normal = Vector3::z();
        let up = angle_to_plane_degrees(&Vector3::new(0.0, 0.0, -3.0), &normal).unwrap();
        let flat = angle_to_plane_degrees(&Vector3::new(1.0, 1.0, 0.0), &normal).unwrap();
        assert!((up - 90.0).abs() < EPS);
        assert!(flat.abs() < EPS);
    }

    #[test]
    fn canonical_frame_maps_normal_to_z_and_origin_to_zero() {
        let normal = Vector3::new(1.0, 1.0, 0.0).normalize();
        let origin = Point3::new(3.0, -2.0, 7.0);
        let frame = canonical_frame(&normal, &origin).unwrap();

        let moved_origin = frame * origin;
        assert!(moved_origin.coords.norm() < EPS);

        let above = origin + normal * 5.0;
        let moved_above = frame * above;
        assert!((moved_above - Point3::new(0.0, 0.0, 5.0)).norm() < EPS);
    }

    #[test]
    fn canonical_frame_handles_antiparallel_normal() {
        let frame = canonical_frame(&-Vector3::z(), &Point3::origin()).unwrap();
        let moved = frame * Point3::new(0.0, 0.0, 2.0);
        assert!((moved.z + 2.0).abs() < EPS);
    }
}
