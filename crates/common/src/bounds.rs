use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::frustum::Frustum;

/// A plane in Hessian normal form: `dot(normal, p) + d = 0`.
///
/// Points with a positive signed distance lie on the side the normal faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Build a plane from raw `(a, b, c, d)` coefficients and normalise it.
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::Y,
                d: 0.0,
            };
        }
        Self {
            normal: normal / length,
            d: coefficients.w / length,
        }
    }

    pub fn signed_distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Collision sphere of a model type, in model space until transformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Move the sphere into the space described by `matrix`.
    ///
    /// Non-uniform scale grows the radius by the largest axis scale so the
    /// result still encloses the transformed geometry.
    pub fn transform(&self, matrix: &Mat4) -> BoundingSphere {
        let center = matrix.transform_point3(self.center);
        let scale = matrix.to_scale_rotation_translation().0.abs();
        BoundingSphere {
            center,
            radius: self.radius * scale.max_element(),
        }
    }

    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        frustum
            .planes
            .iter()
            .all(|plane| plane.signed_distance_to_point(self.center) >= -self.radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).length_squared() <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_normalises_coefficients() {
        let plane = Plane::from_coefficients(Vec4::new(0.0, 2.0, 0.0, -4.0));
        assert_eq!(plane.normal, Vec3::Y);
        assert!((plane.d + 2.0).abs() < 1e-6);
        assert!((plane.signed_distance_to_point(Vec3::new(0.0, 5.0, 0.0)) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn sphere_transform_moves_and_scales() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 2.0);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 3.0, 1.0),
            glam::Quat::IDENTITY,
            Vec3::new(10.0, 0.0, 0.0),
        );
        let moved = sphere.transform(&m);
        assert_eq!(moved.center, Vec3::new(10.0, 0.0, 0.0));
        assert!((moved.radius - 6.0).abs() < 1e-5);
    }

    #[test]
    fn sphere_contains_point() {
        let sphere = BoundingSphere::new(Vec3::ONE, 1.0);
        assert!(sphere.contains_point(Vec3::new(1.5, 1.0, 1.0)));
        assert!(!sphere.contains_point(Vec3::new(3.0, 1.0, 1.0)));
    }
}
