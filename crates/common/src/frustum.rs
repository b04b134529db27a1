use glam::{Mat4, Vec3};

use crate::bounds::{BoundingSphere, Plane};

/// View frustum as six inward-facing planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    // left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes from a view-projection matrix.
    ///
    /// Assumes a `[0, 1]` clip-space depth range (glam's `perspective_rh`,
    /// which is what wgpu expects).
    pub fn from_view_projection(view_projection: Mat4) -> Frustum {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        Frustum {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance_to_point(point) >= 0.0)
    }

    /// Test a model-space sphere placed by `world` against the frustum.
    pub fn test_sphere(&self, world: &Mat4, sphere: &BoundingSphere) -> bool {
        sphere.transform(world).intersects_frustum(self)
    }
}

/// The camera as seen by the instancing core: a frustum predicate plus a
/// generation counter that changes whenever the view moves.
pub trait Camera {
    fn frustum(&self) -> Frustum;

    /// Bumped every time the camera moves. Consumers compare against the
    /// last value they saw instead of subscribing to an event.
    fn generation(&self) -> u64 {
        0
    }

    fn test_frustum(&self, world: &Mat4, sphere: &BoundingSphere) -> bool {
        self.frustum().test_sphere(world, sphere)
    }
}

/// A camera that never moves; handy for headless runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedCamera {
    pub view_projection: Mat4,
}

impl FixedCamera {
    pub fn looking_at(eye: Vec3, target: Vec3, fov_radians: f32, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let projection = Mat4::perspective_rh(fov_radians, aspect, 0.1, 1000.0);
        Self {
            view_projection: projection * view,
        }
    }
}

impl Camera for FixedCamera {
    fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection)
    }
}
