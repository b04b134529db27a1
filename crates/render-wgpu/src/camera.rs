use glam::{Mat4, Vec3};
use skirmish_common::{Camera, Frustum};

/// Fly camera with position, yaw, pitch, and projection parameters.
///
/// Every change bumps `generation`, which is how the instance registry
/// notices that visibility needs to be recomputed.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
    generation: u64,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 25.0, 45.0),
            yaw: -90.0_f32.to_radians(),
            pitch: -30.0_f32.to_radians(),
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            speed: 20.0,
            sensitivity: 0.003,
            generation: 1,
        }
    }
}

impl FlyCamera {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Moves along the view axes. Each axis is in `[-1, 1]`: forward, right
    /// and world up.
    pub fn fly(&mut self, forward: f32, right: f32, up: f32, dt: f32) {
        let offset = (self.forward() * forward + self.right() * right + Vec3::Y * up) * self.speed * dt;
        if offset != Vec3::ZERO {
            self.position += offset;
            self.generation += 1;
        }
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
        self.generation += 1;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.to_bits() != self.aspect.to_bits() {
            self.aspect = aspect;
            self.generation += 1;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Camera for FlyCamera {
    fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = FlyCamera::default();
        assert!(cam.position.y > 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn movement_bumps_generation() {
        let mut cam = FlyCamera::default();
        let start = cam.position;
        let generation = cam.generation();
        cam.fly(1.0, 0.0, 0.0, 1.0);
        assert_ne!(cam.position, start);
        assert!(cam.generation() > generation);

        let generation = cam.generation();
        cam.fly(0.0, 0.0, 0.0, 1.0);
        cam.fly(1.0, 1.0, 1.0, 0.0);
        cam.set_aspect(cam.aspect);
        assert_eq!(cam.generation(), generation);
    }

    #[test]
    fn origin_is_in_view_by_default() {
        let cam = FlyCamera::default();
        assert!(cam.frustum().contains_point(Vec3::ZERO));
    }
}
