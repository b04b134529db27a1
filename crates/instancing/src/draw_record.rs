use glam::{Mat4, Vec3};
use skirmish_common::{MaterialId, PlayerNumber};

use crate::change_request::ChangeRequest;

/// One instance as it sits in a draw list, ready to be serialised into an
/// instance stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub world: Mat4,
    pub player: PlayerNumber,
    pub material: MaterialId,
    pub velocity: Vec3,
    pub flash: bool,
    /// Seconds spent in the exploding list; zero for normal parts.
    pub elapsed: f32,
}

impl DrawRecord {
    pub fn from_request(request: &ChangeRequest) -> Self {
        let payload = request.payload();
        Self {
            world: request.world(),
            player: payload.player,
            material: payload.material,
            velocity: payload.velocity,
            flash: payload.flash,
            elapsed: 0.0,
        }
    }

    /// World matrix with the explosion drift applied.
    pub fn displaced_world(&self) -> Mat4 {
        if self.elapsed <= 0.0 || self.velocity == Vec3::ZERO {
            return self.world;
        }
        Mat4::from_translation(self.velocity * self.elapsed) * self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_request::{InstancePayload, PartType};

    #[test]
    fn copies_payload() {
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let payload = InstancePayload {
            player: PlayerNumber(3),
            flash: true,
            ..InstancePayload::default()
        };
        let record = DrawRecord::from_request(&ChangeRequest::add_or_update(
            world,
            payload,
            PartType::Normal,
        ));
        assert_eq!(record.world, world);
        assert_eq!(record.player, PlayerNumber(3));
        assert!(record.flash);
        assert_eq!(record.elapsed, 0.0);
    }

    #[test]
    fn drift_follows_velocity() {
        let record = DrawRecord {
            world: Mat4::IDENTITY,
            player: PlayerNumber(0),
            material: MaterialId(0),
            velocity: Vec3::new(0.0, 2.0, 0.0),
            flash: false,
            elapsed: 0.5,
        };
        let moved = record.displaced_world().transform_point3(Vec3::ZERO);
        assert!((moved - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);
    }
}
