use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use skirmish_instancing::DrawRecord;

/// Per-instance vertex data as uploaded to the GPU.
///
/// `params` packs `[player, material, flash, elapsed]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceVertex {
    pub model_0: [f32; 4],
    pub model_1: [f32; 4],
    pub model_2: [f32; 4],
    pub model_3: [f32; 4],
    pub params: [f32; 4],
}

impl InstanceVertex {
    pub fn new(model: Mat4, params: [f32; 4]) -> Self {
        let cols = model.to_cols_array_2d();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            params,
        }
    }

    /// Debris is drawn where its drift has carried it.
    pub fn from_record(record: &DrawRecord, explosion: bool) -> Self {
        let model = if explosion {
            record.displaced_world()
        } else {
            record.world
        };
        Self::new(
            model,
            [
                f32::from(record.player.0),
                f32::from(record.material.0),
                if record.flash { 1.0 } else { 0.0 },
                record.elapsed,
            ],
        )
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&[self.model_0, self.model_1, self.model_2, self.model_3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use skirmish_common::{MaterialId, PlayerNumber};

    fn record() -> DrawRecord {
        DrawRecord {
            world: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            player: PlayerNumber(2),
            material: MaterialId(7),
            velocity: Vec3::new(0.0, 4.0, 0.0),
            flash: true,
            elapsed: 0.5,
        }
    }

    #[test]
    fn layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<InstanceVertex>(), 80);
        let zeroed = InstanceVertex::zeroed();
        let bytes = bytemuck::bytes_of(&zeroed);
        assert_eq!(bytes.len(), 80);
    }

    #[test]
    fn packs_record() {
        let vertex = InstanceVertex::from_record(&record(), false);
        assert_eq!(vertex.params, [2.0, 7.0, 1.0, 0.5]);
        assert_eq!(vertex.model(), record().world);
    }

    #[test]
    fn explosion_pieces_drift() {
        let vertex = InstanceVertex::from_record(&record(), true);
        let origin = vertex.model().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 4.0, 3.0)).length() < 1e-5);
    }
}
