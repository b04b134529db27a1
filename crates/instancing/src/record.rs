use glam::Vec3;
use skirmish_common::{InstanceKey, ItemType, MaterialId, PlayerNumber, Transform};
use skirmish_terrain::CellCoord;

use crate::change_request::{InstancePayload, PartType};

/// Gameplay-facing state of one live instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub key: InstanceKey,
    pub item_type: ItemType,
    pub transform: Transform,
    pub in_frustum: bool,
    pub player: PlayerNumber,
    /// Draw only this part index when set.
    pub restrict_to_part: Option<usize>,
    pub material: MaterialId,
    pub flash: bool,
    pub explode: bool,
    /// Initial drift of explosion debris, world units per second.
    pub velocity: Vec3,
    /// Terrain cell a scenery instance is filed under.
    pub cell: Option<CellCoord>,
}

impl InstanceRecord {
    pub fn new(key: InstanceKey, item_type: ItemType) -> Self {
        Self {
            key,
            item_type,
            transform: Transform::default(),
            in_frustum: true,
            player: PlayerNumber::default(),
            restrict_to_part: None,
            material: MaterialId::default(),
            flash: false,
            explode: false,
            velocity: Vec3::ZERO,
            cell: None,
        }
    }

    /// Payload for one part. Normal parts hide while the instance explodes;
    /// explosion pieces show only while it does.
    pub fn payload_for(&self, part: usize, part_type: PartType) -> InstancePayload {
        let selected = self.restrict_to_part.is_none_or(|only| only == part);
        let shown = match part_type {
            PartType::Normal => !self.explode,
            PartType::Explosion => self.explode,
        };
        InstancePayload {
            player: self.player,
            material: self.material,
            velocity: match part_type {
                PartType::Normal => Vec3::ZERO,
                PartType::Explosion => self.velocity,
            },
            flash: self.flash,
            visible: self.in_frustum && selected && shown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_start_visible() {
        let record = InstanceRecord::new(InstanceKey(1), ItemType(0));
        assert!(record.in_frustum);
        assert!(record.payload_for(0, PartType::Normal).visible);
        assert!(!record.payload_for(3, PartType::Explosion).visible);
    }

    #[test]
    fn restrict_hides_other_parts() {
        let mut record = InstanceRecord::new(InstanceKey(1), ItemType(0));
        record.restrict_to_part = Some(2);
        assert!(!record.payload_for(0, PartType::Normal).visible);
        assert!(record.payload_for(2, PartType::Normal).visible);
    }

    #[test]
    fn explode_swaps_part_families() {
        let mut record = InstanceRecord::new(InstanceKey(1), ItemType(0));
        record.explode = true;
        record.velocity = Vec3::Y;
        assert!(!record.payload_for(0, PartType::Normal).visible);
        let debris = record.payload_for(4, PartType::Explosion);
        assert!(debris.visible);
        assert_eq!(debris.velocity, Vec3::Y);

        record.in_frustum = false;
        assert!(!record.payload_for(4, PartType::Explosion).visible);
    }
}
