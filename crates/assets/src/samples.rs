//! Built-in sample models used by the drivers and tests.

use glam::{Mat4, Vec3};
use skirmish_common::{BoundingSphere, ItemType};

use crate::catalog::ModelCatalog;
use crate::loader::InMemoryLoader;
use crate::mesh::MeshData;
use crate::model::{BoneAsset, MeshPartAsset, ModelAsset, ModelFlags};

pub const TANK: ItemType = ItemType(0);
pub const TREE: ItemType = ItemType(1);
pub const OUTPOST: ItemType = ItemType(2);

fn part(name: &str, bone: usize, mesh: MeshData) -> MeshPartAsset {
    MeshPartAsset {
        name: name.into(),
        bone,
        mesh: Some(mesh),
    }
}

fn bone(name: &str, parent: Option<usize>, offset: Vec3) -> BoneAsset {
    BoneAsset {
        name: name.into(),
        parent,
        local: Mat4::from_translation(offset),
    }
}

/// Tracked vehicle with a rotating turret and two explosion pieces.
pub fn tank() -> ModelAsset {
    ModelAsset {
        name: "tank".into(),
        parts: vec![
            part("Hull", 1, MeshData::cuboid(Vec3::ZERO, Vec3::new(0.9, 0.35, 1.4))),
            part("Piece1", 1, MeshData::cuboid(Vec3::ZERO, Vec3::new(0.4, 0.2, 0.5))),
            part("Turret", 2, MeshData::cuboid(Vec3::ZERO, Vec3::new(0.55, 0.25, 0.6))),
            part("Piece2", 2, MeshData::cuboid(Vec3::ZERO, Vec3::new(0.3, 0.2, 0.3))),
            part(
                "Barrel",
                3,
                MeshData::cuboid(Vec3::new(0.0, 0.0, -0.6), Vec3::new(0.08, 0.08, 0.6)),
            ),
        ],
        bones: vec![
            bone("Root", None, Vec3::ZERO),
            bone("Hull", Some(0), Vec3::new(0.0, 0.35, 0.0)),
            bone("Turret", Some(1), Vec3::new(0.0, 0.6, 0.0)),
            bone("Barrel", Some(2), Vec3::new(0.0, 0.05, -0.5)),
        ],
        bounds: BoundingSphere::new(Vec3::new(0.0, 0.6, 0.0), 1.8),
        flags: ModelFlags {
            casts_shadow: true,
            selectable: true,
            ..ModelFlags::default()
        },
        alternate_up_axis: false,
    }
}

/// Z-up scenery with an alpha-blended canopy.
pub fn tree() -> ModelAsset {
    ModelAsset {
        name: "tree".into(),
        parts: vec![
            part("Trunk", 0, MeshData::cuboid(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.15, 1.0, 0.15))),
            part("Canopy", 0, MeshData::cuboid(Vec3::new(0.0, 2.5, 0.0), Vec3::splat(0.9))),
        ],
        bones: vec![bone("Root", None, Vec3::ZERO)],
        bounds: BoundingSphere::new(Vec3::new(0.0, 1.8, 0.0), 2.0),
        flags: ModelFlags {
            casts_shadow: true,
            alpha_blended: true,
            scenery: true,
            ..ModelFlags::default()
        },
        alternate_up_axis: true,
    }
}

/// Illuminated structure with a spinning beacon.
pub fn outpost() -> ModelAsset {
    ModelAsset {
        name: "outpost".into(),
        parts: vec![
            part("Base", 0, MeshData::cuboid(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.5, 1.0, 1.5))),
            part("Beacon", 1, MeshData::cuboid(Vec3::ZERO, Vec3::new(0.2, 0.4, 0.2))),
        ],
        bones: vec![
            bone("Root", None, Vec3::ZERO),
            bone("Beacon", Some(0), Vec3::new(0.0, 2.4, 0.0)),
        ],
        bounds: BoundingSphere::new(Vec3::new(0.0, 1.4, 0.0), 2.6),
        flags: ModelFlags {
            casts_shadow: true,
            illumination_map: true,
            scenery: true,
            selectable: true,
            ..ModelFlags::default()
        },
        alternate_up_axis: false,
    }
}

/// Catalog and in-memory loader serving the three sample models.
pub fn sample_library() -> (ModelCatalog, InMemoryLoader) {
    let mut catalog = ModelCatalog::new();
    let mut loader = InMemoryLoader::new();
    for (item_type, path, asset) in [
        (TANK, "units/tank", tank()),
        (TREE, "scenery/tree", tree()),
        (OUTPOST, "structures/outpost", outpost()),
    ] {
        catalog.insert(item_type, path);
        loader.insert(path, asset);
    }
    (catalog, loader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_valid() {
        for asset in [tank(), tree(), outpost()] {
            asset.validate().unwrap();
        }
    }

    #[test]
    fn tank_turret_hangs_off_hull() {
        let tank = tank();
        let turret = tank.bone_index("Turret").unwrap();
        assert_eq!(tank.bones[turret].parent, tank.bone_index("Hull"));
    }

    #[test]
    fn library_covers_catalog() {
        let (catalog, _loader) = sample_library();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.path(TREE), Some("scenery/tree"));
    }
}
