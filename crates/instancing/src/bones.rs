//! Skeletons and per-instance bone transforms.
//!
//! Absolute bone transforms follow `abs[i] = abs[parent] * local[i] * adjust[i]`
//! with column vectors, so the adjusting transform acts in the bone's own
//! space before the bind pose places it under its parent.

use glam::{EulerRot, Mat4, Quat};
use skirmish_assets::BoneAsset;
use skirmish_common::InstanceKey;
use std::collections::HashMap;

use crate::error::{InstancingError, InstancingResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub local: Mat4,
}

/// Bones ordered parent-before-child.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> InstancingResult<Self> {
        if bones.is_empty() {
            return Err(InstancingError::InvalidSkeleton("no bones".into()));
        }
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(InstancingError::InvalidSkeleton(format!(
                        "bone {} (#{index}) has parent #{parent} that does not precede it",
                        bone.name
                    )));
                }
            }
        }
        Ok(Self { bones })
    }

    pub fn from_assets(assets: &[BoneAsset]) -> InstancingResult<Self> {
        Self::new(
            assets
                .iter()
                .map(|asset| Bone {
                    name: asset.name.clone(),
                    parent: asset.parent,
                    local: asset.local,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    /// Compose absolute transforms. `adjust` must have one entry per bone.
    pub fn compose(&self, adjust: &[Mat4], out: &mut Vec<Mat4>) {
        out.clear();
        out.reserve(self.bones.len());
        for (index, bone) in self.bones.iter().enumerate() {
            let adjusting = adjust.get(index).copied().unwrap_or(Mat4::IDENTITY);
            let relative = bone.local * adjusting;
            let absolute = match bone.parent {
                Some(parent) => out[parent] * relative,
                None => relative,
            };
            out.push(absolute);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationAxis {
    X,
    Y,
    Z,
}

impl RotationAxis {
    /// Content authored with an alternate up axis has Y and Z swapped.
    pub fn routed(self, alternate_up: bool) -> Self {
        match (self, alternate_up) {
            (RotationAxis::Y, true) => RotationAxis::Z,
            (RotationAxis::Z, true) => RotationAxis::Y,
            (axis, _) => axis,
        }
    }

    fn index(self) -> usize {
        match self {
            RotationAxis::X => 0,
            RotationAxis::Y => 1,
            RotationAxis::Z => 2,
        }
    }
}

#[derive(Debug, Clone)]
struct InstanceBones {
    angles: Vec<[f32; 3]>,
    base: Vec<Mat4>,
    absolute: Vec<Mat4>,
    dirty: bool,
}

impl InstanceBones {
    fn new(bone_count: usize) -> Self {
        Self {
            angles: vec![[0.0; 3]; bone_count],
            base: vec![Mat4::IDENTITY; bone_count],
            absolute: Vec::with_capacity(bone_count),
            dirty: true,
        }
    }

    fn adjusting(&self) -> Vec<Mat4> {
        self.base
            .iter()
            .zip(&self.angles)
            .map(|(base, [x, y, z])| {
                if *x == 0.0 && *y == 0.0 && *z == 0.0 {
                    *base
                } else {
                    *base * Mat4::from_quat(Quat::from_euler(EulerRot::XYZ, *x, *y, *z))
                }
            })
            .collect()
    }
}

/// Per-instance adjusting transforms and cached absolute bone transforms
/// for one model type.
#[derive(Debug, Clone)]
pub struct BoneTransformResolver {
    skeleton: Skeleton,
    alternate_up: bool,
    instances: HashMap<InstanceKey, InstanceBones>,
    recomputes: u64,
}

impl BoneTransformResolver {
    pub fn new(skeleton: Skeleton, alternate_up: bool) -> Self {
        Self {
            skeleton,
            alternate_up,
            instances: HashMap::new(),
            recomputes: 0,
        }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn is_alternate_up(&self) -> bool {
        self.alternate_up
    }

    fn entry(&mut self, key: InstanceKey) -> &mut InstanceBones {
        let bone_count = self.skeleton.len();
        self.instances
            .entry(key)
            .or_insert_with(|| InstanceBones::new(bone_count))
    }

    /// Set one rotation angle (radians) of a bone. Returns false when the
    /// bone does not exist or the angle is bit-for-bit unchanged.
    pub fn set_rotation(&mut self, key: InstanceKey, bone: usize, axis: RotationAxis, angle: f32) -> bool {
        if bone >= self.skeleton.len() {
            return false;
        }
        let slot = axis.routed(self.alternate_up).index();
        let bones = self.entry(key);
        if bones.angles[bone][slot].to_bits() == angle.to_bits() {
            return false;
        }
        bones.angles[bone][slot] = angle;
        bones.dirty = true;
        true
    }

    /// Replace the adjusting transform of a bone. Rotation angles set via
    /// [`set_rotation`](Self::set_rotation) are applied on top of it.
    pub fn set_adjusting_transform(&mut self, key: InstanceKey, bone: usize, transform: Mat4) -> bool {
        if bone >= self.skeleton.len() {
            return false;
        }
        let bones = self.entry(key);
        if bones.base[bone] == transform {
            return false;
        }
        bones.base[bone] = transform;
        bones.dirty = true;
        true
    }

    /// Absolute transforms of every bone for `key`, recomputed only when an
    /// adjusting transform changed or the instance is new.
    pub fn resolve(&mut self, key: InstanceKey) -> &[Mat4] {
        let bone_count = self.skeleton.len();
        let bones = self
            .instances
            .entry(key)
            .or_insert_with(|| InstanceBones::new(bone_count));
        if bones.dirty {
            let adjusting = bones.adjusting();
            self.skeleton.compose(&adjusting, &mut bones.absolute);
            bones.dirty = false;
            self.recomputes += 1;
        }
        &bones.absolute
    }

    /// Cached absolute transform, without recomputing.
    pub fn absolute(&self, key: InstanceKey, bone: usize) -> Option<Mat4> {
        self.instances
            .get(&key)
            .filter(|bones| !bones.dirty)
            .and_then(|bones| bones.absolute.get(bone).copied())
    }

    pub fn remove(&mut self, key: InstanceKey) -> bool {
        self.instances.remove(&key).is_some()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn approx(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    fn chain() -> Skeleton {
        Skeleton::new(vec![
            Bone {
                name: "Root".into(),
                parent: None,
                local: Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            },
            Bone {
                name: "Turret".into(),
                parent: Some(0),
                local: Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)),
            },
            Bone {
                name: "Barrel".into(),
                parent: Some(1),
                local: Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)),
            },
        ])
        .unwrap()
    }

    #[test]
    fn rejects_child_before_parent() {
        let err = Skeleton::new(vec![Bone {
            name: "Loop".into(),
            parent: Some(0),
            local: Mat4::IDENTITY,
        }])
        .unwrap_err();
        assert!(matches!(err, InstancingError::InvalidSkeleton(_)));
        assert!(Skeleton::new(Vec::new()).is_err());
    }

    #[test]
    fn composition_is_parent_local_adjust() {
        let skeleton = chain();
        let root = skeleton.bones()[0].local;
        let a = skeleton.bones()[1].local;
        let b = Mat4::from_rotation_y(0.7);

        let mut resolver = BoneTransformResolver::new(skeleton, false);
        let key = InstanceKey(1);
        resolver.set_adjusting_transform(key, 1, b);
        let absolute = resolver.resolve(key).to_vec();

        assert!(approx(absolute[1], root * a * b));
    }

    #[test]
    fn parent_adjustment_reaches_child_on_next_resolve() {
        let skeleton = chain();
        let root = skeleton.bones()[0].local;
        let a = skeleton.bones()[1].local;
        let b = skeleton.bones()[2].local;
        let turn = Mat4::from_rotation_y(0.7);

        let mut resolver = BoneTransformResolver::new(skeleton, false);
        let key = InstanceKey(5);
        resolver.resolve(key);
        let before = resolver.absolute(key, 2).unwrap();
        assert!(approx(before, root * a * b));

        assert!(resolver.set_adjusting_transform(key, 1, turn));
        // The cached value is withheld until the next recompute.
        assert_eq!(resolver.absolute(key, 2), None);
        assert_eq!(resolver.recompute_count(), 1);

        resolver.resolve(key);
        let after = resolver.absolute(key, 2).unwrap();
        assert!(approx(after, root * a * turn * b));
        assert_eq!(resolver.recompute_count(), 2);
    }

    #[test]
    fn children_inherit_parent_adjustment() {
        let mut resolver = BoneTransformResolver::new(chain(), false);
        let key = InstanceKey(1);
        resolver.set_rotation(key, 1, RotationAxis::Y, std::f32::consts::FRAC_PI_2);
        let absolute = resolver.resolve(key).to_vec();

        // Barrel points down -Z locally; a quarter turn of the turret sends it to -X.
        let tip = absolute[2].transform_point3(Vec3::ZERO);
        assert!((tip - Vec3::new(-1.0, 1.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn recompute_only_when_dirty() {
        let mut resolver = BoneTransformResolver::new(chain(), false);
        let key = InstanceKey(3);
        resolver.resolve(key);
        resolver.resolve(key);
        assert_eq!(resolver.recompute_count(), 1);

        assert!(resolver.set_rotation(key, 1, RotationAxis::Y, 0.25));
        assert!(!resolver.set_rotation(key, 1, RotationAxis::Y, 0.25));
        resolver.resolve(key);
        resolver.resolve(key);
        assert_eq!(resolver.recompute_count(), 2);
    }

    #[test]
    fn alternate_up_swaps_y_and_z() {
        assert_eq!(RotationAxis::Y.routed(true), RotationAxis::Z);
        assert_eq!(RotationAxis::Z.routed(true), RotationAxis::Y);
        assert_eq!(RotationAxis::X.routed(true), RotationAxis::X);
        assert_eq!(RotationAxis::Y.routed(false), RotationAxis::Y);

        let mut normal = BoneTransformResolver::new(chain(), false);
        let mut swapped = BoneTransformResolver::new(chain(), true);
        let key = InstanceKey(1);
        normal.set_rotation(key, 1, RotationAxis::Z, 0.4);
        swapped.set_rotation(key, 1, RotationAxis::Y, 0.4);
        assert!(approx(normal.resolve(key)[1], swapped.resolve(key)[1]));
    }

    #[test]
    fn unknown_bone_changes_nothing() {
        let mut resolver = BoneTransformResolver::new(chain(), false);
        let key = InstanceKey(1);
        assert!(!resolver.set_rotation(key, 9, RotationAxis::X, 1.0));
        assert!(!resolver.set_adjusting_transform(key, 9, Mat4::IDENTITY));
        assert_eq!(resolver.instance_count(), 0);
        assert_eq!(chain().find("Barrel"), Some(2));
        assert_eq!(chain().find("Antenna"), None);
    }

    #[test]
    fn absolute_is_cached_only() {
        let mut resolver = BoneTransformResolver::new(chain(), false);
        let key = InstanceKey(5);
        assert_eq!(resolver.absolute(key, 0), None);
        resolver.resolve(key);
        assert!(resolver.absolute(key, 0).is_some());
        assert!(resolver.remove(key));
        assert_eq!(resolver.absolute(key, 0), None);
    }
}
