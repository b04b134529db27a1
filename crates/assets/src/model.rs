use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use skirmish_common::BoundingSphere;

use crate::AssetError;
use crate::mesh::MeshData;

/// One bone of a model's skeleton as stored in the asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneAsset {
    pub name: String,
    /// Index of the parent bone. Parents always precede their children.
    pub parent: Option<usize>,
    #[serde(default = "identity")]
    pub local: Mat4,
}

/// One drawable sub-mesh of a model, attached to a bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPartAsset {
    pub name: String,
    pub bone: usize,
    /// Geometry is optional: headless consumers only need the part layout.
    #[serde(default)]
    pub mesh: Option<MeshData>,
}

/// Draw-pass classification flags of a model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFlags {
    pub casts_shadow: bool,
    pub alpha_blended: bool,
    pub illumination_map: bool,
    pub scenery: bool,
    pub selectable: bool,
}

/// A loaded model type: parts, skeleton, bounds and classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAsset {
    pub name: String,
    pub parts: Vec<MeshPartAsset>,
    pub bones: Vec<BoneAsset>,
    #[serde(default)]
    pub bounds: BoundingSphere,
    #[serde(default)]
    pub flags: ModelFlags,
    /// Content authored Z-up; rotation requests swap the Y and Z axes.
    #[serde(default)]
    pub alternate_up_axis: bool,
}

impl ModelAsset {
    /// A single-bone asset with one part per name, all attached to the root.
    pub fn with_parts(name: impl Into<String>, part_names: &[&str]) -> Self {
        Self {
            name: name.into(),
            parts: part_names
                .iter()
                .map(|part| MeshPartAsset {
                    name: (*part).to_string(),
                    bone: 0,
                    mesh: None,
                })
                .collect(),
            bones: vec![BoneAsset {
                name: "Root".into(),
                parent: None,
                local: Mat4::IDENTITY,
            }],
            bounds: BoundingSphere::new(Vec3::ZERO, 1.0),
            flags: ModelFlags::default(),
            alternate_up_axis: false,
        }
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    /// Check the structural rules the instancing core relies on: at least
    /// one part and one bone, parents before children, parts on real bones.
    pub fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: String| AssetError::InvalidModel {
            name: self.name.clone(),
            reason,
        };

        if self.parts.is_empty() {
            return Err(invalid("model has no mesh parts".into()));
        }
        if self.bones.is_empty() {
            return Err(invalid("model has no bones".into()));
        }
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(invalid(format!(
                        "bone {} ({index}) has parent {parent} that does not precede it",
                        bone.name
                    )));
                }
            }
        }
        for part in &self.parts {
            if part.bone >= self.bones.len() {
                return Err(invalid(format!(
                    "part {} references missing bone {}",
                    part.name, part.bone
                )));
            }
        }
        if self.bounds.radius.is_nan() || self.bounds.radius <= 0.0 {
            return Err(invalid("bounding radius must be positive".into()));
        }
        Ok(())
    }
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}
