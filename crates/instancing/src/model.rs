use glam::Mat4;
use skirmish_assets::{MeshData, ModelAsset, ModelFlags};
use skirmish_common::{BoundingSphere, InstanceKey, ItemType};
use std::collections::BTreeMap;

use crate::bones::{BoneTransformResolver, RotationAxis, Skeleton};
use crate::broker::{BufferRequest, ChangeRequestBroker};
use crate::change_request::{ChangeRequest, PartType};
use crate::error::{InstancingError, InstancingResult};
use crate::part::{DrainStats, InstancedModelPart};
use crate::record::InstanceRecord;

/// Whether `name` follows the explosion-piece convention `<prefix><digits>`.
pub fn is_explosion_part(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// One loaded model type: its parts, skeleton and live instance transforms.
///
/// # Invariants
/// - Normal parts come first, explosion pieces last. Index 0 is a normal
///   part whenever the model has one.
/// - Every part receives a request for every flushed instance, so the
///   "all" lists of all parts agree on which instances exist.
#[derive(Debug)]
pub struct InstancedModel {
    item_type: ItemType,
    name: String,
    parts: Vec<InstancedModelPart>,
    meshes: Vec<Option<MeshData>>,
    normal_part_keys: Vec<usize>,
    explosion_part_keys: Vec<usize>,
    bones: BoneTransformResolver,
    bounds: BoundingSphere,
    flags: ModelFlags,
    broker: ChangeRequestBroker,
    transforms: BTreeMap<InstanceKey, Mat4>,
}

impl InstancedModel {
    pub fn from_asset(item_type: ItemType, asset: &ModelAsset, explosion_prefix: &str) -> InstancingResult<Self> {
        asset.validate()?;
        if asset.parts.is_empty() {
            return Err(InstancingError::EmptyModel(asset.name.clone()));
        }
        let skeleton = Skeleton::from_assets(&asset.bones)?;

        let (explosion, normal): (Vec<_>, Vec<_>) = asset
            .parts
            .iter()
            .partition(|part| is_explosion_part(&part.name, explosion_prefix));

        let mut parts = Vec::with_capacity(asset.parts.len());
        let mut meshes = Vec::with_capacity(asset.parts.len());
        for part in &normal {
            parts.push(InstancedModelPart::new(&part.name, part.bone, PartType::Normal));
            meshes.push(part.mesh.clone());
        }
        for part in &explosion {
            parts.push(InstancedModelPart::new(&part.name, part.bone, PartType::Explosion));
            meshes.push(part.mesh.clone());
        }

        tracing::debug!(
            model = %asset.name,
            %item_type,
            normal = normal.len(),
            explosion = explosion.len(),
            bones = skeleton.len(),
            "model type ready"
        );

        Ok(Self {
            item_type,
            name: asset.name.clone(),
            normal_part_keys: (0..normal.len()).collect(),
            explosion_part_keys: (normal.len()..parts.len()).collect(),
            parts,
            meshes,
            bones: BoneTransformResolver::new(skeleton, asset.alternate_up_axis),
            bounds: asset.bounds,
            flags: asset.flags,
            broker: ChangeRequestBroker::default(),
            transforms: BTreeMap::new(),
        })
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[InstancedModelPart] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&InstancedModelPart> {
        self.parts.get(index)
    }

    pub fn part_index(&self, name: &str) -> Option<usize> {
        self.parts.iter().position(|part| part.name() == name)
    }

    /// Geometry for a part, in part order.
    pub fn mesh(&self, index: usize) -> Option<&MeshData> {
        self.meshes.get(index).and_then(Option::as_ref)
    }

    pub fn normal_part_keys(&self) -> &[usize] {
        &self.normal_part_keys
    }

    pub fn explosion_part_keys(&self) -> &[usize] {
        &self.explosion_part_keys
    }

    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    pub fn flags(&self) -> ModelFlags {
        self.flags
    }

    pub fn is_alternate_up_axis(&self) -> bool {
        self.bones.is_alternate_up()
    }

    pub fn bones(&self) -> &BoneTransformResolver {
        &self.bones
    }

    pub fn broker(&self) -> &ChangeRequestBroker {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut ChangeRequestBroker {
        &mut self.broker
    }

    /// Record the instance's current world matrix.
    pub fn track(&mut self, key: InstanceKey, world: Mat4) {
        self.transforms.insert(key, world);
    }

    pub fn world(&self, key: InstanceKey) -> Option<Mat4> {
        self.transforms.get(&key).copied()
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceKey, &Mat4)> + '_ {
        self.transforms.iter().map(|(key, world)| (*key, world))
    }

    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }

    /// Rotate a bone of one instance. Returns false for an unknown bone or an
    /// unchanged angle.
    pub fn set_bone_rotation(&mut self, key: InstanceKey, bone: &str, axis: RotationAxis, angle: f32) -> bool {
        let Some(index) = self.bones.skeleton().find(bone) else {
            return false;
        };
        self.bones.set_rotation(key, index, axis, angle)
    }

    pub fn set_adjusting_transform(&mut self, key: InstanceKey, bone: &str, transform: Mat4) -> bool {
        let Some(index) = self.bones.skeleton().find(bone) else {
            return false;
        };
        self.bones.set_adjusting_transform(key, index, transform)
    }

    /// One `AddOrUpdate` per part for this instance, each carrying the
    /// part's bone-composed world matrix.
    pub fn emit_instance(&mut self, record: &InstanceRecord) -> Vec<BufferRequest> {
        let key = record.key;
        let world = record.transform.to_matrix();
        self.transforms.insert(key, world);
        let absolute = self.bones.resolve(key);

        self.parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let bone = absolute.get(part.bone()).copied().unwrap_or(Mat4::IDENTITY);
                BufferRequest {
                    part: index,
                    key,
                    request: ChangeRequest::add_or_update(
                        world * bone,
                        record.payload_for(index, part.part_type()),
                        part.part_type(),
                    ),
                }
            })
            .collect()
    }

    pub fn emit_delete_culled(&self, key: InstanceKey) -> Vec<BufferRequest> {
        self.emit_to_all_parts(key, ChangeRequest::delete_culled())
    }

    fn emit_to_all_parts(&self, key: InstanceKey, request: ChangeRequest) -> Vec<BufferRequest> {
        (0..self.parts.len())
            .map(|part| BufferRequest { part, key, request })
            .collect()
    }

    pub fn commit(&mut self, requests: Vec<BufferRequest>) -> usize {
        requests
            .into_iter()
            .filter_map(|request| request.commit(&mut self.parts))
            .count()
    }

    /// Emit `DeleteAllParts` into every part and forget the instance.
    pub fn remove_instance(&mut self, key: InstanceKey) {
        let requests = self.emit_to_all_parts(key, ChangeRequest::delete_all_parts());
        self.commit(requests);
        self.bones.remove(key);
        self.transforms.remove(&key);
        self.broker.note_removed(key);
    }

    /// Emit `DeleteAll` into every part and forget every instance.
    pub fn clear_all(&mut self) {
        let requests = self.emit_to_all_parts(InstanceKey(0), ChangeRequest::delete_all());
        self.commit(requests);
        self.bones.clear();
        self.transforms.clear();
        self.broker.reset();
    }

    /// Turn this frame's pending refreshes into part requests. Returns the
    /// number of requests entered.
    pub fn flush(&mut self, records: &BTreeMap<InstanceKey, InstanceRecord>) -> usize {
        let pending = self.broker.take_pending();
        let mut entered = 0;
        for key in pending {
            let Some(record) = records.get(&key) else {
                tracing::debug!(model = %self.name, %key, "pending refresh without record");
                continue;
            };
            let requests = self.emit_instance(record);
            entered += self.commit(requests);
        }
        entered
    }

    pub fn swap(&mut self) {
        for part in &mut self.parts {
            part.swap();
        }
    }

    pub fn process_double_buffers(&mut self, elapsed: f32) -> DrainStats {
        let mut stats = DrainStats::default();
        for part in &mut self.parts {
            stats.merge(part.process_double_buffers(elapsed));
        }
        stats
    }

    /// Instances in the culled list of the first part.
    pub fn visible_count(&self) -> usize {
        self.parts.first().map_or(0, |part| part.culled().len())
    }
}
