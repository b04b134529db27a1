use glam::{Mat4, Vec3};
use skirmish_assets::{AssetSource, ModelCatalog, ModelLoader};
use skirmish_common::{Camera, InstanceKey, ItemType, MaterialId, PlayerNumber, Transform};
use skirmish_terrain::{Ray, TerrainIndex};
use std::collections::{BTreeMap, VecDeque};

use crate::bones::RotationAxis;
use crate::config::RegistryConfig;
use crate::culling::{CullEntry, CullJob, CullOutcome, CullingScan};
use crate::error::{InstancingError, InstancingResult};
use crate::model::InstancedModel;
use crate::part::DrainStats;
use crate::record::InstanceRecord;
use crate::worker::CullingWorker;

/// Load state of one model type.
#[derive(Debug)]
pub enum ModelTypeSlot {
    Loading { attempts: u32 },
    Ready(Box<InstancedModel>),
    Failed,
}

impl ModelTypeSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelTypeSlot::Ready(_))
    }
}

/// Model types grouped by how the draw step treats them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyLists {
    pub shadow_casters: Vec<ItemType>,
    pub alpha_blended: Vec<ItemType>,
    pub illumination_mapped: Vec<ItemType>,
    pub selectable: Vec<ItemType>,
    pub scenery: Vec<ItemType>,
    /// Every ready type, in load order.
    pub ready: Vec<ItemType>,
}

impl KeyLists {
    fn classify(&mut self, model: &InstancedModel) {
        let item_type = model.item_type();
        let flags = model.flags();
        for (enabled, list) in [
            (true, &mut self.ready),
            (flags.casts_shadow, &mut self.shadow_casters),
            (flags.alpha_blended, &mut self.alpha_blended),
            (flags.illumination_map, &mut self.illumination_mapped),
            (flags.selectable, &mut self.selectable),
            (flags.scenery, &mut self.scenery),
        ] {
            if enabled && !list.contains(&item_type) {
                list.push(item_type);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub retried: usize,
    pub failed: usize,
}

/// What one `update_frame` did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub loads: LoadReport,
    pub culled: bool,
    pub became_visible: usize,
    pub became_hidden: usize,
    pub requests_flushed: usize,
    pub swapped: bool,
    pub drain: DrainStats,
    pub instances: usize,
    pub visible_instances: usize,
}

/// The owning context of the instancing pipeline.
///
/// Gameplay code mutates instances through the registry; once per frame
/// [`update_frame`](Self::update_frame) turns those mutations into change
/// requests, swaps every part's double buffer exactly once and drains the
/// prior slots into the draw lists.
///
/// # Invariants
/// - A model-type slot is created at most once per session; loads never block.
/// - Instance keys are never reused.
/// - Buffers swap at most once per frame and always before the drain.
pub struct InstanceRegistry {
    config: RegistryConfig,
    catalog: ModelCatalog,
    loader: Box<dyn ModelLoader>,
    terrain: Option<Box<dyn TerrainIndex>>,
    slots: Vec<Option<ModelTypeSlot>>,
    records: BTreeMap<InstanceKey, InstanceRecord>,
    load_queue: VecDeque<ItemType>,
    key_lists: KeyLists,
    scan: CullingScan,
    next_key: u64,
    frame: u64,
    swapped_frame: Option<u64>,
    culled_generation: Option<u64>,
    moved_since_cull: bool,
    cull_in_flight: bool,
}

fn ready_model(slots: &[Option<ModelTypeSlot>], item_type: ItemType) -> InstancingResult<&InstancedModel> {
    match slots.get(item_type.index()) {
        Some(Some(ModelTypeSlot::Ready(model))) => Ok(model),
        Some(Some(ModelTypeSlot::Failed)) => Err(InstancingError::TypeFailed(item_type)),
        _ => Err(InstancingError::TypeNotReady(item_type)),
    }
}

fn ready_model_mut(
    slots: &mut [Option<ModelTypeSlot>],
    item_type: ItemType,
) -> InstancingResult<&mut InstancedModel> {
    match slots.get_mut(item_type.index()) {
        Some(Some(ModelTypeSlot::Ready(model))) => Ok(model),
        Some(Some(ModelTypeSlot::Failed)) => Err(InstancingError::TypeFailed(item_type)),
        _ => Err(InstancingError::TypeNotReady(item_type)),
    }
}

fn check_type(record: &InstanceRecord, item_type: ItemType) -> InstancingResult<()> {
    if record.item_type != item_type {
        return Err(InstancingError::TypeMismatch {
            key: record.key,
            expected: item_type,
            found: record.item_type,
        });
    }
    Ok(())
}

impl InstanceRegistry {
    pub fn new(config: RegistryConfig, catalog: ModelCatalog, loader: Box<dyn ModelLoader>) -> Self {
        let scan = CullingScan::new(config.culling.clone());
        Self {
            config,
            catalog,
            loader,
            terrain: None,
            slots: Vec::new(),
            records: BTreeMap::new(),
            load_queue: VecDeque::new(),
            key_lists: KeyLists::default(),
            scan,
            next_key: 1,
            frame: 0,
            swapped_frame: None,
            culled_generation: None,
            moved_since_cull: false,
            cull_in_flight: false,
        }
    }

    pub fn with_terrain(mut self, terrain: Box<dyn TerrainIndex>) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn allocate_instance_key(&mut self) -> InstanceKey {
        let key = InstanceKey(self.next_key);
        self.next_key += 1;
        key
    }

    // --- model types ---

    /// Ensure a slot exists for `item_type`, queueing a load if it is new.
    pub fn register_type(&mut self, item_type: ItemType) -> &ModelTypeSlot {
        let index = item_type.index();
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        let slot = &mut self.slots[index];
        if slot.is_none() {
            tracing::debug!(%item_type, "queueing model load");
            self.load_queue.push_back(item_type);
        }
        slot.get_or_insert(ModelTypeSlot::Loading { attempts: 0 })
    }

    pub fn slot(&self, item_type: ItemType) -> Option<&ModelTypeSlot> {
        self.slots.get(item_type.index()).and_then(Option::as_ref)
    }

    pub fn model(&self, item_type: ItemType) -> Option<&InstancedModel> {
        ready_model(&self.slots, item_type).ok()
    }

    /// Ready models in load order.
    pub fn models(&self) -> impl Iterator<Item = &InstancedModel> + '_ {
        self.key_lists
            .ready
            .iter()
            .filter_map(|item_type| ready_model(&self.slots, *item_type).ok())
    }

    pub fn pending_loads(&self) -> usize {
        self.load_queue.len()
    }

    /// Pump up to `loads_per_frame` load attempts.
    pub fn process_loads(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        for _ in 0..self.config.loads_per_frame {
            let Some(item_type) = self.load_queue.pop_front() else {
                break;
            };
            let attempts = match self.slots.get(item_type.index()) {
                Some(Some(ModelTypeSlot::Loading { attempts })) => *attempts,
                _ => continue,
            };
            let next = self.attempt_load(item_type, attempts);
            match &next {
                ModelTypeSlot::Ready(model) => {
                    self.key_lists.classify(model);
                    report.loaded += 1;
                }
                ModelTypeSlot::Loading { .. } => {
                    self.load_queue.push_back(item_type);
                    report.retried += 1;
                }
                ModelTypeSlot::Failed => report.failed += 1,
            }
            self.slots[item_type.index()] = Some(next);
        }
        report
    }

    fn attempt_load(&mut self, item_type: ItemType, attempts: u32) -> ModelTypeSlot {
        let Some(path) = self.catalog.path(item_type) else {
            tracing::warn!(%item_type, "no catalog entry, giving up");
            return ModelTypeSlot::Failed;
        };
        let source = if attempts < self.config.load_retry_limit {
            AssetSource::Primary
        } else if self.config.use_fallback {
            AssetSource::Fallback
        } else {
            tracing::warn!(%item_type, path, attempts, "model failed to load");
            return ModelTypeSlot::Failed;
        };

        let loaded = self.loader.load(path, source).map_err(InstancingError::from).and_then(|asset| {
            InstancedModel::from_asset(item_type, &asset, &self.config.explosion_part_prefix)
        });
        match loaded {
            Ok(model) => ModelTypeSlot::Ready(Box::new(model)),
            Err(err) if source == AssetSource::Fallback => {
                tracing::warn!(%item_type, path, error = %err, "model failed to load from fallback");
                ModelTypeSlot::Failed
            }
            Err(err) => {
                tracing::debug!(%item_type, path, attempt = attempts + 1, error = %err, "model load failed, will retry");
                ModelTypeSlot::Loading {
                    attempts: attempts + 1,
                }
            }
        }
    }

    pub fn key_lists(&self) -> &KeyLists {
        &self.key_lists
    }

    pub fn shadow_casters(&self) -> &[ItemType] {
        &self.key_lists.shadow_casters
    }

    pub fn alpha_blended(&self) -> &[ItemType] {
        &self.key_lists.alpha_blended
    }

    pub fn illumination_mapped(&self) -> &[ItemType] {
        &self.key_lists.illumination_mapped
    }

    pub fn selectable(&self) -> &[ItemType] {
        &self.key_lists.selectable
    }

    pub fn scenery(&self) -> &[ItemType] {
        &self.key_lists.scenery
    }

    // --- instances ---

    pub fn record(&self, key: InstanceKey) -> Option<&InstanceRecord> {
        self.records.get(&key)
    }

    pub fn instance_count(&self) -> usize {
        self.records.len()
    }

    /// The record for `key`, created with defaults on first access. Direct
    /// edits are not seen by the draw lists until
    /// [`request_refresh`](Self::request_refresh) is called.
    pub fn instance_record_mut(&mut self, item_type: ItemType, key: InstanceKey) -> InstancingResult<&mut InstanceRecord> {
        let model = ready_model_mut(&mut self.slots, item_type)?;
        model.broker_mut().reject_if_removed(key)?;
        let next_key = &mut self.next_key;
        let record = self.records.entry(key).or_insert_with(|| {
            // Keys chosen by the caller still advance the allocator.
            *next_key = (*next_key).max(key.0 + 1);
            model.track(key, Mat4::IDENTITY);
            InstanceRecord::new(key, item_type)
        });
        check_type(record, item_type)?;
        Ok(record)
    }

    pub fn request_refresh(&mut self, item_type: ItemType, key: InstanceKey) -> InstancingResult<()> {
        let model = ready_model_mut(&mut self.slots, item_type)?;
        if let Some(record) = self.records.get(&key) {
            check_type(record, item_type)?;
        }
        model.broker_mut().request_refresh(key)
    }

    /// Apply `edit` to the instance's record and schedule a refresh.
    fn mutate<R>(
        &mut self,
        item_type: ItemType,
        key: InstanceKey,
        edit: impl FnOnce(&mut InstanceRecord) -> R,
    ) -> InstancingResult<R> {
        let record = self.instance_record_mut(item_type, key)?;
        let result = edit(record);
        self.request_refresh(item_type, key)?;
        Ok(result)
    }

    /// Upsert an instance at `transform`. Scenery is re-filed in the terrain
    /// index when it crosses a cell boundary.
    pub fn update_instance_transform(
        &mut self,
        item_type: ItemType,
        key: InstanceKey,
        transform: Transform,
        player: PlayerNumber,
    ) -> InstancingResult<()> {
        let is_scenery = ready_model(&self.slots, item_type)?.flags().scenery;
        let record = self.instance_record_mut(item_type, key)?;
        record.transform = transform;
        record.player = player;
        let previous_cell = record.cell;

        if is_scenery {
            if let Some(terrain) = self.terrain.as_deref_mut() {
                let cell = terrain.find_cell_for_ray(&Ray::downward_through(transform.position));
                if cell != previous_cell {
                    if let Some(old) = previous_cell {
                        terrain.disconnect_from_cell(old, key);
                    }
                    if let Some(new) = cell {
                        terrain.connect_to_cell(new, key);
                    }
                    if let Some(record) = self.records.get_mut(&key) {
                        record.cell = cell;
                    }
                    tracing::trace!(%key, ?previous_cell, ?cell, "scenery re-filed");
                }
            }
        }

        let model = ready_model_mut(&mut self.slots, item_type)?;
        model.track(key, transform.to_matrix());
        model.broker_mut().request_refresh(key)?;
        self.moved_since_cull = true;
        Ok(())
    }

    /// Remove an instance from every part. Returns false when it was not
    /// live, so repeated calls are harmless.
    pub fn remove_instance(&mut self, item_type: ItemType, key: InstanceKey) -> InstancingResult<bool> {
        let model = ready_model_mut(&mut self.slots, item_type)?;
        let Some(record) = self.records.get(&key) else {
            return Ok(false);
        };
        check_type(record, item_type)?;
        let cell = record.cell;
        self.records.remove(&key);

        model.remove_instance(key);
        if let (Some(cell), Some(terrain)) = (cell, self.terrain.as_deref_mut()) {
            terrain.disconnect_from_cell(cell, key);
        }
        tracing::trace!(%item_type, %key, "instance removed");
        Ok(true)
    }

    pub fn query_in_camera_view(&self, item_type: ItemType, key: InstanceKey) -> InstancingResult<bool> {
        ready_model(&self.slots, item_type)?;
        match self.records.get(&key) {
            Some(record) => {
                check_type(record, item_type)?;
                Ok(record.in_frustum)
            }
            None => Ok(false),
        }
    }

    pub fn set_player_number(&mut self, item_type: ItemType, key: InstanceKey, player: PlayerNumber) -> InstancingResult<()> {
        self.mutate(item_type, key, |record| record.player = player)
    }

    pub fn set_material_override(&mut self, item_type: ItemType, key: InstanceKey, material: MaterialId) -> InstancingResult<()> {
        self.mutate(item_type, key, |record| record.material = material)
    }

    /// Draw only the named part of this instance, or every part with `None`.
    /// Returns false for an unknown part name.
    pub fn set_restrict_to_part(&mut self, item_type: ItemType, key: InstanceKey, part: Option<&str>) -> InstancingResult<bool> {
        let index = match part {
            Some(name) => match ready_model(&self.slots, item_type)?.part_index(name) {
                Some(index) => Some(index),
                None => return Ok(false),
            },
            None => None,
        };
        self.mutate(item_type, key, |record| record.restrict_to_part = index)?;
        Ok(true)
    }

    pub fn set_flash(&mut self, item_type: ItemType, key: InstanceKey, flash: bool) -> InstancingResult<()> {
        self.mutate(item_type, key, |record| record.flash = flash)
    }

    /// Switch the instance to its explosion pieces, which drift at `velocity`.
    pub fn set_explode(&mut self, item_type: ItemType, key: InstanceKey, explode: bool, velocity: Vec3) -> InstancingResult<()> {
        self.mutate(item_type, key, |record| {
            record.explode = explode;
            record.velocity = velocity;
        })
    }

    /// Rotate a bone. `Ok(false)` means the bone does not exist or the angle
    /// did not change; nothing is scheduled in that case.
    pub fn set_bone_rotation(
        &mut self,
        item_type: ItemType,
        key: InstanceKey,
        bone: &str,
        axis: RotationAxis,
        angle: f32,
    ) -> InstancingResult<bool> {
        self.instance_record_mut(item_type, key)?;
        let model = ready_model_mut(&mut self.slots, item_type)?;
        if !model.set_bone_rotation(key, bone, axis, angle) {
            return Ok(false);
        }
        model.broker_mut().request_refresh(key)?;
        Ok(true)
    }

    pub fn set_adjusting_transform(
        &mut self,
        item_type: ItemType,
        key: InstanceKey,
        bone: &str,
        transform: Mat4,
    ) -> InstancingResult<bool> {
        self.instance_record_mut(item_type, key)?;
        let model = ready_model_mut(&mut self.slots, item_type)?;
        if !model.set_adjusting_transform(key, bone, transform) {
            return Ok(false);
        }
        model.broker_mut().request_refresh(key)?;
        Ok(true)
    }

    // --- frame steps ---

    /// Turn every model's pending refreshes into part requests.
    pub fn flush_pending(&mut self) -> usize {
        let records = &self.records;
        self.slots
            .iter_mut()
            .filter_map(|slot| match slot {
                Some(ModelTypeSlot::Ready(model)) => Some(model.flush(records)),
                _ => None,
            })
            .sum()
    }

    /// Snapshot every live instance for a culling scan.
    pub fn cull_job(&self, camera: &dyn Camera) -> CullJob {
        let mut entries = Vec::with_capacity(self.records.len());
        for model in self.models() {
            let bounds = model.bounds();
            for (key, world) in model.instances() {
                let was_visible = self.records.get(&key).is_some_and(|r| r.in_frustum);
                entries.push(CullEntry {
                    item_type: model.item_type(),
                    key,
                    world: *world,
                    bounds,
                    was_visible,
                });
            }
        }
        CullJob {
            generation: camera.generation(),
            frustum: Some(camera.frustum()),
            entries,
        }
    }

    /// Scan synchronously on the calling thread.
    pub fn run_culling(&mut self, camera: &dyn Camera) -> CullOutcome {
        let _span = tracing::info_span!("culling").entered();
        let job = self.cull_job(camera);
        let outcome = self.scan.evaluate(&job, None);
        self.culled_generation = Some(job.generation);
        self.moved_since_cull = false;
        outcome
    }

    /// Apply visibility flips from a scan. Hidden instances leave the culled
    /// lists right away; shown ones are refreshed at the next flush. Entries
    /// for instances removed since the snapshot are ignored.
    pub fn apply_visibility(&mut self, outcome: &CullOutcome) -> usize {
        let mut applied = 0;
        for change in &outcome.changes {
            let Some(record) = self.records.get_mut(&change.key) else {
                tracing::debug!(key = %change.key, "visibility for removed instance ignored");
                continue;
            };
            if record.item_type != change.item_type || record.in_frustum == change.visible {
                continue;
            }
            let Ok(model) = ready_model_mut(&mut self.slots, change.item_type) else {
                continue;
            };
            record.in_frustum = change.visible;
            if change.visible {
                if model.broker_mut().request_refresh(change.key).is_err() {
                    continue;
                }
            } else {
                let requests = model.emit_delete_culled(change.key);
                model.commit(requests);
            }
            applied += 1;
        }
        applied
    }

    /// Flip every part's buffers. Only the first call per frame swaps.
    pub fn swap_buffers(&mut self) -> bool {
        if self.swapped_frame == Some(self.frame) {
            tracing::debug!(frame = self.frame, "buffers already swapped this frame");
            return false;
        }
        for slot in self.slots.iter_mut().flatten() {
            if let ModelTypeSlot::Ready(model) = slot {
                model.swap();
            }
        }
        self.swapped_frame = Some(self.frame);
        true
    }

    pub fn process_double_buffers(&mut self, elapsed: f32) -> DrainStats {
        let mut stats = DrainStats::default();
        for slot in self.slots.iter_mut().flatten() {
            if let ModelTypeSlot::Ready(model) = slot {
                stats.merge(model.process_double_buffers(elapsed));
            }
        }
        stats
    }

    fn needs_cull(&self, camera: &dyn Camera) -> bool {
        self.moved_since_cull || self.culled_generation != Some(camera.generation())
    }

    fn note_cull(&mut self, outcome: &CullOutcome, stats: &mut FrameStats) {
        self.apply_visibility(outcome);
        stats.culled = true;
        stats.became_visible = outcome.stats.became_visible;
        stats.became_hidden = outcome.stats.became_hidden;
    }

    /// One full frame: loads, culling (when the camera or an instance moved),
    /// flush, swap, drain, then [`end_frame`](Self::end_frame).
    pub fn update_frame(&mut self, camera: &dyn Camera, elapsed: f32) -> FrameStats {
        let _span = tracing::info_span!("instancing_frame", frame = self.frame).entered();
        let mut stats = FrameStats {
            frame: self.frame,
            loads: self.process_loads(),
            ..FrameStats::default()
        };

        // Any background scan still out is superseded.
        self.cull_in_flight = false;
        if self.needs_cull(camera) {
            let outcome = self.run_culling(camera);
            self.note_cull(&outcome, &mut stats);
        }

        self.finish_frame(elapsed, stats)
    }

    /// Like [`update_frame`](Self::update_frame), but scans run on `worker`.
    ///
    /// Finished outcomes are applied first. A new snapshot is submitted only
    /// once the previous one has come back, so an outcome never reports
    /// transitions against visibility that has already been overwritten.
    pub fn update_frame_with_worker(&mut self, worker: &CullingWorker, camera: &dyn Camera, elapsed: f32) -> FrameStats {
        let _span = tracing::info_span!("instancing_frame", frame = self.frame).entered();
        let mut stats = FrameStats {
            frame: self.frame,
            loads: self.process_loads(),
            ..FrameStats::default()
        };

        if let Some(outcome) = worker.latest() {
            self.cull_in_flight = false;
            self.note_cull(&outcome, &mut stats);
        }
        if !self.cull_in_flight && self.needs_cull(camera) {
            let job = self.cull_job(camera);
            let generation = job.generation;
            if worker.submit(job) {
                self.cull_in_flight = true;
                self.culled_generation = Some(generation);
                self.moved_since_cull = false;
            }
        }

        self.finish_frame(elapsed, stats)
    }

    fn finish_frame(&mut self, elapsed: f32, mut stats: FrameStats) -> FrameStats {
        stats.requests_flushed = self.flush_pending();
        stats.swapped = self.swap_buffers();
        stats.drain = self.process_double_buffers(elapsed);
        stats.instances = self.records.len();
        stats.visible_instances = self.records.values().filter(|r| r.in_frustum).count();
        self.end_frame();

        tracing::trace!(
            flushed = stats.requests_flushed,
            applied = stats.drain.applied,
            visible = stats.visible_instances,
            "frame complete"
        );
        stats
    }

    /// Close the frame: allow the next swap and forget this frame's removals.
    pub fn end_frame(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            if let ModelTypeSlot::Ready(model) = slot {
                model.broker_mut().end_frame();
            }
        }
        self.frame += 1;
    }

    /// Drop every instance, keeping the loaded model types.
    pub fn clear_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            if let ModelTypeSlot::Ready(model) = slot {
                model.clear_all();
            }
        }
        if let Some(terrain) = self.terrain.as_deref_mut() {
            for record in self.records.values() {
                if let Some(cell) = record.cell {
                    terrain.disconnect_from_cell(cell, record.key);
                }
            }
        }
        tracing::debug!(instances = self.records.len(), "clearing all instances");
        self.records.clear();
        self.moved_since_cull = true;
    }

    /// Drop every instance and every model type, ready for a new level.
    pub fn unload_level(&mut self) {
        self.clear_all();
        self.slots.clear();
        self.load_queue.clear();
        self.key_lists = KeyLists::default();
        self.culled_generation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CullingConfig;
    use skirmish_assets::{InMemoryLoader, ModelAsset, samples};
    use skirmish_common::FixedCamera;
    use skirmish_terrain::{CellCoord, TerrainGrid};
    use std::sync::{Arc, Mutex};

    const DT: f32 = 1.0 / 60.0;

    fn camera() -> FixedCamera {
        FixedCamera::looking_at(Vec3::new(0.0, 30.0, 60.0), Vec3::ZERO, 60f32.to_radians(), 16.0 / 9.0)
    }

    fn ready_registry() -> InstanceRegistry {
        let (catalog, loader) = samples::sample_library();
        let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(loader));
        for item_type in [samples::TANK, samples::TREE, samples::OUTPOST] {
            registry.register_type(item_type);
        }
        registry.process_loads();
        registry
    }

    fn spawn(registry: &mut InstanceRegistry, item_type: ItemType, x: f32) -> InstanceKey {
        let key = registry.allocate_instance_key();
        registry
            .update_instance_transform(item_type, key, Transform::from_position(Vec3::new(x, 0.0, 0.0)), PlayerNumber(1))
            .unwrap();
        key
    }

    fn tank(registry: &InstanceRegistry) -> &InstancedModel {
        registry.model(samples::TANK).unwrap()
    }

    /// Loader whose attempts can be inspected after it moves into the registry.
    struct SharedLoader(Arc<Mutex<InMemoryLoader>>);

    impl ModelLoader for SharedLoader {
        fn load(&mut self, path: &str, source: AssetSource) -> Result<ModelAsset, skirmish_assets::AssetError> {
            self.0.lock().unwrap().load(path, source)
        }
    }

    #[test]
    fn register_is_idempotent_and_non_blocking() {
        let (catalog, loader) = samples::sample_library();
        let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(loader));
        assert!(matches!(registry.register_type(samples::TANK), ModelTypeSlot::Loading { attempts: 0 }));
        registry.register_type(samples::TANK);
        assert_eq!(registry.pending_loads(), 1);

        let report = registry.process_loads();
        assert_eq!(report.loaded, 1);
        assert!(registry.register_type(samples::TANK).is_ready());
        assert_eq!(registry.pending_loads(), 0);
    }

    #[test]
    fn key_lists_follow_flags() {
        let registry = ready_registry();
        assert_eq!(registry.scenery(), &[samples::TREE, samples::OUTPOST]);
        assert_eq!(registry.alpha_blended(), &[samples::TREE]);
        assert_eq!(registry.illumination_mapped(), &[samples::OUTPOST]);
        assert_eq!(registry.selectable(), &[samples::TANK, samples::OUTPOST]);
        assert_eq!(registry.shadow_casters().len(), 3);
    }

    #[test]
    fn transient_failures_retry_then_fall_back() {
        let mut inner = InMemoryLoader::new();
        inner.insert_fallback("units/tank", samples::tank());
        let shared = Arc::new(Mutex::new(inner));
        let mut catalog = ModelCatalog::new();
        catalog.insert(samples::TANK, "units/tank");
        let mut registry =
            InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(SharedLoader(Arc::clone(&shared))));

        registry.register_type(samples::TANK);
        let first = registry.process_loads();
        // One pump retries within the same call until the queue empties or the budget runs out.
        assert!(first.retried >= 1);
        while registry.pending_loads() > 0 {
            registry.process_loads();
        }
        assert!(registry.slot(samples::TANK).unwrap().is_ready());

        let attempts: Vec<_> = shared.lock().unwrap().attempts().iter().map(|(_, s)| *s).collect();
        assert_eq!(attempts, vec![AssetSource::Primary, AssetSource::Primary, AssetSource::Fallback]);
    }

    #[test]
    fn permanent_failure_marks_slot_failed() {
        let mut catalog = ModelCatalog::new();
        catalog.insert(ItemType(4), "missing");
        let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(InMemoryLoader::new()));
        registry.register_type(ItemType(4));
        let report = registry.process_loads();
        assert_eq!(report.failed, 1);
        assert!(matches!(registry.slot(ItemType(4)), Some(ModelTypeSlot::Failed)));

        let err = registry
            .update_instance_transform(ItemType(4), InstanceKey(1), Transform::default(), PlayerNumber(0))
            .unwrap_err();
        assert!(matches!(err, InstancingError::TypeFailed(_)));
    }

    #[test]
    fn no_fallback_gives_up_after_retries() {
        let config = RegistryConfig {
            use_fallback: false,
            load_retry_limit: 3,
            ..RegistryConfig::default()
        };
        let mut catalog = ModelCatalog::new();
        catalog.insert(samples::TANK, "units/tank");
        let mut registry = InstanceRegistry::new(config, catalog, Box::new(InMemoryLoader::new()));
        registry.register_type(samples::TANK);
        let report = registry.process_loads();
        assert_eq!(report.retried, 3);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn operations_on_unloaded_type_are_rejected() {
        let (catalog, loader) = samples::sample_library();
        let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(loader));
        registry.register_type(samples::TANK);

        let key = registry.allocate_instance_key();
        let err = registry
            .update_instance_transform(samples::TANK, key, Transform::default(), PlayerNumber(0))
            .unwrap_err();
        assert!(matches!(err, InstancingError::TypeNotReady(t) if t == samples::TANK));
        assert!(registry.remove_instance(ItemType(99), key).is_err());
        assert!(registry.query_in_camera_view(samples::TANK, key).is_err());
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn keys_are_monotonic() {
        let mut registry = ready_registry();
        let a = registry.allocate_instance_key();
        let b = registry.allocate_instance_key();
        assert!(b > a);
        registry.unload_level();
        assert!(registry.allocate_instance_key() > b);
    }

    #[test]
    fn scenario_a_add_and_render() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);

        let stats = registry.update_frame(&camera, DT);
        assert!(stats.swapped);
        assert_eq!(stats.requests_flushed, 5);

        let model = tank(&registry);
        for index in model.normal_part_keys() {
            assert!(model.parts()[*index].culled().contains_key(&key));
        }
        for index in model.explosion_part_keys() {
            assert!(model.parts()[*index].all().contains_key(&key));
            assert!(model.parts()[*index].exploding().is_empty());
        }
        assert!(registry.query_in_camera_view(samples::TANK, key).unwrap());
    }

    #[test]
    fn scenario_b_culling_keeps_existence() {
        let mut registry = ready_registry();
        let camera = camera();
        let near = spawn(&mut registry, samples::TANK, 0.0);
        let far = spawn(&mut registry, samples::TANK, 5000.0);

        let stats = registry.update_frame(&camera, DT);
        assert_eq!(stats.became_hidden, 1);

        let hull = &tank(&registry).parts()[0];
        assert!(hull.culled().contains_key(&near));
        assert!(!hull.culled().contains_key(&far));
        assert!(hull.all().contains_key(&far));
        assert!(!registry.query_in_camera_view(samples::TANK, far).unwrap());

        // Move it into view: it comes back into the culled list.
        registry
            .update_instance_transform(samples::TANK, far, Transform::from_position(Vec3::new(3.0, 0.0, 0.0)), PlayerNumber(1))
            .unwrap();
        let stats = registry.update_frame(&camera, DT);
        assert_eq!(stats.became_visible, 1);
        assert!(tank(&registry).parts()[0].culled().contains_key(&far));
    }

    #[test]
    fn stale_update_after_remove_is_rejected() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        registry.update_frame(&camera, DT);

        assert!(registry.remove_instance(samples::TANK, key).unwrap());
        let late = registry.update_instance_transform(samples::TANK, key, Transform::default(), PlayerNumber(1));
        assert!(matches!(late, Err(InstancingError::InstanceRemoved(_))));
        assert_eq!(tank(&registry).broker().collisions(), 1);

        registry.update_frame(&camera, DT);
        let model = tank(&registry);
        assert!(model.parts().iter().all(|part| !part.all().contains_key(&key)));
        assert!(registry.record(key).is_none());
    }

    #[test]
    fn last_update_in_a_window_wins() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        registry.update_frame(&camera, DT);

        for x in [1.0, 2.0] {
            registry
                .update_instance_transform(samples::TANK, key, Transform::from_position(Vec3::new(x, 0.0, 0.0)), PlayerNumber(1))
                .unwrap();
        }
        registry.update_frame(&camera, DT);

        let hull = &tank(&registry).parts()[0];
        assert_eq!(hull.all().len(), 1);
        assert_eq!(hull.all()[&key].world.w_axis.x, 2.0);
    }

    #[test]
    fn allocator_skips_keys_supplied_by_callers() {
        let mut registry = ready_registry();
        registry
            .update_instance_transform(samples::TANK, InstanceKey(2), Transform::default(), PlayerNumber(1))
            .unwrap();
        let first = registry.allocate_instance_key();
        let second = registry.allocate_instance_key();
        assert_ne!(first, InstanceKey(2));
        assert_ne!(second, InstanceKey(2));
        assert!(registry.record(first).is_none());
        assert!(registry.record(second).is_none());
    }

    #[test]
    fn removal_is_idempotent() {
        let mut registry = ready_registry();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        assert!(registry.remove_instance(samples::TANK, key).unwrap());
        assert!(!registry.remove_instance(samples::TANK, key).unwrap());
        registry.update_frame(&camera(), DT);
        assert!(!registry.remove_instance(samples::TANK, key).unwrap());
    }

    #[test]
    fn delete_wins_over_update_in_same_frame() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        registry.update_frame(&camera, DT);

        registry.set_flash(samples::TANK, key, true).unwrap();
        registry.remove_instance(samples::TANK, key).unwrap();
        registry.update_frame(&camera, DT);
        assert!(tank(&registry).parts()[0].all().is_empty());
    }

    #[test]
    fn swap_happens_once_per_frame() {
        let mut registry = ready_registry();
        assert!(registry.swap_buffers());
        assert!(!registry.swap_buffers());
        registry.end_frame();
        assert!(registry.swap_buffers());
    }

    #[test]
    fn explode_switches_to_debris() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        registry.update_frame(&camera, DT);

        registry.set_explode(samples::TANK, key, true, Vec3::Y).unwrap();
        registry.update_frame(&camera, DT);

        let model = tank(&registry);
        for index in model.normal_part_keys() {
            assert!(!model.parts()[*index].culled().contains_key(&key));
        }
        for index in model.explosion_part_keys() {
            assert!(model.parts()[*index].exploding().contains_key(&key));
        }
    }

    #[test]
    fn restrict_to_part_hides_the_rest() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        assert!(registry.set_restrict_to_part(samples::TANK, key, Some("Turret")).unwrap());
        assert!(!registry.set_restrict_to_part(samples::TANK, key, Some("Antenna")).unwrap());
        registry.update_frame(&camera, DT);

        let model = tank(&registry);
        let turret = model.part_index("Turret").unwrap();
        assert!(model.parts()[turret].culled().contains_key(&key));
        assert!(!model.parts()[0].culled().contains_key(&key));
        assert!(model.parts()[0].all().contains_key(&key));
    }

    #[test]
    fn bone_rotation_reaches_the_draw_list() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        registry.update_frame(&camera, DT);

        let turret = tank(&registry).part_index("Turret").unwrap();
        let before = tank(&registry).parts()[turret].all()[&key].world;
        assert!(registry.set_bone_rotation(samples::TANK, key, "Turret", RotationAxis::Y, 1.0).unwrap());
        assert!(!registry.set_bone_rotation(samples::TANK, key, "Turret", RotationAxis::Y, 1.0).unwrap());
        assert!(!registry.set_bone_rotation(samples::TANK, key, "Antenna", RotationAxis::Y, 1.0).unwrap());
        registry.update_frame(&camera, DT);

        let after = tank(&registry).parts()[turret].all()[&key].world;
        assert_ne!(before, after);
    }

    #[test]
    fn scenery_is_filed_in_terrain() {
        let (catalog, loader) = samples::sample_library();
        let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(loader))
            .with_terrain(Box::new(TerrainGrid::new(16.0, 8)));
        registry.register_type(samples::TREE);
        registry.register_type(samples::TANK);
        registry.process_loads();

        let tree = spawn(&mut registry, samples::TREE, 4.0);
        assert_eq!(registry.record(tree).unwrap().cell, Some(CellCoord::new(0, 0)));
        registry
            .update_instance_transform(samples::TREE, tree, Transform::from_position(Vec3::new(20.0, 0.0, 0.0)), PlayerNumber(0))
            .unwrap();
        assert_eq!(registry.record(tree).unwrap().cell, Some(CellCoord::new(1, 0)));

        let unit = spawn(&mut registry, samples::TANK, 4.0);
        assert_eq!(registry.record(unit).unwrap().cell, None);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut registry = ready_registry();
        let key = spawn(&mut registry, samples::TANK, 0.0);
        let err = registry.remove_instance(samples::TREE, key).unwrap_err();
        assert!(matches!(err, InstancingError::TypeMismatch { .. }));
        assert!(registry.record(key).is_some());
    }

    #[test]
    fn clear_all_empties_every_list() {
        let mut registry = ready_registry();
        let camera = camera();
        for i in 0..5 {
            spawn(&mut registry, samples::TANK, i as f32);
        }
        spawn(&mut registry, samples::OUTPOST, 0.0);
        registry.update_frame(&camera, DT);

        registry.clear_all();
        let stats = registry.update_frame(&camera, DT);
        assert!(stats.drain.cleared > 0);
        assert_eq!(registry.instance_count(), 0);
        for model in registry.models() {
            assert!(model.parts().iter().all(|part| part.all().is_empty()));
        }
    }

    #[test]
    fn still_camera_skips_culling() {
        let mut registry = ready_registry();
        let camera = camera();
        spawn(&mut registry, samples::TANK, 0.0);
        assert!(registry.update_frame(&camera, DT).culled);
        assert!(!registry.update_frame(&camera, DT).culled);
    }

    #[test]
    fn background_worker_hides_far_instances() {
        let mut registry = ready_registry();
        let camera = camera();
        let key = spawn(&mut registry, samples::TANK, 5000.0);
        let worker = CullingWorker::spawn(CullingConfig::default()).unwrap();

        let first = registry.update_frame_with_worker(&worker, &camera, DT);
        assert!(!first.culled);
        assert_eq!(tank(&registry).parts()[0].culled().len(), 1);

        let mut hidden = false;
        for _ in 0..400 {
            let stats = registry.update_frame_with_worker(&worker, &camera, DT);
            if stats.culled {
                hidden = stats.became_hidden == 1;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(hidden);
        assert!(!registry.query_in_camera_view(samples::TANK, key).unwrap());
        assert!(tank(&registry).parts()[0].culled().is_empty());
        assert_eq!(tank(&registry).parts()[0].all().len(), 1);
        worker.shutdown();
    }

    #[test]
    fn unload_level_drops_types() {
        let mut registry = ready_registry();
        spawn(&mut registry, samples::TANK, 0.0);
        registry.unload_level();
        assert!(registry.slot(samples::TANK).is_none());
        assert!(registry.models().next().is_none());
        assert!(registry.scenery().is_empty());
    }
}
