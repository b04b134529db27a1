use skirmish_common::InstanceKey;
use std::collections::BTreeMap;

use crate::change_request::{ChangeKind, ChangeRequest, EnterOutcome, PartType, PendingChanges};
use crate::double_buffer::DoubleBuffer;
use crate::draw_record::DrawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartState {
    #[default]
    Idle,
    Accepting,
    Draining,
}

/// Counters from draining one or more parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: usize,
    pub skipped: usize,
    pub cleared: usize,
    pub dirty_parts: usize,
}

impl DrainStats {
    pub fn merge(&mut self, other: DrainStats) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.cleared += other.cleared;
        self.dirty_parts += other.dirty_parts;
    }
}

/// One drawable mesh part of a model type.
///
/// Change requests are buffered into the current slot of a double buffer
/// and only reach the draw lists when the prior slot is drained, so the
/// lists never change while a frame is being recorded.
///
/// # Lists
/// - `all`: every live instance of the model.
/// - `culled`: the subset of `all` inside the view frustum.
/// - `exploding`: instances currently drawing this part as debris.
#[derive(Debug)]
pub struct InstancedModelPart {
    name: String,
    bone: usize,
    part_type: PartType,
    state: PartState,
    queue: DoubleBuffer<PendingChanges>,
    all: BTreeMap<InstanceKey, DrawRecord>,
    culled: BTreeMap<InstanceKey, DrawRecord>,
    exploding: BTreeMap<InstanceKey, DrawRecord>,
    dirty: bool,
}

impl InstancedModelPart {
    pub fn new(name: impl Into<String>, bone: usize, part_type: PartType) -> Self {
        Self {
            name: name.into(),
            bone,
            part_type,
            state: PartState::Idle,
            queue: DoubleBuffer::new(),
            all: BTreeMap::new(),
            culled: BTreeMap::new(),
            exploding: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bone(&self) -> usize {
        self.bone
    }

    pub fn part_type(&self) -> PartType {
        self.part_type
    }

    pub fn state(&self) -> PartState {
        self.state
    }

    pub fn enter_change_request(&mut self, key: InstanceKey, request: ChangeRequest) -> EnterOutcome {
        self.state = PartState::Accepting;
        let outcome = self.queue.write().enter(key, request);
        if outcome == EnterOutcome::Dropped {
            tracing::trace!(part = %self.name, %key, kind = ?request.kind(), "request dropped behind delete");
        }
        outcome
    }

    /// Requests waiting in the current write slot.
    pub fn pending(&self) -> &PendingChanges {
        self.queue.current()
    }

    pub fn swap(&mut self) {
        self.queue.swap();
        self.state = PartState::Idle;
    }

    /// Apply everything in the prior slot to the draw lists and advance the
    /// explosion clock by `elapsed` seconds.
    pub fn process_double_buffers(&mut self, elapsed: f32) -> DrainStats {
        self.state = PartState::Draining;
        let (clear_all, requests) = self.queue.drain().into_parts();
        let mut stats = DrainStats::default();

        for record in self.exploding.values_mut() {
            record.elapsed += elapsed;
        }

        if clear_all {
            self.all.clear();
            self.culled.clear();
            self.exploding.clear();
            stats.cleared += 1;
        }

        for (key, request) in requests {
            if self.apply(key, &request) {
                stats.applied += 1;
            } else {
                tracing::debug!(part = %self.name, %key, kind = ?request.kind(), "no list entry, skipping");
                stats.skipped += 1;
            }
        }

        self.dirty = clear_all || stats.applied > 0;
        if self.dirty {
            stats.dirty_parts = 1;
        }
        self.state = PartState::Idle;
        stats
    }

    fn apply(&mut self, key: InstanceKey, request: &ChangeRequest) -> bool {
        match request.kind() {
            ChangeKind::AddOrUpdate => {
                let record = DrawRecord::from_request(request);
                self.all.insert(key, record);
                let visible_list = match request.part_type() {
                    PartType::Normal => &mut self.culled,
                    PartType::Explosion => &mut self.exploding,
                };
                if request.payload().visible {
                    // Debris keeps drifting from where it was.
                    let elapsed = visible_list.get(&key).map_or(0.0, |r| r.elapsed);
                    visible_list.insert(key, DrawRecord { elapsed, ..record });
                } else {
                    visible_list.remove(&key);
                }
                true
            }
            ChangeKind::DeleteCulled => {
                let culled = self.culled.remove(&key).is_some();
                let exploding = self.exploding.remove(&key).is_some();
                culled || exploding
            }
            ChangeKind::DeleteAllParts => {
                let all = self.all.remove(&key).is_some();
                let culled = self.culled.remove(&key).is_some();
                let exploding = self.exploding.remove(&key).is_some();
                all || culled || exploding
            }
            ChangeKind::DeleteAll => {
                self.all.clear();
                self.culled.clear();
                self.exploding.clear();
                true
            }
        }
    }

    pub fn all(&self) -> &BTreeMap<InstanceKey, DrawRecord> {
        &self.all
    }

    pub fn culled(&self) -> &BTreeMap<InstanceKey, DrawRecord> {
        &self.culled
    }

    pub fn exploding(&self) -> &BTreeMap<InstanceKey, DrawRecord> {
        &self.exploding
    }

    /// The list this part is drawn from: culled for normal parts, exploding
    /// for explosion pieces.
    pub fn draw_list(&self) -> &BTreeMap<InstanceKey, DrawRecord> {
        match self.part_type {
            PartType::Normal => &self.culled,
            PartType::Explosion => &self.exploding,
        }
    }

    /// Whether the last drain changed any list.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
