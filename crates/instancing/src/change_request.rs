use glam::{Mat4, Vec3};
use skirmish_common::{InstanceKey, MaterialId, PlayerNumber};
use std::collections::BTreeMap;

/// What a change request asks a part to do with one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    AddOrUpdate,
    /// Remove from the culled list only; the instance still exists.
    DeleteCulled,
    /// Remove from every list of the part.
    DeleteAllParts,
    /// Clear the whole part.
    DeleteAll,
}

impl ChangeKind {
    pub fn is_delete(self) -> bool {
        !matches!(self, ChangeKind::AddOrUpdate)
    }
}

/// Which draw list family a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PartType {
    #[default]
    Normal,
    Explosion,
}

/// Per-instance data carried alongside the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstancePayload {
    pub player: PlayerNumber,
    pub material: MaterialId,
    pub velocity: Vec3,
    pub flash: bool,
    /// Whether the part should be in its visible list (culled or exploding).
    pub visible: bool,
}

impl Default for InstancePayload {
    fn default() -> Self {
        Self {
            player: PlayerNumber::default(),
            material: MaterialId::default(),
            velocity: Vec3::ZERO,
            flash: false,
            visible: true,
        }
    }
}

/// An immutable intent produced on the gameplay side and applied to a
/// part's draw lists during the drain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeRequest {
    kind: ChangeKind,
    world: Mat4,
    payload: InstancePayload,
    part_type: PartType,
}

impl ChangeRequest {
    pub fn add_or_update(world: Mat4, payload: InstancePayload, part_type: PartType) -> Self {
        Self {
            kind: ChangeKind::AddOrUpdate,
            world,
            payload,
            part_type,
        }
    }

    pub fn delete_culled() -> Self {
        Self::delete(ChangeKind::DeleteCulled)
    }

    pub fn delete_all_parts() -> Self {
        Self::delete(ChangeKind::DeleteAllParts)
    }

    pub fn delete_all() -> Self {
        Self::delete(ChangeKind::DeleteAll)
    }

    fn delete(kind: ChangeKind) -> Self {
        Self {
            kind,
            world: Mat4::IDENTITY,
            payload: InstancePayload {
                visible: false,
                ..InstancePayload::default()
            },
            part_type: PartType::Normal,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub fn payload(&self) -> &InstancePayload {
        &self.payload
    }

    pub fn part_type(&self) -> PartType {
        self.part_type
    }
}

/// How [`PendingChanges::enter`] treated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    Inserted,
    Replaced,
    /// A `DeleteAllParts` for the key was already queued in this window.
    Dropped,
}

/// One slot's worth of change requests: the latest request per key plus an
/// optional clear that is applied before any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChanges {
    clear_all: bool,
    requests: BTreeMap<InstanceKey, ChangeRequest>,
}

impl PendingChanges {
    /// Record `request` for `key`. Last write wins, except that nothing
    /// overrides a queued `DeleteAllParts`. A `DeleteAll` ignores `key`.
    pub fn enter(&mut self, key: InstanceKey, request: ChangeRequest) -> EnterOutcome {
        if request.kind() == ChangeKind::DeleteAll {
            let replaced = self.clear_all || !self.requests.is_empty();
            self.requests.clear();
            self.clear_all = true;
            return if replaced {
                EnterOutcome::Replaced
            } else {
                EnterOutcome::Inserted
            };
        }
        match self.requests.get(&key) {
            Some(existing) if existing.kind() == ChangeKind::DeleteAllParts => EnterOutcome::Dropped,
            Some(_) => {
                self.requests.insert(key, request);
                EnterOutcome::Replaced
            }
            None => {
                self.requests.insert(key, request);
                EnterOutcome::Inserted
            }
        }
    }

    pub fn clear_all(&self) -> bool {
        self.clear_all
    }

    pub fn get(&self, key: InstanceKey) -> Option<&ChangeRequest> {
        self.requests.get(&key)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.clear_all && self.requests.is_empty()
    }

    pub fn into_parts(self) -> (bool, BTreeMap<InstanceKey, ChangeRequest>) {
        (self.clear_all, self.requests)
    }
}
