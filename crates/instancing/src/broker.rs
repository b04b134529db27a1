use skirmish_common::InstanceKey;
use std::collections::BTreeSet;

use crate::change_request::{ChangeRequest, EnterOutcome};
use crate::error::{InstancingError, InstancingResult};
use crate::part::InstancedModelPart;

/// Gameplay-side intents for one model type, collected during the frame
/// and flushed into the parts once.
///
/// Repeated updates of the same instance collapse into one refresh. An
/// instance removed this frame cannot be refreshed again; the late write is
/// dropped and counted as a collision.
#[derive(Debug, Default)]
pub struct ChangeRequestBroker {
    pending: BTreeSet<InstanceKey>,
    removed_this_frame: BTreeSet<InstanceKey>,
    collisions: u64,
}

impl ChangeRequestBroker {
    pub fn request_refresh(&mut self, key: InstanceKey) -> InstancingResult<()> {
        self.reject_if_removed(key)?;
        self.pending.insert(key);
        Ok(())
    }

    /// Fail with `InstanceRemoved` (and count a collision) when `key` was
    /// removed earlier in this frame.
    pub fn reject_if_removed(&mut self, key: InstanceKey) -> InstancingResult<()> {
        if self.removed_this_frame.contains(&key) {
            self.collisions += 1;
            tracing::debug!(%key, "write after removal dropped");
            return Err(InstancingError::InstanceRemoved(key));
        }
        Ok(())
    }

    pub fn was_removed(&self, key: InstanceKey) -> bool {
        self.removed_this_frame.contains(&key)
    }

    pub fn note_removed(&mut self, key: InstanceKey) {
        self.pending.remove(&key);
        self.removed_this_frame.insert(key);
    }

    pub fn take_pending(&mut self) -> BTreeSet<InstanceKey> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn end_frame(&mut self) {
        self.removed_this_frame.clear();
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.removed_this_frame.clear();
    }
}

/// A change request addressed to one part of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferRequest {
    pub part: usize,
    pub key: InstanceKey,
    pub request: ChangeRequest,
}

impl BufferRequest {
    pub fn commit(self, parts: &mut [InstancedModelPart]) -> Option<EnterOutcome> {
        parts
            .get_mut(self.part)
            .map(|part| part.enter_change_request(self.key, self.request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_request::PartType;

    #[test]
    fn refreshes_collapse() {
        let mut broker = ChangeRequestBroker::default();
        broker.request_refresh(InstanceKey(1)).unwrap();
        broker.request_refresh(InstanceKey(1)).unwrap();
        broker.request_refresh(InstanceKey(2)).unwrap();
        assert_eq!(broker.pending_len(), 2);
        assert_eq!(broker.take_pending().len(), 2);
        assert_eq!(broker.pending_len(), 0);
    }

    #[test]
    fn refresh_after_removal_is_a_collision() {
        let mut broker = ChangeRequestBroker::default();
        let key = InstanceKey(5);
        broker.request_refresh(key).unwrap();
        broker.note_removed(key);
        assert_eq!(broker.pending_len(), 0);

        let err = broker.request_refresh(key).unwrap_err();
        assert!(matches!(err, InstancingError::InstanceRemoved(k) if k == key));
        assert_eq!(broker.collisions(), 1);

        broker.end_frame();
        assert!(!broker.was_removed(key));
    }

    #[test]
    fn commit_targets_one_part() {
        let mut parts = vec![
            InstancedModelPart::new("Hull", 0, PartType::Normal),
            InstancedModelPart::new("Turret", 0, PartType::Normal),
        ];
        let request = BufferRequest {
            part: 1,
            key: InstanceKey(3),
            request: ChangeRequest::delete_culled(),
        };
        assert_eq!(request.commit(&mut parts), Some(EnterOutcome::Inserted));
        assert!(parts[0].pending().is_empty());
        assert_eq!(parts[1].pending().len(), 1);

        let stray = BufferRequest { part: 7, ..request };
        assert_eq!(stray.commit(&mut parts), None);
    }
}
