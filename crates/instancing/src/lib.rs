//! Instanced-model core: registry, per-part change queues, bone transforms
//! and visibility culling.
//!
//! # Frame contract
//! Gameplay mutations are recorded as intents during the frame. Once per
//! frame the registry flushes them into per-part double buffers, swaps every
//! buffer at a single point and drains the prior slots into the draw lists.
//!
//! # Invariants
//! - Draw lists change only while draining, never while a frame records.
//! - `culled` is always a subset of `all` for every part.
//! - A queued `DeleteAllParts` is never overridden within its window.

mod bones;
mod broker;
mod change_request;
mod config;
mod culling;
mod double_buffer;
mod draw_record;
mod error;
mod model;
mod part;
mod record;
mod registry;
mod worker;

pub use bones::{Bone, BoneTransformResolver, RotationAxis, Skeleton};
pub use broker::{BufferRequest, ChangeRequestBroker};
pub use change_request::{ChangeKind, ChangeRequest, EnterOutcome, InstancePayload, PartType, PendingChanges};
pub use config::{CullingConfig, RegistryConfig};
pub use culling::{CancellationToken, CullEntry, CullJob, CullOutcome, CullStats, CullingScan, VisibilityChange};
pub use double_buffer::{DoubleBuffer, WriteHandle};
pub use draw_record::DrawRecord;
pub use error::{InstancingError, InstancingResult};
pub use model::{InstancedModel, is_explosion_part};
pub use part::{DrainStats, InstancedModelPart, PartState};
pub use record::InstanceRecord;
pub use registry::{FrameStats, InstanceRegistry, KeyLists, LoadReport, ModelTypeSlot};
pub use worker::{CullingWorker, WorkerStats};

pub fn crate_info() -> &'static str {
    "skirmish-instancing v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("instancing"));
    }
}
