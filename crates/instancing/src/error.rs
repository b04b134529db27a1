use skirmish_assets::AssetError;
use skirmish_common::{InstanceKey, ItemType};

/// Errors surfaced by the instancing core.
///
/// None of these are fatal: every operation that returns one has left the
/// registry unchanged.
#[derive(Debug, thiserror::Error)]
pub enum InstancingError {
    #[error("model type {0} is not loaded")]
    TypeNotReady(ItemType),
    #[error("model type {0} failed to load")]
    TypeFailed(ItemType),
    #[error("instance {0} was removed this frame")]
    InstanceRemoved(InstanceKey),
    #[error("instance {key} belongs to {found}, not {expected}")]
    TypeMismatch {
        key: InstanceKey,
        expected: ItemType,
        found: ItemType,
    },
    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),
    #[error("model {0} has no drawable parts")]
    EmptyModel(String),
    #[error("invalid asset: {0}")]
    Asset(#[from] AssetError),
    #[error("failed to start culling worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

pub type InstancingResult<T> = Result<T, InstancingError>;
