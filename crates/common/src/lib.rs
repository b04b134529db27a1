//! Shared types for the skirmish engine: ids, transforms, bounds and the
//! camera predicate consumed by culling.

mod bounds;
mod frustum;
mod types;

pub use bounds::{BoundingSphere, Plane};
pub use frustum::{Camera, FixedCamera, Frustum};
pub use types::{InstanceKey, ItemType, MaterialId, PlayerNumber, Transform};

pub fn crate_info() -> &'static str {
    "skirmish-common v0.1.0"
}
