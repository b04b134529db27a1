//! wgpu draw backend for instanced model parts.
//!
//! Uploads one vertex/index buffer pair per model part, collects the
//! instance slices handed over by the submitter into a single instance
//! buffer, and replays them as shadow, opaque and alpha passes.
//!
//! # Invariants
//! - The backend never mutates the instance registry.
//! - Camera motion bumps the camera generation; nothing else does.

mod batch;
mod camera;
mod gpu;
mod shaders;

pub use batch::{Batch, FrameBatches};
pub use camera::FlyCamera;
pub use gpu::WgpuInstanceRenderer;

pub fn crate_info() -> &'static str {
    "skirmish-render-wgpu v0.1.0"
}
