//! Draw submission: renderer-agnostic instanced drawing.
//!
//! # Invariants
//! - Rendering reads draw lists; it never mutates instances.
//! - A part with an empty list issues no backend call.
//! - The slice handed to a backend is always the logical instance count,
//!   never the grow-only backing array.

mod backend;
mod renderer;
mod stream;
mod submit;
mod technique;
mod vertex;

pub use backend::{DrawBackend, DrawCall, InstancedDraw, RecordingBackend};
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use stream::InstanceStream;
pub use submit::{InstanceSubmitter, SubmitStats};
pub use technique::Technique;
pub use vertex::InstanceVertex;

pub fn crate_info() -> &'static str {
    "skirmish-render v0.1.0"
}
