//! Model assets: manifests, geometry, catalogs and the loader seam.
//!
//! The instancing core never touches files directly. It asks a
//! [`ModelLoader`] for a [`ModelAsset`] by catalog path and treats any error
//! as transient until its retry budget runs out.
//!
//! # Layout
//! Manifests live at `<root>/<path>.model.json`. A packed primary root is
//! tried first; a loose-file fallback root is optional.

mod catalog;
mod loader;
mod mesh;
mod model;
pub mod samples;

pub use catalog::ModelCatalog;
pub use loader::{AssetSource, InMemoryLoader, ManifestLoader, ModelLoader};
pub use mesh::MeshData;
pub use model::{BoneAsset, MeshPartAsset, ModelAsset, ModelFlags};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("no fallback source configured for {0}")]
    NoFallback(String),
    #[error("invalid model {name}: {reason}")]
    InvalidModel { name: String, reason: String },
}

pub fn crate_info() -> &'static str {
    "skirmish-assets v0.1.0"
}
