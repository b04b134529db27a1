use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::AssetError;
use crate::model::ModelAsset;

/// Where a load attempt reads from.
///
/// Assets normally come from the packed primary root. After repeated
/// failures the registry switches to the loose-file fallback root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetSource {
    Primary,
    Fallback,
}

/// The content-pipeline seam consumed by the instance registry.
pub trait ModelLoader: Send {
    fn load(&mut self, path: &str, source: AssetSource) -> Result<ModelAsset, AssetError>;
}

/// Loads `<root>/<path>.model.json` manifests from disk.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    primary_root: PathBuf,
    fallback_root: Option<PathBuf>,
}

impl ManifestLoader {
    pub fn new(primary_root: impl Into<PathBuf>) -> Self {
        Self {
            primary_root: primary_root.into(),
            fallback_root: None,
        }
    }

    pub fn with_fallback(mut self, fallback_root: impl Into<PathBuf>) -> Self {
        self.fallback_root = Some(fallback_root.into());
        self
    }

    pub fn manifest_path(root: &Path, path: &str) -> PathBuf {
        root.join(format!("{path}.model.json"))
    }

    /// Read and validate a single manifest file.
    pub fn read_manifest(file: impl AsRef<Path>) -> Result<ModelAsset, AssetError> {
        let file = file.as_ref();
        if !file.exists() {
            return Err(AssetError::NotFound(file.display().to_string()));
        }
        let data = std::fs::read_to_string(file)?;
        let asset: ModelAsset = serde_json::from_str(&data)?;
        asset.validate()?;
        Ok(asset)
    }

    /// Write a manifest under `root`, creating directories as needed.
    pub fn write_manifest(
        root: impl AsRef<Path>,
        path: &str,
        asset: &ModelAsset,
    ) -> Result<PathBuf, AssetError> {
        let file = Self::manifest_path(root.as_ref(), path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        serde_json::to_writer_pretty(std::fs::File::create(&file)?, asset)?;
        Ok(file)
    }
}

impl ModelLoader for ManifestLoader {
    fn load(&mut self, path: &str, source: AssetSource) -> Result<ModelAsset, AssetError> {
        let root = match source {
            AssetSource::Primary => self.primary_root.as_path(),
            AssetSource::Fallback => self
                .fallback_root
                .as_deref()
                .ok_or_else(|| AssetError::NoFallback(path.to_string()))?,
        };
        let file = Self::manifest_path(root, path);
        tracing::debug!(file = %file.display(), ?source, "loading model manifest");
        Self::read_manifest(file)
    }
}

/// Serves models from memory. Can be told to fail a path a number of
/// times first, which is how retry behaviour is exercised without a disk.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLoader {
    primary: BTreeMap<String, ModelAsset>,
    fallback: BTreeMap<String, ModelAsset>,
    transient_failures: BTreeMap<String, u32>,
    attempts: Vec<(String, AssetSource)>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, asset: ModelAsset) {
        self.primary.insert(path.into(), asset);
    }

    /// Make `path` available only through the fallback source.
    pub fn insert_fallback(&mut self, path: impl Into<String>, asset: ModelAsset) {
        self.fallback.insert(path.into(), asset);
    }

    /// Fail the next `count` primary loads of `path`.
    pub fn fail_first(&mut self, path: impl Into<String>, count: u32) {
        self.transient_failures.insert(path.into(), count);
    }

    /// Every `(path, source)` pair requested so far, in order.
    pub fn attempts(&self) -> &[(String, AssetSource)] {
        &self.attempts
    }
}

impl ModelLoader for InMemoryLoader {
    fn load(&mut self, path: &str, source: AssetSource) -> Result<ModelAsset, AssetError> {
        self.attempts.push((path.to_string(), source));
        match source {
            AssetSource::Primary => {
                if let Some(remaining) = self.transient_failures.get_mut(path) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(AssetError::NotFound(format!("{path} (not ready)")));
                    }
                }
                self.primary
                    .get(path)
                    .cloned()
                    .ok_or_else(|| AssetError::NotFound(path.to_string()))
            }
            AssetSource::Fallback => self
                .fallback
                .get(path)
                .or_else(|| self.primary.get(path))
                .cloned()
                .ok_or_else(|| AssetError::NoFallback(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let asset = ModelAsset::with_parts("crate", &["Body"]);
        ManifestLoader::write_manifest(dir.path(), "props/crate", &asset).unwrap();

        let mut loader = ManifestLoader::new(dir.path());
        let loaded = loader.load("props/crate", AssetSource::Primary).unwrap();
        assert_eq!(loaded, asset);
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = ManifestLoader::new(dir.path());
        let err = loader.load("nope", AssetSource::Primary).unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }

    #[test]
    fn fallback_without_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = ManifestLoader::new(dir.path());
        let err = loader.load("x", AssetSource::Fallback).unwrap_err();
        assert!(matches!(err, AssetError::NoFallback(_)));
    }

    #[test]
    fn fallback_root_is_used_for_fallback_source() {
        let primary = tempfile::tempdir().unwrap();
        let loose = tempfile::tempdir().unwrap();
        let asset = ModelAsset::with_parts("crate", &["Body"]);
        ManifestLoader::write_manifest(loose.path(), "crate", &asset).unwrap();

        let mut loader = ManifestLoader::new(primary.path()).with_fallback(loose.path());
        assert!(loader.load("crate", AssetSource::Primary).is_err());
        assert_eq!(loader.load("crate", AssetSource::Fallback).unwrap(), asset);
    }

    #[test]
    fn invalid_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = ManifestLoader::manifest_path(dir.path(), "broken");
        std::fs::write(&file, r#"{"name":"broken","parts":[],"bones":[]}"#).unwrap();
        let err = ManifestLoader::read_manifest(&file).unwrap_err();
        assert!(matches!(err, AssetError::InvalidModel { .. }));
    }

    #[test]
    fn in_memory_transient_failures_then_success() {
        let mut loader = InMemoryLoader::new();
        loader.insert("tank", ModelAsset::with_parts("tank", &["Hull"]));
        loader.fail_first("tank", 2);

        assert!(loader.load("tank", AssetSource::Primary).is_err());
        assert!(loader.load("tank", AssetSource::Primary).is_err());
        assert!(loader.load("tank", AssetSource::Primary).is_ok());
        assert_eq!(loader.attempts().len(), 3);
    }
}
