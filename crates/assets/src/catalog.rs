use serde::{Deserialize, Serialize};
use skirmish_common::ItemType;
use std::collections::BTreeMap;
use std::path::Path;

use crate::AssetError;

/// Maps each model type to the asset path its loader understands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCatalog {
    entries: BTreeMap<ItemType, String>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item_type: ItemType, path: impl Into<String>) {
        self.entries.insert(item_type, path.into());
    }

    pub fn path(&self, item_type: ItemType) -> Option<&str> {
        self.entries.get(&item_type).map(String::as_str)
    }

    pub fn item_types(&self) -> impl Iterator<Item = ItemType> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        serde_json::to_writer_pretty(std::fs::File::create(path)?, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let catalog = serde_json::from_reader(std::fs::File::open(path)?)?;
        Ok(catalog)
    }
}
