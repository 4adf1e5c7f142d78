//! File-backed key-value storage and the persisted cart token.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pricelist_core::ProductId;

/// Storage key holding the selected product ids as a JSON array.
pub const CART_KEY: &str = "cart";

/// String key-value store persisted as a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.read_all();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    pub fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.read_all();
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Missing or unreadable files read as empty.
    fn read_all(&self) -> BTreeMap<String, String> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "storage file unreadable");
                return BTreeMap::new();
            }
        };

        serde_json::from_slice(&raw).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), error = %err, "storage file malformed, ignoring");
            BTreeMap::new()
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create storage directory at {:?}", parent))?;
        }

        let body = serde_json::to_vec_pretty(entries).context("failed to encode storage entries")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("failed to write storage file at {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace storage file at {:?}", self.path))?;
        Ok(())
    }
}

/// Saved cart ids, empty when absent or malformed.
pub fn load_cart(storage: &LocalStorage) -> Vec<ProductId> {
    let Some(raw) = storage.get_item(CART_KEY) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "saved cart is malformed, starting empty");
        Vec::new()
    })
}

pub fn save_cart(storage: &LocalStorage, ids: &[ProductId]) -> anyhow::Result<()> {
    let raw = serde_json::to_string(ids).context("failed to encode cart")?;
    storage.set_item(CART_KEY, &raw)
}
