use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde_json::Value;

use super::CacheStore;
use crate::errors::StoreError;

/// Store en memoria (tests, dry runs). Seguro para escrituras concurrentes.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    pub inner: DashMap<PathBuf, Value>,
}

impl CacheStore for InMemoryCacheStore {
    fn read(&self, path: &Path) -> Result<Option<Value>, StoreError> {
        Ok(self.inner.get(path).map(|v| v.value().clone()))
    }

    fn write(&self, path: &Path, value: &Value) -> Result<(), StoreError> {
        self.inner.insert(path.to_path_buf(), value.clone());
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.inner.contains_key(path))
    }

    fn list(&self, prefix: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut out: Vec<PathBuf> = self.inner
                                        .iter()
                                        .filter(|e| e.key().starts_with(prefix))
                                        .map(|e| e.key().clone())
                                        .collect();
        out.sort();
        Ok(out)
    }

    fn remove_tree(&self, prefix: &Path) -> Result<usize, StoreError> {
        let before = self.inner.len();
        self.inner.retain(|k, _| !k.starts_with(prefix));
        Ok(before - self.inner.len())
    }
}
