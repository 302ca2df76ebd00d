//! `FsCacheStore`: una entrada YAML por archivo bajo un directorio raíz.
//!
//! Cada escritura va a un temporal hermano y se renombra a su destino, así un
//! crash a mitad de escritura nunca deja una entrada parcial que se lea como
//! cache hit.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::Value;
use uuid::Uuid;

use super::CacheStore;
use crate::constants::ENTRY_EXTENSION;
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    out.push(relative.to_path_buf());
                }
            }
        }
        Ok(())
    }
}

impl CacheStore for FsCacheStore {
    fn read(&self, path: &Path) -> Result<Option<Value>, StoreError> {
        let full = self.root.join(path);
        let text = match fs::read_to_string(&full) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(full, e)),
        };
        serde_yaml::from_str(&text).map(Some)
                                   .map_err(|e| StoreError::Decode { path: full, reason: e.to_string() })
    }

    fn write(&self, path: &Path, value: &Value) -> Result<(), StoreError> {
        let full = self.root.join(path);
        let text = serde_yaml::to_string(value).map_err(|e| StoreError::Encode { path: full.clone(),
                                                                                  reason: e.to_string() })?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = full.with_extension(format!("{ENTRY_EXTENSION}.tmp-{}", Uuid::new_v4().simple()));
        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &full) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(full, e));
        }
        debug!("cache write {}", path.display());
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.root.join(path).is_file())
    }

    fn list(&self, prefix: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut out = Vec::new();
        self.collect(&self.root.join(prefix), &mut out)?;
        out.sort();
        Ok(out)
    }

    fn remove_tree(&self, prefix: &Path) -> Result<usize, StoreError> {
        let count = self.list(prefix)?.len();
        let full = self.root.join(prefix);
        match fs::remove_dir_all(&full) {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::io(full, e)),
        }
    }
}
