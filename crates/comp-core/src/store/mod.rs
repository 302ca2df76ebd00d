//! Cache store: persistencia durable de inputs/outputs de cada step.
//!
//! Las rutas son relativas a la raíz del store y empiezan por el run
//! identifier (ver `layout`). El motor nunca borra entradas: `clear_run` es la
//! operación manual para descartar un run completo.

pub mod disk;
pub mod layout;
pub mod memory;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{ENGINE_VERSION, RUN_MANIFEST};
use crate::errors::{EngineError, StoreError};

pub use disk::FsCacheStore;
pub use layout::{sanitize_key, StepLayout};
pub use memory::InMemoryCacheStore;

/// Identificador de run: namespace de todas las entradas del cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Valida que el id pueda usarse como componente de ruta.
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
            return Err(EngineError::InvalidRunId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contenido de `run.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
}

/// Almacenamiento de entradas del cache (un `Value` por ruta).
///
/// Escrituras concurrentes a rutas distintas son independientes; a la misma
/// ruta gana la última.
pub trait CacheStore: Send + Sync {
    /// `None` si la entrada no existe.
    fn read(&self, path: &Path) -> Result<Option<Value>, StoreError>;

    fn write(&self, path: &Path, value: &Value) -> Result<(), StoreError>;

    fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.read(path)?.is_some())
    }

    /// Rutas de todas las entradas bajo `prefix`, ordenadas.
    fn list(&self, prefix: &Path) -> Result<Vec<PathBuf>, StoreError>;

    /// Elimina todas las entradas bajo `prefix` y devuelve cuántas había.
    fn remove_tree(&self, prefix: &Path) -> Result<usize, StoreError>;

    /// Escribe `run.yaml` la primera vez que se usa un run; nunca lo reescribe.
    fn begin_run(&self, run: &RunId) -> Result<(), StoreError> {
        let path = Path::new(run.as_str()).join(RUN_MANIFEST);
        if self.exists(&path)? {
            return Ok(());
        }
        let manifest = RunManifest { run_id: run.as_str().to_string(),
                                     engine_version: ENGINE_VERSION.to_string(),
                                     created_at: Utc::now() };
        let value = serde_json::to_value(&manifest).map_err(|e| StoreError::Encode { path: path.clone(),
                                                                                     reason: e.to_string() })?;
        self.write(&path, &value)
    }

    /// `None` si el run nunca se abrió.
    fn manifest(&self, run: &RunId) -> Result<Option<RunManifest>, StoreError> {
        let path = Path::new(run.as_str()).join(RUN_MANIFEST);
        match self.read(&path)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some)
                                                        .map_err(|e| StoreError::Decode { path, reason: e.to_string() }),
        }
    }

    fn clear_run(&self, run: &RunId) -> Result<usize, StoreError> {
        self.remove_tree(Path::new(run.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_rejects_path_like_values() {
        assert!(RunId::new("2024-audit").is_ok());
        assert!(RunId::new("").is_err());
        assert!(RunId::new("..").is_err());
        assert!(RunId::new("a/b").is_err());
        assert_eq!(RunId::new("  spaced ").unwrap().as_str(), "spaced");
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn begin_run_writes_manifest_once() {
        let store = InMemoryCacheStore::default();
        let run = RunId::new("r1").unwrap();
        store.begin_run(&run).unwrap();
        let first = store.manifest(&run).unwrap().expect("manifest");
        assert_eq!(first.engine_version, ENGINE_VERSION);
        assert_eq!(first.run_id, "r1");
        store.begin_run(&run).unwrap();
        assert_eq!(store.manifest(&run).unwrap(), Some(first));
        assert_eq!(store.manifest(&RunId::new("other").unwrap()).unwrap(), None);
        assert_eq!(store.clear_run(&run).unwrap(), 1);
    }
}
