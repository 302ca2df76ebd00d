//! Ajustes del motor desde variables de entorno (con `.env` opcional).

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::errors::EngineError;
use crate::store::RunId;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_CACHE_DIR: &str = ".compflow-cache";
pub const DEFAULT_PIPELINE: &str = "pipeline.yaml";
pub const DEFAULT_PARALLELISM: usize = 4;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// `COMPFLOW_CACHE_DIR`
    pub cache_dir: PathBuf,
    /// `COMPFLOW_RUN_ID`; si falta se genera uno nuevo.
    pub run_id: RunId,
    /// `COMPFLOW_PARALLELISM`
    pub parallelism: usize,
    /// `COMPFLOW_PIPELINE`
    pub pipeline: PathBuf,
}

impl EngineSettings {
    pub fn from_env() -> Result<Self, EngineError> {
        Lazy::force(&DOTENV_LOADED);
        let cache_dir = env::var("COMPFLOW_CACHE_DIR").unwrap_or_else(|_| DEFAULT_CACHE_DIR.to_string());
        let run_id = match env::var("COMPFLOW_RUN_ID") {
            Ok(id) if !id.trim().is_empty() => RunId::new(id)?,
            _ => RunId::generate(),
        };
        let parallelism = env::var("COMPFLOW_PARALLELISM").ok()
                                                          .and_then(|v| v.parse().ok())
                                                          .filter(|n: &usize| *n > 0)
                                                          .unwrap_or(DEFAULT_PARALLELISM);
        let pipeline = env::var("COMPFLOW_PIPELINE").unwrap_or_else(|_| DEFAULT_PIPELINE.to_string());
        Ok(Self { cache_dir: cache_dir.into(),
                  run_id,
                  parallelism,
                  pipeline: pipeline.into() })
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
