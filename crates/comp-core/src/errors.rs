//! Errores del motor.
//!
//! `EngineError` cubre todo lo que el motor puede fallar por sí mismo
//! (configuración, esquema, validación, cache). Los errores del cuerpo de una
//! transformación viajan sin envolver dentro de `StepError::Compute` para que
//! el llamador pueda distinguirlos de los fallos del motor.

use std::path::PathBuf;

use thiserror::Error;

/// Un registro no pudo coaccionarse al shape declarado.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("record does not match shape `{shape}` at `{path}`: {reason}")]
pub struct ValidationError {
    /// Nombre del shape contra el que se validó.
    pub shape: String,
    /// Ruta del campo (`controls[2].id`); vacío si falla la raíz.
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(shape: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { shape: shape.into(),
               path: path.into(),
               reason: reason.into() }
    }
}

/// Fallos del cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode entry {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("cannot decode entry {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pipeline configuration not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("malformed pipeline configuration: {0}")]
    ConfigParse(String),
    #[error("invalid field tree for `{shape}`: {reason}")]
    Schema { shape: String, reason: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot derive cache key for {module}.{step}: {reason}")]
    CannotDeriveCacheKey { module: String, step: String, reason: String },
    #[error("unknown step {module}.{step}")]
    UnknownStep { module: String, step: String },
    #[error("invalid run identifier `{0}`")]
    InvalidRunId(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("worker pool: {0}")]
    WorkerPool(String),
}

/// Error de ejecutar un step: fallo del motor o fallo del cuerpo `E`.
#[derive(Debug, Error)]
pub enum StepError<E>
    where E: std::error::Error + 'static
{
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("step computation failed: {0}")]
    Compute(#[source] E),
}

impl<E> StepError<E> where E: std::error::Error + 'static
{
    /// Error del cuerpo si lo hay.
    pub fn compute(&self) -> Option<&E> {
        match self {
            StepError::Compute(e) => Some(e),
            StepError::Engine(_) => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StepError::Engine(EngineError::Validation(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_includes_path() {
        let err = ValidationError::new("m1.s1.input", "controls[2].id", "expected string");
        assert_eq!(err.to_string(),
                   "record does not match shape `m1.s1.input` at `controls[2].id`: expected string");
    }

    #[test]
    fn step_error_keeps_compute_error_unwrapped() {
        let io = std::io::Error::other("backend down");
        let err: StepError<std::io::Error> = StepError::Compute(io);
        assert_eq!(err.compute().map(|e| e.to_string()), Some("backend down".to_string()));
        assert!(!err.is_validation());
    }

    #[test]
    fn engine_error_converts_into_step_error() {
        let err: StepError<std::io::Error> = EngineError::InvalidRunId("a/b".into()).into();
        assert!(err.compute().is_none());
        assert_eq!(err.to_string(), "invalid run identifier `a/b`");
    }
}
