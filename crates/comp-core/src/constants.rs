//! Constantes del motor core.
//!
//! Este módulo agrupa valores estáticos que participan en el layout del cache
//! y en la compatibilidad entre versiones del motor. `ENGINE_VERSION` se
//! escribe en el manifiesto de cada run.

/// Versión lógica del motor. Se registra en `run.yaml` al iniciar un run para
/// poder detectar caches producidos por una versión incompatible.
pub const ENGINE_VERSION: &str = "C1.0";

/// Sufijo que marca un campo repetido en un field tree (`controls[]`).
pub const LIST_MARKER: &str = "[]";

/// Separador de namespace en referencias cross-module (`module.step`).
pub const REFERENCE_SEPARATOR: char = '.';

/// Extensión de las entradas del cache.
pub const ENTRY_EXTENSION: &str = "yaml";

/// Nombre del manifiesto escrito por `CacheStore::begin_run`.
pub const RUN_MANIFEST: &str = "run.yaml";

/// Marcador de commit de un output de tipo lista. Empieza con `.` para que
/// ninguna clave saneada pueda colisionar con él.
pub const LIST_INDEX: &str = ".index.yaml";
