//! Configuración del pipeline: módulos con steps cuyos shapes de entrada y
//! salida se sintetizan al cargar.

pub mod definition;
mod reference;
pub mod resolver;

pub use definition::{ModuleDefinition, PipelineConfig, StepDefinition, StepRef};
pub use resolver::ConfigSource;
