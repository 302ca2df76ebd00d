//! comp-core: motor de ejecución de pipelines declarativos.
//!
//! Una configuración YAML declara módulos con steps; cada step tiene un
//! field tree de entrada y otro de salida a partir de los cuales se
//! sintetizan shapes. El executor valida, cachea y persiste cada ejecución
//! de un step bajo un run identifier, y el batch runner la reparte sobre un
//! pool acotado conservando el orden de los inputs.
pub mod batch;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod step;
pub mod store;

pub use batch::BatchRunner;
pub use errors::{EngineError, StepError, StoreError, ValidationError};
pub use pipeline::{ConfigSource, ModuleDefinition, PipelineConfig, StepDefinition, StepRef};
pub use schema::{coerce_record, synthesize, FieldKind, FieldSpec, PrimitiveType, RecordShape};
pub use settings::EngineSettings;
pub use step::{field_key, Executed, ExecutionOutcome, FnTransform, StepExecutor, StepOutput, StepTransform};
pub use store::{CacheStore, FsCacheStore, InMemoryCacheStore, RunId, RunManifest};
