//! Step Executor y contrato de las transformaciones.

pub mod executor;
pub mod transform;

pub use executor::{coerce_output, strip_code_fence, Executed, ExecutionOutcome, StepExecutor};
pub use transform::{field_key, FnTransform, StepOutput, StepTransform};
