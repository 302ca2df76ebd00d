//! Shapes sintetizados a partir de field trees declarativos.
//!
//! - `shape`: descriptor genérico (`RecordShape`, `FieldSpec`, `FieldKind`).
//! - `synth`: Schema Synthesizer (field tree -> shape).
//! - `validate`: coerción de registros al shape declarado.

pub mod shape;
pub mod synth;
pub mod validate;

pub use shape::{FieldKind, FieldSpec, PrimitiveType, RecordShape};
pub use synth::synthesize;
pub use validate::coerce_record;
