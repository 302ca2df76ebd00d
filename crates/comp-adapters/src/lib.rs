//! comp-adapters: steps concretos sobre `comp-core`.
//!
//! Este crate provee:
//! - `TextGenerator`, la única capacidad que los steps LLM consumen del
//!   backend de generación, y un `ScriptedGenerator` determinista.
//! - `PromptTemplate`, plantillas con placeholders `{{ruta.con.puntos}}`.
//! - `PromptStep` genérico y los steps del pipeline de compliance.
//!
//! El motor no sabe qué calcula cada step; aquí sólo se implementa
//! `StepTransform`.

pub mod generation;
pub mod steps;
pub mod template;

pub use generation::{GenerationError, ScriptedGenerator, TextGenerator};
pub use steps::{consolidate_checks, CheckAuthoringStep, ConsolidateChecksStep, ControlExtractionStep, PromptStep,
                PromptStepError};
pub use template::{flatten_record, PromptTemplate, TemplateError};
