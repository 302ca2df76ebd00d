//! Steps concretos sobre el motor.

pub mod compliance;
pub mod llm;

pub use compliance::{consolidate_checks, CheckAuthoringStep, ConsolidateChecksStep, ControlExtractionStep};
pub use llm::{PromptStep, PromptStepError};
