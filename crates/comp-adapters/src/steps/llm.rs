//! `PromptStep`: step genérico respaldado por un `TextGenerator`.
//!
//! Renderiza la plantilla con el input ya coaccionado y devuelve la respuesta
//! como `StepOutput::Text`; el executor la parsea contra el output shape.

use comp_core::step::{field_key, StepOutput, StepTransform};
use serde_json::Value;
use thiserror::Error;

use crate::generation::{GenerationError, TextGenerator};
use crate::template::{PromptTemplate, TemplateError};

#[derive(Debug, Error)]
pub enum PromptStepError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("unusable reply: {0}")]
    Reply(String),
}

pub struct PromptStep<G> {
    template: PromptTemplate,
    generator: G,
    key_field: String,
    item_key_field: Option<String>,
}

impl<G: TextGenerator> PromptStep<G> {
    pub fn new(template: PromptTemplate, generator: G, key_field: impl Into<String>) -> Self {
        Self { template,
               generator,
               key_field: key_field.into(),
               item_key_field: None }
    }

    pub fn with_item_key(mut self, field: impl Into<String>) -> Self {
        self.item_key_field = Some(field.into());
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Prompt renderizado + respuesta cruda del generador.
    pub fn ask(&self, input: &Value) -> Result<String, PromptStepError> {
        let prompt = self.template.render(input)?;
        log::debug!("prompt for `{}` ({} chars)",
                    field_key(input, &self.key_field).unwrap_or_default(),
                    prompt.len());
        Ok(self.generator.generate_text(&prompt)?)
    }
}

impl<G: TextGenerator> StepTransform for PromptStep<G> {
    type Error = PromptStepError;

    fn cache_key(&self, input: &Value) -> Option<String> {
        field_key(input, &self.key_field)
    }

    fn item_key(&self, item: &Value) -> Option<String> {
        field_key(item, self.item_key_field.as_deref().unwrap_or(&self.key_field))
    }

    fn compute(&self, input: &Value) -> Result<StepOutput, PromptStepError> {
        self.ask(input).map(StepOutput::Text)
    }
}
