//! Capacidad de generación de texto consumida por los steps LLM.
//!
//! El motor no impone reintentos ni timeouts: si el backend los necesita, los
//! implementa la propia implementación de `TextGenerator`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("text generation backend failed: {0}")]
    Backend(String),
    #[error("no scripted reply matches prompt starting with `{0}`")]
    NoReply(String),
}

pub trait TextGenerator: Send + Sync {
    fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate_text(prompt)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate_text(prompt)
    }
}

/// Generador determinista para tests y dry runs: responde con la primera
/// regla cuyo fragmento aparece en el prompt.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    rules: Vec<(String, Result<String, GenerationError>)>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_when(mut self, fragment: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((fragment.into(), Ok(reply.into())));
        self
    }

    pub fn fail_when(mut self, fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        self.rules.push((fragment.into(), Err(GenerationError::Backend(reason.into()))));
        self
    }

    pub fn otherwise(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Número de llamadas a `generate_text`, incluidas las fallidas.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());

        if let Some((_, reply)) = self.rules.iter().find(|(fragment, _)| prompt.contains(fragment.as_str())) {
            return reply.clone();
        }
        self.fallback
            .clone()
            .ok_or_else(|| GenerationError::NoReply(prompt.chars().take(40).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let gen = ScriptedGenerator::new().reply_when("alpha", "A")
                                          .fail_when("beta", "quota")
                                          .reply_when("alpha beta", "never");
        assert_eq!(gen.generate_text("say alpha beta").unwrap(), "A");
        assert_eq!(gen.generate_text("beta only"),
                   Err(GenerationError::Backend("quota".into())));
        assert!(matches!(gen.generate_text("gamma"), Err(GenerationError::NoReply(_))));
        assert_eq!(gen.calls(), 3);
        assert_eq!(gen.prompts().len(), 3);
    }

    #[test]
    fn fallback_and_shared_handles() {
        let gen = Arc::new(ScriptedGenerator::new().otherwise("ok"));
        let shared: Arc<dyn TextGenerator> = gen.clone();
        assert_eq!(shared.generate_text("anything").unwrap(), "ok");
        assert_eq!(gen.calls(), 1);
    }
}
