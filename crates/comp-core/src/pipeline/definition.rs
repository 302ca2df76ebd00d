//! Definición inmutable del pipeline: módulos, steps y sus shapes.
//!
//! Se construye una vez (ver `resolver`) y se pasa explícitamente a cada
//! `StepExecutor`. No hay registro global.

use std::sync::Arc;

use crate::schema::RecordShape;

/// Step resuelto. Identidad = `(module, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    /// Posición de declaración dentro del módulo (0-based).
    pub index: usize,
    pub name: String,
    pub input_shape: Arc<RecordShape>,
    pub output_shape: Arc<RecordShape>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDefinition {
    pub index: usize,
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl ModuleDefinition {
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Referencia prestada a un step junto con su módulo.
#[derive(Debug, Clone, Copy)]
pub struct StepRef<'a> {
    pub module: &'a ModuleDefinition,
    pub step: &'a StepDefinition,
}

impl<'a> StepRef<'a> {
    pub fn input_shape(&self) -> &'a RecordShape {
        &self.step.input_shape
    }

    pub fn output_shape(&self) -> &'a RecordShape {
        &self.step.output_shape
    }

    /// `module.step`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module.name, self.step.name)
    }
}

/// Raíz de la configuración cargada.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub(crate) modules: Vec<ModuleDefinition>,
    pub(crate) definition_hash: String,
}

impl PipelineConfig {
    pub fn modules(&self) -> &[ModuleDefinition] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDefinition> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn step(&self, module: &str, step: &str) -> Option<StepRef<'_>> {
        let module = self.module(module)?;
        let step = module.step(step)?;
        Some(StepRef { module, step })
    }

    /// Todos los steps registrados en orden de declaración.
    pub fn steps(&self) -> impl Iterator<Item = StepRef<'_>> {
        self.modules
            .iter()
            .flat_map(|module| module.steps.iter().map(move |step| StepRef { module, step }))
    }

    pub fn step_count(&self) -> usize {
        self.modules.iter().map(|m| m.steps.len()).sum()
    }

    /// Hash canónico del documento del que se cargó la configuración.
    pub fn definition_hash(&self) -> &str {
        &self.definition_hash
    }

    /// `(step calificado, referencia)` por cada referencia que quedó sin
    /// resolver. Útil para quien quiera validar estrictamente tras cargar.
    pub fn unresolved_references(&self) -> Vec<(String, String)> {
        self.steps()
            .flat_map(|s| {
                let name = s.qualified_name();
                s.input_shape()
                 .unresolved_references()
                 .into_iter()
                 .chain(s.output_shape().unresolved_references())
                 .map(move |r| (name.clone(), r))
                 .collect::<Vec<_>>()
            })
            .collect()
    }
}
