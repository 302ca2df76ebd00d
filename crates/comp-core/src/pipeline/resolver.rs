//! Pipeline Configuration Resolver.
//!
//! Documento: `module -> step -> {input: field-tree, output: field-tree}`.
//! Módulos y steps reciben su índice por posición de declaración. Un step con
//! `input` u `output` vacío se omite sin error; quien necesite validación
//! estricta debe comprobar `step_count()` después de cargar.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::definition::{ModuleDefinition, PipelineConfig, StepDefinition};
use super::reference::{resolve_references, KnownTrees, StepTrees};
use crate::errors::EngineError;
use crate::hashing::hash_value;
use crate::schema::synthesize;

/// Origen de la configuración: ruta a un documento YAML/JSON o estructura ya
/// cargada en memoria.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Path(PathBuf),
    Document(Value),
}

impl From<&Path> for ConfigSource {
    fn from(p: &Path) -> Self {
        ConfigSource::Path(p.to_path_buf())
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(p: PathBuf) -> Self {
        ConfigSource::Path(p)
    }
}

impl From<Value> for ConfigSource {
    fn from(v: Value) -> Self {
        ConfigSource::Document(v)
    }
}

impl PipelineConfig {
    pub fn load(source: impl Into<ConfigSource>) -> Result<Self, EngineError> {
        match source.into() {
            ConfigSource::Path(path) => Self::from_path(&path),
            ConfigSource::Document(doc) => Self::from_document(&doc),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Err(EngineError::ConfigNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::ConfigParse(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_yaml_str(&text)?;
        info!("loaded pipeline {} ({} modules, {} steps)",
              path.display(),
              config.modules.len(),
              config.step_count());
        Ok(config)
    }

    /// YAML (o JSON, que es subconjunto).
    pub fn from_yaml_str(text: &str) -> Result<Self, EngineError> {
        let doc: Value = serde_yaml::from_str(text).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        Self::from_document(&doc)
    }

    pub fn from_document(doc: &Value) -> Result<Self, EngineError> {
        let root = doc.as_object()
                      .ok_or_else(|| EngineError::ConfigParse("root must map module names to steps".into()))?;

        let mut known = KnownTrees::new();
        let mut modules = Vec::with_capacity(root.len());
        for (module_index, (module_name, steps_doc)) in root.iter().enumerate() {
            check_name("module", module_name)?;
            let steps_map = steps_doc.as_object().ok_or_else(|| {
                                                      EngineError::ConfigParse(format!("module `{module_name}` must map step names to definitions"))
                                                  })?;

            let mut steps = Vec::with_capacity(steps_map.len());
            for (step_index, (step_name, step_doc)) in steps_map.iter().enumerate() {
                check_name("step", step_name)?;
                let qualified = format!("{module_name}.{step_name}");
                let def = step_doc.as_object()
                                  .ok_or_else(|| EngineError::ConfigParse(format!("step `{qualified}` must be a mapping")))?;

                let (input, output) = match (field_tree(&qualified, def, "input")?, field_tree(&qualified, def, "output")?) {
                    (Some(i), Some(o)) => (i, o),
                    _ => {
                        debug!("skipping step `{qualified}`: empty input or output");
                        continue;
                    }
                };

                let trees = StepTrees { input: resolve_references(input, &known),
                                        output: resolve_references(output, &known) };
                let input_shape = synthesize(&format!("{qualified}.input"), &trees.input)?;
                let output_shape = synthesize(&format!("{qualified}.output"), &trees.output)?;
                for r in input_shape.unresolved_references()
                                    .iter()
                                    .chain(output_shape.unresolved_references().iter())
                {
                    warn!("step `{qualified}` keeps unresolved reference `{r}`; its records will fail validation");
                }

                known.insert((module_name.clone(), step_name.clone()), trees);
                steps.push(StepDefinition { index: step_index,
                                            name: step_name.clone(),
                                            input_shape: Arc::new(input_shape),
                                            output_shape: Arc::new(output_shape) });
            }

            modules.push(ModuleDefinition { index: module_index,
                                            name: module_name.clone(),
                                            steps });
        }

        Ok(PipelineConfig { modules,
                            definition_hash: hash_value(doc) })
    }
}

/// `Some(tree)` si la clave existe y es un mapping no vacío; `None` si falta,
/// es null o está vacío; error si tiene otro tipo.
fn field_tree<'d>(qualified: &str, def: &'d Map<String, Value>, key: &str) -> Result<Option<&'d Value>, EngineError> {
    match def.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) if m.is_empty() => Ok(None),
        Some(tree @ Value::Object(_)) => Ok(Some(tree)),
        Some(other) => Err(EngineError::ConfigParse(format!("`{qualified}.{key}` must be a field tree, found `{other}`"))),
    }
}

// Los nombres terminan en rutas del cache y en referencias `module.step`.
fn check_name(what: &str, name: &str) -> Result<(), EngineError> {
    let bad = name.trim().is_empty() || name.contains(['/', '\\', '.']);
    if bad {
        return Err(EngineError::ConfigParse(format!("invalid {what} name `{name}`")));
    }
    Ok(())
}
