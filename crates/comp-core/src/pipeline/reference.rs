//! Resolución de referencias cross-module (`module.step`).
//!
//! Una referencia nombra el output tree de un step declarado antes en el
//! documento; `module.step.input` / `module.step.output` seleccionan
//! explícitamente. El árbol sustituido es el ya resuelto del step destino y no
//! se vuelve a escanear.

use std::collections::HashMap;

use log::warn;
use serde_json::{Map, Value};

use crate::constants::REFERENCE_SEPARATOR;

/// Field trees resueltos de un step ya registrado.
#[derive(Debug, Clone)]
pub(crate) struct StepTrees {
    pub input: Value,
    pub output: Value,
}

/// Trees conocidos, indexados por `(module, step)`.
pub(crate) type KnownTrees = HashMap<(String, String), StepTrees>;

/// Devuelve una copia de `tree` con las referencias conocidas sustituidas.
/// Las desconocidas quedan como string y el synthesizer las marca como
/// `FieldKind::Reference`.
pub(crate) fn resolve_references(tree: &Value, known: &KnownTrees) -> Value {
    match tree {
        Value::Object(map) => {
            let resolved: Map<String, Value> = map.iter()
                                                  .map(|(k, v)| (k.clone(), resolve_entry(v, known)))
                                                  .collect();
            Value::Object(resolved)
        }
        other => other.clone(),
    }
}

fn resolve_entry(definition: &Value, known: &KnownTrees) -> Value {
    match definition {
        Value::String(s) if is_reference(s) => substitute(s, known),
        Value::Array(items) => Value::Array(items.iter().map(|item| resolve_entry(item, known)).collect()),
        Value::Object(_) => resolve_references(definition, known),
        other => other.clone(),
    }
}

fn substitute(reference: &str, known: &KnownTrees) -> Value {
    match lookup(reference, known) {
        Some(tree) => tree.clone(),
        None => {
            warn!("unresolved reference `{reference}`");
            Value::String(reference.to_string())
        }
    }
}

fn lookup<'k>(reference: &str, known: &'k KnownTrees) -> Option<&'k Value> {
    let parts: Vec<&str> = reference.split(REFERENCE_SEPARATOR).map(str::trim).collect();
    let (module, step, side) = match parts.as_slice() {
        [module, step] => (*module, *step, "output"),
        [module, step, side] => (*module, *step, *side),
        _ => return None,
    };
    let trees = known.get(&(module.to_string(), step.to_string()))?;
    match side {
        "output" => Some(&trees.output),
        "input" => Some(&trees.input),
        _ => None,
    }
}

pub(crate) fn is_reference(s: &str) -> bool {
    s.contains(REFERENCE_SEPARATOR)
}
