//! Step Executor.
//!
//! Por invocación:
//! `VALIDATE_INPUT -> CACHE_LOOKUP -> {hit -> DONE | miss -> COMPUTE ->
//! VALIDATE_OUTPUT -> PERSIST -> DONE}`.
//!
//! Repetir una ejecución con el mismo run y el mismo input lógico nunca vuelve
//! a invocar el cuerpo del step. El único estado compartido entre
//! invocaciones es la configuración inmutable y el cache store.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::transform::{StepOutput, StepTransform};
use crate::errors::{EngineError, StepError, StoreError, ValidationError};
use crate::pipeline::{PipelineConfig, StepRef};
use crate::schema::{coerce_record, RecordShape};
use crate::store::{sanitize_key, CacheStore, RunId, StepLayout};

/// Cómo se obtuvo el registro devuelto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    CacheHit,
    Computed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub record: Value,
    pub outcome: ExecutionOutcome,
    /// Clave de cache (ya saneada) del input.
    pub key: String,
}

/// `.index.yaml` de un output tipo lista: claves de los items en orden y los
/// campos que no son el item field.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ListIndex {
    items: Vec<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

pub struct StepExecutor<'a, S: CacheStore + ?Sized> {
    config: &'a PipelineConfig,
    store: &'a S,
    run: RunId,
}

impl<'a, S: CacheStore + ?Sized> StepExecutor<'a, S> {
    /// Abre el run en el store (escribe su manifiesto si es nuevo).
    pub fn new(config: &'a PipelineConfig, store: &'a S, run: RunId) -> Result<Self, EngineError> {
        store.begin_run(&run)?;
        Ok(Self { config, store, run })
    }

    pub fn config(&self) -> &'a PipelineConfig {
        self.config
    }

    pub fn run_id(&self) -> &RunId {
        &self.run
    }

    pub fn step(&self, module: &str, step: &str) -> Result<StepRef<'a>, EngineError> {
        self.config.step(module, step).ok_or_else(|| EngineError::UnknownStep { module: module.to_string(),
                                                                                   step: step.to_string() })
    }

    pub fn execute<T>(&self, step: StepRef<'_>, transform: &T, input: &Value) -> Result<Value, StepError<T::Error>>
        where T: StepTransform + ?Sized
    {
        self.execute_traced(step, transform, input).map(|e| e.record)
    }

    pub fn execute_traced<T>(&self,
                             step: StepRef<'_>,
                             transform: &T,
                             input: &Value)
                             -> Result<Executed, StepError<T::Error>>
        where T: StepTransform + ?Sized
    {
        let name = step.qualified_name();
        let input = coerce_record(step.input_shape(), input).map_err(EngineError::from)?;

        let key = transform.cache_key(&input)
                           .and_then(|k| sanitize_key(&k))
                           .ok_or_else(|| cannot_derive(step, "naming function produced no key for input"))?;
        let layout = StepLayout::new(&self.run, step);

        if let Some(record) = self.lookup(step, &layout, &key)? {
            debug!("{name}[{key}]: cache hit");
            return Ok(Executed { record,
                                 outcome: ExecutionOutcome::CacheHit,
                                 key });
        }

        debug!("{name}[{key}]: cache miss, computing");
        let raw = transform.compute(&input).map_err(StepError::Compute)?;
        let output = coerce_output(step.output_shape(), raw).map_err(EngineError::from)?;
        self.persist(step, &layout, transform, &key, &input, &output)?;
        info!("{name}[{key}]: computed and persisted");

        Ok(Executed { record: output,
                      outcome: ExecutionOutcome::Computed,
                      key })
    }

    fn lookup(&self, step: StepRef<'_>, layout: &StepLayout, key: &str) -> Result<Option<Value>, EngineError> {
        let shape = step.output_shape();
        let cached = match shape.item_field() {
            None => self.store.read(&layout.output_entry(key))?,
            Some(item_field) => self.read_list_output(layout, key, &item_field.name)?,
        };
        let Some(cached) = cached else {
            return Ok(None);
        };

        match coerce_record(shape, &cached) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("{}[{key}]: cached output no longer matches its shape, recomputing: {e}",
                      step.qualified_name());
                Ok(None)
            }
        }
    }

    fn read_list_output(&self, layout: &StepLayout, key: &str, item_field: &str) -> Result<Option<Value>, EngineError> {
        let Some(raw) = self.store.read(&layout.list_index(key))? else {
            return Ok(None);
        };
        let index: ListIndex = match serde_json::from_value(raw) {
            Ok(index) => index,
            Err(e) => {
                warn!("{}: unreadable list index, recomputing: {e}", layout.dir().display());
                return Ok(None);
            }
        };
        let mut items = Vec::with_capacity(index.items.len());
        for item_key in &index.items {
            match self.store.read(&layout.item_entry(key, item_key))? {
                Some(item) => items.push(item),
                None => {
                    warn!("{}: index lists `{item_key}` but the entry is gone", layout.dir().display());
                    return Ok(None);
                }
            }
        }

        let mut record = index.fields;
        record.insert(item_field.to_string(), Value::Array(items));
        Ok(Some(Value::Object(record)))
    }

    fn persist<T>(&self,
                  step: StepRef<'_>,
                  layout: &StepLayout,
                  transform: &T,
                  key: &str,
                  input: &Value,
                  output: &Value)
                  -> Result<(), EngineError>
        where T: StepTransform + ?Sized
    {
        let Some(item_field) = step.output_shape().item_field() else {
            self.store.write(&layout.output_entry(key), output)?;
            self.store.write(&layout.input_entry(key), input)?;
            // Copia del último registro en input.yaml/output.yaml; nunca se
            // consulta en el lookup.
            if let Some((input_copy, output_copy)) = layout.latest_entries() {
                self.store.write(&output_copy, output)?;
                self.store.write(&input_copy, input)?;
            }
            return Ok(());
        };

        let mut fields = output.as_object().cloned().unwrap_or_default();
        let items = match fields.remove(&item_field.name) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let mut item_keys: Vec<String> = Vec::with_capacity(items.len());
        for item in &items {
            let item_key = transform.item_key(item)
                                    .and_then(|k| sanitize_key(&k))
                                    .ok_or_else(|| cannot_derive(step, "naming function produced no key for output item"))?;
            if item_keys.contains(&item_key) {
                return Err(cannot_derive(step, format!("duplicate output item key `{item_key}`")));
            }
            item_keys.push(item_key);
        }

        for (item, item_key) in items.iter().zip(&item_keys) {
            self.store.write(&layout.item_entry(key, item_key), item)?;
        }
        // El índice va al final: sin él el output no cuenta como persistido.
        let index_path = layout.list_index(key);
        let index = serde_json::to_value(ListIndex { items: item_keys, fields }).map_err(|e| {
                                                                                    StoreError::Encode { path: index_path.clone(),
                                                                                                         reason: e.to_string() }
                                                                                })?;
        self.store.write(&index_path, &index)?;
        self.store.write(&layout.input_entry(key), input)?;
        Ok(())
    }
}

/// VALIDATE_OUTPUT: convierte lo devuelto por el cuerpo en un registro del
/// output shape.
pub fn coerce_output(shape: &RecordShape, raw: StepOutput) -> Result<Value, ValidationError> {
    let value = match raw {
        StepOutput::Record(v) => v,
        StepOutput::Records(items) => wrap_items(shape, items)?,
        StepOutput::Text(text) => match parse_text(shape, &text)? {
            Value::Array(items) => wrap_items(shape, items)?,
            other => other,
        },
    };
    coerce_record(shape, &value)
}

fn wrap_items(shape: &RecordShape, items: Vec<Value>) -> Result<Value, ValidationError> {
    let field = shape.item_field()
                     .ok_or_else(|| ValidationError::new(shape.name(), "", "got a list of records for a singular shape"))?;
    let mut map = Map::new();
    map.insert(field.name.clone(), Value::Array(items));
    Ok(Value::Object(map))
}

fn parse_text(shape: &RecordShape, text: &str) -> Result<Value, ValidationError> {
    serde_yaml::from_str(strip_code_fence(text)).map_err(|e| ValidationError::new(shape.name(),
                                                                                 "",
                                                                                 format!("unparseable text output: {e}")))
}

/// Quita un code fence Markdown envolvente (```yaml ... ```), si lo hay.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn cannot_derive(step: StepRef<'_>, reason: impl Into<String>) -> EngineError {
    EngineError::CannotDeriveCacheKey { module: step.module.name.clone(),
                                        step: step.step.name.clone(),
                                        reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::synthesize;
    use serde_json::json;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```yaml\na: 1\n```"), "a: 1");
        assert_eq!(strip_code_fence("  a: 1 "), "a: 1");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
    }

    #[test]
    fn output_forms_are_coerced() {
        let list = synthesize("o", &json!({"checks[]": {"id": "string"}, "total": "integer"})).unwrap();
        let from_records = coerce_output(&list, StepOutput::Records(vec![json!({"id": "a"})])).unwrap();
        assert_eq!(from_records, json!({"checks": [{"id": "a"}], "total": 0}));

        let from_text = coerce_output(&list, StepOutput::Text("```yaml\n- id: a\n- id: b\n```".into())).unwrap();
        assert_eq!(from_text["checks"], json!([{"id": "a"}, {"id": "b"}]));

        let single = synthesize("o", &json!({"y": "integer"})).unwrap();
        assert_eq!(coerce_output(&single, StepOutput::Text("{\"y\": \"5\"}".into())).unwrap(), json!({"y": 5}));
        assert!(coerce_output(&single, StepOutput::Records(vec![])).is_err());
        assert!(coerce_output(&single, StepOutput::Text("y: [".into())).is_err());
        assert!(coerce_output(&single, StepOutput::Record(json!({"y": "five"}))).is_err());
    }
}
