use std::marker::PhantomData;

use serde_json::Value;

/// Resultado crudo del cuerpo de un step, antes de validarlo contra el
/// output shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Un registro completo.
    Record(Value),
    /// Items de un output tipo lista; se colocan en su primer campo repetido.
    Records(Vec<Value>),
    /// Texto (YAML o JSON, opcionalmente dentro de un code fence) a parsear.
    Text(String),
}

/// Lógica de un step: naming function(s) + cuerpo de la transformación.
///
/// El motor no decide qué calcula el cuerpo; sólo valida, cachea y persiste.
/// Los errores del cuerpo se propagan sin envolver (`StepError::Compute`) y
/// el motor no reintenta.
pub trait StepTransform: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Naming function: clave estable del input ya coaccionado. `None` si el
    /// registro no permite derivarla.
    fn cache_key(&self, input: &Value) -> Option<String>;

    /// Clave de cada item de un output tipo lista.
    fn item_key(&self, item: &Value) -> Option<String> {
        self.cache_key(item)
    }

    fn compute(&self, input: &Value) -> Result<StepOutput, Self::Error>;
}

/// Lee `path` (con puntos: `control.id`) y lo convierte en clave. Sirve como
/// naming function para la mayoría de steps.
pub fn field_key(record: &Value, path: &str) -> Option<String> {
    let mut cur = record;
    for part in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match cur {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `StepTransform` a partir de un closure y campos clave. Pensado para
/// transformaciones de datos puras que no necesitan un tipo propio.
pub struct FnTransform<F, E> {
    key_field: String,
    item_key_field: Option<String>,
    body: F,
    _err: PhantomData<fn() -> E>,
}

impl<F, E> FnTransform<F, E>
    where F: Fn(&Value) -> Result<StepOutput, E> + Send + Sync,
          E: std::error::Error + Send + Sync + 'static
{
    pub fn new(key_field: impl Into<String>, body: F) -> Self {
        Self { key_field: key_field.into(),
               item_key_field: None,
               body,
               _err: PhantomData }
    }

    /// Campo clave de los items del output, si difiere del del input.
    pub fn with_item_key(mut self, field: impl Into<String>) -> Self {
        self.item_key_field = Some(field.into());
        self
    }
}

impl<F, E> StepTransform for FnTransform<F, E>
    where F: Fn(&Value) -> Result<StepOutput, E> + Send + Sync,
          E: std::error::Error + Send + Sync + 'static
{
    type Error = E;

    fn cache_key(&self, input: &Value) -> Option<String> {
        field_key(input, &self.key_field)
    }

    fn item_key(&self, item: &Value) -> Option<String> {
        field_key(item, self.item_key_field.as_deref().unwrap_or(&self.key_field))
    }

    fn compute(&self, input: &Value) -> Result<StepOutput, E> {
        (self.body)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_key_reads_dotted_paths() {
        let r = json!({"control": {"id": "1.1"}, "n": 7, "items": [{"id": "z"}], "blank": " "});
        assert_eq!(field_key(&r, "control.id").as_deref(), Some("1.1"));
        assert_eq!(field_key(&r, "n").as_deref(), Some("7"));
        assert_eq!(field_key(&r, "items.0.id").as_deref(), Some("z"));
        assert_eq!(field_key(&r, "blank"), None);
        assert_eq!(field_key(&r, "control"), None);
        assert_eq!(field_key(&r, "missing.id"), None);
    }
}
