//! Coerción de registros a un `RecordShape`.
//!
//! La coerción es laxa: enteros desde floats integrales o strings numéricos,
//! booleanos desde `true/false/yes/no/1/0`, `null` equivale a campo ausente en
//! primitivos y listas. Las claves extra se descartan. El resultado respeta el
//! orden de campos del shape.

use log::debug;
use serde_json::{Map, Value};

use super::shape::{FieldKind, PrimitiveType, RecordShape};
use crate::errors::ValidationError;

/// Coacciona `value` al shape. Falla si el shape contiene referencias sin
/// resolver, aunque el registro no use esos campos.
pub fn coerce_record(shape: &RecordShape, value: &Value) -> Result<Value, ValidationError> {
    if let Some(reference) = shape.unresolved_references().into_iter().next() {
        return Err(ValidationError::new(shape.name(), "", format!("unresolved reference `{reference}`")));
    }
    coerce_object(shape, value, "")
}

fn coerce_object(shape: &RecordShape, value: &Value, path: &str) -> Result<Value, ValidationError> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(ValidationError::new(shape.name(),
                                            path,
                                            format!("expected mapping, found {}", type_name(other))))
        }
    };

    let mut out = Map::with_capacity(shape.len());
    for field in shape.fields() {
        let field_path = if path.is_empty() { field.name.clone() } else { format!("{path}.{}", field.name) };
        let coerced = match map.get(&field.name) {
            None | Some(Value::Null) => field.default_value(),
            Some(v) => coerce_kind(shape.name(), &field.kind, v, &field_path)?,
        };
        out.insert(field.name.clone(), coerced);
    }

    for extra in map.keys().filter(|k| shape.field(k).is_none()) {
        debug!("{}: dropping undeclared field `{extra}`", shape.name());
    }
    Ok(Value::Object(out))
}

fn coerce_kind(shape: &str, kind: &FieldKind, value: &Value, path: &str) -> Result<Value, ValidationError> {
    match kind {
        FieldKind::Primitive(p) => coerce_primitive(shape, *p, value, path),
        FieldKind::Object(nested) => coerce_object(nested, value, path),
        FieldKind::List(inner) => match value {
            Value::Array(items) => items.iter()
                                        .enumerate()
                                        .map(|(i, item)| coerce_kind(shape, inner, item, &format!("{path}[{i}]")))
                                        .collect::<Result<Vec<_>, _>>()
                                        .map(Value::Array),
            other => Err(ValidationError::new(shape, path, format!("expected sequence, found {}", type_name(other)))),
        },
        FieldKind::Reference(r) => Err(ValidationError::new(shape, path, format!("unresolved reference `{r}`"))),
    }
}

fn coerce_primitive(shape: &str, p: PrimitiveType, value: &Value, path: &str) -> Result<Value, ValidationError> {
    let coerced = match (p, value) {
        (PrimitiveType::Any, v) => Some(v.clone()),
        (PrimitiveType::String, Value::String(_)) => Some(value.clone()),
        (PrimitiveType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(value.clone())
            } else {
                n.as_f64()
                 .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                 .map(|f| Value::from(f as i64))
            }
        }
        (PrimitiveType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (PrimitiveType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (PrimitiveType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (PrimitiveType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        (PrimitiveType::Object, Value::Object(_)) => Some(value.clone()),
        (PrimitiveType::List, Value::Array(_)) => Some(value.clone()),
        _ => None,
    };
    coerced.ok_or_else(|| ValidationError::new(shape, path, format!("expected {}, found {}", p.name(), type_name(value))))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::synthesize;
    use serde_json::json;

    fn shape() -> RecordShape {
        synthesize("m.s.input",
                   &json!({
                       "name": "string",
                       "count": "integer",
                       "enabled": "boolean",
                       "controls[]": {"id": "string", "weight": "integer"},
                       "meta": {"source": "string"},
                       "extra": "any"
                   })).unwrap()
    }

    #[test]
    fn missing_fields_get_defaults_in_shape_order() {
        let out = coerce_record(&shape(), &json!({"enabled": true})).unwrap();
        assert_eq!(out,
                   json!({"name": "", "count": 0, "enabled": true, "controls": [], "meta": null, "extra": null}));
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "count", "enabled", "controls", "meta", "extra"]);
    }

    #[test]
    fn lax_coercions() {
        let out = coerce_record(&shape(),
                                &json!({"count": "42", "enabled": "yes", "controls": [{"id": "c1", "weight": 2.0}]})).unwrap();
        assert_eq!(out["count"], json!(42));
        assert_eq!(out["enabled"], json!(true));
        assert_eq!(out["controls"][0]["weight"], json!(2));
    }

    #[test]
    fn wrong_primitive_reports_path() {
        let err = coerce_record(&shape(), &json!({"controls": [{"id": "c1"}, {"id": 7}]})).unwrap_err();
        assert_eq!(err.path, "controls[1].id");
        assert_eq!(err.shape, "m.s.input.controls");
        assert!(err.reason.contains("expected string"));
    }

    #[test]
    fn non_mapping_nested_object_fails() {
        let err = coerce_record(&shape(), &json!({"meta": "oops"})).unwrap_err();
        assert_eq!(err.path, "meta");
    }

    #[test]
    fn extra_keys_are_dropped() {
        let out = coerce_record(&shape(), &json!({"name": "x", "surprise": 1})).unwrap();
        assert!(out.get("surprise").is_none());
    }

    #[test]
    fn unresolved_reference_always_fails() {
        let s = synthesize("s", &json!({"x": "string", "items[]": "missing.step"})).unwrap();
        let err = coerce_record(&s, &json!({"x": "a"})).unwrap_err();
        assert!(err.reason.contains("missing.step"));
    }
}
