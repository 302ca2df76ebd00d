//! Schema Synthesizer: field tree declarativo -> `RecordShape`.
//!
//! Recorrido depth-first. Cada clave puede llevar el sufijo `[]` (campo
//! repetido); el valor es un nombre de tipo primitivo, un sub-árbol (objeto
//! anidado), un array de un solo elemento (lista de ese elemento) o una
//! referencia `module.step` que el resolver no pudo sustituir.
//!
//! Nombres de tipo desconocidos se clasifican como `any`: la configuración
//! puede traer extensiones que este motor aún no entiende.

use std::sync::Arc;

use indexmap::IndexMap;
use log::warn;
use serde_json::Value;

use super::shape::{FieldKind, FieldSpec, PrimitiveType, RecordShape};
use crate::constants::{LIST_MARKER, REFERENCE_SEPARATOR};
use crate::errors::EngineError;

/// Sintetiza el shape `name` a partir de `tree`.
pub fn synthesize(name: &str, tree: &Value) -> Result<RecordShape, EngineError> {
    let map = tree.as_object()
                  .ok_or_else(|| schema_error(name, "field tree must be a mapping"))?;

    let mut fields: IndexMap<String, FieldSpec> = IndexMap::with_capacity(map.len());
    for (raw_key, definition) in map {
        let (field_name, repeated) = split_list_marker(raw_key);
        if field_name.is_empty() {
            return Err(schema_error(name, format!("empty field name in key `{raw_key}`")));
        }

        // Prefijo del padre: dos objetos `meta` en ramas distintas no colisionan.
        let nested_name = format!("{name}.{field_name}");
        let mut kind = classify(&nested_name, definition)?;
        if repeated && !matches!(kind, FieldKind::List(_)) {
            kind = FieldKind::List(Box::new(kind));
        }

        let spec = FieldSpec { name: field_name.to_string(),
                               kind };
        if fields.insert(field_name.to_string(), spec).is_some() {
            return Err(schema_error(name, format!("field `{field_name}` declared twice")));
        }
    }
    Ok(RecordShape::new(name, fields))
}

fn classify(shape_name: &str, definition: &Value) -> Result<FieldKind, EngineError> {
    match definition {
        Value::String(s) if s.contains(REFERENCE_SEPARATOR) => Ok(FieldKind::Reference(s.clone())),
        Value::String(s) => Ok(FieldKind::Primitive(PrimitiveType::parse(s).unwrap_or_else(|| {
                                                        warn!("{shape_name}: unknown type `{s}`, treating as any");
                                                        PrimitiveType::Any
                                                    }))),
        Value::Object(_) => Ok(FieldKind::Object(Arc::new(synthesize(shape_name, definition)?))),
        Value::Array(items) => match items.as_slice() {
            [single] => Ok(FieldKind::List(Box::new(classify(shape_name, single)?))),
            _ => Err(schema_error(shape_name,
                                  format!("array definition must hold exactly one element, found {}", items.len()))),
        },
        other => Err(schema_error(shape_name, format!("unsupported field definition `{other}`"))),
    }
}

fn split_list_marker(key: &str) -> (&str, bool) {
    match key.trim().strip_suffix(LIST_MARKER) {
        Some(stripped) => (stripped.trim_end(), true),
        None => (key.trim(), false),
    }
}

fn schema_error(shape: &str, reason: impl Into<String>) -> EngineError {
    EngineError::Schema { shape: shape.to_string(),
                          reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitive_list_and_nested_fields() {
        let tree = json!({
            "benchmark": "string",
            "controls[]": {"id": "string", "severity": "integer"},
            "meta": {"source": "string"},
            "tags": ["string"]
        });
        let shape = synthesize("m.s.output", &tree).unwrap();
        assert!(shape.is_list());
        assert_eq!(shape.fields().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                   vec!["benchmark", "controls", "meta", "tags"]);
        assert_eq!(shape.field("benchmark").unwrap().primitive_type(), Some(PrimitiveType::String));
        assert_eq!(shape.item_field().unwrap().name, "controls");

        match &shape.field("controls").unwrap().kind {
            FieldKind::List(inner) => match inner.as_ref() {
                FieldKind::Object(nested) => assert_eq!(nested.name(), "m.s.output.controls"),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(shape.field("tags").unwrap().primitive_type(), Some(PrimitiveType::String));
    }

    #[test]
    fn nested_names_are_parent_prefixed() {
        let tree = json!({"a": {"meta": {"x": "string"}}, "b": {"meta": {"y": "string"}}});
        let shape = synthesize("root", &tree).unwrap();
        let names: Vec<String> = shape.fields()
                                      .map(|f| match &f.kind {
                                          FieldKind::Object(s) => match &s.field("meta").unwrap().kind {
                                              FieldKind::Object(m) => m.name().to_string(),
                                              _ => String::new(),
                                          },
                                          _ => String::new(),
                                      })
                                      .collect();
        assert_eq!(names, vec!["root.a.meta", "root.b.meta"]);
    }

    #[test]
    fn unknown_type_falls_back_to_any() {
        let shape = synthesize("s", &json!({"x": "decimal"})).unwrap();
        assert_eq!(shape.field("x").unwrap().primitive_type(), Some(PrimitiveType::Any));
        assert!(!shape.is_list());
    }

    #[test]
    fn dotted_string_is_kept_as_reference() {
        let shape = synthesize("s", &json!({"items[]": "other.step"})).unwrap();
        assert_eq!(shape.unresolved_references(), vec!["other.step".to_string()]);
    }

    #[test]
    fn structural_errors_are_schema_errors() {
        assert!(matches!(synthesize("s", &json!({"x": 3})), Err(EngineError::Schema { .. })));
        assert!(matches!(synthesize("s", &json!({"x": ["string", "integer"]})), Err(EngineError::Schema { .. })));
        assert!(matches!(synthesize("s", &json!({"[]": "string"})), Err(EngineError::Schema { .. })));
        assert!(matches!(synthesize("s", &json!({"x": "string", "x[]": "string"})),
                         Err(EngineError::Schema { .. })));
        assert!(matches!(synthesize("s", &json!("string")), Err(EngineError::Schema { .. })));
    }
}
