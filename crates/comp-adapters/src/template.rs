//! Plantillas de prompt con placeholders `{{ruta.con.puntos}}`.
//!
//! El registro se aplana primero a un mapa `ruta -> texto` (`flatten_record`)
//! y la plantilla sólo consulta ese mapa. Un placeholder sin valor es un
//! error, nunca se deja literal en el prompt.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed placeholder at byte {0}")]
    Unclosed(usize),
    #[error("empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),
    #[error("record has no field `{0}`")]
    MissingField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;
        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or(TemplateError::Unclosed(offset + open))?;
            let field = after[..close].trim();
            if field.is_empty() {
                return Err(TemplateError::EmptyPlaceholder(offset + open));
            }
            segments.push(Segment::Field(field.to_string()));
            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Rutas referenciadas, en orden de aparición.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
                                Segment::Field(f) => Some(f.as_str()),
                                Segment::Text(_) => None,
                            })
    }

    pub fn render(&self, record: &Value) -> Result<String, TemplateError> {
        let flat = flatten_record(record);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(path) => {
                    let value = flat.get(path).ok_or_else(|| TemplateError::MissingField(path.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Aplana un registro: `a.b` para campos anidados, `items.0.id` para
/// elementos de secuencias. Los contenedores también aparecen, como JSON
/// compacto, para poder insertar un sub-registro completo.
pub fn flatten_record(record: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match record {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(k.clone(), v, &mut out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(i.to_string(), v, &mut out);
            }
        }
        _ => {}
    }
    out
}

fn flatten_into(path: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(format!("{path}.{k}"), v, out);
            }
            out.insert(path, value.to_string());
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(format!("{path}.{i}"), v, out);
            }
            out.insert(path, value.to_string());
        }
        Value::String(s) => {
            out.insert(path, s.clone());
        }
        Value::Null => {
            out.insert(path, String::new());
        }
        other => {
            out.insert(path, other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattening_uses_dotted_paths() {
        let flat = flatten_record(&json!({"control": {"id": "1.1", "tags": ["a", "b"]}, "n": 3, "note": null}));
        assert_eq!(flat["control.id"], "1.1");
        assert_eq!(flat["control.tags.1"], "b");
        assert_eq!(flat["control.tags"], r#"["a","b"]"#);
        assert_eq!(flat["n"], "3");
        assert_eq!(flat["note"], "");
    }

    #[test]
    fn render_substitutes_fields() {
        let tpl = PromptTemplate::parse("Control {{ control.id }}: {{control.title}}.").unwrap();
        assert_eq!(tpl.fields().collect::<Vec<_>>(), vec!["control.id", "control.title"]);
        let out = tpl.render(&json!({"control": {"id": "1.1", "title": "Disable telnet"}})).unwrap();
        assert_eq!(out, "Control 1.1: Disable telnet.");
    }

    #[test]
    fn missing_fields_and_bad_syntax_fail() {
        let tpl = PromptTemplate::parse("{{benchmark}} / {{version}}").unwrap();
        assert_eq!(tpl.render(&json!({"benchmark": "CIS"})),
                   Err(TemplateError::MissingField("version".into())));
        assert_eq!(PromptTemplate::parse("abc {{oops"), Err(TemplateError::Unclosed(4)));
        assert_eq!(PromptTemplate::parse("x{{ }}"), Err(TemplateError::EmptyPlaceholder(1)));
        assert_eq!(PromptTemplate::parse("plain").unwrap().render(&json!({})).unwrap(), "plain");
    }
}
