//! Descriptor de shape: representación data-driven de un registro tipado.
//!
//! Un `RecordShape` se sintetiza una sola vez al cargar la configuración y no
//! se muta después. Los shapes anidados se comparten vía `Arc`, de modo que
//! todos los workers de un batch leen la misma instancia sin locks.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Tipos primitivos reconocidos en un field tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Integer,
    Boolean,
    Object,
    List,
    Any,
}

impl PrimitiveType {
    /// Interpreta un nombre de tipo. `None` si no está en el set reconocido.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "integer" | "int" => Some(Self::Integer),
            "boolean" | "bool" => Some(Self::Boolean),
            "object" | "dict" => Some(Self::Object),
            "list" | "array" => Some(Self::List),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::List => "list",
            Self::Any => "any",
        }
    }

    /// Valor vacío/cero usado cuando el campo falta en el registro.
    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Integer => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::Object => Value::Object(Map::new()),
            Self::List => Value::Array(Vec::new()),
            Self::Any => Value::Null,
        }
    }
}

/// Clasificación de un campo.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive(PrimitiveType),
    /// Objeto anidado con su propio shape.
    Object(Arc<RecordShape>),
    /// Secuencia de elementos del kind interno.
    List(Box<FieldKind>),
    /// Referencia cross-module que no pudo resolverse al cargar.
    Reference(String),
}

impl FieldKind {
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Primitive(p) => p.default_value(),
            FieldKind::List(_) => Value::Array(Vec::new()),
            FieldKind::Object(_) | FieldKind::Reference(_) => Value::Null,
        }
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            FieldKind::Reference(r) => out.push(r.clone()),
            FieldKind::List(inner) => inner.collect_references(out),
            FieldKind::Object(shape) => out.extend(shape.unresolved_references()),
            FieldKind::Primitive(_) => {}
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::Primitive(p) => p.name().to_string(),
            FieldKind::Object(shape) => format!("object<{}>", shape.name()),
            FieldKind::List(inner) => format!("list<{}>", inner.describe()),
            FieldKind::Reference(r) => format!("unresolved<{r}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn is_list(&self) -> bool {
        matches!(self.kind, FieldKind::List(_))
    }

    /// Tipo primitivo del campo (o de sus elementos si es lista).
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match &self.kind {
            FieldKind::Primitive(p) => Some(*p),
            FieldKind::List(inner) => match inner.as_ref() {
                FieldKind::Primitive(p) => Some(*p),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn default_value(&self) -> Value {
        self.kind.default_value()
    }
}

/// Conjunto ordenado de campos más el flag `is_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    name: String,
    fields: IndexMap<String, FieldSpec>,
    is_list: bool,
}

impl RecordShape {
    pub(crate) fn new(name: impl Into<String>, fields: IndexMap<String, FieldSpec>) -> Self {
        let is_list = fields.values().any(FieldSpec::is_list);
        Self { name: name.into(),
               fields,
               is_list }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` si al menos un campo de primer nivel es repetido.
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Campo que contiene los items de un output tipo lista: el primer campo
    /// repetido de primer nivel.
    pub fn item_field(&self) -> Option<&FieldSpec> {
        self.fields.values().find(|f| f.is_list())
    }

    /// Referencias sin resolver en todo el árbol (incluye shapes anidados).
    pub fn unresolved_references(&self) -> Vec<String> {
        let mut out = Vec::new();
        for f in self.fields.values() {
            f.kind.collect_references(&mut out);
        }
        out
    }

    /// Registro con el valor por defecto de cada campo.
    pub fn default_record(&self) -> Value {
        let map: Map<String, Value> = self.fields
                                          .values()
                                          .map(|f| (f.name.clone(), f.default_value()))
                                          .collect();
        Value::Object(map)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for field in self.fields.values() {
            writeln!(f, "{:indent$}{}: {}", "", field.name, field.kind.describe(), indent = depth * 2)?;
            let nested = match &field.kind {
                FieldKind::Object(shape) => Some(shape),
                FieldKind::List(inner) => match inner.as_ref() {
                    FieldKind::Object(shape) => Some(shape),
                    _ => None,
                },
                _ => None,
            };
            if let Some(shape) = nested {
                shape.write_tree(f, depth + 1)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.name, if self.is_list { " (list)" } else { "" })?;
        self.write_tree(f, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_names_and_aliases() {
        assert_eq!(PrimitiveType::parse("String"), Some(PrimitiveType::String));
        assert_eq!(PrimitiveType::parse("int"), Some(PrimitiveType::Integer));
        assert_eq!(PrimitiveType::parse("dict"), Some(PrimitiveType::Object));
        assert_eq!(PrimitiveType::parse("decimal"), None);
    }

    #[test]
    fn defaults_per_kind() {
        assert_eq!(PrimitiveType::String.default_value(), Value::String(String::new()));
        assert_eq!(PrimitiveType::Integer.default_value(), Value::from(0));
        assert_eq!(FieldKind::List(Box::new(FieldKind::Primitive(PrimitiveType::String))).default_value(),
                   Value::Array(vec![]));
        assert_eq!(FieldKind::Reference("m.s".into()).default_value(), Value::Null);
    }
}
