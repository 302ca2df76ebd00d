//! Canonical JSON mínimo: claves ordenadas, sin espacios.
//!
//! Con `preserve_order` activo los mapas conservan el orden de declaración, así
//! que el hashing debe pasar por aquí para ser independiente de ese orden.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(_) => value.to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let tree: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = tree.into_iter()
                                         .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                                         .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let v = json!({"b": {"y": 1, "x": [true, null]}, "a": "q\"uote"});
        assert_eq!(to_canonical_json(&v), r#"{"a":"q\"uote","b":{"x":[true,null],"y":1}}"#);
    }
}
