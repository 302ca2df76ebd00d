use comp_core::hashing::{hash_str, hash_value, to_canonical_json};
use serde_json::json;

#[test]
fn hash_value_ignores_key_order() {
    let v = json!({"b":2, "a":{"z":1, "y":[1,2]}});
    let h = hash_value(&v);
    // blake3 hex length is 64
    assert_eq!(h.len(), 64);
    let v2 = json!({"a":{"y":[1,2], "z":1}, "b":2});
    assert_eq!(h, hash_value(&v2));
    assert_eq!(to_canonical_json(&v), to_canonical_json(&v2));
}

#[test]
fn array_order_changes_the_hash() {
    assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
    assert_eq!(hash_str("abc"), hash_str("abc"));
}
