//! Change detection: identity and structural equality of values.

use crate::types::{Composite, Value};

/// Map key skipped by [`deep_equal`].
///
/// UI frameworks store back-references to their owning component under this
/// key; the metadata is cyclic and never relevant to the user's data.
pub const DEFAULT_SKIP_KEY: &str = "_owner";

/// Reference/primitive identity (strict equality).
///
/// Objects and opaque values are identical only when they are the same
/// allocation. NaN is not identical to itself.
pub fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Structural equality, skipping [`DEFAULT_SKIP_KEY`] in maps.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    deep_equal_skipping(a, b, Some(DEFAULT_SKIP_KEY))
}

/// Structural equality.
///
/// Rules, in order:
/// 1. identical values are equal;
/// 2. a map never equals a list, and opaque values only equal themselves;
/// 3. lists are equal when they have the same length and pairwise equal items;
/// 4. maps are equal when they have the same key set and pairwise equal
///    values, except that the value under `skip_key` is not compared;
/// 5. NaN equals NaN.
///
/// There is no cycle detection: comparing two distinct self-referential
/// structures recurses without bound.
pub fn deep_equal_skipping(a: &Value, b: &Value, skip_key: Option<&str>) -> bool {
    if identical(a, b) {
        return true;
    }

    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let left = x.read();
            let right = y.read();
            composite_equal(&left, &right, skip_key)
        }
        (Value::Number(x), Value::Number(y)) => x.is_nan() && y.is_nan(),
        _ => false,
    }
}

fn composite_equal(a: &Composite, b: &Composite, skip_key: Option<&str>) -> bool {
    match (a, b) {
        (Composite::List(x), Composite::List(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|(l, r)| deep_equal_skipping(l, r, skip_key))
        }
        (Composite::Map(x), Composite::Map(y)) => {
            if x.len() != y.len() {
                return false;
            }
            x.iter().all(|(key, l)| {
                let Some(r) = y.get(key) else {
                    return false;
                };
                skip_key == Some(key.as_str()) || deep_equal_skipping(l, r, skip_key)
            })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectRef, Opaque};
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_identical_objects_compare_by_reference() {
        let obj = ObjectRef::new_map();
        let a = Value::from(obj.clone());
        let b = Value::from(obj);

        assert!(identical(&a, &b));
        assert!(!identical(&v(json!({})), &v(json!({}))));
    }

    #[test]
    fn test_structurally_equal_maps() {
        assert!(deep_equal(&v(json!({"a": 1, "b": [1, 2]})), &v(json!({"b": [1, 2], "a": 1}))));
        assert!(!deep_equal(&v(json!({"a": 1})), &v(json!({"a": 2}))));
        assert!(!deep_equal(&v(json!({"a": 1})), &v(json!({"a": 1, "b": 1}))));
        assert!(!deep_equal(&v(json!({"a": 1})), &v(json!({"b": 1}))));
    }

    #[test]
    fn test_lists_compare_length_and_order() {
        assert!(deep_equal(&v(json!([1, {"x": true}])), &v(json!([1, {"x": true}]))));
        assert!(!deep_equal(&v(json!([1, 2])), &v(json!([2, 1]))));
        assert!(!deep_equal(&v(json!([1])), &v(json!([1, 1]))));
    }

    #[test]
    fn test_map_never_equals_list() {
        assert!(!deep_equal(&v(json!({})), &v(json!([]))));
        assert!(!deep_equal(&v(json!({"0": 1})), &v(json!([1]))));
    }

    #[test]
    fn test_nan_is_deep_equal_but_not_identical() {
        let nan = Value::Number(f64::NAN);
        assert!(!identical(&nan, &nan.clone()));
        assert!(deep_equal(&nan, &nan.clone()));
        assert!(deep_equal(&v(json!({"x": null})), &v(json!({"x": null}))));
    }

    #[test]
    fn test_skip_key_value_is_ignored() {
        let a = v(json!({"name": "row", "_owner": {"id": 1}}));
        let b = v(json!({"name": "row", "_owner": {"id": 2}}));

        assert!(deep_equal(&a, &b));
        assert!(!deep_equal_skipping(&a, &b, None));
        // presence still has to match
        assert!(!deep_equal(&a, &v(json!({"name": "row", "other": 1}))));
    }

    #[test]
    fn test_opaque_values_compare_by_identity() {
        let handle = Opaque::new(String::from("socket"));
        let same = Value::from(handle.clone());

        assert!(deep_equal(&Value::from(handle), &same));
        assert!(!deep_equal(
            &Value::from(Opaque::new(1u32)),
            &Value::from(Opaque::new(1u32))
        ));
    }

    #[test]
    fn test_shared_subtree_compares_without_deadlock() {
        let shared = v(json!({"x": [1, 2, 3]}));
        let a = Value::list([shared.clone(), shared.clone()]);
        let b = Value::list([shared.clone(), shared]);

        assert!(deep_equal(&a, &b));
    }
}
