//! Merge rules applied when folding structured frames into pieces.

use serde_json::{Map, Value};

use crate::core::types::Outcome;

/// Success-merge rule: take `incoming` only when it is interpretable.
///
/// A value that is not `true`, `false` or `"skipped"` never erases a known
/// outcome.
pub fn merge_success(current: Option<Outcome>, incoming: Option<&Value>) -> Option<Outcome> {
    incoming.and_then(Outcome::from_value).or(current)
}

/// Recursive plain-object merge of `incoming` into `target`.
///
/// Nested objects merge key by key. Arrays and scalars from `incoming`
/// replace what was there. Keys present only in `target` survive.
pub fn deep_merge(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(next)) => deep_merge(existing, next),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge the `keys` of `source` (falling back to `fallback`) into `detail`.
///
/// Object values are deep-merged under their key; other values replace.
/// Missing and `null` values are skipped.
pub fn merge_detail_keys(
    detail: &mut Map<String, Value>,
    source: &Map<String, Value>,
    fallback: Option<&Map<String, Value>>,
    keys: &[&str],
) {
    for key in keys {
        let value = source
            .get(*key)
            .filter(|v| !v.is_null())
            .or_else(|| fallback.and_then(|f| f.get(*key)).filter(|v| !v.is_null()));
        let Some(value) = value else {
            continue;
        };
        let mut wrapped = Map::new();
        wrapped.insert((*key).to_string(), value.clone());
        deep_merge(detail, &wrapped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn uninterpretable_success_keeps_previous() {
        let current = Some(Outcome::Success);
        assert_eq!(merge_success(current, None), current);
        assert_eq!(merge_success(current, Some(&Value::Null)), current);
        assert_eq!(merge_success(current, Some(&json!("yes"))), current);
        assert_eq!(
            merge_success(current, Some(&json!(false))),
            Some(Outcome::Failure)
        );
        assert_eq!(
            merge_success(None, Some(&json!("skipped"))),
            Some(Outcome::Skipped)
        );
    }

    #[test]
    fn deep_merge_preserves_old_keys_and_replaces_arrays() {
        let mut target = object(json!({
            "request": { "url": "/a", "headers": { "x": "1" }, "tags": [1, 2] },
            "env": "dev"
        }));
        let incoming = object(json!({
            "request": { "headers": { "y": "2" }, "tags": [3] },
            "response": { "code": 200 }
        }));

        deep_merge(&mut target, &incoming);

        assert_eq!(
            Value::Object(target),
            json!({
                "request": { "url": "/a", "headers": { "x": "1", "y": "2" }, "tags": [3] },
                "env": "dev",
                "response": { "code": 200 }
            })
        );
    }

    #[test]
    fn deep_merge_replaces_object_with_scalar() {
        let mut target = object(json!({ "response": { "code": 200 } }));
        deep_merge(&mut target, &object(json!({ "response": "gone" })));
        assert_eq!(target["response"], json!("gone"));
    }

    #[test]
    fn detail_keys_fall_back_and_skip_nulls() {
        let mut detail = Map::new();
        let source = object(json!({ "request": { "url": "/x" }, "env": null, "other": 1 }));
        let fallback = object(json!({ "env": { "name": "qa" } }));

        merge_detail_keys(
            &mut detail,
            &source,
            Some(&fallback),
            &["request", "response", "env"],
        );

        assert_eq!(
            Value::Object(detail),
            json!({ "request": { "url": "/x" }, "env": { "name": "qa" } })
        );
    }
}
