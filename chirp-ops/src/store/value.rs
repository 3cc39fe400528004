//! Codec between plain JSON and the store's typed value encoding.
//!
//! The REST API wraps every value in a single-key object naming its type,
//! e.g. `{"stringValue": "hi"}` or `{"integerValue": "42"}` (64-bit integers
//! travel as decimal strings).

use serde_json::{json, Map, Number, Value};

use super::{Document, StoreError, StoreResult};

/// Encode a JSON value into its typed representation
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode top-level document fields
pub fn encode_fields(document: &Document) -> Value {
    let fields: Map<String, Value> = document
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(fields)
}

/// Decode a typed value back into plain JSON
pub fn decode_value(value: &Value) -> StoreResult<Value> {
    let map = value
        .as_object()
        .ok_or_else(|| invalid(format!("typed value must be an object: {}", value)))?;
    let (kind, inner) = map
        .iter()
        .next()
        .ok_or_else(|| invalid("typed value has no type key".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(format!("bad booleanValue: {}", inner))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| invalid(format!("bad integerValue: {}", inner)))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            // NaN and infinities have no JSON form
            Ok(parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| invalid(format!("bad {}: {}", kind, inner))),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<StoreResult<Vec<_>>>()?,
                // Empty arrays omit `values`
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(Value::Object(fields)) => decode_fields(fields)?,
                _ => Map::new(),
            };
            Ok(Value::Object(fields))
        }
        "geoPointValue" => Ok(inner.clone()),
        other => Err(invalid(format!("unknown value type: {}", other))),
    }
}

/// Decode the `fields` object of a document
pub fn decode_fields(fields: &Map<String, Value>) -> StoreResult<Document> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Final path segment of a full document resource name
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn invalid(message: String) -> StoreError {
    StoreError::InvalidResponse(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_travel_as_strings() {
        assert_eq!(encode_value(&json!(42)), json!({ "integerValue": "42" }));
        assert_eq!(
            decode_value(&json!({ "integerValue": "-7" })).expect("decode"),
            json!(-7)
        );
    }

    #[test]
    fn test_nested_document_survives_encoding() {
        let original = json!({
            "handle": "testuser1",
            "interests": ["sports", "science"],
            "reputation": 12,
            "velocity": 2.5,
            "bio": null,
            "profile": { "verified": false, "links": [] }
        });
        let document = original.as_object().expect("object").clone();

        let encoded = encode_fields(&document);
        assert_eq!(encoded["interests"]["arrayValue"]["values"][1]["stringValue"], "science");

        let decoded = decode_fields(encoded.as_object().expect("object")).expect("decode");
        assert_eq!(Value::Object(decoded), original);
    }

    #[test]
    fn test_decodes_server_only_types() {
        assert_eq!(
            decode_value(&json!({ "timestampValue": "2024-05-01T10:00:00Z" })).expect("decode"),
            json!("2024-05-01T10:00:00Z")
        );
        assert_eq!(
            decode_value(&json!({ "arrayValue": {} })).expect("decode"),
            json!([])
        );
        assert_eq!(
            decode_value(&json!({ "doubleValue": "NaN" })).expect("decode"),
            Value::Null
        );
    }

    #[test]
    fn test_rejects_unknown_types() {
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
        assert!(decode_value(&json!("bare")).is_err());
    }

    #[test]
    fn test_document_id_from_name() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/users/abc"),
            "abc"
        );
        assert_eq!(document_id("abc"), "abc");
    }
}
