//! Schema validation for model output.
//!
//! Model responses are dynamic JSON and must be validated at the provider
//! boundary — unvalidated payloads never cross into pipeline logic. A
//! payload that cannot produce an array at all is an [`Error::Schema`];
//! individual malformed items inside a valid array are dropped and counted,
//! never aborting the batch for one bad element.

use serde::de::DeserializeOwned;
use tracing::warn;

use gloss_core::{Error, Result};

/// Extract the JSON payload from a raw model response.
///
/// Strips markdown code fences and any pre/post-amble, returning the
/// substring from the first opening bracket/brace to the matching last
/// closing one.
pub fn extract_json_payload(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();

    // Strip ``` fences if present.
    let inner = if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest)
    } else {
        trimmed
    };

    let start = inner
        .find(['[', '{'])
        .ok_or_else(|| Error::Schema("No JSON payload in model response".to_string()))?;
    let end = inner
        .rfind([']', '}'])
        .ok_or_else(|| Error::Schema("Unterminated JSON payload in model response".to_string()))?;
    if end < start {
        return Err(Error::Schema(
            "Malformed JSON payload in model response".to_string(),
        ));
    }
    Ok(inner[start..=end].trim())
}

/// Parse a model response as a JSON array of `T`.
///
/// Accepts either a bare array or an object wrapping one array value (the
/// usual `{"items": [...]}` shape models produce in JSON mode). Returns the
/// successfully validated items plus the count of dropped ones.
pub fn parse_json_array<T: DeserializeOwned>(raw: &str) -> Result<(Vec<T>, usize)> {
    let payload = extract_json_payload(raw)?;
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| Error::Schema(format!("Invalid JSON in model response: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                serde_json::Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| Error::Schema("Expected a JSON array in model response".to_string()))?,
        _ => {
            return Err(Error::Schema(
                "Expected a JSON array in model response".to_string(),
            ))
        }
    };

    let total = items.len();
    let mut parsed = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(value) => parsed.push(value),
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "schema",
                    index,
                    error = %e,
                    "Dropping schema-invalid item from model response"
                );
            }
        }
    }
    let dropped = total - parsed.len();
    Ok((parsed, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        index: usize,
        score: f32,
    }

    #[test]
    fn test_extract_bare_json() {
        let raw = r#"[{"index": 0}]"#;
        assert_eq!(extract_json_payload(raw).unwrap(), raw);
    }

    #[test]
    fn test_extract_fenced_json() {
        let raw = "```json\n[{\"index\": 0}]\n```";
        assert_eq!(extract_json_payload(raw).unwrap(), r#"[{"index": 0}]"#);
    }

    #[test]
    fn test_extract_with_preamble() {
        let raw = "Here are the results:\n[{\"index\": 1}]\nHope that helps!";
        assert_eq!(extract_json_payload(raw).unwrap(), r#"[{"index": 1}]"#);
    }

    #[test]
    fn test_extract_no_json_is_schema_error() {
        let result = extract_json_payload("I could not find any spans.");
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_parse_array_all_valid() {
        let raw = r#"[{"index": 0, "score": 0.9}, {"index": 1, "score": 0.4}]"#;
        let (items, dropped) = parse_json_array::<Item>(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(dropped, 0);
        assert_eq!(items[1], Item { index: 1, score: 0.4 });
    }

    #[test]
    fn test_parse_array_drops_invalid_items() {
        let raw = r#"[{"index": 0, "score": 0.9}, {"wrong": true}, {"index": 2, "score": 0.7}]"#;
        let (items, dropped) = parse_json_array::<Item>(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_parse_wrapped_object() {
        let raw = r#"{"items": [{"index": 0, "score": 1.0}]}"#;
        let (items, dropped) = parse_json_array::<Item>(raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_parse_non_array_is_schema_error() {
        let result = parse_json_array::<Item>(r#"{"index": 0, "score": 1.0}"#);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_parse_garbage_is_schema_error() {
        let result = parse_json_array::<Item>("[{not json at all");
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_parse_empty_array() {
        let (items, dropped) = parse_json_array::<Item>("[]").unwrap();
        assert!(items.is_empty());
        assert_eq!(dropped, 0);
    }
}
