//! Response adaptation.
//!
//! Validates an upstream payload and derives its field list.

use crate::error::{FeedError, FeedResult};
use crate::json_explorer::{flatten_json, value_by_path};
use crate::types::JsonField;
use serde_json::{Map, Value};

/// A payload accepted for display together with its discovered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedResponse {
    pub data: Value,
    pub fields: Vec<JsonField>,
}

/// Accept JSON objects and arrays; reject null and bare scalars.
pub fn adapt_api_response(response: Value) -> FeedResult<AdaptedResponse> {
    if !matches!(response, Value::Object(_) | Value::Array(_)) {
        return Err(FeedError::InvalidResponseShape);
    }

    let fields = flatten_json(&response);
    Ok(AdaptedResponse {
        data: response,
        fields,
    })
}

/// Pick the selected field paths out of a payload.
///
/// Missing paths map to `null` so renderers always get one entry per path.
pub fn extract_field_values(data: &Value, paths: &[String]) -> Map<String, Value> {
    paths
        .iter()
        .map(|path| {
            let value = value_by_path(data, path).cloned().unwrap_or(Value::Null);
            (path.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_objects_and_arrays() {
        let adapted = adapt_api_response(json!({"price": 42})).unwrap();
        assert_eq!(adapted.data, json!({"price": 42}));
        assert_eq!(adapted.fields.len(), 1);

        let adapted = adapt_api_response(json!([])).unwrap();
        assert_eq!(adapted.fields.len(), 1);

        assert!(adapt_api_response(json!({})).unwrap().fields.is_empty());
    }

    #[test]
    fn test_rejects_scalars() {
        for value in [json!(null), json!(1), json!("text"), json!(true)] {
            assert_eq!(
                adapt_api_response(value),
                Err(FeedError::InvalidResponseShape)
            );
        }
    }

    #[test]
    fn test_extract_field_values() {
        let data = json!({"quote": {"price": 10.5}, "rows": [{"v": 1}]});
        let paths = vec![
            "quote.price".to_string(),
            "rows[0].v".to_string(),
            "missing".to_string(),
        ];

        let values = extract_field_values(&data, &paths);
        assert_eq!(values["quote.price"], json!(10.5));
        assert_eq!(values["rows[0].v"], json!(1));
        assert_eq!(values["missing"], Value::Null);
        assert_eq!(
            values.keys().cloned().collect::<Vec<_>>(),
            paths,
            "selection order is preserved"
        );
    }
}
