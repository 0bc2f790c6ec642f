//! Locating and decoding the JSON object in raw model output.
//!
//! Models asked for JSON still wrap it in prose or Markdown fences. The
//! lookup order is: a ```json fence, any ``` fence, then the outermost
//! `{ … }` span of the text.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("No JSON object found in model output")]
    NoJson,

    #[error("Unclosed JSON block")]
    UnclosedBlock,

    #[error("JSON parsing failed: {0}")]
    JsonParsing(String),
}

/// Return the JSON text embedded in a model response.
pub fn extract_json_block(response: &str) -> Result<&str, ResponseError> {
    if let Some(block) = fenced_block(response, "```json")? {
        return Ok(block);
    }
    if let Some(block) = fenced_block(response, "```")? {
        if block.starts_with('{') {
            return Ok(block);
        }
    }

    let start = response.find('{').ok_or(ResponseError::NoJson)?;
    let end = response.rfind('}').ok_or(ResponseError::NoJson)?;
    if end < start {
        return Err(ResponseError::NoJson);
    }
    Ok(response[start..=end].trim())
}

fn fenced_block<'a>(response: &'a str, fence: &str) -> Result<Option<&'a str>, ResponseError> {
    let Some(fence_start) = response.find(fence) else {
        return Ok(None);
    };
    let content_start = fence_start + fence.len();
    let content_end = response[content_start..]
        .find("```")
        .ok_or(ResponseError::UnclosedBlock)?;
    Ok(Some(response[content_start..content_start + content_end].trim()))
}

/// Parse the embedded JSON object into a `serde_json::Value`.
pub fn parse_json_object(response: &str) -> Result<serde_json::Value, ResponseError> {
    let json = extract_json_block(response)?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ResponseError::JsonParsing(e.to_string()))?;
    if !value.is_object() {
        return Err(ResponseError::NoJson);
    }
    Ok(value)
}

/// Parse an array leniently: skip items that fail to deserialize.
pub(crate) fn parse_array_lenient<T: for<'de> Deserialize<'de>>(
    items: Option<&serde_json::Value>,
) -> Vec<T> {
    match items.and_then(|v| v.as_array()) {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}

/// Model confidence as an f32 clamped to [0, 1]. Accepts numbers and
/// numeric strings; anything else reads as 0.
pub(crate) fn read_confidence(value: Option<&serde_json::Value>) -> f32 {
    let raw = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    // Some models answer on a 0-100 scale.
    let scaled = if raw > 1.0 && raw <= 100.0 { raw / 100.0 } else { raw };
    if scaled.is_finite() {
        scaled.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_is_preferred() {
        let response = "Here you go:\n```json\n{\"a\": 1}\n```\nDone {not json}";
        assert_eq!(extract_json_block(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn bare_fence_accepted() {
        let response = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn bare_object_in_prose() {
        let response = "The result is {\"a\": {\"b\": 2}} as requested.";
        assert_eq!(extract_json_block(response).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn unclosed_fence_is_error() {
        assert_eq!(
            extract_json_block("```json\n{\"a\": 1}"),
            Err(ResponseError::UnclosedBlock)
        );
    }

    #[test]
    fn no_json_is_error() {
        assert_eq!(extract_json_block("I cannot read this"), Err(ResponseError::NoJson));
        assert_eq!(extract_json_block("} backwards {"), Err(ResponseError::NoJson));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            parse_json_object("{\"a\": }"),
            Err(ResponseError::JsonParsing(_))
        ));
    }

    #[test]
    fn lenient_array_skips_bad_items() {
        let value = serde_json::json!([1, "two", 3]);
        let items: Vec<u32> = parse_array_lenient(Some(&value));
        assert_eq!(items, vec![1, 3]);
        let none: Vec<u32> = parse_array_lenient(None);
        assert!(none.is_empty());
    }

    #[test]
    fn confidence_is_clamped_and_rescaled() {
        assert_eq!(read_confidence(Some(&serde_json::json!(0.92))), 0.92);
        assert_eq!(read_confidence(Some(&serde_json::json!(92))), 0.92);
        assert_eq!(read_confidence(Some(&serde_json::json!("0.5"))), 0.5);
        assert_eq!(read_confidence(Some(&serde_json::json!(-1))), 0.0);
        assert_eq!(read_confidence(Some(&serde_json::json!(250))), 1.0);
        assert_eq!(read_confidence(None), 0.0);
    }
}
