//! Wire formats of the analysis service responses.

use serde::Deserialize;
use serde_json::Value;

use super::GENERIC_FAILURE;
use crate::models::AnalysisResult;

/// Message used when an error response body can't be parsed at all.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// Derive the user-visible message from an error response body.
///
/// - unparsable body: "Unknown error"
/// - `detail` missing, null or empty: the generic failure message
/// - `detail` string: used verbatim
/// - any other `detail` (e.g. a list of validation errors): compact JSON
pub fn error_message(body: &[u8]) -> String {
    let parsed: ErrorBody = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(_) => return UNKNOWN_ERROR.to_string(),
    };

    match parsed.detail {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::String(_)) | Some(Value::Null) | None => GENERIC_FAILURE.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Parse a success body into a complete result.
pub fn parse_result(body: &[u8]) -> Result<AnalysisResult, String> {
    let result: AnalysisResult = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    result.validate()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_detail() {
        assert_eq!(
            error_message(br#"{"detail":"model unavailable"}"#),
            "model unavailable"
        );
    }

    #[test]
    fn test_error_message_unparsable() {
        assert_eq!(error_message(b"<html>502 Bad Gateway</html>"), UNKNOWN_ERROR);
        assert_eq!(error_message(b""), UNKNOWN_ERROR);
    }

    #[test]
    fn test_error_message_missing_detail() {
        assert_eq!(error_message(br#"{}"#), GENERIC_FAILURE);
        assert_eq!(error_message(br#"{"detail":""}"#), GENERIC_FAILURE);
        assert_eq!(error_message(br#"{"detail":null}"#), GENERIC_FAILURE);
    }

    #[test]
    fn test_error_message_structured_detail() {
        let msg = error_message(br#"{"detail":[{"loc":["body","file"],"msg":"field required"}]}"#);
        assert!(msg.contains("field required"));
    }

    #[test]
    fn test_parse_result_rejects_partial() {
        let body = br#"{"image":"x","emotion1":{"name":"Calm","percentage":50}}"#;
        assert!(parse_result(body).is_err());
    }

    #[test]
    fn test_parse_result_rejects_out_of_range() {
        let body = br#"{"image":"x","emotion1":{"name":"Calm","percentage":150,"emoji":":)","description":"d"}}"#;
        assert!(parse_result(body).is_err());
    }
}
