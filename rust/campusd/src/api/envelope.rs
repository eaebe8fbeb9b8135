use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ApiError;

/// `{success, data?, error?}` wrapper every backend response uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope<serde_json::Value> {
    /// Unwraps the envelope into a typed payload. A successful envelope
    /// without `data` decodes from `null`, which suits `()` and `Option<_>`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.error.unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        let data = self.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Pulls the `error` string out of an arbitrary response body, if the body
/// looks like an envelope.
pub(crate) fn error_message(body: &serde_json::Value) -> Option<String> {
    match body.get("error") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Object(o)) => o
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => body
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_envelope_surfaces_server_error() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_value(json!({ "success": false, "error": "Plan name taken" }))
                .expect("envelope");
        let res: Result<serde_json::Value, _> = env.into_result();
        assert_eq!(res, Err(ApiError::Rejected("Plan name taken".into())));
    }

    #[test]
    fn missing_data_decodes_as_unit() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_value(json!({ "success": true })).expect("envelope");
        let res: Result<(), _> = env.into_result();
        assert!(res.is_ok());
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_value(json!({ "success": true, "data": "x" })).expect("envelope");
        let res: Result<Vec<i64>, _> = env.into_result();
        assert!(matches!(res, Err(ApiError::Decode(_))));
    }

    #[test]
    fn error_message_reads_nested_shapes() {
        assert_eq!(error_message(&json!({ "error": "boom" })).as_deref(), Some("boom"));
        assert_eq!(
            error_message(&json!({ "error": { "message": "nested" } })).as_deref(),
            Some("nested")
        );
        assert_eq!(error_message(&json!({ "message": "plain" })).as_deref(), Some("plain"));
        assert_eq!(error_message(&json!([1, 2])), None);
    }
}
