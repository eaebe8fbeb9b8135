use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::envelope::error_message;
use super::{ApiError, ApiRequest, Envelope, Method, RawResponse, Transport};

/// Envelope-aware client for the REST backend. Holds the session token so
/// every call made through it is authenticated the same way.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.trim().is_empty());
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let mut req = ApiRequest::new(Method::Get, self.url(path));
        for (k, v) in query {
            req = req.query(k, *v);
        }
        self.call(req)
    }

    pub fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call_with_body(Method::Post, path, body)
    }

    pub fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call_with_body(Method::Put, path, body)
    }

    pub fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call_with_body(Method::Patch, path, body)
    }

    pub fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.call(ApiRequest::new(Method::Delete, self.url(path)))
    }

    /// Sends a request that does not follow the envelope convention
    /// (storage, auth). Status checking is left to the caller.
    pub fn send_raw(&self, req: ApiRequest) -> Result<RawResponse, ApiError> {
        self.transport.send(req)
    }

    fn call_with_body<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.call(ApiRequest::new(method, self.url(path)).json(body))
    }

    fn call<T: DeserializeOwned>(&self, mut req: ApiRequest) -> Result<T, ApiError> {
        if let Some(token) = &self.token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let method = req.method;
        let url = req.url.clone();
        let raw = self.transport.send(req)?;

        if !raw.is_success() {
            warn!(method = method.as_str(), url = %url, status = raw.status, "backend request failed");
            return Err(ApiError::from_status(raw.status, error_message(&raw.body)));
        }
        // 204 and other empty bodies carry no envelope
        if raw.body.is_null() {
            return serde_json::from_value(serde_json::Value::Null).map_err(|e| ApiError::Decode(e.to_string()));
        }

        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(raw.body).map_err(|e| ApiError::Decode(e.to_string()))?;
        envelope.into_result()
    }
}
