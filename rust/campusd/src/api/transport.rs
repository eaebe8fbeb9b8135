use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::error::map_reqwest_error;
use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Json(serde_json::Value),
    Bytes { content_type: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn bytes(mut self, content_type: &str, bytes: Vec<u8>) -> Self {
        self.body = Some(Body::Bytes {
            content_type: content_type.to_string(),
            bytes,
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP round-trip. Implementations never retry.
pub trait Transport: Send + Sync {
    fn send(&self, req: ApiRequest) -> Result<RawResponse, ApiError>;
}

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder =
            Client::builder().user_agent(concat!("campusd/", env!("CARGO_PKG_VERSION")));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder.build().map_err(map_reqwest_error)?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: ApiRequest) -> Result<RawResponse, ApiError> {
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        debug!(method = req.method.as_str(), url = %req.url, "backend request");

        let mut builder = self.http.request(method, &req.url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        builder = match req.body {
            Some(Body::Json(v)) => builder.json(&v),
            Some(Body::Bytes {
                content_type,
                bytes,
            }) => builder.header("content-type", content_type).body(bytes),
            None => builder,
        };

        let res = builder.send().map_err(map_reqwest_error)?;
        let status = res.status().as_u16();
        let text = res.text().map_err(map_reqwest_error)?;
        // Non-JSON bodies (proxy error pages and the like) are kept as a string.
        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };
        debug!(status, "backend response");
        Ok(RawResponse { status, body })
    }
}
