//! Thin helpers for the two Supabase endpoints the client touches directly:
//! password sign-in and storage upload. Neither speaks the envelope format.

use serde::Deserialize;
use tracing::info;

use super::envelope::error_message;
use super::{ApiClient, ApiError, ApiRequest, Method, RawResponse};
use crate::config::Config;

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSession {
    pub access_token: String,
    /// Lifetime of `access_token` in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<SupabaseUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl SupabaseSession {
    pub fn expires_at(&self, now: chrono::DateTime<chrono::Utc>) -> Option<chrono::DateTime<chrono::Utc>> {
        self.expires_in
            .filter(|s| *s > 0)
            .map(|s| now + chrono::Duration::seconds(s))
    }
}

impl SupabaseUser {
    pub fn role(&self) -> Option<&str> {
        self.user_metadata.get("role").and_then(|v| v.as_str())
    }
}

fn project(cfg: &Config) -> Result<(&str, &str), ApiError> {
    let url = cfg
        .supabase_url
        .as_deref()
        .ok_or(ApiError::NotConfigured("CAMPUS_SUPABASE_URL"))?;
    let key = cfg
        .supabase_anon_key
        .as_deref()
        .ok_or(ApiError::NotConfigured("CAMPUS_SUPABASE_ANON_KEY"))?;
    Ok((url, key))
}

fn check(raw: RawResponse) -> Result<serde_json::Value, ApiError> {
    if raw.is_success() {
        return Ok(raw.body);
    }
    let message = raw
        .body
        .get("error_description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| error_message(&raw.body));
    Err(ApiError::from_status(raw.status, message))
}

pub fn sign_in_with_password(
    client: &ApiClient,
    cfg: &Config,
    email: &str,
    password: &str,
) -> Result<SupabaseSession, ApiError> {
    let (url, key) = project(cfg)?;
    let req = ApiRequest::new(Method::Post, format!("{url}/auth/v1/token"))
        .query("grant_type", "password")
        .header("apikey", key)
        .json(serde_json::json!({ "email": email, "password": password }));
    let body = check(client.send_raw(req)?)?;
    let session: SupabaseSession =
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    info!(user = ?session.user.as_ref().map(|u| u.id.as_str()), "signed in");
    Ok(session)
}

/// Object path inside the bucket: a fresh uuid keeps re-uploads of the same
/// file name from colliding.
pub fn object_path(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}", uuid::Uuid::new_v4(), safe)
}

pub fn public_url(cfg: &Config, bucket: &str, path: &str) -> Result<String, ApiError> {
    let (url, _) = project(cfg)?;
    Ok(format!("{url}/storage/v1/object/public/{bucket}/{path}"))
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

/// Uploads `bytes` to `bucket` and returns the object's public URL.
pub fn upload_object(
    client: &ApiClient,
    cfg: &Config,
    bucket: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String, ApiError> {
    let (url, key) = project(cfg)?;
    let path = object_path(file_name);
    let mut req = ApiRequest::new(Method::Post, format!("{url}/storage/v1/object/{bucket}/{path}"))
        .header("apikey", key)
        .bytes(content_type_for(file_name), bytes);
    let bearer = client.token().unwrap_or(key);
    req = req.header("authorization", format!("Bearer {bearer}"));
    check(client.send_raw(req)?)?;
    info!(bucket, path = %path, "uploaded object");
    public_url(cfg, bucket, &path)
}
