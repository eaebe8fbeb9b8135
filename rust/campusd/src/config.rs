use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_LOGO_BUCKET: &str = "school-logos";
pub const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub logo_bucket: String,
    /// `None` leaves requests without a client-side deadline.
    pub http_timeout: Option<Duration>,
    pub page_size: usize,
    pub workspace: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            supabase_url: None,
            supabase_anon_key: None,
            logo_bucket: DEFAULT_LOGO_BUCKET.to_string(),
            http_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            page_size: DEFAULT_PAGE_SIZE,
            workspace: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let api_url = get("CAMPUS_API_URL")
            .or_else(|| get("NEXT_PUBLIC_API_URL"))
            .unwrap_or(defaults.api_url);

        let http_timeout = match get("CAMPUS_HTTP_TIMEOUT_SECS") {
            None => defaults.http_timeout,
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("CAMPUS_HTTP_TIMEOUT_SECS is not a number: {raw}"))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        let page_size = match get("CAMPUS_PAGE_SIZE") {
            None => defaults.page_size,
            Some(raw) => {
                let n: usize = raw
                    .parse()
                    .with_context(|| format!("CAMPUS_PAGE_SIZE is not a number: {raw}"))?;
                if n == 0 {
                    return Err(anyhow!("CAMPUS_PAGE_SIZE must be at least 1"));
                }
                n
            }
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            supabase_url: get("CAMPUS_SUPABASE_URL").map(|v| v.trim_end_matches('/').to_string()),
            supabase_anon_key: get("CAMPUS_SUPABASE_ANON_KEY"),
            logo_bucket: get("CAMPUS_LOGO_BUCKET").unwrap_or(defaults.logo_bucket),
            http_timeout,
            page_size,
            workspace: get("CAMPUS_WORKSPACE").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg.api_url, "http://localhost:5000");
        assert_eq!(cfg.logo_bucket, "school-logos");
        assert_eq!(cfg.page_size, 10);
        assert_eq!(cfg.http_timeout, Some(Duration::from_secs(30)));
        assert!(cfg.supabase_url.is_none());
    }

    #[test]
    fn next_public_api_url_is_a_fallback() {
        let cfg = Config::from_lookup(lookup(&[("NEXT_PUBLIC_API_URL", "http://api.local/")]))
            .expect("config");
        assert_eq!(cfg.api_url, "http://api.local");

        let cfg = Config::from_lookup(lookup(&[
            ("NEXT_PUBLIC_API_URL", "http://api.local"),
            ("CAMPUS_API_URL", "http://override"),
        ]))
        .expect("config");
        assert_eq!(cfg.api_url, "http://override");
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let cfg = Config::from_lookup(lookup(&[("CAMPUS_HTTP_TIMEOUT_SECS", "0")])).expect("config");
        assert_eq!(cfg.http_timeout, None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("CAMPUS_PAGE_SIZE", "ten")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CAMPUS_PAGE_SIZE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CAMPUS_HTTP_TIMEOUT_SECS", "-1")])).is_err());
    }
}
