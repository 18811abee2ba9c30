//! Proxy configuration loaded from environment-style settings.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `UPSTREAM_BASE_URL` | `http://127.0.0.1:8000/v1/chat/completions` | OpenAI-style chat endpoint |
//! | `UPSTREAM_API_KEY` | unset | Bearer key sent upstream |
//! | `UPSTREAM_MODEL` | unset | Replaces the client's model name upstream |
//! | `API_KEY` | unset | Key clients must present |
//! | `HOST` / `PORT` | `0.0.0.0` / `3456` | Listen address |
//! | `AUTO_PORT` | `false` | `true` binds port 0 |
//! | `TIMEOUT_MS` | `120000` | Upstream response deadline |
//! | `AGGREGATION_INTERVAL_MS` | `35` | Text aggregation window |
//! | `MAX_REQUESTS_PER_MINUTE` | `10` | Advisory, enforced by the HTTP layer |
//! | `TOKEN_MULTIPLIER` | `1.0` | Usage scaling, see [`TokenMultiplier`] |

mod multiplier;

pub use multiplier::TokenMultiplier;

use crate::{Error, ErrorContext, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "http://127.0.0.1:8000/v1/chat/completions";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3456;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_AGGREGATION_INTERVAL_MS: u64 = 35;
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 10;

#[derive(Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub auto_port: bool,
    pub upstream_base_url: String,
    pub upstream_api_key: Option<String>,
    pub upstream_model_override: Option<String>,
    pub client_api_key: Option<String>,
    pub request_timeout: Duration,
    pub aggregation_interval: Duration,
    pub max_requests_per_minute: u32,
    pub token_multiplier: TokenMultiplier,
}

impl ProxyConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let upstream_base_url =
            get("UPSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());
        validate_upstream_url(&upstream_base_url)?;

        let auto_port = get("AUTO_PORT").map(|v| v == "true").unwrap_or(false);
        let port = if auto_port {
            0
        } else {
            parse_number("PORT", get("PORT"), DEFAULT_PORT)?
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            auto_port,
            upstream_base_url,
            upstream_api_key: get("UPSTREAM_API_KEY"),
            upstream_model_override: get("UPSTREAM_MODEL"),
            client_api_key: get("API_KEY"),
            request_timeout: Duration::from_millis(parse_number(
                "TIMEOUT_MS",
                get("TIMEOUT_MS"),
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
            aggregation_interval: Duration::from_millis(parse_number(
                "AGGREGATION_INTERVAL_MS",
                get("AGGREGATION_INTERVAL_MS"),
                DEFAULT_AGGREGATION_INTERVAL_MS,
            )?),
            max_requests_per_minute: parse_number(
                "MAX_REQUESTS_PER_MINUTE",
                get("MAX_REQUESTS_PER_MINUTE"),
                DEFAULT_MAX_REQUESTS_PER_MINUTE,
            )?,
            token_multiplier: get("TOKEN_MULTIPLIER")
                .map(|v| TokenMultiplier::parse(&v))
                .unwrap_or_default(),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            auto_port: false,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            upstream_api_key: None,
            upstream_model_override: None,
            client_api_key: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            aggregation_interval: Duration::from_millis(DEFAULT_AGGREGATION_INTERVAL_MS),
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            token_multiplier: TokenMultiplier::IDENTITY,
        }
    }
}

// Keys stay out of logs.
impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auto_port", &self.auto_port)
            .field("upstream_base_url", &self.upstream_base_url)
            .field("upstream_api_key", &redact(&self.upstream_api_key))
            .field("upstream_model_override", &self.upstream_model_override)
            .field("client_api_key", &redact(&self.client_api_key))
            .field("request_timeout", &self.request_timeout)
            .field("aggregation_interval", &self.aggregation_interval)
            .field("max_requests_per_minute", &self.max_requests_per_minute)
            .field("token_multiplier", &self.token_multiplier)
            .finish()
    }
}

fn validate_upstream_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid upstream URL: {}", e),
            ErrorContext::new()
                .with_field_path("UPSTREAM_BASE_URL")
                .with_details(raw)
                .with_source("config_loader"),
        )
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::configuration_with_context(
            format!("unsupported upstream scheme '{}'", other),
            ErrorContext::new()
                .with_field_path("UPSTREAM_BASE_URL")
                .with_details("expected http or https")
                .with_source("config_loader"),
        )),
    }
}

fn parse_number<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|e| {
            Error::configuration_with_context(
                format!("{} must be a non-negative integer", key),
                ErrorContext::new()
                    .with_field_path(key)
                    .with_details(format!("{:?}: {}", v, e))
                    .with_source("config_loader"),
            )
        }),
    }
}
