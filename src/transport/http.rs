use crate::config::ProxyConfig;
use crate::types::OpenAIChatRequest;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::Proxy;
use std::env;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Streaming client for the OpenAI-compatible upstream.
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        // No overall request timeout: the body is a long-lived stream. Only
        // the wait for response headers is bounded, in `send`.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("UPSTREAM_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(super::TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            url: config.upstream_base_url.clone(),
            api_key: config.upstream_api_key.clone(),
            timeout: config.request_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs `body` and returns the response body as a byte stream.
    ///
    /// The configured upstream key wins over `forwarded_key`, the key the
    /// client presented to the proxy.
    pub async fn send(
        &self,
        body: &OpenAIChatRequest,
        request_id: &str,
        forwarded_key: Option<&str>,
    ) -> Result<BoxStream<'static, Bytes>> {
        let mut req = self
            .client
            .post(&self.url)
            .json(body)
            .header(ACCEPT, "text/event-stream")
            .header("x-request-id", request_id);

        if let Some(key) = self.api_key.as_deref().or(forwarded_key) {
            req = req.bearer_auth(key);
        }

        debug!(
            request_id,
            url = self.url.as_str(),
            model = body.model.as_str(),
            messages = body.messages.len(),
            "sending upstream request"
        );
        let started = Instant::now();

        let resp = tokio::time::timeout(self.timeout, req.send())
            .await
            .map_err(|_| {
                warn!(request_id, timeout_ms = self.timeout.as_millis() as u64, "upstream timed out");
                Error::upstream(
                    None,
                    format!("no response within {} ms", self.timeout.as_millis()),
                )
            })?
            .map_err(|e| Error::Transport(super::TransportError::Http(e)))?;

        let status = resp.status();
        debug!(
            request_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream responded"
        );

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(request_id, status = status.as_u16(), body = text.as_str(), "upstream error");
            return Err(Error::upstream(Some(status.as_u16()), text));
        }

        if resp.content_length() == Some(0) {
            return Err(Error::upstream(
                Some(status.as_u16()),
                "upstream response has no body",
            ));
        }

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(super::TransportError::Http(e)));
        Ok(Box::pin(byte_stream))
    }
}
