//! Mock OpenAI-compatible upstream for integration tests

use claude_bridge::config::ProxyConfig;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::time::Duration;

pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Test fixture that manages a mock server
pub struct MockUpstream {
    pub server: ServerGuard,
    pub url: String,
}

impl MockUpstream {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let url = format!("{}{}", server.url(), CHAT_PATH);
        Self { server, url }
    }

    /// Configuration pointing at this server, without aggregation delay.
    pub fn config(&self) -> ProxyConfig {
        ProxyConfig {
            upstream_base_url: self.url.clone(),
            aggregation_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            ..ProxyConfig::default()
        }
    }

    /// Create a mock for a successful streaming response (SSE)
    pub async fn mock_sse_stream(&mut self, deltas: &[&str]) -> Mock {
        self.server
            .mock("POST", CHAT_PATH)
            .match_header("accept", "text/event-stream")
            .match_header("x-request-id", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(deltas))
            .create_async()
            .await
    }

    /// Create a mock for an error response
    pub async fn mock_error_response(&mut self, status: usize, error_body: &str) -> Mock {
        self.server
            .mock("POST", CHAT_PATH)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(error_body)
            .create_async()
            .await
    }
}

/// OpenAI stream chunks for `deltas`, terminated by `[DONE]`.
pub fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::from(": upstream keep-alive\n\n");
    body.push_str("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"index\":0}]}\n\n");
    for delta in deltas {
        let chunk = serde_json::json!({
            "choices": [{"delta": {"content": delta}, "index": 0, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: {\"choices\":[{\"delta\":{},\"index\":0,\"finish_reason\":\"stop\"}]}\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}
