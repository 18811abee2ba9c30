use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Setting or payload path that caused the error (e.g., "TIMEOUT_MS", "tool_call.name")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "stream_encoder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the bridge.
///
/// Tokenizer failures never show up here: they degrade to heuristic counting
/// inside [`crate::tokens`] and are only logged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Upstream error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Encoding error: {message}{}", format_context(.context))]
    Encoding {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Stream sink closed: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new encoding error with structured context
    pub fn encoding_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Encoding {
            message: msg.into(),
            context,
        }
    }

    pub fn upstream(status: Option<u16>, msg: impl Into<String>) -> Self {
        Error::Upstream {
            status,
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Encoding { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Error `type` reported to the client in an `error` stream event.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Upstream {
                status: Some(status),
                ..
            } => match status {
                400 | 404 | 413 | 422 => "invalid_request_error",
                401 | 403 => "authentication_error",
                429 => "rate_limit_error",
                503 | 529 => "overloaded_error",
                _ => "api_error",
            },
            Error::Configuration { .. } => "invalid_request_error",
            _ => "api_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "not a number",
            ErrorContext::new()
                .with_field_path("TIMEOUT_MS")
                .with_source("config_loader"),
        );
        let text = err.to_string();
        assert!(text.contains("not a number"));
        assert!(text.contains("field: TIMEOUT_MS"));
        assert!(text.contains("source: config_loader"));
    }

    #[test]
    fn test_upstream_status_maps_to_error_type() {
        assert_eq!(
            Error::upstream(Some(401), "bad key").error_type(),
            "authentication_error"
        );
        assert_eq!(
            Error::upstream(Some(429), "slow down").error_type(),
            "rate_limit_error"
        );
        assert_eq!(Error::upstream(Some(500), "boom").error_type(), "api_error");
        assert_eq!(Error::upstream(None, "timeout").error_type(), "api_error");
        assert_eq!(
            Error::upstream(Some(500), "boom").to_string(),
            "Upstream error (HTTP 500): boom"
        );
    }
}
