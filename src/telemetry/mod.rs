//! 日志模块：基于 tracing 的结构化日志初始化。
//!
//! Structured logging setup.
//!
//! Every component logs through `tracing` with structured fields
//! (`request_id`, `index`, token counts). Binaries call [`init`] once; the
//! library never installs a subscriber by itself.
//!
//! | Level | Used for |
//! |-------|----------|
//! | `error` | Failures that end a request without a client-visible event |
//! | `warn` | Upstream errors, stream failures, dropped text |
//! | `info` | Request lifecycle, cancellation |
//! | `debug` | Token estimation, block emission, upstream timing |

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG`. Safe to call
/// more than once; later calls are ignored.
pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

pub fn init_with_default(directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_with_default("debug");
        init();
        tracing::debug!(request_id = "r", "still logging");
    }
}
