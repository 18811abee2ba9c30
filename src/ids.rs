//! Per-request identifiers: trigger signals, tool-use ids, request ids.
//!
//! None of these are security tokens; they only need to be unique within a
//! session and unlikely to appear in natural model output.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub const TOOL_USE_ID_PREFIX: &str = "toolu_";
const TOOL_USE_ID_RANDOM_LEN: usize = 12;
const TRIGGER_RANDOM_LEN: usize = 8;

pub trait IdGenerator: Send + Sync {
    /// Marker the model must print on its own line before invoking a tool.
    fn trigger_signal(&self) -> String;

    /// Id of an emitted `tool_use` content block.
    fn tool_use_id(&self) -> String;

    fn request_id(&self) -> String;
}

/// `rand`-backed generator used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn trigger_signal(&self) -> String {
        format!("<<CALL_{}>>", random_alphanumeric(TRIGGER_RANDOM_LEN))
    }

    fn tool_use_id(&self) -> String {
        format!(
            "{}{}",
            TOOL_USE_ID_PREFIX,
            random_alphanumeric(TOOL_USE_ID_RANDOM_LEN)
        )
    }

    fn request_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Deterministic generator for tests and replays: `toolu_000001`, ...
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn trigger_signal(&self) -> String {
        format!("<<CALL_{:06}>>", self.next())
    }

    fn tool_use_id(&self) -> String {
        format!("{}{:06}", TOOL_USE_ID_PREFIX, self.next())
    }

    fn request_id(&self) -> String {
        format!("req_{:06}", self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_have_fixed_shape() {
        let ids = RandomIdGenerator;
        let tool_id = ids.tool_use_id();
        assert!(tool_id.starts_with(TOOL_USE_ID_PREFIX));
        assert_eq!(tool_id.len(), TOOL_USE_ID_PREFIX.len() + 12);

        let trigger = ids.trigger_signal();
        assert!(trigger.starts_with("<<CALL_") && trigger.ends_with(">>"));
        assert_eq!(trigger.len(), "<<CALL_".len() + 8 + 2);
        assert!(trigger[7..15].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_ids_differ_per_call() {
        let ids = RandomIdGenerator;
        assert_ne!(ids.trigger_signal(), ids.trigger_signal());
        assert_ne!(ids.tool_use_id(), ids.tool_use_id());
        assert_ne!(ids.request_id(), ids.request_id());
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.tool_use_id(), "toolu_000001");
        assert_eq!(ids.tool_use_id(), "toolu_000002");
        assert_eq!(ids.trigger_signal(), "<<CALL_000003>>");
    }
}
