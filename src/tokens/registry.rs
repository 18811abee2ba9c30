//! Process-wide tokenizer cache.
//!
//! Counters are keyed by lowercased model name. Lookups that race may both
//! build a counter; the later insert wins, which is fine because builds for
//! the same name are equivalent.

use super::counter::{
    CharacterEstimator, EncoderFactory, TiktokenFactory, TokenCounter, TokenizerError,
};
use lru::LruCache;
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

const DEFAULT_CAPACITY: usize = 32;

pub struct TokenizerRegistry {
    factory: Arc<dyn EncoderFactory>,
    cache: Mutex<LruCache<String, Arc<dyn TokenCounter>>>,
    fallback: CharacterEstimator,
}

impl TokenizerRegistry {
    pub fn new(factory: Arc<dyn EncoderFactory>) -> Self {
        Self::with_capacity(factory, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(factory: Arc<dyn EncoderFactory>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            factory,
            cache: Mutex::new(LruCache::new(capacity)),
            fallback: CharacterEstimator::new(),
        }
    }

    /// Cached counter for `model`, falling back to the default encoder for
    /// unknown models. `None` when neither can be built.
    pub fn counter(&self, model: &str) -> Option<Arc<dyn TokenCounter>> {
        let key = model.to_lowercase();
        if let Some(hit) = self.lock().get(&key) {
            return Some(hit.clone());
        }

        // Built outside the lock: construction can take milliseconds.
        let built = match self.factory.for_model(&key) {
            Ok(counter) => Some(counter),
            Err(e) => {
                debug!(model = key.as_str(), reason = %e, "falling back to default encoder");
                match self.factory.default_encoder() {
                    Ok(counter) => Some(counter),
                    Err(e) => {
                        debug!(model = key.as_str(), reason = %e, "default encoder unavailable");
                        None
                    }
                }
            }
        }?;

        self.lock().put(key, built.clone());
        Some(built)
    }

    /// Token count for `text`; degrades to `ceil(utf16_len / 4)`, never fails.
    pub fn count(&self, text: &str, model: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let counted = match self.counter(model) {
            Some(counter) => counter.count(text),
            None => Err(TokenizerError::Unavailable(model.to_string())),
        };
        match counted {
            Ok(n) => n,
            Err(e) => {
                debug!(model, reason = %e, "estimation fallback to character heuristic");
                self.fallback.estimate(text)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached counter.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<dyn TokenCounter>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TiktokenFactory))
    }
}

static GLOBAL: Lazy<RwLock<Option<Arc<TokenizerRegistry>>>> = Lazy::new(|| RwLock::new(None));

/// Installs a registry built on `factory` as the process-wide instance.
pub fn init(factory: Arc<dyn EncoderFactory>) -> Arc<TokenizerRegistry> {
    let registry = Arc::new(TokenizerRegistry::new(factory));
    *GLOBAL.write().unwrap_or_else(|e| e.into_inner()) = Some(registry.clone());
    registry
}

/// The process-wide registry, created with [`TiktokenFactory`] on first use.
pub fn shared() -> Arc<TokenizerRegistry> {
    if let Some(registry) = GLOBAL.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return registry.clone();
    }
    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    slot.get_or_insert_with(|| Arc::new(TokenizerRegistry::default()))
        .clone()
}

/// Releases cached counters and the global instance.
pub fn shutdown() {
    if let Some(registry) = GLOBAL.write().unwrap_or_else(|e| e.into_inner()).take() {
        registry.clear();
    }
}

pub fn get_token_counter(model: &str) -> Option<Arc<dyn TokenCounter>> {
    shared().counter(model)
}

/// Serializes tests that read or replace the process-wide registry.
#[cfg(test)]
pub(crate) static GLOBAL_TEST_LOCK: Mutex<()> = Mutex::new(());
