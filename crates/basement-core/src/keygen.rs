//! Document key generation
//!
//! Keys must be unique within a bucket. [`UniqueKeyGenerator`] is the
//! default: a microsecond timestamp combined with a process-wide counter,
//! which is unique within one process and very likely unique across
//! processes. It is not cryptographically random.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

/// Source of fresh document keys
pub trait KeyGenerator: Send + Sync {
    /// Generate a key starting with `prefix`
    fn generate(&self, prefix: &str) -> String;
}

/// Shared by every [`UniqueKeyGenerator`] so keys never repeat in-process
static KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Time-derived keys: `{prefix}{micros:013x}{counter:04x}`
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueKeyGenerator;

impl KeyGenerator for UniqueKeyGenerator {
    fn generate(&self, prefix: &str) -> String {
        let micros = Utc::now().timestamp_micros();
        let count = KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}{:013x}{:04x}", prefix, micros, count)
    }
}

/// Random keys: `{prefix}{uuid-v4-simple}`
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self, prefix: &str) -> String {
        format!("{}{}", prefix, Uuid::new_v4().simple())
    }
}

/// Deterministic keys: `{prefix}{n}` with `n` counting up from a start value
#[derive(Debug, Default)]
pub struct SequentialKeyGenerator {
    next: AtomicU64,
}

impl SequentialKeyGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl KeyGenerator for SequentialKeyGenerator {
    fn generate(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", prefix, n)
    }
}

/// Generate a key with the default generator
pub fn generate_key(prefix: &str) -> String {
    UniqueKeyGenerator.generate(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_key_is_unique() {
        let first = generate_key("");
        let second = generate_key("");

        assert!(!first.is_empty());
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_key_burst_is_unique() {
        let keys: HashSet<String> = (0..10_000).map(|_| generate_key("doc-")).collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_counter_is_not_truncated() {
        KEY_COUNTER.fetch_max(0x1_0000, Ordering::Relaxed);
        let key = UniqueKeyGenerator.generate("p");

        let counter = u64::from_str_radix(&key[1 + 13..], 16).unwrap();
        assert!(counter >= 0x1_0000);
    }

    #[test]
    fn test_prefix_is_kept() {
        assert!(generate_key("user::").starts_with("user::"));
        assert!(RandomKeyGenerator.generate("tmp-").starts_with("tmp-"));
    }

    #[test]
    fn test_random_keys_differ() {
        let gen = RandomKeyGenerator;
        let key = gen.generate("");
        assert_eq!(key.len(), 32);
        assert_ne!(key, gen.generate(""));
    }

    #[test]
    fn test_sequential_generator() {
        let gen = SequentialKeyGenerator::new();
        assert_eq!(gen.generate("k"), "k1");
        assert_eq!(gen.generate("k"), "k2");

        let gen = SequentialKeyGenerator::starting_at(40);
        assert_eq!(gen.generate(""), "40");
    }
}
