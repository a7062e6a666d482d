//! In-memory string store with optional per-key expiration.
//!
//! Expiry is lazy: nothing sweeps the map in the background. A key whose
//! deadline has passed is reported as absent and dropped the next time it is
//! read. A key read exactly at its deadline is still live.

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

#[derive(Debug, PartialEq, Clone)]
pub struct Value {
    pub data: String,
    pub expiration: Option<Instant>,
}

impl Value {
    fn is_live(&self, now: Instant) -> bool {
        match self.expiration {
            Some(expiration) => now <= expiration,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: HashMap<String, Value>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`, dropping any expiration it had.
    pub fn set(&mut self, key: String, value: String) {
        self.entries.insert(
            key,
            Value {
                data: value,
                expiration: None,
            },
        );
    }

    /// Inserts or overwrites `key` so that it expires `ttl` after `now`.
    pub fn set_with_expiry(&mut self, key: String, value: String, ttl: Duration, now: Instant) {
        self.entries.insert(
            key,
            Value {
                data: value,
                expiration: Some(now + ttl),
            },
        );
    }

    /// Returns the value stored under `key` if it exists and has not expired at `now`.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        let value = self.entries.get(key)?;

        if value.is_live(now) {
            return Some(value.data.clone());
        }

        self.entries.remove(key);
        None
    }

    /// Raw entry lookup that ignores expiration.
    pub fn entry(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
