//! Credential pool with a shared rotating cursor.
//!
//! [`KeyPool`] holds the provider API keys in configured order and a cursor
//! naming the key currently preferred. The cursor only moves when a caller
//! reports a failure through [`KeyPool::rotate`], so a key that worked keeps
//! being used by later calls.
//!
//! The pool is `Send + Sync` and is shared across tasks behind an `Arc`.
//! Every cursor read or rotation is one short critical section; no lock is
//! held across a provider call.

use parking_lot::Mutex;

pub struct KeyPool {
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl KeyPool {
    /// Build a pool from resolved keys. An empty pool is allowed; callers
    /// check [`is_empty`](Self::is_empty) and fail fast.
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the preferred key.
    pub fn cursor(&self) -> usize {
        *self.cursor.lock()
    }

    /// The preferred key, or `None` for an empty pool.
    pub fn current(&self) -> Option<KeyEntry> {
        let cursor = self.cursor.lock();
        self.keys.get(*cursor).map(|key| KeyEntry {
            index: *cursor,
            key: key.clone(),
        })
    }

    /// Advance the cursor to the next key, wrapping around.
    ///
    /// Returns the new index, or `None` when the pool has fewer than two
    /// keys and rotation is meaningless.
    pub fn rotate(&self) -> Option<usize> {
        let len = self.keys.len();
        if len <= 1 {
            return None;
        }
        let mut cursor = self.cursor.lock();
        *cursor = (*cursor + 1) % len;
        tracing::info!(key_index = *cursor, "rotated to next API key");
        Some(*cursor)
    }

    /// Move the cursor back to the first key.
    pub fn reset(&self) {
        *self.cursor.lock() = 0;
    }
}

// Manual Debug impl to avoid leaking key values.
impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("key_count", &self.keys.len())
            .field("cursor", &self.cursor())
            .finish()
    }
}

/// A key handed out by [`KeyPool::current`].
#[derive(Clone)]
pub struct KeyEntry {
    /// Index into the pool.
    pub index: usize,
    pub key: String,
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("index", &self.index)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
