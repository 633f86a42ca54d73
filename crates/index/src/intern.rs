//! Process-wide key interning pool.
//!
//! Equal key strings share one owned backing allocation. The pool is an
//! explicitly constructed resource handed to the indexes that want it
//! (currently only the flat fallback), not a lazily initialized global;
//! its lifetime is tied to whatever application context owns the `Arc`.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Deduplicating pool of key strings.
///
/// Multiple index instances may intern concurrently, so the table is
/// guarded by a mutex. Interned keys are handed out as `Arc<str>`; the
/// pool keeps one clone alive for the duration of the pool itself.
#[derive(Debug, Default)]
pub struct InternPool {
    table: Mutex<HashSet<Arc<str>>>,
}

impl InternPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled copy of `key`, inserting it on first sight.
    pub fn intern(&self, key: &str) -> Arc<str> {
        let mut table = self.table.lock();
        if let Some(existing) = table.get(key) {
            return Arc::clone(existing);
        }
        let owned: Arc<str> = Arc::from(key);
        table.insert(Arc::clone(&owned));
        owned
    }

    /// Number of distinct strings currently pooled.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Returns true if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}
