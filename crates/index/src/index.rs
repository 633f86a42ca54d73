//! The ordered-index contract shared by every tree variant.
//!
//! Callers pick a concrete variant once, at construction, and from then on
//! talk only to [`OrderedIndex`]. Nothing downstream of the factory depends
//! on which structure is behind the trait object.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{
    avl::AvlIndex, btree::BTreeIndex, config::IndexConfig, error::Result, flat::FlatIndex,
    intern::InternPool, redblack::RedBlackIndex,
};

/// The concrete structure backing an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Height-balanced binary search tree.
    Avl,
    /// Red-black binary search tree.
    RedBlack,
    /// Order-bounded multiway search tree.
    BTree,
    /// Unordered associative fallback.
    Flat,
}

impl IndexKind {
    /// Maps a variant selector string to a kind.
    ///
    /// Unrecognized selectors fall back to the flat variant.
    pub fn from_selector(selector: &str) -> Self {
        match selector {
            "avl" => Self::Avl,
            "redblack" => Self::RedBlack,
            "btree" => Self::BTree,
            _ => Self::Flat,
        }
    }

    /// Canonical selector string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avl => "avl",
            Self::RedBlack => "redblack",
            Self::BTree => "btree",
            Self::Flat => "map",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed index over totally ordered string keys.
///
/// All operations are synchronous and run to completion. An operation
/// either finishes with every structural invariant restored or fails with
/// the structure observably unchanged.
pub trait OrderedIndex<V> {
    /// Reports the concrete variant behind this index.
    fn kind(&self) -> IndexKind;

    /// Number of entries currently stored.
    fn len(&self) -> usize;

    /// Returns true if the index holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a new key/value binding.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyExists` if the key is already present (the
    /// multiway variant only checks when configured to reject duplicates).
    fn insert(&mut self, key: &str, value: V) -> Result<()>;

    /// Returns the value bound to `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if the key is absent.
    fn get(&self, key: &str) -> Result<&V>;

    /// Returns every stored key `k` with `min <= k <= max`, both bounds
    /// inclusive. Ordered variants yield ascending keys; the flat fallback
    /// yields them in no particular order. `min > max` yields nothing.
    fn range(&self, min: &str, max: &str) -> Vec<String>;

    /// Replaces the value bound to an existing key. Never restructures.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if the key is absent.
    fn update(&mut self, key: &str, value: V) -> Result<()>;

    /// Removes a key and its value.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if the key is absent.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Serializes the whole structure, bookkeeping fields included, as one
    /// textual document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if writing fails.
    fn save(&self, dest: &mut dyn io::Write) -> Result<()>;

    /// Replaces this index's state wholesale with a previously saved
    /// document. `load` after `save` reproduces the saved structure
    /// exactly.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails and `Error::Corrupted` if the
    /// document is malformed or fails structural validation.
    fn load(&mut self, src: &mut dyn io::Read) -> Result<()>;
}

/// Produces a fresh empty index of the requested kind.
///
/// The intern pool is only consulted by the flat variant, but it is wired
/// through unconditionally so that the caller owns exactly one pool for
/// all the indexes it creates.
pub fn create_index<V>(
    kind: IndexKind,
    config: &IndexConfig,
    pool: &Arc<InternPool>,
) -> Box<dyn OrderedIndex<V>>
where
    V: Serialize + DeserializeOwned + 'static,
{
    tracing::debug!(kind = %kind, "creating index");
    match kind {
        IndexKind::Avl => Box::new(AvlIndex::new()),
        IndexKind::RedBlack => Box::new(RedBlackIndex::new()),
        IndexKind::BTree => Box::new(BTreeIndex::with_config(config)),
        IndexKind::Flat => Box::new(FlatIndex::new(Arc::clone(pool))),
    }
}
