//! grove-index: an embedded keyed-index engine.
//!
//! grove-index stores opaque values under totally ordered string keys in
//! one of four interchangeable structures, selected once at construction:
//!
//! - **AVL**: height-balanced binary search tree
//! - **Red-black**: color-balanced binary search tree over a slot arena
//! - **B-tree**: order-bounded multiway search tree with configurable
//!   minimum degree
//! - **Flat**: unordered hash table drawing keys from a shared intern pool
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            OrderedIndex contract             │
//! │ (insert, get, range, update, remove, save,  │
//! │  load — uniform across variants)            │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │             Tree variants                    │
//! │   (AVL / red-black / B-tree / flat)         │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │      Persistence + integrity layer           │
//! │  (JSON node-graph documents, verifiers)     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every operation is synchronous and single-owner: a tree instance has
//! exactly one logical owner and no internal locking. The only shared
//! resource is the [`InternPool`], which guards its table with a mutex.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use grove_index::{IndexConfig, IndexKind, InternPool, OrderedIndex, create_index};
//!
//! let pool = Arc::new(InternPool::new());
//! let config = IndexConfig::default();
//! let mut index = create_index::<u64>(IndexKind::Avl, &config, &pool);
//!
//! index.insert("alpha", 1)?;
//! index.insert("beta", 2)?;
//! assert_eq!(index.get("alpha")?, &1);
//! assert_eq!(index.range("a", "z"), ["alpha", "beta"]);
//! # Ok::<(), grove_index::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
// All expects in this crate are infallible:
// - arena slot access behind ids the tree itself handed out
// - pops during split/borrow whose minimum fill the caller established
#![allow(clippy::expect_used)]

pub mod avl;
pub mod btree;
pub mod config;
pub mod error;
pub mod flat;
pub mod index;
pub mod integrity;
pub mod intern;
pub mod persist;
pub mod redblack;

// Re-export commonly used types
pub use avl::AvlIndex;
pub use btree::BTreeIndex;
pub use config::{DEFAULT_MIN_DEGREE, IndexConfig};
pub use error::{Error, Result};
pub use flat::FlatIndex;
pub use index::{IndexKind, OrderedIndex, create_index};
pub use integrity::{Violation, verify_avl, verify_btree, verify_redblack};
pub use intern::InternPool;
pub use persist::{load_from_path, save_to_path};
pub use redblack::RedBlackIndex;

/// Persisted document format version.
pub const VERSION: u16 = 1;
