//! Order-bounded multiway search tree.
//!
//! Insertion splits proactively on the way down so a split always happens
//! against a non-full parent; deletion replenishes any underfull child
//! before descending into it, borrowing from a sibling when one can spare
//! a key and merging otherwise. The root collapses into its only child
//! when a merge empties it.
//!
//! Duplicate keys are accepted by default; construction can opt into the
//! reject-duplicates behavior of the binary variants.

pub(crate) mod node;

use std::io;
use std::mem;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::error::{CorruptedSnafu, KeyExistsSnafu, KeyNotFoundSnafu, Result};
use crate::index::{IndexKind, OrderedIndex};
use crate::persist;
use node::BNode;

/// Multiway search tree index with a fixed minimum degree.
#[derive(Debug)]
pub struct BTreeIndex<V> {
    root: BNode<V>,
    min_degree: usize,
    reject_duplicates: bool,
    len: usize,
    split_count: u64,
}

impl<V> Default for BTreeIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> BTreeIndex<V> {
    /// Creates an empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&IndexConfig::default())
    }

    /// Creates an empty tree with the given minimum degree and duplicate
    /// policy.
    pub fn with_config(config: &IndexConfig) -> Self {
        assert!(config.min_degree >= 2, "minimum degree must be at least 2");
        Self {
            root: BNode::leaf(),
            min_degree: config.min_degree,
            reject_duplicates: config.reject_duplicates,
            len: 0,
            split_count: 0,
        }
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of node splits performed over this tree's lifetime.
    pub fn split_count(&self) -> u64 {
        self.split_count
    }

    /// Depth of the tree (0 = empty, 1 = root is the only leaf).
    ///
    /// Walks the leftmost path; all leaves sit at the same depth.
    pub fn depth(&self) -> usize {
        if self.len == 0 {
            return 0;
        }
        let mut depth = 1;
        let mut node = &self.root;
        while !node.is_leaf() {
            node = &node.children[0];
            depth += 1;
        }
        depth
    }

    pub(crate) fn root(&self) -> &BNode<V> {
        &self.root
    }

    pub(crate) fn min_degree(&self) -> usize {
        self.min_degree
    }

    pub(crate) fn rejects_duplicates(&self) -> bool {
        self.reject_duplicates
    }

    /// Adds a binding, splitting full nodes on the way down.
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        if self.reject_duplicates && search_in(&self.root, key).is_some() {
            return KeyExistsSnafu { key }.fail();
        }

        let t = self.min_degree;
        if self.root.is_full(t) {
            let old_root = mem::replace(&mut self.root, BNode::leaf());
            self.root.children.push(old_root);
            self.root.split_child(0, t);
            self.split_count += 1;
        }
        self.split_count += insert_non_full(&mut self.root, key, value, t);
        self.len += 1;
        Ok(())
    }

    /// Returns the value bound to `key` (the first match in search order
    /// when duplicates are permitted).
    pub fn get(&self, key: &str) -> Result<&V> {
        search_in(&self.root, key)
            .map(|(node, i)| &node.values[i])
            .ok_or_else(|| KeyNotFoundSnafu { key }.build())
    }

    /// Replaces the value bound to an existing key.
    pub fn update(&mut self, key: &str, value: V) -> Result<()> {
        match search_in_mut(&mut self.root, key) {
            Some((node, i)) => {
                node.values[i] = value;
                Ok(())
            },
            None => KeyNotFoundSnafu { key }.fail(),
        }
    }

    /// Removes one binding for `key`, restoring the degree bounds.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if search_in(&self.root, key).is_none() {
            return KeyNotFoundSnafu { key }.fail();
        }

        let _ = remove_entry(&mut self.root, key, self.min_degree);
        if self.root.keys.is_empty() && !self.root.is_leaf() {
            // A root-level merge left a single child; the tree shrinks.
            let child = self.root.children.remove(0);
            self.root = child;
        }
        self.len -= 1;
        Ok(())
    }

    /// Ascending keys within `[min, max]`, both bounds inclusive.
    pub fn range(&self, min: &str, max: &str) -> Vec<String> {
        let mut out = Vec::new();
        collect_range(&self.root, min, max, &mut out);
        out
    }
}

fn search_in<'a, V>(node: &'a BNode<V>, key: &str) -> Option<(&'a BNode<V>, usize)> {
    let (i, found) = node.find_slot(key);
    if found {
        Some((node, i))
    } else if node.is_leaf() {
        None
    } else {
        search_in(&node.children[i], key)
    }
}

fn search_in_mut<'a, V>(node: &'a mut BNode<V>, key: &str) -> Option<(&'a mut BNode<V>, usize)> {
    let (i, found) = node.find_slot(key);
    if found {
        Some((node, i))
    } else if node.is_leaf() {
        None
    } else {
        search_in_mut(&mut node.children[i], key)
    }
}

/// Inserts into a node known to be non-full, splitting any full child
/// encountered on the way down. Returns the number of splits performed.
fn insert_non_full<V>(node: &mut BNode<V>, key: &str, value: V, t: usize) -> u64 {
    let mut i = node.upper_slot(key);
    if node.is_leaf() {
        node.keys.insert(i, key.to_string());
        node.values.insert(i, value);
        return 0;
    }

    let mut splits = 0;
    if node.children[i].is_full(t) {
        node.split_child(i, t);
        splits += 1;
        // The promoted median may shift the target child one to the right.
        if key > node.keys[i].as_str() {
            i += 1;
        }
    }
    splits + insert_non_full(&mut node.children[i], key, value, t)
}

/// Removes one entry for `key` from the subtree, returning it. The caller
/// has already established that the key is present.
fn remove_entry<V>(node: &mut BNode<V>, key: &str, t: usize) -> Option<(String, V)> {
    let (i, found) = node.find_slot(key);
    if found {
        if node.is_leaf() {
            let k = node.keys.remove(i);
            let v = node.values.remove(i);
            return Some((k, v));
        }
        return remove_from_internal(node, i, key, t);
    }
    if node.is_leaf() {
        return None;
    }

    // Replenish the target child before descending so every recursive
    // step sees a child that can afford to lose a key.
    let was_last = i == node.keys.len();
    if node.children[i].keys.len() < t {
        fill(node, i, t);
    }
    let i = if was_last && i > node.keys.len() { i - 1 } else { i };
    remove_entry(&mut node.children[i], key, t)
}

/// Removes the separator at `i` of an internal node: replace it with its
/// predecessor or successor when the adjacent child can spare a key,
/// otherwise merge the two children around it and recurse.
fn remove_from_internal<V>(
    node: &mut BNode<V>,
    i: usize,
    key: &str,
    t: usize,
) -> Option<(String, V)> {
    if node.children[i].keys.len() >= t {
        let pred_key = node.children[i].peek_max_key()?.to_string();
        let (pk, pv) = remove_entry(&mut node.children[i], &pred_key, t)?;
        let old_key = mem::replace(&mut node.keys[i], pk);
        let old_value = mem::replace(&mut node.values[i], pv);
        Some((old_key, old_value))
    } else if node.children[i + 1].keys.len() >= t {
        let succ_key = node.children[i + 1].peek_min_key()?.to_string();
        let (sk, sv) = remove_entry(&mut node.children[i + 1], &succ_key, t)?;
        let old_key = mem::replace(&mut node.keys[i], sk);
        let old_value = mem::replace(&mut node.values[i], sv);
        Some((old_key, old_value))
    } else {
        node.merge_children(i);
        remove_entry(&mut node.children[i], key, t)
    }
}

/// Brings the child at `i` up to `t` keys: borrow from a sibling that can
/// spare one, else merge (with the right sibling unless `i` is the last
/// child).
fn fill<V>(node: &mut BNode<V>, i: usize, t: usize) {
    if i != 0 && node.children[i - 1].keys.len() >= t {
        node.borrow_from_prev(i);
    } else if i != node.keys.len() && node.children[i + 1].keys.len() >= t {
        node.borrow_from_next(i);
    } else if i != node.keys.len() {
        node.merge_children(i);
    } else {
        node.merge_children(i - 1);
    }
}

/// In-order walk pruned by the inclusive bounds: subtrees wholly below
/// `min` are skipped and a key run stops once past `max`.
fn collect_range<V>(node: &BNode<V>, min: &str, max: &str, out: &mut Vec<String>) {
    if node.is_leaf() {
        for key in &node.keys {
            if key.as_str() > max {
                return;
            }
            if key.as_str() >= min {
                out.push(key.clone());
            }
        }
        return;
    }

    let start = node.keys.partition_point(|k| k.as_str() < min);
    collect_range(&node.children[start], min, max, out);
    for i in start..node.keys.len() {
        let key = node.keys[i].as_str();
        if key > max {
            return;
        }
        if key >= min {
            out.push(node.keys[i].clone());
        }
        collect_range(&node.children[i + 1], min, max, out);
    }
}

fn count_entries<V>(node: &BNode<V>) -> usize {
    node.keys.len() + node.children.iter().map(count_entries).sum::<usize>()
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Serialize)]
struct SavedTree<'a, V> {
    min_degree: usize,
    root: &'a BNode<V>,
}

#[derive(Deserialize)]
struct LoadedTree<V> {
    min_degree: usize,
    root: BNode<V>,
}

impl<V> OrderedIndex<V> for BTreeIndex<V>
where
    V: Serialize + DeserializeOwned,
{
    fn kind(&self) -> IndexKind {
        IndexKind::BTree
    }

    fn len(&self) -> usize {
        self.len
    }

    fn insert(&mut self, key: &str, value: V) -> Result<()> {
        Self::insert(self, key, value)
    }

    fn get(&self, key: &str) -> Result<&V> {
        Self::get(self, key)
    }

    fn range(&self, min: &str, max: &str) -> Vec<String> {
        Self::range(self, min, max)
    }

    fn update(&mut self, key: &str, value: V) -> Result<()> {
        Self::update(self, key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        Self::remove(self, key)
    }

    fn save(&self, dest: &mut dyn io::Write) -> Result<()> {
        let doc = SavedTree { min_degree: self.min_degree, root: &self.root };
        persist::write_document(dest, persist::BTREE_FORMAT, &doc)
    }

    fn load(&mut self, src: &mut dyn io::Read) -> Result<()> {
        let doc: LoadedTree<V> = persist::read_document(src, persist::BTREE_FORMAT)?;
        if doc.min_degree < 2 {
            return CorruptedSnafu {
                reason: format!("minimum degree {} out of range", doc.min_degree),
            }
            .fail();
        }
        let candidate = Self {
            len: count_entries(&doc.root),
            root: doc.root,
            min_degree: doc.min_degree,
            reject_duplicates: self.reject_duplicates,
            split_count: 0,
        };
        persist::validate_loaded(crate::integrity::verify_btree(&candidate))?;
        *self = candidate;
        Ok(())
    }
}
