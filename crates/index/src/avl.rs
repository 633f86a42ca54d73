//! Height-balanced binary search tree.
//!
//! Every node caches the height of its subtree. Insert and remove walk
//! back up the recursion rebalancing at each ancestor whose balance factor
//! leaves `[-1, 1]`, using single or double rotations. Insert decides the
//! rotation from the inserted key; remove decides it from the current
//! balance factor of the taller child (the removed key is gone).

use std::cmp::Ordering;
use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KeyExistsSnafu, KeyNotFoundSnafu, Result};
use crate::index::{IndexKind, OrderedIndex};
use crate::persist;

type Link<V> = Option<Box<AvlNode<V>>>;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AvlNode<V> {
    pub(crate) key: String,
    pub(crate) value: V,
    pub(crate) height: u32,
    pub(crate) left: Link<V>,
    pub(crate) right: Link<V>,
}

impl<V> AvlNode<V> {
    fn new(key: &str, value: V) -> Self {
        Self { key: key.to_string(), value, height: 1, left: None, right: None }
    }
}

/// Height-balanced binary search tree index.
#[derive(Debug)]
pub struct AvlIndex<V> {
    root: Link<V>,
    len: usize,
}

impl<V> Default for AvlIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AvlIndex<V> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree (0 = empty).
    pub fn height(&self) -> u32 {
        height_of(&self.root)
    }

    pub(crate) fn root(&self) -> &Link<V> {
        &self.root
    }

    /// Adds a new binding, rebalancing on the way back up.
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        insert_at(&mut self.root, key, value)?;
        self.len += 1;
        Ok(())
    }

    /// Returns the value bound to `key`.
    pub fn get(&self, key: &str) -> Result<&V> {
        find(&self.root, key)
            .map(|node| &node.value)
            .ok_or_else(|| KeyNotFoundSnafu { key }.build())
    }

    /// Replaces the value bound to an existing key.
    pub fn update(&mut self, key: &str, value: V) -> Result<()> {
        match find_mut(&mut self.root, key) {
            Some(node) => {
                node.value = value;
                Ok(())
            },
            None => KeyNotFoundSnafu { key }.fail(),
        }
    }

    /// Removes a binding, rebalancing on the way back up.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        remove_at(&mut self.root, key)?;
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

impl<V> OrderedIndex<V> for AvlIndex<V>
where
    V: Serialize + DeserializeOwned,
{
    fn kind(&self) -> IndexKind {
        IndexKind::Avl
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
        persist::write_document(dest, persist::AVL_FORMAT, &self.root)
    }

    fn load(&mut self, src: &mut dyn io::Read) -> Result<()> {
        let root: Link<V> = persist::read_document(src, persist::AVL_FORMAT)?;
        let candidate = Self { len: count_nodes(&root), root };
        persist::validate_loaded(crate::integrity::verify_avl(&candidate))?;
        *self = candidate;
        Ok(())
    }
}

fn height_of<V>(link: &Link<V>) -> u32 {
    link.as_ref().map_or(0, |node| node.height)
}

fn update_height<V>(node: &mut AvlNode<V>) {
    node.height = 1 + height_of(&node.left).max(height_of(&node.right));
}

fn balance_of<V>(node: &AvlNode<V>) -> i32 {
    height_of(&node.left) as i32 - height_of(&node.right) as i32
}

fn balance_of_link<V>(link: &Link<V>) -> i32 {
    link.as_ref().map_or(0, |node| balance_of(node))
}

fn count_nodes<V>(link: &Link<V>) -> usize {
    link.as_ref().map_or(0, |node| 1 + count_nodes(&node.left) + count_nodes(&node.right))
}

/// Rotates the subtree at `link` right, lifting its left child.
/// Heights are recomputed bottom-up (demoted node first).
fn rotate_right<V>(link: &mut Link<V>) {
    let Some(mut y) = link.take() else { return };
    let Some(mut x) = y.left.take() else {
        *link = Some(y);
        return;
    };
    y.left = x.right.take();
    update_height(&mut y);
    x.right = Some(y);
    update_height(&mut x);
    *link = Some(x);
}

/// Mirror of [`rotate_right`].
fn rotate_left<V>(link: &mut Link<V>) {
    let Some(mut x) = link.take() else { return };
    let Some(mut y) = x.right.take() else {
        *link = Some(x);
        return;
    };
    x.right = y.left.take();
    update_height(&mut x);
    y.left = Some(x);
    update_height(&mut y);
    *link = Some(y);
}

fn insert_at<V>(link: &mut Link<V>, key: &str, value: V) -> Result<()> {
    let Some(node) = link else {
        *link = Some(Box::new(AvlNode::new(key, value)));
        return Ok(());
    };

    match key.cmp(node.key.as_str()) {
        Ordering::Less => insert_at(&mut node.left, key, value)?,
        Ordering::Greater => insert_at(&mut node.right, key, value)?,
        Ordering::Equal => return KeyExistsSnafu { key }.fail(),
    }

    update_height(node);
    rebalance_after_insert(link, key);
    Ok(())
}

/// Four-case rebalance keyed off the inserted key.
fn rebalance_after_insert<V>(link: &mut Link<V>, key: &str) {
    let Some(node) = link else { return };
    let balance = balance_of(node);

    if balance > 1 {
        if let Some(left) = &node.left {
            if key < left.key.as_str() {
                rotate_right(link);
            } else if key > left.key.as_str() {
                rotate_left(&mut node.left);
                rotate_right(link);
            }
        }
    } else if balance < -1 {
        if let Some(right) = &node.right {
            if key > right.key.as_str() {
                rotate_left(link);
            } else if key < right.key.as_str() {
                rotate_right(&mut node.right);
                rotate_left(link);
            }
        }
    }
}

/// Four-case rebalance keyed off the child subtree balance factors.
fn rebalance_after_remove<V>(link: &mut Link<V>) {
    let Some(node) = link else { return };
    let balance = balance_of(node);

    if balance > 1 {
        if balance_of_link(&node.left) >= 0 {
            rotate_right(link);
        } else {
            rotate_left(&mut node.left);
            rotate_right(link);
        }
    } else if balance < -1 {
        if balance_of_link(&node.right) <= 0 {
            rotate_left(link);
        } else {
            rotate_right(&mut node.right);
            rotate_left(link);
        }
    }
}

fn remove_at<V>(link: &mut Link<V>, key: &str) -> Result<()> {
    let Some(node) = link else { return KeyNotFoundSnafu { key }.fail() };

    match key.cmp(node.key.as_str()) {
        Ordering::Less => remove_at(&mut node.left, key)?,
        Ordering::Greater => remove_at(&mut node.right, key)?,
        Ordering::Equal => {
            if node.left.is_some() && node.right.is_some() {
                // Copy the in-order successor's payload down, then remove
                // the donor node from the right subtree.
                if let Some((succ_key, succ_value)) = take_min(&mut node.right) {
                    node.key = succ_key;
                    node.value = succ_value;
                }
            } else if let Some(mut gone) = link.take() {
                *link = gone.left.take().or_else(|| gone.right.take());
            }
        },
    }

    if let Some(node) = link {
        update_height(node);
        rebalance_after_remove(link);
    }
    Ok(())
}

/// Detaches the minimum node of the subtree and returns its payload,
/// rebalancing the path it was removed from.
fn take_min<V>(link: &mut Link<V>) -> Option<(String, V)> {
    let node = link.as_mut()?;
    if node.left.is_some() {
        let taken = take_min(&mut node.left);
        update_height(node);
        rebalance_after_remove(link);
        taken
    } else {
        let mut gone = link.take()?;
        *link = gone.right.take();
        let AvlNode { key, value, .. } = *gone;
        Some((key, value))
    }
}

fn find<'a, V>(mut link: &'a Link<V>, key: &str) -> Option<&'a AvlNode<V>> {
    while let Some(node) = link {
        match key.cmp(node.key.as_str()) {
            Ordering::Less => link = &node.left,
            Ordering::Greater => link = &node.right,
            Ordering::Equal => return Some(node),
        }
    }
    None
}

fn find_mut<'a, V>(mut link: &'a mut Link<V>, key: &str) -> Option<&'a mut AvlNode<V>> {
    while let Some(node) = link {
        match key.cmp(node.key.as_str()) {
            Ordering::Less => link = &mut node.left,
            Ordering::Greater => link = &mut node.right,
            Ordering::Equal => return Some(node),
        }
    }
    None
}

/// In-order walk pruned by the inclusive bounds.
fn collect_range<V>(link: &Link<V>, min: &str, max: &str, out: &mut Vec<String>) {
    let Some(node) = link else { return };
    let key = node.key.as_str();
    if key >= min {
        collect_range(&node.left, min, max, out);
    }
    if key >= min && key <= max {
        out.push(node.key.clone());
    }
    if key <= max {
        collect_range(&node.right, min, max, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::verify_avl;

    fn assert_clean(index: &AvlIndex<u64>) {
        let violations = verify_avl(index);
        assert!(violations.is_empty(), "invariant violations: {violations:?}");
    }

    #[test]
    fn test_insert_and_get() {
        let mut index = AvlIndex::new();
        index.insert("b", 1).unwrap();
        index.insert("a", 2).unwrap();
        index.insert("c", 3).unwrap();

        assert_eq!(index.get("a").unwrap(), &2);
        assert_eq!(index.get("b").unwrap(), &1);
        assert_eq!(index.get("c").unwrap(), &3);
        assert_eq!(index.len(), 3);
        assert_clean(&index);
    }

    #[test]
    fn test_get_missing() {
        let index: AvlIndex<u64> = AvlIndex::new();
        assert!(index.get("nope").is_err());
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut index = AvlIndex::new();
        index.insert("x", 1).unwrap();
        let err = index.insert("x", 2).unwrap_err();
        assert!(matches!(err, crate::Error::KeyExists { .. }));
        assert_eq!(index.get("x").unwrap(), &1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_ascending_insert_stays_balanced() {
        let mut index = AvlIndex::new();
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            index.insert(key, i as u64).unwrap();
            assert_clean(&index);
        }
        // ceil(log2(5 + 1)) + 1 = 4
        assert!(index.height() <= 4, "height {} too deep", index.height());
    }

    #[test]
    fn test_all_rotation_shapes() {
        // Left-left, right-right, left-right, right-left triggers
        for keys in [["c", "b", "a"], ["a", "b", "c"], ["c", "a", "b"], ["a", "c", "b"]] {
            let mut index = AvlIndex::new();
            for key in keys {
                index.insert(key, 0u64).unwrap();
            }
            assert_eq!(index.height(), 2);
            assert_clean(&index);
        }
    }

    #[test]
    fn test_update_replaces_value_only() {
        let mut index = AvlIndex::new();
        index.insert("k", 1).unwrap();
        index.update("k", 9).unwrap();
        assert_eq!(index.get("k").unwrap(), &9);
        assert!(index.update("missing", 0).is_err());
    }

    #[test]
    fn test_remove_leaf_and_single_child() {
        let mut index = AvlIndex::new();
        for key in ["b", "a", "d", "c"] {
            index.insert(key, 0u64).unwrap();
        }
        index.remove("c").unwrap(); // leaf
        assert_clean(&index);
        index.remove("d").unwrap(); // had one child before the prior removal
        assert_clean(&index);
        assert!(index.get("c").is_err());
        assert!(index.get("d").is_err());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_two_children_uses_successor() {
        let mut index = AvlIndex::new();
        for key in ["d", "b", "f", "a", "c", "e", "g"] {
            index.insert(key, 0u64).unwrap();
        }
        index.remove("d").unwrap();
        assert_clean(&index);
        assert_eq!(index.range("a", "z"), ["a", "b", "c", "e", "f", "g"]);
    }

    #[test]
    fn test_remove_missing() {
        let mut index: AvlIndex<u64> = AvlIndex::new();
        index.insert("a", 1).unwrap();
        assert!(index.remove("b").is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_range_inclusive_and_inverted() {
        let mut index = AvlIndex::new();
        for key in ["b", "a", "d", "c"] {
            index.insert(key, 0u64).unwrap();
        }
        assert_eq!(index.range("a", "c"), ["a", "b", "c"]);
        assert_eq!(index.range("b", "b"), ["b"]);
        assert!(index.range("d", "a").is_empty());
        // Bounds need not be present keys
        assert_eq!(index.range("aa", "cz"), ["b", "c"]);
    }

    #[test]
    fn test_drain_everything() {
        let mut index = AvlIndex::new();
        let keys = ["m", "c", "t", "a", "f", "p", "x", "b", "e", "g"];
        for key in keys {
            index.insert(key, 0u64).unwrap();
        }
        for key in keys {
            index.remove(key).unwrap();
            assert_clean(&index);
        }
        assert!(index.is_empty());
        assert_eq!(index.height(), 0);
    }
}
