//! Node-level surgery for the multiway tree: split, merge and borrow.
//!
//! Every operation here is local to one parent and its children; the
//! descent logic in the parent module decides when to apply them. Values
//! travel with their keys through every rearrangement.

use std::mem;

use serde::{Deserialize, Serialize};

/// One multiway node: a sorted key run, the values bound to those keys,
/// and one more child than keys when internal. A leaf has no children.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BNode<V> {
    pub(crate) keys: Vec<String>,
    pub(crate) values: Vec<V>,
    pub(crate) children: Vec<BNode<V>>,
}

impl<V> BNode<V> {
    pub(crate) fn leaf() -> Self {
        Self { keys: Vec::new(), values: Vec::new(), children: Vec::new() }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn is_full(&self, t: usize) -> bool {
        self.keys.len() == 2 * t - 1
    }

    /// Lower-bound slot for `key`: the first position whose key is not
    /// less than `key`, plus whether that position is an exact match.
    pub(crate) fn find_slot(&self, key: &str) -> (usize, bool) {
        let i = self.keys.partition_point(|k| k.as_str() < key);
        let found = self.keys.get(i).is_some_and(|k| k == key);
        (i, found)
    }

    /// Upper-bound slot for `key`: the position after any run of equal
    /// keys, used by insertion so duplicates land to the right.
    pub(crate) fn upper_slot(&self, key: &str) -> usize {
        self.keys.partition_point(|k| k.as_str() <= key)
    }

    /// Maximum key of the subtree rooted here.
    pub(crate) fn peek_max_key(&self) -> Option<&str> {
        let mut node = self;
        loop {
            if node.is_leaf() {
                return node.keys.last().map(String::as_str);
            }
            node = node.children.last()?;
        }
    }

    /// Minimum key of the subtree rooted here.
    pub(crate) fn peek_min_key(&self) -> Option<&str> {
        let mut node = self;
        loop {
            if node.is_leaf() {
                return node.keys.first().map(String::as_str);
            }
            node = node.children.first()?;
        }
    }

    /// Splits the full child at index `i`, promoting its median key into
    /// this node at position `i` and inserting the new right sibling at
    /// `i + 1`. The caller guarantees this node is not full.
    pub(crate) fn split_child(&mut self, i: usize, t: usize) {
        let child = &mut self.children[i];
        let right_keys = child.keys.split_off(t);
        let right_values = child.values.split_off(t);
        let right_children =
            if child.is_leaf() { Vec::new() } else { child.children.split_off(t) };
        let median_key = child.keys.pop().expect("split of an underfull node");
        let median_value = child.values.pop().expect("split of an underfull node");

        let sibling =
            Self { keys: right_keys, values: right_values, children: right_children };
        self.keys.insert(i, median_key);
        self.values.insert(i, median_value);
        self.children.insert(i + 1, sibling);
    }

    /// Absorbs the separator at `i` and the child at `i + 1` into the
    /// child at `i`.
    pub(crate) fn merge_children(&mut self, i: usize) {
        let right = self.children.remove(i + 1);
        let key = self.keys.remove(i);
        let value = self.values.remove(i);

        let left = &mut self.children[i];
        left.keys.push(key);
        left.values.push(value);
        left.keys.extend(right.keys);
        left.values.extend(right.values);
        left.children.extend(right.children);
    }

    /// Rotates one entry from the left sibling through the separator at
    /// `i - 1` into the child at `i`.
    pub(crate) fn borrow_from_prev(&mut self, i: usize) {
        let (head, tail) = self.children.split_at_mut(i);
        let sibling = &mut head[i - 1];
        let child = &mut tail[0];

        let up_key = sibling.keys.pop().expect("borrow from an empty sibling");
        let up_value = sibling.values.pop().expect("borrow from an empty sibling");
        child.keys.insert(0, mem::replace(&mut self.keys[i - 1], up_key));
        child.values.insert(0, mem::replace(&mut self.values[i - 1], up_value));

        if !child.is_leaf() {
            let moved = sibling.children.pop().expect("internal sibling has children");
            child.children.insert(0, moved);
        }
    }

    /// Mirror of [`Self::borrow_from_prev`]: rotates one entry from the
    /// right sibling through the separator at `i`.
    pub(crate) fn borrow_from_next(&mut self, i: usize) {
        let (head, tail) = self.children.split_at_mut(i + 1);
        let child = &mut head[i];
        let sibling = &mut tail[0];

        let up_key = sibling.keys.remove(0);
        let up_value = sibling.values.remove(0);
        child.keys.push(mem::replace(&mut self.keys[i], up_key));
        child.values.push(mem::replace(&mut self.values[i], up_value));

        if !child.is_leaf() {
            child.children.push(sibling.children.remove(0));
        }
    }
}
