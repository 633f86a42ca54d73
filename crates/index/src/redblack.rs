//! Red-black binary search tree.
//!
//! Nodes live in a slot arena and address each other by slot id, so the
//! parent back-reference needed for upward fix-up walks is a plain index
//! with no ownership of its own. The arena (plus its free list) is the
//! single owner of every node.
//!
//! In deletion fix-up, an absent node reads as black and a missing
//! sibling bubbles the black deficit up to the parent.

use std::cmp::Ordering;
use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KeyExistsSnafu, KeyNotFoundSnafu, Result};
use crate::index::{IndexKind, OrderedIndex};
use crate::persist;

/// Arena slot index.
pub(crate) type NodeId = usize;

/// Node color tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Color {
    Red,
    Black,
}

#[derive(Debug)]
pub(crate) struct RbNode<V> {
    pub(crate) key: String,
    pub(crate) value: V,
    pub(crate) color: Color,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

/// Red-black tree index.
#[derive(Debug)]
pub struct RedBlackIndex<V> {
    slots: Vec<Option<RbNode<V>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
}

impl<V> Default for RedBlackIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RedBlackIndex<V> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), root: None, len: 0 }
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> &RbNode<V> {
        self.slots[id].as_ref().expect("vacant arena slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut RbNode<V> {
        self.slots[id].as_mut().expect("vacant arena slot")
    }

    fn left_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    fn right_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Color of a possibly absent node; absent reads as black.
    pub(crate) fn color_of(&self, id: Option<NodeId>) -> Color {
        id.map_or(Color::Black, |id| self.node(id).color)
    }

    fn alloc(&mut self, node: RbNode<V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            },
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            },
        }
    }

    fn release(&mut self, id: NodeId) -> RbNode<V> {
        let node = self.slots[id].take().expect("vacant arena slot");
        self.free.push(id);
        node
    }

    fn find(&self, key: &str) -> Option<NodeId> {
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            cur = match key.cmp(node.key.as_str()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    fn min_of(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.left_of(id) {
            id = left;
        }
        id
    }

    /// Adds a new binding: BST attach as a red node, then fix-up.
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        let mut parent = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            parent = Some(id);
            let node = self.node(id);
            cur = match key.cmp(node.key.as_str()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return KeyExistsSnafu { key }.fail(),
            };
        }

        let id = self.alloc(RbNode {
            key: key.to_string(),
            value,
            color: Color::Red,
            left: None,
            right: None,
            parent,
        });
        match parent {
            None => self.root = Some(id),
            Some(p) => {
                if key < self.node(p).key.as_str() {
                    self.node_mut(p).left = Some(id);
                } else {
                    self.node_mut(p).right = Some(id);
                }
            },
        }

        self.fix_insert(id);
        self.len += 1;
        Ok(())
    }

    /// Returns the value bound to `key`.
    pub fn get(&self, key: &str) -> Result<&V> {
        self.find(key)
            .map(|id| &self.node(id).value)
            .ok_or_else(|| KeyNotFoundSnafu { key }.build())
    }

    /// Replaces the value bound to an existing key.
    pub fn update(&mut self, key: &str, value: V) -> Result<()> {
        match self.find(key) {
            Some(id) => {
                self.node_mut(id).value = value;
                Ok(())
            },
            None => KeyNotFoundSnafu { key }.fail(),
        }
    }

    /// Removes a binding, restoring the coloring invariants.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let Some(z) = self.find(key) else { return KeyNotFoundSnafu { key }.fail() };

        // Physically splice out z itself, or its in-order successor when z
        // has two children.
        let target = match (self.left_of(z), self.right_of(z)) {
            (Some(_), Some(right)) => self.min_of(right),
            _ => z,
        };
        let child = self.left_of(target).or(self.right_of(target));
        let target_parent = self.parent_of(target);

        if let Some(c) = child {
            self.node_mut(c).parent = target_parent;
        }
        match target_parent {
            None => self.root = child,
            Some(p) => {
                if self.left_of(p) == Some(target) {
                    self.node_mut(p).left = child;
                } else {
                    self.node_mut(p).right = child;
                }
            },
        }

        // Copy payload, then the donor slot is already structurally gone.
        let removed = self.release(target);
        if target != z {
            let survivor = self.node_mut(z);
            survivor.key = removed.key;
            survivor.value = removed.value;
        }

        if removed.color == Color::Black {
            self.fix_remove(child, target_parent);
        }
        self.len -= 1;
        Ok(())
    }

    /// Ascending keys within `[min, max]`, both bounds inclusive.
    pub fn range(&self, min: &str, max: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_range(self.root, min, max, &mut out);
        out
    }

    fn collect_range(&self, id: Option<NodeId>, min: &str, max: &str, out: &mut Vec<String>) {
        let Some(id) = id else { return };
        let node = self.node(id);
        let key = node.key.as_str();
        if key >= min {
            self.collect_range(node.left, min, max, out);
        }
        if key >= min && key <= max {
            out.push(node.key.clone());
        }
        if key <= max {
            self.collect_range(node.right, min, max, out);
        }
    }

    fn rotate_left(&mut self, x: NodeId) {
        let Some(y) = self.right_of(x) else { return };

        let y_left = self.left_of(y);
        self.node_mut(x).right = y_left;
        if let Some(yl) = y_left {
            self.node_mut(yl).parent = Some(x);
        }

        let x_parent = self.parent_of(x);
        self.node_mut(y).parent = x_parent;
        match x_parent {
            None => self.root = Some(y),
            Some(p) => {
                if self.left_of(p) == Some(x) {
                    self.node_mut(p).left = Some(y);
                } else {
                    self.node_mut(p).right = Some(y);
                }
            },
        }

        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    fn rotate_right(&mut self, x: NodeId) {
        let Some(y) = self.left_of(x) else { return };

        let y_right = self.right_of(y);
        self.node_mut(x).left = y_right;
        if let Some(yr) = y_right {
            self.node_mut(yr).parent = Some(x);
        }

        let x_parent = self.parent_of(x);
        self.node_mut(y).parent = x_parent;
        match x_parent {
            None => self.root = Some(y),
            Some(p) => {
                if self.right_of(p) == Some(x) {
                    self.node_mut(p).right = Some(y);
                } else {
                    self.node_mut(p).left = Some(y);
                }
            },
        }

        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
    }

    /// Restores coloring after inserting the red node `id`.
    fn fix_insert(&mut self, mut id: NodeId) {
        while let Some(parent) = self.parent_of(id) {
            if self.node(parent).color != Color::Red {
                break;
            }
            let Some(grand) = self.parent_of(parent) else { break };

            if Some(parent) == self.left_of(grand) {
                let uncle = self.right_of(grand);
                if self.color_of(uncle) == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    if let Some(u) = uncle {
                        self.node_mut(u).color = Color::Black;
                    }
                    self.node_mut(grand).color = Color::Red;
                    id = grand;
                } else {
                    if Some(id) == self.right_of(parent) {
                        id = parent;
                        self.rotate_left(id);
                    }
                    if let Some(parent) = self.parent_of(id) {
                        self.node_mut(parent).color = Color::Black;
                        if let Some(grand) = self.parent_of(parent) {
                            self.node_mut(grand).color = Color::Red;
                            self.rotate_right(grand);
                        }
                    }
                }
            } else {
                let uncle = self.left_of(grand);
                if self.color_of(uncle) == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    if let Some(u) = uncle {
                        self.node_mut(u).color = Color::Black;
                    }
                    self.node_mut(grand).color = Color::Red;
                    id = grand;
                } else {
                    if Some(id) == self.left_of(parent) {
                        id = parent;
                        self.rotate_right(id);
                    }
                    if let Some(parent) = self.parent_of(id) {
                        self.node_mut(parent).color = Color::Black;
                        if let Some(grand) = self.parent_of(parent) {
                            self.node_mut(grand).color = Color::Red;
                            self.rotate_left(grand);
                        }
                    }
                }
            }
        }

        if let Some(root) = self.root {
            self.node_mut(root).color = Color::Black;
        }
    }

    /// Restores coloring after splicing out a black node.
    ///
    /// `node` is the replacement (possibly absent) and `parent` is the
    /// recorded parent of the spliced-out node, which is how the walk
    /// reaches the correct sibling even when `node` is empty.
    fn fix_remove(&mut self, mut node: Option<NodeId>, mut parent: Option<NodeId>) {
        while node != self.root && self.color_of(node) == Color::Black {
            let Some(p) = parent else { break };

            if node == self.left_of(p) {
                let mut sibling = self.right_of(p);
                if self.color_of(sibling) == Color::Red {
                    if let Some(s) = sibling {
                        self.node_mut(s).color = Color::Black;
                    }
                    self.node_mut(p).color = Color::Red;
                    self.rotate_left(p);
                    sibling = self.right_of(p);
                }
                let Some(s) = sibling else {
                    node = Some(p);
                    parent = self.parent_of(p);
                    continue;
                };
                if self.color_of(self.left_of(s)) == Color::Black
                    && self.color_of(self.right_of(s)) == Color::Black
                {
                    self.node_mut(s).color = Color::Red;
                    node = Some(p);
                    parent = self.parent_of(p);
                } else {
                    let mut s = s;
                    if self.color_of(self.right_of(s)) == Color::Black {
                        if let Some(sl) = self.left_of(s) {
                            self.node_mut(sl).color = Color::Black;
                        }
                        self.node_mut(s).color = Color::Red;
                        self.rotate_right(s);
                        match self.right_of(p) {
                            Some(next) => s = next,
                            None => {
                                node = Some(p);
                                parent = self.parent_of(p);
                                continue;
                            },
                        }
                    }
                    self.node_mut(s).color = self.node(p).color;
                    if let Some(sr) = self.right_of(s) {
                        self.node_mut(sr).color = Color::Black;
                    }
                    self.node_mut(p).color = Color::Black;
                    self.rotate_left(p);
                    node = self.root;
                    parent = None;
                }
            } else {
                let mut sibling = self.left_of(p);
                if self.color_of(sibling) == Color::Red {
                    if let Some(s) = sibling {
                        self.node_mut(s).color = Color::Black;
                    }
                    self.node_mut(p).color = Color::Red;
                    self.rotate_right(p);
                    sibling = self.left_of(p);
                }
                let Some(s) = sibling else {
                    node = Some(p);
                    parent = self.parent_of(p);
                    continue;
                };
                if self.color_of(self.right_of(s)) == Color::Black
                    && self.color_of(self.left_of(s)) == Color::Black
                {
                    self.node_mut(s).color = Color::Red;
                    node = Some(p);
                    parent = self.parent_of(p);
                } else {
                    let mut s = s;
                    if self.color_of(self.left_of(s)) == Color::Black {
                        if let Some(sr) = self.right_of(s) {
                            self.node_mut(sr).color = Color::Black;
                        }
                        self.node_mut(s).color = Color::Red;
                        self.rotate_left(s);
                        match self.left_of(p) {
                            Some(next) => s = next,
                            None => {
                                node = Some(p);
                                parent = self.parent_of(p);
                                continue;
                            },
                        }
                    }
                    self.node_mut(s).color = self.node(p).color;
                    if let Some(sl) = self.left_of(s) {
                        self.node_mut(sl).color = Color::Black;
                    }
                    self.node_mut(p).color = Color::Black;
                    self.rotate_right(p);
                    node = self.root;
                    parent = None;
                }
            }
        }

        if let Some(n) = node {
            self.node_mut(n).color = Color::Black;
        }
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Borrowed structural view of a node for serialization. Arena slot ids and
/// parent links are rebuild artifacts and stay out of the document.
#[derive(Serialize)]
struct SavedNode<'a, V> {
    key: &'a str,
    value: &'a V,
    color: Color,
    left: Option<Box<SavedNode<'a, V>>>,
    right: Option<Box<SavedNode<'a, V>>>,
}

/// Owned counterpart of [`SavedNode`] for deserialization.
#[derive(Deserialize)]
struct LoadedNode<V> {
    key: String,
    value: V,
    color: Color,
    left: Option<Box<LoadedNode<V>>>,
    right: Option<Box<LoadedNode<V>>>,
}

impl<V> RedBlackIndex<V> {
    fn to_saved(&self, id: NodeId) -> SavedNode<'_, V> {
        let node = self.node(id);
        SavedNode {
            key: &node.key,
            value: &node.value,
            color: node.color,
            left: node.left.map(|l| Box::new(self.to_saved(l))),
            right: node.right.map(|r| Box::new(self.to_saved(r))),
        }
    }

    fn adopt(&mut self, doc: LoadedNode<V>, parent: Option<NodeId>) -> NodeId {
        let id = self.alloc(RbNode {
            key: doc.key,
            value: doc.value,
            color: doc.color,
            left: None,
            right: None,
            parent,
        });
        if let Some(left) = doc.left {
            let l = self.adopt(*left, Some(id));
            self.node_mut(id).left = Some(l);
        }
        if let Some(right) = doc.right {
            let r = self.adopt(*right, Some(id));
            self.node_mut(id).right = Some(r);
        }
        self.len += 1;
        id
    }
}

impl<V> OrderedIndex<V> for RedBlackIndex<V>
where
    V: Serialize + DeserializeOwned,
{
    fn kind(&self) -> IndexKind {
        IndexKind::RedBlack
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
        let doc = self.root.map(|root| self.to_saved(root));
        persist::write_document(dest, persist::REDBLACK_FORMAT, &doc)
    }

    fn load(&mut self, src: &mut dyn io::Read) -> Result<()> {
        let doc: Option<LoadedNode<V>> = persist::read_document(src, persist::REDBLACK_FORMAT)?;
        let mut candidate = Self::new();
        if let Some(doc) = doc {
            let root = candidate.adopt(doc, None);
            candidate.root = Some(root);
        }
        persist::validate_loaded(crate::integrity::verify_redblack(&candidate))?;
        *self = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::verify_redblack;

    fn assert_clean(index: &RedBlackIndex<u64>) {
        let violations = verify_redblack(index);
        assert!(violations.is_empty(), "invariant violations: {violations:?}");
    }

    #[test]
    fn test_insert_and_get() {
        let mut index = RedBlackIndex::new();
        index.insert("b", 1).unwrap();
        index.insert("a", 2).unwrap();
        index.insert("d", 3).unwrap();
        index.insert("c", 4).unwrap();

        assert_eq!(index.get("a").unwrap(), &2);
        assert_eq!(index.get("d").unwrap(), &3);
        assert_eq!(index.len(), 4);
        assert_clean(&index);
    }

    #[test]
    fn test_root_is_black() {
        let mut index = RedBlackIndex::new();
        index.insert("m", 0u64).unwrap();
        assert_eq!(index.color_of(index.root_id()), Color::Black);
        index.insert("a", 0).unwrap();
        index.insert("z", 0).unwrap();
        assert_eq!(index.color_of(index.root_id()), Color::Black);
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut index = RedBlackIndex::new();
        index.insert("x", 1).unwrap();
        let err = index.insert("x", 2).unwrap_err();
        assert!(matches!(err, crate::Error::KeyExists { .. }));
        assert_eq!(index.get("x").unwrap(), &1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_ascending_inserts_stay_clean() {
        let mut index = RedBlackIndex::new();
        for i in 0..32 {
            index.insert(&format!("key-{i:02}"), i as u64).unwrap();
            assert_clean(&index);
        }
    }

    #[test]
    fn test_remove_red_leaf() {
        let mut index = RedBlackIndex::new();
        for key in ["b", "a", "c"] {
            index.insert(key, 0u64).unwrap();
        }
        index.remove("c").unwrap();
        assert_clean(&index);
        assert!(index.get("c").is_err());
    }

    #[test]
    fn test_remove_black_node_with_no_replacement() {
        // Deleting a black leaf forces the fix-up to walk from the recorded
        // parent with an empty replacement.
        let mut index = RedBlackIndex::new();
        for i in 0..16 {
            index.insert(&format!("key-{i:02}"), i as u64).unwrap();
        }
        for i in [0, 15, 7, 8, 3, 12, 1, 14] {
            index.remove(&format!("key-{i:02}")).unwrap();
            assert_clean(&index);
        }
        assert_eq!(index.len(), 8);
    }

    #[test]
    fn test_remove_two_children_copies_successor() {
        let mut index = RedBlackIndex::new();
        for key in ["d", "b", "f", "a", "c", "e", "g"] {
            index.insert(key, 0u64).unwrap();
        }
        index.remove("d").unwrap();
        assert_clean(&index);
        assert_eq!(index.range("a", "z"), ["a", "b", "c", "e", "f", "g"]);
    }

    #[test]
    fn test_remove_missing() {
        let mut index: RedBlackIndex<u64> = RedBlackIndex::new();
        index.insert("a", 1).unwrap();
        assert!(index.remove("zz").is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_degenerate_deep_deletions() {
        // Ascending inserts then deletions from both ends and the middle;
        // exercises the nil-replacement and nil-sibling fix-up branches.
        let mut index = RedBlackIndex::new();
        let keys: Vec<String> = (0..64).map(|i| format!("key-{i:03}")).collect();
        for (i, key) in keys.iter().enumerate() {
            index.insert(key, i as u64).unwrap();
        }
        let mut order = Vec::new();
        let (mut lo, mut hi) = (0i32, keys.len() as i32 - 1);
        while lo <= hi {
            order.push(lo as usize);
            if lo != hi {
                order.push(hi as usize);
            }
            lo += 1;
            hi -= 1;
        }
        for &i in &order {
            index.remove(&keys[i]).unwrap();
            assert_clean(&index);
        }
    }

    #[test]
    fn test_slots_are_reused() {
        let mut index = RedBlackIndex::new();
        for key in ["a", "b", "c"] {
            index.insert(key, 0u64).unwrap();
        }
        let slots_before = index.slot_count();
        index.remove("b").unwrap();
        index.insert("d", 0).unwrap();
        assert_eq!(index.slot_count(), slots_before);
        assert_eq!(index.free_count(), 0);
        assert_clean(&index);
    }

    #[test]
    fn test_range_inclusive_and_inverted() {
        let mut index = RedBlackIndex::new();
        for key in ["b", "a", "d", "c"] {
            index.insert(key, 0u64).unwrap();
        }
        assert_eq!(index.range("a", "c"), ["a", "b", "c"]);
        assert!(index.range("d", "a").is_empty());
    }

    #[test]
    fn test_drain_everything() {
        let mut index = RedBlackIndex::new();
        let keys = ["m", "c", "t", "a", "f", "p", "x", "b", "e", "g"];
        for key in keys {
            index.insert(key, 0u64).unwrap();
        }
        for key in keys {
            index.remove(key).unwrap();
            assert_clean(&index);
        }
        assert!(index.is_empty());
        assert_eq!(index.root_id(), None);
    }
}
