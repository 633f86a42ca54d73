//! Structural invariant checkers for the tree variants.
//!
//! Each verifier walks a whole structure and reports every violation it
//! finds as a human-readable description. The checkers back the test
//! suites (which re-verify after every mutation) and `load`, which
//! rejects documents that deserialize cleanly but describe an invalid
//! structure. A violation surfacing from a live tree is a programming
//! error, not an input condition.

use std::fmt;

use crate::avl::AvlIndex;
use crate::btree::BTreeIndex;
use crate::btree::node::BNode;
use crate::redblack::{Color, NodeId, RedBlackIndex};

/// A single structural violation.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Key or position where the violation was detected.
    pub context: String,
    /// Human-readable description of the broken invariant.
    pub description: String,
}

impl Violation {
    fn new(context: impl Into<String>, description: impl Into<String>) -> Self {
        Self { context: context.into(), description: description.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.context, self.description)
    }
}

// ============================================================================
// AVL
// ============================================================================

/// Verifies BST ordering, cached heights and balance factors.
pub fn verify_avl<V>(index: &AvlIndex<V>) -> Vec<Violation> {
    let mut violations = Vec::new();
    let (_, count) = walk_avl(index.root(), None, None, &mut violations);
    if count != index.len() {
        violations.push(Violation::new(
            "root",
            format!("entry count {count} does not match recorded length {}", index.len()),
        ));
    }
    violations
}

fn walk_avl<V>(
    link: &Option<Box<crate::avl::AvlNode<V>>>,
    min: Option<&str>,
    max: Option<&str>,
    violations: &mut Vec<Violation>,
) -> (u32, usize) {
    let Some(node) = link else { return (0, 0) };
    let key = node.key.as_str();

    if let Some(min) = min {
        if key <= min {
            violations.push(Violation::new(key, format!("key not greater than ancestor {min}")));
        }
    }
    if let Some(max) = max {
        if key >= max {
            violations.push(Violation::new(key, format!("key not less than ancestor {max}")));
        }
    }

    let (left_height, left_count) = walk_avl(&node.left, min, Some(key), violations);
    let (right_height, right_count) = walk_avl(&node.right, Some(key), max, violations);

    let height = 1 + left_height.max(right_height);
    if node.height != height {
        violations.push(Violation::new(
            key,
            format!("cached height {} differs from computed {height}", node.height),
        ));
    }
    let balance = left_height as i32 - right_height as i32;
    if balance.abs() > 1 {
        violations.push(Violation::new(key, format!("balance factor {balance} out of range")));
    }

    (height, 1 + left_count + right_count)
}

// ============================================================================
// Red-black
// ============================================================================

/// Verifies BST ordering, coloring rules, black-height equality, parent
/// link symmetry and arena slot accounting.
pub fn verify_redblack<V>(index: &RedBlackIndex<V>) -> Vec<Violation> {
    let mut violations = Vec::new();

    if index.color_of(index.root_id()) == Color::Red {
        violations.push(Violation::new("root", "root is red"));
    }

    let (_, count) = walk_rb(index, index.root_id(), None, None, None, &mut violations);
    if count != index.len() {
        violations.push(Violation::new(
            "root",
            format!("entry count {count} does not match recorded length {}", index.len()),
        ));
    }
    if count + index.free_count() != index.slot_count() {
        violations.push(Violation::new(
            "arena",
            format!(
                "{count} reachable + {} free slots does not cover {} total",
                index.free_count(),
                index.slot_count()
            ),
        ));
    }
    violations
}

fn walk_rb<V>(
    index: &RedBlackIndex<V>,
    id: Option<NodeId>,
    min: Option<&str>,
    max: Option<&str>,
    parent: Option<NodeId>,
    violations: &mut Vec<Violation>,
) -> (usize, usize) {
    // An absent child is a black leaf-slot.
    let Some(id) = id else { return (1, 0) };
    let node = index.node(id);
    let key = node.key.as_str();

    if node.parent != parent {
        violations.push(Violation::new(key, "parent link does not match actual parent"));
    }
    if let Some(min) = min {
        if key <= min {
            violations.push(Violation::new(key, format!("key not greater than ancestor {min}")));
        }
    }
    if let Some(max) = max {
        if key >= max {
            violations.push(Violation::new(key, format!("key not less than ancestor {max}")));
        }
    }
    if node.color == Color::Red
        && (index.color_of(node.left) == Color::Red || index.color_of(node.right) == Color::Red)
    {
        violations.push(Violation::new(key, "red node has a red child"));
    }

    let (left_black, left_count) = walk_rb(index, node.left, min, Some(key), Some(id), violations);
    let (right_black, right_count) =
        walk_rb(index, node.right, Some(key), max, Some(id), violations);

    if left_black != right_black {
        violations.push(Violation::new(
            key,
            format!("black-height mismatch: left {left_black}, right {right_black}"),
        ));
    }

    let own = usize::from(node.color == Color::Black);
    (left_black + own, 1 + left_count + right_count)
}

// ============================================================================
// Multiway
// ============================================================================

/// Verifies degree bounds, child arity, intra-node ordering, separator
/// bounds, key/value arity and equal leaf depth.
pub fn verify_btree<V>(index: &BTreeIndex<V>) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut leaf_depth = None;
    let count = walk_bt(
        index.root(),
        index.min_degree(),
        index.rejects_duplicates(),
        true,
        1,
        &mut leaf_depth,
        None,
        None,
        &mut violations,
    );
    if count != index.len() {
        violations.push(Violation::new(
            "root",
            format!("entry count {count} does not match recorded length {}", index.len()),
        ));
    }
    violations
}

#[allow(clippy::too_many_arguments)]
fn walk_bt<V>(
    node: &BNode<V>,
    t: usize,
    unique_keys: bool,
    is_root: bool,
    depth: usize,
    leaf_depth: &mut Option<usize>,
    min: Option<&str>,
    max: Option<&str>,
    violations: &mut Vec<Violation>,
) -> usize {
    let context = node.keys.first().map_or_else(|| "(empty node)".to_string(), Clone::clone);

    if node.values.len() != node.keys.len() {
        violations.push(Violation::new(
            context.as_str(),
            format!("{} keys but {} values", node.keys.len(), node.values.len()),
        ));
    }
    if !is_root && node.keys.len() < t - 1 {
        violations.push(Violation::new(
            context.as_str(),
            format!("underfull node: {} keys, minimum {}", node.keys.len(), t - 1),
        ));
    }
    if node.keys.len() > 2 * t - 1 {
        violations.push(Violation::new(
            context.as_str(),
            format!("overfull node: {} keys, maximum {}", node.keys.len(), 2 * t - 1),
        ));
    }

    for pair in node.keys.windows(2) {
        let out_of_order = if unique_keys { pair[0] >= pair[1] } else { pair[0] > pair[1] };
        if out_of_order {
            violations.push(Violation::new(
                pair[1].as_str(),
                format!("key run out of order after {}", pair[0]),
            ));
        }
    }
    for key in &node.keys {
        // With duplicates permitted, keys equal to a separator may appear
        // in the subtrees on either side of it, so both bounds relax to
        // inclusive.
        if let Some(min) = min {
            let below = if unique_keys { key.as_str() <= min } else { key.as_str() < min };
            if below {
                violations.push(Violation::new(
                    key.as_str(),
                    format!("key below subtree bound {min}"),
                ));
            }
        }
        if let Some(max) = max {
            let above = if unique_keys { key.as_str() >= max } else { key.as_str() > max };
            if above {
                violations.push(Violation::new(
                    key.as_str(),
                    format!("key above subtree bound {max}"),
                ));
            }
        }
    }

    if node.is_leaf() {
        match *leaf_depth {
            None => *leaf_depth = Some(depth),
            Some(expected) if expected != depth => {
                violations.push(Violation::new(
                    context.as_str(),
                    format!("leaf at depth {depth}, expected {expected}"),
                ));
            },
            Some(_) => {},
        }
        return node.keys.len();
    }

    if node.children.len() != node.keys.len() + 1 {
        violations.push(Violation::new(
            context.as_str(),
            format!("{} keys but {} children", node.keys.len(), node.children.len()),
        ));
        return node.keys.len();
    }

    let mut count = node.keys.len();
    for (i, child) in node.children.iter().enumerate() {
        let child_min = if i == 0 { min } else { Some(node.keys[i - 1].as_str()) };
        let child_max = if i == node.keys.len() { max } else { Some(node.keys[i].as_str()) };
        count += walk_bt(
            child,
            t,
            unique_keys,
            false,
            depth + 1,
            leaf_depth,
            child_min,
            child_max,
            violations,
        );
    }
    count
}
