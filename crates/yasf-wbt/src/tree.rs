//! Arena-backed size-balanced tree.
//!
//! # Balance
//!
//! A sibling subtree is never smaller than either of its nephews:
//! `size(right) >= size(left.left)`, `size(right) >= size(left.right)` and the
//! mirror image. Each child therefore holds at most about twice its sibling,
//! which keeps the height logarithmic. Appends restore the property bottom-up
//! with single or double rotations followed by the recursive fix-up of the
//! rotated subtrees.
//!
//! Erasure unlinks the node the textbook way (two-child nodes are replaced by
//! their in-order successor) and keeps every subtree size exact, but it does
//! not rotate. Long runs of erasures without appends can therefore leave the
//! tree less balanced than a fresh build.

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// Handle to a node stored in a [`WbtTree`].
///
/// Handles are only meaningful for the tree that issued them and only until
/// the node is erased; the slot may then be reused by a later append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The arena slot backing this node.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Node<T> {
    size: usize,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    payload: T,
}

/// Structural counters for one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WbtStats {
    /// Nodes appended over the tree's lifetime.
    pub appends: u64,
    /// Nodes erased over the tree's lifetime.
    pub erasures: u64,
    /// Single rotations performed while rebalancing.
    pub rotations: u64,
}

impl fmt::Display for WbtStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appends={} erasures={} rotations={}",
            self.appends, self.erasures, self.rotations,
        )
    }
}

/// A broken structural invariant found by [`WbtTree::check_invariants`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("node {node:?} records size {recorded}, subtree holds {actual}")]
    SizeMismatch {
        node: NodeId,
        recorded: usize,
        actual: usize,
    },

    #[error("node {node:?} does not point back to its parent")]
    BrokenParentLink { node: NodeId },

    #[error("{live} live nodes but root size is {reachable}")]
    LengthMismatch { live: usize, reachable: usize },
}

/// Order-statistics tree ordered by insertion.
#[derive(Debug)]
pub struct WbtTree<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    root: Option<NodeId>,
    stats: WbtStats,
}

impl<T> Default for WbtTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WbtTree<T> {
    /// Create an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            stats: WbtStats {
                appends: 0,
                erasures: 0,
                rotations: 0,
            },
        }
    }

    /// Create an empty tree with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subtree_size(self.root)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub const fn stats(&self) -> WbtStats {
        self.stats
    }

    /// Payload of `id`.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &T {
        &self.node(id).payload
    }

    /// Mutable payload of `id`.
    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.node_mut(id).payload
    }

    // ── Traversal ───────────────────────────────────────────────────────

    /// Leftmost node.
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        let mut node = self.root?;
        while let Some(left) = self.node(node).left {
            node = left;
        }
        Some(node)
    }

    /// Rightmost node.
    #[must_use]
    pub fn last(&self) -> Option<NodeId> {
        let mut node = self.root?;
        while let Some(right) = self.node(node).right {
            node = right;
        }
        Some(node)
    }

    /// In-order predecessor of `id`.
    #[must_use]
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut node) = self.node(id).left {
            while let Some(right) = self.node(node).right {
                node = right;
            }
            return Some(node);
        }
        let mut node = id;
        while let Some(parent) = self.node(node).parent {
            if self.node(parent).left != Some(node) {
                return Some(parent);
            }
            node = parent;
        }
        None
    }

    /// In-order successor of `id`.
    #[must_use]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut node) = self.node(id).right {
            while let Some(left) = self.node(node).left {
                node = left;
            }
            return Some(node);
        }
        let mut node = id;
        while let Some(parent) = self.node(node).parent {
            if self.node(parent).right != Some(node) {
                return Some(parent);
            }
            node = parent;
        }
        None
    }

    /// In-order iterator over `(id, payload)` pairs.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            next: self.first(),
            remaining: self.len(),
        }
    }

    // ── Order statistics ────────────────────────────────────────────────

    /// Node at zero-based in-order position `ordinal`.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal >= self.len()`.
    #[must_use]
    pub fn select(&self, ordinal: usize) -> NodeId {
        let len = self.len();
        assert!(
            ordinal < len,
            "ordinal {ordinal} out of range for tree of {len} nodes"
        );
        let mut rank = ordinal;
        let mut node = self.root.unwrap_or_else(|| unreachable!("non-empty tree has a root"));
        loop {
            let current = self.node(node);
            let left_size = self.subtree_size(current.left);
            match rank.cmp(&left_size) {
                std::cmp::Ordering::Less => {
                    node = current.left.unwrap_or_else(|| unreachable!("rank below left size"));
                }
                std::cmp::Ordering::Greater => {
                    rank -= left_size + 1;
                    node = current.right.unwrap_or_else(|| unreachable!("rank past node"));
                }
                std::cmp::Ordering::Equal => return node,
            }
        }
    }

    /// Zero-based in-order position of `id`.
    #[must_use]
    pub fn rank(&self, id: NodeId) -> usize {
        let mut rank = self.subtree_size(self.node(id).left);
        let mut node = id;
        while let Some(parent) = self.node(node).parent {
            let p = self.node(parent);
            if p.right == Some(node) {
                rank += self.subtree_size(p.left) + 1;
            }
            node = parent;
        }
        rank
    }

    // ── Mutation ────────────────────────────────────────────────────────

    /// Append `payload` as the new rightmost node and rebalance.
    pub fn append(&mut self, payload: T) -> NodeId {
        let id = self.link_last(payload);
        self.adjust_size(id);
        id
    }

    /// Like [`append`](Self::append), but reports arena growth failure
    /// instead of aborting. The tree is unchanged on error.
    pub fn try_append(&mut self, payload: T) -> Result<NodeId, TryReserveError> {
        if self.free.is_empty() {
            self.slots.try_reserve(1)?;
        }
        Ok(self.append(payload))
    }

    /// Reserve arena room for `additional` more appends. Once reserved, those
    /// appends cannot fail.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.slots
            .try_reserve(additional.saturating_sub(self.free.len()))
    }

    /// Unlink `id` and return its payload.
    ///
    /// Subtree sizes are corrected along the path to the root; no rotations
    /// are performed.
    pub fn erase(&mut self, id: NodeId) -> T {
        let (parent, left, right) = {
            let node = self.node(id);
            (node.parent, node.left, node.right)
        };

        let fix_from = match (left, right) {
            (None, child) | (child, None) => {
                self.replace_child(parent, id, child);
                parent
            }
            (Some(left), Some(right)) => {
                let mut succ_parent = id;
                let mut succ = right;
                while let Some(next) = self.node(succ).left {
                    succ_parent = succ;
                    succ = next;
                }

                let fix_from = if succ_parent == id {
                    succ
                } else {
                    let succ_right = self.node(succ).right;
                    self.node_mut(succ_parent).left = succ_right;
                    if let Some(child) = succ_right {
                        self.node_mut(child).parent = Some(succ_parent);
                    }
                    self.node_mut(succ).right = Some(right);
                    self.node_mut(right).parent = Some(succ);
                    succ_parent
                };

                self.node_mut(succ).left = Some(left);
                self.node_mut(left).parent = Some(succ);
                // Takes over the erased node's count; the walk below removes one.
                let size = self.node(id).size;
                self.node_mut(succ).size = size;
                self.replace_child(parent, id, Some(succ));
                Some(fix_from)
            }
        };

        let mut cursor = fix_from;
        while let Some(node) = cursor {
            let node = self.node_mut(node);
            node.size -= 1;
            cursor = node.parent;
        }

        self.stats.erasures += 1;
        self.release(id)
    }

    /// Drop every node. Counters are kept.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// Number of nodes on the longest root-to-leaf path.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            height = height.max(depth);
            let node = self.node(id);
            stack.extend(node.left.map(|c| (c, depth + 1)));
            stack.extend(node.right.map(|c| (c, depth + 1)));
        }
        height
    }

    /// Verify size bookkeeping and parent back-links.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let reachable = match self.root {
            Some(root) => {
                if self.node(root).parent.is_some() {
                    return Err(InvariantViolation::BrokenParentLink { node: root });
                }
                self.verify_subtree(root)?
            }
            None => 0,
        };
        let live = self.slots.len() - self.free.len();
        if live == reachable {
            Ok(())
        } else {
            Err(InvariantViolation::LengthMismatch { live, reachable })
        }
    }

    /// Whether every node satisfies the sibling-versus-nephew size bound.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.slots.iter().flatten().all(|node| {
            let left = self.subtree_size(node.left);
            let right = self.subtree_size(node.right);
            let nephews_fit = |child: Option<NodeId>, sibling: usize| {
                child.is_none_or(|c| {
                    let c = self.node(c);
                    self.subtree_size(c.left) <= sibling && self.subtree_size(c.right) <= sibling
                })
            };
            nephews_fit(node.left, right) && nephews_fit(node.right, left)
        })
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn node(&self, id: NodeId) -> &Node<T> {
        let Some(Some(node)) = self.slots.get(id.0) else {
            panic!("stale or foreign node id {id:?}");
        };
        node
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        let Some(Some(node)) = self.slots.get_mut(id.0) else {
            panic!("stale or foreign node id {id:?}");
        };
        node
    }

    fn subtree_size(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.node(id).size)
    }

    fn link_last(&mut self, payload: T) -> NodeId {
        let parent = self.last();
        let node = Node {
            size: 1,
            parent,
            left: None,
            right: None,
            payload,
        };
        let id = if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(node);
            NodeId(slot)
        } else {
            self.slots.push(Some(node));
            NodeId(self.slots.len() - 1)
        };
        match parent {
            Some(parent) => self.node_mut(parent).right = Some(id),
            None => self.root = Some(id),
        }
        self.stats.appends += 1;
        id
    }

    fn release(&mut self, id: NodeId) -> T {
        let Some(node) = self.slots.get_mut(id.0).and_then(Option::take) else {
            panic!("stale or foreign node id {id:?}");
        };
        self.free.push(id.0);
        node.payload
    }

    /// Walk from a freshly linked leaf to the root, counting it in every
    /// ancestor and rebalancing each one on the side that grew.
    fn adjust_size(&mut self, mut node: NodeId) {
        while let Some(parent) = self.node(node).parent {
            self.node_mut(parent).size += 1;
            let right_grew = self.node(parent).right == Some(node);
            node = self.maintain(parent, right_grew);
        }
    }

    /// Point `parent`'s link to `old` at `new` instead (or the root link when
    /// `parent` is `None`) and set `new`'s back-link.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        if let Some(new) = new {
            self.node_mut(new).parent = parent;
        }
        match parent {
            None => self.root = new,
            Some(parent) => {
                let parent = self.node_mut(parent);
                if parent.left == Some(old) {
                    parent.left = new;
                } else {
                    parent.right = new;
                }
            }
        }
    }

    fn rotate_right(&mut self, y: NodeId) -> NodeId {
        let Some(x) = self.node(y).left else {
            unreachable!("right rotation without a left child");
        };
        let parent = self.node(y).parent;
        let inner = self.node(x).right;

        self.node_mut(y).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(y);
        }
        self.replace_child(parent, y, Some(x));
        self.node_mut(x).right = Some(y);
        self.node_mut(y).parent = Some(x);

        let total = self.node(y).size;
        let moved = self.subtree_size(self.node(x).left) + 1;
        self.node_mut(y).size = total - moved;
        self.node_mut(x).size = total;
        self.stats.rotations += 1;
        x
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.node(x).right else {
            unreachable!("left rotation without a right child");
        };
        let parent = self.node(x).parent;
        let inner = self.node(y).left;

        self.node_mut(x).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(x);
        }
        self.replace_child(parent, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);

        let total = self.node(x).size;
        let moved = self.subtree_size(self.node(y).right) + 1;
        self.node_mut(x).size = total - moved;
        self.node_mut(y).size = total;
        self.stats.rotations += 1;
        y
    }

    /// Restore the size bound at `t` after its `right_grew` side gained a
    /// node. Returns the root of the (possibly rotated) subtree.
    fn maintain(&mut self, t: NodeId, right_grew: bool) -> NodeId {
        let top = if right_grew {
            let Some(right) = self.node(t).right else {
                return t;
            };
            let sibling = self.subtree_size(self.node(t).left);
            if self.subtree_size(self.node(right).right) > sibling {
                self.rotate_left(t)
            } else if self.subtree_size(self.node(right).left) > sibling {
                self.rotate_right(right);
                self.rotate_left(t)
            } else {
                return t;
            }
        } else {
            let Some(left) = self.node(t).left else {
                return t;
            };
            let sibling = self.subtree_size(self.node(t).right);
            if self.subtree_size(self.node(left).left) > sibling {
                self.rotate_right(t)
            } else if self.subtree_size(self.node(left).right) > sibling {
                self.rotate_left(left);
                self.rotate_right(t)
            } else {
                return t;
            }
        };

        if let Some(left) = self.node(top).left {
            self.maintain(left, false);
        }
        if let Some(right) = self.node(top).right {
            self.maintain(right, true);
        }
        let top = self.maintain(top, false);
        self.maintain(top, true)
    }

    fn verify_subtree(&self, id: NodeId) -> Result<usize, InvariantViolation> {
        let node = self.node(id);
        let mut actual = 1;
        for child in [node.left, node.right].into_iter().flatten() {
            if self.node(child).parent != Some(id) {
                return Err(InvariantViolation::BrokenParentLink { node: child });
            }
            actual += self.verify_subtree(child)?;
        }
        if node.size == actual {
            Ok(actual)
        } else {
            Err(InvariantViolation::SizeMismatch {
                node: id,
                recorded: node.size,
                actual,
            })
        }
    }
}

/// In-order iterator returned by [`WbtTree::iter`].
pub struct Iter<'a, T> {
    tree: &'a WbtTree<T>,
    next: Option<NodeId>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.tree.next(id);
        self.remaining -= 1;
        Some((id, self.tree.get(id)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a WbtTree<T> {
    type Item = (NodeId, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(n: usize) -> WbtTree<usize> {
        let mut tree = WbtTree::new();
        for i in 0..n {
            tree.append(i);
        }
        tree
    }

    fn payloads(tree: &WbtTree<usize>) -> Vec<usize> {
        tree.iter().map(|(_, v)| *v).collect()
    }

    #[test]
    fn empty_tree() {
        let tree: WbtTree<usize> = WbtTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
        assert_eq!(tree.height(), 0);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn appends_keep_insertion_order() {
        let tree = build(100);
        assert_eq!(tree.len(), 100);
        assert_eq!(payloads(&tree), (0..100).collect::<Vec<_>>());
        for i in 0..100 {
            assert_eq!(*tree.get(tree.select(i)), i);
        }
        tree.check_invariants().unwrap();
        assert!(tree.is_balanced());
    }

    #[test]
    fn rank_inverts_select() {
        let tree = build(257);
        for i in 0..257 {
            assert_eq!(tree.rank(tree.select(i)), i);
        }
    }

    #[test]
    fn appends_rotate() {
        let tree = build(64);
        assert!(tree.stats().rotations > 0);
        assert_eq!(tree.stats().appends, 64);
        assert!(tree.height() <= 12, "height {}", tree.height());
    }

    #[test]
    fn prev_and_next_walk_in_order() {
        let tree = build(20);
        let first = tree.first().unwrap();
        let last = tree.last().unwrap();
        assert_eq!(*tree.get(first), 0);
        assert_eq!(*tree.get(last), 19);
        assert_eq!(tree.prev(first), None);
        assert_eq!(tree.next(last), None);

        let mut backwards = Vec::new();
        let mut cursor = Some(last);
        while let Some(id) = cursor {
            backwards.push(*tree.get(id));
            cursor = tree.prev(id);
        }
        assert_eq!(backwards, (0..20).rev().collect::<Vec<_>>());
    }

    #[test]
    fn erase_leaf_inner_and_root() {
        let mut tree = build(15);

        let leaf = tree.last().unwrap();
        assert_eq!(tree.erase(leaf), 14);

        let root = tree.root().unwrap();
        let root_value = *tree.get(root);
        assert_eq!(tree.erase(root), root_value);

        let inner = tree.select(3);
        assert_eq!(tree.erase(inner), 3);

        tree.check_invariants().unwrap();
        let expected: Vec<usize> = (0..14).filter(|v| *v != 3 && *v != root_value).collect();
        assert_eq!(payloads(&tree), expected);
        for i in 0..tree.len() {
            assert_eq!(tree.rank(tree.select(i)), i);
        }
        assert_eq!(tree.stats().erasures, 3);
    }

    #[test]
    fn erase_everything_from_the_front() {
        let mut tree = build(40);
        for expected in 0..40 {
            assert_eq!(tree.erase(tree.select(0)), expected);
            tree.check_invariants().unwrap();
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn erased_slots_are_reused() {
        let mut tree = build(4);
        let victim = tree.select(1);
        tree.erase(victim);
        let reused = tree.append(99);
        assert_eq!(reused.index(), victim.index());
        assert_eq!(payloads(&tree), vec![0, 2, 3, 99]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn get_mut_updates_payload() {
        let mut tree = build(3);
        let id = tree.select(2);
        *tree.get_mut(id) = 42;
        assert_eq!(payloads(&tree), vec![0, 1, 42]);
    }

    #[test]
    fn clear_drops_nodes() {
        let mut tree = build(10);
        tree.clear();
        assert!(tree.is_empty());
        tree.check_invariants().unwrap();
        tree.append(7);
        assert_eq!(payloads(&tree), vec![7]);
    }

    #[test]
    fn try_append_matches_append() {
        let mut tree = WbtTree::with_capacity(2);
        for i in 0..10_usize {
            tree.try_append(i).unwrap();
        }
        assert_eq!(payloads(&tree), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn iterator_is_exact_size() {
        let tree = build(9);
        let mut iter = tree.iter();
        assert_eq!(iter.len(), 9);
        iter.next();
        assert_eq!(iter.len(), 8);
    }

    #[test]
    fn stats_display() {
        let stats = WbtStats {
            appends: 3,
            erasures: 1,
            rotations: 2,
        };
        assert_eq!(stats.to_string(), "appends=3 erasures=1 rotations=2");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn select_past_end_panics() {
        let tree = build(3);
        let _ = tree.select(3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn select_on_empty_panics() {
        let tree: WbtTree<usize> = WbtTree::new();
        let _ = tree.select(0);
    }

    #[test]
    #[should_panic(expected = "stale")]
    fn erased_handle_is_rejected() {
        let mut tree = build(3);
        let id = tree.select(0);
        tree.erase(id);
        let _ = tree.get(id);
    }

    #[test]
    fn reserved_appends_do_not_grow_the_arena() {
        let mut tree = build(3);
        tree.erase(tree.select(1));
        tree.try_reserve(5).unwrap();
        let capacity = tree.slots.capacity();
        assert!(capacity >= tree.slots.len() + 4);
        for i in 0..5 {
            tree.try_append(i).unwrap();
        }
        assert_eq!(tree.slots.capacity(), capacity);
        assert_eq!(tree.len(), 7);
        tree.check_invariants().unwrap();
    }
}
