//! Weight-balanced order-statistics tree.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Every node carries
//! the size of its subtree, which gives O(log n) `select` (ordinal to node) and
//! `rank` (node to ordinal). The tree is ordered purely by insertion: new
//! payloads are always appended as the rightmost node, so no comparator is
//! ever consulted.

pub mod tree;


pub use tree::{InvariantViolation, Iter, NodeId, WbtStats, WbtTree};
