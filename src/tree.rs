//! Implicit binary tree over an ordered list of leaves.
//!
//! Nodes are addressed as `(height, pos)`: height 0 holds the leaves, and
//! the root sits at `(tree_height(n), 0)`. No node graph is ever allocated.
//! When a level has odd width, its last node is paired with itself.

use crate::hash::{DigestProvider, MerkleHash};
use std::ops::Range;

/// Number of nodes at `height` in a tree with `num_leaves` leaves
pub fn tree_width(num_leaves: usize, height: u32) -> usize {
    (num_leaves + (1 << height) - 1) >> height
}

/// Height of the root in a tree with `num_leaves` leaves
pub fn tree_height(num_leaves: usize) -> u32 {
    let mut height = 0;
    while tree_width(num_leaves, height) > 1 {
        height += 1;
    }
    height
}

/// Whether the node at `(height, pos)` has a distinct right child
pub fn has_right_child(num_leaves: usize, height: u32, pos: usize) -> bool {
    height > 0 && (pos << 1) + 1 < tree_width(num_leaves, height - 1)
}

/// Leaf indices covered by the node at `(height, pos)`
pub fn leaf_range(num_leaves: usize, height: u32, pos: usize) -> Range<usize> {
    let start = (pos << height).min(num_leaves);
    let end = ((pos + 1) << height).min(num_leaves);
    start..end
}

/// Hash of the node at `(height, pos)`
pub fn node_hash<HF: DigestProvider>(height: u32, pos: usize, leaves: &[MerkleHash]) -> MerkleHash {
    if height == 0 {
        return leaves[pos];
    }
    let left = node_hash::<HF>(height - 1, pos << 1, leaves);
    let right = if has_right_child(leaves.len(), height, pos) {
        node_hash::<HF>(height - 1, (pos << 1) + 1, leaves)
    } else {
        left
    };
    HF::hash_pair(&left, &right)
}

/// Merkle root of an ordered list of leaves
pub fn merkle_root<HF: DigestProvider>(leaves: &[MerkleHash]) -> MerkleHash {
    if leaves.is_empty() {
        return HF::default_hash();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => HF::hash_pair(left, right),
                [last] => HF::hash_pair(last, last),
                _ => unreachable!("chunks(2) yields one or two nodes"),
            })
            .collect();
    }
    level[0]
}
