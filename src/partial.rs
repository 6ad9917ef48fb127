//! Partial Merkle trees: compact proofs that a subset of transactions
//! belongs to a block.
//!
//! The builder walks the implicit tree depth first, left before right. Every
//! visited node emits one flag bit: `1` if the subtree below it contains a
//! matched leaf, `0` otherwise. A node whose bit is `0`, and every leaf,
//! also emits its hash; the walk does not descend below it. The verifier
//! replays the same walk from the flag bits alone, consuming hashes in the
//! same order.

use crate::{
    block::TxId,
    error::{Error, ProofError},
    hash::{DigestProvider, MerkleHash, Sha256d},
    tree::{has_right_child, leaf_range, node_hash, tree_height},
};
use log::trace;
use std::{collections::HashSet, fmt, marker::PhantomData};

/// Upper bound on the leaf count a proof may declare. A 2 MB block cannot
/// hold more transactions than this, which also bounds traversal depth at 16.
pub const MAX_PROOF_TRANSACTIONS: u32 = 2_000_000 / 60;

/// Compact inclusion proof for a subset of a block's transactions
pub struct PartialMerkleTree<HF: DigestProvider = Sha256d> {
    _hasher: PhantomData<HF>,
    /// Number of leaves in the source block
    pub total_transactions: u32,
    /// Height of the root, `tree_height(total_transactions)`
    pub tree_height: u32,
    /// Hashes at pruned subtrees and leaves, in traversal order
    pub hashes: Vec<MerkleHash>,
    /// One bit per visited node, in traversal order
    pub flags: Vec<bool>,
}

/// Output of a successful [`PartialMerkleTree::verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedProof {
    /// Root recomputed from the proof. The caller compares it to a trusted header.
    pub root: MerkleHash,
    /// Matched transaction ids, in block order
    pub matched: Vec<TxId>,
    /// Leaf position of each matched id
    pub indices: Vec<u32>,
}

struct Cursor {
    bits_used: usize,
    hashes_used: usize,
}

impl<HF: DigestProvider> PartialMerkleTree<HF> {
    /// Assemble a proof from its parts, deriving the tree height.
    pub fn from_parts(
        total_transactions: u32,
        hashes: Vec<MerkleHash>,
        flags: Vec<bool>,
    ) -> Self {
        Self {
            _hasher: PhantomData,
            total_transactions,
            tree_height: tree_height(total_transactions as usize),
            hashes,
            flags,
        }
    }

    /// Build a proof that every member of `matches` is among `txids`.
    pub fn build(txids: &[TxId], matches: &HashSet<TxId>) -> Result<Self, Error> {
        let flags: Vec<bool> = txids.iter().map(|txid| matches.contains(txid)).collect();
        let present: HashSet<&TxId> = txids.iter().collect();
        if let Some(missing) = matches.iter().find(|txid| !present.contains(txid)) {
            return Err(Error::MissingLeaf(*missing));
        }
        Self::from_flags(txids, &flags)
    }

    /// Build a proof for the leaves whose position in `matches` is `true`.
    ///
    /// `matches` holds one entry per transaction id.
    pub fn from_flags(txids: &[TxId], matches: &[bool]) -> Result<Self, Error> {
        if txids.is_empty() {
            return Err(Error::EmptyBlock);
        }
        if matches.len() != txids.len() {
            return Err(Error::MatchCountMismatch(matches.len(), txids.len()));
        }
        let total = u32::try_from(txids.len())
            .map_err(|_| Error::ExceededMaxTransactions(txids.len(), u32::MAX as usize))?;
        let leaves: Vec<MerkleHash> = txids.iter().map(|txid| txid.0).collect();

        let mut tree = Self::from_parts(total, Vec::new(), Vec::new());
        let height = tree.tree_height;
        tree.traverse_and_build(height, 0, &leaves, matches);
        Ok(tree)
    }

    fn traverse_and_build(
        &mut self,
        height: u32,
        pos: usize,
        leaves: &[MerkleHash],
        matches: &[bool],
    ) {
        let parent_of_match = leaf_range(leaves.len(), height, pos).any(|i| matches[i]);
        self.flags.push(parent_of_match);
        if height == 0 || !parent_of_match {
            self.hashes.push(node_hash::<HF>(height, pos, leaves));
            return;
        }
        self.traverse_and_build(height - 1, pos << 1, leaves, matches);
        if has_right_child(leaves.len(), height, pos) {
            self.traverse_and_build(height - 1, (pos << 1) + 1, leaves, matches);
        }
    }

    /// Recompute the root and recover the matched transaction ids.
    ///
    /// The result says nothing about which block the proof belongs to;
    /// compare [`VerifiedProof::root`] to a trusted header root for that.
    pub fn verify(&self) -> Result<VerifiedProof, Error> {
        let total = self.total_transactions;
        if total == 0 {
            return Err(ProofError::NoTransactions.into());
        }
        if total > MAX_PROOF_TRANSACTIONS {
            return Err(ProofError::TooManyTransactions(total, MAX_PROOF_TRANSACTIONS).into());
        }
        let expected = tree_height(total as usize);
        if self.tree_height != expected {
            return Err(ProofError::HeightMismatch {
                declared: self.tree_height,
                expected,
            }
            .into());
        }
        if self.hashes.len() > total as usize {
            return Err(ProofError::TooManyHashes(self.hashes.len(), total).into());
        }
        if self.flags.len() < self.hashes.len() {
            return Err(ProofError::TooFewFlags(self.flags.len(), self.hashes.len()).into());
        }

        let mut cursor = Cursor {
            bits_used: 0,
            hashes_used: 0,
        };
        let mut verified = VerifiedProof {
            root: MerkleHash::default(),
            matched: Vec::new(),
            indices: Vec::new(),
        };
        verified.root = self.traverse_and_extract(expected, 0, &mut cursor, &mut verified)?;

        if cursor.hashes_used != self.hashes.len() {
            return Err(ProofError::UnusedHashes(self.hashes.len() - cursor.hashes_used).into());
        }
        let bytes_used = cursor.bits_used.div_ceil(8);
        let bytes_held = self.flags.len().div_ceil(8);
        if bytes_used != bytes_held {
            return Err(ProofError::UnusedFlags(bytes_held - bytes_used).into());
        }
        if self.flags[cursor.bits_used..].iter().any(|&bit| bit) {
            return Err(ProofError::NonZeroPadding.into());
        }
        trace!(
            "verified proof over {total} transactions: {} matches, {} bits, {} hashes",
            verified.matched.len(),
            cursor.bits_used,
            cursor.hashes_used
        );
        Ok(verified)
    }

    fn traverse_and_extract(
        &self,
        height: u32,
        pos: usize,
        cursor: &mut Cursor,
        verified: &mut VerifiedProof,
    ) -> Result<MerkleHash, ProofError> {
        let parent_of_match = *self
            .flags
            .get(cursor.bits_used)
            .ok_or(ProofError::FlagsExhausted)?;
        cursor.bits_used += 1;

        if height == 0 || !parent_of_match {
            let hash = *self
                .hashes
                .get(cursor.hashes_used)
                .ok_or(ProofError::HashesExhausted)?;
            cursor.hashes_used += 1;
            if height == 0 && parent_of_match {
                // `pos` is a leaf index below `total_transactions`
                verified.matched.push(TxId(hash));
                verified.indices.push(pos as u32);
            }
            return Ok(hash);
        }

        let num_leaves = self.total_transactions as usize;
        let left = self.traverse_and_extract(height - 1, pos << 1, cursor, verified)?;
        let right = if has_right_child(num_leaves, height, pos) {
            let right = self.traverse_and_extract(height - 1, (pos << 1) + 1, cursor, verified)?;
            if right == left {
                return Err(ProofError::DuplicateSibling(height - 1, (pos << 1) + 1));
            }
            right
        } else {
            left
        };
        Ok(HF::hash_pair(&left, &right))
    }
}

impl<HF: DigestProvider> Clone for PartialMerkleTree<HF> {
    fn clone(&self) -> Self {
        Self {
            _hasher: PhantomData,
            total_transactions: self.total_transactions,
            tree_height: self.tree_height,
            hashes: self.hashes.clone(),
            flags: self.flags.clone(),
        }
    }
}

impl<HF: DigestProvider> PartialEq for PartialMerkleTree<HF> {
    fn eq(&self, other: &Self) -> bool {
        self.total_transactions == other.total_transactions
            && self.tree_height == other.tree_height
            && self.hashes == other.hashes
            && self.flags == other.flags
    }
}

impl<HF: DigestProvider> Eq for PartialMerkleTree<HF> {}

impl<HF: DigestProvider> fmt::Debug for PartialMerkleTree<HF> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.flags.iter().map(|&b| if b { '1' } else { '0' }).collect();
        f.debug_struct("PartialMerkleTree")
            .field("total_transactions", &self.total_transactions)
            .field("tree_height", &self.tree_height)
            .field("hashes", &self.hashes)
            .field("flags", &bits)
            .finish()
    }
}
