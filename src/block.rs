//! Blocks, headers and the identifiers that refer to them

use crate::hash::{MerkleHash, Sha256d};
use crate::partial::PartialMerkleTree;
use crate::tree::merkle_root;
use hex::FromHex;
use std::{fmt, ops::Deref, str::FromStr};

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub MerkleHash);

        impl Deref for $name {
            type Target = MerkleHash;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<MerkleHash> for $name {
            fn from(hash: MerkleHash) -> Self {
                Self(hash)
            }
        }

        impl From<$name> for MerkleHash {
            fn from(hash: $name) -> Self {
                hash.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl FromHex for $name {
            type Error = hex::FromHexError;

            fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self, Self::Error> {
                MerkleHash::from_hex(hex).map(Self)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }
    };
}

hash_newtype!(
    /// Transaction id, the leaf value of a block's Merkle tree
    TxId
);

hash_newtype!(
    /// Block hash (SHA256d hash of the block header)
    BlockHash
);

/// Reference to a single transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// 80-byte block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: BlockHash,
    pub merkle_root: MerkleHash,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// SHA256d of the serialized header
    pub fn hash(&self) -> BlockHash {
        BlockHash(Sha256d::digest(&self.to_bytes()))
    }
}

/// A stored block: its header, position in the chain, and transaction ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: u32,
    pub hash: BlockHash,
    pub header: BlockHeader,
    pub txids: Vec<TxId>,
}

impl Block {
    /// Assemble a block, committing the header to `txids`.
    pub fn new(height: u32, prev_block: BlockHash, time: u32, txids: Vec<TxId>) -> Self {
        let leaves: Vec<MerkleHash> = txids.iter().map(|txid| txid.0).collect();
        let header = BlockHeader {
            version: 4,
            prev_block,
            merkle_root: merkle_root::<Sha256d>(&leaves),
            time,
            bits: 0x207f_ffff,
            nonce: height,
        };
        Self {
            height,
            hash: header.hash(),
            header,
            txids,
        }
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.txids.contains(txid)
    }
}

/// A block header together with a partial Merkle tree over its transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    pub tree: PartialMerkleTree,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_commits_to_txids() {
        let txids: Vec<TxId> = (0u8..3).map(|i| TxId(Sha256d::digest(&[i]))).collect();
        let block = Block::new(1, BlockHash::default(), 0, txids.clone());
        let leaves: Vec<MerkleHash> = txids.iter().map(|t| t.0).collect();
        assert_eq!(block.header.merkle_root, merkle_root::<Sha256d>(&leaves));
        assert_eq!(block.hash, block.header.hash());
        assert!(block.contains(&txids[2]));
        assert!(!block.contains(&TxId::default()));
    }

    #[test]
    fn test_header_hash_depends_on_prev_block() {
        let a = Block::new(1, BlockHash::default(), 0, vec![TxId::default()]);
        let b = Block::new(1, a.hash, 0, vec![TxId::default()]);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_txid_parses_display_order() {
        let text = "00000000000000000000000000000000000000000000000000000000000000ff";
        let txid: TxId = text.parse().unwrap();
        assert_eq!(txid.0 .0[0], 0xff);
        assert_eq!(txid.to_string(), text);
        assert_eq!(format!("{txid:?}"), format!("TxId({text})"));
    }
}
