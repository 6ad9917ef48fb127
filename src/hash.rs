//! Hash functions used to combine Merkle tree nodes

use blake2::Blake2s256;
use hex::{FromHex, ToHex};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use std::{fmt, ops::Deref};

/// Domain separation tags
pub(crate) const MERKLE_HASH: &[u8] = b"MerkleHash";

/// A function that combines two sibling nodes into their parent.
///
/// Implementations must be order sensitive: `hash_pair(a, b)` and
/// `hash_pair(b, a)` commit to different trees.
pub trait DigestProvider {
    /// Hash the left and right children of a node.
    fn hash_pair(left: &[u8], right: &[u8]) -> MerkleHash;

    /// Root of a tree with no leaves.
    fn default_hash() -> MerkleHash {
        MerkleHash::default()
    }
}

/// Double SHA-256, the hash committed to by block headers.
///
/// Nodes are the concatenation of both children with no domain tag, so
/// roots computed here match the `hashMerkleRoot` field of a header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sha256d;

impl Sha256d {
    /// Double SHA-256 of arbitrary bytes
    pub fn digest(data: &[u8]) -> MerkleHash {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        let mut result = [0u8; 32];
        result.copy_from_slice(second.as_slice());
        MerkleHash(result)
    }
}

impl DigestProvider for Sha256d {
    fn hash_pair(left: &[u8], right: &[u8]) -> MerkleHash {
        Self::digest(&[left, right].concat())
    }
}

/// Hash two nodes on a merkle tree by concatenating the left and
/// right leaves and taking the hash of the tagged, concatenated value.
/// Since SHA3 uses a sponge construction internally, inputs can be
/// raw leaf values or hash outputs from intermediate nodes
fn tagged_hash<D: Digest>(left: &[u8], right: &[u8]) -> MerkleHash {
    let mut hasher = D::new();
    let mut result = [0u8; 32];

    hasher.update(MERKLE_HASH);
    hasher.update([left, right].concat());
    result.copy_from_slice(hasher.finalize().as_slice());
    MerkleHash(result)
}

impl DigestProvider for Sha3_256 {
    fn hash_pair(left: &[u8], right: &[u8]) -> MerkleHash {
        tagged_hash::<Sha3_256>(left, right)
    }
}

impl DigestProvider for Blake2s256 {
    fn hash_pair(left: &[u8], right: &[u8]) -> MerkleHash {
        tagged_hash::<Blake2s256>(left, right)
    }
}

/// Combine two child digests into their parent digest
pub fn combine<HF: DigestProvider>(left: &MerkleHash, right: &MerkleHash) -> MerkleHash {
    HF::hash_pair(left, right)
}

/// A 32-byte digest, stored in internal byte order.
///
/// `Display` and `FromHex` use display order (byte-reversed), matching how
/// node RPCs print transaction and block hashes.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MerkleHash(pub [u8; 32]);

impl MerkleHash {
    /// Return the hash bytes in big-endian byte-order suitable for printing out byte by byte.
    pub fn bytes_in_display_order(&self) -> [u8; 32] {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        reversed_bytes
    }

    /// Convert bytes in big-endian byte-order into a [`MerkleHash`].
    pub fn from_bytes_in_display_order(bytes_in_display_order: &[u8; 32]) -> Self {
        let mut internal_byte_order = *bytes_in_display_order;
        internal_byte_order.reverse();
        Self(internal_byte_order)
    }
}

impl Deref for MerkleHash {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<[u8; 32]> for MerkleHash {
    fn eq(&self, other: &[u8; 32]) -> bool {
        &self.0 == other
    }
}

impl From<[u8; 32]> for MerkleHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bytes_in_display_order().encode_hex::<String>())
    }
}

impl fmt::Debug for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerkleHash({self})")
    }
}

impl FromHex for MerkleHash {
    type Error = hex::FromHexError;

    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self, Self::Error> {
        let bytes = <[u8; 32]>::from_hex(hex)?;
        Ok(Self::from_bytes_in_display_order(&bytes))
    }
}
