//! Proof, height resolution and locator errors

use crate::block::{BlockHash, OutPoint, TxId};
use crate::hash::MerkleHash;
use displaydoc::Display;

/// Structural defects in an encoded or in-memory partial Merkle tree
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// proof declares zero transactions
    NoTransactions,
    /// proof declares {0} transactions, more than the maximum of {1}
    TooManyTransactions(u32, u32),
    /// tree height {declared} does not match {expected} for the declared transaction count
    HeightMismatch { declared: u32, expected: u32 },
    /// proof carries {0} hashes for only {1} transactions
    TooManyHashes(usize, u32),
    /// proof carries {0} flag bits for {1} hashes
    TooFewFlags(usize, usize),
    /// flag bits exhausted before traversal completed
    FlagsExhausted,
    /// hashes exhausted before traversal completed
    HashesExhausted,
    /// identical sibling hashes at height {0}, position {1}
    DuplicateSibling(u32, usize),
    /// {0} hashes left over after traversal
    UnusedHashes(usize),
    /// {0} flag bytes left over after traversal
    UnusedFlags(usize),
    /// non-zero padding bits in the final flag byte
    NonZeroPadding,
    /// proof data is truncated
    Truncated,
    /// {0} bytes left over after the proof
    TrailingBytes(usize),
    /// invalid encoding: {0}
    Encoding(String),
}

impl std::error::Error for ProofError {}

#[derive(Debug, Display)]
pub enum Error {
    /// Malformed proof: {0}
    MalformedProof(ProofError),
    /// Proof root {computed} does not match header root {expected}
    RootMismatch {
        computed: MerkleHash,
        expected: MerkleHash,
    },
    /// Transaction {0} not found in block {1}
    TxNotInBlock(TxId, BlockHash),
    /// Transaction {0} not found among the block's transactions
    MissingLeaf(TxId),
    /// Transaction {0} not yet in a block, or its outputs are spent and no transaction index is maintained
    TxNotLocated(TxId),
    /// Block height {requested} out of range, tip is at {tip}
    HeightOutOfRange { requested: String, tip: u32 },
    /// Invalid height specifier: "{0}"
    InvalidSpecifier(String),
    /// Block {0} not found in chain
    BlockNotFound(BlockHash),
    /// Cannot build a proof over a block with no transactions
    EmptyBlock,
    /// Requested leaf count: {0} exceeds maximum number of leaves: {1}
    ExceededMaxTransactions(usize, usize),
    /// Got {0} match flags for {1} transactions
    MatchCountMismatch(usize, usize),
    /// No transaction ids were requested
    EmptyRequest,
    /// Verbosity {0} is not supported, expected 0 or 1
    InvalidVerbosity(u8),
    /// Duplicated transaction id: {0}
    DuplicateTxId(TxId),
    /// Output {0} is not an unspent coin
    UnknownOutPoint(OutPoint),
    /// Invalid configuration: {0}
    Config(String),
    /// I/O error: {0}
    Io(std::io::Error),
}

/// Coarse classification of [`Error`], the kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    MalformedProof,
    HeightOutOfRange,
    InvalidSpecifier,
    BlockNotFound,
    InvalidParameter,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedProof(_) | Self::RootMismatch { .. } => ErrorKind::MalformedProof,
            Self::TxNotInBlock(..) | Self::MissingLeaf(_) | Self::TxNotLocated(_) => {
                ErrorKind::NotFound
            }
            Self::HeightOutOfRange { .. } => ErrorKind::HeightOutOfRange,
            Self::InvalidSpecifier(_) => ErrorKind::InvalidSpecifier,
            Self::BlockNotFound(_) => ErrorKind::BlockNotFound,
            Self::EmptyBlock
            | Self::ExceededMaxTransactions(..)
            | Self::MatchCountMismatch(..)
            | Self::EmptyRequest
            | Self::InvalidVerbosity(_)
            | Self::DuplicateTxId(_)
            | Self::UnknownOutPoint(_) => ErrorKind::InvalidParameter,
            Self::Config(_) | Self::Io(_) => ErrorKind::Config,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedProof(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProofError> for Error {
    fn from(err: ProofError) -> Self {
        Self::MalformedProof(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
