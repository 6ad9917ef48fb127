//! Compact transaction-inclusion proofs (partial Merkle trees) and block
//! height resolution

mod block;
mod chain;
mod config;
pub mod encoding;
mod error;
mod hash;
mod height;
mod locator;
mod partial;
mod service;
pub mod tree;

pub use crate::{
    block::{Block, BlockHash, BlockHeader, MerkleBlock, OutPoint, TxId},
    chain::{ChainView, MemoryChain, Transaction},
    config::Config,
    error::{Error, ErrorKind, ProofError},
    hash::{combine, DigestProvider, MerkleHash, Sha256d},
    height::HeightSpecifier,
    locator::{locate, locate_all},
    partial::{PartialMerkleTree, VerifiedProof, MAX_PROOF_TRANSACTIONS},
    service::{BlockResponse, ProofService},
};
