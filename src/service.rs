//! Request handlers for proof and height queries

use crate::{
    block::{Block, BlockHash, MerkleBlock, TxId},
    chain::ChainView,
    error::Error,
    height::HeightSpecifier,
    locator::locate_all,
    partial::PartialMerkleTree,
};
use log::{debug, warn};
use std::collections::HashSet;

/// Block data at a requested level of detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockResponse<'c> {
    /// Verbosity 0: serialized header and transaction ids, hex encoded
    Raw(String),
    /// Verbosity 1: the stored block, listing its transaction ids
    Summary(&'c Block),
}

/// Answers requests against one snapshot of the chain
pub struct ProofService<'c, C: ChainView> {
    chain: &'c C,
}

impl<'c, C: ChainView> ProofService<'c, C> {
    pub fn new(chain: &'c C) -> Self {
        Self { chain }
    }

    /// Proof that every id in `txids` is in one block.
    ///
    /// `block` names the block to prove against. Without it the block is
    /// located from the ids, which fails for transactions whose outputs are
    /// all spent unless a transaction index is maintained.
    pub fn build_proof(
        &self,
        txids: &[TxId],
        block: Option<&HeightSpecifier>,
    ) -> Result<MerkleBlock, Error> {
        let mut requested = HashSet::with_capacity(txids.len());
        for txid in txids {
            if !requested.insert(*txid) {
                return Err(Error::DuplicateTxId(*txid));
            }
        }

        let hint = block.map(|spec| spec.resolve(self.chain)).transpose()?;
        let block = locate_all(self.chain, txids, hint)?;
        let tree = PartialMerkleTree::build(&block.txids, &requested)?;
        debug!(
            "built proof for {} of {} transactions in block {}: {} hashes, {} flag bits",
            requested.len(),
            block.txids.len(),
            block.hash,
            tree.hashes.len(),
            tree.flags.len()
        );
        Ok(MerkleBlock {
            header: block.header,
            tree,
        })
    }

    pub fn build_proof_hex(
        &self,
        txids: &[TxId],
        block: Option<&HeightSpecifier>,
    ) -> Result<String, Error> {
        Ok(self.build_proof(txids, block)?.to_hex())
    }

    /// Transaction ids a proof commits to, in block order.
    ///
    /// The recomputed root must match the header, and the header must belong
    /// to a block on the active chain.
    pub fn verify_proof(&self, proof: &MerkleBlock) -> Result<Vec<TxId>, Error> {
        let verified = proof.tree.verify().inspect_err(|err| warn!("rejected proof: {err}"))?;
        if verified.root != proof.header.merkle_root {
            warn!(
                "proof root {} does not match header root {}",
                verified.root, proof.header.merkle_root
            );
            return Err(Error::RootMismatch {
                computed: verified.root,
                expected: proof.header.merkle_root,
            });
        }
        let hash = proof.header.hash();
        if !self.chain.contains(&hash) {
            return Err(Error::BlockNotFound(hash));
        }
        Ok(verified.matched)
    }

    pub fn verify_proof_hex(&self, proof: &str) -> Result<Vec<TxId>, Error> {
        self.verify_proof(&MerkleBlock::from_hex(proof)?)
    }

    pub fn resolve_height(&self, spec: &HeightSpecifier) -> Result<&'c Block, Error> {
        spec.resolve(self.chain)
    }

    pub fn get_block(
        &self,
        spec: &HeightSpecifier,
        verbosity: u8,
    ) -> Result<BlockResponse<'c>, Error> {
        let block = self.resolve_height(spec)?;
        match verbosity {
            0 => Ok(BlockResponse::Raw(block.to_hex())),
            1 => Ok(BlockResponse::Summary(block)),
            _ => Err(Error::InvalidVerbosity(verbosity)),
        }
    }

    /// Hash of the block at `index`; negative indices count back from the tip
    pub fn block_hash(&self, index: i64) -> Result<BlockHash, Error> {
        Ok(self.resolve_height(&HeightSpecifier::from_index(index))?.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::OutPoint,
        chain::{MemoryChain, Transaction},
        config::Config,
        error::ProofError,
        hash::{MerkleHash, Sha256d},
        ErrorKind,
    };

    fn chain_with_payments(n: u32) -> (MemoryChain, Vec<TxId>) {
        let mut chain = MemoryChain::new(&Config::default());
        chain.generate(n);
        let payments: Vec<Transaction> = (1..=n)
            .map(|height| {
                let funding = chain.block_at_height(height).unwrap().txids[0];
                Transaction::new(
                    TxId(Sha256d::digest(&height.to_be_bytes())),
                    vec![OutPoint::new(funding, 0)],
                    2,
                )
            })
            .collect();
        let txids = chain.append_block(payments).unwrap().txids.clone();
        (chain, txids)
    }

    #[test]
    fn test_build_and_verify() {
        let (chain, txids) = chain_with_payments(6);
        let service = ProofService::new(&chain);
        let requested = [txids[5], txids[2]];
        let proof = service.build_proof(&requested, None).unwrap();
        assert_eq!(proof.header, chain.tip().header);
        assert_eq!(service.verify_proof(&proof).unwrap(), vec![txids[2], txids[5]]);

        let hex = service.build_proof_hex(&requested, None).unwrap();
        assert_eq!(service.verify_proof_hex(&hex).unwrap(), vec![txids[2], txids[5]]);
    }

    #[test]
    fn test_duplicate_and_empty_requests() {
        let (chain, txids) = chain_with_payments(2);
        let service = ProofService::new(&chain);
        let err = service.build_proof(&[txids[1], txids[1]], None).unwrap_err();
        assert!(matches!(err, Error::DuplicateTxId(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(matches!(service.build_proof(&[], None), Err(Error::EmptyRequest)));
    }

    #[test]
    fn test_hint_by_height() {
        let (chain, txids) = chain_with_payments(3);
        let service = ProofService::new(&chain);
        let tip = HeightSpecifier::from_index(-1);
        let proof = service.build_proof(&txids[..1], Some(&tip)).unwrap();
        assert_eq!(service.verify_proof(&proof).unwrap(), txids[..1].to_vec());

        let genesis = HeightSpecifier::Height(0);
        let err = service.build_proof(&txids[..1], Some(&genesis)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let beyond = HeightSpecifier::Height(100);
        let err = service.build_proof(&txids[..1], Some(&beyond)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HeightOutOfRange);
    }

    #[test]
    fn test_root_mismatch() {
        let (chain, txids) = chain_with_payments(3);
        let service = ProofService::new(&chain);
        let mut proof = service.build_proof(&txids[1..2], None).unwrap();
        proof.header.merkle_root = MerkleHash::default();
        assert!(matches!(
            service.verify_proof(&proof),
            Err(Error::RootMismatch { .. })
        ));
    }

    #[test]
    fn test_block_not_in_chain() {
        let (chain, txids) = chain_with_payments(3);
        let proof = ProofService::new(&chain).build_proof(&txids[..1], None).unwrap();
        let other = MemoryChain::new(&Config::default());
        let err = ProofService::new(&other).verify_proof(&proof).unwrap_err();
        assert!(matches!(err, Error::BlockNotFound(hash) if hash == chain.tip().hash));
    }

    #[test]
    fn test_truncated_proof_hex() {
        let (chain, txids) = chain_with_payments(4);
        let service = ProofService::new(&chain);
        let hex = service.build_proof_hex(&txids[..2], None).unwrap();
        let err = service.verify_proof_hex(&hex[..hex.len() - 2]).unwrap_err();
        assert!(matches!(err, Error::MalformedProof(ProofError::Truncated)));
    }

    #[test]
    fn test_get_block_verbosity() {
        let (chain, txids) = chain_with_payments(3);
        let service = ProofService::new(&chain);
        let spec = HeightSpecifier::Hash(chain.tip().hash);

        let summary = match service.get_block(&spec, 1).unwrap() {
            BlockResponse::Summary(block) => block,
            other => panic!("expected a summary, got {other:?}"),
        };
        assert_eq!(summary.txids, txids);
        let raw = match service.get_block(&spec, 0).unwrap() {
            BlockResponse::Raw(raw) => raw,
            other => panic!("expected raw hex, got {other:?}"),
        };
        assert!(raw.bytes().all(|b| b.is_ascii_hexdigit()));
        let bytes = hex::decode(&raw).unwrap();
        // header, one-byte txid count, then the coinbase
        assert_eq!(&bytes[81..113], &summary.txids[0].0 .0);

        let err = service.get_block(&spec, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidVerbosity(2)));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        let beyond = HeightSpecifier::Height(10);
        assert_eq!(
            service.get_block(&beyond, 1).unwrap_err().kind(),
            ErrorKind::HeightOutOfRange
        );
    }

    #[test]
    fn test_block_hash() {
        let (chain, _) = chain_with_payments(4);
        let service = ProofService::new(&chain);
        assert_eq!(service.block_hash(-1).unwrap(), chain.tip().hash);
        assert_eq!(service.block_hash(-2).unwrap(), service.block_hash(4).unwrap());
        assert_eq!(
            service.block_hash(-6).unwrap(),
            chain.block_at_height(0).unwrap().hash
        );
        assert_eq!(service.block_hash(-7).unwrap_err().kind(), ErrorKind::HeightOutOfRange);
    }
}
