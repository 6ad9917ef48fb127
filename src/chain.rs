//! Chain state consulted when answering proof and height requests.
//!
//! [`ChainView`] is the seam to the node that owns blocks and coins. A
//! request borrows one view for its whole duration, so locating a block and
//! building a proof from it always see the same snapshot.

use crate::{
    block::{Block, BlockHash, OutPoint, TxId},
    config::Config,
    error::Error,
    hash::Sha256d,
};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

pub trait ChainView {
    /// Height of the active tip
    fn tip_height(&self) -> u32;

    /// Block at `height` on the active chain
    fn block_at_height(&self, height: u32) -> Option<&Block>;

    fn block_by_hash(&self, hash: &BlockHash) -> Option<&Block>;

    /// Whether `hash` names a block on the active chain
    fn contains(&self, hash: &BlockHash) -> bool {
        self.block_by_hash(hash)
            .and_then(|block| self.block_at_height(block.height))
            .is_some_and(|active| active.hash == *hash)
    }

    /// Whether every transaction is indexed, not just unspent ones
    fn has_tx_index(&self) -> bool;

    /// Block holding `txid`, from the full transaction index
    fn indexed_block(&self, txid: &TxId) -> Option<BlockHash>;

    /// Height of the block holding `txid`, while any of its outputs is unspent
    fn unspent_coin_height(&self, txid: &TxId) -> Option<u32>;
}

/// A transaction as far as block bookkeeping is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub txid: TxId,
    /// Outputs spent by this transaction
    pub spends: Vec<OutPoint>,
    /// Number of outputs created
    pub outputs: u32,
}

impl Transaction {
    pub fn new(txid: TxId, spends: Vec<OutPoint>, outputs: u32) -> Self {
        Self {
            txid,
            spends,
            outputs,
        }
    }

    /// A coinbase transaction paying a single output, unique per height
    pub fn coinbase(height: u32) -> Self {
        let mut data = b"coinbase".to_vec();
        data.extend_from_slice(&height.to_le_bytes());
        Self::new(TxId(Sha256d::digest(&data)), Vec::new(), 1)
    }
}

#[derive(Debug)]
struct Coins {
    height: u32,
    unspent: BTreeSet<u32>,
}

/// In-memory chain with an unspent coin view and an optional transaction index
#[derive(Debug)]
pub struct MemoryChain {
    blocks: Vec<Block>,
    by_hash: HashMap<BlockHash, u32>,
    coins: HashMap<TxId, Coins>,
    tx_index: Option<HashMap<TxId, BlockHash>>,
}

impl MemoryChain {
    /// Create a chain holding only its genesis block
    pub fn new(config: &Config) -> Self {
        let mut chain = Self {
            blocks: Vec::new(),
            by_hash: HashMap::new(),
            coins: HashMap::new(),
            tx_index: config.txindex.then(HashMap::new),
        };
        chain.connect(vec![Transaction::coinbase(0)]);
        chain
    }

    pub fn tip(&self) -> &Block {
        // `new` always connects genesis
        &self.blocks[self.blocks.len() - 1]
    }

    /// Mine `count` blocks holding only a coinbase
    pub fn generate(&mut self, count: u32) -> Vec<BlockHash> {
        (0..count)
            .map(|_| {
                let height = self.tip().height + 1;
                self.connect(vec![Transaction::coinbase(height)]).hash
            })
            .collect()
    }

    /// Append a block. A coinbase is prepended to `transactions`.
    pub fn append_block(&mut self, transactions: Vec<Transaction>) -> Result<&Block, Error> {
        let mut seen = BTreeSet::new();
        for outpoint in transactions.iter().flat_map(|tx| &tx.spends) {
            let unspent = self
                .coins
                .get(&outpoint.txid)
                .is_some_and(|coins| coins.unspent.contains(&outpoint.vout));
            if !unspent || !seen.insert(*outpoint) {
                return Err(Error::UnknownOutPoint(*outpoint));
            }
        }

        let height = self.tip().height + 1;
        let mut all = Vec::with_capacity(transactions.len() + 1);
        all.push(Transaction::coinbase(height));
        all.extend(transactions);
        Ok(self.connect(all))
    }

    fn connect(&mut self, transactions: Vec<Transaction>) -> &Block {
        let (height, prev_block) = match self.blocks.last() {
            Some(tip) => (tip.height + 1, tip.hash),
            None => (0, BlockHash::default()),
        };
        let txids: Vec<TxId> = transactions.iter().map(|tx| tx.txid).collect();
        let block = Block::new(height, prev_block, 1_600_000_000 + height * 150, txids);

        for tx in &transactions {
            for outpoint in &tx.spends {
                let fully_spent = self.coins.get_mut(&outpoint.txid).is_some_and(|coins| {
                    coins.unspent.remove(&outpoint.vout);
                    coins.unspent.is_empty()
                });
                if fully_spent {
                    debug!("{} fully spent at height {height}", outpoint.txid);
                    self.coins.remove(&outpoint.txid);
                }
            }
            if tx.outputs > 0 {
                self.coins.insert(
                    tx.txid,
                    Coins {
                        height,
                        unspent: (0..tx.outputs).collect(),
                    },
                );
            }
            if let Some(index) = self.tx_index.as_mut() {
                index.insert(tx.txid, block.hash);
            }
        }

        info!(
            "connected block {} at height {height} with {} transactions",
            block.hash,
            block.txids.len()
        );
        self.by_hash.insert(block.hash, height);
        self.blocks.push(block);
        self.tip()
    }
}

impl ChainView for MemoryChain {
    fn tip_height(&self) -> u32 {
        self.tip().height
    }

    fn block_at_height(&self, height: u32) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    fn block_by_hash(&self, hash: &BlockHash) -> Option<&Block> {
        self.by_hash
            .get(hash)
            .and_then(|&height| self.block_at_height(height))
    }

    fn has_tx_index(&self) -> bool {
        self.tx_index.is_some()
    }

    fn indexed_block(&self, txid: &TxId) -> Option<BlockHash> {
        self.tx_index.as_ref()?.get(txid).copied()
    }

    fn unspent_coin_height(&self, txid: &TxId) -> Option<u32> {
        self.coins.get(txid).map(|coins| coins.height)
    }
}
