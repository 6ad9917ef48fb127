//! Find the block that holds a transaction.
//!
//! Without a block hint, the owning block comes from the full transaction
//! index if one is maintained, and otherwise from the unspent coin view.
//! Coins created at height 0 are never consulted. A transaction whose
//! outputs are all spent therefore cannot be located without a hint or an
//! index; that case fails with [`Error::TxNotLocated`].

use crate::{
    block::{Block, TxId},
    chain::ChainView,
    error::Error,
};
use log::debug;

/// Block holding `txid`, checked against `hint` when one is given.
pub fn locate<'c, C: ChainView>(
    chain: &'c C,
    txid: &TxId,
    hint: Option<&'c Block>,
) -> Result<&'c Block, Error> {
    locate_all(chain, std::slice::from_ref(txid), hint)
}

/// Block holding every one of `txids`.
///
/// Without a hint, the transaction index entry for the first requested id
/// picks the block. Failing that, the first requested id with an unspent
/// output does.
pub fn locate_all<'c, C: ChainView>(
    chain: &'c C,
    txids: &[TxId],
    hint: Option<&'c Block>,
) -> Result<&'c Block, Error> {
    let first = txids.first().ok_or(Error::EmptyRequest)?;
    let block = match hint {
        Some(block) => block,
        None => from_index(chain, first)
            .or_else(|| from_coins(chain, txids))
            .ok_or_else(|| {
                debug!("{first} is not indexed and has no unspent outputs");
                Error::TxNotLocated(*first)
            })?,
    };

    if let Some(missing) = txids.iter().find(|txid| !block.contains(txid)) {
        return Err(Error::TxNotInBlock(*missing, block.hash));
    }
    Ok(block)
}

fn from_coins<'c, C: ChainView>(chain: &'c C, txids: &[TxId]) -> Option<&'c Block> {
    txids.iter().find_map(|txid| {
        let height = chain.unspent_coin_height(txid).filter(|&height| height > 0)?;
        debug!("located {txid} at height {height} from its unspent outputs");
        chain.block_at_height(height)
    })
}

fn from_index<'c, C: ChainView>(chain: &'c C, txid: &TxId) -> Option<&'c Block> {
    if !chain.has_tx_index() {
        return None;
    }
    let hash = chain.indexed_block(txid)?;
    debug!("located {txid} in block {hash} from the transaction index");
    chain.block_by_hash(&hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::OutPoint,
        chain::{MemoryChain, Transaction},
        config::Config,
        hash::Sha256d,
        ErrorKind,
    };

    struct Fixture {
        chain: MemoryChain,
        spent: TxId,
        unspent: TxId,
        height: u32,
    }

    /// Two payments in one block; the first is then spent in a later block
    fn fixture(config: Config) -> Fixture {
        let mut chain = MemoryChain::new(&config);
        chain.generate(3);
        let funding = chain.block_at_height(1).unwrap().txids[0];
        let other = chain.block_at_height(2).unwrap().txids[0];
        let spent = Transaction::new(
            TxId(Sha256d::digest(b"spent")),
            vec![OutPoint::new(funding, 0)],
            1,
        );
        let unspent = Transaction::new(
            TxId(Sha256d::digest(b"unspent")),
            vec![OutPoint::new(other, 0)],
            1,
        );
        let (spent_id, unspent_id) = (spent.txid, unspent.txid);
        let height = chain.append_block(vec![spent, unspent]).unwrap().height;
        let sweep = Transaction::new(
            TxId(Sha256d::digest(b"sweep")),
            vec![OutPoint::new(spent_id, 0)],
            1,
        );
        chain.append_block(vec![sweep]).unwrap();
        Fixture {
            chain,
            spent: spent_id,
            unspent: unspent_id,
            height,
        }
    }

    #[test]
    fn test_unspent_is_found_without_hint() {
        let f = fixture(Config::default());
        assert_eq!(locate(&f.chain, &f.unspent, None).unwrap().height, f.height);
    }

    #[test]
    fn test_spent_needs_hint_or_index() {
        let f = fixture(Config::default());
        let err = locate(&f.chain, &f.spent, None).unwrap_err();
        assert!(matches!(err, Error::TxNotLocated(txid) if txid == f.spent));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let hint = f.chain.block_at_height(f.height);
        assert_eq!(locate(&f.chain, &f.spent, hint).unwrap().height, f.height);

        let indexed = fixture(Config::default().with_txindex(true));
        assert_eq!(
            locate(&indexed.chain, &indexed.spent, None).unwrap().height,
            indexed.height
        );
    }

    #[test]
    fn test_wrong_hint_is_not_found() {
        let f = fixture(Config::default());
        let hint = f.chain.block_at_height(1);
        let err = locate(&f.chain, &f.unspent, hint).unwrap_err();
        assert!(matches!(err, Error::TxNotInBlock(txid, _) if txid == f.unspent));
    }

    #[test]
    fn test_any_unspent_id_picks_the_block() {
        let f = fixture(Config::default());
        for txids in [[f.spent, f.unspent], [f.unspent, f.spent]] {
            assert_eq!(locate_all(&f.chain, &txids, None).unwrap().height, f.height);
        }
    }

    #[test]
    fn test_ids_from_different_blocks() {
        let f = fixture(Config::default());
        let coinbase = f.chain.tip().txids[0];
        let err = locate_all(&f.chain, &[coinbase, f.unspent], None).unwrap_err();
        assert!(matches!(err, Error::TxNotInBlock(txid, _) if txid == f.unspent));
    }

    #[test]
    fn test_genesis_coins_are_ignored() {
        let chain = MemoryChain::new(&Config::default());
        let coinbase = chain.tip().txids[0];
        assert_eq!(chain.unspent_coin_height(&coinbase), Some(0));
        assert!(matches!(
            locate(&chain, &coinbase, None),
            Err(Error::TxNotLocated(txid)) if txid == coinbase
        ));
        let genesis = chain.block_at_height(0);
        assert_eq!(locate(&chain, &coinbase, genesis).unwrap().height, 0);
    }

    #[test]
    fn test_index_is_consulted_first() {
        let f = fixture(Config::default().with_txindex(true));
        let tip = f.chain.tip();
        let sweep = tip.txids[1];
        // The index entry for the first id wins over a later unspent id
        let err = locate_all(&f.chain, &[f.spent, sweep], None).unwrap_err();
        assert!(matches!(err, Error::TxNotInBlock(txid, hash) if txid == sweep && hash != tip.hash));

        let plain = fixture(Config::default());
        let sweep = plain.chain.tip().txids[1];
        let err = locate_all(&plain.chain, &[plain.spent, sweep], None).unwrap_err();
        assert!(matches!(err, Error::TxNotInBlock(txid, _) if txid == plain.spent));
    }

    #[test]
    fn test_unknown_txid() {
        let f = fixture(Config::default().with_txindex(true));
        let unknown = TxId(Sha256d::digest(b"unknown"));
        assert!(matches!(
            locate(&f.chain, &unknown, None),
            Err(Error::TxNotLocated(_))
        ));
        assert!(matches!(
            locate_all(&f.chain, &[], None),
            Err(Error::EmptyRequest)
        ));
    }
}
