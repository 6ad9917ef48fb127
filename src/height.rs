//! Block height specifiers, including heights relative to the tip

use crate::{
    block::{Block, BlockHash},
    chain::ChainView,
    error::Error,
};
use hex::FromHex;
use std::{fmt, num::NonZeroU64, str::FromStr};

/// Which block a request refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightSpecifier {
    /// Absolute height, genesis is 0
    Height(u64),
    /// `-k`: the k-th block counting back from the tip, which is `-1`
    FromTip(NonZeroU64),
    /// A block hash in display order
    Hash(BlockHash),
}

impl HeightSpecifier {
    /// The numeric form: non-negative values are heights, negative values
    /// count back from the tip.
    pub fn from_index(index: i64) -> Self {
        match NonZeroU64::new(index.unsigned_abs()) {
            Some(depth) if index < 0 => Self::FromTip(depth),
            _ => Self::Height(index.unsigned_abs()),
        }
    }

    /// Absolute height for the numeric forms, `None` for a hash
    pub fn absolute_height(&self, tip: u32) -> Result<Option<u32>, Error> {
        let height = match *self {
            Self::Height(height) => Some(height),
            Self::FromTip(depth) => (u64::from(tip) + 1).checked_sub(depth.get()),
            Self::Hash(_) => return Ok(None),
        };
        match height {
            Some(height) if height <= u64::from(tip) => Ok(Some(height as u32)),
            _ => Err(Error::HeightOutOfRange {
                requested: self.to_string(),
                tip,
            }),
        }
    }

    /// The stored block this specifier names
    pub fn resolve<'c, C: ChainView>(&self, chain: &'c C) -> Result<&'c Block, Error> {
        if let Self::Hash(hash) = self {
            return chain.block_by_hash(hash).ok_or(Error::BlockNotFound(*hash));
        }
        let tip = chain.tip_height();
        let out_of_range = || Error::HeightOutOfRange {
            requested: self.to_string(),
            tip,
        };
        let height = self.absolute_height(tip)?.ok_or_else(out_of_range)?;
        chain.block_at_height(height).ok_or_else(out_of_range)
    }
}

impl FromStr for HeightSpecifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidSpecifier(s.to_owned());
        if s.len() == 64 {
            return BlockHash::from_hex(s).map(Self::Hash).map_err(|_| invalid());
        }
        let (negative, digits) = match s.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        if !negative {
            return Ok(Self::Height(value));
        }
        // "-0" is not a spelling of height 0
        NonZeroU64::new(value).map(Self::FromTip).ok_or_else(invalid)
    }
}

impl fmt::Display for HeightSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height(height) => write!(f, "{height}"),
            Self::FromTip(depth) => write!(f, "-{depth}"),
            Self::Hash(hash) => write!(f, "{hash}"),
        }
    }
}

impl From<BlockHash> for HeightSpecifier {
    fn from(hash: BlockHash) -> Self {
        Self::Hash(hash)
    }
}
