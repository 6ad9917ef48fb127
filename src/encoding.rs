//! Wire encoding of headers, partial Merkle trees and merkle blocks.
//!
//! Integers are fixed-width little-endian. Counts use the CompactSize
//! encoding: values below `0xfd` take one byte, larger values are prefixed
//! by `0xfd`, `0xfe` or `0xff` and followed by a `u16`, `u32` or `u64`.
//!
//! ```text
//! partial tree: total_transactions u32 | hash count | hashes [32; n] | flag byte count | flag bytes
//! merkle block: header (80 bytes) | partial tree
//! block:        header (80 bytes) | txid count | txids [32; n]
//! ```
//!
//! Flag bits are packed least significant bit first.

use crate::{
    block::{Block, BlockHash, BlockHeader, MerkleBlock},
    error::{Error, ProofError},
    hash::{DigestProvider, MerkleHash},
    partial::{PartialMerkleTree, MAX_PROOF_TRANSACTIONS},
};
use std::io::{self, Cursor, Read, Write};

/// Largest count accepted in a CompactSize prefix
pub const MAX_SIZE: u64 = 0x0200_0000;

/// Serialized header length
pub const HEADER_LEN: usize = 80;

pub(crate) fn write_u32_le<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub(crate) fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn write_i32_le<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub(crate) fn read_i32_le<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn write_hash<W: Write>(w: &mut W, hash: &MerkleHash) -> io::Result<()> {
    w.write_all(&hash.0)
}

pub(crate) fn read_hash<R: Read>(r: &mut R) -> io::Result<MerkleHash> {
    let mut buf = [0u8; 32];
    r.read_exact(&mut buf)?;
    Ok(MerkleHash(buf))
}

pub fn write_compact_size<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    match value {
        0..=0xfc => w.write_all(&[value as u8]),
        0xfd..=0xffff => {
            w.write_all(&[0xfd])?;
            w.write_all(&(value as u16).to_le_bytes())
        }
        0x1_0000..=0xffff_ffff => {
            w.write_all(&[0xfe])?;
            w.write_all(&(value as u32).to_le_bytes())
        }
        _ => {
            w.write_all(&[0xff])?;
            w.write_all(&value.to_le_bytes())
        }
    }
}

/// Read a CompactSize, rejecting non-canonical forms and values above [`MAX_SIZE`].
pub fn read_compact_size<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut tag = [0u8; 1];
    r.read_exact(&mut tag)?;
    let (value, min) = match tag[0] {
        0xfd => {
            let mut buf = [0u8; 2];
            r.read_exact(&mut buf)?;
            (u64::from(u16::from_le_bytes(buf)), 0xfd)
        }
        0xfe => {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)?;
            (u64::from(u32::from_le_bytes(buf)), 0x1_0000)
        }
        0xff => {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            (u64::from_le_bytes(buf), 0x1_0000_0000)
        }
        small => return Ok(u64::from(small)),
    };
    if value < min {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "non-canonical CompactSize",
        ));
    }
    if value > MAX_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "CompactSize exceeds maximum size",
        ));
    }
    Ok(value)
}

/// Pack flag bits into bytes, least significant bit first
pub fn pack_flags(flags: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; flags.len().div_ceil(8)];
    for (i, &bit) in flags.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack every bit of `bytes`, padding included
pub fn unpack_flags(bytes: &[u8]) -> Vec<bool> {
    (0..bytes.len() * 8)
        .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}

fn proof_error(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => ProofError::Truncated.into(),
        _ => ProofError::Encoding(err.to_string()).into(),
    }
}

/// Decode a complete value, rejecting trailing bytes
fn decode_all<T>(
    bytes: &[u8],
    decode: impl FnOnce(&mut Cursor<&[u8]>) -> Result<T, Error>,
) -> Result<T, Error> {
    let mut cursor = Cursor::new(bytes);
    let value = decode(&mut cursor)?;
    let remaining = bytes.len() - cursor.position() as usize;
    if remaining != 0 {
        return Err(ProofError::TrailingBytes(remaining).into());
    }
    Ok(value)
}

impl BlockHeader {
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_i32_le(w, self.version)?;
        write_hash(w, &self.prev_block)?;
        write_hash(w, &self.merkle_root)?;
        write_u32_le(w, self.time)?;
        write_u32_le(w, self.bits)?;
        write_u32_le(w, self.nonce)
    }

    pub fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            version: read_i32_le(r)?,
            prev_block: BlockHash(read_hash(r)?),
            merkle_root: read_hash(r)?,
            time: read_u32_le(r)?,
            bits: read_u32_le(r)?,
            nonce: read_u32_le(r)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        let mut w = &mut bytes[..];
        // A slice writer of exactly HEADER_LEN bytes cannot run short
        let _ = self.encode(&mut w);
        bytes
    }
}

impl<HF: DigestProvider> PartialMerkleTree<HF> {
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32_le(w, self.total_transactions)?;
        write_compact_size(w, self.hashes.len() as u64)?;
        for hash in &self.hashes {
            write_hash(w, hash)?;
        }
        let flag_bytes = pack_flags(&self.flags);
        write_compact_size(w, flag_bytes.len() as u64)?;
        w.write_all(&flag_bytes)
    }

    /// Decode a proof. Structural validity is checked by [`Self::verify`].
    ///
    /// The declared transaction count bounds every allocation, so it is
    /// checked against [`MAX_PROOF_TRANSACTIONS`] before any count is read.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self, Error> {
        let total_transactions = read_u32_le(r).map_err(proof_error)?;
        if total_transactions > MAX_PROOF_TRANSACTIONS {
            return Err(ProofError::TooManyTransactions(
                total_transactions,
                MAX_PROOF_TRANSACTIONS,
            )
            .into());
        }
        let hash_count = read_compact_size(r).map_err(proof_error)?;
        if hash_count > u64::from(total_transactions) {
            return Err(ProofError::TooManyHashes(hash_count as usize, total_transactions).into());
        }
        let mut hashes = Vec::with_capacity(hash_count as usize);
        for _ in 0..hash_count {
            hashes.push(read_hash(r).map_err(proof_error)?);
        }
        let flag_byte_count = read_compact_size(r).map_err(proof_error)?;
        let mut flag_bytes = Vec::new();
        r.by_ref()
            .take(flag_byte_count)
            .read_to_end(&mut flag_bytes)
            .map_err(proof_error)?;
        if flag_bytes.len() as u64 != flag_byte_count {
            return Err(ProofError::Truncated.into());
        }
        Ok(Self::from_parts(
            total_transactions,
            hashes,
            unpack_flags(&flag_bytes),
        ))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // Writing into a Vec never fails
        let _ = self.encode(&mut bytes);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        decode_all(bytes, |r| Self::decode(r))
    }
}

impl Block {
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.encode(w)?;
        write_compact_size(w, self.txids.len() as u64)?;
        for txid in &self.txids {
            write_hash(w, &txid.0)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + 1 + 32 * self.txids.len());
        // Writing into a Vec never fails
        let _ = self.encode(&mut bytes);
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl MerkleBlock {
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.encode(w)?;
        self.tree.encode(w)
    }

    pub fn decode<R: Read>(r: &mut R) -> Result<Self, Error> {
        let header = BlockHeader::decode(r).map_err(proof_error)?;
        let tree = PartialMerkleTree::decode(r)?;
        Ok(Self { header, tree })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        // Writing into a Vec never fails
        let _ = self.encode(&mut bytes);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        decode_all(bytes, |r| Self::decode(r))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(text: &str) -> Result<Self, Error> {
        let bytes =
            hex::decode(text).map_err(|err| ProofError::Encoding(err.to_string()))?;
        Self::from_bytes(&bytes)
    }
}
