//! # PBF Binary Layout
//!
//! Format (all fixed-width integers little-endian):
//! - [Header 24 bytes] magic "PBFILE01", version u32, n_cols u32,
//!   group_size u32, checkpoint_shift u32
//! - [Row Data] row records, back to back
//! - [Checkpoint Table] per entry: row u64, offset u64, n_cols × u32 permutation
//! - [Footer 32 bytes] n_rows u64, index_offset u64, n_checkpoints u64,
//!   magic "PBFEND01"
//!
//! A row record is a LEB128 varint `(n_runs << 1) | first_bit` followed by
//! `n_runs` LEB128 run lengths.
//!
//! The footer lets a writer target a plain `Write` stream and still make the
//! checkpoint table reachable without scanning the rows.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::config::{MAX_CHECKPOINT_SHIFT, MAX_GROUP_SIZE};
use crate::data::{Permutation, RunList};
use crate::error::{PbfError, Result};

pub const MAGIC: &[u8; 8] = b"PBFILE01";
pub const FOOTER_MAGIC: &[u8; 8] = b"PBFEND01";
pub const VERSION: u32 = 1;

pub const HEADER_LEN: usize = 24;
pub const FOOTER_LEN: usize = 32;

/// Longest LEB128 encoding of a u64
const MAX_VARINT_LEN: usize = 10;

/// Fixed metadata at the start of the file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub n_cols: u32,
    pub group_size: u32,
    pub checkpoint_shift: u32,
}

impl Header {
    /// Check the ranges a reader relies on
    pub fn validate(&self) -> Result<()> {
        if self.n_cols == 0 {
            return Err(PbfError::format("header declares zero columns"));
        }
        if self.group_size == 0 || self.group_size as usize > MAX_GROUP_SIZE {
            return Err(PbfError::format(format!(
                "header group size {} is out of range",
                self.group_size
            )));
        }
        if self.checkpoint_shift > MAX_CHECKPOINT_SHIFT {
            return Err(PbfError::format(format!(
                "header checkpoint shift {} is out of range",
                self.checkpoint_shift
            )));
        }
        Ok(())
    }

    pub fn checkpoint_interval(&self) -> u64 {
        1u64 << self.checkpoint_shift
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&self.n_cols.to_le_bytes())?;
        w.write_all(&self.group_size.to_le_bytes())?;
        w.write_all(&self.checkpoint_shift.to_le_bytes())?;
        Ok(())
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[0..8] != MAGIC {
            return Err(PbfError::format("invalid file format or magic"));
        }
        let version = read_u32(bytes, 8);
        if version != VERSION {
            return Err(PbfError::format(format!("unsupported version: {}", version)));
        }
        let header = Self {
            n_cols: read_u32(bytes, 12),
            group_size: read_u32(bytes, 16),
            checkpoint_shift: read_u32(bytes, 20),
        };
        header.validate()?;
        Ok(header)
    }
}

/// Trailing metadata written on close
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footer {
    pub n_rows: u64,
    /// Byte offset of the checkpoint table, equal to the end of row data
    pub index_offset: u64,
    pub n_checkpoints: u64,
}

impl Footer {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.n_rows.to_le_bytes())?;
        w.write_all(&self.index_offset.to_le_bytes())?;
        w.write_all(&self.n_checkpoints.to_le_bytes())?;
        w.write_all(FOOTER_MAGIC)?;
        Ok(())
    }

    /// Parse the last `FOOTER_LEN` bytes of a file
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FOOTER_LEN || &bytes[24..32] != FOOTER_MAGIC {
            return Err(PbfError::format(
                "missing footer; the file was not closed or is truncated",
            ));
        }
        Ok(Self {
            n_rows: read_u64(bytes, 0),
            index_offset: read_u64(bytes, 8),
            n_checkpoints: read_u64(bytes, 16),
        })
    }
}

/// Permutation snapshot taken by the writer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Row index the snapshot applies to
    pub row: u64,
    /// Byte offset of that row's record
    pub offset: u64,
    /// Permutation the row is coded against
    pub perm: Permutation,
}

/// Bytes per checkpoint table entry
pub fn checkpoint_entry_len(n_cols: usize) -> usize {
    16 + 4 * n_cols
}

pub fn write_checkpoint<W: Write>(w: &mut W, ck: &Checkpoint) -> io::Result<()> {
    w.write_all(&ck.row.to_le_bytes())?;
    w.write_all(&ck.offset.to_le_bytes())?;
    for &c in ck.perm.as_slice() {
        w.write_all(&c.to_le_bytes())?;
    }
    Ok(())
}

/// `(row, offset)` of a table entry
pub fn parse_checkpoint_meta(entry: &[u8]) -> (u64, u64) {
    (read_u64(entry, 0), read_u64(entry, 8))
}

/// Validated permutation of a table entry
pub fn parse_checkpoint_perm(entry: &[u8], n_cols: usize) -> Result<Permutation> {
    let raw = entry
        .get(16..16 + 4 * n_cols)
        .ok_or_else(|| PbfError::format("checkpoint entry is truncated"))?;
    let order = raw
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Permutation::from_vec(order)
        .map_err(|e| PbfError::format(format!("corrupt checkpoint snapshot: {}", e)))
}

/// Append `value` as LEB128
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Read one LEB128 value at `*pos`, advancing `*pos`
pub fn decode_varint(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let byte = *bytes
            .get(*pos + i)
            .ok_or_else(|| PbfError::format("row record is truncated"))?;
        let payload = (byte & 0x7f) as u64;
        if i == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(PbfError::format("varint overflows 64 bits"));
        }
        value |= payload << (7 * i);
        if byte & 0x80 == 0 {
            *pos += i + 1;
            return Ok(value);
        }
    }
    Err(PbfError::format("varint is too long"))
}

/// Append the record for one row
pub fn encode_row_record(runs: &RunList, out: &mut Vec<u8>) {
    encode_varint(((runs.n_runs() as u64) << 1) | runs.first_bit() as u64, out);
    for &len in runs.runs() {
        encode_varint(len as u64, out);
    }
}

/// Parse the record at `*pos` into `runs`, checking it against `n_cols`.
///
/// `*pos` only moves when the whole record is valid.
pub fn decode_row_record(
    bytes: &[u8],
    pos: &mut usize,
    n_cols: usize,
    runs: &mut RunList,
) -> Result<()> {
    let mut cursor = *pos;
    let tag = decode_varint(bytes, &mut cursor)?;
    let n_runs = tag >> 1;
    if n_runs > n_cols as u64 {
        return Err(PbfError::format(format!(
            "row record claims {} runs for {} columns",
            n_runs, n_cols
        )));
    }
    runs.clear((tag & 1) as u8);
    for _ in 0..n_runs {
        let len = decode_varint(bytes, &mut cursor)?;
        if len > n_cols as u64 {
            return Err(PbfError::format(format!(
                "run length {} exceeds {} columns",
                len, n_cols
            )));
        }
        runs.push(len as u32);
    }
    runs.validate(n_cols)?;
    *pos = cursor;
    Ok(())
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
