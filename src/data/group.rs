//! # Bit-Packed Row Groups
//!
//! A batch of consecutive rows, one bit per column, stored row-major in a
//! single bit vector. This is the `g`-by-`width` matrix handed to
//! `PbfWriter::write_group` and returned by `PbfReader::read_group`.

use bitvec::prelude::*;

use crate::data::ColIdx;
use crate::error::{PbfError, Result};

/// Dense bit-packed storage for a group of rows
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowGroup {
    /// Row-major bits: row `r`, column `c` lives at `r * width + c`
    bits: BitVec<u64, Lsb0>,

    /// Bits per row
    width: usize,

    /// Number of rows stored
    n_rows: usize,
}

impl RowGroup {
    /// Create an empty group for rows of `width` columns
    pub fn new(width: usize) -> Self {
        Self::with_capacity(width, 0)
    }

    pub fn with_capacity(width: usize, n_rows: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(width * n_rows),
            width,
            n_rows: 0,
        }
    }

    /// Build a group from byte rows (one 0/1 byte per column)
    pub fn from_rows<R: AsRef<[u8]>>(width: usize, rows: &[R]) -> Result<Self> {
        let mut group = Self::with_capacity(width, rows.len());
        for row in rows {
            group.push_row(row.as_ref())?;
        }
        Ok(group)
    }

    /// Append one row of 0/1 bytes
    pub fn push_row(&mut self, row: &[u8]) -> Result<()> {
        if row.len() != self.width {
            return Err(PbfError::usage(format!(
                "row has {} columns, group expects {}",
                row.len(),
                self.width
            )));
        }
        if let Some(bad) = row.iter().find(|&&b| b > 1) {
            return Err(PbfError::usage(format!("row value {} is not a bit", bad)));
        }
        self.bits.extend(row.iter().map(|&b| b == 1));
        self.n_rows += 1;
        Ok(())
    }

    /// Get bit for row `r`, column `col`
    #[inline]
    pub fn get(&self, r: usize, col: ColIdx) -> u8 {
        self.bits[r * self.width + col.as_usize()] as u8
    }

    /// Bit slice for row `r`
    pub fn row(&self, r: usize) -> &BitSlice<u64, Lsb0> {
        let start = r * self.width;
        &self.bits[start..start + self.width]
    }

    /// Row `r` expanded to one byte per column, written into `out`
    pub fn row_bytes_into(&self, r: usize, out: &mut Vec<u8>) {
        out.clear();
        out.extend(self.row(r).iter().map(|b| *b as u8));
    }

    /// Count of set bits in row `r`
    pub fn count_ones(&self, r: usize) -> usize {
        self.row(r).count_ones()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn clear(&mut self) {
        self.bits.clear();
        self.n_rows = 0;
    }
}
