//! # Run-Length Row Encoding
//!
//! A permuted row stored as alternating run lengths. The first run carries
//! `first_bit`, the next the opposite value, and so on. For a valid row the
//! lengths sum to exactly `m`.

use crate::error::{PbfError, Result};

/// Alternating-value run lengths of one permuted row
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunList {
    /// Bit value of the first run (0 or 1)
    first_bit: u8,
    /// Run lengths; zero-length runs are tolerated on read
    runs: Vec<u32>,
}

impl RunList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parts. Fails if `first_bit` is not a bit.
    pub fn from_runs(first_bit: u8, runs: Vec<u32>) -> Result<Self> {
        if first_bit > 1 {
            return Err(PbfError::format(format!("invalid first bit {}", first_bit)));
        }
        Ok(Self { first_bit, runs })
    }

    /// Empty the list for reuse, keeping the allocation
    pub fn clear(&mut self, first_bit: u8) {
        self.first_bit = first_bit & 1;
        self.runs.clear();
    }

    pub(crate) fn push(&mut self, len: u32) {
        self.runs.push(len);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut u32> {
        self.runs.last_mut()
    }

    pub fn first_bit(&self) -> u8 {
        self.first_bit
    }

    pub fn runs(&self) -> &[u32] {
        &self.runs
    }

    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }

    /// Bit value of run `i`
    #[inline]
    pub fn value_of(&self, i: usize) -> u8 {
        self.first_bit ^ (i as u8 & 1)
    }

    /// `(value, length)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.runs
            .iter()
            .enumerate()
            .map(move |(i, &len)| (self.value_of(i), len))
    }

    /// Sum of all run lengths
    pub fn total(&self) -> u64 {
        self.runs.iter().map(|&l| l as u64).sum()
    }

    /// Sum of the 0-valued run lengths
    pub fn zero_count(&self) -> u64 {
        self.iter()
            .filter(|&(v, _)| v == 0)
            .map(|(_, l)| l as u64)
            .sum()
    }

    /// True when the row holds a single value across all columns
    pub fn is_monomorphic(&self) -> bool {
        self.runs.iter().filter(|&&l| l > 0).count() <= 1
    }

    /// Check the sum invariant against the column count
    pub fn validate(&self, m: usize) -> Result<()> {
        let total = self.total();
        if total != m as u64 {
            return Err(PbfError::format(format!(
                "run lengths sum to {} but the row has {} columns",
                total, m
            )));
        }
        Ok(())
    }
}
