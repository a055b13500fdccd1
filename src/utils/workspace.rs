//! # Workspace Pattern for Codec Buffers
//!
//! Pre-allocated buffers for the row codec so that encoding or decoding a
//! row never allocates once the buffers have grown to `m`.
//!
//! ## Design Philosophy
//! Instead of letting each call allocate its outputs, the codec owns one
//! `CodecWorkspace` and hands out borrows of it. Encode output and decode
//! output are separate buffers: a run-list is never aliased with a row.

use crate::data::{Permutation, RunList};

/// Reusable buffers for one codec cursor
#[derive(Debug, Default)]
pub struct CodecWorkspace {
    /// Encode output: run-length form of the last permuted row
    pub runs: RunList,

    /// Decode output: last decoded row, one 0/1 byte per column
    pub row: Vec<u8>,

    /// Second permutation buffer; swapped with the live one after each row
    pub next: Permutation,
}

impl CodecWorkspace {
    /// Create a workspace sized for `m` columns
    pub fn new(m: usize) -> Self {
        Self {
            runs: RunList::new(),
            row: vec![0; m],
            next: Permutation::identity(m),
        }
    }
}
