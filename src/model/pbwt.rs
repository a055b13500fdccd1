//! # Positional Burrows-Wheeler Transform Row Codec
//!
//! ## Role
//! Encode one row of column bits against the current column permutation and
//! advance the permutation, or do the inverse.
//!
//! ## Algorithm
//! For permutation `S` and row `a`:
//! - permuted row `y[k] = a[S[k]]`, stored as alternating run lengths
//! - next permutation `S'` is the stable two-way partition of `S` by `y`:
//!   columns with `y[k] = 0` first, then columns with `y[k] = 1`, each group
//!   in its previous relative order
//!
//! Haplotypes sharing recent history end up adjacent in `S`, so after a few
//! rows `y` collapses into a handful of long runs.
//!
//! Encode and decode run the identical partition, so a reader replaying the
//! rows reproduces the writer's permutation trajectory exactly.
//!
//! ## Example
//! ```
//! use pbf::data::Permutation;
//! use pbf::model::pbwt::RowCodec;
//!
//! let mut enc = RowCodec::new(4);
//! let runs = enc.encode(&[1, 0, 1, 0]).unwrap().clone();
//! assert_eq!(enc.permutation().as_slice(), &[1, 3, 0, 2]);
//!
//! let mut dec = RowCodec::with_permutation(Permutation::identity(4));
//! assert_eq!(dec.decode(&runs).unwrap(), &[1, 0, 1, 0]);
//! assert_eq!(dec.permutation(), enc.permutation());
//! ```

use std::mem;

use crate::data::{Permutation, RunList};
use crate::error::{PbfError, Result};
use crate::utils::CodecWorkspace;

/// Encode `row` against `perm`.
///
/// Writes the run-length form of the permuted row into `runs` and the
/// partitioned permutation into `next`. `row` holds one 0/1 byte per column.
pub fn encode_row(
    perm: &Permutation,
    row: &[u8],
    runs: &mut RunList,
    next: &mut Permutation,
) -> Result<()> {
    let m = perm.len();
    if row.len() != m {
        return Err(PbfError::usage(format!(
            "row has {} columns but the codec has {}",
            row.len(),
            m
        )));
    }
    let order = perm.as_slice();

    runs.clear(order.first().map(|&c| row[c as usize]).unwrap_or(0));
    let mut current = runs.first_bit();
    let mut n_zeros = 0usize;
    for &c in order {
        let bit = row[c as usize];
        if bit > 1 {
            return Err(PbfError::usage(format!(
                "column {} holds {} which is not a bit",
                c, bit
            )));
        }
        match runs.last_mut() {
            Some(len) if bit == current => *len += 1,
            _ => {
                runs.push(1);
                current = bit;
            }
        }
        n_zeros += (bit == 0) as usize;
    }

    partition(order, next, n_zeros, |c| row[c as usize]);
    Ok(())
}

/// Decode `runs` against `perm`.
///
/// Writes the original-order row into `row` (resized to `m`) and the
/// partitioned permutation into `next`.
pub fn decode_row(
    perm: &Permutation,
    runs: &RunList,
    row: &mut Vec<u8>,
    next: &mut Permutation,
) -> Result<()> {
    let m = perm.len();
    runs.validate(m)?;
    let order = perm.as_slice();
    let n_zeros = runs.zero_count() as usize;

    row.resize(m, 0);
    let out = next.raw_mut();
    out.resize(m, 0);

    let (mut i0, mut i1, mut k) = (0usize, n_zeros, 0usize);
    for (bit, len) in runs.iter() {
        let end = k + len as usize;
        for &c in &order[k..end] {
            row[c as usize] = bit;
            if bit == 0 {
                out[i0] = c;
                i0 += 1;
            } else {
                out[i1] = c;
                i1 += 1;
            }
        }
        k = end;
    }
    Ok(())
}

/// Stable zeros-then-ones partition of `order` into `next`
#[inline]
fn partition(order: &[u32], next: &mut Permutation, n_zeros: usize, bit_of: impl Fn(u32) -> u8) {
    let out = next.raw_mut();
    out.resize(order.len(), 0);
    let (mut i0, mut i1) = (0usize, n_zeros);
    for &c in order {
        if bit_of(c) == 0 {
            out[i0] = c;
            i0 += 1;
        } else {
            out[i1] = c;
            i1 += 1;
        }
    }
}

/// Stateful row codec owning the live permutation and its buffers
#[derive(Debug)]
pub struct RowCodec {
    perm: Permutation,
    ws: CodecWorkspace,
}

impl RowCodec {
    /// Codec over `m` columns starting from the identity permutation
    pub fn new(m: usize) -> Self {
        Self::with_permutation(Permutation::identity(m))
    }

    /// Codec seeded with a restored permutation (e.g. a checkpoint)
    pub fn with_permutation(perm: Permutation) -> Self {
        let m = perm.len();
        Self {
            perm,
            ws: CodecWorkspace::new(m),
        }
    }

    pub fn n_cols(&self) -> usize {
        self.perm.len()
    }

    /// Permutation that the next row will be coded against
    pub fn permutation(&self) -> &Permutation {
        &self.perm
    }

    /// Encode one row and advance the permutation.
    ///
    /// On error the permutation is left as it was.
    pub fn encode(&mut self, row: &[u8]) -> Result<&RunList> {
        encode_row(&self.perm, row, &mut self.ws.runs, &mut self.ws.next)?;
        mem::swap(&mut self.perm, &mut self.ws.next);
        Ok(&self.ws.runs)
    }

    /// Decode one row and advance the permutation.
    ///
    /// On error the permutation is left as it was.
    pub fn decode(&mut self, runs: &RunList) -> Result<&[u8]> {
        decode_row(&self.perm, runs, &mut self.ws.row, &mut self.ws.next)?;
        mem::swap(&mut self.perm, &mut self.ws.next);
        Ok(&self.ws.row)
    }
}
