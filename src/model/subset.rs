//! # Subset Rank Decoding
//!
//! Decode a few columns of a PBWT-coded row without expanding it.
//!
//! Each query tracks the rank of one column in the live permutation. The bit
//! at that rank is read off the run-list, and the rank is moved the way the
//! stable partition would move it:
//! - bit 0: new rank = number of zeros before `r`
//! - bit 1: new rank = `zero_count` + number of ones before `r`
//!
//! Work per row is proportional to the queries times the runs they scan,
//! independent of the column count.

use crate::data::{ColIdx, Permutation, RunList};
use crate::error::{PbfError, Result};

/// Tracking state for one queried column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubsetQuery {
    /// Position of `col` in the live permutation
    pub rank: u32,
    /// Original column index
    pub col: ColIdx,
    /// Bit decoded at the last polymorphic row
    pub bit: u8,
}

impl SubsetQuery {
    /// Seed a query from a full permutation snapshot
    pub fn seed(perm: &Permutation, col: ColIdx) -> Result<Self> {
        let rank = perm.position_of(col).ok_or_else(|| {
            PbfError::usage(format!(
                "column {} is out of range for {} columns",
                col,
                perm.len()
            ))
        })?;
        Ok(Self {
            rank: rank as u32,
            col,
            bit: 0,
        })
    }
}

/// Decode `queries` from one row and advance their ranks.
///
/// Returns the number of 1 bits in the full row. When the row is
/// monomorphic the queries are not touched: ranks keep their order under the
/// identity partition and the caller derives the bit from the returned count.
pub fn decode_subset(m: usize, runs: &RunList, queries: &mut [SubsetQuery]) -> Result<usize> {
    runs.validate(m)?;
    let zero_count = runs.zero_count() as usize;
    let total_ones = m - zero_count;
    if zero_count == 0 || zero_count == m {
        return Ok(total_ones);
    }

    if let Some(q) = queries.iter().find(|q| q.rank as usize >= m) {
        return Err(PbfError::format(format!(
            "rank {} of column {} is out of range for {} columns",
            q.rank, q.col, m
        )));
    }

    for q in queries.iter_mut() {
        let (bit, ones_before) = locate(runs, q.rank as u64);
        q.bit = bit;
        q.rank = if bit == 0 {
            (q.rank as u64 - ones_before) as u32
        } else {
            (zero_count as u64 + ones_before) as u32
        };
    }
    Ok(total_ones)
}

/// Bit at position `r` and the count of ones strictly before it.
///
/// `r` must be below the run-list total.
#[inline]
fn locate(runs: &RunList, r: u64) -> (u8, u64) {
    let mut start = 0u64;
    let mut ones = 0u64;
    let mut bit = runs.first_bit();
    for (value, len) in runs.iter() {
        let len = len as u64;
        bit = value;
        if r < start + len {
            if value == 1 {
                ones += r - start;
            }
            return (value, ones);
        }
        if value == 1 {
            ones += len;
        }
        start += len;
    }
    (bit, ones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pbwt::RowCodec;

    #[test]
    fn test_single_column_example() {
        let rows = [[1u8, 0, 1, 0], [1, 1, 0, 0]];
        let mut enc = RowCodec::new(4);
        let mut q = [SubsetQuery::seed(&Permutation::identity(4), ColIdx::new(2)).unwrap()];

        let mut bits = Vec::new();
        for row in &rows {
            let runs = enc.encode(row).unwrap();
            let ones = decode_subset(4, runs, &mut q).unwrap();
            assert_eq!(ones, 2);
            bits.push(q[0].bit);
            assert_eq!(enc.permutation().position_of(ColIdx::new(2)), Some(q[0].rank as usize));
        }
        assert_eq!(bits, vec![1, 0]);
    }

    #[test]
    fn test_agrees_with_full_decode() {
        let rows: Vec<Vec<u8>> = vec![
            vec![0, 1, 1, 0, 1, 0, 0, 1],
            vec![1, 1, 0, 0, 1, 1, 0, 0],
            vec![0, 0, 0, 0, 0, 0, 0, 0],
            vec![1, 0, 1, 0, 1, 0, 1, 0],
            vec![1, 1, 1, 1, 1, 1, 1, 1],
            vec![0, 1, 0, 0, 0, 0, 1, 0],
        ];
        let ident = Permutation::identity(8);
        let mut queries: Vec<SubsetQuery> = (0..8u32)
            .rev()
            .map(|c| SubsetQuery::seed(&ident, ColIdx::new(c)).unwrap())
            .collect();
        let mut enc = RowCodec::new(8);
        for row in &rows {
            let runs = enc.encode(row).unwrap();
            let ones = decode_subset(8, runs, &mut queries).unwrap();
            assert_eq!(ones, row.iter().filter(|&&b| b == 1).count());
            let mono = ones == 0 || ones == 8;
            for q in &queries {
                let bit = if mono { (ones == 8) as u8 } else { q.bit };
                assert_eq!(bit, row[q.col.as_usize()]);
                assert_eq!(
                    enc.permutation().position_of(q.col),
                    Some(q.rank as usize)
                );
            }
        }
    }

    #[test]
    fn test_monomorphic_leaves_queries_untouched() {
        let runs = RunList::from_runs(1, vec![6]).unwrap();
        let mut q = [SubsetQuery {
            rank: 4,
            col: ColIdx::new(1),
            bit: 0,
        }];
        assert_eq!(decode_subset(6, &runs, &mut q).unwrap(), 6);
        assert_eq!(q[0].rank, 4);
        assert_eq!(q[0].bit, 0);
    }

    #[test]
    fn test_empty_query_set_still_counts() {
        let runs = RunList::from_runs(0, vec![3, 2, 1]).unwrap();
        assert_eq!(decode_subset(6, &runs, &mut []).unwrap(), 2);
    }

    #[test]
    fn test_errors_leave_queries_untouched() {
        let runs = RunList::from_runs(0, vec![3, 2]).unwrap();
        let mut q = [SubsetQuery {
            rank: 1,
            col: ColIdx::new(0),
            bit: 1,
        }];
        assert!(decode_subset(6, &runs, &mut q).unwrap_err().is_format());
        q[0].rank = 9;
        assert!(decode_subset(5, &runs, &mut q).unwrap_err().is_format());
        assert_eq!(q[0].bit, 1);
    }

    #[test]
    fn test_seed_rejects_unknown_column() {
        let p = Permutation::identity(3);
        assert!(SubsetQuery::seed(&p, ColIdx::new(3)).unwrap_err().is_usage());
    }
}
