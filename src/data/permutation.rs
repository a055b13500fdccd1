//! # Column Permutation
//!
//! The positional prefix array carried between rows: `S[k]` is the original
//! column occupying sort position `k`. Every `Permutation` value is a valid
//! bijection on `[0, m)`; constructors that accept foreign data validate it.

use crate::data::ColIdx;
use crate::error::{PbfError, Result};

/// Ordered bijection on `[0, m)`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<u32>,
}

impl Permutation {
    /// Identity permutation over `m` columns
    pub fn identity(m: usize) -> Self {
        Self {
            order: (0..m as u32).collect(),
        }
    }

    /// Build from an explicit order, rejecting anything that is not a bijection
    pub fn from_vec(order: Vec<u32>) -> Result<Self> {
        let m = order.len();
        let mut seen = vec![false; m];
        for &c in &order {
            let c = c as usize;
            if c >= m || seen[c] {
                return Err(PbfError::format(format!(
                    "permutation entry {} is out of range or repeated (m = {})",
                    c, m
                )));
            }
            seen[c] = true;
        }
        Ok(Self { order })
    }

    /// Number of columns
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Column at sort position `k`
    #[inline]
    pub fn get(&self, k: usize) -> ColIdx {
        ColIdx::new(self.order[k])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.order
    }

    /// Sort position of `col`, by linear scan
    pub fn position_of(&self, col: ColIdx) -> Option<usize> {
        self.order.iter().position(|&c| c == col.0)
    }

    /// Mutable access to the raw order for the codec's partition step.
    ///
    /// Callers must leave the buffer holding a bijection.
    pub(crate) fn raw_mut(&mut self) -> &mut Vec<u32> {
        &mut self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let p = Permutation::identity(4);
        assert_eq!(p.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(p.position_of(ColIdx::new(2)), Some(2));
    }

    #[test]
    fn test_rejects_repeats_and_range() {
        assert!(Permutation::from_vec(vec![0, 0, 1]).unwrap_err().is_format());
        assert!(Permutation::from_vec(vec![0, 3, 1]).unwrap_err().is_format());
        assert!(Permutation::from_vec(vec![2, 0, 1]).is_ok());
    }

    #[test]
    fn test_position_of() {
        let p = Permutation::from_vec(vec![1, 3, 0, 2]).unwrap();
        let positions: Vec<_> = (0..4u32).map(|c| p.position_of(ColIdx::new(c))).collect();
        assert_eq!(positions, vec![Some(2), Some(0), Some(3), Some(1)]);
        assert_eq!(p.position_of(ColIdx::new(9)), None);
    }
}
