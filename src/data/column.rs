//! # Column Index
//!
//! Zero-cost newtype for haplotype column indices. A column identity is fixed
//! for the lifetime of a file and always lies in `[0, m)`.

/// Zero-cost newtype for column (haplotype) indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ColIdx(pub u32);

impl ColIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ColIdx {
    fn from(idx: u32) -> Self {
        Self(idx)
    }
}

impl From<usize> for ColIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl From<ColIdx> for usize {
    fn from(idx: ColIdx) -> usize {
        idx.0 as usize
    }
}

impl std::fmt::Display for ColIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let c = ColIdx::from(7usize);
        assert_eq!(c.as_usize(), 7);
        assert_eq!(usize::from(c), 7);
        assert_eq!(ColIdx::from(7u32), ColIdx::new(7));
        assert_eq!(ColIdx::new(7).to_string(), "7");
    }
}
