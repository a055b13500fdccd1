//! # Model Module
//!
//! The positional permutation codec.
//!
//! ## Core Algorithms
//! - `pbwt`: full-row encode/decode against an evolving permutation
//! - `subset`: rank tracking decode of a few columns per row
//!
//! Both apply the same stable zeros-then-ones partition, so a column decoded
//! through `subset` follows exactly the rank that `pbwt` would give it.

pub mod pbwt;
pub mod subset;

pub use pbwt::{decode_row, encode_row, RowCodec};
pub use subset::{decode_subset, SubsetQuery};
