//! # Data Module
//!
//! In-memory representations shared by the codec and the container.
//!
//! ## Design Philosophy
//! - **Zero-cost newtypes:** `ColIdx` keeps column identities apart from sort
//!   positions and ranks, which are plain `u32`/`usize`.
//! - **Validated values:** a `Permutation` is always a bijection, so the codec
//!   never has to re-check it row by row.
//! - **Bit packing at rest:** `RowGroup` stores one bit per column; the hot
//!   codec path works on one byte per column.

pub mod column;
pub mod group;
pub mod permutation;
pub mod runs;

// Re-export commonly used types
pub use column::ColIdx;
pub use group::RowGroup;
pub use permutation::Permutation;
pub use runs::RunList;
