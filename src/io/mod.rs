//! # I/O Module
//!
//! The PBF container: binary layout, streaming writer and random-access
//! reader. Converts between the on-disk row records and decoded rows.

pub mod format;
pub mod reader;
pub mod writer;

pub use reader::{DecodedRow, PbfReader, PbfStats};
pub use writer::PbfWriter;
