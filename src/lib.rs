//! # PBF Library
//!
//! Compact, randomly seekable storage for large haplotype bit matrices
//! (sites × haplotype columns) using the positional Burrows-Wheeler
//! transform with run-length coding.
//!
//! ## Modules
//! - `config`: write parameters and CLI argument parsing
//! - `data`: column index, permutation, run-list and row group types
//! - `error`: error types and result aliases
//! - `io`: container format, writer and reader
//! - `model`: row codec and subset rank decoder
//! - `utils`: reusable codec buffers
//!
//! ## Module Structure
//! ```text
//! pbf
//! ├── data   # Column ids, permutations, run-lists, bit-packed groups
//! ├── model  # PBWT row codec, subset rank decoding
//! ├── io     # Header/footer/checkpoint layout, PbfWriter, PbfReader
//! └── utils  # Workspace buffers
//! ```
//!
//! ## Example
//! ```
//! use pbf::{ColIdx, PbfReader, PbfWriter, WriterConfig};
//!
//! # fn main() -> pbf::Result<()> {
//! let mut writer = PbfWriter::new(Vec::new(), 4, &WriterConfig::default())?;
//! writer.write_row(&[1, 0, 1, 0])?;
//! writer.write_row(&[1, 1, 0, 0])?;
//!
//! let mut reader = PbfReader::from_bytes(writer.into_inner()?)?;
//! reader.declare_subset(&[ColIdx::new(2)])?;
//! assert_eq!(reader.read_row()?.unwrap().bits, &[1]);
//! assert_eq!(reader.read_row()?.unwrap().bits, &[0]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, WriterConfig};
pub use data::{ColIdx, Permutation, RowGroup, RunList};
pub use error::{PbfError, Result};
pub use io::{DecodedRow, PbfReader, PbfStats, PbfWriter};
pub use model::{RowCodec, SubsetQuery};
