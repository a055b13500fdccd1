//! # PBF Writer
//!
//! Append-only write session:
//! 1. Write header (column count, group size, checkpoint shift)
//! 2. Encode rows through the row codec, buffering `group_size` records
//!    per flush and snapshotting the permutation every `1 << shift` rows
//! 3. Close (flushes the last group, writes checkpoint table and footer)
//!
//! An I/O error leaves an unknown prefix of the data in the stream, so it
//! poisons the writer: every later write or close is a usage error.
//!
//! # Example
//!
//! ```
//! use pbf::config::WriterConfig;
//! use pbf::io::PbfWriter;
//!
//! # fn main() -> pbf::Result<()> {
//! let mut writer = PbfWriter::new(Vec::new(), 4, &WriterConfig::new(2, 1))?;
//! writer.write_row(&[1, 0, 1, 0])?;
//! writer.write_row(&[1, 1, 0, 0])?;
//! let bytes = writer.into_inner()?;
//! assert!(!bytes.is_empty());
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, instrument};

use crate::config::WriterConfig;
use crate::data::{Permutation, RowGroup};
use crate::error::{PbfError, Result};
use crate::io::format::{
    encode_row_record, write_checkpoint, Checkpoint, Footer, Header, HEADER_LEN,
};
use crate::model::RowCodec;

/// Streaming PBF writer over any `Write`
pub struct PbfWriter<W: Write> {
    /// Destination stream; `None` once handed back by `into_inner`
    writer: Option<W>,

    header: Header,

    codec: RowCodec,

    /// Encoded records of the current, not yet flushed group
    group_buf: Vec<u8>,

    /// Rows in `group_buf`
    rows_in_group: usize,

    /// Snapshots collected so far, in row order
    checkpoints: Vec<Checkpoint>,

    /// Rows written
    n_rows: u64,

    /// Bytes already handed to `writer`
    bytes_flushed: u64,

    /// Whether the footer has been written
    closed: bool,

    /// Set by the first I/O error on `writer`
    failed: bool,
}

impl PbfWriter<BufWriter<File>> {
    /// Create a PBF file on disk
    pub fn create(path: &Path, n_cols: usize, config: &WriterConfig) -> Result<Self> {
        let file = File::create(path)?;
        debug!(path = %path.display(), "created PBF file");
        Self::new(BufWriter::new(file), n_cols, config)
    }
}

impl<W: Write> PbfWriter<W> {
    /// Start a write session and emit the header
    #[instrument(level = "debug", skip(writer, config), fields(g = config.group_size, shift = config.checkpoint_shift))]
    pub fn new(mut writer: W, n_cols: usize, config: &WriterConfig) -> Result<Self> {
        config.validate()?;
        if n_cols == 0 || n_cols > u32::MAX as usize {
            return Err(PbfError::usage(format!(
                "column count must be in 1..={}, got {}",
                u32::MAX,
                n_cols
            )));
        }
        let header = Header {
            n_cols: n_cols as u32,
            group_size: config.group_size as u32,
            checkpoint_shift: config.checkpoint_shift,
        };
        header.write_to(&mut writer)?;

        Ok(Self {
            writer: Some(writer),
            header,
            codec: RowCodec::new(n_cols),
            group_buf: Vec::new(),
            rows_in_group: 0,
            checkpoints: Vec::new(),
            n_rows: 0,
            bytes_flushed: HEADER_LEN as u64,
            closed: false,
            failed: false,
        })
    }

    /// Encode and append one row of 0/1 bytes
    pub fn write_row(&mut self, row: &[u8]) -> Result<()> {
        self.check_writable()?;
        let offset = self.bytes_flushed + self.group_buf.len() as u64;
        let snapshot = self
            .at_checkpoint(self.n_rows)
            .then(|| self.codec.permutation().clone());

        let runs = self.codec.encode(row)?;
        encode_row_record(runs, &mut self.group_buf);

        if let Some(perm) = snapshot {
            self.checkpoints.push(Checkpoint {
                row: self.n_rows,
                offset,
                perm,
            });
        }
        self.n_rows += 1;
        self.rows_in_group += 1;
        if self.rows_in_group == self.header.group_size as usize {
            self.flush_group()?;
        }
        Ok(())
    }

    /// Append every row of `group`
    pub fn write_group(&mut self, group: &RowGroup) -> Result<()> {
        if group.width() != self.n_cols() {
            return Err(PbfError::usage(format!(
                "group has {} columns, file has {}",
                group.width(),
                self.n_cols()
            )));
        }
        let mut row = Vec::with_capacity(group.width());
        for r in 0..group.n_rows() {
            group.row_bytes_into(r, &mut row);
            self.write_row(&row)?;
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.failed {
            return Err(PbfError::usage("writer failed on an earlier I/O error"));
        }
        if self.closed {
            return Err(PbfError::usage("write after close"));
        }
        Ok(())
    }

    /// Record an I/O failure before handing it back
    fn poison<T>(&mut self, res: std::io::Result<T>) -> Result<T> {
        if res.is_err() {
            self.failed = true;
        }
        Ok(res?)
    }

    fn at_checkpoint(&self, row: u64) -> bool {
        row & (self.header.checkpoint_interval() - 1) == 0
    }

    fn flush_group(&mut self) -> Result<()> {
        if self.group_buf.is_empty() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PbfError::usage("writer has been released"))?;
        let res = writer.write_all(&self.group_buf);
        self.poison(res)?;
        self.bytes_flushed += self.group_buf.len() as u64;
        self.group_buf.clear();
        self.rows_in_group = 0;
        Ok(())
    }

    /// Finish the session: flush, write checkpoint table and footer.
    ///
    /// Calling `close` again is a no-op.
    #[instrument(level = "debug", skip(self), fields(n_rows = self.n_rows))]
    pub fn close(&mut self) -> Result<()> {
        if self.failed {
            return Err(PbfError::usage("writer failed on an earlier I/O error"));
        }
        if self.closed {
            return Ok(());
        }
        self.flush_group()?;

        let index_offset = self.bytes_flushed;
        if self.at_checkpoint(self.n_rows)
            && self.checkpoints.last().map(|c| c.row) != Some(self.n_rows)
        {
            self.checkpoints.push(Checkpoint {
                row: self.n_rows,
                offset: index_offset,
                perm: self.codec.permutation().clone(),
            });
        }

        let footer = Footer {
            n_rows: self.n_rows,
            index_offset,
            n_checkpoints: self.checkpoints.len() as u64,
        };
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PbfError::usage("writer has been released"))?;
        let checkpoints = &self.checkpoints;
        let res = checkpoints
            .iter()
            .try_for_each(|ck| write_checkpoint(writer, ck))
            .and_then(|()| footer.write_to(writer))
            .and_then(|()| writer.flush());
        self.poison(res)?;

        self.closed = true;
        debug!(
            n_rows = self.n_rows,
            n_checkpoints = self.checkpoints.len(),
            data_bytes = index_offset,
            "closed PBF writer"
        );
        Ok(())
    }

    /// Close if needed and return the underlying stream
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or_else(|| PbfError::usage("writer has been released"))
    }

    pub fn n_cols(&self) -> usize {
        self.header.n_cols as usize
    }

    pub fn group_size(&self) -> usize {
        self.header.group_size as usize
    }

    pub fn checkpoint_shift(&self) -> u32 {
        self.header.checkpoint_shift
    }

    pub fn n_rows(&self) -> u64 {
        self.n_rows
    }

    pub fn n_checkpoints(&self) -> usize {
        self.checkpoints.len()
    }

    /// Permutation the next row will be encoded against
    pub fn permutation(&self) -> &Permutation {
        self.codec.permutation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::format::{FOOTER_LEN, checkpoint_entry_len};

    #[test]
    fn test_checkpoints_at_interval() {
        let mut w = PbfWriter::new(Vec::new(), 3, &WriterConfig::new(3, 2)).unwrap();
        for i in 0..9u8 {
            w.write_row(&[i & 1, (i >> 1) & 1, (i >> 2) & 1]).unwrap();
        }
        // rows 0, 4, 8
        assert_eq!(w.n_checkpoints(), 3);
        w.close().unwrap();
        assert_eq!(w.n_checkpoints(), 3);

        let mut w = PbfWriter::new(Vec::new(), 3, &WriterConfig::new(3, 2)).unwrap();
        for _ in 0..8 {
            w.write_row(&[0, 1, 0]).unwrap();
        }
        w.close().unwrap();
        // rows 0, 4 and the final row count 8
        assert_eq!(w.n_checkpoints(), 3);
    }

    #[test]
    fn test_empty_file_layout() {
        let w = PbfWriter::new(Vec::new(), 5, &WriterConfig::default()).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + checkpoint_entry_len(5) + FOOTER_LEN);
    }

    #[test]
    fn test_write_after_close() {
        let mut w = PbfWriter::new(Vec::new(), 2, &WriterConfig::default()).unwrap();
        w.write_row(&[0, 1]).unwrap();
        w.close().unwrap();
        assert!(w.write_row(&[1, 1]).unwrap_err().is_usage());
        assert_eq!(w.n_rows(), 1);
    }

    #[test]
    fn test_bad_row_does_not_advance() {
        let mut w = PbfWriter::new(Vec::new(), 2, &WriterConfig::new(4, 0)).unwrap();
        assert!(w.write_row(&[0, 1, 1]).unwrap_err().is_usage());
        assert_eq!(w.n_rows(), 0);
        assert_eq!(w.n_checkpoints(), 0);
        w.write_row(&[0, 1]).unwrap();
        assert_eq!(w.n_checkpoints(), 1);
    }

    #[test]
    fn test_rejects_zero_columns_and_bad_config() {
        assert!(PbfWriter::new(Vec::new(), 0, &WriterConfig::default()).is_err());
        assert!(PbfWriter::new(Vec::new(), 4, &WriterConfig::new(0, 1)).is_err());
    }

    /// Accepts `budget` bytes, then fails every write
    #[derive(Debug)]
    struct ShortSink {
        budget: usize,
        written: Vec<u8>,
    }

    impl Write for ShortSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_io_error_poisons_writer() {
        let sink = ShortSink {
            budget: HEADER_LEN + 1,
            written: Vec::new(),
        };
        let mut w = PbfWriter::new(sink, 4, &WriterConfig::new(1, 0)).unwrap();
        assert!(matches!(w.write_row(&[1, 0, 1, 0]), Err(PbfError::Io(_))));
        // a retry must not append the row a second time
        assert!(w.write_row(&[1, 0, 1, 0]).unwrap_err().is_usage());
        assert!(w.close().unwrap_err().is_usage());
        assert!(w.into_inner().unwrap_err().is_usage());
    }

    #[test]
    fn test_io_error_during_close() {
        let rows = [[0u8, 1, 1], [1, 1, 0]];
        // room for the header and both records, not the table
        let mut dry_run = PbfWriter::new(Vec::new(), 3, &WriterConfig::new(8, 0)).unwrap();
        for row in &rows {
            dry_run.write_row(row).unwrap();
        }
        dry_run.flush_group().unwrap();
        let data_len = dry_run.bytes_flushed as usize;

        let sink = ShortSink {
            budget: data_len,
            written: Vec::new(),
        };
        let mut w = PbfWriter::new(sink, 3, &WriterConfig::new(8, 0)).unwrap();
        for row in &rows {
            w.write_row(row).unwrap();
        }
        assert!(matches!(w.close(), Err(PbfError::Io(_))));
        assert!(w.close().unwrap_err().is_usage());
        assert!(w.write_row(&[0, 0, 0]).unwrap_err().is_usage());
    }

    #[test]
    fn test_group_width_mismatch() {
        let mut w = PbfWriter::new(Vec::new(), 3, &WriterConfig::default()).unwrap();
        let group = RowGroup::from_rows(2, &[[0u8, 1]]).unwrap();
        assert!(w.write_group(&group).unwrap_err().is_usage());
    }
}
