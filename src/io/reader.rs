//! # PBF Reader
//!
//! Random-access reader over a memory-mapped (or fully buffered) PBF file.
//!
//! Opening validates header, footer and the checkpoint table, then places
//! the cursor at row 0. Rows come back either in full (bulk mode) or as the
//! bits of a declared column subset (sparse mode); both report the row's
//! total count of 1 bits.
//!
//! Seeking jumps to the checkpoint at or before the target and replays at
//! most `(1 << shift) - 1` rows in whichever mode is active.

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::data::{ColIdx, RowGroup, RunList};
use crate::error::{PbfError, Result};
use crate::io::format::{
    checkpoint_entry_len, decode_row_record, parse_checkpoint_meta, parse_checkpoint_perm, Footer,
    Header, FOOTER_LEN, HEADER_LEN,
};
use crate::model::{decode_subset, RowCodec, SubsetQuery};

/// Backing bytes of an open file
#[derive(Debug)]
enum Source {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Source::Mapped(m) => &m[..],
            Source::Owned(v) => &v[..],
        }
    }
}

/// Location of one checkpoint in the table
#[derive(Clone, Copy, Debug)]
struct CheckpointEntry {
    row: u64,
    offset: u64,
    /// Start of the table entry within the file
    entry_at: usize,
}

/// One decoded row.
///
/// `bits` has one byte per column in bulk mode, or one per declared subset
/// column, in declaration order, in sparse mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedRow<'a> {
    pub bits: &'a [u8],
    /// Number of 1 bits in the full row
    pub n_ones: usize,
}

/// Summary metadata of an open file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PbfStats {
    pub n_cols: usize,
    pub group_size: usize,
    pub checkpoint_shift: u32,
    pub n_rows: u64,
    pub n_checkpoints: usize,
    pub file_bytes: usize,
}

/// PBF read handle
#[derive(Debug)]
pub struct PbfReader {
    data: Source,
    header: Header,
    n_rows: u64,
    /// End of row data (start of checkpoint table)
    data_end: usize,
    checkpoints: Vec<CheckpointEntry>,

    /// Full-decode state; only in sync with `row` while no subset is declared
    codec: RowCodec,
    /// Scratch run-list for the record being decoded
    runs: RunList,
    /// Declared subset, in declaration order
    subset: Vec<SubsetQuery>,
    /// Output buffer for sparse rows
    subset_bits: Vec<u8>,

    /// Index of the next row to be read
    row: u64,
    /// Byte offset of the next row's record
    pos: usize,
}

impl PbfReader {
    /// Open a PBF file by memory-mapping it
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PbfError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < (HEADER_LEN + FOOTER_LEN) as u64 {
            return Err(PbfError::format(format!(
                "file is {} bytes, too short to be a PBF file",
                len
            )));
        }
        // SAFETY: the map is read-only; PBF files are not modified after close.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(path = %path.display(), bytes = len, "mapped PBF file");
        Self::from_source(Source::Mapped(mmap))
    }

    /// Open from an in-memory copy of a file
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_source(Source::Owned(bytes))
    }

    /// Read a whole stream (e.g. stdin) and open it
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    fn from_source(data: Source) -> Result<Self> {
        let len = data.len();
        if len < HEADER_LEN + FOOTER_LEN {
            return Err(PbfError::format(format!(
                "file is {} bytes, too short to be a PBF file",
                len
            )));
        }
        let header = Header::parse(&data[..HEADER_LEN])?;
        let footer = Footer::parse(&data[len - FOOTER_LEN..])?;
        let n_cols = header.n_cols as usize;

        let table_end = len - FOOTER_LEN;
        let data_end = usize::try_from(footer.index_offset)
            .ok()
            .filter(|&o| o >= HEADER_LEN && o <= table_end)
            .ok_or_else(|| {
                PbfError::format(format!(
                    "checkpoint table offset {} is outside the file",
                    footer.index_offset
                ))
            })?;

        let expected = footer
            .n_rows
            .checked_shr(header.checkpoint_shift)
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| PbfError::format(format!("row count {} is too large", footer.n_rows)))?;
        if footer.n_checkpoints != expected {
            return Err(PbfError::format(format!(
                "{} rows with shift {} need {} checkpoints, table has {}",
                footer.n_rows, header.checkpoint_shift, expected, footer.n_checkpoints
            )));
        }
        let entry_len = checkpoint_entry_len(n_cols);
        let table_len = (footer.n_checkpoints as usize)
            .checked_mul(entry_len)
            .ok_or_else(|| PbfError::format("checkpoint table size overflows"))?;
        if table_len != table_end - data_end {
            return Err(PbfError::format(format!(
                "checkpoint table is {} bytes, expected {}",
                table_end - data_end,
                table_len
            )));
        }

        let interval = header.checkpoint_interval();
        let mut checkpoints = Vec::with_capacity(footer.n_checkpoints as usize);
        let mut prev_offset = HEADER_LEN as u64;
        for i in 0..footer.n_checkpoints as usize {
            let entry_at = data_end + i * entry_len;
            let (row, offset) = parse_checkpoint_meta(&data[entry_at..entry_at + entry_len]);
            // every record takes at least one byte
            let after_prev = if i == 0 {
                offset == HEADER_LEN as u64
            } else {
                offset > prev_offset
            };
            let in_order = after_prev && offset <= data_end as u64;
            if row != i as u64 * interval || !in_order {
                return Err(PbfError::format(format!(
                    "checkpoint {} (row {}, offset {}) is inconsistent",
                    i, row, offset
                )));
            }
            checkpoints.push(CheckpointEntry {
                row,
                offset,
                entry_at,
            });
            prev_offset = offset;
        }
        if checkpoints.is_empty() {
            return Err(PbfError::format("checkpoint table is empty"));
        }
        if footer.n_rows % interval == 0 && prev_offset != data_end as u64 {
            return Err(PbfError::format("final checkpoint does not end at row data"));
        }

        debug!(
            n_cols,
            group_size = header.group_size,
            shift = header.checkpoint_shift,
            n_rows = footer.n_rows,
            "opened PBF file"
        );

        let mut reader = Self {
            data,
            header,
            n_rows: footer.n_rows,
            data_end,
            checkpoints,
            codec: RowCodec::new(0),
            runs: RunList::new(),
            subset: Vec::new(),
            subset_bits: Vec::new(),
            row: 0,
            pos: HEADER_LEN,
        };
        reader.seek(0)?;
        Ok(reader)
    }

    /// Position the cursor so that the next `read_row` returns row `k`.
    ///
    /// `k == n_rows` is allowed and leaves the reader at end of data.
    #[instrument(level = "debug", skip(self), fields(subset = self.subset.len()))]
    pub fn seek(&mut self, k: u64) -> Result<()> {
        if k > self.n_rows {
            return Err(PbfError::usage(format!(
                "seek to row {} beyond {} rows",
                k, self.n_rows
            )));
        }
        let entry = self.checkpoints[(k >> self.header.checkpoint_shift) as usize];
        let n_cols = self.n_cols();
        let entry_bytes = &self.data[entry.entry_at..entry.entry_at + checkpoint_entry_len(n_cols)];
        let perm = parse_checkpoint_perm(entry_bytes, n_cols)?;

        let bytes = &self.data[..self.data_end];
        let mut pos = entry.offset as usize;
        let mut row = entry.row;
        if self.subset.is_empty() {
            let mut codec = RowCodec::with_permutation(perm);
            while row < k {
                decode_row_record(bytes, &mut pos, n_cols, &mut self.runs)?;
                codec.decode(&self.runs)?;
                row += 1;
            }
            self.codec = codec;
        } else {
            let mut queries = self
                .subset
                .iter()
                .map(|q| SubsetQuery::seed(&perm, q.col))
                .collect::<Result<Vec<_>>>()?;
            while row < k {
                decode_row_record(bytes, &mut pos, n_cols, &mut self.runs)?;
                decode_subset(n_cols, &self.runs, &mut queries)?;
                row += 1;
            }
            self.subset = queries;
        }
        if k == self.n_rows && pos != self.data_end {
            return Err(PbfError::format(format!(
                "{} stray bytes after the last row",
                self.data_end - pos
            )));
        }
        trace!(checkpoint_row = entry.row, replayed = k - entry.row, "seek done");
        self.pos = pos;
        self.row = k;
        Ok(())
    }

    /// Restrict decoding to `cols`; an empty slice restores full rows.
    ///
    /// The cursor stays at the current row.
    pub fn declare_subset(&mut self, cols: &[ColIdx]) -> Result<()> {
        if let Some(bad) = cols.iter().find(|c| c.as_usize() >= self.n_cols()) {
            return Err(PbfError::usage(format!(
                "column {} is out of range for {} columns",
                bad,
                self.n_cols()
            )));
        }
        let previous = std::mem::replace(
            &mut self.subset,
            cols.iter()
                .map(|&col| SubsetQuery { rank: 0, col, bit: 0 })
                .collect(),
        );
        if let Err(e) = self.seek(self.row) {
            self.subset = previous;
            return Err(e);
        }
        self.subset_bits.clear();
        self.subset_bits.resize(self.subset.len(), 0);
        Ok(())
    }

    /// Decode the next row; `None` at end of data
    pub fn read_row(&mut self) -> Result<Option<DecodedRow<'_>>> {
        if self.row >= self.n_rows {
            return Ok(None);
        }
        let n_cols = self.n_cols();
        let mut pos = self.pos;
        decode_row_record(&self.data[..self.data_end], &mut pos, n_cols, &mut self.runs)?;
        if self.row + 1 == self.n_rows && pos != self.data_end {
            return Err(PbfError::format(format!(
                "{} stray bytes after the last row",
                self.data_end - pos
            )));
        }
        let n_ones = n_cols - self.runs.zero_count() as usize;

        let bits: &[u8] = if self.subset.is_empty() {
            self.codec.decode(&self.runs)?
        } else {
            decode_subset(n_cols, &self.runs, &mut self.subset)?;
            if n_ones == 0 || n_ones == n_cols {
                self.subset_bits.fill((n_ones == n_cols) as u8);
            } else {
                for (out, q) in self.subset_bits.iter_mut().zip(&self.subset) {
                    *out = q.bit;
                }
            }
            &self.subset_bits
        };
        self.pos = pos;
        self.row += 1;
        Ok(Some(DecodedRow { bits, n_ones }))
    }

    /// Read up to `group_size` rows; `None` at end of data
    pub fn read_group(&mut self) -> Result<Option<RowGroup>> {
        let width = self.row_width();
        let mut group = RowGroup::with_capacity(width, self.group_size());
        while group.n_rows() < self.group_size() {
            match self.read_row()? {
                Some(row) => group.push_row(row.bits)?,
                None => break,
            }
        }
        Ok((!group.is_empty()).then_some(group))
    }

    /// Bits returned per row in the current mode
    pub fn row_width(&self) -> usize {
        if self.subset.is_empty() {
            self.n_cols()
        } else {
            self.subset.len()
        }
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

    /// Index of the row the next `read_row` returns
    pub fn current_row(&self) -> u64 {
        self.row
    }

    /// Declared subset columns, in declaration order
    pub fn subset(&self) -> impl Iterator<Item = ColIdx> + '_ {
        self.subset.iter().map(|q| q.col)
    }

    pub fn stats(&self) -> PbfStats {
        PbfStats {
            n_cols: self.n_cols(),
            group_size: self.group_size(),
            checkpoint_shift: self.checkpoint_shift(),
            n_rows: self.n_rows,
            n_checkpoints: self.checkpoints.len(),
            file_bytes: self.data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::io::PbfWriter;

    fn write_bytes(rows: &[Vec<u8>], m: usize, config: WriterConfig) -> Vec<u8> {
        let mut w = PbfWriter::new(Vec::new(), m, &config).unwrap();
        for row in rows {
            w.write_row(row).unwrap();
        }
        w.into_inner().unwrap()
    }

    fn worked_example() -> Vec<u8> {
        write_bytes(&[vec![1, 0, 1, 0], vec![1, 1, 0, 0]], 4, WriterConfig::new(1, 0))
    }

    #[test]
    fn test_worked_example_full() {
        let mut r = PbfReader::from_bytes(worked_example()).unwrap();
        assert_eq!(r.n_rows(), 2);
        assert_eq!(r.n_checkpoints(), 3);
        assert_eq!(r.read_row().unwrap().unwrap().bits, &[1, 0, 1, 0]);
        assert_eq!(r.read_row().unwrap().unwrap().bits, &[1, 1, 0, 0]);
        assert!(r.read_row().unwrap().is_none());
    }

    #[test]
    fn test_worked_example_subset() {
        let mut r = PbfReader::from_bytes(worked_example()).unwrap();
        r.declare_subset(&[ColIdx::new(2)]).unwrap();
        let first = r.read_row().unwrap().unwrap();
        assert_eq!((first.bits, first.n_ones), (&[1u8][..], 2));
        let second = r.read_row().unwrap().unwrap();
        assert_eq!(second.bits, &[0]);
    }

    #[test]
    fn test_empty_file() {
        let bytes = write_bytes(&[], 3, WriterConfig::default());
        let mut r = PbfReader::from_bytes(bytes).unwrap();
        assert_eq!(r.n_rows(), 0);
        assert!(r.read_row().unwrap().is_none());
        assert!(r.read_group().unwrap().is_none());
        r.seek(0).unwrap();
        assert!(r.seek(1).unwrap_err().is_usage());
    }

    #[test]
    fn test_subset_switch_back_to_full() {
        let rows: Vec<Vec<u8>> = (0..10u8)
            .map(|i| vec![i & 1, (i >> 1) & 1, 1, (i >> 2) & 1, 0])
            .collect();
        let mut r = PbfReader::from_bytes(write_bytes(&rows, 5, WriterConfig::new(3, 2))).unwrap();
        r.declare_subset(&[ColIdx::new(3), ColIdx::new(0)]).unwrap();
        for row in &rows[..6] {
            let got = r.read_row().unwrap().unwrap();
            assert_eq!(got.bits, &[row[3], row[0]]);
        }
        r.declare_subset(&[]).unwrap();
        assert_eq!(r.current_row(), 6);
        assert_eq!(r.read_row().unwrap().unwrap().bits, rows[6].as_slice());
    }

    #[test]
    fn test_subset_out_of_range() {
        let mut r = PbfReader::from_bytes(worked_example()).unwrap();
        assert!(r.declare_subset(&[ColIdx::new(4)]).unwrap_err().is_usage());
        assert_eq!(r.row_width(), 4);
    }

    #[test]
    fn test_rejects_truncated_and_bad_magic() {
        let bytes = worked_example();
        assert!(PbfReader::from_bytes(bytes[..bytes.len() - 1].to_vec())
            .unwrap_err()
            .is_format());
        let mut bad = bytes.clone();
        bad[0] = b'Q';
        assert!(PbfReader::from_bytes(bad).unwrap_err().is_format());
        assert!(PbfReader::from_bytes(vec![0; 10]).unwrap_err().is_format());
    }

    #[test]
    fn test_rejects_corrupt_row_record() {
        let mut bytes = worked_example();
        // first row record: tag (4 runs, first bit 1) then four lengths of 1
        assert_eq!(bytes[HEADER_LEN], (4 << 1) | 1);
        bytes[HEADER_LEN + 1] = 2;
        let mut r = PbfReader::from_bytes(bytes).unwrap();
        assert!(r.read_row().unwrap_err().is_format());
        assert_eq!(r.current_row(), 0);
    }

    #[test]
    fn test_rejects_corrupt_snapshot() {
        let mut bytes = worked_example();
        let footer_at = bytes.len() - FOOTER_LEN;
        // second checkpoint's first permutation entry, made a duplicate
        let entry = footer_at - 2 * checkpoint_entry_len(4);
        bytes[entry + 16] = bytes[entry + 20];
        let mut r = PbfReader::from_bytes(bytes).unwrap();
        assert!(r.seek(1).unwrap_err().is_format());
        assert_eq!(r.current_row(), 0);
        assert_eq!(r.read_row().unwrap().unwrap().bits, &[1, 0, 1, 0]);
    }

    fn header_and_footer(footer: Footer) -> Vec<u8> {
        let mut bytes = Vec::new();
        let header = Header {
            n_cols: 1,
            group_size: 1,
            checkpoint_shift: 0,
        };
        header.write_to(&mut bytes).unwrap();
        footer.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_rejects_oversized_row_count() {
        let bytes = header_and_footer(Footer {
            n_rows: u64::MAX,
            index_offset: HEADER_LEN as u64,
            n_checkpoints: 0,
        });
        assert!(PbfReader::from_bytes(bytes).unwrap_err().is_format());

        let bytes = header_and_footer(Footer {
            n_rows: 0,
            index_offset: HEADER_LEN as u64,
            n_checkpoints: 0,
        });
        assert!(PbfReader::from_bytes(bytes).unwrap_err().is_format());
    }

    #[test]
    fn test_rejects_repeated_checkpoint_offset() {
        let mut bytes = worked_example();
        let footer_at = bytes.len() - FOOTER_LEN;
        // second checkpoint claims the same offset as the first
        let entry = footer_at - 2 * checkpoint_entry_len(4);
        bytes[entry + 8..entry + 16].copy_from_slice(&(HEADER_LEN as u64).to_le_bytes());
        assert!(PbfReader::from_bytes(bytes).unwrap_err().is_format());
    }

    #[test]
    fn test_seek_to_end_detects_stray_bytes() {
        let rows = vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 1]];
        let mut bytes = write_bytes(&rows, 3, WriterConfig::new(4, 2));
        let footer_at = bytes.len() - FOOTER_LEN;
        let data_end = Footer::parse(&bytes[footer_at..]).unwrap().index_offset as usize;
        bytes.insert(data_end, 0);
        let footer_at = footer_at + 1;
        bytes[footer_at + 8..footer_at + 16].copy_from_slice(&(data_end as u64 + 1).to_le_bytes());

        let mut r = PbfReader::from_bytes(bytes).unwrap();
        assert!(r.seek(3).unwrap_err().is_format());
        assert_eq!(r.current_row(), 0);
        r.declare_subset(&[ColIdx::new(1)]).unwrap();
        assert!(r.seek(3).unwrap_err().is_format());
        r.seek(2).unwrap();
        assert!(r.read_row().unwrap_err().is_format());
    }

    #[test]
    fn test_stats() {
        let r = PbfReader::from_bytes(worked_example()).unwrap();
        let stats = r.stats();
        assert_eq!(stats.n_cols, 4);
        assert_eq!(stats.n_rows, 2);
        assert_eq!(stats.checkpoint_shift, 0);
        assert_eq!(stats.group_size, 1);
    }
}
