//! # Configuration Logic
//!
//! ## Role
//! Write-session parameters for the container, and CLI argument parsing and
//! validation for the `pbf` binary.
//!
//! ## Write parameters
//! - `group_size`: rows buffered per I/O batch (default: 64)
//! - `checkpoint_shift`: a permutation checkpoint is kept every
//!   `1 << checkpoint_shift` rows (default: 13)
//!
//! ## Example CLI
//! ```bash
//! pbf encode -i rows.txt -o panel.pbf -g 64 -s 13
//! pbf view panel.pbf -i 1000 -n 10 -c 0,1,17
//! pbf stat panel.pbf --json
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{PbfError, Result};

/// Default rows per write batch
pub const DEFAULT_GROUP_SIZE: usize = 64;

/// Default checkpoint shift (one snapshot every 8192 rows)
pub const DEFAULT_CHECKPOINT_SHIFT: u32 = 13;

/// Largest accepted group size
pub const MAX_GROUP_SIZE: usize = 1 << 20;

/// Largest accepted checkpoint shift
pub const MAX_CHECKPOINT_SHIFT: u32 = 32;

/// Parameters fixed for the duration of one write session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    /// Rows per group
    pub group_size: usize,
    /// Checkpoint every `1 << checkpoint_shift` rows
    pub checkpoint_shift: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            checkpoint_shift: DEFAULT_CHECKPOINT_SHIFT,
        }
    }
}

impl WriterConfig {
    pub fn new(group_size: usize, checkpoint_shift: u32) -> Self {
        Self {
            group_size,
            checkpoint_shift,
        }
    }

    /// Rows between consecutive checkpoints
    pub fn checkpoint_interval(&self) -> u64 {
        1u64 << self.checkpoint_shift
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 || self.group_size > MAX_GROUP_SIZE {
            return Err(PbfError::config(format!(
                "group size must be in 1..={}, got {}",
                MAX_GROUP_SIZE, self.group_size
            )));
        }
        if self.checkpoint_shift > MAX_CHECKPOINT_SHIFT {
            return Err(PbfError::config(format!(
                "checkpoint shift must be at most {}, got {}",
                MAX_CHECKPOINT_SHIFT, self.checkpoint_shift
            )));
        }
        Ok(())
    }
}

/// Command-line configuration for the `pbf` binary
#[derive(Parser, Debug, Clone)]
#[command(name = "pbf")]
#[command(author, version, about = "Seekable PBWT storage for haplotype bit matrices")]
pub struct Config {
    /// Enable span timing output on stderr
    #[arg(long, global = true)]
    pub profile: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert text rows of 0/1 characters into a PBF file
    Encode {
        /// Input text file ("-" for stdin)
        #[arg(short = 'i', long, default_value = "-")]
        input: PathBuf,

        /// Output PBF file ("-" for stdout)
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Rows per group
        #[arg(short = 'g', long, default_value_t = DEFAULT_GROUP_SIZE)]
        group_size: usize,

        /// Keep a permutation checkpoint every 1<<SHIFT rows
        #[arg(short = 's', long, default_value_t = DEFAULT_CHECKPOINT_SHIFT)]
        shift: u32,
    },

    /// Print rows of a PBF file as 0/1 text
    View {
        /// Input PBF file ("-" for stdin)
        input: PathBuf,

        /// First row to print (0-based)
        #[arg(short = 'i', long, default_value_t = 0)]
        start: u64,

        /// Maximum number of rows to print
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Comma-separated columns to decode [all]
        #[arg(short = 'c', long, value_delimiter = ',')]
        columns: Vec<u32>,

        /// Append the row's total count of 1 bits
        #[arg(long)]
        counts: bool,
    },

    /// Print header metadata of a PBF file
    Stat {
        /// Input PBF file
        input: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Encode {
                input,
                group_size,
                shift,
                ..
            } => {
                check_input(input)?;
                WriterConfig::new(*group_size, *shift).validate()
            }
            Command::View { input, count, .. } => {
                if *count == Some(0) {
                    return Err(PbfError::config("--count must be positive"));
                }
                check_input(input)
            }
            Command::Stat { input, .. } => check_input(input),
        }
    }

    /// Write parameters, for the `encode` subcommand
    pub fn writer_config(&self) -> Option<WriterConfig> {
        match &self.command {
            Command::Encode {
                group_size, shift, ..
            } => Some(WriterConfig::new(*group_size, *shift)),
            _ => None,
        }
    }
}

/// `-` means a standard stream
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn check_input(path: &Path) -> Result<()> {
    if !is_stdio(path) && !path.exists() {
        return Err(PbfError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
