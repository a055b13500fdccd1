//! # pbf: PBWT Haplotype Matrix Storage
//!
//! Developer front end over the `pbf` library.
//!
//! ## Usage
//! ```bash
//! # Text rows of 0/1 characters to PBF
//! pbf encode -i rows.txt -o panel.pbf
//!
//! # Columns 0 and 17 of rows 1000..1010, with per-row 1 counts
//! pbf view panel.pbf -i 1000 -n 10 -c 0,17 --counts
//!
//! # Metadata
//! pbf stat panel.pbf --json
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::info;

use pbf::config::{is_stdio, Command, Config};
use pbf::{ColIdx, PbfReader, PbfWriter, WriterConfig};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber for span timing output
fn init_profiling() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();
    let config = Config::parse_and_validate()?;

    if config.profile {
        init_profiling();
    }

    match &config.command {
        Command::Encode { input, output, .. } => {
            let writer_config = config.writer_config().unwrap_or_default();
            let n_rows = encode(input, output, &writer_config)?;
            info!(n_rows, "encoded");
        }
        Command::View {
            input,
            start: first,
            count,
            columns,
            counts,
        } => {
            let cols: Vec<ColIdx> = columns.iter().copied().map(ColIdx::from).collect();
            view(input, *first, *count, &cols, *counts)?;
        }
        Command::Stat { input, json } => stat(input, *json)?,
    }

    info!(elapsed_s = start.elapsed().as_secs_f64(), "done");
    Ok(())
}

fn open_input(path: &Path) -> Result<PbfReader> {
    let reader = if is_stdio(path) {
        PbfReader::from_reader(io::stdin().lock())
    } else {
        PbfReader::open(path)
    };
    reader.with_context(|| format!("failed to open {}", path.display()))
}

/// Parse one text row; `None` for blank lines
fn parse_text_row(line: &str, row: &mut Vec<u8>) -> Result<Option<()>> {
    row.clear();
    for ch in line.chars().filter(|c| !c.is_whitespace()) {
        match ch {
            '0' => row.push(0),
            '1' => row.push(1),
            other => bail!("unexpected character {:?}", other),
        }
    }
    Ok((!row.is_empty()).then_some(()))
}

fn encode(input: &Path, output: &Path, config: &WriterConfig) -> Result<u64> {
    let reader: Box<dyn BufRead> = if is_stdio(input) {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
        Box::new(BufReader::new(file))
    };
    let sink: Box<dyn Write> = if is_stdio(output) {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file =
            File::create(output).with_context(|| format!("failed to create {}", output.display()))?;
        Box::new(BufWriter::new(file))
    };

    let mut sink = Some(sink);
    let mut writer: Option<PbfWriter<Box<dyn Write>>> = None;
    let mut row = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if parse_text_row(&line, &mut row)
            .with_context(|| format!("line {}", line_no + 1))?
            .is_none()
        {
            continue;
        }
        if writer.is_none() {
            let out = sink.take().context("output already consumed")?;
            writer = Some(PbfWriter::new(out, row.len(), config)?);
        }
        if let Some(w) = writer.as_mut() {
            w.write_row(&row)
                .with_context(|| format!("line {}", line_no + 1))?;
        }
    }

    let Some(writer) = writer else {
        bail!("input has no rows; the column count cannot be determined");
    };
    let n_rows = writer.n_rows();
    writer.into_inner()?.flush()?;
    Ok(n_rows)
}

fn view(input: &Path, first: u64, count: Option<u64>, cols: &[ColIdx], counts: bool) -> Result<()> {
    let mut reader = open_input(input)?;
    if !cols.is_empty() {
        reader.declare_subset(cols)?;
    }
    reader.seek(first)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut line = String::new();
    let mut printed = 0u64;
    while count.map_or(true, |c| printed < c) {
        let Some(row) = reader.read_row()? else {
            break;
        };
        line.clear();
        line.extend(row.bits.iter().map(|&b| if b == 1 { '1' } else { '0' }));
        if counts {
            line.push('\t');
            line.push_str(&row.n_ones.to_string());
        }
        writeln!(out, "{}", line)?;
        printed += 1;
    }
    out.flush()?;
    Ok(())
}

fn stat(input: &Path, json: bool) -> Result<()> {
    let reader = open_input(input)?;
    let stats = reader.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("columns\t{}", stats.n_cols);
        println!("rows\t{}", stats.n_rows);
        println!("group_size\t{}", stats.group_size);
        println!("checkpoint_shift\t{}", stats.checkpoint_shift);
        println!("checkpoints\t{}", stats.n_checkpoints);
        println!("bytes\t{}", stats.file_bytes);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_row() {
        let mut row = Vec::new();
        assert_eq!(parse_text_row("0 1 1\t0", &mut row).unwrap(), Some(()));
        assert_eq!(row, vec![0, 1, 1, 0]);
        assert_eq!(parse_text_row("   ", &mut row).unwrap(), None);
        assert!(parse_text_row("01x", &mut row).is_err());
    }

    #[test]
    fn test_encode_then_view_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.txt");
        let output = dir.path().join("rows.pbf");
        std::fs::write(&input, "1010\n\n1100\n0000\n").unwrap();

        let n = encode(&input, &output, &WriterConfig::new(2, 1)).unwrap();
        assert_eq!(n, 3);

        let mut reader = PbfReader::open(&output).unwrap();
        assert_eq!(reader.n_cols(), 4);
        assert_eq!(reader.read_row().unwrap().unwrap().bits, &[1, 0, 1, 0]);
    }

    #[test]
    fn test_encode_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.txt");
        std::fs::write(&input, "101\n11\n").unwrap();
        let err = encode(&input, &dir.path().join("o.pbf"), &WriterConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
