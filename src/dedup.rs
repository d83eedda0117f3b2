//! Offline de-duplication: rewrite a CSV file keeping the first row per identity value.

use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::gateway::GatewayConfig;
use crate::loader::{load_deduplicated, CompressionFormat};

/// Row counts reported after a de-duplication run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    pub initial_rows: usize,
    pub final_rows: usize,
    pub removed: usize,
}

/// Read `config.source_path`, drop rows repeating an identity value, and write
/// the result to `output`. The output is compressed when its extension names a
/// compression format.
pub fn dedup_file(config: &GatewayConfig, output: &Path) -> Result<DedupSummary> {
    let table = load_deduplicated(config)?;
    let summary = DedupSummary {
        initial_rows: table.source_rows,
        final_rows: table.frame.height(),
        removed: table.duplicates_removed(),
    };

    let mut frame = table.frame;
    write_csv(&mut frame, output, config.delimiter)?;

    info!(
        input = %config.source_path.display(),
        output = %output.display(),
        initial_rows = summary.initial_rows,
        final_rows = summary.final_rows,
        "wrote de-duplicated file"
    );
    Ok(summary)
}

fn write_csv(df: &mut DataFrame, path: &Path, delimiter: u8) -> Result<()> {
    let unwritable = |source: std::io::Error| GatewayError::OutputUnwritable {
        path: PathBuf::from(path),
        source,
    };

    let file = File::create(path).map_err(unwritable)?;
    let mut writer: Box<dyn Write> = match CompressionFormat::from_extension(path) {
        Some(CompressionFormat::Gzip) => Box::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        )),
        Some(CompressionFormat::Zstd) => {
            Box::new(zstd::Encoder::new(file, 0).map_err(unwritable)?.auto_finish())
        }
        Some(CompressionFormat::Bzip2) => Box::new(bzip2::write::BzEncoder::new(
            file,
            bzip2::Compression::default(),
        )),
        Some(CompressionFormat::Xz) => Box::new(xz2::write::XzEncoder::new(file, 6)),
        None => Box::new(BufWriter::new(file)),
    };

    CsvWriter::new(&mut writer)
        .with_separator(delimiter)
        .include_header(true)
        .finish(df)?;
    writer.flush().map_err(unwritable)?;
    Ok(())
}
