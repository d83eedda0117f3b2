//! Source loading and first-occurrence de-duplication.

use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::gateway::GatewayConfig;

/// Compression format of a source file, detected from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Zstd,
    Bzip2,
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }
}

/// A freshly loaded, de-duplicated table.
pub struct LoadedTable {
    pub frame: DataFrame,
    /// Row count before de-duplication
    pub source_rows: usize,
}

impl LoadedTable {
    pub fn duplicates_removed(&self) -> usize {
        self.source_rows - self.frame.height()
    }
}

/// Read the configured source and keep the first row for every identity value.
pub fn load_deduplicated(config: &GatewayConfig) -> Result<LoadedTable> {
    let raw = read_source(config)?;
    let source_rows = raw.height();
    let frame = dedup_first(&raw, &config.identity_column, &config.source_path)?;
    info!(
        path = %config.source_path.display(),
        source_rows,
        rows = frame.height(),
        "loaded source"
    );
    Ok(LoadedTable { frame, source_rows })
}

/// Parse the source file in file order. Fails when the file is missing,
/// unreadable, or has no columns.
pub fn read_source(config: &GatewayConfig) -> Result<DataFrame> {
    let path = config.source_path.as_path();
    let file = open_source(path)?;
    let read_options = csv_read_options(config);

    let df = match CompressionFormat::from_extension(path) {
        Some(compression) => {
            debug!(?compression, "decompressing source into memory");
            let bytes = decompress(file, compression).map_err(|source| {
                GatewayError::SourceUnreadable {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            CsvReader::new(Cursor::new(bytes))
                .with_options(read_options)
                .finish()
        }
        None => CsvReader::new(file).with_options(read_options).finish(),
    }
    .map_err(|e| match e {
        PolarsError::NoData(_) => GatewayError::EmptySchema {
            path: path.to_path_buf(),
        },
        other => GatewayError::Engine(other),
    })?;

    if df.width() == 0 {
        return Err(GatewayError::EmptySchema {
            path: path.to_path_buf(),
        });
    }
    Ok(df)
}

fn open_source(path: &Path) -> Result<File> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => GatewayError::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => GatewayError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let is_dir = file
        .metadata()
        .map(|m| m.is_dir())
        .map_err(|source| GatewayError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    if is_dir {
        return Err(GatewayError::SourceUnreadable {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path is a directory"),
        });
    }
    Ok(file)
}

fn csv_read_options(config: &GatewayConfig) -> CsvReadOptions {
    let mut read_options = CsvReadOptions::default();
    read_options.has_header = true;
    read_options.infer_schema_length = Some(config.infer_schema_length);
    let delimiter = config.delimiter;
    read_options.map_parse_options(|opts| opts.with_separator(delimiter).with_try_parse_dates(true))
}

fn decompress(file: File, compression: CompressionFormat) -> io::Result<Vec<u8>> {
    let mut reader: Box<dyn Read> = match compression {
        CompressionFormat::Gzip => Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file))),
        CompressionFormat::Zstd => Box::new(zstd::Decoder::new(BufReader::new(file))?),
        CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(BufReader::new(file))),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(BufReader::new(file))),
    };
    let mut decompressed = Vec::new();
    reader.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Header name matching `column`: an exact match first, else the first
/// case-insensitive one.
pub fn resolve_column<'a>(df: &'a DataFrame, column: &str) -> Option<&'a str> {
    let names = df.get_column_names();
    let exact = names.iter().copied().find(|name| name.as_str() == column);
    exact
        .or_else(|| {
            names
                .iter()
                .copied()
                .find(|name| name.as_str().eq_ignore_ascii_case(column))
        })
        .map(|name| name.as_str())
}

/// Keep the first row (in frame order) for every distinct value of `column`.
///
/// The column name is matched case-insensitively when no header matches it
/// exactly. Values are compared by their exact text form; nulls form a single
/// group.
pub fn dedup_first(df: &DataFrame, column: &str, path: &Path) -> Result<DataFrame> {
    let name = resolve_column(df, column).ok_or_else(|| GatewayError::IdentityColumnMissing {
        column: column.to_string(),
        path: path.to_path_buf(),
    })?;
    let keys = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let keys = keys.str()?;

    let mut seen: HashSet<Option<&str>> = HashSet::with_capacity(keys.len());
    let mask: BooleanChunked = keys.into_iter().map(|key| seen.insert(key)).collect();
    let deduped = df.filter(&mask)?;

    debug!(
        column = name,
        before = df.height(),
        after = deduped.height(),
        "de-duplicated"
    );
    Ok(deduped)
}
