//! The dataset gateway: owner of the materialized table.
//!
//! The table and every fact derived from it live in one immutable
//! [`DatasetSnapshot`]. Readers clone the `Arc` under a short read lock and
//! then work on that snapshot alone, so a refresh can never show them a mix of
//! old rows and new schema. `refresh` builds the replacement outside the lock
//! and swaps the pointer in one step.

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::loader::load_deduplicated;
use crate::query::{execute, QuerySpec, RowPage};
use crate::schema::{ColumnDescriptor, SchemaFacts};

pub const DEFAULT_IDENTITY_COLUMN: &str = "question";
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 100_000;

/// Everything the gateway needs to (re)load its source. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub source_path: PathBuf,
    /// Column whose values identify a row; duplicates after the first are dropped.
    pub identity_column: String,
    pub delimiter: u8,
    /// Rows sampled when inferring column types
    pub infer_schema_length: usize,
}

impl GatewayConfig {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            identity_column: DEFAULT_IDENTITY_COLUMN.to_string(),
            delimiter: b',',
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }

    pub fn with_identity_column(mut self, column: impl Into<String>) -> Self {
        self.identity_column = column.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }
}

/// One fully-formed generation of the dataset.
pub struct DatasetSnapshot {
    pub frame: DataFrame,
    pub facts: SchemaFacts,
    /// Cached cardinality of `frame`
    pub row_count: usize,
    pub source_rows: usize,
    pub loaded_at: DateTime<Utc>,
}

impl DatasetSnapshot {
    fn load(config: &GatewayConfig) -> Result<Self> {
        let table = load_deduplicated(config)?;
        let facts = SchemaFacts::inspect(&table.frame).ok_or_else(|| GatewayError::EmptySchema {
            path: config.source_path.clone(),
        })?;
        Ok(Self {
            row_count: table.frame.height(),
            source_rows: table.source_rows,
            frame: table.frame,
            facts,
            loaded_at: Utc::now(),
        })
    }

    pub fn duplicates_removed(&self) -> usize {
        self.source_rows - self.row_count
    }
}

/// Schema and derived defaults, without row data.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetMetadata {
    pub row_count: usize,
    pub columns: Vec<ColumnDescriptor>,
    pub csv_path: String,
    pub default_sort: String,
    pub searchable_column: Option<String>,
    pub source_rows: usize,
    pub duplicates_removed: usize,
    pub loaded_at: DateTime<Utc>,
}

pub struct DatasetGateway {
    config: GatewayConfig,
    current: RwLock<Arc<DatasetSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl DatasetGateway {
    /// Load the source and build the first snapshot. Any load failure is fatal.
    pub fn open(config: GatewayConfig) -> Result<Self> {
        let snapshot = DatasetSnapshot::load(&config)?;
        info!(
            rows = snapshot.row_count,
            default_sort = %snapshot.facts.default_sort,
            searchable = ?snapshot.facts.searchable_column,
            "gateway ready"
        );
        Ok(Self {
            config,
            current: RwLock::new(Arc::new(snapshot)),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn source_path(&self) -> &Path {
        &self.config.source_path
    }

    /// The current generation. Holds the lock only long enough to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<DatasetSnapshot> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a complete snapshot.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn row_count(&self) -> usize {
        self.snapshot().row_count
    }

    pub fn get_metadata(&self) -> DatasetMetadata {
        let snapshot = self.snapshot();
        DatasetMetadata {
            row_count: snapshot.row_count,
            columns: snapshot.facts.columns.clone(),
            csv_path: self.config.source_path.display().to_string(),
            default_sort: snapshot.facts.default_sort.clone(),
            searchable_column: snapshot.facts.searchable_column.clone(),
            source_rows: snapshot.source_rows,
            duplicates_removed: snapshot.duplicates_removed(),
            loaded_at: snapshot.loaded_at,
        }
    }

    /// Filter, sort and window the current table.
    pub fn get_rows(&self, spec: &QuerySpec) -> Result<RowPage> {
        let snapshot = self.snapshot();
        execute(&snapshot, spec)
    }

    /// Reload the source and replace the snapshot. On failure the previous
    /// snapshot stays in place. Returns the new row count.
    pub fn refresh(&self) -> Result<usize> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let snapshot = match DatasetSnapshot::load(&self.config) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "refresh failed; keeping previous snapshot");
                return Err(e);
            }
        };
        let row_count = snapshot.row_count;

        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(snapshot);
        drop(current);

        info!(rows = row_count, "refreshed");
        Ok(row_count)
    }
}
