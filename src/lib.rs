//! questview: a paginated, searchable read API over a de-duplicated CSV dataset.
//!
//! A [`DatasetGateway`] loads one CSV source, keeps the first row for every
//! value of its identity column, and answers windowed, sorted and filtered
//! row requests from an immutable in-memory snapshot that `refresh` replaces
//! wholesale.

pub mod config;
pub mod dedup;
pub mod error;
pub mod error_display;
pub mod gateway;
pub mod loader;
pub mod logging;
pub mod paging;
pub mod query;
pub mod schema;
pub mod serve;

pub use config::{AppConfig, ConfigManager, Settings};
pub use dedup::{dedup_file, DedupSummary};
pub use error::{ErrorClass, GatewayError, Result};
pub use gateway::{DatasetGateway, DatasetMetadata, DatasetSnapshot, GatewayConfig};
pub use paging::{PageLimits, PageRequest, PagedRows};
pub use query::{QuerySpec, Record, RowPage, SortDirection};
pub use schema::{ColumnDescriptor, ColumnType, SchemaFacts};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "questview";
