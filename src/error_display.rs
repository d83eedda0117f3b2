//! User-facing error message formatting.
//!
//! Uses typed error matching (GatewayError, PolarsError variants, io::ErrorKind)
//! rather than string parsing to produce short, actionable messages.

use polars::prelude::PolarsError;
use std::io;

use crate::error::GatewayError;

/// Format a GatewayError for a caller. Caller errors already read as plain
/// sentences; load and engine failures are rephrased.
pub fn user_message_from_gateway(err: &GatewayError) -> String {
    match err {
        GatewayError::SourceNotFound { path } => format!(
            "CSV file not found: {}. Set the CSV_PATH environment variable to a valid file.",
            path.display()
        ),
        GatewayError::SourceUnreadable { path, source } => format!(
            "Failed to read {}: {}",
            path.display(),
            user_message_from_io(source, None)
        ),
        GatewayError::Engine(pe) => user_message_from_polars(pe),
        other => other.to_string(),
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("Column not found: {}", msg),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => format!("Could not evaluate query: {}", first_line(msg)),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData => "Invalid or corrupted data.".to_string(),
        ErrorKind::InvalidInput => {
            let msg = err.to_string();
            if msg.contains("directory") {
                "Path is a directory, not a file.".to_string()
            } else {
                "Invalid or corrupted data.".to_string()
            }
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::Interrupted => "Operation interrupted.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find a GatewayError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report) -> String {
    for cause in report.chain() {
        if let Some(ge) = cause.downcast_ref::<GatewayError>() {
            return user_message_from_gateway(ge);
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return user_message_from_polars(pe);
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return user_message_from_io(io_err, None);
        }
    }

    // Fallback: first line of the display, to avoid long tracebacks
    first_line(&report.to_string()).to_string()
}

fn first_line(msg: &str) -> &str {
    msg.lines().next().map(str::trim).unwrap_or("An error occurred")
}
