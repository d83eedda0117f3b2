//! Error taxonomy for the dataset gateway.
//!
//! Every failure is either the caller's fault (bad paging or search input) or a
//! server-side condition (the source could not be loaded, or the engine failed
//! while executing a query). Soft-correctable inputs such as an unknown sort
//! column never produce an error.

use polars::prelude::PolarsError;
use std::io;
use std::path::PathBuf;

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Whether an error should be reported as a client error or a server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Caller,
    Server,
}

impl ErrorClass {
    /// HTTP-style status code used by the serving boundary.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::Caller => 400,
            ErrorClass::Server => 500,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("CSV file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("could not read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("identity column '{column}' is not present in {}", path.display())]
    IdentityColumnMissing { column: String, path: PathBuf },

    #[error("{} has no columns", path.display())]
    EmptySchema { path: PathBuf },

    #[error("could not write {}: {source}", path.display())]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("offset must be >= 0")]
    InvalidOffset(i64),

    #[error("limit must be >= 1")]
    InvalidLimit(i64),

    #[error("page must be >= 1")]
    InvalidPage(i64),

    #[error("page_size cannot exceed {max}")]
    PageSizeTooLarge { requested: usize, max: usize },

    #[error("search text cannot exceed {max} characters")]
    SearchTooLong { max: usize },

    #[error("Search is not available because the CSV does not expose a 'question' column.")]
    SearchUnavailable,

    #[error(transparent)]
    Engine(#[from] PolarsError),

    #[error("could not encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::InvalidOffset(_)
            | GatewayError::InvalidLimit(_)
            | GatewayError::InvalidPage(_)
            | GatewayError::PageSizeTooLarge { .. }
            | GatewayError::SearchTooLong { .. }
            | GatewayError::SearchUnavailable => ErrorClass::Caller,
            GatewayError::SourceNotFound { .. }
            | GatewayError::SourceUnreadable { .. }
            | GatewayError::IdentityColumnMissing { .. }
            | GatewayError::EmptySchema { .. }
            | GatewayError::OutputUnwritable { .. }
            | GatewayError::Engine(_)
            | GatewayError::Encode(_) => ErrorClass::Server,
        }
    }

    pub fn is_caller_error(&self) -> bool {
        self.class() == ErrorClass::Caller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors() {
        assert!(GatewayError::InvalidOffset(-1).is_caller_error());
        assert!(GatewayError::InvalidLimit(0).is_caller_error());
        assert!(GatewayError::SearchUnavailable.is_caller_error());
        assert_eq!(
            GatewayError::PageSizeTooLarge {
                requested: 900,
                max: 500
            }
            .to_string(),
            "page_size cannot exceed 500"
        );
    }

    #[test]
    fn test_server_errors() {
        let err = GatewayError::SourceNotFound {
            path: PathBuf::from("/nope.csv"),
        };
        assert_eq!(err.class(), ErrorClass::Server);
        assert_eq!(err.class().status_code(), 500);

        let err = GatewayError::from(PolarsError::ComputeError("boom".into()));
        assert_eq!(err.class(), ErrorClass::Server);
        assert_eq!(ErrorClass::Caller.status_code(), 400);
    }
}
