use std::path::PathBuf;

use thiserror::Error;

/// Errors reading raw data. Numeric coercion failures are not errors.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("input has no header row")]
    Empty,
    #[error("line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
}
