//! Typed failures of the CSV loader.
//!
//! None of these are fatal for a report run: the caller logs them and the
//! affected section simply has no data.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {} with any of: {}", path.display(), tried.join(", "))]
    Decode { path: PathBuf, tried: Vec<String> },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;
