// cm_error.rs - collision model errors

use std::path::PathBuf;

use quetoo_common::qfiles::BspFileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmError {
    #[error("couldn't load {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    BspFile(#[from] BspFileError),

    #[error("map has too many {what} ({count} > {max})")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        max: usize,
    },

    #[error("bad {what} index {index} (of {len})")]
    BadIndex {
        what: &'static str,
        index: i64,
        len: usize,
    },

    #[error("bad inline model name {0:?}")]
    BadModelName(String),

    #[error("entity string: {0}")]
    Entities(String),

    #[error("brush {0} has no volume")]
    DegenerateBrush(usize),
}

pub type Result<T> = std::result::Result<T, CmError>;
