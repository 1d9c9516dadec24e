//! Error type shared by every dataset operation

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::Format;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("No such file: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Could not detect the file format: {}", path.display())]
    FormatUnknown { path: PathBuf },

    #[error("Invalid format for writing: {0}")]
    InvalidFormat(Format),

    #[error(
        "Inconsistent dataset dim. [{}].dim = {expected} v.s. [{}].dim = {found}",
        reference.display(),
        path.display()
    )]
    DimensionMismatch {
        reference: PathBuf,
        expected: usize,
        path: PathBuf,
        found: usize,
    },

    #[error("Record {record} has dimension {found}, expected {expected}")]
    InconsistentDimension {
        record: usize,
        expected: usize,
        found: usize,
    },

    #[error("Buffer too small: need {required} elements, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Value {value} does not fit in a {format} header field")]
    HeaderOverflow { value: usize, format: Format },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

impl DatasetError {
    /// Any failure to open the dataset path is reported as `FileNotFound`.
    pub(crate) fn from_open(err: io::Error, path: &Path) -> Self {
        tracing::debug!("open({}) failed: {}", path.display(), err);
        DatasetError::FileNotFound {
            path: path.to_path_buf(),
        }
    }
}
