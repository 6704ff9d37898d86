//! Error types for the registry module.

use thiserror::Error;

/// Errors raised while validating the input descriptor.
///
/// Row numbers are 1-based and count data rows only (the header is not a row).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },

    /// A key appears more than once.
    #[error("row {row}: duplicate key `{key}` (first seen at row {first_row})")]
    DuplicateKey {
        row: usize,
        key: String,
        first_row: usize,
    },

    /// A key that is not usable as a single directory name.
    #[error("row {row}: key `{key}` must be a single path segment")]
    InvalidKey { row: usize, key: String },

    /// The header does not declare a required column.
    #[error("descriptor header is missing required column `{column}`")]
    MissingColumn { column: &'static str },

    /// A row has a different number of cells than the header.
    #[error("row {row}: expected {expected} cells, found {found}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The descriptor has no header line.
    #[error("descriptor is empty")]
    EmptyDescriptor,
}

impl ValidationError {
    /// Row the error refers to, if it is row-specific.
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::MissingField { row, .. }
            | Self::DuplicateKey { row, .. }
            | Self::InvalidKey { row, .. }
            | Self::MalformedRow { row, .. } => Some(*row),
            Self::MissingColumn { .. } | Self::EmptyDescriptor => None,
        }
    }
}
