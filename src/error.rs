//! Error types for mailmerge library.

use std::io;
use thiserror::Error;

/// Result type alias for mailmerge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while filling templates.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing or rewriting PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page index is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// A display-format specifier cannot be applied to a field's value.
    #[error("Cannot format field '{field}' with '{spec}': {reason}")]
    Formatting {
        field: String,
        spec: String,
        reason: String,
    },

    /// A display-format specifier is malformed.
    #[error("Invalid format specifier '{spec}': {reason}")]
    InvalidFormatSpec { spec: String, reason: String },

    /// A compound-field rule refers to a field the record does not have.
    #[error("Compound field '{target}' needs missing field '{source_field}'")]
    MissingCompoundSourceField {
        target: String,
        source_field: String,
    },

    /// A record field was requested but does not exist.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A font cannot be used for text insertion.
    #[error("Font unavailable: {0}")]
    FontUnavailable(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tabular data source cannot be read.
    #[error("Data source error: {0}")]
    DataSource(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::DataSource(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::DataSource(err.to_string())
    }
}
