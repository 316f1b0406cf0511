//! Error types for package I/O.

use thiserror::Error;

/// Result type alias for docx-package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Errors that can occur while reading or writing a package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The archive could not be read or written.
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error while streaming archive entries.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A part's XML could not be parsed or written.
    #[error("XML error in package part: {0}")]
    Xml(#[from] docx_xml::Error),

    /// A part the caller required is not in the archive.
    #[error("Package part not found: {name}")]
    MissingPart { name: String },

    /// A relationship target could not be turned into a part name.
    #[error("Invalid part name '{name}': {message}")]
    InvalidPartName { name: String, message: String },
}
