/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template rendering.

use thiserror::Error;

/// Errors that abort a render.
///
/// Resolution misses, malformed tags and unreadable images are not errors:
/// they are reported as diagnostics and the render continues.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template package could not be read or written.
    #[error("Package error: {0}")]
    Package(#[from] docx_package::PackageError),

    /// A document part is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] docx_xml::Error),

    /// I/O error (e.g., reading the data file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data context could not be decoded.
    #[error("Invalid template data: {0}")]
    Data(#[from] serde_json::Error),

    /// A structural edit addressed a node that does not exist.
    #[error("Invalid edit at {path:?}: {message}")]
    InvalidEdit { path: Vec<usize>, message: String },

    /// Strict mode: at least one placeholder could not be resolved.
    #[error("{count} placeholder(s) could not be resolved (first: {first})")]
    Unresolved { count: usize, first: String },
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
