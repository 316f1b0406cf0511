//! Open Packaging Convention I/O for `.docx` templates.
//!
//! A `.docx` file is a zip archive of XML parts tied together by relationship
//! (`.rels`) parts and a `[Content_Types].xml` manifest. This crate reads the
//! archive into memory, lets callers replace part contents, add image media,
//! and writes the archive back out with entry order and compression preserved.
//!
//! # Example
//!
//! ```ignore
//! use docx_package::Package;
//!
//! let mut package = Package::from_bytes(&std::fs::read("template.docx")?)?;
//! let main = package.main_document_part()?;
//! let headers = package.related_parts(&main, docx_package::rel_types::HEADER)?;
//! let image = package.add_image_part(&main, png_bytes, "png", "image/png")?;
//! std::fs::write("out.docx", package.to_bytes()?)?;
//! ```

pub mod content_types;
pub mod error;
pub mod package;
pub mod relationships;

pub use content_types::ContentTypes;
pub use error::{PackageError, Result};
pub use package::{Package, PartRef};
pub use relationships::{Relationship, Relationships, rel_types, rels_part_name};
