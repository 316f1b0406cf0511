//! Mutable XML trees for WordprocessingML parts.
//!
//! This crate wraps [`quick-xml`] to provide an owned tree of [`XmlElement`]s
//! that can be read, edited in place, and written back out. It is the document
//! model the template engine mutates: paragraphs, runs and text fragments are
//! all plain elements addressed by child-index paths.
//!
//! # Overview
//!
//! The main types are:
//! - [`XmlDocument`]: A parsed part (declaration, prolog and root element)
//! - [`XmlElement`]: An element with prefix, local name, attributes and children
//! - [`XmlAttribute`]: A single attribute
//! - [`XmlNode`]: One child of an element (element, text, CDATA, comment, PI)
//!
//! # Example
//!
//! ```rust
//! use docx_xml::{parse, to_string};
//!
//! let mut doc = parse(r#"<w:p xmlns:w="urn:w"><w:r><w:t>Hi</w:t></w:r></w:p>"#).unwrap();
//! assert!(doc.root.is("w:p"));
//!
//! let text = doc.root.element_at_mut(&[0, 0]).unwrap();
//! text.set_text("Hello");
//!
//! assert!(to_string(&doc).unwrap().contains("<w:t>Hello</w:t>"));
//! ```
//!
//! # Paths
//!
//! A path is a slice of indices into successive `children` vectors (text nodes
//! included). Paths are only valid until the tree above them is edited, so
//! callers that mutate several places apply edits from the last path to the first.

pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

// Re-export main types
pub use error::{Error, Result};
pub use parser::{parse, parse_bytes, parse_fragment};
pub use types::{XmlAttribute, XmlDeclaration, XmlDocument, XmlElement, XmlNode};
pub use writer::{element_to_string, to_bytes, to_string};
