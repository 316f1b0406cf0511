//! Relationship (`.rels`) parts.

use crate::{PackageError, Result};
use docx_xml::{XmlDocument, XmlElement, XmlNode};

/// Relationship type URIs used by the template engine.
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const HEADER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
    pub const FOOTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// A single relationship entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"` (hyperlinks and linked media).
    pub external: bool,
}

impl Relationship {
    /// Compare relationship types by their final path segment.
    ///
    /// Transitional and Strict documents use different URI roots for the
    /// same relationship kinds, so only the trailing name is significant.
    pub fn has_type(&self, rel_type: &str) -> bool {
        last_segment(&self.rel_type) == last_segment(rel_type)
    }
}

fn last_segment(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// A parsed `.rels` part.
///
/// The underlying XML document is kept so that entries this crate does not
/// understand survive a round trip untouched.
#[derive(Debug, Clone)]
pub struct Relationships {
    doc: XmlDocument,
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new()
    }
}

impl Relationships {
    /// Create an empty relationships part.
    pub fn new() -> Self {
        let root = XmlElement::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS);
        Self {
            doc: XmlDocument::new(root),
        }
    }

    /// Parse a `.rels` part.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = docx_xml::parse_bytes(bytes)?;
        Ok(Self { doc })
    }

    /// Serialize back to part bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(docx_xml::to_bytes(&self.doc)?)
    }

    /// All relationships, in part order.
    pub fn entries(&self) -> Vec<Relationship> {
        self.doc
            .root
            .child_elements()
            .filter(|e| e.is("Relationship"))
            .map(|e| Relationship {
                id: e.attr("Id").unwrap_or_default().to_string(),
                rel_type: e.attr("Type").unwrap_or_default().to_string(),
                target: e.attr("Target").unwrap_or_default().to_string(),
                external: e.attr("TargetMode") == Some("External"),
            })
            .collect()
    }

    /// Relationships of the given type.
    pub fn by_type(&self, rel_type: &str) -> Vec<Relationship> {
        self.entries()
            .into_iter()
            .filter(|r| r.has_type(rel_type))
            .collect()
    }

    /// Look up a relationship by id.
    pub fn get(&self, id: &str) -> Option<Relationship> {
        self.entries().into_iter().find(|r| r.id == id)
    }

    /// Find an existing internal relationship with this type and target.
    pub fn find_target(&self, rel_type: &str, target: &str) -> Option<Relationship> {
        self.entries()
            .into_iter()
            .find(|r| !r.external && r.has_type(rel_type) && r.target == target)
    }

    /// Add a relationship and return its new id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        let element = XmlElement::new("Relationship")
            .with_attr("Id", id.as_str())
            .with_attr("Type", rel_type)
            .with_attr("Target", target);
        self.doc.root.children.push(XmlNode::Element(element));
        id
    }

    /// The smallest `rIdN` greater than every existing numeric id.
    fn next_id(&self) -> String {
        let max = self
            .entries()
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }
}

/// Name of the `.rels` part that holds relationships for `part`.
///
/// The package itself (`""`) uses `_rels/.rels`.
///
/// ```rust
/// use docx_package::rels_part_name;
///
/// assert_eq!(rels_part_name("word/document.xml"), "word/_rels/document.xml.rels");
/// assert_eq!(rels_part_name(""), "_rels/.rels");
/// ```
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
///
/// Targets are relative to the source part's directory unless they start
/// with `/`. `..` segments are collapsed.
pub fn resolve_target(source_part: &str, target: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    let relative = match target.strip_prefix('/') {
        Some(absolute) => absolute,
        None => {
            if let Some((dir, _)) = source_part.rsplit_once('/') {
                segments.extend(dir.split('/').filter(|s| !s.is_empty()));
            }
            target
        }
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PackageError::InvalidPartName {
                        name: target.to_string(),
                        message: format!("escapes the package root from '{}'", source_part),
                    });
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(PackageError::InvalidPartName {
            name: target.to_string(),
            message: "empty target".to_string(),
        });
    }
    Ok(segments.join("/"))
}
