//! The `[Content_Types].xml` manifest.

use crate::Result;
use docx_xml::{XmlDocument, XmlElement, XmlNode};

/// Part name of the content types manifest.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Parsed content types manifest.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    doc: XmlDocument,
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypes {
    pub fn new() -> Self {
        let root = XmlElement::new("Types").with_attr("xmlns", CONTENT_TYPES_NS);
        Self {
            doc: XmlDocument::new(root),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            doc: docx_xml::parse_bytes(bytes)?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(docx_xml::to_bytes(&self.doc)?)
    }

    /// The `Default` content type registered for an extension.
    ///
    /// Extensions compare case-insensitively.
    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.doc
            .root
            .child_elements()
            .filter(|e| e.is("Default"))
            .find(|e| {
                e.attr("Extension")
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .and_then(|e| e.attr("ContentType"))
    }

    /// The `Override` content type for a part name (without leading `/`).
    pub fn override_for(&self, part_name: &str) -> Option<&str> {
        self.doc
            .root
            .child_elements()
            .filter(|e| e.is("Override"))
            .find(|e| {
                e.attr("PartName")
                    .is_some_and(|name| name.trim_start_matches('/') == part_name)
            })
            .and_then(|e| e.attr("ContentType"))
    }

    /// Resolve the content type of a part, preferring overrides.
    pub fn content_type_of(&self, part_name: &str) -> Option<&str> {
        self.override_for(part_name).or_else(|| {
            let (_, extension) = part_name.rsplit_once('.')?;
            self.default_for(extension)
        })
    }

    /// Register a `Default` entry unless the extension already has one.
    ///
    /// Returns `true` if the manifest changed.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) -> bool {
        if self.default_for(extension).is_some() {
            return false;
        }
        let entry = XmlElement::new("Default")
            .with_attr("Extension", extension.to_ascii_lowercase())
            .with_attr("ContentType", content_type);

        // Defaults conventionally precede overrides
        let index = self
            .doc
            .root
            .position_of_child("Override")
            .unwrap_or(self.doc.root.children.len());
        self.doc.root.children.insert(index, XmlNode::Element(entry));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

    #[test]
    fn test_lookup() {
        let types = ContentTypes::parse(MANIFEST.as_bytes()).unwrap();
        assert_eq!(types.default_for("XML"), Some("application/xml"));
        assert_eq!(
            types.content_type_of("word/document.xml"),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml")
        );
        assert_eq!(types.content_type_of("word/styles.xml"), Some("application/xml"));
        assert_eq!(types.content_type_of("word/media/a.png"), None);
    }

    #[test]
    fn test_ensure_default_inserts_before_overrides() {
        let mut types = ContentTypes::parse(MANIFEST.as_bytes()).unwrap();
        assert!(types.ensure_default("png", "image/png"));
        assert!(!types.ensure_default("PNG", "image/png"));

        let xml = String::from_utf8(types.to_bytes().unwrap()).unwrap();
        let png = xml.find("Extension=\"png\"").unwrap();
        let override_at = xml.find("<Override").unwrap();
        assert!(png < override_at);
        assert_eq!(types.content_type_of("word/media/image1.png"), Some("image/png"));
    }
}
