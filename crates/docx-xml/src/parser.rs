//! XML parser that builds mutable element trees.

use crate::types::split_qname;
use crate::{Error, Result, XmlAttribute, XmlDeclaration, XmlDocument, XmlElement, XmlNode};
use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesStart, Event};

/// Parse XML from a string.
///
/// Unlike a data-oriented parser, every text node is kept verbatim,
/// including whitespace-only text: Word treats `<w:t xml:space="preserve"> </w:t>`
/// as meaningful content.
///
/// # Example
///
/// ```rust
/// use docx_xml::parse;
///
/// let doc = parse("<root><child/></root>").unwrap();
/// assert_eq!(doc.root.name, "root");
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed.
pub fn parse(content: &str) -> Result<XmlDocument> {
    let mut parser = XmlParser::new(content);
    parser.parse()
}

/// Parse XML from raw part bytes.
///
/// A leading UTF-8 byte order mark is skipped.
pub fn parse_bytes(bytes: &[u8]) -> Result<XmlDocument> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let content = std::str::from_utf8(bytes).map_err(|err| Error::InvalidUtf8 {
        message: err.to_string(),
    })?;
    parse(content)
}

/// Parse a sequence of sibling elements that do not share a root.
///
/// Top-level text between the elements is discarded.
///
/// ```rust
/// use docx_xml::parse_fragment;
///
/// let runs = parse_fragment("<w:r><w:t>a</w:t></w:r><w:r><w:br/></w:r>").unwrap();
/// assert_eq!(runs.len(), 2);
/// assert!(runs[1].find_child("w:br").is_some());
/// ```
pub fn parse_fragment(content: &str) -> Result<Vec<XmlElement>> {
    let wrapped = format!("<fragment>{}</fragment>", content);
    let doc = parse(&wrapped)?;
    Ok(doc
        .root
        .children
        .into_iter()
        .filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
        .collect())
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// Stack of elements being built.
    stack: Vec<XmlElement>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            stack: Vec::new(),
        }
    }

    fn parse(&mut self) -> Result<XmlDocument> {
        let mut root: Option<XmlElement> = None;
        let mut declaration = None;
        let mut prolog = Vec::new();

        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.start_element(&e)?;
                    self.stack.push(element);
                }
                Ok(Event::End(e)) => {
                    let end_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    let element = self.stack.pop().ok_or_else(|| Error::InvalidStructure {
                        message: format!("Unexpected closing tag </{}>", end_name),
                    })?;

                    // Verify tag names match
                    if element.qualified_name() != end_name {
                        return Err(Error::MismatchedEndTag {
                            expected: element.qualified_name(),
                            found: end_name,
                        });
                    }

                    self.attach(element, &mut root)?;
                }
                Ok(Event::Empty(e)) => {
                    let element = self.start_element(&e)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Text(e)) => {
                    let position = self.reader.buffer_position();
                    let text = e.unescape().map_err(|err| Error::XmlSyntax {
                        message: format!("Invalid text content: {}", err),
                        position: Some(position),
                    })?;
                    // Text outside the root element is insignificant
                    if let Some(parent) = self.stack.last_mut() {
                        push_text(parent, text.into_owned());
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    if let Some(parent) = self.stack.last_mut() {
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Ok(Event::Comment(e)) => {
                    let node = XmlNode::Comment(String::from_utf8_lossy(e.as_ref()).to_string());
                    self.push_misc(node, &root, &mut prolog);
                }
                Ok(Event::PI(e)) => {
                    let node = XmlNode::ProcessingInstruction(
                        String::from_utf8_lossy(e.as_ref()).to_string(),
                    );
                    self.push_misc(node, &root, &mut prolog);
                }
                Ok(Event::Decl(e)) => {
                    declaration = Some(read_declaration(&e)?);
                }
                Ok(Event::DocType(_)) => {
                    // Office parts never carry a DOCTYPE
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        // Check for unclosed elements
        if let Some(node) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", node.qualified_name()),
            });
        }

        let root = root.ok_or(Error::EmptyDocument)?;
        Ok(XmlDocument {
            declaration,
            prolog,
            root,
        })
    }

    /// Attach a finished element to its parent, or make it the root.
    fn attach(&mut self, element: XmlElement, root: &mut Option<XmlElement>) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(XmlNode::Element(element));
                Ok(())
            }
            None if root.is_some() => Err(Error::MultipleRoots {
                name: element.qualified_name(),
            }),
            None => {
                *root = Some(element);
                Ok(())
            }
        }
    }

    /// Comments and PIs go to the open element, or to the prolog before the root.
    fn push_misc(&mut self, node: XmlNode, root: &Option<XmlElement>, prolog: &mut Vec<XmlNode>) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        } else if root.is_none() {
            prolog.push(node);
        }
    }

    fn start_element(&self, e: &BytesStart<'_>) -> Result<XmlElement> {
        let full_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut element = XmlElement::new(&full_name);

        for attr_result in e.attributes() {
            let attr = attr_result?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let (prefix, name) = split_qname(&key);

            let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
                message: format!("Invalid attribute value: {}", err),
                position: Some(self.reader.buffer_position()),
            })?;

            element.attributes.push(XmlAttribute {
                name: name.to_string(),
                prefix: prefix.map(str::to_string),
                value: value.into_owned(),
            });
        }

        Ok(element)
    }
}

/// Append text, merging with a preceding text node.
///
/// quick-xml may report one logical text run as several events when it
/// contains entity references; merging keeps one node per run of text.
fn push_text(parent: &mut XmlElement, text: String) {
    if let Some(XmlNode::Text(previous)) = parent.children.last_mut() {
        previous.push_str(&text);
    } else {
        parent.children.push(XmlNode::Text(text));
    }
}

fn read_declaration(e: &BytesDecl<'_>) -> Result<XmlDeclaration> {
    let version = String::from_utf8_lossy(&e.version()?).to_string();
    let encoding = match e.encoding() {
        Some(encoding) => Some(String::from_utf8_lossy(&encoding?).to_string()),
        None => None,
    };
    let standalone = match e.standalone() {
        Some(standalone) => Some(String::from_utf8_lossy(&standalone?).to_string()),
        None => None,
    };
    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}
