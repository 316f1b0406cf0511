//! Serialization of element trees back to XML text.

use crate::{Error, Result, XmlDocument, XmlElement, XmlNode};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

/// Serialize a document to a UTF-8 string.
pub fn to_string(doc: &XmlDocument) -> Result<String> {
    let bytes = to_bytes(doc)?;
    String::from_utf8(bytes).map_err(|err| Error::Write {
        message: err.to_string(),
    })
}

/// Serialize a document to bytes.
///
/// Text content only escapes `<`, `>` and `&`, matching what Word writes, so
/// untouched paragraphs serialize back to their original bytes.
///
/// The declaration is followed by `\r\n`, which is what Word itself writes.
pub fn to_bytes(doc: &XmlDocument) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    if let Some(decl) = &doc.declaration {
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )),
        )?;
        writer.get_mut().extend_from_slice(b"\r\n");
    }

    for node in &doc.prolog {
        write_node(&mut writer, node)?;
    }
    write_element(&mut writer, &doc.root)?;

    Ok(writer.into_inner())
}

/// Serialize a single element (and its subtree) without a declaration.
pub fn element_to_string(element: &XmlElement) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, element)?;
    String::from_utf8(writer.into_inner()).map_err(|err| Error::Write {
        message: err.to_string(),
    })
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(|err| Error::Write {
        message: err.to_string(),
    })
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let qname = element.qualified_name();
    let mut start = BytesStart::new(qname.as_str());
    for attr in &element.attributes {
        let key = match &attr.prefix {
            Some(prefix) => format!("{}:{}", prefix, attr.name),
            None => attr.name.clone(),
        };
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(qname.as_str())))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(e) => write_element(writer, e),
        XmlNode::Text(text) => write_event(
            writer,
            Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))),
        ),
        XmlNode::CData(text) => write_event(writer, Event::CData(BytesCData::new(text.as_str()))),
        XmlNode::Comment(text) => {
            write_event(writer, Event::Comment(BytesText::from_escaped(text.as_str())))
        }
        XmlNode::ProcessingInstruction(text) => {
            write_event(writer, Event::PI(BytesPI::new(text.as_str())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let source = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n",
            "<w:document xmlns:w=\"urn:w\"><w:body><w:p><w:r>",
            "<w:t xml:space=\"preserve\"> a &amp; b </w:t>",
            "</w:r></w:p><w:sectPr/></w:body></w:document>"
        );
        let doc = parse(source).unwrap();
        assert_eq!(to_string(&doc).unwrap(), source);
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        let element = XmlElement::new("w:t")
            .with_attr("w:val", "\"<x>\"")
            .with_text("1 < 2 & 3");
        let xml = element_to_string(&element).unwrap();
        assert!(xml.contains("1 &lt; 2 &amp; 3"));
        assert!(!xml.contains("\"<x>\""));

        let reparsed = parse(&xml).unwrap();
        assert_eq!(reparsed.root, element);
    }

    #[test]
    fn test_empty_elements_self_close() {
        let element = XmlElement::new("w:br");
        assert_eq!(element_to_string(&element).unwrap(), "<w:br/>");
    }

    #[test]
    fn test_comments_preserved() {
        let doc = parse("<a><!-- note --><b/></a>").unwrap();
        assert_eq!(to_string(&doc).unwrap(), "<a><!-- note --><b/></a>");
    }
}
