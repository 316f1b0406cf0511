/*
 * runs.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Building `w:r` runs and editing their properties.

use crate::context::SpecialChar;
use docx_xml::{XmlElement, XmlNode};

/// Child order of `w:rPr` required by the WordprocessingML schema.
const RPR_ORDER: &[&str] = &[
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
];

fn rpr_rank(element: &XmlElement) -> usize {
    let name = element.qualified_name();
    RPR_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(RPR_ORDER.len())
}

/// Set a run property, replacing an existing property of the same name and
/// otherwise inserting it at its schema position.
pub fn set_run_property(rpr: &mut XmlElement, property: XmlElement) {
    if let Some(existing) = rpr
        .child_elements_mut()
        .find(|e| e.name == property.name && e.prefix == property.prefix)
    {
        *existing = property;
        return;
    }
    let rank = rpr_rank(&property);
    let index = rpr
        .children
        .iter()
        .position(|n| n.as_element().is_some_and(|e| rpr_rank(e) > rank))
        .unwrap_or(rpr.children.len());
    rpr.children.insert(index, XmlNode::Element(property));
}

/// The run's `w:rPr`, if any.
pub fn run_properties(run: &XmlElement) -> Option<&XmlElement> {
    run.find_child("w:rPr")
}

/// A `w:t` element that keeps leading and trailing spaces.
pub fn text_element(text: &str) -> XmlElement {
    XmlElement::new("w:t")
        .with_attr("xml:space", "preserve")
        .with_text(text)
}

/// Set the text of a `w:t`, keeping its whitespace significant.
pub fn set_text_preserving(t: &mut XmlElement, text: &str) {
    t.set_text(text);
    t.set_attr("xml:space", "preserve");
}

/// A new run with an optional base `w:rPr`.
pub fn empty_run(base: Option<&XmlElement>) -> XmlElement {
    let mut run = XmlElement::new("w:r");
    if let Some(rpr) = base {
        run.children.push(XmlNode::Element(rpr.clone()));
    }
    run
}

/// A run holding `text`, with `\n` turned into `w:br` line breaks.
pub fn text_run(text: &str, base: Option<&XmlElement>) -> XmlElement {
    let mut run = empty_run(base);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.children.push(XmlNode::Element(XmlElement::new("w:br")));
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.is_empty() {
            run.children.push(XmlNode::Element(text_element(line)));
        }
    }
    run
}

/// A run that only holds a line break.
pub fn break_run(base: Option<&XmlElement>) -> XmlElement {
    empty_run(base).with_child(XmlElement::new("w:br"))
}

/// A run showing `special.character` in `special.font`.
pub fn special_char_run(special: &SpecialChar, base: Option<&XmlElement>) -> XmlElement {
    let mut rpr = base.cloned().unwrap_or_else(|| XmlElement::new("w:rPr"));
    let font = special.font.as_str();
    set_run_property(
        &mut rpr,
        XmlElement::new("w:rFonts")
            .with_attr("w:ascii", font)
            .with_attr("w:hAnsi", font)
            .with_attr("w:cs", font)
            .with_attr("w:hint", "default"),
    );
    let mut text = [0u8; 4];
    XmlElement::new("w:r")
        .with_child(rpr)
        .with_child(text_element(special.character.encode_utf8(&mut text)))
}

/// Whether `text` contains Hebrew or Arabic script.
pub fn contains_rtl(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0590}'..='\u{05FF}'
            | '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB1D}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
    })
}

/// Whether a run carries anything besides its properties and empty text.
pub fn has_content(run: &XmlElement) -> bool {
    run.child_elements().any(|e| {
        if e.is("w:rPr") {
            false
        } else if e.is("w:t") {
            !e.text_content().is_empty()
        } else {
            true
        }
    })
}
