/*
 * text.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Reassembling paragraph text across runs and editing it by span.
//!
//! Word splits text into runs wherever formatting, spell-check state or
//! revision ids change, so `{{Name}}` is often stored as `{{`, `Na`, `me}}`
//! in three separate `w:t` elements. [`ParagraphText`] concatenates the
//! paragraph's `w:t` fragments once, recording where each fragment lands in
//! the combined text. Token spans found in the combined text are then mapped
//! back to fragments to excise exactly the matched characters.

use crate::runs::{has_content, set_text_preserving};
use crate::token::TextSpan;
use docx_xml::{XmlElement, XmlNode};

/// Elements whose text does not belong to the enclosing paragraph.
///
/// Text boxes and embedded objects hold their own paragraphs, which are
/// scanned as separate units.
const OPAQUE: &[&str] = &[
    "w:p",
    "w:drawing",
    "w:pict",
    "w:object",
    "w:txbxContent",
    "mc:AlternateContent",
];

/// One `w:t` element and its place in the combined text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    /// Path from the paragraph to the `w:t` element.
    pub path: Vec<usize>,
    /// Byte offset of the fragment's first character in the combined text.
    pub start: usize,
    /// Byte offset one past the fragment's last character.
    pub end: usize,
}

/// Combined text of a paragraph with its offset-to-fragment index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParagraphText {
    pub text: String,
    pub fragments: Vec<TextFragment>,
}

impl ParagraphText {
    /// Index the `w:t` descendants of a paragraph in document order.
    pub fn build(paragraph: &XmlElement) -> Self {
        let mut index = ParagraphText::default();
        let mut path = Vec::new();
        index.collect(paragraph, &mut path);
        index
    }

    fn collect(&mut self, element: &XmlElement, path: &mut Vec<usize>) {
        for (i, child) in element.children.iter().enumerate() {
            let XmlNode::Element(child) = child else {
                continue;
            };
            path.push(i);
            if child.is("w:t") {
                let text = child.text_content();
                let start = self.text.len();
                self.text.push_str(&text);
                self.fragments.push(TextFragment {
                    path: path.clone(),
                    start,
                    end: self.text.len(),
                });
            } else if !OPAQUE.iter().any(|name| child.is(name)) {
                self.collect(child, path);
            }
            path.pop();
        }
    }

    /// The fragment holding the character at `offset`, with the offset
    /// relative to that fragment.
    fn locate_start(&self, offset: usize) -> Option<(usize, usize)> {
        self.fragments
            .iter()
            .position(|f| f.start <= offset && offset < f.end)
            .map(|i| (i, offset - self.fragments[i].start))
    }

    /// Whether `span` maps onto the fragments, so it can be edited.
    pub fn maps_span(&self, span: TextSpan) -> bool {
        match (self.locate_start(span.start), self.locate_end(span.end)) {
            (Some((first, _)), Some((last, _))) => first <= last,
            _ => false,
        }
    }

    /// Path of the element holding the run where `span` starts. Empty when
    /// the run is a direct child of the paragraph.
    pub fn run_parent(&self, span: TextSpan) -> Option<&[usize]> {
        let (first, _) = self.locate_start(span.start)?;
        let (_, run_path) = self.fragments[first].path.split_last()?;
        let (_, parent) = run_path.split_last()?;
        Some(parent)
    }

    /// The fragment holding the character just before `offset`.
    fn locate_end(&self, offset: usize) -> Option<(usize, usize)> {
        self.fragments
            .iter()
            .position(|f| f.start < offset && offset <= f.end)
            .map(|i| (i, offset - self.fragments[i].start))
    }
}

/// Where runs were inserted by [`insert_runs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInsertion {
    /// Path (from the paragraph) of the element holding the new runs.
    /// Empty when the runs are direct children of the paragraph.
    pub parent: Vec<usize>,
    /// Index of the first inserted run in `parent`'s children.
    pub first: usize,
    /// Number of runs inserted.
    pub count: usize,
}

/// Replace the text under `span` with `replacement`.
///
/// The replacement lands in the fragment where the span starts; the
/// remaining fragments covered by the span are trimmed or emptied. Runs
/// themselves are left in place so their formatting is untouched.
///
/// Returns `false` if the span does not map onto the index.
pub fn replace_span(
    paragraph: &mut XmlElement,
    index: &ParagraphText,
    span: TextSpan,
    replacement: &str,
) -> bool {
    let (Some((first, start_offset)), Some((last, end_offset))) =
        (index.locate_start(span.start), index.locate_end(span.end))
    else {
        return false;
    };
    if last < first {
        return false;
    }

    // Trailing fragments first; only text changes, so paths stay valid.
    for i in (first..=last).rev() {
        let fragment = &index.fragments[i];
        let Some(t) = paragraph.element_at_mut(&fragment.path) else {
            return false;
        };
        let current = t.text_content();
        let updated = if i == first && i == last {
            splice(&current, start_offset, end_offset, replacement)
        } else if i == first {
            splice(&current, start_offset, current.len(), replacement)
        } else if i == last {
            splice(&current, 0, end_offset, "")
        } else {
            String::new()
        };
        set_text_preserving(t, &updated);
    }
    true
}

fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let start = start.min(text.len());
    let end = end.clamp(start, text.len());
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}

/// Replace the text under `span` with whole runs.
///
/// The run containing the span start is split in two around the span: the
/// left half keeps the text before the token, the right half (dropped if
/// empty) keeps the text after it, and `runs` go in between. The base
/// formatting of the split run is available through [`base_properties`]
/// before calling this.
pub fn insert_runs(
    paragraph: &mut XmlElement,
    index: &ParagraphText,
    span: TextSpan,
    runs: Vec<XmlElement>,
) -> Option<RunInsertion> {
    let (first, offset) = index.locate_start(span.start)?;
    if !replace_span(paragraph, index, span, "") {
        return None;
    }

    let t_path = &index.fragments[first].path;
    let (t_index, run_path) = t_path.split_last()?;
    let (run_index, parent_path) = run_path.split_last()?;
    let parent = paragraph.element_at_mut(parent_path)?;

    let XmlNode::Element(run) = parent.children.get(*run_index)? else {
        return None;
    };
    let (left, right) = split_run(run, *t_index, offset);

    let count = runs.len();
    let mut replacement = Vec::with_capacity(count + 2);
    replacement.push(XmlNode::Element(left));
    replacement.extend(runs.into_iter().map(XmlNode::Element));
    if has_content(&right) {
        replacement.push(XmlNode::Element(right));
    }
    parent
        .children
        .splice(*run_index..*run_index + 1, replacement);

    Some(RunInsertion {
        parent: parent_path.to_vec(),
        first: run_index + 1,
        count,
    })
}

/// Split a run before byte `offset` of its child `w:t` at `t_index`.
///
/// The left run keeps the original position of every child before the
/// split, so paths to earlier fragments in the same run stay valid.
fn split_run(run: &XmlElement, t_index: usize, offset: usize) -> (XmlElement, XmlElement) {
    let text = run
        .children
        .get(t_index)
        .and_then(XmlNode::as_element)
        .map(XmlElement::text_content)
        .unwrap_or_default();
    let offset = offset.min(text.len());

    let mut left = XmlElement {
        children: run.children[..t_index].to_vec(),
        ..run.clone_shallow()
    };
    let mut before = XmlElement::new("w:t");
    set_text_preserving(&mut before, &text[..offset]);
    left.children.push(XmlNode::Element(before));

    let mut right = run.clone_shallow();
    if let Some(rpr) = run.find_child("w:rPr") {
        right.children.push(XmlNode::Element(rpr.clone()));
    }
    if offset < text.len() {
        let mut after = XmlElement::new("w:t");
        set_text_preserving(&mut after, &text[offset..]);
        right.children.push(XmlNode::Element(after));
    }
    right
        .children
        .extend(run.children.iter().skip(t_index + 1).cloned());

    (left, right)
}

/// The `w:rPr` of the run where `span` starts, for styling inserted runs.
pub fn base_properties(
    paragraph: &XmlElement,
    index: &ParagraphText,
    span: TextSpan,
) -> Option<XmlElement> {
    let (first, _) = index.locate_start(span.start)?;
    let (_, run_path) = index.fragments[first].path.split_last()?;
    paragraph
        .element_at(run_path)?
        .find_child("w:rPr")
        .cloned()
}

/// Plain text of a paragraph, as the scanner sees it.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    ParagraphText::build(paragraph).text
}

// =============================================================================
// Inert values
// =============================================================================

/// Stands in for `{` in inserted values until the passes are done.
///
/// A noncharacter, so it never occurs in document text and the scanner
/// cannot match a token across it.
pub const INERT_BRACE: char = '\u{FDD0}';

/// A value as inserted into the document: its braces cannot open tokens.
pub fn inert(value: &str) -> String {
    value.replace('{', &INERT_BRACE.to_string())
}

/// Turn the braces of every inserted value back into `{`.
///
/// Returns the number of `w:t` elements changed.
pub fn restore_braces(root: &mut XmlElement) -> usize {
    let mut restored = 0;
    for path in root.find_paths(&|e| e.is("w:t"), false) {
        let Some(t) = root.element_at_mut(&path) else {
            continue;
        };
        let text = t.text_content();
        if text.contains(INERT_BRACE) {
            set_text_preserving(t, &text.replace(INERT_BRACE, "{"));
            restored += 1;
        }
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemplateContext;
    use crate::runs::text_run;
    use crate::scanner::scan_text;
    use docx_xml::parse;
    use pretty_assertions::assert_eq;

    fn fragmented() -> XmlElement {
        parse(concat!(
            "<w:p><w:pPr/>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>Dear {{Na</w:t></w:r>",
            "<w:r><w:t>m</w:t></w:r>",
            "<w:r><w:rPr><w:i/></w:rPr><w:t>e}}, hi</w:t></w:r>",
            "</w:p>"
        ))
        .unwrap()
        .root
    }

    #[test]
    fn test_build_index() {
        let p = fragmented();
        let index = ParagraphText::build(&p);
        assert_eq!(index.text, "Dear {{Name}}, hi");
        assert_eq!(index.fragments.len(), 3);
        assert_eq!(index.fragments[0].path, vec![1, 1]);
        assert_eq!(index.fragments[1].start, 9);
        assert_eq!(index.fragments[2].end, index.text.len());
    }

    #[test]
    fn test_index_skips_drawings_and_textboxes() {
        let p = parse(concat!(
            "<w:p><w:r><w:t>a</w:t></w:r>",
            "<w:r><w:drawing><w:txbxContent><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:txbxContent></w:drawing></w:r>",
            "<w:hyperlink><w:r><w:t>b</w:t></w:r></w:hyperlink></w:p>"
        ))
        .unwrap()
        .root;
        let index = ParagraphText::build(&p);
        assert_eq!(index.text, "ab");
        assert_eq!(index.fragments[1].path, vec![2, 0, 0]);
    }

    #[test]
    fn test_replace_span_across_three_fragments() {
        let mut p = fragmented();
        let index = ParagraphText::build(&p);
        assert!(replace_span(&mut p, &index, TextSpan::new(5, 13), "Ada"));
        assert_eq!(paragraph_text(&p), "Dear Ada, hi");
        // Replacement takes the formatting of the run where the token starts
        assert_eq!(p.element_at(&[1, 1]).unwrap().text_content(), "Dear Ada");
        assert_eq!(p.element_at(&[2, 0]).unwrap().text_content(), "");
        assert_eq!(p.element_at(&[3, 1]).unwrap().text_content(), ", hi");
    }

    #[test]
    fn test_replace_span_within_one_fragment() {
        let mut p = parse("<w:p><w:r><w:t>a {{x}} b</w:t></w:r></w:p>").unwrap().root;
        let index = ParagraphText::build(&p);
        assert!(replace_span(&mut p, &index, TextSpan::new(2, 7), "1"));
        assert_eq!(paragraph_text(&p), "a 1 b");
    }

    #[test]
    fn test_replace_span_out_of_range() {
        let mut p = parse("<w:p><w:r><w:t>ab</w:t></w:r></w:p>").unwrap().root;
        let index = ParagraphText::build(&p);
        assert!(!replace_span(&mut p, &index, TextSpan::new(1, 9), ""));
    }

    #[test]
    fn test_insert_runs_splits_run() {
        let mut p = parse("<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>a {{x}} b</w:t></w:r></w:p>")
            .unwrap()
            .root;
        let index = ParagraphText::build(&p);
        let span = TextSpan::new(2, 7);
        let base = base_properties(&p, &index, span);
        assert!(base.as_ref().unwrap().find_child("w:b").is_some());

        let inserted = insert_runs(&mut p, &index, span, vec![text_run("X", base.as_ref())]).unwrap();
        assert_eq!(inserted.parent, Vec::<usize>::new());
        assert_eq!(inserted.first, 1);
        assert_eq!(inserted.count, 1);

        let runs: Vec<String> = p.child_elements().map(|r| r.text_content()).collect();
        assert_eq!(runs, vec!["a ", "X", " b"]);
        // Both halves keep the original formatting
        assert!(p.element_at(&[2, 0]).unwrap().find_child("w:b").is_some());
    }

    #[test]
    fn test_insert_runs_at_end_drops_empty_right_half() {
        let mut p = parse("<w:p><w:r><w:t>{{</w:t></w:r><w:r><w:t>x}}</w:t></w:r></w:p>")
            .unwrap()
            .root;
        let index = ParagraphText::build(&p);
        insert_runs(&mut p, &index, TextSpan::new(0, 5), vec![text_run("v", None)]).unwrap();
        assert_eq!(paragraph_text(&p), "v");
        assert_eq!(p.child_elements().count(), 3);
    }

    #[test]
    fn test_inert_values_are_restored() {
        let value = inert("{{x}} and {%img%}");
        assert!(!value.contains('{'));
        assert!(scan_text(&value, &TemplateContext::new()).is_empty());

        let mut p = parse("<w:p><w:r><w:t>a {{b}}</w:t></w:r></w:p>").unwrap().root;
        let index = ParagraphText::build(&p);
        assert!(replace_span(&mut p, &index, TextSpan::new(2, 7), &value));
        assert_eq!(restore_braces(&mut p), 1);
        assert_eq!(paragraph_text(&p), "a {{x}} and {%img%}");
    }

    #[test]
    fn test_span_mapping_and_run_parent() {
        let p = parse(concat!(
            "<w:p><w:r><w:t>a</w:t></w:r>",
            "<w:hyperlink><w:r><w:t>{{x}}</w:t></w:r></w:hyperlink></w:p>"
        ))
        .unwrap()
        .root;
        let index = ParagraphText::build(&p);
        assert!(index.maps_span(TextSpan::new(1, 6)));
        assert!(!index.maps_span(TextSpan::new(1, 9)));
        assert_eq!(index.run_parent(TextSpan::new(0, 1)), Some(&[][..]));
        assert_eq!(index.run_parent(TextSpan::new(1, 6)), Some(&[1][..]));
    }
}
