/*
 * html.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Converting HTML fragments to styled text segments.
//!
//! Only a small tag set carries meaning: `b`/`strong`, `i`/`em`, `u`,
//! `span style="color:..."`, `br` and `p`. Styles of nested tags add up.
//! Any other element, `div` included, contributes its text content and
//! nothing else.

use html5ever::tendril::TendrilSink as _;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Character formatting accumulated from enclosing tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Hex color without `#`, upper case (e.g. `FF0000`).
    pub color: Option<String>,
}

/// A piece of rich text inside one paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text { text: String, style: RunStyle },
    LineBreak,
}

/// Rich text split into paragraphs at `<p>` boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichText {
    pub paragraphs: Vec<Vec<Inline>>,
}

impl RichText {
    /// All text without formatting, paragraphs joined by newlines.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| {
                p.iter()
                    .map(|inline| match inline {
                        Inline::Text { text, .. } => text.as_str(),
                        Inline::LineBreak => "\n",
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse an HTML fragment into styled paragraphs.
///
/// ```
/// use docx_template::html::{parse_html, Inline};
///
/// let rich = parse_html("Hello <b>bold <i>both</i></b>");
/// assert_eq!(rich.paragraphs.len(), 1);
/// let Inline::Text { style, .. } = &rich.paragraphs[0][2] else { panic!() };
/// assert!(style.bold && style.italic);
/// ```
pub fn parse_html(html: &str) -> RichText {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

    let mut builder = Builder {
        paragraphs: vec![Vec::new()],
        pending_space: None,
    };
    builder.walk(&dom.document, &RunStyle::default());

    // Drop empty paragraphs produced by leading or trailing <p> boundaries
    let mut paragraphs: Vec<Vec<Inline>> = builder
        .paragraphs
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.is_empty() {
        paragraphs.push(Vec::new());
    }
    RichText { paragraphs }
}

struct Builder {
    paragraphs: Vec<Vec<Inline>>,
    /// Source line breaks between inline elements, shown as one space once
    /// more text follows in the same paragraph.
    pending_space: Option<RunStyle>,
}

impl Builder {
    fn current(&mut self) -> &mut Vec<Inline> {
        if self.paragraphs.is_empty() {
            self.paragraphs.push(Vec::new());
        }
        let last = self.paragraphs.len() - 1;
        &mut self.paragraphs[last]
    }

    fn push_text(&mut self, text: &str, style: &RunStyle) {
        if text.trim().is_empty() && text.contains('\n') {
            let follows_text = matches!(self.current().last(), Some(Inline::Text { .. }));
            if follows_text {
                self.pending_space = Some(style.clone());
            }
            return;
        }
        if let Some(space_style) = self.pending_space.take() {
            self.append(" ", &space_style);
        }
        self.append(&text.replace(['\r', '\n'], " "), style);
    }

    fn append(&mut self, text: &str, style: &RunStyle) {
        let current = self.current();
        if let Some(Inline::Text {
            text: previous,
            style: previous_style,
        }) = current.last_mut()
        {
            if previous_style == style {
                previous.push_str(text);
                return;
            }
        }
        current.push(Inline::Text {
            text: text.to_string(),
            style: style.clone(),
        });
    }

    fn break_paragraph(&mut self) {
        self.pending_space = None;
        if self.paragraphs.last().is_some_and(|p| !p.is_empty()) {
            self.paragraphs.push(Vec::new());
        }
    }

    fn walk(&mut self, handle: &Handle, style: &RunStyle) {
        match &handle.data {
            NodeData::Document => self.walk_children(handle, style),
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                self.push_text(&text, style);
            }
            NodeData::Element { name, attrs, .. } => {
                let tag = name.local.to_string();
                let mut inner = style.clone();
                match tag.as_str() {
                    "b" | "strong" => inner.bold = true,
                    "i" | "em" => inner.italic = true,
                    "u" => inner.underline = true,
                    "span" | "font" => {
                        let attrs = attrs.borrow();
                        let color = attrs.iter().find_map(|attr| {
                            match attr.name.local.to_string().as_str() {
                                "style" => css_color(&attr.value),
                                "color" => parse_color(&attr.value),
                                _ => None,
                            }
                        });
                        if color.is_some() {
                            inner.color = color;
                        }
                    }
                    "br" => {
                        self.pending_space = None;
                        self.current().push(Inline::LineBreak);
                        return;
                    }
                    "p" => {
                        self.break_paragraph();
                        self.walk_children(handle, &inner);
                        self.break_paragraph();
                        return;
                    }
                    "script" | "style" | "head" => return,
                    _ => {}
                }
                self.walk_children(handle, &inner);
            }
            _ => {
                // Comments, doctypes, processing instructions
            }
        }
    }

    fn walk_children(&mut self, handle: &Handle, style: &RunStyle) {
        for child in handle.children.borrow().iter() {
            self.walk(child, style);
        }
    }
}

/// Extract `color:` from an inline style attribute.
fn css_color(style: &str) -> Option<String> {
    style.split(';').find_map(|decl| {
        let (property, value) = decl.split_once(':')?;
        if property.trim().eq_ignore_ascii_case("color") {
            parse_color(value)
        } else {
            None
        }
    })
}

/// `#RRGGBB` or `#RGB` to upper-case `RRGGBB`.
fn parse_color(value: &str) -> Option<String> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(hex.to_ascii_uppercase()),
        3 => Some(
            hex.chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_uppercase(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(text: &str, style: RunStyle) -> Inline {
        Inline::Text {
            text: text.to_string(),
            style,
        }
    }

    #[test]
    fn test_plain_text() {
        let rich = parse_html("just text");
        assert_eq!(
            rich.paragraphs,
            vec![vec![text("just text", RunStyle::default())]]
        );
    }

    #[test]
    fn test_nested_styles_compose() {
        let rich = parse_html("<u>a<b>b<i>c</i></b></u>");
        let u = RunStyle {
            underline: true,
            ..RunStyle::default()
        };
        let ub = RunStyle {
            bold: true,
            ..u.clone()
        };
        let ubi = RunStyle {
            italic: true,
            ..ub.clone()
        };
        assert_eq!(
            rich.paragraphs,
            vec![vec![text("a", u), text("b", ub), text("c", ubi)]]
        );
    }

    #[test]
    fn test_span_color() {
        let rich = parse_html(r#"<span style="font-weight: x; color: #f00">red</span>"#);
        let Inline::Text { style, .. } = &rich.paragraphs[0][0] else {
            panic!("expected text");
        };
        assert_eq!(style.color.as_deref(), Some("FF0000"));
    }

    #[test]
    fn test_paragraphs_and_breaks() {
        let rich = parse_html("<p>one<br>two</p>\n<p><strong>three</strong></p>");
        assert_eq!(rich.paragraphs.len(), 2);
        assert_eq!(rich.paragraphs[0][1], Inline::LineBreak);
        assert_eq!(rich.plain_text(), "one\ntwo\nthree");
    }

    #[test]
    fn test_line_break_between_inline_tags_is_a_space() {
        let rich = parse_html("<b>a</b>\n<i>b</i>");
        assert_eq!(rich.paragraphs.len(), 1);
        assert_eq!(rich.plain_text(), "a b");

        // Indentation between block tags adds nothing
        let rich = parse_html("<p>a</p>\n  <p>b</p>\n");
        assert_eq!(rich.paragraphs.len(), 2);
        assert_eq!(rich.plain_text(), "a\nb");
    }

    #[test]
    fn test_div_keeps_text_only() {
        let rich = parse_html("<div>one</div><div>two</div>");
        assert_eq!(rich.paragraphs, vec![vec![text("onetwo", RunStyle::default())]]);
    }

    #[test]
    fn test_unsupported_tags_keep_text() {
        let rich = parse_html("<table><tr><td>cell</td></tr></table> <blink>x</blink>");
        assert_eq!(rich.plain_text(), "cell x");
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#00ff7f").as_deref(), Some("00FF7F"));
        assert_eq!(parse_color("#abc").as_deref(), Some("AABBCC"));
        assert_eq!(parse_color("red"), None);
        assert_eq!(parse_color("#12345"), None);
    }
}
