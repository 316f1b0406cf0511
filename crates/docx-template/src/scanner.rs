/*
 * scanner.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Finding placeholder tokens in paragraph text.
//!
//! All token forms are matched by one alternation, tried in priority order
//! at each position: table markers, loop markers, images, then `{{key}}`.
//! Text that looks like the start of a tag but never closes (`{{Name`,
//! `{%for x%}`) simply produces no token.

use crate::context::TemplateContext;
use crate::options::PixelSize;
use crate::text::ParagraphText;
use crate::token::{LoopMarker, PlaceholderToken, TableMarker, TextSpan, TokenKind};
use docx_xml::XmlElement;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<table_start>\{\{\s*#docTable\s+(?P<table>[^{}\s]+)\s*\}\})",
        r"|(?P<table_end>\{\{\s*/docTable\s*\}\})",
        r"|(?P<loop_start>\{%\s*for\s+(?P<item>\w+)\s+in\s+(?P<collection>[^%\s]+)\s*%\})",
        r"|(?P<loop_end>\{%\s*endfor\s*%\})",
        r"|(?P<image>\{%\s*(?P<image_key>[A-Za-z0-9_][A-Za-z0-9_.\-]*)(?::(?P<width>\d+)[xX](?P<height>\d+))?\s*%\})",
        r"|(?P<value>\{\{\s*(?P<key>[^{}#/\s][^{}]*?)\s*\}\})",
    ))
    .expect("token grammar is valid")
});

/// Tokens in `text`, in order of appearance.
///
/// `{{key}}` tokens are classified by registry membership: special-char
/// keys first, then rich-text keys, everything else is a scalar.
pub fn scan_text(text: &str, data: &TemplateContext) -> Vec<PlaceholderToken> {
    if !text.contains('{') {
        return Vec::new();
    }
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| classify(&caps, data))
        .collect()
}

fn classify(caps: &Captures<'_>, data: &TemplateContext) -> Option<PlaceholderToken> {
    let whole = caps.get(0)?;
    let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    let kind = if caps.name("table_start").is_some() {
        TokenKind::Table(TableMarker::Start {
            name: group("table")?,
        })
    } else if caps.name("table_end").is_some() {
        TokenKind::Table(TableMarker::End)
    } else if caps.name("loop_start").is_some() {
        TokenKind::Loop(LoopMarker::Start {
            item: group("item")?,
            collection: group("collection")?,
        })
    } else if caps.name("loop_end").is_some() {
        TokenKind::Loop(LoopMarker::End)
    } else if caps.name("image").is_some() {
        let size = match (caps.name("width"), caps.name("height")) {
            (Some(w), Some(h)) => {
                let width = w.as_str().parse::<u32>().ok()?;
                let height = h.as_str().parse::<u32>().ok()?;
                // Zero dimensions are malformed, not a request to hide the image
                if width == 0 || height == 0 {
                    return None;
                }
                Some(PixelSize::new(width, height))
            }
            _ => None,
        };
        TokenKind::Image {
            key: group("image_key")?,
            size,
        }
    } else {
        let key = group("key")?;
        if data.is_special_char(&key) {
            TokenKind::SpecialChar { key }
        } else if data.is_rich_text(&key) {
            TokenKind::RichText { key }
        } else {
            TokenKind::Scalar { key }
        }
    };

    Some(PlaceholderToken {
        kind,
        span: TextSpan::new(whole.start(), whole.end()),
        raw: whole.as_str().to_string(),
    })
}

/// Tokens of one paragraph, addressed by the paragraph's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedToken {
    pub paragraph: Vec<usize>,
    pub token: PlaceholderToken,
}

/// Paths of every paragraph under `root`, in document order.
///
/// Paragraphs nested in text boxes are included after their host paragraph.
pub fn paragraph_paths(root: &XmlElement) -> Vec<Vec<usize>> {
    let mut paths = root.find_paths(&|e| e.is("w:p"), true);
    if root.is("w:p") {
        paths.insert(0, Vec::new());
    }
    paths
}

/// Scan every paragraph under `root`.
pub fn scan(root: &XmlElement, data: &TemplateContext) -> Vec<LocatedToken> {
    let mut tokens = Vec::new();
    for path in paragraph_paths(root) {
        let Some(paragraph) = root.element_at(&path) else {
            continue;
        };
        let index = ParagraphText::build(paragraph);
        for token in scan_text(&index.text, data) {
            tokens.push(LocatedToken {
                paragraph: path.clone(),
                token,
            });
        }
    }
    tracing::trace!(tokens = tokens.len(), "scanned subtree");
    tokens
}

/// Tokens of one paragraph that satisfy `pred`.
pub fn paragraph_tokens(
    paragraph: &XmlElement,
    data: &TemplateContext,
    pred: impl Fn(&PlaceholderToken) -> bool,
) -> (ParagraphText, Vec<PlaceholderToken>) {
    let index = ParagraphText::build(paragraph);
    let tokens = scan_text(&index.text, data)
        .into_iter()
        .filter(|t| pred(t))
        .collect();
    (index, tokens)
}
