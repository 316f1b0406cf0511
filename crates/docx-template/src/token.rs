/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Placeholder tokens.

use crate::options::PixelSize;
use std::ops::Range;

/// A byte range in the combined text of one paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// `{%for item in collection%}` or `{%endfor%}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopMarker {
    Start { item: String, collection: String },
    End,
}

/// `{{#docTable name}}` or `{{/docTable}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableMarker {
    Start { name: String },
    End,
}

/// What a placeholder asks for.
///
/// `Scalar`, `SpecialChar` and `RichText` share the `{{key}}` syntax; the
/// scanner tells them apart by registry membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Scalar { key: String },
    SpecialChar { key: String },
    RichText { key: String },
    Loop(LoopMarker),
    Table(TableMarker),
    Image { key: String, size: Option<PixelSize> },
}

/// A placeholder located in a paragraph's combined text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    pub kind: TokenKind,
    pub span: TextSpan,
    /// The matched text, delimiters included.
    pub raw: String,
}

impl PlaceholderToken {
    /// The lookup key for value and image tokens.
    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Scalar { key }
            | TokenKind::SpecialChar { key }
            | TokenKind::RichText { key }
            | TokenKind::Image { key, .. } => Some(key),
            TokenKind::Loop(_) | TokenKind::Table(_) => None,
        }
    }

    /// Scalar, special-char or rich-text: resolved by the substitutor.
    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Scalar { .. } | TokenKind::SpecialChar { .. } | TokenKind::RichText { .. }
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, TokenKind::Loop(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, TokenKind::Table(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, TokenKind::Image { .. })
    }
}

/// Image placeholder text for a key and optional size.
pub fn image_placeholder(key: &str, size: Option<PixelSize>) -> String {
    match size {
        Some(size) => format!("{{%{}:{}%}}", key, size),
        None => format!("{{%{}%}}", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_placeholder() {
        assert_eq!(image_placeholder("Logo", None), "{%Logo%}");
        assert_eq!(
            image_placeholder("Logo", Some(PixelSize::new(120, 80))),
            "{%Logo:120x80%}"
        );
    }

    #[test]
    fn test_key() {
        let token = PlaceholderToken {
            kind: TokenKind::Table(TableMarker::End),
            span: TextSpan::new(0, 13),
            raw: "{{/docTable}}".to_string(),
        };
        assert_eq!(token.key(), None);
        assert!(token.is_table());
        assert!(!token.is_value());
    }
}
