/*
 * diagnostics.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Structured diagnostics for template rendering.
//!
//! Rendering degrades gracefully: an unknown key, a dangling `{%endfor%}` or
//! an unreadable image never aborts the render. Each of these is recorded as
//! a [`DiagnosticMessage`] and returned alongside the output document.
//!
//! Codes are grouped by subsystem:
//!
//! | Prefix | Subsystem |
//! |---|---|
//! | `T-1-*` | value resolution |
//! | `T-2-*` | loop structure |
//! | `T-3-*` | table structure |
//! | `T-4-*` | images and assets |

use serde::Serialize;
use std::fmt::Write;

/// Unknown scalar, special-char or rich-text key.
pub const UNKNOWN_KEY: &str = "T-1-1";
/// Field reference (`{{item.field}}`) left over after loops and tables ran.
pub const UNRESOLVED_FIELD: &str = "T-1-2";
/// `{%endfor%}` without an open loop.
pub const DANGLING_ENDFOR: &str = "T-2-1";
/// Loop over a collection the context does not define.
pub const UNKNOWN_COLLECTION: &str = "T-2-2";
/// `{%for%}` without a matching `{%endfor%}`.
pub const UNCLOSED_LOOP: &str = "T-2-3";
/// Table region naming data the context does not define.
pub const UNKNOWN_TABLE: &str = "T-3-1";
/// `{{#docTable}}` without a matching `{{/docTable}}`.
pub const UNCLOSED_TABLE: &str = "T-3-2";
/// `{{/docTable}}` without an open region.
pub const DANGLING_TABLE_END: &str = "T-3-3";
/// Synthesized table with neither columns nor rows.
pub const EMPTY_TABLE: &str = "T-3-4";
/// Image key not in the image registry.
pub const UNKNOWN_IMAGE: &str = "T-4-1";
/// Image file missing, unreadable or in an unsupported format.
pub const IMAGE_ASSET: &str = "T-4-2";

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Fails the render in strict mode
    Error,
    /// Degraded output, render continued
    Warning,
    /// Informational message
    Info,
}

/// Where in the package a diagnostic was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticLocation {
    /// Part name, e.g. `word/header1.xml`.
    pub part: String,
    /// The placeholder text (or paragraph excerpt) involved.
    pub snippet: Option<String>,
}

/// A single diagnostic, in tidyverse style: a title, an optional problem
/// statement, and hints ending in `?`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub title: String,
    pub kind: DiagnosticKind,
    pub problem: Option<String>,
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DiagnosticLocation>,
}

impl DiagnosticMessage {
    /// Render as text, one line per component.
    ///
    /// ```
    /// use docx_template::diagnostics::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::warning("Unknown image key")
    ///     .with_code("T-4-1")
    ///     .with_location("word/document.xml", Some("{%Logo%}"))
    ///     .add_hint("Add `Logo` to the images map?")
    ///     .build();
    /// let text = msg.to_text();
    /// assert!(text.starts_with("Warning [T-4-1]: Unknown image key"));
    /// assert!(text.contains("word/document.xml"));
    /// ```
    pub fn to_text(&self) -> String {
        let mut result = String::new();

        let kind_str = match self.kind {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
        };
        let _ = match &self.code {
            Some(code) => write!(result, "{} [{}]: {}", kind_str, code, self.title),
            None => write!(result, "{}: {}", kind_str, self.title),
        };

        if let Some(location) = &self.location {
            let _ = write!(result, "\n  in {}", location.part);
            if let Some(snippet) = &location.snippet {
                let _ = write!(result, " at `{}`", snippet);
            }
        }
        if let Some(problem) = &self.problem {
            let _ = write!(result, "\n{}", problem);
        }
        for hint in &self.hints {
            let _ = write!(result, "\n? {}", hint);
        }
        result
    }
}

/// Builder for [`DiagnosticMessage`].
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage {
                code: None,
                title: title.into(),
                kind,
                problem: None,
                hints: Vec::new(),
                location: None,
            },
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    /// The problem statement (what is wrong, using "must" or "can't").
    pub fn problem(mut self, problem: impl Into<String>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    pub fn add_hint(mut self, hint: impl Into<String>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn with_location(mut self, part: impl Into<String>, snippet: Option<&str>) -> Self {
        self.message.location = Some(DiagnosticLocation {
            part: part.into(),
            snippet: snippet.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }
}

/// Collector for diagnostic messages raised during a render.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<DiagnosticMessage>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: DiagnosticMessage) {
        self.diagnostics.push(diagnostic);
    }

    /// Check if any errors were collected (warnings don't count).
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }

    /// Number of collected errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Error)
            .count()
    }

    pub fn diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    /// Consume the collector, keeping insertion (document) order.
    pub fn into_diagnostics(self) -> Vec<DiagnosticMessage> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder() {
        let msg = DiagnosticMessageBuilder::error("Unknown placeholder key")
            .with_code(UNKNOWN_KEY)
            .problem("`Name` is not defined in the template data")
            .add_hint("Did you mean `name`?")
            .build();

        assert_eq!(msg.kind, DiagnosticKind::Error);
        assert_eq!(msg.code.as_deref(), Some("T-1-1"));
        assert_eq!(msg.hints.len(), 1);
        assert!(msg.location.is_none());
    }

    #[test]
    fn test_to_text() {
        let msg = DiagnosticMessageBuilder::warning("Dangling `{%endfor%}`")
            .with_code(DANGLING_ENDFOR)
            .with_location("word/document.xml", Some("{%endfor%}"))
            .problem("There is no open loop to close")
            .build();

        assert_eq!(
            msg.to_text(),
            "Warning [T-2-1]: Dangling `{%endfor%}`\n  in word/document.xml at `{%endfor%}`\nThere is no open loop to close"
        );
    }

    #[test]
    fn test_collector_counts_errors_only() {
        let mut collector = DiagnosticCollector::new();
        assert!(collector.is_empty());

        collector.add(DiagnosticMessageBuilder::warning("w").build());
        assert!(!collector.has_errors());

        collector.add(DiagnosticMessageBuilder::error("e").build());
        collector.add(DiagnosticMessageBuilder::info("i").build());
        assert!(collector.has_errors());
        assert_eq!(collector.error_count(), 1);
        assert_eq!(collector.into_diagnostics().len(), 3);
    }
}
