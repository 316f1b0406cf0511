/*
 * render_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! State threaded through every pass of a render.
//!
//! [`RenderContext`] carries:
//!
//! 1. **Data**: the [`TemplateContext`] being rendered
//! 2. **Configuration**: [`RenderOptions`], including strict mode
//! 3. **Diagnostics**: warnings and errors, tagged with the current part

use crate::context::TemplateContext;
use crate::diagnostics::{DiagnosticCollector, DiagnosticMessage, DiagnosticMessageBuilder};
use crate::options::{PixelSize, RenderOptions};

pub struct RenderContext<'a> {
    /// Values for placeholder resolution.
    pub data: &'a TemplateContext,

    pub options: &'a RenderOptions,

    /// Diagnostic collector for errors and warnings.
    pub diagnostics: DiagnosticCollector,

    /// Name of the part being rendered (e.g. `word/document.xml`).
    pub part: String,

    /// Whether the current part is a header or footer.
    pub in_header: bool,

    /// Next `wp:docPr` id for inserted drawings.
    pub next_drawing_id: u32,
}

impl<'a> RenderContext<'a> {
    pub fn new(data: &'a TemplateContext, options: &'a RenderOptions) -> Self {
        Self {
            data,
            options,
            diagnostics: DiagnosticCollector::new(),
            part: String::new(),
            in_header: false,
            next_drawing_id: 1,
        }
    }

    /// Switch to another part of the package.
    pub fn enter_part(&mut self, part: impl Into<String>, in_header: bool) {
        self.part = part.into();
        self.in_header = in_header;
    }

    /// Default bound for images without an explicit size in the current part.
    pub fn default_image_size(&self) -> PixelSize {
        if self.in_header {
            self.options.header_image_size
        } else {
            self.options.image_size
        }
    }

    pub fn strict_mode(&self) -> bool {
        self.options.strict
    }

    /// Add a warning about the current part.
    pub fn warn(&mut self, code: &str, title: impl Into<String>, snippet: Option<&str>) {
        let diagnostic = DiagnosticMessageBuilder::warning(title)
            .with_code(code)
            .with_location(self.part.clone(), snippet)
            .build();
        self.add_diagnostic(diagnostic);
    }

    /// A diagnostic builder for something the data does not define: an
    /// error in strict mode, otherwise a warning.
    pub fn miss(&self, title: impl Into<String>) -> DiagnosticMessageBuilder {
        if self.strict_mode() {
            DiagnosticMessageBuilder::error(title)
        } else {
            DiagnosticMessageBuilder::warning(title)
        }
    }

    /// Add an error or warning depending on strict mode.
    ///
    /// Used for resolution misses: in strict mode they fail the render.
    pub fn warn_or_error(&mut self, code: &str, title: impl Into<String>, snippet: Option<&str>) {
        let diagnostic = self
            .miss(title)
            .with_code(code)
            .with_location(self.part.clone(), snippet)
            .build();
        self.add_diagnostic(diagnostic);
    }

    pub fn add_diagnostic(&mut self, diagnostic: DiagnosticMessage) {
        tracing::debug!(
            part = %self.part,
            code = diagnostic.code.as_deref().unwrap_or(""),
            "{}",
            diagnostic.title
        );
        self.diagnostics.add(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Consume the context and return collected diagnostics.
    pub fn into_diagnostics(self) -> Vec<DiagnosticMessage> {
        self.diagnostics.into_diagnostics()
    }
}
