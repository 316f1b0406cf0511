/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Data-driven rendering of `.docx` templates.
//!
//! A template is an ordinary Word document with placeholders typed into its
//! text:
//!
//! - Values: `{{key}}` (plain text, rich text or a special character,
//!   decided by which registry defines `key`)
//! - Loops: `{%for item in collection%}` ... `{%endfor%}` with
//!   `{{item.field}}` inside
//! - Tables: `{{#docTable name}}` ... `{{/docTable}}`, either around
//!   standalone paragraphs (a new table is built) or inside a table row
//!   (the row is repeated)
//! - Images: `{%key%}` or `{%key:WxH%}`
//!
//! Word splits typed text across runs whenever formatting, spell checking
//! or revision tracking touches it, so placeholders are matched on the
//! combined text of a paragraph and mapped back onto the runs.
//!
//! # Example
//!
//! ```ignore
//! use docx_template::{RenderOptions, Renderer, TemplateContext};
//!
//! let mut data = TemplateContext::new();
//! data.insert_scalar("Name", "Ada");
//!
//! let template = std::fs::read("letter.docx")?;
//! let output = Renderer::new(RenderOptions::default()).render(&template, &data)?;
//! for diagnostic in &output.diagnostics {
//!     eprintln!("{}", diagnostic.to_text());
//! }
//! std::fs::write("letter-ada.docx", output.bytes)?;
//! ```

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod html;
pub mod images;
pub mod loops;
pub mod options;
pub mod plan;
pub mod render;
pub mod render_context;
pub mod resolver;
pub mod runs;
pub mod scanner;
pub mod substitute;
pub mod tables;
pub mod text;
pub mod token;

// Re-export main types at crate root
pub use context::{Row, SpecialChar, TemplateContext, row};
pub use diagnostics::{
    DiagnosticCollector, DiagnosticKind, DiagnosticLocation, DiagnosticMessage,
    DiagnosticMessageBuilder,
};
pub use error::{TemplateError, TemplateResult};
pub use images::{AssetSink, ImageFormat, ImagePlacement, compute_placement};
pub use options::{PixelSize, RenderOptions};
pub use render::{RenderOutput, Renderer, render};
pub use render_context::RenderContext;
pub use resolver::{ContextResolver, LoopItemResolver, Resolved, RowResolver, ValueResolver};
pub use scanner::{LocatedToken, scan};
pub use token::{LoopMarker, PlaceholderToken, TableMarker, TextSpan, TokenKind};
