/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The render driver.
//!
//! Every part that can carry placeholders (the main document, then each
//! header, then each footer) goes through the same passes in order:
//!
//! 1. scalars, special characters and rich text outside table regions
//! 2. loops
//! 3. tables
//! 4. a residual sweep for field references no region claimed
//! 5. images
//!
//! Each pass re-scans the tree, since earlier passes change its structure.

use crate::context::TemplateContext;
use crate::diagnostics::{DiagnosticKind, DiagnosticMessage};
use crate::error::{TemplateError, TemplateResult};
use crate::images::{AssetSink, embed_images};
use crate::loops::expand_loops;
use crate::options::RenderOptions;
use crate::render_context::RenderContext;
use crate::resolver::ContextResolver;
use crate::substitute::substitute_tree;
use crate::tables::{expand_tables, protected_paragraphs};
use crate::text::restore_braces;
use docx_package::{Package, rel_types};
use docx_xml::XmlElement;
use std::collections::HashSet;

/// A rendered document and the diagnostics raised while rendering it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<DiagnosticMessage>,
}

/// Number of placeholders each pass resolved in one part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounts {
    pub scalars: usize,
    pub loops: usize,
    pub tables: usize,
    pub residual: usize,
    pub images: usize,
}

impl PassCounts {
    pub fn total(&self) -> usize {
        self.scalars + self.loops + self.tables + self.residual + self.images
    }
}

/// Renders templates with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `template` (the bytes of a `.docx` package) against `data`.
    ///
    /// Fails as a unit: when the package cannot be read or written, or a
    /// strict render leaves placeholders unresolved, no bytes are returned.
    pub fn render(
        &self,
        template: &[u8],
        data: &TemplateContext,
    ) -> TemplateResult<RenderOutput> {
        let mut package = Package::from_bytes(template)?;
        let main = package.main_document_part()?;

        let mut parts = vec![(main.clone(), false)];
        for rel_type in [rel_types::HEADER, rel_types::FOOTER] {
            for name in package.related_parts(&main, rel_type)? {
                parts.push((name, true));
            }
        }

        let mut ctx = RenderContext::new(data, &self.options);
        for (name, in_header) in parts {
            ctx.enter_part(name.as_str(), in_header);
            render_part(&mut package, &name, &mut ctx)?;
        }

        if self.options.strict && ctx.has_errors() {
            let count = ctx.diagnostics.error_count();
            let first = ctx
                .diagnostics
                .diagnostics()
                .iter()
                .find(|d| d.kind == DiagnosticKind::Error)
                .map(describe)
                .unwrap_or_default();
            return Err(TemplateError::Unresolved { count, first });
        }

        let bytes = package.to_bytes()?;
        let diagnostics = ctx.into_diagnostics();
        tracing::info!(
            parts = package.part_names().count(),
            warnings = diagnostics.len(),
            "rendered document"
        );
        Ok(RenderOutput { bytes, diagnostics })
    }
}

/// Render with default options, discarding diagnostics.
pub fn render(template: &[u8], data: &TemplateContext) -> TemplateResult<Vec<u8>> {
    Ok(Renderer::default().render(template, data)?.bytes)
}

fn describe(diagnostic: &DiagnosticMessage) -> String {
    diagnostic
        .location
        .as_ref()
        .and_then(|location| location.snippet.clone())
        .unwrap_or_else(|| diagnostic.title.clone())
}

/// Render one part in place. Returns whether the part changed.
fn render_part(
    package: &mut Package,
    name: &str,
    ctx: &mut RenderContext<'_>,
) -> TemplateResult<bool> {
    let Some(bytes) = package.part(name) else {
        return Ok(false);
    };
    if !bytes.contains(&b'{') {
        tracing::debug!(part = name, "no placeholders, part left untouched");
        return Ok(false);
    }

    let original = docx_xml::parse_bytes(bytes)?;
    let mut document = original.clone();
    let body: Vec<usize> = document.root.position_of_child("w:body").into_iter().collect();
    let Some(region) = document.root.element_at_mut(&body) else {
        return Ok(false);
    };

    let counts = run_passes(region, package, ctx)?;
    tracing::debug!(
        part = name,
        tokens = counts.total(),
        scalars = counts.scalars,
        loops = counts.loops,
        tables = counts.tables,
        images = counts.images,
        "rendered part"
    );

    if document == original {
        return Ok(false);
    }
    package.set_part(name, docx_xml::to_bytes(&document)?);
    Ok(true)
}

/// Run every pass over `region`, the block container of one part.
pub fn run_passes(
    region: &mut XmlElement,
    sink: &mut dyn AssetSink,
    ctx: &mut RenderContext<'_>,
) -> TemplateResult<PassCounts> {
    let data = ctx.data;

    let protected = protected_paragraphs(region, ctx);
    let scalars = substitute_tree(region, &ContextResolver::new(data), ctx, &protected);
    let loops = expand_loops(region, ctx);
    let tables = expand_tables(region, ctx)?;
    let residual = substitute_tree(
        region,
        &ContextResolver::finalizing(data),
        ctx,
        &HashSet::new(),
    );
    let images = embed_images(region, sink, ctx)?;
    restore_braces(region);

    Ok(PassCounts {
        scalars,
        loops,
        tables,
        residual,
        images,
    })
}
