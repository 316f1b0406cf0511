/*
 * loops.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expanding `{%for item in collection%}` ... `{%endfor%}` regions.
//!
//! A loop whose markers share one paragraph is expanded as text: the body
//! between the markers is repeated once per item. A loop whose markers sit
//! in different paragraphs repeats every sibling between the two marker
//! paragraphs, which may include tables and nested loops.
//!
//! Block loops are matched per container (the body, a table cell, a content
//! control or a text box). Both markers must share a container; nesting is
//! resolved with a stack, so the innermost loop expands first.

use crate::diagnostics::{
    DANGLING_ENDFOR, UNCLOSED_LOOP, UNKNOWN_COLLECTION, UNKNOWN_KEY,
    UNRESOLVED_FIELD,
};
use crate::html::parse_html;
use crate::render_context::RenderContext;
use crate::resolver::{LoopItemResolver, Resolved, ValueResolver};
use crate::scanner::scan_text;
use crate::substitute::{is_blank, rewrite_image_keys, strip_tokens, substitute_tree};
use crate::text::{ParagraphText, inert, replace_span};
use crate::token::{LoopMarker, PlaceholderToken, TextSpan, TokenKind, image_placeholder};
use docx_xml::{XmlElement, XmlNode};
use std::collections::HashSet;

/// Elements whose direct children are block content.
const CONTAINERS: &[&str] = &["w:tc", "w:sdtContent", "w:txbxContent"];

/// An open block loop.
#[derive(Debug)]
struct Frame {
    /// Index of the start marker paragraph in the container.
    index: usize,
    item: String,
    collection: String,
    raw: String,
}

/// Expand every loop under `root`. Returns the number of loops expanded.
pub fn expand_loops(root: &mut XmlElement, ctx: &mut RenderContext<'_>) -> usize {
    let mut containers = root.find_paths(&|e| CONTAINERS.iter().any(|c| e.is(c)), true);
    containers.insert(0, Vec::new());

    let mut expanded = 0;
    // Innermost and latest first; edits inside a container leave the paths
    // of earlier containers intact.
    for path in containers.into_iter().rev() {
        let Some(container) = root.element_at_mut(&path) else {
            continue;
        };
        for child in container.children.iter_mut() {
            if let Some(paragraph) = child.as_element_mut().filter(|e| e.is("w:p")) {
                expanded += expand_inline_loops(paragraph, ctx);
            }
        }
        expanded += expand_block_loops(container, ctx);
    }
    if expanded > 0 {
        tracing::debug!(part = %ctx.part, loops = expanded, "expanded loops");
    }
    expanded
}

/// Expand loops whose start and end markers share `paragraph`.
fn expand_inline_loops(paragraph: &mut XmlElement, ctx: &mut RenderContext<'_>) -> usize {
    let data = ctx.data;
    let mut expanded = 0;
    let initial = loop_markers(paragraph, ctx).len();

    // Each pass expands the innermost pair; item values that happen to
    // contain markers are never expanded themselves.
    while expanded < initial / 2 {
        let index = ParagraphText::build(paragraph);
        let markers: Vec<PlaceholderToken> = scan_text(&index.text, data)
            .into_iter()
            .filter(PlaceholderToken::is_loop)
            .collect();
        let Some(pos) = markers.windows(2).position(|pair| {
            matches!(pair[0].kind, TokenKind::Loop(LoopMarker::Start { .. }))
                && matches!(pair[1].kind, TokenKind::Loop(LoopMarker::End))
        }) else {
            break;
        };
        let (start, end) = (&markers[pos], &markers[pos + 1]);
        let TokenKind::Loop(LoopMarker::Start { item, collection }) = &start.kind else {
            break;
        };

        let body = &index.text[start.span.end..end.span.start];
        let replacement = match data.rows(collection, false) {
            Some(items) => items
                .iter()
                .map(|row| resolve_text(body, &LoopItemResolver::new(item, row), ctx))
                .collect::<String>(),
            None => {
                unknown_collection(ctx, collection, &start.raw);
                String::new()
            }
        };
        let span = TextSpan::new(start.span.start, end.span.end);
        if !replace_span(paragraph, &index, span, &replacement) {
            break;
        }
        expanded += 1;
    }
    expanded
}

/// Resolve the tokens of a loop body at text level.
fn resolve_text(
    text: &str,
    resolver: &dyn ValueResolver,
    ctx: &mut RenderContext<'_>,
) -> String {
    let mut out = text.to_string();
    for token in scan_text(text, ctx.data).iter().rev() {
        let replacement = match &token.kind {
            TokenKind::Image { key, size } => match resolver.image_key(key) {
                Some(target) => image_placeholder(&target, *size),
                None => continue,
            },
            TokenKind::Scalar { key }
            | TokenKind::SpecialChar { key }
            | TokenKind::RichText { key } => match resolver.resolve(key) {
                Resolved::Text(value) => inert(&value),
                Resolved::RichText(html) => inert(&parse_html(&html).plain_text()),
                Resolved::SpecialChar(special) => inert(&special.character.to_string()),
                Resolved::Deferred => continue,
                Resolved::Absent => {
                    let code = if key.contains('.') {
                        UNRESOLVED_FIELD
                    } else {
                        UNKNOWN_KEY
                    };
                    ctx.warn_or_error(
                        code,
                        format!("Unresolved placeholder '{}'", key),
                        Some(&token.raw),
                    );
                    String::new()
                }
            },
            TokenKind::Loop(_) | TokenKind::Table(_) => continue,
        };
        out.replace_range(token.span.range(), &replacement);
    }
    out
}

/// Expand loops whose markers are direct child paragraphs of `container`.
fn expand_block_loops(container: &mut XmlElement, ctx: &mut RenderContext<'_>) -> usize {
    split_marker_paragraphs(container, ctx);

    let mut stack: Vec<Frame> = Vec::new();
    let mut expanded = 0;
    let mut i = 0;

    while i < container.children.len() {
        let marker = container.children[i]
            .as_element()
            .filter(|e| e.is("w:p"))
            .and_then(|p| loop_markers(p, ctx).into_iter().next());
        let Some(token) = marker else {
            i += 1;
            continue;
        };

        match token.kind {
            TokenKind::Loop(LoopMarker::Start { item, collection }) => {
                stack.push(Frame {
                    index: i,
                    item,
                    collection,
                    raw: token.raw,
                });
            }
            TokenKind::Loop(LoopMarker::End) => {
                let Some(frame) = stack.pop() else {
                    ctx.warn(
                        DANGLING_ENDFOR,
                        "Loop end without a matching start",
                        Some(&token.raw),
                    );
                    i += 1;
                    continue;
                };
                let nodes = expand_block(container, &frame, i, ctx);
                let count = nodes.len();
                container.children.splice(frame.index..=i, nodes);
                expanded += 1;
                i = frame.index + count;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    for frame in stack {
        ctx.warn(
            UNCLOSED_LOOP,
            format!("Loop over '{}' is never closed", frame.collection),
            Some(&frame.raw),
        );
    }
    expanded
}

/// Give every block loop marker a paragraph of its own.
///
/// A paragraph such as `{%endfor%} then {%for b in B%}` closes one loop and
/// opens the next. It is cut before each marker after the first; text before
/// the first marker stays with it, and text after a marker stays with that
/// marker.
fn split_marker_paragraphs(container: &mut XmlElement, ctx: &RenderContext<'_>) {
    for i in (0..container.children.len()).rev() {
        let Some(paragraph) = container.children[i].as_element().filter(|e| e.is("w:p")) else {
            continue;
        };
        let markers = loop_markers(paragraph, ctx);
        if markers.len() < 2 {
            continue;
        }
        let len = ParagraphText::build(paragraph).text.len();
        let pieces: Vec<XmlNode> = (0..markers.len())
            .map(|j| {
                let from = if j == 0 { 0 } else { markers[j].span.start };
                let to = markers.get(j + 1).map_or(len, |m| m.span.start);
                XmlNode::Element(keep_range(paragraph, from, to))
            })
            .collect();
        container.children.splice(i..=i, pieces);
    }
}

/// A copy of `paragraph` with only the text in `from..to` left.
fn keep_range(paragraph: &XmlElement, from: usize, to: usize) -> XmlElement {
    let mut piece = paragraph.clone();
    let len = ParagraphText::build(&piece).text.len();
    if to < len {
        let index = ParagraphText::build(&piece);
        replace_span(&mut piece, &index, TextSpan::new(to, len), "");
    }
    if from > 0 {
        let index = ParagraphText::build(&piece);
        replace_span(&mut piece, &index, TextSpan::new(0, from), "");
    }
    piece
}

/// The nodes replacing a block loop, marker paragraphs included.
fn expand_block(
    container: &XmlElement,
    frame: &Frame,
    end: usize,
    ctx: &mut RenderContext<'_>,
) -> Vec<XmlNode> {
    let data = ctx.data;
    let mut nodes = Vec::new();

    // Text sharing a paragraph with a marker stays outside the loop
    if let Some(p) = marker_residue(container, frame.index, ctx, |t| {
        matches!(t.kind, TokenKind::Loop(LoopMarker::Start { .. }))
    }) {
        nodes.push(XmlNode::Element(p));
    }

    match data.rows(&frame.collection, false) {
        Some(items) => {
            let template = &container.children[frame.index + 1..end];
            for row in items {
                let mut holder = container.clone_shallow();
                holder.children = template.to_vec();
                let resolver = LoopItemResolver::new(&frame.item, row);
                substitute_tree(&mut holder, &resolver, ctx, &HashSet::new());
                rewrite_image_keys(&mut holder, &resolver, ctx);
                nodes.extend(holder.children);
            }
        }
        None => unknown_collection(ctx, &frame.collection, &frame.raw),
    }

    if let Some(p) = marker_residue(container, end, ctx, |t| {
        matches!(t.kind, TokenKind::Loop(LoopMarker::End))
    }) {
        nodes.push(XmlNode::Element(p));
    }
    nodes
}

/// The marker paragraph at `index` with its markers removed, unless nothing
/// else is left in it.
fn marker_residue(
    container: &XmlElement,
    index: usize,
    ctx: &RenderContext<'_>,
    pred: impl Fn(&PlaceholderToken) -> bool,
) -> Option<XmlElement> {
    let mut paragraph = container.children.get(index)?.as_element()?.clone();
    strip_tokens(&mut paragraph, ctx, pred);
    (!is_blank(&paragraph)).then_some(paragraph)
}

fn loop_markers(paragraph: &XmlElement, ctx: &RenderContext<'_>) -> Vec<PlaceholderToken> {
    let text = ParagraphText::build(paragraph).text;
    scan_text(&text, ctx.data)
        .into_iter()
        .filter(PlaceholderToken::is_loop)
        .collect()
}

fn unknown_collection(ctx: &mut RenderContext<'_>, collection: &str, raw: &str) {
    let diagnostic = ctx
        .miss(format!("Unknown collection '{}'", collection))
        .with_code(UNKNOWN_COLLECTION)
        .with_location(ctx.part.clone(), Some(raw))
        .add_hint("Add it to `collections` in the data file?")
        .build();
    ctx.add_diagnostic(diagnostic);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{TemplateContext, row};
    use crate::options::RenderOptions;
    use crate::text::paragraph_text;
    use docx_xml::parse;
    use pretty_assertions::assert_eq;

    fn data() -> TemplateContext {
        let mut data = TemplateContext::new();
        data.insert_collection(
            "people",
            vec![
                row([("name", "Ada"), ("role", "Engineer")]),
                row([("name", "Grace"), ("role", "Admiral")]),
            ],
        )
        .insert_collection("nobody", vec![]);
        data
    }

    fn body(paragraphs: &[&str]) -> XmlElement {
        let xml: String = paragraphs
            .iter()
            .map(|t| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", t))
            .collect();
        parse(&format!("<w:body>{}</w:body>", xml)).unwrap().root
    }

    fn texts(root: &XmlElement) -> Vec<String> {
        root.child_elements().map(paragraph_text).collect()
    }

    fn codes(ctx: RenderContext<'_>) -> Vec<String> {
        ctx.into_diagnostics()
            .into_iter()
            .filter_map(|d| d.code)
            .collect()
    }

    #[test]
    fn test_block_loop_repeats_paragraphs() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&[
            "Team:",
            "{%for p in people%}",
            "{{p.name}}",
            "({{p.role}})",
            "{%endfor%}",
            "End",
        ]);
        assert_eq!(expand_loops(&mut root, &mut ctx), 1);
        assert_eq!(
            texts(&root),
            vec!["Team:", "Ada", "(Engineer)", "Grace", "(Admiral)", "End"]
        );
        assert!(codes(ctx).is_empty());
    }

    #[test]
    fn test_empty_collection_removes_region() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&["a", "{%for p in nobody%}", "{{p.name}}", "{%endfor%}", "b"]);
        expand_loops(&mut root, &mut ctx);
        assert_eq!(texts(&root), vec!["a", "b"]);
    }

    #[test]
    fn test_inline_loop() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&["Names: {%for p in people%}{{p.name}}, {%endfor%}done"]);
        assert_eq!(expand_loops(&mut root, &mut ctx), 1);
        assert_eq!(texts(&root), vec!["Names: Ada, Grace, done"]);
    }

    #[test]
    fn test_nested_loops() {
        let mut data = data();
        data.insert_collection("letters", vec![row([("c", "x")]), row([("c", "y")])]);
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&[
            "{%for p in people%}",
            "{{p.name}}",
            "{%for l in letters%}",
            "{{l.c}}",
            "{%endfor%}",
            "{%endfor%}",
        ]);
        assert_eq!(expand_loops(&mut root, &mut ctx), 2);
        assert_eq!(texts(&root), vec!["Ada", "x", "y", "Grace", "x", "y"]);
    }

    #[test]
    fn test_loop_in_table_cell() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = parse(concat!(
            "<w:body><w:tbl><w:tr><w:tc>",
            "<w:p><w:r><w:t>{%for p in people%}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{{p.name}}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{%endfor%}</w:t></w:r></w:p>",
            "</w:tc></w:tr></w:tbl></w:body>"
        ))
        .unwrap()
        .root;
        expand_loops(&mut root, &mut ctx);
        let cell = root.element_at(&[0, 0, 0]).unwrap();
        assert_eq!(texts(cell), vec!["Ada", "Grace"]);
    }

    #[test]
    fn test_marker_residue_is_kept() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&["Crew {%for p in people%}", "{{p.name}}", "{%endfor%} over"]);
        expand_loops(&mut root, &mut ctx);
        assert_eq!(texts(&root), vec!["Crew ", "Ada", "Grace", " over"]);
    }

    #[test]
    fn test_malformed_loops_are_reported() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&[
            "{%endfor%}",
            "{%for x in missing%}",
            "{{x.a}}",
            "{%endfor%}",
            "{%for p in people%}",
        ]);
        expand_loops(&mut root, &mut ctx);
        assert_eq!(texts(&root), vec!["{%endfor%}", "{%for p in people%}"]);
        assert_eq!(
            codes(ctx),
            vec![DANGLING_ENDFOR, UNKNOWN_COLLECTION, UNCLOSED_LOOP]
        );
    }

    #[test]
    fn test_sibling_block_loops() {
        let mut data = data();
        data.insert_collection("tools", vec![row([("name", "loom")])]);
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&[
            "{%for p in people%}",
            "{{p.name}}",
            "{%endfor%}",
            "and",
            "{%for t in tools%}",
            "{{t.name}}",
            "{%endfor%}",
        ]);
        assert_eq!(expand_loops(&mut root, &mut ctx), 2);
        assert_eq!(texts(&root), vec!["Ada", "Grace", "and", "loom"]);
        assert!(codes(ctx).is_empty());
    }

    #[test]
    fn test_shared_end_and_start_paragraph() {
        let mut data = data();
        data.insert_collection("tools", vec![row([("name", "loom")]), row([("name", "lathe")])]);
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&[
            "{%for p in people%}",
            "{{p.name}}",
            "{%endfor%} then {%for t in tools%}",
            "{{t.name}}",
            "{%endfor%}",
        ]);
        assert_eq!(expand_loops(&mut root, &mut ctx), 2);
        assert_eq!(
            texts(&root),
            vec!["Ada", "Grace", " then ", "loom", "lathe"]
        );
        assert!(codes(ctx).is_empty());
    }

    #[test]
    fn test_unknown_collection_fails_in_strict_mode() {
        let data = data();
        let options = RenderOptions::default().with_strict(true);
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&["{%for x in missing%}", "{{x.a}}", "{%endfor%}"]);
        expand_loops(&mut root, &mut ctx);
        assert!(ctx.has_errors());
        assert_eq!(codes(ctx), vec![UNKNOWN_COLLECTION]);
    }

    #[test]
    fn test_missing_field_is_reported() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut root = body(&["{%for p in people%}", "{{p.age}}!", "{%endfor%}"]);
        expand_loops(&mut root, &mut ctx);
        assert_eq!(texts(&root), vec!["!", "!"]);
        assert_eq!(codes(ctx), vec![UNRESOLVED_FIELD, UNRESOLVED_FIELD]);
    }
}
