/*
 * substitute.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Replacing `{{key}}` tokens inside paragraphs.
//!
//! Tokens in a paragraph are replaced last to first, so text offsets of the
//! tokens still to be processed stay valid. Plain values are spliced into
//! the existing `w:t` elements and inherit the formatting of the run where
//! the token starts. Values that need their own runs (line breaks, special
//! characters, rich text) split that run and go in between the halves.

use crate::diagnostics::{UNKNOWN_KEY, UNRESOLVED_FIELD};
use crate::html::{Inline, RunStyle, parse_html};
use crate::render_context::RenderContext;
use crate::resolver::{Resolved, ValueResolver};
use crate::runs::{break_run, contains_rtl, set_run_property, special_char_run, text_run};
use crate::scanner::{paragraph_paths, scan_text};
use crate::text::{ParagraphText, base_properties, inert, insert_runs, replace_span};
use crate::token::{PlaceholderToken, TokenKind, image_placeholder};
use docx_xml::{XmlElement, XmlNode};
use std::collections::HashSet;

/// Substitute every value token of one paragraph.
///
/// Returns the number of tokens replaced and the paragraphs to insert after
/// this one. Extra paragraphs are only produced for multi-paragraph rich
/// text inside a table cell, where the value's paragraph structure is kept;
/// elsewhere its paragraphs are joined by line breaks.
pub fn substitute_paragraph(
    paragraph: &mut XmlElement,
    resolver: &dyn ValueResolver,
    ctx: &mut RenderContext<'_>,
    in_cell: bool,
) -> (usize, Vec<XmlElement>) {
    let text = ParagraphText::build(paragraph).text;
    let tokens: Vec<PlaceholderToken> = scan_text(&text, ctx.data)
        .into_iter()
        .filter(PlaceholderToken::is_value)
        .collect();

    let mut substituted = 0;
    let mut extra = Vec::new();
    for token in tokens.iter().rev() {
        let Some(key) = token.key() else {
            continue;
        };
        let index = ParagraphText::build(paragraph);
        let resolved = resolver.resolve(key);
        let done = match resolved {
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
                replace_span(paragraph, &index, token.span, "")
            }
            Resolved::Text(value) if !value.contains('\n') => {
                replace_span(paragraph, &index, token.span, &inert(&value))
            }
            Resolved::Text(value) => {
                let base = base_properties(paragraph, &index, token.span);
                let run = text_run(&inert(&value), base.as_ref());
                insert_runs(paragraph, &index, token.span, vec![run]).is_some()
            }
            Resolved::SpecialChar(special) => {
                let base = base_properties(paragraph, &index, token.span);
                let run = special_char_run(&special, base.as_ref());
                insert_runs(paragraph, &index, token.span, vec![run]).is_some()
            }
            Resolved::RichText(html) => {
                let (ok, mut paragraphs) =
                    substitute_rich_text(paragraph, &index, token, &html, in_cell);
                // Later tokens were processed first, so their paragraphs follow
                paragraphs.append(&mut extra);
                extra = paragraphs;
                ok
            }
        };
        if done {
            substituted += 1;
        } else {
            tracing::warn!(token = %token.raw, "token span did not map onto paragraph runs");
        }
    }
    (substituted, extra)
}

fn substitute_rich_text(
    paragraph: &mut XmlElement,
    index: &ParagraphText,
    token: &PlaceholderToken,
    html: &str,
    in_cell: bool,
) -> (bool, Vec<XmlElement>) {
    let rich = parse_html(html);
    let base = base_properties(paragraph, index, token.span);
    let base = base.as_ref();

    // Paragraphs can only be split at runs directly under the paragraph;
    // inside a hyperlink or revision mark they are joined by breaks instead.
    let direct = index.run_parent(token.span).is_some_and(<[usize]>::is_empty);
    let split = in_cell && direct && rich.paragraphs.len() > 1;
    let runs: Vec<XmlElement> = if split {
        rich.paragraphs
            .first()
            .map(|inlines| inline_runs(inlines, base))
            .unwrap_or_default()
    } else {
        let mut runs = Vec::new();
        for (i, inlines) in rich.paragraphs.iter().enumerate() {
            if i > 0 {
                runs.push(break_run(base));
            }
            runs.extend(inline_runs(inlines, base));
        }
        runs
    };

    let Some(insertion) = insert_runs(paragraph, index, token.span, runs) else {
        return (false, Vec::new());
    };
    if !split || !insertion.parent.is_empty() {
        return (true, Vec::new());
    }

    // Everything after the inserted runs moves to the last new paragraph
    let tail_start = insertion.first + insertion.count;
    let tail: Vec<XmlNode> = paragraph.children.drain(tail_start..).collect();
    let properties = paragraph.find_child("w:pPr").cloned();

    let mut extra: Vec<XmlElement> = rich.paragraphs[1..]
        .iter()
        .map(|inlines| {
            let mut p = paragraph.clone_shallow();
            if let Some(ppr) = &properties {
                p.children.push(XmlNode::Element(ppr.clone()));
            }
            p.children
                .extend(inline_runs(inlines, base).into_iter().map(XmlNode::Element));
            p
        })
        .collect();
    if let Some(last) = extra.last_mut() {
        last.children.extend(tail);
    }
    (true, extra)
}

/// Runs for one paragraph of rich text, styled on top of `base`.
fn inline_runs(inlines: &[Inline], base: Option<&XmlElement>) -> Vec<XmlElement> {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::LineBreak => break_run(base),
            Inline::Text { text, style } => {
                let rpr = styled_properties(base, style, contains_rtl(text));
                text_run(&inert(text), rpr.as_ref())
            }
        })
        .collect()
}

fn styled_properties(
    base: Option<&XmlElement>,
    style: &RunStyle,
    rtl: bool,
) -> Option<XmlElement> {
    let mut rpr = base.cloned().unwrap_or_else(|| XmlElement::new("w:rPr"));
    if style.bold {
        set_run_property(&mut rpr, XmlElement::new("w:b"));
    }
    if style.italic {
        set_run_property(&mut rpr, XmlElement::new("w:i"));
    }
    if style.underline {
        set_run_property(&mut rpr, XmlElement::new("w:u").with_attr("w:val", "single"));
    }
    if let Some(color) = &style.color {
        set_run_property(
            &mut rpr,
            XmlElement::new("w:color").with_attr("w:val", color.as_str()),
        );
    }
    if rtl {
        set_run_property(&mut rpr, XmlElement::new("w:rtl"));
    }
    if rpr.is_empty() { None } else { Some(rpr) }
}

/// Substitute value tokens in every paragraph under `root`.
///
/// Paragraphs whose paths are in `skip` are left alone. Returns the number
/// of tokens replaced.
pub fn substitute_tree(
    root: &mut XmlElement,
    resolver: &dyn ValueResolver,
    ctx: &mut RenderContext<'_>,
    skip: &HashSet<Vec<usize>>,
) -> usize {
    let mut substituted = 0;
    // Last to first: inserting paragraphs after one only shifts later paths
    for path in paragraph_paths(root).into_iter().rev() {
        if skip.contains(&path) {
            continue;
        }
        let Some((&position, parent_path)) = path.split_last() else {
            // The root itself is a paragraph; nowhere to put extra paragraphs
            if let Some(paragraph) = root.element_at_mut(&path) {
                substituted += substitute_paragraph(paragraph, resolver, ctx, false).0;
            }
            continue;
        };
        let in_cell = root.element_at(parent_path).is_some_and(|e| e.is("w:tc"));
        let Some(paragraph) = root.element_at_mut(&path) else {
            continue;
        };
        let (count, extra) = substitute_paragraph(paragraph, resolver, ctx, in_cell);
        substituted += count;
        if extra.is_empty() {
            continue;
        }
        if let Some(parent) = root.element_at_mut(parent_path) {
            let at = position + 1;
            parent
                .children
                .splice(at..at, extra.into_iter().map(XmlNode::Element));
        }
    }
    substituted
}

/// Remove every token matching `pred` from a paragraph.
///
/// Returns the number of tokens removed.
pub fn strip_tokens(
    paragraph: &mut XmlElement,
    ctx: &RenderContext<'_>,
    pred: impl Fn(&PlaceholderToken) -> bool,
) -> usize {
    let text = ParagraphText::build(paragraph).text;
    let tokens: Vec<PlaceholderToken> = scan_text(&text, ctx.data)
        .into_iter()
        .filter(|t| pred(t))
        .collect();
    for token in tokens.iter().rev() {
        let index = ParagraphText::build(paragraph);
        replace_span(paragraph, &index, token.span, "");
    }
    tokens.len()
}

/// Whether a paragraph shows nothing: whitespace text and no graphics.
pub fn is_blank(paragraph: &XmlElement) -> bool {
    ParagraphText::build(paragraph).text.trim().is_empty()
        && paragraph
            .find_paths(&|e| e.is("w:drawing") || e.is("w:pict"), false)
            .is_empty()
}

/// Rewrite image tokens whose key is an indirection in `resolver`'s scope.
///
/// `{%item.Photo:80x80%}` with `Photo = "ada_photo"` becomes
/// `{%ada_photo:80x80%}`, to be embedded by the image pass.
pub fn rewrite_image_keys(
    root: &mut XmlElement,
    resolver: &dyn ValueResolver,
    ctx: &RenderContext<'_>,
) {
    for path in paragraph_paths(root).into_iter().rev() {
        let Some(paragraph) = root.element_at_mut(&path) else {
            continue;
        };
        let text = ParagraphText::build(paragraph).text;
        let tokens = scan_text(&text, ctx.data);
        for token in tokens.iter().rev() {
            let TokenKind::Image { key, size } = &token.kind else {
                continue;
            };
            let Some(target) = resolver.image_key(key) else {
                continue;
            };
            let index = ParagraphText::build(paragraph);
            replace_span(
                paragraph,
                &index,
                token.span,
                &image_placeholder(&target, *size),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SpecialChar, TemplateContext, row};
    use crate::diagnostics::DiagnosticKind;
    use crate::options::RenderOptions;
    use crate::resolver::{ContextResolver, LoopItemResolver};
    use crate::text::paragraph_text;
    use docx_xml::parse;
    use pretty_assertions::assert_eq;

    fn data() -> TemplateContext {
        let mut data = TemplateContext::new();
        data.insert_scalar("Name", "Ada")
            .insert_scalar("Address", "1 Main St\nSpringfield")
            .insert_special_char("Check", SpecialChar::new('\u{F0FC}', "Wingdings"))
            .insert_rich_text("Notes", "<p>first <b>bold</b></p><p>second</p>");
        data
    }

    fn paragraph(xml: &str) -> XmlElement {
        parse(xml).unwrap().root
    }

    #[test]
    fn test_scalar_split_across_runs() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph(concat!(
            "<w:p><w:r><w:t>Hello {{</w:t></w:r><w:r><w:t>Na</w:t></w:r>",
            "<w:r><w:t>me}}!</w:t></w:r></w:p>"
        ));
        let (count, extra) =
            substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, false);
        assert_eq!(count, 1);
        assert!(extra.is_empty());
        assert_eq!(paragraph_text(&p), "Hello Ada!");
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_multiline_value_becomes_breaks() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t>At {{Address}}.</w:t></w:r></w:p>");
        substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, false);
        assert_eq!(paragraph_text(&p), "At 1 Main StSpringfield.");
        assert_eq!(p.find_paths(&|e| e.is("w:br"), false).len(), 1);
    }

    #[test]
    fn test_special_char_gets_own_run() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t>[{{Check}}]</w:t></w:r></w:p>");
        substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, false);
        let runs: Vec<&XmlElement> = p.child_elements().collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].text_content(), "\u{F0FC}");
        assert_eq!(
            runs[1]
                .find_child("w:rPr")
                .and_then(|r| r.find_child("w:rFonts"))
                .and_then(|f| f.attr("w:ascii")),
            Some("Wingdings")
        );
    }

    #[test]
    fn test_rich_text_joined_outside_cells() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t>{{Notes}}</w:t></w:r></w:p>");
        let (_, extra) =
            substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, false);
        assert!(extra.is_empty());
        assert_eq!(paragraph_text(&p), "first boldsecond");
        let bold = p
            .child_elements()
            .find(|r| r.text_content() == "bold")
            .unwrap();
        assert!(bold.find_child("w:rPr").unwrap().find_child("w:b").is_some());
    }

    #[test]
    fn test_rich_text_splits_paragraphs_in_cells() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph(
            "<w:p><w:pPr><w:jc w:val=\"left\"/></w:pPr><w:r><w:t>a {{Notes}} z</w:t></w:r></w:p>",
        );
        let (_, extra) =
            substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, true);
        assert_eq!(paragraph_text(&p), "a first bold");
        assert_eq!(extra.len(), 1);
        assert_eq!(paragraph_text(&extra[0]), "second z");
        assert!(extra[0].find_child("w:pPr").is_some());
    }

    #[test]
    fn test_rich_text_in_cell_hyperlink_is_joined() {
        let mut data = data();
        data.insert_rich_text("Steps", "<p>first</p><p>second</p><p>third</p>");
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph(concat!(
            "<w:p><w:hyperlink r:id=\"rId9\">",
            "<w:r><w:t>{{Steps}}</w:t></w:r></w:hyperlink></w:p>"
        ));
        let (count, extra) =
            substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, true);
        assert_eq!(count, 1);
        assert!(extra.is_empty());
        assert_eq!(paragraph_text(&p), "firstsecondthird");
        let link = p.find_child("w:hyperlink").unwrap();
        assert_eq!(link.find_paths(&|e| e.is("w:br"), false).len(), 2);
    }

    #[test]
    fn test_values_with_braces_stay_literal() {
        let mut data = data();
        data.insert_scalar("Code", "use {{name}} or {%logo%}");
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t>{{Code}} {{Name}}</w:t></w:r></w:p>");
        let resolver = ContextResolver::new(&data);
        assert_eq!(substitute_paragraph(&mut p, &resolver, &mut ctx, false).0, 2);
        // A second sweep finds nothing left to resolve
        assert_eq!(substitute_paragraph(&mut p, &resolver, &mut ctx, false).0, 0);
        crate::text::restore_braces(&mut p);
        assert_eq!(paragraph_text(&p), "use {{name}} or {%logo%} Ada");
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_absent_key_is_removed_and_reported() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t>x{{Nope}}y</w:t></w:r></w:p>");
        substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, false);
        assert_eq!(paragraph_text(&p), "xy");
        let diagnostics = ctx.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code.as_deref(), Some(UNKNOWN_KEY));
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Warning);
    }

    #[test]
    fn test_deferred_tokens_survive() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t>{{p.name}} {{Name}}</w:t></w:r></w:p>");
        substitute_paragraph(&mut p, &ContextResolver::new(&data), &mut ctx, false);
        assert_eq!(paragraph_text(&p), "{{p.name}} Ada");
    }

    #[test]
    fn test_substitute_tree_inserts_cell_paragraphs() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse(concat!(
            "<w:body><w:tbl><w:tr><w:tc><w:p><w:r><w:t>{{Notes}}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:t>{{Name}}</w:t></w:r></w:p></w:body>"
        ))
        .unwrap()
        .root;
        let count = substitute_tree(
            &mut body,
            &ContextResolver::new(&data),
            &mut ctx,
            &HashSet::new(),
        );
        assert_eq!(count, 2);
        let cell = body.element_at(&[0, 0, 0]).unwrap();
        assert_eq!(cell.child_elements().count(), 2);
        assert_eq!(paragraph_text(body.element_at(&[1]).unwrap()), "Ada");
    }

    #[test]
    fn test_rewrite_image_keys() {
        let data = data();
        let options = RenderOptions::default();
        let ctx = RenderContext::new(&data, &options);
        let item = row([("photo", "ada_photo")]);
        let mut p = paragraph("<w:p><w:r><w:t>{%p.photo:80x60%} {%Logo%}</w:t></w:r></w:p>");
        rewrite_image_keys(&mut p, &LoopItemResolver::new("p", &item), &ctx);
        assert_eq!(paragraph_text(&p), "{%ada_photo:80x60%} {%Logo%}");
    }

    #[test]
    fn test_strip_tokens_and_blank() {
        let data = data();
        let options = RenderOptions::default();
        let ctx = RenderContext::new(&data, &options);
        let mut p = paragraph("<w:p><w:r><w:t> {%for p in people%} </w:t></w:r></w:p>");
        assert!(!is_blank(&p));
        assert_eq!(strip_tokens(&mut p, &ctx, PlaceholderToken::is_loop), 1);
        assert!(is_blank(&p));

        let drawing = paragraph("<w:p><w:r><w:drawing/></w:r></w:p>");
        assert!(!is_blank(&drawing));
    }
}
