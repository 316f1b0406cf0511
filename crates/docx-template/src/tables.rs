/*
 * tables.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expanding `{{#docTable name}}` ... `{{/docTable}}` regions.
//!
//! Markers inside an existing table repeat rows: the rows from the start
//! marker row to the end marker row form a template that is cloned once per
//! data row, with marker-only rows dropped. A start marker alone in an
//! otherwise empty row stands for the row after it.
//!
//! Markers in standalone paragraphs synthesize a new table whose columns are
//! the `item.<field>` references in the template text, or the keys of the
//! first data row when there are none.
//!
//! A name with regions in both places is treated as a row region; its
//! standalone markers are removed and the content between them kept.

use crate::context::Row;
use crate::diagnostics::{DANGLING_TABLE_END, EMPTY_TABLE, UNCLOSED_TABLE, UNKNOWN_TABLE};
use crate::error::TemplateResult;
use crate::plan::{Edit, ExpansionPlan};
use crate::render_context::RenderContext;
use crate::resolver::RowResolver;
use crate::runs::text_run;
use crate::scanner::scan_text;
use crate::substitute::{is_blank, rewrite_image_keys, strip_tokens, substitute_tree};
use crate::text::{ParagraphText, inert};
use crate::token::{PlaceholderToken, TableMarker, TokenKind};
use docx_xml::{XmlElement, XmlNode, parse_fragment};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Total width of a synthesized table, in twentieths of a point.
const SYNTHESIZED_TABLE_WIDTH: u32 = 9000;

const SYNTHESIZED_TABLE_PROPERTIES: &str = concat!(
    r#"<w:tblPr>"#,
    r#"<w:tblStyle w:val="TableGrid"/>"#,
    r#"<w:tblW w:w="0" w:type="auto"/>"#,
    r#"<w:tblBorders>"#,
    r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
    r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
    r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
    r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
    r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
    r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
    r#"</w:tblBorders>"#,
    r#"<w:tblLook w:val="04A0" w:firstRow="1" w:lastRow="0" w:firstColumn="1" w:lastColumn="0" w:noHBand="0" w:noVBand="1"/>"#,
    r#"</w:tblPr>"#,
);

/// A table region: a range of children of the table (row regions) or of
/// the root (standalone regions), both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    start: usize,
    end: usize,
    name: String,
    raw: String,
}

/// Marker problems found while pairing, as `(code, raw marker)`.
type Problems = Vec<(&'static str, String)>;

/// Paths of paragraphs that belong to table regions.
///
/// The scalar pass leaves these to the table pass, where row fields are in
/// scope.
pub fn protected_paragraphs(
    root: &XmlElement,
    ctx: &RenderContext<'_>,
) -> HashSet<Vec<usize>> {
    let mut protected = HashSet::new();

    for table_path in root.find_paths(&|e| e.is("w:tbl"), true) {
        let Some(table) = root.element_at(&table_path) else {
            continue;
        };
        let (regions, _) = row_regions(table, ctx);
        for region in regions {
            for index in region.start..=region.end {
                let mut prefix = table_path.clone();
                prefix.push(index);
                add_paragraphs(table.children.get(index), &prefix, &mut protected);
            }
        }
    }

    let (regions, _) = standalone_regions(root, ctx);
    for region in regions {
        for index in region.start..=region.end {
            add_paragraphs(root.children.get(index), &[index], &mut protected);
        }
    }
    protected
}

fn add_paragraphs(node: Option<&XmlNode>, prefix: &[usize], out: &mut HashSet<Vec<usize>>) {
    let Some(element) = node.and_then(XmlNode::as_element) else {
        return;
    };
    if element.is("w:p") {
        out.insert(prefix.to_vec());
    }
    for path in element.find_paths(&|e| e.is("w:p"), true) {
        let mut full = prefix.to_vec();
        full.extend(path);
        out.insert(full);
    }
}

/// Expand every table region under `root`. Returns the number of regions
/// expanded.
pub fn expand_tables(
    root: &mut XmlElement,
    ctx: &mut RenderContext<'_>,
) -> TemplateResult<usize> {
    let mut handled = HashSet::new();
    let mut expanded = 0;

    // Inner tables first, so outer row templates clone expanded content
    for table_path in root.find_paths(&|e| e.is("w:tbl"), true).into_iter().rev() {
        let Some(table) = root.element_at_mut(&table_path) else {
            continue;
        };
        expanded += expand_row_regions(table, ctx, &mut handled)?;
    }
    expanded += expand_standalone_regions(root, ctx, &handled)?;

    if expanded > 0 {
        tracing::debug!(part = %ctx.part, regions = expanded, "expanded tables");
    }
    Ok(expanded)
}

// =============================================================================
// Row regions in existing tables
// =============================================================================

fn expand_row_regions(
    table: &mut XmlElement,
    ctx: &mut RenderContext<'_>,
    handled: &mut HashSet<String>,
) -> TemplateResult<usize> {
    let (regions, problems) = row_regions(table, ctx);
    report(ctx, problems);
    if regions.is_empty() {
        return Ok(0);
    }

    let data = ctx.data;
    let mut plan = ExpansionPlan::new();
    for region in &regions {
        let template: Vec<XmlElement> = table.children[region.start..=region.end]
            .iter()
            .filter_map(XmlNode::as_element)
            .filter(|e| e.is("w:tr"))
            .map(|row| {
                let mut row = row.clone();
                strip_row_markers(&mut row, ctx);
                row
            })
            .filter(|row| !row_is_blank(row))
            .collect();

        let rows = lookup_rows(ctx, &region.name, &region.raw);
        let mut nodes = Vec::with_capacity(rows.len() * template.len());
        for row in rows {
            let mut holder = table.clone_shallow();
            holder.children = template.iter().cloned().map(XmlNode::Element).collect();
            let resolver = RowResolver::new(row, data);
            substitute_tree(&mut holder, &resolver, ctx, &HashSet::new());
            rewrite_image_keys(&mut holder, &resolver, ctx);
            nodes.extend(holder.children);
        }
        tracing::debug!(
            table = %region.name,
            rows = rows.len(),
            template_rows = template.len(),
            "expanded row region"
        );

        plan.push(Edit::ReplaceChildren {
            parent: Vec::new(),
            start: region.start,
            end: region.end + 1,
            nodes,
        });
        handled.insert(region.name.clone());
    }
    let count = plan.apply(table)?;

    // Residual markers anywhere in the table
    for path in table.find_paths(&|e| e.is("w:p"), true) {
        if let Some(paragraph) = table.element_at_mut(&path) {
            strip_tokens(paragraph, ctx, PlaceholderToken::is_table);
        }
    }
    Ok(count)
}

/// Pair start and end markers over the rows of one table.
fn row_regions(table: &XmlElement, ctx: &RenderContext<'_>) -> (Vec<Region>, Problems) {
    let rows: Vec<usize> = table
        .children
        .iter()
        .enumerate()
        .filter(|(_, n)| n.as_element().is_some_and(|e| e.is("w:tr")))
        .map(|(i, _)| i)
        .collect();
    let markers: Vec<Vec<PlaceholderToken>> = rows
        .iter()
        .map(|&i| {
            table.children[i]
                .as_element()
                .map(|row| row_markers(row, ctx))
                .unwrap_or_default()
        })
        .collect();

    let mut regions = Vec::new();
    let mut problems = Problems::new();
    let mut r = 0;
    while r < rows.len() {
        let here = &markers[r];
        let Some(start) = here.iter().position(is_start) else {
            problems.extend(
                here.iter()
                    .filter(|t| is_end(t))
                    .map(|t| (DANGLING_TABLE_END, t.raw.clone())),
            );
            r += 1;
            continue;
        };
        let token = &here[start];
        let TokenKind::Table(TableMarker::Start { name }) = &token.kind else {
            r += 1;
            continue;
        };

        let end_row = if here[start + 1..].iter().any(is_end) {
            r
        } else {
            // The first later row with a marker must close the region
            let next = (r + 1..rows.len()).find(|&m| !markers[m].is_empty());
            match next {
                Some(m) if markers[m].first().is_some_and(is_end) => m,
                _ => {
                    let start_row = table.children[rows[r]].as_element();
                    let marker_only = start_row.is_some_and(|row| {
                        let mut row = row.clone();
                        strip_row_markers(&mut row, ctx);
                        row_is_blank(&row)
                    });
                    if marker_only && r + 1 < rows.len() {
                        r + 1
                    } else {
                        r
                    }
                }
            }
        };

        regions.push(Region {
            start: rows[r],
            end: rows[end_row],
            name: name.clone(),
            raw: token.raw.clone(),
        });
        r = end_row + 1;
    }
    (regions, problems)
}

/// Paths of a row's own paragraphs, excluding those of nested tables.
fn row_paragraph_paths(row: &XmlElement) -> Vec<Vec<usize>> {
    fn walk(element: &XmlElement, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        for (i, child) in element.children.iter().enumerate() {
            let XmlNode::Element(child) = child else {
                continue;
            };
            path.push(i);
            if child.is("w:p") {
                out.push(path.clone());
            } else if !child.is("w:tbl") {
                walk(child, path, out);
            }
            path.pop();
        }
    }
    let mut out = Vec::new();
    walk(row, &mut Vec::new(), &mut out);
    out
}

fn row_markers(row: &XmlElement, ctx: &RenderContext<'_>) -> Vec<PlaceholderToken> {
    row_paragraph_paths(row)
        .iter()
        .filter_map(|path| row.element_at(path))
        .flat_map(|p| scan_text(&ParagraphText::build(p).text, ctx.data))
        .filter(PlaceholderToken::is_table)
        .collect()
}

fn strip_row_markers(row: &mut XmlElement, ctx: &RenderContext<'_>) {
    for path in row_paragraph_paths(row) {
        if let Some(paragraph) = row.element_at_mut(&path) {
            strip_tokens(paragraph, ctx, PlaceholderToken::is_table);
        }
    }
}

fn row_is_blank(row: &XmlElement) -> bool {
    row_paragraph_paths(row)
        .iter()
        .filter_map(|path| row.element_at(path))
        .all(is_blank)
}

// =============================================================================
// Standalone regions
// =============================================================================

fn expand_standalone_regions(
    root: &mut XmlElement,
    ctx: &mut RenderContext<'_>,
    handled: &HashSet<String>,
) -> TemplateResult<usize> {
    let (regions, problems) = standalone_regions(root, ctx);
    report(ctx, problems);
    if regions.is_empty() {
        return Ok(0);
    }

    let mut plan = ExpansionPlan::new();
    for region in &regions {
        let nodes = if handled.contains(&region.name) {
            unwrap_region(root, region, ctx)
        } else {
            synthesize_region(root, region, ctx)?
        };
        plan.push(Edit::ReplaceChildren {
            parent: Vec::new(),
            start: region.start,
            end: region.end + 1,
            nodes,
        });
    }
    Ok(plan.apply(root)?)
}

/// Pair markers in the root's direct child paragraphs.
fn standalone_regions(root: &XmlElement, ctx: &RenderContext<'_>) -> (Vec<Region>, Problems) {
    let mut regions = Vec::new();
    let mut problems = Problems::new();
    let mut open: Option<(usize, String, String)> = None;

    for (i, child) in root.children.iter().enumerate() {
        let Some(paragraph) = child.as_element().filter(|e| e.is("w:p")) else {
            continue;
        };
        let text = ParagraphText::build(paragraph).text;
        for token in scan_text(&text, ctx.data) {
            match token.kind {
                TokenKind::Table(TableMarker::Start { name }) => {
                    if let Some((_, _, raw)) = open.replace((i, name, token.raw)) {
                        problems.push((UNCLOSED_TABLE, raw));
                    }
                }
                TokenKind::Table(TableMarker::End) => match open.take() {
                    Some((start, name, raw)) => regions.push(Region {
                        start,
                        end: i,
                        name,
                        raw,
                    }),
                    None => problems.push((DANGLING_TABLE_END, token.raw)),
                },
                _ => {}
            }
        }
    }
    if let Some((_, _, raw)) = open {
        problems.push((UNCLOSED_TABLE, raw));
    }
    (regions, problems)
}

/// Region content with markers removed.
fn unwrap_region(root: &XmlElement, region: &Region, ctx: &RenderContext<'_>) -> Vec<XmlNode> {
    root.children[region.start..=region.end]
        .iter()
        .filter_map(|node| {
            let mut node = node.clone();
            if let Some(p) = node.as_element_mut().filter(|e| e.is("w:p")) {
                if strip_tokens(p, ctx, PlaceholderToken::is_table) > 0 && is_blank(p) {
                    return None;
                }
            }
            Some(node)
        })
        .collect()
}

/// A new table for a standalone region.
fn synthesize_region(
    root: &XmlElement,
    region: &Region,
    ctx: &mut RenderContext<'_>,
) -> TemplateResult<Vec<XmlNode>> {
    let rows = lookup_rows(ctx, &region.name, &region.raw);
    let mut columns = template_columns(root, region, ctx);
    if columns.is_empty() {
        if let Some(first) = rows.first() {
            columns = first.keys().cloned().collect();
        }
    }
    if columns.is_empty() {
        ctx.warn(
            EMPTY_TABLE,
            format!("Table '{}' has no columns", region.name),
            Some(&region.raw),
        );
        return Ok(Vec::new());
    }

    tracing::debug!(
        table = %region.name,
        columns = columns.len(),
        rows = rows.len(),
        "synthesized table"
    );
    Ok(vec![XmlNode::Element(build_table(&columns, rows)?)])
}

/// Distinct `item.<field>` fields referenced in a standalone region.
fn template_columns(
    root: &XmlElement,
    region: &Region,
    ctx: &RenderContext<'_>,
) -> IndexSet<String> {
    let mut paragraphs = HashSet::new();
    for index in region.start..=region.end {
        add_paragraphs(root.children.get(index), &[index], &mut paragraphs);
    }
    let mut paths: Vec<Vec<usize>> = paragraphs.into_iter().collect();
    paths.sort();

    let mut columns = IndexSet::new();
    for path in paths {
        let Some(paragraph) = root.element_at(&path) else {
            continue;
        };
        for token in scan_text(&ParagraphText::build(paragraph).text, ctx.data) {
            let Some(key) = token.key().filter(|_| token.is_value()) else {
                continue;
            };
            if ctx.data.scalar(key).is_some() {
                continue;
            }
            if let Some((_, field)) = key.split_once('.') {
                columns.insert(field.to_string());
            }
        }
    }
    columns
}

fn build_table(columns: &IndexSet<String>, rows: &[Row]) -> TemplateResult<XmlElement> {
    let width = SYNTHESIZED_TABLE_WIDTH / columns.len().max(1) as u32;
    let mut table = XmlElement::new("w:tbl");
    table.children.extend(
        parse_fragment(SYNTHESIZED_TABLE_PROPERTIES)?
            .into_iter()
            .map(XmlNode::Element),
    );

    let mut grid = XmlElement::new("w:tblGrid");
    for _ in columns {
        grid.children.push(XmlNode::Element(
            XmlElement::new("w:gridCol").with_attr("w:w", width.to_string()),
        ));
    }
    table.children.push(XmlNode::Element(grid));

    let header_properties = XmlElement::new("w:rPr").with_child(XmlElement::new("w:b"));
    let mut header = XmlElement::new("w:tr")
        .with_child(XmlElement::new("w:trPr").with_child(XmlElement::new("w:tblHeader")));
    for column in columns {
        let paragraph = XmlElement::new("w:p")
            .with_child(
                XmlElement::new("w:pPr")
                    .with_child(XmlElement::new("w:jc").with_attr("w:val", "center")),
            )
            .with_child(text_run(&inert(column), Some(&header_properties)));
        header.children.push(XmlNode::Element(cell(width, paragraph)));
    }
    table.children.push(XmlNode::Element(header));

    for row in rows {
        let mut tr = XmlElement::new("w:tr");
        for column in columns {
            let mut paragraph = XmlElement::new("w:p");
            if let Some(value) = row.get(column).filter(|v| !v.is_empty()) {
                paragraph
                    .children
                    .push(XmlNode::Element(text_run(&inert(value), None)));
            }
            tr.children.push(XmlNode::Element(cell(width, paragraph)));
        }
        table.children.push(XmlNode::Element(tr));
    }
    Ok(table)
}

fn cell(width: u32, paragraph: XmlElement) -> XmlElement {
    XmlElement::new("w:tc")
        .with_child(
            XmlElement::new("w:tcPr").with_child(
                XmlElement::new("w:tcW")
                    .with_attr("w:w", width.to_string())
                    .with_attr("w:type", "dxa"),
            ),
        )
        .with_child(paragraph)
}

// =============================================================================
// Shared helpers
// =============================================================================

fn is_start(token: &PlaceholderToken) -> bool {
    matches!(token.kind, TokenKind::Table(TableMarker::Start { .. }))
}

fn is_end(token: &PlaceholderToken) -> bool {
    matches!(token.kind, TokenKind::Table(TableMarker::End))
}

/// Rows for a table name, or none with a warning (an error in strict mode).
fn lookup_rows<'a>(ctx: &mut RenderContext<'a>, name: &str, raw: &str) -> &'a [Row] {
    let data = ctx.data;
    match data.rows(name, true) {
        Some(rows) => rows,
        None => {
            ctx.warn_or_error(
                UNKNOWN_TABLE,
                format!("Unknown table '{}'", name),
                Some(raw),
            );
            &[]
        }
    }
}

fn report(ctx: &mut RenderContext<'_>, problems: Problems) {
    for (code, raw) in problems {
        let title = match code {
            UNCLOSED_TABLE => "Table start without a matching end",
            _ => "Table end without a matching start",
        };
        ctx.warn(code, title, Some(&raw));
    }
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
        data.insert_table(
            "nums",
            vec![row([("a", "1"), ("b", "2")]), row([("a", "3"), ("b", "4")])],
        )
        .insert_scalar("Title", "Report");
        data
    }

    fn p(text: &str) -> String {
        format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text)
    }

    fn tr(cells: &[&str]) -> String {
        let cells: String = cells
            .iter()
            .map(|c| {
                format!(
                    "<w:tc><w:tcPr><w:shd w:fill=\"EEEEEE\"/></w:tcPr>{}</w:tc>",
                    p(c)
                )
            })
            .collect();
        format!("<w:tr>{}</w:tr>", cells)
    }

    fn parse_body(inner: &str) -> XmlElement {
        parse(&format!("<w:body>{}</w:body>", inner)).unwrap().root
    }

    fn table_rows(table: &XmlElement) -> Vec<Vec<String>> {
        table
            .child_elements()
            .filter(|e| e.is("w:tr"))
            .map(|tr| {
                tr.child_elements()
                    .filter(|e| e.is("w:tc"))
                    .map(|tc| tc.text_content())
                    .collect()
            })
            .collect()
    }

    fn codes(ctx: RenderContext<'_>) -> Vec<String> {
        ctx.into_diagnostics()
            .into_iter()
            .filter_map(|d| d.code)
            .collect()
    }

    #[test]
    fn test_synthesized_table() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!(
            "{}{}{}{}{}",
            p("before"),
            p("{{#docTable nums}}"),
            p("{{item.a}} {{item.b}}"),
            p("{{/docTable}}"),
            p("after")
        ));
        assert_eq!(expand_tables(&mut body, &mut ctx).unwrap(), 1);

        let children: Vec<&XmlElement> = body.child_elements().collect();
        assert_eq!(children.len(), 3);
        assert_eq!(paragraph_text(children[0]), "before");
        assert_eq!(paragraph_text(children[2]), "after");
        let table = children[1];
        assert!(table.is("w:tbl"));
        assert_eq!(
            table_rows(table),
            vec![vec!["a", "b"], vec!["1", "2"], vec!["3", "4"]]
        );
        let header = table.child_elements().find(|e| e.is("w:tr")).unwrap();
        assert!(header.find_child("w:trPr").is_some());
        assert!(codes(ctx).is_empty());
    }

    #[test]
    fn test_synthesized_columns_fall_back_to_first_row() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!("{}{}", p("{{#docTable nums}}"), p("{{/docTable}}")));
        expand_tables(&mut body, &mut ctx).unwrap();
        let table = body.child_elements().next().unwrap();
        assert_eq!(table_rows(table)[0], vec!["a", "b"]);
    }

    #[test]
    fn test_marker_row_repeats_template_row() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!(
            "<w:tbl><w:tblPr/>{}{}{}{}</w:tbl>",
            tr(&["A", "B"]),
            tr(&["{{#docTable nums}}", ""]),
            tr(&["{{a}}", "{{item.b}}"]),
            tr(&["{{/docTable}}", ""])
        ));
        assert_eq!(expand_tables(&mut body, &mut ctx).unwrap(), 1);

        let table = body.child_elements().next().unwrap();
        assert_eq!(
            table_rows(table),
            vec![vec!["A", "B"], vec!["1", "2"], vec!["3", "4"]]
        );
        // Cell formatting of the template row survives
        let shaded = table.find_paths(&|e| e.is("w:shd"), true);
        assert_eq!(shaded.len(), 6);
        assert!(!table.text_content().contains("docTable"));
    }

    #[test]
    fn test_marker_only_row_without_end_uses_next_row() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!(
            "<w:tbl>{}{}{}</w:tbl>",
            tr(&["{{#docTable nums}}"]),
            tr(&["{{a}}-{{b}}"]),
            tr(&["Total"])
        ));
        expand_tables(&mut body, &mut ctx).unwrap();
        let table = body.child_elements().next().unwrap();
        assert_eq!(
            table_rows(table),
            vec![vec!["1-2"], vec!["3-4"], vec!["Total"]]
        );
    }

    #[test]
    fn test_mixed_markers_in_one_row() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!(
            "<w:tbl>{}{}</w:tbl>",
            tr(&["Head"]),
            tr(&["{{#docTable nums}}{{item.a}}{{/docTable}}"])
        ));
        expand_tables(&mut body, &mut ctx).unwrap();
        let table = body.child_elements().next().unwrap();
        assert_eq!(table_rows(table), vec![vec!["Head"], vec!["1"], vec!["3"]]);
    }

    #[test]
    fn test_in_cell_markers_take_precedence() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!(
            "{}<w:tbl>{}</w:tbl>{}",
            p("{{#docTable nums}}"),
            tr(&["{{#docTable nums}}{{a}}{{/docTable}}"]),
            p("{{/docTable}}")
        ));
        expand_tables(&mut body, &mut ctx).unwrap();
        let children: Vec<&XmlElement> = body.child_elements().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(table_rows(children[0]), vec![vec!["1"], vec!["3"]]);
    }

    #[test]
    fn test_unknown_table_and_unpaired_markers() {
        let data = data();
        let options = RenderOptions::default();
        let mut ctx = RenderContext::new(&data, &options);
        let mut body = parse_body(&format!(
            "{}{}{}{}",
            p("{{/docTable}}"),
            p("{{#docTable missing}}"),
            p("{{/docTable}}"),
            p("{{#docTable nums}}")
        ));
        expand_tables(&mut body, &mut ctx).unwrap();
        assert_eq!(
            codes(ctx),
            vec![DANGLING_TABLE_END, UNCLOSED_TABLE, UNKNOWN_TABLE, EMPTY_TABLE]
        );
        let texts: Vec<String> = body.child_elements().map(paragraph_text).collect();
        assert_eq!(texts, vec!["{{/docTable}}", "{{#docTable nums}}"]);
    }

    #[test]
    fn test_protected_paragraphs() {
        let data = data();
        let options = RenderOptions::default();
        let ctx = RenderContext::new(&data, &options);
        let body = parse_body(&format!(
            "{}{}{}{}<w:tbl>{}{}</w:tbl>",
            p("{{Title}}"),
            p("{{#docTable nums}}"),
            p("{{item.a}}"),
            p("{{/docTable}}"),
            tr(&["{{Title}}"]),
            tr(&["{{#docTable nums}}{{a}}{{/docTable}}"])
        ));
        let protected = protected_paragraphs(&body, &ctx);
        assert!(!protected.contains(&vec![0]));
        assert!(protected.contains(&vec![1]));
        assert!(protected.contains(&vec![2]));
        assert!(protected.contains(&vec![3]));
        assert!(!protected.contains(&vec![4, 0, 0, 1]));
        assert!(protected.contains(&vec![4, 1, 0, 1]));
    }
}
