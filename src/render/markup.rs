//! Markdown → typed markup for the in-process renderer.
//!
//! `comrak` parses the assembled guide into a CommonMark AST; this module
//! flattens that AST into a short list of [`Block`]s that the layout code can
//! turn into `genpdf` elements one by one. Anything the layout cannot show
//! (raw HTML, footnote plumbing) is dropped here rather than in the layout.
//!
//! Heading anchors: a heading that ends in an explicit `{#id}` attribute (the
//! assembler writes one on every section) keeps that id and the attribute is
//! removed from its text. Other headings get an id from
//! [`AnchorRegistry`], which uses the same `slugify` as the assembler's table
//! of contents. Repeated titles get `-1`, `-2`, ... suffixes; the first
//! occurrence keeps the bare slug.

use crate::pipeline::anchor::{split_heading_id, AnchorRegistry};
use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};

/// A run of inline text with uniform formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    /// Link destination, verbatim from the markdown.
    pub link: Option<String>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Anchor id of an in-document link (`#id` → `id`).
    pub fn internal_target(&self) -> Option<&str> {
        self.link
            .as_deref()
            .and_then(|url| url.strip_prefix('#'))
            .filter(|id| !id.is_empty())
    }
}

/// First in-document link target among `spans`.
pub fn first_internal_target(spans: &[Span]) -> Option<&str> {
    spans.iter().find_map(Span::internal_target)
}

/// One line of a (possibly nested) list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// 0 for top-level items.
    pub depth: usize,
    /// `"1."`, `"•"`, `"–"`, ...
    pub marker: String,
    pub spans: Vec<Span>,
}

/// Block-level markup understood by the native layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: u8,
        text: String,
        anchor: String,
    },
    Paragraph(Vec<Span>),
    CodeBlock {
        /// Info string of the fence; empty for indented code.
        language: String,
        code: String,
    },
    List(Vec<ListItem>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Quote(Vec<Span>),
    Rule,
}

/// Parse markdown into layout blocks.
pub fn parse_markup(markdown: &str) -> Vec<Block> {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.front_matter_delimiter = Some("---".to_string());

    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &options);

    // Explicit ids win over derived ones, wherever they appear.
    let mut anchors = AnchorRegistry::new();
    for node in root.descendants() {
        if matches!(node.data.borrow().value, NodeValue::Heading(_)) {
            if let (_, Some(id)) = split_heading_id(&plain_text(node)) {
                anchors.reserve(id);
            }
        }
    }

    let mut blocks = Vec::new();
    for node in root.children() {
        push_block(node, &mut anchors, &mut blocks);
    }
    blocks
}

// ── Blocks ───────────────────────────────────────────────────────────────────

fn push_block<'a>(node: &'a AstNode<'a>, anchors: &mut AnchorRegistry, out: &mut Vec<Block>) {
    let data = node.data.borrow();
    match &data.value {
        NodeValue::Heading(heading) => {
            let full = plain_text(node);
            let (text, anchor) = match split_heading_id(&full) {
                (text, Some(id)) => {
                    anchors.claim(id);
                    (text.to_string(), id.to_string())
                }
                (text, None) => (text.to_string(), anchors.assign(text)),
            };
            out.push(Block::Heading {
                level: heading.level,
                text,
                anchor,
            });
        }
        NodeValue::Paragraph => {
            let spans = inline_spans(node);
            if !spans.is_empty() {
                out.push(Block::Paragraph(spans));
            }
        }
        NodeValue::CodeBlock(block) => out.push(Block::CodeBlock {
            language: block.info.trim().to_string(),
            code: block.literal.trim_end_matches('\n').to_string(),
        }),
        NodeValue::List(_) => {
            let mut items = Vec::new();
            collect_list(node, 0, &mut items);
            if !items.is_empty() {
                out.push(Block::List(items));
            }
        }
        NodeValue::Table(..) => out.push(collect_table(node)),
        NodeValue::BlockQuote => {
            let spans = joined_paragraphs(node);
            if !spans.is_empty() {
                out.push(Block::Quote(spans));
            }
        }
        NodeValue::ThematicBreak => out.push(Block::Rule),
        NodeValue::HtmlBlock(_) | NodeValue::FrontMatter(_) => {}
        _ => {
            for child in node.children() {
                push_block(child, anchors, out);
            }
        }
    }
}

fn collect_list<'a>(list: &'a AstNode<'a>, depth: usize, out: &mut Vec<ListItem>) {
    let (ordered, start) = match &list.data.borrow().value {
        NodeValue::List(l) => (l.list_type == ListType::Ordered, l.start),
        _ => (false, 1),
    };

    for (i, item) in list.children().enumerate() {
        let marker = if ordered {
            format!("{}.", start + i)
        } else if depth == 0 {
            "•".to_string()
        } else {
            "–".to_string()
        };

        let mut spans = Vec::new();
        let mut nested = Vec::new();
        for child in item.children() {
            let value = child.data.borrow().value.clone();
            match value {
                NodeValue::List(_) => nested.push(child),
                NodeValue::CodeBlock(block) => push_span(
                    &mut spans,
                    block.literal.trim_end().to_string(),
                    &Marks {
                        code: true,
                        ..Marks::default()
                    },
                ),
                _ => {
                    if !spans.is_empty() {
                        push_span(&mut spans, " ".to_string(), &Marks::default());
                    }
                    collect_spans(child, Marks::default(), &mut spans);
                }
            }
        }

        out.push(ListItem {
            depth,
            marker,
            spans,
        });
        for sub in nested {
            collect_list(sub, depth + 1, out);
        }
    }
}

fn collect_table<'a>(table: &'a AstNode<'a>) -> Block {
    let mut header = Vec::new();
    let mut rows = Vec::new();
    for row in table.children() {
        let is_header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
        let cells: Vec<String> = row.children().map(plain_text).collect();
        if is_header && header.is_empty() {
            header = cells;
        } else {
            rows.push(cells);
        }
    }

    let width = header
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));
    header.resize(width, String::new());
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Block::Table { header, rows }
}

fn joined_paragraphs<'a>(node: &'a AstNode<'a>) -> Vec<Span> {
    let mut spans = Vec::new();
    for child in node.children() {
        if !spans.is_empty() {
            push_span(&mut spans, " ".to_string(), &Marks::default());
        }
        collect_spans(child, Marks::default(), &mut spans);
    }
    spans
}

// ── Inlines ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Marks {
    bold: bool,
    italic: bool,
    code: bool,
    link: Option<String>,
}

fn inline_spans<'a>(node: &'a AstNode<'a>) -> Vec<Span> {
    let mut spans = Vec::new();
    collect_spans(node, Marks::default(), &mut spans);
    // Leading/trailing soft breaks turn into stray spaces.
    if let Some(first) = spans.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = spans.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    spans.retain(|s| !s.text.is_empty());
    spans
}

fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut spans = Vec::new();
    collect_spans(node, Marks::default(), &mut spans);
    spans
        .into_iter()
        .map(|s| s.text)
        .collect::<String>()
        .trim()
        .to_string()
}

fn collect_spans<'a>(node: &'a AstNode<'a>, marks: Marks, out: &mut Vec<Span>) {
    for child in node.children() {
        let data = child.data.borrow();
        match &data.value {
            NodeValue::Text(text) => push_span(out, text.to_string(), &marks),
            NodeValue::Code(code) => push_span(
                out,
                code.literal.to_string(),
                &Marks {
                    code: true,
                    ..marks.clone()
                },
            ),
            NodeValue::SoftBreak | NodeValue::LineBreak => push_span(out, " ".to_string(), &marks),
            NodeValue::Emph | NodeValue::Image(_) => collect_spans(
                child,
                Marks {
                    italic: true,
                    ..marks.clone()
                },
                out,
            ),
            NodeValue::Strong => collect_spans(
                child,
                Marks {
                    bold: true,
                    ..marks.clone()
                },
                out,
            ),
            NodeValue::Link(link) => collect_spans(
                child,
                Marks {
                    link: Some(link.url.clone()),
                    ..marks.clone()
                },
                out,
            ),
            NodeValue::HtmlInline(_) => {}
            _ => collect_spans(child, marks.clone(), out),
        }
    }
}

/// Append text, merging with the previous span when the marks match.
fn push_span(out: &mut Vec<Span>, text: String, marks: &Marks) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut() {
        if last.bold == marks.bold
            && last.italic == marks.italic
            && last.code == marks.code
            && last.link == marks.link
        {
            last.text.push_str(&text);
            return;
        }
    }
    out.push(Span {
        text,
        bold: marks.bold,
        italic: marks.italic,
        code: marks.code,
        link: marks.link.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::anchor::slugify;

    fn heading_anchors(md: &str) -> Vec<String> {
        parse_markup(md)
            .into_iter()
            .filter_map(|b| match b {
                Block::Heading { anchor, .. } => Some(anchor),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn heading_anchor_matches_slugify() {
        let blocks = parse_markup("## Domain 1: Cluster Architecture (25%)\n");
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 2,
                text: "Domain 1: Cluster Architecture (25%)".into(),
                anchor: slugify("Domain 1: Cluster Architecture (25%)"),
            }]
        );
    }

    #[test]
    fn repeated_headings_get_suffixes() {
        assert_eq!(
            heading_anchors("## Overview\n\n## Overview\n\n### Overview\n"),
            vec!["overview", "overview-1", "overview-2"]
        );
    }

    #[test]
    fn heading_with_inline_code_uses_plain_text() {
        let blocks = parse_markup("## Using `kubectl` *well*\n");
        match &blocks[0] {
            Block::Heading { text, anchor, .. } => {
                assert_eq!(text, "Using kubectl well");
                assert_eq!(anchor, "using-kubectl-well");
            }
            other => panic!("expected heading, got {other:?}"),
        }
    }

    #[test]
    fn paragraph_spans_carry_marks() {
        let blocks = parse_markup("Plain **bold** and `code` [link](#x)\n");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(spans[0], Span::plain("Plain "));
        assert!(spans[1].bold && spans[1].text == "bold");
        assert!(spans[3].code && spans[3].text == "code");
        assert_eq!(spans[5].link.as_deref(), Some("#x"));
        assert_eq!(spans[5].text, "link");
        assert_eq!(spans[5].internal_target(), Some("x"));
    }

    #[test]
    fn soft_breaks_become_spaces() {
        let blocks = parse_markup("one\ntwo\n");
        assert_eq!(blocks, vec![Block::Paragraph(vec![Span::plain("one two")])]);
    }

    #[test]
    fn fenced_code_keeps_language_and_lines() {
        let blocks = parse_markup("```yaml\napiVersion: v1\nkind: Pod\n```\n");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: "yaml".into(),
                code: "apiVersion: v1\nkind: Pod".into(),
            }]
        );
    }

    #[test]
    fn ordered_list_numbers_from_start() {
        let blocks = parse_markup("3. three\n4. four\n");
        let Block::List(items) = &blocks[0] else {
            panic!("expected list");
        };
        let markers: Vec<_> = items.iter().map(|i| i.marker.as_str()).collect();
        assert_eq!(markers, vec!["3.", "4."]);
    }

    #[test]
    fn nested_lists_are_flattened_with_depth() {
        let blocks = parse_markup("- parent\n  - child\n- sibling\n");
        let Block::List(items) = &blocks[0] else {
            panic!("expected list");
        };
        let shape: Vec<(usize, &str)> = items
            .iter()
            .map(|i| (i.depth, i.spans[0].text.as_str()))
            .collect();
        assert_eq!(shape, vec![(0, "parent"), (1, "child"), (0, "sibling")]);
        assert_eq!(items[1].marker, "–");
    }

    #[test]
    fn tables_have_header_and_padded_rows() {
        let md = "| Domain | Weight |\n|---|---|\n| Storage | 10% |\n| Troubleshooting |\n";
        let blocks = parse_markup(md);
        assert_eq!(
            blocks,
            vec![Block::Table {
                header: vec!["Domain".into(), "Weight".into()],
                rows: vec![
                    vec!["Storage".into(), "10%".into()],
                    vec!["Troubleshooting".into(), String::new()],
                ],
            }]
        );
    }

    #[test]
    fn rules_quotes_and_html() {
        let blocks = parse_markup("> tip: read\n> twice\n\n---\n\n<div>raw</div>\n");
        assert_eq!(
            blocks,
            vec![
                Block::Quote(vec![Span::plain("tip: read twice")]),
                Block::Rule,
            ]
        );
    }

    #[test]
    fn assembled_toc_becomes_link_list() {
        let md = "## Table of Contents\n\n1. [Overview](#overview)\n2. [Deep Dive](#deep-dive)\n";
        let blocks = parse_markup(md);
        let Block::List(items) = &blocks[1] else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        let targets: Vec<_> = items
            .iter()
            .map(|i| first_internal_target(&i.spans))
            .collect();
        assert_eq!(targets, vec![Some("overview"), Some("deep-dive")]);
    }

    #[test]
    fn explicit_heading_id_is_honoured_and_stripped() {
        let blocks = parse_markup("## Kubernetes v1.30 Features {#kubernetes-v130-features}\n");
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 2,
                text: "Kubernetes v1.30 Features".into(),
                anchor: "kubernetes-v130-features".into(),
            }]
        );
    }

    #[test]
    fn explicit_ids_are_reserved_before_derived_ones() {
        // The sub-heading comes first but must not take the section's id.
        let md = "### Deep Dive\n\n## Deep Dive {#deep-dive}\n";
        assert_eq!(heading_anchors(md), vec!["deep-dive-1", "deep-dive"]);
    }

    #[test]
    fn external_links_have_no_internal_target() {
        let blocks = parse_markup("See [docs](https://kubernetes.io/docs).\n");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(first_internal_target(spans), None);
        assert!(spans.iter().any(|s| s.link.is_some()));
    }
}
