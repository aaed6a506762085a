//! Fallback strategy: in-process markdown → PDF with `genpdf`.
//!
//! ## Data Flow
//!
//! ```text
//! markdown ──▶ markup::parse_markup ──▶ Vec<Block>
//!                                          │
//!            ┌─────────────────────────────┘
//!            ▼
//!   layout pass 1 (footer "Page N") ──▶ outline::count_pages ──▶ M
//!   layout pass 2 (footer "Page N of M", heading and link positions recorded)
//!            │
//!            ▼
//!   outline::apply_outline ──▶ PDF bytes (outline, named dests, link annots)
//! ```
//!
//! Layout is CPU-bound and `genpdf` documents are `!Send`, so the whole
//! render runs inside `tokio::task::spawn_blocking` and only the finished
//! bytes cross back to the async side.
//!
//! `genpdf` does not report where it placed an element, so every top-level
//! element is wrapped in [`Tracked`], which advances a shared cursor by the
//! height it rendered. The page decorator resets the cursor below the running
//! header on each new page.

use crate::error::RenderError;
use crate::output::Engine;
use crate::render::markup::{first_internal_target, parse_markup, Block, ListItem, Span};
use crate::render::outline::{apply_outline, count_pages, HeadingMark, LinkMark};
use crate::render::style::{LoadedFonts, Rgb, StyleSheet};
use crate::render::{RenderJob, RenderStrategy};
use async_trait::async_trait;
use genpdf::elements::{Break, FrameCellDecorator, LinearLayout, Paragraph, TableLayout};
use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{Font, FontFamily};
use genpdf::render::Area;
use genpdf::style::{Color, Style};
use genpdf::{Alignment, Context, Element, Margins, Mm, PageDecorator, Position, RenderResult, Size};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

const ENGINE_NAME: &str = "native";

/// Height reserved at the bottom of each page for the footer.
const FOOTER_HEIGHT_MM: f64 = 8.0;
/// Space between the header rule and the body.
const HEADER_GAP_MM: f64 = 4.0;
/// Left indent per list nesting level.
const LIST_INDENT_MM: f64 = 5.0;
/// Left indent of block quotes.
const QUOTE_INDENT_MM: f64 = 6.0;
const PT_PER_MM: f64 = 72.0 / 25.4;

/// Renders the job's markdown in-process.
#[derive(Debug, Clone)]
pub struct NativeStrategy {
    style: StyleSheet,
}

impl NativeStrategy {
    pub fn new(style: StyleSheet) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &StyleSheet {
        &self.style
    }
}

#[async_trait]
impl RenderStrategy for NativeStrategy {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn engine(&self) -> Engine {
        Engine::Fallback
    }

    async fn attempt(&self, job: &RenderJob) -> Result<(), RenderError> {
        let style = self.style.clone();
        let title = job.title.clone();
        let markdown = job.markdown.clone();
        let output = job.output_path.clone();

        tokio::task::spawn_blocking(move || {
            let pdf = render_pdf(&title, &markdown, &style)?;
            std::fs::write(&output, pdf).map_err(|e| RenderError::Io {
                path: output.clone(),
                source: e,
            })
        })
        .await
        .map_err(|e| RenderError::Internal(format!("native render task failed: {e}")))?
    }
}

/// Render markdown to PDF bytes. Blocking.
pub fn render_pdf(title: &str, markdown: &str, style: &StyleSheet) -> Result<Vec<u8>, RenderError> {
    let blocks = parse_markup(markdown);
    let fonts = style.fonts.load()?;

    let draft = layout(title, &blocks, style, &fonts, None)?;
    let total = count_pages(&draft.pdf)?;
    debug!("{}: {} blocks on {} pages", title, blocks.len(), total);

    let laid = layout(title, &blocks, style, &fonts, Some(total))?;
    debug!(
        "{}: {} headings, {} internal links",
        title,
        laid.headings.len(),
        laid.links.len()
    );
    match apply_outline(&laid.pdf, &laid.headings, &laid.links) {
        Ok(pdf) => Ok(pdf),
        Err(e) => {
            warn!("{}: outline skipped: {}", title, e);
            Ok(laid.pdf)
        }
    }
}

struct Laid {
    pdf: Vec<u8>,
    headings: Vec<HeadingMark>,
    links: Vec<LinkMark>,
}

fn layout(
    title: &str,
    blocks: &[Block],
    style: &StyleSheet,
    fonts: &LoadedFonts,
    total_pages: Option<usize>,
) -> Result<Laid, RenderError> {
    let mut doc = genpdf::Document::new(fonts.body.clone());
    let code_family = fonts.code.clone().map(|family| doc.add_font_family(family));

    doc.set_title(title);
    doc.set_paper_size(Size::new(style.paper_width_mm, style.paper_height_mm));
    doc.set_font_size(style.body_font_size);
    doc.set_line_spacing(style.line_spacing);

    let state = Rc::new(LayoutState::new(style));
    doc.set_page_decorator(GuidePageDecorator::new(style, total_pages, Rc::clone(&state)));

    let writer = BlockWriter {
        style,
        code_family,
        state: &state,
    };
    for block in blocks {
        writer.push(&mut doc, block)?;
    }

    let mut pdf = Vec::new();
    doc.render(&mut pdf)
        .map_err(|e| RenderError::Layout(e.to_string()))?;
    Ok(Laid {
        pdf,
        headings: state.headings.take(),
        links: state.links.take(),
    })
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

// ── Layout position ──────────────────────────────────────────────────────────

/// Where layout currently is on the page.
struct LayoutState {
    /// 1-based; 0 before the first page is decorated.
    page: Cell<usize>,
    /// Distance from the top edge of the page to the next element, in mm.
    cursor_mm: Cell<f64>,
    left_mm: f64,
    page_height_mm: f64,
    headings: RefCell<Vec<HeadingMark>>,
    links: RefCell<Vec<LinkMark>>,
}

impl LayoutState {
    fn new(style: &StyleSheet) -> Self {
        Self {
            page: Cell::new(0),
            cursor_mm: Cell::new(style.margin_mm),
            left_mm: style.margin_mm,
            page_height_mm: style.paper_height_mm,
            headings: RefCell::new(Vec::new()),
            links: RefCell::new(Vec::new()),
        }
    }

    /// PDF user-space y (points, origin bottom-left) of a distance from the
    /// top of the page.
    fn pdf_y(&self, from_top_mm: f64) -> f32 {
        ((self.page_height_mm - from_top_mm) * PT_PER_MM) as f32
    }

    fn pdf_x(&self, from_left_mm: f64) -> f32 {
        (from_left_mm * PT_PER_MM) as f32
    }
}

/// What a [`Tracked`] element reports once it has been placed.
enum Track {
    Plain,
    Heading {
        level: u8,
        title: String,
        anchor: String,
        recorded: bool,
    },
    /// The element holds an in-document link; its rendered box becomes the
    /// clickable area.
    Link { target: String, indent_mm: f64 },
}

impl Track {
    fn link(spans: &[Span], indent_mm: f64) -> Self {
        match first_internal_target(spans) {
            Some(target) => Track::Link {
                target: target.to_string(),
                indent_mm,
            },
            None => Track::Plain,
        }
    }
}

/// A top-level element that advances the shared cursor by its height.
struct Tracked<E> {
    inner: E,
    state: Rc<LayoutState>,
    track: Track,
}

impl<E: Element> Element for Tracked<E> {
    fn render(&mut self, context: &Context, area: Area<'_>, style: Style) -> Result<RenderResult, Error> {
        let top = self.state.cursor_mm.get();
        let width = f64::from(area.size().width);
        let result = self.inner.render(context, area, style)?;
        let height = f64::from(result.size.height);

        if height > 0.0 {
            let page = self.state.page.get();
            match &mut self.track {
                Track::Plain => {}
                // A heading pushed to the next page is recorded there.
                Track::Heading {
                    level,
                    title,
                    anchor,
                    recorded,
                } => {
                    if !*recorded {
                        *recorded = true;
                        self.state.headings.borrow_mut().push(HeadingMark {
                            level: *level,
                            title: title.clone(),
                            anchor: anchor.clone(),
                            page,
                            top: Some(self.state.pdf_y(top)),
                        });
                    }
                }
                // Split across pages: one region per page.
                Track::Link { target, indent_mm } => {
                    let left = self.state.left_mm + *indent_mm;
                    let right = self.state.left_mm + width;
                    self.state.links.borrow_mut().push(LinkMark {
                        page,
                        rect: [
                            self.state.pdf_x(left),
                            self.state.pdf_y(top + height),
                            self.state.pdf_x(right),
                            self.state.pdf_y(top),
                        ],
                        target: target.clone(),
                    });
                }
            }
        }

        self.state.cursor_mm.set(top + height);
        Ok(result)
    }
}

// ── Blocks → elements ────────────────────────────────────────────────────────

struct BlockWriter<'s> {
    style: &'s StyleSheet,
    code_family: Option<FontFamily<Font>>,
    state: &'s Rc<LayoutState>,
}

impl BlockWriter<'_> {
    fn emit<E: Element + 'static>(&self, doc: &mut genpdf::Document, element: E, track: Track) {
        doc.push(Tracked {
            inner: element,
            state: Rc::clone(self.state),
            track,
        });
    }

    fn gap(&self, doc: &mut genpdf::Document, lines: f64) {
        self.emit(doc, Break::new(lines), Track::Plain);
    }

    fn push(&self, doc: &mut genpdf::Document, block: &Block) -> Result<(), RenderError> {
        match block {
            Block::Heading {
                level,
                text,
                anchor,
            } => {
                self.gap(doc, if *level <= 2 { 1.0 } else { 0.6 });
                let heading_style = Style::new()
                    .bold()
                    .with_font_size(self.style.heading_size(*level))
                    .with_color(rgb(self.style.heading_color));
                let mut para = Paragraph::default();
                para.push_styled(text.clone(), heading_style);
                self.emit(
                    doc,
                    para,
                    Track::Heading {
                        level: *level,
                        title: text.clone(),
                        anchor: anchor.clone(),
                        recorded: false,
                    },
                );
                self.gap(doc, 0.4);
            }
            Block::Paragraph(spans) => {
                self.emit(doc, self.paragraph(spans, self.body_style()), Track::link(spans, 0.0));
                self.gap(doc, 0.5);
            }
            Block::CodeBlock { language, code } => {
                if !language.is_empty() {
                    let mut label = Paragraph::default();
                    label.push_styled(
                        language.clone(),
                        Style::new()
                            .italic()
                            .with_font_size(self.style.code_font_size)
                            .with_color(rgb(self.style.muted_color)),
                    );
                    self.emit(doc, label, Track::Plain);
                }
                self.emit(doc, self.code_block(code)?, Track::Plain);
                self.gap(doc, 0.5);
            }
            Block::List(items) => {
                for item in items {
                    let indent = LIST_INDENT_MM * (item.depth + 1) as f64;
                    self.emit(
                        doc,
                        self.list_item(item).padded(Margins::trbl(0.0, 0.0, 0.5, indent)),
                        Track::link(&item.spans, indent),
                    );
                }
                self.gap(doc, 0.5);
            }
            Block::Table { header, rows } => {
                if let Some(table) = self.table(header, rows)? {
                    self.emit(doc, table, Track::Plain);
                    self.gap(doc, 0.5);
                }
            }
            Block::Quote(spans) => {
                let quote_style = self.body_style().italic().with_color(rgb(self.style.muted_color));
                self.emit(
                    doc,
                    self.paragraph(spans, quote_style)
                        .padded(Margins::trbl(0.0, 0.0, 0.0, QUOTE_INDENT_MM)),
                    Track::link(spans, QUOTE_INDENT_MM),
                );
                self.gap(doc, 0.5);
            }
            Block::Rule => {
                self.emit(
                    doc,
                    HorizontalRule {
                        color: rgb(self.style.muted_color),
                    },
                    Track::Plain,
                );
                self.gap(doc, 0.5);
            }
        }
        Ok(())
    }

    fn body_style(&self) -> Style {
        Style::new()
            .with_font_size(self.style.body_font_size)
            .with_color(rgb(self.style.text_color))
    }

    fn code_style(&self, size: u8) -> Style {
        let style = Style::new()
            .with_font_size(size)
            .with_color(rgb(self.style.code_color));
        match self.code_family {
            Some(family) => style.with_font_family(family),
            None => style,
        }
    }

    fn paragraph(&self, spans: &[Span], base: Style) -> Paragraph {
        let mut para = Paragraph::default();
        for span in spans {
            para.push_styled(span.text.clone(), self.span_style(span, base));
        }
        para
    }

    fn span_style(&self, span: &Span, base: Style) -> Style {
        let mut style = if span.code {
            self.code_style(base.font_size())
        } else {
            base
        };
        if span.bold {
            style = style.bold();
        }
        if span.italic {
            style = style.italic();
        }
        if span.link.is_some() {
            style = style.with_color(rgb(self.style.link_color));
        }
        style
    }

    fn list_item(&self, item: &ListItem) -> Paragraph {
        let mut para = Paragraph::default();
        para.push_styled(format!("{} ", item.marker), self.body_style());
        for span in &item.spans {
            para.push_styled(span.text.clone(), self.span_style(span, self.body_style()));
        }
        para
    }

    /// A single framed cell holding one paragraph per source line.
    fn code_block(&self, code: &str) -> Result<TableLayout, RenderError> {
        let line_style = self.code_style(self.style.code_font_size);
        let mut lines = LinearLayout::vertical();
        for line in code.lines() {
            let mut para = Paragraph::default();
            // Leading indentation would otherwise be swallowed by word wrapping.
            let indent = line.len() - line.trim_start().len();
            let text = format!("{}{}", "\u{a0}".repeat(indent), line.trim_start());
            para.push_styled(if text.is_empty() { "\u{a0}".to_string() } else { text }, line_style);
            lines.push(para);
        }

        let mut table = TableLayout::new(vec![1]);
        table.set_cell_decorator(FrameCellDecorator::new(false, true, false));
        table
            .row()
            .element(lines.padded(2))
            .push()
            .map_err(|e| RenderError::Layout(format!("code block: {e}")))?;
        Ok(table)
    }

    fn table(&self, header: &[String], rows: &[Vec<String>]) -> Result<Option<TableLayout>, RenderError> {
        if header.is_empty() {
            return Ok(None);
        }
        let cell_style = Style::new()
            .with_font_size(self.style.table_font_size)
            .with_color(rgb(self.style.text_color));

        let mut table = TableLayout::new(vec![1; header.len()]);
        table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

        let mut header_row = table.row();
        for cell in header {
            let mut para = Paragraph::default();
            para.push_styled(cell.clone(), cell_style.bold());
            header_row.push_element(para.padded(1));
        }
        header_row
            .push()
            .map_err(|e| RenderError::Layout(format!("table header: {e}")))?;

        for (i, row) in rows.iter().enumerate() {
            let mut table_row = table.row();
            for cell in row {
                let mut para = Paragraph::default();
                para.push_styled(cell.clone(), cell_style);
                table_row.push_element(para.padded(1));
            }
            table_row
                .push()
                .map_err(|e| RenderError::Layout(format!("table row {}: {e}", i + 1)))?;
        }
        Ok(Some(table))
    }
}

// ── Custom elements ──────────────────────────────────────────────────────────

/// A thin full-width line.
struct HorizontalRule {
    color: Color,
}

impl Element for HorizontalRule {
    fn render(&mut self, _context: &Context, area: Area<'_>, _style: Style) -> Result<RenderResult, Error> {
        let width = area.size().width;
        let y = Mm::from(1.0);
        area.draw_line(
            vec![Position::new(0, y), Position::new(width, y)],
            Style::new().with_color(self.color),
        );
        let mut result = RenderResult::default();
        result.size = Size::new(width, 2.0);
        Ok(result)
    }
}

// ── Page decoration ──────────────────────────────────────────────────────────

/// Margins, running header with a rule, and a `Page N of M` footer.
///
/// Starts each page in the shared [`LayoutState`]: bumps the page number and
/// puts the cursor at the top of the body area.
struct GuidePageDecorator {
    state: Rc<LayoutState>,
    total: Option<usize>,
    margins: Margins,
    margin_mm: f64,
    header_text: String,
    header_style: Style,
    footer_style: Style,
    rule_color: Color,
}

impl GuidePageDecorator {
    fn new(style: &StyleSheet, total: Option<usize>, state: Rc<LayoutState>) -> Self {
        let muted = rgb(style.muted_color);
        Self {
            state,
            total,
            margins: Margins::all(style.margin_mm),
            margin_mm: style.margin_mm,
            header_text: style.header_text.clone(),
            header_style: Style::new()
                .with_font_size(style.header_font_size)
                .with_color(muted),
            footer_style: Style::new()
                .with_font_size(style.footer_font_size)
                .with_color(muted),
            rule_color: muted,
        }
    }
}

impl PageDecorator for GuidePageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &Context,
        mut area: Area<'a>,
        style: Style,
    ) -> Result<Area<'a>, Error> {
        let page = self.state.page.get() + 1;
        self.state.page.set(page);

        area.add_margins(self.margins);
        let mut body_top = self.margin_mm;

        if !self.header_text.is_empty() {
            let mut header = Paragraph::default();
            header.set_alignment(Alignment::Center);
            header.push_styled(self.header_text.clone(), self.header_style);
            let result = header.render(context, area.clone(), style)?;
            let rule_y = result.size.height + Mm::from(1.0);
            area.draw_line(
                vec![Position::new(0, rule_y), Position::new(area.size().width, rule_y)],
                Style::new().with_color(self.rule_color),
            );
            let offset = rule_y + Mm::from(HEADER_GAP_MM);
            area.add_offset(Position::new(0, offset));
            body_top += f64::from(offset);
        }
        self.state.cursor_mm.set(body_top);

        let available = area.size().height;
        let footer_height = Mm::from(FOOTER_HEIGHT_MM);
        if footer_height > available {
            return Err(Error::new(
                "Footer height exceeds available space",
                ErrorKind::InvalidData,
            ));
        }
        let mut footer_area = area.clone();
        footer_area.add_offset(Position::new(0, available - footer_height));
        let mut footer = Paragraph::default();
        footer.set_alignment(Alignment::Right);
        footer.push_styled(StyleSheet::footer_text(page, self.total), self.footer_style);
        footer.render(context, footer_area, style)?;

        area.set_height(available - footer_height);
        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    //! These tests lay out real PDFs and need a font family from
    //! `DEFAULT_FONT_DIRS` (Liberation or DejaVu).

    use super::*;

    const GUIDE: &str = "# Example Cert\n\n**Generated on:** 2026-10-19 08:30:00\n\n---\n\n\
## Table of Contents\n\n1. [Overview](#overview)\n2. [Deep Dive](#deep-dive)\n\n---\n\n\
## Overview {#overview}\n\nIntro text with `kubectl get pods`.\n\n---\n\n\
## Deep Dive {#deep-dive}\n\n| Domain | Weight |\n|---|---|\n| Storage | 10% |\n\n```yaml\napiVersion: v1\n  kind: Pod\n```\n";

    fn dests(doc: &lopdf::Document) -> &lopdf::Dictionary {
        let id = doc.catalog().unwrap().get(b"Dests").unwrap().as_reference().unwrap();
        doc.get_dictionary(id).unwrap()
    }

    #[test]
    fn missing_fonts_fail_before_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut style = StyleSheet::default();
        style.fonts.dir = Some(dir.path().to_path_buf());
        let err = render_pdf("X", "# X\n", &style).unwrap_err();
        assert!(matches!(err, RenderError::FontsUnavailable { .. }), "got {err:?}");
    }

    #[test]
    fn renders_guide_with_outline() {
        let pdf = render_pdf("Example Cert", GUIDE, &StyleSheet::default()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        assert!(doc.catalog().unwrap().get(b"Outlines").is_ok());
    }

    #[test]
    fn toc_entries_link_to_section_destinations() {
        let pdf = render_pdf("Example Cert", GUIDE, &StyleSheet::default()).unwrap();
        let doc = lopdf::Document::load_mem(&pdf).unwrap();

        let dests = dests(&doc);
        assert!(dests.has(b"overview"));
        assert!(dests.has(b"deep-dive"));

        let first_page = doc.get_pages()[&1];
        let targets: Vec<Vec<u8>> = doc
            .get_page_annotations(first_page)
            .iter()
            .filter(|a| a.get(b"Subtype").and_then(|s| s.as_name()).ok() == Some(&b"Link"[..]))
            .map(|a| a.get(b"Dest").unwrap().as_name().unwrap().to_vec())
            .collect();
        assert_eq!(targets, vec![b"overview".to_vec(), b"deep-dive".to_vec()]);
    }

    #[test]
    fn link_regions_sit_inside_the_page() {
        let style = StyleSheet::default();
        let pdf = render_pdf("Example Cert", GUIDE, &style).unwrap();
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        let first_page = doc.get_pages()[&1];
        let page_height = (style.paper_height_mm * PT_PER_MM) as f32;

        for annotation in doc.get_page_annotations(first_page) {
            let rect: Vec<f32> = annotation
                .get(b"Rect")
                .unwrap()
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_float().unwrap())
                .collect();
            assert!(rect[0] < rect[2] && rect[1] < rect[3], "{rect:?}");
            assert!(rect[1] > 0.0 && rect[3] < page_height, "{rect:?}");
        }
    }

    #[test]
    fn long_guide_spans_several_pages() {
        let mut md = String::from("# Long\n\n");
        for i in 0..40 {
            md.push_str(&format!("## Section {i}\n\n{}\n\n", "lorem ipsum dolor ".repeat(40)));
        }
        let pdf = render_pdf("Long", &md, &StyleSheet::default()).unwrap();
        assert!(count_pages(&pdf).unwrap() > 1);

        // Later sections land on later pages.
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        let last = dests(&doc).get(b"section-39").unwrap().as_array().unwrap();
        let last_page = last[0].as_reference().unwrap();
        assert_ne!(last_page, doc.get_pages()[&1]);
    }

    #[tokio::test]
    async fn strategy_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = RenderJob {
            title: "Example Cert".into(),
            markdown: GUIDE.into(),
            source_path: dir.path().join("in.md"),
            output_path: dir.path().join("out.pdf"),
            resource_dir: None,
        };
        NativeStrategy::new(StyleSheet::default())
            .attempt(&job)
            .await
            .unwrap();
        assert!(std::fs::metadata(&job.output_path).unwrap().len() > 0);
    }
}
