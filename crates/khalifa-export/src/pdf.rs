//! # PDF Rendering
//!
//! Draws a [`DocumentLayout`] onto A4 pages with printpdf.
//!
//! ## Fonts
//! - [`PdfRenderer::builtin`]: Helvetica from the PDF standard set. Nothing
//!   to ship, but no Arabic glyphs: Arabic runs print as a placeholder.
//! - [`PdfRenderer::with_font`]: a TrueType font with Arabic coverage,
//!   embedded in every document.
//!
//! ## Page Geometry (mm, origin bottom-left)
//! ```text
//! ┌─────────────── 210 ───────────────┐
//! │ 18 margin                         │ 297
//! │   store / title / fields          │
//! │   table rows, 7 mm each           │
//! │   (header repeats on new pages)   │
//! │   totals block, right aligned     │
//! └───────────────────────────────────┘
//! ```

use printpdf::{
    BuiltinFont, Color, Greyscale, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};
use tracing::{debug, warn};

use crate::error::{ExportError, ExportResult};
use crate::layout::{Align, DocumentLayout, Table};
use crate::text::{prepare, BuiltinFontShaper, TextShaper, UnicodeFontShaper};

// =============================================================================
// Constants
// =============================================================================

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;

const ROW_HEIGHT: f32 = 7.0;
const CELL_PADDING: f32 = 1.5;

const STORE_SIZE: f32 = 14.0;
const TITLE_SIZE: f32 = 18.0;
const FIELD_SIZE: f32 = 10.0;
const HEADER_SIZE: f32 = 10.0;
const CELL_SIZE: f32 = 9.0;
const TOTAL_SIZE: f32 = 11.0;
const GRAND_TOTAL_SIZE: f32 = 12.0;

/// Millimetres per typographic point.
const MM_PER_PT: f32 = 0.3528;

/// Average glyph advance as a fraction of the font size. Helvetica digits are
/// 0.556 em, lowercase letters mostly narrower.
const AVG_ADVANCE_EM: f32 = 0.52;

/// Width of the label column of the totals block.
const TOTALS_LABEL_WIDTH: f32 = 45.0;

// =============================================================================
// Renderer
// =============================================================================

enum FontSource {
    Builtin,
    Embedded(Vec<u8>),
}

/// Renders layouts to PDF bytes.
pub struct PdfRenderer {
    font: FontSource,
}

/// Bytes plus what happened while drawing them.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub pages: usize,
    /// Text runs replaced by a placeholder.
    pub fallbacks: usize,
}

impl PdfRenderer {
    pub fn builtin() -> Self {
        PdfRenderer {
            font: FontSource::Builtin,
        }
    }

    /// Embeds `font` (TrueType bytes) for regular and bold text.
    pub fn with_font(font: Vec<u8>) -> Self {
        PdfRenderer {
            font: FontSource::Embedded(font),
        }
    }

    pub fn render(&self, layout: &DocumentLayout) -> ExportResult<Vec<u8>> {
        Ok(self.render_document(layout)?.bytes)
    }

    pub fn render_document(&self, layout: &DocumentLayout) -> ExportResult<RenderedDocument> {
        let (doc, page, layer) = PdfDocument::new(
            layout.title.as_str(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Page 1",
        );

        let (regular, bold, shaper): (IndirectFontRef, IndirectFontRef, &dyn TextShaper) =
            match &self.font {
                FontSource::Builtin => (
                    doc.add_builtin_font(BuiltinFont::Helvetica)
                        .map_err(ExportError::pdf)?,
                    doc.add_builtin_font(BuiltinFont::HelveticaBold)
                        .map_err(ExportError::pdf)?,
                    &BuiltinFontShaper as &dyn TextShaper,
                ),
                FontSource::Embedded(bytes) => {
                    let font = doc
                        .add_external_font(bytes.as_slice())
                        .map_err(ExportError::pdf)?;
                    (font.clone(), font, &UnicodeFontShaper as &dyn TextShaper)
                }
            };

        let (pages, fallbacks) = {
            let layer = doc.get_page(page).get_layer(layer);
            let mut canvas = Canvas {
                doc: &doc,
                layer,
                y: PAGE_HEIGHT - MARGIN,
                regular,
                bold,
                shaper,
                pages: 1,
                fallbacks: 0,
            };
            canvas.draw(layout);
            (canvas.pages, canvas.fallbacks)
        };

        let bytes = doc.save_to_bytes().map_err(ExportError::pdf)?;
        if fallbacks > 0 {
            warn!(
                title = %layout.title,
                fallbacks,
                "Document text printed as placeholders; configure a font with Arabic glyphs"
            );
        }
        debug!(title = %layout.title, pages, size = bytes.len(), "Rendered PDF");

        Ok(RenderedDocument {
            bytes,
            pages,
            fallbacks,
        })
    }
}

// =============================================================================
// Canvas
// =============================================================================

/// Drawing state: current layer and the baseline of the next line.
struct Canvas<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    shaper: &'a dyn TextShaper,
    pages: usize,
    fallbacks: usize,
}

impl Canvas<'_> {
    fn draw(&mut self, layout: &DocumentLayout) {
        for (i, line) in layout.store_lines.iter().enumerate() {
            if i == 0 {
                self.text(line, STORE_SIZE, MARGIN, true);
                self.y -= 6.5;
            } else {
                self.text(line, CELL_SIZE, MARGIN, false);
                self.y -= 4.5;
            }
        }

        self.y -= 6.0;
        self.text(&layout.title, TITLE_SIZE, MARGIN, true);
        self.y -= 4.0;
        self.rule(MARGIN, PAGE_WIDTH - MARGIN, 0.8);
        self.y -= 7.0;

        for field in &layout.header_fields {
            let line = format!("{}: {}", field.label, field.value);
            self.text(&line, FIELD_SIZE, MARGIN, false);
            self.y -= 5.5;
        }
        self.y -= 4.0;

        self.table(&layout.table);
        self.y -= 4.0;

        let needed = ROW_HEIGHT * layout.totals.len() as f32 + 4.0;
        self.ensure_space(needed);
        let value_right = PAGE_WIDTH - MARGIN;
        let label_right = value_right - TOTALS_LABEL_WIDTH;
        for total in &layout.totals {
            let size = if total.emphasized {
                self.y += 1.5;
                self.rule(label_right - TOTALS_LABEL_WIDTH, value_right, 1.2);
                self.y -= 5.0;
                GRAND_TOTAL_SIZE
            } else {
                TOTAL_SIZE
            };
            self.text_right(&format!("{}:", total.label), size, label_right, total.emphasized);
            self.text_right(&total.value, size, value_right, total.emphasized);
            self.y -= ROW_HEIGHT;
        }

        if let Some(footer) = &layout.footer {
            self.ensure_space(ROW_HEIGHT);
            self.y -= 4.0;
            self.text(footer, CELL_SIZE, MARGIN, false);
        }
    }

    fn table(&mut self, table: &Table) {
        if table.columns.is_empty() {
            return;
        }
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let weight: f32 = table.columns.iter().map(|c| c.width).sum();
        let mut edges = Vec::with_capacity(table.columns.len() + 1);
        let mut x = MARGIN;
        edges.push(x);
        for column in &table.columns {
            x += usable * column.width / weight;
            edges.push(x);
        }

        // Header plus at least one row before breaking.
        self.ensure_space(ROW_HEIGHT * 2.0);
        self.table_header(table, &edges);
        for row in &table.rows {
            if self.ensure_space(ROW_HEIGHT) {
                self.table_header(table, &edges);
            }
            for (i, column) in table.columns.iter().enumerate() {
                let cell = row.get(i).map(String::as_str).unwrap_or_default();
                self.cell(cell, CELL_SIZE, edges[i], edges[i + 1], column.align, false);
            }
            self.y -= ROW_HEIGHT;
        }
        self.y += ROW_HEIGHT - 2.0;
        self.rule(MARGIN, PAGE_WIDTH - MARGIN, 0.5);
        self.y -= ROW_HEIGHT - 2.0;
    }

    fn table_header(&mut self, table: &Table, edges: &[f32]) {
        self.y += 5.0;
        self.rule(MARGIN, PAGE_WIDTH - MARGIN, 0.8);
        self.y -= 5.0;
        for (i, column) in table.columns.iter().enumerate() {
            self.cell(&column.header, HEADER_SIZE, edges[i], edges[i + 1], column.align, true);
        }
        self.y -= 2.0;
        self.rule(MARGIN, PAGE_WIDTH - MARGIN, 0.5);
        self.y -= ROW_HEIGHT - 2.0;
    }

    fn cell(&mut self, text: &str, size: f32, left: f32, right: f32, align: Align, bold: bool) {
        let room = right - left - 2.0 * CELL_PADDING;
        let shaped = self.shape(text);
        let fitted = fit(&shaped, size, room);
        match align {
            Align::Left => self.place(fitted, size, left + CELL_PADDING, bold),
            Align::Right => {
                let x = right - CELL_PADDING - text_width(&fitted, size);
                self.place(fitted, size, x, bold);
            }
        }
    }

    fn text(&mut self, text: &str, size: f32, x: f32, bold: bool) {
        let shaped = self.shape(text);
        self.place(shaped, size, x, bold);
    }

    fn text_right(&mut self, text: &str, size: f32, right: f32, bold: bool) {
        let shaped = self.shape(text);
        let x = right - text_width(&shaped, size);
        self.place(shaped, size, x, bold);
    }

    fn shape(&mut self, text: &str) -> String {
        let shaped = prepare(text, self.shaper);
        self.fallbacks += shaped.fallbacks;
        shaped.text
    }

    fn place(&self, text: String, size: f32, x: f32, bold: bool) {
        if text.is_empty() {
            return;
        }
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn rule(&self, from: f32, to: f32, thickness: f32) {
        self.layer.set_outline_color(Color::Greyscale(Greyscale::new(0.0, None)));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(from), Mm(self.y)), false),
                (Point::new(Mm(to), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    /// Starts a new page when fewer than `needed` mm remain. Returns whether
    /// it did.
    fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y - needed >= MARGIN {
            return false;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN - 5.0;
        true
    }
}

// =============================================================================
// Measuring
// =============================================================================

/// Estimated advance width in mm.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_ADVANCE_EM * MM_PER_PT
}

/// Cuts `text` with `..` so it fits `room` mm.
fn fit(text: &str, size: f32, room: f32) -> String {
    if text_width(text, size) <= room {
        return text.to_string();
    }
    let per_char = size * AVG_ADVANCE_EM * MM_PER_PT;
    let keep = ((room / per_char) as usize).saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
