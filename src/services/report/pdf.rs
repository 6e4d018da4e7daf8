use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use super::{Report, ReportError};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const PT_TO_MM: f32 = 0.3528;
/// Rough Helvetica advance per point of font size, used for centering and wrapping.
const AVG_GLYPH_EM: f32 = 0.5;

/// Renders on the blocking pool; printpdf documents are not `Send`.
pub async fn render_pdf(report: Report) -> Result<Vec<u8>, ReportError> {
    tokio::task::spawn_blocking(move || render_pdf_blocking(&report)).await?
}

/// A4 document: title and duration on the first page, a fresh page for each
/// logical page of entries, then the summary and footer.
pub fn render_pdf_blocking(report: &Report) -> Result<Vec<u8>, ReportError> {
    let mut pdf = PdfWriter::new(&report.title)?;

    pdf.line(&report.title, 18.0, Style::Bold, true);
    pdf.gap(2.0);
    pdf.line(&format!("Duration: {}", report.duration), 12.0, Style::Regular, true);
    pdf.gap(5.0);

    for (index, page) in report.pages.iter().enumerate() {
        if index > 0 {
            pdf.new_page();
        }
        for entry in page {
            pdf.line(&format!("- {}", entry.heading), 12.0, Style::Regular, false);
            for detail in &entry.details {
                pdf.line(&format!("   {}", detail), 12.0, Style::Regular, false);
            }
            pdf.gap(2.5);
        }
    }

    pdf.gap(5.0);
    pdf.line("Summary", 14.0, Style::Bold, false);
    pdf.line(&report.summary, 12.0, Style::Regular, false);
    pdf.gap(10.0);
    pdf.line(report.footer, 10.0, Style::Italic, true);

    pdf.finish()
}

#[derive(Clone, Copy)]
enum Style {
    Regular,
    Bold,
    Italic,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    cursor: f32,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self, ReportError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);

        let font = |f: BuiltinFont| doc.add_builtin_font(f).map_err(|e| ReportError::Pdf(e.to_string()));
        let regular = font(BuiltinFont::Helvetica)?;
        let bold = font(BuiltinFont::HelveticaBold)?;
        let italic = font(BuiltinFont::HelveticaOblique)?;

        Ok(Self {
            doc,
            layer,
            cursor: PAGE_HEIGHT - MARGIN,
            regular,
            bold,
            italic,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn gap(&mut self, mm: f32) {
        self.cursor -= mm;
    }

    /// Writes wrapped text, starting a new physical page when the current one is full.
    fn line(&mut self, text: &str, size: f32, style: Style, centered: bool) {
        let glyph = size * PT_TO_MM * AVG_GLYPH_EM;
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let width_chars = ((usable / glyph) as usize).max(1);
        let height = size * PT_TO_MM * 1.4;

        for chunk in wrap(text, width_chars) {
            if self.cursor - height < MARGIN {
                self.new_page();
            }
            self.cursor -= height;

            let x = if centered {
                ((PAGE_WIDTH - chunk.len() as f32 * glyph) / 2.0).max(MARGIN)
            } else {
                MARGIN
            };
            let font = match style {
                Style::Regular => &self.regular,
                Style::Bold => &self.bold,
                Style::Italic => &self.italic,
            };
            self.layer.use_text(chunk, size, Mm(x), Mm(self.cursor), font);
        }
    }

    fn finish(self) -> Result<Vec<u8>, ReportError> {
        self.doc.save_to_bytes().map_err(|e| ReportError::Pdf(e.to_string()))
    }
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let indent: String = text.chars().take_while(|c| *c == ' ').collect();
    let mut lines = Vec::new();
    let mut current = indent.clone();

    for word in text.split_whitespace() {
        let mut word = word;
        while let Some((split, _)) = word.char_indices().nth(width) {
            if !current.trim().is_empty() {
                lines.push(std::mem::replace(&mut current, indent.clone()));
            }
            let (head, tail) = word.split_at(split);
            lines.push(format!("{}{}", indent, head));
            word = tail;
        }
        let needed = if current.trim().is_empty() { word.len() } else { word.len() + 1 };
        if current.len() + needed > width && !current.trim().is_empty() {
            lines.push(std::mem::replace(&mut current, indent.clone()));
        }
        if !current.trim().is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.trim().is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
