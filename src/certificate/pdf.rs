/// Single-page A4 PDF rendering of a `Certificate` layout.
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

use super::{Certificate, CertificateLine, CERTIFICATE_TITLE};
use crate::error::{ProofError, Result};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const VALUE_COLUMN: f32 = 60.0;
const TOP: f32 = 265.0;
const FOOTER_TOP: f32 = 30.0;
const RIGHT_EDGE: f32 = PAGE_WIDTH - MARGIN_LEFT;
const PT_TO_MM: f32 = 0.3528;
/// Upper bound on the average Helvetica advance, as a fraction of the font size.
const GLYPH_ADVANCE: f32 = 0.6;
const MAX_FIELD_LINES: usize = 3;
const ELLIPSIS: &str = "...";

/// How many characters of `font_size` text fit in `width` millimetres.
fn chars_per_line(width: f32, font_size: f32) -> usize {
    ((width / (font_size * PT_TO_MM * GLYPH_ADVANCE)) as usize).max(1)
}

fn is_break_point(c: char) -> bool {
    c.is_whitespace() || matches!(c, '/' | '?' | '&' | '=' | '-' | '_' | '.')
}

/// Break `text` into lines of at most `max_chars` characters, preferring to
/// break after whitespace or URL separators. Without whitespace the lines
/// concatenate back to `text` exactly.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut start = 0;

    while chars.len() - start > max_chars {
        let end = start + max_chars;
        let split = chars[start..end]
            .iter()
            .rposition(|c| is_break_point(*c))
            .filter(|&i| i >= max_chars / 2)
            .map_or(end, |i| start + i + 1);

        let line: String = chars[start..split].iter().collect();
        lines.push(line.trim_end().to_string());
        start = split;
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }

    if start < chars.len() || lines.is_empty() {
        lines.push(chars[start..].iter().collect());
    }
    lines
}

/// `wrap`, keeping at most `max_lines` and marking the cut with an ellipsis.
pub fn wrap_clipped(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let mut lines = wrap(text, max_chars);
    if lines.len() > max_lines.max(1) {
        lines.truncate(max_lines.max(1));
        if let Some(last) = lines.last_mut() {
            let keep = max_chars.saturating_sub(ELLIPSIS.len());
            *last = last.chars().take(keep).collect::<String>() + ELLIPSIS;
        }
    }
    lines
}

fn font(doc: &printpdf::PdfDocumentReference, builtin: BuiltinFont) -> Result<IndirectFontRef> {
    doc.add_builtin_font(builtin)
        .map_err(|e| ProofError::Certificate(format!("Failed to load font: {e}")))
}

/// Render the certificate to PDF bytes.
pub fn render(certificate: &Certificate) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        CERTIFICATE_TITLE,
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Certificate",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let regular = font(&doc, BuiltinFont::Helvetica)?;
    let bold = font(&doc, BuiltinFont::HelveticaBold)?;
    let mono = font(&doc, BuiltinFont::Courier)?;

    let mut y = TOP;
    let mut footer_y = FOOTER_TOP;

    for line in certificate.lines() {
        match line {
            CertificateLine::Title(text) => {
                layer.use_text(text, 20.0, Mm(MARGIN_LEFT), Mm(y), &bold);
                y -= 10.0;
            }
            CertificateLine::Subtitle(text) => {
                layer.use_text(text, 12.0, Mm(MARGIN_LEFT), Mm(y), &regular);
                y -= 16.0;
            }
            CertificateLine::Heading(text) => {
                y -= 4.0;
                layer.use_text(text, 13.0, Mm(MARGIN_LEFT), Mm(y), &bold);
                y -= 9.0;
            }
            CertificateLine::Field { label, value } => {
                layer.use_text(format!("{label}:"), 11.0, Mm(MARGIN_LEFT), Mm(y), &bold);
                let width = chars_per_line(RIGHT_EDGE - VALUE_COLUMN, 11.0);
                for (i, part) in wrap_clipped(&value, width, MAX_FIELD_LINES)
                    .into_iter()
                    .enumerate()
                {
                    if i > 0 {
                        y -= 5.0;
                    }
                    layer.use_text(part, 11.0, Mm(VALUE_COLUMN), Mm(y), &regular);
                }
                y -= 7.0;
            }
            CertificateLine::Mono(text) => {
                layer.use_text(text, 11.0, Mm(MARGIN_LEFT), Mm(y), &mono);
                y -= 6.0;
            }
            // Never clipped: the verification URL must survive verbatim.
            CertificateLine::Text(text) => {
                for part in wrap(&text, chars_per_line(RIGHT_EDGE - MARGIN_LEFT, 9.0)) {
                    layer.use_text(part, 9.0, Mm(MARGIN_LEFT), Mm(y), &regular);
                    y -= 5.0;
                }
                y -= 1.0;
            }
            CertificateLine::Footer(text) => {
                for part in wrap(&text, chars_per_line(RIGHT_EDGE - MARGIN_LEFT, 8.0)) {
                    layer.use_text(part, 8.0, Mm(MARGIN_LEFT), Mm(footer_y), &regular);
                    footer_y -= 5.0;
                }
            }
        }
    }

    doc.save_to_bytes()
        .map_err(|e| ProofError::Certificate(format!("Failed to write PDF: {e}")))
}
