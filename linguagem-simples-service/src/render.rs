//! PDF output of the simplified text.

pub mod layout;

use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::ProcessingError;
use crate::extraction::pdf::create_pdfium;
use layout::{LaidOutLine, PageGeometry, prepare_lines, text_width, to_latin1, wrap_line};

const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 9.0;
const FOOTER_SIZE: f32 = 8.0;

/// Fixed strings printed around the body, already localized
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    /// Printed under the title, e.g. the generation date
    pub subtitle: String,
    pub disclaimer: String,
    /// Footer label with `{page}` and `{total}` placeholders
    pub page_label: String,
}

/// Lay out the full document: title, body and per-page footers.
pub fn compose(text: &str, options: &RenderOptions, geometry: &PageGeometry) -> Vec<Vec<LaidOutLine>> {
    let mut pages = layout::paginate(&prepare_lines(text), geometry);
    let total = pages.len();
    let top = geometry.height - geometry.margin;

    if let Some(first) = pages.first_mut() {
        let title = to_latin1(&options.title);
        let subtitle = to_latin1(&options.subtitle);
        first.insert(
            0,
            LaidOutLine {
                x: centered_x(&title, TITLE_SIZE, true, geometry),
                y: top - TITLE_SIZE,
                text: title,
                size: TITLE_SIZE,
                bold: true,
            },
        );
        first.insert(
            1,
            LaidOutLine {
                x: centered_x(&subtitle, SUBTITLE_SIZE, false, geometry),
                y: top - TITLE_SIZE - SUBTITLE_SIZE * 2.2,
                text: subtitle,
                size: SUBTITLE_SIZE,
                bold: false,
            },
        );
    }

    let disclaimer_lines = wrap_line(
        &to_latin1(&options.disclaimer),
        geometry.text_width(),
        FOOTER_SIZE,
        false,
    );

    for (index, page) in pages.iter_mut().enumerate() {
        let label = to_latin1(
            &options
                .page_label
                .replace("{page}", &(index + 1).to_string())
                .replace("{total}", &total.to_string()),
        );
        page.push(LaidOutLine {
            x: centered_x(&label, FOOTER_SIZE, false, geometry),
            y: geometry.margin,
            text: label,
            size: FOOTER_SIZE,
            bold: false,
        });

        for (line_index, line) in disclaimer_lines.iter().enumerate() {
            page.push(LaidOutLine {
                text: line.clone(),
                x: geometry.margin,
                y: geometry.margin + FOOTER_SIZE * 1.4 * (disclaimer_lines.len() - line_index) as f32,
                size: FOOTER_SIZE,
                bold: false,
            });
        }
    }

    pages
}

fn centered_x(text: &str, size: f32, bold: bool, geometry: &PageGeometry) -> f32 {
    let width = text_width(text, size, bold);
    ((geometry.width - width) / 2.0).max(geometry.margin)
}

/// Render the simplified text as an A4 PDF.
///
/// Blocking: binds pdfium. Call from `spawn_blocking`.
pub fn render_pdf(text: &str, options: &RenderOptions) -> Result<Vec<u8>, ProcessingError> {
    let geometry = PageGeometry::a4();
    let pages = compose(text, options, &geometry);

    let pdfium = create_pdfium()?;
    let mut document = pdfium.create_new_pdf().map_err(render_error)?;
    let regular = document.fonts_mut().helvetica();
    let bold = document.fonts_mut().helvetica_bold();

    for lines in &pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(render_error)?;

        for line in lines {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(line.x),
                    PdfPoints::new(line.y),
                    &line.text,
                    if line.bold { bold } else { regular },
                    PdfPoints::new(line.size),
                )
                .map_err(render_error)?;
        }
    }

    let bytes = document.save_to_bytes().map_err(render_error)?;
    debug!(pages = pages.len(), bytes = bytes.len(), "Rendered simplified PDF");
    Ok(bytes)
}

fn render_error(e: PdfiumError) -> ProcessingError {
    ProcessingError::Render {
        message: format!("{:?}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RenderOptions {
        RenderOptions {
            title: "Documento Simplificado".to_string(),
            subtitle: "Gerado em 16/10/2026".to_string(),
            disclaimer: "Este texto é uma simplificação.".to_string(),
            page_label: "Página {page} de {total}".to_string(),
        }
    }

    #[test]
    fn test_compose_single_page() {
        let geometry = PageGeometry::a4();
        let pages = compose("📊 RESUMO\nTexto curto.", &options(), &geometry);

        assert_eq!(pages.len(), 1);
        let texts: Vec<&str> = pages[0].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Documento Simplificado",
                "Gerado em 16/10/2026",
                "RESUMO",
                "Texto curto.",
                "Página 1 de 1",
                "Este texto é uma simplificação.",
            ]
        );
        assert!(pages[0][0].bold);
        assert!(pages[0][2].bold);
        assert!(!pages[0][3].bold);
    }

    #[test]
    fn test_compose_numbers_every_page() {
        let geometry = PageGeometry::a4();
        let text = (0..150).map(|i| format!("Parágrafo {}", i)).collect::<Vec<_>>().join("\n");
        let pages = compose(&text, &options(), &geometry);

        assert!(pages.len() >= 2);
        let total = pages.len();
        for (index, page) in pages.iter().enumerate() {
            let label = format!("Página {} de {}", index + 1, total);
            assert!(page.iter().any(|l| l.text == label), "missing footer on page {}", index + 1);
        }
        // Title only on the first page
        assert!(!pages[1].iter().any(|l| l.text == "Documento Simplificado"));
    }

    #[test]
    fn test_footer_sits_below_body() {
        let geometry = PageGeometry::a4();
        let pages = compose("Linha", &options(), &geometry);
        let body = pages[0].iter().find(|l| l.text == "Linha").unwrap();
        let footer = pages[0].iter().find(|l| l.text == "Página 1 de 1").unwrap();
        assert!(footer.y < body.y);
        assert!(footer.y >= geometry.margin);
    }
}
