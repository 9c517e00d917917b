//! PDF text extraction with watermark filtering.

use std::collections::{HashMap, HashSet};

use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

use crate::error::ProcessingError;

/// Bytes searched for the `%PDF-` header
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// Text pulled out of a PDF by pdfium
#[derive(Debug, Clone)]
pub struct PdfText {
    pub pages: usize,
    pub text: String,
}

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in:
/// 1. Current directory (./libpdfium.so)
/// 2. vendor/pdfium/lib/
/// 3. System library paths
pub fn create_pdfium() -> Result<Pdfium, ProcessingError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ProcessingError::PdfiumUnavailable {
            message: format!("Failed to load PDFium library: {:?}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Whether the upload carries a PDF header.
///
/// Some generators prepend junk before `%PDF-`, so the first kilobyte is
/// searched rather than only offset zero.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Load a PDF from memory.
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
) -> Result<PdfDocument<'a>, ProcessingError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ProcessingError::InvalidPdf {
            message: format!("{:?}", e),
        })
}

/// Extract the text of every page, dropping lines repeated on most pages.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<PdfText, ProcessingError> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, bytes)?;

    let page_count = document.pages().len() as usize;
    info!(pages = page_count, "Extracting PDF text");

    let mut raw_pages: Vec<String> = Vec::with_capacity(page_count);
    for (page_index, page) in document.pages().iter().enumerate() {
        match page.text() {
            Ok(text) => raw_pages.push(text.all().trim().to_string()),
            Err(e) => {
                warn!(page = page_index + 1, error = ?e, "Failed to get text for page");
                raw_pages.push(String::new());
            }
        }
    }

    let text = join_pages(&raw_pages);

    debug!(
        pages = page_count,
        chars = text.chars().count(),
        "PDF text extracted with watermark filtering"
    );

    Ok(PdfText {
        pages: page_count,
        text,
    })
}

/// Filter watermarks and join non-empty pages with blank lines.
pub(crate) fn join_pages(pages: &[String]) -> String {
    let watermarks = detect_watermarks(pages);
    if !watermarks.is_empty() {
        info!(
            watermark_count = watermarks.len(),
            "Detected watermark patterns to filter"
        );
    }

    pages
        .iter()
        .map(|text| {
            if watermarks.is_empty() {
                text.clone()
            } else {
                remove_watermarks(text, &watermarks)
            }
        })
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Detect lines that appear on many pages (headers, footers, stamps).
///
/// Returns the set of lines present on more than half of the non-empty pages.
fn detect_watermarks(pages: &[String]) -> HashSet<String> {
    let pages: Vec<&String> = pages.iter().filter(|p| !p.trim().is_empty()).collect();
    let total_pages = pages.len();
    if total_pages < 2 {
        return HashSet::new();
    }

    let mut line_counts: HashMap<&str, usize> = HashMap::new();

    for text in &pages {
        // Count each line only once per page
        let unique_lines: HashSet<&str> = text
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();

        for line in unique_lines {
            *line_counts.entry(line).or_insert(0) += 1;
        }
    }

    let threshold = total_pages / 2;
    line_counts
        .into_iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(line, _)| line.to_string())
        .collect()
}

fn remove_watermarks(text: &str, watermarks: &HashSet<String>) -> String {
    text.lines()
        .filter(|line| !watermarks.contains(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.7\n%..."));
        assert!(looks_like_pdf(b"\xef\xbb\xbf\r\n%PDF-1.4"));
        assert!(!looks_like_pdf(b"PK\x03\x04 not a pdf"));
        assert!(!looks_like_pdf(b""));

        let mut late = vec![b' '; MAGIC_SEARCH_WINDOW];
        late.extend_from_slice(b"%PDF-1.4");
        assert!(!looks_like_pdf(&late));
    }

    #[test]
    fn test_detect_watermarks() {
        let pages = pages(&[
            "TRIBUNAL DE JUSTIÇA\nPrimeira página\nAssinado digitalmente",
            "TRIBUNAL DE JUSTIÇA\nSegunda página\nAssinado digitalmente",
            "TRIBUNAL DE JUSTIÇA\nTerceira página",
        ]);

        let watermarks = detect_watermarks(&pages);
        assert!(watermarks.contains("TRIBUNAL DE JUSTIÇA"));
        assert!(watermarks.contains("Assinado digitalmente"));
        assert!(!watermarks.contains("Primeira página"));
    }

    #[test]
    fn test_single_page_has_no_watermarks() {
        assert!(detect_watermarks(&pages(&["Cabeçalho\nTexto"])).is_empty());
    }

    #[test]
    fn test_join_pages_filters_and_skips_blank_pages() {
        let pages = pages(&[
            "Cabeçalho\nPrimeira",
            "   ",
            "Cabeçalho\nSegunda",
            "Cabeçalho\nTerceira",
        ]);

        assert_eq!(join_pages(&pages), "Primeira\n\nSegunda\n\nTerceira");
    }

    #[test]
    fn test_join_pages_keeps_line_on_exactly_half() {
        let pages = pages(&["Rodapé\nUm", "Rodapé\nDois", "Três", "Quatro"]);

        let joined = join_pages(&pages);
        assert!(joined.contains("Rodapé"));
    }
}
