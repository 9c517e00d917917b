//! Document text extraction.
//!
//! pdfium provides the embedded text layer; scanned documents with little or
//! no text fall back to tesseract OCR when it is enabled and installed.

pub mod hash;
pub mod ocr;
pub mod pdf;
pub mod text;

use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::error::ProcessingError;

pub use hash::compute_content_hash;
pub use pdf::looks_like_pdf;
pub use text::{meaningful_char_count, normalize_text, truncate_chars};

/// Normalized text of an uploaded document
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: usize,
    pub used_ocr: bool,
}

/// Extract and normalize the text of a PDF.
///
/// Blocking: runs pdfium and possibly tesseract. Call from `spawn_blocking`.
pub fn extract_document(bytes: &[u8], ocr: &OcrConfig) -> Result<ExtractedDocument, ProcessingError> {
    let native = pdf::extract_pdf_text(bytes)?;
    let native_text = normalize_text(&native.text);

    let ocr_text = if needs_ocr(&native_text, ocr) {
        if ocr::is_ocr_available() {
            match ocr::ocr_pdf(bytes, ocr) {
                Ok(text) => Some(normalize_text(&text)),
                Err(e) => {
                    warn!(error = %e, "OCR fallback failed");
                    None
                }
            }
        } else {
            warn!(
                chars = meaningful_char_count(&native_text),
                "Document has little text but tesseract is not installed"
            );
            None
        }
    } else {
        None
    };

    let (text, used_ocr) = choose_text(native_text, ocr_text);
    if text.trim().is_empty() {
        return Err(ProcessingError::NoText);
    }

    info!(
        pages = native.pages,
        chars = text.chars().count(),
        used_ocr,
        "Document text extracted"
    );

    Ok(ExtractedDocument {
        text,
        pages: native.pages,
        used_ocr,
    })
}

fn needs_ocr(native_text: &str, ocr: &OcrConfig) -> bool {
    ocr.enabled && meaningful_char_count(native_text) < ocr.min_text_chars
}

/// Keep whichever candidate carries more meaningful characters.
fn choose_text(native: String, ocr: Option<String>) -> (String, bool) {
    match ocr {
        Some(ocr_text) if meaningful_char_count(&ocr_text) > meaningful_char_count(&native) => {
            (ocr_text, true)
        }
        _ => (native, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_ocr() {
        let config = OcrConfig {
            min_text_chars: 10,
            ..OcrConfig::default()
        };
        assert!(needs_ocr("", &config));
        assert!(needs_ocr("abc . . .", &config));
        assert!(!needs_ocr("Texto suficiente para dispensar OCR", &config));

        let disabled = OcrConfig {
            enabled: false,
            ..config
        };
        assert!(!needs_ocr("", &disabled));
    }

    #[test]
    fn test_choose_text_prefers_richer_source() {
        assert_eq!(
            choose_text("abc".into(), Some("abcdef".into())),
            ("abcdef".to_string(), true)
        );
        assert_eq!(
            choose_text("abcdef".into(), Some("abc".into())),
            ("abcdef".to_string(), false)
        );
        assert_eq!(choose_text("abc".into(), None), ("abc".to_string(), false));
    }
}
