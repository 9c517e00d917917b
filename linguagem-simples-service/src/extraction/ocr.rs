//! OCR fallback for scanned PDFs.
//!
//! Pages are rasterized with pdfium, written as PNG into a scratch directory
//! and passed to the `tesseract` CLI one at a time.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

use super::pdf::{create_pdfium, load_document};
use crate::config::OcrConfig;
use crate::error::ProcessingError;

const TESSERACT_BIN: &str = "tesseract";

/// Whether the tesseract binary can be executed. Probed once per process.
pub fn is_ocr_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        let available = Command::new(TESSERACT_BIN)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if !available {
            debug!("tesseract not found - install tesseract-ocr for OCR support");
        }
        available
    })
}

/// Run OCR over the first `config.max_pages` pages of a PDF.
pub fn ocr_pdf(bytes: &[u8], config: &OcrConfig) -> Result<String, ProcessingError> {
    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, bytes)?;
    let scratch = tempfile::tempdir().map_err(ProcessingError::Io)?;

    let total_pages = document.pages().len() as usize;
    let pages_to_read = total_pages.min(config.max_pages);
    if pages_to_read < total_pages {
        warn!(
            total_pages,
            max_pages = config.max_pages,
            "Document exceeds OCR page limit; remaining pages skipped"
        );
    }
    info!(pages = pages_to_read, dpi = config.dpi, language = %config.language, "Starting OCR");

    let render_config = PdfRenderConfig::new().scale_page_by_factor(config.dpi as f32 / 72.0);

    let mut page_texts = Vec::with_capacity(pages_to_read);
    for (index, page) in document.pages().iter().take(pages_to_read).enumerate() {
        let page_num = index + 1;
        let image_path = scratch.path().join(format!("page-{:04}.png", page_num));

        let rendered = page
            .render_with_config(&render_config)
            .map_err(|e| ProcessingError::Ocr {
                message: format!("Failed to render page {}: {}", page_num, e),
            })
            .and_then(|bitmap| {
                bitmap
                    .as_image()
                    .save_with_format(&image_path, image::ImageFormat::Png)
                    .map_err(|e| ProcessingError::Ocr {
                        message: format!("Failed to write page {} image: {}", page_num, e),
                    })
            });

        if let Err(e) = rendered {
            warn!(page = page_num, error = %e, "Skipping page");
            continue;
        }

        match run_tesseract(&image_path, &config.language) {
            Ok(text) => {
                debug!(page = page_num, chars = text.chars().count(), "OCR page complete");
                page_texts.push(text);
            }
            Err(e) => warn!(page = page_num, error = %e, "OCR failed for page"),
        }
    }

    if page_texts.is_empty() && pages_to_read > 0 {
        return Err(ProcessingError::Ocr {
            message: "no page could be recognized".to_string(),
        });
    }

    Ok(page_texts.join("\n\n"))
}

fn tesseract_args(image_path: &Path, language: &str) -> Vec<String> {
    vec![
        image_path.to_string_lossy().into_owned(),
        "stdout".to_string(),
        "-l".to_string(),
        language.to_string(),
        "--psm".to_string(),
        // Automatic page segmentation with orientation detection
        "1".to_string(),
    ]
}

fn run_tesseract(image_path: &Path, language: &str) -> Result<String, ProcessingError> {
    let output = Command::new(TESSERACT_BIN)
        .args(tesseract_args(image_path, language))
        .output()
        .map_err(|e| ProcessingError::Ocr {
            message: format!("Failed to run tesseract: {}", e),
        })?;

    if !output.status.success() {
        return Err(ProcessingError::Ocr {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesseract_args() {
        let args = tesseract_args(Path::new("/tmp/page-0001.png"), "por");
        assert_eq!(
            args,
            vec!["/tmp/page-0001.png", "stdout", "-l", "por", "--psm", "1"]
        );
    }
}
