//! OCR fallback for scanned PDFs.
//!
//! Rasterization and character recognition sit behind [`OcrEngine`] so the extractor can be
//! exercised with a scripted engine in tests. The production implementation renders each page
//! with pdfium at a fixed DPI, writes the page images into a scoped temporary directory, and
//! feeds them to the `tesseract` binary one page at a time. The temporary directory is removed
//! when it drops, on every exit path.

use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Errors raised while recognizing text from rasterized pages.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The PDF could not be rendered to page images.
    #[error("Failed to rasterize PDF: {0}")]
    Rasterize(String),
    /// The OCR engine failed to process a page image.
    #[error("OCR engine failed: {0}")]
    Recognition(String),
}

/// Interface implemented by OCR backends.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text across all pages of the given PDF, concatenated in page order.
    async fn recognize_pdf(&self, pdf_bytes: &[u8]) -> Result<String, OcrError>;
}

/// Production OCR engine: pdfium rasterization piped through the Tesseract CLI.
pub struct PdfiumTesseractOcr {
    dpi: u32,
    language: String,
}

impl PdfiumTesseractOcr {
    /// Construct an engine rendering at `dpi` and recognizing with the given language pack.
    pub fn new(dpi: u32, language: impl Into<String>) -> Self {
        Self {
            dpi,
            language: language.into(),
        }
    }

    async fn recognize_page(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .await
            .map_err(|err| OcrError::Recognition(format!("failed to spawn tesseract: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for PdfiumTesseractOcr {
    async fn recognize_pdf(&self, pdf_bytes: &[u8]) -> Result<String, OcrError> {
        let workdir =
            tempfile::tempdir().map_err(|err| OcrError::Rasterize(err.to_string()))?;
        let pages = rasterize_pages(pdf_bytes, self.dpi, workdir.path())?;
        tracing::debug!(pages = pages.len(), dpi = self.dpi, "PDF rasterized for OCR");

        let mut texts = Vec::with_capacity(pages.len());
        for page_path in &pages {
            texts.push(self.recognize_page(page_path).await?);
        }

        Ok(texts.join("\n\n"))
    }
}

/// Render every page of the PDF to a PNG file under `dir`, returning the paths in page order.
///
/// Runs synchronously: pdfium handles are not `Send`, so rendering completes before the caller
/// awaits anything.
fn rasterize_pages(pdf_bytes: &[u8], dpi: u32, dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|err| OcrError::Rasterize(format!("pdfium unavailable: {err}")))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|err| OcrError::Rasterize(err.to_string()))?;

    let scale = dpi as f32 / 72.0;
    let mut paths = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let width = (page.width().value * scale).round() as i32;
        let height = (page.height().value * scale).round() as i32;
        let config = PdfRenderConfig::new()
            .set_target_width(width.max(1))
            .set_maximum_height(height.max(1));
        let image: DynamicImage = page
            .render_with_config(&config)
            .map_err(|err| OcrError::Rasterize(err.to_string()))?
            .as_image();

        let path = dir.join(format!("page-{index:04}.png"));
        image
            .into_rgb8()
            .save(&path)
            .map_err(|err| OcrError::Rasterize(err.to_string()))?;
        paths.push(path);
    }

    Ok(paths)
}
