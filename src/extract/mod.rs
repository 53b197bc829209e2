//! Content extraction: turning raw uploaded bytes into plain text.
//!
//! Dispatch is by declared MIME type. Text-like types are decoded as strict UTF-8 and never
//! substituted. PDFs go through a two-phase attempt: direct layout extraction first, then a
//! quality predicate decides whether the result is kept or discarded in favor of the OCR
//! fallback. Any other type is rejected outright; there is no raw-bytes-as-text fallback.

/// OCR engine abstraction and the pdfium + Tesseract implementation.
pub mod ocr;

use crate::extract::ocr::OcrEngine;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Errors produced while extracting text from uploaded bytes.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Declared MIME type is not in the supported set.
    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),
    /// Bytes declared as text were not valid UTF-8.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    /// Both the direct and OCR extraction paths failed or produced no text.
    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// How the accepted text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Layout-based text extraction straight from the document.
    Direct,
    /// Optical character recognition over rasterized pages.
    Ocr,
}

impl ExtractionMethod {
    /// Stable string form stored in chunk metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Ocr => "ocr",
        }
    }
}

/// Thresholds deciding whether direct PDF extraction output is usable.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    /// Minimum number of characters after trimming.
    pub min_chars: usize,
    /// Minimum ratio of alphanumeric characters to total characters.
    pub min_alnum_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_chars: 100,
            min_alnum_ratio: 0.3,
        }
    }
}

/// Decide whether direct PDF extraction output carries enough information to keep.
///
/// Empty or whitespace-only text never passes. The thresholds are configuration, not
/// constants: scanned documents frequently yield a handful of stray glyphs from embedded
/// metadata, which is what the alphanumeric ratio screens out.
pub fn direct_quality_ok(text: &str, thresholds: &QualityThresholds) -> bool {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total == 0 || total < thresholds.min_chars {
        return false;
    }
    let alnum = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    (alnum as f64 / total as f64) >= thresholds.min_alnum_ratio
}

/// MIME-dispatched text extractor with an injected OCR fallback.
pub struct ContentExtractor {
    ocr: Box<dyn OcrEngine>,
    quality: QualityThresholds,
}

impl ContentExtractor {
    /// Construct an extractor using the given OCR engine and quality thresholds.
    pub fn new(ocr: Box<dyn OcrEngine>, quality: QualityThresholds) -> Self {
        Self { ocr, quality }
    }

    /// Extract plain text from `bytes` according to the declared MIME type.
    pub async fn extract(
        &self,
        bytes: &[u8],
        declared_mime_type: &str,
    ) -> Result<(String, ExtractionMethod), ExtractError> {
        let mime = normalize_mime(declared_mime_type);
        if is_text_family(&mime) {
            let text = std::str::from_utf8(bytes).map_err(|err| {
                ExtractError::UnsupportedEncoding(format!("invalid UTF-8: {err}"))
            })?;
            return Ok((text.to_string(), ExtractionMethod::Direct));
        }
        if mime == "application/pdf" {
            return self.extract_pdf(bytes).await;
        }
        Err(ExtractError::UnsupportedMimeType(mime))
    }

    /// Two-phase PDF extraction: direct first, OCR when the direct result fails the quality
    /// predicate or errors.
    async fn extract_pdf(&self, bytes: &[u8]) -> Result<(String, ExtractionMethod), ExtractError> {
        let direct = direct_pdf_text(bytes);
        match &direct {
            Ok(text) if direct_quality_ok(text, &self.quality) => {
                tracing::debug!(chars = text.len(), "Direct PDF extraction accepted");
                return Ok((text.clone(), ExtractionMethod::Direct));
            }
            Ok(text) => {
                tracing::info!(
                    chars = text.len(),
                    "Direct PDF extraction below quality threshold; falling back to OCR"
                );
            }
            Err(reason) => {
                tracing::info!(reason = %reason, "Direct PDF extraction failed; falling back to OCR");
            }
        }

        match self.ocr.recognize_pdf(bytes).await {
            Ok(text) if !text.trim().is_empty() => Ok((text, ExtractionMethod::Ocr)),
            Ok(_) => Err(ExtractError::Failed(
                "direct extraction was unusable and OCR produced no text".to_string(),
            )),
            Err(ocr_error) => Err(ExtractError::Failed(format!(
                "direct extraction was unusable and OCR failed: {ocr_error}"
            ))),
        }
    }
}

/// Direct per-page PDF text extraction, joined with blank-line separators in page order.
///
/// `pdf-extract` is known to panic on some malformed font programs, so the call is isolated
/// behind `catch_unwind` and a panic is reported as an ordinary extraction failure.
fn direct_pdf_text(bytes: &[u8]) -> Result<String, String> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match outcome {
        Ok(Ok(pages)) => Ok(pages.join("\n\n")),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err("pdf text extraction panicked".to_string()),
    }
}

fn normalize_mime(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_text_family(mime: &str) -> bool {
    mime.starts_with("text/")
        || matches!(
            mime,
            "application/json" | "application/xml" | "application/csv"
        )
}
