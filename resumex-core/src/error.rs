//! Error taxonomy for the extraction pipeline.
//!
//! Components return these errors; the extraction coordinator is the only
//! place that turns them into a degraded `ExtractionResult`.

use std::io;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// No handler accepts the file extension or declared MIME type.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A single page could not be parsed or rendered. The page is skipped.
    #[error("Page {page} is corrupt: {reason}")]
    PageCorrupt { page: u32, reason: String },

    /// The page carries no usable text layer and must be rasterized.
    #[error("Page {page} has no text layer")]
    NoTextLayer { page: u32 },

    /// An OCR engine failed to initialize or to run.
    #[error("OCR engine '{engine}' unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    /// Every path was tried and the document produced no text at all.
    #[error("No text extracted: {0}")]
    NoTextExtracted(String),

    /// Hyperlinks could not be read; callers absorb this.
    #[error("Link recovery failed: {0}")]
    LinkRecoveryFailed(String),

    /// The per-document deadline expired.
    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    /// The PDF rendering library could not be loaded or refused the document.
    #[error("PDF renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// DOCX container or XML part could not be read.
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractError {
    /// Short machine-readable tag recorded in page failure markers
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::UnsupportedFormat(_) => "unsupported_format",
            ExtractError::PageCorrupt { .. } => "page_corrupt",
            ExtractError::NoTextLayer { .. } => "no_text_layer",
            ExtractError::EngineUnavailable { .. } => "engine_unavailable",
            ExtractError::NoTextExtracted(_) => "no_text_extracted",
            ExtractError::LinkRecoveryFailed(_) => "link_recovery_failed",
            ExtractError::Timeout(_) => "timeout",
            ExtractError::RendererUnavailable(_) => "renderer_unavailable",
            ExtractError::Archive(_) => "archive",
            ExtractError::Io(_) => "io",
        }
    }

    /// Recoverable errors degrade the result; the rest end the document.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractError::PageCorrupt { .. }
                | ExtractError::NoTextLayer { .. }
                | ExtractError::EngineUnavailable { .. }
                | ExtractError::LinkRecoveryFailed(_)
                | ExtractError::Timeout(_)
        )
    }

    pub fn engine_unavailable(engine: &str, reason: impl ToString) -> Self {
        ExtractError::EngineUnavailable {
            engine: engine.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(err: zip::result::ZipError) -> Self {
        ExtractError::Archive(err.to_string())
    }
}

impl From<quick_xml::Error> for ExtractError {
    fn from(err: quick_xml::Error) -> Self {
        ExtractError::Archive(err.to_string())
    }
}
