//! PDF Handler
//!
//! Opens the document with pdfium and runs the shared paged extraction over
//! it: text layer first, OCR on scanned documents and on pages whose text
//! layer is missing.

pub mod library;
pub mod renderer;

pub use library::SharedLibrary;
pub use renderer::{bind_pdfium, PdfiumPageSource};

use crate::error::{ExtractError, Result};
use crate::handlers::paged::extract_paged;
use crate::handlers::{DocumentContent, DocumentHandler, ExtractionContext};
use pdfium_render::prelude::Pdfium;

/// Process-wide pdfium binding shared by every worker thread
pub static PDFIUM: SharedLibrary<Pdfium> = SharedLibrary::new("pdfium", bind_pdfium);

/// `%PDF` may follow a few bytes of junk; readers accept it within the first KiB
const HEADER_WINDOW: usize = 1024;

#[derive(Debug, Default)]
pub struct PdfHandler;

impl PdfHandler {
    pub fn new() -> Self {
        Self
    }
}

pub fn has_pdf_header(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(HEADER_WINDOW)]
        .windows(4)
        .any(|window| window == b"%PDF")
}

impl DocumentHandler for PdfHandler {
    fn process(&self, bytes: &[u8], ctx: &ExtractionContext) -> Result<DocumentContent> {
        if !has_pdf_header(bytes) {
            return Err(ExtractError::NoTextExtracted(
                "file is not a PDF (missing %PDF header)".to_string(),
            ));
        }

        let pdfium = PDFIUM.get()?;
        let source = PdfiumPageSource::open(&pdfium, bytes, &PDFIUM)?;
        extract_paged(&source, ctx)
    }

    fn name(&self) -> &str {
        "pdf"
    }

    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }

    fn mime_types(&self) -> &[&'static str] {
        &["application/pdf", "application/x-pdf"]
    }
}
