//! Document Handlers
//!
//! Format-specific handlers turn raw document bytes into positioned Blocks
//! plus the hyperlinks found along the way.
//!
//! ## Architecture
//!
//! ```text
//! bytes + declared MIME / extension
//!     ↓
//! [HandlerRegistry]  picks one handler
//!     ↓
//! PDF / image: PageSource → extract_paged (text layer, scan check, OCR retry)
//! DOCX:        zip + XML walk
//!     ↓
//! DocumentContent (blocks, links, page failures)
//!     ↓
//! [ExtractionCoordinator]  columns, style, result record
//! ```
//!
//! ## Available Handlers
//!
//! - `PdfHandler` - PDF documents via pdfium
//! - `DocxHandler` - Word documents, read directly from the OOXML package
//! - `ImageHandler` - single raster images, always recognized with OCR

pub mod docx;
pub mod raster;
pub mod paged;
pub mod pdf;

pub use self::docx::DocxHandler;
pub use self::raster::ImageHandler;
pub use self::paged::{extract_paged, PageSize, PageSource};
pub use self::pdf::PdfHandler;

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Result};
use crate::ocr::OcrOrchestrator;
use crate::types::{Block, ExtractionMethod, Link, PageFailure};
use std::path::Path;
use std::time::Instant;

/// Everything a handler may consult while processing one document
pub struct ExtractionContext<'a> {
    pub config: &'a ExtractionConfig,
    pub ocr: &'a OcrOrchestrator,
    pub deadline: Option<Instant>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(config: &'a ExtractionConfig, ocr: &'a OcrOrchestrator) -> Self {
        Self {
            config,
            ocr,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Handler output before layout analysis
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub pages: u32,
    pub blocks: Vec<Block>,
    /// Widest page, in the coordinate space of the blocks
    pub page_width: f32,
    pub links: Vec<Link>,
    pub method: ExtractionMethod,
    pub is_scanned: bool,
    pub page_failures: Vec<PageFailure>,
    pub timed_out: bool,
}

impl DocumentContent {
    pub fn empty(pages: u32) -> Self {
        Self {
            pages,
            blocks: Vec::new(),
            page_width: 0.0,
            links: Vec::new(),
            method: ExtractionMethod::Error,
            is_scanned: false,
            page_failures: Vec::new(),
            timed_out: false,
        }
    }

    /// Why an empty document produced nothing, for the error record
    pub fn empty_reason(&self) -> String {
        if self.timed_out && self.page_failures.iter().all(|f| f.kind == "timeout") {
            return "deadline expired before any page produced text".to_string();
        }
        match self.page_failures.first() {
            Some(failure) if self.page_failures.len() == 1 => {
                format!("page {}: {}", failure.page, failure.reason)
            }
            Some(failure) => format!(
                "no text on any of {} pages (first failure on page {}: {})",
                self.pages, failure.page, failure.reason
            ),
            None => format!("no text on any of {} pages", self.pages),
        }
    }
}

/// Format handler: converts document bytes to Blocks
///
/// Handlers only report what they found. Column reconstruction, style
/// analysis and the final record are built by the coordinator, so every
/// format produces results of the same shape.
pub trait DocumentHandler: Send + Sync {
    /// Process document bytes
    fn process(&self, bytes: &[u8], ctx: &ExtractionContext) -> Result<DocumentContent>;

    /// Convenience method: read the file and process its bytes
    fn process_file(&self, input: &Path, ctx: &ExtractionContext) -> Result<DocumentContent> {
        let bytes = std::fs::read(input)?;
        self.process(&bytes, ctx)
    }

    /// Handler name for logging and result metadata
    fn name(&self) -> &str;

    /// Lowercase extensions without the dot
    fn extensions(&self) -> &[&'static str];

    fn mime_types(&self) -> &[&'static str];

    /// Check if the handler supports the given file type
    fn supports_file_type(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }

    fn supports_mime_type(&self, mime: &str) -> bool {
        let essence = mime_essence(mime);
        self.mime_types().iter().any(|m| m.eq_ignore_ascii_case(&essence))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// `type/subtype` without parameters, lowercased
fn mime_essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Ordered set of handlers. A declared MIME type is consulted first, then
/// the file extension.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn DocumentHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PdfHandler::new()));
        registry.register(Box::new(DocxHandler::new()));
        registry.register(Box::new(ImageHandler::new()));
        registry
    }
}

impl HandlerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register(&mut self, handler: Box<dyn DocumentHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn supported_extensions(&self) -> Vec<&'static str> {
        self.handlers
            .iter()
            .flat_map(|h| h.extensions().iter().copied())
            .collect()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.handlers.iter().any(|h| h.supports_file_type(path))
    }

    /// Pick the handler for a document. An unknown declared MIME type falls
    /// through to the extension.
    pub fn resolve(&self, path: &Path, declared_mime: Option<&str>) -> Result<&dyn DocumentHandler> {
        if let Some(mime) = declared_mime.filter(|m| !m.trim().is_empty()) {
            if let Some(handler) = self.handlers.iter().find(|h| h.supports_mime_type(mime)) {
                return Ok(handler.as_ref());
            }
            log::debug!("No handler for declared MIME type '{mime}', trying extension");
        }

        if let Some(handler) = self.handlers.iter().find(|h| h.supports_file_type(path)) {
            return Ok(handler.as_ref());
        }

        let described = match (extension_of(path), declared_mime) {
            (Some(ext), _) => format!(".{ext}"),
            (None, Some(mime)) => mime.to_string(),
            (None, None) => format!("{} (no extension)", path.display()),
        };
        Err(ExtractError::UnsupportedFormat(described))
    }
}
