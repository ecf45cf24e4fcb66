// Resumex Core Library
//
// Converts resumes (PDF, DOCX, scanned images) into reading-order column
// text with OCR fallback, then segments that text into labeled sections.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod handlers;
pub mod layout;
pub mod links;
pub mod ocr;
pub mod processor;
pub mod scan;
pub mod segmenter;
pub mod types;

// Re-export main types and functions for easy use
pub use config::ExtractionConfig;
pub use error::{ExtractError, Result};
pub use handlers::{DocumentHandler, ExtractionContext, HandlerRegistry};
pub use ocr::{OcrEngine, OcrOrchestrator};
pub use processor::{ExtractionCoordinator, StepProfiler};
pub use segmenter::{segment_record, SectionMap, SectionSegmenter, SectionValue, SegmentedResume};
pub use types::*;
