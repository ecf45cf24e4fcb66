//! End-to-end pipeline tests through the public API.
//!
//! Paginated inputs are simulated with an in-memory `PageSource` wrapped in
//! a test handler, so the scan decision, OCR fallback, column reconstruction
//! and link recovery all run exactly as they do for PDFs. DOCX inputs are
//! real packages written to a temp dir.
//!
//! No pdfium library or OCR runtime is needed to run these tests.

use image::RgbImage;
use pretty_assertions::assert_eq;
use resumex_core::config::ExtractionConfig;
use resumex_core::error::{ExtractError, Result};
use resumex_core::handlers::{
    extract_paged, DocumentContent, DocumentHandler, DocxHandler, ExtractionContext, HandlerRegistry, PageSize,
    PageSource,
};
use resumex_core::ocr::{OcrEngine, OcrOrchestrator, OcrRegion};
use resumex_core::{
    segment_record, BoundingBox, Block, ExtractionCoordinator, ExtractionMethod, Link, SectionValue,
};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fixture helpers
// ============================================================================

#[derive(Clone, Default)]
struct FakePage {
    /// `None` means the page carries no text layer
    words: Option<Vec<(String, BoundingBox)>>,
    links: Vec<String>,
}

impl FakePage {
    fn scanned() -> Self {
        Self::default()
    }

    fn with_words(words: Vec<(String, BoundingBox)>) -> Self {
        Self {
            words: Some(words),
            links: Vec::new(),
        }
    }

    fn linking(mut self, url: &str) -> Self {
        self.links.push(url.to_string());
        self
    }
}

/// 600 x 800 pages rasterized at twice the page width
struct FakeDocument {
    pages: Vec<FakePage>,
    first_layer_delay: Option<Duration>,
    rasterized: AtomicUsize,
}

impl FakeDocument {
    fn new(pages: Vec<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            first_layer_delay: None,
            rasterized: AtomicUsize::new(0),
        })
    }

    fn slow(pages: Vec<FakePage>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pages,
            first_layer_delay: Some(delay),
            rasterized: AtomicUsize::new(0),
        })
    }

    fn rasterized(&self) -> usize {
        self.rasterized.load(Ordering::SeqCst)
    }
}

impl PageSource for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, _index: usize) -> Result<PageSize> {
        Ok(PageSize {
            width: 600.0,
            height: 800.0,
        })
    }

    fn text_layer(&self, index: usize) -> Result<Vec<Block>> {
        if index == 0 {
            if let Some(delay) = self.first_layer_delay {
                std::thread::sleep(delay);
            }
        }
        let page = index as u32 + 1;
        match &self.pages[index].words {
            None => Err(ExtractError::NoTextLayer { page }),
            Some(words) => Ok(words
                .iter()
                .filter_map(|(text, bbox)| Block::native(text, *bbox, page))
                .collect()),
        }
    }

    fn rasterize(&self, _index: usize, _dpi: u32) -> Result<RgbImage> {
        self.rasterized.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(1200, 1600, image::Rgb([255, 255, 255])))
    }

    fn links(&self, index: usize) -> Result<Vec<Link>> {
        Ok(self.pages[index]
            .links
            .iter()
            .map(|url| Link {
                url: url.clone(),
                page: index as u32 + 1,
                rect: None,
            })
            .collect())
    }
}

/// Routes `.fake` files to a shared in-memory document
struct FakeHandler {
    document: Arc<FakeDocument>,
}

impl DocumentHandler for FakeHandler {
    fn process(&self, _bytes: &[u8], ctx: &ExtractionContext) -> Result<DocumentContent> {
        extract_paged(self.document.as_ref(), ctx)
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn extensions(&self) -> &[&'static str] {
        &["fake"]
    }

    fn mime_types(&self) -> &[&'static str] {
        &["application/x-fake"]
    }
}

/// Returns the same regions for every page image, in image pixels
struct FixedEngine {
    name: &'static str,
    regions: Vec<OcrRegion>,
    calls: AtomicUsize,
}

impl FixedEngine {
    fn new(name: &'static str, words: &[(&str, f32, f32)]) -> Arc<Self> {
        let regions = words
            .iter()
            .map(|(text, x, y)| OcrRegion {
                text: text.to_string(),
                bbox: BoundingBox::new(*x, *y, x + 160.0, y + 30.0),
                confidence: 0.87,
            })
            .collect();
        Arc::new(Self {
            name,
            regions,
            calls: AtomicUsize::new(0),
        })
    }
}

impl OcrEngine for FixedEngine {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrRegion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.regions.clone())
    }

    fn name(&self) -> &str {
        self.name
    }
}

struct UnavailableEngine;

impl OcrEngine for UnavailableEngine {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrRegion>> {
        Err(ExtractError::engine_unavailable("primary", "model files missing"))
    }

    fn name(&self) -> &str {
        "primary"
    }
}

fn test_config() -> ExtractionConfig {
    let mut config = ExtractionConfig::default();
    config.ocr.preprocess.enabled = false;
    config
}

fn coordinator(document: &Arc<FakeDocument>, ocr: OcrOrchestrator, config: ExtractionConfig) -> ExtractionCoordinator {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(FakeHandler {
        document: Arc::clone(document),
    }));
    registry.register(Box::new(DocxHandler::new()));
    ExtractionCoordinator::new_with_dependencies(config, registry, Arc::new(ocr))
}

fn secondary_only(engine: Arc<FixedEngine>, config: &ExtractionConfig) -> OcrOrchestrator {
    OcrOrchestrator::new(None, Some(engine), &config.ocr)
}

fn word(text: &str, x0: f32, y0: f32) -> (String, BoundingBox) {
    (text.to_string(), BoundingBox::new(x0, y0, x0 + 40.0, y0 + 10.0))
}

/// Single column of 30 distinct words, one per line
fn text_page() -> FakePage {
    let words = [
        "Jane", "Doe", "Staff", "Engineer", "Summary", "Builds", "search", "infrastructure", "EXPERIENCE",
        "Acme", "Corporation", "Indexing", "pipelines", "written", "in", "Rust", "EDUCATION", "Carnegie",
        "Mellon", "University", "Computer", "Science", "SKILLS", "Kubernetes", "Postgres", "Kafka",
        "Terraform", "Python", "Golang", "Linux",
    ];
    FakePage::with_words(
        words
            .iter()
            .enumerate()
            .map(|(i, w)| word(w, 60.0, 40.0 + i as f32 * 20.0))
            .collect(),
    )
}

/// 20 words per column: left spans x 50-250, right spans x 350-550
fn two_column_page() -> FakePage {
    let mut words = Vec::new();
    for i in 0..20 {
        let offset = (i % 4) as f32 * 40.0;
        let y = 40.0 + i as f32 * 20.0;
        words.push(word(&format!("left{i:02}"), 50.0 + offset, y));
        words.push(word(&format!("right{i:02}"), 350.0 + offset, y));
    }
    FakePage::with_words(words)
}

fn docx_body(paragraphs: &[&str]) -> String {
    let inner: String = paragraphs
        .iter()
        .map(|text| format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{inner}</w:body></w:document>"#
    )
}

fn write_docx(path: &Path, parts: &[(&str, String)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in parts {
        writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

// ============================================================================
// Text layer: native extraction and column reconstruction
// ============================================================================

mod text_layer {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dense_text_layer_is_native() {
        let document = FakeDocument::new(vec![text_page()]);
        let config = test_config();
        let engine = FixedEngine::new("secondary", &[("ignored", 100.0, 100.0)]);
        let coordinator = coordinator(&document, secondary_only(engine.clone(), &config), config);

        let result = coordinator.extract_bytes("cv.fake", b"", None);

        assert_eq!(result.method(), ExtractionMethod::NativeText);
        assert!(!result.metadata.is_scanned);
        assert_eq!(result.pages, 1);
        assert_eq!(result.metadata.detected_columns, 1);
        assert!(result.column_texts[0].starts_with("Jane\nDoe\nStaff"));
        assert_eq!(document.rasterized(), 0);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn two_column_page_reads_left_then_right() {
        let document = FakeDocument::new(vec![two_column_page()]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("cv.fake", b"", None);

        assert_eq!(result.metadata.detected_columns, 2);
        assert_eq!(result.column_texts.len(), 2);
        let left = &result.column_texts[0];
        let right = &result.column_texts[1];
        assert!(left.starts_with("left00\nleft01"));
        assert!(!left.contains("right"));
        assert!(right.starts_with("right00\nright01"));
        assert!(!right.contains("left"));
        assert_eq!(left.lines().count(), 20);
    }

    #[test]
    fn three_columns_are_opt_in() {
        let mut words = Vec::new();
        for i in 0..15 {
            let y = 40.0 + i as f32 * 20.0;
            words.push(word(&format!("a{i:02}"), 40.0, y));
            words.push(word(&format!("b{i:02}"), 280.0, y));
            words.push(word(&format!("c{i:02}"), 520.0, y));
        }
        let page = FakePage::with_words(words);

        let document = FakeDocument::new(vec![page.clone()]);
        let capped = coordinator(&document, OcrOrchestrator::disabled(), test_config())
            .extract_bytes("cv.fake", b"", None);
        assert!(capped.metadata.detected_columns <= 2);

        let mut config = test_config();
        config.columns.max_columns = 3;
        let document = FakeDocument::new(vec![page]);
        let extended = coordinator(&document, OcrOrchestrator::disabled(), config)
            .extract_bytes("cv.fake", b"", None);
        assert_eq!(extended.metadata.detected_columns, 3);
        assert!(extended.column_texts[1].starts_with("b00"));
    }

    #[test]
    fn result_carries_hash_and_handler() {
        let document = FakeDocument::new(vec![text_page()]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("cv.fake", b"%FAKE", None);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["metadata"]["method"], "native_text");
        assert_eq!(json["metadata"]["handler"], "fake");
        assert_eq!(json["metadata"]["content_sha256"].as_str().unwrap().len(), 64);
        assert_eq!(json["style_analysis"]["bullet_points_used"], "no");
    }
}

// ============================================================================
// Scanned documents and OCR fallback
// ============================================================================

mod ocr_fallback {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scanned_document_uses_only_ocr_blocks() {
        let stamp = FakePage::with_words(vec![word("Scan0001", 20.0, 20.0)]);
        let document = FakeDocument::new(vec![stamp, FakePage::scanned()]);
        let config = test_config();
        let engine = FixedEngine::new("secondary", &[("Jane", 100.0, 100.0), ("Doe", 300.0, 100.0)]);
        let coordinator = coordinator(&document, secondary_only(engine.clone(), &config), config);

        let result = coordinator.extract_bytes("scan.fake", b"", None);

        assert!(result.metadata.is_scanned);
        assert_eq!(result.method(), ExtractionMethod::OcrFallback);
        assert!(!result.full_text().contains("Scan0001"));
        assert!(result.full_text().contains("Jane Doe"));
        assert_eq!(document.rasterized(), 2);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sparse_text_layer_invokes_ocr() {
        let sparse = FakePage::with_words(vec![word("Resume", 60.0, 40.0), word("2024", 120.0, 40.0)]);
        let document = FakeDocument::new(vec![sparse]);
        let config = test_config();
        let engine = FixedEngine::new("secondary", &[("Recognized", 100.0, 100.0)]);
        let coordinator = coordinator(&document, secondary_only(engine.clone(), &config), config);

        let result = coordinator.extract_bytes("sparse.fake", b"", None);

        assert!(result.metadata.is_scanned);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.full_text(), "Recognized");
    }

    #[test]
    fn unavailable_primary_falls_back_to_secondary() {
        let document = FakeDocument::new(vec![FakePage::scanned()]);
        let config = test_config();
        let secondary = FixedEngine::new("secondary", &[("Jane", 100.0, 100.0), ("Doe", 300.0, 100.0)]);
        let ocr = OcrOrchestrator::new(Some(Arc::new(UnavailableEngine)), Some(secondary.clone()), &config.ocr);
        let coordinator = coordinator(&document, ocr, config);

        let result = coordinator.extract_bytes("scan.fake", b"", None);

        assert_eq!(result.method(), ExtractionMethod::OcrFallback);
        assert_eq!(result.column_texts, vec!["Jane Doe".to_string()]);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn text_layer_plus_ocr_page_is_mixed() {
        let document = FakeDocument::new(vec![text_page(), FakePage::scanned()]);
        let config = test_config();
        let engine = FixedEngine::new("secondary", &[("Page2", 100.0, 100.0)]);
        let coordinator = coordinator(&document, secondary_only(engine, &config), config);

        let result = coordinator.extract_bytes("cv.fake", b"", None);

        assert_eq!(result.method(), ExtractionMethod::Mixed);
        assert_eq!(document.rasterized(), 1);
        assert!(result.full_text().ends_with("Page2"));
    }

    #[test]
    fn no_engines_and_no_text_is_an_error_record() {
        let document = FakeDocument::new(vec![FakePage::scanned()]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("scan.fake", b"", None);

        assert!(result.is_error());
        assert_eq!(result.column_texts, vec![String::new()]);
        assert_eq!(result.metadata.page_failures[0].kind, "engine_unavailable");
        assert!(result.metadata.error.as_deref().unwrap().starts_with("No text extracted"));
    }
}

// ============================================================================
// Hyperlink recovery
// ============================================================================

mod links {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_profile_on_two_pages_is_reported_once() {
        let github = "https://github.com/janedoe";
        let document = FakeDocument::new(vec![
            text_page().linking(github),
            text_page().linking(github).linking("mailto:jane@example.org"),
        ]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("cv.fake", b"", None);

        let urls: Vec<(&str, u32)> = result.links.iter().map(|l| (l.url.as_str(), l.page)).collect();
        assert_eq!(urls, vec![(github, 1), ("mailto:jane@example.org", 2)]);
    }

    #[test]
    fn links_feed_contact_details() {
        let document = FakeDocument::new(vec![text_page().linking("https://www.linkedin.com/in/janedoe")]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("cv.fake", b"", None);
        let segmented = segment_record(&result, &coordinator.config().segmenter);

        assert_eq!(
            segmented.personal_info.linkedin.as_deref(),
            Some("https://www.linkedin.com/in/janedoe")
        );
    }
}

// ============================================================================
// Deadlines
// ============================================================================

mod deadline {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pages_after_the_deadline_are_marked() {
        let document = FakeDocument::slow(vec![text_page(), text_page()], Duration::from_millis(1100));
        let mut config = test_config();
        config.timeout_secs = Some(1);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), config);

        let result = coordinator.extract_bytes("slow.fake", b"", None);

        assert!(result.metadata.timed_out);
        assert_eq!(result.method(), ExtractionMethod::NativeText);
        assert!(result.full_text().starts_with("Jane"));
        let failed_pages: Vec<(u32, &str)> = result
            .metadata
            .page_failures
            .iter()
            .map(|f| (f.page, f.kind.as_str()))
            .collect();
        assert_eq!(failed_pages, vec![(2, "timeout")]);
    }
}

// ============================================================================
// DOCX through the file system
// ============================================================================

mod docx {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn docx_file_extracts_and_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jane.docx");
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://github.com/janedoe" TargetMode="External"/></Relationships>"#;
        write_docx(
            &path,
            &[
                (
                    "word/document.xml",
                    docx_body(&[
                        "Jane Doe",
                        "jane.doe@example.com",
                        "EXPERIENCE",
                        "Acme Corp, Staff Engineer",
                        "Technical Skills",
                        "• Rust",
                        "• Kubernetes",
                    ]),
                ),
                ("word/_rels/document.xml.rels", rels.to_string()),
            ],
        );

        let document = FakeDocument::new(Vec::new());
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());
        let result = coordinator.extract(&path, None);

        assert_eq!(result.method(), ExtractionMethod::NativeText);
        assert_eq!(result.metadata.handler.as_deref(), Some("docx"));
        assert_eq!(result.metadata.detected_columns, 1);
        assert_eq!(result.links.len(), 1);
        assert!(result.full_text().starts_with("Jane Doe\njane.doe@example.com\nEXPERIENCE"));

        let segmented = segment_record(&result, &coordinator.config().segmenter);
        assert_eq!(segmented.personal_info.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(segmented.personal_info.github.as_deref(), Some("https://github.com/janedoe"));
        assert_eq!(
            segmented.section("EXPERIENCE"),
            Some(&SectionValue::Text("Acme Corp, Staff Engineer".to_string()))
        );
        assert_eq!(segmented.section("SKILLS").unwrap().items(), vec!["Rust", "Kubernetes"]);

        let json = serde_json::to_value(&segmented).unwrap();
        assert_eq!(json["experience"], "Acme Corp, Staff Engineer");
        assert_eq!(json["skills"], serde_json::json!(["Rust", "Kubernetes"]));
        assert_eq!(json["_raw_sections"]["SKILLS"], "• Rust\n• Kubernetes");
    }

    #[test]
    fn corrupt_docx_is_an_error_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let document = FakeDocument::new(Vec::new());
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());
        let result = coordinator.extract(&path, None);

        assert!(result.is_error());
        assert_eq!(result.metadata.handler.as_deref(), Some("docx"));
        assert!(result.metadata.content_sha256.is_some());
    }
}

// ============================================================================
// Dispatch
// ============================================================================

mod dispatch {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unsupported_extension_is_rejected() {
        let document = FakeDocument::new(vec![text_page()]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("notes.odt", b"whatever", None);

        assert!(result.is_error());
        assert!(result.metadata.handler.is_none());
        assert_eq!(result.metadata.error.as_deref(), Some("Unsupported format: .odt"));
    }

    #[test]
    fn declared_mime_overrides_extension() {
        let document = FakeDocument::new(vec![text_page()]);
        let coordinator = coordinator(&document, OcrOrchestrator::disabled(), test_config());

        let result = coordinator.extract_bytes("upload.bin", b"", Some("application/x-fake; charset=binary"));

        assert_eq!(result.method(), ExtractionMethod::NativeText);
        assert_eq!(result.metadata.handler.as_deref(), Some("fake"));
    }

    #[test]
    fn default_registry_covers_resume_formats() {
        let registry = HandlerRegistry::default();
        for name in ["cv.pdf", "cv.DOCX", "scan.png", "scan.tiff"] {
            assert!(registry.is_supported(Path::new(name)), "{name} should be supported");
        }
        assert!(!registry.is_supported(Path::new("cv.odt")));
    }
}
