//! OCR orchestration: run the primary engine, supplement with the secondary
//! engine, normalize regions into Blocks and drop duplicates.
//!
//! Engine failures never propagate out of this module. A page whose engines
//! all fail contributes an empty Block list.

pub mod engine;
pub mod oar;
pub mod preprocess;
pub mod tesseract;

pub use engine::{OcrEngine, OcrRegion, SharedEngine};
pub use tesseract::TesseractEngine;

use crate::config::{OcrConfig, PreprocessConfig};
use crate::types::{Block, Engine};
use image::RgbImage;
use std::collections::HashSet;
use std::sync::Arc;

/// Process-wide primary engine handle
pub static PRIMARY_ENGINE: SharedEngine = SharedEngine::new("oar-ocr", oar::init_primary);

/// Process-wide secondary engine handle
pub static SECONDARY_ENGINE: SharedEngine = SharedEngine::new("tesseract", tesseract::init_secondary);

/// Release both shared engines and the shared pdfium binding. The next
/// orchestrator built from config initializes the engines again, and the
/// next PDF binds pdfium again.
pub fn teardown_shared_engines() {
    PRIMARY_ENGINE.teardown();
    SECONDARY_ENGINE.teardown();
    crate::handlers::pdf::PDFIUM.teardown();
}

pub struct OcrOrchestrator {
    primary: Option<Arc<dyn OcrEngine>>,
    secondary: Option<Arc<dyn OcrEngine>>,
    always_run_secondary: bool,
    preprocess: PreprocessConfig,
}

impl OcrOrchestrator {
    /// Create an orchestrator over explicit engines
    pub fn new(
        primary: Option<Arc<dyn OcrEngine>>,
        secondary: Option<Arc<dyn OcrEngine>>,
        config: &OcrConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            always_run_secondary: config.always_run_secondary,
            preprocess: config.preprocess.clone(),
        }
    }

    /// Resolve the process-wide engines. Engines that fail to initialize are
    /// left out; an orchestrator without engines yields empty pages.
    pub fn from_config(config: &OcrConfig) -> Self {
        let primary = PRIMARY_ENGINE.get_or_init(config).ok();
        let secondary = SECONDARY_ENGINE.get_or_init(config).ok();
        if primary.is_none() && secondary.is_none() {
            log::warn!("No OCR engine available; scanned pages will yield no text");
        }
        Self::new(primary, secondary, config)
    }

    /// An orchestrator that never recognizes anything
    pub fn disabled() -> Self {
        Self::new(None, None, &OcrConfig::default())
    }

    pub fn has_engines(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    pub fn engine_names(&self) -> Vec<String> {
        [&self.primary, &self.secondary]
            .into_iter()
            .flatten()
            .map(|engine| engine.name().to_string())
            .collect()
    }

    /// Recognize one page image. Block coordinates are in the pixel space of
    /// `image`, regardless of any internal upscaling.
    pub fn recognize_page(&self, image: &RgbImage, page: u32) -> Vec<Block> {
        if !self.has_engines() {
            return Vec::new();
        }

        let prepared = preprocess::prepare(image, &self.preprocess);
        let back_to_input = if prepared.scale > 0.0 { 1.0 / prepared.scale } else { 1.0 };

        let mut outputs: Vec<Vec<Block>> = Vec::new();

        let primary_blocks = self
            .primary
            .as_ref()
            .and_then(|engine| run_engine(engine.as_ref(), &prepared.image, back_to_input, Engine::OcrPrimary, page))
            .unwrap_or_default();
        let primary_empty = primary_blocks.is_empty();
        outputs.push(primary_blocks);

        if primary_empty || self.always_run_secondary {
            if let Some(engine) = &self.secondary {
                if let Some(blocks) = run_engine(engine.as_ref(), &prepared.image, back_to_input, Engine::OcrSecondary, page) {
                    outputs.push(blocks);
                }
            }
        }

        let merged = merge_engine_outputs(outputs);
        log::debug!("Page {page}: {} OCR blocks after merge", merged.len());
        merged
    }
}

/// Run one engine, logging and swallowing its failure. Unhealthy engines
/// are skipped without a call.
fn run_engine(
    engine: &dyn OcrEngine,
    image: &RgbImage,
    scale: f32,
    tag: Engine,
    page: u32,
) -> Option<Vec<Block>> {
    if !engine.is_healthy() {
        log::warn!("Page {page}: skipping unhealthy OCR engine '{}'", engine.name());
        return None;
    }
    match engine.recognize(image) {
        Ok(regions) => Some(
            regions
                .into_iter()
                .filter_map(|region| Block::ocr(&region.text, region.bbox.scaled(scale), region.confidence, tag, page))
                .collect(),
        ),
        Err(err) => {
            log::warn!("Page {page}: OCR engine '{}' failed: {err}", engine.name());
            None
        }
    }
}

/// Key identifying the same recognized word at the same place
type DedupKey = (String, i64, i64, i64, i64);

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dedup_key(block: &Block) -> DedupKey {
    let r = |v: f32| (v * 100.0).round() as i64;
    (
        normalize_text(&block.text),
        r(block.bbox.x0),
        r(block.bbox.y0),
        r(block.bbox.x1),
        r(block.bbox.y1),
    )
}

/// Drop repeated blocks, keeping the first occurrence
pub fn dedup_blocks(blocks: Vec<Block>) -> Vec<Block> {
    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(blocks.len());
    blocks
        .into_iter()
        .filter(|block| seen.insert(dedup_key(block)))
        .collect()
}

/// Concatenate engine outputs in priority order and deduplicate, so that
/// earlier engines win on identical geometry.
pub fn merge_engine_outputs(outputs: Vec<Vec<Block>>) -> Vec<Block> {
    dedup_blocks(outputs.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, Result};
    use crate::types::BoundingBox;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEngine {
        name: &'static str,
        regions: Vec<OcrRegion>,
        calls: AtomicUsize,
    }

    impl FixedEngine {
        fn new(name: &'static str, words: &[(&str, f32)]) -> Self {
            let regions = words
                .iter()
                .map(|(text, x)| OcrRegion {
                    text: text.to_string(),
                    bbox: BoundingBox::new(*x, 10.0, x + 50.0, 30.0),
                    confidence: 0.9,
                })
                .collect();
            Self {
                name,
                regions,
                calls: AtomicUsize::new(0),
            }
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
            Err(ExtractError::engine_unavailable("primary", "runtime missing"))
        }

        fn name(&self) -> &str {
            "primary"
        }
    }

    /// Reports itself unhealthy and counts any recognize call it still gets
    struct SickEngine {
        calls: AtomicUsize,
    }

    impl OcrEngine for SickEngine {
        fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrRegion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![OcrRegion {
                text: "stale".to_string(),
                bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                confidence: 1.0,
            }])
        }

        fn name(&self) -> &str {
            "sick"
        }

        fn is_healthy(&self) -> bool {
            false
        }
    }

    fn no_preprocess() -> OcrConfig {
        let mut config = OcrConfig::default();
        config.preprocess.enabled = false;
        config
    }

    fn blank_page() -> RgbImage {
        RgbImage::from_pixel(100, 100, image::Rgb([255, 255, 255]))
    }

    #[test]
    fn secondary_skipped_when_primary_has_output() {
        let primary = Arc::new(FixedEngine::new("p", &[("Rust", 10.0)]));
        let secondary = Arc::new(FixedEngine::new("s", &[("Go", 80.0)]));
        let orchestrator = OcrOrchestrator::new(Some(primary.clone()), Some(secondary.clone()), &no_preprocess());

        let blocks = orchestrator.recognize_page(&blank_page(), 1);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].engine, Engine::OcrPrimary);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unavailable_primary_falls_back_to_secondary_unmodified() {
        let secondary = Arc::new(FixedEngine::new("s", &[("Jane", 10.0), ("Doe", 80.0)]));
        let orchestrator =
            OcrOrchestrator::new(Some(Arc::new(UnavailableEngine)), Some(secondary.clone()), &no_preprocess());

        let blocks = orchestrator.recognize_page(&blank_page(), 2);
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Jane", "Doe"]);
        assert!(blocks.iter().all(|b| b.engine == Engine::OcrSecondary && b.page == 2));
        assert_eq!(blocks[0].bbox, secondary.regions[0].bbox);
        assert_eq!(blocks[0].confidence, Some(0.9));
    }

    #[test]
    fn unhealthy_primary_is_skipped_for_secondary() {
        let primary = Arc::new(SickEngine {
            calls: AtomicUsize::new(0),
        });
        let secondary = Arc::new(FixedEngine::new("s", &[("Jane", 10.0)]));
        let orchestrator = OcrOrchestrator::new(Some(primary.clone()), Some(secondary.clone()), &no_preprocess());

        let blocks = orchestrator.recognize_page(&blank_page(), 1);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].engine, Engine::OcrSecondary);
    }

    #[test]
    fn primary_wins_on_identical_geometry() {
        let primary = Arc::new(FixedEngine::new("p", &[("Rust", 10.0)]));
        let secondary = Arc::new(FixedEngine::new("s", &[("Rust", 10.0), ("Go", 80.0)]));
        let mut config = no_preprocess();
        config.always_run_secondary = true;
        let orchestrator = OcrOrchestrator::new(Some(primary), Some(secondary), &config);

        let blocks = orchestrator.recognize_page(&blank_page(), 1);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].engine, Engine::OcrPrimary);
        assert_eq!(blocks[1].text, "Go");
        assert_eq!(blocks[1].engine, Engine::OcrSecondary);
    }

    #[test]
    fn merging_output_with_itself_is_idempotent() {
        let engine = FixedEngine::new("p", &[("Jane", 10.0), ("Doe", 80.0), ("Doe", 80.004)]);
        let single: Vec<Block> = engine
            .regions
            .iter()
            .filter_map(|r| Block::ocr(&r.text, r.bbox, r.confidence, Engine::OcrPrimary, 1))
            .collect();
        let once = merge_engine_outputs(vec![single.clone()]);
        let twice = merge_engine_outputs(vec![single.clone(), single]);
        assert_eq!(once.len(), twice.len());
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn whitespace_variants_share_a_key() {
        let bbox = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
        let a = Block::ocr("New  York", bbox, 0.5, Engine::OcrPrimary, 1).unwrap();
        let b = Block::ocr(" New York ", bbox, 0.5, Engine::OcrSecondary, 1).unwrap();
        assert_eq!(dedup_blocks(vec![a, b]).len(), 1);
    }

    #[test]
    fn no_engines_yields_empty_page() {
        let orchestrator = OcrOrchestrator::disabled();
        assert!(!orchestrator.has_engines());
        assert!(orchestrator.recognize_page(&blank_page(), 1).is_empty());
    }

    #[test]
    fn all_engines_failing_yields_empty_page() {
        let orchestrator = OcrOrchestrator::new(
            Some(Arc::new(UnavailableEngine)),
            Some(Arc::new(UnavailableEngine)),
            &no_preprocess(),
        );
        assert!(orchestrator.recognize_page(&blank_page(), 1).is_empty());
    }

    #[test]
    fn boxes_map_back_to_input_pixels_after_upscale() {
        let secondary = Arc::new(FixedEngine::new("s", &[("Jane", 100.0)]));
        let orchestrator = OcrOrchestrator::new(None, Some(secondary), &OcrConfig::default());
        // 500px page is upscaled 2x before recognition
        let page = RgbImage::from_pixel(500, 250, image::Rgb([255, 255, 255]));
        let blocks = orchestrator.recognize_page(&page, 1);
        assert_eq!(blocks[0].bbox, BoundingBox::new(50.0, 5.0, 75.0, 15.0));
    }
}
