//! Page-by-page extraction shared by PDF and raster inputs.
//!
//! Per document: read every text layer, classify the document from the
//! sampled pages, then either OCR every page (scanned) or keep the text
//! layers and OCR only the pages whose layer failed or was empty. The
//! deadline is checked before each page; pages not reached in time are
//! recorded as `timeout` failures.

use crate::error::{ExtractError, Result};
use crate::handlers::{DocumentContent, ExtractionContext};
use crate::links::LinkRecoverer;
use crate::scan::ScanClassifier;
use crate::types::{Block, ExtractionMethod, Link, PageFailure};
use image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A paginated document. Indices are 0-based; Blocks carry 1-based pages.
///
/// Coordinates of text-layer blocks and link rectangles are in the page's
/// own units (top-down). Rasterized pages are mapped back into those units
/// by the ratio of page width to image width.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_size(&self, index: usize) -> Result<PageSize>;

    /// Blocks of the embedded text layer. `NoTextLayer` when the page has none.
    fn text_layer(&self, index: usize) -> Result<Vec<Block>>;

    fn rasterize(&self, index: usize, dpi: u32) -> Result<RgbImage>;

    fn links(&self, _index: usize) -> Result<Vec<Link>> {
        Ok(Vec::new())
    }
}

/// State of one page after the text-layer pass
enum TextLayer {
    Found(Vec<Block>),
    Missing(ExtractError),
    NotReached,
}

impl TextLayer {
    fn blocks(&self) -> &[Block] {
        match self {
            TextLayer::Found(blocks) => blocks,
            _ => &[],
        }
    }
}

pub fn extract_paged(source: &dyn PageSource, ctx: &ExtractionContext) -> Result<DocumentContent> {
    let page_count = source.page_count();
    let mut content = DocumentContent::empty(page_count as u32);
    if page_count == 0 {
        return Ok(content);
    }

    let mut links = LinkRecoverer::new();
    let mut layers: Vec<TextLayer> = Vec::with_capacity(page_count);

    for index in 0..page_count {
        if ctx.deadline_passed() {
            content.timed_out = true;
            layers.push(TextLayer::NotReached);
            continue;
        }

        match source.page_size(index) {
            Ok(size) => content.page_width = content.page_width.max(size.width),
            Err(err) => log::debug!("Page {}: size unavailable: {err}", index + 1),
        }

        let layer = match source.text_layer(index) {
            Ok(blocks) if !blocks.is_empty() => TextLayer::Found(blocks),
            Ok(_) => TextLayer::Missing(ExtractError::NoTextLayer { page: index as u32 + 1 }),
            Err(err) => {
                log::debug!("Page {}: text layer unavailable: {err}", index + 1);
                TextLayer::Missing(err)
            }
        };
        layers.push(layer);
        links.absorb(source.links(index));
    }

    let sampled: Vec<&[Block]> = layers
        .iter()
        .take(ctx.config.scan.sample_pages.max(1))
        .map(TextLayer::blocks)
        .collect();
    let verdict = ScanClassifier::new(&ctx.config.scan).classify(&sampled, page_count);
    content.is_scanned = verdict.is_scanned;
    if verdict.is_scanned {
        log::info!(
            "Document looks scanned ({} chars, {} distinct tokens on sampled pages); using OCR",
            verdict.char_count,
            verdict.token_count
        );
    }

    let mut used_native = false;
    let mut used_ocr = false;

    for (index, layer) in layers.into_iter().enumerate() {
        let page = index as u32 + 1;

        let layer_error = match layer {
            TextLayer::NotReached => {
                content.page_failures.push(timeout_failure(page));
                continue;
            }
            TextLayer::Found(blocks) if !verdict.is_scanned => {
                content.blocks.extend(blocks);
                used_native = true;
                continue;
            }
            // Scanned documents discard whatever text layer they carry
            TextLayer::Found(_) => None,
            TextLayer::Missing(err) => Some(err),
        };

        if ctx.deadline_passed() {
            content.timed_out = true;
            content.page_failures.push(timeout_failure(page));
            continue;
        }

        if !ctx.ocr.has_engines() {
            let reason = match &layer_error {
                Some(err) => format!("{err}; no OCR engine available"),
                None => "no OCR engine available".to_string(),
            };
            content.page_failures.push(PageFailure {
                page,
                kind: "engine_unavailable".to_string(),
                reason,
            });
            continue;
        }

        match ocr_page(source, index, ctx) {
            Ok(blocks) if !blocks.is_empty() => {
                content.blocks.extend(blocks);
                used_ocr = true;
            }
            Ok(_) => {
                let (kind, reason) = match &layer_error {
                    Some(err) => (err.kind(), format!("{err}; OCR found no text")),
                    None => ("no_text_extracted", "OCR found no text".to_string()),
                };
                content.page_failures.push(PageFailure {
                    page,
                    kind: kind.to_string(),
                    reason,
                });
            }
            Err(err) => {
                log::warn!("Page {page}: cannot rasterize: {err}");
                content.page_failures.push(PageFailure {
                    page,
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    content.links = links.finish();
    content.method = if content.blocks.is_empty() {
        ExtractionMethod::Error
    } else if verdict.is_scanned {
        ExtractionMethod::OcrFallback
    } else {
        match (used_native, used_ocr) {
            (true, true) => ExtractionMethod::Mixed,
            (false, true) => ExtractionMethod::OcrFallback,
            _ => ExtractionMethod::NativeText,
        }
    };

    Ok(content)
}

fn timeout_failure(page: u32) -> PageFailure {
    PageFailure {
        page,
        kind: "timeout".to_string(),
        reason: "deadline expired before the page was processed".to_string(),
    }
}

/// Rasterize one page, recognize it and map the blocks into page units
fn ocr_page(source: &dyn PageSource, index: usize, ctx: &ExtractionContext) -> Result<Vec<Block>> {
    let page = index as u32 + 1;
    let image = source.rasterize(index, ctx.config.render.dpi)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ExtractError::PageCorrupt {
            page,
            reason: "rendered an empty image".to_string(),
        });
    }

    let factor = match source.page_size(index) {
        Ok(size) if size.width > 0.0 => size.width / image.width() as f32,
        _ => 1.0,
    };

    let blocks = ctx
        .ocr
        .recognize_page(&image, page)
        .into_iter()
        .map(|block| Block {
            bbox: block.bbox.scaled(factor),
            ..block
        })
        .collect();
    Ok(blocks)
}
