//! pdfium-backed page source.
//!
//! Text comes from the page's character stream, grouped into word Blocks.
//! PDF space is bottom-up; everything leaving this module is top-down in
//! points.

use crate::error::{ExtractError, Result};
use crate::handlers::paged::{PageSize, PageSource};
use crate::handlers::pdf::library::SharedLibrary;
use crate::layout::style::clean_font_name;
use crate::types::{Block, BoundingBox, Link};
use image::RgbImage;
use pdfium_render::prelude::*;

/// Bind pdfium from the working directory, `./lib`, or the system path.
/// Called once per process through the shared handle.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./lib")))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ExtractError::RendererUnavailable(format!("cannot load pdfium: {e}")))?;
    Ok(Pdfium::new(bindings))
}

/// One open document. Every pdfium call it makes, closing the document
/// included, runs under the shared handle's call lock.
pub struct PdfiumPageSource<'a> {
    document: Option<PdfDocument<'a>>,
    library: &'a SharedLibrary<Pdfium>,
}

impl<'a> PdfiumPageSource<'a> {
    pub fn open(pdfium: &'a Pdfium, bytes: &'a [u8], library: &'a SharedLibrary<Pdfium>) -> Result<Self> {
        let _calls = library.lock_calls();
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ExtractError::NoTextExtracted(format!("cannot open PDF: {e}")))?;
        Ok(Self {
            document: Some(document),
            library,
        })
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>> {
        let page_number = index as u32 + 1;
        let document = self.document.as_ref().ok_or_else(|| ExtractError::PageCorrupt {
            page: page_number,
            reason: "document already closed".to_string(),
        })?;
        let page_index = u16::try_from(index).map_err(|_| ExtractError::PageCorrupt {
            page: page_number,
            reason: "page index out of range".to_string(),
        })?;
        document.pages().get(page_index).map_err(|e| ExtractError::PageCorrupt {
            page: page_number,
            reason: e.to_string(),
        })
    }
}

impl Drop for PdfiumPageSource<'_> {
    fn drop(&mut self) {
        let _calls = self.library.lock_calls();
        self.document.take();
    }
}

impl PageSource for PdfiumPageSource<'_> {
    fn page_count(&self) -> usize {
        let _calls = self.library.lock_calls();
        self.document.as_ref().map_or(0, |document| document.pages().len() as usize)
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let _calls = self.library.lock_calls();
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn text_layer(&self, index: usize) -> Result<Vec<Block>> {
        let page_number = index as u32 + 1;
        let _calls = self.library.lock_calls();
        let page = self.page(index)?;
        let height = page.height().value;
        let text = page
            .text()
            .map_err(|_| ExtractError::NoTextLayer { page: page_number })?;

        let mut words = WordAssembler::new(page_number);
        for segment in text.segments().iter() {
            let Ok(chars) = segment.chars() else {
                continue;
            };
            for ch in chars.iter() {
                let Some(c) = ch.unicode_char() else {
                    continue;
                };
                if c.is_whitespace() || c.is_control() {
                    words.break_word();
                    continue;
                }
                let Ok(bounds) = ch.loose_bounds() else {
                    continue;
                };
                let glyph = Glyph {
                    ch: c,
                    bbox: BoundingBox::new(
                        bounds.left().value,
                        height - bounds.top().value,
                        bounds.right().value,
                        height - bounds.bottom().value,
                    ),
                };
                if words.starts_word(&glyph) {
                    words.break_word();
                    words.set_font(Some(ch.font_name()), Some(ch.scaled_font_size().value));
                }
                words.push(glyph);
            }
            words.break_word();
        }

        let blocks = words.finish();
        if blocks.is_empty() {
            return Err(ExtractError::NoTextLayer { page: page_number });
        }
        Ok(blocks)
    }

    fn rasterize(&self, index: usize, dpi: u32) -> Result<RgbImage> {
        let _calls = self.library.lock_calls();
        let page = self.page(index)?;
        let config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .render_form_data(true);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractError::PageCorrupt {
                page: index as u32 + 1,
                reason: format!("render failed: {e}"),
            })?;
        Ok(bitmap.as_image().to_rgb8())
    }

    /// URI links from the page link collection, paired in order with the
    /// rectangles of its link annotations.
    fn links(&self, index: usize) -> Result<Vec<Link>> {
        let page_number = index as u32 + 1;
        let _calls = self.library.lock_calls();
        let page = self.page(index)?;
        let height = page.height().value;

        let rects: Vec<Option<BoundingBox>> = page
            .annotations()
            .iter()
            .filter(|annotation| annotation.annotation_type() == PdfPageAnnotationType::Link)
            .map(|annotation| {
                annotation.bounds().ok().map(|rect| {
                    BoundingBox::new(
                        rect.left().value,
                        height - rect.top().value,
                        rect.right().value,
                        height - rect.bottom().value,
                    )
                })
            })
            .collect();

        let mut links = Vec::new();
        for (position, link) in page.links().iter().enumerate() {
            let Some(action) = link.action() else {
                continue;
            };
            if action.action_type() != PdfActionType::Uri {
                continue;
            }
            let Some(uri_action) = action.as_uri_action() else {
                continue;
            };
            let url = uri_action.uri().unwrap_or_default();
            if url.trim().is_empty() {
                continue;
            }
            links.push(Link {
                url,
                page: page_number,
                rect: rects.get(position).copied().flatten(),
            });
        }
        Ok(links)
    }
}

/// One positioned character, top-down coordinates
#[derive(Debug, Clone, Copy)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BoundingBox,
}

/// Groups consecutive glyphs into words. A word ends at whitespace, at a
/// horizontal gap wider than a quarter of the glyph height, or when the
/// baseline jumps to another line.
pub struct WordAssembler {
    page: u32,
    text: String,
    bbox: Option<BoundingBox>,
    font_name: Option<String>,
    font_size: Option<f32>,
    blocks: Vec<Block>,
}

impl WordAssembler {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            text: String::new(),
            bbox: None,
            font_name: None,
            font_size: None,
            blocks: Vec::new(),
        }
    }

    /// Whether `glyph` would open a new word
    pub fn starts_word(&self, glyph: &Glyph) -> bool {
        let Some(current) = self.bbox else {
            return true;
        };
        let height = glyph.bbox.height().max(current.height()).max(1.0);
        let gap = glyph.bbox.x0 - current.x1;
        let line_shift = (glyph.bbox.y0 - current.y0).abs();
        gap > height * 0.25 || gap < -height || line_shift > height * 0.5
    }

    pub fn set_font(&mut self, name: Option<String>, size: Option<f32>) {
        self.font_name = name.map(|n| clean_font_name(&n));
        self.font_size = size;
    }

    pub fn push(&mut self, glyph: Glyph) {
        if self.starts_word(&glyph) {
            self.break_word();
        }
        self.text.push(glyph.ch);
        self.bbox = Some(match self.bbox {
            Some(current) => current.union(&glyph.bbox),
            None => glyph.bbox,
        });
    }

    pub fn break_word(&mut self) {
        if let Some(bbox) = self.bbox.take() {
            if let Some(block) = Block::native(&self.text, bbox, self.page) {
                self.blocks
                    .push(block.with_font(self.font_name.clone(), self.font_size));
            }
        }
        self.text.clear();
    }

    pub fn finish(mut self) -> Vec<Block> {
        self.break_word();
        self.blocks
    }
}
