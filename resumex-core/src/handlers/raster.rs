//! Image Handler
//!
//! A raster image is a one-page document without a text layer, so the paged
//! extraction classifies it as scanned and sends it straight to OCR. Block
//! coordinates stay in image pixels.

use crate::error::{ExtractError, Result};
use crate::handlers::paged::{extract_paged, PageSize, PageSource};
use crate::handlers::{DocumentContent, DocumentHandler, ExtractionContext};
use crate::types::Block;
use image::RgbImage;

#[derive(Debug, Default)]
pub struct ImageHandler;

impl ImageHandler {
    pub fn new() -> Self {
        Self
    }
}

/// Decoded image exposed as a single page
pub struct RasterPage {
    image: RgbImage,
}

impl RasterPage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).map_err(|e| ExtractError::PageCorrupt {
            page: 1,
            reason: format!("cannot decode image: {e}"),
        })?;
        Ok(Self::from_image(decoded.to_rgb8()))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }
}

impl PageSource for RasterPage {
    fn page_count(&self) -> usize {
        1
    }

    fn page_size(&self, _index: usize) -> Result<PageSize> {
        Ok(PageSize {
            width: self.image.width() as f32,
            height: self.image.height() as f32,
        })
    }

    fn text_layer(&self, index: usize) -> Result<Vec<Block>> {
        Err(ExtractError::NoTextLayer {
            page: index as u32 + 1,
        })
    }

    fn rasterize(&self, _index: usize, _dpi: u32) -> Result<RgbImage> {
        Ok(self.image.clone())
    }
}

impl DocumentHandler for ImageHandler {
    fn process(&self, bytes: &[u8], ctx: &ExtractionContext) -> Result<DocumentContent> {
        let page = match RasterPage::decode(bytes) {
            Ok(page) => page,
            // An undecodable image is a one-page document whose only page is corrupt
            Err(err) => return Err(ExtractError::NoTextExtracted(err.to_string())),
        };
        extract_paged(&page, ctx)
    }

    fn name(&self) -> &str {
        "image"
    }

    fn extensions(&self) -> &[&'static str] {
        &["jpg", "jpeg", "png", "tif", "tiff", "bmp", "gif"]
    }

    fn mime_types(&self) -> &[&'static str] {
        &["image/jpeg", "image/png", "image/tiff", "image/bmp", "image/gif"]
    }
}
