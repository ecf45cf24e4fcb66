//! Raster cleanup applied before OCR: grayscale, upscale of small images,
//! sharpening and median-relative binarization.

use crate::config::PreprocessConfig;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

pub struct PreparedImage {
    pub image: RgbImage,
    /// Prepared size divided by original size; region boxes are divided by
    /// this to map back onto the original raster.
    pub scale: f32,
}

pub fn prepare(image: &RgbImage, config: &PreprocessConfig) -> PreparedImage {
    if !config.enabled {
        return PreparedImage {
            image: image.clone(),
            scale: 1.0,
        };
    }

    let mut gray: GrayImage = imageops::grayscale(image);
    let (width, height) = gray.dimensions();
    let longest = width.max(height);

    let mut scale = 1.0f32;
    if longest > 0 && longest < config.min_dimension {
        scale = config.min_dimension as f32 / longest as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        gray = imageops::resize(&gray, new_width, new_height, FilterType::Lanczos3);
        // Rounding can shift the effective factor slightly
        scale = new_width as f32 / width as f32;
    }

    if config.sharpen {
        gray = imageops::unsharpen(&gray, 1.0, 5);
    }

    binarize(&mut gray, config.threshold_ratio);

    PreparedImage {
        image: DynamicImage::ImageLuma8(gray).to_rgb8(),
        scale,
    }
}

/// Pixels darker than `median * ratio` become black, everything else white.
fn binarize(gray: &mut GrayImage, ratio: f32) {
    let cutoff = median_level(gray) as f32 * ratio;
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if (pixel.0[0] as f32) < cutoff { 0 } else { 255 };
    }
}

fn median_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    let half = total.div_ceil(2);
    let mut seen = 0u64;
    for (level, count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= half && total > 0 {
            return level as u8;
        }
    }
    255
}
