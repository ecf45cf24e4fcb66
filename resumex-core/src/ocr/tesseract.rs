//! Tesseract command-line engine.
//!
//! Each call writes the page to a scratch PNG and runs
//! `tesseract <png> stdout --psm N -l LANG tsv`. Separate processes make the
//! engine reentrant, so it needs no locking.

use crate::config::{OcrConfig, TesseractConfig};
use crate::error::{ExtractError, Result};
use crate::ocr::engine::{OcrEngine, OcrRegion};
use crate::types::BoundingBox;
use image::{ImageFormat, RgbImage};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const ENGINE_NAME: &str = "tesseract";

/// TSV row level for single words
const WORD_LEVEL: &str = "5";

pub struct TesseractEngine {
    command: String,
    language: String,
    psm: u8,
    min_confidence: f32,
    /// Set once the executable could not be started
    spawn_failed: AtomicBool,
}

impl TesseractEngine {
    pub fn new(config: &TesseractConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
            psm: config.psm,
            min_confidence: config.min_confidence,
            spawn_failed: AtomicBool::new(false),
        }
    }

    /// Check that the executable runs at all
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .map_err(|e| ExtractError::engine_unavailable(ENGINE_NAME, format!("{}: {e}", self.command)))?;
        if !output.status.success() {
            return Err(ExtractError::engine_unavailable(
                ENGINE_NAME,
                format!("`{} --version` exited with {}", self.command, output.status),
            ));
        }
        // Older releases print the version banner on stderr
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrRegion>> {
        let scratch = tempfile::Builder::new()
            .prefix("resumex-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(scratch.path(), ImageFormat::Png)
            .map_err(|e| ExtractError::engine_unavailable(ENGINE_NAME, format!("cannot write page image: {e}")))?;

        let output = Command::new(&self.command)
            .arg(scratch.path())
            .arg("stdout")
            .args(["--psm", &self.psm.to_string()])
            .args(["-l", &self.language])
            .arg("tsv")
            .output()
            .map_err(|e| {
                self.spawn_failed.store(true, Ordering::Relaxed);
                ExtractError::engine_unavailable(ENGINE_NAME, format!("{}: {e}", self.command))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::engine_unavailable(
                ENGINE_NAME,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tsv(&stdout, self.min_confidence))
    }

    fn name(&self) -> &str {
        ENGINE_NAME
    }

    /// An executable that vanished after start-up is not retried for later pages
    fn is_healthy(&self) -> bool {
        !self.spawn_failed.load(Ordering::Relaxed)
    }
}

/// Parse word rows of tesseract's TSV output. Rows with negative confidence
/// (structural rows) or blank text are skipped.
pub fn parse_tsv(tsv: &str, min_confidence: f32) -> Vec<OcrRegion> {
    let mut regions = Vec::new();
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.splitn(12, '\t').collect();
        if fields.len() < 12 || fields[0] != WORD_LEVEL {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height), Ok(conf)) = (
            fields[6].parse::<f32>(),
            fields[7].parse::<f32>(),
            fields[8].parse::<f32>(),
            fields[9].parse::<f32>(),
            fields[10].parse::<f32>(),
        ) else {
            continue;
        };
        if conf < 0.0 || conf < min_confidence {
            continue;
        }
        regions.push(OcrRegion {
            text: text.to_string(),
            bbox: BoundingBox::new(left, top, left + width, top + height),
            confidence: conf / 100.0,
        });
    }
    regions
}

/// Initializer for the process-wide secondary engine
pub fn init_secondary(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>> {
    if !config.tesseract.enabled {
        return Err(ExtractError::engine_unavailable(ENGINE_NAME, "disabled in config"));
    }
    let engine = TesseractEngine::new(&config.tesseract);
    let version = engine.version()?;
    log::debug!("Using {version}");
    Ok(Arc::new(engine))
}
