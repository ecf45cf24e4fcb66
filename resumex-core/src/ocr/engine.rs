//! OCR engine abstraction and process-wide engine handles.
//!
//! Engine start-up (model loading, checking an executable) happens once per
//! process. `SharedEngine` owns that lifecycle: lazy initialization on first
//! use, a remembered failure so broken engines are not retried for every
//! page, and an explicit `teardown`.

use crate::config::OcrConfig;
use crate::error::{ExtractError, Result};
use crate::types::BoundingBox;
use image::RgbImage;
use std::sync::{Arc, Mutex, MutexGuard};

/// A recognized text region in the pixel space of the image handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRegion {
    pub text: String,
    pub bbox: BoundingBox,
    /// Normalized to `[0, 1]`
    pub confidence: f32,
}

pub trait OcrEngine: Send + Sync {
    /// Recognize every text region of one page image
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrRegion>>;

    fn name(&self) -> &str;

    fn is_healthy(&self) -> bool {
        true
    }
}

pub type EngineInit = fn(&OcrConfig) -> Result<Arc<dyn OcrEngine>>;

enum EngineSlot {
    Uninitialized,
    Ready(Arc<dyn OcrEngine>),
    Failed(String),
}

pub struct SharedEngine {
    name: &'static str,
    init: EngineInit,
    slot: Mutex<EngineSlot>,
}

impl SharedEngine {
    pub const fn new(name: &'static str, init: EngineInit) -> Self {
        Self {
            name,
            init,
            slot: Mutex::new(EngineSlot::Uninitialized),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineSlot> {
        // A panic inside an engine constructor must not wedge the slot forever
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the engine, initializing it on first call.
    ///
    /// The config of the first successful or failed call wins; later calls
    /// reuse its outcome until `teardown`.
    pub fn get_or_init(&self, config: &OcrConfig) -> Result<Arc<dyn OcrEngine>> {
        let mut slot = self.lock();
        match &*slot {
            EngineSlot::Ready(engine) => return Ok(Arc::clone(engine)),
            EngineSlot::Failed(reason) => {
                return Err(ExtractError::engine_unavailable(self.name, reason));
            }
            EngineSlot::Uninitialized => {}
        }

        match (self.init)(config) {
            Ok(engine) => {
                log::info!("OCR engine '{}' initialized", engine.name());
                *slot = EngineSlot::Ready(Arc::clone(&engine));
                Ok(engine)
            }
            Err(err) => {
                log::warn!("OCR engine '{}' failed to initialize: {err}", self.name);
                let reason = match &err {
                    ExtractError::EngineUnavailable { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                *slot = EngineSlot::Failed(reason);
                Err(err)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(&*self.lock(), EngineSlot::Ready(_))
    }

    /// Drop the engine (or the remembered failure); the next call re-initializes.
    pub fn teardown(&self) {
        let mut slot = self.lock();
        if !matches!(&*slot, EngineSlot::Uninitialized) {
            log::debug!("OCR engine '{}' torn down", self.name);
        }
        *slot = EngineSlot::Uninitialized;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
