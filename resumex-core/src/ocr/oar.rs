//! Primary engine: ONNX text detection + recognition through `oar-ocr`.
//!
//! Only compiled with the `oar-backend` feature. Without it the initializer
//! reports the engine as unavailable and the orchestrator falls back to the
//! secondary engine.

use crate::config::OcrConfig;
use crate::error::{ExtractError, Result};
use crate::ocr::engine::OcrEngine;
use std::sync::Arc;

const ENGINE_NAME: &str = "oar-ocr";

#[cfg(feature = "oar-backend")]
mod backend {
    use super::ENGINE_NAME;
    use crate::config::PrimaryEngineConfig;
    use crate::error::{ExtractError, Result};
    use crate::ocr::engine::{OcrEngine, OcrRegion};
    use crate::types::BoundingBox;
    use image::{ImageFormat, RgbImage};
    use oar_ocr::pipeline::{OAROCRBuilder, OAROCR};
    use std::path::Path;
    use std::sync::Mutex;

    pub struct OarEngine {
        // The pipeline holds ONNX sessions and needs `&mut` to predict
        pipeline: Mutex<OAROCR>,
    }

    fn model_path(path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(ExtractError::engine_unavailable(
                ENGINE_NAME,
                format!("model file not found: {}", path.display()),
            ));
        }
        Ok(path.display().to_string())
    }

    impl OarEngine {
        pub fn new(config: &PrimaryEngineConfig) -> Result<Self> {
            let pipeline = OAROCRBuilder::new(
                model_path(&config.detection_model)?,
                model_path(&config.recognition_model)?,
                model_path(&config.character_dict)?,
            )
            .text_detection_batch_size(1)
            .build()
            .map_err(|e| ExtractError::engine_unavailable(ENGINE_NAME, e))?;

            Ok(Self {
                pipeline: Mutex::new(pipeline),
            })
        }
    }

    impl OcrEngine for OarEngine {
        fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrRegion>> {
            // The pipeline reads its input from disk
            let scratch = tempfile::Builder::new()
                .prefix("resumex-oar-")
                .suffix(".png")
                .tempfile()?;
            image
                .save_with_format(scratch.path(), ImageFormat::Png)
                .map_err(|e| ExtractError::engine_unavailable(ENGINE_NAME, format!("cannot write page image: {e}")))?;

            let mut pipeline = self
                .pipeline
                .lock()
                .map_err(|_| ExtractError::engine_unavailable(ENGINE_NAME, "pipeline lock poisoned"))?;
            let result = pipeline
                .predict(scratch.path())
                .map_err(|e| ExtractError::engine_unavailable(ENGINE_NAME, e))?;

            // Boxes, texts and scores are parallel vectors
            let mut regions = Vec::new();
            let recognized = result.text_boxes.iter().zip(&result.rec_texts).zip(&result.rec_scores);
            for ((bounding_box, text), score) in recognized {
                let points = &bounding_box.points;
                if points.is_empty() || text.trim().is_empty() {
                    continue;
                }
                let x0 = points.iter().map(|p| p.x).fold(f32::MAX, f32::min);
                let y0 = points.iter().map(|p| p.y).fold(f32::MAX, f32::min);
                let x1 = points.iter().map(|p| p.x).fold(f32::MIN, f32::max);
                let y1 = points.iter().map(|p| p.y).fold(f32::MIN, f32::max);
                regions.push(OcrRegion {
                    text: text.to_string(),
                    bbox: BoundingBox::new(x0, y0, x1, y1),
                    confidence: *score,
                });
            }
            Ok(regions)
        }

        fn name(&self) -> &str {
            ENGINE_NAME
        }

        /// A panic inside the pipeline leaves its sessions in an unknown state
        fn is_healthy(&self) -> bool {
            !self.pipeline.is_poisoned()
        }
    }
}

#[cfg(feature = "oar-backend")]
pub use backend::OarEngine;

/// Initializer for the process-wide primary engine
pub fn init_primary(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>> {
    if !config.primary.enabled {
        return Err(ExtractError::engine_unavailable(ENGINE_NAME, "disabled in config"));
    }

    #[cfg(feature = "oar-backend")]
    {
        let engine = backend::OarEngine::new(&config.primary)?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "oar-backend"))]
    {
        Err(ExtractError::engine_unavailable(
            ENGINE_NAME,
            "built without the oar-backend feature",
        ))
    }
}
