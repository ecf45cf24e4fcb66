use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

// ===== BLOCK MODEL =====
// Blocks are produced by page sources (native text layer) and by the OCR
// orchestrator, then consumed by the column reconstructor. Coordinates are
// always top-down: y grows toward the bottom of the page.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    /// Build a box from two corners, swapping coordinates so that
    /// `x1 >= x0` and `y1 >= y0` always hold.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) * 0.5
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x0 * factor,
            self.y0 * factor,
            self.x1 * factor,
            self.y1 * factor,
        )
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Serialized as `[x0, y0, x1, y1]` in output records
impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Provenance of a block, also the dedup priority order (earlier wins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    NativeText,
    OcrPrimary,
    OcrSecondary,
}

impl Engine {
    pub fn is_ocr(&self) -> bool {
        !matches!(self, Engine::NativeText)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub text: String,
    pub bbox: BoundingBox,
    pub font_name: Option<String>,
    pub font_size: Option<f32>,
    pub confidence: Option<f32>,
    pub engine: Engine,
    /// 1-indexed page number
    pub page: u32,
}

impl Block {
    /// Create a native text-layer block. Returns `None` for whitespace-only text.
    pub fn native(text: &str, bbox: BoundingBox, page: u32) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            bbox,
            font_name: None,
            font_size: None,
            confidence: None,
            engine: Engine::NativeText,
            page: page.max(1),
        })
    }

    /// Create an OCR block; confidence is clamped into `[0, 1]`.
    pub fn ocr(text: &str, bbox: BoundingBox, confidence: f32, engine: Engine, page: u32) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(Self {
            text: trimmed.to_string(),
            bbox,
            font_name: None,
            font_size: None,
            confidence: Some(confidence),
            engine,
            page: page.max(1),
        })
    }

    pub fn with_font(mut self, font_name: Option<String>, font_size: Option<f32>) -> Self {
        self.font_name = font_name.filter(|name| !name.trim().is_empty());
        self.font_size = font_size.filter(|size| size.is_finite() && *size > 0.0);
        self
    }
}

// ===== LINKS =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub page: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_rect",
        deserialize_with = "deserialize_rect"
    )]
    pub rect: Option<BoundingBox>,
}

fn serialize_rect<S: Serializer>(rect: &Option<BoundingBox>, serializer: S) -> Result<S::Ok, S::Error> {
    match rect {
        Some(b) => <[f32; 4]>::from(*b).serialize(serializer),
        None => serializer.serialize_none(),
    }
}

fn deserialize_rect<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BoundingBox>, D::Error> {
    let corners = Option::<[f32; 4]>::deserialize(deserializer)?;
    Ok(corners.map(|[x0, y0, x1, y1]| BoundingBox::new(x0, y0, x1, y1)))
}

// ===== EXTRACTION RESULT =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    NativeText,
    OcrFallback,
    Mixed,
    Error,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::NativeText => "native_text",
            ExtractionMethod::OcrFallback => "ocr_fallback",
            ExtractionMethod::Mixed => "mixed",
            ExtractionMethod::Error => "error",
        }
    }
}

/// A page that contributed no blocks (or fewer than expected) and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFailure {
    pub page: u32,
    /// Error kind tag, e.g. `page_corrupt` or `timeout`
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSummary {
    #[serde(rename = "font_types_used")]
    pub font_types: BTreeSet<String>,
    /// Sorted, unique, rounded to two decimals
    #[serde(rename = "font_sizes_used")]
    pub font_sizes: Vec<f32>,
    #[serde(with = "yes_no")]
    pub bullet_points_used: bool,
    #[serde(default)]
    pub unwanted_icon_used: bool,
}

mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.eq_ignore_ascii_case("yes"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub method: ExtractionMethod,
    pub detected_columns: usize,
    #[serde(default)]
    pub is_scanned: bool,
    /// Name of the handler that processed the document
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_failures: Vec<PageFailure>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

/// One record per input document. This is the JSONL line written in batch mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source: String,
    pub pages: u32,
    pub metadata: ExtractionMetadata,
    /// Left-to-right column order, always 1 to 3 entries
    pub column_texts: Vec<String>,
    pub style_analysis: StyleSummary,
    pub links: Vec<Link>,
}

impl ExtractionResult {
    /// Terminal result for a document that produced nothing usable
    pub fn error(source: &str, pages: u32, reason: String) -> Self {
        Self {
            source: source.to_string(),
            pages,
            metadata: ExtractionMetadata {
                method: ExtractionMethod::Error,
                detected_columns: 1,
                is_scanned: false,
                handler: None,
                page_failures: Vec::new(),
                timed_out: false,
                error: Some(reason),
                content_sha256: None,
                extracted_at: Utc::now(),
            },
            column_texts: vec![String::new()],
            style_analysis: StyleSummary::default(),
            links: Vec::new(),
        }
    }

    pub fn method(&self) -> ExtractionMethod {
        self.metadata.method
    }

    pub fn is_error(&self) -> bool {
        self.metadata.method == ExtractionMethod::Error
    }

    /// Column texts joined in reading order
    pub fn full_text(&self) -> String {
        self.column_texts
            .iter()
            .map(|text| text.trim_end())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Round to two decimals, the precision used for font sizes and dedup keys
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
