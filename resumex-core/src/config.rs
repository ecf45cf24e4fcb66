use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_dpi() -> u32 {
    300
}

fn default_bullet_glyphs() -> Vec<String> {
    ["•", "·", "-", "–", "*", "➢", "●", "▪", "◦", "■"]
        .iter()
        .map(|glyph| glyph.to_string())
        .collect()
}

/// All policy constants of the extraction pipeline.
///
/// Every field has a default, so a YAML file only needs the values it
/// overrides:
///
/// ```yaml
/// columns:
///   max_columns: 3
/// ocr:
///   tesseract:
///     language: eng+fra
/// timeout_secs: 120
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    /// Per-document deadline. Pages not started before it expires yield no content.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Fewer non-whitespace characters than this marks the document as scanned
    pub min_chars: usize,
    /// Fewer distinct word-like tokens than this marks the document as scanned
    pub min_tokens: usize,
    /// Number of leading pages aggregated for the verdict
    pub sample_pages: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_chars: 100,
            min_tokens: 20,
            sample_pages: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Rasterization resolution for OCR (at least 200)
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { dpi: default_dpi() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub primary: PrimaryEngineConfig,
    #[serde(default)]
    pub tesseract: TesseractConfig,
    /// Run the secondary engine even when the primary produced output
    #[serde(default)]
    pub always_run_secondary: bool,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

/// ONNX detection/recognition pipeline used as the primary engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryEngineConfig {
    pub enabled: bool,
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
    pub character_dict: PathBuf,
}

impl Default for PrimaryEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detection_model: PathBuf::from("models/ppocrv4_mobile_det.onnx"),
            recognition_model: PathBuf::from("models/ppocrv4_mobile_rec.onnx"),
            character_dict: PathBuf::from("models/ppocr_keys_v1.txt"),
        }
    }
}

/// Tesseract command-line engine used as the secondary engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub enabled: bool,
    pub command: String,
    pub language: String,
    /// Page segmentation mode passed as `--psm`
    pub psm: u8,
    /// Words below this confidence (0-100 scale, as reported by tesseract) are dropped
    pub min_confidence: f32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            psm: 6,
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub enabled: bool,
    /// Images whose longest side is below this are upscaled to it
    pub min_dimension: u32,
    pub sharpen: bool,
    /// Binarization cutoff as a fraction of the median gray level
    pub threshold_ratio: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_dimension: 1000,
            sharpen: true,
            threshold_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Minimum mean silhouette for accepting more than one column
    pub silhouette_threshold: f32,
    /// Scores closer than this resolve to the smaller column count
    pub tie_margin: f32,
    /// 2 for the conservative variant, 3 for the extended one
    pub max_columns: usize,
    /// Below this many blocks clustering is skipped
    pub min_blocks: usize,
    pub min_blocks_per_column: usize,
    /// Adjacent column centers must be at least this fraction of page width apart
    pub min_center_gap_ratio: f32,
    pub max_iterations: usize,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            silhouette_threshold: 0.5,
            tie_margin: 0.05,
            max_columns: 2,
            min_blocks: 10,
            min_blocks_per_column: 3,
            min_center_gap_ratio: 0.2,
            max_iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Bullet indicators needed before a document counts as using bullets
    #[serde(default = "default_bullet_threshold")]
    pub bullet_threshold: usize,
    #[serde(default = "default_bullet_glyphs")]
    pub bullet_glyphs: Vec<String>,
    /// Flag documents containing both an isolated "M" and "9" block
    /// (icon fonts rendered as letters, typically mail and phone icons)
    #[serde(default = "default_true")]
    pub detect_unwanted_icons: bool,
}

fn default_bullet_threshold() -> usize {
    3
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            bullet_threshold: default_bullet_threshold(),
            bullet_glyphs: default_bullet_glyphs(),
            detect_unwanted_icons: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub label: String,
    pub synonyms: Vec<String>,
}

impl SectionDefinition {
    pub fn new(label: &str, synonyms: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub vocabulary: Vec<SectionDefinition>,
    /// Minimum normalized Levenshtein similarity for a fuzzy header match
    pub fuzzy_threshold: f32,
    /// Lines shorter than this never match fuzzily
    pub min_fuzzy_chars: usize,
    pub max_header_words: usize,
    /// Label for content preceding the first header
    pub unassigned_label: String,
    pub join_broken_links: bool,
    /// Split glued tokens like "2021Python" or "gmail.comPhone"
    pub insert_missing_spaces: bool,
    /// Whole-word, case-insensitive replacements applied before segmentation
    pub typo_corrections: BTreeMap<String, String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            vocabulary: default_vocabulary(),
            fuzzy_threshold: 0.8,
            min_fuzzy_chars: 5,
            max_header_words: 4,
            unassigned_label: "UNASSIGNED".to_string(),
            join_broken_links: true,
            insert_missing_spaces: false,
            typo_corrections: default_typo_corrections(),
        }
    }
}

fn default_typo_corrections() -> BTreeMap<String, String> {
    [
        ("data strucutres", "Data Structures"),
        ("tennsorflow", "tensorflow"),
        ("buisness", "Business"),
        ("prediector", "predictor"),
        ("bannri amman", "Bannari Amman"),
        ("entrepeuners", "entrepreneurs"),
    ]
    .into_iter()
    .map(|(typo, fix)| (typo.to_string(), fix.to_string()))
    .collect()
}

fn default_vocabulary() -> Vec<SectionDefinition> {
    vec![
        SectionDefinition::new(
            "PROFILE",
            &["profile", "summary", "professional summary", "about me", "objective", "career objective"],
        ),
        SectionDefinition::new("CONTACT", &["contact", "contact information", "contact details", "personal details"]),
        SectionDefinition::new(
            "EXPERIENCE",
            &["experience", "work experience", "professional experience", "employment history", "internships", "internship"],
        ),
        SectionDefinition::new("EDUCATION", &["education", "academic background", "qualifications", "academics"]),
        SectionDefinition::new("PROJECTS", &["projects", "academic projects", "personal projects", "key projects"]),
        SectionDefinition::new(
            "SKILLS",
            &["skills", "tech skills", "technical skills", "core competencies", "technologies", "tools"],
        ),
        SectionDefinition::new("SOFT SKILLS", &["soft skills", "interpersonal skills"]),
        SectionDefinition::new("LANGUAGES", &["languages", "languages known"]),
        SectionDefinition::new("CERTIFICATIONS", &["certifications", "certificates", "licenses", "courses"]),
        SectionDefinition::new("ACHIEVEMENTS", &["achievements", "awards", "honors", "accomplishments"]),
        SectionDefinition::new("INTERESTS", &["interests", "hobbies", "extracurricular activities"]),
    ]
}

impl ExtractionConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ExtractionConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                log::warn!("Failed to load config from {p} ({e:#}), using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Reject values the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.render.dpi < 200 {
            bail!("render.dpi must be at least 200, got {}", self.render.dpi);
        }
        if !(1..=3).contains(&self.columns.max_columns) {
            bail!("columns.max_columns must be 1, 2 or 3, got {}", self.columns.max_columns);
        }
        if !(-1.0..=1.0).contains(&self.columns.silhouette_threshold) {
            bail!("columns.silhouette_threshold must be within [-1, 1]");
        }
        if !(0.0..=1.0).contains(&self.segmenter.fuzzy_threshold) {
            bail!("segmenter.fuzzy_threshold must be within [0, 1]");
        }
        if self.segmenter.typo_corrections.keys().any(|typo| typo.trim().is_empty()) {
            bail!("segmenter.typo_corrections must not contain an empty key");
        }
        if self.scan.sample_pages == 0 {
            bail!("scan.sample_pages must be at least 1");
        }
        if self.timeout_secs == Some(0) {
            bail!("timeout_secs must be positive when set");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
