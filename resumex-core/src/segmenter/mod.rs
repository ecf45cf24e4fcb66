//! Section segmentation of reconstructed resume text.
//!
//! Each line is either a section header (exact or fuzzy match against the
//! configured vocabulary) or content, which accumulates under the most
//! recent header. Text before the first header lands in the unassigned
//! bucket.

pub mod cleanup;
pub mod entities;

pub use entities::{extract_contact, extract_education, ContactInfo, EducationScores};

use crate::config::SegmenterConfig;
use crate::evaluation::similarity;
use crate::types::ExtractionResult;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Characters that end a sentence or separate list items; headers have none
const BODY_PUNCTUATION: &[char] = &['.', ',', ';', '!', '?', '@', '/', '|', '(', ')'];

/// Leading list markers stripped from section items
const ITEM_MARKERS: &[char] = &['•', '·', '-', '–', '*', '➢', '●', '▪', '◦', '■', '>'];

/// Label → text, in document order of first occurrence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap {
    entries: Vec<(String, String)>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, text)| text.as_str())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, t)| (l.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one line under `label`, creating the section on first use
    pub fn append(&mut self, label: &str, line: &str) {
        let index = match self.entries.iter().position(|(l, _)| l == label) {
            Some(index) => index,
            None => {
                self.entries.push((label.to_string(), String::new()));
                self.entries.len() - 1
            }
        };
        let text = &mut self.entries[index].1;
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(line);
    }
}

fn serialize_entries<S, V>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (label, value) in entries {
        map.serialize_entry(label, value)?;
    }
    map.end()
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_entries(&self.entries, serializer)
    }
}

/// One section in the downstream record: a single line stays a string,
/// several lines become a list of items with list markers removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionValue {
    Text(String),
    Items(Vec<String>),
}

impl SectionValue {
    pub fn from_text(text: &str) -> Self {
        let mut items: Vec<String> = text
            .lines()
            .map(|line| line.trim().trim_start_matches(ITEM_MARKERS).trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if items.len() > 1 {
            Self::Items(items)
        } else {
            Self::Text(items.pop().unwrap_or_default())
        }
    }

    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![text.as_str()],
            Self::Items(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// Keys the record itself uses; a section label that lowercases to one of
/// these gets a `section_` prefix.
const RESERVED_KEYS: &[&str] = &["source", "personal_info", "education_scores", "_raw_sections"];

/// `"SOFT SKILLS"` becomes `soft_skills`
pub fn section_key(label: &str) -> String {
    let key = label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    if RESERVED_KEYS.contains(&key.as_str()) {
        format!("section_{key}")
    } else {
        key
    }
}

/// Downstream record. Serializes flat: `source`, `personal_info`, one
/// lowercase key per section, `education_scores` when an education section
/// exists, and the unprocessed section texts under `_raw_sections`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedResume {
    pub source: String,
    pub personal_info: ContactInfo,
    /// Section label and value, document order
    pub sections: Vec<(String, SectionValue)>,
    pub education_scores: Option<EducationScores>,
    pub raw_sections: SectionMap,
}

impl SegmentedResume {
    pub fn section(&self, label: &str) -> Option<&SectionValue> {
        self.sections
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, value)| value)
    }
}

impl Serialize for SegmentedResume {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("source", &self.source)?;
        map.serialize_entry("personal_info", &self.personal_info)?;
        for (label, value) in &self.sections {
            map.serialize_entry(&section_key(label), value)?;
        }
        if let Some(scores) = &self.education_scores {
            map.serialize_entry("education_scores", scores)?;
        }
        map.serialize_entry("_raw_sections", &self.raw_sections)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Header {
        label: String,
        /// Content following `Label:` on the same line
        inline: Option<String>,
    },
    Content,
}

/// Lowercase, outer punctuation stripped, whitespace collapsed
fn normalize_header(line: &str) -> String {
    line.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct SectionSegmenter<'a> {
    config: &'a SegmenterConfig,
}

impl<'a> SectionSegmenter<'a> {
    pub fn new(config: &'a SegmenterConfig) -> Self {
        Self { config }
    }

    fn exact_label(&self, normalized: &str) -> Option<&'a str> {
        if normalized.is_empty() {
            return None;
        }
        self.config
            .vocabulary
            .iter()
            .find(|def| {
                def.label.eq_ignore_ascii_case(normalized)
                    || def.synonyms.iter().any(|s| s.eq_ignore_ascii_case(normalized))
            })
            .map(|def| def.label.as_str())
    }

    /// Short, wordy, numeric or punctuated lines never match fuzzily
    fn fuzzy_candidate(&self, raw: &str, normalized: &str) -> bool {
        let trimmed = raw.trim().trim_end_matches(':');
        normalized.chars().count() >= self.config.min_fuzzy_chars
            && normalized.split(' ').count() <= self.config.max_header_words
            && !trimmed.chars().any(|c| c.is_ascii_digit())
            && !trimmed.contains(BODY_PUNCTUATION)
    }

    fn fuzzy_label(&self, normalized: &str) -> Option<&'a str> {
        let mut best: Option<(&'a str, f64)> = None;
        for def in &self.config.vocabulary {
            let candidates = std::iter::once(&def.label).chain(def.synonyms.iter());
            for candidate in candidates {
                let score = similarity(normalized, &candidate.to_lowercase());
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((def.label.as_str(), score));
                }
            }
        }
        best.filter(|(_, score)| *score >= f64::from(self.config.fuzzy_threshold))
            .map(|(label, _)| label)
    }

    pub fn classify_line(&self, line: &str) -> LineKind {
        let normalized = normalize_header(line);
        if let Some(label) = self.exact_label(&normalized) {
            return LineKind::Header {
                label: label.to_string(),
                inline: None,
            };
        }

        if let Some((prefix, rest)) = line.split_once(':') {
            let rest = rest.trim();
            if !rest.is_empty() {
                if let Some(label) = self.exact_label(&normalize_header(prefix)) {
                    return LineKind::Header {
                        label: label.to_string(),
                        inline: Some(rest.to_string()),
                    };
                }
            }
        }

        if self.fuzzy_candidate(line, &normalized) {
            if let Some(label) = self.fuzzy_label(&normalized) {
                log::debug!("Fuzzy header '{}' -> {label}", line.trim());
                return LineKind::Header {
                    label: label.to_string(),
                    inline: None,
                };
            }
        }

        LineKind::Content
    }

    pub fn segment<S: AsRef<str>>(&self, lines: &[S]) -> SectionMap {
        let mut sections = SectionMap::new();
        let mut current = self.config.unassigned_label.clone();

        for line in lines {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            match self.classify_line(line) {
                LineKind::Header { label, inline } => {
                    if let Some(inline) = inline {
                        sections.append(&label, &inline);
                    }
                    current = label;
                }
                LineKind::Content => sections.append(&current, line.trim_end()),
            }
        }
        sections
    }

    pub fn segment_text(&self, text: &str) -> SectionMap {
        let lines: Vec<&str> = text.lines().collect();
        self.segment(&lines)
    }
}

/// Label whose text is searched for CGPA and school percentages
const EDUCATION_LABEL: &str = "EDUCATION";

/// Segment one extraction record: clean the joined column texts, split into
/// sections and pull contact details and education scores.
pub fn segment_record(result: &ExtractionResult, config: &SegmenterConfig) -> SegmentedResume {
    let text = cleanup::clean_text(&result.column_texts.join("\n"), config);
    let sections = SectionSegmenter::new(config).segment_text(&text);

    SegmentedResume {
        source: result.source.clone(),
        personal_info: extract_contact(&text, &result.links),
        sections: sections
            .iter()
            .map(|(label, text)| (label.to_string(), SectionValue::from_text(text)))
            .collect(),
        education_scores: sections.get(EDUCATION_LABEL).map(extract_education),
        raw_sections: sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segment(text: &str) -> SectionMap {
        let config = SegmenterConfig::default();
        SectionSegmenter::new(&config).segment_text(text)
    }

    #[test]
    fn splits_on_exact_headers() {
        let map = segment("Jane Doe\njane@x.com\nEDUCATION\nB.Tech, 2020\nSkills:\nRust\nGo");
        assert_eq!(map.labels(), vec!["UNASSIGNED", "EDUCATION", "SKILLS"]);
        assert_eq!(map.get("UNASSIGNED"), Some("Jane Doe\njane@x.com"));
        assert_eq!(map.get("SKILLS"), Some("Rust\nGo"));
    }

    #[test]
    fn synonyms_map_to_canonical_labels() {
        let map = segment("Work Experience\nAcme\nProfessional Summary\nBuilder of things");
        assert_eq!(map.labels(), vec!["EXPERIENCE", "PROFILE"]);
    }

    #[test]
    fn misspelled_header_matches_fuzzily() {
        let map = segment("EXPERIANCE\nAcme Corp\nCertifcations\nAWS");
        assert_eq!(map.get("EXPERIENCE"), Some("Acme Corp"));
        assert_eq!(map.get("CERTIFICATIONS"), Some("AWS"));
    }

    #[test]
    fn short_lines_need_min_fuzzy_chars() {
        let mut config = SegmenterConfig::default();
        assert!(matches!(
            SectionSegmenter::new(&config).classify_line("Skill"),
            LineKind::Header { .. }
        ));
        config.min_fuzzy_chars = 6;
        assert_eq!(SectionSegmenter::new(&config).classify_line("Skill"), LineKind::Content);
    }

    #[test]
    fn body_text_is_not_a_header() {
        let config = SegmenterConfig::default();
        let segmenter = SectionSegmenter::new(&config);
        assert_eq!(segmenter.classify_line("Led a team of 5 engineers."), LineKind::Content);
        assert_eq!(segmenter.classify_line("Projects, 2021"), LineKind::Content);
    }

    #[test]
    fn inline_content_after_label() {
        let map = segment("Languages: English, Hindi\nEDUCATION\nIIT");
        assert_eq!(map.get("LANGUAGES"), Some("English, Hindi"));
    }

    #[test]
    fn repeated_header_appends_to_first_occurrence() {
        let map = segment("SKILLS\nRust\nPROJECTS\nresumex\nSkills\nGo");
        assert_eq!(map.labels(), vec!["SKILLS", "PROJECTS"]);
        assert_eq!(map.get("SKILLS"), Some("Rust\nGo"));
    }

    #[test]
    fn section_map_serializes_in_document_order() {
        let map = segment("PROJECTS\nA\nEDUCATION\nB");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"PROJECTS":"A","EDUCATION":"B"}"#);
    }

    #[test]
    fn segments_an_extraction_record() {
        let mut result = ExtractionResult::error("cv.pdf", 1, String::new());
        result.column_texts = vec![
            "Jane Doe\ngithub.com/jane\ndoe".to_string(),
            "SKILLS\n• Rust\n• Go\nLanguages\nEnglish".to_string(),
        ];
        let segmented = segment_record(&result, &SegmenterConfig::default());

        assert_eq!(segmented.section("SKILLS").unwrap().items(), vec!["Rust", "Go"]);
        assert!(segmented.education_scores.is_none());
        let json = serde_json::to_value(&segmented).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "cv.pdf",
                "personal_info": {
                    "email": null,
                    "phone": null,
                    "linkedin": null,
                    "github": "github.com/janedoe",
                    "links": []
                },
                "unassigned": ["Jane Doe", "github.com/janedoe"],
                "skills": ["Rust", "Go"],
                "languages": "English",
                "_raw_sections": {
                    "UNASSIGNED": "Jane Doe\ngithub.com/janedoe",
                    "SKILLS": "• Rust\n• Go",
                    "LANGUAGES": "English"
                }
            })
        );
    }

    #[test]
    fn education_section_carries_scores() {
        let mut result = ExtractionResult::error("cv.pdf", 1, String::new());
        result.column_texts = vec![
            "EDUCATION\nB.E. Computer Science, CGPA: 8.7\n94% in 12th, State Board\n91 % 10th, CBSE\nSOFT SKILLS\nTeamwork"
                .to_string(),
        ];
        let segmented = segment_record(&result, &SegmenterConfig::default());

        let json = serde_json::to_value(&segmented).unwrap();
        assert_eq!(
            json["education_scores"],
            serde_json::json!({"cgpa": "8.7", "10th_perc": "91", "12th_perc": "94"})
        );
        assert_eq!(json["education"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["soft_skills"], "Teamwork");
    }

    #[test]
    fn single_line_sections_stay_strings() {
        assert_eq!(SectionValue::from_text("• Rust"), SectionValue::Text("Rust".to_string()));
        assert_eq!(SectionValue::from_text("\n  \n"), SectionValue::Text(String::new()));
        assert!(SectionValue::from_text("").items().is_empty());
        assert_eq!(
            SectionValue::from_text("- Rust\n\n- Go"),
            SectionValue::Items(vec!["Rust".to_string(), "Go".to_string()])
        );
    }

    #[test]
    fn section_keys_are_lowercase_and_never_shadow_record_fields() {
        assert_eq!(section_key("SOFT SKILLS"), "soft_skills");
        assert_eq!(section_key("EXPERIENCE"), "experience");
        assert_eq!(section_key("Source"), "section_source");
    }
}
