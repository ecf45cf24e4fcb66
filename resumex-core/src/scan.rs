//! Scanned-vs-text-layer decision.
//!
//! Over-triggering OCR on a sparse but valid text layer costs latency; missing
//! a scan returns near-empty output. The thresholds therefore err toward OCR.

use crate::config::ScanConfig;
use crate::types::Block;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanVerdict {
    pub is_scanned: bool,
    pub char_count: usize,
    pub token_count: usize,
}

pub struct ScanClassifier<'a> {
    config: &'a ScanConfig,
}

impl<'a> ScanClassifier<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        Self { config }
    }

    /// Classify from the text layers of the leading pages. Only the first
    /// `sample_pages` entries of `pages` are inspected.
    pub fn classify(&self, pages: &[&[Block]], page_count: usize) -> ScanVerdict {
        if page_count == 0 {
            return ScanVerdict {
                is_scanned: true,
                char_count: 0,
                token_count: 0,
            };
        }

        let mut char_count = 0usize;
        let mut tokens: HashSet<String> = HashSet::new();
        for blocks in pages.iter().take(self.config.sample_pages) {
            for block in blocks.iter() {
                char_count += block.text.chars().filter(|c| !c.is_whitespace()).count();
                for token in TOKEN_REGEX.find_iter(&block.text) {
                    tokens.insert(token.as_str().to_lowercase());
                }
            }
        }

        let token_count = tokens.len();
        let is_scanned = char_count < self.config.min_chars || token_count < self.config.min_tokens;
        log::debug!(
            "Scan verdict: {} ({} chars, {} distinct tokens)",
            if is_scanned { "scanned" } else { "text layer" },
            char_count,
            token_count
        );

        ScanVerdict {
            is_scanned,
            char_count,
            token_count,
        }
    }
}
