use crate::config::StyleConfig;
use crate::types::{round2, Block, StyleSummary};
use std::collections::BTreeSet;

/// Strip the six-letter subset tag embedded fonts carry, e.g. `ABCDEF+Arial-Bold`.
pub fn clean_font_name(raw: &str) -> String {
    raw.rsplit('+').next().unwrap_or(raw).trim().to_string()
}

fn is_symbol_font(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("symbol") || lower.contains("wingdings")
}

/// Aggregate font usage and bullet indicators over every block of a document.
pub fn summarize_style(blocks: &[Block], config: &StyleConfig) -> StyleSummary {
    let mut font_types = BTreeSet::new();
    let mut font_sizes: Vec<f32> = Vec::new();
    let mut bullet_indicators = 0usize;
    let mut isolated_m = false;
    let mut isolated_nine = false;

    for block in blocks {
        if let Some(name) = &block.font_name {
            let clean = clean_font_name(name);
            if is_symbol_font(&clean) {
                bullet_indicators += 1;
            }
            if !clean.is_empty() {
                font_types.insert(clean);
            }
        }
        if let Some(size) = block.font_size {
            font_sizes.push(round2(size));
        }

        let text = block.text.as_str();
        if text.chars().count() <= 2 && config.bullet_glyphs.iter().any(|g| g == text) {
            bullet_indicators += 1;
        } else if starts_with_bullet(text, &config.bullet_glyphs) {
            bullet_indicators += 1;
        }

        match text {
            "M" => isolated_m = true,
            "9" => isolated_nine = true,
            _ => {}
        }
    }

    font_sizes.sort_by(|a, b| a.total_cmp(b));
    font_sizes.dedup();

    StyleSummary {
        font_types,
        font_sizes,
        bullet_points_used: bullet_indicators >= config.bullet_threshold,
        unwanted_icon_used: config.detect_unwanted_icons && isolated_m && isolated_nine,
    }
}

/// A glyph such as `•` glued to the first word. ASCII glyphs (`-`, `*`) are
/// excluded here since they also start ordinary tokens.
fn starts_with_bullet(text: &str, glyphs: &[String]) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    if first.is_ascii() || text.chars().count() < 2 {
        return false;
    }
    let mut buf = [0u8; 4];
    let first_str: &str = first.encode_utf8(&mut buf);
    glyphs.iter().any(|g| g == first_str)
}
