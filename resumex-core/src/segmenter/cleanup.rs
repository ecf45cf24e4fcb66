//! Low-level text repair applied before segmentation.

use crate::config::SegmenterConfig;
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A profile URL whose handle wrapped onto the next line
static BROKEN_PROFILE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\b(?:linkedin\.com/in|github\.com)/[a-zA-Z0-9_-]+)\n([a-zA-Z0-9_-]+)")
        .expect("broken link pattern is valid")
});

static DIGIT_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9])([a-zA-Z])").expect("digit/letter pattern is valid"));

static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("case boundary pattern is valid"));

static DOMAIN_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.(?:com|in|org|net))([a-zA-Z])").expect("domain suffix pattern is valid")
});

static GLUED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([a-zA-Z])(https?|www)").expect("glued url pattern is valid"));

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"));

pub fn join_broken_links(text: &str) -> String {
    BROKEN_PROFILE_LINK.replace_all(text, "${1}${2}").into_owned()
}

/// Split tokens glued together by text extraction, e.g. `2021Python`,
/// `jaNe`, `gmail.comPhone`. Aggressive; off by default.
pub fn insert_missing_spaces(text: &str) -> String {
    let text = DIGIT_LETTER.replace_all(text, "${1} ${2}");
    let text = LOWER_UPPER.replace_all(&text, "${1} ${2}");
    let text = DOMAIN_SUFFIX.replace_all(&text, "${1} ${2}");
    GLUED_URL.replace_all(&text, "${1} ${2}").into_owned()
}

/// Replace each typo as a whole word, ignoring case
pub fn correct_typos(text: &str, corrections: &BTreeMap<String, String>) -> String {
    let mut text = text.to_string();
    for (typo, fix) in corrections {
        let typo = typo.trim();
        if typo.is_empty() {
            continue;
        }
        match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(typo))) {
            Ok(pattern) => text = pattern.replace_all(&text, NoExpand(fix)).into_owned(),
            Err(e) => log::warn!("Skipping typo correction '{typo}': {e}"),
        }
    }
    text
}

pub fn clean_text(text: &str, config: &SegmenterConfig) -> String {
    let mut text = text.replace('\r', "").replace('\u{c}', "");
    if config.join_broken_links {
        text = join_broken_links(&text);
    }
    if config.insert_missing_spaces {
        text = insert_missing_spaces(&text);
    }
    if !config.typo_corrections.is_empty() {
        text = correct_typos(&text, &config.typo_corrections);
    }
    BLANK_RUNS.replace_all(&text, "\n\n").trim().to_string()
}
