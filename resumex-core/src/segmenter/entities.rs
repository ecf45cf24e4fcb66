//! Contact details pulled from resume text and recovered hyperlinks, and
//! the scores commonly listed under education.

use crate::types::Link;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.(?:com|org|net|edu|gov|io|in|dev|co|me|ai|uk|de))\b")
        .expect("email pattern is valid")
});

/// Indian mobile numbers, or 10-digit numbers with an optional country code
/// and the usual separators.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+91[\s-]?\d{10}\b|(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b)")
        .expect("phone pattern is valid")
});

static LINKEDIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:https?://)?(?:www\.)?linkedin\.com/in/[a-zA-Z0-9_-]+)\b").expect("linkedin pattern is valid")
});

static GITHUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:https?://)?(?:www\.)?github\.com/[a-zA-Z0-9_-]+)\b").expect("github pattern is valid")
});

static CGPA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bc?gpa\s*:?\s*([0-9]+(?:\.[0-9]+)?)").expect("cgpa pattern is valid")
});

/// Percentage before the grade on the same line (`94% in 12th`), then after
/// it (`12th, State Board: 94%`)
fn grade_patterns(grade: &str) -> [Regex; 2] {
    [
        Regex::new(&format!(r"(?i)\b(\d{{1,3}}(?:\.\d+)?)[ \t%]+[^\n]*?\b{grade}\b"))
            .expect("grade pattern is valid"),
        Regex::new(&format!(r"(?i)\b{grade}\b[^\n]*?\b(\d{{1,3}}(?:\.\d+)?)\s*%"))
            .expect("grade pattern is valid"),
    ]
}

static TENTH: LazyLock<[Regex; 2]> = LazyLock::new(|| grade_patterns("10th"));

static TWELFTH: LazyLock<[Regex; 2]> = LazyLock::new(|| grade_patterns("12th"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    /// Every recovered hyperlink target, document order
    pub links: Vec<String>,
}

fn first_match(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn first_link(links: &[Link], pattern: &Regex) -> Option<String> {
    links
        .iter()
        .find_map(|link| first_match(pattern, &link.url))
}

/// Scores as written in the resume; values are not normalized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationScores {
    pub cgpa: Option<String>,
    #[serde(rename = "10th_perc")]
    pub tenth_percentage: Option<String>,
    #[serde(rename = "12th_perc")]
    pub twelfth_percentage: Option<String>,
}

fn first_of(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| first_match(pattern, text))
}

pub fn extract_education(text: &str) -> EducationScores {
    EducationScores {
        cgpa: first_match(&CGPA, text),
        tenth_percentage: first_of(&*TENTH, text),
        twelfth_percentage: first_of(&*TWELFTH, text),
    }
}

/// Text wins over hyperlinks: the visible handle is what the candidate wrote.
/// Links fill in what the text does not show (icons linking to profiles).
pub fn extract_contact(text: &str, links: &[Link]) -> ContactInfo {
    let email = first_match(&EMAIL, text).or_else(|| {
        links.iter().find_map(|link| {
            link.url
                .strip_prefix("mailto:")
                .and_then(|address| first_match(&EMAIL, address))
        })
    });
    let phone = first_match(&PHONE, text).or_else(|| {
        links.iter().find_map(|link| {
            link.url
                .strip_prefix("tel:")
                .and_then(|number| first_match(&PHONE, number))
        })
    });

    ContactInfo {
        email,
        phone,
        linkedin: first_match(&LINKEDIN, text).or_else(|| first_link(links, &LINKEDIN)),
        github: first_match(&GITHUB, text).or_else(|| first_link(links, &GITHUB)),
        links: links.iter().map(|link| link.url.clone()).collect(),
    }
}
