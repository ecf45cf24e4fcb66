//! Text similarity metrics for scoring extraction output against
//! ground-truth transcripts. All metrics work on normalized text: lowercase
//! with whitespace runs collapsed to one space.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lowercase and collapse whitespace
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edit distance over arbitrary sequences (insert, delete, substitute)
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, item_a) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, item_b) in b.iter().enumerate() {
            let cost = usize::from(item_a != item_b);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn chars(text: &str) -> Vec<char> {
    text.chars().collect()
}

/// Similarity in `[0, 1]` of two already-normalized strings, 1 meaning equal
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (chars(a), chars(b));
    let longest = a.len().max(b.len()).max(1);
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Character edit distance divided by reference length
pub fn char_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let r = chars(&normalize_text(reference));
    let h = chars(&normalize_text(hypothesis));
    levenshtein(&r, &h) as f64 / r.len().max(1) as f64
}

/// Token edit distance divided by reference word count
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let r = normalize_text(reference);
    let h = normalize_text(hypothesis);
    let r: Vec<&str> = r.split(' ').filter(|w| !w.is_empty()).collect();
    let h: Vec<&str> = h.split(' ').filter(|w| !w.is_empty()).collect();
    if r.is_empty() {
        return if h.is_empty() { 0.0 } else { 1.0 };
    }
    levenshtein(&r, &h) as f64 / r.len() as f64
}

pub fn normalized_levenshtein(reference: &str, hypothesis: &str) -> f64 {
    similarity(&normalize_text(reference), &normalize_text(hypothesis))
}

/// Share of distinct reference tokens that appear in the hypothesis
pub fn token_overlap(reference: &str, hypothesis: &str) -> f64 {
    let r_text = normalize_text(reference);
    let h_text = normalize_text(hypothesis);
    let r: HashSet<&str> = r_text.split_whitespace().collect();
    let h: HashSet<&str> = h_text.split_whitespace().collect();
    if r.is_empty() {
        return 0.0;
    }
    r.intersection(&h).count() as f64 / r.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub cer: f64,
    pub wer: f64,
    pub normalized_levenshtein: f64,
    pub token_overlap: f64,
}

pub fn evaluate_pair(reference: &str, hypothesis: &str) -> EvaluationScores {
    EvaluationScores {
        cer: char_error_rate(reference, hypothesis),
        wer: word_error_rate(reference, hypothesis),
        normalized_levenshtein: normalized_levenshtein(reference, hypothesis),
        token_overlap: token_overlap(reference, hypothesis),
    }
}

/// Mean scores over a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub documents: usize,
    pub mean: Option<EvaluationScores>,
}

pub fn summarize(scores: &[EvaluationScores]) -> EvaluationSummary {
    if scores.is_empty() {
        return EvaluationSummary {
            documents: 0,
            mean: None,
        };
    }
    let n = scores.len() as f64;
    let mean = |f: fn(&EvaluationScores) -> f64| scores.iter().map(f).sum::<f64>() / n;
    EvaluationSummary {
        documents: scores.len(),
        mean: Some(EvaluationScores {
            cer: mean(|s| s.cer),
            wer: mean(|s| s.wer),
            normalized_levenshtein: mean(|s| s.normalized_levenshtein),
            token_overlap: mean(|s| s.token_overlap),
        }),
    }
}
