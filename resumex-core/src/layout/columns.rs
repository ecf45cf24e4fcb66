//! Column detection and reading-order reconstruction.
//!
//! Clustering only decides how many columns there are. Blocks are then
//! assigned by midpoint split between adjacent column centers, which is
//! stable under small perturbations where cluster labels are not.

use crate::config::ColumnConfig;
use crate::layout::kmeans::{kmeans_1d, silhouette_score};
use crate::types::Block;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    /// One entry per column, left to right
    pub column_texts: Vec<String>,
    pub column_count: usize,
}

/// Outcome of column-count detection
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDetection {
    pub column_count: usize,
    /// Column centers in ascending x, empty for a single column
    pub centers: Vec<f32>,
    /// Silhouette of the accepted clustering, `None` for a single column
    pub score: Option<f32>,
}

impl ColumnDetection {
    fn single() -> Self {
        Self {
            column_count: 1,
            centers: Vec::new(),
            score: None,
        }
    }
}

pub struct ColumnReconstructor<'a> {
    config: &'a ColumnConfig,
}

impl<'a> ColumnReconstructor<'a> {
    pub fn new(config: &'a ColumnConfig) -> Self {
        Self { config }
    }

    /// Infer 1 to `max_columns` reading columns from block x-centers.
    pub fn detect(&self, blocks: &[Block], page_width: f32) -> ColumnDetection {
        if blocks.len() < self.config.min_blocks {
            log::debug!(
                "Column detection skipped: {} blocks below minimum {}",
                blocks.len(),
                self.config.min_blocks
            );
            return ColumnDetection::single();
        }

        let centers_x: Vec<f32> = blocks.iter().map(|b| b.bbox.center_x()).collect();
        let width = effective_width(blocks, page_width);
        let min_gap = self.config.min_center_gap_ratio * width;
        let max_k = self.config.max_columns.clamp(1, 3);

        let mut best: Option<ColumnDetection> = None;
        for k in 2..=max_k {
            if blocks.len() < k * self.config.min_blocks_per_column.max(1) {
                break;
            }

            let clustering = kmeans_1d(&centers_x, k, self.config.max_iterations);
            if clustering.centers.len() < k {
                continue;
            }

            let sizes = clustering.cluster_sizes();
            if sizes.iter().any(|&s| s < self.config.min_blocks_per_column) {
                log::debug!("k={k}: rejected, cluster sizes {sizes:?}");
                continue;
            }

            if clustering.centers.windows(2).any(|w| w[1] - w[0] < min_gap) {
                log::debug!(
                    "k={k}: rejected, centers {:?} closer than {:.1}",
                    clustering.centers,
                    min_gap
                );
                continue;
            }

            let score = silhouette_score(&centers_x, &clustering.labels, k);
            log::debug!("k={k}: silhouette {score:.3}");
            if score < self.config.silhouette_threshold {
                continue;
            }

            // More columns must beat fewer by more than the tie margin
            let improves = match &best {
                None => true,
                Some(current) => current
                    .score
                    .map_or(true, |s| score > s + self.config.tie_margin),
            };
            if improves {
                best = Some(ColumnDetection {
                    column_count: k,
                    centers: clustering.centers,
                    score: Some(score),
                });
            }
        }

        best.unwrap_or_else(ColumnDetection::single)
    }

    /// Detect columns and linearize each one in reading order.
    pub fn reconstruct(&self, blocks: &[Block], page_width: f32) -> ColumnLayout {
        if blocks.is_empty() {
            return ColumnLayout {
                column_texts: vec![String::new()],
                column_count: 1,
            };
        }

        let detection = self.detect(blocks, page_width);
        if detection.column_count == 1 {
            let all: Vec<&Block> = blocks.iter().collect();
            return ColumnLayout {
                column_texts: vec![blocks_to_text(&all)],
                column_count: 1,
            };
        }

        let boundaries: Vec<f32> = detection
            .centers
            .windows(2)
            .map(|w| (w[0] + w[1]) * 0.5)
            .collect();

        let mut columns: Vec<Vec<&Block>> = vec![Vec::new(); detection.column_count];
        for block in blocks {
            let center = block.bbox.center_x();
            let column = boundaries.iter().filter(|&&b| center >= b).count();
            columns[column].push(block);
        }

        ColumnLayout {
            column_texts: columns.iter().map(|col| blocks_to_text(col)).collect(),
            column_count: detection.column_count,
        }
    }
}

/// Page width, or the horizontal extent of the blocks when the width is unknown
fn effective_width(blocks: &[Block], page_width: f32) -> f32 {
    if page_width.is_finite() && page_width > 0.0 {
        return page_width;
    }
    let min_x = blocks.iter().map(|b| b.bbox.x0).fold(f32::MAX, f32::min);
    let max_x = blocks.iter().map(|b| b.bbox.x1).fold(f32::MIN, f32::max);
    (max_x - min_x).max(1.0)
}

/// Join blocks into lines: blocks on the same page with the same rounded top
/// form one line ordered by `x0`; lines run top to bottom, page by page.
pub fn blocks_to_text(blocks: &[&Block]) -> String {
    let mut lines: BTreeMap<(u32, i64), Vec<&Block>> = BTreeMap::new();
    for block in blocks {
        let key = (block.page, block.bbox.y0.round() as i64);
        lines.entry(key).or_default().push(block);
    }

    lines
        .into_values()
        .map(|mut line| {
            line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            line.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
