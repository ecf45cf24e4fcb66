//! One-dimensional k-means and silhouette scoring over block x-centers.

/// Silhouette is quadratic in the number of points; larger inputs are
/// sampled down to about this many points with a fixed stride.
const MAX_SILHOUETTE_POINTS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster centers in ascending order
    pub centers: Vec<f32>,
    /// Cluster index per input value, indexing into `centers`
    pub labels: Vec<usize>,
}

impl Clustering {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centers.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Partition `values` into `k` clusters.
///
/// Centers start at evenly spaced quantiles of the sorted values, which keeps
/// the result deterministic for a given input.
pub fn kmeans_1d(values: &[f32], k: usize, max_iterations: usize) -> Clustering {
    let n = values.len();
    if n == 0 || k == 0 {
        return Clustering {
            centers: Vec::new(),
            labels: Vec::new(),
        };
    }
    let k = k.min(n);

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mut centers: Vec<f32> = (0..k).map(|i| sorted[((2 * i + 1) * n) / (2 * k)]).collect();
    let mut labels: Vec<usize> = vec![0; n];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;

        // Assignment step: nearest center
        for (i, &value) in values.iter().enumerate() {
            let best = nearest_center(&centers, value);
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }

        // Recompute centers; an empty cluster keeps its previous center
        let mut sums = vec![(0.0f64, 0usize); k];
        for (i, &value) in values.iter().enumerate() {
            sums[labels[i]].0 += value as f64;
            sums[labels[i]].1 += 1;
        }
        for (center, (sum, count)) in centers.iter_mut().zip(sums) {
            if count > 0 {
                *center = (sum / count as f64) as f32;
            }
        }

        if !changed {
            break;
        }
    }

    // Relabel so that cluster 0 is the leftmost
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_unstable_by(|&a, &b| centers[a].total_cmp(&centers[b]));
    let mut remap = vec![0usize; k];
    for (new_index, &old_index) in order.iter().enumerate() {
        remap[old_index] = new_index;
    }

    Clustering {
        centers: order.iter().map(|&i| centers[i]).collect(),
        labels: labels.iter().map(|&l| remap[l]).collect(),
    }
}

fn nearest_center(centers: &[f32], value: f32) -> usize {
    let mut best_idx = 0usize;
    let mut best_dist = f32::MAX;
    for (idx, &center) in centers.iter().enumerate() {
        let dist = (value - center).abs();
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }
    best_idx
}

/// Mean silhouette coefficient in `[-1, 1]`. Returns 0.0 when fewer than two
/// clusters are populated.
pub fn silhouette_score(values: &[f32], labels: &[usize], k: usize) -> f32 {
    let stride = values.len().div_ceil(MAX_SILHOUETTE_POINTS).max(1);
    let points: Vec<(f32, usize)> = values
        .iter()
        .zip(labels)
        .step_by(stride)
        .map(|(&v, &l)| (v, l))
        .collect();

    let mut sizes = vec![0usize; k];
    for &(_, label) in &points {
        sizes[label] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let mut total = 0.0f64;
    for &(value, label) in &points {
        if sizes[label] <= 1 {
            // Singleton clusters contribute 0 by convention
            continue;
        }
        let mut dist_sums = vec![0.0f64; k];
        for &(other, other_label) in &points {
            dist_sums[other_label] += (value - other).abs() as f64;
        }
        let a = dist_sums[label] / (sizes[label] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != label && sizes[c] > 0)
            .map(|c| dist_sums[c] / sizes[c] as f64)
            .fold(f64::MAX, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    (total / points.len() as f64) as f32
}
