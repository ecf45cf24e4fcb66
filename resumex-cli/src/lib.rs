// All extraction logic lives in resumex-core.
// This crate holds the batch plumbing shared by the `resumex` binary:
// input discovery, the worker pool and JSONL reading/writing.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use resumex_core::config::SegmenterConfig;
use resumex_core::evaluation::{evaluate_pair, EvaluationScores};
use resumex_core::{segment_record, ExtractionCoordinator, ExtractionResult, HandlerRegistry, SegmentedResume};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

// Re-export core types for convenience
pub use resumex_core::*;

/// Files to process: the input itself, or every supported file below a
/// directory, sorted by path so runs are reproducible.
pub fn collect_inputs(input: &Path, registry: &HandlerRegistry) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        bail!("Input not found: {}", input.display());
    }
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut pending = vec![input.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if registry.is_supported(&path) {
                files.push(path);
            } else {
                log::debug!("Skipping unsupported file {}", path.display());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Extract every input on a pool of `jobs` threads, writing one JSONL line
/// per document as soon as every earlier input has been written. Lines come
/// out in input order whatever order the workers finish in, and each one is
/// flushed before the next, so an interrupted batch keeps its finished prefix.
pub fn run_batch<W: Write>(
    coordinator: &ExtractionCoordinator,
    inputs: &[PathBuf],
    jobs: usize,
    writer: &mut W,
) -> Result<BatchSummary> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to start worker pool")?;

    let (sender, receiver) = mpsc::channel::<(usize, ExtractionResult)>();
    let mut summary = BatchSummary::default();

    std::thread::scope(|scope| -> Result<()> {
        scope.spawn(move || {
            // A send fails only once the writer has given up; stop handing out inputs
            let _ = pool.install(|| {
                inputs
                    .par_iter()
                    .enumerate()
                    .try_for_each_with(sender, |sender, (index, path)| {
                        sender.send((index, coordinator.extract(path, None)))
                    })
            });
        });

        let mut held_back: BTreeMap<usize, ExtractionResult> = BTreeMap::new();
        let mut next = 0;
        for (index, result) in receiver {
            held_back.insert(index, result);
            while let Some(result) = held_back.remove(&next) {
                write_record(writer, &result)
                    .with_context(|| format!("Failed to write record for {}", result.source))?;
                summary.record(&result);
                next += 1;
            }
        }
        Ok(())
    })?;

    Ok(summary)
}

/// Check up front that the output file can be created
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Output not writable: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write one record as a JSONL line and flush it
pub fn write_record<T: Serialize, W: Write>(writer: &mut W, record: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn write_jsonl<T: Serialize, W: Write>(writer: &mut W, records: &[T]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read one record per line, skipping blank lines
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), number + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Per-method counts for the end-of-run report
#[derive(Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub by_method: BTreeMap<&'static str, usize>,
    pub timed_out: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ExtractionResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result);
        }
        summary
    }

    pub fn record(&mut self, result: &ExtractionResult) {
        self.total += 1;
        *self.by_method.entry(result.method().as_str()).or_default() += 1;
        if result.metadata.timed_out {
            self.timed_out += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.by_method.get("error").copied().unwrap_or(0)
    }
}

pub fn segment_records(results: &[ExtractionResult], config: &SegmenterConfig) -> Vec<SegmentedResume> {
    results.iter().map(|result| segment_record(result, config)).collect()
}

/// Score each record against `<truth_dir>/<source stem>.txt`. Records
/// without a transcript are skipped.
pub fn evaluate_records(results: &[ExtractionResult], truth_dir: &Path) -> Result<Vec<(String, EvaluationScores)>> {
    if !truth_dir.is_dir() {
        bail!("Ground truth directory not found: {}", truth_dir.display());
    }

    let mut scores = Vec::new();
    for result in results {
        let Some(stem) = Path::new(&result.source).file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let truth_path = truth_dir.join(format!("{stem}.txt"));
        if !truth_path.is_file() {
            log::warn!("No ground truth for {} (expected {})", result.source, truth_path.display());
            continue;
        }
        let reference = std::fs::read_to_string(&truth_path)
            .with_context(|| format!("Failed to read {}", truth_path.display()))?;
        scores.push((result.source.clone(), evaluate_pair(&reference, &result.full_text())));
    }
    Ok(scores)
}
