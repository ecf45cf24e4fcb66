use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use resumex::{collect_inputs, create_output, evaluate_records, read_jsonl, run_batch, segment_records, write_jsonl};
use resumex_core::evaluation::summarize;
use resumex_core::{ExtractionConfig, ExtractionCoordinator, ExtractionResult};

#[derive(Parser)]
#[command(name = "resumex")]
#[command(version)]
#[command(about = "Extract reading-order text, style and links from resumes (PDF, DOCX, scans)")]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every supported file of a directory (or one file) to JSONL
    Extract {
        /// Input file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSONL file, one record per input
        #[arg(short, long)]
        out: PathBuf,

        /// Path to custom config file (YAML format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads (default: available cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Per-document deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Maximum number of reading columns (1-3)
        #[arg(long)]
        max_columns: Option<usize>,

        /// Rasterization resolution for OCR
        #[arg(long)]
        dpi: Option<u32>,

        /// Fail before processing when no OCR engine can be started
        #[arg(long)]
        require_ocr: bool,

        /// Enable detailed profiling of all pipeline steps
        #[arg(long)]
        profile: bool,
    },

    /// Split extraction records into labeled resume sections
    Segment {
        /// JSONL produced by `extract`
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSONL of segmented resumes
        #[arg(short, long)]
        out: PathBuf,

        /// Config file providing the section vocabulary
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Score extraction records against ground-truth transcripts
    Evaluate {
        /// JSONL produced by `extract`
        #[arg(short, long)]
        results: PathBuf,

        /// Directory of `<name>.txt` transcripts matching input file stems
        #[arg(short, long)]
        truth: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let outcome = match cli.command {
        Commands::Extract {
            input,
            out,
            config,
            jobs,
            timeout_secs,
            max_columns,
            dpi,
            require_ocr,
            profile,
        } => {
            let overrides = Overrides {
                timeout_secs,
                max_columns,
                dpi,
            };
            load_config(config.as_deref(), &overrides)
                .and_then(|config| run_extract(&input, &out, config, jobs, require_ocr, profile))
        }
        Commands::Segment { input, out, config } => {
            load_config(config.as_deref(), &Overrides::default()).and_then(|config| run_segment(&input, &out, &config))
        }
        Commands::Evaluate { results, truth } => run_evaluate(&results, &truth),
    };

    if let Err(e) = outcome {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

/// Command-line values that take precedence over the config file
#[derive(Default)]
struct Overrides {
    timeout_secs: Option<u64>,
    max_columns: Option<usize>,
    dpi: Option<u32>,
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<ExtractionConfig> {
    let mut config = match path {
        Some(path) => {
            let config = ExtractionConfig::load_from_file(path)?;
            log::info!("📋 Loaded config from: {}", path.display());
            config
        }
        None => ExtractionConfig::default(),
    };

    if let Some(timeout) = overrides.timeout_secs {
        config.timeout_secs = Some(timeout);
    }
    if let Some(max_columns) = overrides.max_columns {
        config.columns.max_columns = max_columns;
    }
    if let Some(dpi) = overrides.dpi {
        config.render.dpi = dpi;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_extract(
    input: &Path,
    out: &Path,
    config: ExtractionConfig,
    jobs: Option<usize>,
    require_ocr: bool,
    profile: bool,
) -> Result<()> {
    let coordinator = ExtractionCoordinator::new(config).with_profiling(profile);
    let engines = coordinator.ocr().engine_names();
    if engines.is_empty() {
        if require_ocr {
            bail!("--require-ocr given but no OCR engine could be started");
        }
        log::warn!("⚠️  No OCR engine available; scanned documents will come back empty");
    } else {
        log::info!("🔧 OCR engines: {}", engines.join(", "));
    }

    let inputs = collect_inputs(input, coordinator.registry())?;
    let mut writer = create_output(out)?;
    if inputs.is_empty() {
        log::warn!("No supported files under {}", input.display());
    }

    let has_pdf = inputs
        .iter()
        .any(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")));
    if has_pdf {
        // Bind once up front so every worker shares the same library
        if let Err(e) = resumex_core::handlers::pdf::PDFIUM.get() {
            log::warn!("⚠️  {e}; PDF inputs will produce error records");
        }
    }

    let jobs = jobs.unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
    log::info!("📄 Processing {} file(s) with {} worker(s)", inputs.len(), jobs);

    let start = Instant::now();
    let summary = run_batch(&coordinator, &inputs, jobs, &mut writer)?;
    log::info!("✅ {} record(s) written to {} in {:.1}s", summary.total, out.display(), start.elapsed().as_secs_f64());
    for (method, count) in &summary.by_method {
        log::info!("   {method:.<20} {count}");
    }
    if summary.timed_out > 0 {
        log::info!("   {:.<20} {}", "timed out", summary.timed_out);
    }
    if summary.failed() > 0 {
        log::warn!("⚠️  {} document(s) produced no text", summary.failed());
    }

    resumex_core::ocr::teardown_shared_engines();
    Ok(())
}

fn run_segment(input: &Path, out: &Path, config: &ExtractionConfig) -> Result<()> {
    let results: Vec<ExtractionResult> = read_jsonl(input)?;
    let mut writer = create_output(out)?;
    let segmented = segment_records(&results, &config.segmenter);
    write_jsonl(&mut writer, &segmented)?;
    log::info!("✅ {} resume(s) segmented into {}", segmented.len(), out.display());
    Ok(())
}

fn run_evaluate(results_path: &Path, truth_dir: &Path) -> Result<()> {
    let results: Vec<ExtractionResult> = read_jsonl(results_path)?;
    let scores = evaluate_records(&results, truth_dir)?;

    for (source, score) in &scores {
        println!(
            "{source}\tcer={:.4}\twer={:.4}\tsimilarity={:.4}\toverlap={:.4}",
            score.cer, score.wer, score.normalized_levenshtein, score.token_overlap
        );
    }

    let per_document: Vec<_> = scores.into_iter().map(|(_, score)| score).collect();
    let summary = summarize(&per_document);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.documents < results.len() {
        log::warn!(
            "{} of {} record(s) had no ground truth",
            results.len() - summary.documents,
            results.len()
        );
    }
    Ok(())
}
