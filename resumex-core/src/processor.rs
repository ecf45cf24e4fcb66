use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::handlers::{DocumentContent, DocumentHandler, ExtractionContext, HandlerRegistry};
use crate::layout::{summarize_style, ColumnReconstructor};
use crate::ocr::OcrOrchestrator;
use crate::types::*;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.timings.push((step_name.to_string(), elapsed));
        log::info!("⏱️  {}: {:.0}ms", step_name, elapsed.as_millis());

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn log_summary(&self, source: &str) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        log::info!("📊 Performance Summary for {source}:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            log::info!(
                "   {:.<35} {:.0}ms ({:.1}%)",
                step,
                duration.as_millis(),
                percentage
            );
        }
        log::info!("   {:.<35} {:.0}ms", "Total", total.as_millis());
    }
}

/// Hex SHA-256 of the full document bytes
pub fn calculate_content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Drives one document through dispatch, extraction and layout assembly.
///
/// `extract` never fails: every error becomes an `ExtractionResult` with
/// `method = error` and a reason, so batch callers can keep going.
pub struct ExtractionCoordinator {
    config: ExtractionConfig,
    registry: HandlerRegistry,
    ocr: Arc<OcrOrchestrator>,
    profiling: bool,
}

impl ExtractionCoordinator {
    /// Default handlers and the process-wide OCR engines
    pub fn new(config: ExtractionConfig) -> Self {
        let ocr = Arc::new(OcrOrchestrator::from_config(&config.ocr));
        Self::new_with_dependencies(config, HandlerRegistry::default(), ocr)
    }

    /// Create a coordinator with full dependency injection
    pub fn new_with_dependencies(
        config: ExtractionConfig,
        registry: HandlerRegistry,
        ocr: Arc<OcrOrchestrator>,
    ) -> Self {
        Self {
            config,
            registry,
            ocr,
            profiling: false,
        }
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn ocr(&self) -> &OcrOrchestrator {
        &self.ocr
    }

    /// Extract one file. The declared MIME type, when given, takes precedence
    /// over the extension.
    pub fn extract(&self, path: &Path, declared_mime: Option<&str>) -> ExtractionResult {
        let source = path.display().to_string();
        let mut profiler = StepProfiler::new(self.profiling);

        let handler = match self.registry.resolve(path, declared_mime) {
            Ok(handler) => handler,
            Err(err) => {
                log::warn!("{source}: {err}");
                return ExtractionResult::error(&source, 0, err.to_string());
            }
        };

        let bytes = match profiler.time_step("Read", || std::fs::read(path)) {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = ExtractError::from(err);
                log::warn!("{source}: {err}");
                let mut result = ExtractionResult::error(&source, 0, err.to_string());
                result.metadata.handler = Some(handler.name().to_string());
                return result;
            }
        };

        let result = self.run(handler, &source, &bytes, &mut profiler);
        profiler.log_summary(&source);
        result
    }

    /// Extract in-memory bytes. `name` is used as the result source and, in
    /// the absence of a declared MIME type, for extension dispatch.
    pub fn extract_bytes(&self, name: &str, bytes: &[u8], declared_mime: Option<&str>) -> ExtractionResult {
        let mut profiler = StepProfiler::new(self.profiling);
        match self.registry.resolve(Path::new(name), declared_mime) {
            Ok(handler) => {
                let result = self.run(handler, name, bytes, &mut profiler);
                profiler.log_summary(name);
                result
            }
            Err(err) => {
                log::warn!("{name}: {err}");
                ExtractionResult::error(name, 0, err.to_string())
            }
        }
    }

    fn run(
        &self,
        handler: &dyn DocumentHandler,
        source: &str,
        bytes: &[u8],
        profiler: &mut StepProfiler,
    ) -> ExtractionResult {
        log::debug!("{source}: {} bytes via '{}' handler", bytes.len(), handler.name());
        let content_hash = profiler.time_step("Content Hash", || calculate_content_hash(bytes));

        let deadline = self.config.timeout().map(|timeout| Instant::now() + timeout);
        let ctx = ExtractionContext::new(&self.config, &self.ocr).with_deadline(deadline);

        // Native renderers can panic on hostile input; one bad file must not
        // take down the batch.
        let outcome = profiler.time_step("Handler", || {
            panic::catch_unwind(AssertUnwindSafe(|| handler.process(bytes, &ctx)))
        });

        let content = match outcome {
            Ok(Ok(content)) => content,
            Ok(Err(err)) => {
                log::warn!("{source}: {err}");
                return self.failed(source, handler, content_hash, err.to_string(), None);
            }
            Err(_) => {
                log::error!("{source}: handler '{}' panicked", handler.name());
                let reason = format!("handler '{}' panicked", handler.name());
                return self.failed(source, handler, content_hash, reason, None);
            }
        };

        if content.blocks.is_empty() {
            let reason = if content.timed_out {
                let limit = self.config.timeout().unwrap_or_default();
                format!("{}; {}", ExtractError::Timeout(limit), content.empty_reason())
            } else {
                ExtractError::NoTextExtracted(content.empty_reason()).to_string()
            };
            log::warn!("{source}: {reason}");
            return self.failed(source, handler, content_hash, reason, Some(content));
        }

        self.assemble(source, handler, content_hash, content, profiler)
    }

    /// Error record that keeps whatever the handler did learn
    fn failed(
        &self,
        source: &str,
        handler: &dyn DocumentHandler,
        content_hash: String,
        reason: String,
        content: Option<DocumentContent>,
    ) -> ExtractionResult {
        let pages = content.as_ref().map_or(0, |c| c.pages);
        let mut result = ExtractionResult::error(source, pages, reason);
        result.metadata.handler = Some(handler.name().to_string());
        result.metadata.content_sha256 = Some(content_hash);
        if let Some(content) = content {
            result.metadata.is_scanned = content.is_scanned;
            result.metadata.page_failures = content.page_failures;
            result.metadata.timed_out = content.timed_out;
            result.links = content.links;
        }
        result
    }

    fn assemble(
        &self,
        source: &str,
        handler: &dyn DocumentHandler,
        content_hash: String,
        content: DocumentContent,
        profiler: &mut StepProfiler,
    ) -> ExtractionResult {
        let layout = profiler.time_step("Column Reconstruction", || {
            ColumnReconstructor::new(&self.config.columns).reconstruct(&content.blocks, content.page_width)
        });
        let style = profiler.time_step("Style Analysis", || {
            summarize_style(&content.blocks, &self.config.style)
        });

        if content.timed_out {
            log::warn!(
                "{source}: deadline expired, {} of {} pages missing",
                content.page_failures.iter().filter(|f| f.kind == "timeout").count(),
                content.pages
            );
        }
        log::info!(
            "{source}: {} ({} pages, {} blocks, {} column(s), {} links)",
            content.method.as_str(),
            content.pages,
            content.blocks.len(),
            layout.column_count,
            content.links.len()
        );

        ExtractionResult {
            source: source.to_string(),
            pages: content.pages,
            metadata: ExtractionMetadata {
                method: content.method,
                detected_columns: layout.column_count,
                is_scanned: content.is_scanned,
                handler: Some(handler.name().to_string()),
                page_failures: content.page_failures,
                timed_out: content.timed_out,
                error: None,
                content_sha256: Some(content_hash),
                extracted_at: Utc::now(),
            },
            column_texts: layout.column_texts,
            style_analysis: style,
            links: content.links,
        }
    }
}
