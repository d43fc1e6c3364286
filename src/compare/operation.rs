//! Comparison run orchestration: extraction, diffing and result assembly

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::aggregate::{VisibleToken, aggregate_totals, build_changes, highlight_flags, visible_tokens};
use super::extract::{ExtractOptions, PageSource, TextExtractor};
use super::highlight::HighlightIndex;
use super::request::{ComparePayload, DiffConfig, DiffResponse, DiffSettings, WorkerStats, WorkerWarnings};
use super::service::DiffService;
use super::types::{
    CompareChange, CompareParagraph, DiffKind, DiffToken, ExtractedContent, PageSize, Pane,
    TokenMetadata,
};
use crate::error::{CompareError, Result};

/// Combined page count that triggers the long-running notice
pub const LONG_RUNNING_PAGE_THRESHOLD: usize = 2000;
/// Tokens observed before the dissimilarity notice may fire
pub const EARLY_NOTICE_MIN_TOKENS: usize = 15_000;
/// Share of changed tokens that triggers the dissimilarity notice
pub const EARLY_NOTICE_DIFF_RATIO: f64 = 0.8;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of a comparison run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    Idle,
    Extracting,
    Processing,
    Complete,
    Cancelled,
    Error,
}

impl OperationStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Extracting | Self::Processing)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Informational events raised while a run is in flight
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    /// Both documents together have at least this many pages
    LongRunning { pages: usize },
    /// Most of the tokens seen so far are changes
    EarlyDissimilarity { seen: usize, changed_ratio: f64 },
}

/// Receives progress from a running comparison. All methods default to
/// doing nothing.
pub trait CompareObserver {
    fn on_status(&mut self, _status: OperationStatus) {}
    fn on_warning(&mut self, _message: &str) {}
    /// Visible tokens of a committed chunk
    fn on_chunk(&mut self, _tokens: &[DiffToken]) {}
    fn on_notice(&mut self, _notice: &Notice) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl CompareObserver for NoopObserver {}

/// A document that can be opened for extraction on any thread
pub trait DocumentInput: Sync {
    fn name(&self) -> &str;
    fn open(&self) -> Result<Box<dyn PageSource + '_>>;
}

/// Per-document part of a result
#[derive(Clone, Debug, PartialEq)]
pub struct CompareSide {
    pub name: String,
    pub word_count: usize,
    pub page_sizes: Vec<PageSize>,
    pub tokens: Vec<String>,
    pub metadata: Vec<TokenMetadata>,
    pub paragraphs: Vec<CompareParagraph>,
    pub visible: Vec<VisibleToken>,
    pub highlights: HighlightIndex,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultTotals {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub duration_ms: f64,
    pub processed_at: DateTime<Utc>,
}

/// Everything a finished comparison produces
#[derive(Clone, Debug, PartialEq)]
pub struct CompareResult {
    pub base: CompareSide,
    pub comparison: CompareSide,
    pub totals: ResultTotals,
    /// Visible tagged tokens, sentinels removed
    pub tokens: Vec<DiffToken>,
    pub changes: Vec<CompareChange>,
    pub warnings: Vec<String>,
}

impl CompareResult {
    #[must_use]
    pub fn side(&self, pane: Pane) -> &CompareSide {
        match pane {
            Pane::Base => &self.base,
            Pane::Comparison => &self.comparison,
        }
    }

    #[must_use]
    pub fn change(&self, id: &str) -> Option<&CompareChange> {
        self.changes.iter().find(|c| c.id == id)
    }
}

/// Cancels whatever run is in flight, from any thread
#[derive(Clone, Debug)]
pub struct CancelHandle {
    generation: Arc<AtomicU64>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tuning for a comparison run
#[derive(Clone, Debug)]
pub struct OperationConfig {
    pub diff: DiffConfig,
    pub extract: ExtractOptions,
    pub warnings: WorkerWarnings,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            diff: DiffConfig {
                batch_size: 5000,
                complex_threshold: 120_000,
                max_word_threshold: 200_000,
                ..DiffConfig::default()
            },
            extract: ExtractOptions::default(),
            warnings: WorkerWarnings {
                complex_message: None,
                too_large_message: Some(
                    "These documents are very large; comparison may take several minutes.".into(),
                ),
                empty_text_message: Some(
                    "One or both of the selected documents have no text content.".into(),
                ),
                too_dissimilar_message: Some(
                    "These documents appear highly dissimilar. Comparison was stopped to save time."
                        .into(),
                ),
            },
        }
    }
}

/// Tracks the changed share of streamed tokens
#[derive(Debug, Default)]
struct DissimilarityWatch {
    changed: usize,
    unchanged: usize,
    fired: bool,
}

impl DissimilarityWatch {
    fn observe(&mut self, tokens: &[DiffToken]) -> Option<Notice> {
        for token in tokens {
            if token.kind == DiffKind::Unchanged {
                self.unchanged += 1;
            } else {
                self.changed += 1;
            }
        }
        let seen = self.changed + self.unchanged;
        let ratio = self.changed as f64 / seen.max(1) as f64;
        if !self.fired && seen >= EARLY_NOTICE_MIN_TOKENS && ratio >= EARLY_NOTICE_DIFF_RATIO {
            self.fired = true;
            return Some(Notice::EarlyDissimilarity {
                seen,
                changed_ratio: ratio,
            });
        }
        None
    }
}

/// Drives comparison runs and owns the diff worker
pub struct CompareOperation {
    config: OperationConfig,
    service: DiffService,
    generation: Arc<AtomicU64>,
    status: OperationStatus,
    status_since: Instant,
    error: Option<String>,
    result: Option<CompareResult>,
}

impl Default for CompareOperation {
    fn default() -> Self {
        Self::new(OperationConfig::default())
    }
}

impl CompareOperation {
    #[must_use]
    pub fn new(config: OperationConfig) -> Self {
        Self {
            config,
            service: DiffService::default(),
            generation: Arc::new(AtomicU64::new(0)),
            status: OperationStatus::Idle,
            status_since: Instant::now(),
            error: None,
            result: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Milliseconds spent in the current status
    #[must_use]
    pub fn status_elapsed_ms(&self) -> u128 {
        self.status_since.elapsed().as_millis()
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&CompareResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            generation: Arc::clone(&self.generation),
        }
    }

    #[must_use]
    pub fn is_worker_running(&self) -> bool {
        self.service.is_running()
    }

    fn set_status(&mut self, status: OperationStatus, observer: &mut dyn CompareObserver) {
        if self.status != status {
            debug!("Compare status {} -> {status}", self.status);
            self.status = status;
            self.status_since = Instant::now();
            observer.on_status(status);
        }
    }

    fn fail(&mut self, err: CompareError, observer: &mut dyn CompareObserver) -> CompareError {
        if err.is_cancelled() {
            self.set_status(OperationStatus::Cancelled, observer);
        } else {
            warn!("Comparison failed: {err}");
            self.error = Some(err.to_string());
            self.set_status(OperationStatus::Error, observer);
        }
        err
    }

    /// Invalidate the running comparison and stop the worker
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.service.terminate();
        if self.status.is_running() {
            self.status = OperationStatus::Cancelled;
            self.status_since = Instant::now();
        }
    }

    /// Drop the result and return to idle
    pub fn reset(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.result = None;
        self.error = None;
        self.status = OperationStatus::Idle;
        self.status_since = Instant::now();
    }

    /// Compare two documents.
    ///
    /// Any earlier run is invalidated. On success the result is stored and
    /// returned.
    pub fn run(
        &mut self,
        base: &dyn DocumentInput,
        comparison: &dyn DocumentInput,
        observer: &mut dyn CompareObserver,
    ) -> Result<&CompareResult> {
        let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.result = None;
        self.error = None;
        self.set_status(OperationStatus::Extracting, observer);
        info!("Comparing '{}' against '{}'", base.name(), comparison.name());

        let started = Instant::now();
        let extracted = self.extract_both(base, comparison, run);
        let (base_content, comparison_content) = match extracted {
            Ok(pair) => pair,
            Err(err) => return Err(self.fail(err, observer)),
        };
        debug!("Extraction took {} ms", started.elapsed().as_millis());

        if self.is_stale(run) {
            return Err(self.fail(CompareError::Cancelled, observer));
        }

        if base_content.word_count() == 0 || comparison_content.word_count() == 0 {
            let message = self
                .config
                .warnings
                .empty_text_message
                .clone()
                .unwrap_or_else(|| super::worker::DEFAULT_EMPTY_TEXT_MESSAGE.to_string());
            return Err(self.fail(CompareError::EmptyText { message }, observer));
        }

        self.set_status(OperationStatus::Processing, observer);

        let pages = base_content.page_count() + comparison_content.page_count();
        if pages >= LONG_RUNNING_PAGE_THRESHOLD {
            observer.on_notice(&Notice::LongRunning { pages });
        }

        let diffed = self.run_diff(&base_content, &comparison_content, run, observer);
        let (tokens, stats, warnings) = match diffed {
            Ok(out) => out,
            Err(err) => return Err(self.fail(err, observer)),
        };

        let result = assemble_result(
            (base.name(), base_content),
            (comparison.name(), comparison_content),
            &tokens,
            stats,
            warnings,
        );
        info!(
            "Comparison complete: {} changes (+{} / -{} / ={})",
            result.changes.len(),
            result.totals.added,
            result.totals.removed,
            result.totals.unchanged
        );

        self.set_status(OperationStatus::Complete, observer);
        Ok(self.result.insert(result))
    }

    fn is_stale(&self, run: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != run
    }

    fn extract_both(
        &self,
        base: &dyn DocumentInput,
        comparison: &dyn DocumentInput,
        run: u64,
    ) -> Result<(ExtractedContent, ExtractedContent)> {
        let options = self.config.extract;
        let generation = &self.generation;
        let extract = |input: &dyn DocumentInput| -> Result<ExtractedContent> {
            let source = input.open()?;
            TextExtractor::new(options)
                .extract_until(&*source, || generation.load(Ordering::SeqCst) != run)
        };
        let (base_content, comparison_content) = rayon::join(|| extract(base), || extract(comparison));
        Ok((base_content?, comparison_content?))
    }

    fn run_diff(
        &mut self,
        base: &ExtractedContent,
        comparison: &ExtractedContent,
        run: u64,
        observer: &mut dyn CompareObserver,
    ) -> Result<(Vec<DiffToken>, WorkerStats, Vec<String>)> {
        let payload = ComparePayload {
            base_tokens: base.tokens.clone(),
            comparison_tokens: comparison.tokens.clone(),
            warnings: self.config.warnings.clone(),
            settings: Some(DiffSettings::from(&self.config.diff)),
        };
        let id = self.service.submit(payload)?;

        let mut tokens = Vec::new();
        let mut warnings = Vec::new();
        let mut watch = DissimilarityWatch::default();

        loop {
            if self.is_stale(run) {
                self.service.cancel(id);
                return Err(CompareError::Cancelled);
            }
            let Some(response) = self.service.recv_timeout(POLL_INTERVAL)? else {
                continue;
            };
            match response {
                DiffResponse::Warning { message, .. } => {
                    observer.on_warning(&message);
                    warnings.push(message);
                }
                DiffResponse::Chunk { tokens: chunk, .. } => {
                    let visible: Vec<DiffToken> =
                        chunk.iter().filter(|t| !t.is_sentinel()).cloned().collect();
                    observer.on_chunk(&visible);
                    if let Some(notice) = watch.observe(&visible) {
                        observer.on_notice(&notice);
                    }
                    tokens.extend(chunk);
                }
                DiffResponse::Success { stats, .. } => return Ok((tokens, stats, warnings)),
                DiffResponse::Error { message, code, .. } => {
                    return Err(CompareError::from_worker(message, code));
                }
            }
        }
    }
}

fn build_side(
    name: &str,
    content: ExtractedContent,
    word_count: usize,
    flags: &[bool],
    groups: &[Option<String>],
) -> CompareSide {
    let visible = visible_tokens(&content.tokens, &content.metadata, flags);
    let highlights = HighlightIndex::build(&content.metadata, groups);
    CompareSide {
        name: name.to_string(),
        word_count,
        page_sizes: content.page_sizes,
        tokens: content.tokens,
        metadata: content.metadata,
        paragraphs: content.paragraphs,
        visible,
        highlights,
    }
}

/// Build a [`CompareResult`] from extracted content and the full tagged
/// stream (sentinels included)
#[must_use]
pub fn assemble_result(
    base: (&str, ExtractedContent),
    comparison: (&str, ExtractedContent),
    tokens: &[DiffToken],
    stats: WorkerStats,
    warnings: Vec<String>,
) -> CompareResult {
    let (base_name, base_content) = base;
    let (comparison_name, comparison_content) = comparison;

    let aggregation = build_changes(tokens, &base_content.metadata, &comparison_content.metadata);
    let totals = aggregate_totals(tokens);
    let (base_flags, comparison_flags) = highlight_flags(
        tokens,
        base_content.tokens.len(),
        comparison_content.tokens.len(),
    );

    CompareResult {
        base: build_side(
            base_name,
            base_content,
            stats.base_word_count,
            &base_flags,
            &aggregation.base_groups,
        ),
        comparison: build_side(
            comparison_name,
            comparison_content,
            stats.comparison_word_count,
            &comparison_flags,
            &aggregation.comparison_groups,
        ),
        totals: ResultTotals {
            added: totals.added,
            removed: totals.removed,
            unchanged: totals.unchanged,
            duration_ms: stats.duration_ms,
            processed_at: Utc::now(),
        },
        tokens: tokens.iter().filter(|t| !t.is_sentinel()).cloned().collect(),
        changes: aggregation.changes,
        warnings,
    }
}
