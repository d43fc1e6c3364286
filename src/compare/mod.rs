//! Document comparison engine

mod aggregate;
mod chunked;
mod extract;
mod highlight;
mod lcs;
mod measure;
#[cfg(feature = "pdf")]
mod mupdf_source;
mod operation;
mod preview;
mod request;
mod service;
mod summary;
mod text;
mod types;
mod worker;

pub use aggregate::{
    Aggregation, GroupMap, VisibleToken, aggregate_totals, build_changes, highlight_flags,
    visible_tokens,
};
pub use chunked::{ChunkOptions, EarlyStop, RuntimeStop, chunked_edits, sampled_similarity};
pub use extract::{
    DEFAULT_PARAGRAPH_GAP, ExtractOptions, FontSpec, PageSource, PageText, TextExtractor, TextRun,
};
pub use highlight::{
    DEFAULT_MERGE_EPSILON, HighlightIndex, merge_connected_rects, normalize_rotation,
    offset_pixels, rotate_rect, vertical_offset,
};
pub use lcs::{Edit, diff_tokens, edit_script, lcs_len};
pub use measure::{GlyphMeasure, MeasureCache, NoMeasure};
#[cfg(feature = "pdf")]
pub use mupdf_source::{MupdfRenderer, MupdfSource, PdfFile};
pub use operation::{
    CancelHandle, CompareObserver, CompareOperation, CompareResult, CompareSide, DocumentInput,
    EARLY_NOTICE_DIFF_RATIO, EARLY_NOTICE_MIN_TOKENS, LONG_RUNNING_PAGE_THRESHOLD, NoopObserver,
    Notice, OperationConfig, OperationStatus, ResultTotals, assemble_result,
};
pub use preview::{PageRenderer, PreviewStore};
pub use request::{
    ComparePayload, DiffConfig, DiffRequest, DiffResponse, DiffSettings, RequestId, WorkerStats,
    WorkerWarnings,
};
pub use service::DiffService;
pub use summary::{summary_file_name, summary_json, write_summary};
pub use text::{append_word, normalize_text, tokenize_run};
pub use types::*;
pub use worker::{diff_worker, run_compare};
