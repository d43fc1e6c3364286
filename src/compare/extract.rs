//! Word-level text extraction with per-token geometry

use log::{debug, warn};

use super::measure::{GlyphMeasure, MeasureCache, NoMeasure};
use super::text::{append_word, tokenize_run};
use super::types::{
    BoundingBox, CompareParagraph, ExtractedContent, PARAGRAPH_SENTINEL, PageSize, TokenMetadata,
};
use crate::error::{CompareError, Result};

/// Baseline jump (page units) that starts a new paragraph
pub const DEFAULT_PARAGRAPH_GAP: f32 = 6.0;

const MIN_WIDTH: f32 = 0.004;
const MIN_HORIZONTAL_PAD: f32 = 0.0012;
const HORIZONTAL_PAD_RATIO: f32 = 0.12;
const MIN_VERTICAL_PAD: f32 = 0.0008;
const VERTICAL_PAD_RATIO: f32 = 0.18;

const DEFAULT_ASCENT: f32 = 0.9;
const DEFAULT_DESCENT: f32 = 0.2;

/// Font information attached to a text run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FontSpec {
    pub name: String,
    pub size: f32,
    /// Ascent as a fraction of the em size
    pub ascent: Option<f32>,
    /// Descent as a fraction of the em size, sign ignored
    pub descent: Option<f32>,
}

impl FontSpec {
    /// Vertical shrink factor from ascent and descent ratios
    #[must_use]
    pub fn vertical_scale(&self) -> f32 {
        let ascent = self
            .ascent
            .filter(|a| a.is_finite())
            .map_or(DEFAULT_ASCENT, |a| a.clamp(0.7, 1.1));
        let descent = self
            .descent
            .filter(|d| d.is_finite())
            .map_or(DEFAULT_DESCENT, |d| d.abs().clamp(0.0, 0.5));
        (ascent + descent).clamp(0.75, 1.0)
    }
}

/// A positioned run of text in page viewport coordinates (y grows downward)
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Start of the baseline
    pub origin: (f32, f32),
    /// Unit vector along the baseline
    pub direction: (f32, f32),
    /// Advance along the baseline
    pub width: f32,
    /// Extent perpendicular to the baseline
    pub height: f32,
    pub font: FontSpec,
    /// The run ends a line or block
    pub hard_break: bool,
    /// Per-char advances, when the source already knows them
    pub advances: Option<Vec<f32>>,
}

impl TextRun {
    /// Horizontal run starting at `origin`
    pub fn horizontal(text: impl Into<String>, origin: (f32, f32), width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            origin,
            direction: (1.0, 0.0),
            width,
            height,
            font: FontSpec::default(),
            hard_break: false,
            advances: None,
        }
    }

    #[must_use]
    pub fn with_hard_break(mut self) -> Self {
        self.hard_break = true;
        self
    }

    /// Direction normalized to unit length, or `None` if degenerate
    fn unit_direction(&self) -> Option<(f32, f32)> {
        let (dx, dy) = self.direction;
        let len = dx.hypot(dy);
        (len.is_finite() && len > 1e-6).then(|| (dx / len, dy / len))
    }
}

/// Text and geometry of a single page
#[derive(Clone, Debug, Default)]
pub struct PageText {
    pub size: PageSize,
    pub runs: Vec<TextRun>,
}

/// A document that can be walked page by page
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Runs and viewport size for page `index` (0-based)
    fn page_text(&self, index: usize) -> Result<PageText>;
}

/// Extraction tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractOptions {
    pub paragraph_gap: f32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            paragraph_gap: DEFAULT_PARAGRAPH_GAP,
        }
    }
}

/// Walks a [`PageSource`] and produces tokens with metadata
pub struct TextExtractor {
    options: ExtractOptions,
    measure: Box<dyn GlyphMeasure + Send>,
    cache: MeasureCache,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

/// Per-page segmentation state
struct PageCursor {
    page: usize,
    paragraph: usize,
    buffer: String,
    /// Tokens were emitted since the last sentinel
    open: bool,
    prev: Option<((f32, f32), (f32, f32))>,
}

impl PageCursor {
    fn new(page: usize) -> Self {
        Self {
            page,
            paragraph: 1,
            buffer: String::new(),
            open: false,
            prev: None,
        }
    }

    fn close_paragraph(&mut self, out: &mut ExtractedContent) {
        let text = self.buffer.trim();
        if !text.is_empty() {
            out.paragraphs.push(CompareParagraph {
                page: self.page,
                paragraph: self.paragraph,
                text: text.to_string(),
            });
        }
        self.buffer.clear();
        self.open = false;
        out.tokens.push(PARAGRAPH_SENTINEL.to_string());
        out.metadata.push(TokenMetadata {
            page: self.page,
            paragraph: self.paragraph,
            bbox: None,
        });
        self.paragraph += 1;
    }
}

impl TextExtractor {
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            measure: Box::new(NoMeasure),
            cache: MeasureCache::default(),
        }
    }

    #[must_use]
    pub fn with_measure(mut self, measure: Box<dyn GlyphMeasure + Send>) -> Self {
        self.measure = measure;
        self.cache.clear();
        self
    }

    /// Extract every page of `source`
    pub fn extract(&mut self, source: &dyn PageSource) -> Result<ExtractedContent> {
        self.extract_until(source, || false)
    }

    /// Extract every page of `source`, checking `should_stop` between pages
    pub fn extract_until(
        &mut self,
        source: &dyn PageSource,
        should_stop: impl Fn() -> bool,
    ) -> Result<ExtractedContent> {
        let mut out = ExtractedContent::default();
        let page_count = source.page_count();

        for index in 0..page_count {
            if should_stop() {
                return Err(CompareError::Cancelled);
            }
            match source.page_text(index) {
                Ok(page) => self.extract_page(index + 1, &page, &mut out),
                Err(err) => {
                    warn!("Failed to read text of page {}: {err}", index + 1);
                    out.page_sizes.push(PageSize::default());
                }
            }
        }

        debug!(
            "Extracted {} tokens ({} words) from {page_count} pages",
            out.tokens.len(),
            out.word_count()
        );
        Ok(out)
    }

    fn extract_page(&mut self, page: usize, text: &PageText, out: &mut ExtractedContent) {
        out.page_sizes.push(text.size);
        let mut cursor = PageCursor::new(page);

        for run in &text.runs {
            if run.text.is_empty() {
                cursor.prev = None;
                continue;
            }

            if cursor.open && self.baseline_jumped(&cursor, run) {
                cursor.close_paragraph(out);
            }
            self.emit_run(run, text.size, &mut cursor, out);
            if run.hard_break && cursor.open {
                cursor.close_paragraph(out);
            }
            cursor.prev = run.unit_direction().map(|dir| (run.origin, dir));
        }

        if cursor.open {
            cursor.close_paragraph(out);
        }
    }

    fn baseline_jumped(&self, cursor: &PageCursor, run: &TextRun) -> bool {
        let Some(((px, py), (dx, dy))) = cursor.prev else {
            return false;
        };
        // distance along the previous run's normal
        let jump = ((run.origin.0 - px) * -dy + (run.origin.1 - py) * dx).abs();
        jump > self.options.paragraph_gap
    }

    fn weights(&mut self, run: &TextRun, chars: &[char]) -> Vec<f32> {
        if let Some(advances) = run.advances.as_ref().filter(|a| a.len() == chars.len()) {
            return advances
                .iter()
                .zip(chars)
                .map(|(w, ch)| {
                    if w.is_finite() && *w > 0.0 {
                        *w
                    } else {
                        self.cache.width(&NoMeasure, &run.font.name, *ch)
                    }
                })
                .collect();
        }
        chars
            .iter()
            .map(|ch| self.cache.width(self.measure.as_ref(), &run.font.name, *ch))
            .collect()
    }

    fn emit_run(
        &mut self,
        run: &TextRun,
        size: PageSize,
        cursor: &mut PageCursor,
        out: &mut ExtractedContent,
    ) {
        let tokens = tokenize_run(&run.text);
        if tokens.is_empty() {
            return;
        }

        let chars: Vec<char> = run.text.chars().collect();
        let weights = self.weights(run, &chars);
        let mut prefix = Vec::with_capacity(weights.len() + 1);
        prefix.push(0.0f32);
        for w in &weights {
            let last = prefix.last().copied().unwrap_or(0.0);
            prefix.push(last + w);
        }
        let total = prefix.last().copied().filter(|t| *t > 0.0).unwrap_or(1.0);
        let geometry = RunGeometry::new(run, size);

        for token in tokens {
            let rel_start = prefix[token.start] / total;
            let rel_end = prefix[token.end] / total;
            let bbox = geometry
                .as_ref()
                .and_then(|g| g.token_box(rel_start, rel_end, run.font.vertical_scale()));

            append_word(&mut cursor.buffer, &token.text);
            cursor.open = true;
            out.tokens.push(token.text);
            out.metadata.push(TokenMetadata {
                page: cursor.page,
                paragraph: cursor.paragraph,
                bbox,
            });
        }
    }
}

/// Baseline and vertical vectors of a run, in viewport units
struct RunGeometry {
    start: (f32, f32),
    baseline: (f32, f32),
    vertical: (f32, f32),
    page: PageSize,
}

impl RunGeometry {
    fn new(run: &TextRun, page: PageSize) -> Option<Self> {
        if !(page.width > 0.0 && page.height > 0.0) {
            return None;
        }
        let (dx, dy) = run.unit_direction()?;
        if !(run.width.is_finite() && run.height.is_finite()) || run.width <= 1e-6 || run.height <= 1e-6 {
            return None;
        }
        Some(Self {
            start: run.origin,
            baseline: (dx * run.width, dy * run.width),
            // "up" from the baseline in a y-down frame
            vertical: (dy * run.height, -dx * run.height),
            page,
        })
    }

    fn token_box(&self, rel_start: f32, rel_end: f32, vertical_scale: f32) -> Option<BoundingBox> {
        let seg_start = (
            self.start.0 + self.baseline.0 * rel_start,
            self.start.1 + self.baseline.1 * rel_start,
        );
        let seg_end = (
            self.start.0 + self.baseline.0 * rel_end,
            self.start.1 + self.baseline.1 * rel_end,
        );
        let corners = [
            seg_start,
            (seg_start.0 + self.vertical.0, seg_start.1 + self.vertical.1),
            (seg_end.0 + self.vertical.0, seg_end.1 + self.vertical.1),
            seg_end,
        ];

        let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return None;
        }

        let left = clamp_unit(min_x / self.page.width);
        let right = clamp_unit(max_x / self.page.width);
        let mut top = clamp_unit(min_y / self.page.height);
        let mut bottom = clamp_unit(max_y / self.page.height);

        let height = (bottom - top).max(0.0);
        if height > 0.0 && vertical_scale < 1.0 {
            let mid = (top + bottom) / 2.0;
            let half = height * vertical_scale / 2.0;
            top = clamp_unit(mid - half);
            bottom = clamp_unit(mid + half);
        }

        pad_box(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Grow a normalized box outward and clamp it to the unit square
pub(crate) fn pad_box(left: f32, top: f32, width: f32, height: f32) -> Option<BoundingBox> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let h_pad = (width * HORIZONTAL_PAD_RATIO).max(MIN_HORIZONTAL_PAD);
    let v_pad = (height * VERTICAL_PAD_RATIO).max(MIN_VERTICAL_PAD);

    let mut l = left - h_pad;
    let mut r = left + width + h_pad;
    if r - l < MIN_WIDTH {
        let deficit = MIN_WIDTH - (r - l);
        l -= deficit / 2.0;
        r += deficit / 2.0;
    }

    BoundingBox::from_edges(
        clamp_unit(l),
        clamp_unit(top - v_pad),
        clamp_unit(r),
        clamp_unit(top + height + v_pad),
    )
}
