//! Row tables that pair the pages of both panes for scroll mapping

use crate::compare::{PagePreview, Pane};

/// Labels and padding each row carries on top of the page image
pub const DEFAULT_ROW_STRUCTURAL_EXTRA: f32 = 32.0;
/// Gap between consecutive rows
pub const DEFAULT_ROW_GAP: f32 = 8.0;

/// One row of the paired layout
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Row {
    pub page_number: usize,
    /// Max page height of the pair
    pub canonical_height: f32,
    pub has_base: bool,
    pub has_comparison: bool,
}

/// Per-side row heights and their prefix sums.
///
/// Pages are paired by page number and each row is as tall as the taller
/// page of the pair plus the structural extra; every row but the last adds
/// the row gap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowLayout {
    rows: Vec<Row>,
    base: Vec<f32>,
    comparison: Vec<f32>,
    base_prefix: Vec<f32>,
    comparison_prefix: Vec<f32>,
}

fn prefix_sums(heights: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(heights.len() + 1);
    out.push(0.0);
    let mut total = 0.0;
    for h in heights {
        total += h;
        out.push(total);
    }
    out
}

impl RowLayout {
    #[must_use]
    pub fn build(
        base: &[PagePreview],
        comparison: &[PagePreview],
        structural_extra: f32,
        row_gap: f32,
    ) -> Self {
        let mut numbers: Vec<usize> = base
            .iter()
            .chain(comparison)
            .map(|p| p.page_number)
            .collect();
        numbers.sort_unstable();
        numbers.dedup();

        let height_of = |pages: &[PagePreview], n: usize| {
            pages.iter().find(|p| p.page_number == n).map(|p| p.height)
        };

        let rows: Vec<Row> = numbers
            .into_iter()
            .map(|page_number| {
                let b = height_of(base, page_number);
                let c = height_of(comparison, page_number);
                Row {
                    page_number,
                    canonical_height: b.unwrap_or(0.0).max(c.unwrap_or(0.0)),
                    has_base: b.is_some(),
                    has_comparison: c.is_some(),
                }
            })
            .collect();

        let last = rows.len().saturating_sub(1);
        let mut base_heights = Vec::with_capacity(rows.len());
        let mut comparison_heights = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let structural = (row.canonical_height.round() + structural_extra).round().max(0.0);
            let gap = if index < last { row_gap } else { 0.0 };
            // a side missing this page still renders a placeholder row
            base_heights.push(structural + gap);
            comparison_heights.push(structural + gap);
        }

        Self {
            rows,
            base_prefix: prefix_sums(&base_heights),
            comparison_prefix: prefix_sums(&comparison_heights),
            base: base_heights,
            comparison: comparison_heights,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn heights(&self, pane: Pane) -> &[f32] {
        match pane {
            Pane::Base => &self.base,
            Pane::Comparison => &self.comparison,
        }
    }

    pub fn prefix(&self, pane: Pane) -> &[f32] {
        match pane {
            Pane::Base => &self.base_prefix,
            Pane::Comparison => &self.comparison_prefix,
        }
    }

    /// Full content height of a pane
    pub fn total_height(&self, pane: Pane) -> f32 {
        self.prefix(pane).last().copied().unwrap_or(0.0)
    }

    /// Index of the row containing offset `top`
    pub fn row_at(&self, pane: Pane, top: f32) -> usize {
        let heights = self.heights(pane);
        if heights.is_empty() {
            return 0;
        }
        let prefix = &self.prefix(pane)[..heights.len()];
        prefix.partition_point(|p| *p <= top).saturating_sub(1)
    }

    /// Offset of the row holding `page_number`
    pub fn page_top(&self, pane: Pane, page_number: usize) -> Option<f32> {
        let index = self.rows.iter().position(|r| r.page_number == page_number)?;
        self.prefix(pane).get(index).copied()
    }

    /// Page whose row centre is closest to `middle`
    pub fn page_nearest(&self, pane: Pane, middle: f32) -> Option<usize> {
        let heights = self.heights(pane);
        let prefix = self.prefix(pane);
        heights
            .iter()
            .enumerate()
            .map(|(i, h)| (i, (prefix[i] + h / 2.0 - middle).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .and_then(|(i, _)| self.rows.get(i).map(|r| r.page_number))
    }

    /// Map a scroll offset in `source` to the matching offset in its peer.
    ///
    /// The fractional position within the source row is reapplied to the
    /// same row on the other side.
    pub fn map_scroll_top(&self, source_top: f32, source: Pane) -> f32 {
        let src = self.heights(source);
        let dst = self.heights(source.peer());
        if src.is_empty() || dst.is_empty() {
            return source_top;
        }
        let src_prefix = self.prefix(source);
        let dst_prefix = self.prefix(source.peer());

        let src_max = (self.total_height(source) - 1.0).max(0.0);
        let top = source_top.floor().clamp(0.0, src_max);
        let i = self.row_at(source, top);
        let within = top - src_prefix[i];
        let frac = if src[i] > 0.0 { within / src[i] } else { 0.0 };

        let j = i.min(dst.len() - 1);
        let dst_height = if dst[j] > 0.0 { dst[j] } else { 1.0 };
        dst_prefix[j] + frac * dst_height
    }
}
