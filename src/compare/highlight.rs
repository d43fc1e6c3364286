//! Highlight geometry: rotation, rectangle merging and the page index

use std::collections::BTreeMap;

use super::types::{BoundingBox, HighlightEntry, Pane, TokenMetadata};

/// Gap (normalized units) under which two rectangles count as touching
pub const DEFAULT_MERGE_EPSILON: f32 = 0.004;

/// Pixel nudge that moves highlights from baseline placement onto the ink
pub const fn offset_pixels(pane: Pane) -> f32 {
    match pane {
        Pane::Base => 4.0,
        Pane::Comparison => 2.0,
    }
}

/// Normalize any rotation in degrees to 0, 90, 180 or 270
#[must_use]
pub fn normalize_rotation(degrees: i32) -> i32 {
    let r = degrees.rem_euclid(360);
    // snap to the nearest quarter turn
    ((r + 45) / 90 % 4) * 90
}

/// Map a rect from the unrotated page frame into the displayed frame
#[must_use]
pub fn rotate_rect(rect: &BoundingBox, rotation: i32) -> BoundingBox {
    let BoundingBox {
        left,
        top,
        width,
        height,
    } = *rect;
    match normalize_rotation(rotation) {
        90 => BoundingBox::new(1.0 - (top + height), left, height, width),
        180 => BoundingBox::new(1.0 - (left + width), 1.0 - (top + height), width, height),
        270 => BoundingBox::new(top, 1.0 - (left + width), height, width),
        _ => *rect,
    }
}

/// Normalized vertical offset for a pane, sign-flipped at 180 degrees
#[must_use]
pub fn vertical_offset(pane: Pane, container_height: f32, rotation: i32) -> f32 {
    if container_height <= 0.0 {
        return 0.0;
    }
    let offset = offset_pixels(pane) / container_height;
    if normalize_rotation(rotation) == 180 {
        -offset
    } else {
        offset
    }
}

/// Merge rectangles that overlap or touch within `epsilon`.
///
/// The result has no two touching rectangles, so merging it again is a
/// no-op. Output is sorted by `(top, left)`.
#[must_use]
pub fn merge_connected_rects(rects: &[BoundingBox], epsilon: f32) -> Vec<BoundingBox> {
    let mut sorted: Vec<BoundingBox> = rects.to_vec();
    sort_rects(&mut sorted);

    let mut merged: Vec<BoundingBox> = Vec::with_capacity(sorted.len());
    for rect in sorted {
        match merged.iter().position(|m| m.touches(&rect, epsilon)) {
            Some(idx) => {
                merged[idx] = merged[idx].union(&rect);
                absorb_neighbours(&mut merged, idx, epsilon);
            }
            None => merged.push(rect),
        }
    }

    sort_rects(&mut merged);
    merged
}

/// Fold every rect touching `merged[idx]` into it until nothing changes
fn absorb_neighbours(merged: &mut Vec<BoundingBox>, mut idx: usize, epsilon: f32) {
    loop {
        let other = (0..merged.len()).find(|&j| j != idx && merged[j].touches(&merged[idx], epsilon));
        let Some(j) = other else {
            return;
        };
        let absorbed = merged.remove(j);
        if j < idx {
            idx -= 1;
        }
        merged[idx] = merged[idx].union(&absorbed);
    }
}

fn sort_rects(rects: &mut [BoundingBox]) {
    rects.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));
}

/// Page to highlight entries for one side of a comparison
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HighlightIndex {
    pages: BTreeMap<usize, Vec<HighlightEntry>>,
}

impl HighlightIndex {
    /// Collect the boxes of every grouped token
    #[must_use]
    pub fn build(metadata: &[TokenMetadata], groups: &[Option<String>]) -> Self {
        let mut pages: BTreeMap<usize, Vec<HighlightEntry>> = BTreeMap::new();
        for (meta, group) in metadata.iter().zip(groups) {
            if let (Some(bbox), Some(group_id)) = (meta.bbox, group) {
                pages.entry(meta.page).or_default().push(HighlightEntry {
                    rect: bbox,
                    group_id: group_id.clone(),
                });
            }
        }
        Self { pages }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Raw token entries on `page`
    #[must_use]
    pub fn entries(&self, page: usize) -> &[HighlightEntry] {
        self.pages.get(&page).map_or(&[][..], Vec::as_slice)
    }

    pub fn pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages.keys().copied()
    }

    /// Merged, rotated and offset highlights for a rendered page
    #[must_use]
    pub fn page_highlights(
        &self,
        page: usize,
        rotation: i32,
        offset: f32,
        epsilon: f32,
    ) -> Vec<HighlightEntry> {
        let mut order: Vec<&str> = Vec::new();
        let mut grouped: BTreeMap<&str, Vec<BoundingBox>> = BTreeMap::new();
        for entry in self.entries(page) {
            let rects = grouped.entry(entry.group_id.as_str()).or_insert_with(|| {
                order.push(entry.group_id.as_str());
                Vec::new()
            });
            rects.push(rotate_rect(&entry.rect, rotation));
        }

        order
            .into_iter()
            .flat_map(|group_id| {
                let rects = grouped.get(group_id).map_or(&[][..], Vec::as_slice);
                merge_connected_rects(rects, epsilon)
                    .into_iter()
                    .map(move |mut rect| {
                        rect.top += offset;
                        HighlightEntry {
                            rect,
                            group_id: group_id.to_string(),
                        }
                    })
            })
            .collect()
    }

    /// Every fragment of a change group, as `(page, rect)` in the
    /// unrotated frame
    #[must_use]
    pub fn fragments(&self, group_id: &str) -> Vec<(usize, BoundingBox)> {
        self.pages
            .iter()
            .flat_map(|(page, entries)| {
                entries
                    .iter()
                    .filter(move |e| e.group_id == group_id)
                    .map(move |e| (*page, e.rect))
            })
            .collect()
    }
}
