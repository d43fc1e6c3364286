//! Jump-to-change: scroll, wait for highlights to mount, center and flash

use std::collections::BTreeMap;

use log::{debug, warn};

use super::state::{Command, Effect, Size, SyncController};
use crate::compare::{CompareChange, HighlightIndex, Pane, vertical_offset};
use crate::settings;

/// Frames to wait for a change's highlights to mount
pub const MAX_NAVIGATION_ATTEMPTS: u32 = 30;
/// How long a navigated change stays emphasized
pub const FLASH_DURATION_MS: u64 = 1600;

/// Rectangle in scroll-content pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = (self.left + self.width).max(other.left + other.width);
        let bottom = (self.top + self.height).max(other.top + other.height);
        Self::new(left, top, right - left, bottom - top)
    }

    /// Bounding rect of every rect, `None` when empty
    pub fn union_all(rects: &[Self]) -> Option<Self> {
        let (first, rest) = rects.split_first()?;
        Some(rest.iter().fold(*first, |acc, r| acc.union(r)))
    }
}

/// Finds the currently mounted highlight fragments of a change group
pub trait HighlightLocator {
    fn locate(&self, pane: Pane, group_id: &str) -> Vec<PixelRect>;
}

/// Where a navigation request points
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationTarget {
    pub pane: Pane,
    pub group_id: String,
    /// Page to scroll to while the highlights are not mounted
    pub page: Option<usize>,
}

impl NavigationTarget {
    /// Target for `change` in `pane`; `None` if the change has no text there
    #[must_use]
    pub fn for_change(change: &CompareChange, pane: Pane) -> Option<Self> {
        let side = match pane {
            Pane::Base => change.base.as_ref(),
            Pane::Comparison => change.comparison.as_ref(),
        };
        side.map(|_| Self {
            pane,
            group_id: change.id.clone(),
            page: change.page_for(pane),
        })
    }
}

#[derive(Clone, Debug)]
struct Pending {
    target: NavigationTarget,
    attempts: u32,
}

/// Drives a navigation across animation frames
#[derive(Clone, Debug, Default)]
pub struct ChangeNavigator {
    pending: Option<Pending>,
}

impl ChangeNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Start navigating to `target`, replacing any navigation in flight
    pub fn navigate(
        &mut self,
        target: NavigationTarget,
        sync: &mut SyncController,
        locator: &dyn HighlightLocator,
    ) -> Vec<Effect> {
        debug!(
            "Navigating to {} in {} pane",
            target.group_id,
            target.pane.as_str()
        );
        self.pending = Some(Pending {
            target,
            attempts: 0,
        });
        self.resolve(sync, locator)
    }

    /// Retry a pending navigation; call once per animation frame
    pub fn on_frame(
        &mut self,
        sync: &mut SyncController,
        locator: &dyn HighlightLocator,
    ) -> Vec<Effect> {
        if self.pending.is_none() {
            return Vec::new();
        }
        self.resolve(sync, locator)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    fn resolve(
        &mut self,
        sync: &mut SyncController,
        locator: &dyn HighlightLocator,
    ) -> Vec<Effect> {
        let Some(pending) = self.pending.as_mut() else {
            return Vec::new();
        };
        let pane = pending.target.pane;
        let rects = locator.locate(pane, &pending.target.group_id);

        if let Some(rect) = PixelRect::union_all(&rects) {
            let Some(done) = self.pending.take() else {
                return Vec::new();
            };
            let mut effects = sync.apply(Command::CenterOn { pane, rect });
            effects.push(Effect::Flash {
                pane,
                group_id: done.target.group_id,
                duration_ms: FLASH_DURATION_MS,
            });
            return effects;
        }

        let mut effects = Vec::new();
        if pending.attempts == 0 {
            if let Some(page) = pending.target.page {
                effects = sync.apply(Command::ScrollToPage { pane, page });
            }
        }
        pending.attempts += 1;
        if pending.attempts >= MAX_NAVIGATION_ATTEMPTS {
            warn!(
                "Highlights for {} never mounted, giving up",
                pending.target.group_id
            );
            self.pending = None;
        }
        effects
    }
}

/// Highlights of the pages currently rendered, in scroll-content pixels
#[derive(Clone, Debug)]
pub struct MountedHighlights {
    pages: BTreeMap<(Pane, usize), Vec<(String, PixelRect)>>,
    epsilon: f32,
}

impl Default for MountedHighlights {
    fn default() -> Self {
        Self::with_epsilon(settings::get_highlight_epsilon())
    }
}

impl MountedHighlights {
    /// Merges rectangles with the configured highlight epsilon
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_epsilon(epsilon: f32) -> Self {
        Self {
            pages: BTreeMap::new(),
            epsilon: epsilon.max(0.0),
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Mount the highlights of `page`, whose image starts at `page_top`
    /// and is drawn at `size`
    pub fn mount_page(
        &mut self,
        pane: Pane,
        page: usize,
        page_top: f32,
        size: Size,
        rotation: i32,
        index: &HighlightIndex,
    ) {
        let offset = vertical_offset(pane, size.height, rotation);
        let rects = index
            .page_highlights(page, rotation, offset, self.epsilon)
            .into_iter()
            .map(|entry| {
                let rect = PixelRect::new(
                    entry.rect.left * size.width,
                    page_top + entry.rect.top * size.height,
                    entry.rect.width * size.width,
                    entry.rect.height * size.height,
                );
                (entry.group_id, rect)
            })
            .collect();
        self.pages.insert((pane, page), rects);
    }

    pub fn unmount_page(&mut self, pane: Pane, page: usize) {
        self.pages.remove(&(pane, page));
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn is_mounted(&self, pane: Pane, page: usize) -> bool {
        self.pages.contains_key(&(pane, page))
    }
}

impl HighlightLocator for MountedHighlights {
    fn locate(&self, pane: Pane, group_id: &str) -> Vec<PixelRect> {
        self.pages
            .iter()
            .filter(|((p, _), _)| *p == pane)
            .flat_map(|(_, rects)| rects.iter())
            .filter(|(id, _)| id == group_id)
            .map(|(_, rect)| *rect)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{BoundingBox, ChangeSide, TokenMetadata};

    struct Never;

    impl HighlightLocator for Never {
        fn locate(&self, _pane: Pane, _group_id: &str) -> Vec<PixelRect> {
            Vec::new()
        }
    }

    fn change() -> CompareChange {
        CompareChange {
            id: "change-3".to_string(),
            base: None,
            comparison: Some(ChangeSide {
                text: "new words".to_string(),
                page: Some(2),
                paragraph: Some(0),
            }),
        }
    }

    #[test]
    fn union_covers_all_rects() {
        let rects = [
            PixelRect::new(10.0, 10.0, 5.0, 5.0),
            PixelRect::new(0.0, 30.0, 5.0, 5.0),
        ];
        assert_eq!(
            PixelRect::union_all(&rects),
            Some(PixelRect::new(0.0, 10.0, 15.0, 25.0))
        );
        assert_eq!(PixelRect::union_all(&[]), None);
    }

    #[test]
    fn target_requires_text_in_pane() {
        assert!(NavigationTarget::for_change(&change(), Pane::Base).is_none());
        let target = NavigationTarget::for_change(&change(), Pane::Comparison).unwrap();
        assert_eq!(target.page, Some(2));
        assert_eq!(target.group_id, "change-3");
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let mut sync = SyncController::default();
        let mut nav = ChangeNavigator::new();
        let target = NavigationTarget::for_change(&change(), Pane::Comparison).unwrap();
        let _ = nav.navigate(target, &mut sync, &Never);
        for _ in 1..MAX_NAVIGATION_ATTEMPTS {
            assert!(nav.is_pending());
            assert!(nav.on_frame(&mut sync, &Never).is_empty());
        }
        assert!(!nav.is_pending());
    }

    #[test]
    fn mounted_highlights_are_located_in_pixels() {
        let metadata = [TokenMetadata {
            page: 2,
            paragraph: 0,
            bbox: Some(BoundingBox::new(0.1, 0.5, 0.2, 0.1)),
        }];
        let index = HighlightIndex::build(&metadata, &[Some("change-3".to_string())]);
        let mut mounted = MountedHighlights::new();
        mounted.mount_page(
            Pane::Comparison,
            2,
            1000.0,
            Size::new(500.0, 200.0),
            0,
            &index,
        );

        let rects = mounted.locate(Pane::Comparison, "change-3");
        assert_eq!(rects.len(), 1);
        let rect = rects[0];
        assert!((rect.left - 50.0).abs() < 1e-3);
        // 2 px nudge for the comparison pane
        assert!((rect.top - 1102.0).abs() < 1e-3);
        assert!(mounted.locate(Pane::Base, "change-3").is_empty());

        mounted.unmount_page(Pane::Comparison, 2);
        assert!(mounted.locate(Pane::Comparison, "change-3").is_empty());
    }

    #[test]
    fn wider_epsilon_merges_nearby_words() {
        // two words 0.01 apart on one line
        let metadata = [
            TokenMetadata {
                page: 1,
                paragraph: 0,
                bbox: Some(BoundingBox::new(0.1, 0.2, 0.1, 0.02)),
            },
            TokenMetadata {
                page: 1,
                paragraph: 0,
                bbox: Some(BoundingBox::new(0.21, 0.2, 0.1, 0.02)),
            },
        ];
        let groups = [Some("change-4".to_string()), Some("change-4".to_string())];
        let index = HighlightIndex::build(&metadata, &groups);

        let count = |epsilon: f32| {
            let mut mounted = MountedHighlights::with_epsilon(epsilon);
            mounted.mount_page(Pane::Base, 1, 0.0, Size::new(500.0, 500.0), 0, &index);
            mounted.locate(Pane::Base, "change-4").len()
        };
        assert_eq!(count(0.004), 2);
        assert_eq!(count(0.02), 1);
    }
}
