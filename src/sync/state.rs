//! Scroll, pan and zoom state for the two comparison panes

use log::debug;

use super::layout::{DEFAULT_ROW_GAP, DEFAULT_ROW_STRUCTURAL_EXTRA, RowLayout};
use super::navigation::PixelRect;
use super::pan::{
    EdgeScroll, Pan, PanBounds, map_pan_between, max_canvas_size, past_dead_zone,
    vertical_overflow,
};
use super::zoom::{WheelAccumulator, Zoom, pinch_zoom};
use crate::compare::{PagePreview, Pane, normalize_rotation};

/// Writes closer than this to the current offset are skipped
const SCROLL_EPSILON: f32 = 0.5;

/// Tuning for gestures and the row layout
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncOptions {
    pub row_structural_extra: f32,
    pub row_gap: f32,
    pub zoom_step: f32,
    pub wheel_threshold: f32,
    pub pinch_damping: f32,
    pub overscroll_dead_zone: f32,
    pub overscroll_step: f32,
    pub key_step: f32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            row_structural_extra: DEFAULT_ROW_STRUCTURAL_EXTRA,
            row_gap: DEFAULT_ROW_GAP,
            zoom_step: Zoom::STEP,
            wheel_threshold: WheelAccumulator::DEFAULT_THRESHOLD,
            pinch_damping: 0.6,
            overscroll_dead_zone: 32.0,
            overscroll_step: 48.0,
            key_step: 80.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// How the two panes are arranged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Layout {
    #[default]
    SideBySide,
    Stacked,
}

impl Layout {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::SideBySide => Self::Stacked,
            Self::Stacked => Self::SideBySide,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowKey {
    Up,
    Down,
}

/// Pointer gesture in progress
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    Panning {
        pane: Pane,
        start: (f32, f32),
        start_pan: Pan,
    },
    Pinching {
        pane: Pane,
        start_distance: f32,
        start_zoom: f32,
    },
}

/// Pixel offsets captured when linking is turned on, added to every mapped
/// scroll so linking never moves either pane
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinkAnchors {
    pub base_to_comparison: f32,
    pub comparison_to_base: f32,
}

impl LinkAnchors {
    #[must_use]
    pub fn from(&self, source: Pane) -> f32 {
        match source {
            Pane::Base => self.base_to_comparison,
            Pane::Comparison => self.comparison_to_base,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct PaneState {
    pages: Vec<PagePreview>,
    zoom: Zoom,
    pan: Pan,
    scroll_top: f32,
    viewport: Size,
    content_height: Option<f32>,
    canvas: Option<Size>,
    /// A programmatic write is in flight; its scroll echo must not sync
    guard: bool,
    wheel: WheelAccumulator,
    edge: EdgeScroll,
    visible_page: Option<usize>,
}

/// Commands from the host view
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Rendered pages of a pane changed
    SetPages { pane: Pane, pages: Vec<PagePreview> },
    /// Viewport size, and the scrollable content height when measured
    Resize {
        pane: Pane,
        viewport: Size,
        content_height: Option<f32>,
    },
    /// Measured size of the page canvas
    SetCanvasSize { pane: Pane, size: Size },
    /// The pane's scroll offset changed, by the user or as an echo
    Scrolled { pane: Pane, top: f32 },
    SetLinked(bool),
    ToggleLayout,
    SetZoom { pane: Pane, zoom: f32 },
    Wheel { pane: Pane, delta_y: f32, ctrl: bool },
    PanStart { pane: Pane, x: f32, y: f32 },
    PanMove { x: f32, y: f32 },
    PanEnd,
    PinchStart { pane: Pane, distance: f32 },
    PinchMove { distance: f32 },
    PinchEnd,
    Key(ArrowKey),
    ScrollToPage { pane: Pane, page: usize },
    /// Center the viewport on a rect in scroll-content pixels
    CenterOn { pane: Pane, rect: PixelRect },
    /// Next animation frame
    FrameTick,
}

/// Writes the host must perform
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    ScrollTo { pane: Pane, top: f32 },
    ScrollToPoint { pane: Pane, top: f32, left: f32 },
    SetZoom { pane: Pane, zoom: f32 },
    SetPan { pane: Pane, pan: Pan },
    PanModeChanged(bool),
    LinkChanged(bool),
    LayoutChanged(Layout),
    VisiblePageChanged { pane: Pane, page: usize },
    /// Briefly emphasize every fragment of a change
    Flash {
        pane: Pane,
        group_id: String,
        duration_ms: u64,
    },
}

/// Single-threaded state machine behind the side-by-side viewer
#[derive(Clone, Debug)]
pub struct SyncController {
    options: SyncOptions,
    panes: [PaneState; 2],
    rows: RowLayout,
    linked: bool,
    anchors: LinkAnchors,
    pan_mode: bool,
    gesture: Gesture,
    last_active: Pane,
    layout: Layout,
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new(SyncOptions::default())
    }
}

impl SyncController {
    #[must_use]
    pub fn new(options: SyncOptions) -> Self {
        let pane = PaneState {
            wheel: WheelAccumulator::new(options.wheel_threshold),
            ..PaneState::default()
        };
        Self {
            options,
            panes: [pane.clone(), pane],
            rows: RowLayout::default(),
            linked: true,
            anchors: LinkAnchors::default(),
            pan_mode: false,
            gesture: Gesture::Idle,
            last_active: Pane::Base,
            layout: Layout::default(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn rows(&self) -> &RowLayout {
        &self.rows
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn is_pan_mode(&self) -> bool {
        self.pan_mode
    }

    pub fn anchors(&self) -> LinkAnchors {
        self.anchors
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn zoom(&self, pane: Pane) -> f32 {
        self.pane(pane).zoom.factor()
    }

    pub fn pan(&self, pane: Pane) -> Pan {
        self.pane(pane).pan
    }

    pub fn scroll_top(&self, pane: Pane) -> f32 {
        self.pane(pane).scroll_top
    }

    pub fn visible_page(&self, pane: Pane) -> Option<usize> {
        self.pane(pane).visible_page
    }

    pub fn pages(&self, pane: Pane) -> &[PagePreview] {
        &self.pane(pane).pages
    }

    fn pane(&self, pane: Pane) -> &PaneState {
        &self.panes[pane.index()]
    }

    fn pane_mut(&mut self, pane: Pane) -> &mut PaneState {
        &mut self.panes[pane.index()]
    }

    /// Largest valid scroll offset of a pane
    pub fn max_scroll(&self, pane: Pane) -> f32 {
        let state = self.pane(pane);
        let content = state
            .content_height
            .unwrap_or_else(|| self.rows.total_height(pane));
        (content - state.viewport.height).max(0.0)
    }

    /// Rotation of a pane, taken from its first page
    pub fn rotation(&self, pane: Pane) -> i32 {
        self.pane(pane)
            .pages
            .first()
            .map_or(0, |p| normalize_rotation(p.rotation))
    }

    /// Pan bounds of a pane at `zoom`
    pub fn pan_bounds(&self, pane: Pane, zoom: f32) -> PanBounds {
        let (width, height) = match self.pane(pane).canvas {
            Some(size) => (size.width, size.height),
            None => max_canvas_size(&self.pane(pane).pages, &self.pane(pane.peer()).pages),
        };
        PanBounds::for_canvas(width, height, zoom)
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        let mut effects = Vec::new();
        match cmd {
            Command::SetPages { pane, pages } => {
                self.pane_mut(pane).pages = pages;
                self.rebuild_rows();
                if self.linked {
                    self.reapply_link(&mut effects);
                }
                self.track_visible(Pane::Base, &mut effects);
                self.track_visible(Pane::Comparison, &mut effects);
            }

            Command::Resize {
                pane,
                viewport,
                content_height,
            } => {
                let state = self.pane_mut(pane);
                state.viewport = viewport;
                state.content_height = content_height;
                self.track_visible(pane, &mut effects);
            }

            Command::SetCanvasSize { pane, size } => {
                self.pane_mut(pane).canvas = Some(size);
            }

            Command::Scrolled { pane, top } => self.on_scrolled(pane, top, &mut effects),

            Command::SetLinked(linked) => {
                if self.linked != linked {
                    self.linked = linked;
                    if linked {
                        self.capture_anchors();
                    } else {
                        self.anchors = LinkAnchors::default();
                    }
                    effects.push(Effect::LinkChanged(linked));
                }
            }

            Command::ToggleLayout => {
                self.layout = self.layout.toggled();
                effects.push(Effect::LayoutChanged(self.layout));
            }

            Command::SetZoom { pane, zoom } => {
                self.set_zoom(pane, Zoom::clamp_factor(zoom), &mut effects);
            }

            Command::Wheel {
                pane,
                delta_y,
                ctrl,
            } => {
                if ctrl {
                    self.wheel_zoom(pane, delta_y, &mut effects);
                } else {
                    self.wheel_overscroll(pane, delta_y, &mut effects);
                }
            }

            Command::PanStart { pane, x, y } => {
                if self.pan_mode && self.pane(pane).zoom.is_magnified() {
                    self.gesture = Gesture::Panning {
                        pane,
                        start: (x, y),
                        start_pan: self.pane(pane).pan,
                    };
                    self.pane_mut(pane).edge.reset();
                    self.last_active = pane;
                }
            }

            Command::PanMove { x, y } => self.continue_pan(x, y, &mut effects),

            Command::PanEnd => {
                if matches!(self.gesture, Gesture::Panning { .. }) {
                    self.gesture = Gesture::Idle;
                }
            }

            Command::PinchStart { pane, distance } => {
                self.gesture = Gesture::Pinching {
                    pane,
                    start_distance: distance,
                    start_zoom: self.zoom(pane),
                };
            }

            Command::PinchMove { distance } => {
                if let Gesture::Pinching {
                    pane,
                    start_distance,
                    start_zoom,
                } = self.gesture
                {
                    let next = pinch_zoom(
                        start_zoom,
                        start_distance,
                        distance,
                        self.options.pinch_damping,
                    );
                    self.set_zoom(pane, next, &mut effects);
                }
            }

            Command::PinchEnd => self.gesture = Gesture::Idle,

            Command::Key(key) => {
                if !self.linked {
                    let delta = match key {
                        ArrowKey::Down => self.options.key_step,
                        ArrowKey::Up => -self.options.key_step,
                    };
                    for pane in [Pane::Base, Pane::Comparison] {
                        let next = (self.scroll_top(pane) + delta).clamp(0.0, self.max_scroll(pane));
                        self.write_scroll(pane, next, &mut effects);
                    }
                }
            }

            Command::ScrollToPage { pane, page } => {
                if let Some(top) = self.rows.page_top(pane, page) {
                    let top = top.clamp(0.0, self.max_scroll(pane));
                    self.write_scroll(pane, top, &mut effects);
                }
            }

            Command::CenterOn { pane, rect } => {
                let viewport = self.pane(pane).viewport;
                let height = rect.height.max(1.0);
                let width = rect.width.max(1.0);
                let top = (rect.top - (viewport.height - height) / 2.0)
                    .max(0.0)
                    .min(self.max_scroll(pane));
                let left = (rect.left - (viewport.width - width) / 2.0).max(0.0);
                let state = self.pane_mut(pane);
                state.scroll_top = top;
                state.guard = true;
                effects.push(Effect::ScrollToPoint { pane, top, left });
                self.track_visible(pane, &mut effects);
            }

            Command::FrameTick => {
                for state in &mut self.panes {
                    state.guard = false;
                }
            }
        }
        effects
    }

    fn rebuild_rows(&mut self) {
        self.rows = RowLayout::build(
            &self.panes[0].pages,
            &self.panes[1].pages,
            self.options.row_structural_extra,
            self.options.row_gap,
        );
    }

    /// Mapped offset for the peer of `source`, anchored, before clamping
    fn linked_target(&self, source: Pane, source_top: f32) -> f32 {
        self.rows.map_scroll_top(source_top, source) + self.anchors.from(source)
    }

    fn capture_anchors(&mut self) {
        let base_top = self.scroll_top(Pane::Base);
        let comparison_top = self.scroll_top(Pane::Comparison);
        self.anchors = LinkAnchors {
            base_to_comparison: comparison_top - self.rows.map_scroll_top(base_top, Pane::Base),
            comparison_to_base: base_top
                - self.rows.map_scroll_top(comparison_top, Pane::Comparison),
        };
        debug!("Scroll link anchors {:?}", self.anchors);
    }

    /// Scrollable range of a pane, `None` when its content fits the viewport
    fn scroll_range(&self, pane: Pane) -> Option<f32> {
        let range = self.max_scroll(pane);
        (range > 0.0).then_some(range)
    }

    fn write_scroll(&mut self, pane: Pane, top: f32, effects: &mut Vec<Effect>) {
        if (self.scroll_top(pane) - top).abs() < SCROLL_EPSILON {
            return;
        }
        let state = self.pane_mut(pane);
        state.scroll_top = top;
        state.guard = true;
        effects.push(Effect::ScrollTo { pane, top });
        self.track_visible(pane, effects);
    }

    fn track_visible(&mut self, pane: Pane, effects: &mut Vec<Effect>) {
        let state = self.pane(pane);
        let middle = state.scroll_top + state.viewport.height / 2.0;
        let page = self.rows.page_nearest(pane, middle);
        if page != state.visible_page {
            self.pane_mut(pane).visible_page = page;
            if let Some(page) = page {
                effects.push(Effect::VisiblePageChanged { pane, page });
            }
        }
    }

    fn on_scrolled(&mut self, pane: Pane, top: f32, effects: &mut Vec<Effect>) {
        self.pane_mut(pane).scroll_top = top;
        self.track_visible(pane, effects);

        if self.pane(pane).guard
            || !self.linked
            || matches!(self.gesture, Gesture::Panning { .. })
        {
            return;
        }
        self.last_active = pane;

        let target = pane.peer();
        let Some(range) = self.scroll_range(target) else {
            return;
        };
        let raw = self.linked_target(pane, top);
        let desired = raw.clamp(0.0, range);
        let current = self.scroll_top(target);

        // Pushing a pane that already sits at the bound it is asked to pass
        // would only fight the source scroll.
        let at_top = desired == 0.0 && current == 0.0 && raw < 0.0;
        let at_bottom = desired == range && current == range && raw > range;
        if at_top || at_bottom {
            return;
        }
        self.write_scroll(target, desired, effects);
    }

    /// Page lists changed: re-apply the mapping from the last active pane
    fn reapply_link(&mut self, effects: &mut Vec<Effect>) {
        let source = self.last_active;
        let target = source.peer();
        let Some(range) = self.scroll_range(target) else {
            return;
        };
        let desired = self
            .linked_target(source, self.scroll_top(source))
            .clamp(0.0, range);
        if (self.scroll_top(target) - desired).abs() > 1.0 {
            self.write_scroll(target, desired, effects);
        }
    }

    fn update_pan_mode(&mut self, effects: &mut Vec<Effect>) {
        let pan_mode = self.panes.iter().any(|p| p.zoom.is_magnified());
        if pan_mode != self.pan_mode {
            self.pan_mode = pan_mode;
            if !pan_mode && matches!(self.gesture, Gesture::Panning { .. }) {
                self.gesture = Gesture::Idle;
            }
            effects.push(Effect::PanModeChanged(pan_mode));
        }
    }

    fn set_pan(&mut self, pane: Pane, pan: Pan, effects: &mut Vec<Effect>) {
        if self.pane(pane).pan != pan {
            self.pane_mut(pane).pan = pan;
            effects.push(Effect::SetPan { pane, pan });
        }
    }

    /// Zooming out recenters the pan, zooming in clamps it
    fn set_zoom(&mut self, pane: Pane, next: f32, effects: &mut Vec<Effect>) {
        let prev = self.zoom(pane);
        if next == prev {
            return;
        }
        self.pane_mut(pane).zoom = Zoom::new(next);
        effects.push(Effect::SetZoom { pane, zoom: next });

        let bounds = self.pan_bounds(pane, next);
        let pan = if next < prev {
            bounds.center()
        } else {
            bounds.clamp(self.pan(pane))
        };
        self.set_pan(pane, pan, effects);
        self.update_pan_mode(effects);
    }

    fn wheel_zoom(&mut self, pane: Pane, delta_y: f32, effects: &mut Vec<Effect>) {
        let steps = self.pane_mut(pane).wheel.feed(delta_y);
        if steps == 0 {
            return;
        }
        let mut zoom = self.pane(pane).zoom;
        zoom.apply_steps_by(steps, self.options.zoom_step);
        self.set_zoom(pane, zoom.factor(), effects);
    }

    /// At a scroll bound, push the mapped wheel delta into the linked peer
    fn wheel_overscroll(&mut self, pane: Pane, delta_y: f32, effects: &mut Vec<Effect>) {
        if !self.linked || delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let top = self.scroll_top(pane);
        let next = (top + delta_y).clamp(0.0, self.max_scroll(pane));
        if next != top {
            // the source still moves; its own scroll event drives the sync
            return;
        }

        let before = self.rows.map_scroll_top(top, pane);
        let after = self.rows.map_scroll_top(top + delta_y, pane);
        let mapped = after - before;
        let delta = if mapped != 0.0 { mapped } else { delta_y };

        let target = pane.peer();
        let target_max = self.max_scroll(target);
        let current = self.scroll_top(target);
        if (current + delta).clamp(0.0, target_max) != current {
            let anchored = (before + self.anchors.from(pane) + delta).clamp(0.0, target_max);
            self.write_scroll(target, anchored, effects);
        }
    }

    fn continue_pan(&mut self, x: f32, y: f32, effects: &mut Vec<Effect>) {
        let Gesture::Panning {
            pane,
            start,
            start_pan,
        } = self.gesture
        else {
            return;
        };
        if !self.pan_mode {
            return;
        }

        let raw = Pan::new(start_pan.x - (x - start.0), start_pan.y - (y - start.1));
        let bounds = self.pan_bounds(pane, self.zoom(pane));
        let desired = bounds.clamp(raw);

        self.edge_overscroll(pane, raw.y, bounds.max_y, effects);
        self.set_pan(pane, desired, effects);

        if self.linked {
            let peer = pane.peer();
            let mirrored = map_pan_between(
                desired,
                bounds,
                self.rotation(pane),
                self.pan_bounds(peer, self.zoom(peer)),
                self.rotation(peer),
            );
            self.set_pan(peer, mirrored, effects);
        }
    }

    /// Pan past the vertical bounds scrolls the page in whole steps once
    /// outside the dead zone
    fn edge_overscroll(&mut self, pane: Pane, raw_y: f32, max_y: f32, effects: &mut Vec<Effect>) {
        let candidate = past_dead_zone(
            vertical_overflow(raw_y, max_y),
            self.options.overscroll_dead_zone,
        );
        if candidate == 0.0 {
            self.pane_mut(pane).edge.reset();
            return;
        }
        let step = self.options.overscroll_step;
        let Some(delta) = self.pane_mut(pane).edge.step(candidate, step) else {
            return;
        };

        let prev = self.scroll_top(pane);
        let next = (prev + delta).clamp(0.0, self.max_scroll(pane));
        if next == prev {
            return;
        }
        self.write_scroll(pane, next, effects);

        if self.linked {
            let target = pane.peer();
            if let Some(range) = self.scroll_range(target) {
                let desired = self.linked_target(pane, next).clamp(0.0, range);
                self.write_scroll(target, desired, effects);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(count: usize, height: f32) -> Vec<PagePreview> {
        (1..=count)
            .map(|page_number| PagePreview {
                page_number,
                width: 600.0,
                height,
                url: String::new(),
                rotation: 0,
            })
            .collect()
    }

    fn controller() -> SyncController {
        let mut sync = SyncController::default();
        let _ = sync.apply(Command::SetPages {
            pane: Pane::Base,
            pages: pages(5, 800.0),
        });
        let _ = sync.apply(Command::SetPages {
            pane: Pane::Comparison,
            pages: pages(5, 800.0),
        });
        for pane in [Pane::Base, Pane::Comparison] {
            let _ = sync.apply(Command::Resize {
                pane,
                viewport: Size::new(600.0, 1000.0),
                content_height: None,
            });
        }
        sync
    }

    fn scroll_writes(effects: &[Effect]) -> Vec<(Pane, f32)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::ScrollTo { pane, top } => Some((*pane, *top)),
                _ => None,
            })
            .collect()
    }

    fn assert_writes(effects: &[Effect], expected: &[(Pane, f32)]) {
        let writes = scroll_writes(effects);
        assert_eq!(writes.len(), expected.len(), "{writes:?}");
        for ((pane, top), (want_pane, want_top)) in writes.iter().zip(expected) {
            assert_eq!(pane, want_pane);
            assert!((top - want_top).abs() < 0.01, "{top} != {want_top}");
        }
    }

    #[test]
    fn user_scroll_moves_peer_once() {
        let mut sync = controller();
        let effects = sync.apply(Command::Scrolled {
            pane: Pane::Base,
            top: 1000.0,
        });
        assert_writes(&effects, &[(Pane::Comparison, 1000.0)]);

        // the echo of that write is ignored until the next frame
        let echo = sync.apply(Command::Scrolled {
            pane: Pane::Comparison,
            top: 1000.0,
        });
        assert!(scroll_writes(&echo).is_empty());
        let _ = sync.apply(Command::FrameTick);

        let effects = sync.apply(Command::Scrolled {
            pane: Pane::Comparison,
            top: 1200.0,
        });
        assert_writes(&effects, &[(Pane::Base, 1200.0)]);
    }

    #[test]
    fn peer_that_cannot_scroll_is_left_alone() {
        let mut sync = controller();
        let _ = sync.apply(Command::Resize {
            pane: Pane::Comparison,
            viewport: Size::new(600.0, 1000.0),
            content_height: Some(900.0),
        });
        assert_eq!(sync.max_scroll(Pane::Comparison), 0.0);
        let effects = sync.apply(Command::Scrolled {
            pane: Pane::Base,
            top: 2000.0,
        });
        assert!(scroll_writes(&effects).is_empty());
        assert_eq!(sync.scroll_top(Pane::Comparison), 0.0);
    }

    #[test]
    fn unlinked_panes_scroll_alone() {
        let mut sync = controller();
        assert_eq!(sync.apply(Command::SetLinked(false)), vec![Effect::LinkChanged(false)]);
        let effects = sync.apply(Command::Scrolled {
            pane: Pane::Base,
            top: 500.0,
        });
        assert!(scroll_writes(&effects).is_empty());
    }

    #[test]
    fn keys_scroll_both_when_unlinked() {
        let mut sync = controller();
        assert!(sync.apply(Command::Key(ArrowKey::Down)).is_empty());
        let _ = sync.apply(Command::SetLinked(false));
        let effects = sync.apply(Command::Key(ArrowKey::Down));
        assert_eq!(
            scroll_writes(&effects),
            vec![(Pane::Base, 80.0), (Pane::Comparison, 80.0)]
        );
        // already at the top
        let _ = sync.apply(Command::FrameTick);
        let _ = sync.apply(Command::Key(ArrowKey::Up));
        assert!(scroll_writes(&sync.apply(Command::Key(ArrowKey::Up))).is_empty());
    }

    #[test]
    fn wheel_zoom_enables_pan_mode() {
        let mut sync = controller();
        let effects = sync.apply(Command::Wheel {
            pane: Pane::Base,
            delta_y: -180.0,
            ctrl: true,
        });
        assert!(effects.contains(&Effect::SetZoom {
            pane: Pane::Base,
            zoom: 1.1
        }));
        assert!(effects.contains(&Effect::PanModeChanged(true)));
        assert!(sync.is_pan_mode());

        // zooming back out recenters and leaves pan mode
        let effects = sync.apply(Command::SetZoom {
            pane: Pane::Base,
            zoom: 1.0,
        });
        assert!(effects.contains(&Effect::PanModeChanged(false)));
        assert_eq!(sync.pan(Pane::Base), Pan::default());
    }

    #[test]
    fn pan_requires_magnification() {
        let mut sync = controller();
        let _ = sync.apply(Command::PanStart {
            pane: Pane::Base,
            x: 0.0,
            y: 0.0,
        });
        assert_eq!(sync.gesture(), Gesture::Idle);

        let _ = sync.apply(Command::SetZoom {
            pane: Pane::Base,
            zoom: 2.0,
        });
        let _ = sync.apply(Command::PanStart {
            pane: Pane::Base,
            x: 100.0,
            y: 100.0,
        });
        let effects = sync.apply(Command::PanMove { x: 50.0, y: 100.0 });
        assert!(effects.contains(&Effect::SetPan {
            pane: Pane::Base,
            pan: Pan::new(50.0, 0.0)
        }));
        let _ = sync.apply(Command::PanEnd);
        assert_eq!(sync.gesture(), Gesture::Idle);
    }

    #[test]
    fn pan_overflow_scrolls_in_steps() {
        let mut sync = controller();
        let _ = sync.apply(Command::SetZoom {
            pane: Pane::Base,
            zoom: 2.0,
        });
        let _ = sync.apply(Command::PanStart {
            pane: Pane::Base,
            x: 0.0,
            y: 1000.0,
        });
        // 800 px of room; dragging up 900 px overflows by 100
        let effects = sync.apply(Command::PanMove { x: 0.0, y: 100.0 });
        let writes = scroll_writes(&effects);
        assert_eq!(writes[0], (Pane::Base, 48.0));
        assert_eq!(writes[1].0, Pane::Comparison);

        let effects = sync.apply(Command::PanMove { x: 0.0, y: 90.0 });
        assert!(scroll_writes(&effects).is_empty());
    }

    #[test]
    fn pinch_zoom_is_damped() {
        let mut sync = controller();
        let _ = sync.apply(Command::PinchStart {
            pane: Pane::Comparison,
            distance: 100.0,
        });
        let _ = sync.apply(Command::PinchMove { distance: 200.0 });
        assert_eq!(sync.zoom(Pane::Comparison), 1.6);
        let _ = sync.apply(Command::PinchEnd);
        assert_eq!(sync.gesture(), Gesture::Idle);
    }

    #[test]
    fn wheel_at_bound_pushes_peer() {
        let mut sync = controller();
        let _ = sync.apply(Command::Resize {
            pane: Pane::Base,
            viewport: Size::new(600.0, 1000.0),
            content_height: Some(1000.0),
        });
        let effects = sync.apply(Command::Wheel {
            pane: Pane::Base,
            delta_y: 120.0,
            ctrl: false,
        });
        assert_writes(&effects, &[(Pane::Comparison, 120.0)]);
    }

    #[test]
    fn visible_page_follows_scroll() {
        let mut sync = controller();
        assert_eq!(sync.visible_page(Pane::Base), Some(1));
        let effects = sync.apply(Command::Scrolled {
            pane: Pane::Base,
            top: 1700.0,
        });
        assert!(effects.contains(&Effect::VisiblePageChanged {
            pane: Pane::Base,
            page: 3
        }));
    }

    #[test]
    fn layout_toggles() {
        let mut sync = controller();
        assert_eq!(
            sync.apply(Command::ToggleLayout),
            vec![Effect::LayoutChanged(Layout::Stacked)]
        );
        assert_eq!(sync.layout(), Layout::Stacked);
    }
}
