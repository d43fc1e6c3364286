//! Pan offsets, bounds and rotation-aware mirroring between panes

use crate::compare::{PagePreview, normalize_rotation};

/// Pan offset in pixels from the top-left of the magnified canvas
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pan {
    pub x: f32,
    pub y: f32,
}

impl Pan {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// How far a pane can pan at its current zoom
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PanBounds {
    pub max_x: f32,
    pub max_y: f32,
}

impl PanBounds {
    /// Bounds for a canvas of `width` x `height` at `zoom`. Zoom levels
    /// below 1 do not pan.
    #[must_use]
    pub fn for_canvas(width: f32, height: f32, zoom: f32) -> Self {
        let factor = zoom.max(1.0) - 1.0;
        Self {
            max_x: (width * factor).max(0.0),
            max_y: (height * factor).max(0.0),
        }
    }

    #[must_use]
    pub fn clamp(&self, pan: Pan) -> Pan {
        Pan {
            x: pan.x.clamp(0.0, self.max_x),
            y: pan.y.clamp(0.0, self.max_y),
        }
    }

    #[must_use]
    pub fn center(&self) -> Pan {
        Pan {
            x: (self.max_x / 2.0).round(),
            y: (self.max_y / 2.0).round(),
        }
    }
}

/// Largest canvas among a pane's pages, each scaled to its row height
#[must_use]
pub fn max_canvas_size(pages: &[PagePreview], peers: &[PagePreview]) -> (f32, f32) {
    let mut max_w = 0.0f32;
    let mut max_h = 0.0f32;
    for page in pages.iter().filter(|p| p.height > 0.0) {
        let target = peers
            .iter()
            .find(|p| p.page_number == page.page_number)
            .map_or(page.height, |peer| page.height.max(peer.height));
        let fit = target / page.height;
        max_w = max_w.max((page.width * fit).round());
        max_h = max_h.max(target.round());
    }
    (max_w, max_h)
}

/// Rotate a centred, normalized offset by a quarter-turn multiple
#[must_use]
pub fn rotate_normalized(nx: f32, ny: f32, rotation: i32) -> (f32, f32) {
    match normalize_rotation(rotation) {
        90 => (ny, -nx),
        180 => (-nx, -ny),
        270 => (-ny, nx),
        _ => (nx, ny),
    }
}

/// Carry a pan from one pane into another with a different rotation.
///
/// The pan is normalized to `[-1, 1]`, rotated into the unrotated frame,
/// then into the target frame and clamped to the target bounds.
#[must_use]
pub fn map_pan_between(
    pan: Pan,
    source_bounds: PanBounds,
    source_rotation: i32,
    target_bounds: PanBounds,
    target_rotation: i32,
) -> Pan {
    let normalize = |value: f32, max: f32| if max == 0.0 { 0.0 } else { value / max * 2.0 - 1.0 };
    let sx = normalize(pan.x, source_bounds.max_x);
    let sy = normalize(pan.y, source_bounds.max_y);

    let (lx, ly) = rotate_normalized(sx, sy, source_rotation);
    let (tx, ty) = rotate_normalized(lx, ly, 360 - normalize_rotation(target_rotation));

    target_bounds.clamp(Pan {
        x: (tx + 1.0) / 2.0 * target_bounds.max_x,
        y: (ty + 1.0) / 2.0 * target_bounds.max_y,
    })
}

/// Vertical distance a raw pan goes past `[0, max_y]`; negative is above
#[must_use]
pub fn vertical_overflow(raw_y: f32, max_y: f32) -> f32 {
    if raw_y < 0.0 {
        raw_y
    } else if raw_y > max_y {
        raw_y - max_y
    } else {
        0.0
    }
}

/// Overflow left after removing the dead zone
#[must_use]
pub fn past_dead_zone(overflow: f32, dead_zone: f32) -> f32 {
    if overflow < -dead_zone {
        overflow + dead_zone
    } else if overflow > dead_zone {
        overflow - dead_zone
    } else {
        0.0
    }
}

/// Turns continuous pan overflow into whole scroll steps
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EdgeScroll {
    applied: f32,
}

impl EdgeScroll {
    /// Scroll delta owed for `candidate` overflow, in multiples of `step`
    pub fn step(&mut self, candidate: f32, step: f32) -> Option<f32> {
        if step <= 0.0 {
            return None;
        }
        let delta = candidate - self.applied;
        let magnitude = delta.abs();
        if magnitude < step {
            return None;
        }
        let scroll = delta.signum() * (magnitude / step).floor() * step;
        self.applied += scroll;
        Some(scroll)
    }

    pub fn reset(&mut self) {
        self.applied = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_number: usize, width: f32, height: f32) -> PagePreview {
        PagePreview {
            page_number,
            width,
            height,
            url: String::new(),
            rotation: 0,
        }
    }

    #[test]
    fn bounds_grow_with_zoom() {
        let bounds = PanBounds::for_canvas(600.0, 800.0, 2.0);
        assert_eq!(bounds, PanBounds { max_x: 600.0, max_y: 800.0 });
        assert_eq!(PanBounds::for_canvas(600.0, 800.0, 0.5), PanBounds::default());
        assert_eq!(bounds.clamp(Pan::new(-5.0, 900.0)), Pan::new(0.0, 800.0));
        assert_eq!(bounds.center(), Pan::new(300.0, 400.0));
    }

    #[test]
    fn canvas_scales_to_taller_peer() {
        let (w, h) = max_canvas_size(&[page(1, 300.0, 400.0)], &[page(1, 600.0, 800.0)]);
        assert_eq!((w, h), (600.0, 800.0));
    }

    #[test]
    fn pan_mirrors_through_rotation() {
        let bounds = PanBounds { max_x: 100.0, max_y: 100.0 };
        // top-left corner
        let pan = Pan::new(0.0, 0.0);
        assert_eq!(map_pan_between(pan, bounds, 0, bounds, 0), pan);
        assert_eq!(map_pan_between(pan, bounds, 0, bounds, 180), Pan::new(100.0, 100.0));
        assert_eq!(map_pan_between(pan, bounds, 90, bounds, 0), Pan::new(0.0, 100.0));
        assert_eq!(map_pan_between(pan, bounds, 90, bounds, 90), pan);
    }

    #[test]
    fn mirrored_pan_respects_target_bounds() {
        let source = PanBounds { max_x: 100.0, max_y: 100.0 };
        let target = PanBounds { max_x: 10.0, max_y: 0.0 };
        assert_eq!(
            map_pan_between(Pan::new(100.0, 100.0), source, 0, target, 0),
            Pan::new(10.0, 0.0)
        );
    }

    #[test]
    fn edge_scroll_moves_in_whole_steps() {
        assert_eq!(vertical_overflow(-10.0, 100.0), -10.0);
        assert_eq!(vertical_overflow(150.0, 100.0), 50.0);
        assert_eq!(past_dead_zone(20.0, 32.0), 0.0);
        assert_eq!(past_dead_zone(-50.0, 32.0), -18.0);

        let mut edge = EdgeScroll::default();
        assert_eq!(edge.step(40.0, 48.0), None);
        assert_eq!(edge.step(100.0, 48.0), Some(96.0));
        assert_eq!(edge.step(120.0, 48.0), None);
        assert_eq!(edge.step(0.0, 48.0), Some(-96.0));
    }
}
