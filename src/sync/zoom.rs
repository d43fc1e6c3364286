//! Per-pane zoom factor, wheel accumulation and pinch damping

/// Zoom factor of one pane
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    /// Current zoom factor (1.0 = fit)
    pub factor: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Zoom {
    /// Smallest allowed factor
    pub const MIN: f32 = 0.5;
    /// Largest allowed factor
    pub const MAX: f32 = 100_000.0;
    /// Change per discrete step
    pub const STEP: f32 = 0.1;

    #[must_use]
    pub fn new(factor: f32) -> Self {
        Self {
            factor: Self::clamp_factor(factor),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Whether content overflows the viewport and can be panned
    pub fn is_magnified(&self) -> bool {
        self.factor > 1.0
    }

    /// Apply `steps` discrete steps; positive zooms in
    pub fn apply_steps(&mut self, steps: i32) {
        self.apply_steps_by(steps, Self::STEP);
    }

    /// Apply `steps` steps of size `step`
    pub fn apply_steps_by(&mut self, steps: i32, step: f32) {
        let step = if step > 0.0 { step } else { Self::STEP };
        let mut next = self.factor;
        for _ in 0..steps.unsigned_abs() {
            next = if steps > 0 {
                round2(next + step).min(Self::MAX)
            } else {
                round2(next - step).max(Self::MIN)
            };
        }
        self.factor = next;
    }

    pub fn step_in(&mut self) {
        self.apply_steps(1);
    }

    pub fn step_out(&mut self) {
        self.apply_steps(-1);
    }

    /// Clamp factor to the valid range, handling NaN/Inf
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(Self::MIN, Self::MAX)
        }
    }
}

/// Round to two decimals
fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// Turns a stream of wheel deltas into discrete zoom steps.
///
/// Steps fire only once the accumulated delta crosses the threshold; the
/// remainder carries over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelAccumulator {
    accumulated: f32,
    threshold: f32,
}

impl Default for WheelAccumulator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl WheelAccumulator {
    pub const DEFAULT_THRESHOLD: f32 = 180.0;

    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            accumulated: 0.0,
            threshold: if threshold > 0.0 {
                threshold
            } else {
                Self::DEFAULT_THRESHOLD
            },
        }
    }

    /// Feed a wheel delta; returns signed zoom steps (positive zooms in).
    /// Scrolling down (positive delta) zooms out.
    pub fn feed(&mut self, delta_y: f32) -> i32 {
        if !delta_y.is_finite() {
            return 0;
        }
        self.accumulated += delta_y;
        let steps = (self.accumulated.abs() / self.threshold).trunc() as i32;
        if steps <= 0 {
            return 0;
        }
        let zoom_in = self.accumulated < 0.0;
        self.accumulated %= self.threshold;
        if zoom_in { steps } else { -steps }
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

/// Damped pinch zoom relative to the gesture start
#[must_use]
pub fn pinch_zoom(start_zoom: f32, start_distance: f32, distance: f32, damping: f32) -> f32 {
    let scale = distance / start_distance.max(1.0);
    let damped = 1.0 + (scale - 1.0) * damping;
    Zoom::clamp_factor(round2(start_zoom * damped))
}
