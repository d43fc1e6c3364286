//! Glyph width measurement with an LRU cache

use std::num::NonZeroUsize;

use lru::LruCache;

/// Width used for a visible glyph when measurement is unavailable
pub const DEFAULT_CHAR_WIDTH: f32 = 1.0;
/// Width used for whitespace when measurement is unavailable
pub const DEFAULT_SPACE_WIDTH: f32 = 0.33;
/// Default number of cached (font, glyph) widths
pub const DEFAULT_MEASURE_CACHE_SIZE: usize = 4096;

/// Measures the advance width of a glyph in a given font.
///
/// Units are arbitrary but must be consistent for one font, since widths are
/// only used to split a run proportionally.
pub trait GlyphMeasure {
    fn advance(&self, font: &str, ch: char) -> Option<f32>;
}

/// Measurement surface that never knows anything, so fallbacks always apply
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMeasure;

impl GlyphMeasure for NoMeasure {
    fn advance(&self, _font: &str, _ch: char) -> Option<f32> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MeasureKey {
    font: String,
    ch: char,
}

/// Caches glyph widths per font
pub struct MeasureCache {
    cache: LruCache<MeasureKey, f32>,
}

impl Default for MeasureCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEASURE_CACHE_SIZE)
    }
}

impl MeasureCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Width of `ch` in `font`, falling back to defaults for unmeasurable or
    /// non-positive results
    pub fn width(&mut self, measure: &dyn GlyphMeasure, font: &str, ch: char) -> f32 {
        let key = MeasureKey {
            font: font.to_string(),
            ch,
        };
        if let Some(width) = self.cache.get(&key) {
            return *width;
        }

        let width = measure
            .advance(font, ch)
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(if ch.is_whitespace() {
                DEFAULT_SPACE_WIDTH
            } else {
                DEFAULT_CHAR_WIDTH
            });
        self.cache.put(key, width);
        width
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Counting {
        calls: Cell<usize>,
        width: Option<f32>,
    }

    impl GlyphMeasure for Counting {
        fn advance(&self, _font: &str, _ch: char) -> Option<f32> {
            self.calls.set(self.calls.get() + 1);
            self.width
        }
    }

    #[test]
    fn fallback_widths() {
        let mut cache = MeasureCache::new(8);
        assert_eq!(cache.width(&NoMeasure, "Helvetica", 'a'), DEFAULT_CHAR_WIDTH);
        assert_eq!(cache.width(&NoMeasure, "Helvetica", ' '), DEFAULT_SPACE_WIDTH);
    }

    #[test]
    fn non_positive_measurement_falls_back() {
        let measure = Counting {
            calls: Cell::new(0),
            width: Some(0.0),
        };
        let mut cache = MeasureCache::new(8);
        assert_eq!(cache.width(&measure, "Times", 'x'), DEFAULT_CHAR_WIDTH);
    }

    #[test]
    fn widths_are_cached_per_font() {
        let measure = Counting {
            calls: Cell::new(0),
            width: Some(0.5),
        };
        let mut cache = MeasureCache::new(8);
        assert_eq!(cache.width(&measure, "Times", 'x'), 0.5);
        assert_eq!(cache.width(&measure, "Times", 'x'), 0.5);
        assert_eq!(measure.calls.get(), 1);
        cache.width(&measure, "Courier", 'x');
        assert_eq!(measure.calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }
}
