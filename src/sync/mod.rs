//! Linked scrolling, zoom and pan for the side-by-side comparison view

mod layout;
mod navigation;
mod pan;
mod state;
mod zoom;

pub use layout::{DEFAULT_ROW_GAP, DEFAULT_ROW_STRUCTURAL_EXTRA, Row, RowLayout};
pub use navigation::{
    ChangeNavigator, FLASH_DURATION_MS, HighlightLocator, MAX_NAVIGATION_ATTEMPTS,
    MountedHighlights, NavigationTarget, PixelRect,
};
pub use pan::{
    EdgeScroll, Pan, PanBounds, map_pan_between, max_canvas_size, past_dead_zone,
    rotate_normalized, vertical_overflow,
};
pub use state::{
    ArrowKey, Command, Effect, Gesture, Layout, LinkAnchors, Size, SyncController, SyncOptions,
};
pub use zoom::{WheelAccumulator, Zoom, pinch_zoom};
