//! Shared numeric constants for the canvas crate.

// ── Stage ───────────────────────────────────────────────────────

/// Width of the logical stage in world units.
pub const STAGE_WIDTH: f64 = 3200.0;

/// Height of the logical stage in world units.
pub const STAGE_HEIGHT: f64 = 2200.0;

// ── Viewport ────────────────────────────────────────────────────

/// Smallest allowed viewport scale.
pub const MIN_SCALE: f64 = 0.25;

/// Largest allowed viewport scale.
pub const MAX_SCALE: f64 = 2.5;

/// Scale change applied per wheel event.
pub const ZOOM_STEP: f64 = 0.08;

// ── Zone geometry ───────────────────────────────────────────────

/// Smallest marker radius in world units.
pub const MIN_RADIUS: f64 = 16.0;

/// Largest marker radius in world units.
pub const MAX_RADIUS: f64 = 180.0;

/// Radius given to new zones and to payloads without a usable radius.
pub const DEFAULT_RADIUS: f64 = 54.0;

/// Glyph shown on markers without an icon.
pub const DEFAULT_ICON: &str = "*";

/// Marker palette. The first entry is the fallback color.
pub const PALETTE: [&str; 8] = [
    "#4f46e5", "#0ea5e9", "#10b981", "#f59e0b", "#ef4444", "#ec4899", "#8b5cf6", "#64748b",
];

/// Opacity percentage at or above which a color is stored as plain hex.
pub const OPAQUE_THRESHOLD_PCT: f64 = 99.5;

/// Two stored colors whose alpha differ by less than this are equivalent.
pub const ALPHA_EPSILON: f64 = 0.01;

// ── Labels ──────────────────────────────────────────────────────

/// Smallest label font size in pixels.
pub const MIN_LABEL_FONT: f64 = 10.0;
