//! Zone geometry: the payload stored with every zone row.
//!
//! Geometry arrives from the store as an opaque JSON blob. [`ZoneShape::from_parts`]
//! validates it once at that boundary; everything past it works with the typed
//! [`Geometry`]. Parsing is field-by-field: one corrupt field falls back to its
//! own default and never invalidates its siblings. Coordinates and radius are
//! clamped on every read and write.
//!
//! Colors are stored as plain `#rrggbb` when fully opaque and as
//! `rgba(r, g, b, a)` otherwise; the property editor works with a base hex and
//! a separate 0–100 opacity.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::camera::Point;
use crate::consts::{
    ALPHA_EPSILON, DEFAULT_ICON, DEFAULT_RADIUS, MAX_RADIUS, MIN_LABEL_FONT, MIN_RADIUS, OPAQUE_THRESHOLD_PCT, PALETTE,
    STAGE_HEIGHT, STAGE_WIDTH,
};

/// Longest icon kept, in characters.
const MAX_ICON_CHARS: usize = 4;

// =============================================================================
// CLAMPS
// =============================================================================

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() { value.clamp(min, max) } else { fallback }
}

/// Clamp an x coordinate to the stage. Non-finite input maps to the stage center.
#[must_use]
pub fn clamp_x(x: f64) -> f64 {
    clamp_or(x, 0.0, STAGE_WIDTH, STAGE_WIDTH / 2.0)
}

/// Clamp a y coordinate to the stage. Non-finite input maps to the stage center.
#[must_use]
pub fn clamp_y(y: f64) -> f64 {
    clamp_or(y, 0.0, STAGE_HEIGHT, STAGE_HEIGHT / 2.0)
}

/// Clamp a marker radius. Non-finite input maps to the default radius.
#[must_use]
pub fn clamp_radius(radius: f64) -> f64 {
    clamp_or(radius, MIN_RADIUS, MAX_RADIUS, DEFAULT_RADIUS)
}

/// Clamp a point to the stage bounds.
#[must_use]
pub fn clamp_to_stage(p: Point) -> Point {
    Point::new(clamp_x(p.x), clamp_y(p.y))
}

/// Trim an icon and cap its length; empty icons become the default glyph.
#[must_use]
pub fn normalize_icon(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_ICON.to_owned();
    }
    trimmed.chars().take(MAX_ICON_CHARS).collect()
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Typed zone geometry in stage units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Marker center x.
    pub x: f64,
    /// Marker center y.
    pub y: f64,
    /// Marker radius (half-extent for rect markers).
    pub radius: f64,
    /// Stored color: `#rrggbb` or `rgba(r, g, b, a)`.
    pub color: String,
    /// Short glyph drawn inside the marker.
    pub icon: String,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: STAGE_WIDTH / 2.0,
            y: STAGE_HEIGHT / 2.0,
            radius: DEFAULT_RADIUS,
            color: PALETTE[0].to_owned(),
            icon: DEFAULT_ICON.to_owned(),
        }
    }
}

impl Geometry {
    /// Default geometry centered on `at` (clamped) with the given color.
    #[must_use]
    pub fn at(at: Point, color: &str) -> Self {
        let p = clamp_to_stage(at);
        Self { x: p.x, y: p.y, color: normalize_stored_color(color), ..Self::default() }
    }

    /// Parse a raw payload, defaulting each invalid or missing field on its own.
    #[must_use]
    pub fn parse(raw: &Value) -> Self {
        let defaults = Self::default();
        let number = |key: &str| raw.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());

        let color = raw
            .get("color")
            .and_then(Value::as_str)
            .and_then(|c| decode_color(c).map(|d| color_from_hex_and_opacity(&d.hex, d.opacity)))
            .unwrap_or(defaults.color);
        let icon = raw
            .get("icon")
            .and_then(Value::as_str)
            .map_or(defaults.icon, normalize_icon);

        Self {
            x: number("x").map_or(defaults.x, clamp_x),
            y: number("y").map_or(defaults.y, clamp_y),
            radius: number("radius").map_or(defaults.radius, clamp_radius),
            color,
            icon,
        }
    }

    /// Re-apply every clamp and normalization.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.x = clamp_x(self.x);
        self.y = clamp_y(self.y);
        self.radius = clamp_radius(self.radius);
        self.color = normalize_stored_color(&self.color);
        self.icon = normalize_icon(&self.icon);
        self
    }

    /// Serialize back to the stored payload shape (clamped).
    #[must_use]
    pub fn to_value(&self) -> Value {
        let g = self.clone().clamped();
        json!({
            "x": g.x,
            "y": g.y,
            "radius": g.radius,
            "color": g.color,
            "icon": g.icon,
        })
    }

    /// Marker center.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same geometry moved to `p`, clamped to the stage.
    #[must_use]
    pub fn with_center(&self, p: Point) -> Self {
        let p = clamp_to_stage(p);
        Self { x: p.x, y: p.y, ..self.clone() }
    }
}

// =============================================================================
// SHAPE
// =============================================================================

/// A zone's shape kind together with its validated payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneShape {
    /// Round marker.
    Circle(Geometry),
    /// Square marker with half-extent `radius`.
    Rect(Geometry),
    /// Any other stored kind. Kept verbatim and never rendered.
    Other { kind: String, raw: Value },
}

impl ZoneShape {
    /// Build a shape from the stored kind string and geometry blob.
    #[must_use]
    pub fn from_parts(kind: &str, raw: &Value) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "circle" => Self::Circle(Geometry::parse(raw)),
            "rect" => Self::Rect(Geometry::parse(raw)),
            _ => Self::Other { kind: kind.to_owned(), raw: raw.clone() },
        }
    }

    /// The stored kind string.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Circle(_) => "circle",
            Self::Rect(_) => "rect",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Geometry for rendered kinds.
    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            Self::Circle(g) | Self::Rect(g) => Some(g),
            Self::Other { .. } => None,
        }
    }

    /// Same kind with new geometry. `Other` shapes are returned unchanged.
    #[must_use]
    pub fn with_geometry(&self, geometry: Geometry) -> Self {
        match self {
            Self::Circle(_) => Self::Circle(geometry.clamped()),
            Self::Rect(_) => Self::Rect(geometry.clamped()),
            Self::Other { .. } => self.clone(),
        }
    }

    /// Same shape with its geometry clamped to stage bounds.
    #[must_use]
    pub fn clamped(self) -> Self {
        match self {
            Self::Circle(g) => Self::Circle(g.clamped()),
            Self::Rect(g) => Self::Rect(g.clamped()),
            other @ Self::Other { .. } => other,
        }
    }

    /// Whether the canvas draws and hit-tests this shape.
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        !matches!(self, Self::Other { .. })
    }

    /// The payload to persist.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Circle(g) | Self::Rect(g) => g.to_value(),
            Self::Other { raw, .. } => raw.clone(),
        }
    }
}

// =============================================================================
// COLOR CODEC
// =============================================================================

/// A stored color split into base hex and opacity percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedColor {
    /// Canonical lowercase `#rrggbb`.
    pub hex: String,
    /// Opacity in percent, 0–100.
    pub opacity: f64,
}

fn hex_byte(digits: &str) -> Option<u8> {
    u8::from_str_radix(digits, 16).ok()
}

/// Parse `#RGB` or `#RRGGBB` values into RGB channels.
#[must_use]
pub fn parse_hex_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => Some((
            hex_byte(&hex[0..1].repeat(2))?,
            hex_byte(&hex[1..2].repeat(2))?,
            hex_byte(&hex[2..3].repeat(2))?,
        )),
        6 => Some((hex_byte(&hex[0..2])?, hex_byte(&hex[2..4])?, hex_byte(&hex[4..6])?)),
        _ => None,
    }
}

/// Normalize a color to canonical lowercase `#rrggbb`, using `fallback` when unparseable.
#[must_use]
pub fn normalize_hex_color(value: &str, fallback: &str) -> String {
    let fallback_rgb = parse_hex_rgb(fallback).or_else(|| parse_hex_rgb(PALETTE[0])).unwrap_or((79, 70, 229));
    let (r, g, b) = parse_hex_rgb(value).unwrap_or(fallback_rgb);
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn parse_channel(raw: &str) -> Option<u8> {
    let v = raw.trim().parse::<f64>().ok()?;
    if !v.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = v.round().clamp(0.0, 255.0) as u8;
    Some(channel)
}

fn parse_alpha(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let alpha = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    alpha.is_finite().then(|| alpha.clamp(0.0, 1.0))
}

fn parse_rgb_function(raw: &str) -> Option<(u8, u8, u8, f64)> {
    let lower = raw.trim().to_ascii_lowercase();
    let inner = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').collect();
    let alpha = match parts.len() {
        3 => 1.0,
        4 => parse_alpha(parts[3])?,
        _ => return None,
    };
    Some((parse_channel(parts[0])?, parse_channel(parts[1])?, parse_channel(parts[2])?, alpha))
}

/// Split a stored color into base hex and opacity. `None` when unparseable.
#[must_use]
pub fn decode_color(stored: &str) -> Option<DecodedColor> {
    if let Some((r, g, b)) = parse_hex_rgb(stored) {
        return Some(DecodedColor { hex: format!("#{r:02x}{g:02x}{b:02x}"), opacity: 100.0 });
    }
    let (r, g, b, alpha) = parse_rgb_function(stored)?;
    Some(DecodedColor { hex: format!("#{r:02x}{g:02x}{b:02x}"), opacity: alpha * 100.0 })
}

fn format_alpha(alpha: f64) -> String {
    let s = format!("{alpha:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() { "0".to_owned() } else { s.to_owned() }
}

/// Compose a base hex and a 0–100 opacity into the stored color string.
#[must_use]
pub fn color_from_hex_and_opacity(hex: &str, opacity: f64) -> String {
    let base = normalize_hex_color(hex, PALETTE[0]);
    let opacity = if opacity.is_finite() { opacity.clamp(0.0, 100.0) } else { 100.0 };
    if opacity >= OPAQUE_THRESHOLD_PCT {
        return base;
    }
    let (r, g, b) = parse_hex_rgb(&base).unwrap_or((79, 70, 229));
    format!("rgba({r}, {g}, {b}, {})", format_alpha(opacity / 100.0))
}

/// Canonical stored form of any parseable color; the default palette color otherwise.
#[must_use]
pub fn normalize_stored_color(stored: &str) -> String {
    decode_color(stored).map_or_else(
        || PALETTE[0].to_owned(),
        |d| color_from_hex_and_opacity(&d.hex, d.opacity),
    )
}

/// Two stored colors are equivalent when their hex matches and their alpha
/// differs by less than [`ALPHA_EPSILON`].
#[must_use]
pub fn colors_equivalent(a: &str, b: &str) -> bool {
    match (decode_color(a), decode_color(b)) {
        (Some(da), Some(db)) => da.hex == db.hex && ((da.opacity - db.opacity) / 100.0).abs() < ALPHA_EPSILON,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

// =============================================================================
// LABELS
// =============================================================================

/// Font size for a marker label: shrinks with label length, never below
/// [`MIN_LABEL_FONT`] nor above `round(radius * 1.35)`.
#[must_use]
pub fn label_font_size(radius: f64, label: &str) -> f64 {
    let radius = clamp_radius(radius);
    #[allow(clippy::cast_precision_loss)]
    let len = label.chars().count().max(1) as f64;
    let ceiling = (radius * 1.35).round();
    (radius * 1.05 / len.sqrt()).round().clamp(MIN_LABEL_FONT, ceiling)
}
