#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{MAX_SCALE, MIN_SCALE, ZOOM_STEP};

/// A point in either client or stage space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`.
    #[must_use]
    pub fn sub(self, other: Point) -> Point {
        Point { x: self.x - other.x, y: self.y - other.y }
    }
}

/// Direction of a single wheel zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Wheel scrolling up (negative `dy`) zooms in.
    #[must_use]
    pub fn from_wheel_dy(dy: f64) -> Option<Self> {
        if dy < 0.0 {
            Some(Self::In)
        } else if dy > 0.0 {
            Some(Self::Out)
        } else {
            None
        }
    }
}

/// Viewport pan/zoom over the stage.
///
/// `x` / `y` translate the stage in CSS pixels relative to the viewport
/// origin; `scale` is the zoom factor (1.0 = one stage unit per pixel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale: 1.0 }
    }
}

impl Viewport {
    /// Convert a client-space point to stage coordinates.
    ///
    /// `origin` is the client position of the viewport's top-left corner.
    #[must_use]
    pub fn client_to_stage(&self, client: Point, origin: Point) -> Point {
        let local = client.sub(origin);
        Point {
            x: (local.x - self.x) / self.scale,
            y: (local.y - self.y) / self.scale,
        }
    }

    /// Convert a stage point to client coordinates. Inverse of [`Self::client_to_stage`].
    #[must_use]
    pub fn stage_to_client(&self, stage: Point, origin: Point) -> Point {
        Point {
            x: stage.x * self.scale + self.x + origin.x,
            y: stage.y * self.scale + self.y + origin.y,
        }
    }

    /// Translate captured at pan start plus the pointer delta since then.
    #[must_use]
    pub fn panned(&self, pointer_at_start: Point, pointer_now: Point) -> Viewport {
        let delta = pointer_now.sub(pointer_at_start);
        Viewport { x: self.x + delta.x, y: self.y + delta.y, scale: self.scale }
    }

    /// Step the scale by one zoom increment, keeping the stage point under
    /// `pointer` (viewport-relative) fixed.
    ///
    /// Returns `self` unchanged when the clamp leaves the scale where it was.
    #[must_use]
    pub fn zoomed_at(&self, pointer: Point, direction: ZoomDirection) -> Viewport {
        let step = match direction {
            ZoomDirection::In => ZOOM_STEP,
            ZoomDirection::Out => -ZOOM_STEP,
        };
        let next_scale = (self.scale + step).clamp(MIN_SCALE, MAX_SCALE);
        if (next_scale - self.scale).abs() < f64::EPSILON {
            return *self;
        }

        let world_x = (pointer.x - self.x) / self.scale;
        let world_y = (pointer.y - self.y) / self.scale;
        Viewport {
            x: pointer.x - world_x * next_scale,
            y: pointer.y - world_y * next_scale,
            scale: next_scale,
        }
    }
}
