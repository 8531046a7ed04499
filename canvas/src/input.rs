//! Input model: pointer buttons, wheel deltas, and the gesture state machine.
//!
//! `InputState` is the single active gesture. A pending connection survives a
//! pan or a zone drag by riding along inside those variants, so there is never
//! a second flag to keep in sync: when the gesture ends the machine settles back
//! to `PendingConnection` rather than `Idle`.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::{Point, Viewport};
use crate::doc::ZoneId;

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// The zone whose properties are being edited, if any.
    pub selected_id: Option<ZoneId>,
}

/// The active gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Secondary-button drag over empty canvas.
    Panning {
        /// Client-space pointer position when the pan began.
        start_pointer: Point,
        /// Viewport when the pan began; deltas are applied to this.
        start_view: Viewport,
        /// Connection source to restore when the pan ends.
        pending: Option<ZoneId>,
    },
    /// Primary-button drag of a zone marker.
    DraggingZone {
        id: ZoneId,
        /// Pointer stage position minus zone center at drag start.
        offset: Point,
        /// Whether any pointer-move has repositioned the zone yet.
        moved: bool,
        /// Connection source to restore when the drag ends.
        pending: Option<ZoneId>,
    },
    /// Waiting for a second zone to complete a connection.
    PendingConnection { source: ZoneId },
}

impl InputState {
    /// The state to settle into once a pan or drag ends.
    #[must_use]
    pub fn settled(pending: Option<ZoneId>) -> Self {
        pending.map_or(Self::Idle, |source| Self::PendingConnection { source })
    }

    /// Source zone of a pending connection, whatever gesture is active.
    #[must_use]
    pub fn pending_source(&self) -> Option<ZoneId> {
        match self {
            Self::Idle => None,
            Self::Panning { pending, .. } | Self::DraggingZone { pending, .. } => *pending,
            Self::PendingConnection { source } => Some(*source),
        }
    }

    /// Replace the pending connection source without disturbing an active pan or drag.
    pub fn set_pending(&mut self, source: Option<ZoneId>) {
        match self {
            Self::Idle | Self::PendingConnection { .. } => *self = Self::settled(source),
            Self::Panning { pending, .. } | Self::DraggingZone { pending, .. } => *pending = source,
        }
    }

    /// Id of the zone being dragged, if any.
    #[must_use]
    pub fn dragging_zone(&self) -> Option<ZoneId> {
        match self {
            Self::DraggingZone { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether a pan or drag is in progress.
    #[must_use]
    pub fn is_gesture_active(&self) -> bool {
        matches!(self, Self::Panning { .. } | Self::DraggingZone { .. })
    }
}
