//! Layout value objects carried on tasks.
//!
//! The engine never interprets these beyond copying them on moves and
//! offsetting them on duplication; coordinates are integer board units.

use serde::{Deserialize, Serialize};

/// Horizontal/vertical offset applied to duplicated tasks so clones do not
/// land exactly on top of their originals.
pub const DUPLICATE_NUDGE: i64 = 24;

/// Stacking-order increment applied to duplicated tasks.
pub const DUPLICATE_Z_LIFT: i64 = 3;

/// Position of a task on its space's board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPosition {
    /// Horizontal coordinate in board units.
    pub x: i64,
    /// Vertical coordinate in board units.
    pub y: i64,
    /// Stacking order within the space.
    pub z_index: i64,
}

impl BoardPosition {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: i64, y: i64, z_index: i64) -> Self {
        Self { x, y, z_index }
    }

    /// Returns the position a duplicate of this task should receive:
    /// nudged down-right and lifted above the original.
    #[must_use]
    pub const fn duplicate_offset(self) -> Self {
        Self {
            x: self.x.saturating_add(DUPLICATE_NUDGE),
            y: self.y.saturating_add(DUPLICATE_NUDGE),
            z_index: self.z_index.saturating_add(DUPLICATE_Z_LIFT),
        }
    }
}

impl Default for BoardPosition {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

/// Rendered extent of a task card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardExtent {
    /// Width in board units.
    pub width: i64,
    /// Height in board units.
    pub height: i64,
}

impl BoardExtent {
    /// Default card width.
    pub const DEFAULT_WIDTH: i64 = 280;
    /// Default card height.
    pub const DEFAULT_HEIGHT: i64 = 120;

    /// Creates an extent.
    #[must_use]
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}

impl Default for BoardExtent {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT)
    }
}
