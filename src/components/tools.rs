use image::Rgba;
use std::fmt;
use std::str::FromStr;

use crate::error::{MaskError, MaskResult};

// ============================================================================
// MASK COLOR
// ============================================================================

/// The two colors a mask can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskColor {
    White,
    Black,
}

impl MaskColor {
    pub fn rgba(self) -> Rgba<u8> {
        match self {
            MaskColor::White => Rgba([255, 255, 255, 255]),
            MaskColor::Black => Rgba([0, 0, 0, 255]),
        }
    }

    /// The other color.
    pub fn toggled(self) -> Self {
        match self {
            MaskColor::White => MaskColor::Black,
            MaskColor::Black => MaskColor::White,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MaskColor::White => "white",
            MaskColor::Black => "black",
        }
    }
}

impl fmt::Display for MaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaskColor {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(MaskColor::White),
            "black" | "b" => Ok(MaskColor::Black),
            other => Err(MaskError::tool_state(format!(
                "unknown mask color '{}' (expected white or black)",
                other
            ))),
        }
    }
}

// ============================================================================
// TOOL STATE
// ============================================================================

pub const DEFAULT_BRUSH_SIZE: u32 = 5;
pub const DEFAULT_BRUSH_SPACING: f32 = 1.0;
pub const DEFAULT_FILL_TOLERANCE: u8 = 64;

/// Brush and fill parameters shared by every gesture of a session.
///
/// Mutators validate their input and leave the state untouched when they
/// reject it.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolState {
    /// Stamp radius in pixels, always >= 1.
    brush_size: u32,
    color: MaskColor,
    /// Maximum distance between interpolated stamp centers, always >= 1.
    spacing: f32,
    /// Per-channel flood-fill match tolerance.
    pub tolerance: u8,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            brush_size: DEFAULT_BRUSH_SIZE,
            color: MaskColor::White,
            spacing: DEFAULT_BRUSH_SPACING,
            tolerance: DEFAULT_FILL_TOLERANCE,
        }
    }
}

impl ToolState {
    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn color(&self) -> MaskColor {
        self.color
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn set_brush_size(&mut self, size: i64) -> MaskResult<()> {
        if size < 1 || size > u32::MAX as i64 {
            return Err(MaskError::tool_state(format!(
                "brush size must be at least 1, got {}",
                size
            )));
        }
        self.brush_size = size as u32;
        Ok(())
    }

    /// Grow or shrink the brush.  A change that would take the radius below
    /// 1 is rejected.
    pub fn adjust_brush_size(&mut self, delta: i64) -> MaskResult<()> {
        self.set_brush_size(self.brush_size as i64 + delta)
    }

    pub fn set_color(&mut self, color: MaskColor) {
        self.color = color;
    }

    pub fn switch_color(&mut self) -> MaskColor {
        self.color = self.color.toggled();
        self.color
    }

    pub fn set_spacing(&mut self, spacing: f32) -> MaskResult<()> {
        if !spacing.is_finite() || spacing < 1.0 {
            return Err(MaskError::tool_state(format!(
                "brush spacing must be at least 1, got {}",
                spacing
            )));
        }
        self.spacing = spacing;
        Ok(())
    }
}
