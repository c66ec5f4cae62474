// ============================================================================
// OPS MODULE: pixel operations on a PixelBuffer
// ============================================================================
//
//   stroke.rs     : stamp interpolation + hard-edged disc rasterizer
//   flood_fill.rs : scanline flood fill with tolerance + bleed dilation
// ============================================================================

pub mod flood_fill;
pub mod stroke;
