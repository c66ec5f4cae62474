use image::Rgba;

use crate::canvas::PixelBuffer;
use crate::components::tools::ToolState;
use crate::error::MaskResult;

// ============================================================================
// STAMP PLACEMENT
// ============================================================================

/// Centers of the stamps needed to carry a stroke from `prev` to `next`.
///
/// * no previous point: a single stamp at `next`
/// * `d <= spacing`: a single stamp at `next`
/// * otherwise stamps at `t = k * spacing / d` for `k = 1, 2, ...` while
///   `t < 1`, closed with a stamp exactly on `next`.
///
/// The previous point itself is never re-stamped: it was painted by the
/// sample that produced it.
pub fn stamp_centers(prev: Option<(f32, f32)>, next: (f32, f32), spacing: f32) -> Vec<(f32, f32)> {
    let Some((x0, y0)) = prev else {
        return vec![next];
    };
    let (x1, y1) = next;
    let d = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    if d <= spacing {
        return vec![next];
    }

    // Parameter is k * step, not a running sum, so float drift never skips
    // or duplicates the end point.
    let step = spacing as f64 / d as f64;
    let (x0, y0, dx, dy) = (x0 as f64, y0 as f64, (x1 - x0) as f64, (y1 - y0) as f64);
    let mut centers = Vec::with_capacity((1.0 / step) as usize + 1);
    let mut k = 1u32;
    loop {
        let t = k as f64 * step;
        if t >= 1.0 - 1e-9 {
            break;
        }
        centers.push(((x0 + t * dx) as f32, (y0 + t * dy) as f32));
        k += 1;
    }
    centers.push(next);
    centers
}

// ============================================================================
// DISC STAMP
// ============================================================================

/// Paint a hard-edged filled disc.  A pixel is covered when its center lies
/// within `radius` of `center`.  No blending: covered pixels are overwritten.
/// Parts of the disc outside the buffer are clipped.
///
/// Returns the number of pixels written.
pub fn stamp_disc(buffer: &mut PixelBuffer, center: (f32, f32), radius: u32, color: Rgba<u8>) -> usize {
    let (cx, cy) = center;
    let r = radius as f32;
    let r_sq = r * r;
    let (width, height) = buffer.dimensions();

    let min_x = (cx - r).floor().max(0.0) as i64;
    let min_y = (cy - r).floor().max(0.0) as i64;
    let max_x = ((cx + r).ceil() as i64).min(width as i64 - 1);
    let max_y = ((cy + r).ceil() as i64).min(height as i64 - 1);
    if min_x > max_x || min_y > max_y {
        return 0;
    }

    let row_bytes = width as usize * 4;
    let raw = buffer.as_raw_mut();
    let mut written = 0;
    for py in min_y..=max_y {
        let dy = py as f32 + 0.5 - cy;
        let dy_sq = dy * dy;
        if dy_sq > r_sq {
            continue;
        }
        let row = &mut raw[py as usize * row_bytes..(py as usize + 1) * row_bytes];
        for px in min_x..=max_x {
            let dx = px as f32 + 0.5 - cx;
            if dx * dx + dy_sq <= r_sq {
                let off = px as usize * 4;
                row[off..off + 4].copy_from_slice(&color.0);
                written += 1;
            }
        }
    }
    written
}

// ============================================================================
// STROKE RASTERIZER
// ============================================================================

/// Turns a drag gesture into a continuous chain of disc stamps.
///
/// Holds only the last pointer sample of the in-progress stroke.
#[derive(Clone, Debug, Default)]
pub struct StrokeRasterizer {
    last_pos: Option<(f32, f32)>,
}

impl StrokeRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True between `begin` and `end`.
    pub fn is_active(&self) -> bool {
        self.last_pos.is_some()
    }

    /// Start a new stroke with a single stamp at `pos`.
    pub fn begin(&mut self, buffer: &mut PixelBuffer, pos: (f32, f32), tools: &ToolState) -> MaskResult<usize> {
        self.last_pos = None;
        self.draw_point(buffer, pos, tools)
    }

    /// Continue the stroke to `pos`, interpolating from the last sample.
    /// Returns the number of stamps placed.
    pub fn draw_point(&mut self, buffer: &mut PixelBuffer, pos: (f32, f32), tools: &ToolState) -> MaskResult<usize> {
        buffer.check_point(pos.0, pos.1)?;
        let color = tools.color().rgba();
        let centers = stamp_centers(self.last_pos, pos, tools.spacing());
        for &center in &centers {
            stamp_disc(buffer, center, tools.brush_size(), color);
        }
        self.last_pos = Some(pos);
        Ok(centers.len())
    }

    pub fn end(&mut self) {
        self.last_pos = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tools::MaskColor;

    fn dist(a: (f32, f32), b: (f32, f32)) -> f32 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }

    #[test]
    fn first_sample_is_a_single_stamp() {
        assert_eq!(stamp_centers(None, (3.0, 4.0), 1.0), vec![(3.0, 4.0)]);
    }

    #[test]
    fn short_moves_stamp_only_the_new_point() {
        assert_eq!(stamp_centers(Some((0.0, 0.0)), (0.6, 0.8), 1.0), vec![(0.6, 0.8)]);
        assert_eq!(stamp_centers(Some((0.0, 0.0)), (3.0, 4.0), 5.0), vec![(3.0, 4.0)]);
    }

    #[test]
    fn long_moves_keep_stamps_within_spacing() {
        let start = (2.0, 3.0);
        let end = (41.3, 17.9);
        let spacing = 2.5;
        let centers = stamp_centers(Some(start), end, spacing);

        assert_eq!(*centers.last().unwrap(), end);
        assert!(dist(start, centers[0]) <= spacing + 1e-4);
        for pair in centers.windows(2) {
            assert!(dist(pair[0], pair[1]) <= spacing + 1e-4);
        }
        assert!(!centers.contains(&start));
    }

    #[test]
    fn exact_multiple_does_not_duplicate_the_end() {
        let centers = stamp_centers(Some((0.0, 0.0)), (10.0, 0.0), 2.0);
        assert_eq!(centers.len(), 5);
        assert_eq!(centers[4], (10.0, 0.0));
    }

    #[test]
    fn disc_covers_pixel_centers_within_radius() {
        let mut buf = PixelBuffer::new(11, 11).unwrap();
        let white = MaskColor::White.rgba();
        assert_eq!(stamp_disc(&mut buf, (5.5, 5.5), 1, white), 5);
        assert_eq!(buf.get(5, 5).unwrap(), white);
        assert_eq!(buf.get(4, 5).unwrap(), white);
        assert_eq!(buf.get(5, 6).unwrap(), white);
        assert_ne!(buf.get(4, 4).unwrap(), white);
    }

    #[test]
    fn disc_is_clipped_at_the_edges() {
        let mut buf = PixelBuffer::new(4, 4).unwrap();
        let white = MaskColor::White.rgba();
        let written = stamp_disc(&mut buf, (0.0, 0.0), 3, white);
        assert!(written > 0);
        assert_eq!(buf.get(0, 0).unwrap(), white);
        assert_ne!(buf.get(3, 3).unwrap(), white);
    }

    #[test]
    fn fast_drag_leaves_no_gap() {
        let mut buf = PixelBuffer::new(100, 20).unwrap();
        let tools = ToolState::default();
        let mut stroke = StrokeRasterizer::new();
        stroke.begin(&mut buf, (5.5, 10.5), &tools).unwrap();
        let stamps = stroke.draw_point(&mut buf, (94.5, 10.5), &tools).unwrap();
        assert!(stamps > 80);
        let white = MaskColor::White.rgba();
        for x in 5..95 {
            assert_eq!(buf.get(x, 10).unwrap(), white, "gap at x = {x}");
        }
    }

    #[test]
    fn out_of_bounds_sample_is_rejected_without_painting() {
        let mut buf = PixelBuffer::new(10, 10).unwrap();
        let before = buf.clone();
        let mut stroke = StrokeRasterizer::new();
        assert!(stroke.begin(&mut buf, (10.0, 2.0), &ToolState::default()).is_err());
        assert_eq!(buf, before);
        assert!(!stroke.is_active());
    }
}
