use image::Rgba;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::error::MaskResult;

/// What a flood fill did to the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillOutcome {
    /// The seed already had the fill color.
    Unchanged,
    Filled {
        /// Pixels painted by the scanline pass.
        filled: usize,
        /// Extra pixels painted by the bleed pass.
        bled: usize,
    },
}

impl FillOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, FillOutcome::Filled { .. })
    }
}

#[inline(always)]
fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
    let o = idx * 4;
    [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
}

/// Per-channel (R, G, B, A independently) absolute difference within `tol`.
#[inline(always)]
fn within_tolerance(p: [u8; 4], reference: [u8; 4], tol: u8) -> bool {
    p.iter()
        .zip(reference.iter())
        .all(|(&a, &b)| a.abs_diff(b) <= tol)
}

/// Does `idx` still belong to the region being filled?
#[inline(always)]
fn matches(flat: &[u8], filled: &[bool], idx: usize, reference: [u8; 4], tol: u8) -> bool {
    !filled[idx] && within_tolerance(pix(flat, idx), reference, tol)
}

// ============================================================================
// SCANLINE FILL
// ============================================================================

/// Fill the connected region around `seed` that matches the seed color
/// within `tolerance`, then optionally run one bleed pass.
///
/// The seed is floored to its pixel.  A seed that already has the fill color
/// leaves the buffer untouched.  Work is driven by an explicit seed stack: each
/// popped seed is widened to its whole span, the span is painted, and one new
/// seed is pushed per contiguous matching run in the rows above and below.
pub fn flood_fill(
    buffer: &mut PixelBuffer,
    seed: (f32, f32),
    fill: Rgba<u8>,
    tolerance: u8,
    bleed: bool,
) -> MaskResult<FillOutcome> {
    buffer.check_point(seed.0, seed.1)?;
    let start_x = seed.0.floor() as usize;
    let start_y = seed.1.floor() as usize;
    let (w, h) = buffer.dimensions();
    let (wu, hu) = (w as usize, h as usize);

    let fc = fill.0;
    let flat = buffer.as_raw_mut();
    let reference = pix(flat, start_y * wu + start_x);
    if reference == fc {
        return Ok(FillOutcome::Unchanged);
    }

    // A fill color inside the tolerance band would otherwise match again, so
    // painted pixels are tracked separately from their color.
    let mut filled = vec![false; wu * hu];
    let mut painted = 0usize;
    let mut stack: Vec<(usize, usize)> = Vec::with_capacity(1024);
    stack.push((start_x, start_y));

    while let Some((x, y)) = stack.pop() {
        let row = y * wu;
        if !matches(flat, &filled, row + x, reference, tolerance) {
            continue;
        }

        // Walk to the left end of the span
        let mut lx = x;
        while lx > 0 && matches(flat, &filled, row + lx - 1, reference, tolerance) {
            lx -= 1;
        }

        let mut span_above = false;
        let mut span_below = false;
        let mut cx = lx;
        while cx < wu && matches(flat, &filled, row + cx, reference, tolerance) {
            let idx = row + cx;
            flat[idx * 4..idx * 4 + 4].copy_from_slice(&fc);
            filled[idx] = true;
            painted += 1;

            if y > 0 {
                if matches(flat, &filled, idx - wu, reference, tolerance) {
                    if !span_above {
                        stack.push((cx, y - 1));
                        span_above = true;
                    }
                } else {
                    span_above = false;
                }
            }
            if y + 1 < hu {
                if matches(flat, &filled, idx + wu, reference, tolerance) {
                    if !span_below {
                        stack.push((cx, y + 1));
                        span_below = true;
                    }
                } else {
                    span_below = false;
                }
            }
            cx += 1;
        }
    }

    let bled = if bleed { bleed_pass(buffer, fill) } else { 0 };
    Ok(FillOutcome::Filled {
        filled: painted,
        bled,
    })
}

// ============================================================================
// BLEED PASS
// ============================================================================

/// One-generation dilation of `fill`: every pixel that is not the fill color
/// but has an 8-neighbour with the fill color becomes the fill color.
///
/// Neighbours are read from a copy taken before the pass, so the result does
/// not depend on scan order.  Rows are processed in parallel (rayon).
/// Returns the number of pixels changed.
pub fn bleed_pass(buffer: &mut PixelBuffer, fill: Rgba<u8>) -> usize {
    let (w, h) = buffer.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let fc = fill.0;
    let copy = buffer.as_raw().to_vec();
    let row_bytes = wu * 4;

    buffer
        .as_raw_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .map(|(y, row)| {
            let mut changed = 0usize;
            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(hu - 1);
            for x in 0..wu {
                let off = x * 4;
                if row[off..off + 4] == fc {
                    continue;
                }
                let x0 = x.saturating_sub(1);
                let x1 = (x + 1).min(wu - 1);
                let touches_fill = (y0..=y1).any(|ny| {
                    (x0..=x1).any(|nx| (nx, ny) != (x, y) && pix(&copy, ny * wu + nx) == fc)
                });
                if touches_fill {
                    row[off..off + 4].copy_from_slice(&fc);
                    changed += 1;
                }
            }
            changed
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn all_pixels(buf: &PixelBuffer, color: Rgba<u8>) -> bool {
        buf.as_raw().chunks(4).all(|p| p == color.0)
    }

    #[test]
    fn uniform_buffer_fills_completely() {
        let mut buf = PixelBuffer::new_filled(100, 100, WHITE).unwrap();
        let outcome = flood_fill(&mut buf, (50.0, 50.0), BLACK, 64, true).unwrap();
        assert!(all_pixels(&buf, BLACK));
        assert_eq!(outcome, FillOutcome::Filled { filled: 10_000, bled: 0 });
    }

    #[test]
    fn serpentine_corridor_on_a_large_buffer() {
        // Every odd row is a wall with one gap, alternating between the right
        // and left edge, so the open area is a single 2000-row zigzag.
        let (w, h) = (2000u32, 2000u32);
        let mut buf = PixelBuffer::new(w, h).unwrap();
        for y in (1..h).step_by(2) {
            buf.fill_rect(0, y, w, 1, WHITE).unwrap();
            let gap = if (y / 2) % 2 == 0 { w - 1 } else { 0 };
            buf.set(gap, y, BLACK).unwrap();
        }

        let outcome = flood_fill(&mut buf, (0.0, 0.0), WHITE, 0, false).unwrap();
        assert_eq!(outcome, FillOutcome::Filled { filled: 2_001_000, bled: 0 });
        assert!(all_pixels(&buf, WHITE));
    }

    #[test]
    fn fill_from_any_interior_point_covers_everything() {
        for seed in [(0.0, 0.0), (12.7, 3.2), (19.9, 14.9)] {
            let mut buf = PixelBuffer::new(20, 15).unwrap();
            flood_fill(&mut buf, seed, WHITE, 64, false).unwrap();
            assert!(all_pixels(&buf, WHITE), "seed {seed:?}");
        }
    }

    #[test]
    fn seed_with_fill_color_is_a_no_op() {
        let mut buf = PixelBuffer::new(8, 8).unwrap();
        buf.set(2, 2, WHITE).unwrap();
        let before = buf.clone();
        let outcome = flood_fill(&mut buf, (5.0, 5.0), BLACK, 64, true).unwrap();
        assert_eq!(outcome, FillOutcome::Unchanged);
        assert_eq!(buf, before);
    }

    #[test]
    fn seed_outside_is_rejected() {
        let mut buf = PixelBuffer::new(8, 8).unwrap();
        assert!(flood_fill(&mut buf, (8.0, 1.0), WHITE, 64, true).is_err());
        assert!(flood_fill(&mut buf, (1.0, -0.5), WHITE, 64, true).is_err());
    }

    #[test]
    fn walls_stop_the_fill() {
        // Full-width white wall on row 5: the bottom half stays black.
        let mut buf = PixelBuffer::new(10, 10).unwrap();
        buf.fill_rect(0, 5, 10, 1, WHITE).unwrap();
        flood_fill(&mut buf, (0.0, 0.0), WHITE, 64, false).unwrap();
        for y in 6..10 {
            for x in 0..10 {
                assert_eq!(buf.get(x, y).unwrap(), BLACK);
            }
        }
        assert_eq!(buf.get(9, 4).unwrap(), WHITE);
    }

    #[test]
    fn fill_wraps_around_concave_regions() {
        // Wall on row 5 with a one-pixel gap at the right edge.
        let mut buf = PixelBuffer::new(10, 10).unwrap();
        buf.fill_rect(0, 5, 9, 1, WHITE).unwrap();
        buf.fill_rect(2, 7, 1, 3, WHITE).unwrap();
        flood_fill(&mut buf, (0.0, 0.0), WHITE, 64, false).unwrap();
        assert!(all_pixels(&buf, WHITE));
    }

    #[test]
    fn tolerance_absorbs_near_colors_only() {
        let mut buf = PixelBuffer::new_filled(6, 1, Rgba([100, 100, 100, 255])).unwrap();
        buf.set(2, 0, Rgba([150, 120, 100, 255])).unwrap(); // within 64
        buf.set(4, 0, Rgba([100, 100, 170, 255])).unwrap(); // blue off by 70
        flood_fill(&mut buf, (0.0, 0.0), WHITE, 64, false).unwrap();
        assert_eq!(buf.get(2, 0).unwrap(), WHITE);
        assert_eq!(buf.get(3, 0).unwrap(), WHITE);
        assert_eq!(buf.get(4, 0).unwrap(), Rgba([100, 100, 170, 255]));
        assert_eq!(buf.get(5, 0).unwrap(), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn zero_tolerance_is_exact() {
        let mut buf = PixelBuffer::new(4, 1).unwrap();
        buf.set(2, 0, Rgba([1, 0, 0, 255])).unwrap();
        flood_fill(&mut buf, (0.0, 0.0), WHITE, 0, false).unwrap();
        assert_eq!(buf.get(1, 0).unwrap(), WHITE);
        assert_eq!(buf.get(2, 0).unwrap(), Rgba([1, 0, 0, 255]));
        assert_eq!(buf.get(3, 0).unwrap(), BLACK);
    }

    #[test]
    fn fill_color_inside_tolerance_terminates() {
        let near_white = Rgba([250, 250, 250, 255]);
        let mut buf = PixelBuffer::new_filled(30, 30, near_white).unwrap();
        let outcome = flood_fill(&mut buf, (15.0, 15.0), WHITE, 64, true).unwrap();
        assert!(all_pixels(&buf, WHITE));
        assert_eq!(outcome, FillOutcome::Filled { filled: 900, bled: 0 });
    }

    #[test]
    fn bleed_is_a_single_generation() {
        // White wall at column 4; filling the left side white bleeds exactly
        // one column past the wall.
        let mut buf = PixelBuffer::new(9, 9).unwrap();
        buf.fill_rect(4, 0, 1, 9, WHITE).unwrap();
        let outcome = flood_fill(&mut buf, (1.0, 1.0), WHITE, 64, true).unwrap();
        assert_eq!(outcome, FillOutcome::Filled { filled: 36, bled: 9 });
        for y in 0..9 {
            for x in 0..9 {
                let expected = if x <= 5 { WHITE } else { BLACK };
                assert_eq!(buf.get(x, y).unwrap(), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn bleed_reaches_diagonal_neighbours_and_edges() {
        let mut buf = PixelBuffer::new(3, 3).unwrap();
        buf.set(0, 0, WHITE).unwrap();
        assert_eq!(bleed_pass(&mut buf, WHITE), 3);
        assert_eq!(buf.get(1, 1).unwrap(), WHITE);
        assert_eq!(buf.get(1, 0).unwrap(), WHITE);
        assert_eq!(buf.get(0, 1).unwrap(), WHITE);
        assert_eq!(buf.get(2, 2).unwrap(), BLACK);
    }
}
