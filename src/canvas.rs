use image::{Rgba, RgbaImage};

use crate::error::{MaskError, MaskResult};

/// Opaque black, the state of a freshly created mask.
pub const EMPTY_MASK_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 255]);

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// Fixed-size RGBA raster the mask is painted into.
///
/// Storage is a single row-major `RgbaImage` (4 bytes per pixel, top-left
/// origin).  The dimensions never change for the lifetime of a buffer: a new
/// image means a new `PixelBuffer`.
///
/// All coordinate-taking accessors reject positions outside
/// `[0, width) × [0, height)` with [`MaskError::OutOfBounds`] instead of
/// clamping, so integration bugs in the caller surface immediately.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// Create an empty mask (opaque black).
    pub fn new(width: u32, height: u32) -> MaskResult<Self> {
        Self::new_filled(width, height, EMPTY_MASK_PIXEL)
    }

    /// Create a buffer with every pixel set to `color`.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> MaskResult<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, color),
        })
    }

    /// Wrap a flat RGBA byte vector.  The length must be exactly
    /// `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> MaskResult<Self> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(MaskError::decode(format!(
                "expected {} bytes for {}×{} RGBA, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        let image = RgbaImage::from_raw(width, height, data)
            .ok_or(MaskError::InvalidDimensions { width, height })?;
        Ok(Self { image })
    }

    /// Import from a decoded image.
    pub fn from_rgba_image(image: RgbaImage) -> MaskResult<Self> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    // ---- dimensions ---------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// True when the integer pixel `(x, y)` lies inside the buffer.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    /// Reject positions outside the buffer.  Fractional pointer positions are
    /// accepted as long as they fall inside a pixel.
    pub fn check_point(&self, x: f32, y: f32) -> MaskResult<()> {
        if x.is_finite()
            && y.is_finite()
            && x >= 0.0
            && y >= 0.0
            && x < self.width() as f32
            && y < self.height() as f32
        {
            Ok(())
        } else {
            Err(self.out_of_bounds(x.floor() as i64, y.floor() as i64))
        }
    }

    fn out_of_bounds(&self, x: i64, y: i64) -> MaskError {
        MaskError::out_of_bounds(x, y, self.width(), self.height())
    }

    // ---- pixel access -------------------------------------------------------

    pub fn get(&self, x: u32, y: u32) -> MaskResult<Rgba<u8>> {
        if !self.contains(x as i64, y as i64) {
            return Err(self.out_of_bounds(x as i64, y as i64));
        }
        Ok(*self.image.get_pixel(x, y))
    }

    pub fn set(&mut self, x: u32, y: u32, color: Rgba<u8>) -> MaskResult<()> {
        if !self.contains(x as i64, y as i64) {
            return Err(self.out_of_bounds(x as i64, y as i64));
        }
        self.image.put_pixel(x, y, color);
        Ok(())
    }

    /// Fill a rectangle.  The whole rectangle must fit inside the buffer;
    /// nothing is written otherwise.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) -> MaskResult<()> {
        if w == 0 || h == 0 {
            return Ok(());
        }
        let max_x = x as i64 + w as i64 - 1;
        let max_y = y as i64 + h as i64 - 1;
        if !self.contains(x as i64, y as i64) {
            return Err(self.out_of_bounds(x as i64, y as i64));
        }
        if !self.contains(max_x, max_y) {
            return Err(self.out_of_bounds(max_x, max_y));
        }
        let row_bytes = self.width() as usize * 4;
        let start = x as usize * 4;
        let end = start + w as usize * 4;
        for row in self.image.chunks_exact_mut(row_bytes).skip(y as usize).take(h as usize) {
            for px in row[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        }
        Ok(())
    }

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Flat row-major RGBA bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Mutable flat bytes for the raster ops.  Length is fixed.
    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    // ---- snapshots ----------------------------------------------------------

    /// Copy the current contents.  The snapshot never aliases the buffer.
    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            width: self.width(),
            height: self.height(),
            pixels: self.image.as_raw().clone(),
        }
    }

    /// Replace the whole contents with `snapshot`.  Snapshots of a
    /// different size are rejected and the buffer is left untouched.
    pub fn restore(&mut self, snapshot: CanvasSnapshot) -> MaskResult<()> {
        if snapshot.dimensions() != self.dimensions() {
            return Err(MaskError::DimensionMismatch {
                expected: self.dimensions(),
                actual: snapshot.dimensions(),
            });
        }
        let (width, height) = snapshot.dimensions();
        self.image = RgbaImage::from_raw(width, height, snapshot.pixels)
            .ok_or(MaskError::InvalidDimensions { width, height })?;
        Ok(())
    }
}

fn check_dimensions(width: u32, height: u32) -> MaskResult<()> {
    // ~256 megapixels
    let total = width as u64 * height as u64;
    if width == 0 || height == 0 || total > 256_000_000 {
        return Err(MaskError::InvalidDimensions { width, height });
    }
    Ok(())
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable full-buffer copy held by the undo history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanvasSnapshot {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CanvasSnapshot {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.len()
    }
}
