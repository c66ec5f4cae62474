use base64::Engine;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canvas::PixelBuffer;
use crate::error::{MaskError, MaskResult};

const DATA_URL_PREFIX: &str = "data:";
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

// ============================================================================
// IMAGE SOURCE
// ============================================================================

/// What the editor needs from a source image: its size, an optional mask to
/// start from, and a name to derive the saved mask's file name from.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    /// Existing mask, already brought to `width × height`.
    pub mask: Option<RgbaImage>,
    /// File name of the source image (e.g. `"cat_01.jpg"`), when known.
    pub source_name: Option<String>,
}

impl LoadedImage {
    /// Pair a decoded source image with an optional mask.  A mask of a
    /// different size is stretched to the image, nearest-neighbour, so the
    /// mask stays binary.
    pub fn new(source: &RgbaImage, mask: Option<RgbaImage>, source_name: Option<String>) -> Self {
        let (width, height) = source.dimensions();
        Self {
            width,
            height,
            mask: mask.map(|m| fit_mask(m, width, height)),
            source_name,
        }
    }

    /// Build the pixel buffer for this image: the existing mask, or an empty
    /// (black) mask of the image's size.
    pub fn to_buffer(&self) -> MaskResult<PixelBuffer> {
        match &self.mask {
            Some(mask) => PixelBuffer::from_rgba_image(mask.clone()),
            None => PixelBuffer::new(self.width, self.height),
        }
    }
}

/// Resize `mask` to `width × height` when it does not already match.
pub fn fit_mask(mask: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if mask.dimensions() == (width, height) {
        mask
    } else {
        tracing::warn!(
            "mask is {}×{}, image is {}×{}; stretching mask",
            mask.width(),
            mask.height(),
            width,
            height
        );
        imageops::resize(&mask, width, height, FilterType::Nearest)
    }
}

/// Synchronously decode any supported raster file to RGBA.
pub fn load_image_sync(path: &Path) -> MaskResult<RgbaImage> {
    // Sniff the format from the content; extensions in datasets are not
    // always truthful.
    let img = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| MaskError::decode(format!("{}: {}", path.display(), e)))?;
    Ok(img.to_rgba8())
}

/// Decode an in-memory encoded image (PNG, JPEG, ...) to RGBA.
pub fn decode_image_bytes(bytes: &[u8]) -> MaskResult<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(|e| MaskError::decode(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Load a source image from disk, with an optional mask file.
pub fn load_source(image_path: &Path, mask_path: Option<&Path>) -> MaskResult<LoadedImage> {
    let source = load_image_sync(image_path)?;
    let mask = match mask_path {
        Some(p) => Some(load_image_sync(p)?),
        None => None,
    };
    let name = image_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned());
    Ok(LoadedImage::new(&source, mask, name))
}

// ============================================================================
// PNG EXPORT
// ============================================================================

/// Encode the buffer as an 8-bit RGBA PNG.
pub fn encode_png(buffer: &PixelBuffer) -> MaskResult<Vec<u8>> {
    let mut out = Vec::new();
    write_png_to(buffer, &mut out)?;
    Ok(out)
}

/// Encode the buffer as PNG straight into `path`.
pub fn write_png(buffer: &PixelBuffer, path: &Path) -> MaskResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png_to(buffer, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn write_png_to<W: Write>(buffer: &PixelBuffer, sink: W) -> MaskResult<()> {
    let (width, height) = buffer.dimensions();
    let mut encoder = png::Encoder::new(sink, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| MaskError::encode(format!("PNG header write error: {}", e)))?;
    writer
        .write_image_data(buffer.as_raw())
        .map_err(|e| MaskError::encode(format!("PNG data write error: {}", e)))?;
    writer
        .finish()
        .map_err(|e| MaskError::encode(format!("PNG finish error: {}", e)))?;
    Ok(())
}

// ============================================================================
// DATA URLS
// ============================================================================

/// `data:image/png;base64,...` for already-encoded PNG bytes.
pub fn png_data_url(png: &[u8]) -> String {
    let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    url.push_str(PNG_DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(png, &mut url);
    url
}

/// Decode a base64 `data:` URL into its media type and payload.
///
/// Only base64 payloads are accepted; ASCII whitespace inside the payload is
/// ignored.
pub fn decode_data_url(url: &str) -> MaskResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| MaskError::data_url("URL does not start with 'data:'"))?;
    let (metadata, data) = rest
        .split_once(',')
        .ok_or_else(|| MaskError::data_url("missing comma in data URL"))?;

    let mut parts = metadata.split(';');
    let media_type = parts.next().unwrap_or("").trim().to_string();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(MaskError::data_url("only base64 data URLs are supported"));
    }

    let cleaned: Vec<u8> = data.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| MaskError::data_url(format!("invalid base64: {}", e)))?;
    Ok((media_type, bytes))
}

// ============================================================================
// MASK NAMING & PERSISTENCE
// ============================================================================

/// Where a mask goes when it is saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaskKey {
    /// Entry `index` (natural order) of a dataset category.
    Dataset { category: String, index: usize },
    /// A standalone file, named after its source image when known.
    File { source_name: Option<String> },
}

/// Persistence sink for finished masks.  Implementations decide where a key
/// lands on disk and return the written path.
pub trait MaskStore {
    fn save_mask(&self, key: &MaskKey, png: &[u8]) -> MaskResult<PathBuf>;

    /// Save a mask delivered as a PNG data URL.  Payloads that do not decode
    /// as an image are rejected before anything is written.
    fn save_mask_data_url(&self, key: &MaskKey, url: &str) -> MaskResult<PathBuf> {
        let (_, png) = decode_data_url(url)?;
        decode_image_bytes(&png)?;
        self.save_mask(key, &png)
    }
}

/// Dataset mask name for a source image: `<stem>_mask.png`.
pub fn dataset_mask_name(source: &Path) -> Option<String> {
    let stem = source.file_stem()?.to_string_lossy();
    Some(format!("{}_mask.png", stem))
}

/// Suggested name for a locally saved mask: `<base>_GT.png`, where `<base>`
/// is the source name up to its first dot, or `mask_<unix millis>` when the
/// source is unknown.
pub fn suggested_mask_name(source_name: Option<&str>) -> String {
    let base = source_name
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
        .and_then(|name| name.split('.').next())
        .filter(|base| !base.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            format!("mask_{}", millis)
        });
    format!("{}_GT.png", base)
}

/// Writes masks into a plain directory.
pub struct LocalFileStore {
    pub dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &MaskKey) -> PathBuf {
        let name = match key {
            MaskKey::File { source_name } => suggested_mask_name(source_name.as_deref()),
            MaskKey::Dataset { category, index } => format!("{}_{}_GT.png", category, index),
        };
        self.dir.join(name)
    }
}

impl MaskStore for LocalFileStore {
    fn save_mask(&self, key: &MaskKey, png: &[u8]) -> MaskResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        std::fs::write(&path, png)?;
        tracing::info!("saved mask to {}", path.display());
        Ok(path)
    }
}
