//! Category/index dataset layout.
//!
//! ```text
//! <root>/<category>/Images/<name>.{jpg,jpeg,png}
//! <root>/<category>/Masks/<name>_mask.png
//! ```
//!
//! Images are addressed by their position in "human" order (`img2` sorts
//! before `img10`).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::{MaskError, MaskResult};
use crate::io::{self, LoadedImage, MaskKey, MaskStore};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

// ============================================================================
// Natural ordering
// ============================================================================

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    Number(u128),
    Text(&'a str),
}

/// Split into alternating text / digit runs.
fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != digit => {
                out.push(chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(digit);
    }
    if let Some(digit) = in_digits {
        out.push(chunk(&s[start..], digit));
    }
    out
}

fn chunk(run: &str, digits: bool) -> Chunk<'_> {
    if digits {
        // Runs too long for u128 fall back to text ordering.
        run.parse().map(Chunk::Number).unwrap_or(Chunk::Text(run))
    } else {
        Chunk::Text(run)
    }
}

/// Compare file names the way a person would: digit runs by value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}

// ============================================================================
// Dataset
// ============================================================================

pub struct Dataset {
    pub root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn category_dir(&self, category: &str) -> MaskResult<PathBuf> {
        let valid = !category.is_empty()
            && category != "."
            && category != ".."
            && !category.contains(['/', '\\']);
        if !valid {
            return Err(MaskError::dataset(format!("invalid category '{}'", category)));
        }
        Ok(self.root.join(category))
    }

    pub fn images_dir(&self, category: &str) -> MaskResult<PathBuf> {
        Ok(self.category_dir(category)?.join("Images"))
    }

    pub fn masks_dir(&self, category: &str) -> MaskResult<PathBuf> {
        Ok(self.category_dir(category)?.join("Masks"))
    }

    /// All images of a category, naturally sorted.
    pub fn image_paths(&self, category: &str) -> MaskResult<Vec<PathBuf>> {
        let dir = self.images_dir(category)?;
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            MaskError::dataset(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_image_name(&name) {
                names.push(name);
            }
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names.into_iter().map(|n| dir.join(n)).collect())
    }

    /// Path of image `index` in the category.
    pub fn image_path(&self, category: &str, index: usize) -> MaskResult<PathBuf> {
        let mut paths = self.image_paths(category)?;
        if index >= paths.len() {
            return Err(MaskError::dataset(format!(
                "image {} does not exist in '{}' ({} images)",
                index,
                category,
                paths.len()
            )));
        }
        Ok(paths.swap_remove(index))
    }

    /// Where the mask for image `index` lives (whether or not it exists yet).
    pub fn mask_path(&self, category: &str, index: usize) -> MaskResult<PathBuf> {
        let image = self.image_path(category, index)?;
        mask_path_for(&self.masks_dir(category)?, &image)
    }

    /// Load image `index` together with its saved mask, if any.
    pub fn load(&self, category: &str, index: usize) -> MaskResult<LoadedImage> {
        let image = self.image_path(category, index)?;
        let mask = mask_path_for(&self.masks_dir(category)?, &image)?;
        let mask = mask.is_file().then_some(mask);
        tracing::info!(
            "dataset load {}/{} -> {} (mask: {})",
            category,
            index,
            image.display(),
            mask.as_ref().map_or("none".to_string(), |m| m.display().to_string())
        );
        io::load_source(&image, mask.as_deref())
    }
}

fn mask_path_for(masks_dir: &Path, image: &Path) -> MaskResult<PathBuf> {
    let name = io::dataset_mask_name(image)
        .ok_or_else(|| MaskError::dataset(format!("no file name in {}", image.display())))?;
    Ok(masks_dir.join(name))
}

fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl MaskStore for Dataset {
    fn save_mask(&self, key: &MaskKey, png: &[u8]) -> MaskResult<PathBuf> {
        let MaskKey::Dataset { category, index } = key else {
            return Err(MaskError::dataset("dataset store needs a category/index key"));
        };
        let path = self.mask_path(category, *index)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, png)?;
        tracing::info!("saved mask to {}", path.display());
        Ok(path)
    }
}
