use std::path::{Path, PathBuf};

use crate::components::history::DEFAULT_HISTORY_SIZE;
use crate::components::tools::{
    DEFAULT_BRUSH_SIZE, DEFAULT_BRUSH_SPACING, DEFAULT_FILL_TOLERANCE, MaskColor,
};
use crate::error::MaskResult;

/// Editor settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskSettings {
    /// Maximum number of undo steps
    pub history_size: usize,
    /// Initial brush radius in pixels
    pub brush_size: u32,
    /// Maximum distance between stamps along a stroke
    pub brush_spacing: f32,
    /// Flood-fill per-channel tolerance (0 = exact)
    pub fill_tolerance: u8,
    /// Color the brush starts with
    pub default_color: MaskColor,
    /// Dilate flood fills by one pixel to close anti-aliasing gaps
    pub bleed: bool,
    /// Whether the fill command is available at all
    pub flood_fill: bool,
    /// Dataset root (parent of the category folders)
    pub root_data_path: PathBuf,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            brush_size: DEFAULT_BRUSH_SIZE,
            brush_spacing: DEFAULT_BRUSH_SPACING,
            fill_tolerance: DEFAULT_FILL_TOLERANCE,
            default_color: MaskColor::White,
            bleed: true,
            flood_fill: true,
            root_data_path: PathBuf::from("./masking_data"),
        }
    }
}

impl MaskSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/maskpaint/maskpaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MaskPaint\maskpaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/MaskPaint/maskpaint_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("maskpaint");
            return Some(config_dir.join("maskpaint_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("MaskPaint").join("maskpaint_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("MaskPaint")
                    .join("maskpaint_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("maskpaint_settings.cfg")))
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load settings from `path`.  A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> MaskResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "history_size={}\n\
             brush_size={}\n\
             brush_spacing={}\n\
             fill_tolerance={}\n\
             default_color={}\n\
             bleed={}\n\
             flood_fill={}\n\
             root_data_path={}\n",
            self.history_size,
            self.brush_size,
            self.brush_spacing,
            self.fill_tolerance,
            self.default_color,
            self.bleed,
            self.flood_fill,
            self.root_data_path.display(),
        )
    }

    /// Parse `key=value` lines.  Unknown keys and unparsable values are
    /// skipped, keeping the default for that key.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "history_size" => {
                    s.history_size = val.parse().unwrap_or(DEFAULT_HISTORY_SIZE);
                }
                "brush_size" => {
                    s.brush_size = val
                        .parse()
                        .ok()
                        .filter(|&n: &u32| n >= 1)
                        .unwrap_or(DEFAULT_BRUSH_SIZE);
                }
                "brush_spacing" => {
                    s.brush_spacing = val
                        .parse()
                        .ok()
                        .filter(|&v: &f32| v.is_finite() && v >= 1.0)
                        .unwrap_or(DEFAULT_BRUSH_SPACING);
                }
                "fill_tolerance" => {
                    s.fill_tolerance = val.parse().unwrap_or(DEFAULT_FILL_TOLERANCE);
                }
                "default_color" => {
                    s.default_color = val.parse().unwrap_or(MaskColor::White);
                }
                "bleed" => {
                    s.bleed = val == "true";
                }
                "flood_fill" => {
                    s.flood_fill = val == "true";
                }
                "root_data_path" => {
                    if !val.is_empty() {
                        s.root_data_path = PathBuf::from(val);
                    }
                }
                _ => {
                    tracing::debug!("ignoring unknown setting '{}'", key);
                }
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_string_parses_back() {
        let settings = MaskSettings {
            history_size: 12,
            brush_size: 9,
            brush_spacing: 2.5,
            fill_tolerance: 10,
            default_color: MaskColor::Black,
            bleed: false,
            flood_fill: false,
            root_data_path: PathBuf::from("/data/masks"),
        };
        assert_eq!(MaskSettings::parse(&settings.to_config_string()), settings);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let parsed = MaskSettings::parse(
            "history_size=lots\nbrush_size=0\nbrush_spacing=0.2\nfill_tolerance=300\n\
             default_color=green\nnot_a_key=1\n# comment\ngarbage line\n",
        );
        assert_eq!(parsed, MaskSettings::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("maskpaint_settings_does_not_exist.cfg");
        assert_eq!(MaskSettings::load_from(&path), MaskSettings::default());
    }

    #[test]
    fn save_to_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("maskpaint_settings_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("maskpaint_settings.cfg");
        let mut settings = MaskSettings::default();
        settings.history_size = 3;
        settings.save_to(&path).unwrap();
        assert_eq!(MaskSettings::load_from(&path).history_size, 3);
    }
}
