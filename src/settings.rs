use std::path::PathBuf;

use crate::components::colors::MaskColor;

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

/// Persisted editor preferences.  Stored as `key=value` lines; anything
/// missing or unparsable falls back to the default for that key.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Brush diameter in image pixels.
    pub brush_size: f64,
    pub mask_color: MaskColor,
    pub opacity: f32,
    pub max_undo_steps: usize,
    pub history_memory_mb: usize,
    /// Fractional scale change per wheel notch.
    pub wheel_zoom_step: f64,
    /// Viewport-space distance to the first polygon vertex that closes it.
    pub polygon_close_radius: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            brush_size: 10.0,
            mask_color: MaskColor::BLACK,
            opacity: 0.5,
            max_undo_steps: 50,
            history_memory_mb: 256,
            wheel_zoom_step: 0.02,
            polygon_close_radius: 10.0,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/maskfe/maskfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MaskFE\maskfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/MaskFE/maskfe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("maskfe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).unwrap_or_else(|_| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.parent().map(|d| d.to_string_lossy().into_owned()))
                    .unwrap_or_default()
            });
            let config_dir = PathBuf::from(appdata).join("MaskFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("MaskFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("maskfe_settings.cfg")))
        }
    }

    /// Memory cap handed to the history, in bytes.
    pub fn history_memory_bytes(&self) -> usize {
        self.history_memory_mb.saturating_mul(1024 * 1024)
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "brush_size={}\n\
             mask_color={}\n\
             opacity={}\n\
             max_undo_steps={}\n\
             history_memory_mb={}\n\
             wheel_zoom_step={}\n\
             polygon_close_radius={}\n",
            self.brush_size,
            self.mask_color,
            self.opacity,
            self.max_undo_steps,
            self.history_memory_mb,
            self.wheel_zoom_step,
            self.polygon_close_radius,
        )
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "brush_size" => {
                    if let Ok(v) = val.parse::<f64>()
                        && v.is_finite()
                        && v >= 1.0
                    {
                        s.brush_size = v;
                    }
                }
                "mask_color" => {
                    if let Ok(c) = MaskColor::parse(val) {
                        s.mask_color = c;
                    }
                }
                "opacity" => {
                    if let Ok(v) = val.parse::<f32>()
                        && (0.0..=1.0).contains(&v)
                    {
                        s.opacity = v;
                    }
                }
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_undo_steps = v.clamp(1, 1000);
                    }
                }
                "history_memory_mb" => {
                    if let Ok(v) = val.parse::<usize>()
                        && v > 0
                    {
                        s.history_memory_mb = v;
                    }
                }
                "wheel_zoom_step" => {
                    if let Ok(v) = val.parse::<f64>()
                        && v > 0.0
                        && v < 1.0
                    {
                        s.wheel_zoom_step = v;
                    }
                }
                "polygon_close_radius" => {
                    if let Ok(v) = val.parse::<f64>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.polygon_close_radius = v;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        let _ = std::fs::write(path, self.to_config_string());
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }
}
