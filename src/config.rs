// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub scene: SceneConfig,
    pub assets: AssetsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Model Viewer".to_string(),
            width: 800,
            height: 600,
            resizable: true,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
    pub msaa: bool,
    pub mipmaps: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "auto".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frames_in_flight: 2,
            msaa: true,
            mipmaps: true,
        }
    }
}

/// Camera and model animation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub rotation_degrees_per_second: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub eye: [f32; 3],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            rotation_degrees_per_second: 90.0,
            fov_degrees: 45.0,
            near: 0.1,
            far: 10.0,
            eye: [2.0, 2.0, 2.0],
        }
    }
}

/// Asset locations, relative to the working directory
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub model: PathBuf,
    pub texture: PathBuf,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("assets/models/viking_room.obj"),
            texture: PathBuf::from("assets/textures/viking_room.png"),
            vertex_shader: PathBuf::from("shaders/model.vert.spv"),
            fragment_shader: PathBuf::from("shaders/model.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "model_viewer.log".to_string(),
            show_fps: true,
        }
    }
}

/// Where `Config::load` looks, relative to the working directory
pub const CONFIG_PATH: &str = "config.toml";

/// How the configuration was obtained. Runs before the logger exists,
/// so `main` reports it afterwards.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    NotFound(PathBuf),
    /// File exists but could not be read or parsed; defaults are in use
    Invalid(anyhow::Error),
}

impl Config {
    /// Load `config.toml`, falling back to defaults if missing or malformed
    pub fn load() -> (Self, ConfigSource) {
        Self::load_or_default(CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, ConfigSource) {
        let path = path.as_ref();

        if !path.exists() {
            return (Config::default(), ConfigSource::NotFound(path.to_path_buf()));
        }

        match Self::load_from_path(path) {
            Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
            Err(e) => (Config::default(), ConfigSource::Invalid(e)),
        }
    }

    /// Load configuration from a specific path. A missing file gives defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Present mode requested by the user, or `None` to let the swapchain rank them
    pub fn preferred_present_mode(&self) -> Option<vk::PresentModeKHR> {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "auto" => None,
            "immediate" => Some(vk::PresentModeKHR::IMMEDIATE),
            "mailbox" => Some(vk::PresentModeKHR::MAILBOX),
            "fifo" => Some(vk::PresentModeKHR::FIFO),
            "fifo_relaxed" => Some(vk::PresentModeKHR::FIFO_RELAXED),
            other => {
                log::warn!("Unknown present mode '{}', falling back to auto", other);
                None
            }
        }
    }

    /// Number of frame slots, never zero
    pub fn frames_in_flight(&self) -> usize {
        self.graphics.max_frames_in_flight.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tutorial_window() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.frames_in_flight(), 2);
        assert!(config.preferred_present_mode().is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            title = "Viking Room"

            [graphics]
            present_mode = "FIFO"
            max_frames_in_flight = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Viking Room");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.frames_in_flight(), 3);
        assert_eq!(config.preferred_present_mode(), Some(vk::PresentModeKHR::FIFO));
        assert!(config.graphics.msaa);
        assert_eq!(config.assets.model, PathBuf::from("assets/models/viking_room.obj"));
    }

    #[test]
    fn test_zero_frames_in_flight_is_clamped() {
        let config = Config::parse("[graphics]\nmax_frames_in_flight = 0\n").unwrap();
        assert_eq!(config.frames_in_flight(), 1);
    }

    #[test]
    fn test_unknown_present_mode_falls_back_to_auto() {
        let config = Config::parse("[graphics]\npresent_mode = \"vsync-please\"\n").unwrap();
        assert!(config.preferred_present_mode().is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(Config::parse("[window\nwidth = ").is_err());
        assert!(Config::parse("[window]\nwidth = \"wide\"\n").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir()
            .join(format!("model-viewer-no-such-config-{}.toml", std::process::id()));
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.scene.fov_degrees, 45.0);

        let (_, source) = Config::load_or_default(&path);
        assert!(matches!(source, ConfigSource::NotFound(p) if p == path));
    }

    #[test]
    fn test_malformed_file_reports_error_and_uses_defaults() {
        let path = std::env::temp_dir()
            .join(format!("model-viewer-bad-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[window\nwidth=").unwrap();

        assert!(Config::load_from_path(&path).is_err());

        let (config, source) = Config::load_or_default(&path);
        assert_eq!(config.window.width, 800);
        match source {
            ConfigSource::Invalid(e) => assert!(format!("{:#}", e).contains("Failed to parse")),
            other => panic!("expected Invalid, got {:?}", other),
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_valid_file_is_reported_as_source() {
        let path = std::env::temp_dir()
            .join(format!("model-viewer-good-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = 1024\n").unwrap();

        let (config, source) = Config::load_or_default(&path);
        assert_eq!(config.window.width, 1024);
        assert!(matches!(source, ConfigSource::File(_)));

        std::fs::remove_file(&path).ok();
    }
}
