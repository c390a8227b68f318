// config.rs
//
// Viewer configuration:
// - JSON file, every field optional (missing fields take defaults)
// - Lookup: --config <path> -> env PANORAMA_CONFIG -> <exe_dir>/panorama.json
//   -> ./panorama.json -> built-in defaults
// - Individual CLI flags override fields afterwards (see main.rs)

use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::camera::CameraState;
use crate::error::{RenderError, RenderResult};
use crate::renderer::DEFAULT_GRID_RESOLUTION;

pub const CONFIG_ENV: &str = "PANORAMA_CONFIG";
pub const CONFIG_FILE: &str = "panorama.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Software,
    Gpu,
}

impl FromStr for Backend {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "cpu" => Ok(Backend::Software),
            "gpu" | "wgpu" => Ok(Backend::Gpu),
            other => Err(RenderError::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Texture filtering on the GPU path. `Nearest` matches the software
/// rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuFilter {
    #[default]
    Nearest,
    Linear,
}

impl FromStr for GpuFilter {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(GpuFilter::Nearest),
            "linear" | "bilinear" => Ok(GpuFilter::Linear),
            other => Err(RenderError::Config(format!("unknown gpu filter '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Side of the square panorama buffer, a power of two.
    pub texture_resolution: u32,
    /// Control-grid subdivisions per axis.
    pub grid_resolution: u32,
    /// Available area; the viewport is the largest `aspect_ratio` fit.
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
    /// Heading degrees per horizontally dragged pixel.
    pub sensitivity: f32,
    /// Pitch degrees per vertically dragged pixel.
    pub pitch_sensitivity: f32,
    pub backend: Backend,
    pub gpu_filter: GpuFilter,
    pub camera: CameraState,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            texture_resolution: 2048,
            grid_resolution: DEFAULT_GRID_RESOLUTION,
            width: 1280,
            height: 720,
            aspect_ratio: 16.0 / 9.0,
            sensitivity: 1.0,
            pitch_sensitivity: 0.5,
            backend: Backend::Software,
            gpu_filter: GpuFilter::Nearest,
            camera: CameraState::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> RenderResult<Self> {
        let config: ViewerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::info!("loaded config {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if !self.texture_resolution.is_power_of_two() {
            return Err(RenderError::Config(format!(
                "texture_resolution {} is not a power of two",
                self.texture_resolution
            )));
        }
        if self.grid_resolution == 0 {
            return Err(RenderError::Config("grid_resolution must be at least 1".into()));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(RenderError::Config(format!(
                "aspect_ratio {} must be positive",
                self.aspect_ratio
            )));
        }
        if !(self.sensitivity.is_finite() && self.pitch_sensitivity.is_finite()) {
            return Err(RenderError::Config("sensitivity must be finite".into()));
        }
        Ok(())
    }

    /// Load the config selected by CLI/env, or a config file found next to
    /// the executable or in the working directory, else the defaults.
    pub fn resolve(args: &[String]) -> RenderResult<Self> {
        match config_path(args) {
            Some(path) => Self::load(&path),
            None => {
                log::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Config path from `--config <path>`, then `PANORAMA_CONFIG`, then the
/// default file locations.
pub fn config_path(args: &[String]) -> Option<PathBuf> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == "--config" {
            if let Some(v) = it.next() {
                return Some(PathBuf::from(v));
            }
        }
    }

    if let Ok(v) = std::env::var(CONFIG_ENV) {
        if !v.trim().is_empty() {
            return Some(PathBuf::from(v));
        }
    }

    find_config_file()
}

/// Find panorama.json by searching:
/// 1) <exe_dir>/panorama.json
/// 2) ./panorama.json
fn find_config_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join(CONFIG_FILE);
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from(CONFIG_FILE);
    if p.exists() {
        return Some(p);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ViewerConfig::from_json(r#"{ "grid_resolution": 16, "camera": { "fov": 60 } }"#)
                .unwrap();
        assert_eq!(config.grid_resolution, 16);
        assert_eq!(config.texture_resolution, 2048);
        assert_eq!(config.camera.fov, 60.0);
        assert_eq!(config.camera.pitch, 90.0);
        assert_eq!(config.backend, Backend::Software);
        assert_eq!(config.pitch_sensitivity, 0.5);
    }

    #[test]
    fn parses_enums() {
        let config =
            ViewerConfig::from_json(r#"{ "backend": "gpu", "gpu_filter": "linear" }"#).unwrap();
        assert_eq!(config.backend, Backend::Gpu);
        assert_eq!(config.gpu_filter, GpuFilter::Linear);
        assert_eq!("CPU".parse::<Backend>().unwrap(), Backend::Software);
        assert!("vulkan".parse::<Backend>().is_err());
        assert!("cubic".parse::<GpuFilter>().is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(ViewerConfig::from_json(r#"{ "texture_resolution": 1000 }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "grid_resolution": 0 }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "aspect_ratio": -1.0 }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "pitch_sensitivity": 1e40 }"#).is_err());
        assert!(ViewerConfig::from_json("not json").is_err());
    }

    #[test]
    fn config_flag_wins() {
        let args: Vec<String> = ["prog", "--config", "custom.json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(config_path(&args), Some(PathBuf::from("custom.json")));
    }

    #[test]
    fn round_trips_through_json() {
        let config = ViewerConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(ViewerConfig::from_json(&text).unwrap(), config);
    }
}
