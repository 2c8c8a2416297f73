use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EaslResult;

/// Name of the optional project configuration file.
pub const CONFIG_FILE_NAME: &str = "easl.toml";

/// Triangle count used when neither the caller nor the shader provides one.
pub const DEFAULT_TRIANGLES: u32 = 1;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileConfig {
    pub source_extension: String,
    pub target_extension: String,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            source_extension: "easl".to_string(),
            target_extension: "wgsl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunSettings {
    pub default_triangles: u32,
    pub window_title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: [f64; 4],
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            default_triangles: DEFAULT_TRIANGLES,
            window_title: "easl".to_string(),
            width: 800,
            height: 600,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Settle delay before coalescing queued change events.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 50 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EaslConfig {
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl EaslConfig {
    pub fn load_from_file(path: &Path) -> EaslResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> EaslResult<Self> {
        let config: EaslConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load `easl.toml` from `dir` if present, defaults otherwise.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn discover(dir: &Path) -> EaslResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
