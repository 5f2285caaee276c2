pub mod capture;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod transforms;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use color_eyre::Result;
use serde::{Deserialize, Serialize};

pub use capture::{Frame, FrameSource, PixelDepth, PixelFormat};
pub use display::{annotate, Viewer};
pub use error::PipelineError;
pub use pipeline::{
    DisplayContext, ExitReason, FpsCounter, FpsMode, Hooks, PipelineEngine, QuitSignal,
    RunSummary,
};

/// Prefix of environment variables overriding the configuration
pub const ENV_PREFIX: &str = "LIVEPROC";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub display: DisplayConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Device index, device path, image directory, URL or `pattern[:n]`
    pub identifier: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

impl SourceConfig {
    /// Requested resolution, only when both dimensions are set
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            identifier: "0".into(),
            width: None,
            height: None,
            fps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayBackend {
    Sdl,
    Headless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: if cfg!(feature = "sdl-display") {
                DisplayBackend::Sdl
            } else {
                DisplayBackend::Headless
            },
            width: 800,
            height: 600,
            title: "liveproc".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Artificial work done by the default process hook
    pub process_delay_ms: u64,
    pub fps_mode: FpsMode,
    /// Stop after this many loop iterations
    pub max_frames: Option<u64>,
    /// Log the frame rate every N iterations, 0 disables
    pub log_every: u64,
}

impl PipelineConfig {
    pub fn process_delay(&self) -> Duration {
        Duration::from_millis(self.process_delay_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            process_delay_ms: 25,
            fps_mode: FpsMode::Average,
            max_frames: None,
            log_every: 100,
        }
    }
}

impl Config {
    /// Defaults, then the optional config file, then `LIVEPROC__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
