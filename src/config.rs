//! Configuration file handling for stillcam.
//!
//! Loads configuration from `~/.config/stillcam/config.toml` or a custom path.
//! Command-line options are layered on top with [`crate::cli::Args::apply`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::colour::Colour;
use crate::compose::{BannerMode, BannerStyle, BannerText, Effect};
use crate::output::{ImageKind, OutputFormat, OutputPlan};
use crate::source::{Palette, SourceParams};

/// Timestamp shown in the banner unless configured otherwise.
pub const DEFAULT_TIMESTAMP: &str = "%Y-%m-%d %H:%M (%Z)";

/// Largest banner font size accepted, in points.
pub const MAX_FONT_SIZE: u32 = 1000;

/// Configuration file structure for stillcam.
///
/// Every option can be set here; a few (`config` itself among them) only make
/// sense on the command line and are rejected as unknown keys.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub banner: BannerConfig,
    pub image: ImageConfig,
    #[serde(rename = "output")]
    pub outputs: Vec<OutputConfig>,
    /// Seconds between captures. Zero captures once and exits.
    #[serde(rename = "loop")]
    pub loop_secs: u64,
    /// Phase of each capture within the loop period, in seconds.
    pub offset: u64,
    /// Shell command run after each capture. strftime tokens are expanded.
    pub exec: Option<String>,
    /// Use UTC rather than local time for all templates.
    pub gmt: bool,
    pub background: bool,
    pub pid: Option<PathBuf>,
    /// `stderr`, `syslog`, `file:<path>` or a bare path.
    pub log: Option<String>,
    pub verbose: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: String,
    pub input: Option<String>,
    pub tuner: u32,
    pub frequency: u64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub palette: Palette,
    pub timeout: u64,
    pub delay: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let params = SourceParams::default();
        Self {
            name: params.device,
            input: params.input,
            tuner: params.tuner,
            frequency: params.frequency,
            width: params.width,
            height: params.height,
            fps: params.fps,
            palette: params.palette,
            timeout: params.timeout,
            delay: params.delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Frames averaged into each image.
    pub frames: u32,
    /// Frames discarded before capturing.
    pub skip: u32,
    /// Write the first raw frame here, templated like output names.
    pub dumpframe: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames: 1,
            skip: 0,
            dumpframe: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BannerConfig {
    pub mode: BannerMode,
    pub background: Colour,
    pub line: Colour,
    pub text: Colour,
    pub font: String,
    pub font_size: u32,
    pub shadow: bool,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub info: Option<String>,
    /// strftime pattern; empty disables the timestamp.
    pub timestamp: Option<String>,
}

impl Default for BannerConfig {
    fn default() -> Self {
        let style = BannerStyle::default();
        Self {
            mode: style.mode,
            background: style.background,
            line: style.line,
            text: style.text,
            font: style.font,
            font_size: style.font_size,
            shadow: style.shadow,
            title: None,
            subtitle: None,
            info: None,
            timestamp: Some(DEFAULT_TIMESTAMP.to_string()),
        }
    }
}

/// Settings shared by every output unless overridden.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub format: ImageKind,
    /// JPEG quality (0-100) or PNG compression (0-9).
    pub quality: Option<u8>,
    pub effects: Vec<Effect>,
    pub underlay: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
}

/// One `[[output]]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub path: String,
    pub format: Option<ImageKind>,
    pub quality: Option<u8>,
    pub banner: Option<BannerMode>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub info: Option<String>,
    pub timestamp: Option<String>,
    pub effects: Option<Vec<Effect>>,
    pub underlay: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
}

impl OutputConfig {
    /// An output with nothing overridden.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: None,
            quality: None,
            banner: None,
            title: None,
            subtitle: None,
            info: None,
            timestamp: None,
            effects: None,
            underlay: None,
            overlay: None,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.is_empty()).cloned()
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// With no path, the default location is tried and a missing file yields
    /// the defaults. A path given explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_path(), false),
        };

        if !required && !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| ConfigError::ParseError { path, source: e })
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outputs.is_empty() {
            return Err(ConfigError::Invalid("no output filename given".to_string()));
        }
        if self.capture.frames == 0 {
            return Err(ConfigError::Invalid("frames must be at least 1".to_string()));
        }
        if self.device.width == 0 || self.device.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "invalid resolution {}x{}",
                self.device.width, self.device.height
            )));
        }
        if self.outputs.iter().any(|o| o.path.is_empty()) {
            return Err(ConfigError::Invalid("empty output filename".to_string()));
        }
        if self.banner.font_size == 0 || self.banner.font_size > MAX_FONT_SIZE {
            return Err(ConfigError::Invalid(format!(
                "font size {} is outside 1..={}",
                self.banner.font_size, MAX_FONT_SIZE
            )));
        }
        Ok(())
    }

    /// Parameters for opening the configured device.
    pub fn source_params(&self) -> SourceParams {
        let d = &self.device;
        SourceParams {
            device: d.name.clone(),
            input: d.input.clone(),
            tuner: d.tuner,
            frequency: d.frequency,
            width: d.width,
            height: d.height,
            fps: d.fps,
            palette: d.palette,
            timeout: d.timeout,
            delay: d.delay,
        }
    }

    /// Take on the geometry the device actually negotiated.
    pub fn adopt_geometry(&mut self, width: u32, height: u32) {
        if (width, height) != (self.device.width, self.device.height) {
            log::info!(
                "Adjusting resolution from {}x{} to {}x{}.",
                self.device.width,
                self.device.height,
                width,
                height
            );
            self.device.width = width;
            self.device.height = height;
        }
    }

    fn banner_style(&self, mode: BannerMode) -> BannerStyle {
        let b = &self.banner;
        BannerStyle {
            mode,
            background: b.background,
            line: b.line,
            text: b.text,
            font: b.font.clone(),
            font_size: b.font_size,
            shadow: b.shadow,
        }
    }

    /// Resolve every output into a fresh plan for one cycle.
    pub fn plans(&self) -> Vec<OutputPlan> {
        let b = &self.banner;
        let img = &self.image;
        self.outputs
            .iter()
            .map(|out| {
                let kind = out.format.unwrap_or(img.format);
                OutputPlan {
                    path: out.path.clone(),
                    format: OutputFormat::new(kind, out.quality.or(img.quality)),
                    effects: out.effects.clone().unwrap_or_else(|| img.effects.clone()),
                    underlay: out.underlay.clone().or_else(|| img.underlay.clone()),
                    overlay: out.overlay.clone().or_else(|| img.overlay.clone()),
                    banner: self.banner_style(out.banner.unwrap_or(b.mode)),
                    text: BannerText {
                        title: non_empty(out.title.as_ref().or(b.title.as_ref())),
                        subtitle: non_empty(out.subtitle.as_ref().or(b.subtitle.as_ref())),
                        info: non_empty(out.info.as_ref().or(b.info.as_ref())),
                        timestamp: non_empty(out.timestamp.as_ref().or(b.timestamp.as_ref())),
                        gmt: self.gmt,
                    },
                }
            })
            .collect()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("stillcam").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/stillcam/config.toml")
        })
}
