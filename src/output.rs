//! Output encoding and delivery.
//!
//! Each output target gets its own composed copy of the averaged image,
//! encoded as JPEG or PNG and written to a file or standard output.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, RgbImage, RgbaImage};
use serde::Deserialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::compose::{compose, BannerStyle, BannerText, Effect, Layers};
use crate::error::DeliverError;
use crate::template::{format_time, FILENAME_CAPACITY};
use crate::text::TextEngine;

/// Filename that selects standard output.
pub const STDOUT_TARGET: &str = "-";

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Image container for an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    #[default]
    Jpeg,
    Png,
}

/// Encoder settings for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Quality 0-100.
    Jpeg { quality: u8 },
    /// Compression level 0-9, or the encoder default.
    Png { compression: Option<u8> },
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl OutputFormat {
    /// Build the format for `kind` from an optional level setting.
    pub fn new(kind: ImageKind, level: Option<u8>) -> Self {
        match kind {
            ImageKind::Jpeg => OutputFormat::Jpeg {
                quality: level.unwrap_or(DEFAULT_JPEG_QUALITY).min(100),
            },
            ImageKind::Png => OutputFormat::Png {
                compression: level.map(|l| l.min(9)),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "JPEG",
            OutputFormat::Png { .. } => "PNG",
        }
    }
}

fn png_compression(level: Option<u8>) -> CompressionType {
    match level {
        Some(0..=3) => CompressionType::Fast,
        Some(7..) => CompressionType::Best,
        _ => CompressionType::Default,
    }
}

/// Everything needed to produce one output in the current cycle.
///
/// Built fresh every cycle from the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputPlan {
    /// strftime-style filename pattern, or `-` for standard output.
    pub path: String,
    pub format: OutputFormat,
    pub effects: Vec<Effect>,
    pub underlay: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
    pub banner: BannerStyle,
    pub text: BannerText,
}

impl OutputPlan {
    pub fn layers(&self) -> Layers<'_> {
        Layers {
            effects: &self.effects,
            underlay: self.underlay.as_deref(),
            overlay: self.overlay.as_deref(),
            banner: &self.banner,
            text: &self.text,
        }
    }
}

/// Encode `image` into memory.
pub fn encode(image: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Jpeg { quality } => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))?;
        }
        OutputFormat::Png { compression } => {
            let encoder = PngEncoder::new_with_quality(
                &mut bytes,
                png_compression(compression),
                FilterType::Adaptive,
            );
            image.write_with_encoder(encoder)?;
        }
    }
    Ok(bytes)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), DeliverError> {
    let mut file = File::create(path).map_err(|source| DeliverError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let result = file.write_all(bytes).and_then(|()| file.flush());
    drop(file);
    result.map_err(|source| {
        // never leave a partial image behind
        let _ = std::fs::remove_file(path);
        DeliverError::Write {
            target: path.display().to_string(),
            source,
        }
    })
}

fn write_stdout(bytes: &[u8]) -> Result<(), DeliverError> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(bytes)
        .and_then(|()| lock.flush())
        .map_err(|source| DeliverError::Write {
            target: "stdout".to_string(),
            source,
        })
}

fn flatten(image: RgbaImage) -> RgbImage {
    DynamicImage::ImageRgba8(image).into_rgb8()
}

/// Compose and encode one output without writing it anywhere.
pub fn render(
    base: &RgbImage,
    plan: &OutputPlan,
    engine: &mut dyn TextEngine,
    captured_at: DateTime<Utc>,
) -> Result<Vec<u8>, DeliverError> {
    let composed =
        compose(base, &plan.layers(), captured_at, engine).map_err(|_| DeliverError::Allocation)?;
    encode(&flatten(composed), plan.format).map_err(|source| DeliverError::Encode {
        target: plan.path.clone(),
        source,
    })
}

/// Deliver one output for the current cycle.
///
/// Returns the expanded target name. Standard output is refused in background
/// mode before anything is composed or written.
pub fn deliver(
    base: &RgbImage,
    plan: &OutputPlan,
    engine: &mut dyn TextEngine,
    captured_at: DateTime<Utc>,
    gmt: bool,
    daemonized: bool,
) -> Result<String, DeliverError> {
    let target = format_time(Some(&plan.path), captured_at, gmt, FILENAME_CAPACITY);
    let to_stdout = target == STDOUT_TARGET;
    if to_stdout && daemonized {
        return Err(DeliverError::StdoutInBackground);
    }

    let bytes = render(base, plan, engine, captured_at)?;

    if to_stdout {
        log::info!("Writing {} image to stdout.", plan.format.name());
        write_stdout(&bytes)?;
    } else {
        log::info!("Writing {} image to '{}'.", plan.format.name(), target);
        write_file(Path::new(&target), &bytes)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::BannerMode;
    use crate::text::testing::FixedEngine;
    use chrono::TimeZone;
    use image::Rgb;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 0).unwrap()
    }

    fn plan(path: &str, format: OutputFormat) -> OutputPlan {
        OutputPlan {
            path: path.to_string(),
            format,
            banner: BannerStyle {
                mode: BannerMode::None,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_output_format_new() {
        assert_eq!(
            OutputFormat::new(ImageKind::Jpeg, None),
            OutputFormat::Jpeg { quality: 90 }
        );
        assert_eq!(
            OutputFormat::new(ImageKind::Jpeg, Some(250)),
            OutputFormat::Jpeg { quality: 100 }
        );
        assert_eq!(
            OutputFormat::new(ImageKind::Png, Some(12)),
            OutputFormat::Png {
                compression: Some(9)
            }
        );
    }

    #[test]
    fn test_png_compression_levels() {
        assert_eq!(png_compression(Some(0)), CompressionType::Fast);
        assert_eq!(png_compression(Some(5)), CompressionType::Default);
        assert_eq!(png_compression(Some(9)), CompressionType::Best);
        assert_eq!(png_compression(None), CompressionType::Default);
    }

    #[test]
    fn test_png_output_is_lossless() {
        let base = RgbImage::from_pixel(5, 4, Rgb([12, 34, 56]));
        let bytes = encode(&base, OutputFormat::Png { compression: None }).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, base);
    }

    #[test]
    fn test_jpeg_output_has_magic() {
        let base = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
        let bytes = encode(&base, OutputFormat::Jpeg { quality: 75 }).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_deliver_expands_filename() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/snap-%Y%m%d-%H%M.jpg", dir.path().display());
        let base = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let mut engine = FixedEngine::default();

        let target = deliver(
            &base,
            &plan(&pattern, OutputFormat::default()),
            &mut engine,
            now(),
            true,
            false,
        )
        .unwrap();

        assert!(target.ends_with("snap-20240309-1745.jpg"));
        assert!(Path::new(&target).is_file());
    }

    #[test]
    fn test_deliver_keeps_unknown_conversion_in_filename() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/shot-50%!.png", dir.path().display());
        let base = RgbImage::from_pixel(3, 3, Rgb([9, 8, 7]));
        let mut engine = FixedEngine::default();

        let target = deliver(
            &base,
            &plan(&pattern, OutputFormat::Png { compression: None }),
            &mut engine,
            now(),
            true,
            false,
        )
        .unwrap();

        assert_eq!(target, pattern);
        assert!(dir.path().join("shot-50%!.png").is_file());
    }

    #[test]
    fn test_stdout_in_background_fails_first() {
        let base = RgbImage::new(2, 2);
        let mut engine = FixedEngine::default();
        let err = deliver(
            &base,
            &plan("-", OutputFormat::default()),
            &mut engine,
            now(),
            true,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, DeliverError::StdoutInBackground));
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn test_unwritable_target_is_open_error() {
        let base = RgbImage::new(2, 2);
        let mut engine = FixedEngine::default();
        let err = deliver(
            &base,
            &plan("/nonexistent/dir/out.png", OutputFormat::Png { compression: None }),
            &mut engine,
            now(),
            true,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DeliverError::Open { .. }));
        assert!(!err.is_fatal());
    }
}
