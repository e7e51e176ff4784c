//! Image composition: effects, underlay, banner and overlay.
//!
//! Composition always works on a duplicate of the averaged base image so the
//! base can be reused for every output of a cycle. Layers go on in a fixed
//! order: underlay, banner, overlay.

pub mod banner;
pub mod effects;

pub use banner::{banner_height, draw_banner, BannerLayout, BannerMode, BannerStyle, BannerText};
pub use effects::{Effect, FlipAxis};

use chrono::{DateTime, Utc};
use image::{imageops, ImageFormat, RgbImage, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{AssetLoadError, CaptureError};
use crate::text::{preflight, TextEngine};

/// Everything drawn on top of the base image for one output.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
    pub effects: &'a [Effect],
    pub underlay: Option<&'a Path>,
    pub overlay: Option<&'a Path>,
    pub banner: &'a BannerStyle,
    pub text: &'a BannerText,
}

/// Copy `image` into a new, independent working image.
pub fn duplicate(image: &RgbImage) -> Result<RgbaImage, CaptureError> {
    let (width, height) = image.dimensions();
    let mut raw = Vec::new();
    raw.try_reserve_exact(width as usize * height as usize * 4)
        .map_err(|_| CaptureError::Allocation)?;
    for pixel in image.pixels() {
        raw.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
    }
    RgbaImage::from_raw(width, height, raw).ok_or(CaptureError::Allocation)
}

/// Load a PNG for use as an underlay or overlay.
pub fn load_layer(path: &Path) -> Result<RgbaImage, AssetLoadError> {
    let file = File::open(path).map_err(|source| AssetLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load(BufReader::new(file), ImageFormat::Png).map_err(|e| {
        AssetLoadError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    Ok(image.to_rgba8())
}

/// Composite the PNG at `path` onto the top-left of `image`.
///
/// The layer is clipped to the target and blended by its alpha. No path is a
/// no-op.
pub fn apply_layer(image: &mut RgbaImage, path: Option<&Path>) -> Result<(), AssetLoadError> {
    let Some(path) = path else {
        return Ok(());
    };
    let layer = load_layer(path)?;
    imageops::overlay(image, &layer, 0, 0);
    Ok(())
}

/// Underlay: drawn first, beneath the banner and overlay.
pub fn apply_underlay(image: &mut RgbaImage, path: Option<&Path>) -> Result<(), AssetLoadError> {
    apply_layer(image, path)
}

/// Overlay: drawn last, above everything else.
pub fn apply_overlay(image: &mut RgbaImage, path: Option<&Path>) -> Result<(), AssetLoadError> {
    apply_layer(image, path)
}

/// Build the finished image for one output.
///
/// A missing or unreadable layer is logged and skipped. When the banner font
/// fails its pre-flight check the banner is left off entirely.
pub fn compose(
    base: &RgbImage,
    layers: &Layers<'_>,
    captured_at: DateTime<Utc>,
    engine: &mut dyn TextEngine,
) -> Result<RgbaImage, CaptureError> {
    let mut image = duplicate(base)?;

    for effect in layers.effects {
        image = effects::apply(image, effect);
    }

    if let Err(e) = apply_underlay(&mut image, layers.underlay) {
        log::error!("{}", e);
    }

    if layers.banner.mode != BannerMode::None {
        let style = layers.banner;
        match preflight(engine, &style.font, f64::from(style.font_size)) {
            Ok(()) => {
                if let Err(e) = draw_banner(&mut image, style, layers.text, captured_at, engine) {
                    log::warn!("Error drawing banner: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Unable to load font '{}': {}", style.font, e);
                log::warn!("Disabling the banner.");
            }
        }
    }

    if let Err(e) = apply_overlay(&mut image, layers.overlay) {
        log::error!("{}", e);
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::testing::FixedEngine;
    use chrono::TimeZone;
    use image::{Rgb, Rgba};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn no_banner() -> BannerStyle {
        BannerStyle {
            mode: BannerMode::None,
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_is_independent() {
        let base = RgbImage::from_pixel(3, 2, Rgb([9, 8, 7]));
        let mut copy = duplicate(&base).unwrap();
        assert_eq!(copy.dimensions(), (3, 2));
        assert!(copy.pixels().all(|p| p.0 == [9, 8, 7, 255]));

        copy.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(base.get_pixel(0, 0).0, [9, 8, 7]);
    }

    #[test]
    fn test_missing_layer_path_is_noop() {
        let mut image = RgbaImage::new(2, 2);
        assert!(apply_overlay(&mut image, None).is_ok());
    }

    #[test]
    fn test_missing_layer_file_is_open_error() {
        let mut image = RgbaImage::new(2, 2);
        let err = apply_underlay(&mut image, Some(Path::new("/nonexistent/logo.png"))).unwrap_err();
        assert!(matches!(err, AssetLoadError::Open { .. }));
    }

    #[test]
    fn test_non_png_layer_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.jpg");
        RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])).save(&path).unwrap();

        let mut image = RgbaImage::new(2, 2);
        let err = apply_overlay(&mut image, Some(&path)).unwrap_err();
        assert!(matches!(err, AssetLoadError::Format { .. }));
    }

    #[test]
    fn test_layer_is_clipped_to_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])).save(&path).unwrap();

        let mut image = RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 255]));
        apply_overlay(&mut image, Some(&path)).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert!(image.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_transparent_layer_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clear.png");
        RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0])).save(&path).unwrap();

        let mut image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        apply_overlay(&mut image, Some(&path)).unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_overlay_drawn_above_underlay() {
        let dir = TempDir::new().unwrap();
        let under = dir.path().join("under.png");
        let over = dir.path().join("over.png");
        RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])).save(&under).unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])).save(&over).unwrap();

        let base = RgbImage::new(2, 2);
        let style = no_banner();
        let text = BannerText::default();
        let layers = Layers {
            effects: &[],
            underlay: Some(&under),
            overlay: Some(&over),
            banner: &style,
            text: &text,
        };
        let mut engine = FixedEngine::default();
        let out = compose(&base, &layers, now(), &mut engine).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_bad_font_skips_banner_but_keeps_output() {
        let base = RgbImage::from_pixel(40, 40, Rgb([1, 1, 1]));
        let style = BannerStyle {
            font: "missing".to_string(),
            ..Default::default()
        };
        let text = BannerText {
            title: Some("x".to_string()),
            ..Default::default()
        };
        let layers = Layers {
            effects: &[],
            underlay: None,
            overlay: None,
            banner: &style,
            text: &text,
        };
        let mut engine = FixedEngine {
            bad_font: Some("missing".to_string()),
            ..Default::default()
        };
        let out = compose(&base, &layers, now(), &mut engine).unwrap();
        assert!(out.pixels().all(|p| p.0 == [1, 1, 1, 255]));
        assert!(engine.draws().is_empty());
    }

    #[test]
    fn test_compose_never_mutates_base() {
        let base = RgbImage::from_pixel(30, 30, Rgb([50, 60, 70]));
        let snapshot = base.clone();
        let style = BannerStyle::default();
        let text = BannerText {
            title: Some("t".to_string()),
            ..Default::default()
        };
        let effects = [Effect::Invert, Effect::Rotate(90)];
        let layers = Layers {
            effects: &effects,
            underlay: None,
            overlay: None,
            banner: &style,
            text: &text,
        };
        let mut engine = FixedEngine::default();
        for _ in 0..3 {
            compose(&base, &layers, now(), &mut engine).unwrap();
        }
        assert_eq!(base, snapshot);
    }
}
