//! Unit tests for text placement, templating and composition through the
//! public API.

use chrono::{TimeZone, Utc};
use image::{Rgb, RgbImage, RgbaImage};
use stillcam::colour::Colour;
use stillcam::compose::{
    banner_height, draw_banner, duplicate, BannerMode, BannerStyle, BannerText, Effect,
};
use stillcam::error::FontError;
use stillcam::output::{self, OutputFormat, OutputPlan};
use stillcam::template::{expand_time, format_time, FILENAME_CAPACITY};
use stillcam::text::{draw_text, Align, BBox, Pen, TextEngine};
use tempfile::TempDir;

/// Records every call; glyphs are `size` pixels wide.
#[derive(Default)]
struct RecordingEngine {
    calls: Vec<(bool, i32, i32, String, Colour)>,
}

impl RecordingEngine {
    fn drawn(&self) -> Vec<&(bool, i32, i32, String, Colour)> {
        self.calls.iter().filter(|c| c.0).collect()
    }
}

impl TextEngine for RecordingEngine {
    fn measure_or_draw(
        &mut self,
        target: Option<&mut RgbaImage>,
        _font: &str,
        size: f64,
        x: i32,
        y: i32,
        text: &str,
        colour: Colour,
    ) -> Result<BBox, FontError> {
        self.calls
            .push((target.is_some(), x, y, text.to_string(), colour));
        let advance = size.round() as i32 * text.chars().count() as i32;
        Ok(BBox {
            left: x,
            top: y - size as i32,
            right: x + advance,
            bottom: y,
        })
    }
}

fn pen(shadow: bool) -> Pen<'static> {
    Pen {
        font: "sans",
        size: 10.0,
        colour: Colour(0x40FF_8000),
        shadow,
    }
}

fn placed_x(align: Align, shadow: bool) -> i32 {
    let mut engine = RecordingEngine::default();
    let mut image = RgbaImage::new(200, 50);
    draw_text(&mut engine, Some(&mut image), &pen(shadow), 100, 30, align, Some("abcde"))
        .unwrap()
        .unwrap()
        .x
}

#[test]
fn test_alignment_law() {
    let left = placed_x(Align::Left, false);
    let center = placed_x(Align::Center, false);
    let right = placed_x(Align::Right, false);
    let width = 50;
    assert_eq!(left, 100);
    assert_eq!(right, left - width);
    assert!((center - (left - width / 2)).abs() <= 1);
}

#[test]
fn test_shadow_law() {
    let mut plain = RecordingEngine::default();
    let mut shadowed = RecordingEngine::default();
    let mut image = RgbaImage::new(200, 50);

    let a = draw_text(&mut plain, Some(&mut image), &pen(false), 10, 30, Align::Left, Some("hi"))
        .unwrap()
        .unwrap();
    let b = draw_text(&mut shadowed, Some(&mut image), &pen(true), 10, 30, Align::Left, Some("hi"))
        .unwrap()
        .unwrap();
    assert_eq!(a, b);

    let drawn = shadowed.drawn();
    assert_eq!(drawn.len(), 2);
    // shadow first, offset by one pixel, alpha kept but no colour
    assert_eq!((drawn[0].1, drawn[0].2), (11, 31));
    assert_eq!(drawn[0].4.rgb(), [0, 0, 0]);
    assert_eq!(drawn[0].4.alpha(), 0x20);
    assert_eq!((drawn[1].1, drawn[1].2), (10, 30));
    // alpha halved before reaching the engine
    assert_eq!(drawn[1].4, Colour(0x20FF_8000));
}

#[test]
fn test_title_only_banner_uses_one_row() {
    let mut engine = RecordingEngine::default();
    let mut image = RgbaImage::new(120, 80);
    let style = BannerStyle {
        mode: BannerMode::Bottom,
        shadow: false,
        ..Default::default()
    };
    let text = BannerText {
        title: Some("Front door".to_string()),
        ..Default::default()
    };

    let layout = draw_banner(&mut image, &style, &text, Utc::now(), &mut engine)
        .unwrap()
        .unwrap();
    assert_eq!(layout.height, banner_height(style.font_size, false));
    assert_eq!(layout.fields, 1);
    assert_eq!(engine.drawn().len(), 1);
    assert_eq!(engine.drawn()[0].3, "Front door");
}

#[test]
fn test_expand_time_boundaries() {
    let at = Utc.with_ymd_and_hms(2020, 2, 29, 23, 59, 58).unwrap();
    assert_eq!(expand_time("", at, true).unwrap(), "");

    let pattern = "%Y-%m-%d ".repeat(1000);
    let expanded = expand_time(&pattern, at, true).unwrap();
    assert_eq!(expanded, "2020-02-29 ".repeat(1000));
    assert_eq!(expanded.len(), 11_000);
}

#[test]
fn test_format_time_truncates_at_capacity() {
    let at = Utc.with_ymd_and_hms(2020, 2, 29, 23, 59, 58).unwrap();
    let pattern = "x".repeat(FILENAME_CAPACITY + 100);
    let out = format_time(Some(&pattern), at, true, FILENAME_CAPACITY);
    assert_eq!(out.len(), FILENAME_CAPACITY - 1);
    assert_eq!(format_time(None, at, true, FILENAME_CAPACITY), "");
}

#[test]
fn test_delivery_never_mutates_base() {
    let dir = TempDir::new().unwrap();
    let base = RgbImage::from_fn(16, 12, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 77]));
    let before = duplicate(&base).unwrap();

    let plan = OutputPlan {
        path: dir.path().join("out-%S.png").to_str().unwrap().to_string(),
        format: OutputFormat::Png { compression: Some(1) },
        effects: vec![Effect::Invert, Effect::Rotate(180)],
        banner: BannerStyle::default(),
        text: BannerText {
            title: Some("t".to_string()),
            info: Some("i".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut engine = RecordingEngine::default();
    for _ in 0..3 {
        output::deliver(&base, &plan, &mut engine, Utc::now(), true, false).unwrap();
    }

    assert_eq!(duplicate(&base).unwrap(), before);
}
