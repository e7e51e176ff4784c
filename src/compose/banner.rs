//! The text banner: background box, separator line and up to four fields.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use image::RgbaImage;
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect;
use serde::Deserialize;

use crate::colour::Colour;
use crate::error::FontError;
use crate::template::{format_time, TIMESTAMP_CAPACITY};
use crate::text::{draw_text, Align, Pen, TextEngine};

/// Padding around and between banner rows, in pixels.
pub const SPACING: u32 = 4;

/// Where the banner sits, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BannerMode {
    None,
    Top,
    #[default]
    Bottom,
}

/// Banner appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct BannerStyle {
    pub mode: BannerMode,
    pub background: Colour,
    pub line: Colour,
    pub text: Colour,
    pub font: String,
    pub font_size: u32,
    pub shadow: bool,
}

impl Default for BannerStyle {
    fn default() -> Self {
        Self {
            mode: BannerMode::Bottom,
            background: Colour(0x4026_3A93),
            line: Colour(0x00FF_0000),
            text: Colour::WHITE,
            font: "sans".to_string(),
            font_size: 10,
            shadow: true,
        }
    }
}

/// Banner content. Each field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BannerText {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// strftime pattern for the timestamp field.
    pub timestamp: Option<String>,
    pub info: Option<String>,
    pub gmt: bool,
}

impl BannerText {
    fn has_second_row(&self) -> bool {
        self.subtitle.is_some() || self.info.is_some()
    }
}

/// Geometry of a drawn banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerLayout {
    pub top: i32,
    pub height: i32,
    /// Number of text fields rendered.
    pub fields: usize,
}

/// Banner height for a font size, with or without the second row.
pub fn banner_height(font_size: u32, second_row: bool) -> i32 {
    let font_size = f64::from(font_size);
    let spacing = f64::from(SPACING);
    let mut height = font_size + spacing * 2.0;
    if second_row {
        height += font_size * 0.8 + spacing;
    }
    height as i32
}

fn fill(image: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, colour: Colour) {
    if x1 < x0 || y1 < y0 {
        return;
    }
    let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
    let mut canvas = Blend(std::mem::take(image));
    draw_filled_rect_mut(&mut canvas, rect, colour.engine_rgba());
    *image = canvas.0;
}

/// Draw the banner onto `image`.
///
/// Fields sit at fixed offsets: title top-left, timestamp top-right at 80%
/// size, subtitle second row left at 80%, info second row right at 70%. A
/// missing field leaves the others where they are.
pub fn draw_banner(
    image: &mut RgbaImage,
    style: &BannerStyle,
    text: &BannerText,
    captured_at: DateTime<Utc>,
    engine: &mut dyn TextEngine,
) -> Result<Option<BannerLayout>, FontError> {
    if style.mode == BannerMode::None {
        return Ok(None);
    }

    let (w, h) = (image.width() as i32, image.height() as i32);
    let spacing = SPACING as i32;
    let font_size = f64::from(style.font_size);
    let height = banner_height(style.font_size, text.has_second_row());
    let top = match style.mode {
        BannerMode::Bottom => h - height,
        _ => 0,
    };

    if style.mode == BannerMode::Top {
        fill(image, 0, height + 1, w, height + 2, style.line);
    } else {
        fill(image, 0, top - 2, w, top - 1, style.line);
    }
    fill(image, 0, top, w, top + height, style.background);

    let timestamp = text
        .timestamp
        .as_deref()
        .map(|p| format_time(Some(p), captured_at, text.gmt, TIMESTAMP_CAPACITY));

    let pen = Pen {
        font: &style.font,
        size: font_size,
        colour: style.text,
        shadow: style.shadow,
    };
    let right = w - spacing;
    let mut y = top + spacing + style.font_size as i32;

    let first_row = [
        (pen, spacing, Align::Left, text.title.as_deref()),
        (pen.scaled(0.8), right, Align::Right, timestamp.as_deref()),
    ];
    let mut fields = 0;
    for (pen, x, align, field) in first_row {
        if draw_text(engine, Some(&mut *image), &pen, x, y, align, field)?.is_some() {
            fields += 1;
        }
    }

    y = (f64::from(y) + f64::from(SPACING) + font_size * 0.8) as i32;

    let second_row = [
        (pen.scaled(0.8), spacing, Align::Left, text.subtitle.as_deref()),
        (pen.scaled(0.7), right, Align::Right, text.info.as_deref()),
    ];
    for (pen, x, align, field) in second_row {
        if draw_text(engine, Some(&mut *image), &pen, x, y, align, field)?.is_some() {
            fields += 1;
        }
    }

    Ok(Some(BannerLayout {
        top,
        height,
        fields,
    }))
}
