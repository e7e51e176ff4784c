//! Banner text rendering: alignment and drop shadows on top of a font engine.

mod engine;

pub use engine::{RusttypeEngine, TextEngine};

use image::RgbaImage;

use crate::colour::Colour;
use crate::error::FontError;

/// Horizontal anchoring of a text run relative to its x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Bounding box of a text run, in pixels.
///
/// `y` coordinates are measured from the baseline the run was placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Font, size and colour for one run of text.
#[derive(Debug, Clone, Copy)]
pub struct Pen<'a> {
    pub font: &'a str,
    /// Size in points.
    pub size: f64,
    /// Colour as configured (`0xAARRGGBB`, alpha is transparency).
    pub colour: Colour,
    pub shadow: bool,
}

impl Pen<'_> {
    /// Same pen at a fraction of the size.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            size: self.size * factor,
            ..*self
        }
    }
}

/// Where a run of text ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// X coordinate after alignment.
    pub x: i32,
    pub y: i32,
    /// Box measured with the run anchored at the origin.
    pub bbox: BBox,
}

/// Check that `font` can be loaded and rasterised at `size`.
pub fn preflight(engine: &mut dyn TextEngine, font: &str, size: f64) -> Result<(), FontError> {
    engine
        .measure_or_draw(None, font, size, 0, 0, "", Colour::BLACK)
        .map(|_| ())
}

/// Render `text` at (`x`, `y`), `y` being the baseline.
///
/// With no `image` only the measurement happens. A shadow is drawn first,
/// one pixel right and down, keeping only the pen's alpha. Alignment shifts
/// `x` by the measured right edge: half of it for [`Align::Center`], all of
/// it for [`Align::Right`]. Absent text renders nothing.
pub fn draw_text(
    engine: &mut dyn TextEngine,
    mut image: Option<&mut RgbaImage>,
    pen: &Pen<'_>,
    x: i32,
    y: i32,
    align: Align,
    text: Option<&str>,
) -> Result<Option<Placement>, FontError> {
    let Some(text) = text else {
        return Ok(None);
    };

    if pen.shadow {
        let shadow = Pen {
            colour: pen.colour.alpha_only(),
            shadow: false,
            ..*pen
        };
        draw_text(
            engine,
            image.as_deref_mut(),
            &shadow,
            x + 1,
            y + 1,
            align,
            Some(text),
        )?;
    }

    let colour = pen.colour.for_engine();

    let bbox = engine.measure_or_draw(None, pen.font, pen.size, 0, 0, text, colour)?;
    let x = match align {
        Align::Left => x,
        Align::Center => x - bbox.right / 2,
        Align::Right => x - bbox.right,
    };

    if let Some(image) = image {
        engine.measure_or_draw(Some(image), pen.font, pen.size, x, y, text, colour)?;
    }

    Ok(Some(Placement { x, y, bbox }))
}
