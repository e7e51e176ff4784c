//! Font engine backed by `rusttype`.

use image::{Pixel, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::BBox;
use crate::colour::Colour;
use crate::error::FontError;

/// Sizes are in points at 96 dpi.
const PIXELS_PER_POINT: f64 = 96.0 / 72.0;

/// How deep to descend into font directories.
const MAX_SEARCH_DEPTH: usize = 4;

/// Measures and draws anti-aliased text.
pub trait TextEngine {
    /// Measure `text` placed at (`x`, `y`), and draw it when `target` is set.
    ///
    /// `y` is the baseline. `colour` is on the engine's 7-bit transparency
    /// scale (see [`Colour::for_engine`]).
    #[allow(clippy::too_many_arguments)]
    fn measure_or_draw(
        &mut self,
        target: Option<&mut RgbaImage>,
        font: &str,
        size: f64,
        x: i32,
        y: i32,
        text: &str,
        colour: Colour,
    ) -> Result<BBox, FontError>;
}

/// Generic family names and the files that usually provide them.
fn aliases(name: &str) -> &'static [&'static str] {
    match name.to_ascii_lowercase().as_str() {
        "sans" | "sans-serif" => &[
            "DejaVuSans",
            "LiberationSans-Regular",
            "FreeSans",
            "NotoSans-Regular",
            "Arial",
        ],
        "serif" => &[
            "DejaVuSerif",
            "LiberationSerif-Regular",
            "FreeSerif",
            "NotoSerif-Regular",
        ],
        "mono" | "monospace" => &[
            "DejaVuSansMono",
            "LiberationMono-Regular",
            "FreeMono",
            "NotoSansMono-Regular",
        ],
        _ => &[],
    }
}

/// Default font directories, most specific first.
fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = dirs::font_dir() {
        dirs.push(dir);
    }
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".fonts"));
    }
    dirs.push(PathBuf::from("/usr/local/share/fonts"));
    dirs.push(PathBuf::from("/usr/share/fonts"));
    dirs
}

fn collect_font_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth < MAX_SEARCH_DEPTH {
                collect_font_files(&path, depth + 1, out);
            }
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
}

/// Text engine that loads TrueType/OpenType fonts from disk.
///
/// Fonts are named by path, by file stem (`DejaVuSans`), or by a generic
/// family (`sans`, `serif`, `mono`). Loaded fonts are cached by name.
pub struct RusttypeEngine {
    search_dirs: Vec<PathBuf>,
    fonts: HashMap<String, Font<'static>>,
}

impl Default for RusttypeEngine {
    fn default() -> Self {
        Self::with_search_dirs(default_search_dirs())
    }
}

impl RusttypeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            fonts: HashMap::new(),
        }
    }

    /// Find the file providing `name`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, FontError> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        if name.contains('/') {
            return Err(FontError::NotFound(name.to_string()));
        }

        let mut files = Vec::new();
        for dir in &self.search_dirs {
            collect_font_files(dir, 0, &mut files);
        }

        let family = aliases(name);
        let candidates: Vec<&str> = if family.is_empty() {
            vec![name]
        } else {
            family.to_vec()
        };

        candidates
            .iter()
            .find_map(|want| {
                files.iter().find(|f| {
                    f.file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.eq_ignore_ascii_case(want))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .ok_or_else(|| FontError::NotFound(name.to_string()))
    }

    fn font(&mut self, name: &str) -> Result<&Font<'static>, FontError> {
        if !self.fonts.contains_key(name) {
            let path = self.resolve(name)?;
            let bytes = std::fs::read(&path).map_err(|source| FontError::Read {
                path: path.clone(),
                source,
            })?;
            let font = Font::try_from_vec(bytes).ok_or(FontError::Invalid { path: path.clone() })?;
            log::debug!("Loaded font '{}' from {}", name, path.display());
            self.fonts.insert(name.to_string(), font);
        }
        self.fonts
            .get(name)
            .ok_or_else(|| FontError::NotFound(name.to_string()))
    }
}

impl TextEngine for RusttypeEngine {
    fn measure_or_draw(
        &mut self,
        target: Option<&mut RgbaImage>,
        font: &str,
        size: f64,
        x: i32,
        y: i32,
        text: &str,
        colour: Colour,
    ) -> Result<BBox, FontError> {
        let font = self.font(font)?;
        let scale = Scale::uniform((size * PIXELS_PER_POINT) as f32);
        let metrics = font.v_metrics(scale);
        let glyphs: Vec<_> = font
            .layout(text, scale, point(x as f32, y as f32))
            .collect();

        let end = glyphs
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(x as f32);
        let bbox = BBox {
            left: x,
            top: y - metrics.ascent.ceil() as i32,
            right: end.ceil() as i32,
            bottom: y - metrics.descent.floor() as i32,
        };

        let Some(image) = target else {
            return Ok(bbox);
        };

        let Rgba([r, g, b, opacity]) = colour.engine_rgba();
        let (width, height) = image.dimensions();
        for glyph in &glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                    return;
                }
                let alpha = (f32::from(opacity) * coverage).round() as u8;
                image
                    .get_pixel_mut(px as u32, py as u32)
                    .blend(&Rgba([r, g, b, alpha]));
            });
        }

        Ok(bbox)
    }
}
