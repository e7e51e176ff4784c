//! Raw frame decoding into the averaging buffer.
//!
//! Every decoder adds one RGB triple per pixel into a buffer of `u32` sums,
//! laid out row-major as `[r, g, b, r, g, b, ...]`.

use image::ImageFormat;

use crate::error::DecodeError;
use crate::source::{Palette, RawFrame};

fn clamp(v: i32) -> u32 {
    v.clamp(0, 255) as u32
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u32; 3] {
    let y = i32::from(y);
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    [
        clamp(y + ((359 * e) >> 8)),
        clamp(y - ((88 * d + 183 * e) >> 8)),
        clamp(y + ((454 * d) >> 8)),
    ]
}

fn add(sums: &mut [u32], pixel: usize, rgb: [u32; 3]) {
    let i = pixel * 3;
    sums[i] += rgb[0];
    sums[i + 1] += rgb[1];
    sums[i + 2] += rgb[2];
}

/// Decode `frame` and add each of its pixels to `sums`.
///
/// `sums` must hold `width * height * 3` entries. The frame must have the
/// same geometry as the buffer.
pub fn decode_add(
    frame: &RawFrame,
    width: u32,
    height: u32,
    sums: &mut [u32],
) -> Result<(), DecodeError> {
    if frame.width != width || frame.height != height {
        return Err(DecodeError::Geometry {
            width,
            height,
            got_width: frame.width,
            got_height: frame.height,
        });
    }
    let pixels = width as usize * height as usize;
    debug_assert_eq!(sums.len(), pixels * 3);

    if let Some(expected) = frame.palette.frame_size(width, height) {
        if frame.data.len() < expected {
            return Err(DecodeError::Truncated {
                expected,
                actual: frame.data.len(),
            });
        }
    }

    let data = &frame.data;
    match frame.palette {
        Palette::Rgb24 => {
            for p in 0..pixels {
                let s = &data[p * 3..p * 3 + 3];
                add(sums, p, [s[0].into(), s[1].into(), s[2].into()]);
            }
        }
        Palette::Bgr24 => {
            for p in 0..pixels {
                let s = &data[p * 3..p * 3 + 3];
                add(sums, p, [s[2].into(), s[1].into(), s[0].into()]);
            }
        }
        Palette::Grey => {
            for (p, &v) in data[..pixels].iter().enumerate() {
                add(sums, p, [v.into(), v.into(), v.into()]);
            }
        }
        Palette::Rgb565 => {
            for p in 0..pixels {
                let v = u16::from_le_bytes([data[p * 2], data[p * 2 + 1]]);
                let r = u32::from((v >> 11) & 0x1F) << 3;
                let g = u32::from((v >> 5) & 0x3F) << 2;
                let b = u32::from(v & 0x1F) << 3;
                add(sums, p, [r, g, b]);
            }
        }
        Palette::Yuyv | Palette::Uyvy => {
            // two pixels per four bytes, sharing chroma
            let (y0, u, y1, v) = if frame.palette == Palette::Yuyv {
                (0, 1, 2, 3)
            } else {
                (1, 0, 3, 2)
            };
            for (pair, chunk) in data[..pixels * 2].chunks_exact(4).enumerate() {
                add(sums, pair * 2, yuv_to_rgb(chunk[y0], chunk[u], chunk[v]));
                add(sums, pair * 2 + 1, yuv_to_rgb(chunk[y1], chunk[u], chunk[v]));
            }
        }
        Palette::Mjpeg | Palette::Jpeg | Palette::Png | Palette::Any => {
            decode_compressed(frame, width, height, sums)?;
        }
    }

    Ok(())
}

fn decode_compressed(
    frame: &RawFrame,
    width: u32,
    height: u32,
    sums: &mut [u32],
) -> Result<(), DecodeError> {
    let compressed_error = |message: String| DecodeError::Compressed {
        palette: frame.palette.to_string(),
        message,
    };

    let decoded = match frame.palette {
        Palette::Png => image::load_from_memory_with_format(&frame.data, ImageFormat::Png),
        Palette::Mjpeg | Palette::Jpeg => {
            image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
        }
        _ => image::load_from_memory(&frame.data),
    }
    .map_err(|e| compressed_error(e.to_string()))?
    .to_rgb8();

    if decoded.dimensions() != (width, height) {
        return Err(DecodeError::Geometry {
            width,
            height,
            got_width: decoded.width(),
            got_height: decoded.height(),
        });
    }

    for (p, pixel) in decoded.pixels().enumerate() {
        add(sums, p, [pixel[0].into(), pixel[1].into(), pixel[2].into()]);
    }
    Ok(())
}
