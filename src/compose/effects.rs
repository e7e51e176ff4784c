//! Post-processing effects applied to an output before its layers.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// A single image transformation.
///
/// Written as `flip=h`, `flip=v`, `rotate=90|180|270`, `crop=WxH[+X+Y]`,
/// `scale=WxH`, `greyscale`, `invert` or `swap-rb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Flip(FlipAxis),
    Rotate(u16),
    Crop { width: u32, height: u32, x: u32, y: u32 },
    Scale { width: u32, height: u32 },
    Greyscale,
    Invert,
    SwapRb,
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid effect '{}'", s);
        let (name, arg) = match s.split_once('=') {
            Some((n, a)) => (n.trim(), Some(a.trim())),
            None => (s.trim(), None),
        };

        match (name.to_ascii_lowercase().as_str(), arg) {
            ("flip", Some(a)) => match a {
                "h" | "horizontal" => Ok(Effect::Flip(FlipAxis::Horizontal)),
                "v" | "vertical" => Ok(Effect::Flip(FlipAxis::Vertical)),
                _ => Err(invalid()),
            },
            ("rotate", Some(a)) => match a.parse::<u16>() {
                Ok(deg @ (90 | 180 | 270)) => Ok(Effect::Rotate(deg)),
                _ => Err(format!("{}: rotation must be 90, 180 or 270", invalid())),
            },
            ("crop", Some(a)) => {
                let mut parts = a.split('+');
                let (width, height) = parts.next().and_then(parse_size).ok_or_else(invalid)?;
                let x = parts.next().map(|v| v.parse()).transpose().map_err(|_| invalid())?;
                let y = parts.next().map(|v| v.parse()).transpose().map_err(|_| invalid())?;
                Ok(Effect::Crop {
                    width,
                    height,
                    x: x.unwrap_or(0),
                    y: y.unwrap_or(0),
                })
            }
            ("scale", Some(a)) => {
                let (width, height) = parse_size(a).ok_or_else(invalid)?;
                Ok(Effect::Scale { width, height })
            }
            ("greyscale" | "grayscale", None) => Ok(Effect::Greyscale),
            ("invert", None) => Ok(Effect::Invert),
            ("swap-rb" | "swapchannels", None) => Ok(Effect::SwapRb),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Flip(FlipAxis::Horizontal) => write!(f, "flip=h"),
            Effect::Flip(FlipAxis::Vertical) => write!(f, "flip=v"),
            Effect::Rotate(deg) => write!(f, "rotate={}", deg),
            Effect::Crop {
                width,
                height,
                x,
                y,
            } => write!(f, "crop={}x{}+{}+{}", width, height, x, y),
            Effect::Scale { width, height } => write!(f, "scale={}x{}", width, height),
            Effect::Greyscale => write!(f, "greyscale"),
            Effect::Invert => write!(f, "invert"),
            Effect::SwapRb => write!(f, "swap-rb"),
        }
    }
}

impl<'de> Deserialize<'de> for Effect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Apply `effect`, returning the transformed image.
pub fn apply(mut image: RgbaImage, effect: &Effect) -> RgbaImage {
    match *effect {
        Effect::Flip(FlipAxis::Horizontal) => imageops::flip_horizontal(&image),
        Effect::Flip(FlipAxis::Vertical) => imageops::flip_vertical(&image),
        Effect::Rotate(90) => imageops::rotate90(&image),
        Effect::Rotate(180) => imageops::rotate180(&image),
        Effect::Rotate(270) => imageops::rotate270(&image),
        Effect::Rotate(_) => image,
        Effect::Crop {
            width,
            height,
            x,
            y,
        } => imageops::crop_imm(&image, x, y, width, height).to_image(),
        Effect::Scale { width, height } => {
            imageops::resize(&image, width, height, FilterType::Triangle)
        }
        Effect::Greyscale => {
            DynamicImage::ImageLumaA8(imageops::grayscale_alpha(&image)).to_rgba8()
        }
        Effect::Invert => {
            imageops::invert(&mut image);
            image
        }
        Effect::SwapRb => {
            for pixel in image.pixels_mut() {
                pixel.0.swap(0, 2);
            }
            image
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn two_pixel() -> RgbaImage {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        img
    }

    #[test]
    fn test_parse_effects() {
        assert_eq!("flip=h".parse::<Effect>().unwrap(), Effect::Flip(FlipAxis::Horizontal));
        assert_eq!("rotate=270".parse::<Effect>().unwrap(), Effect::Rotate(270));
        assert_eq!(
            "crop=320x240+10+20".parse::<Effect>().unwrap(),
            Effect::Crop {
                width: 320,
                height: 240,
                x: 10,
                y: 20
            }
        );
        assert_eq!(
            "crop=32x24".parse::<Effect>().unwrap(),
            Effect::Crop {
                width: 32,
                height: 24,
                x: 0,
                y: 0
            }
        );
        assert_eq!(
            "scale=640x480".parse::<Effect>().unwrap(),
            Effect::Scale {
                width: 640,
                height: 480
            }
        );
        assert_eq!("greyscale".parse::<Effect>().unwrap(), Effect::Greyscale);
    }

    #[test]
    fn test_parse_rejects_bad_effects() {
        assert!("rotate=45".parse::<Effect>().is_err());
        assert!("scale=0x10".parse::<Effect>().is_err());
        assert!("flip=diagonal".parse::<Effect>().is_err());
        assert!("sharpen".parse::<Effect>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for s in ["flip=v", "rotate=90", "crop=8x8+1+2", "scale=4x3", "invert", "swap-rb"] {
            let effect: Effect = s.parse().unwrap();
            assert_eq!(effect.to_string(), s);
        }
    }

    #[test]
    fn test_flip_horizontal() {
        let out = apply(two_pixel(), &Effect::Flip(FlipAxis::Horizontal));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_rotate_swaps_dimensions() {
        let out = apply(two_pixel(), &Effect::Rotate(90));
        assert_eq!(out.dimensions(), (1, 2));
    }

    #[test]
    fn test_crop_and_scale_dimensions() {
        let img = RgbaImage::new(10, 8);
        let cropped = apply(
            img.clone(),
            &Effect::Crop {
                width: 4,
                height: 3,
                x: 2,
                y: 2,
            },
        );
        assert_eq!(cropped.dimensions(), (4, 3));
        let scaled = apply(img, &Effect::Scale { width: 5, height: 4 });
        assert_eq!(scaled.dimensions(), (5, 4));
    }

    #[test]
    fn test_invert_keeps_alpha() {
        let out = apply(two_pixel(), &Effect::Invert);
        assert_eq!(out.get_pixel(0, 0).0, [0, 255, 255, 255]);
    }

    #[test]
    fn test_swap_rb() {
        let out = apply(two_pixel(), &Effect::SwapRb);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_greyscale_channels_equal() {
        let out = apply(two_pixel(), &Effect::Greyscale);
        let p = out.get_pixel(0, 0).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[3], 255);
    }
}
