//! Source types and data structures.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Native pixel encoding of a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Palette {
    /// Let the device pick.
    #[default]
    Any,
    Rgb24,
    Bgr24,
    Grey,
    Yuyv,
    Uyvy,
    Rgb565,
    Mjpeg,
    Jpeg,
    Png,
}

impl Palette {
    /// All concrete palettes, in order of preference when negotiating.
    pub const ALL: [Palette; 9] = [
        Palette::Mjpeg,
        Palette::Jpeg,
        Palette::Yuyv,
        Palette::Uyvy,
        Palette::Rgb24,
        Palette::Bgr24,
        Palette::Rgb565,
        Palette::Grey,
        Palette::Png,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Palette::Any => "ANY",
            Palette::Rgb24 => "RGB24",
            Palette::Bgr24 => "BGR24",
            Palette::Grey => "GREY",
            Palette::Yuyv => "YUYV",
            Palette::Uyvy => "UYVY",
            Palette::Rgb565 => "RGB565",
            Palette::Mjpeg => "MJPEG",
            Palette::Jpeg => "JPEG",
            Palette::Png => "PNG",
        }
    }

    /// Bytes per frame for uncompressed palettes, `None` for compressed ones.
    pub fn frame_size(self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            Palette::Rgb24 | Palette::Bgr24 => Some(pixels * 3),
            Palette::Yuyv | Palette::Uyvy | Palette::Rgb565 => Some(pixels * 2),
            Palette::Grey => Some(pixels),
            Palette::Any | Palette::Mjpeg | Palette::Jpeg | Palette::Png => None,
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(Palette::Any);
        }
        Palette::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Palette::ALL.iter().map(|p| p.name()).collect();
                format!(
                    "Unrecognised palette format \"{}\". Supported formats: {}",
                    s,
                    names.join(", ")
                )
            })
    }
}

impl<'de> Deserialize<'de> for Palette {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A frame exactly as the device produced it.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub palette: Palette,
}

/// Parameters used to open a device.
#[derive(Debug, Clone)]
pub struct SourceParams {
    /// Device name: `test`, `file:<path>` or a V4L2 node.
    pub device: String,
    pub input: Option<String>,
    pub tuner: u32,
    pub frequency: u64,
    pub width: u32,
    pub height: u32,
    /// Requested frame rate, 0 for the device default.
    pub fps: u32,
    pub palette: Palette,
    /// Seconds to wait for a single frame before giving up.
    pub timeout: u64,
    /// Seconds to wait after opening before the first grab.
    pub delay: u64,
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            input: None,
            tuner: 0,
            frequency: 0,
            width: 384,
            height: 288,
            fps: 0,
            palette: Palette::Any,
            timeout: 10,
            delay: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_parse_case_insensitive() {
        assert_eq!("yuyv".parse::<Palette>().unwrap(), Palette::Yuyv);
        assert_eq!("MJPEG".parse::<Palette>().unwrap(), Palette::Mjpeg);
        assert_eq!("any".parse::<Palette>().unwrap(), Palette::Any);
    }

    #[test]
    fn test_palette_parse_error_lists_formats() {
        let err = "H264".parse::<Palette>().unwrap_err();
        assert!(err.contains("H264"));
        assert!(err.contains("YUYV"));
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(Palette::Rgb24.frame_size(4, 4), Some(48));
        assert_eq!(Palette::Yuyv.frame_size(4, 4), Some(32));
        assert_eq!(Palette::Grey.frame_size(4, 4), Some(16));
        assert_eq!(Palette::Jpeg.frame_size(4, 4), None);
    }

    #[test]
    fn test_source_params_default() {
        let params = SourceParams::default();
        assert_eq!(params.device, "/dev/video0");
        assert_eq!(params.timeout, 10);
        assert_eq!(params.palette, Palette::Any);
    }
}
