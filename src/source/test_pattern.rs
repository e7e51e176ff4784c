//! Synthetic test pattern source.

use std::str::FromStr;

use super::types::{Palette, RawFrame, SourceParams};
use super::Device;
use crate::error::DeviceError;

/// Colour bars, left to right.
const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

/// Which picture the test source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Bars,
    Grey,
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bars" => Ok(Pattern::Bars),
            "grey" | "gray" => Ok(Pattern::Grey),
            other => Err(format!("unknown test pattern '{}' (bars, grey)", other)),
        }
    }
}

/// A device that produces the same RGB24 picture on every grab.
pub struct TestPatternDevice {
    frame: Vec<u8>,
    width: u32,
    height: u32,
}

impl TestPatternDevice {
    pub fn open(params: &SourceParams, pattern: Pattern) -> Self {
        let width = params.width.max(1);
        let height = params.height.max(1);
        if !matches!(params.palette, Palette::Any | Palette::Rgb24) {
            log::debug!(
                "test source only produces RGB24, ignoring palette {}",
                params.palette
            );
        }
        Self {
            frame: render(pattern, width, height),
            width,
            height,
        }
    }
}

fn render(pattern: Pattern, width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for _ in 0..height {
        for x in 0..width {
            let colour = match pattern {
                Pattern::Bars => BARS[(x as usize * BARS.len()) / width as usize],
                Pattern::Grey => [128, 128, 128],
            };
            data.extend_from_slice(&colour);
        }
    }
    data
}

impl Device for TestPatternDevice {
    fn geometry(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<RawFrame, DeviceError> {
        Ok(RawFrame {
            data: self.frame.clone(),
            width: self.width,
            height: self.height,
            palette: Palette::Rgb24,
        })
    }
}
