//! Frame averaging buffer.
//!
//! Several raw frames are summed per channel and then divided by the frame
//! count to reduce sensor noise.

use image::RgbImage;

use crate::decode::decode_add;
use crate::error::{CaptureError, DecodeError};
use crate::source::RawFrame;

/// Per-channel sums for one capture cycle.
#[derive(Debug)]
pub struct Accumulator {
    sums: Vec<u32>,
    width: u32,
    height: u32,
    frames: u32,
}

impl Accumulator {
    /// Allocate a zeroed buffer for `width * height` pixels.
    pub fn new(width: u32, height: u32) -> Result<Self, CaptureError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or(CaptureError::Allocation)?;

        let mut sums = Vec::new();
        sums.try_reserve_exact(len)
            .map_err(|_| CaptureError::Allocation)?;
        sums.resize(len, 0);

        Ok(Self {
            sums,
            width,
            height,
            frames: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of frames added so far.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Decode `frame` and add it to the running sums.
    ///
    /// A frame that fails to decode leaves the count unchanged, but may have
    /// partially added to the sums; the caller abandons the cycle.
    pub fn accumulate(&mut self, frame: &RawFrame) -> Result<(), DecodeError> {
        decode_add(frame, self.width, self.height, &mut self.sums)?;
        self.frames += 1;
        Ok(())
    }

    /// Divide every sum by `frame_count` and build the averaged image.
    ///
    /// Integer division: the average truncates toward zero. The buffer is
    /// consumed whatever the outcome.
    pub fn finalize(self, frame_count: u32) -> Result<RgbImage, CaptureError> {
        let divisor = frame_count.max(1);

        let mut raw = Vec::new();
        raw.try_reserve_exact(self.sums.len())
            .map_err(|_| CaptureError::Allocation)?;
        raw.extend(self.sums.iter().map(|&s| (s / divisor).min(255) as u8));

        RgbImage::from_raw(self.width, self.height, raw).ok_or(CaptureError::Allocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Palette;

    fn uniform_frame(width: u32, height: u32, rgb: [u8; 3]) -> RawFrame {
        RawFrame {
            data: rgb.repeat((width * height) as usize),
            width,
            height,
            palette: Palette::Rgb24,
        }
    }

    #[test]
    fn test_new_is_zeroed() {
        let acc = Accumulator::new(3, 2).unwrap();
        assert_eq!(acc.dimensions(), (3, 2));
        assert_eq!(acc.frames(), 0);
        let img = acc.finalize(1).unwrap();
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_identical_frames_average_exactly() {
        for count in 1..=5u32 {
            let mut acc = Accumulator::new(4, 3).unwrap();
            for _ in 0..count {
                acc.accumulate(&uniform_frame(4, 3, [201, 7, 99])).unwrap();
            }
            assert_eq!(acc.frames(), count);
            let img = acc.finalize(count).unwrap();
            assert!(img.pixels().all(|p| p.0 == [201, 7, 99]));
        }
    }

    #[test]
    fn test_average_truncates() {
        let mut acc = Accumulator::new(1, 1).unwrap();
        acc.accumulate(&uniform_frame(1, 1, [0, 1, 2])).unwrap();
        acc.accumulate(&uniform_frame(1, 1, [1, 2, 255])).unwrap();
        let img = acc.finalize(2).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 1, 128]);
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = uniform_frame(2, 2, [10, 20, 30]);
        let b = uniform_frame(2, 2, [50, 0, 3]);

        let mut ab = Accumulator::new(2, 2).unwrap();
        ab.accumulate(&a).unwrap();
        ab.accumulate(&b).unwrap();

        let mut ba = Accumulator::new(2, 2).unwrap();
        ba.accumulate(&b).unwrap();
        ba.accumulate(&a).unwrap();

        assert_eq!(ab.finalize(2).unwrap(), ba.finalize(2).unwrap());
    }

    #[test]
    fn test_failed_decode_does_not_count() {
        let mut acc = Accumulator::new(2, 2).unwrap();
        let bad = RawFrame {
            data: vec![0; 3],
            width: 2,
            height: 2,
            palette: Palette::Rgb24,
        };
        assert!(acc.accumulate(&bad).is_err());
        assert_eq!(acc.frames(), 0);
    }

    #[test]
    fn test_overflowing_geometry_is_allocation_error() {
        let err = Accumulator::new(u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, CaptureError::Allocation));
    }
}
