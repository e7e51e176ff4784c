//! Capture device sources.
//!
//! A device is opened once per run with [`open`] and then polled for raw
//! frames with [`Device::grab`]. The device is closed when it is dropped.
//! Supported device names:
//! - `test` or `test:<pattern>`: synthetic test pattern
//! - `file:<path>`: a JPEG or PNG still, re-read on every grab
//! - anything else: a V4L2 device node (requires the `v4l2` feature)

mod file;
mod test_pattern;
mod types;
#[cfg(feature = "v4l2")]
mod v4l2;

pub use file::FileDevice;
pub use test_pattern::{Pattern, TestPatternDevice};
pub use types::{Palette, RawFrame, SourceParams};

use crate::error::DeviceError;

/// An open capture device.
pub trait Device {
    /// Negotiated frame geometry. May differ from what was requested.
    fn geometry(&self) -> (u32, u32);

    /// Wait for the next frame, bounded by the device timeout.
    fn grab(&mut self) -> Result<RawFrame, DeviceError>;
}

/// Open the device named in `params`.
pub fn open(params: &SourceParams) -> Result<Box<dyn Device>, DeviceError> {
    if params.device == "test" {
        return Ok(Box::new(TestPatternDevice::open(params, Pattern::Bars)));
    }
    if let Some(name) = params.device.strip_prefix("test:") {
        let pattern = name.parse().map_err(|message| DeviceError::Open {
            device: params.device.clone(),
            message,
        })?;
        return Ok(Box::new(TestPatternDevice::open(params, pattern)));
    }
    if let Some(path) = params.device.strip_prefix("file:") {
        return Ok(Box::new(FileDevice::open(path)?));
    }
    open_v4l2(params)
}

#[cfg(feature = "v4l2")]
fn open_v4l2(params: &SourceParams) -> Result<Box<dyn Device>, DeviceError> {
    Ok(Box::new(v4l2::V4l2Device::open(params)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_v4l2(params: &SourceParams) -> Result<Box<dyn Device>, DeviceError> {
    Err(DeviceError::Unsupported(params.device.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_test_pattern() {
        let params = SourceParams {
            device: "test".to_string(),
            width: 8,
            height: 2,
            ..Default::default()
        };
        let mut device = open(&params).unwrap();
        assert_eq!(device.geometry(), (8, 2));
        let frame = device.grab().unwrap();
        assert_eq!(frame.palette, Palette::Rgb24);
        assert_eq!(frame.data.len(), 8 * 2 * 3);
    }

    #[test]
    fn test_open_unknown_pattern_fails() {
        let params = SourceParams {
            device: "test:plaid".to_string(),
            ..Default::default()
        };
        assert!(matches!(open(&params), Err(DeviceError::Open { .. })));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let params = SourceParams {
            device: "file:/nonexistent/still.jpg".to_string(),
            ..Default::default()
        };
        assert!(matches!(open(&params), Err(DeviceError::Open { .. })));
    }

    #[cfg(not(feature = "v4l2"))]
    #[test]
    fn test_v4l2_unsupported_without_feature() {
        let params = SourceParams::default();
        assert!(matches!(open(&params), Err(DeviceError::Unsupported(_))));
    }
}
