//! V4L2 capture through the `v4l` crate.

use std::time::Duration;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::FourCC;

use super::types::{Palette, RawFrame, SourceParams};
use super::Device;
use crate::error::DeviceError;

const BUFFER_COUNT: u32 = 4;

fn fourcc(palette: Palette) -> Option<FourCC> {
    let code: &[u8; 4] = match palette {
        Palette::Rgb24 => b"RGB3",
        Palette::Bgr24 => b"BGR3",
        Palette::Grey => b"GREY",
        Palette::Yuyv => b"YUYV",
        Palette::Uyvy => b"UYVY",
        Palette::Rgb565 => b"RGBP",
        Palette::Mjpeg => b"MJPG",
        Palette::Jpeg => b"JPEG",
        Palette::Png | Palette::Any => return None,
    };
    Some(FourCC::new(code))
}

fn palette_of(code: FourCC) -> Option<Palette> {
    Palette::ALL
        .iter()
        .copied()
        .find(|p| fourcc(*p).map(|f| f == code).unwrap_or(false))
}

pub struct V4l2Device {
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    palette: Palette,
    timeout: u64,
    _device: v4l::Device,
}

impl V4l2Device {
    pub fn open(params: &SourceParams) -> Result<Self, DeviceError> {
        let open_error = |message: String| DeviceError::Open {
            device: params.device.clone(),
            message,
        };

        let device = v4l::Device::with_path(&params.device).map_err(|e| open_error(e.to_string()))?;

        if params.input.is_some() || params.tuner != 0 || params.frequency != 0 {
            log::warn!("input, tuner and frequency selection are not supported for V4L2 devices");
        }

        let mut format = device.format().map_err(|e| open_error(e.to_string()))?;
        format.width = params.width;
        format.height = params.height;
        if let Some(code) = fourcc(params.palette) {
            format.fourcc = code;
        }
        let format = device
            .set_format(&format)
            .map_err(|e| open_error(e.to_string()))?;

        let palette = palette_of(format.fourcc).ok_or_else(|| {
            open_error(format!("unsupported palette {}", format.fourcc))
        })?;
        if params.palette != Palette::Any && palette != params.palette {
            log::warn!(
                "Palette {} not supported, using {} instead",
                params.palette,
                palette
            );
        }

        if params.fps > 0 {
            if let Err(e) = device.set_params(&Parameters::with_fps(params.fps)) {
                log::warn!("Unable to set frame rate: {}", e);
            }
        }

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| open_error(e.to_string()))?;
        stream.set_timeout(Duration::from_secs(params.timeout.max(1)));

        log::info!(
            "{} opened, {}x{} {}",
            params.device,
            format.width,
            format.height,
            palette
        );

        Ok(Self {
            stream,
            width: format.width,
            height: format.height,
            palette,
            timeout: params.timeout,
            _device: device,
        })
    }
}

impl Device for V4l2Device {
    fn geometry(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<RawFrame, DeviceError> {
        let timeout = self.timeout;
        let (buf, meta) = self.stream.next().map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                DeviceError::Timeout(timeout)
            } else {
                DeviceError::Grab(e.to_string())
            }
        })?;
        let used = (meta.bytesused as usize).min(buf.len());
        Ok(RawFrame {
            data: buf[..used].to_vec(),
            width: self.width,
            height: self.height,
            palette: self.palette,
        })
    }
}
