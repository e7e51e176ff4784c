//! Still-image source: replays a JPEG or PNG file as if it were a camera.

use image::ImageFormat;
use std::path::{Path, PathBuf};

use super::types::{Palette, RawFrame};
use super::Device;
use crate::error::DeviceError;

pub struct FileDevice {
    path: PathBuf,
    width: u32,
    height: u32,
    palette: Palette,
}

impl FileDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let open_error = |message: String| DeviceError::Open {
            device: format!("file:{}", path.display()),
            message,
        };

        let palette = match ImageFormat::from_path(&path) {
            Ok(ImageFormat::Jpeg) => Palette::Jpeg,
            Ok(ImageFormat::Png) => Palette::Png,
            _ => return Err(open_error("only JPEG and PNG files are supported".to_string())),
        };
        let (width, height) =
            image::image_dimensions(&path).map_err(|e| open_error(e.to_string()))?;

        Ok(Self {
            path,
            width,
            height,
            palette,
        })
    }
}

impl Device for FileDevice {
    fn geometry(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<RawFrame, DeviceError> {
        let data = std::fs::read(&self.path)
            .map_err(|e| DeviceError::Grab(format!("{}: {}", self.path.display(), e)))?;
        Ok(RawFrame {
            data,
            width: self.width,
            height: self.height,
            palette: self.palette,
        })
    }
}
