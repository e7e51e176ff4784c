//! Error types for the capture pipeline.
//!
//! Each failure class has its own enum so the capture loop can decide, at the
//! cycle boundary, whether an error ends the cycle, one output, or the process.

use std::path::PathBuf;

/// Errors raised by a capture device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("unable to open device '{device}': {message}")]
    Open { device: String, message: String },

    #[error("device '{0}' is not supported by this build")]
    Unsupported(String),

    #[error("timed out after {0} second(s) waiting for a frame")]
    Timeout(u64),

    #[error("error grabbing frame: {0}")]
    Grab(String),
}

/// Errors raised while adding a raw frame to the accumulator.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is {actual} bytes, expected at least {expected}")]
    Truncated { expected: usize, actual: usize },

    #[error("frame is {got_width}x{got_height}, accumulator is {width}x{height}")]
    Geometry {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("unable to decode {palette} frame: {message}")]
    Compressed { palette: String, message: String },
}

/// Errors raised while loading an underlay or overlay image.
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("unable to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to read '{}'. Not a PNG image? ({message})", path.display())]
    Format { path: PathBuf, message: String },
}

/// Errors raised by the font engine.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("unable to find font '{0}'")]
    NotFound(String),

    #[error("unable to read font '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("'{}' is not a usable font", path.display())]
    Invalid { path: PathBuf },
}

/// Errors raised while expanding a time template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("out of memory expanding template")]
    Allocation,

    #[error("invalid conversion in template '{0}'")]
    Invalid(String),
}

/// Errors raised while delivering one output target.
#[derive(Debug, thiserror::Error)]
pub enum DeliverError {
    #[error("stdout is unavailable in background mode")]
    StdoutInBackground,

    #[error("error opening file for output '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing output '{target}': {source}")]
    Write {
        target: String,
        source: std::io::Error,
    },

    #[error("error encoding output '{target}': {source}")]
    Encode {
        target: String,
        source: image::ImageError,
    },

    #[error("out of memory composing output")]
    Allocation,
}

impl DeliverError {
    /// Allocation failure ends the process; anything else only this output.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeliverError::Allocation)
    }
}

/// Errors raised by the post-capture command hook.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("unable to launch '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Status { command: String, status: String },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ExecError {
    /// Running out of memory expanding the command ends the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::Template(TemplateError::Allocation))
    }
}

/// Top-level error for a capture cycle.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("out of memory")]
    Allocation,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl CaptureError {
    /// Whether this error must end the process rather than just the cycle.
    ///
    /// Only allocation failure and a failure to open the device are fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::Allocation
                | CaptureError::Device(DeviceError::Open { .. })
                | CaptureError::Device(DeviceError::Unsupported(_))
        )
    }
}
