//! CLI argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::colour::Colour;
use crate::compose::{BannerMode, Effect};
use crate::config::{Config, OutputConfig};
use crate::output::ImageKind;
use crate::source::Palette;

/// Requested capture size, written `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid resolution '{}', expected WIDTHxHEIGHT", s);
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// Capture still images from a camera, averaging frames to reduce noise
#[derive(Parser, Debug, Default)]
#[command(name = "stillcam")]
#[command(version, about = "Averaged still image capture with banners and overlays", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    // ==================== Device ====================
    /// Device to capture from: a V4L2 node, `test[:bars|grey]` or `file:<path>`
    #[arg(short, long)]
    pub device: Option<String>,

    /// Input name or index on the device
    #[arg(short, long)]
    pub input: Option<String>,

    /// Tuner to use
    #[arg(long)]
    pub tuner: Option<u32>,

    /// Tuner frequency in kHz
    #[arg(long)]
    pub frequency: Option<u64>,

    /// Requested image size, WIDTHxHEIGHT
    #[arg(short, long)]
    pub resolution: Option<Resolution>,

    /// Requested frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Palette to request from the device (e.g. YUYV, MJPEG)
    #[arg(short, long)]
    pub palette: Option<Palette>,

    /// Seconds to wait for a frame
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Seconds to wait after opening the device
    #[arg(short = 'D', long)]
    pub delay: Option<u64>,

    // ==================== Capture ====================
    /// Number of frames to average
    #[arg(short = 'F', long)]
    pub frames: Option<u32>,

    /// Number of frames to skip before capturing
    #[arg(short = 'S', long)]
    pub skip: Option<u32>,

    /// Write the first raw frame to this file
    #[arg(long)]
    pub dumpframe: Option<String>,

    // ==================== Banner ====================
    /// Banner position
    #[arg(long, value_enum)]
    pub banner: Option<BannerMode>,

    /// Banner title
    #[arg(long)]
    pub title: Option<String>,

    /// Banner subtitle
    #[arg(long)]
    pub subtitle: Option<String>,

    /// Banner info text
    #[arg(long)]
    pub info: Option<String>,

    /// Banner timestamp format (strftime)
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Leave the timestamp off the banner
    #[arg(long, conflicts_with = "timestamp")]
    pub no_timestamp: bool,

    /// Banner font: a file path, a file name or sans/serif/mono
    #[arg(long)]
    pub font: Option<String>,

    /// Banner font size in points
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Banner background colour, #RRGGBB or #AARRGGBB
    #[arg(long)]
    pub banner_colour: Option<Colour>,

    /// Banner separator line colour
    #[arg(long)]
    pub line_colour: Option<Colour>,

    /// Banner text colour
    #[arg(long)]
    pub text_colour: Option<Colour>,

    /// Draw a shadow behind banner text
    #[arg(long, conflicts_with = "no_shadow")]
    pub shadow: bool,

    /// Do not draw a shadow behind banner text
    #[arg(long)]
    pub no_shadow: bool,

    // ==================== Image ====================
    /// PNG drawn beneath the banner
    #[arg(long)]
    pub underlay: Option<PathBuf>,

    /// PNG drawn above everything else
    #[arg(long)]
    pub overlay: Option<PathBuf>,

    /// Effect applied before layers, e.g. flip=h, rotate=90, crop=320x240+10+10.
    /// May be repeated
    #[arg(short, long = "effect", value_name = "EFFECT")]
    pub effects: Vec<Effect>,

    /// Output image format
    #[arg(long, value_enum)]
    pub format: Option<ImageKind>,

    /// JPEG quality (0-100) or PNG compression level (0-9)
    #[arg(long)]
    pub quality: Option<u8>,

    /// Output file, strftime tokens allowed, `-` for stdout. May be repeated
    #[arg(long = "save", value_name = "FILENAME")]
    pub save: Vec<String>,

    /// Output files
    #[arg(value_name = "FILENAME")]
    pub filenames: Vec<String>,

    // ==================== Scheduling ====================
    /// Capture every SECONDS seconds
    #[arg(short, long = "loop", value_name = "SECONDS")]
    pub loop_secs: Option<u64>,

    /// Offset of each capture within the loop period, in seconds
    #[arg(long)]
    pub offset: Option<u64>,

    /// Command run after each capture, strftime tokens allowed
    #[arg(long)]
    pub exec: Option<String>,

    /// Use UTC instead of local time
    #[arg(long)]
    pub gmt: bool,

    // ==================== Process ====================
    /// Run in the background
    #[arg(short, long)]
    pub background: bool,

    /// Write the process id to this file
    #[arg(long)]
    pub pid: Option<PathBuf>,

    /// Log destination: stderr, syslog, file:<path> or a path
    #[arg(long)]
    pub log: Option<String>,

    /// Log debug messages
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn set_some<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *slot = value.clone();
    }
}

impl Args {
    /// Layer the options given on the command line over `config`.
    ///
    /// Output filenames on the command line replace any `[[output]]` tables.
    pub fn apply(&self, config: &mut Config) {
        let d = &mut config.device;
        set(&mut d.name, &self.device);
        set_some(&mut d.input, &self.input);
        set(&mut d.tuner, &self.tuner);
        set(&mut d.frequency, &self.frequency);
        if let Some(r) = self.resolution {
            d.width = r.width;
            d.height = r.height;
        }
        set(&mut d.fps, &self.fps);
        set(&mut d.palette, &self.palette);
        set(&mut d.timeout, &self.timeout);
        set(&mut d.delay, &self.delay);

        let c = &mut config.capture;
        set(&mut c.frames, &self.frames);
        set(&mut c.skip, &self.skip);
        set_some(&mut c.dumpframe, &self.dumpframe);

        let b = &mut config.banner;
        set(&mut b.mode, &self.banner);
        set_some(&mut b.title, &self.title);
        set_some(&mut b.subtitle, &self.subtitle);
        set_some(&mut b.info, &self.info);
        set_some(&mut b.timestamp, &self.timestamp);
        if self.no_timestamp {
            b.timestamp = None;
        }
        set(&mut b.font, &self.font);
        set(&mut b.font_size, &self.font_size);
        set(&mut b.background, &self.banner_colour);
        set(&mut b.line, &self.line_colour);
        set(&mut b.text, &self.text_colour);
        if self.shadow {
            b.shadow = true;
        }
        if self.no_shadow {
            b.shadow = false;
        }

        let img = &mut config.image;
        set_some(&mut img.underlay, &self.underlay);
        set_some(&mut img.overlay, &self.overlay);
        if !self.effects.is_empty() {
            img.effects = self.effects.clone();
        }
        set(&mut img.format, &self.format);
        set_some(&mut img.quality, &self.quality);

        let outputs: Vec<OutputConfig> = self
            .save
            .iter()
            .chain(&self.filenames)
            .map(OutputConfig::new)
            .collect();
        if !outputs.is_empty() {
            config.outputs = outputs;
        }

        set(&mut config.loop_secs, &self.loop_secs);
        set(&mut config.offset, &self.offset);
        set_some(&mut config.exec, &self.exec);
        config.gmt |= self.gmt;
        config.background |= self.background;
        set_some(&mut config.pid, &self.pid);
        set_some(&mut config.log, &self.log);
        if self.verbose {
            config.verbose = true;
            config.quiet = false;
        }
        if self.quiet {
            config.quiet = true;
            config.verbose = false;
        }
    }
}
