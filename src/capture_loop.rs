//! The capture loop.
//!
//! Opens the device once, then runs capture cycles until told to stop:
//! grab and average frames, compose and deliver every output, run the
//! post-capture command, wait for the next slot. Reload, hangup and terminate
//! requests are only acted on between cycles.

use chrono::{DateTime, Utc};
use image::RgbImage;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::accumulator::Accumulator;
use crate::config::{Config, ConfigError};
use crate::error::{CaptureError, DeviceError, ExecError};
use crate::output;
use crate::signals::ControlFlags;
use crate::source::{Device, RawFrame, SourceParams};
use crate::template::{expand_time, format_time, FILENAME_CAPACITY};
use crate::text::TextEngine;

/// Longest single sleep while waiting, so requests are noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    DeviceOpen,
    Capturing,
    Composing,
    Delivering,
    PostExec,
    Closed,
}

type ReloadHook<'a> = Box<dyn FnMut() -> Result<Config, ConfigError> + 'a>;
type HangupHook<'a> = Box<dyn FnMut() + 'a>;

/// Drives a device through repeated capture cycles.
pub struct CaptureLoop<'a> {
    config: Config,
    engine: Box<dyn TextEngine + 'a>,
    flags: &'a ControlFlags,
    daemonized: bool,
    state: State,
    on_reload: Option<ReloadHook<'a>>,
    on_hangup: Option<HangupHook<'a>>,
}

/// Milliseconds until the next instant `t` (strictly after `now_ms`) with
/// `(t - offset) % period == 0`.
pub fn until_next_slot(now_ms: i64, period_secs: u64, offset_secs: u64) -> Duration {
    let period = (period_secs as i64).saturating_mul(1000).max(1);
    let offset = (offset_secs as i64).saturating_mul(1000);
    let phase = (now_ms - offset).rem_euclid(period);
    Duration::from_millis((period - phase) as u64)
}

impl<'a> CaptureLoop<'a> {
    pub fn new(config: Config, engine: Box<dyn TextEngine + 'a>, flags: &'a ControlFlags) -> Self {
        Self {
            config,
            engine,
            flags,
            daemonized: false,
            state: State::Idle,
            on_reload: None,
            on_hangup: None,
        }
    }

    /// Mark the process as detached; standard output is then unavailable.
    pub fn daemonized(mut self, daemonized: bool) -> Self {
        self.daemonized = daemonized;
        self
    }

    /// Produce a fresh configuration when a reload is requested.
    pub fn on_reload(mut self, hook: impl FnMut() -> Result<Config, ConfigError> + 'a) -> Self {
        self.on_reload = Some(Box::new(hook));
        self
    }

    /// Called when a hangup is requested, typically to reopen the log.
    pub fn on_hangup(mut self, hook: impl FnMut() + 'a) -> Self {
        self.on_hangup = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the device with `opener` and capture until done.
    ///
    /// Returns an error only for failures that must end the process.
    pub fn run<F>(&mut self, opener: F) -> Result<(), CaptureError>
    where
        F: FnOnce(&SourceParams) -> Result<Box<dyn Device>, DeviceError>,
    {
        let params = self.config.source_params();
        self.state = State::DeviceOpen;
        let mut device = match opener(&params) {
            Ok(device) => device,
            Err(e) => {
                self.state = State::Closed;
                return Err(e.into());
            }
        };
        log::info!("Opened device '{}'.", params.device);

        let (width, height) = device.geometry();
        self.config.adopt_geometry(width, height);

        if params.delay > 0 {
            log::info!("Delaying {} seconds.", params.delay);
            self.sleep(Duration::from_secs(params.delay));
        }

        let result = self.run_cycles(device.as_mut());
        drop(device);
        self.state = State::Closed;
        result
    }

    fn run_cycles(&mut self, device: &mut dyn Device) -> Result<(), CaptureError> {
        loop {
            if self.flags.terminating() {
                log::info!("Terminating.");
                return Ok(());
            }

            match self.cycle(device) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::error!("Capture failed: {}", e),
            }

            if self.config.loop_secs == 0 {
                return Ok(());
            }

            if !self.wait_for_next_slot() {
                log::info!("Terminating.");
                return Ok(());
            }
        }
    }

    /// Run one full capture cycle against an open device.
    pub fn cycle(&mut self, device: &mut dyn Device) -> Result<(), CaptureError> {
        let captured_at = Utc::now();

        self.state = State::Capturing;
        let image = self.capture(device, captured_at);
        let image = match image {
            Ok(image) => image,
            Err(e) => {
                self.state = State::Idle;
                return Err(e);
            }
        };

        self.state = State::Composing;
        let delivered = self.deliver_all(&image, captured_at);
        drop(image);
        delivered?;

        if let Some(command) = self.config.exec.clone() {
            self.state = State::PostExec;
            match run_command(&command, captured_at, self.config.gmt) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    self.state = State::Idle;
                    return Err(CaptureError::Allocation);
                }
                Err(e) => log::error!("{}", e),
            }
        }

        self.state = State::Idle;
        Ok(())
    }

    /// Grab and average the configured number of frames.
    ///
    /// Any failed grab or decode abandons the whole set.
    pub fn capture(
        &mut self,
        device: &mut dyn Device,
        captured_at: DateTime<Utc>,
    ) -> Result<RgbImage, CaptureError> {
        let (width, height) = (self.config.device.width, self.config.device.height);
        let frames = self.config.capture.frames.max(1);
        let skip = self.config.capture.skip;

        let mut accumulator = Accumulator::new(width, height)?;

        if skip > 0 {
            log::debug!("Skipping {} frames...", skip);
            for _ in 0..skip {
                device.grab()?;
            }
        }

        log::debug!("Capturing {} frames...", frames);
        let started = Instant::now();
        for i in 0..frames {
            let frame = device.grab()?;
            if i == 0 {
                self.dump_frame(&frame, captured_at);
            }
            accumulator.accumulate(&frame)?;
        }
        log::debug!(
            "Captured {} frames in {:.2} seconds.",
            accumulator.frames(),
            started.elapsed().as_secs_f64()
        );

        accumulator.finalize(frames)
    }

    fn dump_frame(&self, frame: &RawFrame, captured_at: DateTime<Utc>) {
        let Some(pattern) = &self.config.capture.dumpframe else {
            return;
        };
        let path = format_time(Some(pattern), captured_at, self.config.gmt, FILENAME_CAPACITY);
        log::info!("Dumping raw frame to '{}'...", path);
        if let Err(e) = std::fs::write(&path, &frame.data) {
            log::error!("Error writing raw frame to '{}': {}", path, e);
        }
    }

    fn deliver_all(&mut self, image: &RgbImage, captured_at: DateTime<Utc>) -> Result<(), CaptureError> {
        self.state = State::Delivering;
        for plan in self.config.plans() {
            let result = output::deliver(
                image,
                &plan,
                self.engine.as_mut(),
                captured_at,
                self.config.gmt,
                self.daemonized,
            );
            match result {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(CaptureError::Allocation),
                Err(e) => log::error!("{}", e),
            }
        }
        Ok(())
    }

    /// Act on pending requests. Returns `false` once termination is requested.
    fn handle_requests(&mut self) -> bool {
        if self.flags.terminating() {
            return false;
        }
        if self.flags.take_hangup() {
            log::info!("Caught hangup.");
            if let Some(hook) = self.on_hangup.as_mut() {
                hook();
            }
        }
        if self.flags.take_reload() {
            log::info!("Caught reload request.");
            self.reload();
        }
        true
    }

    fn reload(&mut self) {
        let Some(hook) = self.on_reload.as_mut() else {
            return;
        };
        match hook() {
            Ok(mut fresh) => {
                // the device stays open as negotiated
                fresh.device = self.config.device.clone();
                self.config = fresh;
                log::info!("Reloaded configuration.");
            }
            Err(e) => log::error!("Keeping current configuration: {}", e),
        }
    }

    /// Sleep until the next capture slot. Returns `false` if terminated.
    fn wait_for_next_slot(&mut self) -> bool {
        let wait = until_next_slot(
            Utc::now().timestamp_millis(),
            self.config.loop_secs,
            self.config.offset,
        );
        log::debug!("Next capture in {:.1} seconds.", wait.as_secs_f64());
        let deadline = Instant::now() + wait;

        loop {
            if self.flags.pending() && !self.handle_requests() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Sleep for `duration`, cutting short on termination.
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.flags.terminating() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

/// Run the post-capture command, relaying its output to the log.
pub fn run_command(
    pattern: &str,
    captured_at: DateTime<Utc>,
    gmt: bool,
) -> Result<(), ExecError> {
    let command = expand_time(pattern, captured_at, gmt)?;
    log::info!("Executing '{}'...", command);
    run_shell(&command, |line| log::info!("{}", line))
}

/// Run `command` with `sh -c`, handing each line of its output to `on_line`.
///
/// Standard output is relayed as it arrives; standard error is collected on a
/// separate thread and relayed once the command exits.
pub fn run_shell(command: &str, mut on_line: impl FnMut(&str)) -> Result<(), ExecError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Launch {
            command: command.to_string(),
            source,
        })?;

    let stderr_thread = child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            BufReader::new(stderr)
                .lines()
                .map_while(Result::ok)
                .collect::<Vec<String>>()
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            on_line(&line);
        }
    }

    let status = child.wait().map_err(|source| ExecError::Launch {
        command: command.to_string(),
        source,
    })?;

    if let Some(handle) = stderr_thread {
        for line in handle.join().unwrap_or_default() {
            on_line(&line);
        }
    }

    if status.success() {
        Ok(())
    } else {
        Err(ExecError::Status {
            command: command.to_string(),
            status: status.to_string(),
        })
    }
}
