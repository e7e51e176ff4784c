//! Log destinations.
//!
//! Messages go through the `log` facade to an `env_logger` backend whose output
//! is routed to stderr, a file, syslog, or nowhere. A file destination can be
//! reopened so external log rotation works.

use env_logger::{Env, Target};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    Syslog,
    File(PathBuf),
    Discard,
}

impl FromStr for LogTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("empty log destination".to_string()),
            "stderr" => Ok(LogTarget::Stderr),
            "syslog" => Ok(LogTarget::Syslog),
            _ => {
                let path = s.strip_prefix("file:").unwrap_or(s);
                if path.is_empty() {
                    return Err(format!("invalid log destination '{}'", s));
                }
                Ok(LogTarget::File(PathBuf::from(path)))
            }
        }
    }
}

impl LogTarget {
    /// Pick the destination from the `log` setting.
    ///
    /// Without a setting, background mode has nowhere to write and discards.
    pub fn resolve(setting: Option<&str>, background: bool) -> Result<Self, String> {
        match setting {
            Some(s) => s.parse(),
            None if background => Ok(LogTarget::Discard),
            None => Ok(LogTarget::Stderr),
        }
    }
}

/// Default level for the `--verbose`/`--quiet` switches.
pub fn level(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// A log file shared with the logger that can be swapped for a fresh handle.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl LogFile {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the current file and open the path again.
    pub fn reopen(&self) -> io::Result<()> {
        let fresh = open_append(&self.path)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        *file = fresh;
        Ok(())
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        f(&mut file)
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|f| f.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|f| f.flush())
    }
}

/// Syslog priority for a formatted line, from its level prefix.
fn syslog_priority(line: &str) -> i32 {
    let level = line.split(':').next().unwrap_or("");
    match level {
        "ERROR" => 3,
        "WARN" => 4,
        "INFO" => 6,
        _ => 7,
    }
}

/// Forwards complete lines to the system logger.
#[derive(Debug, Default)]
struct SyslogWriter {
    pending: Vec<u8>,
}

#[cfg(unix)]
fn openlog() {
    unsafe {
        libc::openlog(
            b"stillcam\0".as_ptr() as *const libc::c_char,
            libc::LOG_PID,
            libc::LOG_DAEMON,
        );
    }
}

#[cfg(unix)]
fn syslog(priority: i32, message: &str) {
    let Ok(message) = std::ffi::CString::new(message.replace('\0', " ")) else {
        return;
    };
    unsafe {
        libc::syslog(
            priority,
            b"%s\0".as_ptr() as *const libc::c_char,
            message.as_ptr(),
        );
    }
}

#[cfg(not(unix))]
fn openlog() {}

#[cfg(not(unix))]
fn syslog(_priority: i32, message: &str) {
    eprintln!("{}", message);
}

impl SyslogWriter {
    fn open() -> Self {
        openlog();
        Self::default()
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end();
            syslog(syslog_priority(line), line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handle on the installed logger.
#[derive(Debug, Default)]
pub struct LogHandle {
    file: Option<LogFile>,
}

impl LogHandle {
    /// Reopen the log file, if logging to one.
    pub fn reopen(&self) {
        let Some(file) = &self.file else {
            return;
        };
        match file.reopen() {
            Ok(()) => log::info!("Reopened log file '{}'.", file.path().display()),
            Err(e) => log::error!(
                "Unable to reopen log file '{}': {}",
                file.path().display(),
                e
            ),
        }
    }
}

/// Install the global logger.
///
/// `RUST_LOG` overrides `level`. Installing twice leaves the first logger in
/// place.
pub fn init(target: LogTarget, level: LevelFilter) -> io::Result<LogHandle> {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(level.as_str()));

    let mut handle = LogHandle::default();
    match target {
        LogTarget::Stderr | LogTarget::File(_) => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                )
            });
        }
        LogTarget::Syslog | LogTarget::Discard => {
            builder.format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()));
        }
    }

    match target {
        LogTarget::Stderr => {
            builder.target(Target::Stderr);
        }
        LogTarget::File(path) => {
            let file = LogFile::open(path)?;
            builder.target(Target::Pipe(Box::new(file.clone())));
            handle.file = Some(file);
        }
        LogTarget::Syslog => {
            builder.target(Target::Pipe(Box::new(SyslogWriter::open())));
        }
        LogTarget::Discard => {
            builder.target(Target::Pipe(Box::new(io::sink())));
        }
    }

    let _ = builder.try_init();
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_targets() {
        assert_eq!("stderr".parse::<LogTarget>().unwrap(), LogTarget::Stderr);
        assert_eq!("syslog".parse::<LogTarget>().unwrap(), LogTarget::Syslog);
        assert_eq!(
            "file:/var/log/cam.log".parse::<LogTarget>().unwrap(),
            LogTarget::File(PathBuf::from("/var/log/cam.log"))
        );
        assert_eq!(
            "cam.log".parse::<LogTarget>().unwrap(),
            LogTarget::File(PathBuf::from("cam.log"))
        );
        assert!("".parse::<LogTarget>().is_err());
        assert!("file:".parse::<LogTarget>().is_err());
    }

    #[test]
    fn test_background_without_log_discards() {
        assert_eq!(LogTarget::resolve(None, true).unwrap(), LogTarget::Discard);
        assert_eq!(LogTarget::resolve(None, false).unwrap(), LogTarget::Stderr);
        assert_eq!(
            LogTarget::resolve(Some("syslog"), true).unwrap(),
            LogTarget::Syslog
        );
    }

    #[test]
    fn test_level_switches() {
        assert_eq!(level(false, false), LevelFilter::Info);
        assert_eq!(level(true, false), LevelFilter::Debug);
        assert_eq!(level(false, true), LevelFilter::Error);
    }

    #[test]
    fn test_syslog_priority() {
        assert_eq!(syslog_priority("ERROR: disk full"), 3);
        assert_eq!(syslog_priority("WARN: no font"), 4);
        assert_eq!(syslog_priority("INFO: saved"), 6);
        assert_eq!(syslog_priority("DEBUG: frame"), 7);
    }

    #[test]
    fn test_log_file_reopen_after_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stillcam.log");
        let rotated = dir.path().join("stillcam.log.1");

        let mut file = LogFile::open(&path).unwrap();
        writeln!(file, "first").unwrap();
        std::fs::rename(&path, &rotated).unwrap();

        file.reopen().unwrap();
        writeln!(file, "second").unwrap();
        file.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&rotated).unwrap(), "first\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("append.log");
        std::fs::write(&path, "existing\n").unwrap();

        let mut file = LogFile::open(&path).unwrap();
        writeln!(file, "more").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nmore\n");
    }
}
