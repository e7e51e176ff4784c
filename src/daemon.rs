//! Background mode and PID file.

use std::io::{self, Write};
use std::path::Path;

/// Detach from the controlling terminal.
///
/// The parent exits immediately; the child continues in a new session with
/// its standard streams pointed at `/dev/null`.
#[cfg(unix)]
pub fn background() -> io::Result<()> {
    // SAFETY: called once at startup, before any threads are spawned.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io::Error::last_os_error());
    }
    if pid > 0 {
        std::process::exit(0);
    }

    unsafe {
        libc::umask(0);
    }
    if unsafe { libc::setsid() } < 0 {
        return Err(io::Error::last_os_error());
    }

    redirect_stdio()
}

#[cfg(unix)]
fn redirect_stdio() -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let null = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")?;
    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if unsafe { libc::dup2(null.as_raw_fd(), fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn background() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "background mode is only available on unix",
    ))
}

/// Write `pid` and a newline to `path`, replacing any existing file.
pub fn write_pid_to(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "{}", pid)
}

/// Record this process's id in `path`.
pub fn write_pid(path: &Path) -> io::Result<()> {
    write_pid_to(path, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stillcam.pid");
        write_pid(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", std::process::id()));
    }

    #[test]
    fn test_write_pid_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stillcam.pid");
        std::fs::write(&path, "99999\nstale\n").unwrap();
        write_pid_to(&path, 42).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "42\n");
    }

    #[test]
    fn test_write_pid_to_missing_dir_fails() {
        assert!(write_pid(Path::new("/nonexistent/dir/stillcam.pid")).is_err());
    }
}
