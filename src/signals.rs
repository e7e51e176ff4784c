//! Process-control flags set from signal handlers.
//!
//! Handlers only store `true` into an atomic. The capture loop polls and clears
//! the flags between cycles.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reload, hangup and terminate requests.
#[derive(Debug, Default)]
pub struct ControlFlags {
    reload: AtomicBool,
    hangup: AtomicBool,
    terminate: AtomicBool,
}

impl ControlFlags {
    pub const fn new() -> Self {
        Self {
            reload: AtomicBool::new(false),
            hangup: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
        }
    }

    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub fn request_hangup(&self) {
        self.hangup.store(true, Ordering::SeqCst);
    }

    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    /// Consume a pending reload request.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Consume a pending hangup request.
    pub fn take_hangup(&self) -> bool {
        self.hangup.swap(false, Ordering::SeqCst)
    }

    /// Whether termination has been requested. Never cleared.
    pub fn terminating(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Whether any request is waiting to be handled.
    pub fn pending(&self) -> bool {
        self.terminating()
            || self.reload.load(Ordering::SeqCst)
            || self.hangup.load(Ordering::SeqCst)
    }
}

/// Flags shared with the process's signal handlers.
pub static FLAGS: ControlFlags = ControlFlags::new();

#[cfg(unix)]
extern "C" fn on_hangup(_: libc::c_int) {
    FLAGS.request_hangup();
}

#[cfg(unix)]
extern "C" fn on_reload(_: libc::c_int) {
    FLAGS.request_reload();
}

/// Install the handlers for SIGINT/SIGTERM, SIGHUP and SIGUSR1.
///
/// Call once at startup. SIGHUP is installed after the Ctrl+C handler so it
/// maps to a log reopen rather than termination.
pub fn install() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| FLAGS.request_terminate())?;

    #[cfg(unix)]
    unsafe {
        libc::signal(
            libc::SIGHUP,
            on_hangup as extern "C" fn(libc::c_int) as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGUSR1,
            on_reload as extern "C" fn(libc::c_int) as libc::sighandler_t,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_flag() {
        let flags = ControlFlags::new();
        assert!(!flags.take_reload());
        flags.request_reload();
        assert!(flags.pending());
        assert!(flags.take_reload());
        assert!(!flags.take_reload());
        assert!(!flags.pending());
    }

    #[test]
    fn test_flags_are_independent() {
        let flags = ControlFlags::new();
        flags.request_hangup();
        assert!(!flags.take_reload());
        assert!(!flags.terminating());
        assert!(flags.take_hangup());
    }

    #[test]
    fn test_terminate_is_sticky() {
        let flags = ControlFlags::new();
        flags.request_terminate();
        assert!(flags.terminating());
        assert!(flags.terminating());
        assert!(flags.pending());
    }
}
