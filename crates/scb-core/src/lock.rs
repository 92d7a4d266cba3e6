//! Cross-process, cross-thread file lock
//!
//! Composes an in-process ownership state machine (owner thread + depth
//! counter behind a mutex/condvar) with an advisory `flock` on a lock
//! file's descriptor. Acquisition always takes the in-process layer
//! first; the OS lock is touched only on the 0→1 depth transition and
//! released only on the 1→0 transition, so nested acquisitions from the
//! holding thread never hit the kernel.
//!
//! The lock file's contents are never read or written; only its
//! descriptor matters.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Poll interval for the deadline-bounded OS acquisition. Advisory locks
/// have no wait notification, so the non-blocking call is retried; the
/// deadline can be overshot by at most this much.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct OwnerState {
    owner: Option<ThreadId>,
    depth: u32,
}

pub struct FileLock {
    file: File,
    state: Mutex<OwnerState>,
    available: Condvar,
}

impl FileLock {
    /// Open (creating if needed) the lock file at `path`. The descriptor
    /// is held for the lifetime of the handle and closed on drop.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file,
            state: Mutex::new(OwnerState::default()),
            available: Condvar::new(),
        })
    }

    /// Acquire the lock, blocking indefinitely on both layers. Nested
    /// calls from the holding thread succeed immediately.
    pub fn lock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return true;
                }
                None => break,
                Some(_) => state = self.available.wait(state).unwrap(),
            }
        }
        state.owner = Some(me);
        state.depth = 1;
        drop(state);

        // The OS call happens outside the in-process critical section so
        // waiters on other handles are not serialized behind it.
        if let Err(err) = flock(self.file.as_raw_fd(), libc::LOCK_EX) {
            log::warn!("flock failed: {err}");
            self.release_ownership();
            return false;
        }
        true
    }

    /// Deadline-bounded acquisition. Waits for the in-process layer until
    /// `deadline`, then busy-polls the non-blocking OS lock; returns
    /// `false` (with nothing held) if the deadline passes first.
    pub fn lock_before(&self, deadline: Instant) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return true;
                }
                None => break,
                Some(_) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (next, _) = self
                        .available
                        .wait_timeout(state, deadline - now)
                        .unwrap();
                    state = next;
                }
            }
        }
        state.owner = Some(me);
        state.depth = 1;
        drop(state);

        loop {
            match try_flock(self.file.as_raw_fd()) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    log::warn!("flock failed: {err}");
                    self.release_ownership();
                    return false;
                }
            }
            if Instant::now() >= deadline {
                self.release_ownership();
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Release one level of the lock. The OS lock is dropped only when the
    /// depth reaches zero. Returns `false` when the calling thread does
    /// not hold the lock.
    pub fn unlock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.owner != Some(me) || state.depth == 0 {
            return false;
        }
        state.depth -= 1;
        if state.depth == 0 {
            if let Err(err) = flock(self.file.as_raw_fd(), libc::LOCK_UN) {
                log::warn!("flock release failed: {err}");
            }
            state.owner = None;
            self.available.notify_one();
        }
        true
    }

    fn release_ownership(&self) {
        let mut state = self.state.lock().unwrap();
        state.owner = None;
        state.depth = 0;
        self.available.notify_one();
    }
}

fn flock(fd: libc::c_int, operation: libc::c_int) -> io::Result<()> {
    loop {
        if unsafe { libc::flock(fd, operation) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Non-blocking exclusive flock: `Ok(false)` means currently held
/// elsewhere.
fn try_flock(fd: libc::c_int) -> io::Result<bool> {
    match flock(fd, libc::LOCK_EX | libc::LOCK_NB) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(err),
    }
}
