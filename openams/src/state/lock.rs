//! Exclusive lock on the provisioning home directory.
//!
//! Uses flock(2) so that the front end and the continuation never mutate
//! the state file at the same time, even if the continuation service starts
//! before the front end has exited.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::{ProvisionError, ProvisionResult};
use crate::layout::files::LOCK_FILE;

/// How to behave when another process holds the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Fail immediately (interactive front end).
    TryOnce,
    /// Block until the holder exits (continuation).
    Wait,
}

/// A lock guard that holds an exclusive lock on the provisioning home.
///
/// The lock is released when this guard is dropped, or when the process
/// exits or crashes.
#[derive(Debug)]
pub struct StateLock {
    #[allow(dead_code)] // Held for lifetime, not directly accessed
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Acquire the lock on `home_dir`, creating the directory if needed.
    ///
    /// With [`LockMode::Wait`] this blocks the calling thread; async callers
    /// should run it on a blocking task.
    pub fn acquire(home_dir: &Path, mode: LockMode) -> ProvisionResult<Self> {
        std::fs::create_dir_all(home_dir)
            .map_err(|e| ProvisionError::Storage(format!("failed to create home dir: {}", e)))?;

        let lock_path = home_dir.join(LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| ProvisionError::Storage(format!("failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let operation = match mode {
                LockMode::TryOnce => libc::LOCK_EX | libc::LOCK_NB,
                LockMode::Wait => libc::LOCK_EX,
            };
            let fd = file.as_raw_fd();
            if mode == LockMode::Wait {
                tracing::debug!(lock_path = %lock_path.display(), "Waiting for state lock");
            }
            let result = unsafe { libc::flock(fd, operation) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(ProvisionError::Locked(format!(
                        "Another provisioning process is using {}; wait for it to finish \
                         or stop the continuation service",
                        home_dir.display()
                    )));
                } else {
                    return Err(ProvisionError::Storage(format!(
                        "failed to acquire lock: {}",
                        err
                    )));
                }
            }
        }

        #[cfg(not(unix))]
        {
            compile_error!("state locking requires flock(2)");
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired state lock");

        Ok(StateLock {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released state lock");
    }
}
