use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{Result, SchedulerError};

/// Exclusive advisory lock held by the single process allowed to mutate progress.
///
/// Acquisition never blocks: a held lock means another run is active and the
/// caller gets `ConcurrentRunDetected`. The lock is released on drop, including
/// when the process dies.
pub struct RunLock {
    path: PathBuf,
    _lock: Flock<File>,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_io = |source: std::io::Error| SchedulerError::LockIo {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(lock_io)?;

        let mut lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, Errno::EWOULDBLOCK)) => {
                return Err(SchedulerError::ConcurrentRunDetected {
                    lock_path: path.to_path_buf(),
                });
            }
            Err((_, errno)) => return Err(lock_io(std::io::Error::from(errno))),
        };

        // Record the holder for whoever trips over the lock next
        lock.set_len(0).map_err(lock_io)?;
        lock.seek(SeekFrom::Start(0)).map_err(lock_io)?;
        writeln!(lock, "{}", std::process::id()).map_err(lock_io)?;

        Ok(RunLock {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for RunLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLock").field("path", &self.path).finish()
    }
}
