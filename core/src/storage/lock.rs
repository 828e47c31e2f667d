use std::{
    fs::{File, OpenOptions},
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::{flock, FlockArg},
};

use super::error::{Error, Result};

/// Exclusive advisory lock on a file, held until [`FileLock::release`] or drop.
///
/// Only the existence of the lock matters; the file's contents are never read.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// Tries once to take the lock. `Ok(None)` means another process holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fsutil::mkdir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| Error::SingleIO("Cannot open lock file", path.to_owned(), e))?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => Ok(Some(Self {
                path: path.to_owned(),
                file: Some(file),
            })),
            Err(Errno::EWOULDBLOCK) => Ok(None),
            Err(errno) => Err(Error::SingleIO(
                "Cannot lock file",
                path.to_owned(),
                errno.into(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Releases the lock. Calling it again is a no-op.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            return
        };
        if let Err(e) = flock(file.as_raw_fd(), FlockArg::Unlock) {
            // closing the descriptor below drops the lock anyway
            log::warn!("Failed to unlock {:?}: {}", self.path, e);
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn second_acquire_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks/x.lock");

        let mut first = FileLock::try_acquire(&path).unwrap().unwrap();
        assert!(first.is_held());

        let started = std::time::Instant::now();
        assert!(FileLock::try_acquire(&path).unwrap().is_none());
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        first.release();
        first.release();
        assert!(!first.is_held());
        assert!(FileLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("y.lock");
        {
            let _lock = FileLock::try_acquire(&path).unwrap().unwrap();
            assert!(FileLock::try_acquire(&path).unwrap().is_none());
        }
        assert!(FileLock::try_acquire(&path).unwrap().is_some());
    }
}
