use crate::Error;
use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Exclusive lock on a data directory, held until dropped.
///
/// Two processes co-signing the same headers at once could each append a different signature
/// set at the same height, so only one may run against a directory.
pub struct Lock {
    file: File,
    path: PathBuf,
}

impl Lock {
    /// Lock `directory` (creating it if needed), failing immediately if another process holds it.
    pub fn acquire(directory: &Path) -> Result<Self, Error> {
        let path = directory.join("LOCK");
        let lock_error = |source| Error::Lock {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(directory).map_err(lock_error)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_error)?;
        file.try_lock_exclusive().map_err(lock_error)?;
        debug!(path = %path.display(), "acquired lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("Chain");
        let lock = Lock::acquire(&data).unwrap();
        assert_eq!(lock.path(), data.join("LOCK"));

        let second = Lock::acquire(&data);
        assert!(matches!(second, Err(Error::Lock { .. })));

        drop(lock);
        Lock::acquire(&data).unwrap();
    }
}
