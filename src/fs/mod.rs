use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::consts::MINIMUM_FREE_GAP;
use crate::err::{Error, Result};

/// An open file plus enough bookkeeping to answer `is_closed` without
/// relying on the OS to tell us (`File` gives us no such query).
pub struct FileHandle {
    file: Option<File>,
    pub path: PathBuf,
}

impl FileHandle {
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

/// Path-resolved file operations plus capacity checks, isolated behind a
/// small facade so the transport core never touches `std::fs` directly.
/// All paths server-side are resolved against a fixed storage directory;
/// client-side callers pass already-resolved absolute/relative paths and
/// construct a facade with no base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: Option<PathBuf>,
}

impl FileStore {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        FileStore { base_dir }
    }

    /// Validates a server-supplied filename and resolves it against the
    /// storage directory. Rejects path separators and traversal so a
    /// malicious filename can never escape the storage directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::InvalidFilename);
        }
        match &self.base_dir {
            Some(dir) => Ok(dir.join(name)),
            None => Ok(PathBuf::from(name)),
        }
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    pub fn open_write_new(&self, path: &Path) -> Result<FileHandle> {
        if path.exists() {
            return Err(Error::FileAlreadyExists);
        }
        let file = File::create(path)?;
        Ok(FileHandle {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    pub fn open_read(&self, path: &Path) -> Result<FileHandle> {
        if !path.exists() {
            return Err(Error::FileDoesNotExist);
        }
        let file = File::open(path)?;
        Ok(FileHandle {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    pub fn read(&self, handle: &mut FileHandle, n: usize) -> Result<Vec<u8>> {
        let file = handle.file.as_mut().expect("read on a closed file handle");
        let mut buf = vec![0u8; n];
        let mut total = 0;
        while total < n {
            let read = file.read(&mut buf[total..])?;
            if read == 0 {
                break;
            }
            total += read;
        }
        buf.truncate(total);
        Ok(buf)
    }

    pub fn append(&self, handle: &mut FileHandle, bytes: &[u8]) -> Result<()> {
        let file = handle.file.as_mut().expect("append on a closed file handle");
        file.write_all(bytes)?;
        Ok(())
    }

    pub fn size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    /// Free-space query with a fixed safety margin so a transfer never
    /// drives the destination filesystem down to zero bytes free.
    pub fn can_fit(&self, size_in_bytes: u64) -> Result<bool> {
        let probe_dir = self
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let stat = nix::sys::statvfs::statvfs(&probe_dir).map_err(|_| Error::InvalidDirectory)?;
        let available = stat.blocks_available() as u64 * stat.fragment_size() as u64;
        Ok(available >= size_in_bytes.saturating_add(MINIMUM_FREE_GAP))
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn close(&self, handle: &mut FileHandle) {
        handle.file = None;
    }

    pub fn is_closed(&self, handle: &FileHandle) -> bool {
        handle.is_closed()
    }

    /// File cleanup after a failed transfer (§4.12): removes a partial
    /// destination file unless its on-disk size already matches the
    /// announced size.
    pub fn cleanup_after_error(&self, path: &Path, announced_size: Option<u64>) {
        if !path.exists() {
            return;
        }
        let keep = match announced_size {
            Some(expected) => self.size(path).map(|actual| actual == expected).unwrap_or(false),
            None => false,
        };
        if !keep {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_write_new_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(Some(dir.path().to_path_buf()));
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();

        assert!(matches!(
            store.open_write_new(&path),
            Err(Error::FileAlreadyExists)
        ));
    }

    #[test]
    fn open_read_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(Some(dir.path().to_path_buf()));
        let path = dir.path().join("missing.txt");

        assert!(matches!(
            store.open_read(&path),
            Err(Error::FileDoesNotExist)
        ));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(Some(dir.path().to_path_buf()));
        let path = dir.path().join("f.txt");

        let mut handle = store.open_write_new(&path).unwrap();
        store.append(&mut handle, b"hello world").unwrap();
        store.close(&mut handle);
        assert!(store.is_closed(&handle));

        let mut handle = store.open_read(&path).unwrap();
        let data = store.read(&mut handle, 1024).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn resolve_rejects_path_traversal() {
        let store = FileStore::new(Some(PathBuf::from("/tmp/storage")));
        assert!(matches!(store.resolve("../escape"), Err(Error::InvalidFilename)));
        assert!(matches!(store.resolve("a/b"), Err(Error::InvalidFilename)));
    }

    #[test]
    fn cleanup_removes_partial_file_of_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(Some(dir.path().to_path_buf()));
        let path = dir.path().join("partial.bin");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        store.cleanup_after_error(&path, Some(100));
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_keeps_file_matching_announced_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(Some(dir.path().to_path_buf()));
        let path = dir.path().join("complete.bin");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        store.cleanup_after_error(&path, Some(10));
        assert!(path.exists());
    }
}
