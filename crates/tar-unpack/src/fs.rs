//! Host filesystem storage.

use std::{fs::File, io};

use log::trace;
use rustix::{
    fs::{accessat, mkdirat, openat, Access, AtFlags, Mode, OFlags, CWD},
    io::{Errno, Result as ErrnoResult},
};

use crate::storage::{ByteSource, StorageSink};

/// Reads archives from and extracts into the host filesystem.
///
/// Relative paths resolve against the current directory. [`create`]
/// makes missing parent directories first, the way flash filesystems do on
/// open-for-write, so archives without directory records still extract.
///
/// [`create`]: StorageSink::create
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

trait ErrnoFilter<T> {
    fn filter_errno(self, ignored: Errno) -> ErrnoResult<Option<T>>;
}

impl<T> ErrnoFilter<T> for ErrnoResult<T> {
    fn filter_errno(self, ignored: Errno) -> ErrnoResult<Option<T>> {
        match self {
            Ok(result) => Ok(Some(result)),
            Err(err) if err == ignored => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn path_exists(path: &str) -> bool {
    accessat(CWD, path, Access::EXISTS, AtFlags::empty()).is_ok()
}

/// Create `path` and every missing ancestor, front to back.
fn mkdir_all(path: &str) -> io::Result<()> {
    let mut end = 0;
    for component in path.split_inclusive('/') {
        end += component.len();
        let prefix = path[..end].trim_end_matches('/');
        if prefix.is_empty() || component == "/" {
            continue;
        }
        if mkdirat(CWD, prefix, Mode::from_raw_mode(0o755))
            .filter_errno(Errno::EXIST)?
            .is_some()
        {
            trace!("created directory {prefix}");
        }
    }
    Ok(())
}

impl ByteSource for FsStorage {
    type Reader = File;

    fn exists(&self, path: &str) -> bool {
        path_exists(path)
    }

    fn open(&self, path: &str) -> io::Result<File> {
        let fd = openat(CWD, path, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())?;
        Ok(File::from(fd))
    }
}

impl StorageSink for FsStorage {
    type Writer = File;

    fn exists(&self, path: &str) -> bool {
        path_exists(path)
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        mkdir_all(path)
    }

    fn create(&self, path: &str) -> io::Result<File> {
        if let Some((parent, _)) = path.rsplit_once('/') {
            mkdir_all(parent)?;
        }
        let fd = openat(
            CWD,
            path,
            OFlags::WRONLY | OFlags::CREATE | OFlags::TRUNC | OFlags::CLOEXEC,
            Mode::from_raw_mode(0o644),
        )?;
        Ok(File::from(fd))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn path_str(path: &std::path::Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn test_mkdir_is_recursive_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let nested = path_str(&nested);

        FsStorage.mkdir(nested).unwrap();
        assert!(StorageSink::exists(&FsStorage, nested));
        FsStorage.mkdir(nested).unwrap();
        FsStorage.mkdir(&format!("{nested}/")).unwrap();
    }

    #[test]
    fn test_create_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sub/dir/file.txt");
        let file = path_str(&file);

        let mut writer = FsStorage.create(file).unwrap();
        writer.write_all(b"hello").unwrap();
        FsStorage.close(writer).unwrap();

        assert!(ByteSource::exists(&FsStorage, file));
        let mut contents = String::new();
        FsStorage
            .open(file)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.tar");
        let missing = path_str(&missing);

        assert!(!ByteSource::exists(&FsStorage, missing));
        let err = FsStorage.open(missing).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
