//! Storage capabilities the extractor is built on.
//!
//! The extractor never touches a filesystem directly. It reads the archive
//! through a [`ByteSource`] and materializes entries through a
//! [`StorageSink`]; [`FsStorage`](crate::fs::FsStorage) implements both over
//! the host filesystem. Paths are plain `/`-separated strings.
//!
//! Handles are closed by dropping them. [`StorageSink::close`] exists so a
//! sink can report a failure that only shows up when the file is finished.

use std::io::{self, Read, Write};

/// Sequential, forward-only access to an archive.
pub trait ByteSource {
    /// Reader over one opened archive.
    ///
    /// A short read (including zero bytes) means the end of the stream; an
    /// `Err` is a hard read error.
    type Reader: Read;

    /// Whether `path` names an existing entry.
    fn exists(&self, path: &str) -> bool;

    /// Open `path` for reading.
    fn open(&self, path: &str) -> io::Result<Self::Reader>;
}

/// Destination for extracted directories and files.
pub trait StorageSink {
    /// Writer over one output file.
    ///
    /// A call to `write` that accepts fewer bytes than offered is treated as
    /// a failed write.
    type Writer: Write;

    /// Whether `path` names an existing entry.
    fn exists(&self, path: &str) -> bool;

    /// Create the directory `path` and any missing parents.
    ///
    /// Succeeds if the directory already exists.
    fn mkdir(&self, path: &str) -> io::Result<()>;

    /// Create or truncate the file `path` for writing.
    fn create(&self, path: &str) -> io::Result<Self::Writer>;

    /// Finish a file created by [`StorageSink::create`].
    fn close(&self, mut writer: Self::Writer) -> io::Result<()> {
        writer.flush()
    }
}

/// Join a destination root and an entry name with exactly one `/`.
///
/// A root that already ends in `/` is used as is, and leading `/` on the
/// name are dropped, so the result never has a doubled or missing separator
/// at the join.
///
/// ```
/// use tar_unpack::join_path;
///
/// assert_eq!(join_path("/data", "a.txt"), "/data/a.txt");
/// assert_eq!(join_path("/data/", "a.txt"), "/data/a.txt");
/// assert_eq!(join_path("/", "etc/"), "/etc/");
/// ```
#[must_use]
pub fn join_path(root: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if root.ends_with('/') {
        format!("{root}{name}")
    } else {
        format!("{root}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/out", "dir/file"), "/out/dir/file");
        assert_eq!(join_path("/out/", "dir/file"), "/out/dir/file");
        assert_eq!(join_path("/out", "/abs"), "/out/abs");
        assert_eq!(join_path("/out/", "//abs"), "/out/abs");
        assert_eq!(join_path("out", "dir/"), "out/dir/");
    }

    #[test]
    fn test_join_path_trailing_separator_equivalence() {
        for name in ["a", "a/b", "a/b/", "./c"] {
            assert_eq!(join_path("/root", name), join_path("/root/", name));
        }
    }
}
