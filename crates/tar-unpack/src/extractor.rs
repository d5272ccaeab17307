//! The record decode loop.

use std::io::{self, ErrorKind, Read, Write};

use log::{debug, trace, warn};
use tar_header::{truncate_null, EntryType, Header, HeaderError, HEADER_SIZE};

use crate::{
    error::{ErrorCode, Result, UnpackError},
    fs::FsStorage,
    options::Options,
    storage::{join_path, ByteSource, StorageSink},
};

/// Payloads are read in chunks of one block, so the padding after each
/// payload is consumed along with it.
const BLOCK_SIZE: usize = HEADER_SIZE;

/// Extracts ustar archives from a [`ByteSource`] into a [`StorageSink`].
///
/// The extractor keeps the outcome of the most recent [`unpack`] call (file
/// count and [`ErrorCode`]) and nothing else; every call starts from scratch.
///
/// # Example
///
/// ```no_run
/// use tar_unpack::TarExtractor;
///
/// let mut extractor = TarExtractor::on_filesystem();
/// match extractor.unpack("/data/update.tar", "/data/www") {
///     Ok(count) => println!("unpacked {count} files"),
///     Err(_) => eprintln!("untar error: {}", extractor.error_message()),
/// }
/// ```
///
/// [`unpack`]: TarExtractor::unpack
#[derive(Debug)]
pub struct TarExtractor<S, D> {
    source: S,
    sink: D,
    options: Options,
    num_files: usize,
    last_error: ErrorCode,
}

impl TarExtractor<FsStorage, FsStorage> {
    /// Extractor over the host filesystem with default options.
    #[must_use]
    pub fn on_filesystem() -> Self {
        Self::new(FsStorage, FsStorage)
    }
}

impl<S: ByteSource, D: StorageSink> TarExtractor<S, D> {
    /// Create an extractor with default [`Options`].
    pub fn new(source: S, sink: D) -> Self {
        Self::with_options(source, sink, Options::default())
    }

    /// Create an extractor with the given options.
    pub fn with_options(source: S, sink: D, options: Options) -> Self {
        Self {
            source,
            sink,
            options,
            num_files: 0,
            last_error: ErrorCode::Ok,
        }
    }

    /// Extract the archive at `archive` below `destination`.
    ///
    /// `destination` is created, with its parents, if it does not exist.
    /// Returns the number of regular files written. Directory and long name
    /// records are not counted. On failure nothing is counted, even files
    /// that were fully written before the error.
    pub fn unpack(&mut self, archive: &str, destination: &str) -> Result<usize> {
        self.num_files = 0;
        self.last_error = ErrorCode::Ok;

        match self.try_unpack(archive, destination) {
            Ok(count) => {
                debug!("unpacked {count} files from {archive} into {destination}");
                self.num_files = count;
                Ok(count)
            }
            Err(err) => {
                debug!("unpacking {archive} failed: {err}");
                self.last_error = err.code();
                Err(err)
            }
        }
    }

    /// Number of files written by the last [`unpack`](Self::unpack) call.
    ///
    /// Always zero after a failed call.
    #[must_use]
    pub fn num_files(&self) -> usize {
        self.num_files
    }

    /// Outcome of the last [`unpack`](Self::unpack) call.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        self.last_error
    }

    /// Fixed description of [`error_code`](Self::error_code).
    #[must_use]
    pub fn error_message(&self) -> &'static str {
        self.last_error.message()
    }

    fn try_unpack(&self, archive: &str, destination: &str) -> Result<usize> {
        debug!("checking archive {archive}");
        if !self.source.exists(archive) {
            return Err(UnpackError::InputFileNotPresent {
                path: archive.to_owned(),
                source: None,
            });
        }

        debug!("creating destination {destination}");
        let created = self.sink.mkdir(destination);
        if !self.sink.exists(destination) {
            return Err(UnpackError::OutputFolderCreation {
                path: destination.to_owned(),
                source: created.err(),
            });
        }

        debug!("opening archive {archive}");
        let reader = self
            .source
            .open(archive)
            .map_err(|source| UnpackError::InputFileNotPresent {
                path: archive.to_owned(),
                source: Some(source),
            })?;

        Unpacker::new(reader, &self.sink, destination, &self.options).run()
    }
}

enum Step {
    Continue,
    End,
}

/// State for one pass over one archive.
///
/// Dropping it closes the archive, whichever way the pass ends.
struct Unpacker<'a, R, D> {
    reader: R,
    sink: &'a D,
    destination: &'a str,
    options: &'a Options,
    chunk: [u8; BLOCK_SIZE],
    /// Offset of the next unread byte in the archive.
    pos: u64,
    first_record: bool,
    /// Name carried by a GNU long name record, waiting for its entry.
    long_name: Option<String>,
    num_files: usize,
}

impl<'a, R: Read, D: StorageSink> Unpacker<'a, R, D> {
    fn new(reader: R, sink: &'a D, destination: &'a str, options: &'a Options) -> Self {
        Self {
            reader,
            sink,
            destination,
            options,
            chunk: [0u8; BLOCK_SIZE],
            pos: 0,
            first_record: true,
            long_name: None,
            num_files: 0,
        }
    }

    fn run(mut self) -> Result<usize> {
        while let Step::Continue = self.next_record()? {}
        Ok(self.num_files)
    }

    fn next_record(&mut self) -> Result<Step> {
        let header_pos = self.pos;
        let mut header = Header::zeroed();
        read_block(&mut self.reader, &mut self.pos, header.as_mut_bytes())?;
        trace!("record at offset {header_pos}: {header:?}");

        if !header.has_magic() {
            if self.first_record {
                return Err(UnpackError::UnexpectedRecordInFile);
            }
            debug!("end of archive at offset {header_pos}");
            return Ok(Step::End);
        }

        if self.options.verify_checksums {
            header
                .verify_checksum()
                .map_err(|source| invalid_header(header_pos, source))?;
        }

        match header.entry_type() {
            EntryType::GnuLongName => self.read_long_name(&header, header_pos)?,
            EntryType::Directory => self.make_directory(&header),
            EntryType::Regular => self.write_file(&header, header_pos)?,
            EntryType::Other(flag) => self.skip_record(&header, flag)?,
        }

        self.first_record = false;
        Ok(Step::Continue)
    }

    fn read_chunk(&mut self) -> Result<()> {
        let Self {
            reader, chunk, pos, ..
        } = self;
        read_block(reader, pos, chunk)
    }

    /// Effective name of the current entry: the pending long name if there
    /// is one, the header's own path otherwise.
    fn take_name(&mut self, header: &Header) -> String {
        self.long_name
            .take()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| header.path_lossy())
    }

    fn read_long_name(&mut self, header: &Header, header_pos: u64) -> Result<()> {
        let size = header
            .entry_size()
            .map_err(|source| invalid_header(header_pos, source))?;
        if size > self.options.max_long_name_len {
            return Err(UnpackError::LongNameTooLong {
                size,
                limit: self.options.max_long_name_len,
            });
        }

        let capacity = usize::try_from(size).map_err(|_| UnpackError::LongNameTooLong {
            size,
            limit: self.options.max_long_name_len,
        })?;
        let mut name = Vec::with_capacity(capacity);
        let mut remaining = size;
        while remaining > 0 {
            self.read_chunk()?;
            let len = remaining.min(BLOCK_SIZE as u64) as usize;
            name.extend_from_slice(&self.chunk[..len]);
            remaining -= len as u64;
        }

        let name = String::from_utf8_lossy(truncate_null(&name)).into_owned();
        trace!("long name {name:?}");
        self.long_name = Some(name);
        Ok(())
    }

    fn make_directory(&mut self, header: &Header) {
        let name = self.take_name(header);
        if escapes_root(&name) {
            warn!("skipping directory {name:?}: it leaves the destination");
            return;
        }
        let path = join_path(self.destination, &name);
        debug!("mkdir {path}");
        if let Err(err) = self.sink.mkdir(&path) {
            warn!("unable to create directory {path}: {err}");
        }
    }

    fn write_file(&mut self, header: &Header, header_pos: u64) -> Result<()> {
        let name = self.take_name(header);
        let size = header
            .entry_size()
            .map_err(|source| invalid_header(header_pos, source))?;
        if escapes_root(&name) {
            warn!("skipping file {name:?}: it leaves the destination");
            return self.skip_payload(size);
        }
        let path = join_path(self.destination, &name);
        debug!("unpacking {path} ({size} bytes)");

        let mut writer = match self.sink.create(&path) {
            Ok(writer) => writer,
            Err(source) => return Err(UnpackError::WritingToDisk { path, source }),
        };

        let mut remaining = size;
        while remaining > 0 {
            self.read_chunk()?;
            let len = remaining.min(BLOCK_SIZE as u64) as usize;
            match writer.write(&self.chunk[..len]) {
                Ok(written) if written == len => {}
                Ok(written) => {
                    let source = io::Error::new(
                        ErrorKind::WriteZero,
                        format!("short write: {written} of {len} bytes"),
                    );
                    return Err(UnpackError::WritingToDisk { path, source });
                }
                Err(source) => return Err(UnpackError::WritingToDisk { path, source }),
            }
            remaining -= len as u64;
        }

        if let Err(source) = self.sink.close(writer) {
            return Err(UnpackError::WritingToDisk { path, source });
        }
        self.num_files += 1;
        Ok(())
    }

    /// Skip the payload of a record type we do not handle.
    ///
    /// The size is parsed leniently: a malformed size field on a record we
    /// ignore anyway must not end the extraction.
    fn skip_record(&mut self, header: &Header, flag: u8) -> Result<()> {
        let size = header.entry_size_lenient();
        debug!(
            "skipping record type {:?} ({size} bytes)",
            char::from(flag)
        );
        if let Some(name) = self.long_name.take() {
            debug!("discarding long name {name:?}");
        }
        self.skip_payload(size)
    }

    fn skip_payload(&mut self, size: u64) -> Result<()> {
        let mut remaining = size;
        while remaining > 0 {
            self.read_chunk()?;
            remaining = remaining.saturating_sub(BLOCK_SIZE as u64);
        }
        Ok(())
    }
}

/// Fill `buf` from the archive at `pos`, or fail with `UnexpectedEndOfFile`.
fn read_block(reader: &mut impl Read, pos: &mut u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
    let got = read_full(reader, buf).map_err(|source| UnpackError::UnexpectedEndOfFile {
        pos: *pos,
        source: Some(source),
    })?;
    if got < BLOCK_SIZE {
        return Err(UnpackError::UnexpectedEndOfFile {
            pos: *pos + got as u64,
            source: None,
        });
    }
    *pos += BLOCK_SIZE as u64;
    Ok(())
}

/// Whether an entry name has a `..` component, which would resolve outside
/// the destination.
fn escapes_root(name: &str) -> bool {
    name.split('/').any(|component| component == "..")
}

fn invalid_header(pos: u64, source: HeaderError) -> UnpackError {
    UnpackError::InvalidHeader { pos, source }
}

/// Read until `buf` is full or the stream ends, returning the byte count.
///
/// Partial reads are retried, as is `EINTR`, so only a real end of stream
/// (or an error) produces a short count.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
