//! Zerocopy view of ustar tar header blocks.
//!
//! Every record in a tar archive starts with a 512-byte header block. This
//! crate projects the fields an extractor needs out of that block: the path
//! (with the ustar prefix applied), the payload size, the type flag and the
//! magic that identifies the block as a ustar header at all. Fields are read
//! through [`zerocopy`] so no byte is reinterpreted by hand.
//!
//! # Header Field Layout
//!
//! | Offset | Size | Field     | Description                              |
//! |--------|------|-----------|------------------------------------------|
//! | 0      | 100  | name      | File path (null-terminated if < 100)     |
//! | 100    | 8    | mode      | File mode in octal ASCII                 |
//! | 108    | 8    | uid       | Owner user ID in octal ASCII             |
//! | 116    | 8    | gid       | Owner group ID in octal ASCII            |
//! | 124    | 12   | size      | Payload size in octal ASCII              |
//! | 136    | 12   | mtime     | Modification time (Unix epoch, octal)    |
//! | 148    | 8    | checksum  | Header checksum in octal ASCII           |
//! | 156    | 1    | typeflag  | Entry type (see [`EntryType`])           |
//! | 157    | 100  | linkname  | Link target for hard/symbolic links      |
//! | 257    | 6    | magic     | "ustar\0" (POSIX) or "ustar " (GNU)      |
//! | 263    | 2    | version   | "00" (POSIX) or " \0" (GNU)              |
//! | 265    | 32   | uname     | Owner user name                          |
//! | 297    | 32   | gname     | Owner group name                         |
//! | 329    | 8    | devmajor  | Device major number                      |
//! | 337    | 8    | devminor  | Device minor number                      |
//! | 345    | 155  | prefix    | Path prefix (POSIX ustar only)           |
//!
//! Only `name`, `size`, `checksum`, `typeflag`, `magic` and `prefix` are
//! interpreted here; the rest of the block is carried but ignored.
//!
//! # Example
//!
//! ```
//! use tar_header::{EntryType, Header};
//!
//! let mut header = Header::new_ustar();
//! header.set_path(b"docs/readme.txt").unwrap();
//! header.set_size(1234).unwrap();
//! header.set_entry_type(EntryType::Regular);
//! header.update_checksum();
//!
//! assert!(header.has_magic());
//! assert_eq!(header.entry_size().unwrap(), 1234);
//! assert_eq!(header.path_lossy(), "docs/readme.txt");
//! assert!(header.verify_checksum().is_ok());
//! ```

use std::{borrow::Cow, fmt};

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of a tar header block in bytes.
pub const HEADER_SIZE: usize = 512;

/// Magic string for POSIX ustar headers ("ustar\0").
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Version field for POSIX ustar headers ("00").
pub const USTAR_VERSION: &[u8; 2] = b"00";

/// Magic string for GNU tar headers ("ustar ").
pub const GNU_MAGIC: &[u8; 6] = b"ustar ";

/// Version field for GNU tar headers (" \0").
pub const GNU_VERSION: &[u8; 2] = b" \0";

/// The part of the magic shared by POSIX and GNU headers.
const MAGIC_STEM: &[u8; 5] = b"ustar";

/// Errors that can occur when decoding or building tar headers.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// An octal field contains invalid characters.
    #[error("invalid octal field: {0:?}")]
    InvalidOctal(Vec<u8>),

    /// The header checksum does not match the computed value.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// The checksum value stored in the header.
        expected: u64,
        /// The checksum computed from the header bytes.
        computed: u64,
    },

    /// A path does not fit in the name field.
    #[error("path too long for header: {len} bytes > {limit} bytes")]
    PathTooLong {
        /// Length of the rejected path.
        len: usize,
        /// Capacity of the field.
        limit: usize,
    },

    /// A number does not fit in its octal field.
    #[error("value {value} does not fit in a {width}-byte octal field")]
    ValueTooLarge {
        /// The rejected value.
        value: u64,
        /// Width of the field, including its terminator.
        width: usize,
    },
}

/// Result type for header operations.
pub type Result<T> = std::result::Result<T, HeaderError>;

/// Named fields of a ustar header block.
///
/// GNU headers share this layout up to `devminor`; what GNU stores in the
/// `prefix` area (access/change times, sparse maps) is never interpreted.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct UstarHeader {
    /// File path name (null-terminated if shorter than 100 bytes).
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// Payload size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time as Unix timestamp in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name for hard/symbolic links.
    pub linkname: [u8; 100],
    /// Magic string identifying the format.
    pub magic: [u8; 6],
    /// Format version.
    pub version: [u8; 2],
    /// Owner user name (null-terminated).
    pub uname: [u8; 32],
    /// Owner group name (null-terminated).
    pub gname: [u8; 32],
    /// Device major number in octal ASCII.
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII.
    pub devminor: [u8; 8],
    /// Path prefix for names longer than 100 bytes.
    pub prefix: [u8; 155],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 12],
}

impl fmt::Debug for UstarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarHeader")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("size", &String::from_utf8_lossy(truncate_null(&self.size)))
            .field("typeflag", &self.typeflag)
            .field("magic", &self.magic)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Entry Type
// ============================================================================

/// Kind of record a header introduces.
///
/// Only the kinds an extractor acts upon get their own variant; every other
/// type flag is carried as [`EntryType::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (type '0' or '\0' for old tar compatibility).
    Regular,
    /// Directory (type '5').
    Directory,
    /// GNU tar long name extension (type 'L').
    GnuLongName,
    /// Any other type flag.
    Other(u8),
}

impl EntryType {
    /// Parse an entry type from a raw byte value.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'5' => EntryType::Directory,
            b'L' => EntryType::GnuLongName,
            other => EntryType::Other(other),
        }
    }

    /// Convert an entry type to its raw byte representation.
    ///
    /// Note that `Regular` is encoded as '0', not '\0'.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Directory => b'5',
            EntryType::GnuLongName => b'L',
            EntryType::Other(b) => b,
        }
    }
}

impl From<u8> for EntryType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<EntryType> for u8 {
    fn from(entry_type: EntryType) -> Self {
        entry_type.to_byte()
    }
}

// ============================================================================
// Header Wrapper
// ============================================================================

/// One 512-byte header block with accessor methods.
///
/// The block is stored as raw bytes so it can be filled directly by a
/// reader; [`Header::fields`] gives the named view.
#[derive(Clone, Copy, FromBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct Header {
    bytes: [u8; HEADER_SIZE],
}

impl Header {
    /// Create an all-zero block, ready to be filled from a stream.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            bytes: [0u8; HEADER_SIZE],
        }
    }

    /// Create a new header with POSIX ustar magic and version.
    #[must_use]
    pub fn new_ustar() -> Self {
        let mut header = Self::zeroed();
        let fields = header.fields_mut();
        fields.magic = *USTAR_MAGIC;
        fields.version = *USTAR_VERSION;
        header
    }

    /// Create a new header with GNU tar magic and version.
    #[must_use]
    pub fn new_gnu() -> Self {
        let mut header = Self::zeroed();
        let fields = header.fields_mut();
        fields.magic = *GNU_MAGIC;
        fields.version = *GNU_VERSION;
        header
    }

    /// Get a reference to the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.bytes
    }

    /// Get a mutable reference to the underlying bytes.
    pub fn as_mut_bytes(&mut self) -> &mut [u8; HEADER_SIZE] {
        &mut self.bytes
    }

    /// View the block through its named fields.
    #[must_use]
    pub fn fields(&self) -> &UstarHeader {
        zerocopy::transmute_ref!(&self.bytes)
    }

    fn fields_mut(&mut self) -> &mut UstarHeader {
        zerocopy::transmute_mut!(&mut self.bytes)
    }

    /// Check whether the block carries the "ustar" magic.
    ///
    /// Only the first five bytes are compared, so both POSIX and GNU
    /// headers are accepted. All-zero end-of-archive blocks fail this check.
    #[must_use]
    pub fn has_magic(&self) -> bool {
        self.fields().magic.starts_with(MAGIC_STEM)
    }

    /// Check if this header uses the POSIX ustar format.
    #[must_use]
    pub fn is_ustar(&self) -> bool {
        self.fields().magic == *USTAR_MAGIC && self.fields().version == *USTAR_VERSION
    }

    /// Check if this header uses the GNU tar format.
    #[must_use]
    pub fn is_gnu(&self) -> bool {
        self.fields().magic == *GNU_MAGIC && self.fields().version == *GNU_VERSION
    }

    /// Get the entry type.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.fields().typeflag)
    }

    /// Get the payload size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::InvalidOctal`] if the size field is not valid.
    pub fn entry_size(&self) -> Result<u64> {
        parse_numeric(&self.fields().size)
    }

    /// Get the payload size, tolerating garbage in the field.
    ///
    /// See [`parse_octal_lenient`].
    #[must_use]
    pub fn entry_size_lenient(&self) -> u64 {
        parse_octal_lenient(&self.fields().size)
    }

    /// Get the raw name field, truncated at the first NUL.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        truncate_null(&self.fields().name)
    }

    /// Get the ustar prefix field for long paths.
    ///
    /// Returns `None` for GNU and pre-POSIX headers, whose prefix area holds
    /// other data.
    #[must_use]
    pub fn prefix(&self) -> Option<&[u8]> {
        if self.fields().magic != *USTAR_MAGIC {
            return None;
        }
        Some(truncate_null(&self.fields().prefix))
    }

    /// Get the full path: `prefix/name` when a ustar prefix is present,
    /// otherwise the name field alone.
    #[must_use]
    pub fn path(&self) -> Cow<'_, [u8]> {
        match self.prefix() {
            Some(prefix) if !prefix.is_empty() => {
                let mut full = prefix.to_vec();
                full.push(b'/');
                full.extend_from_slice(self.name_bytes());
                Cow::Owned(full)
            }
            _ => Cow::Borrowed(self.name_bytes()),
        }
    }

    /// Get the full path as a lossy UTF-8 string.
    #[must_use]
    pub fn path_lossy(&self) -> String {
        String::from_utf8_lossy(&self.path()).into_owned()
    }

    /// Verify the header checksum.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::ChecksumMismatch`] if the checksum is invalid,
    /// or [`HeaderError::InvalidOctal`] if the stored checksum cannot be parsed.
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = parse_octal(&self.fields().checksum)?;
        let computed = self.compute_checksum();
        if expected == computed {
            Ok(())
        } else {
            Err(HeaderError::ChecksumMismatch { expected, computed })
        }
    }

    /// Compute the header checksum.
    ///
    /// This is the unsigned sum of all header bytes, with the checksum field
    /// (bytes 148..156) counted as spaces.
    #[must_use]
    pub fn compute_checksum(&self) -> u64 {
        self.bytes
            .iter()
            .enumerate()
            .map(|(i, &byte)| {
                if (148..156).contains(&i) {
                    u64::from(b' ')
                } else {
                    u64::from(byte)
                }
            })
            .sum()
    }

    /// Store `path` in the name field.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::PathTooLong`] if it does not fit in 100 bytes.
    pub fn set_path(&mut self, path: &[u8]) -> Result<()> {
        let name = &mut self.fields_mut().name;
        if path.len() > name.len() {
            return Err(HeaderError::PathTooLong {
                len: path.len(),
                limit: name.len(),
            });
        }
        name.fill(0);
        name[..path.len()].copy_from_slice(path);
        Ok(())
    }

    /// Store the payload size as octal.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::ValueTooLarge`] for sizes of 8 GiB and up.
    pub fn set_size(&mut self, size: u64) -> Result<()> {
        write_octal(&mut self.fields_mut().size, size)
    }

    /// Set the type flag.
    pub fn set_entry_type(&mut self, entry_type: EntryType) {
        self.fields_mut().typeflag = entry_type.to_byte();
    }

    /// Recompute and store the checksum.
    pub fn update_checksum(&mut self) {
        let sum = self.compute_checksum();
        // six digits, NUL, space: the layout GNU tar writes
        let text = format!("{sum:06o}\0 ");
        self.fields_mut()
            .checksum
            .copy_from_slice(&text.as_bytes()[..8]);
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new_ustar()
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("path", &self.path_lossy())
            .field("entry_type", &self.entry_type())
            .field("size", &self.entry_size().ok())
            .field("is_ustar", &self.is_ustar())
            .field("is_gnu", &self.is_gnu())
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse an octal ASCII field into a u64.
///
/// Octal fields in tar headers are ASCII strings with optional leading
/// spaces and trailing spaces or null bytes. For example:
/// - `"0000644\0"` -> 420
/// - `"     123 "` -> 83
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if the field contains invalid
/// characters (anything other than spaces, digits 0-7, or null bytes).
pub fn parse_octal(bytes: &[u8]) -> Result<u64> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);

    let mut value: u64 = 0;
    for &byte in &bytes[start..end] {
        if !(b'0'..=b'7').contains(&byte) {
            return Err(HeaderError::InvalidOctal(bytes.to_vec()));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| HeaderError::InvalidOctal(bytes.to_vec()))?;
    }

    Ok(value)
}

/// Parse a numeric field that may be octal ASCII or GNU base-256 encoded.
///
/// When the high bit of the first byte is set, the remaining bits are a
/// big-endian binary value. Otherwise the field is parsed with
/// [`parse_octal`].
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if octal parsing fails or the
/// base-256 value overflows.
pub fn parse_numeric(bytes: &[u8]) -> Result<u64> {
    match bytes.first() {
        Some(first) if first & 0x80 != 0 => {
            let mut value: u64 = 0;
            for (i, &byte) in bytes.iter().enumerate() {
                let b = if i == 0 { byte & 0x7f } else { byte };
                value = value
                    .checked_mul(256)
                    .and_then(|v| v.checked_add(u64::from(b)))
                    .ok_or_else(|| HeaderError::InvalidOctal(bytes.to_vec()))?;
            }
            Ok(value)
        }
        _ => parse_octal(bytes),
    }
}

/// Parse the leading octal digits of a field, ignoring whatever follows.
///
/// Leading spaces are skipped; parsing stops at the first byte that is not
/// an octal digit. A field with no digits yields zero, and overflow
/// saturates. This never fails, so it suits records whose payload is only
/// skipped.
///
/// ```
/// use tar_header::parse_octal_lenient;
///
/// assert_eq!(parse_octal_lenient(b"00000001750\0"), 1000);
/// assert_eq!(parse_octal_lenient(b"  17x9"), 15);
/// assert_eq!(parse_octal_lenient(b"junk"), 0);
/// ```
#[must_use]
pub fn parse_octal_lenient(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|b| (b'0'..=b'7').contains(b))
        .fold(0u64, |acc, &b| {
            acc.saturating_mul(8).saturating_add(u64::from(b - b'0'))
        })
}

/// Write `value` into `field` as zero-padded octal followed by a NUL.
fn write_octal(field: &mut [u8], value: u64) -> Result<()> {
    let width = field.len();
    let text = format!("{value:0digits$o}", digits = width - 1);
    if text.len() >= width {
        return Err(HeaderError::ValueTooLarge { value, width });
    }
    field[..text.len()].copy_from_slice(text.as_bytes());
    field[text.len()] = 0;
    Ok(())
}

/// Truncate a byte slice at the first null byte.
///
/// ```
/// use tar_header::truncate_null;
///
/// assert_eq!(truncate_null(b"hello\0world"), b"hello");
/// assert_eq!(truncate_null(b"no null here"), b"no null here");
/// ```
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(path: &[u8], size: u64) -> Header {
        let mut header = Header::new_ustar();
        header.set_path(path).unwrap();
        header.set_size(size).unwrap();
        header.set_entry_type(EntryType::Regular);
        header.update_checksum();
        header
    }

    #[test]
    fn test_header_size() {
        assert_eq!(size_of::<UstarHeader>(), HEADER_SIZE);
        assert_eq!(size_of::<Header>(), HEADER_SIZE);
    }

    #[test]
    fn test_magic() {
        assert!(Header::new_ustar().has_magic());
        assert!(Header::new_ustar().is_ustar());
        assert!(Header::new_gnu().has_magic());
        assert!(Header::new_gnu().is_gnu());
        assert!(!Header::zeroed().has_magic());

        let mut header = Header::new_ustar();
        header.as_mut_bytes()[257..262].copy_from_slice(b"ustaR");
        assert!(!header.has_magic());
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal(b"0000644\0").unwrap(), 0o644);
        assert_eq!(parse_octal(b"     123 ").unwrap(), 0o123);
        assert_eq!(parse_octal(b"").unwrap(), 0);
        assert_eq!(parse_octal(b"   \0\0\0").unwrap(), 0);
        assert_eq!(parse_octal(b"77777777777").unwrap(), 0o77777777777);
        assert!(parse_octal(b"abc").is_err());
        assert!(parse_octal(b"128").is_err());
        assert!(parse_octal(b"12x\0").is_err());
    }

    #[test]
    fn test_parse_numeric_base256() {
        let mut field = [0u8; 12];
        field[0] = 0x80;
        field[7] = 0x02;
        assert_eq!(parse_numeric(&field).unwrap(), 0x2_0000_0000);
    }

    #[test]
    fn test_parse_octal_lenient() {
        assert_eq!(parse_octal_lenient(b"00000001000\0"), 512);
        assert_eq!(parse_octal_lenient(b"12x\0"), 0o12);
        assert_eq!(parse_octal_lenient(b"\0\0\0"), 0);
        assert_eq!(parse_octal_lenient(b"9"), 0);
        assert_eq!(parse_octal_lenient(&[b'7'; 40]), u64::MAX);
    }

    #[test]
    fn test_entry_type() {
        assert_eq!(EntryType::from_byte(b'\0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'5'), EntryType::Directory);
        assert_eq!(EntryType::from_byte(b'L'), EntryType::GnuLongName);
        assert_eq!(EntryType::from_byte(b'K'), EntryType::Other(b'K'));
        assert_eq!(u8::from(EntryType::Regular), b'0');
        assert_eq!(u8::from(EntryType::Other(b'x')), b'x');
    }

    #[test]
    fn test_checksum() {
        let mut header = regular(b"file.txt", 13);
        header.verify_checksum().unwrap();

        header.as_mut_bytes()[0] = b'F';
        assert!(matches!(
            header.verify_checksum(),
            Err(HeaderError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_setters() {
        let header = regular(b"a/b.txt", 1000);
        assert_eq!(&header.fields().size, b"00000001750\0");
        assert_eq!(header.entry_size().unwrap(), 1000);
        assert_eq!(header.entry_type(), EntryType::Regular);

        let mut header = Header::new_ustar();
        assert!(matches!(
            header.set_path(&[b'a'; 101]),
            Err(HeaderError::PathTooLong { len: 101, limit: 100 })
        ));
        header.set_path(&[b'a'; 100]).unwrap();
        assert_eq!(header.name_bytes().len(), 100);
        assert!(matches!(
            header.set_size(0o100000000000),
            Err(HeaderError::ValueTooLarge { width: 12, .. })
        ));
    }

    #[test]
    fn test_path_with_prefix() {
        let mut header = regular(b"file.txt", 0);
        header.as_mut_bytes()[345..353].copy_from_slice(b"some/dir");
        assert_eq!(header.path_lossy(), "some/dir/file.txt");

        // GNU headers use the prefix area for timestamps
        let mut header = Header::new_gnu();
        header.set_path(b"file.txt").unwrap();
        header.as_mut_bytes()[345..353].copy_from_slice(b"01234567");
        assert_eq!(header.prefix(), None);
        assert_eq!(header.path_lossy(), "file.txt");
    }

    #[test]
    fn test_truncate_null() {
        assert_eq!(truncate_null(b"hello\0world"), b"hello");
        assert_eq!(truncate_null(b"\0start"), b"");
        assert_eq!(truncate_null(b""), b"");
    }
}
