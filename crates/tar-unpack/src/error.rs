//! Error types for archive extraction.
//!
//! Every failure is terminal for the [`unpack`] call that hit it. The
//! failure is returned as an [`UnpackError`], which carries the path or
//! stream offset involved, and is also recorded on the extractor as a plain
//! [`ErrorCode`] with a fixed human-readable message.
//!
//! [`unpack`]: crate::TarExtractor::unpack

use std::{fmt, io};

use tar_header::HeaderError;

/// Message for raw codes outside the [`ErrorCode`] table.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Outcome of the most recent extraction, as a stable integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// The last extraction succeeded.
    #[default]
    Ok = 0,
    /// The destination root does not exist after trying to create it.
    OutputFolderCreation = 1,
    /// The archive does not exist or could not be opened.
    InputFileNotPresent = 2,
    /// The archive ended in the middle of a block.
    UnexpectedEndOfFile = 3,
    /// The first block is not a ustar header.
    UnexpectedRecordInFile = 4,
    /// An output file could not be created, written or closed in full.
    WritingToDisk = 5,
    /// A header field needed to drive I/O is malformed.
    InvalidHeader = 6,
    /// A GNU long name is larger than the configured limit.
    LongNameTooLong = 7,
}

impl ErrorCode {
    /// Look up a code from its raw value.
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::Ok,
            1 => Self::OutputFolderCreation,
            2 => Self::InputFileNotPresent,
            3 => Self::UnexpectedEndOfFile,
            4 => Self::UnexpectedRecordInFile,
            5 => Self::WritingToDisk,
            6 => Self::InvalidHeader,
            7 => Self::LongNameTooLong,
            _ => return None,
        })
    }

    /// The raw integer value; zero means success.
    #[must_use]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns true for [`ErrorCode::Ok`].
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Short description of the code.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::OutputFolderCreation => "Unable to create output destination folder",
            Self::InputFileNotPresent => "Unable to access input tarfile",
            Self::UnexpectedEndOfFile => "Unexpected End of File",
            Self::UnexpectedRecordInFile => "Unexpected record in file - is this a tar file?",
            Self::WritingToDisk => "Error saving to disk",
            Self::InvalidHeader => "Invalid tar header",
            Self::LongNameTooLong => "Long file name exceeds limit",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Message for a raw code, falling back to [`UNKNOWN_ERROR`].
#[must_use]
pub fn message_for_raw(raw: i32) -> &'static str {
    ErrorCode::from_raw(raw).map_or(UNKNOWN_ERROR, ErrorCode::message)
}

/// Errors that end an extraction.
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    /// The destination root does not exist after trying to create it.
    #[error("unable to create output destination folder {path:?}")]
    OutputFolderCreation {
        /// The destination root.
        path: String,
        /// Why creation failed, if the sink said.
        #[source]
        source: Option<io::Error>,
    },

    /// The archive does not exist or could not be opened.
    #[error("unable to access input tarfile {path:?}")]
    InputFileNotPresent {
        /// The archive path.
        path: String,
        /// Why opening failed, if it got that far.
        #[source]
        source: Option<io::Error>,
    },

    /// A header or payload block could not be read in full.
    #[error("unexpected end of file at offset {pos}")]
    UnexpectedEndOfFile {
        /// Stream offset where the short read happened.
        pos: u64,
        /// The read error, if the stream reported one.
        #[source]
        source: Option<io::Error>,
    },

    /// The first block is not a ustar header.
    #[error("unexpected record at the start of the archive - is this a tar file?")]
    UnexpectedRecordInFile,

    /// An output file could not be created, written or closed in full.
    #[error("error saving {path:?} to disk")]
    WritingToDisk {
        /// The output file.
        path: String,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A header field needed to drive I/O is malformed.
    #[error("invalid header at offset {pos}")]
    InvalidHeader {
        /// Stream offset of the header block.
        pos: u64,
        /// What is wrong with it.
        #[source]
        source: HeaderError,
    },

    /// A GNU long name is larger than the configured limit.
    #[error("GNU long name exceeds limit: {size} bytes > {limit} bytes")]
    LongNameTooLong {
        /// Declared size of the long name record.
        size: u64,
        /// Configured limit.
        limit: u64,
    },
}

impl UnpackError {
    /// The [`ErrorCode`] this error is recorded as.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::OutputFolderCreation { .. } => ErrorCode::OutputFolderCreation,
            Self::InputFileNotPresent { .. } => ErrorCode::InputFileNotPresent,
            Self::UnexpectedEndOfFile { .. } => ErrorCode::UnexpectedEndOfFile,
            Self::UnexpectedRecordInFile => ErrorCode::UnexpectedRecordInFile,
            Self::WritingToDisk { .. } => ErrorCode::WritingToDisk,
            Self::InvalidHeader { .. } => ErrorCode::InvalidHeader,
            Self::LongNameTooLong { .. } => ErrorCode::LongNameTooLong,
        }
    }
}

/// Result type for extraction.
pub type Result<T> = std::result::Result<T, UnpackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        for raw in 0..8 {
            let code = ErrorCode::from_raw(raw).unwrap();
            assert_eq!(code.as_raw(), raw);
        }
        assert_eq!(ErrorCode::from_raw(8), None);
        assert_eq!(ErrorCode::from_raw(-1), None);
        assert!(ErrorCode::default().is_ok());
    }

    #[test]
    fn test_messages() {
        assert_eq!(ErrorCode::Ok.message(), "OK");
        assert_eq!(
            ErrorCode::UnexpectedRecordInFile.to_string(),
            "Unexpected record in file - is this a tar file?"
        );
        assert_eq!(message_for_raw(5), "Error saving to disk");
        assert_eq!(message_for_raw(42), UNKNOWN_ERROR);
    }

    #[test]
    fn test_error_codes() {
        let err = UnpackError::WritingToDisk {
            path: "/out/a".into(),
            source: io::ErrorKind::WriteZero.into(),
        };
        assert_eq!(err.code(), ErrorCode::WritingToDisk);
        assert_eq!(err.to_string(), "error saving \"/out/a\" to disk");

        let err = UnpackError::UnexpectedEndOfFile {
            pos: 1024,
            source: None,
        };
        assert_eq!(err.code(), ErrorCode::UnexpectedEndOfFile);
        assert_eq!(UnpackError::UnexpectedRecordInFile.code().as_raw(), 4);
    }
}
