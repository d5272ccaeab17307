//! Stream a ustar archive into a directory tree, one block at a time.
//!
//! [`TarExtractor`] reads an archive sequentially in 512-byte blocks and
//! materializes each regular file and directory as it goes. At most one
//! header block, one payload block and one pending GNU long name are held in
//! memory, whatever the size of the archive, which makes it usable on small
//! targets reading from flash.
//!
//! Storage is abstracted behind [`ByteSource`] (where the archive comes from)
//! and [`StorageSink`] (where entries go). [`FsStorage`] implements both for
//! the host filesystem.
//!
//! Supported: regular files, directories, GNU long names and the ustar path
//! prefix. Every other record type is skipped. Links, permissions, ownership,
//! sparse files and compressed input are not handled.
//!
//! # Example
//!
//! ```no_run
//! use tar_unpack::{Options, TarExtractor, FsStorage};
//!
//! let mut extractor = TarExtractor::with_options(FsStorage, FsStorage, Options::strict());
//! if extractor.unpack("/test.tar", "/").is_err() {
//!     eprintln!("Untar Error: {}", extractor.error_message());
//! } else {
//!     println!("Untar, unpacked {} files", extractor.num_files());
//! }
//! ```

pub mod error;
pub mod fs;
pub mod options;
pub mod storage;

mod extractor;



pub use error::{message_for_raw, ErrorCode, Result, UnpackError};
pub use extractor::TarExtractor;
pub use fs::FsStorage;
pub use options::Options;
pub use storage::{join_path, ByteSource, StorageSink};
