//! Command-line front end for tar-unpack.
//!
//! `untar` extracts a ustar archive into a destination directory on the host
//! filesystem and reports the number of files written.

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use tar_unpack::{FsStorage, Options, TarExtractor};

/// untar
#[derive(Debug, Parser)]
#[clap(name = "untar", version)]
pub struct App {
    /// The tar archive to extract
    archive: String,
    /// Directory to extract into, created if missing
    destination: String,

    /// Reject headers with a bad checksum
    #[clap(long)]
    verify_checksums: bool,

    /// Settings for untrusted archives: verify checksums and cap long names
    /// at 1024 bytes (individual flags still override)
    #[clap(long)]
    strict: bool,

    /// Largest GNU long name accepted, in bytes
    #[clap(long, value_name = "BYTES")]
    max_long_name: Option<u64>,
}

impl App {
    fn options(&self) -> Options {
        let mut options = if self.strict {
            Options::strict()
        } else {
            Options::default()
        };
        if self.verify_checksums {
            options.verify_checksums = true;
        }
        if let Some(limit) = self.max_long_name {
            options.max_long_name_len = limit;
        }
        options
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();
    let options = args.options();
    debug!("extracting {} into {} with {options:?}", args.archive, args.destination);

    let mut extractor = TarExtractor::with_options(FsStorage, FsStorage, options);
    let count = extractor
        .unpack(&args.archive, &args.destination)
        .with_context(|| {
            format!(
                "{} ({} -> {})",
                extractor.error_message(),
                args.archive,
                args.destination
            )
        })?;

    println!("unpacked {count} files");
    Ok(())
}
