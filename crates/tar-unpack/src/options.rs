//! Extraction options.

/// Knobs for [`TarExtractor`](crate::TarExtractor).
///
/// # Example
///
/// ```
/// use tar_unpack::Options;
///
/// let options = Options {
///     verify_checksums: true,
///     ..Default::default()
/// };
/// assert_eq!(options.max_long_name_len, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Reject headers whose checksum field does not match their contents.
    ///
    /// Off by default: only the magic field gates acceptance, so archives
    /// with damaged checksums still extract.
    pub verify_checksums: bool,

    /// Largest GNU long name record accepted, in bytes.
    ///
    /// The name is held in memory until the record it applies to arrives,
    /// so this bounds the only allocation that depends on archive contents.
    ///
    /// Default: 4096 bytes.
    pub max_long_name_len: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            max_long_name_len: 4096,
        }
    }
}

impl Options {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for archives from untrusted sources: checksums verified,
    /// long names capped at 1 KiB.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            verify_checksums: true,
            max_long_name_len: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::new();
        assert!(!options.verify_checksums);
        assert_eq!(options.max_long_name_len, 4096);
    }

    #[test]
    fn test_strict_options() {
        let options = Options::strict();
        assert!(options.verify_checksums);
        assert!(options.max_long_name_len < Options::default().max_long_name_len);
    }
}
