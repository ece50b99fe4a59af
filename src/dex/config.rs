//! Loader configuration
//!
//! Controls the optional work done while decoding a DEX file: integrity checks of the
//! header, the comparison between header and map list, and how much of the data section
//! is decoded.

/// Configuration for decoding a DEX file
///
/// Structural decoding of everything reachable from the index tables is always performed.
/// The options here add integrity checks and control whether unreferenced data items are
/// decoded as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct LoaderConfig {
    /// Compute the Adler-32 checksum over the file and report a mismatch as a warning
    pub verify_checksum: bool,

    /// Compute the SHA-1 signature over the file and report a mismatch as a warning
    pub verify_signature: bool,

    /// Compare the index table counts and offsets of the map list against the header
    /// A disagreement fails the decode with [`crate::Error::SectionSizeMismatch`]
    pub cross_check_map: bool,

    /// Decode every data item declared by the map list, including unreferenced ones
    pub sweep_map: bool,

    /// Maximum nesting depth of encoded arrays and annotations (default: 32)
    pub max_encoded_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            verify_signature: true,
            cross_check_map: true,
            sweep_map: true,
            max_encoded_depth: 32,
        }
    }
}

impl LoaderConfig {
    /// Creates a minimal configuration for maximum performance
    ///
    /// Only the structural decode of referenced items is performed.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            verify_checksum: false,
            verify_signature: false,
            cross_check_map: false,
            sweep_map: false,
            max_encoded_depth: 32,
        }
    }

    /// Creates a configuration suitable for production use
    ///
    /// Mirrors what a runtime checks when opening a DEX file: the checksum is verified, the
    /// signature (which requires hashing the whole file) is not.
    #[must_use]
    pub fn production() -> Self {
        Self {
            verify_checksum: true,
            verify_signature: false,
            cross_check_map: true,
            sweep_map: false,
            max_encoded_depth: 32,
        }
    }

    /// Creates a configuration with all checks enabled
    #[must_use]
    pub fn strict() -> Self {
        Self {
            verify_checksum: true,
            verify_signature: true,
            cross_check_map: true,
            sweep_map: true,
            max_encoded_depth: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let minimal = LoaderConfig::minimal();
        assert!(!minimal.verify_checksum);
        assert!(!minimal.verify_signature);
        assert!(!minimal.cross_check_map);
        assert!(!minimal.sweep_map);

        let production = LoaderConfig::production();
        assert!(production.verify_checksum);
        assert!(!production.verify_signature);
        assert!(production.cross_check_map);

        let strict = LoaderConfig::strict();
        assert!(strict.verify_signature);
        assert!(strict.sweep_map);
        assert_eq!(strict.max_encoded_depth, 16);

        assert_eq!(LoaderConfig::default().max_encoded_depth, 32);
    }
}
