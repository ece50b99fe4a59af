//! Input abstraction and low-level binary parsing.
//!
//! This module owns the bytes a DEX file is decoded from and provides the primitive readers
//! every higher layer is built on.
//!
//! # Architecture
//!
//! - **File abstraction layer** - [`crate::file::File`] owns the input through a backend
//! - **Backend system** - Pluggable data sources (memory-mapped files, memory buffers)
//! - **Primitive readers** - [`crate::file::io`], [`crate::file::leb128`] and the cursor based
//!   [`crate::file::parser::Parser`]
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::File`] - Owner of the raw input buffer
//! - [`crate::file::Backend`] - Trait for different data sources (disk files, memory buffers)
//!
//! ## Backend Implementations
//! - [`crate::file::physical::Physical`] - Memory-mapped file backend for disk access
//! - [`crate::file::memory::Memory`] - In-memory buffer backend
//!
//! # Examples
//!
//! ```rust,no_run
//! use dexscope::File;
//! use std::path::Path;
//!
//! let file = File::from_path(Path::new("classes.dex"))?;
//! println!("Loaded {} bytes", file.len());
//! println!("Magic: {:02x?}", file.data_slice(0, 8)?);
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`crate::file::File`] is immutable after construction and can be shared across threads.

pub mod io;
pub mod leb128;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// Implemented by the memory-mapped and in-memory backends so that a [`File`] can be loaded
/// from either without the decoder caring where the bytes live.
pub trait Backend: Send + Sync {
    /// Returns a slice of `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the complete underlying data.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data.
    fn len(&self) -> usize;
}

/// An input file, held either in memory or as a read-only memory mapping.
pub struct File {
    data: Box<dyn Backend>,
}

impl File {
    /// Loads a file from disk by memory-mapping it.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Empty`] for an empty file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<File> {
        let input = Physical::new(path)?;

        Self::load(input)
    }

    /// Loads a file from an already opened [`std::fs::File`].
    ///
    /// # Errors
    /// Same as [`File::from_path`].
    pub fn from_std_file(file: std::fs::File) -> Result<File> {
        let input = Physical::from_std_file(file)?;

        Self::load(input)
    }

    /// Wraps an in-memory buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if the buffer is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::File;
    ///
    /// let file = File::from_mem(vec![0x64, 0x65, 0x78, 0x0A])?;
    /// assert_eq!(file.len(), 4);
    /// assert!(File::from_mem(Vec::new()).is_err());
    /// # Ok::<(), dexscope::Error>(())
    /// ```
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw file data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a slice of `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_mem() {
        let file = File::from_mem(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(file.len(), 4);
        assert!(!file.is_empty());
        assert_eq!(file.data_slice(1, 2).unwrap(), &[2, 3]);
        assert!(file.data_slice(3, 2).is_err());
    }

    #[test]
    fn empty_is_rejected() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Empty)));
    }

    #[test]
    fn from_path() {
        let path = std::env::temp_dir().join(format!("dexscope-file-{}.bin", std::process::id()));
        {
            let mut out = std::fs::File::create(&path).unwrap();
            out.write_all(b"dex\n039\0").unwrap();
        }

        let file = File::from_path(&path).unwrap();
        assert_eq!(file.data(), b"dex\n039\0");

        let missing = File::from_path(path.with_extension("missing"));
        assert!(matches!(missing, Err(crate::Error::FileError(_))));

        std::fs::remove_file(&path).unwrap();
    }
}
