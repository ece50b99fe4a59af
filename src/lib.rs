// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory
#![allow(clippy::too_many_arguments)]

//! # dexscope
//!
//! A structural decoder for Dalvik executable (DEX) files, as found inside Android APKs.
//! Built in pure Rust, `dexscope` decodes every index table and data item of a DEX file
//! into an immutable, thread-safe view and reports malformed input with the exact offset
//! at which decoding failed.
//!
//! ## Features
//!
//! - **Bounds-checked decoding** - Every read is checked; no input panics or reads out of bounds
//! - **Precise errors** - Every error carries the offset of the field it was detected at
//! - **Single decode per item** - Data items referenced from many places are decoded once and shared
//! - **Both byte orders** - Little-endian files and their reverse-endian variant
//! - **Memory-mapped input** - Large files are mapped instead of read
//! - **Thread safe** - A decoded [`DexFile`] is `Send + Sync` and can be queried from rayon workers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dexscope::prelude::*;
//!
//! let dex = DexFile::from_path("classes.dex")?;
//! println!("{} classes", dex.class_defs().len());
//!
//! for class in dex.class_defs() {
//!     println!("{}", dex.class_name(class)?);
//!     if let Some(data) = dex.class_data(class)? {
//!         for method in data.methods() {
//!             println!("  {}", dex.method_reference(method.method_idx)?);
//!         }
//!     }
//! }
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Input backends (memory, memory-mapped) and the bounds-checked [`Parser`]
//! - [`dex`] - The format itself: header, index tables, data heap, loader and resolver
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Non-fatal findings
//!
//! Checksum and signature mismatches, misplaced data items and similar deviations do not fail
//! the decode. They are collected as [`dex::diagnostics::Diagnostic`]s:
//!
//! ```rust,no_run
//! use dexscope::DexFile;
//!
//! let dex = DexFile::from_path("classes.dex")?;
//! for diagnostic in dex.diagnostics().iter() {
//!     println!("{diagnostic}");
//! }
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! Which checks run is controlled by [`LoaderConfig`].
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//!
//! # Fuzzing
//! cargo +nightly fuzz run dexfile --release -- -jobs=4 -fork=1
//! ```
#[macro_use]
pub(crate) mod error;

/// Input backends and low-level parsing utilities.
///
/// - [`file::File`] - An input buffer, either owned or memory-mapped
/// - [`file::parser::Parser`] - Bounds-checked cursor with endian-aware reads
/// - [`file::leb128`] - Variable-length integer decoding
pub mod file;

/// Decoding of the DEX format.
pub mod dex;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use dexscope::prelude::*;
///
/// let dex = DexFile::from_path("classes.dex")?;
/// let strings = dex.strings().len();
/// # Ok::<(), dexscope::Error>(())
/// ```
pub mod prelude;

/// `dexscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dexscope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use dexscope::{DexFile, Error};
///
/// match DexFile::from_path("classes.dex") {
///     Ok(dex) => println!("{} classes", dex.class_defs().len()),
///     Err(Error::MalformedMagic { .. }) => println!("Not a DEX file"),
///     Err(error) => match error.offset() {
///         Some(offset) => println!("Malformed at 0x{offset:08x}: {error}"),
///         None => println!("Error: {error}"),
///     },
/// }
/// ```
pub use error::Error;

/// Main entry point for decoding DEX files.
pub use dex::dexfile::DexFile;

/// Controls which checks run while decoding.
pub use dex::config::LoaderConfig;

/// Provides access to low-level file and memory parsing utilities.
pub use file::{io::Endian, parser::Parser, File};
