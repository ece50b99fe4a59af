//! # DEX Format
//!
//! Decoding of the Dalvik executable format, from the fixed header down to the individual data
//! items.
//!
//! ## Layout
//!
//! A DEX file consists of
//! - a 0x70 byte [`header`] locating every other section and carrying the checksum and signature,
//! - the index [`tables`] (`string_ids` through `class_defs`, plus `call_site_ids` and
//!   `method_handles` located through the map list) made of fixed-size rows,
//! - a data section of variable-length items addressed by byte offset, decoded once each into
//!   the [`heap`],
//! - the map list, an inventory of every section keyed by [`typecode::TypeCode`].
//!
//! ## Key Components
//!
//! - [`dexfile::DexFile`]: The decoded file and the entry point of the crate
//! - `loader`: Orders the decode through its load stages
//! - [`heap::HeapBuilder`]: Decodes data items on first reference
//! - [`resolver::Resolver`]: Memoized type, field and method names
//! - [`config::LoaderConfig`]: Which checks run during the decode
//! - [`diagnostics::Diagnostics`]: Non-fatal findings collected during the decode

pub mod access;
pub mod config;
pub mod dexfile;
pub mod diagnostics;
pub mod header;
pub mod heap;
pub(crate) mod loader;
pub mod resolver;
pub mod tables;
pub mod typecode;
