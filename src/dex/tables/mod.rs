//! # Index Tables
//!
//! The fixed-stride tables that follow the header. Each table is a dense, zero-based array of
//! rows; rows reference other tables by index and the data section by byte offset.
//!
//! ## Key Components
//!
//! - [`IndexTable`]: Decoded table with typed, random row access and (parallel) iteration
//! - [`RowReadable`]: Trait implemented by every row type, defining its size and decoding
//! - [`TableSizes`]: Row counts of all tables, used to bounds-check index fields while reading
//! - [`TableId`]: Enumeration of all index tables
//!
//! ## Reading order
//!
//! Tables are decoded eagerly in a fixed order (strings, types, protos, fields, methods,
//! method handles, call sites, class definitions). Every index field is checked against the
//! row count of its target table as the row is read, and every offset field is resolved through
//! the [`crate::dex::heap::HeapBuilder`], so a finished table never holds a dangling reference.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use dexscope::DexFile;
//! use rayon::prelude::*;
//!
//! let dex = DexFile::from_path("classes.dex")?;
//!
//! for method in dex.methods().iter() {
//!     println!("{}", dex.method_reference(method.rid)?);
//! }
//!
//! let virtual_count: usize = dex
//!     .class_defs()
//!     .par_iter()
//!     .filter_map(|class| dex.class_data(class).ok().flatten())
//!     .map(|data| data.virtual_methods.len())
//!     .sum();
//! println!("{virtual_count} virtual methods");
//! # Ok::<(), dexscope::Error>(())
//! ```

mod callsiteid;
mod classdef;
mod fieldid;
mod methodhandle;
mod methodid;
mod protoid;
mod stringid;
mod typeid;

pub use callsiteid::CallSiteId;
pub use classdef::ClassDef;
pub use fieldid::FieldId;
pub use methodhandle::{MethodHandle, MethodHandleKind};
pub use methodid::MethodId;
pub use protoid::ProtoId;
pub use stringid::StringId;
pub use typeid::TypeId;

use rayon::prelude::*;
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::{
    dex::{header::Section, heap::HeapBuilder},
    file::parser::Parser,
    Error, Result,
};

/// Identifies one of the index tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum TableId {
    /// `string_ids`
    Strings,
    /// `type_ids`
    Types,
    /// `proto_ids`
    Protos,
    /// `field_ids`
    Fields,
    /// `method_ids`
    Methods,
    /// `class_defs`
    ClassDefs,
    /// `call_site_ids`
    CallSites,
    /// `method_handles`
    MethodHandles,
}

/// Row counts of all index tables.
///
/// Built from the header (and the map list for call sites and method handles) before any
/// table is read, so that index fields can be checked against tables that have not been
/// decoded yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSizes {
    counts: [u32; TableId::COUNT],
}

impl TableSizes {
    /// Creates sizes from `(table, rows)` pairs; tables not listed have no rows.
    #[must_use]
    pub fn new(counts: &[(TableId, u32)]) -> Self {
        let mut sizes = TableSizes::default();
        for &(table, rows) in counts {
            sizes.counts[table as usize] = rows;
        }
        sizes
    }

    /// Number of rows of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.counts[table as usize]
    }

    /// Checks that `index` names a row of `table`, `field_pos` being the position the index
    /// was read from.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if it does not.
    pub fn check(&self, table: TableId, index: u32, field_pos: usize) -> Result<u32> {
        let len = self.rows(table);
        if index >= len {
            return Err(Error::IndexOutOfRange {
                table,
                index,
                len,
                offset: field_pos,
            });
        }

        Ok(index)
    }
}

/// Trait for the row types of the index tables.
pub trait RowReadable: Sized + Send + Sync {
    /// The table rows of this type are stored in.
    const TABLE: TableId;

    /// Size in bytes of one row.
    fn row_size() -> usize;

    /// Reads one row at the parser's position.
    ///
    /// ## Arguments
    /// * `parser` - Positioned at the start of the row, advanced past it
    /// * `rid` - Zero-based index of the row
    /// * `heap` - Resolves offset fields and provides the table sizes for index checks
    ///
    /// ## Errors
    /// Returns an error if the row is truncated, an index is out of range, or a referenced
    /// data item cannot be decoded.
    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self>;
}

/// A decoded index table.
#[derive(Debug, Clone)]
pub struct IndexTable<T> {
    rows: Vec<T>,
    offset: u32,
}

impl<T> Default for IndexTable<T> {
    fn default() -> Self {
        IndexTable {
            rows: Vec::new(),
            offset: 0,
        }
    }
}

impl<T: RowReadable> IndexTable<T> {
    /// Reads every row of the table described by `section`.
    ///
    /// `field_pos` is the position of the field the section was declared by (a header field
    /// or a map list entry) and is used when the section does not fit the buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::SectionSizeMismatch`] or [`crate::Error::OffsetOutOfRange`] if
    /// the section does not fit the buffer, and any error produced by the rows.
    pub fn read(section: Section, field_pos: usize, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let data = heap.data();
        section.validate(T::TABLE.into(), T::row_size(), field_pos, data.len())?;
        if section.is_empty() {
            return Ok(IndexTable {
                rows: Vec::new(),
                offset: section.offset,
            });
        }

        let mut parser = Parser::at(data, section.offset as usize, heap.endian())?;
        let mut rows = Vec::with_capacity(section.size as usize);
        for rid in 0..section.size {
            rows.push(T::row_read(&mut parser, rid, heap)?);
        }

        Ok(IndexTable {
            rows,
            offset: section.offset,
        })
    }
}

impl<T> IndexTable<T> {
    /// Returns the row at `index`, if present.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.rows.get(index as usize)
    }

    /// Returns the row at `index`, `field_pos` being the position of the index field the
    /// lookup originates from.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the row does not exist.
    pub fn resolve(&self, index: u32, field_pos: usize) -> Result<&T>
    where
        T: RowReadable,
    {
        self.rows.get(index as usize).ok_or(Error::IndexOutOfRange {
            table: T::TABLE,
            index,
            len: self.len(),
            offset: field_pos,
        })
    }

    /// Number of rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u32 {
        self.rows.len() as u32
    }

    /// `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Offset of the first row.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Iterates over the rows in order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    /// Iterates over the rows in parallel.
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T>
    where
        T: Sync,
    {
        self.rows.par_iter()
    }
}

impl<'a, T> IntoIterator for &'a IndexTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
