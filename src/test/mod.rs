//! Shared functionality used by the unit tests
//!
//! - [`DexBuilder`] synthesizes complete DEX images from class, method and code descriptions
//! - [`HeapFixture`] places raw bytes in a buffer and hands out a [`HeapBuilder`] over it, for
//!   exercising single data item decoders
//! - variable-length integer encoders and [`words`] for writing raw item bytes


pub use builder::{AnnotationSpec, ClassSpec, CodeSpec, DexBuilder, MethodSpec};

use crate::{
    dex::{
        config::LoaderConfig,
        diagnostics::Diagnostics,
        header::Section,
        heap::HeapBuilder,
        tables::{TableId, TableSizes},
    },
    file::io::Endian,
};

pub fn encode_uleb128(mut value: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

pub fn encode_sleb128(mut value: i32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

pub fn encode_uleb128p1(value: Option<u32>) -> Vec<u8> {
    encode_uleb128(value.map_or(0, |value| value + 1))
}

/// Little-endian bytes of `values`.
pub fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// A zero-filled little-endian buffer to decode single data items from.
pub struct HeapFixture {
    data: Vec<u8>,
    sizes: TableSizes,
    data_section: Section,
    config: LoaderConfig,
}

impl HeapFixture {
    pub fn new(len: usize) -> Self {
        HeapFixture {
            data: vec![0; len],
            sizes: TableSizes::default(),
            data_section: Section::default(),
            config: LoaderConfig::default(),
        }
    }

    pub fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn sizes(&mut self, counts: &[(TableId, u32)]) {
        self.sizes = TableSizes::new(counts);
    }

    pub fn data_section(&mut self, offset: u32, size: u32) {
        self.data_section = Section { size, offset };
    }

    pub fn config(&mut self, config: LoaderConfig) {
        self.config = config;
    }

    pub fn builder<'a>(&'a self, diagnostics: &'a Diagnostics) -> HeapBuilder<'a> {
        let mut heap = HeapBuilder::new(&self.data, Endian::Little, self.config, diagnostics);
        heap.set_sizes(self.sizes);
        heap.set_data_section(self.data_section);
        heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leb128_encoders() {
        assert_eq!(encode_uleb128(0), vec![0x00]);
        assert_eq!(encode_uleb128(128), vec![0x80, 0x01]);
        assert_eq!(encode_sleb128(-1), vec![0x7F]);
        assert_eq!(encode_sleb128(-128), vec![0x80, 0x7F]);
        assert_eq!(encode_sleb128(64), vec![0xC0, 0x00]);
        assert_eq!(encode_uleb128p1(None), vec![0x00]);
        assert_eq!(encode_uleb128p1(Some(0)), vec![0x01]);
        assert_eq!(words(&[1, 0x0102_0304]), vec![1, 0, 0, 0, 4, 3, 2, 1]);
    }
}
