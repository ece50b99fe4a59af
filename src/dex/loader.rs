//! Orchestrates the decode of a complete DEX file.
//!
//! Decoding runs through a fixed sequence of stages:
//!
//! ```text
//! Start -> HeaderParsed -> TablesParsed -> ClassDefsParsed -> Done
//!   \___________\______________\_______________\______> Failed
//! ```
//!
//! 1. The header is decoded and its sections are checked against the buffer. Checksum and
//!    signature mismatches are reported as warnings.
//! 2. The map list is decoded and optionally compared against the header.
//! 3. The index tables are read in order (strings, types, protos, fields, methods, method
//!    handles, call sites); every row resolves its data section references on the fly.
//! 4. The class definitions are read, cascading into class data, code, debug info,
//!    annotations, interfaces and static values.
//! 5. The hidden API data is decoded once the member counts of every class are known, and
//!    optionally every item declared by the map list is decoded (the map sweep).
//!
//! Any error ends the decode in [`LoadStage::Failed`]; the error carries the offset at which it
//! was detected.

use strum::Display;

use crate::{
    dex::{
        config::LoaderConfig,
        diagnostics::{DiagnosticCategory, Diagnostics},
        header::{
            Header, Section, CHECKSUM_OFFSET, CLASS_DEFS_OFFSET, FIELD_IDS_OFFSET,
            FILE_SIZE_OFFSET, HEADER_SIZE, HEADER_SIZE_OFFSET, MAP_OFF_OFFSET,
            METHOD_IDS_OFFSET, PROTO_IDS_OFFSET, SIGNATURE_OFFSET, STRING_IDS_OFFSET,
            TYPE_IDS_OFFSET,
        },
        heap::{DataHeap, HeapBuilder, HeapValue, MapItem, MapList},
        tables::{
            CallSiteId, ClassDef, FieldId, IndexTable, MethodHandle, MethodId, ProtoId,
            RowReadable, StringId, TableId, TableSizes, TypeId,
        },
        typecode::TypeCode,
    },
    Error, Result,
};

/// Progress of a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum LoadStage {
    /// Nothing decoded yet
    Start,
    /// Header decoded and checked
    HeaderParsed,
    /// Map list and the id tables decoded
    TablesParsed,
    /// Class definitions and everything reachable from them decoded
    ClassDefsParsed,
    /// Decode completed
    Done,
    /// Decode failed
    Failed,
}

/// Everything decoded from one file.
pub(crate) struct LoadedDex {
    pub header: Header,
    pub map: MapList,
    pub strings: IndexTable<StringId>,
    pub types: IndexTable<TypeId>,
    pub protos: IndexTable<ProtoId>,
    pub fields: IndexTable<FieldId>,
    pub methods: IndexTable<MethodId>,
    pub class_defs: IndexTable<ClassDef>,
    pub call_sites: IndexTable<CallSiteId>,
    pub method_handles: IndexTable<MethodHandle>,
    pub heap: DataHeap,
}

/// Drives the decode of one buffer through the [`LoadStage`]s.
pub(crate) struct Loader<'a> {
    data: &'a [u8],
    config: LoaderConfig,
    diagnostics: &'a Diagnostics,
    stage: LoadStage,
    reached: LoadStage,
}

impl<'a> Loader<'a> {
    pub fn new(data: &'a [u8], config: LoaderConfig, diagnostics: &'a Diagnostics) -> Self {
        Loader {
            data,
            config,
            diagnostics,
            stage: LoadStage::Start,
            reached: LoadStage::Start,
        }
    }

    /// The current stage.
    #[cfg(test)]
    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    /// The last stage completed before a failure, or the current stage.
    #[cfg(test)]
    pub fn reached(&self) -> LoadStage {
        self.reached
    }

    fn advance(&mut self, next: LoadStage) {
        log::debug!("dex load: {} -> {}", self.stage, next);
        self.stage = next;
        self.reached = next;
    }

    /// Decodes the buffer.
    pub fn load(&mut self) -> Result<LoadedDex> {
        match self.run() {
            Ok(loaded) => {
                self.advance(LoadStage::Done);
                Ok(loaded)
            }
            Err(error) => {
                log::debug!("dex load failed after {}: {}", self.reached, error);
                self.stage = LoadStage::Failed;
                Err(error)
            }
        }
    }

    fn run(&mut self) -> Result<LoadedDex> {
        let header = Header::read(self.data)?;
        self.check_integrity(&header);
        self.advance(LoadStage::HeaderParsed);

        let mut heap = HeapBuilder::new(self.data, header.endian, self.config, self.diagnostics);
        heap.set_data_section(header.data);

        let map = Self::read_map(&header, &mut heap)?;
        if self.config.cross_check_map {
            Self::cross_check(&header, &map)?;
        }

        let call_sites = map.find(TypeCode::CallSiteIdItem).copied();
        let method_handles = map.find(TypeCode::MethodHandleItem).copied();
        heap.set_sizes(TableSizes::new(&[
            (TableId::Strings, header.string_ids.size),
            (TableId::Types, header.type_ids.size),
            (TableId::Protos, header.proto_ids.size),
            (TableId::Fields, header.field_ids.size),
            (TableId::Methods, header.method_ids.size),
            (TableId::ClassDefs, header.class_defs.size),
            (TableId::CallSites, call_sites.map_or(0, |item| item.size)),
            (TableId::MethodHandles, method_handles.map_or(0, |item| item.size)),
        ]));

        let strings = IndexTable::read(header.string_ids, STRING_IDS_OFFSET, &mut heap)?;
        let types = IndexTable::read(header.type_ids, TYPE_IDS_OFFSET, &mut heap)?;
        let protos = IndexTable::read(header.proto_ids, PROTO_IDS_OFFSET, &mut heap)?;
        let fields = IndexTable::read(header.field_ids, FIELD_IDS_OFFSET, &mut heap)?;
        let methods = IndexTable::read(header.method_ids, METHOD_IDS_OFFSET, &mut heap)?;
        let method_handles = Self::read_map_table(method_handles, &mut heap)?;
        let call_sites = Self::read_map_table(call_sites, &mut heap)?;
        log::debug!(
            "dex tables: {} strings, {} types, {} protos, {} fields, {} methods",
            strings.len(),
            types.len(),
            protos.len(),
            fields.len(),
            methods.len()
        );
        self.advance(LoadStage::TablesParsed);

        let class_defs: IndexTable<ClassDef> =
            IndexTable::read(header.class_defs, CLASS_DEFS_OFFSET, &mut heap)?;
        log::debug!("dex class defs: {}", class_defs.len());
        self.advance(LoadStage::ClassDefsParsed);

        let member_counts = class_defs
            .iter()
            .map(|class| {
                class
                    .class_data
                    .and_then(|index| heap.value(index))
                    .and_then(HeapValue::as_class_data)
                    .map_or(0, |data| u32::try_from(data.member_count()).unwrap_or(u32::MAX))
            })
            .collect();
        heap.set_member_counts(member_counts);

        if let Some(item) = map.find(TypeCode::HiddenapiClassDataItem) {
            heap.resolve(item.position + 8, item.offset, item.type_code)?;
        }

        if self.config.sweep_map {
            Self::sweep(&map, &mut heap)?;
        }

        let heap = heap.finish()?;
        log::debug!(
            "dex heap: {} items, {} decode calls",
            heap.len(),
            heap.decode_calls()
        );

        Ok(LoadedDex {
            header,
            map,
            strings,
            types,
            protos,
            fields,
            methods,
            class_defs,
            call_sites,
            method_handles,
            heap,
        })
    }

    fn check_integrity(&self, header: &Header) {
        if (header.file_size as usize) < self.data.len() {
            self.diagnostics.warning_at(
                DiagnosticCategory::Header,
                FILE_SIZE_OFFSET,
                format!(
                    "File size {} is smaller than the buffer ({} bytes)",
                    header.file_size,
                    self.data.len()
                ),
            );
        }

        if header.header_size as usize != HEADER_SIZE {
            self.diagnostics.warning_at(
                DiagnosticCategory::Header,
                HEADER_SIZE_OFFSET,
                format!("Unexpected header size 0x{:x}", header.header_size),
            );
        }

        if self.config.verify_checksum {
            let computed = header.compute_checksum(self.data);
            if computed != header.checksum {
                self.diagnostics.warning_at(
                    DiagnosticCategory::Header,
                    CHECKSUM_OFFSET,
                    format!(
                        "Checksum mismatch: stored 0x{:08x}, computed 0x{:08x}",
                        header.checksum, computed
                    ),
                );
            }
        }

        if self.config.verify_signature && header.compute_signature(self.data) != header.signature
        {
            self.diagnostics.warning_at(
                DiagnosticCategory::Header,
                SIGNATURE_OFFSET,
                "SHA-1 signature mismatch",
            );
        }
    }

    fn read_map(header: &Header, heap: &mut HeapBuilder<'_>) -> Result<MapList> {
        if header.map_off == 0 {
            return Err(malformed_error!(MAP_OFF_OFFSET, "File has no map list"));
        }

        let index = heap.resolve(MAP_OFF_OFFSET, header.map_off, TypeCode::MapList)?;
        heap.value(index)
            .and_then(HeapValue::as_map_list)
            .cloned()
            .ok_or_else(|| malformed_error!(MAP_OFF_OFFSET, "Map list was not decoded"))
    }

    fn read_map_table<T: RowReadable>(
        item: Option<MapItem>,
        heap: &mut HeapBuilder<'_>,
    ) -> Result<IndexTable<T>> {
        match item {
            Some(item) => IndexTable::read(
                Section {
                    size: item.size,
                    offset: item.offset,
                },
                item.position + 4,
                heap,
            ),
            None => Ok(IndexTable::default()),
        }
    }

    fn cross_check(header: &Header, map: &MapList) -> Result<()> {
        let sections = [
            (TypeCode::StringIdItem, TableId::Strings, header.string_ids, STRING_IDS_OFFSET),
            (TypeCode::TypeIdItem, TableId::Types, header.type_ids, TYPE_IDS_OFFSET),
            (TypeCode::ProtoIdItem, TableId::Protos, header.proto_ids, PROTO_IDS_OFFSET),
            (TypeCode::FieldIdItem, TableId::Fields, header.field_ids, FIELD_IDS_OFFSET),
            (TypeCode::MethodIdItem, TableId::Methods, header.method_ids, METHOD_IDS_OFFSET),
            (TypeCode::ClassDefItem, TableId::ClassDefs, header.class_defs, CLASS_DEFS_OFFSET),
        ];

        if let Some(item) = map.find(TypeCode::HeaderItem) {
            if item.offset != 0 || item.size != 1 {
                return Err(Error::SectionSizeMismatch {
                    section: "header",
                    message: format!(
                        "map declares {} header(s) at 0x{:08x}",
                        item.size, item.offset
                    ),
                    offset: item.position,
                });
            }
        }

        for (code, table, section, field_pos) in sections {
            let name: &'static str = table.into();
            match map.find(code) {
                Some(item) if item.size != section.size => {
                    return Err(Error::SectionSizeMismatch {
                        section: name,
                        message: format!(
                            "map declares {} entries, header declares {}",
                            item.size, section.size
                        ),
                        offset: item.position,
                    });
                }
                Some(item) if !section.is_empty() && item.offset != section.offset => {
                    return Err(Error::SectionSizeMismatch {
                        section: name,
                        message: format!(
                            "map places the section at 0x{:08x}, header at 0x{:08x}",
                            item.offset, section.offset
                        ),
                        offset: item.position,
                    });
                }
                None if !section.is_empty() => {
                    return Err(Error::SectionSizeMismatch {
                        section: name,
                        message: format!(
                            "{} entries declared by the header are missing from the map",
                            section.size
                        ),
                        offset: field_pos,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn sweep(map: &MapList, heap: &mut HeapBuilder<'_>) -> Result<()> {
        for item in map.iter().filter(|item| item.type_code.is_data_item()) {
            #[allow(clippy::cast_possible_truncation)]
            let alignment = item.type_code.alignment() as u32;
            let field_pos = item.position + 8;
            let mut offset = item.offset;

            for _ in 0..item.size {
                offset = offset.checked_next_multiple_of(alignment).ok_or(
                    Error::OffsetOutOfRange {
                        value: u64::from(offset),
                        limit: heap.data().len(),
                        offset: field_pos,
                    },
                )?;
                let index = heap.resolve(field_pos, offset, item.type_code)?;
                offset = heap.end_of(index).ok_or_else(|| {
                    malformed_error!(field_pos, "Data item at 0x{:08x} has no end", offset)
                })?;
            }

            log::trace!(
                "swept {} x {} from 0x{:08x}",
                item.size,
                item.type_code,
                item.offset
            );
        }

        Ok(())
    }
}
