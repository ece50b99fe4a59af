//! The decoded view of a DEX file.
//!
//! [`DexFile`] owns the input buffer together with everything decoded from it: the header,
//! the map list, the eight index tables and the [`DataHeap`] holding every data item reachable
//! from them. It is immutable after construction and can be shared across threads; derived
//! names are memoized by its [`Resolver`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dexscope::DexFile;
//! use std::path::Path;
//!
//! let dex = DexFile::from_path(Path::new("classes.dex"))?;
//! for class in dex.class_defs() {
//!     println!("{}", dex.class_name(class)?);
//! }
//! # Ok::<(), dexscope::Error>(())
//! ```

use std::{path::Path, sync::Arc};

use crate::{
    dex::{
        config::LoaderConfig,
        diagnostics::Diagnostics,
        header::Header,
        heap::{
            AnnotationsDirectory, ClassData, CodeItem, DataHeap, DebugInfo, EncodedArray,
            EncodedMethod, HeapIndex, HeapItem, HeapValue, HiddenApiClassData, MapList,
            StringData, TypeList,
        },
        loader::{LoadedDex, Loader},
        resolver::Resolver,
        tables::{
            CallSiteId, ClassDef, FieldId, IndexTable, MethodHandle, MethodId, ProtoId, StringId,
            TypeId,
        },
        typecode::TypeCode,
    },
    file::File,
    Result,
};

/// A fully decoded DEX file.
pub struct DexFile {
    file: Arc<File>,
    header: Header,
    map: MapList,
    strings: IndexTable<StringId>,
    types: IndexTable<TypeId>,
    protos: IndexTable<ProtoId>,
    fields: IndexTable<FieldId>,
    methods: IndexTable<MethodId>,
    class_defs: IndexTable<ClassDef>,
    call_sites: IndexTable<CallSiteId>,
    method_handles: IndexTable<MethodHandle>,
    heap: DataHeap,
    diagnostics: Arc<Diagnostics>,
    resolver: Resolver,
    config: LoaderConfig,
}

impl DexFile {
    /// Decodes `data` with the default [`LoaderConfig`].
    ///
    /// # Errors
    /// Returns the first structural error found, carrying the offset it was detected at.
    pub fn decode(data: &[u8]) -> Result<DexFile> {
        Self::decode_with_config(data, LoaderConfig::default())
    }

    /// Decodes a copy of `data` with `config`.
    ///
    /// # Errors
    /// See [`DexFile::decode`].
    pub fn decode_with_config(data: &[u8], config: LoaderConfig) -> Result<DexFile> {
        Self::from_mem_with_config(data.to_vec(), config)
    }

    /// Decodes an owned buffer.
    ///
    /// # Errors
    /// See [`DexFile::decode`].
    pub fn from_mem(data: Vec<u8>) -> Result<DexFile> {
        Self::from_mem_with_config(data, LoaderConfig::default())
    }

    /// Decodes an owned buffer with `config`.
    ///
    /// # Errors
    /// See [`DexFile::decode`].
    pub fn from_mem_with_config(data: Vec<u8>, config: LoaderConfig) -> Result<DexFile> {
        Self::load(File::from_mem(data)?, config)
    }

    /// Maps and decodes the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, otherwise
    /// see [`DexFile::decode`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<DexFile> {
        Self::from_path_with_config(path, LoaderConfig::default())
    }

    /// Maps and decodes the file at `path` with `config`.
    ///
    /// # Errors
    /// See [`DexFile::from_path`].
    pub fn from_path_with_config(path: impl AsRef<Path>, config: LoaderConfig) -> Result<DexFile> {
        Self::load(File::from_path(path)?, config)
    }

    fn load(file: File, config: LoaderConfig) -> Result<DexFile> {
        let file = Arc::new(file);
        let diagnostics = Arc::new(Diagnostics::new());
        let loaded = Loader::new(file.data(), config, &diagnostics).load()?;
        if diagnostics.has_any() {
            log::debug!("{}", diagnostics.summary());
        }

        let LoadedDex {
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
        } = loaded;

        Ok(DexFile {
            file,
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
            diagnostics,
            resolver: Resolver::new(),
            config,
        })
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The decoded map list.
    #[must_use]
    pub fn map(&self) -> &MapList {
        &self.map
    }

    /// `string_ids`
    #[must_use]
    pub fn strings(&self) -> &IndexTable<StringId> {
        &self.strings
    }

    /// `type_ids`
    #[must_use]
    pub fn types(&self) -> &IndexTable<TypeId> {
        &self.types
    }

    /// `proto_ids`
    #[must_use]
    pub fn protos(&self) -> &IndexTable<ProtoId> {
        &self.protos
    }

    /// `field_ids`
    #[must_use]
    pub fn fields(&self) -> &IndexTable<FieldId> {
        &self.fields
    }

    /// `method_ids`
    #[must_use]
    pub fn methods(&self) -> &IndexTable<MethodId> {
        &self.methods
    }

    /// `class_defs`
    #[must_use]
    pub fn class_defs(&self) -> &IndexTable<ClassDef> {
        &self.class_defs
    }

    /// `call_site_ids`, empty if the map list declares none.
    #[must_use]
    pub fn call_sites(&self) -> &IndexTable<CallSiteId> {
        &self.call_sites
    }

    /// `method_handles`, empty if the map list declares none.
    #[must_use]
    pub fn method_handles(&self) -> &IndexTable<MethodHandle> {
        &self.method_handles
    }

    /// Every decoded data item.
    #[must_use]
    pub fn heap(&self) -> &DataHeap {
        &self.heap
    }

    /// The data item at `offset`, which must have been decoded as `expected`.
    ///
    /// # Errors
    /// See [`DataHeap::get`].
    pub fn get(&self, offset: u32, expected: TypeCode) -> Result<&HeapValue> {
        self.heap.get(offset, expected)
    }

    /// Warnings and notes collected while decoding.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// The raw input.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.file.data()
    }

    /// The underlying file.
    #[must_use]
    pub fn file(&self) -> &Arc<File> {
        &self.file
    }

    /// The configuration the file was decoded with.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Caches of derived names.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The hidden API restrictions, if the file carries them.
    #[must_use]
    pub fn hidden_api(&self) -> Option<&HiddenApiClassData> {
        self.heap
            .iter_type(TypeCode::HiddenapiClassDataItem)
            .next()
            .and_then(|entry| entry.value.as_hidden_api_class_data())
    }

    fn optional<T: HeapItem>(&self, index: Option<HeapIndex>) -> Result<Option<&T>> {
        index.map(|index| self.heap.item::<T>(index)).transpose()
    }

    /// String `idx`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the string does not exist.
    pub fn string(&self, idx: u32) -> Result<&str> {
        let row = self.strings.resolve(idx, 0)?;
        Ok(&self.heap.item::<StringData>(row.data)?.value)
    }

    /// Descriptor of type `idx`, e.g. `Ljava/lang/Object;`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the type does not exist.
    pub fn type_descriptor(&self, idx: u32) -> Result<&str> {
        let row = self.types.resolve(idx, 0)?;
        self.string(row.descriptor_idx)
    }

    /// Shorty descriptor of proto `idx`, e.g. `VIL`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the proto does not exist.
    pub fn proto_shorty(&self, idx: u32) -> Result<&str> {
        let row = self.protos.resolve(idx, 0)?;
        self.string(row.shorty_idx)
    }

    /// Descriptor of `class`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the class type does not exist.
    pub fn class_name(&self, class: &ClassDef) -> Result<&str> {
        self.type_descriptor(class.class_idx)
    }

    /// Descriptor of the superclass of `class`, `None` for root classes.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the superclass type does not exist.
    pub fn superclass_name(&self, class: &ClassDef) -> Result<Option<&str>> {
        class
            .superclass_idx
            .map(|idx| self.type_descriptor(idx))
            .transpose()
    }

    /// Interfaces implemented by `class`.
    ///
    /// # Errors
    /// Returns [`crate::Error::HeapTypeMismatch`] if the row belongs to another file.
    pub fn interfaces(&self, class: &ClassDef) -> Result<Option<&TypeList>> {
        self.optional(class.interfaces)
    }

    /// Fields and methods of `class`.
    ///
    /// # Errors
    /// See [`DexFile::interfaces`].
    pub fn class_data(&self, class: &ClassDef) -> Result<Option<&ClassData>> {
        self.optional(class.class_data)
    }

    /// Annotations of `class` and its members.
    ///
    /// # Errors
    /// See [`DexFile::interfaces`].
    pub fn annotations(&self, class: &ClassDef) -> Result<Option<&AnnotationsDirectory>> {
        self.optional(class.annotations)
    }

    /// Initial values of the static fields of `class`.
    ///
    /// # Errors
    /// See [`DexFile::interfaces`].
    pub fn static_values(&self, class: &ClassDef) -> Result<Option<&EncodedArray>> {
        self.optional(class.static_values)
    }

    /// Code of `method`, `None` for abstract and native methods.
    ///
    /// # Errors
    /// See [`DexFile::interfaces`].
    pub fn code(&self, method: &EncodedMethod) -> Result<Option<&CodeItem>> {
        self.optional(method.code)
    }

    /// Debug information of `code`.
    ///
    /// # Errors
    /// See [`DexFile::interfaces`].
    pub fn debug_info(&self, code: &CodeItem) -> Result<Option<&DebugInfo>> {
        self.optional(code.debug_info)
    }

    /// The bootstrap arguments of `call_site`.
    ///
    /// # Errors
    /// See [`DexFile::interfaces`].
    pub fn call_site_values(&self, call_site: &CallSiteId) -> Result<&EncodedArray> {
        self.heap.item(call_site.call_site)
    }

    /// Descriptor of the class declaring method `idx`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the method does not exist.
    pub fn method_class_name(&self, idx: u32) -> Result<Arc<str>> {
        self.resolver.method_class_name(self, idx)
    }

    /// Descriptor of proto `idx`, e.g. `(ILjava/lang/String;)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the proto does not exist.
    pub fn proto_descriptor(&self, idx: u32) -> Result<Arc<str>> {
        self.resolver.proto_descriptor(self, idx)
    }

    /// Reference form of field `idx`, e.g. `Lpkg/Cls;->name:I`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the field does not exist.
    pub fn field_reference(&self, idx: u32) -> Result<Arc<str>> {
        self.resolver.field_reference(self, idx)
    }

    /// Reference form of method `idx`, e.g. `Lpkg/Cls;->name(I)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the method does not exist.
    pub fn method_reference(&self, idx: u32) -> Result<Arc<str>> {
        self.resolver.method_reference(self, idx)
    }
}

impl std::fmt::Debug for DexFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DexFile")
            .field("version", &self.header.version)
            .field("endian", &self.header.endian)
            .field("len", &self.file.len())
            .field("strings", &self.strings.len())
            .field("types", &self.types.len())
            .field("class_defs", &self.class_defs.len())
            .field("heap_items", &self.heap.len())
            .field("diagnostics", &self.diagnostics.count())
            .finish_non_exhaustive()
    }
}
