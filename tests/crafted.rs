/*
package com.example;

@Marker("counter")
public abstract class Counter implements Runnable {
    public static final int LIMIT = 10;
    private int count;
    private String label;

    public Counter() {
        super();
    }

    @Override
    public void run() throws IllegalStateException {
        try {
            int unused = 0;
        } catch (IllegalStateException e) {
        }
    }

    public abstract int size();

    static CallSite bootstrap(MethodHandles.Lookup lookup, String name, MethodType type);
}

The sample additionally carries one call site bootstrapped through `Counter.bootstrap`
(`invoke-static` handle, name "run", type "()V") and a hidden API section restricting the
members of `Counter`. `crafted_be.dex` holds the same content in big-endian byte order.
*/

use std::sync::Arc;

use dexscope::prelude::*;

const SAMPLE: &str = "tests/samples/crafted.dex";
const SAMPLE_BE: &str = "tests/samples/crafted_be.dex";

const METHOD_OBJECT_INIT: u32 = 0;
const METHOD_BOOTSTRAP: u32 = 1;
const METHOD_INIT: u32 = 2;
const METHOD_RUN: u32 = 3;
const METHOD_SIZE: u32 = 4;

const TYPE_ISE: u32 = 7;

#[test]
fn crafted_load() {
    let dex = DexFile::from_path(SAMPLE).unwrap();
    assert_eq!(dex.header().endian, Endian::Little);
    verify_file(&dex);
}

#[test]
fn crafted_big_endian() {
    let dex = DexFile::from_path(SAMPLE_BE).unwrap();
    assert_eq!(dex.header().endian, Endian::Big);
    verify_file(&dex);
}

#[test]
fn crafted_from_mem() {
    let data = std::fs::read(SAMPLE).unwrap();
    let dex = DexFile::from_mem(data.clone()).unwrap();
    verify_file(&dex);

    let borrowed = DexFile::decode(&data).unwrap();
    assert_eq!(borrowed.data(), dex.data());
}

#[test]
fn crafted_configs() {
    for config in [
        LoaderConfig::minimal(),
        LoaderConfig::production(),
        LoaderConfig::strict(),
    ] {
        let dex = DexFile::from_path_with_config(SAMPLE, config).unwrap();
        assert_eq!(dex.config(), &config);
        assert_eq!(dex.class_defs().len(), 1);
        assert!(!dex.diagnostics().has_warnings());
    }
}

#[test]
fn crafted_corrupted_signature() {
    let mut data = std::fs::read(SAMPLE).unwrap();
    data[0x0C] ^= 0xFF;

    let dex = DexFile::from_mem(data.clone()).unwrap();
    let warnings = dex.diagnostics().warnings();
    assert_eq!(warnings.len(), 2);
    assert!(warnings
        .iter()
        .all(|warning| warning.category == DiagnosticCategory::Header));
    assert_eq!(warnings[0].offset, Some(0x08));
    assert_eq!(warnings[1].offset, Some(0x0C));

    let dex = DexFile::from_mem_with_config(data, LoaderConfig::minimal()).unwrap();
    assert!(!dex.diagnostics().has_warnings());
}

#[test]
fn crafted_shared_across_threads() {
    let dex = Arc::new(DexFile::from_path(SAMPLE).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dex = Arc::clone(&dex);
            std::thread::spawn(move || {
                (0..dex.methods().len())
                    .map(|idx| dex.method_reference(idx).unwrap().len())
                    .sum::<usize>()
            })
        })
        .collect();

    let lengths: Vec<usize> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert!(lengths.windows(2).all(|pair| pair[0] == pair[1]));
}

fn verify_file(dex: &DexFile) {
    assert!(!dex.diagnostics().has_warnings());
    assert!(!dex.diagnostics().has_errors());

    verify_header(dex);
    verify_map(dex);
    verify_tables(dex);
    verify_class(dex);
    verify_code(dex);
    verify_annotations(dex);
    verify_call_site(dex);
    verify_hidden_api(dex);
}

fn verify_header(dex: &DexFile) {
    let header = dex.header();
    assert_eq!(header.version, 35);
    assert_eq!(header.file_size as usize, dex.data().len());
    assert_eq!(header.header_size, 0x70);
    assert_eq!(header.compute_checksum(dex.data()), header.checksum);
    assert_eq!(header.compute_signature(dex.data()), header.signature);
    assert_eq!(header.string_ids.size, 23);
    assert_eq!(header.string_ids.offset, 0x70);
    assert_eq!(header.type_ids.size, 12);
    assert_eq!(header.proto_ids.size, 3);
    assert_eq!(header.field_ids.size, 3);
    assert_eq!(header.method_ids.size, 5);
    assert_eq!(header.class_defs.size, 1);
}

fn verify_map(dex: &DexFile) {
    let map = dex.map();
    assert_eq!(map.items.len(), 20);
    assert_eq!(map.items[0].type_code, TypeCode::HeaderItem);
    assert_eq!(map.items[19].type_code, TypeCode::MapList);
    assert_eq!(map.items[19].offset, dex.header().map_off);
    assert!(map.items.windows(2).all(|pair| pair[0].offset < pair[1].offset));

    assert_eq!(dex.heap().len(), 38);
    assert_eq!(dex.heap().iter_type(TypeCode::StringDataItem).count(), 23);
    assert_eq!(dex.heap().iter_type(TypeCode::TypeList).count(), 2);
    assert_eq!(dex.heap().iter_type(TypeCode::CodeItem).count(), 2);
    assert_eq!(dex.heap().iter_type(TypeCode::EncodedArrayItem).count(), 2);
    assert_eq!(dex.heap().iter_type(TypeCode::AnnotationSetRefList).count(), 0);
}

fn verify_tables(dex: &DexFile) {
    assert_eq!(dex.strings().len(), 23);
    assert_eq!(dex.string(0).unwrap(), "Ljava/lang/Object;");
    assert_eq!(dex.string(14).unwrap(), "Counter.java");

    assert_eq!(dex.types().len(), 12);
    assert_eq!(dex.type_descriptor(2).unwrap(), "Lcom/example/Counter;");
    assert_eq!(
        dex.type_descriptor(TYPE_ISE).unwrap(),
        "Ljava/lang/IllegalStateException;"
    );

    assert_eq!(dex.protos().len(), 3);
    assert_eq!(dex.proto_shorty(0).unwrap(), "V");
    assert_eq!(dex.proto_shorty(1).unwrap(), "LLLL");
    assert_eq!(&*dex.proto_descriptor(2).unwrap(), "()I");
    assert_eq!(
        &*dex.proto_descriptor(1).unwrap(),
        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;"
    );

    let fields: Vec<String> = (0..dex.fields().len())
        .map(|idx| dex.field_reference(idx).unwrap().to_string())
        .collect();
    assert_eq!(
        fields,
        [
            "Lcom/example/Counter;->LIMIT:I",
            "Lcom/example/Counter;->count:I",
            "Lcom/example/Counter;->label:Ljava/lang/String;",
        ]
    );

    assert_eq!(
        &*dex.method_reference(METHOD_OBJECT_INIT).unwrap(),
        "Ljava/lang/Object;-><init>()V"
    );
    assert_eq!(
        &*dex.method_class_name(METHOD_BOOTSTRAP).unwrap(),
        "Lcom/example/Counter;"
    );
    assert_eq!(
        &*dex.method_reference(METHOD_SIZE).unwrap(),
        "Lcom/example/Counter;->size()I"
    );
    assert!(dex.method_reference(dex.methods().len()).is_err());
}

fn verify_class(dex: &DexFile) {
    let class = dex.class_defs().get(0).unwrap();
    assert_eq!(dex.class_name(class).unwrap(), "Lcom/example/Counter;");
    assert_eq!(
        dex.superclass_name(class).unwrap(),
        Some("Ljava/lang/Object;")
    );
    assert_eq!(class.access_flags, AccessFlags::PUBLIC | AccessFlags::ABSTRACT);
    assert_eq!(
        dex.string(class.source_file_idx.unwrap()).unwrap(),
        "Counter.java"
    );

    let interfaces = dex.interfaces(class).unwrap().unwrap();
    assert_eq!(interfaces.type_idx, vec![8]);

    let values = dex.static_values(class).unwrap().unwrap();
    assert_eq!(values.values, vec![EncodedValue::Int(10)]);

    let data = dex.class_data(class).unwrap().unwrap();
    assert_eq!(data.member_count(), 6);
    assert_eq!(data.static_fields.len(), 1);
    assert_eq!(data.instance_fields.len(), 2);
    assert_eq!(
        data.static_fields[0].access_flags,
        AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL
    );
    assert_eq!(data.instance_fields[1].field_idx, 2);
    assert_eq!(data.instance_fields[1].access_flags, AccessFlags::PRIVATE);

    let direct: Vec<u32> = data.direct_methods.iter().map(|m| m.method_idx).collect();
    let virtuals: Vec<u32> = data.virtual_methods.iter().map(|m| m.method_idx).collect();
    assert_eq!(direct, vec![METHOD_INIT]);
    assert_eq!(virtuals, vec![METHOD_RUN, METHOD_SIZE]);
    assert!(data.direct_methods[0]
        .access_flags
        .contains(AccessFlags::CONSTRUCTOR));

    let size = &data.virtual_methods[1];
    assert!(size.access_flags.contains(AccessFlags::ABSTRACT));
    assert_eq!(size.code_off, 0);
    assert!(dex.code(size).unwrap().is_none());
}

fn verify_code(dex: &DexFile) {
    let class = dex.class_defs().get(0).unwrap();
    let data = dex.class_data(class).unwrap().unwrap();

    let init = dex.code(&data.direct_methods[0]).unwrap().unwrap();
    assert_eq!(init.registers_size, 1);
    assert_eq!(init.ins_size, 1);
    assert_eq!(init.outs_size, 1);
    assert_eq!(init.insns, vec![0x1070, METHOD_OBJECT_INIT as u16, 0x0000, 0x000e]);
    assert!(init.tries.is_empty());

    let debug = dex.debug_info(init).unwrap().unwrap();
    assert_eq!(debug.line_start, 3);
    assert!(debug.parameter_names.is_empty());
    let lines: Vec<(u32, u32)> = debug
        .positions()
        .iter()
        .map(|entry| (entry.address, entry.line))
        .collect();
    assert_eq!(lines, vec![(0, 3), (3, 5)]);

    let run = dex.code(&data.virtual_methods[0]).unwrap().unwrap();
    assert_eq!(run.insns.len(), 3);
    assert_eq!(run.tries_size, 1);
    assert!(dex.debug_info(run).unwrap().is_none());

    let try_item = run.try_at(1).unwrap();
    assert_eq!(try_item.start_addr, 0);
    assert_eq!(try_item.insn_count, 2);
    assert!(run.try_at(2).is_none());

    let handler = run.handler(try_item).unwrap();
    assert_eq!(handler.handlers.len(), 1);
    assert_eq!(handler.handlers[0].type_idx, TYPE_ISE);
    assert_eq!(handler.handlers[0].addr, 2);
    assert_eq!(handler.catch_all_addr, None);
}

fn verify_annotations(dex: &DexFile) {
    let class = dex.class_defs().get(0).unwrap();
    let directory = dex.annotations(class).unwrap().unwrap();
    assert!(directory.fields.is_empty());
    assert!(directory.parameters.is_empty());
    assert_eq!(directory.methods.len(), 1);
    assert!(directory.method(METHOD_INIT).is_none());

    let set = dex
        .heap()
        .item::<AnnotationSet>(directory.class_annotations.unwrap())
        .unwrap();
    assert_eq!(set.entries.len(), 1);
    let marker = dex.heap().item::<AnnotationItem>(set.entries[0]).unwrap();
    assert_eq!(marker.visibility, Visibility::Runtime);
    assert_eq!(
        dex.type_descriptor(marker.annotation.type_idx).unwrap(),
        "Lcom/example/Marker;"
    );
    let element = &marker.annotation.elements[0];
    assert_eq!(dex.string(element.name_idx).unwrap(), "value");
    let EncodedValue::String(value) = element.value else {
        panic!("unexpected element {:?}", element.value);
    };
    assert_eq!(dex.string(value).unwrap(), "counter");

    let set = dex
        .heap()
        .item::<AnnotationSet>(directory.method(METHOD_RUN).unwrap())
        .unwrap();
    let throws = dex.heap().item::<AnnotationItem>(set.entries[0]).unwrap();
    assert_eq!(throws.visibility, Visibility::System);
    assert_eq!(
        dex.type_descriptor(throws.annotation.type_idx).unwrap(),
        "Ldalvik/annotation/Throws;"
    );
    assert_eq!(
        throws.annotation.elements[0].value,
        EncodedValue::Array(EncodedArray {
            values: vec![EncodedValue::Type(TYPE_ISE)],
        })
    );
}

fn verify_call_site(dex: &DexFile) {
    assert_eq!(dex.method_handles().len(), 1);
    let handle = dex.method_handles().get(0).unwrap();
    assert_eq!(handle.kind, MethodHandleKind::InvokeStatic);
    assert_eq!(u32::from(handle.field_or_method_idx), METHOD_BOOTSTRAP);

    assert_eq!(dex.call_sites().len(), 1);
    let call_site = dex.call_sites().get(0).unwrap();
    let values = dex.call_site_values(call_site).unwrap();
    assert_eq!(
        values.values,
        vec![
            EncodedValue::MethodHandle(0),
            EncodedValue::String(10),
            EncodedValue::MethodType(0),
        ]
    );
    assert_eq!(dex.string(10).unwrap(), "run");
}

fn verify_hidden_api(dex: &DexFile) {
    let hidden = dex.hidden_api().unwrap();
    let flags = hidden.class(0).unwrap();
    assert_eq!(flags.len(), 6);

    let restrictions: Vec<_> = flags.iter().map(|flag| flag.restriction()).collect();
    assert_eq!(
        restrictions,
        vec![
            Some(ApiRestriction::Sdk),
            Some(ApiRestriction::Unsupported),
            Some(ApiRestriction::Blocked),
            Some(ApiRestriction::MaxTargetO),
            Some(ApiRestriction::MaxTargetO),
            Some(ApiRestriction::Blocked),
        ]
    );
    assert!(flags[3].is_core_platform_api());
    assert!(flags[5].is_test_api());
    assert!(!flags[0].is_core_platform_api());
    assert!(hidden.class(1).is_none());
}
