//! The `code_item`: register counts, instructions and exception handlers of a method.

use crate::{
    dex::{
        heap::{checked_count, HeapBuilder, HeapIndex, HeapValue},
        tables::TableId,
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// A `try_item`: one range of instructions covered by a catch handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryItem {
    /// First covered code unit
    pub start_addr: u32,
    /// Number of covered code units
    pub insn_count: u16,
    /// Byte offset of the handler within the handler list, as stored
    pub handler_off: u16,
    /// Position of the handler in [`CodeItem::handlers`]
    pub handler: usize,
}

/// A typed catch clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeAddrPair {
    /// Index into the type table of the caught exception
    pub type_idx: u32,
    /// Code unit address of the handler
    pub addr: u32,
}

/// An `encoded_catch_handler`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchHandler {
    /// Byte offset of the handler within the handler list
    pub offset: u32,
    /// Typed catch clauses, in order
    pub handlers: Vec<TypeAddrPair>,
    /// Address of the catch-all handler, if present
    pub catch_all_addr: Option<u32>,
}

/// A `code_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeItem {
    /// Number of registers used
    pub registers_size: u16,
    /// Number of words of incoming arguments
    pub ins_size: u16,
    /// Number of words of outgoing argument space
    pub outs_size: u16,
    /// Number of try items
    pub tries_size: u16,
    /// Offset of the debug info, `0` if absent
    pub debug_info_off: u32,
    /// The [`crate::dex::heap::DebugInfo`]
    pub debug_info: Option<HeapIndex>,
    /// Instruction stream in 16-bit code units
    pub insns: Vec<u16>,
    /// Try ranges
    pub tries: Vec<TryItem>,
    /// Catch handlers, in list order
    pub handlers: Vec<CatchHandler>,
}

impl CodeItem {
    /// The catch handler of `try_item`.
    #[must_use]
    pub fn handler(&self, try_item: &TryItem) -> Option<&CatchHandler> {
        self.handlers.get(try_item.handler)
    }

    /// The try item covering code unit `address`, if any.
    #[must_use]
    pub fn try_at(&self, address: u32) -> Option<&TryItem> {
        self.tries.iter().find(|item| {
            address >= item.start_addr
                && u64::from(address) < u64::from(item.start_addr) + u64::from(item.insn_count)
        })
    }
}

fn read_handler(parser: &mut Parser<'_>, heap: &HeapBuilder<'_>, offset: u32) -> Result<CatchHandler> {
    let size = parser.read_sleb128()?;
    let count = checked_count(parser, size.unsigned_abs(), 2)?;

    let mut handlers = Vec::with_capacity(count);
    for _ in 0..count {
        let type_pos = parser.pos();
        let type_idx = heap
            .sizes()
            .check(TableId::Types, parser.read_uleb128()?, type_pos)?;
        handlers.push(TypeAddrPair {
            type_idx,
            addr: parser.read_uleb128()?,
        });
    }

    let catch_all_addr = if size <= 0 {
        Some(parser.read_uleb128()?)
    } else {
        None
    };

    Ok(CatchHandler {
        offset,
        handlers,
        catch_all_addr,
    })
}

pub(crate) fn decode(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let registers_size = parser.read::<u16>()?;
    let ins_size = parser.read::<u16>()?;
    let outs_size = parser.read::<u16>()?;
    let tries_size = parser.read::<u16>()?;
    let debug_pos = parser.pos();
    let debug_info_off = parser.read::<u32>()?;
    let insns_size = parser.read::<u32>()?;

    let debug_info = heap.resolve_optional(debug_pos, debug_info_off, TypeCode::DebugInfoItem)?;

    let count = checked_count(parser, insns_size, 2)?;
    let mut insns = Vec::with_capacity(count);
    for _ in 0..count {
        insns.push(parser.read::<u16>()?);
    }

    if tries_size == 0 {
        return Ok(HeapValue::Code(CodeItem {
            registers_size,
            ins_size,
            outs_size,
            tries_size,
            debug_info_off,
            debug_info,
            insns,
            tries: Vec::new(),
            handlers: Vec::new(),
        }));
    }

    if insns_size % 2 == 1 {
        parser.advance_by(2)?;
    }

    let count = checked_count(parser, u32::from(tries_size), 8)?;
    let mut tries = Vec::with_capacity(count);
    let mut handler_fields = Vec::with_capacity(count);
    for _ in 0..count {
        let start_addr = parser.read::<u32>()?;
        let insn_count = parser.read::<u16>()?;
        handler_fields.push(parser.pos());
        let handler_off = parser.read::<u16>()?;
        tries.push(TryItem {
            start_addr,
            insn_count,
            handler_off,
            handler: 0,
        });
    }

    let list_start = parser.pos();
    let size = parser.read_uleb128()?;
    let count = checked_count(parser, size, 1)?;
    let mut handlers = Vec::with_capacity(count);
    for _ in 0..count {
        #[allow(clippy::cast_possible_truncation)]
        let offset = (parser.pos() - list_start) as u32;
        handlers.push(read_handler(parser, heap, offset)?);
    }

    for (item, field_pos) in tries.iter_mut().zip(handler_fields) {
        item.handler = handlers
            .iter()
            .position(|handler| handler.offset == u32::from(item.handler_off))
            .ok_or_else(|| {
                malformed_error!(
                    field_pos,
                    "Try item handler offset 0x{:04x} does not start a catch handler",
                    item.handler_off
                )
            })?;
    }

    Ok(HeapValue::Code(CodeItem {
        registers_size,
        ins_size,
        outs_size,
        tries_size,
        debug_info_off,
        debug_info,
        insns,
        tries,
        handlers,
    }))
}
