//! The `debug_info_item`: a byte-coded state machine producing line and local variable
//! information for one method.

use crate::{
    dex::{
        heap::{checked_count, HeapBuilder, HeapValue},
        tables::{TableId, TableSizes},
    },
    file::parser::Parser,
    Result,
};

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;
const DBG_FIRST_SPECIAL: u8 = 0x0a;
const DBG_LINE_BASE: i32 = -4;
const DBG_LINE_RANGE: u8 = 15;

/// One state machine instruction. `END_SEQUENCE` terminates the stream and is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOp {
    /// Advances the address register
    AdvancePc {
        /// Code units to advance by
        addr_diff: u32,
    },
    /// Advances the line register
    AdvanceLine {
        /// Lines to advance by
        line_diff: i32,
    },
    /// Introduces a local variable at the current address
    StartLocal {
        /// Register holding the local
        register_num: u32,
        /// Index into the string table of the name
        name_idx: Option<u32>,
        /// Index into the type table of the type
        type_idx: Option<u32>,
    },
    /// Introduces a local variable with a generic signature
    StartLocalExtended {
        /// Register holding the local
        register_num: u32,
        /// Index into the string table of the name
        name_idx: Option<u32>,
        /// Index into the type table of the type
        type_idx: Option<u32>,
        /// Index into the string table of the signature
        sig_idx: Option<u32>,
    },
    /// Marks a local variable as out of scope
    EndLocal {
        /// Register holding the local
        register_num: u32,
    },
    /// Reintroduces a local variable ended earlier
    RestartLocal {
        /// Register holding the local
        register_num: u32,
    },
    /// Marks the end of the method prologue
    SetPrologueEnd,
    /// Marks the start of the method epilogue
    SetEpilogueBegin,
    /// Changes the source file of following entries
    SetFile {
        /// Index into the string table of the file name
        name_idx: Option<u32>,
    },
    /// Advances both registers and emits a position entry
    Special {
        /// The opcode, `0x0a..=0xff`
        opcode: u8,
    },
}

/// One row of the position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionEntry {
    /// Code unit address
    pub address: u32,
    /// Source line
    pub line: u32,
}

/// A `debug_info_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    /// Initial value of the line register
    pub line_start: u32,
    /// Index into the string table of each parameter name
    pub parameter_names: Vec<Option<u32>>,
    /// The state machine instructions, without the final `END_SEQUENCE`
    pub ops: Vec<DebugOp>,
}

impl DebugInfo {
    /// Replays the state machine and returns the emitted position table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::dex::heap::{DebugInfo, DebugOp, PositionEntry};
    ///
    /// let info = DebugInfo {
    ///     line_start: 10,
    ///     parameter_names: Vec::new(),
    ///     ops: vec![
    ///         DebugOp::Special { opcode: 0x0e },
    ///         DebugOp::AdvancePc { addr_diff: 3 },
    ///         DebugOp::Special { opcode: 0x1e },
    ///     ],
    /// };
    ///
    /// assert_eq!(
    ///     info.positions(),
    ///     vec![
    ///         PositionEntry { address: 0, line: 10 },
    ///         PositionEntry { address: 4, line: 11 },
    ///     ]
    /// );
    /// ```
    #[must_use]
    pub fn positions(&self) -> Vec<PositionEntry> {
        let mut address = 0u32;
        let mut line = self.line_start;
        let mut positions = Vec::new();

        for op in &self.ops {
            match *op {
                DebugOp::AdvancePc { addr_diff } => address = address.wrapping_add(addr_diff),
                DebugOp::AdvanceLine { line_diff } => line = line.wrapping_add_signed(line_diff),
                DebugOp::Special { opcode } => {
                    let adjusted = opcode.saturating_sub(DBG_FIRST_SPECIAL);
                    line = line
                        .wrapping_add_signed(DBG_LINE_BASE + i32::from(adjusted % DBG_LINE_RANGE));
                    address = address.wrapping_add(u32::from(adjusted / DBG_LINE_RANGE));
                    positions.push(PositionEntry { address, line });
                }
                _ => {}
            }
        }

        positions
    }
}

fn optional_index(parser: &mut Parser<'_>, sizes: TableSizes, table: TableId) -> Result<Option<u32>> {
    let position = parser.pos();
    match parser.read_uleb128p1()? {
        Some(index) => Ok(Some(sizes.check(table, index, position)?)),
        None => Ok(None),
    }
}

pub(crate) fn decode(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let sizes = heap.sizes();
    let line_start = parser.read_uleb128()?;
    let parameters_size = parser.read_uleb128()?;

    let count = checked_count(parser, parameters_size, 1)?;
    let mut parameter_names = Vec::with_capacity(count);
    for _ in 0..count {
        parameter_names.push(optional_index(parser, sizes, TableId::Strings)?);
    }

    let mut ops = Vec::new();
    loop {
        let op = match parser.read::<u8>()? {
            DBG_END_SEQUENCE => break,
            DBG_ADVANCE_PC => DebugOp::AdvancePc {
                addr_diff: parser.read_uleb128()?,
            },
            DBG_ADVANCE_LINE => DebugOp::AdvanceLine {
                line_diff: parser.read_sleb128()?,
            },
            DBG_START_LOCAL => DebugOp::StartLocal {
                register_num: parser.read_uleb128()?,
                name_idx: optional_index(parser, sizes, TableId::Strings)?,
                type_idx: optional_index(parser, sizes, TableId::Types)?,
            },
            DBG_START_LOCAL_EXTENDED => DebugOp::StartLocalExtended {
                register_num: parser.read_uleb128()?,
                name_idx: optional_index(parser, sizes, TableId::Strings)?,
                type_idx: optional_index(parser, sizes, TableId::Types)?,
                sig_idx: optional_index(parser, sizes, TableId::Strings)?,
            },
            DBG_END_LOCAL => DebugOp::EndLocal {
                register_num: parser.read_uleb128()?,
            },
            DBG_RESTART_LOCAL => DebugOp::RestartLocal {
                register_num: parser.read_uleb128()?,
            },
            DBG_SET_PROLOGUE_END => DebugOp::SetPrologueEnd,
            DBG_SET_EPILOGUE_BEGIN => DebugOp::SetEpilogueBegin,
            DBG_SET_FILE => DebugOp::SetFile {
                name_idx: optional_index(parser, sizes, TableId::Strings)?,
            },
            opcode => DebugOp::Special { opcode },
        };
        ops.push(op);
    }

    Ok(HeapValue::DebugInfo(DebugInfo {
        line_start,
        parameter_names,
        ops,
    }))
}
