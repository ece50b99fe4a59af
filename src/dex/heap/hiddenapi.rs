//! The `hiddenapi_class_data_item`: access restrictions of every field and method.
//!
//! The item holds one offset per class definition, relative to the start of the item; a
//! non-zero offset starts a stream of uleb128 flags, one per member of the class in the
//! order its class data declares them (static fields, instance fields, direct methods,
//! virtual methods). The number of members therefore has to be known before the item can be
//! decoded, see [`crate::dex::heap::HeapBuilder::set_member_counts`].

use strum::{Display, EnumIter};

use crate::{
    dex::heap::{checked_count, HeapBuilder, HeapValue},
    file::parser::Parser,
    Result,
};

/// Restriction level of a hidden API flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ApiRestriction {
    /// Part of the public SDK
    Sdk,
    /// Unsupported but accessible
    Unsupported,
    /// Not accessible
    Blocked,
    /// Accessible up to target SDK O
    MaxTargetO,
    /// Accessible up to target SDK P
    MaxTargetP,
    /// Accessible up to target SDK Q
    MaxTargetQ,
    /// Accessible up to target SDK R
    MaxTargetR,
    /// Accessible up to target SDK S
    MaxTargetS,
}

/// Raw hidden API flags of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HiddenApiFlags(pub u32);

impl HiddenApiFlags {
    const RESTRICTION_MASK: u32 = 0x7;
    const CORE_PLATFORM_API: u32 = 0x8;
    const TEST_API: u32 = 0x10;

    /// The restriction level; `None` for values outside the known range.
    #[must_use]
    pub fn restriction(self) -> Option<ApiRestriction> {
        match self.0 & Self::RESTRICTION_MASK {
            0 => Some(ApiRestriction::Sdk),
            1 => Some(ApiRestriction::Unsupported),
            2 => Some(ApiRestriction::Blocked),
            3 => Some(ApiRestriction::MaxTargetO),
            4 => Some(ApiRestriction::MaxTargetP),
            5 => Some(ApiRestriction::MaxTargetQ),
            6 => Some(ApiRestriction::MaxTargetR),
            7 => Some(ApiRestriction::MaxTargetS),
            _ => None,
        }
    }

    /// `true` if the member belongs to the core platform API domain.
    #[must_use]
    pub fn is_core_platform_api(self) -> bool {
        self.0 & Self::CORE_PLATFORM_API != 0
    }

    /// `true` if the member belongs to the test API domain.
    #[must_use]
    pub fn is_test_api(self) -> bool {
        self.0 & Self::TEST_API != 0
    }
}

/// A `hiddenapi_class_data_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenApiClassData {
    /// Size of the item in bytes
    pub size: u32,
    /// Flags of the members of each class definition, `None` for classes without data
    pub class_flags: Vec<Option<Vec<HiddenApiFlags>>>,
}

impl HiddenApiClassData {
    /// Flags of the members of class definition `class_def`.
    #[must_use]
    pub fn class(&self, class_def: u32) -> Option<&[HiddenApiFlags]> {
        self.class_flags
            .get(class_def as usize)
            .and_then(|flags| flags.as_deref())
    }
}

pub(crate) fn decode(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let start = parser.pos();
    let Some(member_counts) = heap.member_counts() else {
        return Err(malformed_error!(
            start,
            "Hidden API data decoded before the class definitions"
        ));
    };

    let size = parser.read::<u32>()?;
    #[allow(clippy::cast_possible_truncation)]
    let classes = member_counts.len() as u32;
    let header_len = checked_count(parser, classes, 4)? * 4 + 4;
    if (size as usize) < header_len || size as usize - 4 > parser.remaining() {
        return Err(malformed_error!(
            start,
            "Hidden API data size {} does not fit {} classes",
            size,
            classes
        ));
    }

    let end = start + size as usize;
    let mut class_flags = Vec::with_capacity(member_counts.len());
    for &members in member_counts {
        let field_pos = parser.pos();
        let offset = parser.read::<u32>()?;
        if offset == 0 {
            class_flags.push(None);
            continue;
        }

        if (offset as usize) < header_len || offset >= size {
            return Err(malformed_error!(
                field_pos,
                "Hidden API flags offset 0x{:x} outside the item",
                offset
            ));
        }

        let mut stream = Parser::at(&parser.data()[..end], start + offset as usize, parser.endian())?;
        let count = checked_count(&stream, members, 1)?;
        let mut flags = Vec::with_capacity(count);
        for _ in 0..count {
            flags.push(HiddenApiFlags(stream.read_uleb128()?));
        }
        class_flags.push(Some(flags));
    }

    // the offset table ends at or before `end`, which may be the end of the buffer
    parser.advance_by(end - parser.pos())?;
    Ok(HeapValue::HiddenApiClassData(HiddenApiClassData {
        size,
        class_flags,
    }))
}
