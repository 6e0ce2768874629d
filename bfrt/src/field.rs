/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Key and data field descriptors.

use crate::json::Node;
use crate::table::TableKind;
use crate::types::DataType;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{self, Display};

/// Name of the pseudo key field carrying the entry priority.
pub const MATCH_PRIORITY_FIELD: &str = "$MATCH_PRIORITY";

/// Offset recorded for key fields that are not packed into the key buffer.
pub const UNPACKED_OFFSET: usize = 0xffff_ffff;

/// Match kind of a key field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyFieldType {
    Exact,
    Ternary,
    Range,
    Lpm,
    Optional,
    Invalid,
}

impl KeyFieldType {
    /// Maps a schema `match_type` string.  ATCAM keys match exactly.
    pub fn from_match_type(s: &str) -> Self {
        match s {
            "Exact" | "ATCAM" => KeyFieldType::Exact,
            "Ternary" => KeyFieldType::Ternary,
            "Range" => KeyFieldType::Range,
            "LPM" => KeyFieldType::Lpm,
            "Optional" => KeyFieldType::Optional,
            _ => KeyFieldType::Invalid,
        }
    }
}

impl Display for KeyFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyFieldType::Exact => "exact",
            KeyFieldType::Ternary => "ternary",
            KeyFieldType::Range => "range",
            KeyFieldType::Lpm => "lpm",
            KeyFieldType::Optional => "optional",
            KeyFieldType::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

/// Role a data field plays when an entry is handed to the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataFieldType {
    Invalid,
    /// Packed into the action data buffer.
    ActionParam,
    /// Declared by the program but removed by the compiler.
    ActionParamOptimizedOut,
    CounterIndex,
    MeterIndex,
    RegisterIndex,
    CounterSpecBytes,
    CounterSpecPackets,
    MeterSpecCirPps,
    MeterSpecPirPps,
    MeterSpecCbsPkts,
    MeterSpecPbsPkts,
    MeterSpecCirKbps,
    MeterSpecPirKbps,
    MeterSpecCbsKbits,
    MeterSpecPbsKbits,
    ActionMemberId,
    SelectorGroupId,
    SelectorMembers,
    ActionMemberStatus,
    MaxGroupSize,
    Ttl,
    EntryHitState,
    RegisterSpecHi,
    RegisterSpecLo,
    RegisterSpec,
    DevPort,
}

impl DataFieldType {
    /// Classifies a reserved field from its name with the leading `$`
    /// removed.  `ACTION_MEMBER_ID` means different things on indirect match
    /// tables and on selectors.
    pub fn from_reserved_name(name: &str, kind: TableKind) -> Self {
        use DataFieldType::*;
        match name {
            "COUNTER_SPEC_BYTES" => CounterSpecBytes,
            "COUNTER_SPEC_PKTS" => CounterSpecPackets,
            "REGISTER_INDEX" => RegisterIndex,
            "METER_SPEC_CIR_PPS" => MeterSpecCirPps,
            "METER_SPEC_PIR_PPS" => MeterSpecPirPps,
            "METER_SPEC_CBS_PKTS" => MeterSpecCbsPkts,
            "METER_SPEC_PBS_PKTS" => MeterSpecPbsPkts,
            "METER_SPEC_CIR_KBPS" => MeterSpecCirKbps,
            "METER_SPEC_PIR_KBPS" => MeterSpecPirKbps,
            "METER_SPEC_CBS_KBITS" => MeterSpecCbsKbits,
            "METER_SPEC_PBS_KBITS" => MeterSpecPbsKbits,
            "ACTION_MEMBER_ID"
                if matches!(kind, TableKind::MatchIndirect | TableKind::MatchIndirectSelector) =>
            {
                ActionMemberId
            }
            "ACTION_MEMBER_ID" if kind == TableKind::Selector => SelectorMembers,
            "SELECTOR_GROUP_ID" => SelectorGroupId,
            "ACTION_MEMBER_STATUS" => ActionMemberStatus,
            "MAX_GROUP_SIZE" => MaxGroupSize,
            "ENTRY_TTL" => Ttl,
            "ENTRY_HIT_STATE" => EntryHitState,
            // Phase0 data is an action parameter for the driver.
            "DEFAULT_FIELD" => ActionParam,
            "DEV_PORT" => DevPort,
            _ => Invalid,
        }
    }

    /// Index type implied by an action parameter that addresses a resource
    /// table of the given kind.
    pub fn from_resource_kind(kind: TableKind) -> Self {
        match kind {
            TableKind::Counter => DataFieldType::CounterIndex,
            TableKind::Meter => DataFieldType::MeterIndex,
            TableKind::Register => DataFieldType::RegisterIndex,
            _ => DataFieldType::Invalid,
        }
    }

    pub fn is_counter_spec(&self) -> bool {
        matches!(self, DataFieldType::CounterSpecBytes | DataFieldType::CounterSpecPackets)
    }

    pub fn is_meter_spec(&self) -> bool {
        use DataFieldType::*;
        matches!(
            self,
            MeterSpecCirPps
                | MeterSpecPirPps
                | MeterSpecCbsPkts
                | MeterSpecPbsPkts
                | MeterSpecCirKbps
                | MeterSpecPirKbps
                | MeterSpecCbsKbits
                | MeterSpecPbsKbits
        )
    }

    pub fn is_register_spec(&self) -> bool {
        matches!(
            self,
            DataFieldType::RegisterSpec | DataFieldType::RegisterSpecHi | DataFieldType::RegisterSpecLo
        )
    }
}

impl Display for DataFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A `name`/`value` annotation attached to a table, action or field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

impl Annotation {
    pub fn new(name: &str, value: &str) -> Self {
        Annotation {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}({})", self.name, self.value)
    }
}

pub(crate) fn parse_annotations(node: Node) -> BTreeSet<Annotation> {
    node.children()
        .map(|a| Annotation::new(a.get("name").as_str(), a.get("value").as_str()))
        .collect()
}

/// A key field with its position in the packed key buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFieldInfo {
    pub id: u32,
    pub name: String,
    pub match_kind: KeyFieldType,
    pub data_type: DataType,
    /// Width in bits.
    pub width: usize,
    pub choices: Vec<String>,
    /// Byte offset of the parent field within the key buffer.
    pub offset: usize,
    /// Position of the field's least significant bit within its parent.
    pub start_bit: usize,
    pub is_field_slice: bool,
    pub parent_field_full_byte_size: usize,
    /// The ATCAM partition index, carried outside the key buffer.
    pub is_partition: bool,
}

impl KeyFieldInfo {
    /// Number of bytes needed to hold the field's own width.
    pub fn byte_size(&self) -> usize {
        (self.width + 7) / 8
    }

    /// The `$MATCH_PRIORITY` pseudo field, carried outside the key buffer.
    pub fn is_priority(&self) -> bool {
        self.name == MATCH_PRIORITY_FIELD
    }
}

/// Shape of a data field's value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldShape {
    Scalar,
    Array,
    /// A composite whose members are themselves data fields.
    Container(Vec<DataFieldInfo>),
}

/// A data field of a table or of one of its actions.
#[derive(Clone, Debug, PartialEq)]
pub struct DataFieldInfo {
    pub id: u32,
    pub name: String,
    /// Owning action, or 0 for common data.
    pub action_id: u32,
    pub data_type: DataType,
    /// Width in bits.
    pub width: usize,
    pub choices: Vec<String>,
    pub default_value: u64,
    pub default_fl_value: f32,
    pub default_str_value: String,
    /// Byte offset within the action data buffer.
    pub offset: usize,
    /// Array-valued.  A repeated container holds a list of member sets.
    pub repeated: bool,
    pub mandatory: bool,
    pub read_only: bool,
    pub types: BTreeSet<DataFieldType>,
    pub annotations: BTreeSet<Annotation>,
    /// Ids of the mutually exclusive alternatives to this field.
    pub oneof_siblings: BTreeSet<u32>,
    pub shape: FieldShape,
}

impl DataFieldInfo {
    pub fn byte_size(&self) -> usize {
        (self.width + 7) / 8
    }

    pub fn is_container(&self) -> bool {
        matches!(self.shape, FieldShape::Container(_))
    }

    pub fn has_type(&self, t: DataFieldType) -> bool {
        self.types.contains(&t)
    }

    /// Members of a container field.  Empty for anything else.
    pub fn container(&self) -> &[DataFieldInfo] {
        match &self.shape {
            FieldShape::Container(fields) => fields,
            _ => &[],
        }
    }
}

impl Display for KeyFieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key {} {}: {}<{}> {}-match",
            self.id, self.name, self.data_type, self.width, self.match_kind
        )?;
        if self.offset == UNPACKED_OFFSET {
            write!(f, " unpacked")?;
        } else {
            write!(f, " @{}", self.offset)?;
        }
        if self.is_field_slice {
            write!(
                f,
                " slice[{}+:{}] of {} bytes",
                self.start_bit, self.width, self.parent_field_full_byte_size
            )?;
        }
        if self.is_partition {
            write!(f, " partition")?;
        }
        Ok(())
    }
}

impl Display for DataFieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {} {}: {}<{}>", self.id, self.name, self.data_type, self.width)?;
        if !self.types.is_empty() {
            write!(f, " ({})", self.types.iter().join(", "))?;
        }
        if !self.is_container() && self.width > 0 {
            write!(f, " @{}", self.offset)?;
        }
        if self.mandatory {
            write!(f, " mandatory")?;
        }
        if self.read_only {
            write!(f, " read-only")?;
        }
        if !self.oneof_siblings.is_empty() {
            write!(f, " oneof-with {}", self.oneof_siblings.iter().join(","))?;
        }
        if !self.annotations.is_empty() {
            write!(f, " {}", self.annotations.iter().join(" "))?;
        }
        for member in self.container() {
            write!(f, "\n\t\t{}", member)?;
        }
        Ok(())
    }
}
