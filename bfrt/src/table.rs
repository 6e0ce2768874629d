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

//! The merged description of one table.

use crate::error::{Error, Result};
use crate::field::{Annotation, DataFieldInfo, DataFieldType, KeyFieldInfo};
use itertools::Itertools;
use multimap::MultiMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

/// Table kind, from the schema document's `table_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    MatchDirect,
    MatchIndirect,
    MatchIndirectSelector,
    ActionProfile,
    Selector,
    SelectorGetMember,
    Counter,
    Meter,
    Register,
    /// Phase0 table.
    PortMetadata,
    PortCfg,
    PortStat,
    PortHdlInfo,
    PortFrontPanelIdxInfo,
    PortStrInfo,
    MirrorCfg,
    DevCfg,
    RegParam,
    DbgCnt,
    LogDbgCnt,
    SnapshotCfg,
    SnapshotLiveness,
    SnapshotData,
    SnapshotTrigger,
    SnapshotPhv,
    DynHashCfg,
    DynHashAlgorithm,
    DynHashCompute,
    Invalid,
}

const TABLE_TYPES: &[(&str, TableKind)] = &[
    ("MatchAction_Direct", TableKind::MatchDirect),
    ("MatchAction_Indirect", TableKind::MatchIndirect),
    ("MatchAction_Indirect_Selector", TableKind::MatchIndirectSelector),
    ("Action", TableKind::ActionProfile),
    ("Selector", TableKind::Selector),
    ("SelectorGetMember", TableKind::SelectorGetMember),
    ("Meter", TableKind::Meter),
    ("Counter", TableKind::Counter),
    ("Register", TableKind::Register),
    ("PortMetadata", TableKind::PortMetadata),
    ("PortConfigure", TableKind::PortCfg),
    ("PortStat", TableKind::PortStat),
    ("PortHdlInfo", TableKind::PortHdlInfo),
    ("PortFpIdxInfo", TableKind::PortFrontPanelIdxInfo),
    ("PortStrInfo", TableKind::PortStrInfo),
    ("MirrorCfg", TableKind::MirrorCfg),
    ("DevConfigure", TableKind::DevCfg),
    ("RegisterParam", TableKind::RegParam),
    ("TblDbgCnt", TableKind::DbgCnt),
    ("LogDbgCnt", TableKind::LogDbgCnt),
    ("SnapshotCfg", TableKind::SnapshotCfg),
    ("SnapshotLiveness", TableKind::SnapshotLiveness),
    ("SnapshotData", TableKind::SnapshotData),
    ("SnapshotTrigger", TableKind::SnapshotTrigger),
    ("SnapshotPhv", TableKind::SnapshotPhv),
    ("DynHashConfigure", TableKind::DynHashCfg),
    ("DynHashAlgorithm", TableKind::DynHashAlgorithm),
    ("DynHashCompute", TableKind::DynHashCompute),
];

impl TableKind {
    pub fn from_table_type(s: &str) -> Self {
        TABLE_TYPES
            .iter()
            .find(|(name, _)| *name == s)
            .map_or(TableKind::Invalid, |(_, kind)| *kind)
    }

    /// Match-action tables of every flavor.
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            TableKind::MatchDirect | TableKind::MatchIndirect | TableKind::MatchIndirectSelector
        )
    }

    /// Tables whose key layout comes from the placement document.
    pub fn has_placement_key(&self) -> bool {
        self.is_match() || *self == TableKind::PortMetadata
    }

    /// Tables that are legitimately absent from placement documents.
    pub fn is_fixed(&self) -> bool {
        use TableKind::*;
        matches!(
            self,
            PortCfg
                | PortStat
                | PortHdlInfo
                | PortFrontPanelIdxInfo
                | PortStrInfo
                | MirrorCfg
                | DevCfg
                | RegParam
                | SelectorGetMember
                | DbgCnt
                | LogDbgCnt
        )
    }

    pub fn is_snapshot(&self) -> bool {
        use TableKind::*;
        matches!(
            self,
            SnapshotCfg | SnapshotLiveness | SnapshotData | SnapshotTrigger | SnapshotPhv
        )
    }

    /// APIs this layer implements for tables of this kind.
    pub fn implemented_apis(&self) -> BTreeSet<TableApi> {
        use TableApi::*;
        use TableKind::*;
        let apis: &[TableApi] = match self {
            MatchDirect | MatchIndirect | MatchIndirectSelector => &[
                Add,
                Modify,
                Delete,
                Clear,
                DefaultEntrySet,
                DefaultEntryReset,
                DefaultEntryGet,
                Get,
                GetFirst,
                GetNextN,
                UsageGet,
                GetByHandle,
                KeyGet,
                HandleGet,
            ],
            ActionProfile | Selector | PortMetadata => &[
                Add,
                Modify,
                Delete,
                Clear,
                Get,
                GetFirst,
                GetNextN,
                UsageGet,
                GetByHandle,
                KeyGet,
                HandleGet,
            ],
            Counter | Meter | Register => &[
                Add,
                Modify,
                Get,
                GetFirst,
                GetNextN,
                Clear,
                GetByHandle,
                HandleGet,
                KeyGet,
            ],
            DbgCnt | LogDbgCnt => &[Modify, Get, GetFirst, GetNextN, Clear, UsageGet],
            RegParam | DynHashCfg | DynHashAlgorithm => {
                &[DefaultEntrySet, DefaultEntryReset, DefaultEntryGet]
            }
            DevCfg => &[DefaultEntrySet, DefaultEntryGet],
            PortCfg => &[Add, Delete],
            SelectorGetMember | PortStat | PortHdlInfo | PortFrontPanelIdxInfo | PortStrInfo
            | DynHashCompute | SnapshotLiveness => &[Get],
            MirrorCfg | SnapshotCfg | SnapshotTrigger => &[
                Add,
                Modify,
                Delete,
                Clear,
                Get,
                GetFirst,
                GetNextN,
                UsageGet,
            ],
            SnapshotData | SnapshotPhv => &[Get, GetFirst, GetNextN, UsageGet],
            Invalid => &[],
        };
        apis.iter().copied().collect()
    }
}

impl Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match TABLE_TYPES.iter().find(|(_, kind)| kind == self) {
            Some((name, _)) => write!(f, "{}", name),
            None => write!(f, "Invalid"),
        }
    }
}

/// Entry-level API of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableApi {
    Add,
    Modify,
    ModifyInc,
    Delete,
    Clear,
    DefaultEntrySet,
    DefaultEntryReset,
    DefaultEntryGet,
    Get,
    GetFirst,
    GetNextN,
    UsageGet,
    GetByHandle,
    KeyGet,
    HandleGet,
}

impl TableApi {
    /// Maps an API name as declared in `supported_apis`.
    pub fn from_name(s: &str) -> Option<Self> {
        use TableApi::*;
        Some(match s {
            "tableEntryAdd" => Add,
            "tableEntryMod" => Modify,
            "tableEntryModInc" => ModifyInc,
            "tableEntryDel" => Delete,
            "tableClear" => Clear,
            "tableDefaultEntrySet" => DefaultEntrySet,
            "tableDefaultEntryReset" => DefaultEntryReset,
            "tableDefaultEntryGet" => DefaultEntryGet,
            "tableEntryGet" => Get,
            "tableEntryGetFirst" => GetFirst,
            "tableEntryGetNext_n" => GetNextN,
            "tableUsageGet" => UsageGet,
            _ => return None,
        })
    }
}

/// Table-wide operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableOperation {
    CounterSync,
    RegisterSync,
    HitStatusUpdate,
}

impl TableOperation {
    /// Maps an operation name.  The same name means different things on
    /// resource tables and match tables.
    pub fn from_name(s: &str, kind: TableKind) -> Option<Self> {
        match (kind, s) {
            (TableKind::Register, "Sync") => Some(TableOperation::RegisterSync),
            (TableKind::Counter, "Sync") => Some(TableOperation::CounterSync),
            (k, "SyncRegisters") if k.is_match() => Some(TableOperation::RegisterSync),
            (k, "SyncCounters") if k.is_match() => Some(TableOperation::CounterSync),
            (k, "UpdateHitState") if k.is_match() => Some(TableOperation::HitStatusUpdate),
            _ => None,
        }
    }
}

/// Table attribute that may be set at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableAttribute {
    IdleTimeout,
    EntryScope,
    MeterByteCountAdjust,
    SelectorUpdateCb,
    PortStatusNotif,
    PortStatPollIntvlMs,
}

impl TableAttribute {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "IdleTimeout" => Some(TableAttribute::IdleTimeout),
            "EntryScope" => Some(TableAttribute::EntryScope),
            "MeterByteCountAdjust" => Some(TableAttribute::MeterByteCountAdjust),
            "SelectorUpdateCb" => Some(TableAttribute::SelectorUpdateCb),
            "port_status_notif_cb" => Some(TableAttribute::PortStatusNotif),
            "poll_intvl_ms" => Some(TableAttribute::PortStatPollIntvlMs),
            _ => None,
        }
    }
}

/// Category of a cross-table reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefCategory {
    ActionData,
    Selection,
    Meter,
    Statistics,
    Stateful,
    /// Scheduling dependency declared by `depends_on`.
    Other,
}

impl RefCategory {
    /// Categories read from `*_table_refs` arrays.
    pub const PLACEMENT: [RefCategory; 5] = [
        RefCategory::ActionData,
        RefCategory::Selection,
        RefCategory::Meter,
        RefCategory::Statistics,
        RefCategory::Stateful,
    ];

    /// Key of the category in a placement document table.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefCategory::ActionData => "action_data_table_refs",
            RefCategory::Selection => "selection_table_refs",
            RefCategory::Meter => "meter_table_refs",
            RefCategory::Statistics => "statistics_table_refs",
            RefCategory::Stateful => "stateful_table_refs",
            RefCategory::Other => "other",
        }
    }
}

impl Display for RefCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference from one table to another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    /// Schema id of the referenced table.  Only meaningful when indirect.
    pub id: u32,
    /// Placement handle of the referenced table, with the pipeline mask.
    pub handle: u32,
    /// Addressed by an id carried in entry data rather than one-to-one.
    pub indirect: bool,
}

/// Key buffer size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeySize {
    pub bytes: usize,
    /// Sum of the full widths of the packed key fields.
    pub bits: usize,
}

/// An action and the layout of its data buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionInfo {
    pub id: u32,
    pub name: String,
    /// Action function handle, with the pipeline mask.  Zero when the
    /// placement document does not list the action.
    pub act_fn_hdl: u32,
    pub annotations: BTreeSet<Annotation>,
    pub data_fields: BTreeMap<u32, DataFieldInfo>,
    /// Size of the packed action data in bytes.
    pub data_size: usize,
    pub data_size_bits: usize,
}

impl ActionInfo {
    pub fn field_by_name(&self, name: &str) -> Option<&DataFieldInfo> {
        self.data_fields.values().find(|f| f.name == name)
    }
}

/// One table of the merged model.
#[derive(Clone, Debug, Default)]
pub struct TableInfo {
    pub id: u32,
    /// Fully qualified name, including the pipeline prefix if any.
    pub name: String,
    pub program: String,
    /// Pipeline whose placement document describes the table.
    pub pipeline: Option<String>,
    pub kind: TableKind,
    pub size: usize,
    /// Placement handle with the pipeline mask applied.  Zero for tables
    /// without placement.
    pub handle: u32,
    /// Handle of the compiler generated match table driving this resource.
    pub ghost_handle: Option<u32>,
    pub apis: BTreeSet<TableApi>,
    pub operations: BTreeSet<TableOperation>,
    pub attributes: BTreeSet<TableAttribute>,
    pub annotations: BTreeSet<Annotation>,
    /// Entries are fixed by the compiler.
    pub is_const: bool,
    pub has_const_default_action: bool,
    pub is_ternary: bool,
    pub key_fields: BTreeMap<u32, KeyFieldInfo>,
    pub key_size: KeySize,
    pub actions: BTreeMap<u32, ActionInfo>,
    /// Placement-only actions that were not modelled.
    pub absent_actions: BTreeSet<String>,
    pub common_data: BTreeMap<u32, DataFieldInfo>,
    pub refs: MultiMap<RefCategory, TableRef>,
    pub act_fn_hdl_to_id: BTreeMap<u32, u32>,
    /// Action profile addressed by this match table or selector.
    pub act_prof_id: Option<u32>,
    /// Selector addressed by this match table.
    pub selector_id: Option<u32>,
}

impl Default for TableKind {
    fn default() -> Self {
        TableKind::Invalid
    }
}

impl TableInfo {
    /// Name without the pipeline prefix.
    pub fn unqualified_name(&self) -> &str {
        self.pipeline
            .as_ref()
            .and_then(|p| self.name.strip_prefix(p.as_str()))
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&self.name)
    }

    pub fn key_field(&self, id: u32) -> Result<&KeyFieldInfo> {
        self.key_fields
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("key field {} of {}", id, self.name)))
    }

    pub fn key_field_by_name(&self, name: &str) -> Result<&KeyFieldInfo> {
        self.key_fields
            .values()
            .find(|k| k.name == name)
            .ok_or_else(|| Error::not_found(format!("key field \"{}\" of {}", name, self.name)))
    }

    pub fn action(&self, id: u32) -> Result<&ActionInfo> {
        self.actions
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("action {} of {}", id, self.name)))
    }

    pub fn action_by_name(&self, name: &str) -> Result<&ActionInfo> {
        self.actions
            .values()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::not_found(format!("action \"{}\" of {}", name, self.name)))
    }

    /// Looks up a data field of `action`, falling back to common data.
    pub fn data_field(&self, id: u32, action: Option<u32>) -> Result<&DataFieldInfo> {
        if let Some(action_id) = action {
            if let Some(field) = self.action(action_id)?.data_fields.get(&id) {
                return Ok(field);
            }
        }
        self.common_data
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("data field {} of {}", id, self.name)))
    }

    pub fn data_field_by_name(&self, name: &str, action: Option<u32>) -> Result<&DataFieldInfo> {
        if let Some(action_id) = action {
            if let Some(field) = self.action(action_id)?.field_by_name(name) {
                return Ok(field);
            }
        }
        self.common_data
            .values()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::not_found(format!("data field \"{}\" of {}", name, self.name)))
    }

    /// Data fields visible for `action`: its own followed by common data.
    pub fn data_fields(&self, action: Option<u32>) -> Vec<&DataFieldInfo> {
        let own = action
            .and_then(|id| self.actions.get(&id))
            .into_iter()
            .flat_map(|a| a.data_fields.values());
        own.chain(self.common_data.values()).collect()
    }

    /// References of one category, in document order.
    pub fn refs(&self, category: RefCategory) -> &[TableRef] {
        self.refs.get_vec(&category).map_or(&[], Vec::as_slice)
    }

    /// Handle of the resource a counter, meter or register field addresses:
    /// the first reference of the matching category, or the table itself.
    pub fn resource_handle(&self, t: DataFieldType) -> u32 {
        let category = if t == DataFieldType::CounterIndex || t.is_counter_spec() {
            RefCategory::Statistics
        } else if t == DataFieldType::MeterIndex || t.is_meter_spec() {
            RefCategory::Meter
        } else if t == DataFieldType::RegisterIndex || t.is_register_spec() {
            RefCategory::Stateful
        } else {
            return self.handle;
        };
        self.refs(category).first().map_or(self.handle, |r| r.handle)
    }

    /// Largest action data buffer over all actions.
    pub fn max_data_size(&self) -> usize {
        self.actions.values().map(|a| a.data_size).max().unwrap_or(0)
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.indirect { "indirect" } else { "direct" };
        write!(f, "{} (id {}, handle {:#x}, {})", self.name, self.id, self.handle, how)
    }
}

impl Display for ActionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "action {} {} (handle {:#x}, {} bytes)",
            self.id, self.name, self.act_fn_hdl, self.data_size
        )?;
        for field in self.data_fields.values() {
            write!(f, "\n\t\t{}", field)?;
        }
        Ok(())
    }
}

impl Display for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {} {}: {} size {}", self.id, self.name, self.kind, self.size)?;
        if self.handle != 0 {
            write!(f, " handle {:#x}", self.handle)?;
        }
        if let Some(ghost) = self.ghost_handle {
            write!(f, " ghost {:#x}", ghost)?;
        }
        if self.is_const {
            write!(f, " const")?;
        }
        if self.is_ternary {
            write!(f, " ternary")?;
        }
        write!(f, "\n\tkey: {} bytes, {} bits", self.key_size.bytes, self.key_size.bits)?;
        for key in self.key_fields.values().sorted_by_key(|k| (k.offset, k.id)) {
            write!(f, "\n\t{}", key)?;
        }
        for action in self.actions.values() {
            write!(f, "\n\t{}", action)?;
        }
        for field in self.common_data.values() {
            write!(f, "\n\t{}", field)?;
        }
        for category in RefCategory::PLACEMENT.into_iter().chain([RefCategory::Other]) {
            for r in self.refs(category) {
                write!(f, "\n\t{} -> {}", category, r)?;
            }
        }
        if !self.absent_actions.is_empty() {
            write!(f, "\n\tunpublished actions: {}", self.absent_actions.iter().join(", "))?;
        }
        if !self.annotations.is_empty() {
            write!(f, "\n\t{}", self.annotations.iter().join(" "))?;
        }
        Ok(())
    }
}
