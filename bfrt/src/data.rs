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

//! Entry data.
//!
//! A [`TableData`] mirrors the driver's action spec.  Action parameters are
//! packed into the action data buffer at their offsets; resource indexes and
//! counter, meter and register specs are kept per resource handle; the
//! remaining fields are held as typed values.

use crate::error::{zeroed, Error, Result};
use crate::field::{DataFieldInfo, DataFieldType};
use crate::pack::{
    check_bytes, check_u64_form, check_value, from_network, read_at, to_network, write_at,
};
use crate::table::TableInfo;
use crate::types::DataType;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{event, Level};

/// A data field value in host form.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Uint(u64),
    /// Network order, exactly as long as the field.
    Bytes(Vec<u8>),
    Bool(bool),
    Float(f32),
    Str(String),
    UintArray(Vec<u32>),
    BoolArray(Vec<bool>),
    StrArray(Vec<String>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSpec {
    pub bytes: u64,
    pub packets: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeterUnit {
    Packets,
    Bytes,
}

/// Rates are per second and bursts absolute, in the meter's unit.  Byte
/// meters count in kbps and kbits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeterSpec {
    pub unit: MeterUnit,
    pub cir: u64,
    pub pir: u64,
    pub cbs: u64,
    pub pbs: u64,
}

impl Default for MeterSpec {
    fn default() -> Self {
        MeterSpec {
            unit: MeterUnit::Bytes,
            cir: 0,
            pir: 0,
            cbs: 0,
            pbs: 0,
        }
    }
}

/// A register cell.  Single-field registers use `lo`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterSpec {
    pub hi: u64,
    pub lo: u64,
}

/// What an entry holds for one attached resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceSpec {
    pub index: Option<u32>,
    pub counter: Option<CounterSpec>,
    pub meter: Option<MeterSpec>,
    pub register: Option<RegisterSpec>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitState {
    Idle,
    Active,
}

impl HitState {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "ENTRY_IDLE" => Some(HitState::Idle),
            "ENTRY_ACTIVE" => Some(HitState::Active),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HitState::Idle => "ENTRY_IDLE",
            HitState::Active => "ENTRY_ACTIVE",
        }
    }
}

/// How an indirect match entry reaches its action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Member {
    Action(u32),
    Group(u32),
}

/// Data for one entry of a table.
#[derive(Clone, Debug)]
pub struct TableData<'a> {
    table: &'a TableInfo,
    action_id: Option<u32>,
    act_fn_hdl: u32,
    action_data: Vec<u8>,
    resources: BTreeMap<u32, ResourceSpec>,
    member: Option<Member>,
    ttl: Option<u32>,
    hit_state: Option<HitState>,
    values: BTreeMap<u32, FieldValue>,
    active_fields: BTreeSet<u32>,
}

/// Types whose value is kept as given rather than packed or folded into a
/// resource spec.
fn is_plain(t: DataFieldType) -> bool {
    use DataFieldType::*;
    matches!(t, Invalid | SelectorMembers | ActionMemberStatus | MaxGroupSize | DevPort)
}

impl<'a> TableData<'a> {
    /// Starts an entry for `action`, or for the table as a whole.
    pub fn new(table: &'a TableInfo, action: Option<u32>) -> Result<Self> {
        let mut data = TableData {
            table,
            action_id: None,
            act_fn_hdl: 0,
            action_data: Vec::new(),
            resources: BTreeMap::new(),
            member: None,
            ttl: None,
            hit_state: None,
            values: BTreeMap::new(),
            active_fields: BTreeSet::new(),
        };
        data.reset(action)?;
        Ok(data)
    }

    /// Clears every value and switches to `action`.
    pub fn reset(&mut self, action: Option<u32>) -> Result<()> {
        let (act_fn_hdl, size) = match action {
            Some(id) => {
                let info = self.table.action(id)?;
                (info.act_fn_hdl, info.data_size)
            }
            None => (0, self.table.max_data_size()),
        };
        self.action_data = zeroed(size)?;
        self.action_id = action;
        self.act_fn_hdl = act_fn_hdl;
        self.resources.clear();
        self.member = None;
        self.ttl = None;
        self.hit_state = None;
        self.values.clear();
        self.active_fields = self
            .table
            .data_fields(action)
            .into_iter()
            .map(|f| f.id)
            .collect();
        Ok(())
    }

    pub fn table(&self) -> &'a TableInfo {
        self.table
    }

    pub fn action_id(&self) -> Option<u32> {
        self.action_id
    }

    pub fn act_fn_hdl(&self) -> u32 {
        self.act_fn_hdl
    }

    pub fn action_data(&self) -> &[u8] {
        &self.action_data
    }

    pub fn resources(&self) -> &BTreeMap<u32, ResourceSpec> {
        &self.resources
    }

    pub fn resource(&self, handle: u32) -> Option<&ResourceSpec> {
        self.resources.get(&handle)
    }

    pub fn member(&self) -> Option<Member> {
        self.member
    }

    pub fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    pub fn hit_state(&self) -> Option<HitState> {
        self.hit_state
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.active_fields.contains(&id)
    }

    pub fn active_fields(&self) -> &BTreeSet<u32> {
        &self.active_fields
    }

    fn activate(&mut self, field: &DataFieldInfo) {
        for sibling in &field.oneof_siblings {
            self.active_fields.remove(sibling);
        }
        self.active_fields.insert(field.id);
    }

    /// Sets a data field.  Nothing changes unless the value fits.
    pub fn set(&mut self, id: u32, value: &FieldValue) -> Result<()> {
        let field = self.table.data_field(id, self.action_id)?;
        if field.is_container() {
            return Err(Error::NotSupported(format!(
                "container field {} of {}",
                field.name, self.table.name
            )));
        }

        if field.has_type(DataFieldType::EntryHitState) {
            let state = match value {
                FieldValue::Str(s) => HitState::from_name(s),
                _ => None,
            }
            .ok_or_else(|| Error::invalid(format!("{:?} is not a hit state", value)))?;
            self.hit_state = Some(state);
            self.activate(field);
            return Ok(());
        }

        if field.types.iter().all(|t| is_plain(*t)) {
            check_plain(field, value)?;
            self.values.insert(id, value.clone());
            self.activate(field);
            return Ok(());
        }

        let bytes = field_bytes(field, value)?;
        if field.has_type(DataFieldType::ActionParam)
            || field.has_type(DataFieldType::ActionParamOptimizedOut)
        {
            read_at(&self.action_data, field.offset, bytes.len())?;
        }
        let num = from_network(&bytes);
        for t in &field.types {
            self.apply(field, *t, &bytes, num)?;
        }
        self.activate(field);
        Ok(())
    }

    fn apply(
        &mut self,
        field: &DataFieldInfo,
        t: DataFieldType,
        bytes: &[u8],
        num: u64,
    ) -> Result<()> {
        use DataFieldType::*;
        let handle = self.table.resource_handle(t);
        match t {
            ActionParam => write_at(&mut self.action_data, field.offset, bytes)?,
            ActionParamOptimizedOut => {
                event!(
                    Level::WARN,
                    "{}: parameter {} was optimized out, writing zeros",
                    self.table.name,
                    field.name
                );
                write_at(&mut self.action_data, field.offset, &vec![0; bytes.len()])?;
            }
            CounterIndex | MeterIndex | RegisterIndex => {
                self.resources.entry(handle).or_default().index = Some(num as u32)
            }
            CounterSpecBytes | CounterSpecPackets => {
                let counter = self
                    .resources
                    .entry(handle)
                    .or_default()
                    .counter
                    .get_or_insert_with(Default::default);
                if t == CounterSpecBytes {
                    counter.bytes = num;
                } else {
                    counter.packets = num;
                }
            }
            MeterSpecCirPps | MeterSpecPirPps | MeterSpecCbsPkts | MeterSpecPbsPkts
            | MeterSpecCirKbps | MeterSpecPirKbps | MeterSpecCbsKbits | MeterSpecPbsKbits => {
                let meter = self
                    .resources
                    .entry(handle)
                    .or_default()
                    .meter
                    .get_or_insert_with(Default::default);
                meter.unit = match t {
                    MeterSpecCirPps | MeterSpecPirPps | MeterSpecCbsPkts | MeterSpecPbsPkts => {
                        MeterUnit::Packets
                    }
                    _ => MeterUnit::Bytes,
                };
                match t {
                    MeterSpecCirPps | MeterSpecCirKbps => meter.cir = num,
                    MeterSpecPirPps | MeterSpecPirKbps => meter.pir = num,
                    MeterSpecCbsPkts | MeterSpecCbsKbits => meter.cbs = num,
                    _ => meter.pbs = num,
                }
            }
            RegisterSpecHi | RegisterSpecLo | RegisterSpec => {
                let register = self
                    .resources
                    .entry(handle)
                    .or_default()
                    .register
                    .get_or_insert_with(Default::default);
                if t == RegisterSpecHi {
                    register.hi = num;
                } else {
                    register.lo = num;
                }
            }
            ActionMemberId => self.member = Some(Member::Action(num as u32)),
            SelectorGroupId => self.member = Some(Member::Group(num as u32)),
            Ttl => self.ttl = Some(num as u32),
            EntryHitState | Invalid | SelectorMembers | ActionMemberStatus | MaxGroupSize | DevPort => (),
        }
        Ok(())
    }

    /// Reads a data field back.  Fields never set report their default.
    pub fn get(&self, id: u32) -> Result<FieldValue> {
        use DataFieldType::*;
        let field = self.table.data_field(id, self.action_id)?;
        if let Some(value) = self.values.get(&id) {
            return Ok(value.clone());
        }
        let t = match field.types.iter().next() {
            Some(t) => *t,
            None => return Ok(default_value(field)),
        };
        let resource = self.resources.get(&self.table.resource_handle(t));
        let num = match t {
            ActionParam | ActionParamOptimizedOut => {
                let bytes = read_at(&self.action_data, field.offset, field.byte_size())?;
                return Ok(host_value(field, bytes));
            }
            CounterIndex | MeterIndex | RegisterIndex => resource.and_then(|r| r.index).map(u64::from),
            CounterSpecBytes => resource.and_then(|r| r.counter).map(|c| c.bytes),
            CounterSpecPackets => resource.and_then(|r| r.counter).map(|c| c.packets),
            MeterSpecCirPps | MeterSpecCirKbps => resource.and_then(|r| r.meter).map(|m| m.cir),
            MeterSpecPirPps | MeterSpecPirKbps => resource.and_then(|r| r.meter).map(|m| m.pir),
            MeterSpecCbsPkts | MeterSpecCbsKbits => resource.and_then(|r| r.meter).map(|m| m.cbs),
            MeterSpecPbsPkts | MeterSpecPbsKbits => resource.and_then(|r| r.meter).map(|m| m.pbs),
            RegisterSpecHi => resource.and_then(|r| r.register).map(|r| r.hi),
            RegisterSpecLo | RegisterSpec => resource.and_then(|r| r.register).map(|r| r.lo),
            ActionMemberId => match self.member {
                Some(Member::Action(id)) => Some(id as u64),
                _ => None,
            },
            SelectorGroupId => match self.member {
                Some(Member::Group(id)) => Some(id as u64),
                _ => None,
            },
            Ttl => self.ttl.map(u64::from),
            EntryHitState => {
                return Ok(match self.hit_state {
                    Some(state) => FieldValue::Str(state.as_str().to_string()),
                    None => default_value(field),
                })
            }
            Invalid | SelectorMembers | ActionMemberStatus | MaxGroupSize | DevPort => None,
        };
        Ok(match num {
            Some(v) => FieldValue::Uint(v),
            None => default_value(field),
        })
    }
}

/// Validated network-order bytes of a numeric value.
fn field_bytes(field: &DataFieldInfo, value: &FieldValue) -> Result<Vec<u8>> {
    match value {
        FieldValue::Uint(v) => {
            check_u64_form(field.width)?;
            check_value(*v, field.width)?;
            Ok(to_network(*v, field.byte_size()))
        }
        FieldValue::Bytes(b) => {
            check_bytes(b, field.width)?;
            Ok(b.clone())
        }
        FieldValue::Bool(b) if field.width == 1 => Ok(vec![*b as u8]),
        _ => Err(Error::invalid(format!(
            "{:?} for {} field {}",
            value, field.data_type, field.name
        ))),
    }
}

fn check_plain(field: &DataFieldInfo, value: &FieldValue) -> Result<()> {
    let ok = match (field.data_type, value) {
        (DataType::Uint64, FieldValue::Uint(v)) | (DataType::ByteStream, FieldValue::Uint(v)) => {
            check_value(*v, field.width.max(1))?;
            true
        }
        (DataType::ByteStream, FieldValue::Bytes(b)) => {
            check_bytes(b, field.width)?;
            true
        }
        (DataType::Bool, FieldValue::Bool(_)) => true,
        (DataType::Float, FieldValue::Float(_)) => true,
        (DataType::String, FieldValue::Str(s)) => {
            if !field.choices.is_empty() && !field.choices.contains(s) {
                return Err(Error::invalid(format!(
                    "\"{}\" is not a choice of {}",
                    s, field.name
                )));
            }
            true
        }
        (DataType::IntArr, FieldValue::UintArray(_)) => true,
        (DataType::BoolArr, FieldValue::BoolArray(_)) => true,
        (DataType::StringArr, FieldValue::StrArray(_)) => true,
        (DataType::Unknown, _) => true,
        _ => false,
    };
    if !ok {
        return Err(Error::invalid(format!(
            "{:?} for {} field {}",
            value, field.data_type, field.name
        )));
    }
    Ok(())
}

fn host_value(field: &DataFieldInfo, bytes: &[u8]) -> FieldValue {
    match field.data_type {
        DataType::Bool => FieldValue::Bool(bytes.iter().any(|b| *b != 0)),
        _ if field.width > 64 => FieldValue::Bytes(bytes.to_vec()),
        _ => FieldValue::Uint(from_network(bytes)),
    }
}

fn default_value(field: &DataFieldInfo) -> FieldValue {
    match field.data_type {
        DataType::Bool => FieldValue::Bool(field.default_value != 0),
        DataType::Float => FieldValue::Float(field.default_fl_value),
        DataType::String => FieldValue::Str(field.default_str_value.clone()),
        DataType::IntArr => FieldValue::UintArray(Vec::new()),
        DataType::BoolArr => FieldValue::BoolArray(Vec::new()),
        DataType::StringArr => FieldValue::StrArray(Vec::new()),
        _ if field.width > 64 => FieldValue::Bytes(vec![0; field.byte_size()]),
        _ => FieldValue::Uint(field.default_value),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::field::FieldShape;
    use crate::table::{ActionInfo, RefCategory, TableKind, TableRef};

    pub(crate) fn data_field(
        id: u32,
        name: &str,
        width: usize,
        offset: usize,
        types: &[DataFieldType],
    ) -> DataFieldInfo {
        DataFieldInfo {
            id,
            name: name.to_string(),
            action_id: 0,
            data_type: if width > 64 { DataType::ByteStream } else { DataType::Uint64 },
            width,
            choices: Vec::new(),
            default_value: 0,
            default_fl_value: 0.0,
            default_str_value: String::new(),
            offset,
            repeated: false,
            mandatory: false,
            read_only: false,
            types: types.iter().copied().collect(),
            annotations: BTreeSet::new(),
            oneof_siblings: BTreeSet::new(),
            shape: FieldShape::Scalar,
        }
    }

    fn forward_table() -> TableInfo {
        let mut table = TableInfo {
            name: "pipe.SwitchIngress.forward".to_string(),
            kind: TableKind::MatchDirect,
            handle: 0x0100_0001,
            ..Default::default()
        };
        let fields = vec![
            data_field(1, "port", 9, 0, &[DataFieldType::ActionParam]),
            data_field(2, "smac", 48, 2, &[DataFieldType::ActionParam]),
            data_field(3, "dropped", 16, 8, &[DataFieldType::ActionParamOptimizedOut]),
            data_field(4, "ctr", 10, 10, &[DataFieldType::ActionParam, DataFieldType::CounterIndex]),
        ];
        table.actions.insert(
            7,
            ActionInfo {
                id: 7,
                name: "SwitchIngress.set_port".to_string(),
                act_fn_hdl: 0x2000_0003,
                data_fields: fields.into_iter().map(|f| (f.id, f)).collect(),
                data_size: 12,
                data_size_bits: 83,
                ..Default::default()
            },
        );
        table.common_data.insert(
            65_537,
            data_field(65_537, "$COUNTER_SPEC_BYTES", 64, 0, &[DataFieldType::CounterSpecBytes]),
        );
        let mut hit = data_field(65_538, "$ENTRY_HIT_STATE", 0, 0, &[DataFieldType::EntryHitState]);
        hit.data_type = DataType::String;
        hit.default_str_value = "ENTRY_IDLE".to_string();
        table.common_data.insert(65_538, hit);
        table.refs.insert(
            RefCategory::Statistics,
            TableRef {
                name: "pipe.SwitchIngress.ctr".to_string(),
                id: 0,
                handle: 0x0300_0004,
                indirect: true,
            },
        );
        table
    }

    #[test]
    fn action_params_are_packed() {
        let table = forward_table();
        let mut data = TableData::new(&table, Some(7)).unwrap();
        assert_eq!(data.act_fn_hdl(), 0x2000_0003);
        assert_eq!(data.action_data().len(), 12);
        data.set(1, &FieldValue::Uint(0x1ff)).unwrap();
        data.set(2, &FieldValue::Bytes(vec![0, 0x11, 0x22, 0x33, 0x44, 0x55])).unwrap();
        assert_eq!(&data.action_data()[..8], &[0x01, 0xff, 0, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(data.get(1).unwrap(), FieldValue::Uint(0x1ff));
        assert!(matches!(data.set(1, &FieldValue::Uint(0x200)), Err(Error::InvalidArg(_))));
        assert_eq!(data.get(1).unwrap(), FieldValue::Uint(0x1ff));
    }

    #[test]
    fn index_params_feed_the_resource() {
        let table = forward_table();
        let mut data = TableData::new(&table, Some(7)).unwrap();
        data.set(4, &FieldValue::Uint(5)).unwrap();
        assert_eq!(&data.action_data()[10..], &[0, 5]);
        assert_eq!(data.resource(0x0300_0004).unwrap().index, Some(5));
        data.set(65_537, &FieldValue::Uint(1500)).unwrap();
        assert_eq!(
            data.resource(0x0300_0004).unwrap().counter,
            Some(CounterSpec { bytes: 1500, packets: 0 })
        );
        assert_eq!(data.get(65_537).unwrap(), FieldValue::Uint(1500));
    }

    #[test]
    fn optimized_out_params_write_zeros() {
        let table = forward_table();
        let mut data = TableData::new(&table, Some(7)).unwrap();
        data.set(3, &FieldValue::Uint(0xffff)).unwrap();
        assert_eq!(&data.action_data()[8..10], &[0, 0]);
    }

    #[test]
    fn hit_state() {
        let table = forward_table();
        let mut data = TableData::new(&table, Some(7)).unwrap();
        assert_eq!(data.get(65_538).unwrap(), FieldValue::Str("ENTRY_IDLE".to_string()));
        data.set(65_538, &FieldValue::Str("ENTRY_ACTIVE".to_string())).unwrap();
        assert_eq!(data.hit_state(), Some(HitState::Active));
        assert!(data.set(65_538, &FieldValue::Str("ENTRY_BUSY".to_string())).is_err());
    }

    #[test]
    fn member_and_group_are_exclusive() {
        let mut table = TableInfo {
            name: "pipe.SwitchIngress.lag".to_string(),
            kind: TableKind::MatchIndirectSelector,
            ..Default::default()
        };
        let mut member = data_field(65_539, "$ACTION_MEMBER_ID", 32, 0, &[DataFieldType::ActionMemberId]);
        member.oneof_siblings.insert(65_540);
        let mut group = data_field(65_540, "$SELECTOR_GROUP_ID", 32, 0, &[DataFieldType::SelectorGroupId]);
        group.oneof_siblings.insert(65_539);
        table.common_data.insert(member.id, member);
        table.common_data.insert(group.id, group);

        let mut data = TableData::new(&table, None).unwrap();
        assert!(data.is_active(65_539) && data.is_active(65_540));
        data.set(65_540, &FieldValue::Uint(3)).unwrap();
        assert_eq!(data.member(), Some(Member::Group(3)));
        assert!(!data.is_active(65_539));
        data.set(65_539, &FieldValue::Uint(9)).unwrap();
        assert_eq!(data.member(), Some(Member::Action(9)));
        assert!(!data.is_active(65_540));
        assert_eq!(data.get(65_540).unwrap(), FieldValue::Uint(0));
    }

    #[test]
    fn unknown_action() {
        let table = forward_table();
        assert!(matches!(TableData::new(&table, Some(8)), Err(Error::NotFound(_))));
        let data = TableData::new(&table, None).unwrap();
        assert_eq!(data.action_data().len(), 12);
    }
}
