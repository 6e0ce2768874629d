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

//! Per-table merging of schema and placement documents.
//!
//! A [`Merger`] holds, for every table name, the schema node and the
//! (pipeline prefixed) placement node.  It lives only while a program is
//! loaded; the [`TableInfo`]s it produces keep nothing from the documents.

use crate::error::{Error, Result};
use crate::field::{
    parse_annotations, Annotation, DataFieldInfo, DataFieldType, FieldShape, KeyFieldInfo,
    KeyFieldType, MATCH_PRIORITY_FIELD, UNPACKED_OFFSET,
};
use crate::json::Node;
use crate::pack::byte_len;
use crate::table::{
    ActionInfo, KeySize, RefCategory, TableApi, TableAttribute, TableInfo, TableKind,
    TableOperation,
};
use crate::types::parse_type;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{event, Level};

/// The two documents describing one table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry<'a> {
    pub schema: Node<'a>,
    pub context: Node<'a>,
    pub pipeline: Option<&'a str>,
    /// Handle mask of `pipeline`.
    pub mask: u32,
}

impl<'a> Entry<'a> {
    pub fn schema_only(schema: Node<'a>) -> Self {
        Entry {
            schema,
            context: Node::missing(),
            pipeline: None,
            mask: 0,
        }
    }

    pub fn kind(&self) -> TableKind {
        TableKind::from_table_type(self.schema.get("table_type").as_str())
    }
}

pub(crate) struct Merger<'a> {
    pub program: &'a str,
    pub entries: BTreeMap<String, Entry<'a>>,
}

fn is_slice_annotated(key: Node) -> bool {
    key.get("annotations")
        .children()
        .any(|a| a.get("name").as_str() == "isFieldSlice" && a.get("value").as_str() == "true")
}

/// Name of the field a key slices, which is the key name itself unless the
/// key is annotated as a slice.
pub(crate) fn parent_key_name<'a>(key: Node<'a>) -> &'a str {
    let name = key.get("name").as_str();
    if !is_slice_annotated(key) {
        return name;
    }
    match name.rfind('[') {
        Some(idx) => &name[..idx],
        None => {
            event!(Level::ERROR, "{name} is a field slice without '[' in its name");
            name
        }
    }
}

/// Start bit of an annotated slice `name[end:start]`.
fn slice_start_bit(name: &str) -> usize {
    let digits = name
        .find(':')
        .map(|idx| &name[idx + 1..])
        .map(|rest| rest.chars().take_while(char::is_ascii_digit).collect::<String>());
    match digits.and_then(|d| d.parse().ok()) {
        Some(bit) => bit,
        None => {
            event!(Level::ERROR, "{name} is a field slice without a start bit");
            0
        }
    }
}

/// The stage table carrying action formats.  ALPM and ATCAM tables nest it
/// inside their first unit.
fn stage_table(context: Node) -> Node {
    let attrs = context.get("match_attributes");
    if attrs.get("pre_classifier").exists() {
        attrs
            .get("atcam_table")
            .get("match_attributes")
            .get("units")
            .at(0)
            .get("match_attributes")
            .get("stage_tables")
            .at(0)
    } else if attrs.get("match_type").as_str() == "algorithmic_tcam" {
        attrs
            .get("units")
            .at(0)
            .get("match_attributes")
            .get("stage_tables")
            .at(0)
    } else {
        attrs.get("stage_tables").at(0)
    }
}

/// Whether the placement action with raw handle `handle` lists `param`
/// among its P4 parameters.
fn has_p4_parameter(context: Node, handle: u32, param: &str) -> bool {
    context
        .get("actions")
        .children()
        .filter(|a| a.get("handle").as_u32() == handle)
        .any(|a| {
            a.get("p4_parameters")
                .children()
                .any(|p| p.get("name").as_str() == param)
        })
}

/// Compiler-fixed entries, including those of ATCAM units and ALPM
/// pre-classifiers.
fn has_static_entries(context: Node) -> bool {
    let entries = context.get("static_entries");
    if entries.exists() {
        return !entries.is_empty();
    }
    let attrs = context.get("match_attributes");
    if attrs.get("match_type").as_str() == "algorithmic_tcam" {
        attrs
            .get("units")
            .children()
            .any(|u| !u.get("static_entries").is_empty())
    } else if attrs.get("pre_classifier").exists() {
        !attrs.get("pre_classifier").get("static_entries").is_empty()
    } else {
        false
    }
}

/// A keyless table whose match is an attached gateway condition.
fn has_gateway_key(context: Node) -> bool {
    let attrs = context.get("match_attributes");
    attrs.get("match_type").as_str() == "match_with_no_key"
        && attrs
            .get("stage_tables")
            .children()
            .any(|s| s.get("has_attached_gateway").as_bool())
}

/// Key buffer layout derived before the key fields themselves.
#[derive(Default)]
struct KeyLayout {
    position: BTreeMap<String, usize>,
    parent_size: BTreeMap<String, usize>,
    offset: BTreeMap<usize, usize>,
    size: KeySize,
}

impl KeyLayout {
    /// Field positions come from the placement document for tables that have
    /// one, and from schema order otherwise.  Offsets are assigned in
    /// position order.
    fn new(kind: TableKind, schema_keys: Node, context_keys: Node) -> Self {
        let mut layout = KeyLayout::default();
        let mut bits = BTreeMap::new();
        let mut sizes = BTreeMap::new();
        if kind.has_placement_key() {
            for field in context_keys.children() {
                let name = field.get("name").as_str();
                if layout.position.contains_key(name) {
                    continue;
                }
                let pos = field.get("position").as_usize();
                let width = field.get("bit_width_full").as_usize();
                layout.position.insert(name.to_string(), pos);
                layout.parent_size.insert(name.to_string(), byte_len(width));
                sizes.insert(pos, byte_len(width));
                bits.insert(name, width);
            }
        } else {
            for (pos, key) in schema_keys.children().enumerate() {
                let name = key.get("name").as_str();
                let width = parse_type(key).width;
                layout.position.insert(name.to_string(), pos);
                layout.parent_size.insert(name.to_string(), byte_len(width));
                sizes.insert(pos, byte_len(width));
                bits.insert(name, width);
            }
        }
        let mut cumulative = 0;
        for (pos, size) in sizes {
            layout.offset.insert(pos, cumulative);
            cumulative += size;
        }
        layout.size = KeySize {
            bytes: cumulative,
            bits: bits.values().sum(),
        };
        layout
    }

    /// Byte offset and parent size of the field named `name`.
    fn place(&self, name: &str) -> Option<(usize, usize)> {
        let pos = self.position.get(name)?;
        Some((*self.offset.get(pos)?, *self.parent_size.get(name)?))
    }
}

impl<'a> Merger<'a> {
    pub fn entry(&self, name: &str) -> Option<&Entry<'a>> {
        self.entries.get(name)
    }

    /// Schema id of the table called `name`, if it has a schema entry.
    pub fn schema_id(&self, name: &str) -> Option<u32> {
        self.entry(name)
            .filter(|e| e.schema.exists())
            .map(|e| e.schema.get("id").as_u32())
    }

    pub fn context(&self, name: &str) -> Node<'a> {
        self.entry(name).map_or(Node::missing(), |e| e.context)
    }

    /// A table carrying the identity fields shared by every kind.
    fn new_table(&self, entry: &Entry<'a>, handle: u32) -> TableInfo {
        let schema = entry.schema;
        let kind = entry.kind();
        TableInfo {
            id: schema.get("id").as_u32(),
            name: schema.get("name").as_str().to_string(),
            program: self.program.to_string(),
            pipeline: entry.pipeline.map(str::to_string),
            kind,
            size: schema.get("size").as_usize(),
            handle,
            apis: kind.implemented_apis(),
            annotations: parse_annotations(schema.get("annotations")),
            ..Default::default()
        }
    }

    fn start_bit(&self, table: &TableInfo, key: Node, context_keys: Node) -> usize {
        let name = key.get("name").as_str();
        if is_slice_annotated(key) {
            return slice_start_bit(name);
        }
        if !table.kind.has_placement_key() || name == MATCH_PRIORITY_FIELD {
            return 0;
        }
        match context_keys
            .children()
            .find(|k| k.get("name").as_str() == name)
        {
            Some(k) => k.get("start_bit").as_usize(),
            None => {
                event!(
                    Level::ERROR,
                    "{}: no placement for key field {name}, assuming start bit 0",
                    table.name
                );
                0
            }
        }
    }

    /// Parses the key fields of `table` and sizes its key buffer.
    fn parse_keys(&self, table: &mut TableInfo, schema: Node, context: Node, gateway: bool) -> Result<()> {
        let schema_keys = schema.get("key");
        let context_keys = context.get("match_key_fields");
        let layout = KeyLayout::new(table.kind, schema_keys, context_keys);
        let partition = context
            .get("match_attributes")
            .get("partition_field_name")
            .as_str();

        for key in schema_keys.children() {
            let parent = parent_key_name(key);
            let is_partition = !partition.is_empty() && partition == parent;
            let start_bit = if is_partition || gateway {
                0
            } else {
                self.start_bit(table, key, context_keys)
            };
            let (offset, parent_size) = if parent == MATCH_PRIORITY_FIELD || gateway {
                (UNPACKED_OFFSET, 4)
            } else {
                layout.place(parent).ok_or_else(|| {
                    Error::structural(&table.name, format!("no offset for key field {parent}"))
                })?
            };

            let ty = parse_type(key);
            if offset != UNPACKED_OFFSET && start_bit + ty.width > parent_size * 8 {
                return Err(Error::structural(
                    &table.name,
                    format!(
                        "key field {} of bits {}..{} does not fit its {} byte parent",
                        key.get("name").as_str(),
                        start_bit,
                        start_bit + ty.width,
                        parent_size
                    ),
                ));
            }
            let field = KeyFieldInfo {
                id: key.get("id").as_u32(),
                name: key.get("name").as_str().to_string(),
                match_kind: KeyFieldType::from_match_type(key.get("match_type").as_str()),
                data_type: ty.data_type,
                width: ty.width,
                choices: ty.choices,
                offset,
                start_bit,
                is_field_slice: is_slice_annotated(key)
                    || start_bit != 0
                    || byte_len(ty.width) != parent_size,
                parent_field_full_byte_size: parent_size,
                is_partition,
            };
            if table.key_fields.contains_key(&field.id) {
                return Err(Error::structural(
                    &table.name,
                    format!("key field id {} is repeated", field.id),
                ));
            }
            table.key_fields.insert(field.id, field);
        }
        table.key_size = layout.size;
        Ok(())
    }

    /// Whether `param` of the action with raw handle `action_handle` is
    /// carried in the action data.
    fn is_action_param(&self, table: &TableInfo, action_handle: u32, param: &str) -> bool {
        match table.kind {
            TableKind::MatchDirect => {
                for r in table.refs(RefCategory::ActionData) {
                    match self.entry(&r.name) {
                        Some(e) if has_p4_parameter(e.context, action_handle, param) => return true,
                        Some(_) => (),
                        None => event!(Level::ERROR, "{}: unknown action table {}", table.name, r.name),
                    }
                }
                // Not in action RAM, so look for an immediate field.
                let stage = stage_table(self.context(&table.name));
                let indirection = stage.get("ternary_indirection_stage_table");
                let formats = if indirection.exists() {
                    indirection.get("action_format")
                } else {
                    stage.get("action_format")
                };
                formats
                    .children()
                    .filter(|f| f.get("action_handle").as_u32() == action_handle)
                    .any(|f| {
                        f.get("immediate_fields")
                            .children()
                            .any(|i| i.get("param_name").as_str() == param)
                    })
            }
            TableKind::ActionProfile => {
                has_p4_parameter(self.context(&table.name), action_handle, param)
            }
            // Phase0 data is all action data.
            TableKind::PortMetadata => true,
            _ => false,
        }
    }

    /// Parses one data field.  `node` is an entry of a `data` array; for a
    /// one-of group the `oneof_index`th member is parsed.  Advances `offset`
    /// and `bits` past the field.  The flag reports a register data field.
    #[allow(clippy::too_many_arguments)]
    fn parse_data(
        &self,
        table: &TableInfo,
        node: Node,
        indirect_resources: Node,
        action_handle: u32,
        action_id: u32,
        oneof_index: usize,
        offset: &mut usize,
        bits: &mut usize,
    ) -> (DataFieldInfo, bool) {
        let mandatory = node.get("mandatory").as_bool();
        let read_only = node.get("read_only").as_bool();
        let mut node = node;
        if node.get("singleton").exists() {
            node = node.get("singleton");
        }
        let mut oneof_siblings = BTreeSet::new();
        if node.get("oneof").exists() {
            let group = node.get("oneof");
            oneof_siblings = group.children().map(|m| m.get("id").as_u32()).collect();
            node = group.at(oneof_index);
            oneof_siblings.remove(&node.get("id").as_u32());
        }

        let ty = parse_type(node);
        let name = node.get("name").as_str();
        let mut types = BTreeSet::new();
        if let Some(reserved) = name.strip_prefix('$') {
            types.insert(DataFieldType::from_reserved_name(reserved, table.kind));
        }
        for res in indirect_resources
            .children()
            .filter(|r| r.get("parameter_name").as_str() == name)
        {
            let resource = res.get("resource_name").as_str();
            match self.entry(resource) {
                Some(e) => {
                    let t = DataFieldType::from_resource_kind(e.kind());
                    if t != DataFieldType::Invalid {
                        types.insert(t);
                    }
                }
                None => event!(
                    Level::ERROR,
                    "{}: parameter {name} indexes unknown resource {resource}",
                    table.name
                ),
            }
        }
        if self.is_action_param(table, action_handle, name) {
            types.insert(DataFieldType::ActionParam);
        }

        let annotations = parse_annotations(node.get("annotations"));
        let is_register = annotations.contains(&Annotation::new("$bfrt_field_class", "register_data"));
        let keeps_params = table.kind.is_match()
            || matches!(table.kind, TableKind::ActionProfile | TableKind::PortMetadata);
        if keeps_params && types.is_empty() && !is_register {
            types.insert(DataFieldType::ActionParamOptimizedOut);
        }

        let repeated = node.get("repeated").as_bool();
        let shape = if node.get("container").exists() {
            FieldShape::Container(self.parse_container(table, node.get("container")))
        } else if repeated {
            FieldShape::Array
        } else {
            FieldShape::Scalar
        };

        let field = DataFieldInfo {
            id: node.get("id").as_u32(),
            name: name.to_string(),
            action_id,
            data_type: ty.data_type,
            width: ty.width,
            choices: ty.choices,
            default_value: ty.default_value,
            default_fl_value: ty.default_fl_value,
            default_str_value: ty.default_str_value,
            offset: *offset,
            repeated,
            mandatory,
            read_only,
            types,
            annotations,
            oneof_siblings,
            shape,
        };
        *offset += byte_len(field.width);
        *bits += field.width;
        (field, is_register)
    }

    /// Members of a container field.  They are never packed, so carry no
    /// offset, and only reserved names give them a type.
    fn parse_container(&self, table: &TableInfo, container: Node) -> Vec<DataFieldInfo> {
        container
            .children()
            .map(|node| {
                let mandatory = node.get("mandatory").as_bool();
                let read_only = node.get("read_only").as_bool();
                let node = if node.get("singleton").exists() {
                    node.get("singleton")
                } else {
                    node
                };
                let ty = parse_type(node);
                let name = node.get("name").as_str();
                let types = name
                    .strip_prefix('$')
                    .map(|r| DataFieldType::from_reserved_name(r, table.kind))
                    .into_iter()
                    .collect();
                let repeated = node.get("repeated").as_bool();
                let shape = if node.get("container").exists() {
                    FieldShape::Container(self.parse_container(table, node.get("container")))
                } else if repeated {
                    FieldShape::Array
                } else {
                    FieldShape::Scalar
                };
                DataFieldInfo {
                    id: node.get("id").as_u32(),
                    name: name.to_string(),
                    action_id: 0,
                    data_type: ty.data_type,
                    width: ty.width,
                    choices: ty.choices,
                    default_value: ty.default_value,
                    default_fl_value: 0.0,
                    default_str_value: String::new(),
                    offset: 0,
                    repeated,
                    mandatory,
                    read_only,
                    types,
                    annotations: parse_annotations(node.get("annotations")),
                    oneof_siblings: BTreeSet::new(),
                    shape,
                }
            })
            .collect()
    }

    /// Parses an action from its schema node and, if placed, its placement
    /// node.
    fn parse_action(&self, table: &TableInfo, schema: Node, context: Node, mask: u32) -> ActionInfo {
        let raw_handle = context.get("handle").as_u32();
        let mut action = ActionInfo {
            id: schema.get("id").as_u32(),
            name: schema.get("name").as_str().to_string(),
            act_fn_hdl: if context.exists() { mask | raw_handle } else { 0 },
            annotations: parse_annotations(schema.get("annotations")),
            ..Default::default()
        };
        let resources = context.get("indirect_resources");
        let (mut offset, mut bits) = (0, 0);
        for node in schema.get("data").children() {
            let (field, _) = self.parse_data(
                table,
                node,
                resources,
                raw_handle,
                action.id,
                0,
                &mut offset,
                &mut bits,
            );
            if action.data_fields.contains_key(&field.id) {
                event!(
                    Level::ERROR,
                    "{}: data field id {} repeats in action {}",
                    table.name,
                    field.id,
                    action.name
                );
                continue;
            }
            action.data_fields.insert(field.id, field);
        }
        action.data_size = offset;
        action.data_size_bits = bits;
        action
    }

    /// A phase0 action exists only in the placement document.  Its data is
    /// the table's common data, which is parsed here.
    fn parse_phase0_action(
        &self,
        table: &mut TableInfo,
        schema: Node,
        context: Node,
        mask: u32,
    ) -> Result<ActionInfo> {
        let act_fn_hdl = mask | context.get("handle").as_u32();
        let (mut offset, mut bits) = (0, 0);
        for node in schema.get("data").children() {
            if node.get("oneof").exists() {
                return Err(Error::structural(
                    &table.name,
                    "phase0 data may not contain one-of groups",
                ));
            }
            let (field, _) =
                self.parse_data(table, node, Node::missing(), 0, 0, 0, &mut offset, &mut bits);
            if table.common_data.contains_key(&field.id) {
                event!(
                    Level::ERROR,
                    "{}: common data field id {} is repeated",
                    table.name,
                    field.id
                );
                continue;
            }
            table.common_data.insert(field.id, field);
        }
        Ok(ActionInfo {
            id: act_fn_hdl,
            name: context.get("name").as_str().to_string(),
            act_fn_hdl,
            data_size: offset,
            data_size_bits: bits,
            ..Default::default()
        })
    }

    fn insert_action(table: &mut TableInfo, action: ActionInfo) -> Result<()> {
        if table.actions.contains_key(&action.id) {
            return Err(Error::structural(
                &table.name,
                format!("action id {} is repeated", action.id),
            ));
        }
        table.act_fn_hdl_to_id.insert(action.act_fn_hdl, action.id);
        table.actions.insert(action.id, action);
        Ok(())
    }

    /// Parses the common data of `table`.  Returns the ids of register data
    /// fields, which fixed tables may not have.
    fn parse_common_data(&self, table: &mut TableInfo, schema: Node) -> Vec<u32> {
        let mut registers = Vec::new();
        for node in schema.get("data").children() {
            let members = if node.get("oneof").exists() {
                node.get("oneof").len()
            } else {
                1
            };
            let (mut offset, mut bits) = (0, 0);
            for idx in 0..members {
                let (field, is_register) = self.parse_data(
                    table,
                    node,
                    Node::missing(),
                    0,
                    0,
                    idx,
                    &mut offset,
                    &mut bits,
                );
                if is_register {
                    if table.kind.is_fixed() {
                        event!(
                            Level::ERROR,
                            "{}: fixed table has register data field {}",
                            table.name,
                            field.id
                        );
                        continue;
                    }
                    registers.push(field.id);
                }
                if table.common_data.contains_key(&field.id) {
                    event!(
                        Level::ERROR,
                        "{}: common data field id {} is repeated",
                        table.name,
                        field.id
                    );
                    continue;
                }
                table.common_data.insert(field.id, field);
            }
        }
        registers
    }

    /// Tags the cells of a register: one field is the whole cell, two are
    /// its halves with the lower id as the low half.  Direct registers may
    /// not already carry a type.
    fn set_register_types(table: &mut TableInfo, ids: &[u32], direct: bool) -> Result<()> {
        let tags: Vec<(u32, DataFieldType)> = match ids {
            [a, b] => {
                let (lo, hi) = if a < b { (*a, *b) } else { (*b, *a) };
                vec![(hi, DataFieldType::RegisterSpecHi), (lo, DataFieldType::RegisterSpecLo)]
            }
            [single, ..] => vec![(*single, DataFieldType::RegisterSpec)],
            [] => return Ok(()),
        };
        for (id, tag) in tags {
            if let Some(field) = table.common_data.get_mut(&id) {
                if direct && !field.types.is_empty() {
                    return Err(Error::structural(
                        &table.name,
                        format!("register field {} already has a type", field.name),
                    ));
                }
                field.types.insert(tag);
            }
        }
        Ok(())
    }

    /// Warns about `supported_apis` declarations that disagree with what is
    /// implemented for the table's kind.
    fn verify_supported_apis(table: &TableInfo, schema: Node) {
        let declared = schema.get("supported_apis");
        if !declared.exists() {
            event!(Level::DEBUG, "{} declares no supported APIs", table.name);
            return;
        }
        let names: Vec<&str> = match declared.value() {
            Some(serde_json::Value::Array(_)) => declared.strings(),
            _ => declared.keys().collect(),
        };
        let mut undeclared = table.kind.implemented_apis();
        let mut count = 0;
        for name in names {
            let api = match TableApi::from_name(name) {
                Some(api) if !name.is_empty() => api,
                _ => {
                    event!(Level::WARN, "{}: invalid 'supported_apis' format", table.name);
                    break;
                }
            };
            count += 1;
            if !undeclared.remove(&api) {
                event!(
                    Level::WARN,
                    "{}: API declaration {name} is not implemented",
                    table.name
                );
            }
        }
        if !undeclared.is_empty() {
            event!(
                Level::WARN,
                "{} has {} implemented APIs without declarations",
                table.name,
                undeclared.len()
            );
        }
        event!(Level::DEBUG, "{} has {count} supported APIs", table.name);
    }

    /// A table whose schema alone describes it: port, mirror, device and
    /// debug counter configuration, among others.
    pub fn parse_fixed_table(&self, entry: &Entry<'a>) -> Result<TableInfo> {
        let schema = entry.schema;
        let mut table = self.new_table(entry, 0);
        event!(Level::DEBUG, "table {} :: type {}", table.name, table.kind);
        Self::verify_supported_apis(&table, schema);
        self.parse_keys(&mut table, schema, Node::missing(), false)?;

        table.attributes = schema
            .get("attributes")
            .strings()
            .into_iter()
            .filter_map(TableAttribute::from_name)
            .filter(|a| {
                matches!(
                    a,
                    TableAttribute::PortStatusNotif | TableAttribute::PortStatPollIntvlMs
                )
            })
            .collect();

        for node in schema.get("action_specs").children() {
            let action = self.parse_action(&table, node, Node::missing(), 0);
            Self::insert_action(&mut table, action)?;
        }
        self.parse_common_data(&mut table, schema);
        self.add_depends_on(&mut table, schema);
        Ok(table)
    }

    /// A snapshot table, described by its schema alone.
    pub fn parse_snapshot_table(&self, entry: &Entry<'a>) -> Result<TableInfo> {
        let schema = entry.schema;
        let mut table = self.new_table(entry, 0);
        event!(Level::DEBUG, "snapshot table {} :: type {}", table.name, table.kind);
        self.parse_keys(&mut table, schema, Node::missing(), false)?;

        let (mut offset, mut bits) = (0, 0);
        for node in schema.get("data").children() {
            let (field, _) =
                self.parse_data(&table, node, Node::missing(), 0, 0, 0, &mut offset, &mut bits);
            if table.common_data.contains_key(&field.id) {
                return Err(Error::structural(
                    &table.name,
                    format!("common data field id {} is repeated", field.id),
                ));
            }
            table.common_data.insert(field.id, field);
        }
        Ok(table)
    }

    /// A table described by both documents.
    pub fn parse_table(&self, entry: &Entry<'a>) -> Result<TableInfo> {
        let (schema, context, mask) = (entry.schema, entry.context, entry.mask);
        let raw_handle = if schema.get("table_type").as_str() == "ParserValueSet" {
            context.get("pvs_handle").as_u32()
        } else {
            context.get("handle").as_u32()
        };
        let handle = if raw_handle == 0 { 0 } else { mask | raw_handle };
        let mut table = self.new_table(entry, handle);
        event!(Level::DEBUG, "table {} :: type {}", table.name, table.kind);

        self.add_placement_refs(&mut table, context, mask);

        let mut gateway = false;
        if table.kind.is_match() {
            table.is_const = has_static_entries(context);
            gateway = has_gateway_key(context);
        }
        if table.kind == TableKind::Selector {
            self.add_selector_ref(&mut table, context, mask)?;
        }

        self.parse_keys(&mut table, schema, context, gateway)?;
        let match_type = context.get("match_attributes").get("match_type").as_str();
        table.is_ternary = matches!(match_type, "ternary" | "algorithmic_tcam")
            || table
                .key_fields
                .values()
                .any(|k| !matches!(k.match_kind, KeyFieldType::Exact | KeyFieldType::Invalid));

        table.operations = schema
            .get("supported_operations")
            .strings()
            .into_iter()
            .filter_map(|op| TableOperation::from_name(op, table.kind))
            .collect();
        table.attributes = schema
            .get("attributes")
            .strings()
            .into_iter()
            .filter_map(TableAttribute::from_name)
            .filter(|a| {
                !matches!(
                    a,
                    TableAttribute::PortStatusNotif | TableAttribute::PortStatPollIntvlMs
                )
            })
            .collect();

        let mut context_actions = context.get("actions");
        if table.kind == TableKind::ActionProfile {
            if let Some(actions) = self.adopt_match_table_refs(&mut table, mask) {
                context_actions = actions;
            }
        }

        // Pair actions by name.  Placement-only actions are legal for phase0
        // tables only.
        let mut pairs: BTreeMap<&str, (Node, Node)> = BTreeMap::new();
        for a in schema.get("action_specs").children() {
            pairs.insert(a.get("name").as_str(), (a, Node::missing()));
        }
        for a in context_actions.children() {
            let name = a.get("name").as_str();
            match pairs.get_mut(name) {
                Some(pair) => pair.1 = a,
                None if table.kind == TableKind::PortMetadata => {
                    pairs.insert(name, (Node::missing(), a));
                }
                None => {
                    event!(
                        Level::WARN,
                        "{}: action {name} is placed but has no schema entry",
                        table.name
                    );
                    table.absent_actions.insert(name.to_string());
                }
            }
        }
        table.has_const_default_action = schema.get("has_const_default_action").as_bool();
        for (action_schema, action_context) in pairs.into_values() {
            let action = if action_schema.exists() {
                self.parse_action(&table, action_schema, action_context, mask)
            } else {
                self.parse_phase0_action(&mut table, schema, action_context, mask)?
            };
            Self::insert_action(&mut table, action)?;
        }

        if table.kind != TableKind::PortMetadata {
            let registers = self.parse_common_data(&mut table, schema);
            if table.kind == TableKind::Register {
                let ids: Vec<u32> = table.common_data.keys().copied().collect();
                Self::set_register_types(&mut table, &ids, false)?;
            } else {
                Self::set_register_types(&mut table, &registers, true)?;
            }
        }
        self.add_depends_on(&mut table, schema);
        Ok(table)
    }
}
