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

//! The table model of one P4 program.
//!
//! [`BfRtInfo::load`] reads a program's schema documents and, for each
//! pipeline, its placement document, merges them table by table, and then
//! links tables to one another.  The result is immutable.

use crate::config::{read_json, P4Pipeline, ProgramConfig};
use crate::driver::PipeDriver;
use crate::error::{Error, Result};
use crate::json::{prefix_name, Node};
use crate::parse::{Entry, Merger};
use crate::refs;
use crate::table::{RefCategory, TableAttribute, TableInfo, TableKind};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{event, Level};

/// A pipeline's placement document, already read, with its handle mask.
#[derive(Clone, Debug)]
pub struct PipelineDocument {
    pub name: String,
    pub mask: u32,
    pub context: Value,
}

/// The merged tables of one program.
#[derive(Debug, Default)]
pub struct BfRtInfo {
    program: String,
    /// In name order.
    tables: Vec<TableInfo>,
    by_id: BTreeMap<u32, usize>,
    /// Full names and every unambiguous dotted suffix.
    full_names: BTreeMap<String, usize>,
    handle_to_id: BTreeMap<u32, u32>,
    /// Schema tables the compiler optimized out.
    invalid_table_names: BTreeSet<String>,
    dependents: BTreeMap<u32, Vec<u32>>,
    pipelines: Vec<P4Pipeline>,
    bfrt_files: Vec<PathBuf>,
}

/// Qualifies the names in a placement document with its pipeline, as the
/// schema document's names are.
fn prefix_context(pipeline: &str, context: &mut Value) {
    let tables = match context.get_mut("tables") {
        Some(Value::Array(tables)) => tables,
        _ => return,
    };
    for table in tables {
        prefix_name(table, "name", pipeline);
        for category in RefCategory::PLACEMENT {
            if let Some(Value::Array(refs)) = table.get_mut(category.as_str()) {
                for r in refs {
                    prefix_name(r, "name", pipeline);
                }
            }
        }
        if let Some(Value::Array(actions)) = table.get_mut("actions") {
            for action in actions {
                if let Some(Value::Array(resources)) = action.get_mut("indirect_resources") {
                    for r in resources {
                        prefix_name(r, "resource_name", pipeline);
                    }
                }
            }
        }
    }
}

/// Every name a table can be found by: `pipe.ingress.fwd`, `ingress.fwd`
/// and `fwd`.
fn dotted_suffixes(name: &str) -> impl Iterator<Item = &str> {
    std::iter::once(name).chain(name.match_indices('.').map(move |(idx, _)| &name[idx + 1..]))
}

impl BfRtInfo {
    /// Loads the program described by `config`.
    pub fn load(config: &ProgramConfig, driver: &dyn PipeDriver) -> Result<Self> {
        let schemas = config
            .bfrt_config
            .iter()
            .map(read_json)
            .collect::<Result<Vec<Value>>>()?;
        let mut pipelines = Vec::new();
        if !config.is_shared() {
            for pipeline in &config.pipelines {
                pipelines.push(PipelineDocument {
                    name: pipeline.name.clone(),
                    mask: driver.handle_mask(&config.program_name, &pipeline.name)?,
                    context: read_json(&pipeline.context)?,
                });
            }
        }
        let mut info = Self::from_documents(&config.program_name, &schemas, pipelines)?;
        info.pipelines = config.pipelines.clone();
        info.bfrt_files = config.bfrt_config.clone();
        Ok(info)
    }

    /// Builds the model from documents already in memory.  The program
    /// called `$SHARED` only has fixed tables and ignores `pipelines`.
    pub fn from_documents(
        program: &str,
        schemas: &[Value],
        mut pipelines: Vec<PipelineDocument>,
    ) -> Result<Self> {
        let shared = program == crate::config::SHARED_PROGRAM;
        if shared {
            pipelines.clear();
        }
        for p in &mut pipelines {
            Node::from(&p.context).require("tables", "context.json")?;
            prefix_context(&p.name, &mut p.context);
        }

        let mut merger = Merger {
            program,
            entries: BTreeMap::new(),
        };
        for schema in schemas {
            for table in Node::from(schema).require("tables", "bf-rt.json")?.children() {
                merger
                    .entries
                    .entry(table.get("name").as_str().to_string())
                    .or_insert_with(|| Entry::schema_only(table));
            }
        }
        let configure = Regex::new("(.*)(configure)").map_err(|e| Error::invalid(e.to_string()))?;
        for p in &pipelines {
            let root = Node::from(&p.context);
            for table in root.get("tables").children() {
                let entry = merger
                    .entries
                    .entry(table.get("name").as_str().to_string())
                    .or_insert_with(|| Entry::schema_only(Node::missing()));
                entry.context = table;
                entry.pipeline = Some(p.name.as_str());
                entry.mask = p.mask;
            }
            for calc in root.get("dynamic_hash_calculations").children() {
                let name = calc.get("name").as_str();
                if !merger.entries.contains_key(name) {
                    continue;
                }
                let algorithm = configure.replace(name, "${1}algorithm").into_owned();
                for name in [name.to_string(), algorithm] {
                    let entry = merger
                        .entries
                        .entry(name)
                        .or_insert_with(|| Entry::schema_only(Node::missing()));
                    entry.context = calc;
                    entry.pipeline = Some(p.name.as_str());
                    entry.mask = p.mask;
                }
            }
        }

        let mut info = BfRtInfo {
            program: program.to_string(),
            pipelines: pipelines
                .iter()
                .map(|p| P4Pipeline {
                    name: p.name.clone(),
                    context: PathBuf::new(),
                    config: PathBuf::new(),
                    pipe_scope: Vec::new(),
                })
                .collect(),
            ..Default::default()
        };
        for (name, entry) in &merger.entries {
            let parsed = if shared {
                merger.parse_fixed_table(entry)
            } else if entry.schema.exists() && entry.context.exists() {
                merger.parse_table(entry)
            } else if entry.schema.exists() {
                let kind = entry.kind();
                if kind.is_fixed() {
                    merger.parse_fixed_table(entry)
                } else if kind.is_snapshot() {
                    merger.parse_snapshot_table(entry)
                } else if kind == TableKind::Invalid {
                    event!(Level::TRACE, "{name}: unknown table type");
                    continue;
                } else {
                    event!(Level::DEBUG, "{name} was optimized out by the compiler");
                    info.invalid_table_names.insert(name.clone());
                    continue;
                }
            } else {
                continue;
            };
            match parsed {
                Ok(table) => info.insert(table),
                Err(e) => event!(Level::ERROR, "skipping table {name}: {e}"),
            }
        }

        info.set_ghost_handles(&merger);
        info.link();
        info.dependents = refs::dependents(&info.tables);
        info.build_full_names();
        Ok(info)
    }

    fn insert(&mut self, table: TableInfo) {
        if table.handle != 0 {
            if let Some(other) = self.handle_to_id.get(&table.handle) {
                event!(
                    Level::WARN,
                    "{}: handle {:#x} already belongs to table {other}",
                    table.name,
                    table.handle
                );
            } else {
                self.handle_to_id.insert(table.handle, table.id);
            }
        }
        self.by_id.insert(table.id, self.tables.len());
        self.tables.push(table);
    }

    fn index_by_name(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    /// Compiler-generated tables exist only in placement documents.  Those
    /// referencing stateful tables lend them their handle.
    fn set_ghost_handles(&mut self, merger: &Merger) {
        for (name, entry) in &merger.entries {
            if entry.schema.exists() || !entry.context.exists() {
                continue;
            }
            let handle = entry.context.get("handle").as_u32();
            let stateful = entry.context.get(RefCategory::Stateful.as_str());
            if stateful.is_empty() {
                event!(
                    Level::WARN,
                    "{name} exists only in the placement document and is not a ghost table"
                );
                continue;
            }
            for r in stateful.children() {
                let resource = r.get("name").as_str();
                match self.index_by_name(resource) {
                    Some(idx) => {
                        let table = &mut self.tables[idx];
                        table.ghost_handle = Some(handle);
                        table.attributes.insert(TableAttribute::EntryScope);
                    }
                    None => event!(
                        Level::ERROR,
                        "ghost table {name} references unknown table {resource}"
                    ),
                }
            }
        }
    }

    /// Points match tables at their action profile and selector, and
    /// selectors at their action profile.
    fn link(&mut self) {
        let ids: BTreeMap<String, u32> = self.tables.iter().map(|t| (t.name.clone(), t.id)).collect();
        for table in &mut self.tables {
            for r in table.refs(RefCategory::ActionData).to_vec() {
                if let Some(id) = ids.get(&r.name) {
                    table.act_prof_id = Some(*id);
                }
            }
            match table.kind {
                TableKind::Selector => {
                    let bound = table.refs(RefCategory::ActionData).last().map(|r| r.handle);
                    if let Some(id) = bound.and_then(|h| self.handle_to_id.get(&h)) {
                        table.act_prof_id = Some(*id);
                    }
                }
                TableKind::MatchIndirectSelector => {
                    let selector = table.refs(RefCategory::Selection).first().map(|r| r.handle);
                    table.selector_id = selector.and_then(|h| self.handle_to_id.get(&h)).copied();
                }
                _ => (),
            }
        }
    }

    fn build_full_names(&mut self) {
        let mut ambiguous = BTreeSet::new();
        for (idx, table) in self.tables.iter().enumerate() {
            for suffix in dotted_suffixes(&table.name) {
                if self.full_names.contains_key(suffix) {
                    ambiguous.insert(suffix.to_string());
                } else {
                    self.full_names.insert(suffix.to_string(), idx);
                }
            }
        }
        for name in ambiguous {
            self.full_names.remove(&name);
        }
    }

    pub fn program_name(&self) -> &str {
        &self.program
    }

    /// All tables, in name order.
    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    /// Looks a table up by full name or by any unambiguous dotted suffix of
    /// it.
    pub fn table(&self, name: &str) -> Result<&TableInfo> {
        if self.invalid_table_names.contains(name) {
            return Err(Error::not_found(format!(
                "table \"{name}\" (optimized out by the compiler)"
            )));
        }
        self.full_names
            .get(name)
            .map(|idx| &self.tables[*idx])
            .ok_or_else(|| Error::not_found(format!("table \"{name}\"")))
    }

    pub fn table_by_id(&self, id: u32) -> Result<&TableInfo> {
        self.by_id
            .get(&id)
            .map(|idx| &self.tables[*idx])
            .ok_or_else(|| Error::not_found(format!("table id {id}")))
    }

    /// Id of the table owning the (masked) pipe-manager handle.
    pub fn table_id_from_handle(&self, handle: u32) -> Result<u32> {
        self.handle_to_id
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::not_found(format!("table handle {handle:#x}")))
    }

    /// Whether `name` is a schema table the compiler optimized out.
    pub fn is_optimized_out(&self, name: &str) -> bool {
        self.invalid_table_names.contains(name)
    }

    /// Ids of the tables whose entries refer to table `id` indirectly.
    pub fn dependents(&self, id: u32) -> Result<&[u32]> {
        self.dependents
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::not_found(format!("dependents of table id {id}")))
    }

    /// Ids of the tables table `id` depends on.
    pub fn depends_on(&self, id: u32) -> Result<Vec<u32>> {
        Ok(refs::depends_on(self.table_by_id(id)?))
    }

    pub fn pipelines(&self) -> &[P4Pipeline] {
        &self.pipelines
    }

    /// Pipeline names with the pipes each is loaded on.
    pub fn pipeline_scopes(&self) -> Vec<(&str, &[u32])> {
        self.pipelines
            .iter()
            .map(|p| (p.name.as_str(), p.pipe_scope.as_slice()))
            .collect()
    }

    pub fn context_paths(&self) -> Vec<&Path> {
        self.pipelines.iter().map(|p| p.context.as_path()).collect()
    }

    pub fn binary_paths(&self) -> Vec<&Path> {
        self.pipelines.iter().map(|p| p.config.as_path()).collect()
    }

    pub fn bfrt_files(&self) -> &[PathBuf] {
        &self.bfrt_files
    }
}
