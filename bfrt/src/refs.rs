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

//! Cross-table references.
//!
//! References are discovered per table while merging (see the `add_*`
//! methods on [`Merger`]).  Once every table is parsed, [`dependents`]
//! inverts the action-data and selection edges.

use crate::error::{Error, Result};
use crate::json::Node;
use crate::parse::Merger;
use crate::table::{RefCategory, TableInfo, TableKind, TableRef};
use std::collections::BTreeMap;
use tracing::{event, Level};

impl<'a> Merger<'a> {
    /// Records the `*_table_refs` arrays of a placement node.
    pub(crate) fn add_placement_refs(&self, table: &mut TableInfo, context: Node, mask: u32) {
        for category in RefCategory::PLACEMENT {
            for node in context.get(category.as_str()).children() {
                let name = node.get("name").as_str();
                let mut r = TableRef {
                    name: name.to_string(),
                    id: 0,
                    handle: mask | node.get("handle").as_u32(),
                    indirect: false,
                };
                if self.entry(name).is_none() {
                    event!(
                        Level::ERROR,
                        "{}: {category} names unknown table {name}",
                        table.name
                    );
                } else if node.get("how_referenced").as_str() != "direct" {
                    match self.schema_id(name) {
                        Some(id) => {
                            r.id = id;
                            r.indirect = true;
                        }
                        None => event!(
                            Level::ERROR,
                            "{}: indirectly referenced table {name} has no schema entry",
                            table.name
                        ),
                    }
                } else {
                    r.id = self.schema_id(name).unwrap_or(0);
                }
                table.refs.insert(category, r);
            }
        }
    }

    /// A selector's action profile is only named by handle.
    pub(crate) fn add_selector_ref(&self, table: &mut TableInfo, context: Node, mask: u32) -> Result<()> {
        let bound = context.get("bound_to_action_data_table_handle").as_u32();
        let (name, _) = self
            .entries
            .iter()
            .find(|(_, e)| e.context.exists() && e.context.get("handle").as_u32() == bound)
            .ok_or_else(|| {
                Error::structural(
                    &table.name,
                    format!("no action profile has handle {bound:#x}"),
                )
            })?;
        let id = self.schema_id(name).ok_or_else(|| {
            Error::structural(&table.name, format!("action profile {name} has no schema entry"))
        })?;
        table.refs.insert(
            RefCategory::ActionData,
            TableRef {
                name: name.clone(),
                id,
                handle: mask | bound,
                indirect: true,
            },
        );
        Ok(())
    }

    /// An action profile is placed through the indirect match table that
    /// uses it.  Adopts that table's resource references and returns its
    /// placement actions.
    pub(crate) fn adopt_match_table_refs(&self, table: &mut TableInfo, mask: u32) -> Option<Node<'a>> {
        let user = self.entries.values().find(|e| {
            matches!(
                e.kind(),
                TableKind::MatchIndirect | TableKind::MatchIndirectSelector
            ) && e.schema.exists()
                && e.context.exists()
                && e.context
                    .get(RefCategory::ActionData.as_str())
                    .at(0)
                    .get("name")
                    .as_str()
                    == table.name
        })?;
        for category in [RefCategory::Stateful, RefCategory::Statistics, RefCategory::Meter] {
            let node = user.context.get(category.as_str()).at(0);
            if !node.exists() {
                continue;
            }
            let name = node.get("name").as_str();
            table.refs.insert(
                category,
                TableRef {
                    name: name.to_string(),
                    id: self.schema_id(name).unwrap_or(0),
                    handle: mask | node.get("handle").as_u32(),
                    indirect: true,
                },
            );
        }
        Some(user.context.get("actions"))
    }

    /// Scheduling dependencies from the schema's `depends_on` ids.
    pub(crate) fn add_depends_on(&self, table: &mut TableInfo, schema: Node) {
        for id in schema.get("depends_on").children().map(|n| n.as_u32()) {
            let target = self
                .entries
                .iter()
                .filter(|(_, e)| e.schema.exists() && e.schema.get("id").as_u32() == id)
                .last();
            let (name, entry) = match target {
                Some(t) => t,
                None => {
                    event!(Level::TRACE, "{}: depends on unknown table id {id}", table.name);
                    break;
                }
            };
            if !entry.context.exists() {
                continue;
            }
            table.refs.insert(
                RefCategory::Other,
                TableRef {
                    name: name.clone(),
                    id,
                    handle: entry.mask | entry.context.get("handle").as_u32(),
                    indirect: true,
                },
            );
        }
    }
}

/// Ids of the tables `table` depends on: its indirect action-data, selection
/// and scheduling references.
pub fn depends_on(table: &TableInfo) -> Vec<u32> {
    [RefCategory::ActionData, RefCategory::Selection, RefCategory::Other]
        .into_iter()
        .flat_map(|c| table.refs(c))
        .filter(|r| r.indirect)
        .map(|r| r.id)
        .collect()
}

/// For every table, the ids of the tables whose entries reference it
/// indirectly through action data or selection.
pub(crate) fn dependents<'t>(tables: impl IntoIterator<Item = &'t TableInfo>) -> BTreeMap<u32, Vec<u32>> {
    let tables: Vec<&TableInfo> = tables.into_iter().collect();
    let mut edges: BTreeMap<u32, Vec<u32>> = tables.iter().map(|t| (t.id, Vec::new())).collect();
    for t in &tables {
        for r in [RefCategory::ActionData, RefCategory::Selection]
            .into_iter()
            .flat_map(|c| t.refs(c))
            .filter(|r| r.indirect)
        {
            edges.entry(r.id).or_default().push(t.id);
        }
    }
    edges
}
