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
//! Text renderings of a loaded BfRt program, as printed by `bfrt-dump`.

use anyhow::{anyhow, Context, Result};

use bfrt::{BfRtInfo, TableInfo};

use itertools::Itertools;

use std::collections::BTreeMap;
use std::io::Write;

/// Parses a `PIPELINE=MASK` argument.  The mask is hexadecimal, with or
/// without a leading `0x`.
pub fn parse_mask(s: &str) -> Result<(String, u32)> {
    let (pipeline, mask) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("{}: expected PIPELINE=MASK", s))?;
    if pipeline.is_empty() {
        return Err(anyhow!("{}: missing pipeline name", s));
    }
    let digits = mask.trim_start_matches("0x").trim_start_matches("0X");
    let mask = u32::from_str_radix(digits, 16)
        .with_context(|| format!("{}: mask is not a 32-bit hex number", s))?;
    Ok((pipeline.to_string(), mask))
}

/// What to print.
#[derive(Clone, Debug, Default)]
pub struct DumpOptions {
    /// Print only this table (full name or unambiguous suffix).
    pub table: Option<String>,
    /// Print the dependency edges between tables.
    pub edges: bool,
}

/// One line per pipeline followed by a count of tables per kind.
pub fn summary(info: &BfRtInfo) -> String {
    let mut s = format!("program {}: {} tables", info.program_name(), info.tables().len());
    for file in info.bfrt_files() {
        s += &format!("\nschema {}", file.display());
    }
    for pipeline in info.pipelines() {
        s += &format!(
            "\npipeline {} pipes [{}] context {} config {}",
            pipeline.name,
            pipeline.pipe_scope.iter().join(", "),
            pipeline.context.display(),
            pipeline.config.display()
        );
    }
    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    for table in info.tables() {
        *kinds.entry(table.kind.to_string()).or_default() += 1;
    }
    for (kind, count) in kinds {
        s += &format!("\n\t{}: {}", kind, count);
    }
    s
}

fn names(info: &BfRtInfo, ids: &[u32]) -> String {
    ids.iter()
        .map(|id| match info.table_by_id(*id) {
            Ok(t) => t.name.clone(),
            Err(_) => format!("{:#x}", id),
        })
        .join(", ")
}

/// The table's layout followed by the tables on either side of its
/// dependency edges.
pub fn table(info: &BfRtInfo, t: &TableInfo) -> Result<String> {
    let mut s = t.to_string();
    let depends_on = info.depends_on(t.id)?;
    if !depends_on.is_empty() {
        s += &format!("\n\tdepends on: {}", names(info, &depends_on));
    }
    let dependents = info.dependents(t.id)?;
    if !dependents.is_empty() {
        s += &format!("\n\tdependents: {}", names(info, dependents));
    }
    Ok(s)
}

/// `(table, dependency)` name pairs, one for every table an entry of
/// `table` can refer to indirectly.
pub fn dependency_edges(info: &BfRtInfo) -> Result<Vec<(String, String)>> {
    let mut edges = Vec::new();
    for t in info.tables() {
        for id in info.depends_on(t.id)? {
            let dependency = info.table_by_id(id)?;
            edges.push((t.name.clone(), dependency.name.clone()));
        }
    }
    Ok(edges)
}

/// Writes the rendering selected by `options` to `out`.
pub fn dump<W: Write>(info: &BfRtInfo, out: &mut W, options: &DumpOptions) -> Result<()> {
    if let Some(ref name) = options.table {
        let t = info.table(name).with_context(|| format!("program {}", info.program_name()))?;
        writeln!(out, "{}", table(info, t)?)?;
    } else {
        writeln!(out, "{}", summary(info))?;
        for t in info.tables() {
            writeln!(out, "{}", table(info, t)?)?;
        }
    }
    if options.edges {
        for (from, to) in dependency_edges(info)? {
            writeln!(out, "{} -> {}", from, to)?;
        }
    }
    Ok(())
}
