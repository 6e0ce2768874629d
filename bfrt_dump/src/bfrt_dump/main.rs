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

use anyhow::{anyhow, Context, Result};

use bfrt::{BfRtInfo, DeviceConfig, StaticPipeDriver};

use bfrt_dump::{dump, parse_mask, DumpOptions};

use clap::Parser;

use std::path::PathBuf;

use tracing::{event, Level};

/// Prints the BfRt table model of a P4 program.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Device configuration file listing the programs and their pipelines.
    config: PathBuf,

    /// Table to print (all tables, by default).
    table: Option<String>,

    /// Device whose program to load.
    #[clap(long, default_value = "0")]
    device: u32,

    /// Program to load (the device's first program, by default).
    #[clap(long)]
    program: Option<String>,

    /// Handle mask of a pipeline, as PIPELINE=HEX.  May be repeated.
    #[clap(long, parse(try_from_str = parse_mask))]
    mask: Vec<(String, u32)>,

    /// Also print the dependency edges between tables.
    #[clap(long)]
    edges: bool,

    /// Log more (-v info, -vv debug, -vvv trace).
    #[clap(short, long, parse(from_occurrences))]
    verbose: u64,
}

fn log_level(verbose: u64) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level(args.verbose))
        .init();

    if let Err(e) = run(&args) {
        event!(Level::ERROR, "{:#}", e);
        Err(e)?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let devices = DeviceConfig::from_file(&args.config)
        .with_context(|| format!("could not load {}", args.config.display()))?;
    let program = match args.program {
        Some(ref name) => devices.program(args.device, name)?,
        None => devices
            .device(args.device)?
            .p4_programs
            .first()
            .ok_or_else(|| anyhow!("device {} has no programs", args.device))?,
    };

    let mut driver = StaticPipeDriver::new();
    for (pipeline, mask) in &args.mask {
        driver.set_mask(&program.program_name, pipeline, *mask);
    }
    let info = BfRtInfo::load(program, &driver)
        .with_context(|| format!("could not load program {}", program.program_name))?;
    event!(Level::INFO, "loaded {} tables of {}", info.tables().len(), info.program_name());

    let options = DumpOptions {
        table: args.table.clone(),
        edges: args.edges,
    };
    let stdout = std::io::stdout();
    dump(&info, &mut stdout.lock(), &options)
}
