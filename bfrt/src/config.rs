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

//! Program configuration.
//!
//! A device configuration file lists, per device, the P4 programs loaded on
//! it:
//!
//! ```json
//! {"p4_devices": [{"device-id": 0, "p4_programs": [{
//!     "program-name": "tna_exact_match",
//!     "bfrt-config": "tna_exact_match/bf-rt.json",
//!     "p4_pipelines": [{
//!         "p4_pipeline_name": "pipe",
//!         "context": "tna_exact_match/pipe/context.json",
//!         "config": "tna_exact_match/pipe/tofino.bin",
//!         "pipe_scope": [0, 1, 2, 3]
//!     }]
//! }]}]}
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the program whose schema holds device-wide fixed tables.
pub const SHARED_PROGRAM: &str = "$SHARED";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct P4Pipeline {
    #[serde(rename = "p4_pipeline_name")]
    pub name: String,
    /// Placement document.
    pub context: PathBuf,
    /// Binary configuration.
    pub config: PathBuf,
    /// Hardware pipes the pipeline is loaded on.
    #[serde(default)]
    pub pipe_scope: Vec<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProgramConfig {
    #[serde(rename = "program-name")]
    pub program_name: String,
    /// Schema documents.
    #[serde(rename = "bfrt-config", deserialize_with = "one_or_many")]
    pub bfrt_config: Vec<PathBuf>,
    #[serde(rename = "p4_pipelines", default)]
    pub pipelines: Vec<P4Pipeline>,
}

impl ProgramConfig {
    /// The program holding fixed tables only.
    pub fn shared(bfrt_config: Vec<PathBuf>) -> Self {
        ProgramConfig {
            program_name: SHARED_PROGRAM.to_string(),
            bfrt_config,
            pipelines: Vec::new(),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.program_name == SHARED_PROGRAM
    }

    fn resolve(&mut self, base: &Path) {
        for path in &mut self.bfrt_config {
            *path = base.join(&*path);
        }
        for pipeline in &mut self.pipelines {
            pipeline.context = base.join(&pipeline.context);
            pipeline.config = base.join(&pipeline.config);
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Device {
    #[serde(rename = "device-id")]
    pub device_id: u32,
    #[serde(default)]
    pub p4_programs: Vec<ProgramConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    pub p4_devices: Vec<Device>,
}

impl DeviceConfig {
    /// Reads a device configuration.  Relative paths in it are taken
    /// relative to the directory holding `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config: DeviceConfig = read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for device in &mut config.p4_devices {
            for program in &mut device.p4_programs {
                program.resolve(base);
            }
        }
        Ok(config)
    }

    pub fn device(&self, device_id: u32) -> Result<&Device> {
        self.p4_devices
            .iter()
            .find(|d| d.device_id == device_id)
            .ok_or_else(|| Error::not_found(format!("device {device_id}")))
    }

    pub fn program(&self, device_id: u32, name: &str) -> Result<&ProgramConfig> {
        self.device(device_id)?
            .p4_programs
            .iter()
            .find(|p| p.program_name == name)
            .ok_or_else(|| Error::not_found(format!("program {name} on device {device_id}")))
    }
}

/// Reads and deserializes a JSON file.
pub(crate) fn read_json<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}
