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

//! Table layer for a P4 runtime.
//!
//! The compiler describes a program twice: a schema document (`bf-rt.json`)
//! gives table, field and action names, ids and types, and one placement
//! document (`context.json`) per pipeline gives hardware handles, key
//! layouts and resource references.  [`BfRtInfo`] merges the two into a
//! table model; [`TableKey`] and [`TableData`] pack entries for the driver
//! according to that model.

mod codec;
mod config;
mod data;
mod driver;
mod error;
mod field;
mod info;
mod json;
mod key;
mod pack;
mod parse;
mod refs;
mod table;
mod types;

pub use codec::{decode_data, decode_key, encode_data, encode_key, KeyValue, Scalar};
pub use config::{Device, DeviceConfig, P4Pipeline, ProgramConfig, SHARED_PROGRAM};
pub use data::{
    CounterSpec, FieldValue, HitState, Member, MeterSpec, MeterUnit, RegisterSpec, ResourceSpec,
    TableData,
};
pub use driver::{PipeDriver, StaticPipeDriver};
pub use error::{Error, Result};
pub use field::{
    Annotation, DataFieldInfo, DataFieldType, FieldShape, KeyFieldInfo, KeyFieldType,
    MATCH_PRIORITY_FIELD, UNPACKED_OFFSET,
};
pub use info::{BfRtInfo, PipelineDocument};
pub use json::Node;
pub use key::{MatchSpec, TableKey};
pub use pack::{byte_len, lpm_mask, lpm_mask_bytes, prefix_len, Slice};
pub use table::{
    ActionInfo, KeySize, RefCategory, TableApi, TableAttribute, TableInfo, TableKind,
    TableOperation, TableRef,
};
pub use types::{parse_type, DataType, TypeInfo, INVALID_STRING_DEFAULT};
