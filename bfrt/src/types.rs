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

//! Field type resolution.

use crate::json::Node;
use std::fmt::{self, Display};

/// Semantic value kind of a key or data field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// Unsigned integer of at most 64 bits.
    Uint64,
    /// Network-order byte array of arbitrary width.
    ByteStream,
    Bool,
    Float,
    /// Enumerated string with a choice list.
    String,
    /// Repeated 8/16/32-bit integers.
    IntArr,
    BoolArr,
    StringArr,
    /// Composite of nested data fields.
    Container,
    Unknown,
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Uint64 => "uint64",
            DataType::ByteStream => "bytes",
            DataType::Bool => "bool",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::IntArr => "int[]",
            DataType::BoolArr => "bool[]",
            DataType::StringArr => "string[]",
            DataType::Container => "container",
            DataType::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Result of interpreting a field's `type` node.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeInfo {
    pub data_type: DataType,
    /// Width in bits.  Zero for strings, floats and containers.
    pub width: usize,
    /// Integer default.  Only the low 64 bits of a default are kept.
    pub default_value: u64,
    pub default_fl_value: f32,
    pub default_str_value: String,
    pub choices: Vec<String>,
}

/// Default for string fields that declare none.
pub const INVALID_STRING_DEFAULT: &str = "INVALID";

/// Interprets the `type` of a key or data field node.
///
/// `node` is the field itself, not its `type` child: the `repeated` and
/// `container` markers live beside `type`.
pub fn parse_type(node: Node) -> TypeInfo {
    let ty = node.get("type");
    let repeated = node.get("repeated").as_bool();
    let default = ty.get("default_value");

    let mut info = TypeInfo {
        data_type: DataType::Unknown,
        width: 0,
        default_value: default.as_u64(),
        default_fl_value: 0.0,
        default_str_value: String::new(),
        choices: Vec::new(),
    };

    match ty.get("type").as_str() {
        "bytes" => {
            info.width = ty.get("width").as_usize();
            info.data_type = DataType::ByteStream;
        }
        "uint64" => (info.width, info.data_type) = (64, DataType::Uint64),
        "uint32" => (info.width, info.data_type) = (32, DataType::Uint64),
        "uint16" => (info.width, info.data_type) = (16, DataType::Uint64),
        "uint8" => (info.width, info.data_type) = (8, DataType::Uint64),
        "bool" => (info.width, info.data_type) = (1, DataType::Bool),
        "float" => {
            info.data_type = DataType::Float;
            info.default_fl_value = default.as_f32();
        }
        "string" => {
            info.data_type = if repeated {
                DataType::StringArr
            } else {
                DataType::String
            };
            info.choices = ty.get("choices").strings().into_iter().map(String::from).collect();
            info.default_str_value = if default.exists() {
                default.as_str().to_string()
            } else {
                INVALID_STRING_DEFAULT.to_string()
            };
        }
        _ if node.get("container").exists() => info.data_type = DataType::Container,
        _ => (),
    }

    if repeated {
        match info.width {
            8 | 16 | 32 => info.data_type = DataType::IntArr,
            1 => info.data_type = DataType::BoolArr,
            _ => (),
        }
    }
    info
}
