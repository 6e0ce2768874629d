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

//! Read-only view over a parsed JSON document.
//!
//! Compiler-generated documents omit nodes freely, so lookups never fail:
//! a lookup of an absent key yields a missing [`Node`], and coercing a
//! missing node yields zero, `false` or the empty string.  Callers that need
//! a node to be present ask for it with [`Node::require`].

use crate::error::{Error, Result};
use serde_json::Value;

/// A possibly-missing position inside a JSON document.
#[derive(Clone, Copy, Debug)]
pub struct Node<'a> {
    value: Option<&'a Value>,
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        Node { value: Some(value) }
    }
}

impl<'a> Node<'a> {
    /// A node that does not exist.
    pub fn missing() -> Self {
        Node { value: None }
    }

    /// The underlying value, if present.
    pub fn value(&self) -> Option<&'a Value> {
        self.value.filter(|v| !v.is_null())
    }

    /// Whether the node is present and not `null`.
    pub fn exists(&self) -> bool {
        self.value().is_some()
    }

    /// Looks up `key` in an object.
    pub fn get(&self, key: &str) -> Node<'a> {
        Node {
            value: self.value().and_then(|v| v.get(key)),
        }
    }

    /// Looks up element `index` of an array.
    pub fn at(&self, index: usize) -> Node<'a> {
        Node {
            value: self.value().and_then(|v| v.get(index)),
        }
    }

    /// Looks up `key`, failing with a structural error naming `document` if
    /// it is absent.
    pub fn require(&self, key: &str, document: &str) -> Result<Node<'a>> {
        let node = self.get(key);
        if node.exists() {
            Ok(node)
        } else {
            Err(Error::structural(document, format!("missing \"{}\" node", key)))
        }
    }

    /// Elements of an array, or values of an object.  Empty otherwise.
    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let (array, object) = match self.value() {
            Some(Value::Array(a)) => (Some(a.iter()), None),
            Some(Value::Object(o)) => (None, Some(o.values())),
            _ => (None, None),
        };
        array
            .into_iter()
            .flatten()
            .chain(object.into_iter().flatten())
            .map(Node::from)
    }

    /// Keys of an object.  Empty otherwise.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        let object = match self.value() {
            Some(Value::Object(o)) => Some(o.keys()),
            _ => None,
        };
        object.into_iter().flatten().map(String::as_str)
    }

    /// Number of elements of an array, or 0.
    pub fn len(&self) -> usize {
        match self.value() {
            Some(Value::Array(a)) => a.len(),
            _ => 0,
        }
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_u64(&self) -> u64 {
        match self.value() {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_i64().map(|i| i as u64))
                .or_else(|| n.as_f64().map(|f| f as u64))
                .unwrap_or(0),
            Some(Value::Bool(b)) => *b as u64,
            _ => 0,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.as_u64() as u32
    }

    pub fn as_usize(&self) -> usize {
        self.as_u64() as usize
    }

    pub fn as_f32(&self) -> f32 {
        match self.value() {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
            _ => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self.value() {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_u64().map_or(false, |n| n != 0),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'a str {
        match self.value() {
            Some(Value::String(s)) => s,
            _ => "",
        }
    }

    /// The string elements of an array, skipping anything else.
    pub fn strings(&self) -> Vec<&'a str> {
        self.children()
            .filter_map(|n| n.value().and_then(Value::as_str))
            .collect()
    }
}

/// Rewrites the string at `obj[key]` as `prefix.<old>`.
pub(crate) fn prefix_name(obj: &mut Value, key: &str, prefix: &str) {
    if let Some(Value::String(s)) = obj.get_mut(key) {
        *s = format!("{}.{}", prefix, s);
    }
}
