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

//! Errors produced while loading the table model or packing entries.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from this crate.
///
/// `NotFound` and `InvalidArg` are local to a single lookup or pack call and
/// never leave partial state behind.  `Structural` and `NoResources` abort
/// loading a program.
#[derive(Error, Debug)]
pub enum Error {
    /// A table, field, action or reference could not be located.
    #[error("{0} not found")]
    NotFound(String),

    /// A caller-supplied value or buffer does not fit the field.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The operation is not available for this field or table.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A node that loading cannot proceed without is absent or malformed.
    #[error("{document}: {message}")]
    Structural {
        /// Document (or table) in which the problem was found.
        document: String,
        /// What was wrong.
        message: String,
    },

    /// A buffer could not be allocated.
    #[error("unable to allocate {0} bytes")]
    NoResources(usize),

    /// A document could not be read.
    #[error("{path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A document is not valid JSON.
    #[error("{path}: {source}")]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Error::InvalidArg(what.into())
    }

    pub(crate) fn structural(document: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Structural {
            document: document.into(),
            message: message.into(),
        }
    }
}

/// Allocates a zeroed buffer, reporting failure instead of aborting.
pub(crate) fn zeroed(len: usize) -> Result<Vec<u8>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::NoResources(len))?;
    v.resize(len, 0);
    Ok(v)
}
