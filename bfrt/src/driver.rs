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

//! Seam to the pipe manager.

use crate::error::Result;
use std::collections::HashMap;

/// What loading needs from the pipe manager.
pub trait PipeDriver {
    /// Mask OR'd into every handle of `pipeline`'s placement document, so
    /// that handles stay unique across the programs sharing a device.
    fn handle_mask(&self, program: &str, pipeline: &str) -> Result<u32>;
}

/// A [`PipeDriver`] answering from a fixed map.  Pipelines without an entry
/// get mask 0.
#[derive(Clone, Debug, Default)]
pub struct StaticPipeDriver {
    masks: HashMap<(String, String), u32>,
}

impl StaticPipeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mask(mut self, program: &str, pipeline: &str, mask: u32) -> Self {
        self.set_mask(program, pipeline, mask);
        self
    }

    pub fn set_mask(&mut self, program: &str, pipeline: &str, mask: u32) {
        self.masks
            .insert((program.to_string(), pipeline.to_string()), mask);
    }
}

impl PipeDriver for StaticPipeDriver {
    fn handle_mask(&self, program: &str, pipeline: &str) -> Result<u32> {
        Ok(self
            .masks
            .get(&(program.to_string(), pipeline.to_string()))
            .copied()
            .unwrap_or(0))
    }
}
