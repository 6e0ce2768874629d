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

//! Match keys.
//!
//! A [`TableKey`] holds the packed key and mask buffers the pipe driver
//! consumes, plus the two pseudo fields (`$MATCH_PRIORITY` and the ATCAM
//! partition index) that travel beside them.  Every setter validates its
//! arguments before touching either buffer.

use crate::error::{zeroed, Error, Result};
use crate::field::{KeyFieldInfo, KeyFieldType};
use crate::pack::{
    check_bytes, check_u64_form, check_value, from_network, lpm_mask, lpm_mask_bytes, prefix_len,
    read_at, to_network, Slice,
};
use crate::table::TableInfo;

/// Match specification in the layout the pipe driver expects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchSpec {
    pub key: Vec<u8>,
    pub mask: Vec<u8>,
    pub num_valid_match_bytes: usize,
    pub num_valid_match_bits: usize,
    pub priority: u32,
    pub partition_index: u32,
}

/// A key for one table under construction.
#[derive(Clone, Debug)]
pub struct TableKey<'a> {
    table: &'a TableInfo,
    key: Vec<u8>,
    mask: Vec<u8>,
    priority: u32,
    partition_index: u32,
}

impl<'a> TableKey<'a> {
    /// Allocates zeroed buffers sized for `table`'s key.
    pub fn new(table: &'a TableInfo) -> Result<Self> {
        let size = table.key_size.bytes;
        Ok(TableKey {
            table,
            key: zeroed(size)?,
            mask: zeroed(size)?,
            priority: 0,
            partition_index: 0,
        })
    }

    /// Rebuilds a key from a spec returned by the driver.
    pub fn from_match_spec(table: &'a TableInfo, spec: &MatchSpec) -> Result<Self> {
        let mut key = TableKey::new(table)?;
        if spec.key.len() != key.key.len() || spec.mask.len() != key.mask.len() {
            return Err(Error::invalid(format!(
                "match spec of {}/{} bytes for {} whose key is {} bytes",
                spec.key.len(),
                spec.mask.len(),
                table.name,
                key.key.len()
            )));
        }
        key.key.copy_from_slice(&spec.key);
        key.mask.copy_from_slice(&spec.mask);
        key.priority = spec.priority;
        key.partition_index = spec.partition_index;
        Ok(key)
    }

    pub fn table(&self) -> &'a TableInfo {
        self.table
    }

    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mask_bytes(&self) -> &[u8] {
        &self.mask
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn partition_index(&self) -> u32 {
        self.partition_index
    }

    /// Clears both buffers and the pseudo fields.
    pub fn reset(&mut self) {
        self.key.iter_mut().for_each(|b| *b = 0);
        self.mask.iter_mut().for_each(|b| *b = 0);
        self.priority = 0;
        self.partition_index = 0;
    }

    pub fn match_spec(&self) -> MatchSpec {
        MatchSpec {
            key: self.key.clone(),
            mask: self.mask.clone(),
            num_valid_match_bytes: self.table.key_size.bytes,
            num_valid_match_bits: self.table.key_size.bits,
            priority: self.priority,
            partition_index: self.partition_index,
        }
    }

    fn field(&self, id: u32, kind: KeyFieldType) -> Result<&'a KeyFieldInfo> {
        let field = self.table.key_field(id)?;
        if field.match_kind != kind {
            return Err(Error::invalid(format!(
                "key field {} of {} is {}, not {}",
                field.name, self.table.name, field.match_kind, kind
            )));
        }
        Ok(field)
    }

    /// Sets a pseudo field, returning false for fields packed into the
    /// buffers.
    fn set_pseudo(&mut self, field: &KeyFieldInfo, value: u64) -> bool {
        if field.is_priority() {
            self.priority = value as u32;
        } else if field.is_partition {
            self.partition_index = value as u32;
        } else {
            return false;
        }
        true
    }

    fn pseudo(&self, field: &KeyFieldInfo) -> Option<u64> {
        if field.is_priority() {
            Some(self.priority as u64)
        } else if field.is_partition {
            Some(self.partition_index as u64)
        } else {
            None
        }
    }

    /// Key and mask regions `offset..offset + len`.
    fn regions(&mut self, offset: usize, len: usize) -> Result<(&mut [u8], &mut [u8])> {
        let end = offset + len;
        if end > self.key.len() || end > self.mask.len() {
            return Err(Error::invalid(format!(
                "key field at bytes {}..{} lies outside the {} byte key of {}",
                offset,
                end,
                self.key.len(),
                self.table.name
            )));
        }
        Ok((&mut self.key[offset..end], &mut self.mask[offset..end]))
    }

    /// Writes a field whose arguments have already been validated.
    ///
    /// Without `mask` the field matches exactly.  With `do_masking` value
    /// bits are ANDed with their mask bits.
    fn write(
        &mut self,
        field: &KeyFieldInfo,
        value: &[u8],
        mask: Option<&[u8]>,
        do_masking: bool,
    ) -> Result<()> {
        let ternary = self.table.is_ternary;
        if field.is_field_slice {
            let slice = Slice {
                start_bit: field.start_bit,
                width: field.width,
                parent_size: field.parent_field_full_byte_size,
            };
            let (key, key_mask) = self.regions(field.offset, slice.parent_size)?;
            slice.pack(value, mask, do_masking, key, key_mask)?;
            if mask.is_none() && !ternary {
                key_mask.iter_mut().for_each(|b| *b = 0xff);
            }
            return Ok(());
        }

        let (key, key_mask) = self.regions(field.offset, value.len())?;
        match mask {
            Some(mask) => {
                for (i, (k, m)) in key.iter_mut().zip(key_mask.iter_mut()).enumerate() {
                    *k = if do_masking { value[i] & mask[i] } else { value[i] };
                    *m = mask[i];
                }
            }
            None => {
                key.copy_from_slice(value);
                key_mask.iter_mut().for_each(|b| *b = 0xff);
                let top = field.width % 8;
                if ternary && top != 0 {
                    key_mask[0] = (1u8 << top) - 1;
                }
            }
        }
        Ok(())
    }

    /// Reads back the value and mask bytes of a packed field.
    fn read(&self, field: &KeyFieldInfo) -> Result<(Vec<u8>, Vec<u8>)> {
        let size = field.byte_size();
        if field.is_field_slice {
            let slice = Slice {
                start_bit: field.start_bit,
                width: field.width,
                parent_size: field.parent_field_full_byte_size,
            };
            let key = read_at(&self.key, field.offset, slice.parent_size)?;
            let mask = read_at(&self.mask, field.offset, slice.parent_size)?;
            return Ok((slice.unpack(key, size)?, slice.unpack(mask, size)?));
        }
        Ok((
            read_at(&self.key, field.offset, size)?.to_vec(),
            read_at(&self.mask, field.offset, size)?.to_vec(),
        ))
    }

    pub fn set_exact(&mut self, id: u32, value: u64) -> Result<()> {
        let field = self.field(id, KeyFieldType::Exact)?;
        check_u64_form(field.width)?;
        check_value(value, field.width)?;
        if self.set_pseudo(field, value) {
            return Ok(());
        }
        self.write(field, &to_network(value, field.byte_size()), None, false)
    }

    pub fn set_exact_bytes(&mut self, id: u32, value: &[u8]) -> Result<()> {
        let field = self.field(id, KeyFieldType::Exact)?;
        check_bytes(value, field.width)?;
        if self.set_pseudo(field, from_network(value)) {
            return Ok(());
        }
        self.write(field, value, None, false)
    }

    pub fn set_ternary(&mut self, id: u32, value: u64, mask: u64) -> Result<()> {
        let field = self.field(id, KeyFieldType::Ternary)?;
        check_u64_form(field.width)?;
        check_value(value, field.width)?;
        check_value(mask, field.width)?;
        let size = field.byte_size();
        self.write(
            field,
            &to_network(value, size),
            Some(&to_network(mask, size)),
            true,
        )
    }

    pub fn set_ternary_bytes(&mut self, id: u32, value: &[u8], mask: &[u8]) -> Result<()> {
        let field = self.field(id, KeyFieldType::Ternary)?;
        check_bytes(value, field.width)?;
        check_bytes(mask, field.width)?;
        self.write(field, value, Some(mask), true)
    }

    /// The range start is carried in the key buffer and the end in the mask
    /// buffer.
    pub fn set_range(&mut self, id: u32, start: u64, end: u64) -> Result<()> {
        let field = self.field(id, KeyFieldType::Range)?;
        check_u64_form(field.width)?;
        check_value(start, field.width)?;
        check_value(end, field.width)?;
        let size = field.byte_size();
        self.write(
            field,
            &to_network(start, size),
            Some(&to_network(end, size)),
            false,
        )
    }

    pub fn set_range_bytes(&mut self, id: u32, start: &[u8], end: &[u8]) -> Result<()> {
        let field = self.field(id, KeyFieldType::Range)?;
        check_bytes(start, field.width)?;
        check_bytes(end, field.width)?;
        self.write(field, start, Some(end), false)
    }

    /// Sets a prefix.  The entry priority becomes the number of wildcard
    /// bits, so longer prefixes get numerically lower priorities.
    pub fn set_lpm(&mut self, id: u32, value: u64, prefix_len: u16) -> Result<()> {
        let field = self.field(id, KeyFieldType::Lpm)?;
        check_u64_form(field.width)?;
        check_value(value, field.width)?;
        let p = check_prefix(field, prefix_len)?;
        let size = field.byte_size();
        self.write(
            field,
            &to_network(value, size),
            Some(&to_network(lpm_mask(p, field.width), size)),
            true,
        )?;
        self.priority = (field.width - p) as u32;
        Ok(())
    }

    pub fn set_lpm_bytes(&mut self, id: u32, value: &[u8], prefix_len: u16) -> Result<()> {
        let field = self.field(id, KeyFieldType::Lpm)?;
        check_bytes(value, field.width)?;
        let p = check_prefix(field, prefix_len)?;
        self.write(field, value, Some(&lpm_mask_bytes(p, field.width)), true)?;
        self.priority = (field.width - p) as u32;
        Ok(())
    }

    /// An invalid optional field is a wildcard: its mask is all zero.
    pub fn set_optional(&mut self, id: u32, value: u64, is_valid: bool) -> Result<()> {
        let field = self.field(id, KeyFieldType::Optional)?;
        check_u64_form(field.width)?;
        check_value(value, field.width)?;
        let size = field.byte_size();
        self.write(
            field,
            &to_network(value, size),
            Some(&optional_mask(size, is_valid)),
            false,
        )
    }

    pub fn set_optional_bytes(&mut self, id: u32, value: &[u8], is_valid: bool) -> Result<()> {
        let field = self.field(id, KeyFieldType::Optional)?;
        check_bytes(value, field.width)?;
        self.write(
            field,
            value,
            Some(&optional_mask(value.len(), is_valid)),
            false,
        )
    }

    pub fn exact(&self, id: u32) -> Result<u64> {
        let field = self.field(id, KeyFieldType::Exact)?;
        check_u64_form(field.width)?;
        if let Some(v) = self.pseudo(field) {
            return Ok(v);
        }
        Ok(from_network(&self.read(field)?.0))
    }

    pub fn exact_bytes(&self, id: u32) -> Result<Vec<u8>> {
        let field = self.field(id, KeyFieldType::Exact)?;
        if let Some(v) = self.pseudo(field) {
            return Ok(to_network(v, field.byte_size()));
        }
        Ok(self.read(field)?.0)
    }

    /// Value and mask.
    pub fn ternary(&self, id: u32) -> Result<(u64, u64)> {
        let field = self.field(id, KeyFieldType::Ternary)?;
        check_u64_form(field.width)?;
        let (value, mask) = self.read(field)?;
        Ok((from_network(&value), from_network(&mask)))
    }

    pub fn ternary_bytes(&self, id: u32) -> Result<(Vec<u8>, Vec<u8>)> {
        let field = self.field(id, KeyFieldType::Ternary)?;
        self.read(field)
    }

    /// Start and end.
    pub fn range(&self, id: u32) -> Result<(u64, u64)> {
        let field = self.field(id, KeyFieldType::Range)?;
        check_u64_form(field.width)?;
        let (start, end) = self.read(field)?;
        Ok((from_network(&start), from_network(&end)))
    }

    pub fn range_bytes(&self, id: u32) -> Result<(Vec<u8>, Vec<u8>)> {
        let field = self.field(id, KeyFieldType::Range)?;
        self.read(field)
    }

    /// Value and prefix length.
    pub fn lpm(&self, id: u32) -> Result<(u64, u16)> {
        let field = self.field(id, KeyFieldType::Lpm)?;
        check_u64_form(field.width)?;
        let (value, mask) = self.read(field)?;
        Ok((from_network(&value), prefix_len(&mask)))
    }

    pub fn lpm_bytes(&self, id: u32) -> Result<(Vec<u8>, u16)> {
        let field = self.field(id, KeyFieldType::Lpm)?;
        let (value, mask) = self.read(field)?;
        Ok((value, prefix_len(&mask)))
    }

    /// Value and validity.
    pub fn optional(&self, id: u32) -> Result<(u64, bool)> {
        let field = self.field(id, KeyFieldType::Optional)?;
        check_u64_form(field.width)?;
        let (value, mask) = self.read(field)?;
        Ok((from_network(&value), mask.iter().any(|b| *b != 0)))
    }

    pub fn optional_bytes(&self, id: u32) -> Result<(Vec<u8>, bool)> {
        let field = self.field(id, KeyFieldType::Optional)?;
        let (value, mask) = self.read(field)?;
        let valid = mask.iter().any(|b| *b != 0);
        Ok((value, valid))
    }
}

fn check_prefix(field: &KeyFieldInfo, prefix_len: u16) -> Result<usize> {
    let p = prefix_len as usize;
    if p > field.width {
        return Err(Error::invalid(format!(
            "prefix length {} exceeds the {} bit width of {}",
            p, field.width, field.name
        )));
    }
    Ok(p)
}

fn optional_mask(size: usize, is_valid: bool) -> Vec<u8> {
    vec![if is_valid { 0xff } else { 0 }; size]
}
