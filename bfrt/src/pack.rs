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

//! Bit-level packing of field values into network-order buffers.
//!
//! Buffers are big-endian throughout.  Bit `i` of a field that occupies
//! `size` bytes lives in byte `size - 1 - i / 8` at bit position `i % 8`.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Bytes needed for `width` bits.
pub fn byte_len(width: usize) -> usize {
    (width + 7) / 8
}

/// Checks that `value` fits in `width` bits.
pub fn check_value(value: u64, width: usize) -> Result<()> {
    if width < 64 && value > (1u64 << width) - 1 {
        return Err(Error::invalid(format!(
            "value {} exceeds the {} bit field width",
            value, width
        )));
    }
    Ok(())
}

/// Checks that a field is narrow enough for the 64-bit value form.
pub fn check_u64_form(width: usize) -> Result<()> {
    if width > 64 {
        return Err(Error::NotSupported(format!(
            "{} bit field needs the byte array form",
            width
        )));
    }
    Ok(())
}

/// Checks that `bytes` is exactly as long as a `width` bit field and that no
/// bit above `width` is set.
pub fn check_bytes(bytes: &[u8], width: usize) -> Result<()> {
    let size = byte_len(width);
    if bytes.len() != size {
        return Err(Error::invalid(format!(
            "array of {} bytes for a field of {} bytes",
            bytes.len(),
            size
        )));
    }
    let shift = width % 8;
    if shift != 0 && bytes[0] >> shift != 0 {
        return Err(Error::invalid(format!(
            "value exceeds the {} bit field width",
            width
        )));
    }
    Ok(())
}

/// Encodes `value` in network order, truncated to `size` bytes.
pub fn to_network(value: u64, size: usize) -> Vec<u8> {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);
    let size = size.min(8);
    buf[8 - size..].to_vec()
}

/// Decodes a network-order value of at most 8 bytes.  Longer inputs keep
/// their low 8 bytes.
pub fn from_network(bytes: &[u8]) -> u64 {
    let tail = &bytes[bytes.len().saturating_sub(8)..];
    if tail.is_empty() {
        0
    } else {
        BigEndian::read_uint(tail, tail.len())
    }
}

/// Mask of `prefix_len` leading ones in a `width` bit field.
pub fn lpm_mask(prefix_len: usize, width: usize) -> u64 {
    if prefix_len == 0 {
        0
    } else {
        (u64::MAX >> (64 - prefix_len)) << (width - prefix_len)
    }
}

/// Byte array form of [`lpm_mask`] for fields of any width.
pub fn lpm_mask_bytes(prefix_len: usize, width: usize) -> Vec<u8> {
    let mut mask = vec![0xffu8; byte_len(width)];
    let flip = width - prefix_len;
    let (bytes_flip, bits_flip) = (flip / 8, flip % 8);
    let len = mask.len();
    for b in mask.iter_mut().rev().take(bytes_flip) {
        *b = 0;
    }
    if bits_flip != 0 {
        mask[len - 1 - bytes_flip] <<= bits_flip;
    }
    // Bits above the field width stay clear.
    let top = width % 8;
    if top != 0 && !mask.is_empty() {
        mask[0] &= (1u8 << top) - 1;
    }
    mask
}

/// Number of set bits in a mask.
pub fn prefix_len(mask: &[u8]) -> u16 {
    mask.iter().map(|b| b.count_ones() as u16).sum()
}

/// Placement of a field slice inside its parent.
#[derive(Clone, Copy, Debug)]
pub struct Slice {
    pub start_bit: usize,
    pub width: usize,
    /// Byte size of the parent field region.
    pub parent_size: usize,
}

impl Slice {
    fn bit(buf: &[u8], size: usize, i: usize) -> u8 {
        (buf[size - 1 - i / 8] >> (i % 8)) & 1
    }

    fn parent_index(&self, i: usize) -> (usize, u8) {
        (self.parent_size - 1 - i / 8, 1u8 << (i % 8))
    }

    /// Checks that the slice lies inside its parent, that the field buffers
    /// hold `width` bits and that the parent buffers hold `parent_size`
    /// bytes.
    pub fn check(&self, field_len: usize, parent_len: usize) -> Result<()> {
        if self.start_bit + self.width > self.parent_size * 8 {
            return Err(Error::invalid(format!(
                "slice of bits {}..{} does not fit a {} byte parent",
                self.start_bit,
                self.start_bit + self.width,
                self.parent_size
            )));
        }
        if field_len < byte_len(self.width) || parent_len < self.parent_size {
            return Err(Error::invalid(format!(
                "{} bit slice needs {} field bytes and {} parent bytes, got {} and {}",
                self.width,
                byte_len(self.width),
                self.parent_size,
                field_len,
                parent_len
            )));
        }
        Ok(())
    }

    /// Writes `field` into the parent region `key`, and the matching mask
    /// bits into `key_mask`.
    ///
    /// Without a field mask every mask bit is one.  When `do_masking` is set
    /// value bits are ANDed with their mask bits.  Only bits
    /// `start_bit..start_bit + width` of the parent are touched.
    pub fn pack(
        &self,
        field: &[u8],
        field_mask: Option<&[u8]>,
        do_masking: bool,
        key: &mut [u8],
        key_mask: &mut [u8],
    ) -> Result<()> {
        let size = field.len();
        self.check(size, key.len().min(key_mask.len()))?;
        if let Some(mask) = field_mask {
            if mask.len() != size {
                return Err(Error::invalid(format!(
                    "mask of {} bytes for a {} byte value",
                    mask.len(),
                    size
                )));
            }
        }
        for j in 0..self.width {
            let i = self.start_bit + j;
            let mut bit = Self::bit(field, size, j);
            let mut mbit = 1;
            if let Some(mask) = field_mask {
                mbit = Self::bit(mask, size, j);
                if do_masking {
                    bit &= mbit;
                }
            }
            let (idx, set) = self.parent_index(i);
            key[idx] = (key[idx] & !set) | if bit != 0 { set } else { 0 };
            key_mask[idx] = (key_mask[idx] & !set) | if mbit != 0 { set } else { 0 };
        }
        Ok(())
    }

    /// Extracts the slice bits of the parent region `buf` into a zeroed
    /// buffer of `size` bytes.
    pub fn unpack(&self, buf: &[u8], size: usize) -> Result<Vec<u8>> {
        self.check(size, buf.len())?;
        let mut out = vec![0u8; size];
        for j in 0..self.width {
            let i = self.start_bit + j;
            let bit = Self::bit(buf, self.parent_size, i);
            out[size - 1 - j / 8] |= bit << (j % 8);
        }
        Ok(out)
    }
}

/// Copies `value` into `buf` at `offset`, failing if it does not fit.
pub fn write_at(buf: &mut [u8], offset: usize, value: &[u8]) -> Result<()> {
    let end = offset + value.len();
    let len = buf.len();
    let dst = buf.get_mut(offset..end).ok_or_else(|| {
        Error::invalid(format!(
            "field at bytes {}..{} lies outside a {} byte buffer",
            offset, end, len
        ))
    })?;
    dst.copy_from_slice(value);
    Ok(())
}

/// Reads `len` bytes of `buf` at `offset`.
pub fn read_at(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    buf.get(offset..offset + len).ok_or_else(|| {
        Error::invalid(format!(
            "field at bytes {}..{} lies outside a {} byte buffer",
            offset,
            offset + len,
            buf.len()
        ))
    })
}
