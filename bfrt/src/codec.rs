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

//! Whole-entry encoding from `(field id, value)` lists.

use crate::data::{FieldValue, TableData};
use crate::error::{Error, Result};
use crate::field::{KeyFieldInfo, KeyFieldType};
use crate::key::TableKey;
use crate::pack::{byte_len, check_value, to_network};
use crate::table::TableInfo;

/// A key value in either the 64-bit or the byte array form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    U64(u64),
    /// Network order, exactly as long as the field.
    Bytes(Vec<u8>),
}

/// A key field value for one match kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyValue {
    Exact(Scalar),
    Ternary { value: Scalar, mask: Scalar },
    Range { start: Scalar, end: Scalar },
    Lpm { value: Scalar, prefix_len: u16 },
    Optional { value: Scalar, is_valid: bool },
}

fn to_bytes(s: &Scalar, width: usize) -> Result<Vec<u8>> {
    match s {
        Scalar::Bytes(b) => Ok(b.clone()),
        Scalar::U64(v) => {
            check_value(*v, width)?;
            let size = byte_len(width);
            let mut out = vec![0u8; size];
            let n = size.min(8);
            out[size - n..].copy_from_slice(&to_network(*v, n));
            Ok(out)
        }
    }
}

fn set_one(key: &mut TableKey, field: &KeyFieldInfo, value: &KeyValue) -> Result<()> {
    let (id, w) = (field.id, field.width);
    let narrow = w <= 64;
    match value {
        KeyValue::Exact(Scalar::U64(v)) if narrow => key.set_exact(id, *v),
        KeyValue::Exact(b) => key.set_exact_bytes(id, &to_bytes(b, w)?),
        KeyValue::Ternary {
            value: Scalar::U64(v),
            mask: Scalar::U64(m),
        } if narrow => key.set_ternary(id, *v, *m),
        KeyValue::Ternary { value, mask } => {
            key.set_ternary_bytes(id, &to_bytes(value, w)?, &to_bytes(mask, w)?)
        }
        KeyValue::Range {
            start: Scalar::U64(s),
            end: Scalar::U64(e),
        } if narrow => key.set_range(id, *s, *e),
        KeyValue::Range { start, end } => {
            key.set_range_bytes(id, &to_bytes(start, w)?, &to_bytes(end, w)?)
        }
        KeyValue::Lpm {
            value: Scalar::U64(v),
            prefix_len,
        } if narrow => key.set_lpm(id, *v, *prefix_len),
        KeyValue::Lpm { value, prefix_len } => {
            key.set_lpm_bytes(id, &to_bytes(value, w)?, *prefix_len)
        }
        KeyValue::Optional {
            value: Scalar::U64(v),
            is_valid,
        } if narrow => key.set_optional(id, *v, *is_valid),
        KeyValue::Optional { value, is_valid } => {
            key.set_optional_bytes(id, &to_bytes(value, w)?, *is_valid)
        }
    }
}

/// Packs `fields` into a fresh key for `table`.  Field order does not
/// matter.
pub fn encode_key<'a>(table: &'a TableInfo, fields: &[(u32, KeyValue)]) -> Result<TableKey<'a>> {
    let mut key = TableKey::new(table)?;
    for (id, value) in fields {
        let field = table.key_field(*id)?;
        set_one(&mut key, field, value)?;
    }
    Ok(key)
}

/// Unpacks the listed key fields, or every key field if `ids` is empty.
/// Fields of up to 64 bits come back in the 64-bit form.
pub fn decode_key(key: &TableKey, ids: &[u32]) -> Result<Vec<(u32, KeyValue)>> {
    let table = key.table();
    let ids: Vec<u32> = if ids.is_empty() {
        table.key_fields.keys().copied().collect()
    } else {
        ids.to_vec()
    };
    ids.into_iter()
        .map(|id| {
            let field = table.key_field(id)?;
            let narrow = field.width <= 64;
            let value = match field.match_kind {
                KeyFieldType::Exact if narrow => KeyValue::Exact(Scalar::U64(key.exact(id)?)),
                KeyFieldType::Exact => KeyValue::Exact(Scalar::Bytes(key.exact_bytes(id)?)),
                KeyFieldType::Ternary if narrow => {
                    let (v, m) = key.ternary(id)?;
                    KeyValue::Ternary {
                        value: Scalar::U64(v),
                        mask: Scalar::U64(m),
                    }
                }
                KeyFieldType::Ternary => {
                    let (v, m) = key.ternary_bytes(id)?;
                    KeyValue::Ternary {
                        value: Scalar::Bytes(v),
                        mask: Scalar::Bytes(m),
                    }
                }
                KeyFieldType::Range if narrow => {
                    let (s, e) = key.range(id)?;
                    KeyValue::Range {
                        start: Scalar::U64(s),
                        end: Scalar::U64(e),
                    }
                }
                KeyFieldType::Range => {
                    let (s, e) = key.range_bytes(id)?;
                    KeyValue::Range {
                        start: Scalar::Bytes(s),
                        end: Scalar::Bytes(e),
                    }
                }
                KeyFieldType::Lpm if narrow => {
                    let (v, p) = key.lpm(id)?;
                    KeyValue::Lpm {
                        value: Scalar::U64(v),
                        prefix_len: p,
                    }
                }
                KeyFieldType::Lpm => {
                    let (v, p) = key.lpm_bytes(id)?;
                    KeyValue::Lpm {
                        value: Scalar::Bytes(v),
                        prefix_len: p,
                    }
                }
                KeyFieldType::Optional if narrow => {
                    let (v, is_valid) = key.optional(id)?;
                    KeyValue::Optional {
                        value: Scalar::U64(v),
                        is_valid,
                    }
                }
                KeyFieldType::Optional => {
                    let (v, is_valid) = key.optional_bytes(id)?;
                    KeyValue::Optional {
                        value: Scalar::Bytes(v),
                        is_valid,
                    }
                }
                KeyFieldType::Invalid => {
                    return Err(Error::NotSupported(format!(
                        "key field {} has no match kind",
                        field.name
                    )))
                }
            };
            Ok((id, value))
        })
        .collect()
}

/// Builds entry data for `action` (or the table's common data) from
/// `fields`.
pub fn encode_data<'a>(
    table: &'a TableInfo,
    action: Option<u32>,
    fields: &[(u32, FieldValue)],
) -> Result<TableData<'a>> {
    let mut data = TableData::new(table, action)?;
    for (id, value) in fields {
        data.set(*id, value)?;
    }
    Ok(data)
}

/// Reads back the listed data fields, or every active field if `ids` is
/// empty.
pub fn decode_data(data: &TableData, ids: &[u32]) -> Result<Vec<(u32, FieldValue)>> {
    let ids: Vec<u32> = if ids.is_empty() {
        data.active_fields().iter().copied().collect()
    } else {
        ids.to_vec()
    };
    ids.into_iter()
        .map(|id| Ok((id, data.get(id)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::data_field;
    use crate::field::DataFieldType;
    use crate::key::tests::key_field;
    use crate::table::{ActionInfo, KeySize};

    fn acl() -> TableInfo {
        let mut vid = key_field(2, "hdr.vlan.vid[15:4]", KeyFieldType::Ternary, 12, 1);
        vid.start_bit = 4;
        vid.is_field_slice = true;
        vid.parent_field_full_byte_size = 2;
        let fields = vec![
            key_field(1, "hdr.ipv4.ttl", KeyFieldType::Exact, 8, 0),
            vid,
            key_field(3, "hdr.ipv6.dst", KeyFieldType::Lpm, 128, 3),
        ];
        let mut table = TableInfo {
            name: "pipe.SwitchIngress.acl".to_string(),
            is_ternary: true,
            key_fields: fields.into_iter().map(|f| (f.id, f)).collect(),
            key_size: KeySize {
                bytes: 19,
                bits: 148,
            },
            ..Default::default()
        };
        let param = data_field(1, "port", 9, 0, &[DataFieldType::ActionParam]);
        table.actions.insert(
            3,
            ActionInfo {
                id: 3,
                name: "SwitchIngress.send".to_string(),
                data_fields: [(1, param)].into_iter().collect(),
                data_size: 2,
                data_size_bits: 9,
                ..Default::default()
            },
        );
        table
    }

    #[test]
    fn key_round_trip() {
        let table = acl();
        let mut addr = vec![0u8; 16];
        addr[..4].copy_from_slice(&[0x20, 0x01, 0x0d, 0xb8]);
        let fields = vec![
            (
                2,
                KeyValue::Ternary {
                    value: Scalar::U64(0x0AB),
                    mask: Scalar::U64(0x0FF),
                },
            ),
            (1, KeyValue::Exact(Scalar::U64(0x05))),
            (
                3,
                KeyValue::Lpm {
                    value: Scalar::Bytes(addr.clone()),
                    prefix_len: 32,
                },
            ),
        ];
        let key = encode_key(&table, &fields).unwrap();
        assert_eq!(&key.key_bytes()[..3], &[0x05, 0x0A, 0xB0]);
        assert_eq!(&key.mask_bytes()[..3], &[0xFF, 0x0F, 0xF0]);
        assert_eq!(key.priority(), 96);

        let decoded = decode_key(&key, &[1, 2]).unwrap();
        assert_eq!(decoded, vec![fields[1].clone(), fields[0].clone()]);
        assert_eq!(decode_key(&key, &[3]).unwrap(), vec![fields[2].clone()]);

        // The 64-bit form widens into a 128-bit field.
        let key = encode_key(
            &table,
            &[(
                3,
                KeyValue::Lpm {
                    value: Scalar::U64(0xff),
                    prefix_len: 128,
                },
            )],
        )
        .unwrap();
        assert_eq!(key.key_bytes()[18], 0xff);
        assert_eq!(key.priority(), 0);
        assert_eq!(decode_key(&key, &[]).unwrap().len(), 3);
    }

    #[test]
    fn first_bad_field_fails_the_key() {
        let table = acl();
        let fields = vec![
            (1, KeyValue::Exact(Scalar::U64(0x100))),
            (2, KeyValue::Exact(Scalar::U64(1))),
        ];
        assert!(matches!(encode_key(&table, &fields), Err(Error::InvalidArg(_))));
        assert!(matches!(
            encode_key(&table, &[(9, KeyValue::Exact(Scalar::U64(1)))]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn data_round_trip() {
        let table = acl();
        let data = encode_data(&table, Some(3), &[(1, FieldValue::Uint(260))]).unwrap();
        assert_eq!(data.action_data(), &[0x01, 0x04]);
        assert_eq!(decode_data(&data, &[]).unwrap(), vec![(1, FieldValue::Uint(260))]);
    }
}
