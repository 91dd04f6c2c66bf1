//! Order-preserving key packing
//!
//! Keys are built from a raw prefix followed by packed tuple elements.
//! Packing keeps bytewise order equal to tuple order, so a range scan
//! over packed keys walks tuples in ascending order.
//!
//! Format per element:
//! - `Int(u64)`: `0x1C` + 8 bytes big-endian
//! - `Bytes(b)`: `0x01` + `b` (each `0x00` written as `0x00 0xFF`) + `0x00`

use crate::storage::error::{StorageError, StorageResult};

const BYTES_CODE: u8 = 0x01;
const INT_CODE: u8 = 0x1C;
const ESCAPE: u8 = 0xFF;

/// One component of a packed key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Element {
    Bytes(Vec<u8>),
    Int(u64),
}

impl Element {
    fn pack_into(&self, out: &mut Vec<u8>) {
        match self {
            Element::Bytes(bytes) => {
                out.push(BYTES_CODE);
                for &b in bytes {
                    out.push(b);
                    if b == 0x00 {
                        out.push(ESCAPE);
                    }
                }
                out.push(0x00);
            }
            Element::Int(v) => {
                out.push(INT_CODE);
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
}

impl From<&[u8]> for Element {
    fn from(b: &[u8]) -> Self {
        Element::Bytes(b.to_vec())
    }
}

/// Pack a tuple without a prefix
pub fn pack(elements: &[Element]) -> Vec<u8> {
    let mut out = Vec::new();
    for element in elements {
        element.pack_into(&mut out);
    }
    out
}

/// Decode a packed tuple
pub fn unpack(mut bytes: &[u8]) -> StorageResult<Vec<Element>> {
    let mut elements = Vec::new();
    while let Some((&code, rest)) = bytes.split_first() {
        match code {
            INT_CODE => {
                if rest.len() < 8 {
                    return Err(StorageError::Corruption(
                        "truncated integer element".to_string(),
                    ));
                }
                let (head, tail) = rest.split_at(8);
                let mut buf = [0u8; 8];
                buf.copy_from_slice(head);
                elements.push(Element::Int(u64::from_be_bytes(buf)));
                bytes = tail;
            }
            BYTES_CODE => {
                let mut value = Vec::new();
                let mut i = 0;
                loop {
                    match (rest.get(i), rest.get(i + 1)) {
                        (Some(0x00), Some(&ESCAPE)) => {
                            value.push(0x00);
                            i += 2;
                        }
                        (Some(0x00), _) => break,
                        (Some(&b), _) => {
                            value.push(b);
                            i += 1;
                        }
                        (None, _) => {
                            return Err(StorageError::Corruption(
                                "unterminated byte-string element".to_string(),
                            ))
                        }
                    }
                }
                elements.push(Element::Bytes(value));
                bytes = &rest[i + 1..];
            }
            other => {
                return Err(StorageError::Corruption(format!(
                    "unknown element type code 0x{:02X}",
                    other
                )))
            }
        }
    }
    Ok(elements)
}

/// A region of the key space sharing one raw prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// Subspace whose prefix is the packed `name`
    pub fn named(name: &str) -> Self {
        Self {
            prefix: pack(&[Element::Bytes(name.as_bytes().to_vec())]),
        }
    }

    /// Nested subspace formed by appending raw bytes to the prefix
    pub fn child(&self, raw: &[u8]) -> Self {
        let mut prefix = self.prefix.clone();
        prefix.extend_from_slice(raw);
        Self { prefix }
    }

    pub fn pack(&self, elements: &[Element]) -> Vec<u8> {
        let mut out = self.prefix.clone();
        for element in elements {
            element.pack_into(&mut out);
        }
        out
    }

    /// Decode a key that belongs to this subspace
    pub fn unpack(&self, key: &[u8]) -> StorageResult<Vec<Element>> {
        let rest = key.strip_prefix(self.prefix.as_slice()).ok_or_else(|| {
            StorageError::Corruption("key outside subspace".to_string())
        })?;
        unpack(rest)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Half-open range covering every packed tuple in this subspace
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        self.range_of(&[])
    }

    /// Half-open range covering every tuple that starts with `elements`
    pub fn range_of(&self, elements: &[Element]) -> (Vec<u8>, Vec<u8>) {
        let base = self.pack(elements);
        let mut begin = base.clone();
        begin.push(0x00);
        let mut end = base;
        end.push(0xFF);
        (begin, end)
    }
}
