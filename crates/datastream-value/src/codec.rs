//! Binary encoding of values and value sequences.
//!
//! All integers are big-endian. Each value is a one-byte tag and a body:
//!
//! ```text
//! 0x01 bool       1 byte (0 or 1)
//! 0x02 i16        2 bytes
//! 0x03 u16        2 bytes
//! 0x04 i32        4 bytes
//! 0x05 u32        4 bytes
//! 0x06 i64        8 bytes
//! 0x07 u64        8 bytes
//! 0x08 string     u32 length + UTF-8
//! 0x09 bytes      u32 length + raw bytes
//! 0x0A timestamp  i64 milliseconds since the Unix epoch
//! 0x0B list       u32 count + values
//! 0x0C map        u32 count + (u32 length + UTF-8 key, value) pairs
//! ```
//!
//! A sequence is a u32 count followed by that many values, and must use
//! up its buffer exactly.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, ValueError};
use crate::value::{Timestamp, Value, ValueMap};

/// Lists and maps may nest at most this deep.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Smallest encoded value: a tag and a one-byte body.
const MIN_VALUE_SIZE: usize = 2;

/// Smallest encoded map entry: an empty key and the smallest value.
const MIN_ENTRY_SIZE: usize = 4 + MIN_VALUE_SIZE;

/// Upper bound on the capacity reserved from a declared count.
const MAX_PREALLOC: usize = 256;

mod tag {
    pub const BOOL: u8 = 0x01;
    pub const I16: u8 = 0x02;
    pub const U16: u8 = 0x03;
    pub const I32: u8 = 0x04;
    pub const U32: u8 = 0x05;
    pub const I64: u8 = 0x06;
    pub const U64: u8 = 0x07;
    pub const STRING: u8 = 0x08;
    pub const BYTES: u8 = 0x09;
    pub const TIMESTAMP: u8 = 0x0A;
    pub const LIST: u8 = 0x0B;
    pub const MAP: u8 = 0x0C;
}

/// Encode an ordered sequence of values.
pub fn encode_sequence(values: &[Value]) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_sequence_into(values, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode an ordered sequence of values, appending to `dst`.
///
/// Values nested deeper than [`MAX_NESTING_DEPTH`] are refused, since no
/// receiver would accept them.
pub fn encode_sequence_into(values: &[Value], dst: &mut BytesMut) -> Result<()> {
    put_sequence(values, dst, 0)
}

/// Encode a single tagged value, appending to `dst`.
pub fn encode_value(value: &Value, dst: &mut BytesMut) -> Result<()> {
    put_value(value, dst, 0)
}

fn put_sequence(values: &[Value], dst: &mut BytesMut, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ValueError::TooDeep {
            max: MAX_NESTING_DEPTH,
        });
    }
    put_len(values.len(), dst)?;
    for value in values {
        put_value(value, dst, depth)?;
    }
    Ok(())
}

fn put_value(value: &Value, dst: &mut BytesMut, depth: usize) -> Result<()> {
    match value {
        Value::Bool(v) => {
            dst.put_u8(tag::BOOL);
            dst.put_u8(u8::from(*v));
        }
        Value::I16(v) => {
            dst.put_u8(tag::I16);
            dst.put_i16(*v);
        }
        Value::U16(v) => {
            dst.put_u8(tag::U16);
            dst.put_u16(*v);
        }
        Value::I32(v) => {
            dst.put_u8(tag::I32);
            dst.put_i32(*v);
        }
        Value::U32(v) => {
            dst.put_u8(tag::U32);
            dst.put_u32(*v);
        }
        Value::I64(v) => {
            dst.put_u8(tag::I64);
            dst.put_i64(*v);
        }
        Value::U64(v) => {
            dst.put_u8(tag::U64);
            dst.put_u64(*v);
        }
        Value::String(v) => {
            dst.put_u8(tag::STRING);
            put_blob(v.as_bytes(), dst)?;
        }
        Value::Bytes(v) => {
            dst.put_u8(tag::BYTES);
            put_blob(v, dst)?;
        }
        Value::Timestamp(v) => {
            dst.put_u8(tag::TIMESTAMP);
            dst.put_i64(v.as_millis());
        }
        Value::List(items) => {
            dst.put_u8(tag::LIST);
            put_sequence(items, dst, depth + 1)?;
        }
        Value::Map(map) => {
            if depth + 1 > MAX_NESTING_DEPTH {
                return Err(ValueError::TooDeep {
                    max: MAX_NESTING_DEPTH,
                });
            }
            dst.put_u8(tag::MAP);
            put_len(map.len(), dst)?;
            for (key, item) in map {
                put_blob(key.as_bytes(), dst)?;
                put_value(item, dst, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn put_len(len: usize, dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| ValueError::TooLong { len })?;
    dst.put_u32(len);
    Ok(())
}

fn put_blob(bytes: &[u8], dst: &mut BytesMut) -> Result<()> {
    put_len(bytes.len(), dst)?;
    dst.put_slice(bytes);
    Ok(())
}

/// Decode an ordered sequence of values.
///
/// Strict: a truncated value, unknown tag, malformed body or leftover
/// bytes fail the whole sequence.
pub fn decode_sequence(src: &[u8]) -> Result<Vec<Value>> {
    let mut decoder = Decoder { buf: src };
    let values = decoder.sequence(0)?;
    if decoder.buf.has_remaining() {
        return Err(ValueError::TrailingBytes(decoder.buf.remaining()));
    }
    Ok(values)
}

struct Decoder<'a> {
    buf: &'a [u8],
}

impl Decoder<'_> {
    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(ValueError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Read an element count, rejecting counts the buffer cannot hold
    /// when every element takes at least `min_size` bytes.
    fn count(&mut self, min_size: usize) -> Result<usize> {
        let count = self.len()?;
        if count.saturating_mul(min_size) > self.buf.remaining() {
            return Err(ValueError::CountTooLarge {
                count,
                remaining: self.buf.remaining(),
            });
        }
        Ok(count)
    }

    fn len(&mut self) -> Result<usize> {
        self.need(4)?;
        Ok(self.buf.get_u32() as usize)
    }

    fn blob(&mut self) -> Result<&[u8]> {
        let len = self.len()?;
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn text(&mut self) -> Result<String> {
        let raw = self.blob()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ValueError::InvalidUtf8)
    }

    fn sequence(&mut self, depth: usize) -> Result<Vec<Value>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ValueError::TooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        let count = self.count(MIN_VALUE_SIZE)?;
        // Nested lists each hold their reservation until the innermost
        // one fails, so the hint stays small.
        let mut values = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            values.push(self.value(depth)?);
        }
        Ok(values)
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        self.need(1)?;
        let tag = self.buf.get_u8();
        let value = match tag {
            tag::BOOL => {
                self.need(1)?;
                match self.buf.get_u8() {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    other => return Err(ValueError::InvalidBool(other)),
                }
            }
            tag::I16 => {
                self.need(2)?;
                Value::I16(self.buf.get_i16())
            }
            tag::U16 => {
                self.need(2)?;
                Value::U16(self.buf.get_u16())
            }
            tag::I32 => {
                self.need(4)?;
                Value::I32(self.buf.get_i32())
            }
            tag::U32 => {
                self.need(4)?;
                Value::U32(self.buf.get_u32())
            }
            tag::I64 => {
                self.need(8)?;
                Value::I64(self.buf.get_i64())
            }
            tag::U64 => {
                self.need(8)?;
                Value::U64(self.buf.get_u64())
            }
            tag::STRING => Value::String(self.text()?),
            tag::BYTES => Value::Bytes(Bytes::copy_from_slice(self.blob()?)),
            tag::TIMESTAMP => {
                self.need(8)?;
                Value::Timestamp(Timestamp::from_millis(self.buf.get_i64()))
            }
            tag::LIST => Value::List(self.sequence(depth + 1)?),
            tag::MAP => {
                if depth + 1 > MAX_NESTING_DEPTH {
                    return Err(ValueError::TooDeep {
                        max: MAX_NESTING_DEPTH,
                    });
                }
                let count = self.count(MIN_ENTRY_SIZE)?;
                let mut map = ValueMap::new();
                for _ in 0..count {
                    let key = self.text()?;
                    let item = self.value(depth + 1)?;
                    map.insert(key, item);
                }
                Value::Map(map)
            }
            other => return Err(ValueError::UnknownTag(other)),
        };
        Ok(value)
    }
}
