use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// String-keyed map of values. Sorted by key, so encoding order is stable.
pub type ValueMap = BTreeMap<String, Value>;

/// A point in time with millisecond precision, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Milliseconds since the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Convert back to a `SystemTime`.
    pub fn to_system_time(&self) -> SystemTime {
        let offset = Duration::from_millis(self.0.unsigned_abs());
        if self.0 >= 0 {
            UNIX_EPOCH + offset
        } else {
            UNIX_EPOCH - offset
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(i64::try_from(after.as_millis()).unwrap_or(i64::MAX)),
            Err(before) => Self(-i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX)),
        }
    }
}

/// A dynamically typed value.
///
/// Values are immutable once built; containers own their elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    /// UTF-8 text.
    String(String),
    /// Raw bytes; also used for UTF-8 names sent as byte arrays.
    Bytes(Bytes),
    Timestamp(Timestamp),
    List(Vec<Value>),
    Map(ValueMap),
}

impl Value {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// The text of a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The bytes of a `Bytes` value, or the UTF-8 bytes of a `String`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Any integer kind, widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I16(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Any integer kind whose value fits in i16.
    pub fn as_i16(&self) -> Option<i16> {
        self.as_i64().and_then(|v| i16::try_from(v).ok())
    }

    /// Any integer kind whose value fits in u32.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match *self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
    Timestamp => Timestamp,
    Vec<Value> => List,
    ValueMap => Map,
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(v))
    }
}

/// Byte strings render as text when they hold UTF-8, which is the common
/// case for class, object and slot names.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => match std::str::from_utf8(v) {
                Ok(text) => serializer.serialize_str(text),
                Err(_) => serializer.serialize_bytes(v),
            },
            Value::Timestamp(v) => v.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_accessors_widen_and_narrow() {
        assert_eq!(Value::I16(-3).as_i64(), Some(-3));
        assert_eq!(Value::U32(7).as_i16(), Some(7));
        assert_eq!(Value::I32(70_000).as_i16(), None);
        assert_eq!(Value::I64(-1).as_u32(), None);
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::String("7".into()).as_i64(), None);
    }

    #[test]
    fn bytes_accessor_accepts_strings() {
        assert_eq!(Value::from("abc").as_bytes(), Some(&b"abc"[..]));
        assert_eq!(Value::from(&b"abc"[..]).as_bytes(), Some(&b"abc"[..]));
        assert_eq!(Value::from(&b"abc"[..]).as_str(), None);
        assert_eq!(Value::Bool(true).as_bytes(), None);
    }

    #[test]
    fn timestamp_system_time_roundtrip() {
        let ts = Timestamp::from_millis(1_400_000_000_123);
        assert_eq!(Timestamp::from(ts.to_system_time()), ts);

        let before_epoch = Timestamp::from_millis(-5_000);
        assert_eq!(Timestamp::from(before_epoch.to_system_time()), before_epoch);
    }

    #[test]
    fn serializes_to_plain_json() {
        let mut map = ValueMap::new();
        map.insert("name".into(), Value::from(&b"Network"[..]));
        map.insert("ids".into(), Value::List(vec![Value::I32(1), Value::U16(2)]));
        map.insert("when".into(), Value::Timestamp(Timestamp::from_millis(42)));

        let json = serde_json::to_value(Value::Map(map)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ids": [1, 2], "name": "Network", "when": 42 })
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Bytes(Bytes::new()).kind(), "bytes");
        assert_eq!(Value::Map(ValueMap::new()).kind(), "map");
    }
}
