//! Steady-state messages.
//!
//! After the handshake every payload is a request-type tag followed by the
//! request's positional arguments:
//!
//! ```text
//! Sync            0, className, objectName, slotName, params...
//! RpcCall         1, slotName, params...
//! InitRequest     2, className, objectName
//! InitData        3, className, objectName, key, value, key, value...
//! HeartBeat       4, timestamp
//! HeartBeatReply  5, timestamp
//! ```

use std::fmt;

use bytes::Bytes;
use datastream_value::{flatten_into, unflatten, Timestamp, Value, ValueMap};
use serde::{Serialize, Serializer};

use crate::error::ProtocolError;

/// The leading tag of a steady-state payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i16)]
pub enum RequestType {
    Sync = 0,
    RpcCall = 1,
    InitRequest = 2,
    InitData = 3,
    HeartBeat = 4,
    HeartBeatReply = 5,
}

impl RequestType {
    pub fn name(&self) -> &'static str {
        match self {
            RequestType::Sync => "Sync",
            RequestType::RpcCall => "RpcCall",
            RequestType::InitRequest => "InitRequest",
            RequestType::InitData => "InitData",
            RequestType::HeartBeat => "HeartBeat",
            RequestType::HeartBeatReply => "HeartBeatReply",
        }
    }
}

impl TryFrom<i16> for RequestType {
    type Error = ProtocolError;

    fn try_from(tag: i16) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(RequestType::Sync),
            1 => Ok(RequestType::RpcCall),
            2 => Ok(RequestType::InitRequest),
            3 => Ok(RequestType::InitData),
            4 => Ok(RequestType::HeartBeat),
            5 => Ok(RequestType::HeartBeatReply),
            other => Err(ProtocolError::UnknownRequestType(other.into())),
        }
    }
}

impl From<RequestType> for i16 {
    fn from(request: RequestType) -> Self {
        request as i16
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many positional arguments a request takes, excluding the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    AtLeast(usize),
    Exactly(usize),
}

impl Arity {
    pub fn admits(&self, count: usize) -> bool {
        match *self {
            Arity::AtLeast(min) => count >= min,
            Arity::Exactly(n) => count == n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::AtLeast(min) => write!(f, "at least {min}"),
            Arity::Exactly(n) => write!(f, "exactly {n}"),
        }
    }
}

/// Invoke `slot_name` on the object identified by class and object name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncMessage {
    #[serde(serialize_with = "lossy_text")]
    pub class_name: Bytes,
    pub object_name: String,
    #[serde(serialize_with = "lossy_text")]
    pub slot_name: Bytes,
    pub params: Vec<Value>,
}

impl SyncMessage {
    pub fn new(
        class_name: impl Into<Bytes>,
        object_name: impl Into<String>,
        slot_name: impl Into<Bytes>,
        params: Vec<Value>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            object_name: object_name.into(),
            slot_name: slot_name.into(),
            params,
        }
    }
}

/// A remote procedure call not bound to any object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcCall {
    #[serde(serialize_with = "lossy_text")]
    pub slot_name: Bytes,
    pub params: Vec<Value>,
}

impl RpcCall {
    pub fn new(slot_name: impl Into<Bytes>, params: Vec<Value>) -> Self {
        Self {
            slot_name: slot_name.into(),
            params,
        }
    }
}

/// Ask the other side for an object's initial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitRequest {
    #[serde(serialize_with = "lossy_text")]
    pub class_name: Bytes,
    pub object_name: String,
}

impl InitRequest {
    pub fn new(class_name: impl Into<Bytes>, object_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            object_name: object_name.into(),
        }
    }
}

/// An object's initial state, answering an [`InitRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitData {
    #[serde(serialize_with = "lossy_text")]
    pub class_name: Bytes,
    pub object_name: String,
    pub init_data: ValueMap,
}

impl InitData {
    pub fn new(
        class_name: impl Into<Bytes>,
        object_name: impl Into<String>,
        init_data: ValueMap,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            object_name: object_name.into(),
            init_data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartBeat {
    pub timestamp: Timestamp,
}

impl HeartBeat {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// A heartbeat stamped with the current time.
    pub fn now() -> Self {
        Self::new(Timestamp::now())
    }

    /// The reply echoing this heartbeat's timestamp.
    pub fn reply(&self) -> HeartBeatReply {
        HeartBeatReply {
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartBeatReply {
    pub timestamp: Timestamp,
}

/// Any message valid once the connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "request")]
pub enum SteadyMessage {
    Sync(SyncMessage),
    RpcCall(RpcCall),
    InitRequest(InitRequest),
    InitData(InitData),
    HeartBeat(HeartBeat),
    HeartBeatReply(HeartBeatReply),
}

impl SteadyMessage {
    pub fn request_type(&self) -> RequestType {
        match self {
            SteadyMessage::Sync(_) => RequestType::Sync,
            SteadyMessage::RpcCall(_) => RequestType::RpcCall,
            SteadyMessage::InitRequest(_) => RequestType::InitRequest,
            SteadyMessage::InitData(_) => RequestType::InitData,
            SteadyMessage::HeartBeat(_) => RequestType::HeartBeat,
            SteadyMessage::HeartBeatReply(_) => RequestType::HeartBeatReply,
        }
    }

    /// Encode as the tag followed by positional arguments.
    pub fn encode(&self) -> Vec<Value> {
        let mut out = vec![Value::I16(self.request_type().into())];
        match self {
            SteadyMessage::Sync(m) => {
                out.reserve(3 + m.params.len());
                out.push(Value::Bytes(m.class_name.clone()));
                out.push(object_name(&m.object_name));
                out.push(Value::Bytes(m.slot_name.clone()));
                out.extend(m.params.iter().cloned());
            }
            SteadyMessage::RpcCall(m) => {
                out.reserve(1 + m.params.len());
                out.push(Value::Bytes(m.slot_name.clone()));
                out.extend(m.params.iter().cloned());
            }
            SteadyMessage::InitRequest(m) => {
                out.push(Value::Bytes(m.class_name.clone()));
                out.push(object_name(&m.object_name));
            }
            SteadyMessage::InitData(m) => {
                out.reserve(2 + m.init_data.len() * 2);
                out.push(Value::Bytes(m.class_name.clone()));
                out.push(object_name(&m.object_name));
                flatten_into(&m.init_data, &mut out);
            }
            SteadyMessage::HeartBeat(m) => out.push(Value::Timestamp(m.timestamp)),
            SteadyMessage::HeartBeatReply(m) => out.push(Value::Timestamp(m.timestamp)),
        }
        out
    }

    /// Decode a tag-led argument list, checking the argument count.
    pub fn decode(values: Vec<Value>) -> Result<Self, ProtocolError> {
        let mut args = values.into_iter();
        let tag = args.next().ok_or(ProtocolError::Empty)?;
        let raw = tag
            .as_i64()
            .ok_or(ProtocolError::InvalidRequestTag(tag.kind()))?;
        let request = i16::try_from(raw)
            .map_err(|_| ProtocolError::UnknownRequestType(raw))
            .and_then(RequestType::try_from)?;

        let mut args = Args::new(request, args.collect());
        let message = match request {
            RequestType::Sync => {
                args.check(Arity::AtLeast(3))?;
                SteadyMessage::Sync(SyncMessage {
                    class_name: args.bytes("className")?,
                    object_name: args.utf8("objectName")?,
                    slot_name: args.bytes("slotName")?,
                    params: args.rest(),
                })
            }
            RequestType::RpcCall => {
                args.check(Arity::AtLeast(1))?;
                SteadyMessage::RpcCall(RpcCall {
                    slot_name: args.bytes("slotName")?,
                    params: args.rest(),
                })
            }
            RequestType::InitRequest => {
                args.check(Arity::Exactly(2))?;
                SteadyMessage::InitRequest(InitRequest {
                    class_name: args.bytes("className")?,
                    object_name: args.utf8("objectName")?,
                })
            }
            RequestType::InitData => {
                args.check(Arity::AtLeast(2))?;
                SteadyMessage::InitData(InitData {
                    class_name: args.bytes("className")?,
                    object_name: args.utf8("objectName")?,
                    init_data: unflatten(args.rest())?,
                })
            }
            RequestType::HeartBeat => {
                args.check(Arity::Exactly(1))?;
                SteadyMessage::HeartBeat(HeartBeat {
                    timestamp: args.timestamp("timestamp")?,
                })
            }
            RequestType::HeartBeatReply => {
                args.check(Arity::Exactly(1))?;
                SteadyMessage::HeartBeatReply(HeartBeatReply {
                    timestamp: args.timestamp("timestamp")?,
                })
            }
        };
        Ok(message)
    }
}

macro_rules! impl_from_variant {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SteadyMessage {
                fn from(m: $ty) -> Self {
                    SteadyMessage::$variant(m)
                }
            }
        )*
    };
}

impl_from_variant! {
    SyncMessage => Sync,
    RpcCall => RpcCall,
    InitRequest => InitRequest,
    InitData => InitData,
    HeartBeat => HeartBeat,
    HeartBeatReply => HeartBeatReply,
}

// Object names travel as UTF-8 byte arrays.
fn object_name(name: &str) -> Value {
    Value::Bytes(Bytes::copy_from_slice(name.as_bytes()))
}

fn lossy_text<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// Positional argument extraction.
struct Args {
    request: RequestType,
    items: std::vec::IntoIter<Value>,
    count: usize,
}

impl Args {
    fn new(request: RequestType, items: Vec<Value>) -> Self {
        Self {
            request,
            count: items.len(),
            items: items.into_iter(),
        }
    }

    fn check(&self, expected: Arity) -> Result<(), ProtocolError> {
        if expected.admits(self.count) {
            return Ok(());
        }
        Err(ProtocolError::ArgumentCount {
            request: self.request.name(),
            expected,
            got: self.count,
        })
    }

    fn next(&mut self, field: &'static str) -> Result<Value, ProtocolError> {
        self.items.next().ok_or(ProtocolError::MissingField {
            message: self.request.name(),
            field,
        })
    }

    fn invalid(&self, field: &'static str, expected: &'static str, got: &'static str) -> ProtocolError {
        ProtocolError::InvalidField {
            message: self.request.name(),
            field,
            expected,
            got,
        }
    }

    fn bytes(&mut self, field: &'static str) -> Result<Bytes, ProtocolError> {
        match self.next(field)? {
            Value::Bytes(b) => Ok(b),
            Value::String(s) => Ok(Bytes::from(s)),
            other => Err(self.invalid(field, "a byte string", other.kind())),
        }
    }

    fn utf8(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        match self.next(field)? {
            Value::String(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b.to_vec())
                .map_err(|_| self.invalid(field, "UTF-8 text", "invalid UTF-8")),
            other => Err(self.invalid(field, "UTF-8 text", other.kind())),
        }
    }

    fn timestamp(&mut self, field: &'static str) -> Result<Timestamp, ProtocolError> {
        let value = self.next(field)?;
        value
            .as_timestamp()
            .ok_or_else(|| self.invalid(field, "a timestamp", value.kind()))
    }

    fn rest(self) -> Vec<Value> {
        self.items.collect()
    }
}
