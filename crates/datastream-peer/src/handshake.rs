//! Handshake messages.
//!
//! Every handshake payload is one flattened map carrying a `MsgType` entry
//! that selects the variant; the remaining entries are the variant's fields.

use std::fmt;

use datastream_value::{flatten, unflatten, Value, ValueMap};
use serde::Serialize;

use crate::error::ProtocolError;

/// Build date of this crate, `YYYY-MM-DD`.
pub const BUILD_DATE: &str = env!("DATASTREAM_BUILD_DATE");

const MSG_TYPE: &str = "MsgType";

/// Client announcement, the first message of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInit {
    pub client_version: String,
    pub client_date: String,
}

impl ClientInit {
    /// A `ClientInit` dated with this build.
    pub fn new(client_version: impl Into<String>) -> Self {
        Self {
            client_version: client_version.into(),
            client_date: BUILD_DATE.to_string(),
        }
    }
}

/// The core refused the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDenied {
    pub error: String,
}

/// The core accepted the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRegistered {
    pub core_features: u32,
    pub core_configured: bool,
    /// Storage backends on offer when the core still needs setup.
    pub backend_info: Vec<Value>,
}

/// Initial core configuration sent by the client.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SetupData {
    pub admin_user: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
    pub backend: String,
    pub setup_data: ValueMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupFailed {
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetupDone;

/// Client credentials.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Login {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginFailed {
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoginSuccess;

/// Session snapshot sent once the login succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub identities: Vec<Value>,
    pub buffer_infos: Vec<Value>,
    pub network_ids: Vec<Value>,
}

impl fmt::Debug for SetupData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupData")
            .field("admin_user", &self.admin_user)
            .field(
                "admin_password",
                &format_args!("<redacted:{} bytes>", self.admin_password.len()),
            )
            .field("backend", &self.backend)
            .field("setup_data", &self.setup_data)
            .finish()
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("user", &self.user)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

/// Any message valid during the handshake phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "msg_type")]
pub enum HandshakeMessage {
    #[serde(rename = "ClientInit")]
    ClientInit(ClientInit),
    #[serde(rename = "ClientInitReject")]
    ClientDenied(ClientDenied),
    #[serde(rename = "ClientInitAck")]
    ClientRegistered(ClientRegistered),
    #[serde(rename = "CoreSetupData")]
    SetupData(SetupData),
    #[serde(rename = "CoreSetupReject")]
    SetupFailed(SetupFailed),
    #[serde(rename = "CoreSetupAck")]
    SetupDone(SetupDone),
    #[serde(rename = "ClientLogin")]
    Login(Login),
    #[serde(rename = "ClientLoginReject")]
    LoginFailed(LoginFailed),
    #[serde(rename = "ClientLoginAck")]
    LoginSuccess(LoginSuccess),
    #[serde(rename = "SessionInit")]
    SessionState(SessionState),
}

impl HandshakeMessage {
    /// The `MsgType` this message travels under.
    pub fn msg_type(&self) -> &'static str {
        match self {
            HandshakeMessage::ClientInit(_) => "ClientInit",
            HandshakeMessage::ClientDenied(_) => "ClientInitReject",
            HandshakeMessage::ClientRegistered(_) => "ClientInitAck",
            HandshakeMessage::SetupData(_) => "CoreSetupData",
            HandshakeMessage::SetupFailed(_) => "CoreSetupReject",
            HandshakeMessage::SetupDone(_) => "CoreSetupAck",
            HandshakeMessage::Login(_) => "ClientLogin",
            HandshakeMessage::LoginFailed(_) => "ClientLoginReject",
            HandshakeMessage::LoginSuccess(_) => "ClientLoginAck",
            HandshakeMessage::SessionState(_) => "SessionInit",
        }
    }

    /// Render the message as a map, `MsgType` included.
    pub fn to_map(&self) -> ValueMap {
        let mut map = ValueMap::new();
        map.insert(MSG_TYPE.into(), Value::from(self.msg_type()));
        match self {
            HandshakeMessage::ClientInit(m) => {
                map.insert("ClientVersion".into(), Value::from(m.client_version.as_str()));
                map.insert("ClientDate".into(), Value::from(m.client_date.as_str()));
            }
            HandshakeMessage::ClientDenied(m) => {
                map.insert("Error".into(), Value::from(m.error.as_str()));
            }
            HandshakeMessage::ClientRegistered(m) => {
                map.insert("CoreFeatures".into(), Value::U32(m.core_features));
                map.insert("Configured".into(), Value::Bool(m.core_configured));
                map.insert("LoginEnabled".into(), Value::Bool(m.core_configured));
                map.insert("StorageBackends".into(), Value::List(m.backend_info.clone()));
            }
            HandshakeMessage::SetupData(m) => {
                let mut setup = ValueMap::new();
                setup.insert("AdminUser".into(), Value::from(m.admin_user.as_str()));
                setup.insert("AdminPasswd".into(), Value::from(m.admin_password.as_str()));
                setup.insert("Backend".into(), Value::from(m.backend.as_str()));
                setup.insert("ConnectionProperties".into(), Value::Map(m.setup_data.clone()));
                map.insert("SetupData".into(), Value::Map(setup));
            }
            HandshakeMessage::SetupFailed(m) => {
                map.insert("Error".into(), Value::from(m.error.as_str()));
            }
            HandshakeMessage::SetupDone(_) | HandshakeMessage::LoginSuccess(_) => {}
            HandshakeMessage::Login(m) => {
                map.insert("User".into(), Value::from(m.user.as_str()));
                map.insert("Password".into(), Value::from(m.password.as_str()));
            }
            HandshakeMessage::LoginFailed(m) => {
                map.insert("Error".into(), Value::from(m.error.as_str()));
            }
            HandshakeMessage::SessionState(m) => {
                let mut state = ValueMap::new();
                state.insert("Identities".into(), Value::List(m.identities.clone()));
                state.insert("BufferInfos".into(), Value::List(m.buffer_infos.clone()));
                state.insert("NetworkIds".into(), Value::List(m.network_ids.clone()));
                map.insert("SessionState".into(), Value::Map(state));
            }
        }
        map
    }

    /// Encode as a flattened key/value list.
    pub fn encode(&self) -> Vec<Value> {
        flatten(&self.to_map())
    }

    /// Decode a flattened key/value list.
    pub fn decode(values: Vec<Value>) -> Result<Self, ProtocolError> {
        Self::from_map(unflatten(values)?)
    }

    /// Interpret a map carrying a `MsgType` entry.
    pub fn from_map(mut map: ValueMap) -> Result<Self, ProtocolError> {
        let msg_type = map
            .remove(MSG_TYPE)
            .and_then(into_text)
            .filter(|t| !t.is_empty())
            .ok_or(ProtocolError::MissingMsgType)?;

        let message = match msg_type.as_str() {
            "ClientInit" => {
                let mut f = Fields::new("ClientInit", map);
                HandshakeMessage::ClientInit(ClientInit {
                    client_version: f.text("ClientVersion")?,
                    client_date: f.opt_text("ClientDate")?,
                })
            }
            "ClientInitReject" => {
                let mut f = Fields::new("ClientInitReject", map);
                HandshakeMessage::ClientDenied(ClientDenied {
                    error: f.text("Error")?,
                })
            }
            "ClientInitAck" => {
                let mut f = Fields::new("ClientInitAck", map);
                HandshakeMessage::ClientRegistered(ClientRegistered {
                    core_features: f.u32("CoreFeatures")?,
                    core_configured: f.bool("Configured")?,
                    backend_info: f.opt_list("StorageBackends")?,
                })
            }
            "CoreSetupData" => {
                let mut outer = Fields::new("CoreSetupData", map);
                let mut f = Fields::new("CoreSetupData", outer.map("SetupData")?);
                HandshakeMessage::SetupData(SetupData {
                    admin_user: f.text("AdminUser")?,
                    admin_password: f.text("AdminPasswd")?,
                    backend: f.text("Backend")?,
                    setup_data: f.opt_map("ConnectionProperties")?,
                })
            }
            "CoreSetupReject" => {
                let mut f = Fields::new("CoreSetupReject", map);
                HandshakeMessage::SetupFailed(SetupFailed {
                    error: f.text("Error")?,
                })
            }
            "CoreSetupAck" => HandshakeMessage::SetupDone(SetupDone),
            "ClientLogin" => {
                let mut f = Fields::new("ClientLogin", map);
                HandshakeMessage::Login(Login {
                    user: f.text("User")?,
                    password: f.text("Password")?,
                })
            }
            "ClientLoginReject" => {
                let mut f = Fields::new("ClientLoginReject", map);
                HandshakeMessage::LoginFailed(LoginFailed {
                    error: f.text("Error")?,
                })
            }
            "ClientLoginAck" => HandshakeMessage::LoginSuccess(LoginSuccess),
            "SessionInit" => {
                let mut outer = Fields::new("SessionInit", map);
                let mut f = Fields::new("SessionInit", outer.map("SessionState")?);
                HandshakeMessage::SessionState(SessionState {
                    identities: f.opt_list("Identities")?,
                    buffer_infos: f.opt_list("BufferInfos")?,
                    network_ids: f.opt_list("NetworkIds")?,
                })
            }
            _ => return Err(ProtocolError::UnknownMsgType(msg_type)),
        };
        Ok(message)
    }
}

macro_rules! impl_from_variant {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for HandshakeMessage {
                fn from(m: $ty) -> Self {
                    HandshakeMessage::$ty(m)
                }
            }
        )*
    };
}

impl_from_variant!(
    ClientInit,
    ClientDenied,
    ClientRegistered,
    SetupData,
    SetupFailed,
    SetupDone,
    Login,
    LoginFailed,
    LoginSuccess,
    SessionState,
);

/// Text carried either as a string or as UTF-8 bytes.
fn into_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Bytes(b) => String::from_utf8(b.to_vec()).ok(),
        _ => None,
    }
}

/// Typed field extraction from a decoded map.
struct Fields {
    message: &'static str,
    map: ValueMap,
}

impl Fields {
    fn new(message: &'static str, map: ValueMap) -> Self {
        Self { message, map }
    }

    fn missing(&self, field: &'static str) -> ProtocolError {
        ProtocolError::MissingField {
            message: self.message,
            field,
        }
    }

    fn invalid(&self, field: &'static str, expected: &'static str, got: &Value) -> ProtocolError {
        ProtocolError::InvalidField {
            message: self.message,
            field,
            expected,
            got: got.kind(),
        }
    }

    fn required(&mut self, field: &'static str) -> Result<Value, ProtocolError> {
        self.map.remove(field).ok_or_else(|| self.missing(field))
    }

    fn text(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let value = self.required(field)?;
        self.as_text(field, value)
    }

    fn opt_text(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        match self.map.remove(field) {
            Some(value) => self.as_text(field, value),
            None => Ok(String::new()),
        }
    }

    fn as_text(&self, field: &'static str, value: Value) -> Result<String, ProtocolError> {
        let err = self.invalid(field, "text", &value);
        into_text(value).ok_or(err)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let value = self.required(field)?;
        value
            .as_u32()
            .ok_or_else(|| self.invalid(field, "an unsigned integer", &value))
    }

    fn bool(&mut self, field: &'static str) -> Result<bool, ProtocolError> {
        let value = self.required(field)?;
        value
            .as_bool()
            .ok_or_else(|| self.invalid(field, "a boolean", &value))
    }

    fn map(&mut self, field: &'static str) -> Result<ValueMap, ProtocolError> {
        match self.required(field)? {
            Value::Map(map) => Ok(map),
            other => Err(self.invalid(field, "a map", &other)),
        }
    }

    fn opt_map(&mut self, field: &'static str) -> Result<ValueMap, ProtocolError> {
        match self.map.remove(field) {
            Some(Value::Map(map)) => Ok(map),
            Some(other) => Err(self.invalid(field, "a map", &other)),
            None => Ok(ValueMap::new()),
        }
    }

    fn opt_list(&mut self, field: &'static str) -> Result<Vec<Value>, ProtocolError> {
        match self.map.remove(field) {
            Some(Value::List(items)) => Ok(items),
            Some(other) => Err(self.invalid(field, "a list", &other)),
            None => Ok(Vec::new()),
        }
    }
}
