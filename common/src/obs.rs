//! obs-websocket v5 frames and authentication.
//!
//! Every frame is `{"op": <opcode>, "d": <payload>}`. Only the handful of opcodes needed to
//! identify and issue requests are modelled; everything else is carried as raw JSON.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest as _, Sha256};

/// RPC version this client negotiates.
pub const RPC_VERSION: u32 = 1;

/// Opcodes used on the control socket.
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// Status code OBS reports for a successful request.
pub const REQUEST_STATUS_SUCCESS: u16 = 100;

/// Outer frame; `D` is the opcode specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<D = Value> {
    pub op: u8,
    pub d: D,
}

impl<D: Serialize> Envelope<D> {
    pub const fn new(op: u8, d: D) -> Self {
        Self { op, d }
    }
}

/// Challenge parameters announced by the server when a password is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Opcode 0, sent by the server right after the socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthChallenge>,
}

/// Opcode 1, the client's reply to [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// Bitmask of event categories; the relay subscribes to none.
    pub event_subscriptions: u32,
}

/// Opcode 2, the server accepted the identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// Opcode 6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Opcode 7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

/// Payload of a `SetInputSettings` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInputSettings {
    pub input_name: String,
    pub input_settings: serde_json::Map<String, Value>,
}

impl SetInputSettings {
    /// Builds a request that sets a single string property on an input.
    #[must_use]
    pub fn single(input_name: &str, property: &str, value: String) -> Self {
        let mut input_settings = serde_json::Map::new();
        input_settings.insert(property.to_string(), Value::String(value));
        Self {
            input_name: input_name.to_string(),
            input_settings,
        }
    }
}

/// Computes the `authentication` string for [`Identify`].
///
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
#[must_use]
pub fn authentication_string(password: &SecretString, auth: &AuthChallenge) -> String {
    let secret = STANDARD.encode(
        Sha256::new()
            .chain_update(password.expose_secret().as_bytes())
            .chain_update(auth.salt.as_bytes())
            .finalize(),
    );
    STANDARD.encode(
        Sha256::new()
            .chain_update(secret.as_bytes())
            .chain_update(auth.challenge.as_bytes())
            .finalize(),
    )
}
