//! Wire envelope `{type, payload, error?}`.
//!
//! The `type`/`payload` pair comes from the adjacently-tagged message enums;
//! the optional top-level `error` string carries an [`ErrorCode`] on failing
//! responses. Encoding a broadcast once and fanning the bytes out is the hot
//! path, so the frame helper returns frozen [`Bytes`].

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::messages::{ClientMessage, ServerMessage};

/// Inbound envelope decoded from a client text frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientEnvelope {
    #[serde(flatten)]
    pub message: ClientMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClientEnvelope {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl From<ClientMessage> for ClientEnvelope {
    fn from(message: ClientMessage) -> Self {
        Self {
            message,
            error: None,
        }
    }
}

/// Outbound envelope encoded into a server text frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEnvelope {
    #[serde(flatten)]
    pub message: ServerMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerEnvelope {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            message,
            error: None,
        }
    }

    /// An `error` envelope carrying the given code.
    pub fn error(code: ErrorCode) -> Self {
        Self {
            message: ServerMessage::Error,
            error: Some(code.as_str().to_string()),
        }
    }

    /// Serialize once into a frozen buffer shared by every recipient.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        let mut buf = BytesMut::with_capacity(256).writer();
        serde_json::to_writer(&mut buf, self)?;
        Ok(buf.into_inner().freeze())
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl From<ServerMessage> for ServerEnvelope {
    fn from(message: ServerMessage) -> Self {
        Self::new(message)
    }
}
