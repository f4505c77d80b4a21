//! Protocol messages carried inside frames.
//!
//! The client sends a [`Handshake`] and then [`Command`]s; the companion
//! answers with [`Dispatch`]es. Payloads the client does not interpret stay
//! as raw JSON values.

use crate::{Activity, Frame, FrameError, InboundEvent, Opcode, User};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Protocol version sent in the handshake and expected back in READY.
pub const RPC_VERSION: u32 = 1;

/// First frame on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}

impl Handshake {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: RPC_VERSION,
            client_id: client_id.into(),
        }
    }

    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::json(Opcode::Handshake, self)
    }
}

/// Client-to-companion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evt: Option<String>,
    #[serde(default)]
    pub args: Value,
    pub nonce: String,
}

impl Command {
    pub const SET_ACTIVITY: &'static str = "SET_ACTIVITY";
    pub const SUBSCRIBE: &'static str = "SUBSCRIBE";

    /// Replace the presence shown for process `pid`. `None` clears it.
    pub fn set_activity(pid: u32, activity: Option<&Activity>, nonce: impl Into<String>) -> Self {
        Self {
            cmd: Self::SET_ACTIVITY.to_string(),
            evt: None,
            args: json!({ "pid": pid, "activity": activity }),
            nonce: nonce.into(),
        }
    }

    /// Ask the companion to forward events named `evt`.
    pub fn subscribe(evt: &str, nonce: impl Into<String>) -> Self {
        Self {
            cmd: Self::SUBSCRIBE.to_string(),
            evt: Some(evt.to_string()),
            args: json!({}),
            nonce: nonce.into(),
        }
    }

    /// The activity carried by a `SET_ACTIVITY` command.
    ///
    /// `Ok(None)` for other commands or for a clear.
    pub fn activity(&self) -> Result<Option<Activity>, FrameError> {
        if self.cmd != Self::SET_ACTIVITY {
            return Ok(None);
        }
        match self.args.get("activity") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::json(Opcode::Frame, self)
    }
}

/// Companion-to-client message: a response to a command, or an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evt: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Payload of the READY event that completes a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    pub v: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Payload of a close frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl Dispatch {
    pub const DISPATCH: &'static str = "DISPATCH";
    pub const READY: &'static str = "READY";
    pub const ERROR: &'static str = "ERROR";
    pub const ACTIVITY_JOIN: &'static str = "ACTIVITY_JOIN";
    pub const ACTIVITY_SPECTATE: &'static str = "ACTIVITY_SPECTATE";
    pub const ACTIVITY_JOIN_REQUEST: &'static str = "ACTIVITY_JOIN_REQUEST";

    /// An unsolicited event.
    pub fn event(evt: &str, data: Value) -> Self {
        Self {
            cmd: Self::DISPATCH.to_string(),
            evt: Some(evt.to_string()),
            data,
            nonce: None,
        }
    }

    pub fn ready(ready: &Ready) -> Self {
        Self::event(Self::READY, json!(ready))
    }

    /// The acknowledgement of `command`.
    pub fn reply(command: &Command, data: Value) -> Self {
        Self {
            cmd: command.cmd.clone(),
            evt: None,
            data,
            nonce: Some(command.nonce.clone()),
        }
    }

    /// The READY payload, if this is the handshake answer.
    pub fn as_ready(&self) -> Option<Ready> {
        if self.cmd != Self::DISPATCH || self.evt.as_deref() != Some(Self::READY) {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Translate into an application event.
    ///
    /// Command acknowledgements and events the client did not subscribe to
    /// yield `None`.
    pub fn to_event(&self) -> Option<InboundEvent> {
        let secret = || self.data.get("secret")?.as_str().map(str::to_string);

        match self.evt.as_deref()? {
            Self::ACTIVITY_JOIN => Some(InboundEvent::Join { secret: secret()? }),
            Self::ACTIVITY_SPECTATE => Some(InboundEvent::SpectateRequest { secret: secret()? }),
            Self::ACTIVITY_JOIN_REQUEST => {
                let user = serde_json::from_value(self.data.get("user")?.clone()).ok()?;
                Some(InboundEvent::JoinRequest { user })
            }
            Self::ERROR => Some(InboundEvent::Error {
                code: self.data.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: self
                    .data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            _ => None,
        }
    }

    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::json(Opcode::Frame, self)
    }
}

impl CloseReason {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::json(Opcode::Close, self)
    }
}
