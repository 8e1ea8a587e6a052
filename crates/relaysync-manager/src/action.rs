//! Relay commands and their two-byte wire form.

use serde::{Deserialize, Serialize};

use crate::error::{MessageFormatError, UnknownRequestError};

/// Wire size of an encoded [`RelayAction`].
pub const ACTION_WIRE_LEN: usize = 2;

/// Requested relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RelayRequest {
    /// Open the contacts.
    Off = 1 << 0,
    /// Close the contacts.
    On = 1 << 1,
}

impl RelayRequest {
    /// Raw request byte.
    #[must_use]
    pub fn to_raw(self) -> u8 {
        self as u8
    }

    /// Feedback-availability byte published after the action.
    #[must_use]
    pub fn feedback_byte(self) -> u8 {
        match self {
            RelayRequest::On => b'1',
            RelayRequest::Off => b'0',
        }
    }

    /// Lower-case name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelayRequest::On => "on",
            RelayRequest::Off => "off",
        }
    }
}

impl TryFrom<u8> for RelayRequest {
    type Error = UnknownRequestError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0x01 => Ok(RelayRequest::Off),
            0x02 => Ok(RelayRequest::On),
            other => Err(UnknownRequestError(other)),
        }
    }
}

impl std::fmt::Display for RelayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One switching command.
///
/// The request byte is kept raw so that commands arriving from the wire
/// travel unchanged through the queue; it is validated when the action is
/// executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayAction {
    /// Target relay.
    pub relay_id: u8,
    /// Raw request byte, see [`RelayRequest`].
    pub request: u8,
}

impl RelayAction {
    /// Command with an already validated request.
    #[must_use]
    pub fn new(relay_id: u8, request: RelayRequest) -> Self {
        Self {
            relay_id,
            request: request.to_raw(),
        }
    }

    /// Turn `relay_id` on.
    #[must_use]
    pub fn on(relay_id: u8) -> Self {
        Self::new(relay_id, RelayRequest::On)
    }

    /// Turn `relay_id` off.
    #[must_use]
    pub fn off(relay_id: u8) -> Self {
        Self::new(relay_id, RelayRequest::Off)
    }

    /// Validated request kind.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownRequestError`] if the request byte is neither on nor
    /// off.
    pub fn request(&self) -> Result<RelayRequest, UnknownRequestError> {
        RelayRequest::try_from(self.request)
    }

    /// Encode as `[relay_id, request]`.
    #[must_use]
    pub fn encode(&self) -> [u8; ACTION_WIRE_LEN] {
        [self.relay_id, self.request]
    }

    /// Decode `[relay_id, request]`.
    ///
    /// Only the length is checked here.
    ///
    /// # Errors
    ///
    /// Returns [`MessageFormatError`] if `bytes` is not exactly two bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageFormatError> {
        match bytes {
            [relay_id, request] => Ok(Self {
                relay_id: *relay_id,
                request: *request,
            }),
            _ => Err(MessageFormatError {
                expected: ACTION_WIRE_LEN,
                actual: bytes.len(),
            }),
        }
    }
}
