use crate::protocol::response;

/// The error taxonomy for request parsing, one variant per wire-visible
/// outcome. Exact `CLIENT_ERROR <reason>` strings are a diagnostic surface,
/// not a stable API.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("wrong command format")]
    ShortFrame,

    #[error("unknown command")]
    UnknownCommand,

    #[error("key length exceeds 250 character limit")]
    OversizeKey,

    #[error("wrong bytes format")]
    OversizeValue,

    #[error("{0}")]
    Malformed(String),
}

impl ProtocolError {
    /// Renders the wire-level reply bytes for this error.
    pub fn to_reply(&self) -> Vec<u8> {
        match self {
            ProtocolError::ShortFrame => response::wrong_command_format(),
            ProtocolError::UnknownCommand => response::error(),
            ProtocolError::OversizeKey => {
                response::client_error("key length exceeds 250 character limit")
            }
            ProtocolError::OversizeValue => response::client_error("wrong bytes format"),
            ProtocolError::Malformed(reason) => response::client_error(reason),
        }
    }
}
