//! error type shared by every session and codec helper

use thiserror::Error;

use super::types::fourcc;

/// errors a codec session can raise
///
/// Expected outcomes such as "needs more input" or "end of stream" are
/// [`ProduceStatus`](crate::ProduceStatus) values, never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    // ============ Negotiation ============
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ============ Property surface ============
    #[error("Bad property size: {0}")]
    BadPropertySize(String),

    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    // ============ Session state ============
    #[error("Invalid state: {0}")]
    StateError(String),

    #[error("Not enough buffer space: need {needed} bytes, have {available}")]
    NotEnoughBufferSpace { needed: usize, available: usize },

    // ============ Engine ============
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    // ============ Settings ============
    #[error("Settings error: {0}")]
    Settings(String),
}

impl CodecError {
    /// four-character status code the host understands
    pub fn status_code(&self) -> u32 {
        match self {
            CodecError::UnsupportedFormat(_) => fourcc(b"!dat"),
            CodecError::BadPropertySize(_) => fourcc(b"!siz"),
            CodecError::IllegalOperation(_) => fourcc(b"unop"),
            CodecError::UnknownProperty(_) => fourcc(b"who?"),
            CodecError::StateError(_) => fourcc(b"!stt"),
            CodecError::NotEnoughBufferSpace { .. } => fourcc(b"!buf"),
            CodecError::EngineFailure(_) | CodecError::Settings(_) => fourcc(b"what"),
        }
    }

    /// the status code as its four characters, e.g. `!dat`
    pub fn status_tag(&self) -> String {
        self.status_code()
            .to_be_bytes()
            .iter()
            .map(|&b| b as char)
            .collect()
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        CodecError::UnsupportedFormat(msg.into())
    }

    pub fn bad_size(msg: impl Into<String>) -> Self {
        CodecError::BadPropertySize(msg.into())
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        CodecError::IllegalOperation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        CodecError::StateError(msg.into())
    }
}

impl From<rmp_serde::encode::Error> for CodecError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        CodecError::Settings(format!("MessagePack encode: {}", e))
    }
}

impl From<rmp_serde::decode::Error> for CodecError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        CodecError::Settings(format!("MessagePack decode: {}", e))
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Settings(format!("JSON: {}", e))
    }
}

/// result alias used across the crate
pub type CodecResult<T> = Result<T, CodecError>;
