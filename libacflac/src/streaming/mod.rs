//! packet sessions for both codec roles
//!
//! Each session buffers at most one packet and drives its engine one frame
//! per produce call, so a host can pump audio through with fixed size buffers.
mod decoder;
mod encoder;
mod types;

pub use decoder::{DecoderSession, INPUT_BUFFER_BYTES};
pub use encoder::EncoderSession;
pub use types::{AppendOutcome, DecoderState, EncoderState, ProduceOutcome, ProduceStatus};

#[cfg(test)]
mod tests;
