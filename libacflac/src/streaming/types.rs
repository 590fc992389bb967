//! Streaming types and enums

use crate::core::PacketDescription;

/// Encoder frame buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderState {
    /// Nothing buffered
    #[default]
    Empty,
    /// Holding part of a frame
    Accepting,
    /// One whole frame resident, appends are refused
    Full,
    /// End of stream marked, a partial frame may still be resident
    Flushing,
    /// Final packet produced
    Finished,
}

/// Decoder packet buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// No packet resident
    #[default]
    Empty,
    /// One packet waiting for produce
    Loaded,
}

/// Outcome of a produce call that is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProduceStatus {
    Success,
    /// Success, and at least one more packet can be produced without input
    ///
    /// Advisory. The one-frame sessions in this crate never return it.
    SuccessHasMore,
    NeedsMoreInput,
    AtEndOfStream,
}

/// What an append call took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendOutcome {
    /// Bytes of the caller's buffer consumed
    pub bytes_consumed: usize,
    /// Packets accepted
    pub packets: u32,
}

/// What a produce call wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProduceOutcome {
    pub status: ProduceStatus,
    /// Bytes written to the caller's buffer
    pub bytes_written: usize,
    /// Packets written
    pub packets: u32,
    /// Encoder only, describes the packet written
    pub description: Option<PacketDescription>,
}

impl ProduceOutcome {
    pub(crate) fn empty(status: ProduceStatus) -> Self {
        ProduceOutcome {
            status,
            bytes_written: 0,
            packets: 0,
            description: None,
        }
    }
}
