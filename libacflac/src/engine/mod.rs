//! contract between the packet sessions and a frame codec engine
//!
//! The engine is callback driven: while a session runs it, the engine pulls
//! encoded bytes and pushes its output through the client the session hands
//! in for that call. Nothing is stored in globals, so any number of sessions
//! can run side by side.

pub mod reference;

use crate::core::StreamInfo;

pub use reference::{ReferenceDecoder, ReferenceEncoder};

/// answer to an engine write upcall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Continue,
    Abort,
}

/// answer to an engine read upcall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// this many bytes were copied into the buffer
    Continue(usize),
    /// no more input for this call
    Abort,
}

/// lifecycle state the engine reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Ok,
    EndOfStream,
    Aborted,
    Error,
}

/// problems a decode engine reports through its error upcall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    LostSync,
    BadHeader,
    FrameCorrupted,
    UnparseableStream,
}

/// parameters an encode engine is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderParams {
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub block_size: u32,
    pub compression_level: u32,
}

/// header of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub block_size: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub frame_number: u64,
}

/// receives what an encode engine produces
pub trait EncoderSink {
    /// an encoded byte run, `samples == 0` marks stream header bytes
    fn write(&mut self, bytes: &[u8], samples: u32, current_frame: u32) -> WriteStatus;

    /// final stream statistics
    fn metadata(&mut self, info: &StreamInfo);
}

/// feeds and receives a decode engine
pub trait DecoderClient {
    fn read(&mut self, buffer: &mut [u8]) -> ReadStatus;

    /// one decoded frame, one slice per channel
    fn write(&mut self, header: &FrameHeader, channels: &[Vec<i32>]) -> WriteStatus;

    fn metadata(&mut self, info: &StreamInfo);

    fn error(&mut self, kind: EngineErrorKind);
}

/// frame encoder driven by [`EncoderSession`](crate::EncoderSession)
pub trait EncodeEngine {
    /// configure for a new stream
    fn init(&mut self, params: &EncoderParams, sink: &mut dyn EncoderSink) -> bool;

    /// encode `frames` interleaved frames as one block
    fn process_interleaved(
        &mut self,
        samples: &[i32],
        frames: usize,
        sink: &mut dyn EncoderSink,
    ) -> bool;

    /// finish the stream and report the final statistics
    fn finish(&mut self, sink: &mut dyn EncoderSink) -> bool;

    fn state(&self) -> EngineState;
}

/// frame decoder driven by [`DecoderSession`](crate::DecoderSession)
pub trait DecodeEngine {
    fn init(&mut self) -> bool;

    /// decode at most one frame pulled through `client`
    fn process_single(&mut self, client: &mut dyn DecoderClient) -> bool;

    /// drop buffered input and decode state, keep the stream parameters
    fn flush(&mut self) -> bool;

    /// back to the start of a stream
    fn reset(&mut self) -> bool;

    fn finish(&mut self) -> bool;

    fn state(&self) -> EngineState;
}
