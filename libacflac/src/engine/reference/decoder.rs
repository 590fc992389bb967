use tracing::{debug, trace};

use super::predictor::{from_mid_side, reconstruct_fixed};
use super::{
    FLAG_MID_SIDE, FRAME_HEADER_SIZE, FRAME_SYNC, MAX_FIXED_ORDER, STREAM_MARKER,
    SUBBLOCK_CONSTANT,
};
use crate::cookie::{read_stream_info, STREAM_INFO_SIZE};
use crate::core::cursor::Cursor;
use crate::core::{rice, StreamInfo, MAX_CHANNELS};
use crate::engine::{
    DecodeEngine, DecoderClient, EngineErrorKind, EngineState, FrameHeader, ReadStatus,
    WriteStatus,
};

const READ_CHUNK: usize = 4096;

/// reference decode engine
pub struct ReferenceDecoder {
    state: EngineState,
    pending: Vec<u8>,
    frame_number: u64,
    stream_info: Option<StreamInfo>,
}

impl ReferenceDecoder {
    pub fn new() -> Self {
        ReferenceDecoder {
            state: EngineState::Uninitialized,
            pending: Vec::new(),
            frame_number: 0,
            stream_info: None,
        }
    }

    /// stream info seen in a stream header, if any
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    /// pull everything the client has for this call
    fn fill(&mut self, client: &mut dyn DecoderClient) {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match client.read(&mut chunk) {
                ReadStatus::Continue(0) | ReadStatus::Abort => break,
                ReadStatus::Continue(n) => self.pending.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// consume a stream header at the front of the pending bytes
    fn take_stream_header(&mut self, client: &mut dyn DecoderClient) -> Result<(), EngineErrorKind> {
        if !self.pending.starts_with(&STREAM_MARKER) {
            return Ok(());
        }
        let end = STREAM_MARKER.len() + STREAM_INFO_SIZE;
        let info = self
            .pending
            .get(STREAM_MARKER.len()..end)
            .and_then(read_stream_info)
            .ok_or(EngineErrorKind::UnparseableStream)?;

        debug!(?info, "reference decoder stream header");
        self.pending.drain(..end);
        self.stream_info = Some(info);
        client.metadata(&info);
        Ok(())
    }
}

impl Default for ReferenceDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one frame, returning its header, channels and byte length
fn parse_frame(data: &[u8]) -> Result<(FrameHeader, Vec<Vec<i32>>, usize), EngineErrorKind> {
    if !data.starts_with(&FRAME_SYNC) {
        return Err(EngineErrorKind::LostSync);
    }
    if data.len() < FRAME_HEADER_SIZE {
        return Err(EngineErrorKind::BadHeader);
    }

    let mut cursor = Cursor::new(data);
    cursor.skip(FRAME_SYNC.len()).ok_or(EngineErrorKind::BadHeader)?;
    let block_size = cursor.read_u16_be().ok_or(EngineErrorKind::BadHeader)? as usize;
    let channels = cursor.read_u8().ok_or(EngineErrorKind::BadHeader)? as usize;
    let bits = cursor.read_u8().ok_or(EngineErrorKind::BadHeader)? as u32;
    let flags = cursor.read_u8().ok_or(EngineErrorKind::BadHeader)?;

    if channels == 0 || channels > MAX_CHANNELS as usize || block_size == 0 {
        return Err(EngineErrorKind::BadHeader);
    }
    let mid_side = flags & FLAG_MID_SIDE != 0;
    if mid_side && channels != 2 {
        return Err(EngineErrorKind::BadHeader);
    }

    let mut decoded: Vec<Vec<i64>> = Vec::with_capacity(channels);
    for _ in 0..channels {
        decoded.push(decode_channel(&mut cursor, block_size)?);
    }

    if mid_side {
        let (left, right) =
            from_mid_side(&decoded[0], &decoded[1]).ok_or(EngineErrorKind::FrameCorrupted)?;
        decoded = vec![left, right];
    }

    let channel_data = decoded
        .into_iter()
        .map(|ch| {
            ch.into_iter()
                .map(|s| i32::try_from(s).map_err(|_| EngineErrorKind::FrameCorrupted))
                .collect::<Result<Vec<i32>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let header = FrameHeader {
        block_size: block_size as u32,
        channels: channels as u32,
        bits_per_sample: bits,
        frame_number: 0,
    };
    Ok((header, channel_data, cursor.position()))
}

fn decode_channel(cursor: &mut Cursor, block_size: usize) -> Result<Vec<i64>, EngineErrorKind> {
    let kind = cursor.read_u8().ok_or(EngineErrorKind::FrameCorrupted)?;
    if kind == SUBBLOCK_CONSTANT {
        let raw = cursor.read_bytes(8).ok_or(EngineErrorKind::FrameCorrupted)?;
        let mut value = [0u8; 8];
        value.copy_from_slice(raw);
        return Ok(vec![i64::from_be_bytes(value); block_size]);
    }

    let order = kind as usize;
    if order > MAX_FIXED_ORDER {
        return Err(EngineErrorKind::FrameCorrupted);
    }
    let k = cursor.read_u8().ok_or(EngineErrorKind::FrameCorrupted)?;
    if k > rice::MAX_PARAMETER {
        return Err(EngineErrorKind::FrameCorrupted);
    }
    let len = cursor.read_u32_be().ok_or(EngineErrorKind::FrameCorrupted)? as usize;
    let encoded = cursor.read_bytes(len).ok_or(EngineErrorKind::FrameCorrupted)?;

    let residuals = rice::decode(encoded, k, block_size).ok_or(EngineErrorKind::FrameCorrupted)?;
    reconstruct_fixed(&residuals, order).ok_or(EngineErrorKind::FrameCorrupted)
}

impl DecodeEngine for ReferenceDecoder {
    fn init(&mut self) -> bool {
        *self = ReferenceDecoder::new();
        self.state = EngineState::Ok;
        true
    }

    fn process_single(&mut self, client: &mut dyn DecoderClient) -> bool {
        if self.state != EngineState::Ok {
            return false;
        }

        self.fill(client);

        if let Err(kind) = self.take_stream_header(client) {
            client.error(kind);
            self.pending.clear();
            return false;
        }
        if self.pending.is_empty() {
            return true;
        }

        match parse_frame(&self.pending) {
            Ok((mut header, channels, used)) => {
                header.frame_number = self.frame_number;
                self.frame_number += 1;
                self.pending.drain(..used);
                trace!(block_size = header.block_size, used, "reference decoder frame");

                if client.write(&header, &channels) == WriteStatus::Abort {
                    self.state = EngineState::Aborted;
                    return false;
                }
                true
            }
            Err(kind) => {
                client.error(kind);
                self.pending.clear();
                false
            }
        }
    }

    fn flush(&mut self) -> bool {
        self.pending.clear();
        if self.state != EngineState::Uninitialized {
            self.state = EngineState::Ok;
        }
        true
    }

    fn reset(&mut self) -> bool {
        self.pending.clear();
        self.frame_number = 0;
        self.stream_info = None;
        if self.state == EngineState::Uninitialized {
            return false;
        }
        self.state = EngineState::Ok;
        true
    }

    fn finish(&mut self) -> bool {
        *self = ReferenceDecoder::new();
        true
    }

    fn state(&self) -> EngineState {
        self.state
    }
}
