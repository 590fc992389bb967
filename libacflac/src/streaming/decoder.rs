use tracing::{debug, trace, warn};

use super::types::{AppendOutcome, DecoderState, ProduceOutcome, ProduceStatus};
use crate::config::CodecConfig;
use crate::core::{
    CodecError, CodecResult, PacketDescription, StreamFormat, StreamInfo,
    DEFAULT_FRAMES_PER_PACKET, MAX_CHANNELS, MAX_ESCAPE_HEADER_BYTES,
};
use crate::engine::{
    DecodeEngine, DecoderClient, EngineErrorKind, FrameHeader, ReadStatus, ReferenceDecoder,
    WriteStatus,
};
use crate::negotiate::{CodecRole, FormatNegotiator};
use crate::repack;

/// Largest packet the session will hold: a full frame of 32-bit words on every channel
pub const INPUT_BUFFER_BYTES: usize =
    DEFAULT_FRAMES_PER_PACKET as usize * MAX_CHANNELS as usize * 4;

/// FLAC packets in, PCM out
///
/// Exactly one packet is resident at a time. Each produce decodes it into
/// the caller's buffer and frees the slot for the next append.
pub struct DecoderSession<E: DecodeEngine = ReferenceDecoder> {
    negotiator: FormatNegotiator,
    config: CodecConfig,
    engine: E,
    state: DecoderState,
    packet: Vec<u8>,
    frames_decoded: u32,
}

/// Per-call context the engine reads from and writes into
struct PacketClient<'a> {
    packet: &'a [u8],
    read_pos: usize,
    out: &'a mut [u8],
    bit_depth: u32,
    channels: usize,
    frames_decoded: u32,
    write_error: Option<CodecError>,
    error_occurred: bool,
    report_errors: bool,
    stream_info: Option<StreamInfo>,
}

impl DecoderClient for PacketClient<'_> {
    fn read(&mut self, buffer: &mut [u8]) -> ReadStatus {
        let remaining = &self.packet[self.read_pos..];
        if buffer.is_empty() || remaining.is_empty() {
            return ReadStatus::Abort;
        }
        let n = remaining.len().min(buffer.len());
        buffer[..n].copy_from_slice(&remaining[..n]);
        self.read_pos += n;
        trace!(n, read_pos = self.read_pos, "engine read");
        ReadStatus::Continue(n)
    }

    fn write(&mut self, header: &FrameHeader, channels: &[Vec<i32>]) -> WriteStatus {
        if channels.len() != self.channels {
            self.write_error = Some(CodecError::EngineFailure(format!(
                "frame has {} channels, output has {}",
                channels.len(),
                self.channels
            )));
            return WriteStatus::Abort;
        }

        let frames = header.block_size as usize;
        match repack::pack_planar(channels, frames, self.bit_depth, self.out) {
            Ok(_) => {
                self.frames_decoded = header.block_size;
                trace!(frames, frame_number = header.frame_number, "engine decoded frame");
                WriteStatus::Continue
            }
            Err(e) => {
                self.write_error = Some(e);
                WriteStatus::Abort
            }
        }
    }

    fn metadata(&mut self, info: &StreamInfo) {
        debug!(?info, "engine reported stream info");
        self.stream_info = Some(*info);
    }

    fn error(&mut self, kind: EngineErrorKind) {
        self.error_occurred = true;
        if self.report_errors {
            warn!(?kind, "decode engine error");
        } else {
            debug!(?kind, "decode engine error");
        }
    }
}

impl DecoderSession<ReferenceDecoder> {
    /// Create a decoder session backed by the reference engine
    pub fn new(config: CodecConfig) -> CodecResult<Self> {
        Self::with_engine(ReferenceDecoder::new(), config)
    }
}

impl<E: DecodeEngine> DecoderSession<E> {
    /// Create a decoder session around any engine
    pub fn with_engine(engine: E, config: CodecConfig) -> CodecResult<Self> {
        config.validate()?;
        Ok(Self {
            negotiator: FormatNegotiator::new(CodecRole::Decoder, config.frames_per_packet),
            config,
            engine,
            state: DecoderState::Empty,
            packet: Vec::new(),
            frames_decoded: 0,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn negotiator(&self) -> &FormatNegotiator {
        &self.negotiator
    }

    pub(crate) fn negotiator_mut(&mut self) -> &mut FormatNegotiator {
        &mut self.negotiator
    }

    pub fn input_format(&self) -> &StreamFormat {
        self.negotiator.input_format()
    }

    pub fn output_format(&self) -> &StreamFormat {
        self.negotiator.output_format()
    }

    pub fn is_initialized(&self) -> bool {
        self.negotiator.is_initialized()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes of the resident packet
    pub fn bytes_buffered(&self) -> usize {
        self.packet.len()
    }

    /// Frames the last produce decoded
    pub fn frames_decoded(&self) -> u32 {
        self.frames_decoded
    }

    pub fn set_input_format(&mut self, format: &StreamFormat) -> CodecResult<()> {
        self.negotiator.set_input_format(format)
    }

    pub fn set_output_format(&mut self, format: &StreamFormat) -> CodecResult<()> {
        self.negotiator.set_output_format(format)
    }

    pub fn set_magic_cookie(&mut self, blob: &[u8]) -> CodecResult<()> {
        self.negotiator.set_magic_cookie(blob)
    }

    pub fn magic_cookie(&mut self, capacity: usize) -> CodecResult<Vec<u8>> {
        self.negotiator.magic_cookie(capacity)
    }

    /// Nominal frames per packet of the input stream
    pub fn frames_per_packet(&self) -> u32 {
        match self.negotiator.input_format().frames_per_packet {
            0 => self.negotiator.frames_per_packet(),
            fpp => fpp,
        }
    }

    /// Upper bound for one input packet
    pub fn max_packet_bytes(&self) -> u32 {
        self.frames_per_packet()
            * self.negotiator.input_format().channels_per_frame
            * (self.negotiator.output_format().bits_per_channel >> 3)
            + MAX_ESCAPE_HEADER_BYTES
    }

    /// Output bytes a produce call needs
    pub fn required_output_bytes(&self) -> usize {
        let max_blocksize = self
            .negotiator
            .stream_info()
            .map(|info| info.max_blocksize)
            .filter(|&b| b > 0)
            .unwrap_or_else(|| self.frames_per_packet());
        max_blocksize as usize * self.negotiator.output_format().bytes_per_frame as usize
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Negotiate formats, then start the engine
    ///
    /// A cookie alone is enough: both formats are then derived from it.
    pub fn initialize(
        &mut self,
        input: Option<&StreamFormat>,
        output: Option<&StreamFormat>,
        magic_cookie: Option<&[u8]>,
    ) -> CodecResult<()> {
        self.negotiator.initialize(input, output, magic_cookie)?;

        if !self.engine.init() {
            self.negotiator.uninitialize();
            return Err(CodecError::state(format!(
                "decode engine failed to start (state {:?})",
                self.engine.state()
            )));
        }

        self.clear_packet();
        self.frames_decoded = 0;
        debug!(
            frames_per_packet = self.frames_per_packet(),
            output_bits = self.negotiator.bit_depth(),
            "decoder session initialized"
        );
        Ok(())
    }

    /// Drop the resident packet and rewind the engine
    pub fn reset(&mut self) {
        self.clear_packet();
        self.frames_decoded = 0;
        if !self.engine.reset() {
            debug!("decode engine reset before initialization");
        }
        debug!("decoder session reset");
    }

    pub fn uninitialize(&mut self) {
        if self.is_initialized() {
            self.engine.finish();
        }
        self.clear_packet();
        self.frames_decoded = 0;
        self.negotiator.uninitialize();
        debug!("decoder session uninitialized");
    }

    fn clear_packet(&mut self) {
        self.packet.clear();
        self.state = DecoderState::Empty;
    }

    // ========================================================================
    // Data path
    // ========================================================================

    /// Take at most one packet from `data`
    ///
    /// With a description, the packet is `data_byte_size` bytes at
    /// `start_offset`. Without one, all of `data` is the packet.
    pub fn append(
        &mut self,
        data: &[u8],
        packets: u32,
        description: Option<&PacketDescription>,
    ) -> CodecResult<AppendOutcome> {
        if !self.is_initialized() {
            return Err(CodecError::state("append before initialization"));
        }
        if packets == 0 || data.is_empty() || self.state == DecoderState::Loaded {
            return Ok(AppendOutcome::default());
        }

        let (start, size) = match description {
            Some(desc) => {
                let start = desc.start_offset as usize;
                let size = desc.data_byte_size as usize;
                if size == 0 || start.saturating_add(size) > data.len() {
                    debug!(?desc, len = data.len(), "packet description points past the data");
                    return Ok(AppendOutcome::default());
                }
                (start, size)
            }
            None => (0, data.len()),
        };

        if size > INPUT_BUFFER_BYTES {
            debug!(size, "packet larger than the input buffer");
            return Ok(AppendOutcome::default());
        }

        self.packet.clear();
        self.packet.extend_from_slice(&data[start..start + size]);
        self.state = DecoderState::Loaded;
        trace!(size, start, "packet loaded");

        Ok(AppendOutcome {
            bytes_consumed: start + size,
            packets: 1,
        })
    }

    /// Decode the resident packet into `out`
    pub fn produce(&mut self, out: &mut [u8], requested_packets: u32) -> CodecResult<ProduceOutcome> {
        if !self.is_initialized() {
            return Err(CodecError::state("produce before initialization"));
        }
        if requested_packets == 0 || self.state != DecoderState::Loaded {
            return Ok(ProduceOutcome::empty(ProduceStatus::NeedsMoreInput));
        }

        let required = self.required_output_bytes();
        if out.len() < required {
            self.clear_packet();
            return Err(CodecError::NotEnoughBufferSpace {
                needed: required,
                available: out.len(),
            });
        }

        let output = *self.negotiator.output_format();
        let packet = std::mem::take(&mut self.packet);
        let mut client = PacketClient {
            packet: &packet,
            read_pos: 0,
            out,
            bit_depth: output.bits_per_channel,
            channels: output.channels_per_frame as usize,
            frames_decoded: 0,
            write_error: None,
            error_occurred: false,
            report_errors: self.config.report_engine_errors,
            stream_info: None,
        };

        let ok = self.engine.process_single(&mut client);
        let engine_state = self.engine.state();
        let frames = client.frames_decoded;
        let write_error = client.write_error.take();
        let error_occurred = client.error_occurred;
        if let Some(info) = client.stream_info {
            if self.negotiator.stream_info().is_none() {
                self.negotiator.record_stream_info(info);
            }
        }

        // the packet slot is free again whatever happened
        self.packet = packet;
        self.clear_packet();

        // a failed packet must not poison the next one
        if write_error.is_some() || !ok {
            self.engine.flush();
        }

        if let Some(e) = write_error {
            self.frames_decoded = 0;
            return Err(e);
        }
        if !ok {
            self.frames_decoded = 0;
            return Err(CodecError::EngineFailure(format!(
                "engine failed decoding packet (state {:?}, error reported: {})",
                engine_state,
                error_occurred
            )));
        }

        self.frames_decoded = frames;
        let status = if frames != self.frames_per_packet() {
            self.engine.flush();
            debug!(frames, "short frame, end of stream");
            ProduceStatus::AtEndOfStream
        } else {
            ProduceStatus::Success
        };

        let bytes_written = frames as usize * output.bytes_per_frame as usize;
        trace!(frames, bytes_written, ?status, "produce");
        Ok(ProduceOutcome {
            status,
            bytes_written,
            packets: frames,
            description: None,
        })
    }
}
