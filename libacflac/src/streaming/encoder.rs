use tracing::{debug, trace};

use super::types::{AppendOutcome, EncoderState, ProduceOutcome, ProduceStatus};
use crate::config::{CodecConfig, EncoderSettings};
use crate::core::{
    CodecError, CodecResult, PacketDescription, StreamFormat, StreamInfo,
    MAX_COMPRESSION_QUALITY, MAX_ESCAPE_HEADER_BYTES,
};
use crate::engine::{EncodeEngine, EncoderParams, EncoderSink, ReferenceEncoder, WriteStatus};
use crate::negotiate::{CodecRole, FormatNegotiator};
use crate::repack;

/// PCM in, one FLAC frame per packet out
///
/// The session buffers exactly one nominal frame of input. Once it is full,
/// appends are refused until [`produce`](Self::produce) hands the frame to the
/// engine. An empty append marks the end of the stream and the next produce
/// encodes whatever partial frame is left.
pub struct EncoderSession<E: EncodeEngine = ReferenceEncoder> {
    negotiator: FormatNegotiator,
    config: CodecConfig,
    engine: E,
    quality: u32,
    state: EncoderState,
    input_buffer: Vec<u8>,
    bytes_used: usize,
    samples: Vec<i32>,
    samples_converted: usize,
    max_packet_bytes: u32,
    total_bytes_generated: u64,
    trailing_frames: u32,
}

/// Where the engine's output lands during one produce call
struct PacketSink<'a> {
    out: &'a mut [u8],
    written: usize,
    required: usize,
    stream_info: Option<StreamInfo>,
}

impl<'a> PacketSink<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        PacketSink {
            out,
            written: 0,
            required: 0,
            stream_info: None,
        }
    }

    fn overflowed(&self) -> bool {
        self.required > self.written
    }
}

impl EncoderSink for PacketSink<'_> {
    fn write(&mut self, bytes: &[u8], samples: u32, current_frame: u32) -> WriteStatus {
        // stream header bytes are not part of any packet
        if samples == 0 {
            trace!(len = bytes.len(), "dropping stream header bytes");
            return WriteStatus::Continue;
        }

        // once a run has been dropped nothing after it may land
        let end = self.written + bytes.len();
        if !self.overflowed() && end <= self.out.len() {
            self.out[self.written..end].copy_from_slice(bytes);
            self.written = end;
        }
        self.required += bytes.len();
        trace!(len = bytes.len(), samples, current_frame, "engine wrote frame");
        WriteStatus::Continue
    }

    fn metadata(&mut self, info: &StreamInfo) {
        debug!(?info, "engine reported stream info");
        self.stream_info = Some(*info);
    }
}

/// Swallows everything the engine writes while it starts up
struct DiscardSink;

impl EncoderSink for DiscardSink {
    fn write(&mut self, bytes: &[u8], _samples: u32, _current_frame: u32) -> WriteStatus {
        trace!(len = bytes.len(), "discarding engine start-up bytes");
        WriteStatus::Continue
    }

    fn metadata(&mut self, _info: &StreamInfo) {}
}

impl EncoderSession<ReferenceEncoder> {
    /// Create an encoder session backed by the reference engine
    pub fn new(config: CodecConfig) -> CodecResult<Self> {
        Self::with_engine(ReferenceEncoder::new(), config)
    }
}

impl<E: EncodeEngine> EncoderSession<E> {
    /// Create an encoder session around any engine
    pub fn with_engine(engine: E, config: CodecConfig) -> CodecResult<Self> {
        config.validate()?;
        Ok(Self {
            negotiator: FormatNegotiator::new(CodecRole::Encoder, config.frames_per_packet),
            quality: config.quality,
            config,
            engine,
            state: EncoderState::Empty,
            input_buffer: Vec::new(),
            bytes_used: 0,
            samples: Vec::new(),
            samples_converted: 0,
            max_packet_bytes: 0,
            total_bytes_generated: 0,
            trailing_frames: 0,
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

    pub fn input_format(&self) -> &StreamFormat {
        self.negotiator.input_format()
    }

    pub fn output_format(&self) -> &StreamFormat {
        self.negotiator.output_format()
    }

    pub fn is_initialized(&self) -> bool {
        self.negotiator.is_initialized()
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Bytes buffered toward the current frame
    pub fn bytes_buffered(&self) -> usize {
        self.bytes_used
    }

    /// Total packet bytes produced since initialization
    pub fn total_bytes_generated(&self) -> u64 {
        self.total_bytes_generated
    }

    /// Padding frames of the last packet produced
    pub fn trailing_frames(&self) -> u32 {
        self.trailing_frames
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn set_input_format(&mut self, format: &StreamFormat) -> CodecResult<()> {
        self.negotiator.set_input_format(format)
    }

    pub fn set_output_format(&mut self, format: &StreamFormat) -> CodecResult<()> {
        self.negotiator.set_output_format(format)
    }

    pub fn set_magic_cookie(&mut self, blob: &[u8]) -> CodecResult<()> {
        self.negotiator.set_magic_cookie(blob)
    }

    pub(crate) fn negotiator_mut(&mut self) -> &mut FormatNegotiator {
        &mut self.negotiator
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Set the compression level, values above 8 are ignored
    pub fn set_quality(&mut self, quality: u32) -> CodecResult<()> {
        if self.is_initialized() {
            return Err(CodecError::illegal(
                "quality cannot change after initialization",
            ));
        }
        if quality > MAX_COMPRESSION_QUALITY {
            debug!(quality, "ignoring out of range quality");
            return Ok(());
        }
        self.quality = quality;
        Ok(())
    }

    /// Settings dictionary for the current quality
    pub fn settings(&self) -> EncoderSettings {
        EncoderSettings::for_quality(self.quality)
    }

    /// Apply a parsed settings dictionary
    pub fn apply_settings(&mut self, settings: &EncoderSettings) -> CodecResult<()> {
        match settings.compression_level() {
            Some(level) => self.set_quality(level),
            None => {
                if self.is_initialized() {
                    return Err(CodecError::illegal(
                        "settings cannot change after initialization",
                    ));
                }
                debug!(name = %settings.top_level_name, "settings carry no compression level");
                Ok(())
            }
        }
    }

    /// Serialize the cookie into a buffer of `capacity` bytes
    pub fn magic_cookie(&mut self, capacity: usize) -> CodecResult<Vec<u8>> {
        self.negotiator.magic_cookie(capacity)
    }

    /// Upper bound for one packet
    pub fn max_packet_bytes(&self) -> u32 {
        let input = self.negotiator.input_format();
        let nominal = self.frames_per_packet() as u32
            * input.channels_per_frame
            * (self.negotiator.bit_depth() >> 3)
            + MAX_ESCAPE_HEADER_BYTES;
        self.max_packet_bytes.max(nominal)
    }

    /// Nominal frames per packet
    pub fn frames_per_packet(&self) -> usize {
        match self.negotiator.output_format().frames_per_packet {
            0 => self.negotiator.frames_per_packet() as usize,
            fpp => fpp as usize,
        }
    }

    fn bytes_per_frame(&self) -> usize {
        self.negotiator.input_format().bytes_per_frame as usize
    }

    fn packet_bytes(&self) -> usize {
        self.frames_per_packet() * self.bytes_per_frame()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Negotiate formats, then configure the engine
    pub fn initialize(
        &mut self,
        input: Option<&StreamFormat>,
        output: Option<&StreamFormat>,
        magic_cookie: Option<&[u8]>,
    ) -> CodecResult<()> {
        self.negotiator.initialize(input, output, magic_cookie)?;

        let fpp = self.frames_per_packet();
        if fpp > u16::MAX as usize {
            self.negotiator.uninitialize();
            return Err(CodecError::unsupported(format!(
                "{} frames per packet exceeds the frame size limit",
                fpp
            )));
        }

        if let Err(e) = self.start_engine() {
            self.negotiator.uninitialize();
            return Err(e);
        }

        self.input_buffer = vec![0u8; self.packet_bytes()];
        let channels = self.negotiator.input_format().channels_per_frame as usize;
        self.samples = vec![0i32; fpp * channels];
        self.clear_buffers();
        self.max_packet_bytes = 0;
        self.total_bytes_generated = 0;
        self.trailing_frames = 0;
        debug!(
            frames_per_packet = fpp,
            quality = self.quality,
            "encoder session initialized"
        );
        Ok(())
    }

    fn start_engine(&mut self) -> CodecResult<()> {
        let input = self.negotiator.input_format();
        let params = EncoderParams {
            sample_rate: input.sample_rate as u32,
            channels: input.channels_per_frame,
            bits_per_sample: self.negotiator.bit_depth(),
            block_size: self.frames_per_packet() as u32,
            compression_level: self.quality,
        };

        if self.engine.init(&params, &mut DiscardSink) {
            Ok(())
        } else {
            Err(CodecError::unsupported(format!(
                "engine rejected {:?} (state {:?})",
                params,
                self.engine.state()
            )))
        }
    }

    /// Drop buffered input and start a new stream with the same formats
    pub fn reset(&mut self) -> CodecResult<()> {
        self.clear_buffers();
        self.total_bytes_generated = 0;
        self.trailing_frames = 0;
        if self.is_initialized() {
            self.engine.finish(&mut DiscardSink);
            self.start_engine()?;
        }
        debug!("encoder session reset");
        Ok(())
    }

    /// Finish the engine and thaw the formats
    pub fn uninitialize(&mut self) {
        self.clear_buffers();
        self.total_bytes_generated = 0;
        self.trailing_frames = 0;
        if self.is_initialized() {
            self.engine.finish(&mut DiscardSink);
        }
        self.negotiator.uninitialize();
        debug!("encoder session uninitialized");
    }

    fn clear_buffers(&mut self) {
        self.state = EncoderState::Empty;
        self.bytes_used = 0;
        self.samples_converted = 0;
    }

    // ========================================================================
    // Data path
    // ========================================================================

    /// Buffer PCM toward the next frame, an empty slice marks end of stream
    pub fn append(&mut self, data: &[u8]) -> CodecResult<AppendOutcome> {
        if !self.is_initialized() {
            return Err(CodecError::state("append before initialization"));
        }
        match self.state {
            EncoderState::Finished => {
                return Err(CodecError::state("append after the stream finished"))
            }
            EncoderState::Flushing if !data.is_empty() => {
                return Err(CodecError::state("append while a flush is pending"))
            }
            EncoderState::Flushing => return Ok(AppendOutcome::default()),
            _ => {}
        }

        let packet_bytes = self.packet_bytes();
        if self.bytes_used > packet_bytes {
            return Err(CodecError::state(format!(
                "{} bytes resident in a {} byte frame",
                self.bytes_used, packet_bytes
            )));
        }

        let needed = packet_bytes - self.bytes_used;
        if needed == 0 {
            self.state = EncoderState::Full;
            trace!("frame resident, append refused");
            return Ok(AppendOutcome::default());
        }

        let consumed = if data.is_empty() {
            self.state = EncoderState::Flushing;
            debug!(bytes = self.bytes_used, "end of stream marked");
            0
        } else {
            let take = needed.min(data.len());
            self.input_buffer[self.bytes_used..self.bytes_used + take]
                .copy_from_slice(&data[..take]);
            self.bytes_used += take;
            self.state = if take == needed {
                EncoderState::Full
            } else {
                EncoderState::Accepting
            };
            take
        };

        self.convert_landed_samples()?;

        let outcome = AppendOutcome {
            bytes_consumed: consumed,
            packets: (consumed / self.bytes_per_frame()) as u32,
        };
        trace!(consumed, used = self.bytes_used, state = ?self.state, "append");
        Ok(outcome)
    }

    fn convert_landed_samples(&mut self) -> CodecResult<()> {
        let bit_depth = self.negotiator.bit_depth();
        let bps = (bit_depth >> 3) as usize;
        let whole = self.bytes_used / bps;
        if whole > self.samples_converted {
            let start = self.samples_converted;
            repack::unpack_into(
                &self.input_buffer[start * bps..whole * bps],
                bit_depth,
                &mut self.samples[start..whole],
            )?;
            self.samples_converted = whole;
        }
        Ok(())
    }

    /// Encode the resident frame into `out`
    ///
    /// At most one packet is produced per call.
    pub fn produce(&mut self, out: &mut [u8], requested_packets: u32) -> CodecResult<ProduceOutcome> {
        if !self.is_initialized() {
            return Err(CodecError::state("produce before initialization"));
        }

        let fpp = self.frames_per_packet();
        let flushing = self.state == EncoderState::Flushing;
        let frames = match self.state {
            EncoderState::Full if requested_packets > 0 => fpp,
            EncoderState::Flushing => self.bytes_used / self.bytes_per_frame(),
            _ => return Ok(ProduceOutcome::empty(ProduceStatus::NeedsMoreInput)),
        };
        let channels = self.negotiator.input_format().channels_per_frame as usize;

        let mut sink = PacketSink::new(out);
        let mut ok = self
            .engine
            .process_interleaved(&self.samples[..frames * channels], frames, &mut sink);
        if ok && flushing {
            ok = self.engine.finish(&mut sink);
        }
        let written = sink.written;
        let required = sink.required;
        let available = sink.out.len();
        if let Some(info) = sink.stream_info {
            self.negotiator.record_stream_info(info);
        }

        // the frame is gone whatever happened
        self.bytes_used = 0;
        self.samples_converted = 0;
        self.state = if flushing {
            EncoderState::Finished
        } else {
            EncoderState::Empty
        };

        if required > written {
            debug!(required, available, "packet does not fit, frame dropped");
            return Err(CodecError::NotEnoughBufferSpace {
                needed: required,
                available,
            });
        }
        if !ok {
            return Err(CodecError::EngineFailure(format!(
                "engine failed encoding {} frames (state {:?})",
                frames,
                self.engine.state()
            )));
        }

        self.max_packet_bytes = self.max_packet_bytes.max(written as u32);
        self.total_bytes_generated += written as u64;
        self.trailing_frames = (fpp - frames) as u32;

        let packets = u32::from(written > 0);
        let mut description = PacketDescription::new(0, written as u32);
        if written > 0 {
            description.variable_frames = frames as u32;
        }

        // the buffer holds one frame, so nothing is left over to report as more
        let status = if flushing {
            ProduceStatus::AtEndOfStream
        } else {
            ProduceStatus::Success
        };

        trace!(frames, written, ?status, "produce");
        Ok(ProduceOutcome {
            status,
            bytes_written: written,
            packets,
            description: Some(description),
        })
    }
}
