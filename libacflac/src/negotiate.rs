//! format negotiation and cookie storage shared by both codec roles
//!
//! The negotiator owns the input and output descriptions of a session and
//! keeps sample rate and channel count equal on both sides, since a lossless
//! codec cannot resample or remix. Everything here is frozen once the session
//! is initialized.

use tracing::debug;

use crate::cookie;
use crate::core::{
    bits_for_flac_flags, container_bytes, flac_flag_for_bits, ChannelLayoutTag, CodecError,
    CodecResult, FormatId, StreamFormat, StreamInfo, DEFAULT_FRAMES_PER_PACKET,
    FLAC_FLAG_16_BIT_SOURCE, FLAC_FLAG_24_BIT_SOURCE, FLAC_FLAG_BIT_DEPTH_MASK, MAX_CHANNELS,
    MAX_COOKIE_SIZE, PCM_ALIGNED_HIGH_FLAGS, PCM_PACKED_FLAGS, SHORT_FRAMES_PER_PACKET,
};

/// which side of the codec a session is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecRole {
    /// pcm in, flac out
    Encoder,
    /// flac in, pcm out
    Decoder,
}

/// negotiated formats plus the stored cookie
#[derive(Debug, Clone)]
pub struct FormatNegotiator {
    role: CodecRole,
    input: StreamFormat,
    output: StreamFormat,
    frames_per_packet: u32,
    bit_depth: u32,
    cookie: Vec<u8>,
    cookie_len: usize,
    stream_info: Option<StreamInfo>,
    cookie_set: bool,
    initialized: bool,
}

impl FormatNegotiator {
    /// negotiator with the role's default stereo 44.1kHz 16-bit formats
    pub fn new(role: CodecRole, frames_per_packet: u32) -> Self {
        let mut pcm = StreamFormat::linear_pcm(44100.0, 2, 16);
        pcm.format_flags = PCM_PACKED_FLAGS;
        let mut flac = StreamFormat::flac(44100.0, 2, 16);
        flac.frames_per_packet = frames_per_packet;

        let (input, output) = match role {
            CodecRole::Encoder => (pcm, flac),
            CodecRole::Decoder => (flac, pcm),
        };

        FormatNegotiator {
            role,
            input,
            output,
            frames_per_packet,
            bit_depth: 16,
            cookie: Vec::new(),
            cookie_len: 0,
            stream_info: None,
            cookie_set: false,
            initialized: false,
        }
    }

    pub fn role(&self) -> CodecRole {
        self.role
    }

    pub fn input_format(&self) -> &StreamFormat {
        &self.input
    }

    pub fn output_format(&self) -> &StreamFormat {
        &self.output
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// pcm depth of the session (input for an encoder, output for a decoder)
    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    /// configured nominal frames per packet
    pub fn frames_per_packet(&self) -> u32 {
        self.frames_per_packet
    }

    /// stream info from the stored cookie or the encoder engine
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    /// true once a cookie was handed in, even an empty one
    pub fn has_cookie(&self) -> bool {
        self.cookie_set
    }

    pub fn stored_cookie(&self) -> &[u8] {
        &self.cookie
    }

    fn ensure_configurable(&self, what: &str) -> CodecResult<()> {
        if self.initialized {
            return Err(CodecError::state(format!(
                "cannot set {} after initialization",
                what
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Format setters
    // ========================================================================

    /// replace the input description
    pub fn set_input_format(&mut self, format: &StreamFormat) -> CodecResult<()> {
        self.ensure_configurable("input format")?;
        match self.role {
            CodecRole::Encoder => self.set_encoder_input(format),
            CodecRole::Decoder => self.set_decoder_input(format),
        }
    }

    /// replace the output description
    pub fn set_output_format(&mut self, format: &StreamFormat) -> CodecResult<()> {
        self.ensure_configurable("output format")?;
        match self.role {
            CodecRole::Encoder => self.set_encoder_output(format),
            CodecRole::Decoder => self.set_decoder_output(format),
        }
    }

    /// change only the input sample rate
    pub fn set_input_sample_rate(&mut self, sample_rate: f64) -> CodecResult<()> {
        if self.initialized {
            return Err(CodecError::illegal("input sample rate is frozen"));
        }
        self.input.sample_rate = sample_rate;
        Ok(())
    }

    fn set_encoder_input(&mut self, format: &StreamFormat) -> CodecResult<()> {
        if format.format_id != FormatId::LinearPcm
            || (format.format_flags != PCM_PACKED_FLAGS
                && format.format_flags != PCM_ALIGNED_HIGH_FLAGS)
        {
            return Err(CodecError::unsupported(
                "encoder input must be native endian signed integer pcm",
            ));
        }
        if format.bits_per_channel != 16 && format.bits_per_channel != 24 {
            return Err(CodecError::unsupported(format!(
                "encoder input must be 16 or 24 bit, got {}",
                format.bits_per_channel
            )));
        }

        self.input = *format;
        self.propagate_from_input(format);

        self.output.format_flags = (self.output.format_flags & !FLAC_FLAG_BIT_DEPTH_MASK)
            | flac_flag_for_bits(format.bits_per_channel);
        self.bit_depth = format.bits_per_channel;
        Ok(())
    }

    fn set_encoder_output(&mut self, format: &StreamFormat) -> CodecResult<()> {
        if format.format_id != FormatId::Flac {
            return Err(CodecError::unsupported("encoder output must be flac"));
        }

        self.output = *format;
        if self.output.frames_per_packet == 0 {
            self.output.frames_per_packet = self.frames_per_packet;
        }
        self.propagate_to_output();

        self.output.bytes_per_frame = 0;
        self.output.bits_per_channel = 0;
        self.output.bytes_per_packet = 0;
        Ok(())
    }

    fn set_decoder_input(&mut self, format: &StreamFormat) -> CodecResult<()> {
        if format.format_id != FormatId::Flac {
            return Err(CodecError::unsupported("decoder input must be flac"));
        }

        self.input = *format;
        self.propagate_from_input(format);

        match bits_for_flac_flags(format.format_flags) {
            Some(20) => {
                self.output.bits_per_channel = 20;
                self.output.format_flags = PCM_ALIGNED_HIGH_FLAGS;
            }
            Some(bits) => self.output.bits_per_channel = bits,
            // no depth given, leave the output alone
            None => {}
        }

        self.input.bytes_per_frame = 0;
        self.input.bits_per_channel = 0;
        self.input.bytes_per_packet = 0;
        Ok(())
    }

    fn set_decoder_output(&mut self, format: &StreamFormat) -> CodecResult<()> {
        if format.format_id != FormatId::LinearPcm {
            return Err(CodecError::unsupported("decoder output must be linear pcm"));
        }

        self.output = *format;
        self.propagate_to_output();
        Ok(())
    }

    // zero on the incoming side means "take the other side's value"
    fn propagate_from_input(&mut self, format: &StreamFormat) {
        if format.channels_per_frame == 0 {
            self.input.channels_per_frame = self.output.channels_per_frame;
        } else {
            self.output.channels_per_frame = format.channels_per_frame;
        }
        if format.sample_rate == 0.0 {
            self.input.sample_rate = self.output.sample_rate;
        } else {
            self.output.sample_rate = format.sample_rate;
        }
    }

    fn propagate_to_output(&mut self) {
        if self.output.sample_rate == 0.0 {
            self.output.sample_rate = self.input.sample_rate;
        }
        if self.output.channels_per_frame == 0 {
            self.output.channels_per_frame = self.input.channels_per_frame;
        }
    }

    // ========================================================================
    // Cookie
    // ========================================================================

    /// store and parse a cookie, an empty one forgets the stream info
    pub fn set_magic_cookie(&mut self, blob: &[u8]) -> CodecResult<()> {
        self.ensure_configurable("magic cookie")?;
        if blob.len() > MAX_COOKIE_SIZE {
            return Err(CodecError::bad_size(format!(
                "cookie of {} bytes exceeds {}",
                blob.len(),
                MAX_COOKIE_SIZE
            )));
        }

        let info = if blob.is_empty() {
            None
        } else {
            Some(cookie::deserialize(blob)?)
        };

        self.cookie = blob.to_vec();
        self.cookie_len = blob.len();
        self.cookie_set = true;
        self.stream_info = info;
        debug!(len = blob.len(), ?info, "magic cookie stored");
        Ok(())
    }

    /// capture stream statistics reported by an engine
    pub fn record_stream_info(&mut self, info: StreamInfo) {
        self.stream_info = Some(info);
    }

    /// bytes a caller must offer to read the cookie
    pub fn magic_cookie_capacity(&self) -> usize {
        if self.cookie_len > 0 {
            self.cookie_len
        } else {
            MAX_COOKIE_SIZE
        }
    }

    /// stream info the cookie is built from, synthesized when none is known
    pub fn cookie_stream_info(&self) -> StreamInfo {
        let flac = match self.role {
            CodecRole::Encoder => &self.output,
            CodecRole::Decoder => &self.input,
        };
        self.stream_info
            .unwrap_or_else(|| StreamInfo::synthetic(flac, self.bit_depth))
    }

    /// serialize the cookie for a buffer of `capacity` bytes
    pub fn magic_cookie(&mut self, capacity: usize) -> CodecResult<Vec<u8>> {
        if capacity < self.magic_cookie_capacity() {
            return Err(CodecError::illegal(format!(
                "cookie needs a {} byte buffer, got {}",
                self.magic_cookie_capacity(),
                capacity
            )));
        }

        let channels = self.output.channels_per_frame;
        let needed = cookie::cookie_size(channels);
        if needed > capacity {
            return Err(CodecError::bad_size(format!(
                "cookie is {} bytes, buffer holds {}",
                needed, capacity
            )));
        }

        let blob = cookie::serialize(&self.cookie_stream_info(), channels);
        self.cookie_len = blob.len();
        Ok(blob)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// apply optional formats and cookie, validate, then freeze
    ///
    /// On failure the negotiator is left as it was before the call.
    pub fn initialize(
        &mut self,
        input: Option<&StreamFormat>,
        output: Option<&StreamFormat>,
        magic_cookie: Option<&[u8]>,
    ) -> CodecResult<()> {
        self.ensure_configurable("formats")?;

        let saved = self.clone();
        let result = self.try_initialize(input, output, magic_cookie);
        match &result {
            Ok(()) => {
                self.initialized = true;
                debug!(
                    role = ?self.role,
                    input = ?self.input,
                    output = ?self.output,
                    "formats negotiated"
                );
            }
            Err(e) => {
                debug!(role = ?self.role, error = %e, "negotiation failed");
                *self = saved;
            }
        }
        result
    }

    fn try_initialize(
        &mut self,
        input: Option<&StreamFormat>,
        output: Option<&StreamFormat>,
        magic_cookie: Option<&[u8]>,
    ) -> CodecResult<()> {
        if let Some(format) = input {
            self.set_input_format(format)?;
        }
        if let Some(format) = output {
            self.set_output_format(format)?;
        }

        self.check_rate_and_channels()?;

        if let Some(blob) = magic_cookie {
            self.set_magic_cookie(blob)?;
        }

        match self.role {
            CodecRole::Encoder => self.finish_encoder_formats(),
            CodecRole::Decoder => {
                if let (Some(info), None, None) = (self.stream_info, input, output) {
                    self.derive_formats_from_cookie(&info)?;
                }
                self.finish_decoder_formats();
                Ok(())
            }
        }
    }

    fn check_rate_and_channels(&self) -> CodecResult<()> {
        if self.input.sample_rate != self.output.sample_rate
            || self.input.channels_per_frame != self.output.channels_per_frame
        {
            return Err(CodecError::unsupported(format!(
                "input {} Hz / {} ch does not match output {} Hz / {} ch",
                self.input.sample_rate,
                self.input.channels_per_frame,
                self.output.sample_rate,
                self.output.channels_per_frame
            )));
        }
        if !(1..=MAX_CHANNELS).contains(&self.input.channels_per_frame) {
            return Err(CodecError::unsupported(format!(
                "{} channels, 1 to {} supported",
                self.input.channels_per_frame, MAX_CHANNELS
            )));
        }
        Ok(())
    }

    fn finish_encoder_formats(&mut self) -> CodecResult<()> {
        let flag = self.output.format_flags & FLAC_FLAG_BIT_DEPTH_MASK;
        if flag != 0 {
            let output_bits = match flag {
                FLAC_FLAG_16_BIT_SOURCE => 16,
                FLAC_FLAG_24_BIT_SOURCE => 24,
                _ => 0,
            };
            if output_bits != self.input.bits_per_channel {
                return Err(CodecError::unsupported(format!(
                    "flac output flags {} do not describe {}-bit input",
                    flag, self.input.bits_per_channel
                )));
            }
        }

        self.bit_depth = self.input.bits_per_channel;
        self.input.bytes_per_frame = (self.bit_depth >> 3) * self.input.channels_per_frame;
        self.input.bytes_per_packet = self.input.bytes_per_frame;
        self.input.frames_per_packet = 1;

        if self.output.format_flags == 0 {
            self.output.format_flags = flac_flag_for_bits(self.bit_depth);
        }
        Ok(())
    }

    fn derive_formats_from_cookie(&mut self, info: &StreamInfo) -> CodecResult<()> {
        if !(1..=MAX_CHANNELS).contains(&info.channels) {
            return Err(CodecError::unsupported(format!(
                "cookie describes {} channels",
                info.channels
            )));
        }

        let output_flags = match info.bits_per_sample {
            16 | 24 | 32 => PCM_PACKED_FLAGS,
            20 => PCM_ALIGNED_HIGH_FLAGS,
            other => {
                return Err(CodecError::unsupported(format!(
                    "cookie describes {}-bit samples",
                    other
                )))
            }
        };

        let rate = info.sample_rate as f64;
        self.input.sample_rate = rate;
        self.output.sample_rate = rate;
        self.input.channels_per_frame = info.channels;
        self.output.channels_per_frame = info.channels;
        self.input.format_flags = (self.input.format_flags & !FLAC_FLAG_BIT_DEPTH_MASK)
            | flac_flag_for_bits(info.bits_per_sample);
        self.input.frames_per_packet = info.max_blocksize;
        self.output.format_flags = output_flags;
        self.output.bits_per_channel = info.bits_per_sample;
        Ok(())
    }

    fn finish_decoder_formats(&mut self) {
        self.bit_depth = self.output.bits_per_channel;
        self.output.bytes_per_frame =
            container_bytes(self.output.bits_per_channel) * self.output.channels_per_frame;
        self.output.bytes_per_packet = self.output.bytes_per_frame;
        self.output.frames_per_packet = 1;
    }

    /// thaw the formats, keeping their values
    pub fn uninitialize(&mut self) {
        self.initialized = false;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// layout tag for the current channel count
    pub fn channel_layout(&self) -> ChannelLayoutTag {
        ChannelLayoutTag::for_channels(self.input.channels_per_frame)
            .unwrap_or(ChannelLayoutTag::UNKNOWN)
    }

    /// input formats this role accepts
    pub fn supported_input_formats(&self) -> Vec<StreamFormat> {
        match self.role {
            CodecRole::Encoder => vec![pcm_template(16), pcm_template(24)],
            CodecRole::Decoder => vec![
                flac_template(DEFAULT_FRAMES_PER_PACKET, 16),
                flac_template(DEFAULT_FRAMES_PER_PACKET, 24),
                flac_template(SHORT_FRAMES_PER_PACKET, 16),
                flac_template(SHORT_FRAMES_PER_PACKET, 24),
            ],
        }
    }

    /// output formats this role produces
    pub fn supported_output_formats(&self) -> Vec<StreamFormat> {
        match self.role {
            CodecRole::Encoder => vec![flac_template(self.frames_per_packet, 0)],
            CodecRole::Decoder => vec![pcm_template(16), pcm_template(24)],
        }
    }

    /// flac description carried by a cookie, or the filled out match for `format`
    pub fn format_info(&self, format: &StreamFormat, cookie: &[u8]) -> CodecResult<StreamFormat> {
        if !cookie.is_empty() {
            return flac_format_from_cookie(format, cookie);
        }

        let template = self
            .supported_input_formats()
            .into_iter()
            .find(|candidate| candidate.matches(format))
            .ok_or_else(|| CodecError::unsupported("no supported input format matches"))?;

        let mut filled = *format;
        let flags = format.format_flags;
        filled.fill_out_from(&template);
        // zero flags match anything, never invent them
        if flags == 0 {
            filled.format_flags = 0;
        }
        Ok(filled)
    }

    /// decoder output formats for a flac input description
    pub fn output_formats_for_input(&self, input: &StreamFormat) -> CodecResult<Vec<StreamFormat>> {
        let bits = match self.stream_info {
            Some(info) => info.bits_per_sample,
            None => bits_for_flac_flags(input.format_flags)
                .or_else(|| bits_for_flac_flags(self.input.format_flags))
                .ok_or_else(|| {
                    CodecError::unsupported("source bit depth is unknown, refusing to guess")
                })?,
        };

        let mut format = pcm_template(bits);
        if bits == 20 {
            format.format_flags = PCM_ALIGNED_HIGH_FLAGS;
        }
        Ok(vec![format])
    }

    /// encoder input formats for a flac output description
    pub fn input_formats_for_output(&self, output: &StreamFormat) -> Vec<StreamFormat> {
        match bits_for_flac_flags(output.format_flags) {
            Some(20) => vec![pcm_template(24)],
            Some(bits) => vec![pcm_template(bits)],
            None => vec![pcm_template(16), pcm_template(24)],
        }
    }
}

/// flac description of a cookie's stream, other fields taken from `base`
fn flac_format_from_cookie(base: &StreamFormat, blob: &[u8]) -> CodecResult<StreamFormat> {
    let info = cookie::deserialize(blob)?;
    let mut format = *base;
    format.format_id = FormatId::Flac;
    format.sample_rate = info.sample_rate as f64;
    format.channels_per_frame = info.channels;
    format.frames_per_packet = info.max_blocksize;
    format.bytes_per_packet = 0;
    format.format_flags = flac_flag_for_bits(info.bits_per_sample);
    Ok(format)
}

/// any-rate, any-channel pcm
fn pcm_template(bits: u32) -> StreamFormat {
    StreamFormat {
        sample_rate: 0.0,
        format_id: FormatId::LinearPcm,
        format_flags: PCM_PACKED_FLAGS,
        bytes_per_packet: 0,
        frames_per_packet: 1,
        bytes_per_frame: 0,
        channels_per_frame: 0,
        bits_per_channel: bits,
    }
}

/// any-rate, any-channel flac
fn flac_template(frames_per_packet: u32, source_bits: u32) -> StreamFormat {
    StreamFormat {
        sample_rate: 0.0,
        format_id: FormatId::Flac,
        format_flags: flac_flag_for_bits(source_bits),
        bytes_per_packet: 0,
        frames_per_packet,
        bytes_per_frame: 0,
        channels_per_frame: 0,
        bits_per_channel: 0,
    }
}
