//! common types for the flac packet codec

use serde::{Deserialize, Serialize};

// constants

/// Build a four-character code the way the host spells them ('flac', 'frma', ...)
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// 'flac'
pub const FORMAT_FLAC: u32 = fourcc(b"flac");

/// 'lpcm'
pub const FORMAT_LINEAR_PCM: u32 = fourcc(b"lpcm");

/// nominal frames per packet (1152 * 4)
pub const DEFAULT_FRAMES_PER_PACKET: u32 = 4608;

/// the alternative block size advertised on the decoder's input list
pub const SHORT_FRAMES_PER_PACKET: u32 = DEFAULT_FRAMES_PER_PACKET >> 2;

/// max channels the codec handles
pub const MAX_CHANNELS: u32 = 8;

/// max sample width the engine handles
pub const MAX_SAMPLE_SIZE: u32 = 32;

/// slack for a frame header on top of raw pcm
pub const MAX_ESCAPE_HEADER_BYTES: u32 = 12;

/// largest cookie a session stores
pub const MAX_COOKIE_SIZE: usize = 256;

/// highest compression level
pub const MAX_COMPRESSION_QUALITY: u32 = 8;

// linear pcm format flags

pub const FORMAT_FLAG_IS_FLOAT: u32 = 1 << 0;
pub const FORMAT_FLAG_IS_BIG_ENDIAN: u32 = 1 << 1;
pub const FORMAT_FLAG_IS_SIGNED_INTEGER: u32 = 1 << 2;
pub const FORMAT_FLAG_IS_PACKED: u32 = 1 << 3;
pub const FORMAT_FLAG_IS_ALIGNED_HIGH: u32 = 1 << 4;

#[cfg(target_endian = "big")]
pub const FORMAT_FLAGS_NATIVE_ENDIAN: u32 = FORMAT_FLAG_IS_BIG_ENDIAN;
#[cfg(target_endian = "little")]
pub const FORMAT_FLAGS_NATIVE_ENDIAN: u32 = 0;

/// native endian packed signed integers
pub const PCM_PACKED_FLAGS: u32 =
    FORMAT_FLAGS_NATIVE_ENDIAN | FORMAT_FLAG_IS_SIGNED_INTEGER | FORMAT_FLAG_IS_PACKED;

/// native endian signed integers aligned high in their container
pub const PCM_ALIGNED_HIGH_FLAGS: u32 =
    FORMAT_FLAGS_NATIVE_ENDIAN | FORMAT_FLAG_IS_SIGNED_INTEGER | FORMAT_FLAG_IS_ALIGNED_HIGH;

// flac format flags (low three bits carry the source bit depth)

pub const FLAC_FLAG_16_BIT_SOURCE: u32 = 1;
pub const FLAC_FLAG_20_BIT_SOURCE: u32 = 2;
pub const FLAC_FLAG_24_BIT_SOURCE: u32 = 3;
pub const FLAC_FLAG_32_BIT_SOURCE: u32 = 4;
pub const FLAC_FLAG_BIT_DEPTH_MASK: u32 = 0x7;

/// flac source flag for a bit depth, 0 when there is none
pub fn flac_flag_for_bits(bits: u32) -> u32 {
    match bits {
        16 => FLAC_FLAG_16_BIT_SOURCE,
        20 => FLAC_FLAG_20_BIT_SOURCE,
        24 => FLAC_FLAG_24_BIT_SOURCE,
        32 => FLAC_FLAG_32_BIT_SOURCE,
        _ => 0,
    }
}

/// bit depth carried by a flac flags word
pub fn bits_for_flac_flags(flags: u32) -> Option<u32> {
    match flags & FLAC_FLAG_BIT_DEPTH_MASK {
        FLAC_FLAG_16_BIT_SOURCE => Some(16),
        FLAC_FLAG_20_BIT_SOURCE => Some(20),
        FLAC_FLAG_24_BIT_SOURCE => Some(24),
        FLAC_FLAG_32_BIT_SOURCE => Some(32),
        _ => None,
    }
}

// types

/// format identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatId {
    #[default]
    LinearPcm,
    Flac,
    Other(u32),
}

impl FormatId {
    pub fn code(self) -> u32 {
        match self {
            FormatId::LinearPcm => FORMAT_LINEAR_PCM,
            FormatId::Flac => FORMAT_FLAC,
            FormatId::Other(code) => code,
        }
    }
}

impl From<u32> for FormatId {
    fn from(code: u32) -> Self {
        match code {
            FORMAT_LINEAR_PCM => FormatId::LinearPcm,
            FORMAT_FLAC => FormatId::Flac,
            other => FormatId::Other(other),
        }
    }
}

/// stream description, one for each side of a session
///
/// Zero in `sample_rate`, `channels_per_frame` or `frames_per_packet` means
/// "not specified yet" and is filled in by negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub format_id: FormatId,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamFormat {
    /// interleaved integer pcm, one frame per packet
    pub fn linear_pcm(sample_rate: f64, channels: u32, bits: u32) -> Self {
        let flags = if bits == 20 {
            PCM_ALIGNED_HIGH_FLAGS
        } else {
            PCM_PACKED_FLAGS
        };
        let bytes_per_frame = container_bytes(bits) * channels;
        StreamFormat {
            sample_rate,
            format_id: FormatId::LinearPcm,
            format_flags: flags,
            bytes_per_packet: bytes_per_frame,
            frames_per_packet: 1,
            bytes_per_frame,
            channels_per_frame: channels,
            bits_per_channel: bits,
        }
    }

    /// compressed flac with the source depth in the flags
    pub fn flac(sample_rate: f64, channels: u32, source_bits: u32) -> Self {
        StreamFormat {
            sample_rate,
            format_id: FormatId::Flac,
            format_flags: flac_flag_for_bits(source_bits),
            bytes_per_packet: 0,
            frames_per_packet: DEFAULT_FRAMES_PER_PACKET,
            bytes_per_frame: 0,
            channels_per_frame: channels,
            bits_per_channel: 0,
        }
    }

    /// bytes one sample occupies in this pcm format
    pub fn bytes_per_sample(&self) -> u32 {
        container_bytes(self.bits_per_channel)
    }

    /// source depth of a flac description
    pub fn flac_source_bits(&self) -> Option<u32> {
        bits_for_flac_flags(self.format_flags)
    }

    /// compare with zero fields acting as wildcards
    pub fn matches(&self, other: &StreamFormat) -> bool {
        fn field(a: u32, b: u32) -> bool {
            a == 0 || b == 0 || a == b
        }
        (self.sample_rate == 0.0 || other.sample_rate == 0.0 || self.sample_rate == other.sample_rate)
            && self.format_id == other.format_id
            && field(self.format_flags, other.format_flags)
            && field(self.bytes_per_packet, other.bytes_per_packet)
            && field(self.frames_per_packet, other.frames_per_packet)
            && field(self.bytes_per_frame, other.bytes_per_frame)
            && field(self.channels_per_frame, other.channels_per_frame)
            && field(self.bits_per_channel, other.bits_per_channel)
    }

    /// copy every unspecified field from `template`
    pub fn fill_out_from(&mut self, template: &StreamFormat) {
        if self.sample_rate == 0.0 {
            self.sample_rate = template.sample_rate;
        }
        if self.format_flags == 0 {
            self.format_flags = template.format_flags;
        }
        if self.bytes_per_packet == 0 {
            self.bytes_per_packet = template.bytes_per_packet;
        }
        if self.frames_per_packet == 0 {
            self.frames_per_packet = template.frames_per_packet;
        }
        if self.bytes_per_frame == 0 {
            self.bytes_per_frame = template.bytes_per_frame;
        }
        if self.channels_per_frame == 0 {
            self.channels_per_frame = template.channels_per_frame;
        }
        if self.bits_per_channel == 0 {
            self.bits_per_channel = template.bits_per_channel;
        }
    }
}

/// container bytes for a pcm depth (20 bits live in 3 bytes)
pub fn container_bytes(bits: u32) -> u32 {
    bits.div_ceil(8)
}

/// stream parameters carried by the magic cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StreamInfo {
    pub min_blocksize: u32,
    pub max_blocksize: u32,
    pub min_framesize: u32,
    pub max_framesize: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub total_samples: u64,
    #[serde(with = "serde_bytes")]
    pub checksum: [u8; 16],
}

impl StreamInfo {
    /// stand-in used when no engine statistics exist yet
    pub fn synthetic(format: &StreamFormat, bits_per_sample: u32) -> Self {
        let block_size = match format.frames_per_packet {
            0 => DEFAULT_FRAMES_PER_PACKET,
            n => n,
        };
        StreamInfo {
            min_blocksize: block_size,
            max_blocksize: block_size,
            min_framesize: 0,
            max_framesize: 0,
            sample_rate: format.sample_rate as u32,
            channels: format.channels_per_frame,
            bits_per_sample,
            total_samples: 0,
            checksum: [0; 16],
        }
    }

    /// false until an engine has filled in the checksum
    pub fn has_checksum(&self) -> bool {
        self.checksum.iter().any(|&b| b != 0)
    }
}

/// describes where one packet lives inside a byte run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDescription {
    pub start_offset: u64,
    /// frames in the packet, 0 when constant
    pub variable_frames: u32,
    pub data_byte_size: u32,
}

impl PacketDescription {
    pub fn new(start_offset: u64, data_byte_size: u32) -> Self {
        PacketDescription {
            start_offset,
            variable_frames: 0,
            data_byte_size,
        }
    }
}
