//! # Codec Configuration
//!
//! Session-wide knobs and the encoder's settings dictionary.

use serde::{Deserialize, Serialize};

use crate::core::{
    CodecError, CodecResult, DEFAULT_FRAMES_PER_PACKET, MAX_COMPRESSION_QUALITY,
    SHORT_FRAMES_PER_PACKET,
};

/// Configuration shared by encoder and decoder sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Nominal frames per packet.
    ///
    /// Every packet but the last of a stream carries exactly this many frames.
    ///
    /// Default: 4608.
    #[serde(default = "default_frames_per_packet")]
    pub frames_per_packet: u32,

    /// Initial compression level, 0 (fastest) to 8 (smallest).
    ///
    /// Default: 0.
    #[serde(default)]
    pub quality: u32,

    /// Log engine error callbacks at warn level instead of debug.
    ///
    /// Default: false.
    #[serde(default)]
    pub report_engine_errors: bool,
}

fn default_frames_per_packet() -> u32 {
    DEFAULT_FRAMES_PER_PACKET
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            frames_per_packet: default_frames_per_packet(),
            quality: 0,
            report_engine_errors: false,
        }
    }
}

impl CodecConfig {
    /// Quarter-size packets, the short block size decoders also accept.
    pub fn low_latency() -> Self {
        Self {
            frames_per_packet: SHORT_FRAMES_PER_PACKET,
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> CodecResult<()> {
        if !(16..=u16::MAX as u32).contains(&self.frames_per_packet) {
            return Err(CodecError::Settings(format!(
                "frames_per_packet must be in 16..=65535, got {}",
                self.frames_per_packet
            )));
        }

        if self.quality > MAX_COMPRESSION_QUALITY {
            return Err(CodecError::Settings(format!(
                "quality must be at most {}, got {}",
                MAX_COMPRESSION_QUALITY, self.quality
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Settings dictionary
// ============================================================================

/// key of the one parameter the encoder exposes
pub const COMPRESSION_LEVEL_KEY: &str = "Compression Level";

/// One user-facing encoder parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingParameter {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub available_values: Vec<u32>,
    pub current_value: u32,
    #[serde(default)]
    pub hint: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
}

/// The encoder's settings dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub top_level_name: String,
    #[serde(default)]
    pub parameters: Vec<SettingParameter>,
}

impl EncoderSettings {
    /// dictionary describing the current compression level
    pub fn for_quality(quality: u32) -> Self {
        EncoderSettings {
            top_level_name: "FLAC Encoder".to_string(),
            parameters: vec![SettingParameter {
                key: COMPRESSION_LEVEL_KEY.to_string(),
                name: COMPRESSION_LEVEL_KEY.to_string(),
                available_values: (0..=MAX_COMPRESSION_QUALITY).collect(),
                current_value: quality,
                hint: 0,
                summary: Some("The compression level of the FLAC encoder".to_string()),
                unit: String::new(),
            }],
        }
    }

    /// compression level carried by the dictionary, if any
    ///
    /// Unknown keys are skipped, so parameter order does not matter.
    pub fn compression_level(&self) -> Option<u32> {
        self.parameters
            .iter()
            .find(|p| p.key == COMPRESSION_LEVEL_KEY)
            .map(|p| p.current_value)
    }

    /// Serialize to MessagePack bytes
    pub fn to_msgpack(&self) -> CodecResult<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize from MessagePack bytes
    pub fn from_msgpack(data: &[u8]) -> CodecResult<Self> {
        Ok(rmp_serde::from_slice(data)?)
    }

    pub fn to_json(&self) -> CodecResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CodecResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
