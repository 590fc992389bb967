//! FLAC packet codec sessions
//!
//! An [`EncoderSession`] takes packed PCM and hands back one FLAC frame per
//! packet; a [`DecoderSession`] does the reverse. Both negotiate their formats
//! up front, carry the stream parameters in a magic cookie, and expose a
//! property surface for hosts that configure codecs by property id.

pub mod config;
pub mod cookie;
pub mod core;
pub mod engine;
pub mod negotiate;
pub mod properties;
pub mod repack;
pub mod streaming;

mod wasm;

pub use config::{CodecConfig, EncoderSettings, SettingParameter, COMPRESSION_LEVEL_KEY};
pub use core::{
    ChannelLayout, ChannelLayoutTag, CodecError, CodecResult, FormatId, PacketDescription,
    StreamFormat, StreamInfo, DEFAULT_FRAMES_PER_PACKET, MAX_CHANNELS, MAX_COOKIE_SIZE,
};
pub use engine::{DecodeEngine, EncodeEngine, ReferenceDecoder, ReferenceEncoder};
pub use negotiate::{CodecRole, FormatNegotiator};
pub use properties::{
    FormatListItem, PrimeInfo, PropertyDescriptor, PropertyHost, PropertyId, PropertyQuery,
    PropertyRegistry, PropertyValue, SizeRule,
};
pub use streaming::{
    AppendOutcome, DecoderSession, DecoderState, EncoderSession, EncoderState, ProduceOutcome,
    ProduceStatus,
};
pub use wasm::{
    build_magic_cookie, parse_magic_cookie, version, FlacPacketDecoder, FlacPacketEncoder,
};
