//! # Property Surface
//!
//! Hosts configure and query a codec session through numbered properties.
//! Each property has a size rule, a writable flag, a getter and optionally a
//! setter. Both roles share a base table; the encoder and decoder sessions
//! merge their own entries over it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::EncoderSettings;
use crate::cookie;
use crate::core::{
    fourcc, flac_flag_for_bits, ChannelLayout, ChannelLayoutTag, CodecError, CodecResult,
    FormatId, StreamFormat, MAX_CHANNELS, SUPPORTED_LAYOUTS,
};
use crate::engine::{DecodeEngine, EncodeEngine};
use crate::negotiate::FormatNegotiator;
use crate::streaming::{DecoderSession, EncoderSession, INPUT_BUFFER_BYTES};

// host struct sizes
pub const F64_SIZE: usize = 8;
pub const U32_SIZE: usize = 4;
pub const STREAM_FORMAT_SIZE: usize = 40;
pub const VALUE_RANGE_SIZE: usize = 16;
pub const FORMAT_LIST_ITEM_SIZE: usize = STREAM_FORMAT_SIZE + 4;
pub const FORMAT_INFO_SIZE: usize = 56;
pub const PRIME_INFO_SIZE: usize = 8;
pub const SETTINGS_HANDLE_SIZE: usize = 8;
pub const LAYOUT_TAGS_SIZE: usize = MAX_CHANNELS as usize * U32_SIZE;

/// priming style reported by the encoder, "none"
pub const PRIME_METHOD_NONE: u32 = 2;

/// Properties a session answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    CurrentInputSampleRate,
    CurrentOutputSampleRate,
    AvailableInputSampleRates,
    AvailableOutputSampleRates,
    InputChannelLayout,
    OutputChannelLayout,
    AvailableInputChannelLayouts,
    AvailableOutputChannelLayouts,
    AvailableNumberChannels,
    MagicCookie,
    FormatInfo,
    FormatList,
    InputFormatsForOutputFormat,
    OutputFormatsForInputFormat,
    SupportedInputFormats,
    SupportedOutputFormats,
    CurrentInputFormat,
    CurrentOutputFormat,
    QualitySetting,
    MaximumPacketByteSize,
    PacketFrameSize,
    RequiresPacketDescription,
    HasVariablePacketByteSizes,
    ZeroFramesPadded,
    PrimeMethod,
    PrimeInfo,
    Settings,
    IsInitialized,
    InputBufferSize,
    UsedInputBufferSize,
}

impl PropertyId {
    const ALL: [PropertyId; 30] = [
        PropertyId::CurrentInputSampleRate,
        PropertyId::CurrentOutputSampleRate,
        PropertyId::AvailableInputSampleRates,
        PropertyId::AvailableOutputSampleRates,
        PropertyId::InputChannelLayout,
        PropertyId::OutputChannelLayout,
        PropertyId::AvailableInputChannelLayouts,
        PropertyId::AvailableOutputChannelLayouts,
        PropertyId::AvailableNumberChannels,
        PropertyId::MagicCookie,
        PropertyId::FormatInfo,
        PropertyId::FormatList,
        PropertyId::InputFormatsForOutputFormat,
        PropertyId::OutputFormatsForInputFormat,
        PropertyId::SupportedInputFormats,
        PropertyId::SupportedOutputFormats,
        PropertyId::CurrentInputFormat,
        PropertyId::CurrentOutputFormat,
        PropertyId::QualitySetting,
        PropertyId::MaximumPacketByteSize,
        PropertyId::PacketFrameSize,
        PropertyId::RequiresPacketDescription,
        PropertyId::HasVariablePacketByteSizes,
        PropertyId::ZeroFramesPadded,
        PropertyId::PrimeMethod,
        PropertyId::PrimeInfo,
        PropertyId::Settings,
        PropertyId::IsInitialized,
        PropertyId::InputBufferSize,
        PropertyId::UsedInputBufferSize,
    ];

    /// four-character code the host uses
    pub fn code(self) -> u32 {
        let code = match self {
            PropertyId::CurrentInputSampleRate => b"cisr",
            PropertyId::CurrentOutputSampleRate => b"cosr",
            PropertyId::AvailableInputSampleRates => b"aisr",
            PropertyId::AvailableOutputSampleRates => b"aosr",
            PropertyId::InputChannelLayout => b"icl ",
            PropertyId::OutputChannelLayout => b"ocl ",
            PropertyId::AvailableInputChannelLayouts => b"aicl",
            PropertyId::AvailableOutputChannelLayouts => b"aocl",
            PropertyId::AvailableNumberChannels => b"cmnc",
            PropertyId::MagicCookie => b"kuki",
            PropertyId::FormatInfo => b"acfi",
            PropertyId::FormatList => b"acfl",
            PropertyId::InputFormatsForOutputFormat => b"if4o",
            PropertyId::OutputFormatsForInputFormat => b"of4i",
            PropertyId::SupportedInputFormats => b"ifm#",
            PropertyId::SupportedOutputFormats => b"ofm#",
            PropertyId::CurrentInputFormat => b"ifmt",
            PropertyId::CurrentOutputFormat => b"ofmt",
            PropertyId::QualitySetting => b"srcq",
            PropertyId::MaximumPacketByteSize => b"pakb",
            PropertyId::PacketFrameSize => b"pakf",
            PropertyId::RequiresPacketDescription => b"pakd",
            PropertyId::HasVariablePacketByteSizes => b"vpk?",
            PropertyId::ZeroFramesPadded => b"zpad",
            PropertyId::PrimeMethod => b"prmm",
            PropertyId::PrimeInfo => b"prim",
            PropertyId::Settings => b"acs ",
            PropertyId::IsInitialized => b"init",
            PropertyId::InputBufferSize => b"tbuf",
            PropertyId::UsedInputBufferSize => b"ubuf",
        };
        fourcc(code)
    }

    /// property for a host code, UnknownProperty when there is none
    pub fn from_code(code: u32) -> CodecResult<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.code() == code)
            .ok_or_else(|| {
                CodecError::UnknownProperty(format!(
                    "'{}'",
                    String::from_utf8_lossy(&code.to_be_bytes())
                ))
            })
    }
}

/// How a caller's buffer size is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRule {
    Exact(usize),
    AtLeast(usize),
    /// the property checks its own size
    Any,
}

impl SizeRule {
    /// size reported to the host
    pub fn size(self) -> usize {
        match self {
            SizeRule::Exact(n) | SizeRule::AtLeast(n) => n,
            SizeRule::Any => 0,
        }
    }

    fn check(self, id: PropertyId, capacity: usize) -> CodecResult<()> {
        let ok = match self {
            SizeRule::Exact(n) => capacity == n,
            SizeRule::AtLeast(n) => capacity >= n,
            SizeRule::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(CodecError::bad_size(format!(
                "{:?} wants {:?}, got {} bytes",
                id, self, capacity
            )))
        }
    }
}

/// Size and writability of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub size: SizeRule,
    pub writable: bool,
}

/// One entry of a channel-layout-aware format list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatListItem {
    pub format: StreamFormat,
    pub layout_tag: ChannelLayoutTag,
}

/// Encoder priming, this codec never primes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimeInfo {
    pub leading_frames: u32,
    pub trailing_frames: u32,
}

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    U32(u32),
    F64(f64),
    U32List(Vec<u32>),
    SampleRateRange { minimum: f64, maximum: f64 },
    ChannelLayout(ChannelLayout),
    LayoutTags(Vec<ChannelLayoutTag>),
    Format(StreamFormat),
    Formats(Vec<StreamFormat>),
    FormatList(Vec<FormatListItem>),
    Cookie(Vec<u8>),
    PrimeInfo(PrimeInfo),
    Settings(EncoderSettings),
}

impl PropertyValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropertyValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_format(&self) -> Option<&StreamFormat> {
        match self {
            PropertyValue::Format(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_formats(&self) -> Option<&[StreamFormat]> {
        match self {
            PropertyValue::Formats(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_cookie(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Cookie(c) => Some(c),
            _ => None,
        }
    }
}

/// Extra input some queries need: the format asked about and its cookie
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyQuery<'a> {
    pub format: Option<StreamFormat>,
    pub cookie: &'a [u8],
}

impl<'a> PropertyQuery<'a> {
    pub fn for_format(format: StreamFormat) -> Self {
        PropertyQuery {
            format: Some(format),
            cookie: &[],
        }
    }

    pub fn with_cookie(mut self, cookie: &'a [u8]) -> Self {
        self.cookie = cookie;
        self
    }

    fn format(&self, id: PropertyId) -> CodecResult<StreamFormat> {
        self.format
            .ok_or_else(|| CodecError::unsupported(format!("{:?} needs a format to query", id)))
    }
}

/// What every session exposes to the shared property entries
pub trait PropertyHost {
    fn formats(&self) -> &FormatNegotiator;
    fn formats_mut(&mut self) -> &mut FormatNegotiator;
    fn packet_frame_size(&self) -> u32;
    fn packet_byte_bound(&self) -> u32;
    fn input_buffer_size(&self) -> usize;
    fn input_buffer_used(&self) -> usize;
}

pub type Getter<S> = fn(&mut S, usize, &PropertyQuery) -> CodecResult<PropertyValue>;
pub type Setter<S> = fn(&mut S, PropertyValue) -> CodecResult<()>;

struct PropertyEntry<S> {
    descriptor: PropertyDescriptor,
    getter: Getter<S>,
    setter: Option<Setter<S>>,
}

/// Property table for one session type
pub struct PropertyRegistry<S> {
    entries: HashMap<PropertyId, PropertyEntry<S>>,
}

impl<S: PropertyHost> PropertyRegistry<S> {
    pub fn new() -> Self {
        PropertyRegistry {
            entries: HashMap::new(),
        }
    }

    /// Add or replace a read-only entry
    pub fn read_only(mut self, id: PropertyId, size: SizeRule, getter: Getter<S>) -> Self {
        self.entries.insert(
            id,
            PropertyEntry {
                descriptor: PropertyDescriptor {
                    size,
                    writable: false,
                },
                getter,
                setter: None,
            },
        );
        self
    }

    /// Add or replace a writable entry
    pub fn writable(
        mut self,
        id: PropertyId,
        size: SizeRule,
        getter: Getter<S>,
        setter: Setter<S>,
    ) -> Self {
        self.entries.insert(
            id,
            PropertyEntry {
                descriptor: PropertyDescriptor {
                    size,
                    writable: true,
                },
                getter,
                setter: Some(setter),
            },
        );
        self
    }

    /// Entries common to both roles
    pub fn base() -> Self {
        Self::new()
            .writable(
                PropertyId::CurrentInputSampleRate,
                SizeRule::Exact(F64_SIZE),
                |host, _, _| Ok(PropertyValue::F64(host.formats().input_format().sample_rate)),
                |host, value| match value {
                    PropertyValue::F64(rate) => host.formats_mut().set_input_sample_rate(rate),
                    other => Err(wrong_value(PropertyId::CurrentInputSampleRate, &other)),
                },
            )
            .read_only(
                PropertyId::CurrentOutputSampleRate,
                SizeRule::Exact(F64_SIZE),
                |host, _, _| Ok(PropertyValue::F64(host.formats().output_format().sample_rate)),
            )
            .read_only(
                PropertyId::InputChannelLayout,
                SizeRule::Exact(ChannelLayout::BYTE_SIZE),
                current_layout,
            )
            .read_only(
                PropertyId::OutputChannelLayout,
                SizeRule::Exact(ChannelLayout::BYTE_SIZE),
                current_layout,
            )
            .read_only(
                PropertyId::AvailableInputChannelLayouts,
                SizeRule::Exact(LAYOUT_TAGS_SIZE),
                available_layouts,
            )
            .read_only(
                PropertyId::AvailableOutputChannelLayouts,
                SizeRule::Exact(LAYOUT_TAGS_SIZE),
                available_layouts,
            )
            .writable(
                PropertyId::MagicCookie,
                SizeRule::Any,
                |host, capacity, _| Ok(PropertyValue::Cookie(host.formats_mut().magic_cookie(capacity)?)),
                |host, value| match value {
                    PropertyValue::Cookie(blob) => host.formats_mut().set_magic_cookie(&blob),
                    other => Err(wrong_value(PropertyId::MagicCookie, &other)),
                },
            )
            .read_only(
                PropertyId::FormatInfo,
                SizeRule::Exact(FORMAT_INFO_SIZE),
                |host, _, query| {
                    let format = query.format(PropertyId::FormatInfo)?;
                    Ok(PropertyValue::Format(
                        host.formats().format_info(&format, query.cookie)?,
                    ))
                },
            )
            .read_only(
                PropertyId::SupportedInputFormats,
                SizeRule::AtLeast(STREAM_FORMAT_SIZE),
                |host, capacity, _| {
                    let mut formats = host.formats().supported_input_formats();
                    formats.truncate(capacity / STREAM_FORMAT_SIZE);
                    Ok(PropertyValue::Formats(formats))
                },
            )
            .read_only(
                PropertyId::SupportedOutputFormats,
                SizeRule::AtLeast(STREAM_FORMAT_SIZE),
                |host, capacity, _| {
                    let mut formats = host.formats().supported_output_formats();
                    formats.truncate(capacity / STREAM_FORMAT_SIZE);
                    Ok(PropertyValue::Formats(formats))
                },
            )
            .writable(
                PropertyId::CurrentInputFormat,
                SizeRule::Exact(STREAM_FORMAT_SIZE),
                |host, _, _| Ok(PropertyValue::Format(*host.formats().input_format())),
                |host, value| match value {
                    PropertyValue::Format(format) => host.formats_mut().set_input_format(&format),
                    other => Err(wrong_value(PropertyId::CurrentInputFormat, &other)),
                },
            )
            .writable(
                PropertyId::CurrentOutputFormat,
                SizeRule::Exact(STREAM_FORMAT_SIZE),
                |host, _, _| Ok(PropertyValue::Format(*host.formats().output_format())),
                |host, value| match value {
                    PropertyValue::Format(format) => host.formats_mut().set_output_format(&format),
                    other => Err(wrong_value(PropertyId::CurrentOutputFormat, &other)),
                },
            )
            .read_only(
                PropertyId::MaximumPacketByteSize,
                SizeRule::Exact(U32_SIZE),
                |host, _, _| Ok(PropertyValue::U32(host.packet_byte_bound())),
            )
            .read_only(
                PropertyId::PacketFrameSize,
                SizeRule::Exact(U32_SIZE),
                |host, _, _| Ok(PropertyValue::U32(host.packet_frame_size())),
            )
            .read_only(
                PropertyId::RequiresPacketDescription,
                SizeRule::Exact(U32_SIZE),
                |_, _, _| Ok(PropertyValue::U32(1)),
            )
            .read_only(
                PropertyId::HasVariablePacketByteSizes,
                SizeRule::Exact(U32_SIZE),
                |_, _, _| Ok(PropertyValue::U32(1)),
            )
            .read_only(
                PropertyId::IsInitialized,
                SizeRule::Exact(U32_SIZE),
                |host, _, _| Ok(PropertyValue::U32(u32::from(host.formats().is_initialized()))),
            )
            .read_only(
                PropertyId::InputBufferSize,
                SizeRule::Exact(U32_SIZE),
                |host, _, _| Ok(PropertyValue::U32(host.input_buffer_size() as u32)),
            )
            .read_only(
                PropertyId::UsedInputBufferSize,
                SizeRule::Exact(U32_SIZE),
                |host, _, _| Ok(PropertyValue::U32(host.input_buffer_used() as u32)),
            )
    }

    pub fn info(&self, id: PropertyId) -> CodecResult<PropertyDescriptor> {
        self.entry(id).map(|entry| entry.descriptor)
    }

    /// Read a property into a host buffer of `capacity` bytes
    pub fn get(
        &self,
        host: &mut S,
        id: PropertyId,
        capacity: usize,
        query: &PropertyQuery,
    ) -> CodecResult<PropertyValue> {
        let entry = self.entry(id)?;
        entry.descriptor.size.check(id, capacity)?;
        trace!(?id, capacity, "get property");
        (entry.getter)(host, capacity, query)
    }

    /// Write a property, only allowed before initialization
    pub fn set(&self, host: &mut S, id: PropertyId, value: PropertyValue) -> CodecResult<()> {
        let entry = self.entry(id)?;
        let setter = match entry.setter {
            Some(setter) if entry.descriptor.writable => setter,
            _ => return Err(CodecError::illegal(format!("{:?} is read-only", id))),
        };
        if host.formats().is_initialized() {
            return Err(CodecError::illegal(format!(
                "{:?} cannot change after initialization",
                id
            )));
        }
        trace!(?id, "set property");
        setter(host, value)
    }

    fn entry(&self, id: PropertyId) -> CodecResult<&PropertyEntry<S>> {
        self.entries
            .get(&id)
            .ok_or_else(|| CodecError::UnknownProperty(format!("{:?}", id)))
    }
}

impl<S: PropertyHost> Default for PropertyRegistry<S> {
    fn default() -> Self {
        Self::base()
    }
}

fn wrong_value(id: PropertyId, value: &PropertyValue) -> CodecError {
    CodecError::bad_size(format!("{:?} cannot take {:?}", id, value))
}

fn current_layout<S: PropertyHost>(
    host: &mut S,
    _: usize,
    _: &PropertyQuery,
) -> CodecResult<PropertyValue> {
    Ok(PropertyValue::ChannelLayout(ChannelLayout::from_tag(
        host.formats().channel_layout(),
    )))
}

// the current layout once initialized, every layout before
fn available_layouts<S: PropertyHost>(
    host: &mut S,
    _: usize,
    _: &PropertyQuery,
) -> CodecResult<PropertyValue> {
    let formats = host.formats();
    let tags = if formats.is_initialized() {
        vec![formats.channel_layout()]
    } else {
        SUPPORTED_LAYOUTS.to_vec()
    };
    Ok(PropertyValue::LayoutTags(tags))
}

// ============================================================================
// Encoder
// ============================================================================

impl<E: EncodeEngine> PropertyHost for EncoderSession<E> {
    fn formats(&self) -> &FormatNegotiator {
        self.negotiator()
    }

    fn formats_mut(&mut self) -> &mut FormatNegotiator {
        self.negotiator_mut()
    }

    fn packet_frame_size(&self) -> u32 {
        self.frames_per_packet() as u32
    }

    fn packet_byte_bound(&self) -> u32 {
        self.max_packet_bytes()
    }

    fn input_buffer_size(&self) -> usize {
        self.frames_per_packet() * self.input_format().bytes_per_frame as usize
    }

    fn input_buffer_used(&self) -> usize {
        self.bytes_buffered()
    }
}

impl<E: EncodeEngine> EncoderSession<E> {
    /// The encoder's property table
    pub fn registry() -> PropertyRegistry<Self> {
        PropertyRegistry::<Self>::base()
            .read_only(
                PropertyId::AvailableNumberChannels,
                SizeRule::Exact(LAYOUT_TAGS_SIZE),
                |_, _, _| Ok(PropertyValue::U32List((1..=MAX_CHANNELS).collect())),
            )
            .read_only(
                PropertyId::AvailableInputSampleRates,
                SizeRule::Exact(VALUE_RANGE_SIZE),
                any_rate,
            )
            .read_only(
                PropertyId::AvailableOutputSampleRates,
                SizeRule::Exact(VALUE_RANGE_SIZE),
                any_rate,
            )
            .writable(
                PropertyId::QualitySetting,
                SizeRule::Exact(U32_SIZE),
                |session, _, _| Ok(PropertyValue::U32(session.quality())),
                |session, value| match value {
                    PropertyValue::U32(quality) => session.set_quality(quality),
                    other => Err(wrong_value(PropertyId::QualitySetting, &other)),
                },
            )
            .read_only(
                PropertyId::ZeroFramesPadded,
                SizeRule::Exact(U32_SIZE),
                |_, _, _| Ok(PropertyValue::U32(0)),
            )
            .read_only(
                PropertyId::PrimeMethod,
                SizeRule::Exact(U32_SIZE),
                |_, _, _| Ok(PropertyValue::U32(PRIME_METHOD_NONE)),
            )
            .read_only(
                PropertyId::PrimeInfo,
                SizeRule::Exact(PRIME_INFO_SIZE),
                |session, _, _| {
                    Ok(PropertyValue::PrimeInfo(PrimeInfo {
                        leading_frames: 0,
                        trailing_frames: session.trailing_frames(),
                    }))
                },
            )
            .writable(
                PropertyId::Settings,
                SizeRule::Exact(SETTINGS_HANDLE_SIZE),
                |session, _, _| Ok(PropertyValue::Settings(session.settings())),
                |session, value| match value {
                    PropertyValue::Settings(settings) => session.apply_settings(&settings),
                    other => Err(wrong_value(PropertyId::Settings, &other)),
                },
            )
            .read_only(
                PropertyId::InputFormatsForOutputFormat,
                SizeRule::AtLeast(STREAM_FORMAT_SIZE),
                |session, capacity, query| {
                    let output = query.format(PropertyId::InputFormatsForOutputFormat)?;
                    let formats = session.negotiator().input_formats_for_output(&output);
                    check_list_fits(
                        PropertyId::InputFormatsForOutputFormat,
                        formats.len() * STREAM_FORMAT_SIZE,
                        capacity,
                    )?;
                    Ok(PropertyValue::Formats(formats))
                },
            )
    }

    pub fn property_info(&self, id: PropertyId) -> CodecResult<PropertyDescriptor> {
        Self::registry().info(id)
    }

    pub fn get_property(
        &mut self,
        id: PropertyId,
        capacity: usize,
        query: &PropertyQuery,
    ) -> CodecResult<PropertyValue> {
        Self::registry().get(self, id, capacity, query)
    }

    pub fn set_property(&mut self, id: PropertyId, value: PropertyValue) -> CodecResult<()> {
        Self::registry().set(self, id, value)
    }
}

fn any_rate<S>(_: &mut S, _: usize, _: &PropertyQuery) -> CodecResult<PropertyValue> {
    Ok(PropertyValue::SampleRateRange {
        minimum: 0.0,
        maximum: 0.0,
    })
}

fn check_list_fits(id: PropertyId, needed: usize, capacity: usize) -> CodecResult<()> {
    if needed > capacity {
        return Err(CodecError::bad_size(format!(
            "{:?} needs {} bytes, got {}",
            id, needed, capacity
        )));
    }
    Ok(())
}

// ============================================================================
// Decoder
// ============================================================================

impl<E: DecodeEngine> PropertyHost for DecoderSession<E> {
    fn formats(&self) -> &FormatNegotiator {
        self.negotiator()
    }

    fn formats_mut(&mut self) -> &mut FormatNegotiator {
        self.negotiator_mut()
    }

    fn packet_frame_size(&self) -> u32 {
        self.frames_per_packet()
    }

    fn packet_byte_bound(&self) -> u32 {
        self.max_packet_bytes()
    }

    fn input_buffer_size(&self) -> usize {
        INPUT_BUFFER_BYTES
    }

    fn input_buffer_used(&self) -> usize {
        self.bytes_buffered()
    }
}

impl<E: DecodeEngine> DecoderSession<E> {
    /// The decoder's property table
    pub fn registry() -> PropertyRegistry<Self> {
        PropertyRegistry::<Self>::base()
            .read_only(
                PropertyId::FormatList,
                SizeRule::AtLeast(FORMAT_LIST_ITEM_SIZE),
                |_, _, query| Ok(PropertyValue::FormatList(vec![format_list_item(query.cookie)?])),
            )
            .read_only(
                PropertyId::OutputFormatsForInputFormat,
                SizeRule::AtLeast(STREAM_FORMAT_SIZE),
                |session, _, query| {
                    let input = query
                        .format
                        .unwrap_or_else(|| *session.negotiator().input_format());
                    Ok(PropertyValue::Formats(
                        session.negotiator().output_formats_for_input(&input)?,
                    ))
                },
            )
    }

    pub fn property_info(&self, id: PropertyId) -> CodecResult<PropertyDescriptor> {
        Self::registry().info(id)
    }

    pub fn get_property(
        &mut self,
        id: PropertyId,
        capacity: usize,
        query: &PropertyQuery,
    ) -> CodecResult<PropertyValue> {
        Self::registry().get(self, id, capacity, query)
    }

    pub fn set_property(&mut self, id: PropertyId, value: PropertyValue) -> CodecResult<()> {
        Self::registry().set(self, id, value)
    }
}

/// flac description of a cookie's stream plus its layout, blank without a cookie
fn format_list_item(blob: &[u8]) -> CodecResult<FormatListItem> {
    let mut format = StreamFormat {
        format_id: FormatId::Flac,
        ..Default::default()
    };
    if blob.is_empty() {
        return Ok(FormatListItem {
            format,
            layout_tag: ChannelLayoutTag::UNKNOWN,
        });
    }

    let info = cookie::deserialize(blob)?;
    format.sample_rate = info.sample_rate as f64;
    format.frames_per_packet = info.max_blocksize;
    format.channels_per_frame = info.channels;
    format.format_flags = flac_flag_for_bits(info.bits_per_sample);
    Ok(FormatListItem {
        format,
        layout_tag: ChannelLayoutTag::for_channels(info.channels)
            .unwrap_or(ChannelLayoutTag::UNKNOWN),
    })
}
