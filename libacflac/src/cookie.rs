//! magic cookie codec
//!
//! The cookie is a big-endian, atom-wrapped copy of the stream info:
//!
//! ```text
//! [size 'frma' 'flac']                       12 bytes
//! [size 'flac' version/flags][stream info]   12 + 56 bytes
//! [size 'chan' version/flags tag bitmap n]   24 bytes, only for > 2 channels
//! [8 0]                                      8 bytes
//! ```
//!
//! Parsing also accepts a bare stream info with no atoms around it.

use crate::core::cursor::Cursor;
use crate::core::{fourcc, ChannelLayoutTag, CodecError, CodecResult, StreamInfo};

/// serialized stream info: seven u32, 4 pad bytes, u64 total, 16 checksum bytes
pub const STREAM_INFO_SIZE: usize = 56;
pub const ATOM_HEADER_SIZE: usize = 8;
pub const FULL_ATOM_HEADER_SIZE: usize = 12;
pub const FORMAT_ATOM_SIZE: usize = 12;
pub const STREAM_INFO_ATOM_SIZE: usize = FULL_ATOM_HEADER_SIZE + STREAM_INFO_SIZE;
pub const CHANNEL_LAYOUT_ATOM_SIZE: usize = FULL_ATOM_HEADER_SIZE + 12;
pub const TERMINATOR_ATOM_SIZE: usize = 8;

const ATOM_FORMAT: u32 = fourcc(b"frma");
const ATOM_FLAC: u32 = fourcc(b"flac");
const ATOM_CHANNEL_LAYOUT: u32 = fourcc(b"chan");

/// byte size of the cookie written for a channel count
pub fn cookie_size(channels: u32) -> usize {
    let layout = if channels > 2 {
        CHANNEL_LAYOUT_ATOM_SIZE
    } else {
        0
    };
    FORMAT_ATOM_SIZE + STREAM_INFO_ATOM_SIZE + layout + TERMINATOR_ATOM_SIZE
}

/// build a full cookie
pub fn serialize(info: &StreamInfo, channels: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(cookie_size(channels));

    put_u32(&mut out, FORMAT_ATOM_SIZE as u32);
    put_u32(&mut out, ATOM_FORMAT);
    put_u32(&mut out, ATOM_FLAC);

    put_u32(&mut out, STREAM_INFO_ATOM_SIZE as u32);
    put_u32(&mut out, ATOM_FLAC);
    put_u32(&mut out, 0);
    write_stream_info(info, &mut out);

    if channels > 2 {
        let tag = ChannelLayoutTag::for_channels(channels).unwrap_or(ChannelLayoutTag::UNKNOWN);
        put_u32(&mut out, CHANNEL_LAYOUT_ATOM_SIZE as u32);
        put_u32(&mut out, ATOM_CHANNEL_LAYOUT);
        put_u32(&mut out, 0);
        put_u32(&mut out, tag.0);
        put_u32(&mut out, 0);
        put_u32(&mut out, 0);
    }

    put_u32(&mut out, TERMINATOR_ATOM_SIZE as u32);
    put_u32(&mut out, 0);

    out
}

/// build a cookie into a caller buffer, returns the bytes written
///
/// Nothing is written when the buffer is too small.
pub fn serialize_into(info: &StreamInfo, channels: u32, buffer: &mut [u8]) -> CodecResult<usize> {
    let needed = cookie_size(channels);
    if needed > buffer.len() {
        return Err(CodecError::bad_size(format!(
            "cookie needs {} bytes, buffer holds {}",
            needed,
            buffer.len()
        )));
    }

    let cookie = serialize(info, channels);
    buffer[..cookie.len()].copy_from_slice(&cookie);
    Ok(cookie.len())
}

/// parse a cookie, wrapped or bare
pub fn deserialize(blob: &[u8]) -> CodecResult<StreamInfo> {
    let offset = if is_wrapped(blob) {
        FORMAT_ATOM_SIZE + FULL_ATOM_HEADER_SIZE
    } else {
        0
    };

    let body = blob.get(offset..).unwrap_or(&[]);
    read_stream_info(body).ok_or_else(|| {
        CodecError::bad_size(format!(
            "cookie of {} bytes too short for stream info at offset {}",
            blob.len(),
            offset
        ))
    })
}

/// channel layout tag stored in a cookie, if it carries one
pub fn channel_layout(blob: &[u8]) -> Option<ChannelLayoutTag> {
    if !is_wrapped(blob) {
        return None;
    }

    let mut cursor = Cursor::new(blob);
    while cursor.remaining() >= ATOM_HEADER_SIZE {
        let start = cursor.position();
        let size = cursor.read_u32_be()? as usize;
        let kind = cursor.read_u32_be()?;
        if size < ATOM_HEADER_SIZE {
            return None;
        }
        if kind == ATOM_CHANNEL_LAYOUT {
            cursor.skip(4)?;
            return cursor.read_u32_be().map(ChannelLayoutTag);
        }
        cursor.skip(start + size - cursor.position())?;
    }
    None
}

fn is_wrapped(blob: &[u8]) -> bool {
    blob.len() > STREAM_INFO_SIZE && blob[4..8] == ATOM_FORMAT.to_be_bytes()
}

/// append the 56 byte big-endian stream info
pub fn write_stream_info(info: &StreamInfo, out: &mut Vec<u8>) {
    put_u32(out, info.min_blocksize);
    put_u32(out, info.max_blocksize);
    put_u32(out, info.min_framesize);
    put_u32(out, info.max_framesize);
    put_u32(out, info.sample_rate);
    put_u32(out, info.channels);
    put_u32(out, info.bits_per_sample);
    // alignment before the 64-bit total
    put_u32(out, 0);
    out.extend_from_slice(&info.total_samples.to_be_bytes());
    out.extend_from_slice(&info.checksum);
}

/// parse the 56 byte stream info at the start of `bytes`
pub fn read_stream_info(bytes: &[u8]) -> Option<StreamInfo> {
    let mut cursor = Cursor::new(bytes);
    let min_blocksize = cursor.read_u32_be()?;
    let max_blocksize = cursor.read_u32_be()?;
    let min_framesize = cursor.read_u32_be()?;
    let max_framesize = cursor.read_u32_be()?;
    let sample_rate = cursor.read_u32_be()?;
    let channels = cursor.read_u32_be()?;
    let bits_per_sample = cursor.read_u32_be()?;
    cursor.skip(4)?;
    let total_samples = cursor.read_u64_be()?;
    let mut checksum = [0u8; 16];
    checksum.copy_from_slice(cursor.read_bytes(16)?);

    Some(StreamInfo {
        min_blocksize,
        max_blocksize,
        min_framesize,
        max_framesize,
        sample_rate,
        channels,
        bits_per_sample,
        total_samples,
        checksum,
    })
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
