//! sample repacking between packed pcm bytes and 32-bit engine words
//!
//! 16-bit samples use native byte order, 24-bit samples are three bytes,
//! most significant first. Other depths are rejected.

use crate::core::{CodecError, CodecResult};

fn bytes_per_sample(bit_depth: u32) -> CodecResult<usize> {
    match bit_depth {
        16 => Ok(2),
        24 => Ok(3),
        other => Err(CodecError::unsupported(format!(
            "cannot repack {}-bit samples",
            other
        ))),
    }
}

#[inline]
fn write_sample(sample: i32, bit_depth: u32, out: &mut [u8]) {
    if bit_depth == 16 {
        out.copy_from_slice(&(sample as i16).to_ne_bytes());
    } else {
        out[0] = (sample >> 16) as u8;
        out[1] = (sample >> 8) as u8;
        out[2] = sample as u8;
    }
}

#[inline]
fn read_sample(bytes: &[u8], bit_depth: u32) -> i32 {
    if bit_depth == 16 {
        i16::from_ne_bytes([bytes[0], bytes[1]]) as i32
    } else {
        let raw = ((bytes[0] as i32) << 16) | ((bytes[1] as i32) << 8) | bytes[2] as i32;
        // sign extend from bit 23
        (raw << 8) >> 8
    }
}

/// pack engine samples into `out`, returns bytes written
pub fn pack_into(samples: &[i32], bit_depth: u32, out: &mut [u8]) -> CodecResult<usize> {
    let bps = bytes_per_sample(bit_depth)?;
    let needed = samples.len() * bps;
    if needed > out.len() {
        return Err(CodecError::NotEnoughBufferSpace {
            needed,
            available: out.len(),
        });
    }

    for (&sample, chunk) in samples.iter().zip(out.chunks_exact_mut(bps)) {
        write_sample(sample, bit_depth, chunk);
    }
    Ok(needed)
}

/// pack engine samples into a new buffer
pub fn pack(samples: &[i32], bit_depth: u32) -> CodecResult<Vec<u8>> {
    let mut out = vec![0u8; samples.len() * bytes_per_sample(bit_depth)?];
    pack_into(samples, bit_depth, &mut out)?;
    Ok(out)
}

/// unpack whole samples from `bytes` into `out`, returns samples written
///
/// A trailing partial sample is left alone.
pub fn unpack_into(bytes: &[u8], bit_depth: u32, out: &mut [i32]) -> CodecResult<usize> {
    let bps = bytes_per_sample(bit_depth)?;
    let count = (bytes.len() / bps).min(out.len());

    for (slot, chunk) in out[..count].iter_mut().zip(bytes.chunks_exact(bps)) {
        *slot = read_sample(chunk, bit_depth);
    }
    Ok(count)
}

/// unpack whole samples into a new buffer
pub fn unpack(bytes: &[u8], bit_depth: u32) -> CodecResult<Vec<i32>> {
    let mut out = vec![0i32; bytes.len() / bytes_per_sample(bit_depth)?];
    unpack_into(bytes, bit_depth, &mut out)?;
    Ok(out)
}

/// interleave per-channel engine samples into packed bytes, returns bytes written
pub fn pack_planar<C: AsRef<[i32]>>(
    channels: &[C],
    frames: usize,
    bit_depth: u32,
    out: &mut [u8],
) -> CodecResult<usize> {
    let bps = bytes_per_sample(bit_depth)?;
    let needed = frames * channels.len() * bps;
    if needed > out.len() {
        return Err(CodecError::NotEnoughBufferSpace {
            needed,
            available: out.len(),
        });
    }
    if let Some(short) = channels.iter().find(|ch| ch.as_ref().len() < frames) {
        return Err(CodecError::EngineFailure(format!(
            "channel holds {} samples, frame has {}",
            short.as_ref().len(),
            frames
        )));
    }

    let mut pos = 0;
    for frame in 0..frames {
        for channel in channels {
            write_sample(channel.as_ref()[frame], bit_depth, &mut out[pos..pos + bps]);
            pos += bps;
        }
    }
    Ok(needed)
}
