//! Encode then decode through the packet sessions and compare the PCM.

use libacflac::core::StreamFormat;
use libacflac::{
    repack, CodecConfig, DecoderSession, EncoderSession, ProduceStatus, StreamInfo,
};

fn sine(frames: usize, channels: usize, amplitude: f32) -> Vec<i32> {
    (0..frames * channels)
        .map(|i| {
            let frame = (i / channels) as f32;
            let ch = (i % channels) as f32;
            ((frame * (0.013 + ch * 0.002) + ch).sin() * amplitude) as i32
        })
        .collect()
}

struct Encoded {
    packets: Vec<Vec<u8>>,
    frames: Vec<u32>,
    cookie: Vec<u8>,
}

fn encode(pcm: &[u8], format: &StreamFormat, config: CodecConfig) -> Encoded {
    let mut session = EncoderSession::new(config).unwrap();
    session.initialize(Some(format), None, None).unwrap();

    let mut out = vec![0u8; session.max_packet_bytes() as usize * 2];
    let mut encoded = Encoded {
        packets: Vec::new(),
        frames: Vec::new(),
        cookie: Vec::new(),
    };

    let mut pos = 0;
    loop {
        if pos < pcm.len() {
            pos += session.append(&pcm[pos..]).unwrap().bytes_consumed;
        } else {
            session.append(&[]).unwrap();
        }

        let produced = session.produce(&mut out, 1).unwrap();
        if produced.packets > 0 {
            let desc = produced.description.unwrap();
            assert_eq!(desc.data_byte_size as usize, produced.bytes_written);
            encoded.packets.push(out[..produced.bytes_written].to_vec());
            encoded.frames.push(desc.variable_frames);
        }
        if produced.status == ProduceStatus::AtEndOfStream {
            break;
        }
    }

    encoded.cookie = session.magic_cookie(256).unwrap();
    encoded
}

fn decode(encoded: &Encoded) -> (Vec<u8>, Vec<ProduceStatus>) {
    let mut session = DecoderSession::new(CodecConfig::default()).unwrap();
    session.initialize(None, None, Some(&encoded.cookie)).unwrap();

    let mut out = vec![0u8; session.required_output_bytes()];
    let mut pcm = Vec::new();
    let mut statuses = Vec::new();
    for packet in &encoded.packets {
        let appended = session.append(packet, 1, None).unwrap();
        assert_eq!(appended.bytes_consumed, packet.len());
        let produced = session.produce(&mut out, 1).unwrap();
        pcm.extend_from_slice(&out[..produced.bytes_written]);
        statuses.push(produced.status);
    }
    (pcm, statuses)
}

fn assert_roundtrip(samples: &[i32], channels: u32, bits: u32, config: CodecConfig) -> Encoded {
    let pcm = repack::pack(samples, bits).unwrap();
    let format = StreamFormat::linear_pcm(44100.0, channels, bits);
    let encoded = encode(&pcm, &format, config);
    let (decoded, _) = decode(&encoded);
    assert_eq!(decoded.len(), pcm.len());
    assert!(decoded == pcm, "{} ch {}-bit roundtrip differs", channels, bits);
    encoded
}

// ============================================================================
// Depths and channel counts
// ============================================================================

#[test]
fn test_roundtrip_16_bit_stereo() {
    let samples = sine(4608 * 3, 2, 20000.0);
    let encoded = assert_roundtrip(&samples, 2, 16, CodecConfig::default());
    assert_eq!(encoded.packets.len(), 3);
    assert_eq!(encoded.frames, vec![4608, 4608, 4608]);
}

#[test]
fn test_roundtrip_16_bit_mono() {
    let samples = sine(10_000, 1, 30000.0);
    assert_roundtrip(&samples, 1, 16, CodecConfig::default());
}

#[test]
fn test_roundtrip_24_bit_stereo() {
    let samples = sine(4608 * 2 + 17, 2, 6_000_000.0);
    assert_roundtrip(&samples, 2, 24, CodecConfig::default());
}

#[test]
fn test_roundtrip_24_bit_extremes() {
    let mut samples = vec![0i32; 4608 * 2];
    for (i, s) in samples.iter_mut().enumerate() {
        *s = match i % 4 {
            0 => 0x7F_FFFF,
            1 => -0x80_0000,
            2 => -1,
            _ => 1,
        };
    }
    assert_roundtrip(&samples, 2, 24, CodecConfig::default());
}

#[test]
fn test_roundtrip_six_channels() {
    let samples = sine(6000, 6, 12000.0);
    let encoded = assert_roundtrip(&samples, 6, 16, CodecConfig::default());
    assert_eq!(encoded.cookie.len(), 112);
}

#[test]
fn test_roundtrip_eight_channels_24_bit() {
    let samples = sine(5000, 8, 3_000_000.0);
    assert_roundtrip(&samples, 8, 24, CodecConfig::default());
}

// ============================================================================
// Stream shape
// ============================================================================

#[test]
fn test_partial_tail_ends_stream() {
    let samples = sine(4608 + 1234, 2, 15000.0);
    let pcm = repack::pack(&samples, 16).unwrap();
    let encoded = encode(
        &pcm,
        &StreamFormat::linear_pcm(48000.0, 2, 16),
        CodecConfig::default(),
    );
    assert_eq!(encoded.frames, vec![4608, 1234]);

    let (decoded, statuses) = decode(&encoded);
    assert_eq!(
        statuses,
        vec![ProduceStatus::Success, ProduceStatus::AtEndOfStream]
    );
    assert_eq!(decoded, pcm);
}

#[test]
fn test_exact_multiple_has_no_empty_packet() {
    let samples = sine(4608 * 2, 2, 15000.0);
    let pcm = repack::pack(&samples, 16).unwrap();
    let encoded = encode(
        &pcm,
        &StreamFormat::linear_pcm(44100.0, 2, 16),
        CodecConfig::default(),
    );
    assert_eq!(encoded.packets.len(), 2);
    assert!(encoded.packets.iter().all(|p| !p.is_empty()));
}

#[test]
fn test_cookie_describes_encoded_stream() {
    let samples = sine(7000, 2, 15000.0);
    let pcm = repack::pack(&samples, 16).unwrap();
    let encoded = encode(
        &pcm,
        &StreamFormat::linear_pcm(96000.0, 2, 16),
        CodecConfig::default(),
    );

    let info: StreamInfo = libacflac::cookie::deserialize(&encoded.cookie).unwrap();
    assert_eq!(info.sample_rate, 96000);
    assert_eq!(info.channels, 2);
    assert_eq!(info.bits_per_sample, 16);
    assert_eq!(info.total_samples, 7000);
    assert_eq!(info.max_blocksize, 4608);
    let largest = encoded.packets.iter().map(|p| p.len()).max().unwrap();
    assert_eq!(info.max_framesize as usize, largest);
}

#[test]
fn test_low_latency_roundtrip() {
    let samples = sine(1152 * 4 + 100, 2, 15000.0);
    let encoded = assert_roundtrip(&samples, 2, 16, CodecConfig::low_latency());
    assert_eq!(encoded.packets.len(), 5);
    assert_eq!(encoded.frames.last(), Some(&100));
}

#[test]
fn test_irregular_appends_split_samples() {
    let frames = 4608 * 2 + 777;
    let samples = sine(frames, 3, 5_000_000.0);
    let pcm = repack::pack(&samples, 24).unwrap();
    let format = StreamFormat::linear_pcm(48000.0, 3, 24);

    let mut session = EncoderSession::new(CodecConfig::default().with_quality(5)).unwrap();
    session.initialize(Some(&format), None, None).unwrap();
    let mut out = vec![0u8; session.max_packet_bytes() as usize * 2];

    // odd sizes keep cutting through the three bytes of a sample
    let chunk_sizes = [7usize, 13, 1, 4000, 2];
    let mut encoded = Encoded {
        packets: Vec::new(),
        frames: Vec::new(),
        cookie: Vec::new(),
    };
    let mut pos = 0;
    let mut chunk = 0;
    let mut chunk_end = chunk_sizes[0].min(pcm.len());
    loop {
        if pos < pcm.len() {
            pos += session.append(&pcm[pos..chunk_end]).unwrap().bytes_consumed;
            if pos == chunk_end {
                chunk += 1;
                chunk_end = (pos + chunk_sizes[chunk % chunk_sizes.len()]).min(pcm.len());
            }
        } else {
            session.append(&[]).unwrap();
        }

        let produced = session.produce(&mut out, 1).unwrap();
        if produced.packets > 0 {
            encoded.packets.push(out[..produced.bytes_written].to_vec());
            encoded
                .frames
                .push(produced.description.unwrap().variable_frames);
        }
        if produced.status == ProduceStatus::AtEndOfStream {
            break;
        }
    }
    encoded.cookie = session.magic_cookie(256).unwrap();

    assert_eq!(encoded.frames, vec![4608, 4608, 777]);
    let (decoded, statuses) = decode(&encoded);
    assert_eq!(statuses.last(), Some(&ProduceStatus::AtEndOfStream));
    assert!(decoded == pcm, "chunked 24-bit roundtrip differs");
}

// ============================================================================
// Quality levels
// ============================================================================

#[test]
fn test_every_quality_level_is_lossless() {
    // near identical channels make mid/side worthwhile from level 2 up
    let samples: Vec<i32> = (0..4608 * 2)
        .flat_map(|frame| {
            let left = ((frame as f32 * 0.02).sin() * 20000.0) as i32;
            [left, left - 3]
        })
        .collect();

    for quality in 0..=8 {
        assert_roundtrip(&samples, 2, 16, CodecConfig::default().with_quality(quality));
    }
}

#[test]
fn test_higher_quality_is_not_larger() {
    let samples = sine(4608, 1, 20000.0);
    let pcm = repack::pack(&samples, 16).unwrap();
    let format = StreamFormat::linear_pcm(44100.0, 1, 16);

    let fast = encode(&pcm, &format, CodecConfig::default().with_quality(0));
    let best = encode(&pcm, &format, CodecConfig::default().with_quality(8));
    assert!(best.packets[0].len() <= fast.packets[0].len());
}
