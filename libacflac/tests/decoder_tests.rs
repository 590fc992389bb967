//! Decoder session behaviour seen from the host side.

use libacflac::core::StreamFormat;
use libacflac::{
    cookie, repack, CodecConfig, CodecError, DecoderSession, DecoderState, EncoderSession,
    PacketDescription, ProduceStatus, StreamInfo,
};

/// Encode `frames` of a ramp and return the packets plus the final cookie
fn encode(frames: usize, channels: u32) -> (Vec<Vec<u8>>, Vec<u8>, Vec<u8>) {
    let samples: Vec<i32> = (0..frames * channels as usize)
        .map(|i| ((i * 37) % 2000) as i32 - 1000)
        .collect();
    let pcm = repack::pack(&samples, 16).unwrap();

    let mut session = EncoderSession::new(CodecConfig::default()).unwrap();
    session
        .initialize(
            Some(&StreamFormat::linear_pcm(44100.0, channels, 16)),
            None,
            None,
        )
        .unwrap();

    let mut out = vec![0u8; session.max_packet_bytes() as usize * 2];
    let mut packets = Vec::new();
    let mut pos = 0;
    loop {
        if pos < pcm.len() {
            pos += session.append(&pcm[pos..]).unwrap().bytes_consumed;
        } else {
            session.append(&[]).unwrap();
        }
        let produced = session.produce(&mut out, 1).unwrap();
        if produced.bytes_written > 0 {
            packets.push(out[..produced.bytes_written].to_vec());
        }
        if produced.status == ProduceStatus::AtEndOfStream {
            break;
        }
    }

    let blob = session.magic_cookie(256).unwrap();
    (packets, blob, pcm)
}

fn decoder_for(blob: &[u8]) -> DecoderSession {
    let mut session = DecoderSession::new(CodecConfig::default()).unwrap();
    session.initialize(None, None, Some(blob)).unwrap();
    session
}

#[test]
fn test_append_before_initialize() {
    let mut session = DecoderSession::new(CodecConfig::default()).unwrap();
    let err = session.append(&[1, 2, 3], 1, None).unwrap_err();
    assert!(matches!(err, CodecError::StateError(_)));
}

#[test]
fn test_produce_without_packet() {
    let (_, blob, _) = encode(100, 2);
    let mut session = decoder_for(&blob);

    let mut out = vec![0u8; session.required_output_bytes()];
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::NeedsMoreInput);
    assert_eq!(produced.bytes_written, 0);
}

#[test]
fn test_zero_packets_or_empty_data_take_nothing() {
    let (packets, blob, _) = encode(100, 2);
    let mut session = decoder_for(&blob);

    assert_eq!(session.append(&packets[0], 0, None).unwrap().bytes_consumed, 0);
    assert_eq!(session.append(&[], 1, None).unwrap().bytes_consumed, 0);
    assert_eq!(session.state(), DecoderState::Empty);
}

#[test]
fn test_packet_at_described_offset() {
    let (packets, blob, pcm) = encode(4608, 2);
    let mut session = decoder_for(&blob);

    let mut data = vec![0xAAu8; 10];
    data.extend_from_slice(&packets[0]);
    data.extend_from_slice(&[0xBB; 5]);
    let desc = PacketDescription::new(10, packets[0].len() as u32);

    let appended = session.append(&data, 1, Some(&desc)).unwrap();
    assert_eq!(appended.bytes_consumed, 10 + packets[0].len());
    assert_eq!(appended.packets, 1);

    let mut out = vec![0u8; session.required_output_bytes()];
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::Success);
    assert_eq!(produced.packets, 4608);
    assert_eq!(&out[..produced.bytes_written], &pcm[..]);
}

#[test]
fn test_short_final_packet_is_end_of_stream() {
    let (packets, blob, pcm) = encode(500, 1);
    assert_eq!(packets.len(), 1);
    let mut session = decoder_for(&blob);

    session.append(&packets[0], 1, None).unwrap();
    let mut out = vec![0u8; session.required_output_bytes()];
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::AtEndOfStream);
    assert_eq!(produced.bytes_written, 500 * 2);
    assert_eq!(session.frames_decoded(), 500);
    assert_eq!(&out[..produced.bytes_written], &pcm[..]);
}

#[test]
fn test_channel_mismatch_fails_then_recovers() {
    let (mono_packets, _, _) = encode(4608, 1);
    let (stereo_packets, stereo_cookie, stereo_pcm) = encode(4608, 2);
    let mut session = decoder_for(&stereo_cookie);
    let mut out = vec![0u8; session.required_output_bytes()];

    session.append(&mono_packets[0], 1, None).unwrap();
    let err = session.produce(&mut out, 1).unwrap_err();
    assert!(matches!(err, CodecError::EngineFailure(_)));
    assert_eq!(session.state(), DecoderState::Empty);

    session.append(&stereo_packets[0], 1, None).unwrap();
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(&out[..produced.bytes_written], &stereo_pcm[..]);
}

#[test]
fn test_garbage_then_valid_packet() {
    let (packets, blob, pcm) = encode(4608, 2);
    let mut session = decoder_for(&blob);
    let mut out = vec![0u8; session.required_output_bytes()];

    session.append(&[0x00, 0x01, 0x02, 0x03], 1, None).unwrap();
    assert!(matches!(
        session.produce(&mut out, 1),
        Err(CodecError::EngineFailure(_))
    ));

    session.append(&packets[0], 1, None).unwrap();
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::Success);
    assert_eq!(&out[..produced.bytes_written], &pcm[..]);
}

#[test]
fn test_corrupt_frames_fail_without_panicking() {
    // sync, block size 1, two channels, 16 bits
    let header = |flags: u8| vec![0xFF, 0xF8, 0x00, 0x01, 0x02, 0x10, flags];

    // order 0 with a Rice parameter of 70
    let mut bad_parameter = header(0x00);
    bad_parameter.extend_from_slice(&[0x00, 0x46, 0x00, 0x00, 0x00, 0x10]);
    bad_parameter.extend_from_slice(&[0u8; 16]);

    // mid/side pair whose sum leaves the i64 range
    let mut bad_mid_side = header(0x01);
    bad_mid_side.push(0xFF);
    bad_mid_side.extend_from_slice(&i64::MAX.to_be_bytes());
    bad_mid_side.push(0xFF);
    bad_mid_side.extend_from_slice(&1i64.to_be_bytes());

    let (packets, blob, pcm) = encode(4608, 2);
    let mut session = decoder_for(&blob);
    let mut out = vec![0u8; session.required_output_bytes()];

    for packet in [&bad_parameter, &bad_mid_side] {
        let appended = session.append(packet, 1, None).unwrap();
        assert_eq!(appended.bytes_consumed, packet.len());
        assert!(matches!(
            session.produce(&mut out, 1),
            Err(CodecError::EngineFailure(_))
        ));
        assert_eq!(session.state(), DecoderState::Empty);
        assert_eq!(session.frames_decoded(), 0);
    }

    session.append(&packets[0], 1, None).unwrap();
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(&out[..produced.bytes_written], &pcm[..]);
}

#[test]
fn test_20_and_32_bit_streams_cannot_be_repacked() {
    for bits in [20u32, 32] {
        let info = StreamInfo {
            min_blocksize: 4608,
            max_blocksize: 4608,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: bits,
            ..Default::default()
        };
        let mut session = decoder_for(&cookie::serialize(&info, 2));
        assert_eq!(session.output_format().bits_per_channel, bits);

        // one frame of two constant zero channels
        let mut packet = vec![0xFF, 0xF8, 0x00, 0x01, 0x02, bits as u8, 0x00];
        for _ in 0..2 {
            packet.push(0xFF);
            packet.extend_from_slice(&0i64.to_be_bytes());
        }

        let mut out = vec![0u8; session.required_output_bytes()];
        session.append(&packet, 1, None).unwrap();
        let err = session.produce(&mut out, 1).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedFormat(_)), "{}-bit", bits);
        assert_eq!(session.state(), DecoderState::Empty);
    }
}

#[test]
fn test_reset_drops_resident_packet() {
    let (packets, blob, _) = encode(4608, 2);
    let mut session = decoder_for(&blob);

    session.append(&packets[0], 1, None).unwrap();
    assert_eq!(session.state(), DecoderState::Loaded);

    session.reset();
    assert_eq!(session.state(), DecoderState::Empty);
    assert_eq!(session.bytes_buffered(), 0);

    let mut out = vec![0u8; session.required_output_bytes()];
    let produced = session.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::NeedsMoreInput);
}

#[test]
fn test_required_output_follows_cookie_block_size() {
    let info = StreamInfo {
        min_blocksize: 1152,
        max_blocksize: 1152,
        sample_rate: 44100,
        channels: 2,
        bits_per_sample: 24,
        ..Default::default()
    };
    let session = decoder_for(&cookie::serialize(&info, 2));
    assert_eq!(session.frames_per_packet(), 1152);
    assert_eq!(session.required_output_bytes(), 1152 * 6);
    assert_eq!(session.max_packet_bytes(), 1152 * 2 * 3 + 12);
}

#[test]
fn test_oversized_packet_refused() {
    let (_, blob, _) = encode(100, 2);
    let mut session = decoder_for(&blob);

    let huge = vec![0u8; libacflac::streaming::INPUT_BUFFER_BYTES + 1];
    let appended = session.append(&huge, 1, None).unwrap();
    assert_eq!(appended.bytes_consumed, 0);
    assert_eq!(session.state(), DecoderState::Empty);
}
