//! Internal streaming tests

use super::*;
use crate::config::CodecConfig;
use crate::core::{CodecError, PacketDescription, StreamFormat};
use crate::repack;

const FRAME_BYTES_16_STEREO: usize = 4608 * 4;

fn sine_pcm(frames: usize, channels: usize) -> Vec<i32> {
    (0..frames * channels)
        .map(|i| {
            let frame = (i / channels) as f32;
            let phase = (i % channels) as f32 * 0.7;
            ((frame * 0.01 + phase).sin() * 12000.0) as i32
        })
        .collect()
}

fn stereo_encoder() -> EncoderSession {
    let mut encoder = EncoderSession::new(CodecConfig::default()).unwrap();
    encoder.initialize(None, None, None).unwrap();
    encoder
}

#[test]
fn test_encoder_partial_append_accepts_everything() {
    let mut encoder = stereo_encoder();

    let half = vec![0u8; FRAME_BYTES_16_STEREO / 2];
    let outcome = encoder.append(&half).unwrap();

    assert_eq!(outcome.bytes_consumed, half.len());
    assert_eq!(outcome.packets, (half.len() / 4) as u32);
    assert_eq!(encoder.state(), EncoderState::Accepting);
}

#[test]
fn test_encoder_full_frame_refuses_more() {
    let mut encoder = stereo_encoder();

    let data = vec![0u8; FRAME_BYTES_16_STEREO + 100];
    let first = encoder.append(&data).unwrap();
    assert_eq!(first.bytes_consumed, FRAME_BYTES_16_STEREO);
    assert_eq!(encoder.state(), EncoderState::Full);

    for _ in 0..2 {
        let again = encoder.append(&data[first.bytes_consumed..]).unwrap();
        assert_eq!(again, AppendOutcome::default());
    }
    assert_eq!(encoder.bytes_buffered(), FRAME_BYTES_16_STEREO);
}

#[test]
fn test_encoder_produce_without_frame_needs_input() {
    let mut encoder = stereo_encoder();
    encoder.append(&[0u8; 64]).unwrap();

    let mut out = vec![0u8; 1024];
    let produced = encoder.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::NeedsMoreInput);
    assert_eq!(produced.bytes_written, 0);
    assert_eq!(encoder.state(), EncoderState::Accepting);
}

#[test]
fn test_encoder_append_before_initialize_is_state_error() {
    let mut encoder = EncoderSession::new(CodecConfig::default()).unwrap();
    let err = encoder.append(&[0u8; 4]).unwrap_err();
    assert!(matches!(err, CodecError::StateError(_)));
}

#[test]
fn test_encoder_flush_then_finished() {
    let mut encoder = stereo_encoder();
    let pcm = repack::pack(&sine_pcm(100, 2), 16).unwrap();
    encoder.append(&pcm).unwrap();

    assert_eq!(encoder.append(&[]).unwrap(), AppendOutcome::default());
    assert_eq!(encoder.state(), EncoderState::Flushing);
    assert!(matches!(
        encoder.append(&[1, 2]),
        Err(CodecError::StateError(_))
    ));

    let mut out = vec![0u8; encoder.max_packet_bytes() as usize];
    let produced = encoder.produce(&mut out, 1).unwrap();
    assert_eq!(produced.status, ProduceStatus::AtEndOfStream);
    assert_eq!(produced.packets, 1);
    assert_eq!(produced.description.unwrap().variable_frames, 100);
    assert_eq!(encoder.trailing_frames(), 4608 - 100);
    assert_eq!(encoder.state(), EncoderState::Finished);

    assert!(matches!(encoder.append(&[]), Err(CodecError::StateError(_))));
}

#[test]
fn test_encoder_small_output_drops_frame() {
    let mut encoder = stereo_encoder();
    let pcm = repack::pack(&sine_pcm(4608, 2), 16).unwrap();
    encoder.append(&pcm).unwrap();

    let mut out = vec![0u8; 8];
    let err = encoder.produce(&mut out, 1).unwrap_err();
    assert!(matches!(err, CodecError::NotEnoughBufferSpace { .. }));
    assert_eq!(encoder.state(), EncoderState::Empty);
    assert_eq!(encoder.bytes_buffered(), 0);
}

#[test]
fn test_encoder_reset_accepts_new_stream() {
    let mut encoder = stereo_encoder();
    encoder.append(&[0u8; 400]).unwrap();
    encoder.append(&[]).unwrap();
    let mut out = vec![0u8; encoder.max_packet_bytes() as usize];
    encoder.produce(&mut out, 1).unwrap();
    assert_eq!(encoder.state(), EncoderState::Finished);

    encoder.reset().unwrap();
    assert_eq!(encoder.state(), EncoderState::Empty);
    assert_eq!(encoder.append(&[0u8; 40]).unwrap().bytes_consumed, 40);
}

#[test]
fn test_decoder_ignores_description_past_data() {
    let mut decoder = DecoderSession::new(CodecConfig::default()).unwrap();
    decoder.initialize(None, None, None).unwrap();

    let desc = PacketDescription::new(10, 100);
    let outcome = decoder.append(&[0u8; 50], 1, Some(&desc)).unwrap();
    assert_eq!(outcome, AppendOutcome::default());
    assert_eq!(decoder.state(), DecoderState::Empty);
}

#[test]
fn test_decoder_takes_one_packet_at_a_time() {
    let mut decoder = DecoderSession::new(CodecConfig::default()).unwrap();
    decoder.initialize(None, None, None).unwrap();

    let desc = PacketDescription::new(4, 20);
    let first = decoder.append(&[0u8; 64], 3, Some(&desc)).unwrap();
    assert_eq!(first.bytes_consumed, 24);
    assert_eq!(first.packets, 1);

    let second = decoder.append(&[0u8; 64], 1, None).unwrap();
    assert_eq!(second, AppendOutcome::default());
    assert_eq!(decoder.bytes_buffered(), 20);
}

#[test]
fn test_decoder_rejects_small_output() {
    let mut decoder = DecoderSession::new(CodecConfig::default()).unwrap();
    decoder.initialize(None, None, None).unwrap();
    decoder.append(&[0u8; 32], 1, None).unwrap();

    let mut out = vec![0u8; 100];
    let err = decoder.produce(&mut out, 1).unwrap_err();
    assert_eq!(
        err,
        CodecError::NotEnoughBufferSpace {
            needed: 4608 * 4,
            available: 100
        }
    );
}

#[test]
fn test_decoder_garbage_is_engine_failure() {
    let mut decoder = DecoderSession::new(CodecConfig::default()).unwrap();
    decoder.initialize(None, None, None).unwrap();
    decoder.append(&[0x12u8; 32], 1, None).unwrap();

    let mut out = vec![0u8; decoder.required_output_bytes()];
    let err = decoder.produce(&mut out, 1).unwrap_err();
    assert!(matches!(err, CodecError::EngineFailure(_)));
    assert_eq!(decoder.state(), DecoderState::Empty);
}

#[test]
fn test_session_roundtrip_with_partial_tail() {
    let samples = sine_pcm(4608 + 2000, 2);
    let pcm = repack::pack(&samples, 16).unwrap();

    let mut encoder = stereo_encoder();
    let mut out = vec![0u8; encoder.max_packet_bytes() as usize * 2];
    let mut packets = Vec::new();
    let mut pos = 0;
    loop {
        pos += encoder.append(&pcm[pos..]).unwrap().bytes_consumed;
        let produced = encoder.produce(&mut out, 1).unwrap();
        if produced.bytes_written > 0 {
            packets.push(out[..produced.bytes_written].to_vec());
        }
        if produced.status == ProduceStatus::AtEndOfStream {
            break;
        }
    }
    assert_eq!(packets.len(), 2);

    let cookie = encoder.magic_cookie(256).unwrap();
    let mut decoder = DecoderSession::new(CodecConfig::default()).unwrap();
    decoder.initialize(None, None, Some(&cookie)).unwrap();
    assert_eq!(
        *decoder.output_format(),
        StreamFormat {
            bytes_per_frame: 4,
            bytes_per_packet: 4,
            frames_per_packet: 1,
            ..*decoder.output_format()
        }
    );

    let mut decoded = Vec::new();
    let mut pcm_out = vec![0u8; decoder.required_output_bytes()];
    let mut statuses = Vec::new();
    for packet in &packets {
        decoder.append(packet, 1, None).unwrap();
        let produced = decoder.produce(&mut pcm_out, 1).unwrap();
        statuses.push(produced.status);
        decoded.extend_from_slice(&pcm_out[..produced.bytes_written]);
    }

    assert_eq!(
        statuses,
        vec![ProduceStatus::Success, ProduceStatus::AtEndOfStream]
    );
    assert_eq!(decoded, pcm);
}
