//! Format negotiation through the encoder and decoder sessions.

use libacflac::core::{
    FormatId, StreamFormat, StreamInfo, FLAC_FLAG_20_BIT_SOURCE, FLAC_FLAG_24_BIT_SOURCE,
    FLAC_FLAG_BIT_DEPTH_MASK, FORMAT_FLAG_IS_FLOAT, PCM_ALIGNED_HIGH_FLAGS, PCM_PACKED_FLAGS,
};
use libacflac::{cookie, CodecConfig, CodecError, DecoderSession, EncoderSession};

fn encoder() -> EncoderSession {
    EncoderSession::new(CodecConfig::default()).unwrap()
}

fn decoder() -> DecoderSession {
    DecoderSession::new(CodecConfig::default()).unwrap()
}

fn stream_info(sample_rate: u32, channels: u32, bits: u32) -> StreamInfo {
    StreamInfo {
        min_blocksize: 4608,
        max_blocksize: 4608,
        sample_rate,
        channels,
        bits_per_sample: bits,
        ..Default::default()
    }
}

// ============================================================================
// Decoder
// ============================================================================

#[test]
fn test_decoder_formats_from_cookie_alone() {
    let blob = cookie::serialize(&stream_info(48000, 6, 24), 6);
    let mut session = decoder();
    session.initialize(None, None, Some(&blob)).unwrap();

    let input = session.input_format();
    assert_eq!(input.format_id, FormatId::Flac);
    assert_eq!(input.sample_rate, 48000.0);
    assert_eq!(input.channels_per_frame, 6);
    assert_eq!(input.format_flags & FLAC_FLAG_BIT_DEPTH_MASK, FLAC_FLAG_24_BIT_SOURCE);
    assert_eq!(input.frames_per_packet, 4608);

    let output = session.output_format();
    assert_eq!(output.format_id, FormatId::LinearPcm);
    assert_eq!(output.sample_rate, 48000.0);
    assert_eq!(output.channels_per_frame, 6);
    assert_eq!(output.format_flags, PCM_PACKED_FLAGS);
    assert_eq!(output.bits_per_channel, 24);
    assert_eq!(output.bytes_per_frame, 18);
    assert_eq!(output.frames_per_packet, 1);

    assert!(session.negotiator().has_cookie());
    assert_eq!(session.negotiator().stored_cookie(), &blob[..]);
}

#[test]
fn test_decoder_20_bit_cookie_is_aligned_high() {
    let blob = cookie::serialize(&stream_info(44100, 2, 20), 2);
    let mut session = decoder();
    session.initialize(None, None, Some(&blob)).unwrap();

    let output = session.output_format();
    assert_eq!(output.format_flags, PCM_ALIGNED_HIGH_FLAGS);
    assert_eq!(output.bits_per_channel, 20);
    assert_eq!(output.bytes_per_frame, 6);
}

#[test]
fn test_decoder_empty_cookie_keeps_defaults() {
    let mut session = decoder();
    session.initialize(None, None, Some(&[])).unwrap();
    assert_eq!(session.output_format().sample_rate, 44100.0);
    assert_eq!(session.output_format().bits_per_channel, 16);
    assert!(session.negotiator().stream_info().is_none());
}

#[test]
fn test_decoder_rejects_pcm_input() {
    let mut session = decoder();
    let err = session
        .set_input_format(&StreamFormat::linear_pcm(44100.0, 2, 16))
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));
}

#[test]
fn test_decoder_output_formats_need_a_depth() {
    let mut session = decoder();
    let unknown = StreamFormat::flac(44100.0, 2, 0);
    session.set_input_format(&unknown).unwrap();

    let err = session
        .negotiator()
        .output_formats_for_input(&unknown)
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));

    let mut twenty = unknown;
    twenty.format_flags = FLAC_FLAG_20_BIT_SOURCE;
    let formats = session.negotiator().output_formats_for_input(&twenty).unwrap();
    assert_eq!(formats.len(), 1);
    assert_eq!(formats[0].bits_per_channel, 20);
    assert_eq!(formats[0].format_flags, PCM_ALIGNED_HIGH_FLAGS);
}

#[test]
fn test_decoder_format_info_from_cookie() {
    let blob = cookie::serialize(&stream_info(96000, 1, 16), 1);
    let session = decoder();

    let format = session
        .negotiator()
        .format_info(&StreamFormat::default(), &blob)
        .unwrap();
    assert_eq!(format.format_id, FormatId::Flac);
    assert_eq!(format.sample_rate, 96000.0);
    assert_eq!(format.channels_per_frame, 1);
    assert_eq!(format.frames_per_packet, 4608);
    assert_eq!(format.flac_source_bits(), Some(16));
}

// ============================================================================
// Encoder
// ============================================================================

#[test]
fn test_encoder_rate_mismatch_leaves_session_untouched() {
    let mut session = encoder();
    let before_input = *session.input_format();
    let before_output = *session.output_format();

    let err = session
        .initialize(
            Some(&StreamFormat::linear_pcm(96000.0, 2, 16)),
            Some(&StreamFormat::flac(48000.0, 2, 16)),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));

    assert!(!session.is_initialized());
    assert_eq!(*session.input_format(), before_input);
    assert_eq!(*session.output_format(), before_output);
}

#[test]
fn test_encoder_channel_mismatch() {
    let mut session = encoder();
    let err = session
        .initialize(
            Some(&StreamFormat::linear_pcm(44100.0, 2, 16)),
            Some(&StreamFormat::flac(44100.0, 1, 16)),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));
}

#[test]
fn test_encoder_input_is_propagated_to_output() {
    let mut session = encoder();
    session
        .initialize(Some(&StreamFormat::linear_pcm(48000.0, 6, 24)), None, None)
        .unwrap();

    let output = session.output_format();
    assert_eq!(output.format_id, FormatId::Flac);
    assert_eq!(output.sample_rate, 48000.0);
    assert_eq!(output.channels_per_frame, 6);
    assert_eq!(output.flac_source_bits(), Some(24));
    assert_eq!(output.frames_per_packet, 4608);
    assert_eq!(session.input_format().bytes_per_frame, 18);
}

#[test]
fn test_encoder_rejects_unsupported_input() {
    let mut session = encoder();

    let err = session
        .set_input_format(&StreamFormat::linear_pcm(44100.0, 2, 32))
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));

    let mut float = StreamFormat::linear_pcm(44100.0, 2, 16);
    float.format_flags |= FORMAT_FLAG_IS_FLOAT;
    let err = session.set_input_format(&float).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));

    let err = session
        .set_output_format(&StreamFormat::linear_pcm(44100.0, 2, 16))
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));
}

#[test]
fn test_encoder_too_many_channels() {
    let mut session = encoder();
    let err = session
        .initialize(Some(&StreamFormat::linear_pcm(44100.0, 9, 16)), None, None)
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));
}

#[test]
fn test_encoder_output_depth_must_match_input() {
    let mut session = encoder();
    let err = session
        .initialize(
            Some(&StreamFormat::linear_pcm(44100.0, 2, 24)),
            Some(&StreamFormat::flac(44100.0, 2, 16)),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));
}

#[test]
fn test_formats_frozen_after_initialize() {
    let mut session = encoder();
    session.initialize(None, None, None).unwrap();

    let err = session
        .set_input_format(&StreamFormat::linear_pcm(48000.0, 2, 16))
        .unwrap_err();
    assert!(matches!(err, CodecError::StateError(_)));

    session.uninitialize();
    session
        .set_input_format(&StreamFormat::linear_pcm(48000.0, 2, 16))
        .unwrap();
}

#[test]
fn test_encoder_input_formats_for_output() {
    let session = encoder();
    let negotiator = session.negotiator();

    let any = negotiator.input_formats_for_output(&StreamFormat::flac(0.0, 0, 0));
    let depths: Vec<u32> = any.iter().map(|f| f.bits_per_channel).collect();
    assert_eq!(depths, vec![16, 24]);

    let twenty = negotiator.input_formats_for_output(&StreamFormat::flac(0.0, 0, 20));
    assert_eq!(twenty.len(), 1);
    assert_eq!(twenty[0].bits_per_channel, 24);
}

#[test]
fn test_encoder_format_info_keeps_zero_flags() {
    let session = encoder();
    let mut query = StreamFormat::linear_pcm(44100.0, 2, 24);
    query.format_flags = 0;

    let filled = session.negotiator().format_info(&query, &[]).unwrap();
    assert_eq!(filled.format_flags, 0);
    assert_eq!(filled.bits_per_channel, 24);
    assert_eq!(filled.frames_per_packet, 1);

    let err = session
        .negotiator()
        .format_info(&StreamFormat::linear_pcm(44100.0, 2, 32), &[])
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat(_)));
}
