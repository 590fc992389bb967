use tracing::{debug, trace};

use super::predictor::{fixed_residuals, should_use_mid_side, to_mid_side};
use super::{FLAG_MID_SIDE, FRAME_SYNC, STREAM_MARKER, SUBBLOCK_CONSTANT};
use crate::cookie::write_stream_info;
use crate::core::{rice, StreamInfo, MAX_CHANNELS, MAX_SAMPLE_SIZE};
use crate::engine::{EncodeEngine, EncoderParams, EncoderSink, EngineState, WriteStatus};

/// reference encode engine
pub struct ReferenceEncoder {
    params: Option<EncoderParams>,
    state: EngineState,
    frame_number: u32,
    total_samples: u64,
    min_frame_bytes: u32,
    max_frame_bytes: u32,
    hasher: blake3::Hasher,
}

impl ReferenceEncoder {
    pub fn new() -> Self {
        ReferenceEncoder {
            params: None,
            state: EngineState::Uninitialized,
            frame_number: 0,
            total_samples: 0,
            min_frame_bytes: 0,
            max_frame_bytes: 0,
            hasher: blake3::Hasher::new(),
        }
    }

    fn encode_frame(&self, params: &EncoderParams, samples: &[i32], frames: usize) -> Vec<u8> {
        let channels = params.channels as usize;

        // Deinterleave channels
        let mut channel_data: Vec<Vec<i64>> = (0..channels)
            .map(|ch| {
                samples[..frames * channels]
                    .iter()
                    .skip(ch)
                    .step_by(channels)
                    .map(|&s| s as i64)
                    .collect()
            })
            .collect();

        let mut flags = 0u8;
        if channels == 2
            && mid_side_allowed(params.compression_level)
            && should_use_mid_side(&channel_data[0], &channel_data[1])
        {
            let (mid, side) = to_mid_side(&channel_data[0], &channel_data[1]);
            channel_data[0] = mid;
            channel_data[1] = side;
            flags |= FLAG_MID_SIDE;
        }

        let mut out = Vec::with_capacity(frames * channels * 2);
        out.extend_from_slice(&FRAME_SYNC);
        out.extend_from_slice(&(frames as u16).to_be_bytes());
        out.push(channels as u8);
        out.push(params.bits_per_sample as u8);
        out.push(flags);

        let max_order = max_order_for_level(params.compression_level);
        for ch_samples in &channel_data {
            encode_channel(ch_samples, max_order, &mut out);
        }

        out
    }
}

impl Default for ReferenceEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn max_order_for_level(level: u32) -> usize {
    match level {
        0 => 1,
        1 | 2 => 2,
        3 => 3,
        _ => 4,
    }
}

fn mid_side_allowed(level: u32) -> bool {
    level >= 2
}

/// Encode one channel as the smallest sub-block available
fn encode_channel(samples: &[i64], max_order: usize, out: &mut Vec<u8>) {
    if let Some(&first) = samples.first() {
        if samples.iter().all(|&s| s == first) {
            out.push(SUBBLOCK_CONSTANT);
            out.extend_from_slice(&first.to_be_bytes());
            return;
        }
    }

    let mut best: Option<(u8, u8, Vec<u8>)> = None;
    for order in 0..=max_order {
        let Some(residuals) = fixed_residuals(samples, order) else {
            continue;
        };
        let k = rice::estimate_parameter(&residuals);
        let encoded = rice::encode(&residuals, k);
        let better = best
            .as_ref()
            .map_or(true, |(_, _, current)| encoded.len() < current.len());
        if better {
            best = Some((order as u8, k, encoded));
        }
    }

    if let Some((order, k, encoded)) = best {
        out.push(order);
        out.push(k);
        out.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
        out.extend_from_slice(&encoded);
    }
}

impl EncodeEngine for ReferenceEncoder {
    fn init(&mut self, params: &EncoderParams, sink: &mut dyn EncoderSink) -> bool {
        let valid = (1..=MAX_CHANNELS).contains(&params.channels)
            && (4..=MAX_SAMPLE_SIZE).contains(&params.bits_per_sample)
            && (1..=u16::MAX as u32).contains(&params.block_size);
        if !valid {
            debug!(?params, "reference encoder rejected parameters");
            self.state = EngineState::Error;
            return false;
        }

        *self = ReferenceEncoder::new();
        self.params = Some(*params);
        self.state = EngineState::Ok;

        // stream header, the stats in it are placeholders
        let mut header = STREAM_MARKER.to_vec();
        write_stream_info(&self.stream_info(params), &mut header);
        if sink.write(&header, 0, 0) == WriteStatus::Abort {
            self.state = EngineState::Aborted;
            return false;
        }
        true
    }

    fn process_interleaved(
        &mut self,
        samples: &[i32],
        frames: usize,
        sink: &mut dyn EncoderSink,
    ) -> bool {
        let Some(params) = self.params else {
            return false;
        };
        if self.state != EngineState::Ok {
            return false;
        }
        if frames == 0 {
            return true;
        }
        if frames > u16::MAX as usize || samples.len() < frames * params.channels as usize {
            self.state = EngineState::Error;
            return false;
        }

        let frame = self.encode_frame(&params, samples, frames);
        trace!(frames, bytes = frame.len(), "reference encoder frame");

        let block = &samples[..frames * params.channels as usize];
        for sample in block {
            self.hasher.update(&sample.to_le_bytes());
        }

        let size = frame.len() as u32;
        if self.frame_number == 0 || size < self.min_frame_bytes {
            self.min_frame_bytes = size;
        }
        self.max_frame_bytes = self.max_frame_bytes.max(size);
        self.total_samples += frames as u64;

        let status = sink.write(&frame, frames as u32, self.frame_number);
        self.frame_number += 1;
        if status == WriteStatus::Abort {
            self.state = EngineState::Aborted;
            return false;
        }
        true
    }

    fn finish(&mut self, sink: &mut dyn EncoderSink) -> bool {
        let Some(params) = self.params else {
            return false;
        };

        let info = self.stream_info(&params);
        debug!(
            total_samples = info.total_samples,
            frames = self.frame_number,
            "reference encoder finished"
        );
        sink.metadata(&info);

        self.params = None;
        self.state = EngineState::Uninitialized;
        true
    }

    fn state(&self) -> EngineState {
        self.state
    }
}

impl ReferenceEncoder {
    fn stream_info(&self, params: &EncoderParams) -> StreamInfo {
        let digest = self.hasher.finalize();
        let mut checksum = [0u8; 16];
        if self.total_samples > 0 {
            checksum.copy_from_slice(&digest.as_bytes()[..16]);
        }

        StreamInfo {
            min_blocksize: params.block_size,
            max_blocksize: params.block_size,
            min_framesize: self.min_frame_bytes,
            max_framesize: self.max_frame_bytes,
            sample_rate: params.sample_rate,
            channels: params.channels,
            bits_per_sample: params.bits_per_sample,
            total_samples: self.total_samples,
            checksum,
        }
    }
}
