//! wasm api over the packet sessions and the reference engine

use wasm_bindgen::prelude::*;

use crate::config::CodecConfig;
use crate::cookie;
use crate::core::{CodecError, StreamFormat, StreamInfo, MAX_COOKIE_SIZE};
use crate::streaming::{DecoderSession, EncoderSession, ProduceOutcome, ProduceStatus};

/// `"<status>: <message>"`, so js callers can match on the host code
fn error_message(e: &CodecError) -> String {
    format!("{}: {}", e.status_tag(), e)
}

/// turn an error into js
fn to_js_err(e: CodecError) -> JsValue {
    JsValue::from_str(&error_message(&e))
}

fn status_name(status: ProduceStatus) -> &'static str {
    match status {
        ProduceStatus::Success => "success",
        ProduceStatus::SuccessHasMore => "success_has_more",
        ProduceStatus::NeedsMoreInput => "needs_more_input",
        ProduceStatus::AtEndOfStream => "at_end_of_stream",
    }
}

/// `{ status, data, frames }` for one produce call
fn outcome_to_js(outcome: &ProduceOutcome, data: &[u8], frames: u32) -> Result<JsValue, JsValue> {
    let obj = js_sys::Object::new();
    js_sys::Reflect::set(&obj, &"status".into(), &status_name(outcome.status).into())?;
    js_sys::Reflect::set(
        &obj,
        &"data".into(),
        &js_sys::Uint8Array::from(&data[..outcome.bytes_written]).into(),
    )?;
    js_sys::Reflect::set(&obj, &"frames".into(), &frames.into())?;
    Ok(obj.into())
}

// packet encoder

#[wasm_bindgen]
pub struct FlacPacketEncoder {
    inner: EncoderSession,
    out: Vec<u8>,
}

#[wasm_bindgen]
impl FlacPacketEncoder {
    /// encoder for packed native-endian pcm at 16 or 24 bits
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: f64,
        channels: u32,
        bit_depth: u32,
        quality: u32,
    ) -> Result<FlacPacketEncoder, JsValue> {
        let config = CodecConfig::default().with_quality(quality);
        let mut inner = EncoderSession::new(config).map_err(to_js_err)?;
        let input = StreamFormat::linear_pcm(sample_rate, channels, bit_depth);
        inner
            .initialize(Some(&input), None, None)
            .map_err(to_js_err)?;

        Ok(Self {
            out: vec![0u8; inner.max_packet_bytes() as usize * 2],
            inner,
        })
    }

    /// buffer pcm bytes, returns how many were taken
    ///
    /// Call `produce` whenever this returns less than it was given.
    #[wasm_bindgen]
    pub fn append(&mut self, data: &[u8]) -> Result<usize, JsValue> {
        self.inner
            .append(data)
            .map(|outcome| outcome.bytes_consumed)
            .map_err(to_js_err)
    }

    /// mark the end of the stream, the next `produce` flushes the tail
    #[wasm_bindgen]
    pub fn finish(&mut self) -> Result<(), JsValue> {
        self.inner.append(&[]).map(|_| ()).map_err(to_js_err)
    }

    /// encode the buffered frame
    ///
    /// Returns `{ status, data, frames }`.
    #[wasm_bindgen]
    pub fn produce(&mut self) -> Result<JsValue, JsValue> {
        let outcome = self.inner.produce(&mut self.out, 1).map_err(to_js_err)?;
        let frames = outcome
            .description
            .map(|desc| desc.variable_frames)
            .unwrap_or(0);
        outcome_to_js(&outcome, &self.out, frames)
    }

    /// cookie describing the stream, complete once the stream is finished
    #[wasm_bindgen]
    pub fn magic_cookie(&mut self) -> Result<Vec<u8>, JsValue> {
        self.inner.magic_cookie(MAX_COOKIE_SIZE).map_err(to_js_err)
    }

    #[wasm_bindgen]
    pub fn max_packet_bytes(&self) -> u32 {
        self.inner.max_packet_bytes()
    }

    /// start a new stream with the same formats
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.inner.reset().map_err(to_js_err)
    }
}

// packet decoder

#[wasm_bindgen]
pub struct FlacPacketDecoder {
    inner: DecoderSession,
    out: Vec<u8>,
}

#[wasm_bindgen]
impl FlacPacketDecoder {
    /// decoder configured entirely from a magic cookie
    #[wasm_bindgen(constructor)]
    pub fn new(magic_cookie: &[u8]) -> Result<FlacPacketDecoder, JsValue> {
        let mut inner = DecoderSession::new(CodecConfig::default()).map_err(to_js_err)?;
        inner
            .initialize(None, None, Some(magic_cookie))
            .map_err(to_js_err)?;

        Ok(Self {
            out: vec![0u8; inner.required_output_bytes()],
            inner,
        })
    }

    /// decode one packet
    ///
    /// Returns `{ status, data, frames }` with packed pcm in `data`.
    #[wasm_bindgen]
    pub fn decode(&mut self, packet: &[u8]) -> Result<JsValue, JsValue> {
        self.inner.append(packet, 1, None).map_err(to_js_err)?;
        let outcome = self.inner.produce(&mut self.out, 1).map_err(to_js_err)?;
        outcome_to_js(&outcome, &self.out, outcome.packets)
    }

    #[wasm_bindgen]
    pub fn sample_rate(&self) -> f64 {
        self.inner.output_format().sample_rate
    }

    #[wasm_bindgen]
    pub fn channels(&self) -> u32 {
        self.inner.output_format().channels_per_frame
    }

    #[wasm_bindgen]
    pub fn bit_depth(&self) -> u32 {
        self.inner.output_format().bits_per_channel
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

// cookie helpers

/// Parse a magic cookie into a stream info object
#[wasm_bindgen]
pub fn parse_magic_cookie(blob: &[u8]) -> Result<JsValue, JsValue> {
    let info = cookie::deserialize(blob).map_err(to_js_err)?;
    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Build a magic cookie from a stream info object
#[wasm_bindgen]
pub fn build_magic_cookie(info: JsValue) -> Result<Vec<u8>, JsValue> {
    let info: StreamInfo = serde_wasm_bindgen::from_value(info)
        .map_err(|e| JsValue::from_str(&format!("Invalid stream info: {}", e)))?;
    Ok(cookie::serialize(&info, info.channels))
}

/// get lib version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
