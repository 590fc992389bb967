//! reference frame engine
//!
//! A small lossless coder implementing the engine contract so sessions can
//! run without an external codec. Each frame is self contained:
//!
//! ```text
//! 0xFF 0xF8 | block size u16 | channels u8 | bits u8 | flags u8
//! per channel:
//!   0xFF value i64                      constant sub-block
//!   order u8 | k u8 | len u32 | rice    fixed predictor sub-block
//! ```
//!
//! All integers are big-endian. Flag bit 0 marks mid/side stereo.

mod decoder;
mod encoder;
mod predictor;

pub use decoder::ReferenceDecoder;
pub use encoder::ReferenceEncoder;

pub(crate) const STREAM_MARKER: [u8; 4] = *b"fLaC";
pub(crate) const FRAME_SYNC: [u8; 2] = [0xFF, 0xF8];
pub(crate) const FRAME_HEADER_SIZE: usize = 7;
pub(crate) const SUBBLOCK_CONSTANT: u8 = 0xFF;
pub(crate) const FLAG_MID_SIDE: u8 = 0x01;
pub(crate) const MAX_FIXED_ORDER: usize = 4;
