// Rice coding for predictor residuals

/// largest unary run the coder emits
const MAX_QUOTIENT: u64 = 255;

/// largest Rice parameter the coder emits or accepts
pub const MAX_PARAMETER: u8 = 31;

/// Pick a Rice parameter for integer residuals
/// k is large enough that no quotient exceeds 255 during encoding
pub fn estimate_parameter(residuals: &[i64]) -> u8 {
    if residuals.is_empty() {
        return 0;
    }

    let max_unsigned = residuals.iter().map(|&r| zigzag(r)).max().unwrap_or(0);
    if max_unsigned == 0 {
        return 0;
    }

    // quotient = unsigned >> k must stay <= 255
    let min_k = if max_unsigned > MAX_QUOTIENT {
        let bits_needed = 64 - max_unsigned.leading_zeros();
        bits_needed.saturating_sub(8) as u8
    } else {
        0
    };

    // mean magnitude decides efficiency
    let sum: u128 = residuals.iter().map(|&r| r.unsigned_abs() as u128).sum();
    let mean = (sum / residuals.len() as u128) as u64;
    let mean_k = if mean > 0 {
        (64 - mean.leading_zeros()) as u8
    } else {
        0
    };

    min_k.max(mean_k).min(MAX_PARAMETER)
}

/// Rice encode residuals
pub fn encode(residuals: &[i64], k: u8) -> Vec<u8> {
    let mut bits = BitWriter::new();

    for &residual in residuals {
        encode_value(&mut bits, residual, k);
    }

    bits.into_bytes()
}

fn encode_value(bits: &mut BitWriter, value: i64, k: u8) {
    let unsigned = zigzag(value);

    let quotient = (unsigned >> k).min(MAX_QUOTIENT);
    let remainder = unsigned & ((1u64 << k) - 1);

    for _ in 0..quotient {
        bits.write_bit(1);
    }
    bits.write_bit(0);

    bits.write_bits(remainder as u32, k);
}

/// Rice decode exactly `count` residuals, None when the data runs out
pub fn decode(encoded: &[u8], k: u8, count: usize) -> Option<Vec<i64>> {
    if k > MAX_PARAMETER {
        return None;
    }
    let mut bits = BitReader::new(encoded);
    let mut residuals = Vec::with_capacity(count);

    for _ in 0..count {
        let mut quotient = 0u64;
        loop {
            match bits.read_bit()? {
                1 => {
                    quotient += 1;
                    if quotient > MAX_QUOTIENT {
                        return None;
                    }
                }
                _ => break,
            }
        }

        let remainder = bits.read_bits(k)? as u64;
        residuals.push(unzigzag((quotient << k) | remainder));
    }

    Some(residuals)
}

// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...
fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ -((unsigned & 1) as i64)
}

/// Bit-level writer, most significant bit first
pub struct BitWriter {
    bytes: Vec<u8>,
    current_byte: u8,
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            current_byte: 0,
            bit_pos: 0,
        }
    }

    pub fn write_bit(&mut self, bit: u32) {
        if bit != 0 {
            self.current_byte |= 1 << (7 - self.bit_pos);
        }

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_pos = 0;
        }
    }

    pub fn write_bits(&mut self, value: u32, num_bits: u8) {
        for i in (0..num_bits).rev() {
            self.write_bit((value >> i) & 1);
        }
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        if self.bit_pos > 0 {
            self.bytes.push(self.current_byte);
        }
        self.bytes
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bit-level reader
pub struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BitReader {
            bytes,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    pub fn read_bit(&mut self) -> Option<u32> {
        let byte = *self.bytes.get(self.byte_pos)?;
        let bit = (byte >> (7 - self.bit_pos)) & 1;

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Some(bit as u32)
    }

    pub fn read_bits(&mut self, num_bits: u8) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..num_bits {
            value = (value << 1) | self.read_bit()?;
        }
        Some(value)
    }
}
