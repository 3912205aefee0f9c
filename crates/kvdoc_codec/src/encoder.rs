//! CBOR encoder for storable values.

use crate::error::{CodecError, CodecResult};
use crate::value::{Object, Value};

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Encode a storable value to CBOR bytes.
///
/// The output is deterministic:
/// - Integral numbers within the safe-integer range use the shortest
///   integer encoding; every other number is a double
/// - Object fields keep their insertion order
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns [`CodecError::TypeMismatch`] if the value still contains an
/// extended type; run it through [`crate::serialize`] first.
pub fn to_bytes(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A CBOR encoder.
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => {
                // CBOR null is simple value 22 (0xf6)
                self.buffer.push(0xf6);
                Ok(())
            }
            Value::Bool(b) => {
                self.buffer.push(if *b { 0xf5 } else { 0xf4 });
                Ok(())
            }
            Value::Number(n) => {
                self.encode_number(*n);
                Ok(())
            }
            Value::Bytes(b) => {
                self.encode_unsigned(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
                Ok(())
            }
            Value::Text(s) => {
                self.encode_text(s);
                Ok(())
            }
            Value::Array(items) => {
                self.encode_unsigned(4, items.len() as u64);
                items.iter().try_for_each(|item| self.encode(item))
            }
            Value::Object(object) => self.encode_object(object),
            Value::Undefined
            | Value::BigInt(_)
            | Value::Symbol(_)
            | Value::Date(_)
            | Value::RegExp(_) => Err(CodecError::type_mismatch(
                value.type_name(),
                "is not storable without tagging",
            )),
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn encode_number(&mut self, n: f64) {
        let integral = n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER;
        if integral && !(n == 0.0 && n.is_sign_negative()) {
            let i = n as i64;
            if i >= 0 {
                self.encode_unsigned(0, i as u64);
            } else {
                // CBOR negative integers encode -(n+1)
                self.encode_unsigned(1, (-(i + 1)) as u64);
            }
        } else {
            self.buffer.push(0xfb);
            self.buffer.extend_from_slice(&n.to_be_bytes());
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_object(&mut self, object: &Object) -> CodecResult<()> {
        self.encode_unsigned(5, object.len() as u64);
        for (key, value) in object.iter() {
            self.encode_text(key);
            self.encode(value)?;
        }
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
