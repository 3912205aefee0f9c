//! CBOR decoder for storable values.

use crate::error::{CodecError, CodecResult};
use crate::value::{Object, Value};

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, use indefinite-length
/// items, carry non-text map keys, or have trailing data.
pub fn from_bytes(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::decoding_failed(format!(
            "{} trailing bytes",
            decoder.remaining().len()
        )));
    }
    Ok(value)
}

/// A CBOR decoder.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
/// This prevents allocation-based DoS from untrusted input.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> Decoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    #[allow(clippy::cast_precision_loss)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => self
                .decode_unsigned(additional_info)
                .map(|n| Value::Number(n as f64)),
            // Negative integer: value is -(n+1)
            1 => self
                .decode_unsigned(additional_info)
                .map(|n| Value::Number(-(n as f64) - 1.0)),
            2 => {
                let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
                Ok(Value::Bytes(self.read_bytes(len)?.to_vec()))
            }
            3 => self.decode_text(additional_info).map(Value::Text),
            4 => self.decode_array(additional_info),
            5 => self.decode_map(additional_info),
            6 => {
                // Tagged value - skip the tag and decode the value
                let _tag = self.decode_unsigned(additional_info)?;
                self.decode()
            }
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self.data.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => Ok(u64::from(u16::from_be_bytes(self.read_array()?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.read_array()?))),
            27 => Ok(u64::from_be_bytes(self.read_array()?)),
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max: u64) -> CodecResult<usize> {
        let claimed = self.decode_unsigned(additional_info)?;
        if claimed > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed: max,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed: max,
        })
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut object = Object::new();
        for _ in 0..len {
            let initial_byte = self.read_byte()?;
            if initial_byte >> 5 != 3 {
                return Err(CodecError::invalid_structure("map keys must be text"));
            }
            let key = self.decode_text(initial_byte & 0x1f)?;
            let value = self.decode()?;
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            // undefined is never written; read it as null
            22 | 23 => Ok(Value::Null),
            25 => Ok(Value::Number(f64::from(half_to_f32(u16::from_be_bytes(
                self.read_array()?,
            ))))),
            26 => Ok(Value::Number(f64::from(f32::from_be_bytes(self.read_array()?)))),
            27 => Ok(Value::Number(f64::from_be_bytes(self.read_array()?))),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Widens an IEEE-754 half-precision float.
fn half_to_f32(half: u16) -> f32 {
    let sign = if half & 0x8000 == 0 { 1.0 } else { -1.0 };
    let exponent = i32::from((half >> 10) & 0x1f);
    let mantissa = f32::from(half & 0x3ff);
    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        31 if mantissa == 0.0 => sign * f32::INFINITY,
        31 => f32::NAN,
        _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::to_bytes;

    #[test]
    fn decode_simple_values() {
        assert_eq!(from_bytes(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_bytes(&[0xf4]).unwrap(), Value::Bool(false));
        assert_eq!(from_bytes(&[0xf5]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn decode_integers_as_numbers() {
        assert_eq!(from_bytes(&[0x17]).unwrap(), Value::Number(23.0));
        assert_eq!(from_bytes(&[0x19, 0x01, 0x00]).unwrap(), Value::Number(256.0));
        assert_eq!(from_bytes(&[0x38, 99]).unwrap(), Value::Number(-100.0));
    }

    #[test]
    fn decode_floats_of_every_width() {
        // 1.5 as half, single and double precision
        assert_eq!(from_bytes(&[0xf9, 0x3e, 0x00]).unwrap(), Value::Number(1.5));
        assert_eq!(
            from_bytes(&[0xfa, 0x3f, 0xc0, 0x00, 0x00]).unwrap(),
            Value::Number(1.5)
        );
        let mut double = vec![0xfb];
        double.extend_from_slice(&1.5f64.to_be_bytes());
        assert_eq!(from_bytes(&double).unwrap(), Value::Number(1.5));
    }

    #[test]
    fn negative_zero_survives() {
        let bytes = to_bytes(&Value::Number(-0.0)).unwrap();
        let n = from_bytes(&bytes).unwrap().as_number().unwrap();
        assert!(n == 0.0 && n.is_sign_negative());
    }

    #[test]
    fn decode_object_keeps_order() {
        let value = Value::object([("z", Value::from(1)), ("a", Value::Array(vec![]))]);
        let decoded = from_bytes(&to_bytes(&value).unwrap()).unwrap();
        let keys: Vec<_> = decoded.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(decoded, value);
    }

    #[test]
    fn reject_non_text_map_keys() {
        // {1: 2}
        assert!(matches!(
            from_bytes(&[0xa1, 0x01, 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_truncated_and_trailing_input() {
        assert_eq!(from_bytes(&[0x62, b'a']), Err(CodecError::UnexpectedEof));
        assert_eq!(from_bytes(&[]), Err(CodecError::UnexpectedEof));
        assert!(matches!(
            from_bytes(&[0xf6, 0xf6]),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn reject_indefinite_length() {
        assert_eq!(from_bytes(&[0x9f]), Err(CodecError::IndefiniteLengthForbidden));
    }

    #[test]
    fn reject_oversized_claims() {
        // array claiming 2^32 elements
        assert!(matches!(
            from_bytes(&[0x9b, 0, 0, 0, 1, 0, 0, 0, 0]),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }
}
