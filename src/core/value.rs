//! Typed value model.
//!
//! A [`Value`] is either declared by a rule (its comparison operand) or
//! decoded from a resource. Values are immutable; every read produces a fresh
//! one so continuation and extra-info rules never observe a shared buffer.

use serde::Serialize;

use crate::db::{Operator, ValueType};
use crate::error::{MagicError, Result};

/// And-mask that leaves every bit of a numeric read untouched.
pub const DEFAULT_AND_MASK: u64 = u64::MAX;

/// A single typed datum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Value {
    /// Any numeric width, widened to 64 bits.
    Numeric(i64),
    /// Raw bytes of a string type.
    Bytes(Vec<u8>),
}

impl Value {
    /// Operand stored for the match-any operator: a zero of the right width
    /// for numerics, a zeroed buffer of `len` bytes for strings.
    pub fn placeholder(value_type: ValueType, len: usize) -> Self {
        if value_type.is_numeric() {
            Value::Numeric(0)
        } else {
            Value::Bytes(vec![0; len])
        }
    }

    /// Decode a numeric value of `value_type` from exactly `bytes`, then
    /// apply `and_mask`. Returns `None` for string types or a width mismatch.
    pub fn decode_numeric(value_type: ValueType, bytes: &[u8], and_mask: u64) -> Option<Self> {
        let raw: u64 = match (value_type, bytes) {
            (ValueType::Byte, &[b]) => u64::from(b),
            (ValueType::LeShort, &[a, b]) => u64::from(u16::from_le_bytes([a, b])),
            (ValueType::BeShort, &[a, b]) => u64::from(u16::from_be_bytes([a, b])),
            (ValueType::LeLong, &[a, b, c, d]) => u64::from(u32::from_le_bytes([a, b, c, d])),
            (ValueType::BeLong, &[a, b, c, d]) => u64::from(u32::from_be_bytes([a, b, c, d])),
            _ => return None,
        };
        Some(Value::Numeric((raw & and_mask) as i64))
    }

    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Value::Numeric(n) => Some(*n),
            Value::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Numeric(_) => None,
            Value::Bytes(b) => Some(b),
        }
    }

    /// Byte length of a string operand; numerics report their widened size.
    pub fn len(&self) -> usize {
        match self {
            Value::Numeric(_) => std::mem::size_of::<i64>(),
            Value::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text form used for template substitution. Strings end at their first
    /// NUL byte and are read as single-byte characters.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Numeric(n) => n.to_string(),
            Value::Bytes(b) => b
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| char::from(b))
                .collect(),
        }
    }
}

/// Compare a decoded value against a rule operand.
///
/// `line` only feeds the error raised when a numeric-only operator meets a
/// string operand.
pub fn compare(
    read: &Value,
    operand: &Value,
    operator: Operator,
    value_type: ValueType,
    line: usize,
) -> Result<bool> {
    let type_error = || MagicError::Type {
        line,
        operator,
        value_type,
    };

    if operator == Operator::Any {
        return Ok(true);
    }

    match (read, operand) {
        (Value::Numeric(a), Value::Numeric(b)) => Ok(match operator {
            Operator::Equal => a == b,
            Operator::NotEqual => a != b,
            Operator::Greater => a > b,
            Operator::Less => a < b,
            Operator::And => a & b != 0,
            Operator::Xor => a ^ b != 0,
            Operator::Any => true,
        }),
        (Value::Bytes(a), Value::Bytes(b)) => match operator {
            Operator::Equal => Ok(a == b),
            Operator::NotEqual => Ok(a != b),
            Operator::Greater => match (a.first(), b.first()) {
                (Some(x), Some(y)) => Ok(x > y),
                _ => Ok(false),
            },
            _ => Err(type_error()),
        },
        _ => Err(type_error()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(read: Value, operand: Value, op: Operator, ty: ValueType) -> bool {
        compare(&read, &operand, op, ty, 1).unwrap()
    }

    #[test]
    fn test_decode_widths_and_endianness() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(
            Value::decode_numeric(ValueType::BeLong, &bytes, DEFAULT_AND_MASK),
            Some(Value::Numeric(0x1234_5678))
        );
        assert_eq!(
            Value::decode_numeric(ValueType::LeLong, &bytes, DEFAULT_AND_MASK),
            Some(Value::Numeric(0x7856_3412))
        );
        assert_eq!(
            Value::decode_numeric(ValueType::BeShort, &bytes[..2], DEFAULT_AND_MASK),
            Some(Value::Numeric(0x1234))
        );
        assert_eq!(
            Value::decode_numeric(ValueType::LeShort, &bytes[..2], DEFAULT_AND_MASK),
            Some(Value::Numeric(0x3412))
        );
        assert_eq!(
            Value::decode_numeric(ValueType::Byte, &bytes[..1], DEFAULT_AND_MASK),
            Some(Value::Numeric(0x12))
        );
    }

    #[test]
    fn test_decode_is_unsigned() {
        assert_eq!(
            Value::decode_numeric(ValueType::BeShort, &[0x80, 0x00], DEFAULT_AND_MASK),
            Some(Value::Numeric(0x8000))
        );
        assert_eq!(
            Value::decode_numeric(ValueType::BeLong, &[0xCA, 0xFE, 0xBA, 0xBE], DEFAULT_AND_MASK),
            Some(Value::Numeric(0xCAFE_BABE))
        );
    }

    #[test]
    fn test_decode_applies_mask() {
        assert_eq!(
            Value::decode_numeric(ValueType::Byte, &[0x15], 0x0F),
            Some(Value::Numeric(5))
        );
    }

    #[test]
    fn test_decode_rejects_wrong_width_or_type() {
        assert_eq!(Value::decode_numeric(ValueType::BeLong, &[1, 2], DEFAULT_AND_MASK), None);
        assert_eq!(Value::decode_numeric(ValueType::String, &[1], DEFAULT_AND_MASK), None);
    }

    #[test]
    fn test_numeric_operators() {
        let ty = ValueType::Byte;
        let n = Value::Numeric;
        assert!(check(n(5), n(5), Operator::Equal, ty));
        assert!(check(n(5), n(6), Operator::NotEqual, ty));
        assert!(check(n(7), n(6), Operator::Greater, ty));
        assert!(check(n(5), n(6), Operator::Less, ty));
        assert!(check(n(0b0110), n(0b0010), Operator::And, ty));
        assert!(!check(n(0b0100), n(0b0010), Operator::And, ty));
        assert!(check(n(3), n(1), Operator::Xor, ty));
        assert!(!check(n(3), n(3), Operator::Xor, ty));
        assert!(check(n(99), n(0), Operator::Any, ty));
    }

    #[test]
    fn test_string_operators() {
        let ty = ValueType::String;
        let b = |s: &str| Value::Bytes(s.as_bytes().to_vec());
        assert!(check(b("ABCD"), b("ABCD"), Operator::Equal, ty));
        assert!(!check(b("ABCE"), b("ABCD"), Operator::Equal, ty));
        assert!(check(b("ABCE"), b("ABCD"), Operator::NotEqual, ty));
        assert!(check(b("b"), b("a"), Operator::Greater, ty));
        assert!(!check(b("a"), b("a"), Operator::Greater, ty));
        assert!(check(b("whatever"), b(""), Operator::Any, ty));
    }

    #[test]
    fn test_numeric_only_operator_on_string_is_type_error() {
        let b = Value::Bytes(b"A".to_vec());
        for op in [Operator::Less, Operator::And, Operator::Xor] {
            let err = compare(&b, &b, op, ValueType::String, 42).unwrap_err();
            assert!(matches!(err, MagicError::Type { line: 42, .. }));
        }
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Numeric(-3).to_display_string(), "-3");
        assert_eq!(Value::Bytes(b"Demo\0junk".to_vec()).to_display_string(), "Demo");
    }
}
