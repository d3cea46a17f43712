//! Signature rule data model.

use std::fmt;

use serde::Serialize;

use crate::core::Value;

/// Type of the datum a rule reads and compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// 8-bit unsigned value
    Byte,
    /// Case-sensitive byte string
    String,
    /// Case-insensitive byte string (`string/c`)
    IString,
    /// 16-bit unsigned little-endian value
    LeShort,
    /// 32-bit unsigned little-endian value
    LeLong,
    /// 16-bit unsigned big-endian value
    BeShort,
    /// 32-bit unsigned big-endian value
    BeLong,
}

impl ValueType {
    /// Look up the database keyword for a type.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim() {
            "byte" => Some(ValueType::Byte),
            "string" => Some(ValueType::String),
            "string/c" | "istring" => Some(ValueType::IString),
            "leshort" => Some(ValueType::LeShort),
            "lelong" => Some(ValueType::LeLong),
            "beshort" => Some(ValueType::BeShort),
            "belong" => Some(ValueType::BeLong),
            _ => None,
        }
    }

    /// Type selected by the width character of an indirect offset.
    pub fn from_indirect_char(c: char) -> Option<Self> {
        match c {
            'b' | 'B' => Some(ValueType::Byte),
            'L' => Some(ValueType::BeLong),
            'S' => Some(ValueType::BeShort),
            'l' => Some(ValueType::LeLong),
            's' => Some(ValueType::LeShort),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ValueType::Byte => "byte",
            ValueType::String => "string",
            ValueType::IString => "string/c",
            ValueType::LeShort => "leshort",
            ValueType::LeLong => "lelong",
            ValueType::BeShort => "beshort",
            ValueType::BeLong => "belong",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueType::String | ValueType::IString)
    }

    /// Number of bytes decoded for a numeric read; 0 for strings.
    pub fn width(&self) -> usize {
        match self {
            ValueType::Byte => 1,
            ValueType::LeShort | ValueType::BeShort => 2,
            ValueType::LeLong | ValueType::BeLong => 4,
            ValueType::String | ValueType::IString => 0,
        }
    }

    /// Contribution of the type to a rule's signature length.
    ///
    /// 32-bit types weigh 8, as in existing databases, so a long compare
    /// outranks a short string.
    pub fn signature_weight(&self) -> usize {
        match self {
            ValueType::LeLong | ValueType::BeLong => 8,
            other => other.width(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Comparison applied between the read value and the rule operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    /// `=`
    Equal,
    /// `!`
    NotEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `&`: bitwise and is non-zero
    And,
    /// `^`: bitwise xor is non-zero
    Xor,
    /// `x`: matches anything
    Any,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Equal => '=',
            Operator::NotEqual => '!',
            Operator::Greater => '>',
            Operator::Less => '<',
            Operator::And => '&',
            Operator::Xor => '^',
            Operator::Any => 'x',
        }
    }

    /// Operators that only make sense on numeric types.
    pub fn is_numeric_only(&self) -> bool {
        matches!(self, Operator::Less | Operator::And | Operator::Xor)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Offset computed by reading a pointer from the resource itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndirectOffset {
    /// Where the pointer is stored; negative counts from the end.
    pub base: i64,
    /// Width and endianness of the pointer.
    pub width: ValueType,
    /// Added to the pointer value to get the final position.
    pub adjustment: i64,
}

/// Where a rule reads its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Offset {
    /// Non-negative from the start, negative from the end.
    Direct(i64),
    Indirect(IndirectOffset),
}

impl Offset {
    /// The literal position written in the database.
    pub fn base(&self) -> i64 {
        match self {
            Offset::Direct(o) => *o,
            Offset::Indirect(ind) => ind.base,
        }
    }
}

/// One line of the database with its attached sub-rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureRule {
    /// 1-based database line this rule was parsed from.
    pub line: usize,
    pub offset: Offset,
    pub value_type: ValueType,
    /// Applied to numeric reads before comparison.
    pub and_mask: u64,
    pub operator: Operator,
    /// Comparison operand. Case-insensitive strings are stored uppercased.
    pub value: Value,
    /// Printf-style description template (may be empty).
    pub description: String,
    /// Bytes to capture for string rules using `x` or `>`, taken from the
    /// description template.
    pub capture_len: Option<usize>,
    /// Accumulated type/operand weight of this rule and its continuations.
    pub signature_length: usize,
    /// Must all match as well (logical AND).
    pub continuation_rules: Vec<SignatureRule>,
    /// Evaluated after a match to append text to the description.
    pub extra_info_rules: Vec<SignatureRule>,
}

impl SignatureRule {
    pub fn is_numeric(&self) -> bool {
        self.value_type.is_numeric()
    }

    /// Number of bytes a string rule reads.
    pub fn string_read_len(&self) -> usize {
        match (self.operator, self.capture_len) {
            (Operator::Any | Operator::Greater, Some(len)) => len,
            _ => self.value.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_keywords() {
        for ty in [
            ValueType::Byte,
            ValueType::String,
            ValueType::IString,
            ValueType::LeShort,
            ValueType::LeLong,
            ValueType::BeShort,
            ValueType::BeLong,
        ] {
            assert_eq!(ValueType::from_keyword(ty.keyword()), Some(ty));
        }
        assert_eq!(ValueType::from_keyword(" belong "), Some(ValueType::BeLong));
        assert_eq!(ValueType::from_keyword("istring"), Some(ValueType::IString));
        assert_eq!(ValueType::from_keyword("quad"), None);
    }

    #[test]
    fn test_indirect_width_chars() {
        assert_eq!(ValueType::from_indirect_char('b'), Some(ValueType::Byte));
        assert_eq!(ValueType::from_indirect_char('B'), Some(ValueType::Byte));
        assert_eq!(ValueType::from_indirect_char('L'), Some(ValueType::BeLong));
        assert_eq!(ValueType::from_indirect_char('S'), Some(ValueType::BeShort));
        assert_eq!(ValueType::from_indirect_char('l'), Some(ValueType::LeLong));
        assert_eq!(ValueType::from_indirect_char('s'), Some(ValueType::LeShort));
        assert_eq!(ValueType::from_indirect_char('q'), None);
    }

    #[test]
    fn test_widths_and_weights() {
        assert_eq!(ValueType::Byte.width(), 1);
        assert_eq!(ValueType::BeShort.width(), 2);
        assert_eq!(ValueType::LeLong.width(), 4);
        assert_eq!(ValueType::LeLong.signature_weight(), 8);
        assert_eq!(ValueType::String.signature_weight(), 0);
        assert!(!ValueType::IString.is_numeric());
        assert!(ValueType::Byte.is_numeric());
    }

    #[test]
    fn test_numeric_only_operators() {
        assert!(Operator::Less.is_numeric_only());
        assert!(Operator::And.is_numeric_only());
        assert!(Operator::Xor.is_numeric_only());
        assert!(!Operator::Greater.is_numeric_only());
        assert_eq!(Operator::Xor.to_string(), "^");
    }
}
