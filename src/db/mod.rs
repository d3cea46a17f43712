//! Magic database parser.
//!
//! Compiles the line-oriented, tab-separated `FILE_ID DB` rule format into an
//! immutable [`RuleSet`]. The three header lines are mandatory; after them
//! blank lines and `#` comments are ignored and every other line is a rule:
//!
//! ```text
//! # FILE_ID DB
//! # Date: 2016-03-01
//! # Source: local
//! 0       string      GIF8        GIF image [ext=gif;mime=image/gif]
//! &4      byte        =0x39
//! >6      leshort     x           [res=%d
//! ```
//!
//! A line starting with `&` is a continuation rule (must also match), one
//! starting with `>` is an extra-info rule (adds text after a match). Both
//! attach to the closest preceding top-level rule.
//!
//! # Design
//!
//! - **Fold, not global state**: lines are folded through a [`Builder`]
//!   holding `(finished rules, current rule)`, flushed at end of input
//! - **All-or-nothing**: any malformed line rejects the whole database
//! - **Validated up front**: masks on strings, unknown types, bad offsets and
//!   bad capture specifiers are parse errors, never match-time surprises

pub mod escape;
pub mod template;
mod rule;

pub use rule::{IndirectOffset, Offset, Operator, SignatureRule, ValueType};

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::core::{Value, DEFAULT_AND_MASK};
use crate::error::{MagicError, Result};
use template::DEFAULT_CAPTURE_LEN;

/// First line of every database.
pub const MAGIC_HEADER: &str = "# FILE_ID DB";
/// Prefix of the second line.
pub const DATE_HEADER: &str = "# Date:";
/// Prefix of the third line.
pub const SOURCE_HEADER: &str = "# Source:";

const BUILTIN_DATABASE: &str = include_str!("../../resources/magic.db");

/// Parsed, immutable collection of top-level rules in database order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleSet {
    rules: Vec<SignatureRule>,
}

/// Rule counts of a parsed database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleSetStats {
    pub top_level: usize,
    pub continuation: usize,
    pub extra_info: usize,
}

impl RuleSet {
    /// Parse database text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

        check_header(lines.next(), 1, |l| l == MAGIC_HEADER, MAGIC_HEADER)?;
        check_header(lines.next(), 2, |l| l.starts_with(DATE_HEADER), DATE_HEADER)?;
        check_header(lines.next(), 3, |l| l.starts_with(SOURCE_HEADER), SOURCE_HEADER)?;

        let builder = lines.try_fold(Builder::default(), |builder, (line_no, line)| {
            builder.feed(line_no, line)
        })?;

        let set = builder.finish();
        tracing::debug!(rules = set.rules.len(), "Magic database parsed");
        Ok(set)
    }

    /// Parse raw database bytes, reading each byte as one character so
    /// arbitrary 8-bit values in the file survive into rule operands.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text: String = bytes.iter().map(|&b| char::from(b)).collect();
        Self::parse(&text)
    }

    /// Read and parse a database file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let set = Self::from_bytes(&bytes)?;
        let stats = set.stats();
        tracing::info!(
            path = %path.display(),
            size = %humansize::format_size(bytes.len(), humansize::BINARY),
            top_level = stats.top_level,
            continuation = stats.continuation,
            extra_info = stats.extra_info,
            "Loaded magic database"
        );
        Ok(set)
    }

    /// The database compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_DATABASE)
    }

    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn stats(&self) -> RuleSetStats {
        self.rules.iter().fold(RuleSetStats::default(), |mut s, r| {
            s.top_level += 1;
            s.continuation += r.continuation_rules.len();
            s.extra_info += r.extra_info_rules.len();
            s
        })
    }
}

fn check_header(
    line: Option<(usize, &str)>,
    line_no: usize,
    valid: impl Fn(&str) -> bool,
    expected: &str,
) -> Result<()> {
    match line {
        Some((_, text)) if valid(text) => Ok(()),
        Some(_) => Err(MagicError::format(
            line_no,
            format!("invalid header, expected {expected:?}"),
        )),
        None => Err(MagicError::format(
            line_no,
            format!("missing header line {expected:?}"),
        )),
    }
}

/// Kind of a rule line, selected by the first character of its offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    TopLevel,
    Continuation,
    ExtraInfo,
}

/// Accumulator threaded through the line fold.
#[derive(Debug, Default)]
struct Builder {
    rules: Vec<SignatureRule>,
    current: Option<SignatureRule>,
}

impl Builder {
    fn feed(mut self, line_no: usize, line: &str) -> Result<Self> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(self);
        }

        let fields = split_fields(line_no, line)?;
        let (kind, offset_token) = match fields[0].chars().next() {
            Some('&') => (LineKind::Continuation, &fields[0][1..]),
            Some('>') => (LineKind::ExtraInfo, &fields[0][1..]),
            _ => (LineKind::TopLevel, fields[0]),
        };
        let description = fields.get(3).copied().unwrap_or_default();
        let rule = parse_rule(line_no, offset_token, fields[1], fields[2], description)?;

        match kind {
            LineKind::TopLevel => {
                if let Some(done) = self.current.replace(rule) {
                    self.rules.push(done);
                }
            }
            LineKind::Continuation => {
                let parent = self.parent(line_no)?;
                parent.signature_length += rule.signature_length;
                parent.continuation_rules.push(rule);
            }
            LineKind::ExtraInfo => {
                self.parent(line_no)?.extra_info_rules.push(rule);
            }
        }
        Ok(self)
    }

    fn parent(&mut self, line_no: usize) -> Result<&mut SignatureRule> {
        self.current
            .as_mut()
            .ok_or_else(|| MagicError::format(line_no, "sub-rule before any top-level rule"))
    }

    fn finish(mut self) -> RuleSet {
        if let Some(done) = self.current.take() {
            self.rules.push(done);
        }
        RuleSet { rules: self.rules }
    }
}

/// Split a rule line on runs of tabs; at least three fields are required.
fn split_fields(line_no: usize, line: &str) -> Result<Vec<&str>> {
    if line.starts_with('\t') {
        return Err(MagicError::format(line_no, "empty offset field"));
    }
    let fields: Vec<&str> = line.split('\t').filter(|f| !f.is_empty()).collect();
    if fields.len() < 3 {
        return Err(MagicError::format(
            line_no,
            format!("invalid token count {} (expected at least 3)", fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_rule(
    line_no: usize,
    offset: &str,
    type_token: &str,
    operand_token: &str,
    description: &str,
) -> Result<SignatureRule> {
    let err = |reason: String| MagicError::format(line_no, reason);

    let offset = parse_offset(offset).map_err(err)?;
    let (value_type, and_mask) = parse_type(type_token).map_err(err)?;
    let (operator, value, operand_weight) =
        parse_operand(operand_token, value_type).map_err(err)?;

    let capture_len = if !value_type.is_numeric()
        && matches!(operator, Operator::Any | Operator::Greater)
    {
        Some(template::capture_len(description).map_err(err)?)
    } else {
        None
    };

    Ok(SignatureRule {
        line: line_no,
        offset,
        value_type,
        and_mask,
        operator,
        value,
        description: description.to_string(),
        capture_len,
        signature_length: value_type.signature_weight() + operand_weight,
        continuation_rules: Vec::new(),
        extra_info_rules: Vec::new(),
    })
}

/// Parse a plain (`-4`, `0x10`) or indirect (`(8.l+4)`) offset.
fn parse_offset(token: &str) -> std::result::Result<Offset, String> {
    let Some(inner) = token.strip_prefix('(') else {
        return decode_i64(token)
            .map(Offset::Direct)
            .ok_or_else(|| format!("invalid offset {token:?}"));
    };

    let invalid = || format!("invalid indirect offset {token:?}");
    let inner = inner.strip_suffix(')').ok_or_else(invalid)?;
    let (base, rest) = inner.split_once('.').ok_or_else(invalid)?;

    let mut rest = rest.chars();
    let width_char = rest.next().ok_or_else(invalid)?;
    let width = ValueType::from_indirect_char(width_char)
        .ok_or_else(|| format!("unknown indirect offset type '{width_char}' in {token:?}"))?;

    let adjust = rest.as_str();
    let adjustment = if adjust.is_empty() {
        0
    } else if adjust.starts_with('+') || adjust.starts_with('-') {
        decode_i64(adjust).ok_or_else(invalid)?
    } else {
        return Err(invalid());
    };

    Ok(Offset::Indirect(IndirectOffset {
        base: decode_i64(base).ok_or_else(invalid)?,
        width,
        adjustment,
    }))
}

/// Parse `type` or `type&mask`.
fn parse_type(token: &str) -> std::result::Result<(ValueType, u64), String> {
    let (keyword, mask) = match token.split_once('&') {
        Some((keyword, mask)) => (keyword, Some(mask)),
        None => (token, None),
    };
    let value_type =
        ValueType::from_keyword(keyword).ok_or_else(|| format!("unknown type {keyword:?}"))?;

    let Some(mask) = mask else {
        return Ok((value_type, DEFAULT_AND_MASK));
    };
    if !value_type.is_numeric() {
        return Err(format!("& mask is not allowed on {value_type} types"));
    }
    let mask = decode_integer(mask)
        .and_then(to_u64_bits)
        .ok_or_else(|| format!("invalid mask {mask:?}"))?;
    Ok((value_type, mask))
}

/// Parse the operator and comparison operand. Returns the operand's
/// contribution to the signature length alongside.
fn parse_operand(
    token: &str,
    value_type: ValueType,
) -> std::result::Result<(Operator, Value, usize), String> {
    let Some(op_char) = token.chars().next() else {
        return Err("empty comparison field".to_string());
    };
    let rest = &token[op_char.len_utf8()..];

    if op_char == 'x' && rest.is_empty() {
        return Ok((
            Operator::Any,
            Value::placeholder(value_type, DEFAULT_CAPTURE_LEN),
            0,
        ));
    }

    let numeric = |text: &str| {
        let decoded: String = escape::unescape(text).into_iter().map(char::from).collect();
        decode_integer(&decoded)
            .and_then(to_i64_bits)
            .map(Value::Numeric)
            .ok_or_else(|| format!("invalid numeric value {text:?}"))
    };
    let string = |text: &str| {
        let mut bytes = escape::unescape(text);
        if value_type == ValueType::IString {
            bytes.make_ascii_uppercase();
        }
        bytes
    };

    let operator = match op_char {
        '=' => Operator::Equal,
        '>' => Operator::Greater,
        '!' => Operator::NotEqual,
        '<' => Operator::Less,
        '&' => Operator::And,
        '^' => Operator::Xor,
        _ if value_type.is_numeric() => return Ok((Operator::Equal, numeric(token)?, 0)),
        _ => {
            let bytes = string(token);
            let weight = bytes.len();
            return Ok((Operator::Equal, Value::Bytes(bytes), weight));
        }
    };

    if value_type.is_numeric() {
        return Ok((operator, numeric(rest)?, 0));
    }

    match operator {
        Operator::Equal => {
            let bytes = string(rest);
            let weight = bytes.len();
            Ok((Operator::Equal, Value::Bytes(bytes), weight))
        }
        Operator::Greater => {
            let first = *string(rest)
                .first()
                .ok_or_else(|| "'>' needs a character to compare against".to_string())?;
            Ok((Operator::Greater, Value::Bytes(vec![first]), 1))
        }
        // Reserved characters starting a string operand are part of the text.
        _ => {
            let bytes = string(token);
            let weight = bytes.len();
            Ok((Operator::Equal, Value::Bytes(bytes), weight))
        }
    }
}

/// Decode an integer literal: optional sign, then `0x`/`0X`/`#` hex, a
/// leading `0` for octal, or decimal.
pub(crate) fn decode_integer(text: &str) -> Option<i128> {
    let s = text.trim();
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('#'))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from(u64::from_str_radix(digits, radix).ok()?);
    Some(if negative { -magnitude } else { magnitude })
}

fn decode_i64(text: &str) -> Option<i64> {
    decode_integer(text).and_then(|v| i64::try_from(v).ok())
}

/// Accept anything representable in 64 bits, reinterpreting unsigned
/// literals above `i64::MAX` as their two's complement.
fn to_i64_bits(v: i128) -> Option<i64> {
    i64::try_from(v)
        .ok()
        .or_else(|| u64::try_from(v).ok().map(|u| u as i64))
}

fn to_u64_bits(v: i128) -> Option<u64> {
    u64::try_from(v)
        .ok()
        .or_else(|| i64::try_from(v).ok().map(|i| i as u64))
}
