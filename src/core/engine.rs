//! Matching engine - evaluates a rule set against one resource.
//!
//! For every top-level rule, in database order:
//!
//! 1. Resolve the offset (direct, from the end, or through a pointer read
//!    from the resource). Out-of-range offsets disqualify the rule.
//! 2. Read a value of the rule's type, apply its mask, compare.
//! 3. Evaluate every continuation rule the same way; all must match.
//!
//! Matching rules are candidates; the one with the strictly largest
//! signature length wins (first seen on ties). Its extra-info rules then
//! append formatted fragments to the description, which is finally handed to
//! the property extractor.
//!
//! Short reads and bad offsets only disqualify the rule at hand. Operator/type
//! mismatches and I/O failures abort the call.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use super::source::{ByteSource, MarkReset, RandomAccess};
use super::value::{compare, Value, DEFAULT_AND_MASK};
use super::Identification;
use crate::db::{template, Offset, Operator, RuleSet, SignatureRule, ValueType};
use crate::error::{MagicError, Result};
use crate::props::{ExpressionEvaluator, PropertyExtractor};

/// Identifies resources against a compiled rule set.
///
/// The engine holds no per-call state, so one instance can serve many
/// threads as long as each call owns its byte source.
#[derive(Debug)]
pub struct MagicEngine {
    rules: RuleSet,
    extractor: PropertyExtractor,
}

impl MagicEngine {
    /// Engine using the default infix expression evaluator.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            extractor: PropertyExtractor::default(),
        }
    }

    /// Engine with a custom expression evaluator for numeric properties.
    pub fn with_evaluator<E>(rules: RuleSet, evaluator: E) -> Self
    where
        E: ExpressionEvaluator + Send + Sync + 'static,
    {
        Self {
            rules,
            extractor: PropertyExtractor::new(evaluator),
        }
    }

    /// Engine over the built-in database.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(RuleSet::builtin()?))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Identify the resource behind `source`.
    pub fn identify(&self, source: &mut dyn ByteSource) -> Result<Identification> {
        let length = source.total_length()?;
        let mut best: Option<&SignatureRule> = None;

        for rule in self.rules.rules() {
            if !self.rule_matches(rule, source, length)? {
                continue;
            }
            tracing::debug!(
                line = rule.line,
                signature_length = rule.signature_length,
                "Candidate rule matched"
            );
            match best {
                Some(current) if rule.signature_length <= current.signature_length => {}
                _ => best = Some(rule),
            }
        }

        let Some(winner) = best else {
            tracing::debug!(length, "No rule matched");
            return Ok(Identification::unidentified());
        };

        let mut description = winner.description.clone();
        for extra in &winner.extra_info_rules {
            if let Some(fragment) = self.extra_info(extra, source, length)? {
                description.push_str(&fragment);
            }
        }

        let extracted = self.extractor.extract(&description)?;
        tracing::debug!(line = winner.line, %description, "Resource identified");

        Ok(Identification {
            identified: true,
            description,
            comment: extracted.comment,
            properties: extracted.properties,
            matched_line: Some(winner.line),
        })
    }

    /// Identify an in-memory buffer.
    pub fn identify_bytes(&self, data: &[u8]) -> Result<Identification> {
        let mut source = RandomAccess::new(Cursor::new(data))?;
        self.identify(&mut source)
    }

    /// Identify a forward-only stream, buffering at most `mark_limit` bytes.
    pub fn identify_reader<R: Read>(&self, reader: R, mark_limit: usize) -> Result<Identification> {
        let mut source = MarkReset::new(reader, mark_limit);
        self.identify(&mut source)
    }

    /// Identify a file through a read-only memory map.
    pub fn identify_path(&self, path: &Path) -> Result<Identification> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            // Empty files cannot be mapped.
            let mut source = RandomAccess::new(file)?;
            return self.identify(&mut source);
        }

        // SAFETY: the map is read-only and dropped before returning. A file
        // truncated underneath us is the caller's problem, as with any mmap.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        self.identify_bytes(&mmap)
    }

    /// Base comparison plus every continuation.
    fn rule_matches(
        &self,
        rule: &SignatureRule,
        source: &mut dyn ByteSource,
        length: u64,
    ) -> Result<bool> {
        if self.test(rule, source, length)?.is_none() {
            return Ok(false);
        }
        for continuation in &rule.continuation_rules {
            if self.test(continuation, source, length)?.is_none() {
                tracing::trace!(
                    line = rule.line,
                    continuation = continuation.line,
                    "Continuation failed"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Seek, read and compare a single rule. Returns the read value when the
    /// comparison holds.
    fn test(
        &self,
        rule: &SignatureRule,
        source: &mut dyn ByteSource,
        length: u64,
    ) -> Result<Option<Value>> {
        if !seek_to(&rule.offset, source, length)? {
            tracing::trace!(line = rule.line, offset = ?rule.offset, "Offset out of range");
            return Ok(None);
        }
        let Some(value) = disqualify_short(read_value(rule, source))? else {
            tracing::trace!(line = rule.line, "Short read");
            return Ok(None);
        };
        if compare(&value, &rule.value, rule.operator, rule.value_type, rule.line)? {
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Formatted fragment of an extra-info rule, if it matches.
    fn extra_info(
        &self,
        rule: &SignatureRule,
        source: &mut dyn ByteSource,
        length: u64,
    ) -> Result<Option<String>> {
        Ok(self
            .test(rule, source, length)?
            .map(|value| template::format(&rule.description, &value)))
    }
}

/// Position `source` at `offset`. Returns false when the offset falls
/// outside the resource.
fn seek_to(offset: &Offset, source: &mut dyn ByteSource, length: u64) -> Result<bool> {
    let base = offset.base();
    let start = if base >= 0 {
        Some(base as u64).filter(|&b| b <= length)
    } else {
        length.checked_sub(base.unsigned_abs())
    };
    let Some(start) = start else {
        return Ok(false);
    };
    source.seek(start)?;

    let Offset::Indirect(indirect) = offset else {
        return Ok(true);
    };

    let Some(pointer) = disqualify_short(read_numeric(indirect.width, DEFAULT_AND_MASK, source))?
    else {
        return Ok(false);
    };
    let target = i128::from(pointer) + i128::from(indirect.adjustment);
    if target < 0 || target > i128::from(length) {
        return Ok(false);
    }
    source.seek(target as u64)?;
    Ok(true)
}

/// Read the value a rule compares, at the current position.
fn read_value(rule: &SignatureRule, source: &mut dyn ByteSource) -> Result<Value> {
    if rule.is_numeric() {
        return read_numeric(rule.value_type, rule.and_mask, source).map(Value::Numeric);
    }

    let mut bytes = match rule.operator {
        Operator::Any | Operator::Greater => {
            let limit = rule.string_read_len();
            let mut out = Vec::with_capacity(limit.min(64));
            while out.len() < limit {
                let byte = source.read_byte()?;
                out.push(byte);
                if byte == 0 {
                    break;
                }
            }
            out
        }
        _ => source.read_exact(rule.value.len())?,
    };

    if rule.value_type == ValueType::IString {
        bytes.make_ascii_uppercase();
    }
    Ok(Value::Bytes(bytes))
}

fn read_numeric(value_type: ValueType, and_mask: u64, source: &mut dyn ByteSource) -> Result<i64> {
    let bytes = source.read_exact(value_type.width())?;
    Value::decode_numeric(value_type, &bytes, and_mask)
        .and_then(|v| v.as_numeric())
        .ok_or_else(|| MagicError::end_of_data(value_type.width() as u64, bytes.len() as u64))
}

/// Turn a short read into "rule does not apply".
fn disqualify_short<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_end_of_data() => Ok(None),
        Err(e) => Err(e),
    }
}
