//! Property extraction from matched descriptions.
//!
//! A description carries free text plus a bracketed metadata section:
//!
//! ```text
//! RIFF WAVE audio [ext=wav;mime=audio/x-wav;chn=2;freq=44100]
//! ```
//!
//! Text outside brackets becomes the comment. Text inside is split into
//! `key=value` tokens on runs of `;`. Known keys are normalised to their
//! canonical spelling, numeric kinds are evaluated, unknown keys are kept
//! as written.

mod expr;

pub use expr::{ExprError, ExpressionEvaluator, InfixEvaluator};

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MagicError, Result};

/// File name suffix.
pub const FILE_SUFFIX_KEY: &str = "ext";
/// File format identifier.
pub const FORMAT_ID_KEY: &str = "fid";
pub const TITLE_KEY: &str = "title";
pub const CREATOR_KEY: &str = "creator";
/// Number of audio channels.
pub const AUDIO_CHANNELS_KEY: &str = "chn";
/// Sampling frequency in Hz.
pub const SAMPLING_RATE_KEY: &str = "freq";
/// Image resolution.
pub const IMAGE_RESOLUTION_KEY: &str = "res";
pub const MIME_KEY: &str = "mime";
/// Frames per second.
pub const FRAME_RATE_KEY: &str = "frameRate";
/// Plain-text part of the description. Always present after extraction.
pub const COMMENT_KEY: &str = "comment";

/// How a recognised property value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    /// Evaluated as an integer expression.
    Integer,
    /// Evaluated as a floating point expression.
    Float,
}

const PROPERTY_TABLE: &[(&str, PropertyKind)] = &[
    (FILE_SUFFIX_KEY, PropertyKind::Text),
    (FORMAT_ID_KEY, PropertyKind::Text),
    (TITLE_KEY, PropertyKind::Text),
    (CREATOR_KEY, PropertyKind::Text),
    (AUDIO_CHANNELS_KEY, PropertyKind::Integer),
    (SAMPLING_RATE_KEY, PropertyKind::Text),
    (IMAGE_RESOLUTION_KEY, PropertyKind::Text),
    (MIME_KEY, PropertyKind::Text),
    (FRAME_RATE_KEY, PropertyKind::Float),
];

/// Canonical name and kind of a recognised key, matched case-insensitively.
pub fn lookup(key: &str) -> Option<(&'static str, PropertyKind)> {
    PROPERTY_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .copied()
}

/// Split a description into its comment and its raw property text.
///
/// Brackets nest; only depth-zero characters reach the comment and bracket
/// characters themselves are dropped. Closing a top-level group (or any
/// group followed by `;`, or the final character) emits a `;` so adjacent
/// groups stay separate. Without a `[` before a `]` the whole description is
/// the comment.
pub fn split_description(description: &str) -> (String, String) {
    match (description.find('['), description.find(']')) {
        (Some(start), Some(end)) if end > start => {}
        _ => return (description.to_string(), String::new()),
    }

    let mut comment = String::new();
    let mut properties = String::new();
    let mut depth: i32 = 0;
    let mut chars = description.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '[' => depth += 1,
            ']' => match chars.peek() {
                None => properties.push(';'),
                Some(&next) => {
                    if next == ';' || depth == 1 {
                        properties.push(';');
                    }
                    depth -= 1;
                }
            },
            _ if depth > 0 => properties.push(c),
            _ => comment.push(c),
        }
    }
    (comment, properties)
}

/// Output of [`PropertyExtractor::extract`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub comment: String,
    /// Includes [`COMMENT_KEY`].
    pub properties: BTreeMap<String, String>,
}

/// Turns an assembled description into a comment and property map.
pub struct PropertyExtractor {
    evaluator: Box<dyn ExpressionEvaluator + Send + Sync>,
}

impl fmt::Debug for PropertyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyExtractor").finish_non_exhaustive()
    }
}

impl Default for PropertyExtractor {
    fn default() -> Self {
        Self::new(InfixEvaluator)
    }
}

impl PropertyExtractor {
    pub fn new<E>(evaluator: E) -> Self
    where
        E: ExpressionEvaluator + Send + Sync + 'static,
    {
        Self {
            evaluator: Box::new(evaluator),
        }
    }

    /// Extract the comment and properties of `description`.
    ///
    /// Tokens without `=` or with an empty key are skipped with a warning.
    /// A numeric property the evaluator rejects fails the whole call.
    pub fn extract(&self, description: &str) -> Result<Extracted> {
        let (comment, raw) = split_description(description);
        let mut properties = BTreeMap::new();

        for token in raw.split(';').filter(|t| !t.is_empty()) {
            let Some((key, value)) = token.split_once('=') else {
                if !token.trim().is_empty() {
                    tracing::warn!(token, "Skipping property without '='");
                }
                continue;
            };
            let key = trim_control(key);
            let value = trim_control(value);
            if key.is_empty() {
                tracing::warn!(token, "Skipping property with empty key");
                continue;
            }

            let (name, value) = match lookup(key) {
                Some((name, kind)) => (name.to_string(), self.evaluate(name, kind, value)?),
                None => (key.to_string(), value.to_string()),
            };
            properties.insert(name, value);
        }

        properties.insert(COMMENT_KEY.to_string(), comment.clone());
        Ok(Extracted {
            comment,
            properties,
        })
    }

    fn evaluate(&self, key: &str, kind: PropertyKind, value: &str) -> Result<String> {
        let number_error = |e: ExprError| MagicError::NumberFormat {
            key: key.to_string(),
            expression: value.to_string(),
            reason: e.to_string(),
        };
        match kind {
            PropertyKind::Text => Ok(value.to_string()),
            PropertyKind::Integer => self
                .evaluator
                .evaluate_int(value)
                .map(|n| n.to_string())
                .map_err(number_error),
            // Single precision, printed with at least one decimal ("25.0").
            PropertyKind::Float => self
                .evaluator
                .evaluate_float(value)
                .map(|f| format!("{:?}", f as f32))
                .map_err(number_error),
        }
    }
}

/// Trim whitespace and control characters from both ends.
fn trim_control(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}
