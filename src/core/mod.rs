//! Core module - the matching side of magicdb
//!
//! Contains the typed value model, the byte source abstraction and the
//! engine that evaluates a [`RuleSet`](crate::db::RuleSet) against a resource.

mod engine;
mod source;
mod value;

pub use engine::MagicEngine;
pub use source::{ByteSource, MarkReset, RandomAccess, DEFAULT_MARK_LIMIT};
pub use value::{compare, Value, DEFAULT_AND_MASK};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::props::{COMMENT_KEY, MIME_KEY, TITLE_KEY};

/// Result of one identification call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    /// Whether any rule matched
    pub identified: bool,
    /// Winning description with extra-info fragments appended
    pub description: String,
    /// Plain-text part of the description (outside brackets)
    pub comment: String,
    /// Extracted metadata, including `comment` when identified
    pub properties: BTreeMap<String, String>,
    /// Database line of the winning rule
    pub matched_line: Option<usize>,
}

impl Identification {
    /// Result for a resource no rule matched.
    pub fn unidentified() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn mime(&self) -> Option<&str> {
        self.get(MIME_KEY)
    }

    pub fn title(&self) -> Option<&str> {
        self.get(TITLE_KEY)
    }

    /// Comment as stored in the property map.
    pub fn comment_property(&self) -> Option<&str> {
        self.get(COMMENT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unidentified_is_empty() {
        let id = Identification::unidentified();
        assert!(!id.identified);
        assert!(id.properties.is_empty());
        assert_eq!(id.mime(), None);
        assert_eq!(id.matched_line, None);
    }

    #[test]
    fn test_accessors() {
        let mut id = Identification {
            identified: true,
            ..Default::default()
        };
        id.properties.insert("mime".into(), "image/png".into());
        id.properties.insert("title".into(), "Demo".into());
        id.properties.insert("comment".into(), "PNG image".into());
        assert_eq!(id.mime(), Some("image/png"));
        assert_eq!(id.title(), Some("Demo"));
        assert_eq!(id.comment_property(), Some("PNG image"));
        assert_eq!(id.get("res"), None);
    }
}
