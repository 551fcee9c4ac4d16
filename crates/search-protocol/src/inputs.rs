//! Query-level inputs that jobs near the root of a tree need to see.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How results are delivered to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Streaming,
    Batch,
    Exhaustive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    #[default]
    Standard,
    Literal,
    Regexp,
    Structural,
    Keyword,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternType::Standard => "standard",
            PatternType::Literal => "literal",
            PatternType::Regexp => "regexp",
            PatternType::Structural => "structural",
            PatternType::Keyword => "keyword",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchInputs {
    /// The query after planner rewrites.
    pub query: String,
    /// The query exactly as the user typed it.
    pub original_query: String,
    pub pattern_type: PatternType,
    pub protocol: Protocol,
}

impl SearchInputs {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            original_query: query.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Protocol::Exhaustive).unwrap(), "\"exhaustive\"");
        let parsed: PatternType = serde_json::from_str("\"structural\"").unwrap();
        assert_eq!(parsed, PatternType::Structural);
    }
}
