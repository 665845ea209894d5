use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::Severity;

/// Plain text, or a `[severity, text]` pair when the consumer wants a
/// priority attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recommendation {
    Structured(Severity, String),
    Text(String),
}

impl Recommendation {
    pub fn text(&self) -> &str {
        match self {
            Recommendation::Structured(_, text) | Recommendation::Text(text) => text,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Recommendation::Structured(severity, _) => Some(*severity),
            Recommendation::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStyle {
    #[default]
    Text,
    Structured,
}

impl fmt::Display for RecommendationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationStyle::Text => f.write_str("text"),
            RecommendationStyle::Structured => f.write_str("structured"),
        }
    }
}

impl FromStr for RecommendationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(RecommendationStyle::Text),
            "structured" => Ok(RecommendationStyle::Structured),
            _ => Err(format!(
                "推奨事項の形式が不正です: {s}（text|structured を指定してください）"
            )),
        }
    }
}
