use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(format!(
                "重大度が不正です: {s}（high|medium|low を指定してください）"
            )),
        }
    }
}

/// Score boundaries for the three severity tiers. A score strictly below
/// `high_below` is high, strictly below `medium_below` is medium, anything
/// else is low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub high_below: f64,
    pub medium_below: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            high_below: 0.5,
            medium_below: 0.9,
        }
    }
}

impl SeverityThresholds {
    pub fn classify(&self, score: f64) -> Severity {
        if score < self.high_below {
            Severity::High
        } else if score < self.medium_below {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let Self {
            high_below,
            medium_below,
        } = *self;
        if !high_below.is_finite() || !medium_below.is_finite() {
            return Err("重大度のしきい値は有限の数値で指定してください".to_string());
        }
        if !(0.0..=1.0).contains(&high_below) || !(0.0..=1.0).contains(&medium_below) {
            return Err(format!(
                "重大度のしきい値は 0..=1 で指定してください（high_below={high_below} medium_below={medium_below}）"
            ));
        }
        if high_below > medium_below {
            return Err(format!(
                "high_below は medium_below 以下である必要があります（high_below={high_below} medium_below={medium_below}）"
            ));
        }
        Ok(())
    }
}
