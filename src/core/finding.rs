use crate::core::{Recommendation, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub unique_name: String,
    pub title: String,
    pub description: String,
    pub weight: f64,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<String>>>,
    // Classified for every finding with a recommendation, whatever the
    // recommendation style; only the structured style puts it on the wire.
    #[serde(skip)]
    pub severity: Option<Severity>,
}

impl Finding {
    pub fn severity(&self) -> Option<Severity> {
        self.severity
            .or_else(|| self.recommendations.as_ref().and_then(Recommendation::severity))
    }
}
