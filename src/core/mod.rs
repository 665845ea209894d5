mod finding;
mod recommendation;
mod report;
mod severity;
mod value_type;

pub use finding::Finding;
pub use recommendation::{Recommendation, RecommendationStyle};
pub use report::{Report, ReportSummary, SeverityCounts, SourceInfo};
pub use severity::{Severity, SeverityThresholds};
pub use value_type::ValueType;
