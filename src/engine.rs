use std::cmp::Ordering;

use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{
    Finding, Recommendation, RecommendationStyle, Report, ReportSummary, SeverityCounts,
    SeverityThresholds, SourceInfo,
};
use crate::lhr::{AuditRecord, LighthouseReport, SkippedAudit};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub category: String,
    pub group: Option<String>,
    pub recommendation_style: RecommendationStyle,
    pub thresholds: SeverityThresholds,
    pub include_tables: bool,
}

#[derive(Clone)]
pub struct Engine {
    opts: EngineOptions,
}

#[derive(Debug, Clone)]
pub struct Digest {
    pub report: Report,
    pub skipped: Vec<SkippedAudit>,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.opts
    }

    pub fn digest(&self, lhr: &LighthouseReport) -> Result<Digest> {
        let selection =
            crate::lhr::select_audits(lhr, &self.opts.category, self.opts.group.as_deref())?;
        tracing::debug!(
            category = %self.opts.category,
            selected = selection.records.len(),
            skipped = selection.skipped.len(),
            "audits selected"
        );

        let mut findings = self.format_audits(&selection.records);
        sort_findings(&mut findings);

        let mut severity = SeverityCounts::default();
        for s in findings.iter().filter_map(Finding::severity) {
            severity.add(s);
        }
        let with_recommendations = findings
            .iter()
            .filter(|f| f.recommendations.is_some())
            .count();

        let mut notes: Vec<String> = lhr
            .run_warnings
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(|w| format!("実行時の警告: {w}"))
            .collect();
        if let Some(err) = &lhr.runtime_error {
            let code = err.code.as_deref().unwrap_or("UNKNOWN");
            let message = err.message.as_deref().unwrap_or("").trim();
            if message.is_empty() {
                notes.push(format!("実行時エラー: {code}"));
            } else {
                notes.push(format!("実行時エラー: {code}: {message}"));
            }
        }
        notes.dedup();

        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        let report = Report {
            schema_version: "1.0".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at,
            source: SourceInfo {
                requested_url: lhr.requested_url.clone(),
                final_url: lhr.final_url().map(str::to_string),
                lighthouse_version: lhr.lighthouse_version.clone(),
                fetch_time: lhr.fetch_time.clone(),
            },
            category: self.opts.category.clone(),
            group: self.opts.group.clone(),
            summary: ReportSummary {
                category_score: selection.category_score,
                audits_total: selection.audits_total,
                selected: findings.len(),
                with_recommendations,
                severity,
                notes,
            },
            results: findings,
        };

        Ok(Digest {
            report,
            skipped: selection.skipped,
        })
    }

    pub fn format_audits(&self, records: &[AuditRecord]) -> Vec<Finding> {
        records.iter().map(|r| self.format_audit(r)).collect()
    }

    fn format_audit(&self, record: &AuditRecord) -> Finding {
        let severity = record
            .score
            .filter(|s| *s < 1.0)
            .map(|s| self.opts.thresholds.classify(s));

        let recommendations = severity.map(|s| match self.opts.recommendation_style {
            RecommendationStyle::Text => Recommendation::Text(record.description.clone()),
            RecommendationStyle::Structured => {
                Recommendation::Structured(s, record.description.clone())
            }
        });

        let table = if self.opts.include_tables {
            record.details.as_ref().and_then(crate::table::render_table)
        } else {
            None
        };

        Finding {
            unique_name: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            weight: record.weight,
            score: record.score,
            recommendations,
            table,
            severity,
        }
    }
}

/// Heaviest first; equal weights put the worst score first. Stable.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(compare_findings);
}

fn compare_findings(a: &Finding, b: &Finding) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| match (a.score, b.score) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}
