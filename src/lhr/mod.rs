//! Lenient serde model of a Lighthouse result (LHR) and the category/group
//! selection that feeds the digest.
//!
//! Only the fields the digest reads are modelled; everything else in the
//! document is ignored so that reports from older and newer engines parse.
//! A field of an unexpected shape decodes to its default, and an audit or
//! category that cannot be decoded at all is dropped from its map, so one
//! odd entry never fails the whole report.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseReport {
    #[serde(default, deserialize_with = "lenient")]
    pub lighthouse_version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub requested_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub final_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub final_displayed_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub fetch_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub run_warnings: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime_error: Option<RuntimeError>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub categories: BTreeMap<String, Category>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub audits: BTreeMap<String, Audit>,
}

impl LighthouseReport {
    pub fn final_url(&self) -> Option<&str> {
        self.final_displayed_url
            .as_deref()
            .or(self.final_url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeError {
    #[serde(default, deserialize_with = "lenient")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub audit_refs: Vec<AuditRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditRef {
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub weight: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub score_display_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_value: Option<String>,
    /// Only table-like details (`opportunity`, `table`) carry headings and
    /// an item array; `checklist`, `screenshot`, `treemap-data` and the like
    /// decode with both left empty.
    #[serde(default, deserialize_with = "lenient")]
    pub details: Option<Details>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Details {
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub headings: Vec<Heading>,
    #[serde(default, deserialize_with = "lenient")]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    #[serde(default, deserialize_with = "lenient")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub value_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub item_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
}

impl Heading {
    /// `valueType`, falling back to the `itemType` older engines emit.
    pub fn value_type_tag(&self) -> Option<&str> {
        self.value_type.as_deref().or(self.item_type.as_deref())
    }

    pub fn label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or("")
    }
}

// `null` or a value of another shape becomes `T::default()`.
fn lenient<'de, D, T>(de: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(de)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

// Keeps the elements that decode; anything but an array is empty.
fn lenient_seq<'de, D, T>(de: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(de)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

// Keeps the entries that decode; anything but an object is empty.
fn lenient_map<'de, D, T>(de: D) -> std::result::Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(de)? else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(key, v)| match serde_json::from_value(v) {
            Ok(decoded) => Some((key, decoded)),
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "dropping undecodable entry");
                None
            }
        })
        .collect())
}

/// An auditRef merged with the audit it points at.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub weight: f64,
    pub score: Option<f64>,
    pub group: Option<String>,
    pub display_value: Option<String>,
    pub details: Option<Details>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Missing,
    NullScore,
    GroupMismatch,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            SkipReason::Missing => "missing",
            SkipReason::NullScore => "null_score",
            SkipReason::GroupMismatch => "group_mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAudit {
    pub id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub category_title: Option<String>,
    pub category_score: Option<f64>,
    pub audits_total: usize,
    pub records: Vec<AuditRecord>,
    pub skipped: Vec<SkippedAudit>,
}

pub fn parse(bytes: &[u8]) -> Result<LighthouseReport> {
    serde_json::from_slice(bytes).context("Lighthouse レポート(JSON)の解析に失敗しました")
}

/// Reads an LHR from `input`, where `-` means stdin.
pub fn load(input: &Path) -> Result<LighthouseReport> {
    let bytes = if input.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("標準入力の読み取りに失敗しました")?;
        buf
    } else {
        std::fs::read(input)
            .with_context(|| format!("入力ファイルの読み取りに失敗しました: {}", input.display()))?
    };
    parse(&bytes)
}

pub fn select_audits(
    report: &LighthouseReport,
    category: &str,
    group: Option<&str>,
) -> Result<Selection> {
    let cat = find_category(report, category)?;

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for audit_ref in &cat.audit_refs {
        match resolve_ref(report, audit_ref, group) {
            Ok(record) => records.push(record),
            Err(reason) => {
                tracing::debug!(id = %audit_ref.id, reason = reason.as_str(), "audit skipped");
                skipped.push(SkippedAudit {
                    id: audit_ref.id.clone(),
                    reason,
                });
            }
        }
    }

    Ok(Selection {
        category_title: cat.title.clone(),
        category_score: cat.score,
        audits_total: cat.audit_refs.len(),
        records,
        skipped,
    })
}

/// One row per auditRef of the category, in ref order, with the outcome of
/// the selection for that ref.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRefStatus {
    pub id: String,
    pub group: Option<String>,
    pub weight: f64,
    pub score: Option<f64>,
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

pub fn audit_ref_statuses(
    report: &LighthouseReport,
    category: &str,
    group: Option<&str>,
) -> Result<Vec<AuditRefStatus>> {
    let cat = find_category(report, category)?;
    Ok(cat
        .audit_refs
        .iter()
        .map(|audit_ref| {
            let skip_reason = resolve_ref(report, audit_ref, group).err();
            AuditRefStatus {
                id: audit_ref.id.clone(),
                group: audit_ref.group.clone(),
                weight: audit_ref.weight,
                score: report.audits.get(&audit_ref.id).and_then(|a| a.score),
                selected: skip_reason.is_none(),
                skip_reason,
            }
        })
        .collect())
}

fn find_category<'a>(report: &'a LighthouseReport, category: &str) -> Result<&'a Category> {
    report.categories.get(category).ok_or_else(|| {
        let available: Vec<&str> = report.categories.keys().map(String::as_str).collect();
        anyhow!(
            "カテゴリが見つかりません: {category}（利用可能: {}）",
            if available.is_empty() {
                "なし".to_string()
            } else {
                available.join(", ")
            }
        )
    })
}

// A ref without a group never matches a group filter.
fn resolve_ref(
    report: &LighthouseReport,
    audit_ref: &AuditRef,
    group: Option<&str>,
) -> std::result::Result<AuditRecord, SkipReason> {
    let audit = report
        .audits
        .get(&audit_ref.id)
        .ok_or(SkipReason::Missing)?;
    if audit.score.is_none() {
        return Err(SkipReason::NullScore);
    }
    if let Some(want) = group {
        if audit_ref.group.as_deref() != Some(want) {
            return Err(SkipReason::GroupMismatch);
        }
    }

    Ok(AuditRecord {
        id: audit.id.clone().unwrap_or_else(|| audit_ref.id.clone()),
        title: audit.title.clone(),
        description: audit.description.clone(),
        weight: audit_ref.weight,
        score: audit.score,
        group: audit_ref.group.clone(),
        display_value: audit.display_value.clone(),
        details: audit.details.clone(),
    })
}
