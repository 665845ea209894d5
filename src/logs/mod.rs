use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::engine::Digest;
use crate::lhr::SkippedAudit;

#[derive(Debug, Serialize)]
struct DigestLog<'a> {
    schema_version: &'static str,
    tool_version: String,
    command: &'a str,
    started_at: String,
    finished_at: String,
    status: &'static str,
    input: String,
    category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
    selected: Vec<&'a str>,
    skipped: &'a [SkippedAudit],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/lhdigest/logs")
}

#[allow(clippy::too_many_arguments)]
pub fn write_digest_log(
    home_dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    command: &str,
    input: &str,
    category: &str,
    group: Option<&str>,
    digest: Option<&Digest>,
    error: Option<String>,
) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("ログディレクトリの作成に失敗しました: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("digest-{pid}-{ts}.json"));

    let status = match (&error, digest) {
        (None, Some(_)) => "ok",
        _ => "error",
    };

    let log = DigestLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command,
        started_at: started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        finished_at: finished_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        status,
        input: mask_home(input, home_dir),
        category,
        group,
        selected: digest
            .map(|d| {
                d.report
                    .results
                    .iter()
                    .map(|f| f.unique_name.as_str())
                    .collect()
            })
            .unwrap_or_default(),
        skipped: digest.map(|d| d.skipped.as_slice()).unwrap_or(&[]),
        error,
    };

    let buf = serde_json::to_vec_pretty(&log).context("ログ(JSON)のシリアライズに失敗しました")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("ログの書き込みに失敗しました: {}", path.display()))?;
    Ok(path)
}

/// Shortens paths under `home_dir` to `~/...`. URLs and `-` pass through.
pub fn mask_home(input: &str, home_dir: &Path) -> String {
    let Ok(stripped) = Path::new(input).strip_prefix(home_dir) else {
        return input.to_string();
    };
    let stripped = stripped.display().to_string();
    if stripped.is_empty() {
        "~".to_string()
    } else {
        format!("~/{stripped}")
    }
}
