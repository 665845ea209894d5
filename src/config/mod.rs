use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{RecommendationStyle, SeverityThresholds};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub digest: DigestConfig,
    pub severity: SeverityThresholds,
    pub lighthouse: LighthouseConfig,
    pub logs: LogsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
    pub max_cell_width: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestConfig {
    pub category: String,
    /// `None` selects every group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub recommendations: RecommendationStyle,
    pub include_tables: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LighthouseConfig {
    pub command: String,
    pub chrome_flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsConfig {
    pub enabled: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
                max_cell_width: 60,
            },
            digest: DigestConfig {
                category: "performance".to_string(),
                group: Some("load-opportunities".to_string()),
                recommendations: RecommendationStyle::Text,
                include_tables: true,
            },
            severity: SeverityThresholds::default(),
            lighthouse: LighthouseConfig {
                command: "lighthouse".to_string(),
                chrome_flags: vec!["--headless".to_string()],
                port: None,
            },
            logs: LogsConfig { enabled: false },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    digest: Option<RawDigestConfig>,
    severity: Option<RawSeverityConfig>,
    lighthouse: Option<RawLighthouseConfig>,
    logs: Option<RawLogsConfig>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
    max_cell_width: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDigestConfig {
    category: Option<String>,
    group: Option<String>,
    recommendations: Option<RecommendationStyle>,
    include_tables: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawSeverityConfig {
    high_below: Option<f64>,
    medium_below: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawLighthouseConfig {
    command: Option<String>,
    chrome_flags: Option<Vec<String>>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawLogsConfig {
    enabled: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/lhdigest/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("設定ファイルの読み取りに失敗しました: {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&s).context("設定ファイル(TOML)の解析に失敗しました")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        return Err(anyhow::anyhow!(
            "設定ファイルが見つかりません: {}",
            path.display()
        ));
    }

    apply_env_overrides(&mut cfg)?;

    cfg.severity
        .validate()
        .map_err(anyhow::Error::msg)
        .context("severity")?;

    Ok(cfg)
}

/// `*` or an empty string selects every group.
pub fn parse_group(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || s == "*" {
        None
    } else {
        Some(s.to_string())
    }
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
        if let Some(max_cell_width) = ui.max_cell_width {
            cfg.ui.max_cell_width = max_cell_width;
        }
    }

    if let Some(digest) = raw.digest {
        if let Some(category) = digest.category {
            let category = category.trim();
            if !category.is_empty() {
                cfg.digest.category = category.to_string();
            }
        }
        if let Some(group) = digest.group {
            cfg.digest.group = parse_group(&group);
        }
        if let Some(recommendations) = digest.recommendations {
            cfg.digest.recommendations = recommendations;
        }
        if let Some(include_tables) = digest.include_tables {
            cfg.digest.include_tables = include_tables;
        }
    }

    if let Some(severity) = raw.severity {
        if let Some(high_below) = severity.high_below {
            cfg.severity.high_below = high_below;
        }
        if let Some(medium_below) = severity.medium_below {
            cfg.severity.medium_below = medium_below;
        }
    }

    if let Some(lighthouse) = raw.lighthouse {
        if let Some(command) = lighthouse.command {
            cfg.lighthouse.command = command;
        }
        if let Some(chrome_flags) = lighthouse.chrome_flags {
            cfg.lighthouse.chrome_flags = chrome_flags;
        }
        if let Some(port) = lighthouse.port {
            cfg.lighthouse.port = Some(port);
        }
    }

    if let Some(logs) = raw.logs {
        if let Some(enabled) = logs.enabled {
            cfg.logs.enabled = enabled;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("LHDIGEST_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "LHDIGEST_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "LHDIGEST_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_UI_MAX_CELL_WIDTH") {
        cfg.ui.max_cell_width = v
            .trim()
            .parse::<usize>()
            .with_context(|| "LHDIGEST_UI_MAX_CELL_WIDTH")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_DIGEST_CATEGORY") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.digest.category = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("LHDIGEST_DIGEST_GROUP") {
        cfg.digest.group = parse_group(&v);
    }
    if let Ok(v) = std::env::var("LHDIGEST_DIGEST_RECOMMENDATIONS") {
        cfg.digest.recommendations = v
            .parse::<RecommendationStyle>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "LHDIGEST_DIGEST_RECOMMENDATIONS")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_DIGEST_INCLUDE_TABLES") {
        cfg.digest.include_tables =
            parse_bool(&v).with_context(|| "LHDIGEST_DIGEST_INCLUDE_TABLES")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_SEVERITY_HIGH_BELOW") {
        cfg.severity.high_below = v
            .trim()
            .parse::<f64>()
            .with_context(|| "LHDIGEST_SEVERITY_HIGH_BELOW")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_SEVERITY_MEDIUM_BELOW") {
        cfg.severity.medium_below = v
            .trim()
            .parse::<f64>()
            .with_context(|| "LHDIGEST_SEVERITY_MEDIUM_BELOW")?;
    }
    if let Ok(v) = std::env::var("LHDIGEST_LIGHTHOUSE_COMMAND") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.lighthouse.command = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("LHDIGEST_LIGHTHOUSE_PORT") {
        let v = v.trim();
        cfg.lighthouse.port = if v.is_empty() {
            None
        } else {
            Some(v.parse::<u16>().with_context(|| "LHDIGEST_LIGHTHOUSE_PORT")?)
        };
    }
    if let Ok(v) = std::env::var("LHDIGEST_LOGS_ENABLED") {
        cfg.logs.enabled = parse_bool(&v).with_context(|| "LHDIGEST_LOGS_ENABLED")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "真偽値が不正です: {s}（true|false|1|0|yes|no|on|off を指定してください）"
        )),
    }
}
