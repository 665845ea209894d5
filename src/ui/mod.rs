use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{Finding, Report, Severity};
use crate::lhr::{AuditRefStatus, SkipReason};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub max_cell_width: usize,
    pub quiet: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "エラー:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "原因:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "次に:");
    let _ = writeln!(
        stderr,
        "  - 詳細を見るには `--verbose` を付けて再実行してください"
    );
    let _ = writeln!(
        stderr,
        "  - 利用可能なコマンド/オプションは `lhdigest --help` を参照してください"
    );
}

pub fn print_digest(report: &Report, cfg: &UiConfig, top_n: usize, show_tables: bool) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_digest(&mut out, report, cfg, top_n, show_tables);
}

pub fn write_digest(
    out: &mut dyn Write,
    report: &Report,
    cfg: &UiConfig,
    top_n: usize,
    show_tables: bool,
) {
    let score = report
        .summary
        .category_score
        .map(format_score)
        .unwrap_or_else(|| "-".to_string());
    let group = report.group.as_deref().unwrap_or("*");
    let _ = writeln!(
        out,
        "概要: カテゴリ={} スコア={}  グループ={}  選択={}/{}",
        report.category, score, group, report.summary.selected, report.summary.audits_total
    );
    if let Some(url) = report
        .source
        .final_url
        .as_deref()
        .or(report.source.requested_url.as_deref())
    {
        let _ = writeln!(out, "URL: {url}");
    }
    let sev = &report.summary.severity;
    let _ = writeln!(
        out,
        "推奨事項: {}件（高={} 中={} 低={}）",
        report.summary.with_recommendations, sev.high, sev.medium, sev.low
    );
    for note in &report.summary.notes {
        let _ = writeln!(out, "- {note}");
    }

    let total = report.results.len();
    let rows = cfg.max_table_rows.min(top_n).min(total);

    let _ = writeln!(out);
    if total == 0 {
        let _ = writeln!(out, "所見はありません。");
        return;
    }
    if total > rows {
        let _ = writeln!(out, "上位の所見（{rows}件表示 / 全{total}件）:");
    } else {
        let _ = writeln!(out, "上位の所見（{rows}件表示）:");
    }
    print_findings_table(out, &report.results, rows, cfg.color);

    if !show_tables {
        return;
    }
    for finding in report.results.iter().take(rows) {
        let Some(table) = &finding.table else {
            continue;
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "{}（{}）:", finding.title, finding.unique_name);
        write_text_table(out, table, cfg.max_cell_width);
    }
}

pub fn print_audit_refs(rows: &[AuditRefStatus], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_audit_refs(&mut out, rows);
}

pub fn write_audit_refs(out: &mut dyn Write, rows: &[AuditRefStatus]) {
    let table: Vec<Vec<String>> = std::iter::once(vec![
        "状態".to_string(),
        "重み".to_string(),
        "スコア".to_string(),
        "グループ".to_string(),
        "ID".to_string(),
    ])
    .chain(rows.iter().map(|r| {
        vec![
            match r.skip_reason {
                None => "選択".to_string(),
                Some(reason) => skip_reason_label(reason).to_string(),
            },
            crate::table::format_number(r.weight),
            r.score.map(format_score).unwrap_or_else(|| "-".to_string()),
            r.group.clone().unwrap_or_else(|| "-".to_string()),
            r.id.clone(),
        ]
    }))
    .collect();
    write_text_table(out, &table, usize::MAX);
}

fn skip_reason_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Missing => "欠落",
        SkipReason::NullScore => "スコアなし",
        SkipReason::GroupMismatch => "対象外",
    }
}

pub fn format_score(score: f64) -> String {
    format!("{score:.2}")
}

fn print_findings_table(out: &mut dyn Write, findings: &[Finding], rows: usize, color: bool) {
    let label_sev = "重大度";
    let label_weight = "重み";
    let label_score = "スコア";
    let label_title = "タイトル";

    let sev_w = visible_width_ansi(label_sev).max(2);
    let weight_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&crate::table::format_number(f.weight)))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_weight));
    let score_w = visible_width_ansi(label_score).max(4);
    let title_w = visible_width_ansi(label_title).max(5);

    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        pad_end_display(label_sev, sev_w),
        pad_start_display(label_weight, weight_w),
        pad_start_display(label_score, score_w),
        label_title
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        "-".repeat(sev_w),
        "-".repeat(weight_w),
        "-".repeat(score_w),
        "-".repeat(title_w)
    );

    for finding in findings.iter().take(rows) {
        let sev = pad_end_display(&format_severity(finding.severity(), color), sev_w);
        let weight = pad_start_display(&crate::table::format_number(finding.weight), weight_w);
        let score = pad_start_display(
            &finding
                .score
                .map(format_score)
                .unwrap_or_else(|| "-".to_string()),
            score_w,
        );
        let _ = writeln!(
            out,
            "{sev}  {weight}  {score}  {} ({})",
            finding.title, finding.unique_name
        );
    }
}

fn write_text_table(out: &mut dyn Write, table: &[Vec<String>], max_cell_width: usize) {
    let cells: Vec<Vec<String>> = table
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| truncate_middle(&c.replace('\n', " "), max_cell_width))
                .collect()
        })
        .collect();
    let cols = cells.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..cols)
        .map(|i| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| visible_width_ansi(c))
                .max()
                .unwrap_or(0)
        })
        .collect();

    for (n, row) in cells.iter().enumerate() {
        let line: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad_end_display(row.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect();
        let _ = writeln!(out, "  {}", line.join("  ").trim_end());
        if n == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(1))).collect();
            let _ = writeln!(out, "  {}", rule.join("  "));
        }
    }
}

fn severity_label(severity: Option<Severity>) -> &'static str {
    match severity {
        Some(Severity::High) => "高",
        Some(Severity::Medium) => "中",
        Some(Severity::Low) => "低",
        None => "-",
    }
}

fn format_severity(severity: Option<Severity>, color: bool) -> String {
    let s = severity_label(severity);
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Some(Severity::High) => "31",
        Some(Severity::Medium) => "33",
        Some(Severity::Low) => "32",
        None => "90",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s
        .chars()
        .rev()
        .take(right)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    format!("{prefix}...{suffix}")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
