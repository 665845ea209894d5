use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::EffectiveConfig;
use crate::core::{RecommendationStyle, Report};
use crate::engine::{Engine, EngineOptions};
use crate::lhr::LighthouseReport;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "lhdigest",
    version,
    about = "Lighthouse の監査結果を、重み・スコア順の所見と推奨事項に要約する"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 120, global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Lighthouse の JSON レポートを要約する
    Digest(DigestArgs),
    /// lighthouse を実行して結果を要約する
    Run(RunArgs),
    /// カテゴリ内の監査と選択結果を一覧表示する
    Audits(AuditsArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SelectArgs {
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, conflicts_with = "all_groups")]
    pub group: Option<String>,
    #[arg(long)]
    pub all_groups: bool,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    #[arg(long)]
    pub structured: bool,
    #[arg(long)]
    pub markdown: bool,
    #[arg(long, conflicts_with = "no_tables")]
    pub tables: bool,
    #[arg(long)]
    pub no_tables: bool,
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    #[arg(long)]
    pub log: bool,
}

#[derive(Debug, Args)]
pub struct DigestArgs {
    #[arg(default_value = "-")]
    pub input: PathBuf,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    pub url: String,
    #[arg(long)]
    pub port: Option<u16>,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct AuditsArgs {
    #[arg(default_value = "-")]
    pub input: PathBuf,
    #[command(flatten)]
    pub select: SelectArgs,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

struct Session {
    cfg: EffectiveConfig,
    ui: UiConfig,
    home_dir: PathBuf,
    json: bool,
    timeout: Duration,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;

    let env_config_path = std::env::var_os("LHDIGEST_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui = UiConfig {
        color,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        max_cell_width: cfg.ui.max_cell_width,
        quiet: cli.quiet,
    };

    let session = Session {
        cfg,
        ui,
        home_dir,
        json: cli.json,
        timeout: Duration::from_secs(cli.timeout),
    };

    match cli.command {
        Commands::Digest(args) => {
            check_output_flags(&session, &args.output)?;
            let input = args.input.display().to_string();
            digest_command(&session, "digest", input, &args.select, &args.output, || {
                crate::lhr::load(&args.input).map_err(crate::exit::input_failed_err)
            })?;
        }
        Commands::Run(args) => {
            check_output_flags(&session, &args.output)?;
            let url = args.url.trim().to_string();
            if url.is_empty() {
                return Err(crate::exit::invalid_args("run: URL は空にできません"));
            }
            let lighthouse = crate::platform::LighthouseRun {
                command: session.cfg.lighthouse.command.clone(),
                category: resolve_category(&session.cfg, &args.select),
                chrome_flags: session.cfg.lighthouse.chrome_flags.clone(),
                port: args.port.or(session.cfg.lighthouse.port),
                timeout: session.timeout,
            };
            let show_progress = session.ui.stderr_is_tty && !session.ui.quiet && !session.json;
            digest_command(
                &session,
                "run",
                url.clone(),
                &args.select,
                &args.output,
                || {
                    let bytes = with_spinner(show_progress, &url, || {
                        crate::platform::run_lighthouse(&url, &lighthouse)
                    })?;
                    crate::lhr::parse(&bytes).map_err(crate::exit::input_failed_err)
                },
            )?;
        }
        Commands::Audits(args) => {
            let lhr = crate::lhr::load(&args.input).map_err(crate::exit::input_failed_err)?;
            let rows = crate::lhr::audit_ref_statuses(
                &lhr,
                &resolve_category(&session.cfg, &args.select),
                resolve_group(&session.cfg, &args.select).as_deref(),
            )
            .map_err(crate::exit::input_failed_err)?;
            if session.json {
                write_json(&rows)?;
            } else {
                crate::ui::print_audit_refs(&rows, &session.ui);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "lhdigest", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if session.json {
                    write_json(&session.cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&session.cfg)?);
                }
            } else if !session.ui.quiet {
                eprintln!("config: `lhdigest config --show` を使用してください");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_env("LHDIGEST_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn check_output_flags(session: &Session, output: &OutputArgs) -> Result<()> {
    if session.json && output.markdown {
        return Err(crate::exit::invalid_args(
            "--json と --markdown は同時に指定できません",
        ));
    }
    Ok(())
}

fn resolve_category(cfg: &EffectiveConfig, select: &SelectArgs) -> String {
    select
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| cfg.digest.category.clone())
}

fn resolve_group(cfg: &EffectiveConfig, select: &SelectArgs) -> Option<String> {
    if select.all_groups {
        return None;
    }
    match &select.group {
        Some(group) => crate::config::parse_group(group),
        None => cfg.digest.group.clone(),
    }
}

fn engine_options(cfg: &EffectiveConfig, select: &SelectArgs, output: &OutputArgs) -> EngineOptions {
    EngineOptions {
        category: resolve_category(cfg, select),
        group: resolve_group(cfg, select),
        recommendation_style: if output.structured {
            RecommendationStyle::Structured
        } else {
            cfg.digest.recommendations
        },
        thresholds: cfg.severity,
        include_tables: cfg.digest.include_tables && !output.no_tables,
    }
}

fn digest_command(
    session: &Session,
    command: &str,
    input: String,
    select: &SelectArgs,
    output: &OutputArgs,
    fetch: impl FnOnce() -> Result<LighthouseReport>,
) -> Result<()> {
    let engine = Engine::new(engine_options(&session.cfg, select, output));

    let started_at = OffsetDateTime::now_utc();
    let result =
        fetch().and_then(|lhr| engine.digest(&lhr).map_err(crate::exit::input_failed_err));
    let finished_at = OffsetDateTime::now_utc();

    if output.log || session.cfg.logs.enabled {
        let opts = engine.options();
        let logged = crate::logs::write_digest_log(
            &session.home_dir,
            started_at,
            finished_at,
            command,
            &input,
            &opts.category,
            opts.group.as_deref(),
            result.as_ref().ok(),
            result.as_ref().err().map(|e| format!("{e:#}")),
        );
        match logged {
            Ok(path) => {
                if !session.ui.quiet {
                    eprintln!(
                        "ログ: {}",
                        crate::logs::mask_home(&path.display().to_string(), &session.home_dir)
                    );
                }
            }
            Err(err) => tracing::warn!("ログの書き込みに失敗しました: {err:#}"),
        }
    }

    let digest = result?;
    if session.json {
        write_json(&digest.report)?;
    } else if output.markdown {
        write_markdown(&digest.report)?;
    } else {
        crate::ui::print_digest(&digest.report, &session.ui, output.top, output.tables);
    }
    Ok(())
}

fn with_spinner<T>(enabled: bool, url: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let pb = if enabled {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(format!("lighthouse を実行中 {url}"));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };
    let result = f();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn write_markdown(report: &Report) -> Result<()> {
    use std::io::Write;

    let markdown = format_markdown_digest(report);
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(markdown.as_bytes()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn format_markdown_digest(report: &Report) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();

    let _ = writeln!(out, "# Lighthouse ダイジェスト");
    let _ = writeln!(out);
    let _ = writeln!(out, "- ツールバージョン: {}", report.tool_version);
    let _ = writeln!(out, "- 生成日時: {}", report.generated_at);
    if let Some(url) = report
        .source
        .final_url
        .as_deref()
        .or(report.source.requested_url.as_deref())
    {
        let _ = writeln!(out, "- URL: {url}");
    }
    if let Some(version) = &report.source.lighthouse_version {
        let _ = writeln!(out, "- Lighthouse: {version}");
    }
    if let Some(fetch_time) = &report.source.fetch_time {
        let _ = writeln!(out, "- 取得日時: {fetch_time}");
    }
    match report.summary.category_score {
        Some(score) => {
            let _ = writeln!(
                out,
                "- カテゴリ: {}（スコア: {}）",
                report.category,
                crate::ui::format_score(score)
            );
        }
        None => {
            let _ = writeln!(out, "- カテゴリ: {}", report.category);
        }
    }
    let _ = writeln!(
        out,
        "- グループ: {}",
        report.group.as_deref().unwrap_or("すべて")
    );
    let sev = &report.summary.severity;
    let _ = writeln!(
        out,
        "- 推奨事項: {}件（高={} 中={} 低={}）",
        report.summary.with_recommendations, sev.high, sev.medium, sev.low
    );
    for note in &report.summary.notes {
        let _ = writeln!(out, "- 注記: {note}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## 所見 ({})", report.results.len());
    if report.results.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "_所見はありません。_");
    }

    for f in &report.results {
        let _ = writeln!(out);
        let _ = writeln!(out, "### {}", f.title);
        let _ = writeln!(out, "- id: `{}`", f.unique_name);
        let _ = writeln!(out, "- 重み: {}", crate::table::format_number(f.weight));
        match f.score {
            Some(score) => {
                let _ = writeln!(out, "- スコア: {}", crate::ui::format_score(score));
            }
            None => {
                let _ = writeln!(out, "- スコア: -");
            }
        }
        if let Some(severity) = f.severity() {
            let _ = writeln!(out, "- 重大度: {severity}");
        }

        match &f.recommendations {
            Some(rec) => {
                let text = rec.text().trim();
                if !text.is_empty() {
                    let _ = writeln!(out);
                    let _ = writeln!(out, "#### 推奨事項");
                    let _ = writeln!(out);
                    let _ = writeln!(out, "{text}");
                }
            }
            None => {
                let description = f.description.trim();
                if !description.is_empty() {
                    let _ = writeln!(out);
                    let _ = writeln!(out, "{description}");
                }
            }
        }

        if let Some(table) = &f.table {
            let _ = writeln!(out);
            let _ = writeln!(out, "#### 詳細");
            let _ = writeln!(out);
            out.push_str(&crate::table::markdown_table(table));
        }
    }

    let _ = writeln!(out);
    out
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "未対応のシェルです: {other}（bash|zsh|fish を指定してください）"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Finding, Recommendation, ReportSummary, Severity, SeverityCounts, SourceInfo,
    };

    fn select(category: Option<&str>, group: Option<&str>, all_groups: bool) -> SelectArgs {
        SelectArgs {
            category: category.map(str::to_string),
            group: group.map(str::to_string),
            all_groups,
        }
    }

    fn output(structured: bool, no_tables: bool) -> OutputArgs {
        OutputArgs {
            structured,
            markdown: false,
            tables: false,
            no_tables,
            top: 10,
            log: false,
        }
    }

    #[test]
    fn engine_options_layer_flags_over_config() {
        let cfg = EffectiveConfig::default();

        let o = engine_options(&cfg, &select(None, None, false), &output(false, false));
        assert_eq!(o.category, "performance");
        assert_eq!(o.group.as_deref(), Some("load-opportunities"));
        assert_eq!(o.recommendation_style, RecommendationStyle::Text);
        assert!(o.include_tables);

        let o = engine_options(
            &cfg,
            &select(Some("accessibility"), Some("a11y-names-labels"), false),
            &output(true, true),
        );
        assert_eq!(o.category, "accessibility");
        assert_eq!(o.group.as_deref(), Some("a11y-names-labels"));
        assert_eq!(o.recommendation_style, RecommendationStyle::Structured);
        assert!(!o.include_tables);

        let o = engine_options(&cfg, &select(Some("  "), None, true), &output(false, false));
        assert_eq!(o.category, "performance");
        assert_eq!(o.group, None);

        let o = engine_options(&cfg, &select(None, Some("*"), false), &output(false, false));
        assert_eq!(o.group, None);
    }

    #[test]
    fn markdown_digest_renders_recommendations_and_tables() {
        let report = Report {
            schema_version: "1.0".to_string(),
            tool_version: "0.1.0".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            source: SourceInfo {
                requested_url: Some("https://example.com/".to_string()),
                final_url: None,
                lighthouse_version: Some("9.6.8".to_string()),
                fetch_time: None,
            },
            category: "performance".to_string(),
            group: Some("load-opportunities".to_string()),
            summary: ReportSummary {
                category_score: Some(0.42),
                audits_total: 3,
                selected: 2,
                with_recommendations: 1,
                severity: SeverityCounts {
                    high: 1,
                    medium: 0,
                    low: 0,
                },
                notes: vec![],
            },
            results: vec![
                Finding {
                    unique_name: "render-blocking-resources".to_string(),
                    title: "Eliminate render-blocking resources".to_string(),
                    description: "Resources are blocking the first paint.".to_string(),
                    weight: 0.0,
                    score: Some(0.3),
                    recommendations: Some(Recommendation::Structured(
                        Severity::High,
                        "Resources are blocking the first paint.".to_string(),
                    )),
                    table: Some(vec![
                        vec!["URL".to_string(), "Potential Savings".to_string()],
                        vec!["[a.css](a.css)".to_string(), "150 ms".to_string()],
                    ]),
                    severity: Some(Severity::High),
                },
                Finding {
                    unique_name: "uses-text-compression".to_string(),
                    title: "Enable text compression".to_string(),
                    description: "Compress text.".to_string(),
                    weight: 0.0,
                    score: Some(1.0),
                    recommendations: None,
                    table: None,
                    severity: None,
                },
            ],
        };

        let md = format_markdown_digest(&report);
        assert!(md.starts_with("# Lighthouse ダイジェスト\n"), "md={md}");
        assert!(md.contains("- URL: https://example.com/"), "md={md}");
        assert!(md.contains("- Lighthouse: 9.6.8"), "md={md}");
        assert!(md.contains("- カテゴリ: performance（スコア: 0.42）"), "md={md}");
        assert!(md.contains("- グループ: load-opportunities"), "md={md}");
        assert!(md.contains("## 所見 (2)"), "md={md}");
        assert!(md.contains("- 重大度: high"), "md={md}");
        assert!(
            md.contains("#### 推奨事項\n\nResources are blocking the first paint.\n"),
            "md={md}"
        );
        assert!(
            md.contains("| URL | Potential Savings |\n| --- | --- |\n| [a.css](a.css) | 150 ms |\n"),
            "md={md}"
        );
        assert!(md.contains("\nCompress text.\n"), "md={md}");

        let first = md.find("render-blocking-resources").expect("first");
        let second = md.find("uses-text-compression").expect("second");
        assert!(first < second);
    }

    #[test]
    fn parse_shell_rejects_unknown() {
        assert!(parse_shell("Bash").is_ok());
        let err = parse_shell("nope").expect_err("should fail");
        assert_eq!(crate::exit::exit_code(&err), 2);
    }
}
