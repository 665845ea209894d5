use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

fn lhdigest_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lhdigest"));
    cmd.env("HOME", home);
    cmd.env_remove("LHDIGEST_CONFIG");
    cmd.env_remove("LHDIGEST_LOG");
    cmd.env_remove("LHDIGEST_UI_COLOR");
    cmd.env_remove("LHDIGEST_UI_MAX_TABLE_ROWS");
    cmd.env_remove("LHDIGEST_UI_MAX_CELL_WIDTH");
    cmd.env_remove("LHDIGEST_DIGEST_CATEGORY");
    cmd.env_remove("LHDIGEST_DIGEST_GROUP");
    cmd.env_remove("LHDIGEST_DIGEST_RECOMMENDATIONS");
    cmd.env_remove("LHDIGEST_DIGEST_INCLUDE_TABLES");
    cmd.env_remove("LHDIGEST_SEVERITY_HIGH_BELOW");
    cmd.env_remove("LHDIGEST_SEVERITY_MEDIUM_BELOW");
    cmd.env_remove("LHDIGEST_LIGHTHOUSE_COMMAND");
    cmd.env_remove("LHDIGEST_LIGHTHOUSE_PORT");
    cmd.env_remove("LHDIGEST_LOGS_ENABLED");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    lhdigest_cmd(home).args(args).output().expect("run lhdigest")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("lhdigest-digest-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn fixture() -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/lhr-performance.json")
        .display()
        .to_string()
}

fn full_fixture() -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/lhr-full.json")
        .display()
        .to_string()
}

fn result_ids(v: &serde_json::Value) -> Vec<String> {
    v.get("results")
        .and_then(|r| r.as_array())
        .expect("results array")
        .iter()
        .map(|r| {
            r.get("uniqueName")
                .and_then(|n| n.as_str())
                .expect("uniqueName")
                .to_string()
        })
        .collect()
}

#[test]
fn digest_json_selects_load_opportunities_sorted_by_score() {
    let home = make_temp_home();
    let out = run(&home, &["digest", &fixture(), "--json"]);
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        result_ids(&v),
        vec![
            "render-blocking-resources",
            "uses-optimized-images",
            "unused-javascript",
            "uses-text-compression",
        ]
    );
    assert_eq!(v["category"], "performance");
    assert_eq!(v["group"], "load-opportunities");
    assert_eq!(v["summary"]["selected"], 4);
    assert_eq!(v["summary"]["audits_total"], 9);

    let first = &v["results"][0];
    assert_eq!(
        first["recommendations"],
        "Resources are blocking the first paint of your page."
    );
    assert_eq!(first["table"][1][1], "47.08 KB");
    assert_eq!(first["table"][2][2], "230.5 ms");
    assert!(v["results"][3].get("recommendations").is_none());
    assert!(v["results"][3].get("table").is_none());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_all_groups_sorts_by_weight_first() {
    let home = make_temp_home();
    let out = run(&home, &["digest", &fixture(), "--all-groups", "--json"]);
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        result_ids(&v),
        vec![
            "largest-contentful-paint",
            "first-contentful-paint",
            "render-blocking-resources",
            "uses-optimized-images",
            "dom-size",
            "unused-javascript",
            "uses-text-compression",
        ]
    );
    assert!(v.get("group").is_none(), "group should be omitted: {v}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_structured_recommendations_carry_severity() {
    let home = make_temp_home();
    let out = run(
        &home,
        &["digest", &fixture(), "--structured", "--no-tables", "--json"],
    );
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["results"][0]["recommendations"][0], "high");
    assert_eq!(v["results"][1]["recommendations"][0], "medium");
    assert_eq!(v["results"][2]["recommendations"][0], "low");
    assert_eq!(v["summary"]["severity"]["high"], 1);
    assert!(v["results"][0].get("table").is_none());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_other_category_and_group() {
    let home = make_temp_home();
    let out = run(
        &home,
        &[
            "digest",
            &fixture(),
            "--category",
            "accessibility",
            "--group",
            "a11y-names-labels",
            "--json",
        ],
    );
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(result_ids(&v), vec!["image-alt"]);
    assert_eq!(v["results"][0]["weight"], 10.0);
    assert_eq!(v["summary"]["category_score"], 0.9);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_reads_stdin_by_default() {
    let home = make_temp_home();
    let bytes = std::fs::read(fixture()).expect("read fixture");

    let mut child = lhdigest_cmd(&home)
        .args(["digest", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn lhdigest");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(&bytes)
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait lhdigest");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["summary"]["selected"], 4);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_text_lists_top_findings() {
    let home = make_temp_home();
    let out = run(&home, &["digest", &fixture(), "--top", "2", "--tables"]);
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("概要: カテゴリ=performance スコア=0.47"),
        "stdout={stdout}"
    );
    assert!(stdout.contains("選択=4/9"), "stdout={stdout}");
    assert!(
        stdout.contains("上位の所見（2件表示 / 全4件）"),
        "stdout={stdout}"
    );
    assert!(
        stdout.contains("Eliminate render-blocking resources (render-blocking-resources)"),
        "stdout={stdout}"
    );
    assert!(!stdout.contains("(unused-javascript)"), "stdout={stdout}");
    assert!(stdout.contains("Transfer Size"), "stdout={stdout}");
    assert!(stdout.contains("512 KB"), "stdout={stdout}");
    assert!(
        !stdout.contains("\x1b["),
        "no color when stdout is not a tty: stdout={stdout}"
    );

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_markdown_renders_tables() {
    let home = make_temp_home();
    let out = run(&home, &["digest", &fixture(), "--markdown"]);
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("# Lighthouse ダイジェスト"), "stdout={stdout}");
    assert!(stdout.contains("## 所見 (4)"), "stdout={stdout}");
    assert!(
        stdout.contains("| URL | Transfer Size | Potential Savings |"),
        "stdout={stdout}"
    );
    assert!(
        stdout.contains("| [https://shop.example.com/js/vendor.js](https://shop.example.com/js/vendor.js) | 2 MB |"),
        "stdout={stdout}"
    );
    assert!(stdout.contains("- 重大度: medium"), "stdout={stdout}");

    let r1 = stdout
        .find("### Eliminate render-blocking resources")
        .expect("render-blocking present");
    let r2 = stdout
        .find("### Enable text compression")
        .expect("text compression present");
    assert!(r1 < r2, "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn audits_lists_every_ref_with_selection_state() {
    let home = make_temp_home();
    let out = run(&home, &["audits", &fixture(), "--json"]);
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    let rows = v.as_array().expect("array");
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0]["id"], "first-contentful-paint");
    assert_eq!(rows[0]["selected"], false);
    assert_eq!(rows[0]["skip_reason"], "group_mismatch");
    assert_eq!(rows[2]["selected"], true);
    assert!(rows[2].get("skip_reason").is_none());
    assert_eq!(rows[6]["skip_reason"], "null_score");
    assert_eq!(rows[7]["skip_reason"], "missing");

    let out = run(&home, &["audits", &fixture()]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("スコアなし"), "stdout={stdout}");
    assert!(stdout.contains("server-response-time"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_full_report_selects_opportunities_past_other_details_types() {
    let home = make_temp_home();
    let out = run(&home, &["digest", &full_fixture(), "--json"]);
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        result_ids(&v),
        vec![
            "render-blocking-resources",
            "unused-css-rules",
            "modern-image-formats",
        ]
    );
    assert_eq!(v["summary"]["audits_total"], 12);
    assert_eq!(v["summary"]["severity"]["high"], 1);
    assert_eq!(v["summary"]["severity"]["medium"], 1);
    assert_eq!(
        v["summary"]["notes"][0],
        "実行時の警告: The page loaded too slowly to finish within the time limit."
    );
    assert_eq!(v["source"]["final_url"], "https://blog.example.org/");

    let css = &v["results"][1];
    assert_eq!(css["description"], "");
    assert_eq!(css["table"][1][1], "20 KB");
    assert!(v["results"][2].get("table").is_none());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn digest_full_report_handles_checklist_category() {
    let home = make_temp_home();
    let out = run(
        &home,
        &["digest", &full_fixture(), "--category", "pwa", "--all-groups", "--json"],
    );
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(
        result_ids(&v),
        vec!["installable-manifest", "splash-screen", "themed-omnibox"]
    );
    assert_eq!(v["results"][0]["table"][1][0], "Page has no manifest <link> URL");
    assert!(v["results"][1].get("table").is_none());
    assert!(v["results"][2].get("table").is_none());

    let out = run(&home, &["audits", &full_fixture(), "--category", "seo", "--json"]);
    assert!(out.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(rows[0]["id"], "meta-description");
    assert_eq!(rows[0]["skip_reason"], "group_mismatch");
    assert_eq!(rows[1]["skip_reason"], "null_score");

    let _ = std::fs::remove_dir_all(&home);
}
