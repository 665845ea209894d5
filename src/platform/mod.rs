use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("環境変数 HOME が設定されていません"))
}

/// Runs `cmd` to completion or kills it once `timeout` elapses. Both pipes
/// are drained on reader threads while waiting, so a chatty child cannot
/// stall on a full pipe.
pub fn run_command(cmd: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("プロセス起動に失敗しました: {cmd}"))?;

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let waited = child
        .wait_timeout(timeout)
        .with_context(|| format!("プロセス待機に失敗しました: {cmd}"));
    let status = match waited {
        Ok(Some(status)) => Some(status),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            None
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
    };

    let stdout = stdout_reader.map(join_reader).unwrap_or_default();
    let stderr = stderr_reader.map(join_reader).unwrap_or_default();

    let Some(status) = status else {
        return Err(anyhow!("タイムアウトしました（{timeout:?}）: {cmd}"));
    };

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct LighthouseRun {
    pub command: String,
    pub category: String,
    pub chrome_flags: Vec<String>,
    pub port: Option<u16>,
    pub timeout: Duration,
}

pub fn lighthouse_args(url: &str, output_path: &std::path::Path, run: &LighthouseRun) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        "--output=json".to_string(),
        format!("--output-path={}", output_path.display()),
        format!("--only-categories={}", run.category),
        "--quiet".to_string(),
    ];
    if let Some(port) = run.port {
        args.push(format!("--port={port}"));
    }
    if !run.chrome_flags.is_empty() {
        args.push(format!("--chrome-flags={}", run.chrome_flags.join(" ")));
    }
    args
}

/// Runs the external `lighthouse` program and returns the raw LHR bytes.
/// Failures are tagged as external-command errors.
pub fn run_lighthouse(url: &str, run: &LighthouseRun) -> Result<Vec<u8>> {
    let output_path = std::env::temp_dir().join(format!(
        "lhdigest-{}-{}.json",
        std::process::id(),
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ));
    let args = lighthouse_args(url, &output_path, run);
    tracing::debug!(command = %run.command, ?args, "running lighthouse");

    let result = run_command(&run.command, &args, run.timeout);
    let bytes = std::fs::read(&output_path);
    let _ = std::fs::remove_file(&output_path);

    let output = result.map_err(crate::exit::external_cmd_err)?;
    if output.exit_code != 0 {
        let mut msg = format!(
            "外部コマンドが失敗しました（exit_code={}）: {}",
            output.exit_code, run.command
        );
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            msg.push_str(&format!("\n{stderr}"));
        }
        return Err(crate::exit::external_cmd(msg));
    }

    bytes
        .with_context(|| {
            format!(
                "lighthouse の出力が見つかりません: {}",
                output_path.display()
            )
        })
        .map_err(crate::exit::external_cmd_err)
}
