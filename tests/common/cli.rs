use assert_cmd::Command;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use std::time::{Instant, SystemTime};
use tempfile::TempDir;

#[derive(Debug)]
pub struct PpjRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl PpjRun {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

pub struct PpjWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub log_dir: PathBuf,
}

impl PpjWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        let log_dir = root.join("logs");
        fs::create_dir_all(&log_dir).expect("log dir");
        Self {
            temp_dir,
            root,
            log_dir,
        }
    }

    /// A workspace with `ppj init` already run.
    pub fn initialized() -> Self {
        let workspace = Self::new();
        let run = run_ppj(&workspace, ["init"], "init");
        assert!(run.status.success(), "init failed: {}", run.stderr);
        workspace
    }
}

pub fn run_ppj<I, S>(workspace: &PpjWorkspace, args: I, label: &str) -> PpjRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_ppj_with_env(
        workspace,
        args,
        std::iter::empty::<(String, String)>(),
        label,
    )
}

pub fn run_ppj_with_env<I, S, E, K, V>(
    workspace: &PpjWorkspace,
    args: I,
    env_vars: E,
    label: &str,
) -> PpjRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ppj"));
    cmd.current_dir(&workspace.root);
    cmd.env_remove("PPJ_DIR");
    cmd.env_remove("PPJ_DB");
    cmd.env_remove("PPJ_SECRET_KEY");
    cmd.env_remove("PPJ_JIRA_PASSWORD");
    cmd.args(args);
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_LOG", "poker_jira=debug");
    cmd.env("RUST_BACKTRACE", "1");
    cmd.env("HOME", &workspace.root);
    cmd.envs(env_vars);

    let start = Instant::now();
    let output = cmd.output().expect("run ppj");
    let duration = start.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_path = workspace.log_dir.join(format!("{label}.log"));
    let timestamp = SystemTime::now();
    let log_body = format!(
        "label: {label}\nstarted: {:?}\nduration: {:?}\nstatus: {}\nargs: {:?}\ncwd: {}\n\nstdout:\n{}\n\nstderr:\n{}\n",
        timestamp,
        duration,
        output.status,
        cmd.get_args().collect::<Vec<_>>(),
        workspace.root.display(),
        stdout,
        stderr
    );
    fs::write(&log_path, log_body).expect("write log");

    PpjRun {
        stdout,
        stderr,
        status: output.status,
    }
}

pub fn extract_json_payload(stdout: &str) -> String {
    let lines: Vec<&str> = stdout.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return lines[idx..].join("\n").trim().to_string();
        }
    }
    stdout.trim().to_string()
}

/// Parse the JSON printed by a `--json` run.
pub fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(&extract_json_payload(stdout)).expect("valid json output")
}
