// Executes a test file under pytest and collects the JUnit report it writes.
// Interpretation of the report lives in report.rs.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::testgen::report::{parse_junit, ExecutionReport};

const STDERR_TAIL: usize = 2_000;

/// Run `test_file` in its own process and parse the per-test outcomes.
///
/// The run is bounded by `cfg.timeout_secs`; exceeding it kills the process
/// and returns `Error::Timeout`. A run that leaves no report behind returns
/// `Error::ReportMissing` rather than an empty report.
pub async fn collect_outcomes(test_file: &Path, cfg: &RunnerConfig) -> Result<ExecutionReport> {
    let (program, lead) = cfg
        .pytest_command
        .split_first()
        .ok_or_else(|| Error::Config("pytest_command is empty".into()))?;

    let scratch = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
    let report_path = scratch.path().join("report.xml");

    let mut cmd = Command::new(program);
    cmd.args(lead)
        .arg(test_file)
        .arg(format!("--junitxml={}", report_path.display()))
        .args(["-q", "-p", "no:cacheprovider"])
        .env(
            "PYTHONPATH",
            python_path(
                env::current_dir().unwrap_or_else(|_| ".".into()),
                env::var_os("PYTHONPATH"),
            ),
        )
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let command_line = cfg.pytest_command.join(" ");
    debug!(command = %command_line, file = %test_file.display(), "running tests");

    let started = Instant::now();
    let child = cmd.spawn().map_err(|source| Error::Spawn {
        command: command_line.clone(),
        source,
    })?;

    let output = tokio::time::timeout(
        Duration::from_secs(cfg.timeout_secs),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| Error::Timeout {
        secs: cfg.timeout_secs,
    })?
    .map_err(|e| Error::io(test_file, e))?;

    let duration_ms = started.elapsed().as_millis();

    if !report_path.exists() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(Error::ReportMissing {
            path: report_path,
            stderr: tail(detail.trim(), STDERR_TAIL),
        });
    }

    let xml = std::fs::read_to_string(&report_path).map_err(|e| Error::io(&report_path, e))?;
    let report = parse_junit(&xml)?;

    info!(
        passed = report.counts.passed,
        failed = report.counts.failed,
        errors = report.counts.error,
        skipped = report.counts.skipped,
        duration_ms = duration_ms as u64,
        "test run finished"
    );

    Ok(report)
}

/// `cwd` ahead of whatever `PYTHONPATH` already held.
fn python_path(cwd: PathBuf, inherited: Option<OsString>) -> OsString {
    let paths: Vec<PathBuf> = std::iter::once(cwd.clone())
        .chain(inherited.iter().flat_map(env::split_paths))
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    env::join_paths(paths).unwrap_or_else(|_| cwd.into_os_string())
}

fn tail(s: &str, limit: usize) -> String {
    let count = s.chars().count();
    if count <= limit {
        return s.to_string();
    }
    s.chars().skip(count - limit).collect()
}
