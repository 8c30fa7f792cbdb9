//! Shared helpers for CLI integration tests.

use std::path::PathBuf;
use std::process::Output;

/// Captured result of one CLI invocation.
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

/// Run the `mse` binary with `args`, teeing captured output to a per-case
/// log file for post-mortem inspection.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CliResult {
    let output: Output = std::process::Command::new(env!("CARGO_BIN_EXE_mse"))
        .args(args)
        .output()
        .expect("failed to spawn mse binary");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_dir = std::env::temp_dir().join("mse-cli-tests");
    std::fs::create_dir_all(&log_dir).expect("create log dir");
    let log_path = log_dir.join(format!("{case_name}.log"));
    let log = format!(
        "args: {args:?}\nstatus: {:?}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
        output.status
    );
    std::fs::write(&log_path, log).expect("write case log");

    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write an object file into `dir` and return its path.
pub fn write_objects(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write object file");
    path
}
