use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use matbench_core::errors::{io_error, ErrorInfo, MatbenchError};
use matbench_core::serde::settings_to_yaml;
use tracing::{info, warn};

use super::{
    is_relative_program, missing_script, split_program, ExecOutcome, ExecRequest,
    ExecutionBackend,
};

const SIGINT: i32 = 2;
const SHELL: &str = "/bin/sh";

/// Runs each combination synchronously on this host.
///
/// Every run gets its own directory holding `settings.yaml`, the companion
/// files, the captured `stdout`/`stderr` and the `exit_code` written once the
/// child is gone.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    results_root: PathBuf,
    exec_dir: PathBuf,
}

impl LocalBackend {
    /// Writes runs under `results_root`; relative programs resolve in `exec_dir`.
    pub fn new(results_root: impl Into<PathBuf>, exec_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_root: results_root.into(),
            exec_dir: exec_dir.into(),
        }
    }

    /// Root of the results tree.
    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    fn resolve(&self, command: &str) -> String {
        let (program, rest) = split_program(command);
        if is_relative_program(program) {
            format!("{}{rest}", self.exec_dir.join(program).display())
        } else {
            command.to_string()
        }
    }

    fn prepare(&self, dir: &Path, request: &ExecRequest<'_>) -> Result<(), MatbenchError> {
        fs::create_dir_all(dir).map_err(|err| io_error("matbench.local.mkdir", dir, err))?;
        let settings_path = dir.join("settings.yaml");
        fs::write(&settings_path, settings_to_yaml(request.settings)?)
            .map_err(|err| io_error("matbench.local.settings", &settings_path, err))?;
        for (name, content) in request.test_files {
            let path = dir.join(name);
            let mut text = content.clone();
            if !text.ends_with('\n') {
                text.push('\n');
            }
            fs::write(&path, text).map_err(|err| io_error("matbench.local.test_file", &path, err))?;
        }
        Ok(())
    }
}

impl ExecutionBackend for LocalBackend {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        let command = request
            .render_command()?
            .ok_or_else(|| missing_script("local"))?;
        let command = self.resolve(&command);

        let dir = self.results_root.join(request.bench_dir);
        self.prepare(&dir, request)?;

        let stdout_path = dir.join("stdout");
        let stderr_path = dir.join("stderr");
        let stdout = File::create(&stdout_path)
            .map_err(|err| io_error("matbench.local.stdout", &stdout_path, err))?;
        let stderr = File::create(&stderr_path)
            .map_err(|err| io_error("matbench.local.stderr", &stderr_path, err))?;

        info!(
            index = request.index,
            total = request.total,
            dir = %dir.display(),
            %command,
            "running"
        );
        let status = Command::new(SHELL)
            .arg("-c")
            .arg(&command)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|err| {
                MatbenchError::Execution(
                    ErrorInfo::new("matbench.local.spawn", err.to_string())
                        .with_context("command", command.clone())
                        .with_context("path", dir.display().to_string()),
                )
            })?;

        let (code, signal) = exit_code(status);
        let exit_path = dir.join("exit_code");
        fs::write(&exit_path, format!("{code}\n"))
            .map_err(|err| io_error("matbench.local.exit_code", &exit_path, err))?;

        if signal == Some(SIGINT) {
            warn!(dir = %dir.display(), "benchmark interrupted");
            return Err(MatbenchError::Interrupted(
                ErrorInfo::new("matbench.local.interrupted", "benchmark killed by SIGINT")
                    .with_context("path", dir.display().to_string()),
            ));
        }
        if code != 0 {
            warn!(dir = %dir.display(), code, "benchmark failed");
        }
        Ok(ExecOutcome::Exited(code))
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> (i32, Option<i32>) {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => (code, None),
        (None, Some(signal)) => (128 + signal, Some(signal)),
        (None, None) => (1, None),
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> (i32, Option<i32>) {
    (status.code().unwrap_or(1), None)
}
