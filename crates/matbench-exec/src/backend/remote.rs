use std::io::Write;

use matbench_core::errors::{ErrorInfo, MatbenchError};
use matbench_core::serde::settings_to_yaml;

use super::{
    is_relative_program, missing_script, split_program, ExecOutcome, ExecRequest,
    ExecutionBackend,
};

const HEADER: &str = r#"#! /bin/bash

set -x

if ! [[ -d "$1" ]]; then
  echo "FATAL: \$1 should point to the result directory"
  exit 1
fi
RESULTS_DIR="$(realpath "$1")"

if ! [[ -d "$2" ]]; then
  echo "FATAL: \$2 should point to the exec directory"
  exit 1
fi
EXEC_DIR="$(realpath "$2")"
export EXEC_DIR
"#;

const HEREDOC_END: &str = "MATBENCH_EOF";

/// Emits a bash script that runs the campaign on another host.
///
/// The script takes the results directory and the exec directory as its two
/// arguments. Each fragment skips its combination when `exit_code` already
/// reads `0`, so the script can be re-run from the top after a failure.
///
/// Commands are passed to `/bin/sh -c` as one single-quoted word, exactly as
/// the local backend runs them: a command that does not parse fails its own
/// combination only. Companion files and settings travel through quoted
/// heredocs; content holding a line equal to the terminator is rejected.
#[derive(Debug)]
pub struct RemoteScript<W> {
    out: W,
    header_written: bool,
}

impl<W: Write> RemoteScript<W> {
    /// Writes the script to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) -> Result<(), MatbenchError> {
        self.out.write_all(text.as_bytes()).map_err(|err| {
            MatbenchError::Io(ErrorInfo::new("matbench.remote.write", err.to_string()))
        })
    }
}

impl<W: Write> ExecutionBackend for RemoteScript<W> {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        let command = request
            .render_command()?
            .ok_or_else(|| missing_script("remote"))?;
        let fragment = fragment(request, &command)?;
        if !self.header_written {
            self.emit(HEADER)?;
            self.header_written = true;
        }
        self.emit(&fragment)?;
        self.out.flush().map_err(|err| {
            MatbenchError::Io(ErrorInfo::new("matbench.remote.flush", err.to_string()))
        })?;
        Ok(ExecOutcome::Emitted)
    }
}

fn fragment(request: &ExecRequest<'_>, command: &str) -> Result<String, MatbenchError> {
    let (index, total) = (request.index, request.total);
    let bench_dir = escape_double_quoted(&request.bench_dir.display().to_string());
    let mut text = format!(
        r#"
echo "Expe {index}/{total}"
CURRENT_DIRNAME="${{RESULTS_DIR}}/{bench_dir}"

if [[ "$(cat "$CURRENT_DIRNAME/exit_code" 2>/dev/null)" != 0 ]]; then
  mkdir -p "$CURRENT_DIRNAME"
  cd "$CURRENT_DIRNAME"
"#
    );
    heredoc(&mut text, "./settings.yaml", &settings_to_yaml(request.settings)?)?;
    for (name, content) in request.test_files {
        heredoc(&mut text, &format!("./{}", escape_double_quoted(name)), content)?;
    }
    text.push_str(&format!(
        r#"  echo "$(date) Running expe {index}/{total}"
  /bin/sh -c {command} > ./stdout 2> ./stderr
  echo "$?" > ./exit_code
else
  echo "Already recorded in $CURRENT_DIRNAME."
fi
"#,
        command = single_quoted(&remote_command(command)),
    ));
    Ok(text)
}

fn heredoc(text: &mut String, target: &str, content: &str) -> Result<(), MatbenchError> {
    if content.lines().any(|line| line == HEREDOC_END) {
        return Err(MatbenchError::Validation(
            ErrorInfo::new("matbench.remote.heredoc", "content holds the heredoc terminator")
                .with_context("file", target)
                .with_context("terminator", HEREDOC_END),
        ));
    }
    text.push_str(&format!("  cat > \"{target}\" <<'{HEREDOC_END}'\n"));
    text.push_str(content);
    if !content.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(HEREDOC_END);
    text.push('\n');
    Ok(())
}

fn remote_command(command: &str) -> String {
    let (program, rest) = split_program(command);
    if is_relative_program(program) {
        format!("\"${{EXEC_DIR}}\"/{}{rest}", program.trim_start_matches("./"))
    } else {
        command.trim_start().to_string()
    }
}

/// Quotes text as a single shell word; nothing inside is expanded.
pub fn single_quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Escapes text for a double-quoted bash string.
pub fn escape_double_quoted(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
