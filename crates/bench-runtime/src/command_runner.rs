use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bench_github::github_transport_helpers::{redact_secrets, truncate_for_error};

pub const TOOLCHAIN_QUERY_COMMAND: &str = "rustup show active-toolchain --verbose";

#[derive(Debug, Clone, Copy)]
/// One command invocation. Command lines are split shell-style but never run
/// through a shell.
pub struct CommandRequest<'a> {
    pub command_line: &'a str,
    pub cwd: Option<&'a Path>,
    pub secrets: &'a [&'a str],
}

impl<'a> CommandRequest<'a> {
    pub fn new(command_line: &'a str) -> Self {
        Self {
            command_line,
            cwd: None,
            secrets: &[],
        }
    }

    pub fn in_dir(mut self, cwd: &'a Path) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn redacting(mut self, secrets: &'a [&'a str]) -> Self {
        self.secrets = secrets;
        self
    }

    /// Command line safe to log.
    pub fn display_line(&self) -> String {
        redact_secrets(self.command_line, self.secrets)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Captured result of a command. `error` is set when the command could not
/// be started or exited unsuccessfully.
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Error text with the tail of stderr appended, for failure reports.
    pub fn error_summary(&self) -> String {
        let error = self.error.clone().unwrap_or_default();
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            return error;
        }
        let tail = stderr
            .lines()
            .rev()
            .take(20)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        format!("{error}\n{}", truncate_for_error(&tail, 2_000))
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: CommandRequest<'_>) -> CommandOutput;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCommandRunner;

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, request: CommandRequest<'_>) -> CommandOutput {
        let display_line = request.display_line();
        let argv = match shell_words::split(request.command_line) {
            Ok(argv) => argv,
            Err(error) => {
                return CommandOutput::failed(format!(
                    "failed to parse command `{display_line}`: {error}"
                ));
            }
        };
        let Some((program, args)) = argv.split_first() else {
            return CommandOutput::failed("cannot run an empty command");
        };

        tracing::debug!(command = %display_line, cwd = ?request.cwd, "running command");
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = request.cwd {
            command.current_dir(cwd);
        }

        let output = match command.output().await {
            Ok(output) => output,
            Err(error) => {
                return CommandOutput::failed(format!(
                    "failed to spawn `{display_line}`: {error}"
                ));
            }
        };

        let stdout = redact_secrets(&String::from_utf8_lossy(&output.stdout), request.secrets);
        let stderr = redact_secrets(&String::from_utf8_lossy(&output.stderr), request.secrets);
        let exit_code = output.status.code();
        let error = if output.status.success() {
            None
        } else {
            tracing::debug!(command = %display_line, ?exit_code, "command failed");
            Some(match exit_code {
                Some(code) => format!("`{display_line}` exited with status {code}"),
                None => format!("`{display_line}` was terminated by a signal"),
            })
        };
        CommandOutput {
            stdout,
            stderr,
            exit_code,
            error,
        }
    }
}
