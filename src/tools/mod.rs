//! # External Tools
//!
//! Every remote system is reached through a command-line tool. This module
//! owns the process seam:
//!
//! - [`ExternalTool`] names the four required capabilities
//! - [`ToolRunner`] abstracts locating and running a program, so the
//!   providers above it can be exercised against scripted fakes
//! - [`SystemToolRunner`] is the real implementation (`which` + `tokio::process`)

pub mod preflight;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, debug_span, field, Instrument};

/// External capability the setup flow depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    /// Azure CLI (`az`)
    AzureCli,
    /// GitHub CLI (`gh`)
    GithubCli,
    /// JSON query tool (`jq`)
    Jq,
    /// Environment variable substitution (`envsubst`)
    Envsubst,
}

impl ExternalTool {
    /// All tools, in the order the preflight check verifies them
    pub const REQUIRED: [ExternalTool; 4] = [
        ExternalTool::AzureCli,
        ExternalTool::GithubCli,
        ExternalTool::Jq,
        ExternalTool::Envsubst,
    ];

    /// Executable name looked up on `PATH`
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            ExternalTool::AzureCli => "az",
            ExternalTool::GithubCli => "gh",
            ExternalTool::Jq => "jq",
            ExternalTool::Envsubst => "envsubst",
        }
    }

    /// Human readable capability description
    #[must_use]
    pub fn capability(self) -> &'static str {
        match self {
            ExternalTool::AzureCli => "Azure CLI",
            ExternalTool::GithubCli => "GitHub CLI",
            ExternalTool::Jq => "JSON query tool",
            ExternalTool::Envsubst => "environment variable substitution tool",
        }
    }

    /// Installation hint shown when the tool is missing
    #[must_use]
    pub fn install_hint(self) -> &'static str {
        match self {
            ExternalTool::AzureCli => "https://learn.microsoft.com/cli/azure/install-azure-cli",
            ExternalTool::GithubCli => "https://cli.github.com/",
            ExternalTool::Jq => "https://jqlang.github.io/jq/download/",
            ExternalTool::Envsubst => "install GNU gettext (envsubst ships with it)",
        }
    }
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ({})", self.program(), self.capability())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Failure to run an external tool
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("`{program}` was not found in PATH")]
    NotFound { program: String },
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program} {args}` exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Failed {
        program: String,
        args: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Captured stderr of a failed command, empty for other failures
    #[must_use]
    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Failed { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// Runs external programs
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Resolve a program on `PATH`
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run a program to completion, optionally feeding `stdin`
    ///
    /// A non-zero exit is reported through [`CommandOutput::code`], not as an error.
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Run a program and return its stdout, turning a non-zero exit into [`CommandError::Failed`]
///
/// # Errors
/// Returns an error if the program cannot be run or exits unsuccessfully
pub async fn run_checked(
    runner: &dyn ToolRunner,
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
) -> Result<String, CommandError> {
    let output = runner.run(program, args, stdin).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(CommandError::Failed {
            program: program.to_string(),
            args: args.join(" "),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// [`ToolRunner`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolRunner;

#[async_trait]
impl ToolRunner for SystemToolRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, CommandError> {
        let span = debug_span!(
            "tool.run",
            tool.program = program,
            tool.args = args.len(),
            operation.success = field::Empty,
            operation.duration_ms = field::Empty
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let path = self.locate(program).ok_or_else(|| CommandError::NotFound {
                program: program.to_string(),
            })?;

            let mut cmd = tokio::process::Command::new(path);
            cmd.args(args)
                .stdin(if stdin.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            let spawn_error = |source| CommandError::Spawn {
                program: program.to_string(),
                source,
            };

            let mut child = cmd.spawn().map_err(spawn_error)?;

            // Output must be drained while stdin is written or a tool that
            // streams (envsubst, cat) blocks once the pipe buffer fills.
            let stdin_pipe = child.stdin.take();
            let write_stdin = async move {
                if let (Some(input), Some(mut pipe)) = (stdin, stdin_pipe) {
                    pipe.write_all(input.as_bytes()).await?;
                    pipe.shutdown().await?;
                }
                Ok::<(), std::io::Error>(())
            };

            let (written, output) = tokio::join!(write_stdin, child.wait_with_output());
            let output = output.map_err(spawn_error)?;
            written.map_err(spawn_error)?;
            let result = CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };

            span_clone.record("operation.success", result.success());
            span_clone.record(
                "operation.duration_ms",
                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            );
            debug!(code = ?result.code, "{program} finished");
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
