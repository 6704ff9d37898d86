//! External command templates and execution.
//!
//! Both the command-backed object store and the compute processor drive
//! external tools described in configuration as argument lists with
//! `{placeholder}` tokens. Children are killed when their future is dropped,
//! so a cancelled or timed-out stage never leaves an orphaned transfer behind.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The template has no program.
    #[error("Command template is empty")]
    EmptyTemplate,

    /// The program could not be found.
    #[error("Program not found: {program}")]
    NotFound { program: String },

    /// The program exited unsuccessfully.
    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program did not finish in time.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: String, timeout_secs: u64 },

    /// I/O error while running the program.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}

/// A program plus arguments containing `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.first().map(|p| p.trim().is_empty()).unwrap_or(true)
    }

    /// Substitutes every `{name}` token and splits off the program.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<(String, Vec<String>), CommandError> {
        if self.is_empty() {
            return Err(CommandError::EmptyTemplate);
        }

        let mut rendered = self.0.iter().map(|part| {
            vars.iter().fold(part.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        });

        let program = rendered.next().ok_or(CommandError::EmptyTemplate)?;
        Ok((program, rendered.collect()))
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Renders and runs a template, failing on non-zero exit or timeout.
pub async fn run_template(
    template: &CommandTemplate,
    vars: &[(&str, &str)],
    timeout_secs: u64,
    working_dir: Option<&Path>,
) -> Result<CommandOutput, CommandError> {
    let (program, args) = template.render(vars)?;

    let mut command = Command::new(&program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    tracing::debug!("Running {} {:?}", program, args);

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CommandError::NotFound {
                program: program.clone(),
            }
        } else {
            CommandError::Io(e)
        }
    })?;

    let output = match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(CommandError::Timeout {
                program,
                timeout_secs,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(CommandError::Failed {
            program,
            code: output.status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = CommandTemplate::new(["tool", "cp", "{source}", "{dest}/x", "-v"]);
        let (program, args) = template
            .render(&[("source", "a/b"), ("dest", "c")])
            .unwrap();
        assert_eq!(program, "tool");
        assert_eq!(args, vec!["cp", "a/b", "c/x", "-v"]);
    }

    #[test]
    fn test_render_empty_template() {
        let template = CommandTemplate::default();
        assert!(template.is_empty());
        assert!(matches!(template.render(&[]), Err(CommandError::EmptyTemplate)));
    }

    #[test]
    fn test_template_deserializes_from_list() {
        let template: CommandTemplate = serde_json::from_str(r#"["rm", "-r", "{path}"]"#).unwrap();
        assert_eq!(template, CommandTemplate::new(["rm", "-r", "{path}"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_template_captures_stdout() {
        let template = CommandTemplate::new(["sh", "-c", "echo {word}"]);
        let output = run_template(&template, &[("word", "hello")], 5, None)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_template_reports_failure() {
        let template = CommandTemplate::new(["sh", "-c", "echo boom >&2; exit 3"]);
        let err = run_template(&template, &[], 5, None).await.unwrap_err();
        match err {
            CommandError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_template_times_out() {
        let template = CommandTemplate::new(["sleep", "5"]);
        let err = run_template(&template, &[], 1, None).await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { timeout_secs: 1, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_run_template_missing_program() {
        let template = CommandTemplate::new(["definitely-not-a-real-program-spindle"]);
        let err = run_template(&template, &[], 5, None).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }
}
