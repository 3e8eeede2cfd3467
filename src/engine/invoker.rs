//! Subprocess invocation and outcome classification.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

/// Classified result of one checker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exited with status 0
    Clean,
    /// Exited with a non-zero status; carries the combined output
    IssuesFound(Vec<u8>),
    /// The checker could not be run at all
    InfraError(String),
}

impl Outcome {
    /// Classify a finished process.
    ///
    /// A process killed by a signal has no exit code and counts as an
    /// infrastructure failure rather than a report of issues.
    pub fn from_exit(status: ExitStatus, output: Vec<u8>) -> Self {
        match status.code() {
            Some(0) => Outcome::Clean,
            Some(_) => Outcome::IssuesFound(output),
            None => Outcome::InfraError(format!("terminated without an exit code ({})", status)),
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Outcome::Clean)
    }
}

/// Something that can run a checker with an argument vector.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Run `command` with `args` and classify the result
    async fn invoke(&self, command: &str, args: &[String]) -> Outcome;
}

/// Runs checkers as real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    working_dir: Option<PathBuf>,
    search_path: Vec<PathBuf>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run checkers from `dir` instead of the current directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Look for checker executables in `dirs` before the inherited PATH
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = dirs;
        self
    }

    fn child_path(&self) -> Option<OsString> {
        if self.search_path.is_empty() {
            return None;
        }
        let mut dirs = self.search_path.clone();
        if let Some(inherited) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&inherited));
        }
        std::env::join_paths(dirs).ok()
    }
}

/// Run `cmd` with stdout and stderr sharing one pipe, so the captured
/// output keeps the order in which the child wrote it.
async fn combined_output(mut cmd: Command) -> io::Result<(ExitStatus, Vec<u8>)> {
    let (mut reader, writer) = io::pipe()?;
    cmd.stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);

    let mut child = cmd.spawn()?;
    // The command still owns the write ends; EOF only arrives once they close.
    drop(cmd);

    let drain = tokio::task::spawn_blocking(move || {
        let mut output = Vec::new();
        reader.read_to_end(&mut output).map(|_| output)
    });
    let status = child.wait().await?;
    let output = drain.await.map_err(io::Error::other)??;
    Ok((status, output))
}

#[async_trait]
impl Invoker for ProcessInvoker {
    async fn invoke(&self, command: &str, args: &[String]) -> Outcome {
        let mut cmd = Command::new(command);
        cmd.args(args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        // A PATH set on the child is also used to resolve the program
        if let Some(path) = self.child_path() {
            cmd.env("PATH", path);
        }

        log::debug!("invoking {} {}", command, args.join(" "));

        match combined_output(cmd).await {
            Ok((status, output)) => Outcome::from_exit(status, output),
            Err(e) => Outcome::InfraError(e.to_string()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_exit_zero_is_clean() {
        let outcome = ProcessInvoker::new().invoke("sh", &sh("echo fine; exit 0")).await;
        assert_eq!(outcome, Outcome::Clean);
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_issues_found() {
        let outcome = ProcessInvoker::new().invoke("sh", &sh("echo bad code; exit 3")).await;
        assert_eq!(outcome, Outcome::IssuesFound(b"bad code\n".to_vec()));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let outcome = ProcessInvoker::new()
            .invoke("sh", &sh("echo out; echo err >&2; exit 1"))
            .await;
        match outcome {
            Outcome::IssuesFound(output) => {
                let text = String::from_utf8(output).unwrap();
                assert!(text.contains("out"));
                assert!(text.contains("err"));
            }
            other => panic!("expected IssuesFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stdout_and_stderr_keep_write_order() {
        let outcome = ProcessInvoker::new()
            .invoke("sh", &sh("echo a; echo b >&2; echo c; exit 1"))
            .await;
        assert_eq!(outcome, Outcome::IssuesFound(b"a\nb\nc\n".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_infra_error() {
        let outcome = ProcessInvoker::new()
            .invoke("lintmux-no-such-checker-xyz", &[])
            .await;
        assert!(matches!(outcome, Outcome::InfraError(_)));
    }

    #[tokio::test]
    async fn test_signal_termination_is_infra_error() {
        let outcome = ProcessInvoker::new().invoke("sh", &sh("kill -9 $$")).await;
        assert!(matches!(outcome, Outcome::InfraError(_)));
    }

    #[tokio::test]
    async fn test_search_path_resolves_program() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lintmux-test-checker");
        std::fs::write(&script, "#!/bin/sh\necho \"checked $1\"\nexit 2\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let outcome = ProcessInvoker::new()
            .with_search_path(vec![dir.path().to_path_buf()])
            .invoke("lintmux-test-checker", &["pkg".to_string()])
            .await;
        assert_eq!(outcome, Outcome::IssuesFound(b"checked pkg\n".to_vec()));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "found").unwrap();
        let outcome = ProcessInvoker::new()
            .with_working_dir(dir.path())
            .invoke("sh", &sh("cat marker.txt; exit 1"))
            .await;
        assert_eq!(outcome, Outcome::IssuesFound(b"found".to_vec()));
    }
}
