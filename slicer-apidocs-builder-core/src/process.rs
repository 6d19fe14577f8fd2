//! Process and directory helpers shared by the build and publish steps.
//!
//! Every external tool (git, cmake) is invoked through [`Exec`], which takes a
//! program plus a structured argument list, echoes the command line before
//! running it and redacts any registered secret from everything it prints or
//! returns.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, error};

/// Character used to mask secrets in echoed commands and captured output.
pub const REDACTION_CHAR: char = 'x';

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with code {code}")]
    Failed {
        command: String,
        code: i32,
        output: Option<String>,
    },
}

impl ProcessError {
    /// Exit code of the failed command, or `None` if it never started.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Spawn { .. } => None,
            ProcessError::Failed { code, .. } => Some(*code),
        }
    }

    /// Captured (already redacted) output of the failed command, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ProcessError::Failed { output, .. } => output.as_deref(),
            ProcessError::Spawn { .. } => None,
        }
    }
}

/// Replace every occurrence of `secret` in `text` with the same number of
/// [`REDACTION_CHAR`]s.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    let mask: String = std::iter::repeat(REDACTION_CHAR)
        .take(secret.chars().count())
        .collect();
    text.replace(secret, &mask)
}

/// Mask a secret for display, `(missing)` when absent.
pub fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => redact(s, s),
        _ => "(missing)".to_string(),
    }
}

/// Create `path` and its missing parents. Existing directories are fine.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => {
            error!(error = ?e, path = %path.display(), "Failed to create directory");
            Err(e)
        }
    }
}

/// Restores the saved working directory when dropped.
#[must_use = "the previous working directory is restored when the guard is dropped"]
#[derive(Debug)]
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            error!(
                error = ?e,
                path = %self.previous.display(),
                "Failed to restore working directory"
            );
        }
    }
}

/// Save the current directory, optionally create `path`, and enter it.
///
/// The previous directory comes back when the returned guard goes out of
/// scope, whichever way the enclosing block is left.
pub fn scoped_working_directory(path: &Path, create: bool) -> io::Result<WorkingDirGuard> {
    let previous = env::current_dir()?;
    if create {
        ensure_directory(path)?;
    }
    env::set_current_dir(path)?;
    let guard = WorkingDirGuard { previous };
    println!("\ncwd: {}", env::current_dir()?.display());
    Ok(guard)
}

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct Exec {
    program: String,
    args: Vec<String>,
    secrets: Vec<String>,
    dir: Option<PathBuf>,
}

impl Exec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secrets: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        for a in args {
            self = self.arg(a);
        }
        self
    }

    /// Register a value that must never appear in echoed or returned text.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// Run in `dir` instead of the process working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// The command line as it is shown to the user.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for a in &self.args {
            line.push(' ');
            line.push_str(a);
        }
        self.scrub(&line)
    }

    fn scrub(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| redact(&acc, secret))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Echo and run the command with inherited stdio.
    pub fn status(&self) -> Result<(), ProcessError> {
        self.run(false).map(|_| ())
    }

    /// Echo and run the command, returning merged stdout/stderr.
    pub fn output(&self) -> Result<String, ProcessError> {
        self.run(true)
    }

    /// Run without echoing, capturing output. Used for probes whose failure
    /// is an expected answer rather than an error worth showing.
    pub fn probe(&self) -> Result<String, ProcessError> {
        self.execute(true)
    }

    /// Echo the command, then execute it. With `capture` the merged output is
    /// returned; otherwise output goes straight to the console.
    pub fn run(&self, capture: bool) -> Result<String, ProcessError> {
        println!("\n> {}\n", self.display());
        self.execute(capture)
    }

    fn execute(&self, capture: bool) -> Result<String, ProcessError> {
        let command = self.display();
        debug!(command = %command, capture, "Running external command");

        let spawn_err = |source: io::Error| {
            error!(error = ?source, command = %command, "Failed to launch process");
            ProcessError::Spawn {
                command: command.clone(),
                source,
            }
        };

        if !capture {
            let status = self.command().status().map_err(spawn_err)?;
            if status.success() {
                return Ok(String::new());
            }
            let code = status.code().unwrap_or(-1);
            error!(command = %command, code, "Command exited with non-zero code");
            return Err(ProcessError::Failed {
                command,
                code,
                output: None,
            });
        }

        let out = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(spawn_err)?;
        let mut merged = String::from_utf8_lossy(&out.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&out.stderr));
        let merged = self.scrub(&merged);

        if out.status.success() {
            Ok(merged)
        } else {
            let code = out.status.code().unwrap_or(-1);
            debug!(command = %command, code, output = %merged, "Captured command failed");
            Err(ProcessError::Failed {
                command,
                code,
                output: Some(merged),
            })
        }
    }
}

/// Free-function form of [`Exec::run`].
pub fn run(command: &Exec, capture: bool) -> Result<String, ProcessError> {
    command.run(capture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_replaces_every_occurrence_with_same_length_filler() {
        let token = "ghp_s3cr3t";
        let line = format!("git push https://{token}@github.com/o/r gh-pages # {token}");
        let scrubbed = redact(&line, token);
        assert!(!scrubbed.contains(token));
        assert_eq!(scrubbed.len(), line.len());
        assert_eq!(scrubbed.matches("xxxxxxxxxx").count(), 2);
    }

    #[test]
    fn redact_with_empty_secret_is_identity() {
        assert_eq!(redact("abc", ""), "abc");
    }

    #[test]
    fn mask_secret_reports_missing() {
        assert_eq!(mask_secret(None), "(missing)");
        assert_eq!(mask_secret(Some("")), "(missing)");
        assert_eq!(mask_secret(Some("abcd")), "xxxx");
    }

    #[test]
    fn display_scrubs_registered_secrets() {
        let cmd = Exec::new("git")
            .args(["push", "https://tok123@github.com/a/b", "gh-pages"])
            .secret("tok123");
        assert_eq!(
            cmd.display(),
            "git push https://xxxxxx@github.com/a/b gh-pages"
        );
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_directory(&nested).unwrap();
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_directory_fails_on_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(ensure_directory(&file).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn captured_failure_carries_code_and_redacted_output() {
        let err = Exec::new("sh")
            .args(["-c", "echo leaked-hunter2 >&2; exit 3"])
            .secret("hunter2")
            .output()
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        let output = err.output().unwrap();
        assert!(output.contains("leaked-xxxxxxx"));
        assert!(!output.contains("hunter2"));
    }

    #[cfg(unix)]
    #[test]
    fn captured_output_merges_stdout_and_stderr() {
        let out = Exec::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .output()
            .unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = Exec::new("definitely-not-a-real-program-4242")
            .status()
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert_eq!(err.exit_code(), None);
    }
}
