//! Publish generated HTML to a GitHub Pages style branch.
//!
//! The publishing checkout lives next to the generated `html/` directory as
//! `apidocs/`. Each run replaces exactly one subdirectory of that checkout
//! (the branch name, or `vX.Y` for tags), commits if anything changed and
//! pushes with the token embedded in the push URL. The token is registered
//! as a command secret so it never shows up in echoed commands or errors.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::process::{scoped_working_directory, Exec, ProcessError};

/// Name of the publishing checkout created inside the Doxygen output dir.
pub const PUBLISH_CHECKOUT_DIR: &str = "apidocs";

/// Directory produced by Doxygen inside its output dir.
pub const HTML_DIR: &str = "html";

/// Project link included in every publishing commit.
pub const PROJECT_URL: &str = "https://github.com/Slicer/slicer-apidocs-builder";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to publish documentation: `{command}` exited with code {code}")]
    Push { command: String, code: i32 },
    #[error("publish output directory does not exist: {0}")]
    MissingOutputDir(PathBuf),
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> PublishError {
    let context = context.into();
    move |source| PublishError::Io { context, source }
}

#[derive(Clone)]
pub struct PublishConfig {
    /// Doxygen output dir: holds `html/` and receives the `apidocs/` checkout.
    pub output_dir: PathBuf,
    /// URL (or local path) the publishing repository is cloned from.
    pub repo_clone_url: String,
    /// URL pushes go to; credentials are added for http(s) URLs.
    pub repo_push_url: String,
    pub branch: String,
    pub username: String,
    pub useremail: String,
    pub token: String,
    /// Subdirectory of the publishing repository replaced by this run.
    pub subdir: String,
    /// `<owner>/<repo>@<tag-or-short-sha>`, quoted in the commit message.
    pub source_ref: String,
    /// Commit locally but do not push.
    pub skip_push: bool,
}

impl std::fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishConfig")
            .field("output_dir", &self.output_dir)
            .field("repo_clone_url", &self.repo_clone_url)
            .field("repo_push_url", &self.repo_push_url)
            .field("branch", &self.branch)
            .field("username", &self.username)
            .field("useremail", &self.useremail)
            .field("subdir", &self.subdir)
            .field("source_ref", &self.source_ref)
            .field("skip_push", &self.skip_push)
            .finish_non_exhaustive()
    }
}

impl PublishConfig {
    pub fn checkout_dir(&self) -> PathBuf {
        self.output_dir.join(PUBLISH_CHECKOUT_DIR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Working tree was clean after moving the output in.
    NothingToPublish,
    /// Committed, push skipped on request.
    Committed { commit: String },
    Published { commit: String },
}

/// `https://host/path` -> `https://<token>@host/path`. Non-HTTP URLs (local
/// paths, `file://`) are returned unchanged.
pub fn authenticated_url(url: &str, token: &str) -> String {
    for scheme in ["https://", "http://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            return format!("{scheme}{token}@{rest}");
        }
    }
    url.to_string()
}

/// Commit message for a documentation update of `source_ref`.
pub fn commit_message(source_ref: &str) -> String {
    format!(
        "Slicer apidocs update for {source_ref}\n\n\
         It was automatically generated by the script ``slicer-apidocs-builder`` [1]\n\n\
         [1] {PROJECT_URL}\n"
    )
}

/// Move the generated HTML into the publishing repository, commit and push.
pub fn publish_docs(config: &PublishConfig) -> Result<PublishOutcome, PublishError> {
    if !config.output_dir.is_dir() {
        error!(path = %config.output_dir.display(), "Doxygen output directory not found");
        return Err(PublishError::MissingOutputDir(config.output_dir.clone()));
    }
    info!(
        repo = %config.repo_clone_url,
        branch = %config.branch,
        subdir = %config.subdir,
        "Publishing apidocs"
    );

    {
        let _cwd = scoped_working_directory(&config.output_dir, false)
            .map_err(io_err(format!("Failed to enter {}", config.output_dir.display())))?;
        if !Path::new(PUBLISH_CHECKOUT_DIR).join(".git").exists() {
            clone_publish_branch(config)?;
        }
    }

    let _cwd = scoped_working_directory(&config.checkout_dir(), false)
        .map_err(io_err("Failed to enter publishing checkout"))?;

    Exec::new("git").args(["config", "user.email", &config.useremail]).status()?;
    Exec::new("git").args(["config", "user.name", &config.username]).status()?;

    Exec::new("git").args(["fetch", "origin"]).status()?;
    let tracking = format!("origin/{}", config.branch);
    if let Err(e) = Exec::new("git").args(["reset", "--hard", &tracking]).output() {
        info!(
            tracking = %tracking,
            reason = %e,
            "No remote tracking branch yet, keeping local state"
        );
    }

    replace_subdir(Path::new("..").join(HTML_DIR).as_path(), Path::new(&config.subdir))?;

    Exec::new("git").args(["add", "--all"]).status()?;
    let changes = Exec::new("git").args(["status", "--porcelain"]).output()?;
    if changes.trim().is_empty() {
        println!("\nNo new changes to publish");
        info!("Publishing checkout is clean, nothing to publish");
        return Ok(PublishOutcome::NothingToPublish);
    }

    Exec::new("git")
        .args(["commit", "-m", &commit_message(&config.source_ref)])
        .status()?;
    let commit = Exec::new("git")
        .args(["rev-parse", "HEAD"])
        .probe()?
        .trim()
        .to_string();
    info!(commit = %commit, "Committed apidocs update");

    if config.skip_push {
        info!("Skipping push (--skip-push)");
        return Ok(PublishOutcome::Committed { commit });
    }

    push(config)?;
    Ok(PublishOutcome::Published { commit })
}

/// Clone the publishing branch, falling back to a fresh orphan branch when it
/// does not exist upstream. Runs in the Doxygen output dir.
fn clone_publish_branch(config: &PublishConfig) -> Result<(), PublishError> {
    let clone = Exec::new("git")
        .args(["clone", "--branch", &config.branch, "--depth", "1"])
        .arg(&config.repo_clone_url)
        .arg(PUBLISH_CHECKOUT_DIR)
        .output();

    let err = match clone {
        Ok(_) => return Ok(()),
        Err(e) => e,
    };

    let not_found = format!("Remote branch {} not found in upstream origin", config.branch);
    if !err.output().is_some_and(|out| out.contains(&not_found)) {
        error!(error = %err, "Failed to clone publishing repository");
        return Err(err.into());
    }

    warn!(
        branch = %config.branch,
        "Publishing branch does not exist upstream, creating orphan branch"
    );
    Exec::new("git")
        .arg("clone")
        .arg(&config.repo_clone_url)
        .arg(PUBLISH_CHECKOUT_DIR)
        .status()?;

    let _cwd = scoped_working_directory(Path::new(PUBLISH_CHECKOUT_DIR), false)
        .map_err(io_err("Failed to enter publishing checkout"))?;
    Exec::new("git")
        .args(["symbolic-ref", "HEAD", &format!("refs/heads/{}", config.branch)])
        .status()?;
    match fs::remove_file(Path::new(".git").join("index")) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("Failed to remove .git/index")(e)),
    }
    Exec::new("git").args(["clean", "-fdx"]).status()?;
    Ok(())
}

/// Replace `target` with the contents of `source`. Nothing happens when there
/// is no fresh `source` to move in.
fn replace_subdir(source: &Path, target: &Path) -> Result<(), PublishError> {
    if !source.exists() {
        info!(source = %source.display(), "No generated HTML to move");
        return Ok(());
    }
    if target.exists() {
        fs::remove_dir_all(target)
            .map_err(io_err(format!("Failed to remove {}", target.display())))?;
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(io_err(format!("Failed to create {}", parent.display())))?;
    }
    println!("\nMoving {} -> {}", source.display(), target.display());
    fs::rename(source, target).map_err(io_err(format!(
        "Failed to move {} to {}",
        source.display(),
        target.display()
    )))
}

fn push(config: &PublishConfig) -> Result<(), PublishError> {
    let url = authenticated_url(&config.repo_push_url, &config.token);
    let cmd = Exec::new("git")
        .args(["push", &url, &config.branch])
        .secret(&config.token);
    match cmd.output() {
        Ok(_) => {
            info!(branch = %config.branch, "Pushed apidocs");
            Ok(())
        }
        Err(ProcessError::Failed { command, code, output }) => {
            error!(
                command = %command,
                code,
                output = output.as_deref().unwrap_or(""),
                "Failed to publish documentation"
            );
            Err(PublishError::Push { command, code })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_inserted_into_https_urls_only() {
        assert_eq!(
            authenticated_url("https://github.com/slicer/apidocs.slicer.org", "t0k"),
            "https://t0k@github.com/slicer/apidocs.slicer.org"
        );
        assert_eq!(authenticated_url("/srv/git/apidocs.git", "t0k"), "/srv/git/apidocs.git");
    }

    #[test]
    fn commit_message_names_source_reference() {
        let msg = commit_message("Slicer/Slicer@v5.2.1");
        assert!(msg.starts_with("Slicer apidocs update for Slicer/Slicer@v5.2.1\n\n"));
        assert!(msg.contains("``slicer-apidocs-builder``"));
        assert!(msg.contains(PROJECT_URL));
    }

    #[test]
    fn debug_output_hides_token() {
        let config = PublishConfig {
            output_dir: "/tmp/out".into(),
            repo_clone_url: "https://github.com/a/b".into(),
            repo_push_url: "https://github.com/a/b".into(),
            branch: "gh-pages".into(),
            username: "Slicer Bot".into(),
            useremail: "slicerbot@slicer.org".into(),
            token: "super-secret-token".into(),
            subdir: "master".into(),
            source_ref: "Slicer/Slicer@abcdef12".into(),
            skip_push: false,
        };
        assert!(!format!("{config:?}").contains("super-secret-token"));
    }
}
